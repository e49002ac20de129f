//! Core domain types for the slocheck load generator.

pub mod config;
pub mod endpoint;
pub mod error;
pub mod outcome;
pub mod sli;
pub mod stage;
pub mod stats;
pub mod workload;

pub use config::{LoadConfig, PacingConfig, ReportConfig, ScheduleConfig, TargetConfig};
pub use endpoint::Endpoint;
pub use error::{CoreError, CoreResult};
pub use outcome::{OutcomeClass, RequestOutcome};
pub use sli::{evaluate, Comparison, SliMetric, SliSnapshot, SliThreshold, ThresholdOutcome, Verdict};
pub use stage::{RampPlan, Stage, TransitionPolicy};
pub use workload::reviewer_pool_slot;
