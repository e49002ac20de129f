//! Configuration management for slocheck
//!
//! This module provides a centralized configuration system that supports:
//! - YAML configuration files
//! - Environment variable overrides
//! - Reasonable defaults (the source workload profile)
//! - Configuration validation

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use crate::endpoint::Endpoint;
use crate::error::{CoreError, CoreResult};
use crate::sli::{SliMetric, SliThreshold};
use crate::stage::{RampPlan, Stage, TransitionPolicy};

/// Root configuration structure for a load run
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoadConfig {
    #[serde(default)]
    pub target: TargetConfig,

    #[serde(default)]
    pub schedule: ScheduleConfig,

    #[serde(default)]
    pub pacing: PacingConfig,

    #[serde(default)]
    pub transport: TransportConfig,

    #[serde(default)]
    pub report: ReportConfig,

    /// Per-endpoint soft status allow-lists, keyed by endpoint tag.
    /// Workload-specific policy, deliberately not a universal rule.
    #[serde(default = "default_allowlist")]
    pub allowlist: BTreeMap<String, Vec<u16>>,

    /// Declared SLI thresholds, evaluated at end of run.
    #[serde(default = "default_thresholds")]
    pub thresholds: Vec<ThresholdConfig>,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            target: TargetConfig::default(),
            schedule: ScheduleConfig::default(),
            pacing: PacingConfig::default(),
            transport: TransportConfig::default(),
            report: ReportConfig::default(),
            allowlist: default_allowlist(),
            thresholds: default_thresholds(),
        }
    }
}

impl LoadConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Environment variables (highest priority)
    /// 2. Config file specified by SLOCHECK_CONFIG env var
    /// 3. ./config/slocheck.yaml
    /// 4. /etc/slocheck/slocheck.yaml
    /// 5. Hardcoded defaults (lowest priority)
    pub fn load() -> Result<Self, ConfigError> {
        let config = Self::load_unchecked()?;
        config.validate()?;
        Ok(config)
    }

    /// Load from the standard sources without validating, for callers that
    /// apply overrides (e.g. CLI flags) before validation.
    pub fn load_unchecked() -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        builder = Self::set_defaults(builder)?;

        if let Ok(config_path) = std::env::var("SLOCHECK_CONFIG") {
            builder = builder.add_source(File::with_name(&config_path).required(false));
        }

        builder = builder
            .add_source(File::with_name("./config/slocheck").required(false))
            .add_source(File::with_name("/etc/slocheck/slocheck").required(false));

        // Override with environment variables
        // Example: SLOCHECK_TARGET__ADMIN_TOKEN=eyJ...
        builder = builder.add_source(
            Environment::with_prefix("SLOCHECK")
                .separator("__")
                .try_parsing(true),
        );

        let config: LoadConfig = builder.build()?.try_deserialize()?;

        Ok(config)
    }

    /// Load configuration from a specific file path
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config: LoadConfig = Config::builder()
            .add_source(File::from(path.as_ref()))
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Set default values for scalar configuration options
    fn set_defaults(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        builder
            // Target
            .set_default("target.base_url", "http://localhost:8080")?
            .set_default("target.admin_token", "")?
            .set_default("target.team_name", "test_backend")?
            .set_default("target.user_pool_size", 18)?
            // Schedule
            .set_default("schedule.poll_interval_ms", 250)?
            // Pacing
            .set_default("pacing.read_delay_ms", 100)?
            .set_default("pacing.write_delay_ms", 200)?
            // Transport
            .set_default("transport.request_timeout_ms", 10_000)?
            // Report
            .set_default("report.format", "markdown")
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.target.base_url.is_empty() {
            return Err(ConfigError::Message(
                "target.base_url must not be empty".to_string(),
            ));
        }

        if !self.target.base_url.starts_with("http") {
            return Err(ConfigError::Message(
                "target.base_url must be an http(s) URL".to_string(),
            ));
        }

        if self.target.admin_token.is_empty() {
            return Err(ConfigError::Message(
                "target.admin_token must be set (SLOCHECK_TARGET__ADMIN_TOKEN)".to_string(),
            ));
        }

        if self.target.user_pool_size == 0 {
            return Err(ConfigError::Message(
                "target.user_pool_size must be > 0".to_string(),
            ));
        }

        if self.schedule.poll_interval_ms == 0 {
            return Err(ConfigError::Message(
                "schedule.poll_interval_ms must be > 0".to_string(),
            ));
        }

        if self.schedule.stages.is_empty() {
            return Err(ConfigError::Message(
                "schedule.stages must declare at least one stage".to_string(),
            ));
        }

        for (i, stage) in self.schedule.stages.iter().enumerate() {
            if stage.duration_secs == 0 {
                return Err(ConfigError::Message(format!(
                    "schedule.stages[{i}].duration_secs must be > 0"
                )));
            }
            if stage.policy != "step" && stage.policy != "linear" {
                return Err(ConfigError::Message(format!(
                    "schedule.stages[{i}].policy must be 'step' or 'linear', got '{}'",
                    stage.policy
                )));
            }
        }

        if self.transport.request_timeout_ms == 0 {
            return Err(ConfigError::Message(
                "transport.request_timeout_ms must be > 0".to_string(),
            ));
        }

        if self.report.format != "markdown" && self.report.format != "json" {
            return Err(ConfigError::Message(format!(
                "report.format must be 'markdown' or 'json', got '{}'",
                self.report.format
            )));
        }

        for tag in self.allowlist.keys() {
            if Endpoint::from_tag(tag).is_none() {
                return Err(ConfigError::Message(format!(
                    "allowlist references unknown endpoint tag '{tag}'"
                )));
            }
        }

        for threshold in &self.thresholds {
            if let Err(err) = threshold.parse() {
                return Err(ConfigError::Message(err.to_string()));
            }
        }

        Ok(())
    }

    /// Build the ramp timeline from the configured stages.
    pub fn ramp_plan(&self) -> CoreResult<RampPlan> {
        let stages = self
            .schedule
            .stages
            .iter()
            .map(StageConfig::to_stage)
            .collect::<CoreResult<Vec<_>>>()?;
        Ok(RampPlan::new(stages))
    }

    /// Parse the declared thresholds into their typed form.
    pub fn sli_thresholds(&self) -> CoreResult<Vec<SliThreshold>> {
        self.thresholds.iter().map(ThresholdConfig::parse).collect()
    }

    /// Allow-listed soft statuses for an endpoint (empty if none declared).
    #[must_use]
    pub fn allowed_statuses(&self, endpoint: Endpoint) -> &[u16] {
        self.allowlist
            .get(endpoint.tag())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// Remote service under test
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TargetConfig {
    /// Base URL of the service under test
    pub base_url: String,

    /// Bearer credential attached to authenticated requests
    pub admin_token: String,

    /// Team name used by the read-only team fetch step
    pub team_name: String,

    /// Size of the fixed tb1..tbN user pool
    pub user_pool_size: u32,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            admin_token: String::new(),
            team_name: "test_backend".to_string(),
            user_pool_size: 18,
        }
    }
}

/// Concurrency schedule
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScheduleConfig {
    /// How often the scheduler reconciles the worker pool toward the target
    pub poll_interval_ms: u64,

    /// Ordered stage list
    #[serde(default = "default_stages")]
    pub stages: Vec<StageConfig>,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 250,
            stages: default_stages(),
        }
    }
}

impl ScheduleConfig {
    /// Poll interval as a Duration
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// One configured stage
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StageConfig {
    /// Stage length in seconds
    pub duration_secs: u64,

    /// Target concurrency for the stage
    pub target: u32,

    /// Transition policy: "step" or "linear"
    pub policy: String,
}

impl StageConfig {
    fn to_stage(&self) -> CoreResult<Stage> {
        let policy = match self.policy.as_str() {
            "step" => TransitionPolicy::Step,
            "linear" => TransitionPolicy::Linear,
            other => {
                return Err(CoreError::invalid_config(format!(
                    "unknown stage policy '{other}'"
                )))
            }
        };
        Ok(Stage {
            duration: Duration::from_secs(self.duration_secs),
            target: self.target,
            policy,
        })
    }
}

/// Inter-step pacing delays
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PacingConfig {
    /// Delay after read-only steps in milliseconds
    pub read_delay_ms: u64,

    /// Delay after mutating steps in milliseconds
    pub write_delay_ms: u64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            read_delay_ms: 100,
            write_delay_ms: 200,
        }
    }
}

impl PacingConfig {
    /// Pacing delay for a given endpoint
    #[must_use]
    pub fn delay_for(&self, endpoint: Endpoint) -> Duration {
        if endpoint.is_mutating() {
            Duration::from_millis(self.write_delay_ms)
        } else {
            Duration::from_millis(self.read_delay_ms)
        }
    }
}

/// HTTP transport tuning
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TransportConfig {
    /// Per-request timeout in milliseconds
    pub request_timeout_ms: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: 10_000,
        }
    }
}

impl TransportConfig {
    /// Request timeout as a Duration
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Report output settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReportConfig {
    /// Where to write the report; stdout-only when unset
    pub path: Option<String>,

    /// "markdown" or "json"
    pub format: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            path: None,
            format: "markdown".to_string(),
        }
    }
}

/// One declared threshold: a metric name plus a compact predicate
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ThresholdConfig {
    /// Metric name: error_rate, availability, latency_p95, latency_p99
    pub metric: String,

    /// Predicate, e.g. "rate>0.999" or "p(95)<300"
    pub predicate: String,
}

impl ThresholdConfig {
    /// Parse into the typed threshold form.
    pub fn parse(&self) -> CoreResult<SliThreshold> {
        let metric = SliMetric::parse(&self.metric)?;
        SliThreshold::parse(metric, &self.predicate)
    }
}

/// The source workload's ramp-hold-ramp shape.
fn default_stages() -> Vec<StageConfig> {
    vec![
        StageConfig {
            duration_secs: 5,
            target: 100,
            policy: "linear".to_string(),
        },
        StageConfig {
            duration_secs: 60,
            target: 100,
            policy: "step".to_string(),
        },
        StageConfig {
            duration_secs: 5,
            target: 0,
            policy: "linear".to_string(),
        },
    ]
}

/// The source workload's SLI contract.
fn default_thresholds() -> Vec<ThresholdConfig> {
    vec![
        ThresholdConfig {
            metric: "availability".to_string(),
            predicate: "rate>0.999".to_string(),
        },
        ThresholdConfig {
            metric: "error_rate".to_string(),
            predicate: "rate<0.001".to_string(),
        },
        ThresholdConfig {
            metric: "latency_p95".to_string(),
            predicate: "p(95)<300".to_string(),
        },
        ThresholdConfig {
            metric: "latency_p99".to_string(),
            predicate: "p(99)<500".to_string(),
        },
    ]
}

/// Conflict on reassignment means "no eligible candidate": an expected
/// outcome for that endpoint only.
fn default_allowlist() -> BTreeMap<String, Vec<u16>> {
    let mut map = BTreeMap::new();
    map.insert("pr_reassign".to_string(), vec![409]);
    map
}
