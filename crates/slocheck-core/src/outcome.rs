//! Request outcome classification.

use crate::endpoint::Endpoint;

/// How a single request attempt counts toward the aggregate metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeClass {
    /// Status in `[200, 400)`.
    Success,

    /// Allow-listed non-2xx/3xx status: a legitimate business outcome
    /// (e.g. "no eligible reviewer"). Counts as success in aggregate
    /// metrics but stays visible per endpoint.
    SoftFailure,

    /// Disallowed status or transport-level failure.
    Failure,
}

/// Classified result of one request attempt, consumed by the aggregator.
#[derive(Debug, Clone)]
pub struct RequestOutcome {
    /// Endpoint the request targeted.
    pub endpoint: Endpoint,

    /// Response status, or `None` when the transport itself failed.
    pub status: Option<u16>,

    /// Wall-clock duration of the attempt in milliseconds.
    pub duration_ms: f64,

    /// Classification under the endpoint's allow-list.
    pub class: OutcomeClass,
}

impl RequestOutcome {
    /// Classifies a completed attempt. `allowed` is the endpoint's soft
    /// status allow-list; a `None` status always classifies as `Failure`.
    #[must_use]
    pub fn classify(
        endpoint: Endpoint,
        status: Option<u16>,
        duration_ms: f64,
        allowed: &[u16],
    ) -> Self {
        let class = match status {
            Some(code) if (200..400).contains(&code) => OutcomeClass::Success,
            Some(code) if allowed.contains(&code) => OutcomeClass::SoftFailure,
            _ => OutcomeClass::Failure,
        };
        Self {
            endpoint,
            status,
            duration_ms,
            class,
        }
    }

    /// Whether the attempt counts as success for availability/error-rate.
    #[must_use]
    pub fn accepted(&self) -> bool {
        !matches!(self.class, OutcomeClass::Failure)
    }
}
