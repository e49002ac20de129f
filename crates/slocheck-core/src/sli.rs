//! SLI thresholds and verdict evaluation.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Aggregate metrics a threshold can name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SliMetric {
    /// Fraction of attempts that failed (disallowed status or transport error).
    #[serde(rename = "error_rate")]
    ErrorRate,

    /// Fraction of attempts that were accepted.
    #[serde(rename = "availability")]
    Availability,

    /// Global 95th-percentile latency in milliseconds.
    #[serde(rename = "latency_p95")]
    LatencyP95,

    /// Global 99th-percentile latency in milliseconds.
    #[serde(rename = "latency_p99")]
    LatencyP99,
}

impl SliMetric {
    /// Parses a metric name as it appears in configuration.
    pub fn parse(name: &str) -> CoreResult<Self> {
        match name.trim() {
            "error_rate" => Ok(Self::ErrorRate),
            "availability" => Ok(Self::Availability),
            "latency_p95" | "p95" => Ok(Self::LatencyP95),
            "latency_p99" | "p99" => Ok(Self::LatencyP99),
            other => Err(CoreError::invalid_threshold(
                other,
                "unknown metric (expected error_rate, availability, latency_p95 or latency_p99)",
            )),
        }
    }

    /// Human-readable name used in reports.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::ErrorRate => "error_rate",
            Self::Availability => "availability",
            Self::LatencyP95 => "latency_p95",
            Self::LatencyP99 => "latency_p99",
        }
    }

    /// Reads this metric's observed value out of a snapshot.
    #[must_use]
    pub fn observed(&self, snapshot: &SliSnapshot) -> f64 {
        match self {
            Self::ErrorRate => snapshot.error_rate,
            Self::Availability => snapshot.availability,
            Self::LatencyP95 => snapshot.p95_ms,
            Self::LatencyP99 => snapshot.p99_ms,
        }
    }
}

impl std::fmt::Display for SliMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Comparison operator of a threshold predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Comparison {
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Ge,
}

impl Comparison {
    /// Applies the comparison to an observed value.
    #[must_use]
    pub fn holds(&self, observed: f64, bound: f64) -> bool {
        match self {
            Self::Lt => observed < bound,
            Self::Le => observed <= bound,
            Self::Gt => observed > bound,
            Self::Ge => observed >= bound,
        }
    }

    /// Operator as written in predicates.
    #[must_use]
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        }
    }
}

/// One declared SLI threshold: a metric, a comparison, and a literal bound.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SliThreshold {
    pub metric: SliMetric,
    pub op: Comparison,
    pub bound: f64,
}

impl SliThreshold {
    /// Parses a compact predicate as written in configuration, e.g.
    /// `rate>0.999`, `p(95)<300`, `<300ms`. Any label before the operator
    /// is informational; the metric itself is declared separately. A `ms`
    /// suffix on the bound is accepted and ignored.
    pub fn parse(metric: SliMetric, predicate: &str) -> CoreResult<Self> {
        let trimmed = predicate.trim();
        let op_at = trimmed
            .find(|c| c == '<' || c == '>')
            .ok_or_else(|| CoreError::invalid_threshold(trimmed, "missing comparison operator"))?;

        let rest = &trimmed[op_at..];
        let (op, bound_str) = if let Some(tail) = rest.strip_prefix("<=") {
            (Comparison::Le, tail)
        } else if let Some(tail) = rest.strip_prefix(">=") {
            (Comparison::Ge, tail)
        } else if let Some(tail) = rest.strip_prefix('<') {
            (Comparison::Lt, tail)
        } else if let Some(tail) = rest.strip_prefix('>') {
            (Comparison::Gt, tail)
        } else {
            return Err(CoreError::invalid_threshold(
                trimmed,
                "missing comparison operator",
            ));
        };

        let bound: f64 = bound_str
            .trim()
            .trim_end_matches("ms")
            .trim()
            .parse()
            .map_err(|_| CoreError::invalid_threshold(trimmed, "bound is not a number"))?;

        Ok(Self { metric, op, bound })
    }
}

impl std::fmt::Display for SliThreshold {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}{}", self.metric, self.op.symbol(), self.bound)
    }
}

/// Point-in-time view of the global aggregate metrics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SliSnapshot {
    /// Total request attempts recorded.
    pub requests: u64,

    /// Fraction of attempts that failed.
    pub error_rate: f64,

    /// Fraction of attempts that were accepted.
    pub availability: f64,

    /// Sample count of the error-rate Bernoulli stream.
    pub error_rate_samples: u64,

    /// Sample count of the availability Bernoulli stream.
    pub availability_samples: u64,

    /// Global p95 latency in milliseconds.
    pub p95_ms: f64,

    /// Global p99 latency in milliseconds.
    pub p99_ms: f64,
}

/// Result of evaluating a single threshold.
#[derive(Debug, Clone, Serialize)]
pub struct ThresholdOutcome {
    /// Metric the threshold names.
    pub metric: SliMetric,

    /// Predicate as declared.
    pub predicate: String,

    /// Value observed in the final snapshot.
    pub observed: f64,

    /// Whether the predicate held.
    pub passed: bool,
}

/// Final pass/fail determination, one entry per declared threshold.
#[derive(Debug, Clone, Serialize)]
pub struct Verdict {
    /// Individual threshold results, in declaration order.
    pub outcomes: Vec<ThresholdOutcome>,
}

impl Verdict {
    /// The run passes iff every declared threshold passed.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.outcomes.iter().all(|o| o.passed)
    }

    /// Thresholds that failed, for operator-facing summaries.
    #[must_use]
    pub fn failures(&self) -> Vec<&ThresholdOutcome> {
        self.outcomes.iter().filter(|o| !o.passed).collect()
    }
}

/// Evaluates every declared threshold against a final snapshot.
///
/// Pure and side-effect-free; each threshold is reported individually so
/// operators can localize the violation.
#[must_use]
pub fn evaluate(snapshot: &SliSnapshot, thresholds: &[SliThreshold]) -> Verdict {
    let outcomes = thresholds
        .iter()
        .map(|threshold| {
            let observed = threshold.metric.observed(snapshot);
            ThresholdOutcome {
                metric: threshold.metric,
                predicate: format!("{}{}", threshold.op.symbol(), threshold.bound),
                observed,
                passed: threshold.op.holds(observed, threshold.bound),
            }
        })
        .collect();

    Verdict { outcomes }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(p95_ms: f64, p99_ms: f64, availability: f64) -> SliSnapshot {
        SliSnapshot {
            requests: 1000,
            error_rate: 1.0 - availability,
            availability,
            error_rate_samples: 1000,
            availability_samples: 1000,
            p95_ms,
            p99_ms,
        }
    }

    #[test]
    fn test_parse_rate_predicate() {
        let threshold = SliThreshold::parse(SliMetric::Availability, "rate>0.999").unwrap();
        assert_eq!(threshold.op, Comparison::Gt);
        assert_eq!(threshold.bound, 0.999);
    }

    #[test]
    fn test_parse_percentile_predicates() {
        let bare = SliThreshold::parse(SliMetric::LatencyP95, "<300").unwrap();
        assert_eq!(bare.op, Comparison::Lt);
        assert_eq!(bare.bound, 300.0);

        let labeled = SliThreshold::parse(SliMetric::LatencyP95, "p(95)<300").unwrap();
        assert_eq!(labeled.bound, 300.0);

        let with_unit = SliThreshold::parse(SliMetric::LatencyP99, "p99<=500ms").unwrap();
        assert_eq!(with_unit.op, Comparison::Le);
        assert_eq!(with_unit.bound, 500.0);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(SliThreshold::parse(SliMetric::ErrorRate, "0.001").is_err());
        assert!(SliThreshold::parse(SliMetric::ErrorRate, "rate<abc").is_err());
        assert!(SliMetric::parse("throughput").is_err());
    }

    #[test]
    fn test_p95_threshold_passes_and_fails() {
        let threshold = SliThreshold::parse(SliMetric::LatencyP95, "<300").unwrap();

        let passing = evaluate(&snapshot(250.0, 400.0, 1.0), &[threshold]);
        assert!(passing.passed());
        assert!(passing.outcomes[0].passed);
        assert_eq!(passing.outcomes[0].observed, 250.0);

        let failing = evaluate(&snapshot(310.0, 400.0, 1.0), &[threshold]);
        assert!(!failing.passed());
        assert_eq!(failing.outcomes[0].observed, 310.0);
    }

    #[test]
    fn test_thresholds_evaluated_independently() {
        let thresholds = [
            SliThreshold::parse(SliMetric::LatencyP95, "<300").unwrap(),
            SliThreshold::parse(SliMetric::Availability, "rate>0.999").unwrap(),
        ];

        // p95 fails, availability passes: both are reported, run fails.
        let verdict = evaluate(&snapshot(310.0, 400.0, 1.0), &thresholds);
        assert!(!verdict.passed());
        assert_eq!(verdict.outcomes.len(), 2);
        assert!(!verdict.outcomes[0].passed);
        assert!(verdict.outcomes[1].passed);
        assert_eq!(verdict.failures().len(), 1);
    }

    #[test]
    fn test_empty_threshold_list_passes() {
        let verdict = evaluate(&snapshot(10.0, 20.0, 1.0), &[]);
        assert!(verdict.passed());
        assert!(verdict.outcomes.is_empty());
    }
}
