//! Concurrent metrics aggregation.
//!
//! All workflow executors feed the same aggregator. Each sink guards its
//! own state (a short mutex around the latency vector, atomics for the
//! counters) so recording from one client never blocks another for more
//! than an append.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use serde::Serialize;
use slocheck_core::stats;
use slocheck_core::{Endpoint, OutcomeClass, RequestOutcome, SliSnapshot};

/// Append-only latency distribution in milliseconds.
#[derive(Default)]
struct LatencySink {
    samples: Mutex<Vec<f64>>,
}

impl LatencySink {
    fn record(&self, ms: f64) {
        self.samples.lock().push(ms);
    }

    /// Sorted copy of the samples recorded so far.
    fn sorted(&self) -> Vec<f64> {
        let mut samples = self.samples.lock().clone();
        samples.sort_by(f64::total_cmp);
        samples
    }
}

/// Stream of success/failure observations.
#[derive(Default)]
struct BernoulliStream {
    hits: AtomicU64,
    total: AtomicU64,
}

impl BernoulliStream {
    fn record(&self, hit: bool) {
        if hit {
            self.hits.fetch_add(1, Ordering::Relaxed);
        }
        self.total.fetch_add(1, Ordering::Relaxed);
    }

    fn rate(&self) -> f64 {
        stats::rate(self.hits.load(Ordering::Relaxed), self.total.load(Ordering::Relaxed))
    }

    fn samples(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }
}

/// Per-endpoint sink: latency distribution plus outcome counters.
#[derive(Default)]
struct EndpointSink {
    latency: LatencySink,
    requests: AtomicU64,
    errors: AtomicU64,
    soft_failures: AtomicU64,
}

/// Shared, concurrent-safe ingestion point for request outcomes.
pub struct MetricsAggregator {
    endpoints: [EndpointSink; Endpoint::COUNT],
    error_rate: BernoulliStream,
    availability: BernoulliStream,
    // The two global distributions are fed identically but kept as
    // independent sinks: their thresholds differ.
    latency_p95: LatencySink,
    latency_p99: LatencySink,
}

impl MetricsAggregator {
    /// Creates an empty aggregator covering every workflow endpoint.
    #[must_use]
    pub fn new() -> Self {
        Self {
            endpoints: std::array::from_fn(|_| EndpointSink::default()),
            error_rate: BernoulliStream::default(),
            availability: BernoulliStream::default(),
            latency_p95: LatencySink::default(),
            latency_p99: LatencySink::default(),
        }
    }

    /// Appends a latency sample to the endpoint's distribution and to both
    /// global percentile distributions.
    pub fn record_latency(&self, endpoint: Endpoint, ms: f64) {
        self.endpoints[endpoint.index()].latency.record(ms);
        self.latency_p95.record(ms);
        self.latency_p99.record(ms);
    }

    /// Records a classified outcome: bumps the endpoint counters and feeds
    /// the two global Bernoulli streams exactly once each.
    pub fn record_outcome(&self, outcome: &RequestOutcome) {
        let sink = &self.endpoints[outcome.endpoint.index()];
        sink.requests.fetch_add(1, Ordering::Relaxed);
        match outcome.class {
            OutcomeClass::Success => {}
            OutcomeClass::SoftFailure => {
                sink.soft_failures.fetch_add(1, Ordering::Relaxed);
            }
            OutcomeClass::Failure => {
                sink.errors.fetch_add(1, Ordering::Relaxed);
            }
        }

        let accepted = outcome.accepted();
        self.error_rate.record(!accepted);
        self.availability.record(accepted);
    }

    /// Consistent point-in-time view of everything recorded so far.
    ///
    /// Percentiles use the nearest-rank method over the append-only
    /// samples, so repeated snapshots never reorder past data.
    #[must_use]
    pub fn snapshot(&self) -> RunSnapshot {
        let p95_samples = self.latency_p95.sorted();
        let p99_samples = self.latency_p99.sorted();

        let global = SliSnapshot {
            requests: self.availability.samples(),
            error_rate: self.error_rate.rate(),
            availability: self.availability.rate(),
            error_rate_samples: self.error_rate.samples(),
            availability_samples: self.availability.samples(),
            p95_ms: stats::percentile(&p95_samples, 0.95),
            p99_ms: stats::percentile(&p99_samples, 0.99),
        };

        let endpoints = Endpoint::ALL
            .into_iter()
            .map(|endpoint| {
                let sink = &self.endpoints[endpoint.index()];
                let samples = sink.latency.sorted();
                EndpointSnapshot {
                    endpoint,
                    requests: sink.requests.load(Ordering::Relaxed),
                    errors: sink.errors.load(Ordering::Relaxed),
                    soft_failures: sink.soft_failures.load(Ordering::Relaxed),
                    p95_ms: stats::percentile(&samples, 0.95),
                    max_ms: samples.last().copied().unwrap_or(0.0),
                }
            })
            .collect();

        RunSnapshot { global, endpoints }
    }
}

impl Default for MetricsAggregator {
    fn default() -> Self {
        Self::new()
    }
}

/// Aggregate view of one endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EndpointSnapshot {
    pub endpoint: Endpoint,
    pub requests: u64,
    pub errors: u64,
    pub soft_failures: u64,
    pub p95_ms: f64,
    pub max_ms: f64,
}

/// Full aggregate view: global SLI metrics plus per-endpoint breakdown.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSnapshot {
    pub global: SliSnapshot,
    pub endpoints: Vec<EndpointSnapshot>,
}

impl RunSnapshot {
    /// Breakdown entry for one endpoint.
    #[must_use]
    pub fn endpoint(&self, endpoint: Endpoint) -> &EndpointSnapshot {
        &self.endpoints[endpoint.index()]
    }
}
