//! Staged concurrency ramp scheduler.
//!
//! Owns the run lifecycle: reconciles a pool of client tasks toward the
//! plan's target concurrency on every poll tick, replaces faulted clients,
//! and drains the pool gracefully when the timeline ends.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use slocheck_core::RampPlan;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::metrics::RunSnapshot;
use crate::workflow::{ClientContext, WorkflowRunner};

/// How often aggregate progress is logged.
const PROGRESS_INTERVAL: Duration = Duration::from_secs(10);

/// One running simulated client.
struct Worker {
    client_index: u64,
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

/// Drives the ramp timeline and the worker pool.
pub struct RampScheduler {
    plan: RampPlan,
    poll_interval: Duration,
    runner: Arc<WorkflowRunner>,
}

impl RampScheduler {
    /// Builds a scheduler over a plan and a shared workflow runner.
    #[must_use]
    pub fn new(plan: RampPlan, poll_interval: Duration, runner: Arc<WorkflowRunner>) -> Self {
        Self {
            plan,
            poll_interval,
            runner,
        }
    }

    /// Runs the full timeline and returns the final metrics snapshot.
    ///
    /// Concurrency trends toward the plan's target within one poll
    /// interval. A worker that dies of a logic fault is logged and
    /// replaced; the run itself never aborts for one instance.
    pub async fn run(&self) -> RunSnapshot {
        let started = tokio::time::Instant::now();
        let total = self.plan.total_duration();
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut active: Vec<Worker> = Vec::new();
        let mut draining: Vec<Worker> = Vec::new();
        let mut next_client_index: u64 = 0;
        let mut current_stage: Option<usize> = None;
        let mut last_progress = Duration::ZERO;

        info!(
            stages = self.plan.stages().len(),
            duration_secs = total.as_secs(),
            "load run starting"
        );

        loop {
            ticker.tick().await;
            let elapsed = started.elapsed();
            if elapsed >= total {
                break;
            }

            if let Some(stage) = self.plan.stage_index_at(elapsed) {
                if current_stage != Some(stage) {
                    current_stage = Some(stage);
                    let spec = self.plan.stages()[stage];
                    info!(
                        stage,
                        target = spec.target,
                        policy = ?spec.policy,
                        "stage started"
                    );
                }
            }

            self.reap_faulted(&mut active).await;
            // Drained workers disappear once their in-flight step finishes.
            draining.retain(|worker| !worker.handle.is_finished());

            let target = self.plan.concurrency_at(elapsed) as usize;
            while active.len() < target {
                active.push(self.spawn_worker(next_client_index));
                next_client_index += 1;
            }
            while active.len() > target {
                if let Some(worker) = active.pop() {
                    worker.stop.store(true, Ordering::Relaxed);
                    draining.push(worker);
                }
            }

            if elapsed - last_progress >= PROGRESS_INTERVAL {
                last_progress = elapsed;
                let snapshot = self.runner.metrics().snapshot();
                info!(
                    elapsed_secs = elapsed.as_secs(),
                    clients = active.len(),
                    requests = snapshot.global.requests,
                    error_rate = snapshot.global.error_rate,
                    p95_ms = snapshot.global.p95_ms,
                    "progress"
                );
            }
        }

        // Timeline over: flag everything and let in-flight steps finish.
        for worker in active.drain(..) {
            worker.stop.store(true, Ordering::Relaxed);
            draining.push(worker);
        }
        for worker in draining {
            if let Err(err) = worker.handle.await {
                error!(
                    client_index = worker.client_index,
                    error = %err,
                    "executor fault during drain"
                );
            }
        }

        info!("load run complete");
        self.runner.metrics().snapshot()
    }

    /// Removes workers that terminated without being flagged. The refill
    /// in the main loop replaces them with fresh client indexes.
    async fn reap_faulted(&self, active: &mut Vec<Worker>) {
        let mut i = 0;
        while i < active.len() {
            if active[i].handle.is_finished() {
                let worker = active.swap_remove(i);
                match worker.handle.await {
                    Ok(()) => warn!(
                        client_index = worker.client_index,
                        "executor exited unexpectedly; replacing"
                    ),
                    Err(err) => error!(
                        client_index = worker.client_index,
                        error = %err,
                        "executor fault; replacing"
                    ),
                }
            } else {
                i += 1;
            }
        }
    }

    fn spawn_worker(&self, client_index: u64) -> Worker {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let runner = Arc::clone(&self.runner);

        let handle = tokio::spawn(async move {
            let mut iteration = 0u64;
            while !flag.load(Ordering::Relaxed) {
                let ctx = ClientContext::new(client_index, iteration);
                runner.run_iteration(&ctx, &flag).await;
                iteration += 1;
            }
        });

        debug!(client_index, "client started");
        Worker {
            client_index,
            stop,
            handle,
        }
    }
}
