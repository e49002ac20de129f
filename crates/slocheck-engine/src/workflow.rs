//! Scripted workflow executor.
//!
//! One `WorkflowRunner` is shared by every simulated client; each client
//! runs `run_iteration` with its own `ClientContext`. Steps execute
//! strictly in order, every attempt is recorded, and request failures
//! never abort the remaining steps of the iteration.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Value};
use slocheck_core::{reviewer_pool_slot, Endpoint, LoadConfig, RequestOutcome};
use tracing::{debug, warn};

use crate::metrics::MetricsAggregator;
use crate::transport::{Method, Transport};

/// Per-client identity for one iteration.
#[derive(Debug, Clone)]
pub struct ClientContext {
    /// Index of the simulated client, assigned by the scheduler.
    pub client_index: u64,

    /// Iteration counter within the client's lifetime.
    pub iteration: u64,

    /// Unique id woven into created entity names, derived from the client
    /// index, the iteration and a timestamp.
    pub correlation_id: String,
}

impl ClientContext {
    /// Builds the context for one iteration.
    #[must_use]
    pub fn new(client_index: u64, iteration: u64) -> Self {
        let correlation_id = format!(
            "{}-{}-{}",
            client_index,
            iteration,
            Utc::now().timestamp_millis()
        );
        Self {
            client_index,
            iteration,
            correlation_id,
        }
    }
}

/// Status and body of an accepted transport exchange.
struct StepReply {
    status: u16,
    body: String,
}

/// Executes the scripted review workflow for one client at a time.
pub struct WorkflowRunner {
    config: LoadConfig,
    transport: Arc<dyn Transport>,
    metrics: Arc<MetricsAggregator>,
}

impl WorkflowRunner {
    /// Builds a runner over the shared transport and aggregator.
    #[must_use]
    pub fn new(
        config: LoadConfig,
        transport: Arc<dyn Transport>,
        metrics: Arc<MetricsAggregator>,
    ) -> Self {
        Self {
            config,
            transport,
            metrics,
        }
    }

    /// The shared aggregator, for snapshots.
    #[must_use]
    pub fn metrics(&self) -> &Arc<MetricsAggregator> {
        &self.metrics
    }

    /// Runs one complete iteration of the workflow.
    ///
    /// `stop` is the graceful-drain flag: the in-flight step always
    /// completes and records its outcome, then the iteration ends at the
    /// next step boundary.
    pub async fn run_iteration(&self, ctx: &ClientContext, stop: &AtomicBool) {
        let user_id = reviewer_pool_slot(ctx.client_index, self.config.target.user_pool_size);

        // 1. Health probe.
        self.step(Endpoint::Health, Method::Get, "/health".to_string(), None)
            .await;
        if !self.pace(Endpoint::Health, stop).await {
            return;
        }

        // 2. Team fetch.
        self.step(
            Endpoint::TeamGet,
            Method::Get,
            format!("/team/get?team_name={}", self.config.target.team_name),
            None,
        )
        .await;
        if !self.pace(Endpoint::TeamGet, stop).await {
            return;
        }

        // 3. Reviews assigned to the pool user.
        self.step(
            Endpoint::UserGetReview,
            Method::Get,
            format!("/users/getReview?user_id={user_id}"),
            None,
        )
        .await;
        if !self.pace(Endpoint::UserGetReview, stop).await {
            return;
        }

        // 4. Team creation with a unique name per iteration.
        let team_payload = json!({
            "team_name": format!("load-test-team-{}", ctx.correlation_id),
            "members": [
                {
                    "user_id": format!("lt-{}-1", ctx.correlation_id),
                    "username": format!("LoadTestUser1-{}", ctx.client_index),
                    "is_active": true,
                },
                {
                    "user_id": format!("lt-{}-2", ctx.correlation_id),
                    "username": format!("LoadTestUser2-{}", ctx.client_index),
                    "is_active": true,
                },
                {
                    "user_id": format!("lt-{}-3", ctx.correlation_id),
                    "username": format!("LoadTestUser3-{}", ctx.client_index),
                    "is_active": true,
                },
            ],
        });
        self.step(
            Endpoint::TeamAdd,
            Method::Post,
            "/team/add".to_string(),
            Some(team_payload),
        )
        .await;
        if !self.pace(Endpoint::TeamAdd, stop).await {
            return;
        }

        // 5. PR creation; the response echoes the assigned reviewers.
        let pr_id = format!("pr-load-{}", ctx.correlation_id);
        let pr_payload = json!({
            "pull_request_id": pr_id,
            "pull_request_name": format!("Load Test PR {}", ctx.correlation_id),
            "author_id": user_id,
        });
        let created = self
            .step(
                Endpoint::PrCreate,
                Method::Post,
                "/pullRequest/create".to_string(),
                Some(pr_payload),
            )
            .await;
        if !self.pace(Endpoint::PrCreate, stop).await {
            return;
        }

        if let Some(created) = created.filter(|reply| reply.status == 201) {
            // 6. Reassignment, only when the response names a reviewer.
            // A missing or malformed reviewer list is not a failure; the
            // branch is skipped.
            if let Some(old_reviewer) = first_assigned_reviewer(&created.body) {
                let reassign_payload = json!({
                    "pull_request_id": pr_id,
                    "old_user_id": old_reviewer,
                });
                let reassigned = self
                    .step(
                        Endpoint::PrReassign,
                        Method::Post,
                        "/pullRequest/reassign".to_string(),
                        Some(reassign_payload),
                    )
                    .await;
                if !self.pace(Endpoint::PrReassign, stop).await {
                    return;
                }

                if let Some(reassigned) = reassigned.filter(|reply| reply.status == 200) {
                    if let Some(new_reviewer) = replaced_by(&reassigned.body) {
                        debug!(new_reviewer, "reviewer reassigned");
                    }
                }
            }

            // 7. Merge follows a successful creation regardless of the
            // reassignment branch.
            self.step(
                Endpoint::PrMerge,
                Method::Post,
                "/pullRequest/merge".to_string(),
                Some(json!({ "pull_request_id": pr_id })),
            )
            .await;
            if !self.pace(Endpoint::PrMerge, stop).await {
                return;
            }
        }

        // 8. Toggle the pool user's active flag.
        let active_payload = json!({
            "user_id": user_id,
            "is_active": rand::random::<bool>(),
        });
        self.step(
            Endpoint::UserSetActive,
            Method::Post,
            "/users/setIsActive".to_string(),
            Some(active_payload),
        )
        .await;
        self.pace(Endpoint::UserSetActive, stop).await;
    }

    /// Issues one request, records latency and classified outcome
    /// unconditionally, and returns the reply for branching. `None` marks
    /// a transport-level failure.
    async fn step(
        &self,
        endpoint: Endpoint,
        method: Method,
        path: String,
        body: Option<Value>,
    ) -> Option<StepReply> {
        let url = format!("{}{}", self.config.target.base_url, path);
        let bearer = endpoint
            .requires_auth()
            .then(|| self.config.target.admin_token.as_str());
        let allowed = self.config.allowed_statuses(endpoint);

        match self.transport.issue(method, &url, body, bearer).await {
            Ok(reply) => {
                let ms = reply.duration.as_secs_f64() * 1000.0;
                let outcome = RequestOutcome::classify(endpoint, Some(reply.status), ms, allowed);
                self.metrics.record_latency(endpoint, ms);
                self.metrics.record_outcome(&outcome);
                if !outcome.accepted() {
                    debug!(endpoint = %endpoint, status = reply.status, "request rejected");
                }
                Some(StepReply {
                    status: reply.status,
                    body: reply.body,
                })
            }
            Err(err) => {
                let ms = err.elapsed.as_secs_f64() * 1000.0;
                self.metrics.record_latency(endpoint, ms);
                self.metrics
                    .record_outcome(&RequestOutcome::classify(endpoint, None, ms, allowed));
                warn!(endpoint = %endpoint, error = %err, "transport failure");
                None
            }
        }
    }

    /// Applies the pacing delay for the step just completed. Returns false
    /// when the client has been flagged to stop and no further step may
    /// start.
    async fn pace(&self, endpoint: Endpoint, stop: &AtomicBool) -> bool {
        if stop.load(Ordering::Relaxed) {
            return false;
        }
        tokio::time::sleep(self.config.pacing.delay_for(endpoint)).await;
        !stop.load(Ordering::Relaxed)
    }
}

/// Extracts the first entry of `pr.assigned_reviewers` from a creation
/// response. Absent field, wrong shape or unparseable body all mean
/// "no reviewer"; the caller skips the branch.
fn first_assigned_reviewer(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    let reviewers = value.pointer("/pr/assigned_reviewers")?.as_array()?;
    reviewers.first()?.as_str().map(str::to_owned)
}

/// Extracts `replaced_by` from a reassignment response.
fn replaced_by(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    value.get("replaced_by")?.as_str().map(str::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::time::Duration;

    use crate::transport::{TransportError, TransportReply};

    /// Transport that replays canned responses keyed by path.
    struct ScriptedTransport {
        replies: HashMap<&'static str, (u16, String)>,
        calls: Mutex<Vec<String>>,
        fail_paths: Vec<&'static str>,
    }

    impl ScriptedTransport {
        fn new() -> Self {
            Self {
                replies: HashMap::new(),
                calls: Mutex::new(Vec::new()),
                fail_paths: Vec::new(),
            }
        }

        fn with_reply(mut self, path: &'static str, status: u16, body: &str) -> Self {
            self.replies.insert(path, (status, body.to_string()));
            self
        }

        fn failing_on(mut self, path: &'static str) -> Self {
            self.fail_paths.push(path);
            self
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().clone()
        }

        fn called(&self, fragment: &str) -> bool {
            self.calls().iter().any(|url| url.contains(fragment))
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn issue(
            &self,
            _method: Method,
            url: &str,
            _body: Option<Value>,
            _bearer: Option<&str>,
        ) -> Result<TransportReply, TransportError> {
            self.calls.lock().push(url.to_string());

            if self.fail_paths.iter().any(|path| url.contains(path)) {
                return Err(TransportError {
                    message: "connection refused".to_string(),
                    elapsed: Duration::from_millis(1),
                });
            }

            let (status, body) = self
                .replies
                .iter()
                .find(|(path, _)| url.contains(*path))
                .map(|(_, reply)| reply.clone())
                .unwrap_or((200, "{}".to_string()));

            Ok(TransportReply {
                status,
                body,
                duration: Duration::from_millis(5),
            })
        }
    }

    fn test_config() -> LoadConfig {
        let mut config = LoadConfig::default();
        config.target.admin_token = "test-token".to_string();
        // Keep iterations fast under test.
        config.pacing.read_delay_ms = 0;
        config.pacing.write_delay_ms = 0;
        config
    }

    fn runner(transport: Arc<ScriptedTransport>) -> WorkflowRunner {
        WorkflowRunner::new(
            test_config(),
            transport,
            Arc::new(MetricsAggregator::new()),
        )
    }

    async fn run_once(runner: &WorkflowRunner) {
        let ctx = ClientContext::new(0, 0);
        let stop = AtomicBool::new(false);
        runner.run_iteration(&ctx, &stop).await;
    }

    #[tokio::test]
    async fn test_full_iteration_visits_every_step() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .with_reply(
                    "/pullRequest/create",
                    201,
                    r#"{"pr": {"assigned_reviewers": ["tb7"]}}"#,
                )
                .with_reply("/pullRequest/reassign", 200, r#"{"replaced_by": "tb9"}"#),
        );
        let runner = runner(Arc::clone(&transport));

        run_once(&runner).await;

        let calls = transport.calls();
        assert_eq!(calls.len(), 8);
        assert!(transport.called("/pullRequest/reassign"));
        assert!(transport.called("/pullRequest/merge"));
        assert!(transport.called("/users/setIsActive"));

        let snapshot = runner.metrics().snapshot();
        assert_eq!(snapshot.global.availability_samples, 8);
        assert_eq!(snapshot.global.availability, 1.0);
    }

    #[tokio::test]
    async fn test_conflict_on_reassign_is_soft() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .with_reply(
                    "/pullRequest/create",
                    201,
                    r#"{"pr": {"assigned_reviewers": ["tb7"]}}"#,
                )
                .with_reply("/pullRequest/reassign", 409, r#"{"error": "no candidate"}"#),
        );
        let runner = runner(Arc::clone(&transport));

        run_once(&runner).await;

        let snapshot = runner.metrics().snapshot();
        let reassign = snapshot.endpoint(Endpoint::PrReassign);

        assert_eq!(reassign.errors, 0);
        assert_eq!(reassign.soft_failures, 1);
        assert_eq!(snapshot.global.availability, 1.0);
        // Merge still runs after the soft failure.
        assert!(transport.called("/pullRequest/merge"));
    }

    #[tokio::test]
    async fn test_missing_reviewers_skips_reassignment() {
        let transport = Arc::new(
            ScriptedTransport::new().with_reply("/pullRequest/create", 201, r#"{"pr": {}}"#),
        );
        let runner = runner(Arc::clone(&transport));

        run_once(&runner).await;

        assert!(!transport.called("/pullRequest/reassign"));
        // Creation succeeded, so the merge is unconditional.
        assert!(transport.called("/pullRequest/merge"));
        assert!(transport.called("/users/setIsActive"));
    }

    #[tokio::test]
    async fn test_failed_creation_skips_pr_branch_only() {
        let transport = Arc::new(
            ScriptedTransport::new().with_reply("/pullRequest/create", 500, "{}"),
        );
        let runner = runner(Arc::clone(&transport));

        run_once(&runner).await;

        assert!(!transport.called("/pullRequest/reassign"));
        assert!(!transport.called("/pullRequest/merge"));
        // The final step is outside the branch and still executes.
        assert!(transport.called("/users/setIsActive"));

        let snapshot = runner.metrics().snapshot();
        assert_eq!(snapshot.endpoint(Endpoint::PrCreate).errors, 1);
        assert!(snapshot.global.error_rate > 0.0);
    }

    #[tokio::test]
    async fn test_transport_failure_does_not_abort_iteration() {
        let transport = Arc::new(ScriptedTransport::new().failing_on("/team/add"));
        let runner = runner(Arc::clone(&transport));

        run_once(&runner).await;

        assert!(transport.called("/pullRequest/create"));
        assert!(transport.called("/users/setIsActive"));

        let snapshot = runner.metrics().snapshot();
        assert_eq!(snapshot.endpoint(Endpoint::TeamAdd).errors, 1);
        // The failed attempt still produced a latency sample.
        assert_eq!(snapshot.endpoint(Endpoint::TeamAdd).requests, 1);
        assert_eq!(
            snapshot.global.error_rate_samples,
            snapshot.global.availability_samples
        );
    }

    #[tokio::test]
    async fn test_stop_flag_ends_iteration_at_step_boundary() {
        let transport = Arc::new(ScriptedTransport::new());
        let runner = runner(Arc::clone(&transport));

        let ctx = ClientContext::new(0, 0);
        let stop = AtomicBool::new(true);
        runner.run_iteration(&ctx, &stop).await;

        // The in-flight step completed and recorded; nothing followed.
        assert_eq!(transport.calls().len(), 1);
        assert_eq!(runner.metrics().snapshot().global.availability_samples, 1);
    }

    #[tokio::test]
    async fn test_user_id_derived_from_pool() {
        let transport = Arc::new(ScriptedTransport::new());
        let runner = runner(Arc::clone(&transport));

        let ctx = ClientContext::new(20, 0); // 20 % 18 + 1 = tb3
        let stop = AtomicBool::new(false);
        runner.run_iteration(&ctx, &stop).await;

        assert!(transport.called("user_id=tb3"));
    }

    #[test]
    fn test_reviewer_extraction() {
        assert_eq!(
            first_assigned_reviewer(r#"{"pr": {"assigned_reviewers": ["tb1", "tb2"]}}"#),
            Some("tb1".to_string())
        );
        assert_eq!(
            first_assigned_reviewer(r#"{"pr": {"assigned_reviewers": []}}"#),
            None
        );
        assert_eq!(first_assigned_reviewer(r#"{"pr": {}}"#), None);
        assert_eq!(first_assigned_reviewer("not json"), None);
    }

    #[test]
    fn test_replaced_by_extraction() {
        assert_eq!(
            replaced_by(r#"{"replaced_by": "tb4"}"#),
            Some("tb4".to_string())
        );
        assert_eq!(replaced_by("{}"), None);
        assert_eq!(replaced_by("garbage"), None);
    }

    #[test]
    fn test_correlation_id_shape() {
        let ctx = ClientContext::new(3, 7);
        let parts: Vec<&str> = ctx.correlation_id.split('-').collect();
        assert_eq!(parts[0], "3");
        assert_eq!(parts[1], "7");
        assert!(parts[2].parse::<i64>().is_ok());
    }
}
