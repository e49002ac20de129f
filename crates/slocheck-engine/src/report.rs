//! Report generation for completed runs.

use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use slocheck_core::{CoreError, CoreResult, Verdict};
use uuid::Uuid;

use crate::metrics::RunSnapshot;

/// Report format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Markdown,
    Json,
}

impl ReportFormat {
    /// Parses the configured format name.
    pub fn parse(name: &str) -> CoreResult<Self> {
        match name {
            "markdown" => Ok(Self::Markdown),
            "json" => Ok(Self::Json),
            other => Err(CoreError::invalid_config(format!(
                "unknown report format '{other}'"
            ))),
        }
    }
}

/// Structured report over a final snapshot and its verdict.
pub struct RunReport {
    run_id: String,
    started_at: DateTime<Utc>,
    duration: Duration,
    snapshot: RunSnapshot,
    verdict: Verdict,
}

impl RunReport {
    /// Builds a report with a fresh run id.
    #[must_use]
    pub fn new(
        snapshot: RunSnapshot,
        verdict: Verdict,
        started_at: DateTime<Utc>,
        duration: Duration,
    ) -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            started_at,
            duration,
            snapshot,
            verdict,
        }
    }

    /// Whether every declared threshold passed.
    #[must_use]
    pub fn passes(&self) -> bool {
        self.verdict.passed()
    }

    /// The verdict backing this report.
    #[must_use]
    pub fn verdict(&self) -> &Verdict {
        &self.verdict
    }

    /// The final snapshot backing this report.
    #[must_use]
    pub fn snapshot(&self) -> &RunSnapshot {
        &self.snapshot
    }

    /// One line per failed threshold, empty string when all passed.
    #[must_use]
    pub fn failure_summary(&self) -> String {
        self.verdict
            .failures()
            .iter()
            .map(|outcome| {
                format!(
                    "{} {} failed (observed {:.4})",
                    outcome.metric, outcome.predicate, outcome.observed
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Write the report to a file in the given format.
    pub fn write_report(&self, path: impl AsRef<Path>, format: ReportFormat) -> CoreResult<()> {
        let content = self.render(format);
        let mut file = File::create(path)?;
        file.write_all(content.as_bytes())?;
        Ok(())
    }

    /// Render the report to a string.
    #[must_use]
    pub fn render(&self, format: ReportFormat) -> String {
        match format {
            ReportFormat::Markdown => self.generate_markdown(),
            ReportFormat::Json => self.generate_json(),
        }
    }

    fn generate_markdown(&self) -> String {
        let global = &self.snapshot.global;
        let status = if self.passes() {
            "✅ PASSED"
        } else {
            "❌ FAILED"
        };

        let mut endpoint_rows = String::new();
        for endpoint in &self.snapshot.endpoints {
            endpoint_rows.push_str(&format!(
                "| {} | {} | {} | {} | {:.2}ms | {:.2}ms |\n",
                endpoint.endpoint,
                endpoint.requests,
                endpoint.errors,
                endpoint.soft_failures,
                endpoint.p95_ms,
                endpoint.max_ms
            ));
        }

        let mut verdict_lines = String::new();
        for outcome in &self.verdict.outcomes {
            verdict_lines.push_str(&format!(
                "- {} `{}{}` (observed {:.4})\n",
                if outcome.passed { "✅" } else { "❌" },
                outcome.metric,
                outcome.predicate,
                outcome.observed
            ));
        }

        format!(
            r#"# Load Test Report: {run_id}

**Status**: {status}

---

## Summary

- **Started**: {started}
- **Duration**: {duration:.1} seconds
- **Requests**: {requests}
- **Availability**: {availability:.4}%
- **Error Rate**: {error_rate:.4}%

---

## Latency

| Percentile | Latency |
|------------|---------|
| P95 | {p95:.2}ms |
| P99 | {p99:.2}ms |

---

## Endpoints

| Endpoint | Requests | Errors | Soft Failures | P95 | Max |
|----------|----------|--------|---------------|-----|-----|
{endpoint_rows}
---

## SLI Verdict

{verdict_lines}
---

**Report Generated**: {generated}
"#,
            run_id = self.run_id,
            status = status,
            started = self.started_at.format("%Y-%m-%d %H:%M:%S UTC"),
            duration = self.duration.as_secs_f64(),
            requests = global.requests,
            availability = global.availability * 100.0,
            error_rate = global.error_rate * 100.0,
            p95 = global.p95_ms,
            p99 = global.p99_ms,
            endpoint_rows = endpoint_rows,
            verdict_lines = verdict_lines,
            generated = Utc::now().format("%Y-%m-%d %H:%M:%S UTC"),
        )
    }

    fn generate_json(&self) -> String {
        serde_json::json!({
            "run_id": self.run_id,
            "status": if self.passes() { "passed" } else { "failed" },
            "started_at": self.started_at.to_rfc3339(),
            "duration_seconds": self.duration.as_secs_f64(),
            "global": self.snapshot.global,
            "endpoints": self.snapshot.endpoints,
            "verdict": {
                "passed": self.passes(),
                "thresholds": self.verdict.outcomes,
            },
        })
        .to_string()
    }
}
