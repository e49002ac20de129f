use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use slocheck_core::{evaluate, LoadConfig};
use slocheck_engine::{
    HttpTransport, MetricsAggregator, RampScheduler, ReportFormat, RunReport, WorkflowRunner,
};

#[derive(Parser, Debug)]
#[command(name = "slocheck")]
#[command(about = "Scripted workflow load generator with SLI verdicts", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the load test and evaluate the SLI thresholds
    Run {
        /// Configuration file (YAML); standard sources are used if omitted
        #[arg(long)]
        config: Option<PathBuf>,

        /// Base URL of the service under test
        #[arg(long, env = "SLOCHECK_BASE_URL")]
        base_url: Option<String>,

        /// Bearer credential for authenticated requests
        #[arg(long, env = "SLOCHECK_ADMIN_TOKEN")]
        token: Option<String>,

        /// Report file path (overrides the configured path)
        #[arg(long)]
        report: Option<PathBuf>,

        /// Report format: markdown or json
        #[arg(long)]
        format: Option<String>,
    },

    /// Load and validate the configuration, then print the resolved plan
    CheckConfig {
        /// Configuration file (YAML); standard sources are used if omitted
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Generate a configuration file template
    GenerateConfig {
        /// Output configuration file path
        #[arg(long, default_value = "slocheck.yaml")]
        output: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    init_logging();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            base_url,
            token,
            report,
            format,
        } => {
            let mut load_config = resolve_config(config)?;
            if let Some(base_url) = base_url {
                load_config.target.base_url = base_url;
            }
            if let Some(token) = token {
                load_config.target.admin_token = token;
            }
            if let Some(report) = &report {
                load_config.report.path = Some(report.display().to_string());
            }
            if let Some(format) = format {
                load_config.report.format = format;
            }
            load_config.validate()?;

            run_load_test(load_config).await
        }

        Commands::CheckConfig { config } => {
            let load_config = resolve_config(config)?;
            load_config.validate()?;

            let plan = load_config.ramp_plan()?;
            let thresholds = load_config.sli_thresholds()?;

            println!("✅ Configuration is valid");
            println!("  Target: {}", load_config.target.base_url);
            println!(
                "  Stages: {} ({}s total)",
                plan.stages().len(),
                plan.total_duration().as_secs()
            );
            println!("  Thresholds:");
            for threshold in &thresholds {
                println!("    - {}", threshold);
            }

            Ok(())
        }

        Commands::GenerateConfig { output } => {
            println!("📝 Generating configuration template...");

            let template = r#"# slocheck load test configuration

target:
  base_url: http://localhost:8080
  # Prefer SLOCHECK_TARGET__ADMIN_TOKEN over committing a credential here.
  admin_token: ""
  team_name: test_backend
  user_pool_size: 18

schedule:
  poll_interval_ms: 250
  stages:
    - duration_secs: 5
      target: 100
      policy: linear
    - duration_secs: 60
      target: 100
      policy: step
    - duration_secs: 5
      target: 0
      policy: linear

pacing:
  read_delay_ms: 100
  write_delay_ms: 200

transport:
  request_timeout_ms: 10000

# Soft status codes per endpoint: a conflict on reassignment means
# "no eligible candidate" and is a correct outcome.
allowlist:
  pr_reassign: [409]

thresholds:
  - metric: availability
    predicate: "rate>0.999"
  - metric: error_rate
    predicate: "rate<0.001"
  - metric: latency_p95
    predicate: "p(95)<300"
  - metric: latency_p99
    predicate: "p(99)<500"

report:
  # path: slocheck-report.md
  format: markdown
"#;

            std::fs::write(&output, template)?;
            println!("✅ Configuration template written to: {}", output);
            println!("\nEdit the file and use it with:");
            println!("  slocheck run --config {}", output);

            Ok(())
        }
    }
}

/// Run the load test and render the verdict.
async fn run_load_test(config: LoadConfig) -> Result<(), Box<dyn std::error::Error>> {
    let plan = config.ramp_plan()?;
    let thresholds = config.sli_thresholds()?;
    let report_path = config.report.path.clone();
    let report_format = ReportFormat::parse(&config.report.format)?;
    let poll_interval = config.schedule.poll_interval();

    println!("🚀 Starting load test");
    println!("  Target: {}", config.target.base_url);
    println!(
        "  Stages: {} ({}s total)",
        plan.stages().len(),
        plan.total_duration().as_secs()
    );
    println!("  Thresholds: {}", thresholds.len());
    println!();

    let transport = Arc::new(HttpTransport::new(config.transport.request_timeout())?);
    let runner = Arc::new(WorkflowRunner::new(
        config,
        transport,
        Arc::new(MetricsAggregator::new()),
    ));
    let scheduler = RampScheduler::new(plan, poll_interval, runner);

    let started_at = Utc::now();
    let started = Instant::now();
    let snapshot = scheduler.run().await;
    let duration = started.elapsed();

    let verdict = evaluate(&snapshot.global, &thresholds);
    let report = RunReport::new(snapshot, verdict, started_at, duration);

    let snapshot = report.snapshot();
    println!("\n📊 Results");
    println!("  Requests: {}", snapshot.global.requests);
    println!(
        "  Availability: {:.4}%",
        snapshot.global.availability * 100.0
    );
    println!("  Error rate: {:.4}%", snapshot.global.error_rate * 100.0);
    println!("  P95 latency: {:.2}ms", snapshot.global.p95_ms);
    println!("  P99 latency: {:.2}ms", snapshot.global.p99_ms);
    println!("\nSLI verdict:");
    for outcome in &report.verdict().outcomes {
        let marker = if outcome.passed { "✅" } else { "❌" };
        println!(
            "  {} {}{} (observed {:.4})",
            marker, outcome.metric, outcome.predicate, outcome.observed
        );
    }

    if let Some(path) = report_path {
        report.write_report(&path, report_format)?;
        info!("report written to {}", path);
    }

    if report.passes() {
        println!("\n✅ All SLI thresholds passed");
        Ok(())
    } else {
        println!("\n❌ SLI thresholds violated:");
        println!("{}", report.failure_summary());
        std::process::exit(1);
    }
}

/// Load configuration from an explicit file or the standard sources.
fn resolve_config(path: Option<PathBuf>) -> Result<LoadConfig, Box<dyn std::error::Error>> {
    let config = match path {
        Some(path) => LoadConfig::from_file(path)?,
        None => LoadConfig::load_unchecked()?,
    };
    Ok(config)
}

fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(env_filter).with_target(false).init();
}
