//! BudgetWatch CLI
//!
//! Command-line interface for budget threshold monitoring.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context};
use budgetwatch::alerting::{template, CheckOutcome, Monitor, NotificationHistory};
use budgetwatch::config::LoggingConfig;
use budgetwatch::models::{AlertKind, Budget, Category, RecommendationKind};
use budgetwatch::source::JsonFileSource;
use budgetwatch::{storage, Config};
use chrono::Utc;
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// BudgetWatch - Budget threshold alerts
#[derive(Parser)]
#[command(name = "budgetwatch")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, env = "BUDGETWATCH_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format (for commands that support it)
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
enum KindArg {
    Warning,
    Overrun,
    ReduceSpending,
    CategoryReallocation,
    SavingsOpportunity,
}

impl From<KindArg> for AlertKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Warning => AlertKind::Warning,
            KindArg::Overrun => AlertKind::Overrun,
            KindArg::ReduceSpending => AlertKind::Recommendation(RecommendationKind::ReduceSpending),
            KindArg::CategoryReallocation => {
                AlertKind::Recommendation(RecommendationKind::CategoryReallocation)
            }
            KindArg::SavingsOpportunity => {
                AlertKind::Recommendation(RecommendationKind::SavingsOpportunity)
            }
        }
    }
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
enum RecommendationArg {
    ReduceSpending,
    CategoryReallocation,
    SavingsOpportunity,
}

impl From<RecommendationArg> for RecommendationKind {
    fn from(kind: RecommendationArg) -> Self {
        match kind {
            RecommendationArg::ReduceSpending => RecommendationKind::ReduceSpending,
            RecommendationArg::CategoryReallocation => RecommendationKind::CategoryReallocation,
            RecommendationArg::SavingsOpportunity => RecommendationKind::SavingsOpportunity,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Start monitoring every budget in a file and check each once
    Check {
        /// JSON file containing an array of budgets
        #[arg(long)]
        budgets: PathBuf,
    },

    /// Check budgets periodically until interrupted
    Watch {
        /// JSON file containing an array of budgets, re-read every sweep
        #[arg(long)]
        budgets: PathBuf,

        /// Time between sweeps (e.g., "30s", "5m"); defaults to the configured interval
        #[arg(long, value_parser = humantime::parse_duration)]
        interval: Option<Duration>,
    },

    /// Render a notification for a budget without sending it
    Preview {
        /// JSON file containing an array of budgets
        #[arg(long)]
        budgets: PathBuf,

        /// Budget ID
        #[arg(long)]
        id: String,

        /// Notification kind
        #[arg(long, value_enum)]
        kind: KindArg,
    },

    /// Schedule a spending recommendation for a budget
    Recommend {
        /// JSON file containing an array of budgets
        #[arg(long)]
        budgets: PathBuf,

        /// Budget ID
        #[arg(long)]
        id: String,

        /// Recommendation kind
        #[arg(long, value_enum)]
        kind: RecommendationArg,
    },

    /// Inspect the notification history
    History {
        #[command(subcommand)]
        command: HistoryCommands,
    },

    /// List budget categories
    Categories,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand)]
enum HistoryCommands {
    /// List recorded notifications, most recent first
    List,

    /// Drop old entries
    Prune {
        /// Maximum age to keep; defaults to the configured max age
        #[arg(long, value_parser = humantime::parse_duration)]
        older_than: Option<Duration>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    init_logging(&config.logging, cli.verbose);

    // Execute command
    let result = match cli.command {
        Commands::Check { budgets } => run_check(&config, &budgets, cli.format).await,
        Commands::Watch { budgets, interval } => run_watch(&config, budgets, interval).await,
        Commands::Preview { budgets, id, kind } => {
            run_preview(&budgets, &id, kind.into(), cli.format).await
        }
        Commands::Recommend { budgets, id, kind } => {
            run_recommend(&config, &budgets, &id, kind.into(), cli.format).await
        }
        Commands::History { command } => run_history(&config, command, cli.format).await,
        Commands::Categories => run_categories(cli.format),
        Commands::Completions { shell } => {
            generate_completions(shell);
            Ok(())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(config: &LoggingConfig, verbose: bool) {
    let log_level = if verbose { "debug" } else { config.level.as_str() };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if config.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn load_budget(path: &Path, id: &str) -> anyhow::Result<Budget> {
    let budgets = JsonFileSource::new(path)
        .load_all()
        .await
        .with_context(|| format!("reading budgets from {}", path.display()))?;

    budgets
        .into_iter()
        .find(|b| b.id == id)
        .ok_or_else(|| anyhow!("budget {id} not found in {}", path.display()))
}

fn print_json(value: &serde_json::Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run_check(config: &Config, path: &Path, format: OutputFormat) -> anyhow::Result<()> {
    let budgets = JsonFileSource::new(path)
        .load_all()
        .await
        .with_context(|| format!("reading budgets from {}", path.display()))?;
    let monitor = Monitor::from_config(config).await?;

    info!(count = budgets.len(), "Checking budgets");

    let mut results = Vec::with_capacity(budgets.len());
    let mut failed = 0usize;

    for budget in &budgets {
        match monitor.start_monitoring(budget).await {
            Ok(CheckOutcome::Evaluated(report)) => {
                if format == OutputFormat::Text {
                    println!(
                        "{} {} ({:.0}% of {:.2})",
                        budget.category.icon(),
                        budget.id,
                        budget.utilization_percent(),
                        budget.monthly_limit
                    );
                    for alert in &report.scheduled {
                        println!("   🔔 {}: {}", alert.kind, alert.rendered.title);
                    }
                    for kind in &report.suppressed {
                        println!("   💤 {kind}: sent recently");
                    }
                    for failure in &report.failures {
                        println!("   ❌ {}: {}", failure.kind, failure.error);
                    }
                }
                failed += report.failures.len();
                results.push(json!({
                    "budget_id": budget.id,
                    "fired": report.fired,
                    "scheduled": report.scheduled,
                    "suppressed": report.suppressed,
                    "failures": report
                        .failures
                        .iter()
                        .map(|f| json!({ "kind": f.kind, "error": f.error.to_string() }))
                        .collect::<Vec<_>>(),
                }));
            }
            Ok(outcome) => {
                warn!(budget_id = %budget.id, ?outcome, "Budget was not evaluated");
                results.push(json!({ "budget_id": budget.id, "skipped": true }));
            }
            Err(e) => {
                failed += 1;
                if format == OutputFormat::Text {
                    println!("❌ {}: {e}", budget.id);
                }
                results.push(json!({ "budget_id": budget.id, "error": e.to_string() }));
            }
        }
    }

    if format == OutputFormat::Json {
        print_json(&json!(results))?;
    }

    if failed > 0 {
        return Err(anyhow!("{failed} alert(s) could not be scheduled"));
    }
    Ok(())
}

async fn run_watch(config: &Config, path: PathBuf, interval: Option<Duration>) -> anyhow::Result<()> {
    let every = interval.unwrap_or(config.monitor.check_interval);
    let source = JsonFileSource::new(path);
    let budgets = source
        .load_all()
        .await
        .with_context(|| format!("reading budgets from {}", source.path().display()))?;

    let monitor = Monitor::from_config(config).await?;
    for budget in &budgets {
        if let Err(e) = monitor.start_monitoring(budget).await {
            warn!(budget_id = %budget.id, error = %e, "Initial check failed");
        }
    }

    println!(
        "👀 Watching {} budget(s) every {}",
        budgets.len(),
        humantime::format_duration(every)
    );
    println!("Press Ctrl+C to stop");

    monitor
        .run(Arc::new(source), every, async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await;

    println!("\nShutting down...");
    Ok(())
}

async fn run_preview(path: &Path, id: &str, kind: AlertKind, format: OutputFormat) -> anyhow::Result<()> {
    let budget = load_budget(path, id).await?;
    let notification = template::template_for(&budget, kind);
    let errors = template::validation_errors(&notification);
    let rendered = template::render(&notification);
    let identifier = template::generate_identifier(&notification);

    match format {
        OutputFormat::Json => print_json(&json!({
            "identifier": identifier,
            "kind": kind,
            "title": rendered.title,
            "body": rendered.body,
            "timing": notification.timing,
            "errors": errors,
        }))?,
        OutputFormat::Text => {
            println!("{}", rendered.title);
            println!("{}", rendered.body);
            println!();
            println!("id:     {identifier}");
            println!("timing: {:?}", notification.timing.trigger);
            for error in &errors {
                println!("⚠️  {error}");
            }
        }
    }

    Ok(())
}

async fn run_recommend(
    config: &Config,
    path: &Path,
    id: &str,
    kind: RecommendationKind,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let budget = load_budget(path, id).await?;
    let monitor = Monitor::from_config(config).await?;
    let scheduled = monitor.send_recommendation(&budget, kind).await?;

    match (format, scheduled) {
        (OutputFormat::Json, scheduled) => print_json(&json!({
            "budget_id": budget.id,
            "scheduled": scheduled,
        }))?,
        (OutputFormat::Text, Some(alert)) => {
            println!("💡 Scheduled {} ({})", alert.rendered.title, alert.notification_id);
        }
        (OutputFormat::Text, None) => {
            println!("No recommendation scheduled for {}", budget.id);
        }
    }

    Ok(())
}

async fn run_history(config: &Config, command: HistoryCommands, format: OutputFormat) -> anyhow::Result<()> {
    let store = storage::open(&config.history).await?;
    let history = NotificationHistory::new(store, &config.history);
    history.reload().await;
    let now = Utc::now();

    match command {
        HistoryCommands::List => {
            let entries = history.entries().await;

            if format == OutputFormat::Json {
                return print_json(&json!(entries));
            }
            if entries.is_empty() {
                println!("No notifications recorded");
            }
            for entry in entries {
                let age = (now - entry.sent_at).to_std().unwrap_or_default();
                let age = Duration::from_secs(age.as_secs());
                println!(
                    "{:<24} {:<40} {} ({} ago)",
                    entry.budget_id,
                    entry.kind.to_string(),
                    entry.sent_at.to_rfc3339(),
                    humantime::format_duration(age)
                );
            }
        }
        HistoryCommands::Prune { older_than } => {
            let max_age = older_than.unwrap_or(config.history.max_age);
            let removed = history.prune(now, max_age).await;

            match format {
                OutputFormat::Json => print_json(&json!({ "removed": removed }))?,
                OutputFormat::Text => println!(
                    "🧹 Removed {removed} entr{} older than {}",
                    if removed == 1 { "y" } else { "ies" },
                    humantime::format_duration(max_age)
                ),
            }
        }
    }

    Ok(())
}

fn run_categories(format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => {
            let categories: Vec<_> = Category::ALL
                .iter()
                .map(|c| json!({ "key": c, "name": c.display_name(), "icon": c.icon() }))
                .collect();
            print_json(&json!(categories))?;
        }
        OutputFormat::Text => {
            for category in Category::ALL {
                println!("{} {}", category.icon(), category.display_name());
            }
        }
    }
    Ok(())
}

fn generate_completions(shell: clap_complete::Shell) {
    use clap::CommandFactory;
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "budgetwatch", &mut std::io::stdout());
}
