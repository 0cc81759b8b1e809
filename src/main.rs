//! Costpilot - Cloud Cost Optimization Pipeline
//!
//! A CLI tool that scans an Azure subscription's resources, analyzes
//! their monthly cost, generates optimization recommendations, and
//! renders reports.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Configuration or runtime error

mod analysis;
mod cli;
mod config;
mod models;
mod persistence;
mod pipeline;
mod report;
mod session;
mod stages;

use anyhow::{Context, Result};
use cli::{Args, Command, ReportFormat};
use config::Config;
use models::StageKind;
use pipeline::Pipeline;
use session::SessionContext;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle init-config early (no logging needed)
    if matches!(args.command, Command::InitConfig) {
        return handle_init_config();
    }

    // Initialize logging
    init_logging(&args);

    info!("Costpilot v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run(args).await {
        Ok(()) => Ok(()),
        Err(e) => {
            error!("Run failed: {}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle init-config: generate a default .costpilot.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(".costpilot.toml");

    if path.exists() {
        eprintln!("⚠️  .costpilot.toml already exists. Remove it first or edit it manually.");
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).context("Failed to write .costpilot.toml")?;

    println!("✅ Created .costpilot.toml with default settings.");
    println!("   Edit it to set your subscription and tenant ids.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Dispatch the selected command. Returns Err only for fatal failures.
async fn run(args: Args) -> Result<()> {
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    // Account validation is fatal before any stage executes.
    config.validate()?;

    match args.command.clone() {
        Command::Scan { output } => run_scan(&config, output).await,
        Command::Analyze { output } => run_analyze(&config, output).await,
        Command::Optimize { output } => run_optimize(&config, output).await,
        Command::RunAll { output, out_dir } => run_all(&config, output, out_dir).await,
        Command::Report {
            session,
            format,
            out_dir,
        } => run_report(&config, session, format, out_dir).await,
        Command::Status => show_status(&config),
        Command::ShowConfig => show_config(&config),
        Command::InitConfig => handle_init_config(),
    }
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from .costpilot.toml");
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}

/// Create a fresh session for the configured account scope.
fn new_session(config: &Config) -> SessionContext {
    SessionContext::new(
        config.account.subscription_id.clone(),
        config.account.tenant_id.clone(),
    )
}

fn print_session_header(ctx: &SessionContext) {
    println!("📋 Session ID: {}", ctx.session_id());
    println!("🔑 Subscription: {}", ctx.subscription_id());
    println!("🏢 Tenant: {}", ctx.tenant_id());
}

/// Run the pipeline up to and including `target` on a fresh session.
async fn run_pipeline(config: &Config, target: StageKind, message: &str) -> SessionContext {
    let ctx = new_session(config);
    print_session_header(&ctx);

    let spinner = indicatif::ProgressBar::new_spinner().with_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(120));

    let pipeline = Pipeline::new(stages::stages_through(target, config));
    let ctx = pipeline.run(ctx).await;

    spinner.finish_and_clear();
    ctx
}

async fn run_scan(config: &Config, output: Option<PathBuf>) -> Result<()> {
    println!("🔍 Starting resource scan...");

    let ctx = run_pipeline(config, StageKind::Scan, "scanning resources").await;

    if let Some(scan) = ctx.latest_scan() {
        println!("\n✅ Scan completed successfully!");
        println!("   📊 Resources found: {}", scan.resources_found);
        println!(
            "   ⏱️  Duration: {}",
            format_duration(scan.scan_duration_seconds)
        );

        let distribution = analysis::resource_distribution(&ctx);
        if !distribution.is_empty() {
            println!("\n📋 Resource Breakdown:");
            for (kind, count) in &distribution {
                println!("   {}: {}", kind, count);
            }
        }
    } else {
        println!("\n❌ Scan failed. See diagnostics below.");
    }

    finish_command(&ctx, output)
}

async fn run_analyze(config: &Config, output: Option<PathBuf>) -> Result<()> {
    println!("💰 Starting cost analysis...");

    let ctx = run_pipeline(config, StageKind::Analyze, "scanning and analyzing").await;

    if let Some(scan) = ctx.latest_scan() {
        println!("\n✅ Found {} resources", scan.resources_found);
    }

    if let Some(latest) = ctx.latest_analysis() {
        println!("\n✅ Cost analysis completed successfully!");
        println!(
            "   💰 Total cost: {}",
            format_currency(latest.total_cost_usd)
        );
        println!(
            "   ⏱️  Duration: {}",
            format_duration(latest.analysis_duration_seconds)
        );

        if !latest.cost_breakdown.is_empty() {
            println!("\n💰 Cost Breakdown:");
            for (kind, cost) in &latest.cost_breakdown {
                println!("   {}: {}", kind, format_currency(*cost));
            }
        }

        if !latest.high_cost_resources.is_empty() {
            println!("\n💸 High-Cost Resources (>$100/month):");
            for entry in latest.high_cost_resources.iter().take(5) {
                println!(
                    "   {}: {}",
                    entry.resource_name,
                    format_currency(entry.cost_usd)
                );
            }
        }

        if !latest.cost_anomalies.is_empty() {
            println!("\n⚠️  Cost Anomalies:");
            for anomaly in &latest.cost_anomalies {
                println!(
                    "   {}: {} - {}",
                    anomaly.resource_name,
                    format_currency(anomaly.cost_usd),
                    anomaly.reason
                );
            }
        }
    } else {
        println!("\n❌ No cost analysis produced. See diagnostics below.");
    }

    finish_command(&ctx, output)
}

async fn run_optimize(config: &Config, output: Option<PathBuf>) -> Result<()> {
    println!("🎯 Starting cost optimization analysis...");

    let ctx = run_pipeline(config, StageKind::Optimize, "running optimization pipeline").await;

    if ctx.latest_analysis().is_none() {
        println!("\n❌ Prerequisite stages failed. See diagnostics below.");
        return finish_command(&ctx, output);
    }

    if ctx.recommendations().is_empty() {
        println!("\n✅ Optimization analysis completed!");
        println!("   💡 No optimization opportunities found");
        println!("   💰 Your resources are already well-optimized!");
    } else {
        println!("\n✅ Optimization analysis completed successfully!");
        println!(
            "   💡 Recommendations generated: {}",
            ctx.recommendations().len()
        );
        println!(
            "   💰 Total potential savings: {}/month",
            format_currency(analysis::total_savings_potential(&ctx))
        );

        println!("\n💡 Top Optimization Recommendations:");
        for (i, rec) in analysis::top_recommendations(&ctx, 5).iter().enumerate() {
            println!("\n   {}. {}", i + 1, rec.title);
            println!(
                "      💰 Potential savings: {}/month",
                format_currency(rec.estimated_savings_usd)
            );
            println!("      {} Priority: {}", rec.priority.emoji(), rec.priority);
            println!("      🔧 Effort: {}", rec.implementation_effort);
            println!("      📝 {}", rec.description);

            if !rec.implementation_steps.is_empty() {
                println!("      📋 Steps:");
                for step in rec.implementation_steps.iter().take(3) {
                    println!("         {}", step);
                }
                if rec.implementation_steps.len() > 3 {
                    println!(
                        "         ... and {} more steps",
                        rec.implementation_steps.len() - 3
                    );
                }
            }
        }

        let high_priority = analysis::high_priority_recommendations(&ctx);
        if !high_priority.is_empty() {
            println!(
                "\n🚨 High Priority Recommendations ({}):",
                high_priority.len()
            );
            for rec in high_priority.iter().take(3) {
                println!(
                    "   • {}: {} savings",
                    rec.title,
                    format_currency(rec.estimated_savings_usd)
                );
            }
        }
    }

    finish_command(&ctx, output)
}

async fn run_all(
    config: &Config,
    output: Option<PathBuf>,
    out_dir: Option<PathBuf>,
) -> Result<()> {
    println!("🚀 Starting Complete Cost Analysis...");
    println!("{}", "=".repeat(50));

    let mut ctx = new_session(config);
    print_session_header(&ctx);

    let stage_list = stages::stages_through(StageKind::Report, config);
    let total = stage_list.len();

    for (i, stage) in stage_list.into_iter().enumerate() {
        let kind = stage.kind();

        if !pipeline::precondition_met(kind, &ctx) {
            println!("\n❌ {} stage skipped: prerequisite data missing", kind);
            break;
        }

        let (icon, label) = stage_banner(kind);
        println!("\n{} Step {}/{}: {}...", icon, i + 1, total, label);
        ctx = stage.run(ctx).await;
    }

    println!("\n🎉 Complete Cost Analysis Finished!");
    println!("{}", "=".repeat(50));
    if let Some(scan) = ctx.latest_scan() {
        println!("📊 Resources analyzed: {}", scan.resources_found);
    }
    if let Some(latest) = ctx.latest_analysis() {
        println!(
            "💰 Total monthly cost: {}",
            format_currency(latest.total_cost_usd)
        );
    }
    println!("💡 Recommendations: {}", ctx.recommendations().len());
    println!(
        "🎯 Potential savings: {}/month",
        format_currency(analysis::total_savings_potential(&ctx))
    );

    if !ctx.reports().is_empty() {
        let dir = out_dir.unwrap_or_else(|| PathBuf::from(&config.output.dir));
        let written = write_report_files(&ctx, &dir, ReportFormat::All)?;
        println!("📁 Reports saved to: {}/{}/", dir.display(), ctx.session_id());
        debug!("wrote {} report files", written.len());
    }

    finish_command(&ctx, output)
}

async fn run_report(
    config: &Config,
    session: Option<PathBuf>,
    format: ReportFormat,
    out_dir: Option<PathBuf>,
) -> Result<()> {
    println!("📊 Starting report generation...");

    let Some(session_path) = session else {
        println!("⚠️  No session data given. Pass --session with a context saved by a");
        println!("   previous command, e.g. 'costpilot optimize --output session.json'.");
        println!("💡 Tip: run 'costpilot run-all' to perform a complete analysis.");
        return Ok(());
    };

    // Malformed session files fail hard, naming the offending field.
    let ctx = persistence::load_session(&session_path)
        .with_context(|| format!("cannot load session from {}", session_path.display()))?;
    println!("📋 Loaded session: {}", ctx.session_id());

    let ctx = Pipeline::new(vec![Box::new(stages::ReporterStage::new())])
        .run(ctx)
        .await;

    if ctx.reports().is_empty() {
        println!("\n⚠️  Nothing to report: the session has no analysis data.");
        print_diagnostics(&ctx);
        return Ok(());
    }

    println!("\n✅ Report Generation Complete!");
    println!("{}", "=".repeat(50));

    if let Some(summary) = ctx.reports().get("executive_summary") {
        println!(
            "📊 Total Resources: {}",
            summary["overview"]["total_resources"]
        );
        println!(
            "💰 Monthly Cost: {}",
            format_currency(
                summary["financial_impact"]["total_monthly_cost_usd"]
                    .as_f64()
                    .unwrap_or(0.0)
            )
        );
        println!(
            "💡 Potential Savings: {}",
            format_currency(
                summary["recommendations_summary"]["total_potential_savings_usd"]
                    .as_f64()
                    .unwrap_or(0.0)
            )
        );

        if let Some(findings) = summary["key_findings"].as_array() {
            if !findings.is_empty() {
                println!("\n🔍 Key Findings:");
                for finding in findings {
                    println!("   • {}", finding.as_str().unwrap_or_default());
                }
            }
        }
    }

    let dir = out_dir.unwrap_or_else(|| PathBuf::from(&config.output.dir));
    let written = write_report_files(&ctx, &dir, format)?;

    println!("\n📁 Reports saved to: {}/{}/", dir.display(), ctx.session_id());
    for path in &written {
        println!("   📄 {}", path.display());
    }

    Ok(())
}

/// Write the selected report formats under `<out_dir>/<session_id>/`.
fn write_report_files(
    ctx: &SessionContext,
    out_dir: &Path,
    format: ReportFormat,
) -> Result<Vec<PathBuf>> {
    let dir = out_dir.join(ctx.session_id());
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create report directory {}", dir.display()))?;

    let mut written = Vec::new();

    if matches!(format, ReportFormat::Json | ReportFormat::All) {
        let path = dir.join("session_export.json");
        std::fs::write(&path, report::generate_json_export(ctx)?)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        written.push(path);
    }

    if matches!(format, ReportFormat::Markdown | ReportFormat::All) {
        let path = dir.join("executive_summary.md");
        std::fs::write(&path, report::generate_markdown_summary(ctx))
            .with_context(|| format!("Failed to write {}", path.display()))?;
        written.push(path);
    }

    if matches!(format, ReportFormat::Csv | ReportFormat::All) {
        let path = dir.join("cost_analysis.csv");
        std::fs::write(&path, report::generate_cost_csv(ctx))
            .with_context(|| format!("Failed to write {}", path.display()))?;
        written.push(path);
    }

    Ok(written)
}

fn show_status(config: &Config) -> Result<()> {
    println!("🔧 Costpilot Status");
    println!("{}", "=".repeat(40));

    println!("📋 Version: {}", env!("CARGO_PKG_VERSION"));
    println!("🔑 Subscription: {}", config.account.subscription_id);
    println!("🏢 Tenant: {}", config.account.tenant_id);
    println!("🌐 Management Endpoint: {}", config.scan.endpoint);
    println!("📦 Scan Limit: {}", config.scan.limit);
    println!("⏱️  Timeout: {}s", config.scan.timeout_seconds);
    println!("📁 Report Directory: {}", config.output.dir);

    println!("\n🔍 Checking credentials...");
    if std::env::var("AZURE_ACCESS_TOKEN").is_ok() {
        println!("✅ Management API token present (AZURE_ACCESS_TOKEN)");
    } else {
        println!("❌ AZURE_ACCESS_TOKEN not set; scans will fail until it is");
    }

    Ok(())
}

fn show_config(config: &Config) -> Result<()> {
    println!("⚙️  Current Configuration");
    println!("{}", "=".repeat(40));
    println!(
        "{}",
        toml::to_string_pretty(config).context("Failed to render configuration")?
    );
    Ok(())
}

/// Persist the session if requested and print accumulated diagnostics.
fn finish_command(ctx: &SessionContext, output: Option<PathBuf>) -> Result<()> {
    if let Some(ref path) = output {
        persistence::save_session(ctx, path)
            .with_context(|| format!("Failed to save session to {}", path.display()))?;
        println!("\n💾 Session saved to: {}", path.display());
    }

    print_diagnostics(ctx);
    Ok(())
}

fn print_diagnostics(ctx: &SessionContext) {
    let errors: Vec<_> = ctx.errors().collect();
    if !errors.is_empty() {
        println!("\n⚠️  Errors encountered: {}", errors.len());
        for diagnostic in errors.iter().skip(errors.len().saturating_sub(3)) {
            println!("   {}", diagnostic);
        }
    }

    let warnings: Vec<_> = ctx.warnings().collect();
    if !warnings.is_empty() {
        println!("\n⚠️  Warnings: {}", warnings.len());
        for diagnostic in warnings.iter().skip(warnings.len().saturating_sub(3)) {
            println!("   {}", diagnostic);
        }
    }
}

fn stage_banner(kind: StageKind) -> (&'static str, &'static str) {
    match kind {
        StageKind::Scan => ("🔍", "Scanning resources"),
        StageKind::Analyze => ("💰", "Analyzing costs"),
        StageKind::Optimize => ("💡", "Generating optimization recommendations"),
        StageKind::Report => ("📊", "Generating reports"),
    }
}

/// Format a USD amount for console output.
fn format_currency(amount: f64) -> String {
    format!("${:.2}", amount)
}

/// Format a duration in seconds for console output.
fn format_duration(seconds: f64) -> String {
    format!("{:.1}s", seconds)
}
