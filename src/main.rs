//! MentionScope - brand visibility across AI-generated answers
//!
//! A CLI tool that sends prompts to language model sources, finds brand
//! and competitor mentions in the answers and writes a visibility report.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (config, no sources available, write failure, etc.)
//!   2 - Some tasks failed and --fail-on-errors was set

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use mentionscope::aliases::{AliasCache, LlmAliasRegistry, RunContext, UsageTracker};
use mentionscope::cli::{Args, OutputFormat};
use mentionscope::config::{Config, CONFIG_FILE};
use mentionscope::models::AnalysisResult;
use mentionscope::pipeline::{
    plan_tasks, AnalysisRequest, NullSink, Orchestrator, PipelineConfig, ProgressEvent,
    ProgressKind, ProgressSink, Stage,
};
use mentionscope::{providers, report};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    init_logging(&args);

    info!("MentionScope v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run(args).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Analysis failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .mentionscope.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).with_context(|| format!("Failed to write {}", CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE);
    println!("   Edit it to set your brand, competitors, prompts and providers.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
///
/// `MENTIONSCOPE_LOG` overrides the level chosen by the flags.
fn init_logging(args: &Args) {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(args.log_level()).into())
        .with_env_var("MENTIONSCOPE_LOG")
        .from_env_lossy();

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Run the complete analysis workflow. Returns the exit code.
async fn run(args: Args) -> Result<i32> {
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);
    config.validate()?;

    let request = AnalysisRequest::from_config(&config);

    if args.dry_run {
        return handle_dry_run(&config, &request);
    }

    let sources = providers::build_providers(&config.providers)
        .context("Failed to initialize providers")?;

    println!("🔎 Analyzing brand: {}", config.brand.target);
    if !config.brand.competitors.is_empty() {
        println!("   Competitors: {}", config.brand.competitors.join(", "));
    }
    println!(
        "   Sources: {}",
        config
            .providers
            .iter()
            .map(|p| format!("{} ({})", p.id, p.model))
            .collect::<Vec<_>>()
            .join(", ")
    );

    let usage = Arc::new(UsageTracker::new());
    let aliases = match sources.first() {
        Some(first) if config.brand.discover_aliases => {
            info!("Discovering aliases with {}", first.id());
            let registry = LlmAliasRegistry::new(first.clone()).with_usage(usage.clone());
            AliasCache::new(Arc::new(registry))
        }
        _ => AliasCache::heuristic_only(),
    };

    let sink: Arc<dyn ProgressSink> = if args.quiet {
        Arc::new(NullSink)
    } else {
        Arc::new(ProgressBarSink::new())
    };

    let orchestrator = Orchestrator::new(PipelineConfig::from_config(&config))
        .with_context(RunContext::with_usage(Arc::new(aliases), usage))
        .with_sink(sink);

    // Ctrl-C stops the run after the current batch.
    let cancel = orchestrator.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, finishing the current batch");
            cancel.cancel();
        }
    });

    let result = orchestrator.run(&request, &sources).await?;

    // Generate and save the report
    let output = match args.format {
        OutputFormat::Json => report::generate_json_report(&result)?,
        OutputFormat::Markdown => report::generate_markdown_report(&result),
    };
    let output_path = args.output_path(&config.general.output);
    report::write_report(&output, &output_path)?;

    print_summary(&result);
    println!(
        "\n✅ Analysis complete! Report saved to: {}",
        output_path.display()
    );

    if args.fail_on_errors && !result.errors.is_empty() {
        eprintln!(
            "\n⛔ {} task(s) failed. Failing (exit code 2).",
            result.errors.len()
        );
        return Ok(2);
    }

    Ok(0)
}

fn print_summary(result: &AnalysisResult) {
    println!("\n📊 Analysis Summary:");
    println!("   Responses analyzed: {}", result.responses.len());
    if let Some(own) = result.own_brand() {
        println!(
            "   {}: visibility {:.1}% | share of voice {:.1}% | sentiment {}",
            own.name, own.visibility_score, own.share_of_voice, own.sentiment
        );
    }
    for competitor in result.competitors.iter().filter(|c| !c.is_own) {
        println!(
            "   - {}: visibility {:.1}% | share of voice {:.1}%",
            competitor.name, competitor.visibility_score, competitor.share_of_voice
        );
    }
    if !result.errors.is_empty() {
        println!("   Failed tasks: {}", result.errors.len());
    }
    if !result.skipped_sources.is_empty() {
        println!("   Skipped sources: {}", result.skipped_sources.join(", "));
    }
    if result.cancelled {
        println!("   ⚠️  Run was cancelled; results are partial.");
    }
    println!("   Duration: {:.1}s", result.duration_seconds());
}

/// Handle --dry-run: print the task plan and exit.
fn handle_dry_run(config: &Config, request: &AnalysisRequest) -> Result<i32> {
    println!("\n🔍 Dry run: planning tasks (no source calls)...\n");

    let prompts = request.resolved_prompts();
    let source_ids: Vec<&str> = config.providers.iter().map(|p| p.id.as_str()).collect();
    let tasks = plan_tasks(&prompts, &source_ids);

    if tasks.is_empty() {
        println!("   No tasks: check prompts and providers.");
    } else {
        println!("   {} tasks would be run:\n", tasks.len());
        for task in &tasks {
            println!("     💬 [{}] {}", task.source_id, task.prompt);
        }
        let batch_size = config.general.batch_size.max(1);
        println!(
            "\n   Batches: {} of up to {} tasks",
            tasks.len().div_ceil(batch_size),
            batch_size
        );
    }

    println!("\n✅ Dry run complete. No sources were called.");
    Ok(0)
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
            info!("Loaded default config from {}", CONFIG_FILE);
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

/// Terminal progress bar fed by pipeline events.
struct ProgressBarSink {
    bar: ProgressBar,
}

impl ProgressBarSink {
    fn new() -> Self {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        Self { bar }
    }
}

impl ProgressSink for ProgressBarSink {
    fn emit(&self, event: ProgressEvent) {
        match event.kind {
            ProgressKind::Stage => {
                if event.stage == Stage::Analyzing {
                    if let Some(tasks) = event.data["tasks"].as_u64() {
                        self.bar.set_length(tasks);
                    }
                }
                self.bar.set_message(event.stage.description());
            }
            ProgressKind::Progress => {
                if let Some(completed) = event.data["completed"].as_u64() {
                    self.bar.set_position(completed);
                }
            }
            ProgressKind::PartialResult => {}
            ProgressKind::Error => self.bar.abandon(),
            ProgressKind::Complete => self.bar.finish_and_clear(),
        }
    }
}
