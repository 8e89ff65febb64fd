//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::Parser;
use std::path::PathBuf;

/// MentionScope - brand visibility across AI-generated answers
///
/// Sends prompts to one or more language model sources, finds where your
/// brand and its competitors are mentioned and how they are ranked, and
/// writes a Markdown or JSON visibility report.
///
/// Examples:
///   mentionscope --brand Rolex --competitors Omega,Tudor --category "luxury watch"
///   mentionscope --brand Rolex --prompt "Best luxury watch brands?" --format json
///   mentionscope --config team.toml --sources gpt,ollama --fail-on-errors
///   mentionscope --brand Rolex --dry-run
///   mentionscope --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Brand to analyze
    ///
    /// Overrides [brand].target from the config file.
    #[arg(short, long, env = "MENTIONSCOPE_BRAND")]
    pub brand: Option<String>,

    /// Competitors tracked alongside the brand (comma-separated)
    ///
    /// Example: --competitors Omega,Tudor,"Patek Philippe"
    #[arg(long, value_name = "NAMES", value_delimiter = ',')]
    pub competitors: Option<Vec<String>>,

    /// Product category used by prompt templates
    #[arg(long, value_name = "CATEGORY")]
    pub category: Option<String>,

    /// Prompt to send (repeatable)
    ///
    /// When given, replaces the configured prompts and templates.
    #[arg(short, long = "prompt", value_name = "TEXT")]
    pub prompt: Vec<String>,

    /// Only query these provider ids (comma-separated)
    #[arg(long, value_name = "IDS", value_delimiter = ',')]
    pub sources: Option<Vec<String>>,

    /// Number of tasks run concurrently per batch
    #[arg(long, value_name = "NUM")]
    pub batch_size: Option<usize>,

    /// Deadline for a single source call in seconds (0 disables it)
    #[arg(long, value_name = "SECS")]
    pub task_timeout: Option<u64>,

    /// Ask the first provider for brand name variations
    #[arg(long)]
    pub discover_aliases: bool,

    /// Output file path for the report
    ///
    /// Defaults to [general].output from the config file.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output format (markdown, json)
    #[arg(long, default_value = "markdown", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Path to configuration file
    ///
    /// If not specified, looks for .mentionscope.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Dry run: print the task plan without calling any source
    #[arg(long)]
    pub dry_run: bool,

    /// Generate a default .mentionscope.toml configuration file
    #[arg(long)]
    pub init_config: bool,

    /// Exit with code 2 when any task failed
    ///
    /// Useful for CI pipelines.
    #[arg(long)]
    pub fail_on_errors: bool,
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(ref brand) = self.brand {
            if brand.trim().is_empty() {
                return Err("Brand must not be empty".to_string());
            }
        }

        // Validate batch size
        if self.batch_size == Some(0) {
            return Err("Batch size must be at least 1".to_string());
        }

        if let Some(ref sources) = self.sources {
            if sources.iter().all(|s| s.trim().is_empty()) {
                return Err("--sources needs at least one provider id".to_string());
            }
        }

        if self.prompt.iter().any(|p| p.trim().is_empty()) {
            return Err("Prompts must not be empty".to_string());
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }

    /// Report path: the flag, else the configured default.
    pub fn output_path(&self, configured: &str) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| PathBuf::from(configured))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_args() -> Args {
        Args {
            brand: Some("Rolex".to_string()),
            competitors: None,
            category: None,
            prompt: vec![],
            sources: None,
            batch_size: None,
            task_timeout: None,
            discover_aliases: false,
            output: None,
            format: OutputFormat::Markdown,
            config: None,
            verbose: false,
            quiet: false,
            dry_run: false,
            init_config: false,
            fail_on_errors: false,
        }
    }

    #[test]
    fn test_parse_flags() {
        let args = Args::try_parse_from([
            "mentionscope",
            "--brand",
            "Rolex",
            "--competitors",
            "Omega,Tudor",
            "-p",
            "Best watch?",
            "-p",
            "Most reliable watch?",
            "--format",
            "json",
            "--task-timeout",
            "30",
        ])
        .unwrap();

        assert_eq!(args.brand.as_deref(), Some("Rolex"));
        assert_eq!(
            args.competitors,
            Some(vec!["Omega".to_string(), "Tudor".to_string()])
        );
        assert_eq!(args.prompt.len(), 2);
        assert_eq!(args.format, OutputFormat::Json);
        assert_eq!(args.task_timeout, Some(30));
    }

    #[test]
    fn test_validation_conflicting_options() {
        let mut args = make_args();
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_zero_batch() {
        let mut args = make_args();
        assert!(args.validate().is_ok());
        args.batch_size = Some(0);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_init_config_skips_validation() {
        let mut args = make_args();
        args.verbose = true;
        args.quiet = true;
        args.init_config = true;
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_output_path() {
        let mut args = make_args();
        assert_eq!(args.output_path("report.md"), PathBuf::from("report.md"));
        args.output = Some(PathBuf::from("out.json"));
        assert_eq!(args.output_path("report.md"), PathBuf::from("out.json"));
    }

    #[test]
    fn test_log_level() {
        let mut args = make_args();
        assert_eq!(args.log_level(), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(), tracing::Level::ERROR);
    }
}
