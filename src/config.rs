//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.mentionscope.toml` files.

use crate::analysis::ConfidenceModel;
use crate::matcher::{common_word_set, MatcherOptions};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::time::Duration;

/// Default config file name.
pub const CONFIG_FILE: &str = ".mentionscope.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Brand and competitor settings.
    #[serde(default)]
    pub brand: BrandConfig,

    /// Alias matcher settings.
    #[serde(default)]
    pub matcher: MatcherConfig,

    /// Response analysis settings.
    #[serde(default)]
    pub analysis: AnalysisConfig,

    /// Prompt settings.
    #[serde(default)]
    pub prompts: PromptConfig,

    /// Text sources queried for each prompt.
    #[serde(default = "default_providers")]
    pub providers: Vec<ProviderConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            brand: BrandConfig::default(),
            matcher: MatcherConfig::default(),
            analysis: AnalysisConfig::default(),
            prompts: PromptConfig::default(),
            providers: default_providers(),
        }
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Default output file path.
    #[serde(default = "default_output")]
    pub output: String,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,

    /// Number of tasks run concurrently per batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Deadline for a single source call, in seconds. Absent means none.
    #[serde(default = "default_task_timeout")]
    pub task_timeout_seconds: Option<u64>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
            verbose: false,
            batch_size: default_batch_size(),
            task_timeout_seconds: default_task_timeout(),
        }
    }
}

fn default_output() -> String {
    "mentionscope_report.md".to_string()
}

fn default_batch_size() -> usize {
    3
}

fn default_task_timeout() -> Option<u64> {
    Some(120)
}

/// Brand and competitor settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BrandConfig {
    /// The brand being analyzed.
    #[serde(default)]
    pub target: String,

    /// Product category, used by prompt templates.
    #[serde(default)]
    pub category: String,

    /// Competitors tracked alongside the target.
    #[serde(default)]
    pub competitors: Vec<String>,

    /// Known aliases per brand name.
    #[serde(default)]
    pub aliases: HashMap<String, Vec<String>>,

    /// Ask the first provider for additional name variations.
    #[serde(default)]
    pub discover_aliases: bool,
}

/// Alias matcher settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatcherConfig {
    #[serde(default = "default_true")]
    pub word_boundary: bool,

    #[serde(default = "default_true")]
    pub longest_match_wins: bool,

    /// Match aliases that are common words with their original casing only.
    #[serde(default = "default_true")]
    pub case_sensitive_common_words: bool,

    /// Extra words treated as common words.
    #[serde(default)]
    pub common_words: Vec<String>,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            word_boundary: true,
            longest_match_wins: true,
            case_sensitive_common_words: true,
            common_words: Vec::new(),
        }
    }
}

impl From<&MatcherConfig> for MatcherOptions {
    fn from(config: &MatcherConfig) -> Self {
        Self {
            word_boundary: config.word_boundary,
            longest_match_wins: config.longest_match_wins,
            case_sensitive_common_words: config.case_sensitive_common_words,
            common_words: common_word_set(&config.common_words),
        }
    }
}

/// Sentiment classifier selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentMode {
    #[default]
    Neutral,
    Lexicon,
}

/// Response analysis settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default)]
    pub sentiment: SentimentMode,

    /// Extract list rankings from responses.
    #[serde(default = "default_true")]
    pub rankings: bool,

    #[serde(default = "default_confidence_floor")]
    pub confidence_floor: f64,

    #[serde(default = "default_confidence_saturation")]
    pub confidence_saturation: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            sentiment: SentimentMode::Neutral,
            rankings: true,
            confidence_floor: default_confidence_floor(),
            confidence_saturation: default_confidence_saturation(),
        }
    }
}

impl AnalysisConfig {
    pub fn confidence_model(&self) -> ConfidenceModel {
        ConfidenceModel {
            floor: self.confidence_floor,
            saturation: self.confidence_saturation,
        }
    }
}

fn default_confidence_floor() -> f64 {
    0.2
}

fn default_confidence_saturation() -> f64 {
    10.0
}

/// Prompt settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptConfig {
    /// Explicit prompts. When empty, templates are expanded instead.
    #[serde(default)]
    pub queries: Vec<String>,

    /// Templates with `{brand}`, `{category}` and `{competitors}` placeholders.
    #[serde(default = "default_templates")]
    pub templates: Vec<String>,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            queries: Vec::new(),
            templates: default_templates(),
        }
    }
}

fn default_templates() -> Vec<String> {
    vec![
        "What are the best {category} brands?",
        "Which {category} brand would you recommend and why?",
        "How does {brand} compare to {competitors}?",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

/// Kind of text source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Ollama,
    OpenAi,
}

/// One text source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Unique source id used in results.
    pub id: String,

    pub kind: ProviderKind,

    /// Base URL of the API.
    pub url: String,

    pub model: String,

    /// Environment variable holding the API key.
    #[serde(default)]
    pub api_key_env: Option<String>,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// HTTP request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub timeout_seconds: u64,
}

fn default_providers() -> Vec<ProviderConfig> {
    vec![ProviderConfig {
        id: "ollama".to_string(),
        kind: ProviderKind::Ollama,
        url: "http://localhost:11434".to_string(),
        model: "llama3.2:latest".to_string(),
        api_key_env: None,
        temperature: default_temperature(),
        timeout_seconds: default_request_timeout(),
    }]
}

fn default_temperature() -> f32 {
    0.7
}

fn default_request_timeout() -> u64 {
    300
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    /// This method only overrides config when CLI provides explicit values.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref brand) = args.brand {
            self.brand.target = brand.clone();
        }
        if let Some(ref competitors) = args.competitors {
            self.brand.competitors = competitors.clone();
        }
        if let Some(ref category) = args.category {
            self.brand.category = category.clone();
        }
        if !args.prompt.is_empty() {
            self.prompts.queries = args.prompt.clone();
        }
        if let Some(batch_size) = args.batch_size {
            self.general.batch_size = batch_size;
        }
        if let Some(timeout) = args.task_timeout {
            self.general.task_timeout_seconds = (timeout > 0).then_some(timeout);
        }
        if let Some(ref sources) = args.sources {
            self.providers.retain(|p| sources.contains(&p.id));
        }
        if args.discover_aliases {
            self.brand.discover_aliases = true;
        }

        // Flags always override
        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<()> {
        if self.brand.target.trim().is_empty() {
            bail!("No target brand configured (set [brand].target or pass --brand)");
        }
        if self.general.batch_size == 0 {
            bail!("Batch size must be at least 1");
        }

        let mut ids = HashSet::new();
        for provider in &self.providers {
            if provider.id.trim().is_empty() {
                bail!("Provider ids must not be empty");
            }
            if !ids.insert(provider.id.as_str()) {
                bail!("Duplicate provider id: {}", provider.id);
            }
            if !provider.url.starts_with("http://") && !provider.url.starts_with("https://") {
                bail!(
                    "Provider {} URL must start with 'http://' or 'https://'",
                    provider.id
                );
            }
        }

        Ok(())
    }

    /// Per-task deadline.
    pub fn task_timeout(&self) -> Option<Duration> {
        self.general.task_timeout_seconds.map(Duration::from_secs)
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let mut config = Config::default();
        config.brand.target = "Acme".to_string();
        config.brand.category = "project management software".to_string();
        config.brand.competitors = vec!["Globex".to_string(), "Initech".to_string()];
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.general.batch_size, 3);
        assert_eq!(config.general.task_timeout_seconds, Some(120));
        assert_eq!(config.providers.len(), 1);
        assert_eq!(config.providers[0].kind, ProviderKind::Ollama);
        assert!(config.matcher.longest_match_wins);
        assert_eq!(config.analysis.sentiment, SentimentMode::Neutral);
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[general]
batch_size = 5

[brand]
target = "Rolex"
category = "luxury watches"
competitors = ["Omega", "Patek Philippe"]

[brand.aliases]
"Patek Philippe" = ["Patek Philippe", "Patek"]

[matcher]
word_boundary = false
common_words = ["tide"]

[analysis]
sentiment = "lexicon"

[[providers]]
id = "gpt"
kind = "openai"
url = "https://api.openai.com/v1"
model = "gpt-4o-mini"
api_key_env = "OPENAI_API_KEY"
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.general.batch_size, 5);
        assert_eq!(config.general.task_timeout_seconds, Some(120));
        assert_eq!(config.brand.target, "Rolex");
        assert_eq!(config.brand.competitors.len(), 2);
        assert_eq!(
            config.brand.aliases.get("Patek Philippe").map(Vec::len),
            Some(2)
        );
        assert!(!config.matcher.word_boundary);
        assert_eq!(config.analysis.sentiment, SentimentMode::Lexicon);
        assert_eq!(config.providers.len(), 1);
        assert_eq!(config.providers[0].kind, ProviderKind::OpenAi);
        assert_eq!(config.providers[0].timeout_seconds, 300);

        let options = MatcherOptions::from(&config.matcher);
        assert!(options.common_words.contains("tide"));
        assert!(!options.word_boundary);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[brand]\ntarget = \"Omega\"").unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.brand.target, "Omega");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_config() {
        let mut config = Config::default();
        assert!(config.validate().is_err());

        config.brand.target = "Rolex".to_string();
        assert!(config.validate().is_ok());

        config.general.batch_size = 0;
        assert!(config.validate().is_err());
        config.general.batch_size = 3;

        let duplicate = config.providers[0].clone();
        config.providers.push(duplicate);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(!toml_str.is_empty());
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[brand]"));
        assert!(toml_str.contains("[[providers]]"));

        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.brand.target, "Acme");
    }
}
