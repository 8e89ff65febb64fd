//! Brand alias lookup.
//!
//! An [`AliasRegistry`] answers "which names does this brand go by?". The
//! [`AliasCache`] sits in front of a registry for the lifetime of a process
//! or run, adds heuristic name variants and never fails: a brand always
//! resolves to at least its own name.
//!
//! [`UsageTracker`] counts source calls so a run can report them.

use crate::error::{AliasError, ProviderError};
use crate::models::SourceUsage;
use crate::providers::TextSource;
use async_trait::async_trait;
use parking_lot::Mutex;
use regex::Regex;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, LazyLock};
use tracing::{debug, warn};

/// Corporate suffixes stripped when generating name variants.
const CORPORATE_SUFFIXES: &[&str] = &[
    "incorporated",
    "corporation",
    "company",
    "limited",
    "inc",
    "llc",
    "ltd",
    "corp",
    "co",
    "gmbh",
    "plc",
];

/// Upper bound on the length of a single alias.
const MAX_ALIAS_LEN: usize = 60;

static QUOTED_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"["“]([^"“”\n]{2,60})["”]"#).expect("quoted name regex is valid"));

static LIST_ITEM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*(?:[-*+•]|\d{1,2}[.)])\s+\**([^\n*:]{2,60}?)\**\s*(?::.*)?$")
        .expect("list item regex is valid")
});

/// Source of brand aliases.
#[async_trait]
pub trait AliasRegistry: Send + Sync {
    async fn get_aliases(&self, brand: &str) -> Result<Vec<String>, AliasError>;
}

/// Registry backed by a fixed table, usually the `[brand.aliases]` config.
#[derive(Debug, Clone, Default)]
pub struct StaticAliasRegistry {
    table: HashMap<String, Vec<String>>,
}

impl StaticAliasRegistry {
    pub fn new(table: HashMap<String, Vec<String>>) -> Self {
        Self { table }
    }
}

#[async_trait]
impl AliasRegistry for StaticAliasRegistry {
    async fn get_aliases(&self, brand: &str) -> Result<Vec<String>, AliasError> {
        match self.table.get(brand) {
            Some(aliases) if !aliases.is_empty() => Ok(aliases.clone()),
            _ => Err(AliasError::NoAliases(brand.to_string())),
        }
    }
}

/// One way of getting aliases out of a text source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionStrategy {
    /// Ask for a JSON array of strings.
    StructuredJson,
    /// Ask for a plain comma-separated list.
    CommaList,
    /// Scan every reply collected so far for quoted names and list items.
    /// Makes no call of its own.
    RegexScan,
}

impl ExtractionStrategy {
    pub const DEFAULT_ORDER: [ExtractionStrategy; 3] = [
        ExtractionStrategy::StructuredJson,
        ExtractionStrategy::CommaList,
        ExtractionStrategy::RegexScan,
    ];

    fn prompt(&self, brand: &str) -> Option<String> {
        match self {
            ExtractionStrategy::StructuredJson => Some(format!(
                "List the names, abbreviations and common spellings people use to refer to the \
                 brand \"{brand}\". Respond with a JSON array of strings only, for example \
                 [\"{brand}\"]. Do not include other companies."
            )),
            ExtractionStrategy::CommaList => Some(format!(
                "Give other names for the brand \"{brand}\" as one comma-separated line. \
                 No explanations."
            )),
            ExtractionStrategy::RegexScan => None,
        }
    }

    fn parse(&self, reply: &str) -> Option<Vec<String>> {
        match self {
            ExtractionStrategy::StructuredJson => parse_json_list(reply),
            ExtractionStrategy::CommaList => parse_comma_list(reply),
            ExtractionStrategy::RegexScan => scan_names(reply),
        }
    }
}

/// Registry that asks a language model for name variations.
pub struct LlmAliasRegistry {
    source: Arc<dyn TextSource>,
    strategies: Vec<ExtractionStrategy>,
    usage: Arc<UsageTracker>,
}

impl LlmAliasRegistry {
    pub fn new(source: Arc<dyn TextSource>) -> Self {
        Self {
            source,
            strategies: ExtractionStrategy::DEFAULT_ORDER.to_vec(),
            usage: Arc::new(UsageTracker::new()),
        }
    }

    /// Count lookup calls in `usage`, normally the run's shared tracker.
    pub fn with_usage(mut self, usage: Arc<UsageTracker>) -> Self {
        self.usage = usage;
        self
    }

    pub fn with_strategies(mut self, strategies: Vec<ExtractionStrategy>) -> Self {
        self.strategies = strategies;
        self
    }

    /// Run one strategy. `Ok(None)` means it produced nothing usable.
    async fn attempt(
        &self,
        strategy: ExtractionStrategy,
        brand: &str,
        replies: &mut Vec<String>,
    ) -> Result<Option<Vec<String>>, ProviderError> {
        let Some(prompt) = strategy.prompt(brand) else {
            let combined = replies.join("\n");
            return Ok(strategy.parse(&combined));
        };

        let source_id = self.source.id();
        self.usage.record_attempt(source_id);
        let reply = match self.source.call(&prompt).await {
            Ok(response) => {
                self.usage.record_success(source_id);
                response.text
            }
            Err(e) => {
                self.usage.record_failure(source_id);
                return Err(e);
            }
        };
        let parsed = strategy.parse(&reply);
        replies.push(reply);
        Ok(parsed)
    }
}

#[async_trait]
impl AliasRegistry for LlmAliasRegistry {
    async fn get_aliases(&self, brand: &str) -> Result<Vec<String>, AliasError> {
        let mut replies = Vec::new();
        let mut last_error = None;

        for &strategy in &self.strategies {
            match self.attempt(strategy, brand, &mut replies).await {
                Ok(Some(aliases)) => {
                    let aliases = clean_aliases(aliases);
                    if !aliases.is_empty() {
                        debug!(brand, ?strategy, count = aliases.len(), "Extracted aliases");
                        return Ok(aliases);
                    }
                }
                Ok(None) => debug!(brand, ?strategy, "Alias strategy produced nothing"),
                Err(e) if e.is_auth() => return Err(e.into()),
                Err(e) => {
                    warn!(brand, ?strategy, "Alias lookup call failed: {}", e);
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) if replies.is_empty() => Err(e.into()),
            _ => Err(AliasError::NoAliases(brand.to_string())),
        }
    }
}

/// Per-brand alias cache. Construct one per process or per run and share it.
pub struct AliasCache {
    registry: Option<Arc<dyn AliasRegistry>>,
    entries: Mutex<HashMap<String, Vec<String>>>,
}

impl AliasCache {
    pub fn new(registry: Arc<dyn AliasRegistry>) -> Self {
        Self {
            registry: Some(registry),
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// A cache that only produces heuristic variants.
    pub fn heuristic_only() -> Self {
        Self {
            registry: None,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn cached(&self, brand: &str) -> Option<Vec<String>> {
        self.entries.lock().get(brand).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Aliases for `brand`: the name itself, heuristic variants and whatever
    /// the registry knows. Registry failures degrade to the local forms.
    pub async fn resolve(&self, brand: &str) -> Vec<String> {
        if let Some(hit) = self.cached(brand) {
            return hit;
        }

        let mut aliases = name_variants(brand);

        if let Some(ref registry) = self.registry {
            match registry.get_aliases(brand).await {
                Ok(found) => aliases.extend(found),
                Err(e) => debug!(brand, "Falling back to local name variants: {}", e),
            }
        }

        let aliases = clean_aliases(aliases);
        let aliases = if aliases.is_empty() {
            vec![brand.to_string()]
        } else {
            aliases
        };

        self.entries
            .lock()
            .insert(brand.to_string(), aliases.clone());
        aliases
    }

    /// Resolve several brands, returning a brand -> aliases map.
    pub async fn resolve_all(&self, brands: &[String]) -> HashMap<String, Vec<String>> {
        let mut resolved = HashMap::new();
        for brand in brands {
            let aliases = self.resolve(brand).await;
            resolved.insert(brand.clone(), aliases);
        }
        resolved
    }
}

impl Default for AliasCache {
    fn default() -> Self {
        Self::heuristic_only()
    }
}

/// Per-source call counters.
#[derive(Debug, Default)]
pub struct UsageTracker {
    counts: Mutex<BTreeMap<String, SourceUsage>>,
}

impl UsageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_attempt(&self, source_id: &str) {
        self.counts
            .lock()
            .entry(source_id.to_string())
            .or_default()
            .attempted += 1;
    }

    pub fn record_success(&self, source_id: &str) {
        self.counts
            .lock()
            .entry(source_id.to_string())
            .or_default()
            .succeeded += 1;
    }

    pub fn record_failure(&self, source_id: &str) {
        self.counts
            .lock()
            .entry(source_id.to_string())
            .or_default()
            .failed += 1;
    }

    pub fn snapshot(&self) -> BTreeMap<String, SourceUsage> {
        self.counts.lock().clone()
    }
}

/// Shared state injected into the pipeline.
#[derive(Clone, Default)]
pub struct RunContext {
    pub aliases: Arc<AliasCache>,
    pub usage: Arc<UsageTracker>,
}

impl RunContext {
    pub fn new(aliases: Arc<AliasCache>) -> Self {
        Self::with_usage(aliases, Arc::new(UsageTracker::new()))
    }

    /// Share `usage` with collaborators that call sources outside the
    /// task loop, such as an [`LlmAliasRegistry`].
    pub fn with_usage(aliases: Arc<AliasCache>, usage: Arc<UsageTracker>) -> Self {
        Self { aliases, usage }
    }
}

/// The brand name plus variants without corporate suffixes or separators.
pub fn name_variants(brand: &str) -> Vec<String> {
    let brand = brand.trim();
    let mut variants = vec![brand.to_string()];

    let stripped = strip_corporate_suffix(brand);
    if stripped != brand && stripped.chars().count() >= 2 {
        variants.push(stripped.to_string());
    }

    if stripped.contains('-') {
        variants.push(stripped.replace('-', " "));
        variants.push(stripped.replace('-', ""));
    }
    let words: Vec<&str> = stripped.split_whitespace().collect();
    if (2..=3).contains(&words.len())
        && words.iter().all(|w| w.chars().all(char::is_alphanumeric))
    {
        variants.push(words.concat());
    }

    clean_aliases(variants)
}

fn strip_corporate_suffix(name: &str) -> &str {
    let mut current = name.trim();
    loop {
        let Some((head, last)) = current.rsplit_once([' ', ',']) else {
            return current;
        };
        let word = last.trim_end_matches('.').to_lowercase();
        if !CORPORATE_SUFFIXES.contains(&word.as_str()) {
            return current;
        }
        let head = head.trim_end_matches([',', ' ']);
        if head.is_empty() {
            return current;
        }
        current = head;
    }
}

/// Trim, drop junk and de-duplicate case-insensitively, first spelling wins.
fn clean_aliases(aliases: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    aliases
        .into_iter()
        .map(|a| {
            a.trim()
                .trim_matches(|c: char| matches!(c, '"' | '\'' | '`' | '.' | '“' | '”'))
                .trim()
                .to_string()
        })
        .filter(|a| !a.is_empty() && a.chars().count() <= MAX_ALIAS_LEN)
        .filter(|a| seen.insert(a.to_lowercase()))
        .collect()
}

/// Parse the first JSON array in a reply, or an object with an `aliases` array.
fn parse_json_list(reply: &str) -> Option<Vec<String>> {
    let start = reply.find('[')?;
    let end = reply.rfind(']')?;
    if end > start {
        if let Ok(list) = serde_json::from_str::<Vec<String>>(&reply[start..=end]) {
            return Some(list);
        }
    }

    let start = reply.find('{')?;
    let end = reply.rfind('}')?;
    if end <= start {
        return None;
    }
    let value: serde_json::Value = serde_json::from_str(&reply[start..=end]).ok()?;
    let list = value["aliases"]
        .as_array()?
        .iter()
        .filter_map(|v| v.as_str().map(String::from))
        .collect();
    Some(list)
}

/// Split the first non-empty line on commas.
fn parse_comma_list(reply: &str) -> Option<Vec<String>> {
    let line = reply.lines().map(str::trim).find(|l| !l.is_empty())?;
    if !line.contains(',') {
        return None;
    }
    let items: Vec<String> = line
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty() && item.split_whitespace().count() <= 4)
        .map(String::from)
        .collect();
    (!items.is_empty()).then_some(items)
}

fn scan_names(text: &str) -> Option<Vec<String>> {
    let mut names: Vec<String> = QUOTED_NAME
        .captures_iter(text)
        .chain(LIST_ITEM.captures_iter(text))
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|name| name.split_whitespace().count() <= 4)
        .collect();
    names.dedup();
    (!names.is_empty()).then_some(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::RawResponse;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Replies with canned answers in order, then fails.
    struct ScriptedSource {
        replies: Vec<Result<String, ProviderError>>,
        calls: AtomicUsize,
    }

    impl ScriptedSource {
        fn new(replies: Vec<Result<String, ProviderError>>) -> Self {
            Self {
                replies,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl TextSource for ScriptedSource {
        fn id(&self) -> &str {
            "scripted"
        }

        async fn call(&self, _prompt: &str) -> Result<RawResponse, ProviderError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            match self.replies.get(n) {
                Some(Ok(text)) => Ok(RawResponse::text(text.clone())),
                Some(Err(e)) => Err(e.clone()),
                None => Err(ProviderError::transient("scripted", "exhausted")),
            }
        }
    }

    struct FailingRegistry;

    #[async_trait]
    impl AliasRegistry for FailingRegistry {
        async fn get_aliases(&self, brand: &str) -> Result<Vec<String>, AliasError> {
            Err(AliasError::NoAliases(brand.to_string()))
        }
    }

    #[test]
    fn test_name_variants() {
        let variants = name_variants("Coca-Cola Company");
        assert_eq!(variants[0], "Coca-Cola Company");
        assert!(variants.contains(&"Coca-Cola".to_string()));
        assert!(variants.contains(&"CocaCola".to_string()));

        assert!(!variants.contains(&"Coca-ColaCompany".to_string()));

        assert_eq!(name_variants("Acme, Inc."), vec!["Acme, Inc", "Acme"]);
        assert_eq!(name_variants("Rolex"), vec!["Rolex"]);
    }

    #[test]
    fn test_suffix_alone_is_kept() {
        assert_eq!(strip_corporate_suffix("Inc"), "Inc");
        assert_eq!(strip_corporate_suffix("Globex Corp."), "Globex");
        assert_eq!(strip_corporate_suffix("Initech Ltd, LLC"), "Initech");
    }

    #[test]
    fn test_parsers() {
        assert_eq!(
            parse_json_list("Sure! [\"Coke\", \"Coca Cola\"]"),
            Some(vec!["Coke".to_string(), "Coca Cola".to_string()])
        );
        assert_eq!(
            parse_json_list(r#"{"aliases": ["Big Mac"]}"#),
            Some(vec!["Big Mac".to_string()])
        );
        assert_eq!(parse_json_list("no json here"), None);

        assert_eq!(
            parse_comma_list("\nCoke, Coca Cola, Coca-Cola Classic\n"),
            Some(vec![
                "Coke".to_string(),
                "Coca Cola".to_string(),
                "Coca-Cola Classic".to_string()
            ])
        );
        assert_eq!(parse_comma_list("Just one name"), None);

        let scanned = scan_names("Known as:\n- Coke\n- \"Classic Coke\"\n").unwrap();
        assert!(scanned.contains(&"Coke".to_string()));
        assert!(scanned.contains(&"Classic Coke".to_string()));
    }

    #[tokio::test]
    async fn test_llm_registry_falls_through_strategies() {
        let source = Arc::new(ScriptedSource::new(vec![
            Ok("I cannot produce JSON.".to_string()),
            Ok("Here you go:\n1. Coke\n2. Coca Cola".to_string()),
        ]));
        let registry = LlmAliasRegistry::new(source.clone());

        let aliases = registry.get_aliases("Coca-Cola").await.unwrap();
        assert_eq!(aliases, vec!["Coke", "Coca Cola"]);
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_llm_registry_records_lookup_calls() {
        let source = Arc::new(ScriptedSource::new(vec![
            Err(ProviderError::transient("scripted", "503")),
            Ok("Coke, Coca Cola".to_string()),
        ]));
        let usage = Arc::new(UsageTracker::new());
        let registry = LlmAliasRegistry::new(source).with_usage(usage.clone());

        registry.get_aliases("Coca-Cola").await.unwrap();

        let counts = usage.snapshot();
        assert_eq!(counts["scripted"].attempted, 2);
        assert_eq!(counts["scripted"].succeeded, 1);
        assert_eq!(counts["scripted"].failed, 1);
    }

    #[tokio::test]
    async fn test_llm_registry_stops_on_auth_failure() {
        let source = Arc::new(ScriptedSource::new(vec![Err(ProviderError::auth(
            "scripted", "401",
        ))]));
        let registry = LlmAliasRegistry::new(source.clone());

        let err = registry.get_aliases("Rolex").await.unwrap_err();
        assert!(matches!(err, AliasError::Provider(ProviderError::Auth { .. })));
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cache_degrades_and_memoizes() {
        let cache = AliasCache::new(Arc::new(FailingRegistry));
        assert_eq!(cache.resolve("Rolex").await, vec!["Rolex"]);
        assert_eq!(cache.cached("Rolex"), Some(vec!["Rolex".to_string()]));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_cache_merges_registry_aliases() {
        let table = HashMap::from([(
            "Patek Philippe".to_string(),
            vec!["Patek".to_string(), "patek philippe".to_string()],
        )]);
        let cache = AliasCache::new(Arc::new(StaticAliasRegistry::new(table)));

        let resolved = cache
            .resolve_all(&["Patek Philippe".to_string(), "Omega".to_string()])
            .await;
        assert_eq!(
            resolved["Patek Philippe"],
            vec!["Patek Philippe", "PatekPhilippe", "Patek"]
        );
        assert_eq!(resolved["Omega"], vec!["Omega"]);
    }

    #[test]
    fn test_usage_tracker() {
        let usage = UsageTracker::new();
        usage.record_attempt("a");
        usage.record_attempt("a");
        usage.record_success("a");
        usage.record_failure("a");
        usage.record_attempt("b");

        let snapshot = usage.snapshot();
        assert_eq!(
            snapshot["a"],
            SourceUsage {
                attempted: 2,
                succeeded: 1,
                failed: 1
            }
        );
        assert_eq!(snapshot["b"].attempted, 1);
    }
}
