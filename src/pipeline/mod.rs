//! Concurrent analysis pipeline.
//!
//! The orchestrator queries every source with every prompt, analyzes the
//! answers and aggregates them into brand scores. Tasks run in fixed-size
//! batches: all tasks of a batch run concurrently and the next batch starts
//! only once the whole batch has finished.
//!
//! Task failures never abort a run. An authentication failure takes its
//! source out of the run; any other failure is recorded in the error list.

pub mod progress;
pub mod prompts;

use crate::aliases::RunContext;
use crate::analysis::{
    aggregate, aggregate_by_source, BrandSet, ConfidenceModel, LexiconSentiment,
    ListMarkerRanking, NeutralSentiment, NoRanking, RankingStrategy, ResponseAnalyzer,
    SentimentClassifier,
};
use crate::config::{Config, SentimentMode};
use crate::error::{PipelineError, ProviderError};
use crate::matcher::MatcherOptions;
use crate::models::{AnalysisResult, AnalysisTask, ResponseAnalysis, TaskError};
use crate::providers::{RawResponse, TextSource};
use chrono::Utc;
use futures::future::join_all;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

pub use progress::{
    ChannelSink, MemorySink, NullSink, ProgressEvent, ProgressKind, ProgressSink, Stage,
    TaskOutcome,
};
pub use prompts::{expand_templates, resolve_prompts, PromptContext};

/// Scheduling and analysis settings for one run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Tasks per batch. Values below 1 are treated as 1.
    pub batch_size: usize,
    /// Deadline for a single source call.
    pub task_timeout: Option<Duration>,
    pub matcher: MatcherOptions,
    pub sentiment: SentimentMode,
    /// Extract list rankings from responses.
    pub rankings: bool,
    pub confidence: ConfidenceModel,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: 3,
            task_timeout: Some(Duration::from_secs(120)),
            matcher: MatcherOptions::default(),
            sentiment: SentimentMode::Neutral,
            rankings: true,
            confidence: ConfidenceModel::default(),
        }
    }
}

impl PipelineConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            batch_size: config.general.batch_size,
            task_timeout: config.task_timeout(),
            matcher: MatcherOptions::from(&config.matcher),
            sentiment: config.analysis.sentiment,
            rankings: config.analysis.rankings,
            confidence: config.analysis.confidence_model(),
        }
    }

    fn ranking_strategy(&self) -> Box<dyn RankingStrategy> {
        if self.rankings {
            Box::new(ListMarkerRanking)
        } else {
            Box::new(NoRanking)
        }
    }

    fn sentiment_classifier(&self) -> Box<dyn SentimentClassifier> {
        match self.sentiment {
            SentimentMode::Neutral => Box::new(NeutralSentiment),
            SentimentMode::Lexicon => Box::new(LexiconSentiment),
        }
    }
}

/// What to analyze.
#[derive(Debug, Clone, Default)]
pub struct AnalysisRequest {
    pub brands: BrandSet,
    /// Explicit prompts. When empty, `templates` are expanded.
    pub prompts: Vec<String>,
    pub category: String,
    pub templates: Vec<String>,
}

impl AnalysisRequest {
    pub fn new(brands: BrandSet, prompts: Vec<String>) -> Self {
        Self {
            brands,
            prompts,
            ..Default::default()
        }
    }

    pub fn with_templates(mut self, category: impl Into<String>, templates: Vec<String>) -> Self {
        self.category = category.into();
        self.templates = templates;
        self
    }

    pub fn from_config(config: &Config) -> Self {
        let brands = BrandSet::new(&config.brand.target, config.brand.competitors.clone())
            .with_aliases(config.brand.aliases.clone());
        Self::new(brands, config.prompts.queries.clone())
            .with_templates(&config.brand.category, config.prompts.templates.clone())
    }

    /// The prompts this request will send.
    pub fn resolved_prompts(&self) -> Vec<String> {
        let ctx = PromptContext {
            brand: &self.brands.target,
            category: &self.category,
            competitors: &self.brands.competitors,
        };
        resolve_prompts(&self.prompts, &self.templates, &ctx)
    }
}

/// The cartesian task set, prompt-major.
pub fn plan_tasks(prompts: &[String], source_ids: &[&str]) -> Vec<AnalysisTask> {
    prompts
        .iter()
        .flat_map(|prompt| {
            source_ids.iter().map(move |id| AnalysisTask {
                prompt: prompt.clone(),
                source_id: id.to_string(),
            })
        })
        .collect()
}

/// Results collected by concurrent tasks, keyed by task index.
#[derive(Default)]
struct RunState {
    responses: Vec<(usize, ResponseAnalysis)>,
    errors: Vec<(usize, TaskError)>,
    skipped: Vec<String>,
    completed: usize,
}

impl RunState {
    fn is_skipped(&self, source_id: &str) -> bool {
        self.skipped.iter().any(|s| s == source_id)
    }
}

/// Runs analysis requests against a set of sources.
pub struct Orchestrator {
    config: PipelineConfig,
    context: RunContext,
    sink: Arc<dyn ProgressSink>,
    cancel: CancellationToken,
}

impl Orchestrator {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            context: RunContext::default(),
            sink: Arc::new(NullSink),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_context(mut self, context: RunContext) -> Self {
        self.context = context;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that stops the run at the next batch boundary.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    fn emit(&self, kind: ProgressKind, stage: Stage, data: Value) {
        self.sink.emit(ProgressEvent::new(kind, stage, data));
    }

    fn advance(&self, stage: &mut Stage, data: Value) {
        if let Some(next) = stage.next() {
            *stage = next;
            info!(stage = %next, "{}", next.description());
            self.emit(ProgressKind::Stage, next, data);
        }
    }

    /// Report a fatal failure as the terminal event of the stream.
    fn abort(&self, stage: Stage, err: PipelineError) -> PipelineError {
        error!(stage = %stage, "Analysis aborted: {}", err);
        self.emit(
            ProgressKind::Error,
            stage,
            json!({ "message": err.to_string() }),
        );
        err
    }

    /// Run one analysis.
    ///
    /// Fails only when there is no source to query or the alias matcher
    /// cannot be built. Either way a single `Error` event ends the stream
    /// and nothing is scheduled.
    pub async fn run(
        &self,
        request: &AnalysisRequest,
        sources: &[Arc<dyn TextSource>],
    ) -> Result<AnalysisResult, PipelineError> {
        if sources.is_empty() {
            return Err(self.abort(Stage::Init, PipelineError::NoSourcesAvailable));
        }

        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let source_ids: Vec<&str> = sources.iter().map(|s| s.id()).collect();

        let mut stage = Stage::Init;
        info!(%run_id, sources = sources.len(), "Starting analysis run");
        self.emit(
            ProgressKind::Stage,
            stage,
            json!({ "run_id": run_id, "sources": source_ids }),
        );

        // Identifying: resolve aliases and build the analyzer.
        self.advance(&mut stage, json!({ "brands": request.brands.tracked().len() }));
        let brands = self.identify_brands(&request.brands).await;
        let analyzer = ResponseAnalyzer::new(&brands, self.config.matcher.clone())
            .map_err(|e| self.abort(stage, e.into()))?
            .with_ranking(self.config.ranking_strategy())
            .with_sentiment(self.config.sentiment_classifier())
            .with_confidence(self.config.confidence);

        // Generating: prompts and the task plan.
        let prompts = request.resolved_prompts();
        let tasks = plan_tasks(&prompts, &source_ids);
        self.advance(
            &mut stage,
            json!({ "prompts": prompts.len(), "sources": sources.len(), "tasks": tasks.len() }),
        );

        // Analyzing: batch-barrier execution.
        let batch_size = self.config.batch_size.max(1);
        self.advance(
            &mut stage,
            json!({ "tasks": tasks.len(), "batch_size": batch_size }),
        );
        let by_id: HashMap<&str, &dyn TextSource> =
            sources.iter().map(|s| (s.id(), s.as_ref())).collect();
        let state = Mutex::new(RunState::default());
        let total = tasks.len();
        let mut cancelled = false;

        let indexed: Vec<(usize, &AnalysisTask)> = tasks.iter().enumerate().collect();
        for (batch_no, batch) in indexed.chunks(batch_size).enumerate() {
            if self.cancel.is_cancelled() {
                warn!(batch = batch_no, "Run cancelled, skipping remaining batches");
                cancelled = true;
                break;
            }
            debug!(batch = batch_no, tasks = batch.len(), "Starting batch");

            let runs = batch.iter().filter_map(|&(index, task)| {
                by_id.get(task.source_id.as_str()).map(|&source| {
                    self.run_task(index, task, source, &analyzer, &state, total)
                })
            });
            join_all(runs).await;
        }

        // Extracting: restore task order.
        let RunState {
            mut responses,
            mut errors,
            skipped,
            ..
        } = state.into_inner();
        responses.sort_by_key(|(index, _)| *index);
        errors.sort_by_key(|(index, _)| *index);
        let responses: Vec<ResponseAnalysis> = responses.into_iter().map(|(_, r)| r).collect();
        let errors: Vec<TaskError> = errors.into_iter().map(|(_, e)| e).collect();
        self.advance(
            &mut stage,
            json!({
                "responses": responses.len(),
                "errors": errors.len(),
                "skipped_sources": skipped,
            }),
        );

        // Scoring
        let tracked = analyzer.tracked().to_vec();
        let competitors = aggregate(&responses, &tracked);
        let owned_ids: Vec<String> = source_ids.iter().map(|s| s.to_string()).collect();
        let provider_breakdown = aggregate_by_source(&responses, &tracked, &owned_ids);
        self.advance(&mut stage, json!({ "brands": competitors.len() }));

        // Finalizing
        self.advance(&mut stage, Value::Null);
        let result = AnalysisResult {
            run_id,
            started_at,
            finished_at: Utc::now(),
            responses,
            competitors,
            provider_breakdown,
            errors,
            skipped_sources: skipped,
            usage: self.context.usage.snapshot(),
            cancelled,
        };

        self.advance(&mut stage, Value::Null);
        info!(
            %run_id,
            responses = result.responses.len(),
            errors = result.errors.len(),
            skipped = result.skipped_sources.len(),
            cancelled,
            "Analysis run complete"
        );
        self.emit(
            ProgressKind::Complete,
            stage,
            json!({
                "run_id": run_id,
                "responses": result.responses.len(),
                "errors": result.errors.len(),
                "skipped_sources": result.skipped_sources,
                "cancelled": cancelled,
                "duration_seconds": result.duration_seconds(),
            }),
        );

        Ok(result)
    }

    /// Merge configured aliases with the ones the alias cache resolves.
    async fn identify_brands(&self, brands: &BrandSet) -> BrandSet {
        let names: Vec<String> = brands.tracked().into_iter().map(|b| b.name).collect();
        let resolved = self.context.aliases.resolve_all(&names).await;

        let mut merged: HashMap<String, Vec<String>> = HashMap::new();
        for name in names {
            let mut aliases = brands.aliases.get(&name).cloned().unwrap_or_default();
            for alias in resolved.get(&name).into_iter().flatten() {
                if !aliases.contains(alias) {
                    aliases.push(alias.clone());
                }
            }
            debug!(brand = %name, aliases = aliases.len(), "Resolved aliases");
            merged.insert(name, aliases);
        }

        brands.clone().with_aliases(merged)
    }

    async fn run_task(
        &self,
        index: usize,
        task: &AnalysisTask,
        source: &dyn TextSource,
        analyzer: &ResponseAnalyzer,
        state: &Mutex<RunState>,
        total: usize,
    ) {
        let source_id = source.id();

        let outcome = if state.lock().is_skipped(source_id) {
            debug!(source = source_id, "Source skipped, not calling");
            TaskOutcome::Skipped
        } else {
            self.context.usage.record_attempt(source_id);
            match self.call_source(source, &task.prompt).await {
                Ok(raw) => {
                    self.context.usage.record_success(source_id);
                    let mut analysis = analyzer.analyze(source_id, &task.prompt, &raw.text);
                    analysis.cited_sources = raw.sources;

                    self.emit(
                        ProgressKind::PartialResult,
                        Stage::Analyzing,
                        json!({
                            "source_id": source_id,
                            "prompt": task.prompt,
                            "brand_mentioned": analysis.brand_mentioned,
                            "brand_position": analysis.brand_position,
                            "competitors": analysis.competitors,
                            "confidence": analysis.confidence,
                        }),
                    );
                    state.lock().responses.push((index, analysis));
                    TaskOutcome::Success
                }
                Err(e) if e.is_auth() => {
                    self.context.usage.record_failure(source_id);
                    let mut guard = state.lock();
                    if !guard.is_skipped(source_id) {
                        warn!(source = source_id, "Skipping source for this run: {}", e);
                        guard.skipped.push(source_id.to_string());
                    }
                    TaskOutcome::Skipped
                }
                Err(e) => {
                    self.context.usage.record_failure(source_id);
                    warn!(source = source_id, "Task failed: {}", e);
                    state.lock().errors.push((
                        index,
                        TaskError {
                            source_id: source_id.to_string(),
                            prompt: task.prompt.clone(),
                            message: e.to_string(),
                        },
                    ));
                    TaskOutcome::Failed
                }
            }
        };

        let completed = {
            let mut guard = state.lock();
            guard.completed += 1;
            guard.completed
        };
        let percent = if total == 0 {
            100.0
        } else {
            completed as f64 / total as f64 * 100.0
        };
        debug!(source = source_id, ?outcome, completed, total, "Task finished");
        self.emit(
            ProgressKind::Progress,
            Stage::Analyzing,
            json!({
                "completed": completed,
                "total": total,
                "percent": percent,
                "source_id": source_id,
                "prompt": task.prompt,
                "outcome": outcome,
            }),
        );
    }

    async fn call_source(
        &self,
        source: &dyn TextSource,
        prompt: &str,
    ) -> Result<RawResponse, ProviderError> {
        match self.config.task_timeout {
            Some(deadline) => tokio::time::timeout(deadline, source.call(prompt))
                .await
                .unwrap_or_else(|_| {
                    Err(ProviderError::transient(
                        source.id(),
                        format!("no response within {}s", deadline.as_secs_f64()),
                    ))
                }),
            None => source.call(prompt).await,
        }
    }
}

/// Run one analysis with explicit prompts and a fresh run context.
pub async fn run_analysis(
    prompts: &[String],
    sources: &[Arc<dyn TextSource>],
    brands: &BrandSet,
    config: PipelineConfig,
    sink: Arc<dyn ProgressSink>,
) -> Result<AnalysisResult, PipelineError> {
    let request = AnalysisRequest::new(brands.clone(), prompts.to_vec());
    Orchestrator::new(config)
        .with_sink(sink)
        .run(&request, sources)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_tasks_is_cartesian() {
        let prompts = vec!["a".to_string(), "b".to_string()];
        let tasks = plan_tasks(&prompts, &["x", "y", "z"]);
        assert_eq!(tasks.len(), 6);
        assert_eq!(tasks[0].prompt, "a");
        assert_eq!(tasks[0].source_id, "x");
        assert_eq!(tasks[3].prompt, "b");
        assert_eq!(tasks[3].source_id, "x");
    }

    #[test]
    fn test_request_from_config() {
        let mut config = Config::default();
        config.brand.target = "Rolex".to_string();
        config.brand.category = "watch".to_string();
        config.brand.competitors = vec!["Omega".to_string()];

        let request = AnalysisRequest::from_config(&config);
        let prompts = request.resolved_prompts();
        assert_eq!(prompts.len(), 3);
        assert!(prompts.contains(&"How does Rolex compare to Omega?".to_string()));

        config.prompts.queries = vec!["Best watch?".to_string()];
        let request = AnalysisRequest::from_config(&config);
        assert_eq!(request.resolved_prompts(), vec!["Best watch?"]);
    }

    #[test]
    fn test_pipeline_config_from_config() {
        let mut config = Config::default();
        config.general.batch_size = 7;
        config.general.task_timeout_seconds = None;
        config.analysis.rankings = false;

        let pipeline = PipelineConfig::from_config(&config);
        assert_eq!(pipeline.batch_size, 7);
        assert_eq!(pipeline.task_timeout, None);
        assert!(!pipeline.rankings);
    }

    #[test]
    fn test_abort_ends_stream_with_error_event() {
        let sink = Arc::new(MemorySink::new());
        let orchestrator = Orchestrator::new(PipelineConfig::default()).with_sink(sink.clone());

        let err = orchestrator.abort(Stage::Identifying, PipelineError::NoSourcesAvailable);
        assert!(matches!(err, PipelineError::NoSourcesAvailable));

        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, ProgressKind::Error);
        assert_eq!(events[0].stage, Stage::Identifying);
        assert_eq!(events[0].data["message"], "no text sources are available");
    }
}
