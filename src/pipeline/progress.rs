//! Progress events emitted by the pipeline.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use tokio::sync::mpsc::UnboundedSender;

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Init,
    Identifying,
    Generating,
    Analyzing,
    Extracting,
    Scoring,
    Finalizing,
    Done,
}

impl Stage {
    /// The stage that follows this one. `Done` is terminal.
    pub fn next(self) -> Option<Stage> {
        match self {
            Stage::Init => Some(Stage::Identifying),
            Stage::Identifying => Some(Stage::Generating),
            Stage::Generating => Some(Stage::Analyzing),
            Stage::Analyzing => Some(Stage::Extracting),
            Stage::Extracting => Some(Stage::Scoring),
            Stage::Scoring => Some(Stage::Finalizing),
            Stage::Finalizing => Some(Stage::Done),
            Stage::Done => None,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Stage::Init => "Checking sources",
            Stage::Identifying => "Resolving brand aliases",
            Stage::Generating => "Preparing prompts",
            Stage::Analyzing => "Querying sources",
            Stage::Extracting => "Collecting responses",
            Stage::Scoring => "Scoring brands",
            Stage::Finalizing => "Building result",
            Stage::Done => "Done",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Init => "init",
            Stage::Identifying => "identifying",
            Stage::Generating => "generating",
            Stage::Analyzing => "analyzing",
            Stage::Extracting => "extracting",
            Stage::Scoring => "scoring",
            Stage::Finalizing => "finalizing",
            Stage::Done => "done",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressKind {
    /// Entered a new stage.
    Stage,
    /// A task finished (success, skip or failure).
    Progress,
    /// A task produced an analyzed response.
    PartialResult,
    /// The run could not start.
    Error,
    /// The run finished.
    Complete,
}

/// How a task ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskOutcome {
    Success,
    Skipped,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
    #[serde(rename = "type")]
    pub kind: ProgressKind,
    pub stage: Stage,
    pub data: Value,
    pub timestamp: DateTime<Utc>,
}

impl ProgressEvent {
    pub fn new(kind: ProgressKind, stage: Stage, data: Value) -> Self {
        Self {
            kind,
            stage,
            data,
            timestamp: Utc::now(),
        }
    }
}

/// Consumer of the progress stream. Delivery is best-effort; a sink must
/// not block the pipeline.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: ProgressEvent);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn emit(&self, _event: ProgressEvent) {}
}

/// Forwards events to an unbounded channel. Events sent after the receiver
/// is dropped are lost.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: UnboundedSender<ProgressEvent>,
}

impl ChannelSink {
    pub fn new(tx: UnboundedSender<ProgressEvent>) -> Self {
        Self { tx }
    }
}

impl ProgressSink for ChannelSink {
    fn emit(&self, event: ProgressEvent) {
        let _ = self.tx.send(event);
    }
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<ProgressEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().clone()
    }

    pub fn count(&self, kind: ProgressKind) -> usize {
        self.events.lock().iter().filter(|e| e.kind == kind).count()
    }
}

impl ProgressSink for MemorySink {
    fn emit(&self, event: ProgressEvent) {
        self.events.lock().push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_stage_order() {
        let mut stages = vec![Stage::Init];
        while let Some(next) = stages.last().and_then(|s| s.next()) {
            stages.push(next);
        }
        assert_eq!(stages.len(), 8);
        assert_eq!(stages.last(), Some(&Stage::Done));
        assert!(stages.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_event_serialization() {
        let event = ProgressEvent::new(
            ProgressKind::PartialResult,
            Stage::Analyzing,
            json!({"completed": 1}),
        );
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "partial_result");
        assert_eq!(value["stage"], "analyzing");
        assert_eq!(value["data"]["completed"], 1);
    }

    #[tokio::test]
    async fn test_channel_sink_preserves_order() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let sink = ChannelSink::new(tx);
        sink.emit(ProgressEvent::new(ProgressKind::Stage, Stage::Init, Value::Null));
        sink.emit(ProgressEvent::new(ProgressKind::Complete, Stage::Done, Value::Null));
        drop(sink);

        assert_eq!(rx.recv().await.map(|e| e.stage), Some(Stage::Init));
        assert_eq!(rx.recv().await.map(|e| e.stage), Some(Stage::Done));
        assert!(rx.recv().await.is_none());
    }

    #[test]
    fn test_channel_sink_ignores_closed_receiver() {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        drop(rx);
        ChannelSink::new(tx).emit(ProgressEvent::new(
            ProgressKind::Stage,
            Stage::Init,
            Value::Null,
        ));
    }
}
