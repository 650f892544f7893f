use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStep {
    LoadData,
    Split,
    Train,
    Validate,
}

impl PipelineStep {
    pub const ALL: [Self; 4] = [Self::LoadData, Self::Split, Self::Train, Self::Validate];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LoadData => "load_data",
            Self::Split => "split",
            Self::Train => "train",
            Self::Validate => "validate",
        }
    }
}

impl fmt::Display for PipelineStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    Started { run_id: String },
    StepStarted { run_id: String, step: PipelineStep, index: u64, total: u64 },
    StepFinished { run_id: String, step: PipelineStep, output: String },
    Finished { run_id: String },
    Failed { run_id: String, error: String },
}

pub trait ProgressSink: Send + Sync {
    fn on_event(&self, event: ProgressEvent);
}

#[derive(Debug, Default)]
pub struct StdoutProgressSink;

impl ProgressSink for StdoutProgressSink {
    fn on_event(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::Started { run_id } => println!("[run:{run_id}] started"),
            ProgressEvent::StepStarted { run_id, step, index, total } => {
                println!("[run:{run_id}] step {index}/{total}: {step}");
            }
            ProgressEvent::StepFinished { run_id, step, output } => {
                println!("[run:{run_id}] {step} -> {output}");
            }
            ProgressEvent::Finished { run_id } => println!("[run:{run_id}] finished"),
            ProgressEvent::Failed { run_id, error } => println!("[run:{run_id}] failed: {error}"),
        }
    }
}

/// Forwards events to `tracing` instead of stdout.
#[derive(Debug, Default)]
pub struct TracingProgressSink;

impl ProgressSink for TracingProgressSink {
    fn on_event(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::Failed { run_id, error } => tracing::error!(%run_id, %error, "pipeline failed"),
            other => tracing::info!(event = ?other, "pipeline progress"),
        }
    }
}

/// Keeps every event; handy for tests and for `--json` output.
#[derive(Debug, Default)]
pub struct CollectingProgressSink {
    events: Mutex<Vec<ProgressEvent>>,
}

impl CollectingProgressSink {
    #[must_use]
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

impl ProgressSink for CollectingProgressSink {
    fn on_event(&self, event: ProgressEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
