//! Structured pipeline events
//!
//! Every stage emits a start event and then either a done or an error event.
//! Per-item failures that a stage absorbs are reported as `<stage>.failed`.
//! The sink is fire-and-forget; the default one forwards to `tracing`.

use serde::Serialize;
use serde_json::{json, Map, Value};
use std::fmt;
use std::future::Future;

/// Severity of a pipeline event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// One observability event
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineEvent {
    pub event: String,
    pub level: EventLevel,
    pub task_id: String,
    pub data: Value,
}

/// Structured logging sink, shared by every concurrent pipeline
pub trait EventSink: Send + Sync {
    fn event(&self, event: PipelineEvent);
}

/// Forwards pipeline events to the `tracing` subscriber
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn event(&self, event: PipelineEvent) {
        let PipelineEvent {
            event,
            level,
            task_id,
            data,
        } = event;

        match level {
            EventLevel::Debug => tracing::debug!(%event, %task_id, %data, "pipeline event"),
            EventLevel::Info => tracing::info!(%event, %task_id, %data, "pipeline event"),
            EventLevel::Warn => tracing::warn!(%event, %task_id, %data, "pipeline event"),
            EventLevel::Error => tracing::error!(%event, %task_id, %data, "pipeline event"),
        }
    }
}

/// The seven stages of a target pipeline, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    ListFetch,
    ListParse,
    Dedupe,
    DetailFetch,
    DetailParse,
    Merge,
    Save,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ListFetch => "list_fetch",
            Self::ListParse => "list_parse",
            Self::Dedupe => "dedupe",
            Self::DetailFetch => "detail_fetch",
            Self::DetailParse => "detail_parse",
            Self::Merge => "merge",
            Self::Save => "save",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Emits events about one subject (a target or a group) within one run
#[derive(Clone, Copy)]
pub struct EventScope<'a> {
    sink: &'a dyn EventSink,
    task_id: &'a str,
    subject: &'static str,
    descriptor: &'a Value,
}

impl<'a> EventScope<'a> {
    pub fn new(
        sink: &'a dyn EventSink,
        task_id: &'a str,
        subject: &'static str,
        descriptor: &'a Value,
    ) -> Self {
        Self {
            sink,
            task_id,
            subject,
            descriptor,
        }
    }

    pub fn task_id(&self) -> &str {
        self.task_id
    }

    /// Emits `name` with the subject descriptor merged into `data`
    pub fn emit(&self, name: &str, level: EventLevel, data: Value) {
        let mut subject = Map::new();
        subject.insert(self.subject.to_string(), self.descriptor.clone());
        let mut payload = Value::Object(subject);
        merge_into(&mut payload, data);
        self.sink.event(PipelineEvent {
            event: name.to_string(),
            level,
            task_id: self.task_id.to_string(),
            data: payload,
        });
    }

    /// Reports a failure the stage absorbed without aborting
    pub fn failed(&self, stage: Stage, data: Value) {
        self.emit(&format!("{}.failed", stage), EventLevel::Error, data);
    }

    /// Runs a stage between start and done/error events
    ///
    /// `summarize` contributes output fields (counts) to the done event.
    pub async fn observe<T, Fut, S>(
        &self,
        stage: Stage,
        input: Value,
        fut: Fut,
        summarize: S,
    ) -> crate::Result<T>
    where
        Fut: Future<Output = crate::Result<T>>,
        S: FnOnce(&T) -> Value,
    {
        self.emit(&format!("{}.start", stage), EventLevel::Debug, input.clone());

        match fut.await {
            Ok(output) => {
                let mut data = input;
                merge_into(&mut data, summarize(&output));
                self.emit(&format!("{}.done", stage), EventLevel::Info, data);
                Ok(output)
            }
            Err(error) => {
                let mut data = input;
                merge_into(&mut data, json!({ "error": error.to_string() }));
                self.emit(&format!("{}.error", stage), EventLevel::Error, data);
                Err(error)
            }
        }
    }
}

fn merge_into(base: &mut Value, extra: Value) {
    if let (Value::Object(base), Value::Object(extra)) = (base, extra) {
        base.extend(extra);
    }
}
