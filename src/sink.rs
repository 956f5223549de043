//! Lifecycle sink contract and the chain-terminal console sink.
//!
//! A sink consumes lifecycle events from the driving interpreter. Sinks
//! compose as a linked chain built before the run: each link handles the
//! event locally, then forwards it unchanged to the next link. Default
//! trait bodies are terminal-sink behavior, so leaf sinks only implement
//! what they consume.

use std::collections::BTreeMap;
use std::io::{self, Write};

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::severity::Severity;

/// Annotation key carrying the step identity for before/after correlation.
pub const ID_ANNOTATION: &str = "id";
/// Annotation key overriding the report title.
pub const TITLE_ANNOTATION: &str = "title";

/// Script reference passed on run start and end.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScriptRef {
    pub name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ScriptRef {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            annotations: BTreeMap::new(),
            description: None,
        }
    }

    /// Report title: an explicit `title` annotation wins, else the script name.
    pub fn title(&self) -> &str {
        self.annotations
            .get(TITLE_ANNOTATION)
            .map(String::as_str)
            .unwrap_or(&self.name)
    }
}

/// Executor reference passed on step enter and exit. Identity comes from
/// the `id` annotation; executors without one never become steps.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExecutorRef {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

impl ExecutorRef {
    pub fn with_id(id: impl Into<String>) -> Self {
        let mut annotations = BTreeMap::new();
        annotations.insert(ID_ANNOTATION.to_string(), id.into());
        Self { annotations }
    }

    pub fn id(&self) -> Option<&str> {
        self.annotations.get(ID_ANNOTATION).map(String::as_str)
    }
}

/// Outcome record correlating an executor with a severity. Matched, never
/// consumed, when a step with the same executor id closes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Validation {
    pub executor_id: String,
    pub severity: Severity,
}

/// Consumer of lifecycle events.
///
/// Mutating operations handle the event locally first and then forward the
/// same arguments to the next sink in the chain, regardless of the local
/// outcome. `should_execute` is the one pure query: intermediate links
/// delegate and must not change the terminal verdict.
pub trait Sink {
    fn on_start(&mut self, _script: &ScriptRef) -> Result<()> {
        Ok(())
    }

    fn on_end(
        &mut self,
        _script: &ScriptRef,
        _started: Option<u64>,
        _stopped: Option<u64>,
        _failure: Option<&str>,
    ) -> Result<()> {
        Ok(())
    }

    fn on_before(&mut self, _executor: &ExecutorRef) -> Result<()> {
        Ok(())
    }

    fn on_after(&mut self, _executor: &ExecutorRef) -> Result<()> {
        Ok(())
    }

    fn on_validated(&mut self, _validations: &[Validation]) -> Result<()> {
        Ok(())
    }

    fn on_print(&mut self, _messages: &[Value]) -> Result<()> {
        Ok(())
    }

    fn on_attached(&mut self, _attachments: &[Value]) -> Result<()> {
        Ok(())
    }

    /// Execution gate for an executor; the terminal sink decides.
    fn should_execute(&mut self, _executor: &ExecutorRef) -> bool {
        true
    }
}

/// Terminal sink writing printed messages line-by-line to a writer.
pub struct ConsoleSink<W: Write> {
    out: W,
}

impl ConsoleSink<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> ConsoleSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl<W: Write> Sink for ConsoleSink<W> {
    fn on_print(&mut self, messages: &[Value]) -> Result<()> {
        for message in messages {
            match message {
                Value::String(text) => writeln!(self.out, "{text}")?,
                other => writeln!(self.out, "{other}")?,
            }
        }
        Ok(())
    }
}
