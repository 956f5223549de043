//! Stack-based report builder reacting to lifecycle events.
//!
//! The builder owns the report tree and the open-step stack for exactly one
//! run. Steps live in an indexable frame arena while open; the nested tree
//! is assembled once, when the run closes. Every event is forwarded to the
//! next sink in the chain after local handling, whatever the local outcome.

use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Result;
use serde_json::Value;

use crate::codec::{marshal, MarshalOptions};
use crate::report::{Report, Step};
use crate::severity::Severity;
use crate::sink::{ExecutorRef, ScriptRef, Sink, Validation};

/// Epoch-millisecond wall clock; a clock before the epoch collapses to 0.
fn now_epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Running,
    Closed,
}

/// Step frame held in the arena while the run is in flight. Children are
/// recorded as arena indices; a child index is always greater than its
/// parent's.
#[derive(Debug)]
struct Frame {
    step: Step,
    children: Vec<usize>,
}

/// Builds one [`Report`] per run from lifecycle events.
///
/// The report is emitted exactly once, at normal or abnormal run end: it is
/// marshaled pretty-printed and handed to the next sink's print operation.
/// Partial reports are never flushed mid-run.
pub struct ReportBuilder {
    phase: Phase,
    root: Option<String>,
    report: Report,
    frames: Vec<Frame>,
    open: Vec<usize>,
    top_level: Vec<usize>,
    validations: Vec<Validation>,
    next: Option<Box<dyn Sink>>,
}

impl ReportBuilder {
    pub fn new() -> Self {
        Self {
            phase: Phase::Idle,
            root: None,
            report: Report::default(),
            frames: Vec::new(),
            open: Vec::new(),
            top_level: Vec::new(),
            validations: Vec::new(),
            next: None,
        }
    }

    /// Chain this builder in front of another sink.
    pub fn with_next(next: Box<dyn Sink>) -> Self {
        Self {
            next: Some(next),
            ..Self::new()
        }
    }

    /// The report built so far. Nested steps are attached when the run
    /// closes; before that only run metadata and top-level messages are
    /// populated.
    pub fn report(&self) -> &Report {
        &self.report
    }

    pub fn into_report(self) -> Report {
        self.report
    }

    pub fn is_closed(&self) -> bool {
        self.phase == Phase::Closed
    }

    fn open_step(&mut self, id: &str) {
        let index = self.frames.len();
        self.frames.push(Frame {
            step: Step::open(id, now_epoch_ms()),
            children: Vec::new(),
        });
        match self.open.last().copied() {
            Some(parent) => {
                if let Some(frame) = self.frames.get_mut(parent) {
                    frame.children.push(index);
                }
            }
            None => self.top_level.push(index),
        }
        self.open.push(index);
    }

    /// Pop the innermost frame and grade it against the accumulated
    /// validations for `executor_id`. Popping an empty stack is a no-op:
    /// the driving interpreter is not trusted to pair before/after calls.
    fn close_step(&mut self, executor_id: &str) {
        let severity = self
            .validations
            .iter()
            .filter(|validation| validation.executor_id == executor_id)
            .map(|validation| validation.severity)
            .max()
            .unwrap_or(Severity::Info);
        if let Some(index) = self.open.pop() {
            if let Some(frame) = self.frames.get_mut(index) {
                frame.step.severity = severity;
                frame.step.stopped = Some(now_epoch_ms());
            }
        }
    }

    /// Force-finalize every still-open frame, innermost first.
    fn unwind(&mut self) {
        if self.open.is_empty() {
            return;
        }
        tracing::warn!(
            open_steps = self.open.len(),
            "unwinding open steps after run failure"
        );
        let stopped = now_epoch_ms();
        while let Some(index) = self.open.pop() {
            if let Some(frame) = self.frames.get_mut(index) {
                frame.step.severity = Severity::Error;
                frame.step.stopped = Some(stopped);
            }
        }
    }

    /// Move the frame arena into the nested `steps` tree. The reverse pass
    /// sees every child finished before its parent collects it.
    fn attach_steps(&mut self) {
        let frames = std::mem::take(&mut self.frames);
        let mut built: Vec<Option<Step>> = frames.iter().map(|_| None).collect();
        let mut pending: Vec<Option<Frame>> = frames.into_iter().map(Some).collect();
        for index in (0..pending.len()).rev() {
            if let Some(frame) = pending.get_mut(index).and_then(Option::take) {
                let Frame { mut step, children } = frame;
                for child in children {
                    if let Some(child_step) = built.get_mut(child).and_then(Option::take) {
                        step.steps.push(child_step);
                    }
                }
                if let Some(slot) = built.get_mut(index) {
                    *slot = Some(step);
                }
            }
        }
        for index in std::mem::take(&mut self.top_level) {
            if let Some(step) = built.get_mut(index).and_then(Option::take) {
                self.report.steps.push(step);
            }
        }
    }
}

impl Default for ReportBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl Sink for ReportBuilder {
    fn on_start(&mut self, script: &ScriptRef) -> Result<()> {
        if self.phase == Phase::Idle {
            self.phase = Phase::Running;
            self.root = Some(script.name.clone());
            self.report.started = now_epoch_ms();
            self.report.title = Some(script.title().to_string());
            self.report.description = script.description.clone();
        }
        if let Some(next) = self.next.as_deref_mut() {
            next.on_start(script)?;
        }
        Ok(())
    }

    fn on_end(
        &mut self,
        script: &ScriptRef,
        started: Option<u64>,
        stopped: Option<u64>,
        failure: Option<&str>,
    ) -> Result<()> {
        // Only the recognized root closes the report; nested script ends are
        // forwarded untouched. A marshal or downstream print failure is held
        // until the end event itself has been forwarded.
        let mut emit_failure = None;
        if self.phase == Phase::Running && self.root.as_deref() == Some(script.name.as_str()) {
            if failure.is_some() {
                self.unwind();
            }
            self.report.stopped = Some(now_epoch_ms());
            self.attach_steps();
            self.phase = Phase::Closed;
            tracing::info!(
                steps = self.report.steps.len(),
                failed = failure.is_some(),
                "run closed"
            );
            match marshal(&self.report, &MarshalOptions::pretty()) {
                Ok(json) => {
                    if let Some(next) = self.next.as_deref_mut() {
                        if let Err(error) = next.on_print(&[Value::String(json)]) {
                            emit_failure = Some(error);
                        }
                    }
                }
                Err(error) => emit_failure = Some(error),
            }
        }
        if let Some(next) = self.next.as_deref_mut() {
            next.on_end(script, started, stopped, failure)?;
        }
        match emit_failure {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn on_before(&mut self, executor: &ExecutorRef) -> Result<()> {
        if self.phase == Phase::Running {
            if let Some(id) = executor.id() {
                self.open_step(id);
            }
        }
        if let Some(next) = self.next.as_deref_mut() {
            next.on_before(executor)?;
        }
        Ok(())
    }

    fn on_after(&mut self, executor: &ExecutorRef) -> Result<()> {
        if self.phase == Phase::Running {
            if let Some(id) = executor.id() {
                self.close_step(id);
            }
        }
        if let Some(next) = self.next.as_deref_mut() {
            next.on_after(executor)?;
        }
        Ok(())
    }

    fn on_validated(&mut self, validations: &[Validation]) -> Result<()> {
        self.validations.extend_from_slice(validations);
        if let Some(next) = self.next.as_deref_mut() {
            next.on_validated(validations)?;
        }
        Ok(())
    }

    fn on_print(&mut self, messages: &[Value]) -> Result<()> {
        if self.phase == Phase::Running && !messages.is_empty() {
            let target = match self
                .open
                .last()
                .copied()
                .and_then(|index| self.frames.get_mut(index))
            {
                Some(frame) => &mut frame.step.messages,
                None => &mut self.report.messages,
            };
            target.extend(messages.iter().cloned());
        }
        if let Some(next) = self.next.as_deref_mut() {
            next.on_print(messages)?;
        }
        Ok(())
    }

    fn on_attached(&mut self, attachments: &[Value]) -> Result<()> {
        // Attachments are not embedded in the report; they stay linkable
        // through step ids.
        if let Some(next) = self.next.as_deref_mut() {
            next.on_attached(attachments)?;
        }
        Ok(())
    }

    fn should_execute(&mut self, executor: &ExecutorRef) -> bool {
        match self.next.as_deref_mut() {
            Some(next) => next.should_execute(executor),
            None => true,
        }
    }
}
