//! Structured execution reports for scripted runs.
//!
//! A driving interpreter emits lifecycle events: run start and end, step
//! enter and exit, printed messages, validation outcomes. Sinks consume
//! those events and compose into chains, so several consumers observe the
//! identical stream. [`ReportBuilder`] is the sink that assembles the
//! events into a nested, JSON-serializable [`Report`] graded by
//! [`Severity`]; the [`codec`] module renders value trees to JSON text and
//! leniently parses JSON text back into generic trees.

pub mod builder;
pub mod codec;
pub mod replay;
pub mod report;
pub mod severity;
pub mod sink;

pub use builder::ReportBuilder;
pub use report::{Report, Step};
pub use severity::Severity;
pub use sink::{ConsoleSink, ExecutorRef, ScriptRef, Sink, Validation};
