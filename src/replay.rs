//! Recorded lifecycle event logs.
//!
//! A log is an ordered JSON array of tagged events, one per lifecycle call
//! the driving interpreter made. Replaying a log through a sink chain
//! rebuilds the same report the live run would have produced.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::sink::{ExecutorRef, ScriptRef, Sink, Validation};

/// One recorded lifecycle call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LifecycleEvent {
    Start {
        script: ScriptRef,
    },
    End {
        script: ScriptRef,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        started: Option<u64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stopped: Option<u64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        failure: Option<String>,
    },
    Before {
        executor: ExecutorRef,
    },
    After {
        executor: ExecutorRef,
    },
    Validated {
        validations: Vec<Validation>,
    },
    Print {
        messages: Vec<Value>,
    },
    Attached {
        attachments: Vec<Value>,
    },
}

/// Feed a recorded log through a sink chain, in order.
pub fn replay(events: &[LifecycleEvent], sink: &mut dyn Sink) -> Result<()> {
    for event in events {
        match event {
            LifecycleEvent::Start { script } => sink.on_start(script)?,
            LifecycleEvent::End {
                script,
                started,
                stopped,
                failure,
            } => sink.on_end(script, *started, *stopped, failure.as_deref())?,
            LifecycleEvent::Before { executor } => sink.on_before(executor)?,
            LifecycleEvent::After { executor } => sink.on_after(executor)?,
            LifecycleEvent::Validated { validations } => sink.on_validated(validations)?,
            LifecycleEvent::Print { messages } => sink.on_print(messages)?,
            LifecycleEvent::Attached { attachments } => sink.on_attached(attachments)?,
        }
    }
    Ok(())
}
