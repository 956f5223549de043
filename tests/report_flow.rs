//! End-to-end lifecycle flows driven through the public API.

use run_report::codec::{marshal, MarshalOptions};
use run_report::replay::{replay, LifecycleEvent};
use run_report::{ExecutorRef, ReportBuilder, ScriptRef, Severity, Sink};
use serde_json::Value;

fn parse_events(text: &str) -> Vec<LifecycleEvent> {
    serde_json::from_str(text).expect("parse event log")
}

#[test]
fn passing_run_produces_the_documented_layout() {
    let events = parse_events(
        r#"[
        {"event": "start", "script": {
            "name": "suite",
            "annotations": {"title": "Nightly checks"},
            "description": "runs the nightly checks"
        }},
        {"event": "print", "messages": ["booting"]},
        {"event": "before", "executor": {"annotations": {"id": "a"}}},
        {"event": "print", "messages": ["hello"]},
        {"event": "validated", "validations": [{"executor_id": "a", "severity": "WARNING"}]},
        {"event": "after", "executor": {"annotations": {"id": "a"}}},
        {"event": "end", "script": {"name": "suite"}}
    ]"#,
    );
    let mut builder = ReportBuilder::new();
    replay(&events, &mut builder).unwrap();
    assert!(builder.is_closed());

    let report = builder.report();
    assert_eq!(report.title.as_deref(), Some("Nightly checks"));
    assert_eq!(report.description.as_deref(), Some("runs the nightly checks"));
    assert!(!report.has_failures());

    let rendered = marshal(report, &MarshalOptions::default()).unwrap();
    let document: Value = serde_json::from_str(&rendered).unwrap();
    let mut root_keys: Vec<&String> = document.as_object().unwrap().keys().collect();
    root_keys.sort();
    assert_eq!(
        root_keys,
        vec![
            "description",
            "messages",
            "started",
            "steps",
            "stopped",
            "title"
        ]
    );
    assert_eq!(document["messages"], serde_json::json!(["booting"]));

    let step = &document["steps"][0];
    let mut step_keys: Vec<&String> = step.as_object().unwrap().keys().collect();
    step_keys.sort();
    assert_eq!(
        step_keys,
        vec!["id", "messages", "severity", "started", "stopped"]
    );
    assert_eq!(step["id"], serde_json::json!("a"));
    assert_eq!(step["severity"], serde_json::json!("WARNING"));
    assert_eq!(step["messages"], serde_json::json!(["hello"]));
}

#[test]
fn failing_run_unwinds_open_steps() {
    let events = parse_events(
        r#"[
        {"event": "start", "script": {"name": "suite"}},
        {"event": "before", "executor": {"annotations": {"id": "a"}}},
        {"event": "before", "executor": {"annotations": {"id": "b"}}},
        {"event": "end", "script": {"name": "suite"}, "failure": "interpreter died"}
    ]"#,
    );
    let mut builder = ReportBuilder::new();
    replay(&events, &mut builder).unwrap();

    let report = builder.report();
    assert!(report.has_failures());
    assert_eq!(report.steps.len(), 1);
    let outer = &report.steps[0];
    assert_eq!(outer.id, "a");
    assert_eq!(outer.severity, Severity::Error);
    assert_eq!(outer.steps.len(), 1);
    let inner = &outer.steps[0];
    assert_eq!(inner.id, "b");
    assert_eq!(inner.severity, Severity::Error);

    let report_stopped = report.stopped.expect("report stopped");
    assert!(outer.stopped.expect("outer stopped") <= report_stopped);
    assert!(inner.stopped.expect("inner stopped") <= report_stopped);
}

#[test]
fn nesting_depth_follows_the_call_order() {
    let events = parse_events(
        r#"[
        {"event": "start", "script": {"name": "suite"}},
        {"event": "before", "executor": {"annotations": {"id": "a"}}},
        {"event": "before", "executor": {"annotations": {"id": "b"}}},
        {"event": "before", "executor": {"annotations": {"id": "c"}}},
        {"event": "after", "executor": {"annotations": {"id": "c"}}},
        {"event": "after", "executor": {"annotations": {"id": "b"}}},
        {"event": "before", "executor": {"annotations": {"id": "d"}}},
        {"event": "after", "executor": {"annotations": {"id": "d"}}},
        {"event": "after", "executor": {"annotations": {"id": "a"}}},
        {"event": "end", "script": {"name": "suite"}}
    ]"#,
    );
    let mut builder = ReportBuilder::new();
    replay(&events, &mut builder).unwrap();

    let report = builder.report();
    assert_eq!(report.steps.len(), 1);
    let a = &report.steps[0];
    let children: Vec<&str> = a.steps.iter().map(|step| step.id.as_str()).collect();
    assert_eq!(children, vec!["b", "d"]);
    assert_eq!(a.steps[0].steps[0].id, "c");
    assert!(a.steps[1].steps.is_empty());
}

#[test]
fn terminal_verdict_passes_through_three_sinks() {
    struct Deny;

    impl Sink for Deny {
        fn should_execute(&mut self, _executor: &ExecutorRef) -> bool {
            false
        }
    }

    let middle = ReportBuilder::with_next(Box::new(Deny));
    let mut chain = ReportBuilder::with_next(Box::new(middle));
    assert!(!chain.should_execute(&ExecutorRef::with_id("a")));
}

#[test]
fn start_sets_report_metadata_exactly_once() {
    let root = ScriptRef::named("root");
    let nested = ScriptRef::named("nested");
    let mut builder = ReportBuilder::new();

    builder.on_start(&root).unwrap();
    let started = builder.report().started;
    builder.on_start(&nested).unwrap();
    assert_eq!(builder.report().started, started);
    assert_eq!(builder.report().title.as_deref(), Some("root"));

    // nested end does not close the run
    builder.on_end(&nested, None, None, None).unwrap();
    assert!(!builder.is_closed());
    builder.on_end(&root, None, None, None).unwrap();
    assert!(builder.is_closed());
}
