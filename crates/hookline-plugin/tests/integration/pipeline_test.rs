//! Pipeline tests: chain composition, veto, abort, and binding changes.

use std::path::Path;

use serde_json::json;

use hookline_plugin::hooks::HookPosition;
use hookline_plugin::params::{ParamMap, ParamSchema};
use hookline_plugin::pipeline::{PipelineState, StageStatus};
use hookline_plugin::stage::FailurePolicy;

use crate::helpers::{CallLog, HookTree, pipeline, recording_stage};

#[test]
fn test_call_chain_follows_directory_registration_order() {
    let tree = HookTree::new();
    tree.write("b1/one.hook", "true");
    tree.write("b1/two.hook", "true");
    tree.write("b2/three.hook", "true");
    tree.write("a1/after.hook", "true");

    let log = CallLog::new();
    let mut p = pipeline(&log);
    p.append(recording_stage("S", ParamSchema::new(), 0, &log)).unwrap();
    p.bind_hooks("S", tree.join("b1"), false, None).unwrap();
    p.bind_hooks("S", tree.join("b2"), false, Some(HookPosition::Before)).unwrap();
    p.bind_hooks("S", tree.join("a1"), false, Some(HookPosition::After)).unwrap();

    assert_eq!(p.call_chain("S"), vec!["one", "two", "three", "S", "after"]);
}

#[tokio::test]
async fn test_falsy_before_hook_skips_stage_and_after_hooks() {
    let tree = HookTree::new();
    tree.write("before/H.hook", "false");
    tree.write("after/A.hook", "true");

    let log = CallLog::new();
    let mut p = pipeline(&log);
    p.append(
        recording_stage("S", ParamSchema::new().required("a").required("b"), 0, &log),
    )
    .unwrap();
    p.append(recording_stage("T", ParamSchema::new(), 0, &log)).unwrap();
    p.set_stage_params("S", ParamMap::from([("a".into(), json!(1)), ("b".into(), json!(2))]))
        .unwrap();
    p.bind_hooks("S", tree.join("before"), false, None).unwrap();
    p.bind_hooks("S", tree.join("after"), false, Some(HookPosition::After)).unwrap();

    let report = p.run().await;

    assert_eq!(log.entries(), vec!["hook:H", "stage:T"]);
    assert_eq!(
        report.stage("S").unwrap().status,
        StageStatus::Vetoed {
            hook: "H".to_string()
        }
    );
    assert_eq!(report.stage("T").unwrap().status, StageStatus::Completed);
    assert!(!report.is_aborted());
    assert_eq!(p.state(), PipelineState::Idle);
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn test_unreadable_sibling_keeps_gate_in_place() {
    let tree = HookTree::new();
    tree.write("before/gate.hook", "false");
    std::os::unix::fs::symlink("/proc/self/mem", tree.join("before/zz.hook")).unwrap();

    let log = CallLog::new();
    let mut p = pipeline(&log);
    p.append(recording_stage("S", ParamSchema::new(), 0, &log)).unwrap();
    p.bind_hooks("S", tree.join("before"), false, None).unwrap();

    assert_eq!(p.call_chain("S"), vec!["gate", "S"]);

    let report = p.run().await;
    assert_eq!(
        report.stage("S").unwrap().status,
        StageStatus::Vetoed {
            hook: "gate".to_string()
        }
    );
    assert_eq!(log.entries(), vec!["hook:gate"]);
}

#[tokio::test]
async fn test_abort_policy_stops_later_stages() {
    let log = CallLog::new();
    let mut p = pipeline(&log);
    p.append(recording_stage("S1", ParamSchema::new(), 1, &log)).unwrap();
    p.append(recording_stage("S2", ParamSchema::new(), 0, &log)).unwrap();
    p.set_failure_policy("S1", FailurePolicy::Abort).unwrap();

    let report = p.run().await;

    assert_eq!(log.entries(), vec!["stage:S1"]);
    assert_eq!(report.aborted_at.as_deref(), Some("S1"));
    assert_eq!(report.stage("S2").unwrap().status, StageStatus::NotRun);
    assert_eq!(p.state(), PipelineState::Aborted);
}

#[tokio::test]
async fn test_continue_policy_runs_later_stages() {
    let log = CallLog::new();
    let mut p = pipeline(&log);
    p.append(recording_stage("S1", ParamSchema::new(), 1, &log)).unwrap();
    p.append(recording_stage("S2", ParamSchema::new(), 0, &log)).unwrap();

    let report = p.run().await;

    assert_eq!(log.entries(), vec!["stage:S1", "stage:S2"]);
    assert!(matches!(
        report.stage("S1").unwrap().status,
        StageStatus::Failed {
            status_code: Some(1),
            ..
        }
    ));
    assert!(report.aborted_at.is_none());
}

#[tokio::test]
async fn test_after_hooks_skipped_for_failed_stage() {
    let tree = HookTree::new();
    tree.write("after/A.hook", "true");

    let log = CallLog::new();
    let mut p = pipeline(&log);
    p.append(recording_stage("S", ParamSchema::new(), 3, &log)).unwrap();
    p.bind_hooks("S", tree.join("after"), false, Some(HookPosition::After)).unwrap();

    p.run().await;
    assert_eq!(log.entries(), vec!["stage:S"]);
}

#[tokio::test]
async fn test_hook_parameters_bound_from_context() {
    let tree = HookTree::new();
    tree.write("before/needs.hook", "params: t1, t2");

    let log = CallLog::new();
    let mut p = pipeline(&log);
    p.append(recording_stage("S", ParamSchema::new(), 0, &log)).unwrap();
    p.bind_hooks("S", tree.join("before"), false, None).unwrap();

    p.set_context(ParamMap::from([("t1".into(), json!("new"))]));
    let report = p.run().await;
    let stage = report.stage("S").unwrap();
    assert!(matches!(stage.status, StageStatus::Vetoed { .. }));
    assert!(stage.hooks[0].error.as_deref().unwrap().contains("'t2'"));

    log.clear();
    p.extend_context(ParamMap::from([("t2".into(), json!("life"))]));
    let report = p.run().await;
    assert_eq!(report.stage("S").unwrap().status, StageStatus::Completed);
    assert_eq!(log.entries(), vec!["hook:needs", "stage:S"]);
}

#[tokio::test]
async fn test_edits_are_picked_up_between_runs() {
    let tree = HookTree::new();
    tree.write("before/gate.hook", "true");

    let log = CallLog::new();
    let mut p = pipeline(&log);
    p.append(recording_stage("S", ParamSchema::new(), 0, &log)).unwrap();
    p.bind_hooks("S", tree.join("before"), false, None).unwrap();

    assert_eq!(p.run().await.stage("S").unwrap().status, StageStatus::Completed);

    tree.write("before/gate.hook", "0");
    assert!(matches!(
        p.run().await.stage("S").unwrap().status,
        StageStatus::Vetoed { .. }
    ));

    tree.remove("before/gate.hook");
    assert_eq!(p.run().await.stage("S").unwrap().status, StageStatus::Completed);
}

#[test]
fn test_unbind_only_affects_that_stage_and_position() {
    let tree = HookTree::new();
    tree.write("shared/h.hook", "true");
    let shared = tree.join("shared");

    let log = CallLog::new();
    let mut p = pipeline(&log);
    p.append(recording_stage("S", ParamSchema::new(), 0, &log)).unwrap();
    p.append(recording_stage("T", ParamSchema::new(), 0, &log)).unwrap();
    p.bind_hooks("S", &shared, false, None).unwrap();
    p.bind_hooks("S", &shared, false, Some(HookPosition::After)).unwrap();
    p.bind_hooks("T", &shared, false, None).unwrap();

    assert_eq!(p.call_chain("S"), vec!["h", "S", "h"]);

    p.unbind_hooks("S", Some(shared.as_path()), HookPosition::Before);

    assert_eq!(p.call_chain("S"), vec!["S", "h"]);
    assert_eq!(p.call_chain("T"), vec!["h", "T"]);
}

#[test]
fn test_rebinding_directory_replaces_in_place() {
    let tree = HookTree::new();
    tree.write("before/top.hook", "true");
    tree.write("before/nested/deep.hook", "true");
    tree.write("other/x.hook", "true");

    let log = CallLog::new();
    let mut p = pipeline(&log);
    p.append(recording_stage("S", ParamSchema::new(), 0, &log)).unwrap();
    p.bind_hooks("S", tree.join("before"), false, None).unwrap();
    p.bind_hooks("S", tree.join("other"), false, None).unwrap();
    p.bind_hooks("S", tree.join("before"), true, None).unwrap();

    let specs = p.hook_specs("S", HookPosition::Before);
    assert_eq!(specs.len(), 2);
    assert_eq!(specs[0].directory, tree.join("before"));
    assert!(specs[0].recursive);
    assert_eq!(p.call_chain("S"), vec!["top", "deep", "x", "S"]);
}

#[test]
fn test_removing_stage_drops_its_bindings() {
    let tree = HookTree::new();
    tree.write("before/h.hook", "true");

    let log = CallLog::new();
    let mut p = pipeline(&log);
    p.append(recording_stage("S", ParamSchema::new(), 0, &log)).unwrap();
    p.bind_hooks("S", tree.join("before"), false, None).unwrap();
    p.remove("S").unwrap();

    p.append(recording_stage("S", ParamSchema::new(), 0, &log)).unwrap();
    assert_eq!(p.call_chain("S"), vec!["S"]);
    assert!(p.hook_specs("S", HookPosition::Before).is_empty());
    assert!(p.bind_hooks("missing", Path::new("/x"), false, None).is_err());
}
