//! End-to-end tests with shell hooks and command stages.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::json;

use hookline_core::config::AppConfig;
use hookline_core::config::pipeline::{HookBindingConfig, StageConfig};
use hookline_plugin::builder::build_pipeline;
use hookline_plugin::hooks::HookPosition;
use hookline_plugin::loader::{HookLoader, ScriptLoader};
use hookline_plugin::params::{ParamMap, ParamSchema};
use hookline_plugin::pipeline::{Pipeline, StageStatus};
use hookline_plugin::stage::CommandStage;

use crate::helpers::HookTree;

fn stage_config(name: &str, script: &str) -> StageConfig {
    StageConfig {
        name: name.into(),
        command: "sh".into(),
        args: vec!["-c".into(), script.into()],
        failure_policy: None,
        declared: Vec::new(),
        defaults: HashMap::new(),
        params: HashMap::new(),
        hooks: Vec::new(),
    }
}

#[tokio::test]
async fn test_script_hooks_wrap_command_stage() {
    let tree = HookTree::new();
    tree.write(
        "before/check.sh",
        "# hook-params: t1, t3=\"hello\"\n[ \"$HOOK_ARG_T1\" = new ] && [ \"$HOOK_ARG_T3\" = hello ]\n",
    );
    tree.write("after/mark.sh", "touch \"$HOOK_NAME.done\"\n");
    let out = tree.join("stage.out");

    let mut p = Pipeline::new(HookLoader::new(Arc::new(ScriptLoader::default())));
    let stage = CommandStage::new("write", "sh")
        .with_args(["-c", r#"printf '%s' "$STAGE_ARG_VALUE" > "$1""#, "sh", out.to_str().unwrap()])
        .with_params(ParamSchema::new().required("value"));
    p.append(Arc::new(stage)).unwrap();
    p.set_stage_params("write", ParamMap::from([("value".into(), json!("payload"))]))
        .unwrap();
    p.bind_hooks("write", tree.join("before"), false, None).unwrap();
    p.bind_hooks("write", tree.join("after"), false, Some(HookPosition::After))
        .unwrap();
    p.set_context(ParamMap::from([("t1".into(), json!("new"))]));

    let report = p.run().await;

    assert_eq!(report.stage("write").unwrap().status, StageStatus::Completed);
    assert_eq!(std::fs::read_to_string(&out).unwrap(), "payload");
    assert!(tree.join("after/mark.done").exists());
}

#[tokio::test]
async fn test_failing_script_vetoes_stage() {
    let tree = HookTree::new();
    tree.write("before/deny.sh", "exit 1\n");
    let out = tree.join("never.out");

    let mut p = Pipeline::new(HookLoader::new(Arc::new(ScriptLoader::default())));
    let stage = CommandStage::new("write", "sh").with_args([
        "-c",
        r#"touch "$1""#,
        "sh",
        out.to_str().unwrap(),
    ]);
    p.append(Arc::new(stage)).unwrap();
    p.bind_hooks("write", tree.join("before"), false, None).unwrap();

    let report = p.run().await;

    assert_eq!(
        report.stage("write").unwrap().status,
        StageStatus::Vetoed {
            hook: "deny".to_string()
        }
    );
    assert!(!out.exists());
}

#[tokio::test]
async fn test_pipeline_from_config() {
    let tree = HookTree::new();
    tree.write("hooks/allow.sh", "echo '{\"ok\": true}'\n");
    tree.write("hooks/pkg/__init__.sh", "exit 0\n");
    tree.write("hooks/pkg/helper.sh", "exit 1\n");

    let mut fail = stage_config("fail", "exit 7");
    fail.failure_policy = Some("abort".into());
    let mut first = stage_config("first", "echo \"$STAGE_ARG_WHO\"");
    first.declared = vec!["who".into()];
    first.params = HashMap::from([("who".to_string(), json!("world"))]);
    first.hooks = vec![HookBindingConfig {
        directory: tree.join("hooks").to_string_lossy().to_string(),
        recursive: true,
        position: None,
    }];

    let config = AppConfig {
        stages: vec![first, fail, stage_config("last", "exit 0")],
        ..AppConfig::default()
    };

    let mut p = build_pipeline(&config).unwrap();
    assert_eq!(p.call_chain("first"), vec!["allow", "helper", "first"]);

    let report = p.run().await;

    let first = report.stage("first").unwrap();
    assert_eq!(first.status, StageStatus::Vetoed { hook: "helper".into() });
    assert_eq!(first.hooks.len(), 2);
    assert!(matches!(
        report.stage("fail").unwrap().status,
        StageStatus::Failed {
            status_code: Some(7),
            ..
        }
    ));
    assert_eq!(report.stage("last").unwrap().status, StageStatus::NotRun);
    assert_eq!(report.aborted_at.as_deref(), Some("fail"));
}
