//! Loader tests: discovery order, first-wins merging, and hot reload.

use std::sync::Arc;

use hookline_plugin::loader::{HookLoader, LoadOutcome};

use crate::helpers::{CallLog, HookTree, outcome_loader};

#[test]
fn test_same_name_in_two_directories_keeps_first() {
    let tree = HookTree::new();
    tree.write("d1/audit.hook", "true");
    tree.write("d2/audit.hook", "false");
    tree.write("d2/extra.hook", "true");

    let log = CallLog::new();
    let loader = HookLoader::new(Arc::new(outcome_loader(&log)));
    let d1 = tree.join("d1");
    let d2 = tree.join("d2");

    let merged = loader.load_all_from([(d1.as_path(), false), (d2.as_path(), false)]);

    assert_eq!(merged.names(), vec!["audit", "extra"]);
    assert_eq!(merged.get("audit").unwrap().location(), d1.join("audit.hook"));
}

#[test]
fn test_missing_directory_contributes_nothing() {
    let tree = HookTree::new();
    tree.write("real/a.hook", "true");

    let log = CallLog::new();
    let loader = HookLoader::new(Arc::new(outcome_loader(&log)));
    let missing = tree.join("missing");
    let real = tree.join("real");

    let merged = loader.load_all_from([(missing.as_path(), false), (real.as_path(), false)]);
    assert_eq!(merged.names(), vec!["a"]);
}

#[test]
fn test_load_one_unchanged_reuses_instance() {
    let tree = HookTree::new();
    tree.write("gate.hook", "true");

    let log = CallLog::new();
    let strategy = outcome_loader(&log);
    let mut loader = HookLoader::new(Arc::new(strategy.clone()));

    let first = loader.load_one(tree.path(), "gate", false).unwrap();
    let second = loader.load_one(tree.path(), "gate", false).unwrap();

    assert!(matches!(second, LoadOutcome::Cached(_)));
    assert!(first.unit().unwrap().same_instance(second.unit().unwrap()));
    assert_eq!(strategy.load_count("gate"), 1);
}

#[test]
fn test_load_one_after_edit_is_new_instance() {
    let tree = HookTree::new();
    tree.write("gate.hook", "true");

    let log = CallLog::new();
    let strategy = outcome_loader(&log);
    let mut loader = HookLoader::new(Arc::new(strategy.clone()));

    let first = loader.load_one(tree.path(), "gate", false).unwrap();
    tree.write("gate.hook", "false");
    let second = loader.load_one(tree.path(), "gate", false).unwrap();

    let (a, b) = (first.unit().unwrap(), second.unit().unwrap());
    assert!(matches!(second, LoadOutcome::Reloaded(_)));
    assert!(!a.same_instance(b));
    assert_ne!(a.content_hash(), b.content_hash());
    assert_eq!(strategy.load_count("gate"), 2);
}

#[test]
fn test_load_one_prunes_deleted_unit() {
    let tree = HookTree::new();
    tree.write("gate.hook", "true");

    let log = CallLog::new();
    let mut loader = HookLoader::new(Arc::new(outcome_loader(&log)));

    assert!(loader.load_one(tree.path(), "gate", false).unwrap().is_found());
    tree.remove("gate.hook");

    let outcome = loader.load_one(tree.path(), "gate", false).unwrap();
    assert!(matches!(outcome, LoadOutcome::NotFound));
    assert!(loader.cached_names().is_empty());
}

#[test]
fn test_load_all_is_unconditional() {
    let tree = HookTree::new();
    tree.write("gate.hook", "true");

    let log = CallLog::new();
    let strategy = outcome_loader(&log);
    let loader = HookLoader::new(Arc::new(strategy.clone()));

    loader.load_all(tree.path(), false).unwrap();
    loader.load_all(tree.path(), false).unwrap();
    assert_eq!(strategy.load_count("gate"), 2);
}
