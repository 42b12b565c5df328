//! Fixture restore: capture, mark, restore, save/load.

use std::sync::Arc;

use clusterprobe_core::fakes::ScriptedRunner;
use clusterprobe_core::{
    CommandResult, ProbeError, ResourceRef, RestoreAction, RestoreContext,
};
use tempfile::TempDir;

const CONFIGMAP_JSON: &str = r#"{"apiVersion":"v1","kind":"ConfigMap","metadata":{"name":"settings","namespace":"demo"},"data":{"mode":"a"}}"#;

fn not_found() -> CommandResult {
    CommandResult::new(1, "", "Error from server (NotFound)")
}

#[tokio::test]
async fn test_restore_deletes_created_and_reapplies_modified() {
    let dir = TempDir::new().unwrap();
    let existing = ResourceRef::namespaced("configmap", "settings", "demo");
    let created = ResourceRef::new("namespace", "scratch");
    let untouched = ResourceRef::namespaced("secret", "token", "demo");

    let setup = ScriptedRunner::new()
        .respond_stdout(CONFIGMAP_JSON)
        .respond(not_found())
        .respond_stdout(r#"{"kind":"Secret"}"#);
    let mut ctx = RestoreContext::new("oc");
    ctx.capture(&setup, existing.clone()).await.unwrap();
    ctx.capture(&setup, created.clone()).await.unwrap();
    ctx.capture(&setup, untouched.clone()).await.unwrap();
    assert_eq!(
        setup.calls(),
        vec![
            "oc get configmap settings -n demo -o json",
            "oc get namespace scratch -o json",
            "oc get secret token -n demo -o json",
        ]
    );

    ctx.mark_modified(&existing).unwrap();
    ctx.mark_modified(&created).unwrap();

    let teardown = Arc::new(ScriptedRunner::new().respond(CommandResult::ok("")));
    let steps = ctx.restore(&teardown, dir.path()).await.unwrap();

    let actions: Vec<_> = steps.iter().map(|s| (s.resource.clone(), s.action)).collect();
    assert_eq!(
        actions,
        vec![
            (untouched, RestoreAction::Skip),
            (created, RestoreAction::Delete),
            (existing, RestoreAction::Reapply),
        ]
    );
    assert!(steps[0].result.is_none());

    let calls = teardown.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0], "oc delete namespace scratch --ignore-not-found");
    assert!(calls[1].starts_with("oc apply -f "));

    let blob_path = calls[1].trim_start_matches("oc apply -f ");
    let blob: serde_json::Value =
        serde_json::from_slice(&std::fs::read(blob_path).unwrap()).unwrap();
    assert_eq!(blob["data"]["mode"], "a");
    assert!(blob_path.starts_with(dir.path().to_str().unwrap()));
}

#[tokio::test]
async fn test_second_capture_keeps_original_state() {
    let runner = Arc::new(
        ScriptedRunner::new()
            .respond(not_found())
            .respond_stdout(CONFIGMAP_JSON),
    );
    let resource = ResourceRef::namespaced("configmap", "settings", "demo");
    let mut ctx = RestoreContext::default();

    ctx.capture(&runner, resource.clone()).await.unwrap();
    let snapshot = ctx.capture(&runner, resource.clone()).await.unwrap();

    assert!(!snapshot.existed);
    assert_eq!(runner.call_count(), 1);
}

#[tokio::test]
async fn test_unreachable_cluster_never_leads_to_delete() {
    let resource = ResourceRef::namespaced("configmap", "console-config", "openshift-console");
    let setup = ScriptedRunner::new().respond(CommandResult::new(
        1,
        "",
        "Unable to connect to the server: dial tcp: i/o timeout",
    ));
    let mut ctx = RestoreContext::default();

    let err = ctx.capture(&setup, resource.clone()).await.unwrap_err();
    match err {
        ProbeError::CommandFailed {
            command, stderr, ..
        } => {
            assert_eq!(
                command,
                "oc get configmap console-config -n openshift-console -o json"
            );
            assert!(stderr.contains("Unable to connect"));
        }
        other => panic!("expected CommandFailed, got {:?}", other),
    }
    assert!(ctx.snapshot(&resource).is_none());
    assert!(ctx.mark_modified(&resource).is_err());

    let dir = TempDir::new().unwrap();
    let teardown = ScriptedRunner::new();
    let steps = ctx.restore(&teardown, dir.path()).await.unwrap();
    assert!(steps.is_empty());
    assert_eq!(teardown.call_count(), 0);
}

#[tokio::test]
async fn test_runner_error_during_capture_is_not_absence() {
    let mut ctx = RestoreContext::default();
    let setup = ScriptedRunner::new().fail("connection refused");

    let err = ctx
        .capture(&setup, ResourceRef::new("namespace", "scratch"))
        .await
        .unwrap_err();
    assert!(matches!(err, ProbeError::CommandFailed { exit_code: -1, .. }));
    assert!(ctx.snapshots().is_empty());
}

#[tokio::test]
async fn test_unwritable_work_dir_does_not_stop_teardown() {
    let dir = TempDir::new().unwrap();
    // A regular file where the manifest directory should be.
    let work_dir = dir.path().join("manifests");
    std::fs::write(&work_dir, b"").unwrap();

    let created = ResourceRef::new("namespace", "scratch");
    let existing = ResourceRef::namespaced("configmap", "settings", "demo");
    let setup = ScriptedRunner::new()
        .respond(not_found())
        .respond_stdout(CONFIGMAP_JSON);
    let mut ctx = RestoreContext::default();
    ctx.capture(&setup, created.clone()).await.unwrap();
    ctx.capture(&setup, existing.clone()).await.unwrap();
    ctx.mark_modified(&created).unwrap();
    ctx.mark_modified(&existing).unwrap();

    let teardown = ScriptedRunner::new().respond(CommandResult::ok(""));
    let steps = ctx.restore(&teardown, &work_dir).await.unwrap();

    assert_eq!(steps.len(), 2);
    assert_eq!(steps[0].resource, existing);
    assert_eq!(steps[0].action, RestoreAction::Reapply);
    assert_eq!(steps[0].result.as_ref().unwrap().exit_code, -1);
    assert_eq!(steps[1].resource, created);
    assert_eq!(steps[1].result.as_ref().unwrap().exit_code, 0);
    assert_eq!(
        teardown.calls(),
        vec!["oc delete namespace scratch --ignore-not-found"]
    );
}

#[tokio::test]
async fn test_mark_without_capture_is_error() {
    let mut ctx = RestoreContext::default();
    let err = ctx
        .mark_modified(&ResourceRef::new("node", "worker-0"))
        .unwrap_err();
    assert!(matches!(err, ProbeError::UnknownResource(ref r) if r == "node/worker-0"));
}

#[tokio::test]
async fn test_failed_restore_step_does_not_stop_teardown() {
    let dir = TempDir::new().unwrap();
    let a = ResourceRef::new("namespace", "a");
    let b = ResourceRef::new("namespace", "b");

    let setup = ScriptedRunner::new().respond(not_found());
    let mut ctx = RestoreContext::default();
    ctx.capture(&setup, a.clone()).await.unwrap();
    ctx.capture(&setup, b.clone()).await.unwrap();
    ctx.mark_modified(&a).unwrap();
    ctx.mark_modified(&b).unwrap();

    let teardown = ScriptedRunner::new()
        .fail("connection refused")
        .respond(CommandResult::ok("namespace \"a\" deleted"));
    let steps = ctx.restore(&teardown, dir.path()).await.unwrap();

    assert_eq!(steps.len(), 2);
    assert_eq!(steps[0].result.as_ref().unwrap().exit_code, -1);
    assert_eq!(steps[1].result.as_ref().unwrap().exit_code, 0);
}

#[tokio::test]
async fn test_save_and_load_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("state").join("restore.json");

    assert!(RestoreContext::load_if_exists(&path).unwrap().is_none());

    let resource = ResourceRef::namespaced("configmap", "settings", "demo");
    let runner = ScriptedRunner::new().respond_stdout(CONFIGMAP_JSON);
    let mut ctx = RestoreContext::new("kubectl");
    ctx.capture(&runner, resource.clone()).await.unwrap();
    ctx.mark_modified(&resource).unwrap();
    ctx.save(&path).unwrap();

    let loaded = RestoreContext::load_if_exists(&path).unwrap().unwrap();
    assert_eq!(loaded, ctx);

    // A reloaded context restores with its own CLI binary.
    let teardown = ScriptedRunner::new().respond(CommandResult::ok(""));
    loaded.restore(&teardown, dir.path()).await.unwrap();
    assert!(teardown.calls()[0].starts_with("kubectl apply -f "));
}

#[tokio::test]
async fn test_load_corrupt_file_is_serialization_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("restore.json");
    std::fs::write(&path, b"not json").unwrap();

    let err = RestoreContext::load_if_exists(&path).unwrap_err();
    assert!(matches!(err, ProbeError::Serialization(_)));
}
