//! Multi-run scenarios across the tidemark crates.
//!
//! Each run reloads the state file from disk, the way separate process
//! invocations would.

use std::path::PathBuf;

use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use tidemark_core::{
    DateRange, InitialSettings, PersistentState, RunReport, RunStatus, SyncOrchestrator, Watermark,
};
use tidemark_fs::ConfigStore;
use tidemark_test_utils::{Reply, ScriptedSetup, ScriptedUploader, StaticCredentials, TestLibrary, at};

/// Reload the state from disk and run once at `now`
fn invoke(lib: &TestLibrary, uploader: &mut ScriptedUploader, now: i64) -> RunReport {
    let mut state = PersistentState::load(lib.state_path()).unwrap();
    let scanner = lib.scanner();
    let mut credentials = StaticCredentials::default();
    SyncOrchestrator::new(&mut state, &scanner, uploader, &mut credentials)
        .run_at(at(now))
        .unwrap()
}

fn first_run_settings(lib: &TestLibrary) -> InitialSettings {
    InitialSettings {
        directory: lib.root(),
        extensions: vec!["mp3".into(), "flac".into()],
        range: DateRange::Everything,
    }
}

#[test]
fn setup_then_three_runs() {
    let lib = TestLibrary::new();
    let old = lib.add("2019/old.mp3", at(10));
    let mut setup = ScriptedSetup::new(first_run_settings(&lib));
    PersistentState::open(lib.state_path(), false, &mut setup).unwrap();
    assert_eq!(setup.calls(), 1);

    // Run 1: everything since the epoch
    let mut uploader = ScriptedUploader::new();
    let first = invoke(&lib, &mut uploader, 1_000);
    assert!(first.is_success());
    assert_eq!(uploader.batches(), &[vec![old]]);

    // Run 2: nothing new
    let second = invoke(&lib, &mut uploader, 2_000);
    assert!(second.is_success());
    assert_eq!(uploader.calls(), 1);

    // Run 3: one file whose creation time predates the watermark, one after it
    let between = lib.add("new/between.flac", at(1_500));
    let after = lib.add("new/after.flac", at(2_500));
    let third = invoke(&lib, &mut uploader, 3_000);
    assert!(third.is_success());
    assert_eq!(uploader.batches().last().unwrap(), &vec![after]);
    assert!(!uploader.batches().iter().flatten().any(|p| *p == between));

    let state = PersistentState::load(lib.state_path()).unwrap();
    assert_eq!(state.watermark().unwrap(), Watermark::since(at(3_000)));
}

#[test]
fn file_added_during_a_run_is_picked_up_next_time() {
    let lib = TestLibrary::new();
    lib.init_state(&["mp3"]);
    lib.add("a.mp3", at(100));

    let mut uploader = ScriptedUploader::new();
    invoke(&lib, &mut uploader, 1_000);

    // Created after the run started but before it finished
    let late = lib.add("late.mp3", at(1_001));
    invoke(&lib, &mut uploader, 5_000);

    assert_eq!(uploader.batches().last().unwrap(), &vec![late]);
}

#[test]
fn retry_queue_converges_once_the_remote_recovers() {
    let lib = TestLibrary::new();
    lib.init_state(&["mp3"]);
    let a = lib.add("a.mp3", at(100));
    let b = lib.add("b.mp3", at(100));

    let mut uploader = ScriptedUploader::new()
        .then(Reply::reject([a.clone(), b.clone()], "QUOTA_EXCEEDED"))
        .then(Reply::reject([a.clone()], "QUOTA_EXCEEDED"))
        .then(Reply::reject([a.clone()], "QUOTA_EXCEEDED"));

    invoke(&lib, &mut uploader, 1_000);
    assert_eq!(lib.state_on_disk()["retry_queue"], json!([a.to_string_lossy()]));

    invoke(&lib, &mut uploader, 2_000);
    assert_eq!(lib.state_on_disk()["retry_queue"], json!([a.to_string_lossy()]));

    let last = invoke(&lib, &mut uploader, 3_000);
    assert_eq!(last.retry.unwrap().accepted, vec![a]);
    assert_eq!(lib.state_on_disk()["retry_queue"], json!([]));
}

#[test]
fn cancelled_run_is_retried_over_the_same_window() {
    let lib = TestLibrary::new();
    lib.init_state(&["mp3", "flac"]);
    let mp3 = lib.add("a.mp3", at(100));
    let flac = lib.add("b.flac", at(100));

    let mut uploader = ScriptedUploader::new().then(Reply::AcceptAll).then(Reply::Cancel);
    let cancelled = invoke(&lib, &mut uploader, 1_000);
    assert_eq!(cancelled.status, RunStatus::Cancelled);

    let resumed = invoke(&lib, &mut uploader, 2_000);
    assert!(resumed.is_success());
    // The watermark did not move, so both extensions are rescanned
    assert_eq!(&uploader.batches()[2..], &[vec![mp3], vec![flac]]);
}

#[test]
fn state_written_by_an_older_version_is_upgraded_in_place() {
    let lib = TestLibrary::new();
    lib.add("a.mp3", at(100));
    std::fs::write(
        lib.state_path(),
        json!({
            "directory": lib.root().to_string_lossy(),
            "extensions": ["mp3"],
            "range_start": "1970-01-02",
            "range_end": "",
            "legacy_flag": true,
        })
        .to_string(),
    )
    .unwrap();

    let mut uploader = ScriptedUploader::new();
    let report = invoke(&lib, &mut uploader, 500_000);

    // 1970-01-02 local midnight is after T=100 in every time zone
    assert_eq!(report.totals().candidates, 0);
    let on_disk = lib.state_on_disk();
    assert_eq!(on_disk["legacy_flag"], json!(true));
    assert_eq!(on_disk["retry_queue"], json!([]));
    assert_eq!(on_disk["range_end"], Value::Null);
}

#[test]
fn reconfigure_changes_directory_but_keeps_progress() {
    let lib = TestLibrary::new();
    lib.init_state(&["mp3"]);
    let mut uploader = ScriptedUploader::new()
        .then(Reply::RejectAll("TIMEOUT".into()))
        .then(Reply::RejectAll("TIMEOUT".into()));
    lib.add("a.mp3", at(100));
    invoke(&lib, &mut uploader, 1_000);

    let elsewhere = lib.mkdir("elsewhere");
    let mut setup = ScriptedSetup::new(InitialSettings {
        directory: elsewhere.clone(),
        extensions: vec!["mp3".into()],
        range: DateRange::Everything,
    });
    let state = PersistentState::open(lib.state_path(), true, &mut setup).unwrap();

    assert_eq!(state.directory().unwrap(), elsewhere);
    assert_eq!(state.retry_queue().unwrap().len(), 1);
    assert!(state.watermark().unwrap().is_unbounded());
}

#[test]
fn state_file_is_plain_json_readable_by_config_store() {
    let lib = TestLibrary::new();
    lib.init_state(&["mp3"]);
    let mut uploader = ScriptedUploader::new();
    invoke(&lib, &mut uploader, 1_000);

    let document: Value = ConfigStore::new().load(&lib.state_path()).unwrap();
    assert_eq!(document["range_start"], json!(1_000.0));
    assert_eq!(document["directory"], json!(lib.root().to_string_lossy()));
    let leftovers: Vec<PathBuf> = std::fs::read_dir(lib.state_path().parent().unwrap())
        .unwrap()
        .map(|e| e.unwrap().path())
        .filter(|p| p.to_string_lossy().ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty(), "{leftovers:?}");
}
