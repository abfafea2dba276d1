//! Scenario tests for the sync run state machine

use std::path::PathBuf;

use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use tidemark_core::{
    BatchKind, ClassifiedResult, CredentialHandle, Error, PersistentState, RunReport, RunStatus, SyncOptions,
    SyncOrchestrator, Watermark,
};
use tidemark_test_utils::{FailingCredentials, Reply, ScriptedUploader, StaticCredentials, TestLibrary, at};

const NOW: i64 = 1_000;

fn run(
    lib: &TestLibrary,
    state: &mut PersistentState,
    uploader: &mut ScriptedUploader,
) -> RunReport {
    run_with(lib, state, uploader, SyncOptions::default())
}

fn run_with(
    lib: &TestLibrary,
    state: &mut PersistentState,
    uploader: &mut ScriptedUploader,
    options: SyncOptions,
) -> RunReport {
    let scanner = lib.scanner();
    let mut credentials = StaticCredentials::default();
    SyncOrchestrator::new(state, &scanner, uploader, &mut credentials)
        .with_options(options)
        .run_at(at(NOW))
        .unwrap()
}

mod happy_path {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn accepted_batch_advances_watermark() {
        let lib = TestLibrary::new();
        let a = lib.add("a.mp3", at(100));
        let mut state = lib.init_state(&["mp3"]);
        let mut uploader = ScriptedUploader::new();

        let report = run(&lib, &mut state, &mut uploader);

        assert_eq!(report.status, RunStatus::Completed);
        assert!(report.watermark_advanced);
        assert_eq!(report.batches[0].accepted, vec![a.clone()]);
        assert_eq!(uploader.batches(), &[vec![a]]);
        assert_eq!(state.watermark().unwrap(), Watermark::since(at(NOW)));
        assert_eq!(lib.state_on_disk()["range_end"], Value::Null);
    }

    #[test]
    fn extensions_are_processed_in_configured_order() {
        let lib = TestLibrary::new();
        let flac = lib.add("b.flac", at(100));
        let mp3 = lib.add("a.mp3", at(100));
        let mut state = lib.init_state(&["flac", "mp3"]);
        let mut uploader = ScriptedUploader::new();

        let report = run(&lib, &mut state, &mut uploader);

        assert_eq!(uploader.batches(), &[vec![flac], vec![mp3]]);
        let labels: Vec<_> = report.batches.iter().map(|b| b.label.as_str()).collect();
        assert_eq!(labels, vec!["flac", "mp3"]);
    }

    #[test]
    fn empty_extension_is_never_submitted() {
        let lib = TestLibrary::new();
        let mp3 = lib.add("a.mp3", at(100));
        let mut state = lib.init_state(&["flac", "mp3"]);
        let mut uploader = ScriptedUploader::new();

        let report = run(&lib, &mut state, &mut uploader);

        assert_eq!(uploader.batches(), &[vec![mp3]]);
        assert!(!report.batches[0].submitted);
        assert!(report.batches[1].submitted);
    }

    #[test]
    fn zero_candidate_run_still_advances() {
        let lib = TestLibrary::new();
        let mut state = lib.init_state(&["mp3", "flac"]);
        let mut uploader = ScriptedUploader::new();

        let report = run(&lib, &mut state, &mut uploader);

        assert_eq!(uploader.calls(), 0);
        assert!(report.is_success());
        assert!(report.watermark_advanced);
        assert_eq!(state.watermark().unwrap(), Watermark::since(at(NOW)));
    }

    #[test]
    fn second_run_without_new_files_changes_nothing_but_the_watermark() {
        let lib = TestLibrary::new();
        lib.add("a.mp3", at(100));
        let mut state = lib.init_state(&["mp3"]);
        let mut uploader = ScriptedUploader::new();

        run(&lib, &mut state, &mut uploader);
        let after_first = lib.state_on_disk();
        let report = run(&lib, &mut state, &mut uploader);

        assert_eq!(uploader.calls(), 1);
        assert_eq!(report.totals().candidates, 0);
        assert_eq!(lib.state_on_disk(), after_first);
    }

    #[test]
    fn files_from_before_the_watermark_are_ignored_next_run() {
        let lib = TestLibrary::new();
        lib.add("old.mp3", at(100));
        let mut state = lib.init_state(&["mp3"]);
        let mut uploader = ScriptedUploader::new();
        run(&lib, &mut state, &mut uploader);

        let fresh = lib.add("fresh.mp3", at(NOW + 5));
        let scanner = lib.scanner();
        let mut credentials = StaticCredentials::default();
        SyncOrchestrator::new(&mut state, &scanner, &mut uploader, &mut credentials)
            .run_at(at(NOW + 60))
            .unwrap();

        assert_eq!(uploader.batches().last().unwrap(), &vec![fresh]);
    }

    #[test]
    fn credentials_are_acquired_once_and_passed_through() {
        let lib = TestLibrary::new();
        lib.add("a.mp3", at(100));
        lib.add("b.flac", at(100));
        let mut state = lib.init_state(&["mp3", "flac"]);
        let mut uploader = ScriptedUploader::new();
        let scanner = lib.scanner();
        let handle = CredentialHandle::from_file("/secrets/oauth.json");
        let mut credentials = StaticCredentials::new(handle.clone());

        SyncOrchestrator::new(&mut state, &scanner, &mut uploader, &mut credentials)
            .run_at(at(NOW))
            .unwrap();

        assert_eq!(credentials.calls, 1);
        assert_eq!(uploader.handles(), &[handle.clone(), handle]);
    }
}

mod classification {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn duplicates_are_never_queued() {
        let lib = TestLibrary::new();
        let a = lib.add("a.mp3", at(100));
        let mut state = lib.init_state(&["mp3"]);
        let mut uploader = ScriptedUploader::new().then(Reply::RejectAll("409 ALREADY_EXISTS".into()));

        let report = run(&lib, &mut state, &mut uploader);

        assert_eq!(report.batches[0].duplicates, vec![a]);
        assert!(state.retry_queue().unwrap().is_empty());
        assert!(report.watermark_advanced);
    }

    #[test]
    fn matched_paths_need_no_state_change() {
        let lib = TestLibrary::new();
        lib.add("a.mp3", at(100));
        let mut state = lib.init_state(&["mp3"]);
        let mut uploader = ScriptedUploader::new().then(Reply::MatchAll);

        let report = run(&lib, &mut state, &mut uploader);

        assert_eq!(report.batches[0].matched.len(), 1);
        assert!(state.retry_queue().unwrap().is_empty());
    }

    #[test]
    fn failed_path_is_queued_then_replayed_next_run() {
        let lib = TestLibrary::new();
        let a = lib.add("a.mp3", at(100));
        let mut state = lib.init_state(&["mp3"]);
        let mut uploader = ScriptedUploader::new()
            .then(Reply::RejectAll("QUOTA_EXCEEDED".into()))
            .then(Reply::RejectAll("QUOTA_EXCEEDED".into()));

        let first = run(&lib, &mut state, &mut uploader);

        assert_eq!(first.batches[0].newly_queued, vec![a.clone()]);
        assert_eq!(state.retry_queue().unwrap(), vec![a.clone()]);
        // Queued in the extension batch, then replayed and re-queued in the same run
        assert_eq!(uploader.batches(), &[vec![a.clone()], vec![a.clone()]]);
        assert_eq!(first.retry.as_ref().unwrap().failed[0].reason, "QUOTA_EXCEEDED");
        assert!(first.retry.as_ref().unwrap().newly_queued.contains(&a));

        let second = run(&lib, &mut state, &mut uploader);

        let retry = second.retry.unwrap();
        assert_eq!(retry.kind, BatchKind::RetryReplay);
        assert_eq!(retry.accepted, vec![a.clone()]);
        assert_eq!(uploader.batches().last().unwrap(), &vec![a]);
        assert!(state.retry_queue().unwrap().is_empty());
    }

    #[test]
    fn same_path_failing_in_two_extensions_is_queued_once() {
        let lib = TestLibrary::new();
        let a = lib.add("a.mp3.part", at(100));
        let mut state = lib.init_state(&["mp3.part", "part"]);
        let mut uploader = ScriptedUploader::new()
            .then(Reply::RejectAll("TIMEOUT".into()))
            .then(Reply::RejectAll("TIMEOUT".into()))
            .then(Reply::RejectAll("TIMEOUT".into()));

        let report = run(&lib, &mut state, &mut uploader);

        assert_eq!(uploader.batches(), &[vec![a.clone()], vec![a.clone()], vec![a.clone()]]);
        assert_eq!(report.batches[0].newly_queued, vec![a.clone()]);
        assert!(report.batches[1].newly_queued.is_empty());
        assert_eq!(state.retry_queue().unwrap(), vec![a]);
    }

    #[test]
    fn path_missing_from_result_is_queued() {
        let lib = TestLibrary::new();
        let a = lib.add("a.mp3", at(100));
        let b = lib.add("b.mp3", at(100));
        let mut state = lib.init_state(&["mp3"]);
        let mut uploader = ScriptedUploader::new()
            .then(Reply::Result(ClassifiedResult::new().with_accepted(a.clone(), "id")))
            .then(Reply::Cancel);

        let report = run(&lib, &mut state, &mut uploader);

        assert_eq!(report.batches[0].failed[0].reason, "NO_RESULT");
        assert_eq!(state.retry_queue().unwrap(), vec![b]);
    }

    #[test]
    fn requeue_during_replay_is_fresh() {
        let lib = TestLibrary::new();
        let mut state = lib.init_state(&["mp3"]);
        let old = PathBuf::from("/gone/old.mp3");
        let flaky = PathBuf::from("/gone/flaky.mp3");
        state.enqueue_retries(&[old.clone(), flaky.clone()]).unwrap();
        let mut uploader = ScriptedUploader::new().then(Reply::reject([flaky.clone()], "TIMEOUT"));

        let report = run(&lib, &mut state, &mut uploader);

        assert_eq!(uploader.batches(), &[vec![old.clone(), flaky.clone()]]);
        assert_eq!(state.retry_queue().unwrap(), vec![flaky.clone()]);
        assert_eq!(report.retry.unwrap().newly_queued, vec![flaky]);
    }
}

mod interruption {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn cancel_in_second_extension_keeps_first_side_effects() {
        let lib = TestLibrary::new();
        let a = lib.add("a.mp3", at(100));
        let b = lib.add("b.flac", at(100));
        let mut state = lib.init_state(&["mp3", "flac"]);
        let mut uploader = ScriptedUploader::new()
            .then(Reply::RejectAll("QUOTA_EXCEEDED".into()))
            .then(Reply::Cancel);

        let report = run(&lib, &mut state, &mut uploader);

        assert_eq!(report.status, RunStatus::Cancelled);
        assert!(!report.watermark_advanced);
        assert!(report.batches[1].cancelled);
        assert!(report.retry.is_none());
        assert_eq!(uploader.batches(), &[vec![a.clone()], vec![b]]);
        assert_eq!(state.retry_queue().unwrap(), vec![a]);
        assert!(state.watermark().unwrap().is_unbounded());
    }

    #[test]
    fn cancel_stops_remaining_extensions() {
        let lib = TestLibrary::new();
        lib.add("a.mp3", at(100));
        lib.add("b.flac", at(100));
        let mut state = lib.init_state(&["mp3", "flac"]);
        let mut uploader = ScriptedUploader::new().then(Reply::Cancel);

        let report = run(&lib, &mut state, &mut uploader);

        assert_eq!(uploader.calls(), 1);
        assert_eq!(report.batches.len(), 1);
    }

    #[test]
    fn cancelled_replay_keeps_the_queue() {
        let lib = TestLibrary::new();
        let mut state = lib.init_state(&["mp3"]);
        let queued = PathBuf::from("/m/queued.mp3");
        state.enqueue_retries(&[queued.clone()]).unwrap();
        let mut uploader = ScriptedUploader::new().then(Reply::Cancel);

        let report = run(&lib, &mut state, &mut uploader);

        assert_eq!(report.status, RunStatus::Cancelled);
        assert_eq!(state.retry_queue().unwrap(), vec![queued]);
        assert!(!report.watermark_advanced);
    }

    #[test]
    fn upload_error_aborts_without_advancing() {
        let lib = TestLibrary::new();
        lib.add("a.mp3", at(100));
        let mut state = lib.init_state(&["mp3"]);
        let mut uploader = ScriptedUploader::new().then(Reply::Fail("connection reset".into()));

        let report = run(&lib, &mut state, &mut uploader);

        assert!(matches!(&report.status, RunStatus::Aborted { reason } if reason.contains("connection reset")));
        assert!(!report.watermark_advanced);
        assert!(state.retry_queue().unwrap().is_empty());
    }

    #[test]
    fn missing_library_aborts_with_report() {
        let lib = TestLibrary::new();
        let mut state = lib.init_state(&["mp3"]);
        state.set("directory", "/definitely/not/here").unwrap();
        let mut uploader = ScriptedUploader::new();

        let report = run(&lib, &mut state, &mut uploader);

        assert!(matches!(report.status, RunStatus::Aborted { .. }));
        assert_eq!(uploader.calls(), 0);
        assert!(state.watermark().unwrap().is_unbounded());
    }

    #[test]
    fn credential_failure_submits_nothing() {
        let lib = TestLibrary::new();
        lib.add("a.mp3", at(100));
        let mut state = lib.init_state(&["mp3"]);
        let mut uploader = ScriptedUploader::new();
        let scanner = lib.scanner();
        let mut credentials = FailingCredentials::default();

        let err = SyncOrchestrator::new(&mut state, &scanner, &mut uploader, &mut credentials)
            .run_at(at(NOW))
            .unwrap_err();

        assert!(matches!(err, Error::CredentialFailure { .. }));
        assert_eq!(uploader.calls(), 0);
        assert!(state.watermark().unwrap().is_unbounded());
    }
}

mod dry_run {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn dry_run_reports_without_side_effects() {
        let lib = TestLibrary::new();
        let a = lib.add("a.mp3", at(100));
        let mut state = lib.init_state(&["mp3"]);
        state.enqueue_retries(&[PathBuf::from("/m/queued.mp3")]).unwrap();
        let before = lib.state_on_disk();
        let mut uploader = ScriptedUploader::new();

        let report = run_with(&lib, &mut state, &mut uploader, SyncOptions { dry_run: true });

        assert!(report.dry_run);
        assert!(report.is_success());
        assert!(!report.watermark_advanced);
        assert_eq!(report.batches[0].candidates, vec![a]);
        assert_eq!(report.retry.unwrap().candidates, vec![PathBuf::from("/m/queued.mp3")]);
        assert_eq!(uploader.calls(), 0);
        assert_eq!(lib.state_on_disk(), before);
    }
}

#[test]
fn report_serializes_with_flattened_status() {
    let lib = TestLibrary::new();
    let mut state = lib.init_state(&["mp3"]);
    let mut uploader = ScriptedUploader::new();

    let report = run(&lib, &mut state, &mut uploader);
    let value = serde_json::to_value(&report).unwrap();

    assert_eq!(value["status"], json!("completed"));
    assert_eq!(value["watermark_advanced"], json!(true));
}
