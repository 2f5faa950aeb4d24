mod common;

use bytes::Bytes;
use common::*;
use onscale_session::prelude::*;
use std::time::Duration;

#[tokio::test]
async fn stop_on_a_finished_job_is_a_no_op() {
    let portal = portal();
    let session = session(&portal).await;
    let job = session
        .create_job("done", &HpcSelector::AccountDefault)
        .await
        .unwrap();
    portal.set_status(&job.id(), JobStatus::Finished);

    let outcome = job.stop().await.unwrap();
    assert_eq!(outcome, StopOutcome::AlreadyTerminal(JobStatus::Finished));
    assert_eq!(portal.call_count("job_stop"), 0);
}

#[tokio::test]
async fn stop_a_running_job() {
    let portal = portal();
    let session = session(&portal).await;
    let job = session
        .create_job("busy", &HpcSelector::AccountDefault)
        .await
        .unwrap();
    portal.set_status(&job.id(), JobStatus::Running);

    match job.stop().await.unwrap() {
        StopOutcome::Requested {
            stopped,
            not_stopped,
        } => {
            assert_eq!(stopped, vec![format!("{}-sim-0", job.id())]);
            assert!(not_stopped.is_empty());
        }
        other => panic!("expected a stop request, got {other:?}"),
    }
    assert_eq!(job.status().await.unwrap(), JobStatus::Stopped);
}

#[tokio::test]
async fn partial_download_report() {
    let portal = portal()
        .with_result_file("field.vtu", "cells")
        .with_missing_result_file("gone.csv");
    let session = session(&portal).await;
    let job = session
        .create_job("results", &HpcSelector::AccountDefault)
        .await
        .unwrap();
    portal.set_status(&job.id(), JobStatus::Finished);
    let dir = tempfile::tempdir().unwrap();

    let report = job
        .download_results(dir.path(), &ResultFilter::All)
        .await
        .unwrap();
    assert_eq!(report.succeeded, vec![dir.path().join("field.vtu")]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, "gone.csv");
    assert!(matches!(report.failed[0].1, OnscaleError::Download { .. }));

    let only_vtu = job
        .download_results(
            dir.path().join("vtu"),
            &ResultFilter::Extensions(vec!["vtu".into()]),
        )
        .await
        .unwrap();
    assert!(only_vtu.is_complete());
    assert_eq!(only_vtu.succeeded.len(), 1);
}

#[tokio::test]
async fn single_file_transfer() {
    let portal = portal();
    let session = session(&portal).await;
    let job = session
        .create_job("files", &HpcSelector::AccountDefault)
        .await
        .unwrap();
    let dir = tempfile::tempdir().unwrap();
    let local = dir.path().join("notes.txt");
    std::fs::write(&local, "hello").unwrap();

    job.upload_file(&local).await.unwrap();
    job.upload_bytes("extra.json", Bytes::from_static(b"{}"))
        .await
        .unwrap();
    assert_eq!(job.file_list().await.unwrap().len(), 2);

    let out = tempfile::tempdir().unwrap();
    let path = job.download_file("notes.txt", out.path()).await.unwrap();
    assert_eq!(std::fs::read_to_string(path).unwrap(), "hello");

    let err = job.download_file("absent.vtu", out.path()).await.unwrap_err();
    assert!(matches!(err, OnscaleError::NotFound(_)));

    let err = job
        .upload_file(dir.path().join("nope.txt"))
        .await
        .unwrap_err();
    assert!(matches!(err, OnscaleError::Upload { ref file, .. } if file == "nope.txt"));
}

#[tokio::test]
async fn blobs_tags_and_renames() {
    let portal = portal();
    let session = session(&portal).await;
    let mut job = session
        .create_job("first", &HpcSelector::AccountDefault)
        .await
        .unwrap();
    let dir = tempfile::tempdir().unwrap();
    let cad = dir.path().join("part.step");
    std::fs::write(&cad, "solid").unwrap();

    let blob_id = job.upload_blob(BlobType::Cad, &cad).await.unwrap();
    let blobs = job.blob_list().await.unwrap();
    assert_eq!(blobs.len(), 1);
    assert_eq!(blobs[0].blob_id, blob_id);

    job.tag("validation").await.unwrap();
    job.tag("validation").await.unwrap();
    job.tag("nightly").await.unwrap();
    assert_eq!(job.tag_list().await.unwrap(), vec!["validation", "nightly"]);
    job.untag("validation").await.unwrap();
    assert_eq!(job.tag_list().await.unwrap(), vec!["nightly"]);

    job.rename("second").await.unwrap();
    assert_eq!(job.name(), Some("second"));
}

#[tokio::test]
async fn wait_feeds_the_progress_tracker() {
    let portal = portal().with_status_script([
        JobStatus::Queued,
        JobStatus::Running,
        JobStatus::Finished,
    ]);
    let session = session(&portal).await;
    let dir = tempfile::tempdir().unwrap();
    let (input, _) = input_files(dir.path());
    let mut job = session
        .submit(
            PayloadBuilder::from_input_file(&input),
            SubmitOptions::default(),
        )
        .await
        .unwrap();

    let mut tracker = ProgressTracker::new();
    let status = job
        .wait_with_progress(&fast_polls(), &CancellationToken::new(), &mut tracker)
        .await
        .unwrap();

    assert_eq!(status, JobStatus::Finished);
    assert_eq!(tracker.len(), 1);
    assert!(tracker.all_complete());
    assert_eq!(portal.call_count("job_progress"), 3);
}

#[tokio::test]
async fn failed_simulation_marker_reaches_the_tracker() {
    let portal = portal().with_status_script([JobStatus::Running, JobStatus::Failed]);
    let session = session(&portal).await;
    let dir = tempfile::tempdir().unwrap();
    let (input, _) = input_files(dir.path());
    let mut job = session
        .submit(
            PayloadBuilder::from_input_file(&input),
            SubmitOptions::default(),
        )
        .await
        .unwrap();

    let mut tracker = ProgressTracker::new();
    let status = job
        .wait_with_progress(&fast_polls(), &CancellationToken::new(), &mut tracker)
        .await
        .unwrap();

    assert_eq!(status, JobStatus::Failed);
    let entry = &tracker.entries()[0];
    assert_eq!(entry.status, "FAILED");
    assert!(entry.complete);
}

#[tokio::test(start_paused = true)]
async fn wait_times_out_with_the_last_status() {
    let portal = portal();
    let session = session(&portal).await;
    let mut job = session
        .create_job("slow", &HpcSelector::AccountDefault)
        .await
        .unwrap();
    portal.set_status(&job.id(), JobStatus::Running);

    let policy = PollPolicy::default().with_timeout(Duration::from_secs(30));
    let err = job
        .wait_for_terminal(&policy, &CancellationToken::new())
        .await
        .unwrap_err();

    match err {
        OnscaleError::Timeout {
            job_id,
            last_status,
        } => {
            assert_eq!(job_id, job.id());
            assert_eq!(last_status, JobStatus::Running);
        }
        other => panic!("expected a timeout, got {other:?}"),
    }
    // Polls at 0, 2, 6, 14 and 30 seconds.
    assert_eq!(portal.call_count("job_load"), 1 + 5);
}

#[tokio::test(start_paused = true)]
async fn wait_can_be_cancelled() {
    let portal = portal();
    let session = session(&portal).await;
    let mut job = session
        .create_job("forever", &HpcSelector::AccountDefault)
        .await
        .unwrap();
    portal.set_status(&job.id(), JobStatus::Running);

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(90)).await;
        trigger.cancel();
    });

    let err = job
        .wait_for_terminal(&PollPolicy::default(), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, OnscaleError::Cancelled));
}
