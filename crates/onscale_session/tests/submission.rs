mod common;

use common::*;
use onscale_core::constants::files::METADATA_FILE_NAME;
use onscale_mock::InMemoryPortal;
use onscale_session::prelude::*;

#[tokio::test]
async fn submit_wait_and_download() {
    let portal = portal()
        .with_status_script([JobStatus::Running, JobStatus::Finished])
        .with_result_file("beam.vtu", "mesh data")
        .with_result_file("sim/history.csv", "t,u\n0,0\n");
    let session = session(&portal).await;
    let dir = tempfile::tempdir().unwrap();
    let (input, geometry) = input_files(dir.path());

    let payload = PayloadBuilder::from_input_file(&input)
        .with_file(&geometry)
        .prepare()
        .await
        .unwrap();
    let mut workflow = session.submission(payload, SubmitOptions::default().with_max_spend(5.0));
    let mut job = workflow.run().await.unwrap();

    assert_eq!(workflow.state(), SubmissionState::Submitted);
    assert_eq!(workflow.job_id(), Some(&job.id()));
    let chosen = workflow.chosen_estimate().unwrap();
    assert!(chosen.cost <= 5.0);
    assert_eq!(chosen.cores, 2);

    let uploaded = portal.uploaded_files(&job.id());
    assert_eq!(uploaded.len(), 3);
    assert!(uploaded.contains(&format!("{}.flxinp", job.id())));
    assert!(uploaded.contains(&"beam.step".to_string()));
    assert!(uploaded.contains(&METADATA_FILE_NAME.to_string()));

    let submitted = portal.submitted();
    assert_eq!(submitted.len(), 1);
    assert_eq!(submitted[0].hpc_id.as_deref(), Some("hpc-aws"));
    assert_eq!(submitted[0].operation, Some(Operation::Simulation));
    assert_eq!(submitted[0].job_type, "test simulation");
    assert!(submitted[0].job_name.as_deref().unwrap().starts_with("beam_"));

    let status = job
        .wait_for_terminal(&fast_polls(), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(status, JobStatus::Finished);

    let out = tempfile::tempdir().unwrap();
    let report = job
        .download_results(out.path(), &ResultFilter::All)
        .await
        .unwrap();
    assert!(report.is_complete());
    assert_eq!(report.succeeded.len(), 2);
    assert_eq!(
        std::fs::read_to_string(out.path().join("sim/history.csv")).unwrap(),
        "t,u\n0,0\n"
    );
}

#[tokio::test]
async fn over_budget_stops_before_submit() {
    let portal = portal();
    let session = session(&portal).await;
    let dir = tempfile::tempdir().unwrap();
    let (input, _) = input_files(dir.path());

    let payload = PayloadBuilder::from_input_file(&input)
        .prepare()
        .await
        .unwrap();
    let mut workflow = session.submission(payload, SubmitOptions::default().with_max_spend(1.0));
    let err = workflow.run().await.unwrap_err();

    match err {
        OnscaleError::BudgetExceeded {
            job_id,
            estimate,
            max_spend,
        } => {
            assert_eq!(Some(&job_id), workflow.job_id());
            assert_eq!(estimate, 2.0);
            assert_eq!(max_spend, 1.0);
        }
        other => panic!("expected budget error, got {other:?}"),
    }
    assert_eq!(workflow.state(), SubmissionState::BudgetExceeded);
    assert!(portal.submitted().is_empty());

    let job = session.get_job(workflow.job_id().unwrap()).await.unwrap();
    assert_eq!(job.status().await.unwrap(), JobStatus::Created);
}

#[tokio::test]
async fn parts_pick_the_cheapest_candidate_with_enough_parts() {
    let portal = portal();
    let session = session(&portal).await;
    let dir = tempfile::tempdir().unwrap();
    let (input, _) = input_files(dir.path());

    let job = session
        .submit(
            PayloadBuilder::from_input_file(&input),
            SubmitOptions::default().with_max_spend(10.0).with_parts(2),
        )
        .await
        .unwrap();

    let submitted = &portal.submitted()[0];
    assert_eq!(submitted.job_id, job.id().to_string());
    assert_eq!(submitted.cores_required, 4);
    assert_eq!(submitted.number_of_parts, Some(2));
    assert_eq!(submitted.core_hour_estimate, 3.0);
}

#[tokio::test]
async fn same_submission_twice_creates_two_jobs() {
    let portal = portal();
    let session = session(&portal).await;
    let dir = tempfile::tempdir().unwrap();
    let (input, _) = input_files(dir.path());

    let first = session
        .submit(PayloadBuilder::from_input_file(&input), SubmitOptions::default())
        .await
        .unwrap();
    let second = session
        .submit(PayloadBuilder::from_input_file(&input), SubmitOptions::default())
        .await
        .unwrap();

    assert_ne!(first.id(), second.id());
    assert_eq!(portal.job_count(), 2);
}

#[tokio::test]
async fn idempotency_key_reuses_the_recorded_job() {
    let portal = portal();
    let session = session(&portal).await;
    let dir = tempfile::tempdir().unwrap();
    let (input, _) = input_files(dir.path());
    let mut ledger = SubmissionLedger::open(dir.path().join("ledger.json"))
        .await
        .unwrap();

    let payload = PayloadBuilder::from_input_file(&input)
        .prepare()
        .await
        .unwrap();
    let options = SubmitOptions::default().with_idempotency_key("nightly-42");

    let first = session
        .submission(payload.clone(), options.clone())
        .with_ledger(&mut ledger)
        .run()
        .await
        .unwrap();

    let mut again = session.submission(payload, options).with_ledger(&mut ledger);
    let second = again.run().await.unwrap();

    assert_eq!(first.id(), second.id());
    assert_eq!(again.state(), SubmissionState::Submitted);
    assert_eq!(portal.job_count(), 1);
    assert_eq!(portal.call_count("job_init"), 1);
    assert_eq!(portal.call_count("job_submit"), 1);

    let reopened = SubmissionLedger::open(dir.path().join("ledger.json"))
        .await
        .unwrap();
    assert_eq!(reopened.get("nightly-42"), Some(&first.id()));
}

#[tokio::test]
async fn keyed_retry_after_a_failed_upload_submits_the_recorded_job() {
    let portal = portal().with_failing_upload("simulationMetadata.json");
    let session = session(&portal).await;
    let dir = tempfile::tempdir().unwrap();
    let (input, _) = input_files(dir.path());
    let mut ledger = SubmissionLedger::open(dir.path().join("ledger.json"))
        .await
        .unwrap();

    let payload = PayloadBuilder::from_input_file(&input)
        .prepare()
        .await
        .unwrap();
    let options = SubmitOptions::default().with_idempotency_key("retry-1");

    let mut first = session
        .submission(payload.clone(), options.clone())
        .with_ledger(&mut ledger);
    assert!(matches!(first.run().await, Err(OnscaleError::Upload { .. })));
    assert_eq!(first.state(), SubmissionState::Failed);
    let job_id = first.job_id().cloned().unwrap();
    assert!(portal.submitted().is_empty());

    portal.restore_uploads();
    let mut retry = session.submission(payload, options).with_ledger(&mut ledger);
    let job = retry.run().await.unwrap();

    assert_eq!(job.id(), job_id);
    assert_eq!(retry.state(), SubmissionState::Submitted);
    assert_eq!(portal.call_count("job_init"), 1);
    assert_eq!(portal.call_count("job_submit"), 1);
    assert_eq!(portal.submitted()[0].job_id, job_id.to_string());
    assert!(
        portal
            .uploaded_files(&job_id)
            .contains(&"simulationMetadata.json".to_string())
    );
}

#[tokio::test]
async fn cost_equal_to_max_spend_is_submitted() {
    let portal = portal();
    let session = session(&portal).await;
    let dir = tempfile::tempdir().unwrap();
    let (input, _) = input_files(dir.path());

    let payload = PayloadBuilder::from_input_file(&input)
        .prepare()
        .await
        .unwrap();
    let mut workflow = session.submission(payload, SubmitOptions::default().with_max_spend(2.0));
    workflow.run().await.unwrap();

    assert_eq!(workflow.state(), SubmissionState::Submitted);
    assert_eq!(portal.submitted()[0].core_hour_estimate, 2.0);
}

#[tokio::test]
async fn unreadable_auxiliary_file_creates_no_job() {
    let portal = portal();
    let session = session(&portal).await;
    let dir = tempfile::tempdir().unwrap();
    let (input, _) = input_files(dir.path());

    let err = session
        .submit(
            PayloadBuilder::from_input_file(&input).with_file(dir.path().join("missing.stl")),
            SubmitOptions::default(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, OnscaleError::Validation(_)));
    assert_eq!(portal.job_count(), 0);
    assert_eq!(portal.call_count("job_init"), 0);
}

#[tokio::test]
async fn failed_upload_names_the_file() {
    let portal = portal().with_failing_upload("beam.step");
    let session = session(&portal).await;
    let dir = tempfile::tempdir().unwrap();
    let (input, geometry) = input_files(dir.path());

    let payload = PayloadBuilder::from_input_file(&input)
        .with_file(&geometry)
        .prepare()
        .await
        .unwrap();
    let mut workflow = session.submission(payload, SubmitOptions::default());
    let err = workflow.run().await.unwrap_err();

    assert!(matches!(err, OnscaleError::Upload { ref file, .. } if file == "beam.step"));
    assert_eq!(workflow.state(), SubmissionState::Failed);
    assert!(workflow.job_id().is_some());
    assert_eq!(portal.call_count("estimate"), 0);
}

#[tokio::test]
async fn estimator_error_is_estimate_failed() {
    let portal = InMemoryPortal::default()
        .with_account(ACCOUNT, "Acme")
        .with_hpc(ACCOUNT, hpc("hpc-aws", "AWS", "us-east-1", true))
        .with_estimate_error("mesher crashed");
    let session = session(&portal).await;
    let dir = tempfile::tempdir().unwrap();
    let (input, _) = input_files(dir.path());

    let payload = PayloadBuilder::from_input_file(&input)
        .prepare()
        .await
        .unwrap();
    let mut workflow = session.submission(payload, SubmitOptions::default());
    let err = workflow.run().await.unwrap_err();

    assert!(matches!(err, OnscaleError::EstimateFailed { .. }));
    assert_eq!(workflow.state(), SubmissionState::EstimateFailed);
}

#[tokio::test]
async fn explicit_resources_skip_the_estimator() {
    let portal = portal();
    let session = session(&portal).await;
    let dir = tempfile::tempdir().unwrap();
    let (input, _) = input_files(dir.path());

    session
        .submit(
            PayloadBuilder::from_input_file(&input),
            SubmitOptions::default().with_resources(80, 4096, 12.5),
        )
        .await
        .unwrap();

    assert_eq!(portal.call_count("estimate"), 0);
    let submitted = &portal.submitted()[0];
    assert_eq!(submitted.cores_required, 80);
    assert_eq!(submitted.number_of_parts, Some(40));
    assert_eq!(submitted.ram_estimate, 4096);
    // 80 cores is above the AWS multi-node threshold.
    assert_eq!(submitted.operation, Some(Operation::Mnmpi));
}

#[tokio::test]
async fn explicit_resources_over_budget() {
    let portal = portal();
    let session = session(&portal).await;
    let dir = tempfile::tempdir().unwrap();
    let (input, _) = input_files(dir.path());

    let err = session
        .submit(
            PayloadBuilder::from_input_file(&input),
            SubmitOptions::default()
                .with_resources(4, 1024, 12.5)
                .with_max_spend(10.0),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, OnscaleError::BudgetExceeded { estimate, .. } if estimate == 12.5));
}

#[tokio::test]
async fn reflex_descriptions_run_single_precision_with_links() {
    let portal = portal();
    let session = session(&portal).await;

    let description = JsonDescription::new("cantilever", serde_json::json!({"mesh": "fine"}));
    session
        .submit(
            PayloadBuilder::from_description(description)
                .with_linked_file(LinkedFile::new("job-0", "field.h5", "initial.h5").in_simulation("sim-0")),
            SubmitOptions::default()
                .with_precision(Precision::Double)
                .with_hpc(HpcSelector::Cloud("gcp".into())),
        )
        .await
        .unwrap();

    let submitted = &portal.submitted()[0];
    assert_eq!(submitted.precision, Precision::Single);
    assert_eq!(submitted.operation, Some(Operation::ReflexMpi));
    assert_eq!(submitted.hpc_id.as_deref(), Some("hpc-gcp"));
    assert_eq!(submitted.file_dependencies, vec!["/sim-0/field.h5".to_string()]);
    assert_eq!(submitted.file_aliases, vec!["/initial.h5".to_string()]);
    assert_eq!(submitted.file_dependent_job_id_list, vec!["job-0".to_string()]);
    assert!(submitted.main_file.ends_with(".json"));
}

#[tokio::test]
async fn estimate_only_stops_after_estimating() {
    let portal = portal();
    let session = session(&portal).await;
    let dir = tempfile::tempdir().unwrap();
    let (input, _) = input_files(dir.path());

    let payload = PayloadBuilder::from_input_file(&input)
        .prepare()
        .await
        .unwrap();
    let mut workflow = session.submission(payload, SubmitOptions::default().estimate_only());
    let job = workflow.run().await.unwrap();

    assert_eq!(workflow.state(), SubmissionState::Estimated);
    assert_eq!(workflow.chosen_estimate().unwrap().cost, 2.0);
    assert_eq!(job.snapshot().status(), JobStatus::Created);
    assert!(portal.submitted().is_empty());
}
