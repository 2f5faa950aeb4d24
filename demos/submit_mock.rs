//! # Mock Submission
//!
//! Walks a simulation through the whole lifecycle against an [`InMemoryPortal`]: login,
//! account selection, estimate, submission, waiting with progress bars and result download.
//!
//! No credentials or network access needed.
//!
//! ## Usage
//!
//! ```sh
//! cargo run --example submit_mock --features "sdk mock"
//! ```

use onscale::prelude::*;
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // A portal with one account, two HPCs and a scripted job lifecycle.
    let portal = InMemoryPortal::new(PortalTarget::Test)
        .with_account("0954e70b-237a-4cdb-a267-b5da0f67dd70", "Acme Research")
        .with_hpc(
            "0954e70b-237a-4cdb-a267-b5da0f67dd70",
            HpcDescriptor {
                hpc_id: "hpc-aws".into(),
                active: true,
                hpc_cloud: "AWS".into(),
                hpc_region: "us-east-1".into(),
                ..Default::default()
            },
        )
        .with_hpc(
            "0954e70b-237a-4cdb-a267-b5da0f67dd70",
            HpcDescriptor {
                hpc_id: "hpc-gcp".into(),
                active: true,
                hpc_cloud: "GCP".into(),
                hpc_region: "europe-west1".into(),
                ..Default::default()
            },
        )
        .with_estimate(EstimateResults {
            estimate_id: "demo".into(),
            number_of_cores: vec![2, 8, 32],
            estimated_memory: vec![1 << 30, 2 << 30, 4 << 30],
            estimated_run_times: vec![5400.0, 1500.0, 600.0],
            parts_count: Some(vec![1, 4, 16]),
            estimate_type: "REFLEX".into(),
            ..Default::default()
        })
        .with_status_script([JobStatus::Queued, JobStatus::Running, JobStatus::Finished])
        .with_result_file("displacement.vtu", "<VTKFile/>")
        .with_result_file("history/energy.csv", "t,e\n0,0\n");

    let session = Session::establish(portal, None).await?;
    println!("Logged in as {:?}", session.user().cognito_email);
    println!("Accounts: {:?}", session.account_names());
    println!("Clouds: {:?}", session.available_hpc_clouds().await?);

    // Simulation
    let description = JsonDescription::new(
        "cantilever",
        serde_json::json!({
            "length": 0.1,
            "load": 250.0,
            "material": "steel",
        }),
    );

    let payload = PayloadBuilder::from_description(description).prepare().await?;
    let options = SubmitOptions::default()
        .with_max_spend(5.0)
        .with_parts(4)
        .with_hpc(HpcSelector::Cloud("GCP".into()));

    let mut workflow = session.submission(payload, options);
    let mut job = workflow.run().await?;
    if let Some(chosen) = workflow.chosen_estimate() {
        println!(
            "Submitted {} on {} cores ({:.2} core hours)",
            job.id(),
            chosen.cores,
            chosen.cost
        );
    }

    // Wait
    let policy = PollPolicy::default().with_interval(Duration::from_millis(200), Duration::from_secs(1));
    let mut tracker = ProgressTracker::new();
    let mut bars = ProgressBars::new();
    let status = job
        .wait_with_progress(&policy, &CancellationToken::new(), &mut tracker)
        .await?;
    bars.render(&tracker);
    println!("Job ended: {status}");

    // Results
    let dir = tempfile::tempdir()?;
    let report = job.download_results(dir.path(), &ResultFilter::All).await?;
    for path in &report.succeeded {
        println!("Downloaded {}", path.display());
    }
    for (file, error) in &report.failed {
        println!("Failed {file}: {error}");
    }

    Ok(())
}
