#![allow(dead_code)]

use onscale_mock::InMemoryPortal;
use onscale_session::prelude::*;
use std::path::{Path, PathBuf};

pub const ACCOUNT: &str = "0954e70b-237a-4cdb-a267-b5da0f67dd70";

pub fn hpc(id: &str, cloud: &str, region: &str, active: bool) -> HpcDescriptor {
    HpcDescriptor {
        hpc_id: id.into(),
        hpc_cloud: cloud.into(),
        hpc_region: region.into(),
        active,
        ..Default::default()
    }
}

/// Costs 2, 3 and 6 core hours.
pub fn estimate() -> EstimateResults {
    EstimateResults {
        estimate_id: "est-1".into(),
        number_of_cores: vec![2, 4, 8],
        estimated_memory: vec![512, 1024, 2048],
        estimated_run_times: vec![3600.0, 2700.0, 2700.0],
        parts_count: Some(vec![1, 2, 4]),
        estimate_type: "FLEX".into(),
        estimate_hashes: vec![],
        parameters: serde_json::Value::Null,
    }
}

pub fn portal() -> InMemoryPortal {
    InMemoryPortal::default()
        .with_account(ACCOUNT, "Acme")
        .with_account("b-2", "Beta")
        .with_hpc(ACCOUNT, hpc("hpc-aws", "AWS", "us-east-1", true))
        .with_hpc(ACCOUNT, hpc("hpc-gcp", "GCP", "us-central1", true))
        .with_hpc(ACCOUNT, hpc("hpc-aws-2", "AWS", "us-west-2", true))
        .with_hpc(ACCOUNT, hpc("hpc-old", "Azure", "us-east-1", false))
        .with_estimate(estimate())
}

pub async fn session(portal: &InMemoryPortal) -> Session<InMemoryPortal> {
    Session::establish(portal.clone(), None).await.unwrap()
}

/// A solver input file plus one geometry file.
pub fn input_files(dir: &Path) -> (PathBuf, PathBuf) {
    let input = dir.join("beam.flxinp");
    let geometry = dir.join("beam.step");
    std::fs::write(&input, b"symb length = 0.1\nprocexec\n").unwrap();
    std::fs::write(&geometry, b"ISO-10303-21;").unwrap();
    (input, geometry)
}

pub fn fast_polls() -> PollPolicy {
    PollPolicy::default().with_interval(
        std::time::Duration::from_millis(5),
        std::time::Duration::from_millis(20),
    )
}
