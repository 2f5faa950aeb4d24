use serde::{Deserialize, Serialize};

use crate::constants::defaults::{MNMPI_CORES_AWS, MNMPI_CORES_OTHER};

/// The user behind a token, as reported by `GET /user/details`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct UserDetails {
    pub user_id: Option<String>,
    pub cognito_email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// A tenant-level grouping of HPC resources and jobs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub account_id: String,
    pub account_name: String,
    pub email_address: Option<String>,
    pub plan_code: Option<String>,
    pub account_created: Option<i64>,
    pub parent_account_id: Option<String>,
    pub default_project_core_hour: Option<f64>,
    pub default_max_sim_core_hour: Option<f64>,
    pub expiration_date: Option<i64>,
}

/// One element of the `POST /account/list` response.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AccountListEntry {
    pub account: Option<Account>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct AccountBalance {
    pub core_hours_available: f64,
    pub allocation_available: f64,
}

/// A resource target (cloud + region + cluster) a job can run on.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct HpcDescriptor {
    pub hpc_id: String,
    #[serde(default)]
    pub active: bool,
    pub hpc_cloud: String,
    pub hpc_cluster_name: Option<String>,
    pub hpc_description: Option<String>,
    pub hpc_region: String,
    pub storage_bucket: Option<String>,
    pub mnmpi_core_count: Option<u32>,
}

impl HpcDescriptor {
    /// Core count above which jobs on this HPC must use a multi-node operation.
    pub fn mnmpi_threshold(&self) -> u32 {
        self.mnmpi_core_count.unwrap_or(if self.hpc_cloud == "AWS" {
            MNMPI_CORES_AWS
        } else {
            MNMPI_CORES_OTHER
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountRequest {
    pub account_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_list_entry_reads_camel_case() {
        let json = r#"[{"account": {"accountId": "a-1", "accountName": "Acme", "planCode": "PRO"}}, {}]"#;
        let entries: Vec<AccountListEntry> = serde_json::from_str(json).unwrap();
        let acc = entries[0].account.as_ref().unwrap();
        assert_eq!(acc.account_id, "a-1");
        assert_eq!(acc.account_name, "Acme");
        assert_eq!(acc.plan_code.as_deref(), Some("PRO"));
        assert!(entries[1].account.is_none());
    }

    #[test]
    fn mnmpi_threshold_falls_back_per_cloud() {
        let mut hpc = HpcDescriptor {
            hpc_cloud: "AWS".into(),
            ..Default::default()
        };
        assert_eq!(hpc.mnmpi_threshold(), 70);
        hpc.hpc_cloud = "GCP".into();
        assert_eq!(hpc.mnmpi_threshold(), 58);
        hpc.mnmpi_core_count = Some(96);
        assert_eq!(hpc.mnmpi_threshold(), 96);
    }
}
