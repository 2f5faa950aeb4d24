use onscale_core::prelude::*;
use std::collections::BTreeSet;
use tracing::info;

use crate::accounts::{AccountDirectory, HpcSelector};
use crate::error::{OnscaleError, Result};
use crate::job::JobHandle;
use crate::payload::{PayloadBuilder, PreparedPayload};
use crate::profile::Profile;
use crate::submit::{SubmissionWorkflow, SubmitOptions};

/// An authenticated connection to one portal, scoped to the accounts the user can see.
pub struct Session<A: PortalApi> {
    api: A,
    user: UserDetails,
    accounts: AccountDirectory,
}

impl<A: PortalApi> Session<A> {
    /// Checks the token and loads the user's accounts.
    ///
    /// `preference` selects the initial account by id or name. Without one the primary
    /// account is current.
    pub async fn establish(api: A, preference: Option<&str>) -> Result<Self> {
        let user = api.user_details().await?;
        let mut accounts = AccountDirectory::new(api.account_list().await?)?;
        if let Some(preference) = preference {
            accounts.set_preferred(preference)?;
        }
        info!(
            portal = %api.portal(),
            user = user.cognito_email.as_deref().unwrap_or("unknown"),
            account = %accounts.current().account_name,
            "session established"
        );
        Ok(Self {
            api,
            user,
            accounts,
        })
    }

    /// Establishes a session for the profile stored as `alias`, which must target the portal
    /// `api` talks to.
    pub async fn login(api: A, alias: &str, profile: &Profile) -> Result<Self> {
        if profile.portal != api.portal() {
            return Err(ConfigError::PortalMismatch {
                alias: alias.to_string(),
                requested: api.portal().to_string(),
                actual: profile.portal.to_string(),
            }
            .into());
        }
        Self::establish(api, profile.account.as_deref()).await
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn portal(&self) -> PortalTarget {
        self.api.portal()
    }

    pub fn user(&self) -> &UserDetails {
        &self.user
    }

    pub fn list_accounts(&self) -> &[Account] {
        self.accounts.accounts()
    }

    pub fn account_names(&self) -> Vec<&str> {
        self.accounts.names()
    }

    pub fn account_ids(&self) -> Vec<&str> {
        self.accounts.ids()
    }

    pub fn account(&self, name: &str) -> Result<&Account> {
        self.accounts.by_name(name)
    }

    /// Selects the current account by exactly one of name or id.
    pub fn set_current(&mut self, name: Option<&str>, id: Option<&str>) -> Result<&Account> {
        self.accounts.set_current(name, id)
    }

    pub fn current_account(&self) -> &Account {
        self.accounts.current()
    }

    pub async fn account_balance(&self) -> Result<AccountBalance> {
        Ok(self
            .api
            .account_balance(&self.current_account().account_id)
            .await?)
    }

    /// HPCs of `account_id`, or of the current account.
    pub async fn hpc_list(&self, account_id: Option<&str>) -> Result<Vec<HpcDescriptor>> {
        let account_id = account_id.unwrap_or(&self.current_account().account_id);
        Ok(self.api.hpc_list(account_id).await?)
    }

    /// Clouds of every HPC listed for the current account, active or not.
    pub async fn available_hpc_clouds(&self) -> Result<BTreeSet<String>> {
        Ok(self
            .hpc_list(None)
            .await?
            .into_iter()
            .map(|h| h.hpc_cloud)
            .collect())
    }

    pub async fn available_hpc_regions(&self) -> Result<BTreeSet<String>> {
        Ok(self
            .hpc_list(None)
            .await?
            .into_iter()
            .map(|h| h.hpc_region)
            .collect())
    }

    pub async fn resolve_hpc(&self, selector: &HpcSelector) -> Result<HpcDescriptor> {
        let hpcs = self.hpc_list(None).await?;
        selector.select(&hpcs).cloned()
    }

    pub async fn hpc_for_region(&self, region: &str) -> Result<HpcDescriptor> {
        self.resolve_hpc(&HpcSelector::Region(region.to_string()))
            .await
    }

    pub async fn hpc_for_cloud(&self, cloud: &str) -> Result<HpcDescriptor> {
        self.resolve_hpc(&HpcSelector::Cloud(cloud.to_string()))
            .await
    }

    pub async fn hpc_by_id(&self, id: &str) -> Result<HpcDescriptor> {
        self.resolve_hpc(&HpcSelector::Id(id.to_string())).await
    }

    /// A handle to an existing job. [`OnscaleError::NotFound`] if the platform has none.
    pub async fn get_job(&self, job_id: &JobId) -> Result<JobHandle<A>> {
        let record = self.api.job_load(job_id).await?;
        Ok(JobHandle::new(self.api.clone(), record))
    }

    /// Jobs of the current account, most recent first.
    pub async fn job_history(&self, max: Option<usize>) -> Result<Vec<JobHandle<A>>> {
        let records = self
            .api
            .job_list(&self.current_account().account_id, max)
            .await?;
        Ok(records
            .into_iter()
            .map(|r| JobHandle::new(self.api.clone(), r))
            .collect())
    }

    pub async fn last_job(&self) -> Result<Option<JobHandle<A>>> {
        Ok(self.job_history(Some(1)).await?.into_iter().next())
    }

    /// Creates an empty job record without uploading or submitting anything.
    pub async fn create_job(&self, name: &str, hpc: &HpcSelector) -> Result<JobHandle<A>> {
        let hpc = self.resolve_hpc(hpc).await?;
        let job_id = self
            .api
            .job_init(&JobInitRequest {
                account_id: self.current_account().account_id.clone(),
                hpc_id: Some(hpc.hpc_id),
                job_name: Some(name.to_string()),
            })
            .await?;
        info!(%job_id, name, "job created");
        self.get_job(&job_id).await
    }

    /// A workflow for submitting `payload`. Call [`SubmissionWorkflow::run`] to start it.
    pub fn submission(
        &self,
        payload: PreparedPayload,
        options: SubmitOptions,
    ) -> SubmissionWorkflow<'_, A> {
        SubmissionWorkflow::new(self, payload, options)
    }

    /// Prepares and submits in one go.
    pub async fn submit(
        &self,
        payload: PayloadBuilder,
        options: SubmitOptions,
    ) -> Result<JobHandle<A>> {
        let payload = payload.prepare().await?;
        self.submission(payload, options).run().await
    }
}

impl<A: PortalApi> std::fmt::Debug for Session<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("portal", &self.portal())
            .field("user", &self.user)
            .field("accounts", &self.accounts)
            .finish()
    }
}
