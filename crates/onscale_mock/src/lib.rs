//! # OnScale Mock Portal
//!
//! A scripted, in-memory implementation of [`PortalApi`] for tests and demos.
//!
//! Jobs, uploads, tags and blobs live in process memory. Estimates, status sequences,
//! result files and upload failures are scripted up front.
//!
//! **DO NOT use this in production!!!**
//!
//! ## Usage
//!
//! ```rust
//! # use onscale_mock::InMemoryPortal;
//! # use onscale_core::prelude::*;
//! # fn main() {
//! let portal = InMemoryPortal::new(PortalTarget::Test)
//!     .with_account("a-1", "Acme")
//!     .with_status_script([JobStatus::Running, JobStatus::Finished]);
//! # }
//! ```

use bytes::Bytes;
use onscale_core::prelude::*;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

#[derive(Default)]
struct PortalState {
    auth_failure: Option<AuthError>,
    user: UserDetails,
    accounts: Vec<Account>,
    hpcs: HashMap<String, Vec<HpcDescriptor>>,
    balances: HashMap<String, AccountBalance>,
    /// Creation order.
    jobs: Vec<JobRecord>,
    status_script: Vec<JobStatus>,
    pending_statuses: HashMap<JobId, VecDeque<JobStatus>>,
    estimate: Option<Result<EstimateResults, String>>,
    uploads: HashMap<JobId, BTreeMap<String, Bytes>>,
    failing_uploads: HashSet<String>,
    /// `None` content means the file is listed but can't be downloaded.
    result_files: Vec<(String, Option<Bytes>)>,
    blobs: HashMap<String, Vec<Blob>>,
    tags: Vec<Tag>,
    submitted: Vec<JobSubmitRequest>,
    calls: Vec<String>,
}

/// An in-memory portal. Clones share the same state.
#[derive(Clone)]
pub struct InMemoryPortal {
    portal: PortalTarget,
    state: Arc<Mutex<PortalState>>,
}

impl Default for InMemoryPortal {
    fn default() -> Self {
        Self::new(PortalTarget::Test)
    }
}

impl InMemoryPortal {
    pub fn new(portal: PortalTarget) -> Self {
        let state = PortalState {
            user: UserDetails {
                user_id: Some("mock-user".into()),
                cognito_email: Some("mock@onscale.test".into()),
                ..Default::default()
            },
            ..Default::default()
        };
        Self {
            portal,
            state: Arc::new(Mutex::new(state)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PortalState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Records the call and fails if the portal was told to reject the token.
    fn enter(&self, call: &str) -> Result<MutexGuard<'_, PortalState>, PortalError> {
        debug!(call, "mock portal");
        let mut state = self.lock();
        state.calls.push(call.to_string());
        match &state.auth_failure {
            Some(e) => Err(e.clone().into()),
            None => Ok(state),
        }
    }

    pub fn with_account(self, id: &str, name: &str) -> Self {
        self.lock().accounts.push(Account {
            account_id: id.to_string(),
            account_name: name.to_string(),
            ..Default::default()
        });
        self
    }

    pub fn with_hpc(self, account_id: &str, hpc: HpcDescriptor) -> Self {
        self.lock()
            .hpcs
            .entry(account_id.to_string())
            .or_default()
            .push(hpc);
        self
    }

    pub fn with_balance(self, account_id: &str, balance: AccountBalance) -> Self {
        self.lock().balances.insert(account_id.to_string(), balance);
        self
    }

    /// Every estimate request answers with these candidates.
    pub fn with_estimate(self, results: EstimateResults) -> Self {
        self.lock().estimate = Some(Ok(results));
        self
    }

    pub fn with_estimate_error(self, message: &str) -> Self {
        self.lock().estimate = Some(Err(message.to_string()));
        self
    }

    /// Statuses successive `job_load` calls report after a job is submitted.
    ///
    /// The last status sticks once the script runs out.
    pub fn with_status_script(self, statuses: impl IntoIterator<Item = JobStatus>) -> Self {
        self.lock().status_script = statuses.into_iter().collect();
        self
    }

    /// A result file every submitted job produces.
    pub fn with_result_file(self, name: &str, data: impl Into<Bytes>) -> Self {
        self.lock()
            .result_files
            .push((name.to_string(), Some(data.into())));
        self
    }

    /// A result file that is listed but whose download fails.
    pub fn with_missing_result_file(self, name: &str) -> Self {
        self.lock().result_files.push((name.to_string(), None));
        self
    }

    /// Uploads of a file with this name fail.
    pub fn with_failing_upload(self, name: &str) -> Self {
        self.lock().failing_uploads.insert(name.to_string());
        self
    }

    /// Every call fails with this error, as if the token had been rejected.
    pub fn with_auth_error(self, error: AuthError) -> Self {
        self.lock().auth_failure = Some(error);
        self
    }

    /// Adds an existing job, e.g. one created in an earlier session.
    pub fn insert_job(&self, record: JobRecord) {
        self.lock().jobs.push(record);
    }

    /// Lets previously failing uploads through again.
    pub fn restore_uploads(&self) {
        self.lock().failing_uploads.clear();
    }

    pub fn set_status(&self, job_id: &JobId, status: JobStatus) {
        let mut state = self.lock();
        state.pending_statuses.remove(job_id);
        if let Some(job) = state.jobs.iter_mut().find(|j| j.job_id == job_id.as_str()) {
            job.last_status = Some(status);
        }
    }

    /// Names of the calls made so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    pub fn call_count(&self, call: &str) -> usize {
        self.lock().calls.iter().filter(|c| *c == call).count()
    }

    pub fn job_count(&self) -> usize {
        self.lock().jobs.len()
    }

    pub fn job_ids(&self) -> Vec<JobId> {
        self.lock().jobs.iter().map(|j| j.id()).collect()
    }

    /// Names uploaded to a job, sorted.
    pub fn uploaded_files(&self, job_id: &JobId) -> Vec<String> {
        self.lock()
            .uploads
            .get(job_id)
            .map(|files| files.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn uploaded(&self, job_id: &JobId, name: &str) -> Option<Bytes> {
        self.lock().uploads.get(job_id)?.get(name).cloned()
    }

    pub fn submitted(&self) -> Vec<JobSubmitRequest> {
        self.lock().submitted.clone()
    }

    pub fn tags(&self) -> Vec<Tag> {
        self.lock().tags.clone()
    }
}

fn job_mut<'a>(state: &'a mut PortalState, job_id: &JobId) -> Result<&'a mut JobRecord, PortalError> {
    state
        .jobs
        .iter_mut()
        .find(|j| j.job_id == job_id.as_str())
        .ok_or_else(|| PortalError::NotFound(format!("job {job_id}")))
}

fn simulation_id(job_id: &JobId) -> String {
    format!("{job_id}-sim-0")
}

fn mem_uri(job_id: &JobId, name: &str) -> String {
    format!("mem://{job_id}/{name}")
}

impl PortalApi for InMemoryPortal {
    fn portal(&self) -> PortalTarget {
        self.portal
    }

    async fn user_details(&self) -> Result<UserDetails, PortalError> {
        let state = self.enter("user_details")?;
        Ok(state.user.clone())
    }

    async fn account_list(&self) -> Result<Vec<Account>, PortalError> {
        let state = self.enter("account_list")?;
        Ok(state.accounts.clone())
    }

    async fn hpc_list(&self, account_id: &str) -> Result<Vec<HpcDescriptor>, PortalError> {
        let state = self.enter("hpc_list")?;
        Ok(state.hpcs.get(account_id).cloned().unwrap_or_default())
    }

    async fn account_balance(&self, account_id: &str) -> Result<AccountBalance, PortalError> {
        let state = self.enter("account_balance")?;
        state
            .balances
            .get(account_id)
            .cloned()
            .ok_or_else(|| PortalError::NotFound(format!("account {account_id}")))
    }

    async fn job_init(&self, request: &JobInitRequest) -> Result<JobId, PortalError> {
        let mut state = self.enter("job_init")?;
        if !state
            .accounts
            .iter()
            .any(|a| a.account_id == request.account_id)
        {
            return Err(PortalError::InvalidRequest(format!(
                "unknown account {}",
                request.account_id
            )));
        }

        let id = JobId::new(uuid::Uuid::new_v4().to_string());
        state.jobs.push(JobRecord {
            job_id: id.to_string(),
            job_name: request.job_name.clone(),
            account_id: Some(request.account_id.clone()),
            hpc_id: request.hpc_id.clone(),
            created_date: Some(chrono::Utc::now().timestamp_millis()),
            last_status: Some(JobStatus::Created),
            ..Default::default()
        });
        Ok(id)
    }

    async fn job_load(&self, job_id: &JobId) -> Result<JobRecord, PortalError> {
        let mut state = self.enter("job_load")?;
        let next = state
            .pending_statuses
            .get_mut(job_id)
            .and_then(|queue| queue.pop_front());
        let job = job_mut(&mut state, job_id)?;
        if let Some(status) = next {
            job.last_status = Some(status);
        }
        Ok(job.clone())
    }

    async fn job_list(
        &self,
        account_id: &str,
        max: Option<usize>,
    ) -> Result<Vec<JobRecord>, PortalError> {
        let state = self.enter("job_list")?;
        let jobs = state
            .jobs
            .iter()
            .rev()
            .filter(|j| j.account_id.as_deref() == Some(account_id))
            .take(max.unwrap_or(usize::MAX))
            .cloned()
            .collect();
        Ok(jobs)
    }

    async fn job_submit(&self, request: &JobSubmitRequest) -> Result<JobRecord, PortalError> {
        let mut state = self.enter("job_submit")?;
        let id = JobId::new(request.job_id.clone());
        let script: VecDeque<JobStatus> = state.status_script.iter().cloned().collect();
        state.submitted.push(request.clone());
        state.pending_statuses.insert(id.clone(), script);

        let job = job_mut(&mut state, &id)?;
        job.last_status = Some(JobStatus::Queued);
        job.operation = request.operation;
        job.precision = Some(request.precision);
        job.cores_required = Some(request.cores_required);
        job.ram_estimate = Some(request.ram_estimate);
        job.core_hour_estimate = Some(request.core_hour_estimate);
        job.number_of_parts = request.number_of_parts;
        job.main_file = Some(request.main_file.clone());
        job.job_type = Some(request.job_type.clone());
        job.simulation_count = Some(request.simulation_count);
        if request.job_name.is_some() {
            job.job_name = request.job_name.clone();
        }
        Ok(job.clone())
    }

    async fn job_rename(&self, job_id: &JobId, name: &str) -> Result<(), PortalError> {
        let mut state = self.enter("job_rename")?;
        job_mut(&mut state, job_id)?.job_name = Some(name.to_string());
        Ok(())
    }

    async fn estimate(&self, request: &EstimateRequest) -> Result<EstimateResults, PortalError> {
        let mut state = self.enter("estimate")?;
        job_mut(&mut state, &JobId::new(request.job_id.clone()))?;
        match &state.estimate {
            Some(Ok(results)) => Ok(results.clone()),
            Some(Err(message)) => Err(PortalError::Remote {
                status: 0,
                message: message.clone(),
            }),
            None => Err(PortalError::Unsupported("no estimate scripted".into())),
        }
    }

    async fn job_stop(&self, job_id: &JobId) -> Result<Vec<StopSimulationResponse>, PortalError> {
        let mut state = self.enter("job_stop")?;
        state.pending_statuses.remove(job_id);
        let job = job_mut(&mut state, job_id)?;
        job.last_status = Some(JobStatus::Stopped);
        Ok(vec![StopSimulationResponse {
            simulation_id: Some(simulation_id(job_id)),
            status: "STOPPED".into(),
        }])
    }

    async fn simulation_stop(
        &self,
        job_id: &JobId,
        simulation_id: &str,
    ) -> Result<StopSimulationResponse, PortalError> {
        let mut state = self.enter("simulation_stop")?;
        job_mut(&mut state, job_id)?;
        Ok(StopSimulationResponse {
            simulation_id: Some(simulation_id.to_string()),
            status: "STOPPED".into(),
        })
    }

    async fn job_progress(&self, job_id: &JobId) -> Result<JobProgress, PortalError> {
        let mut state = self.enter("job_progress")?;
        let job = job_mut(&mut state, job_id)?;
        let status = job.status();
        let progress = match &status {
            JobStatus::Running => 50,
            JobStatus::Cancelled => PROGRESS_CANCELLED,
            JobStatus::Failed => PROGRESS_FAILED,
            s if s.is_terminal() => 100,
            _ => 0,
        };
        Ok(JobProgress {
            job_id: Some(job_id.to_string()),
            simulation_progress_list: vec![SimulationProgress {
                simulation_id: simulation_id(job_id),
                simulation_index: Some(0),
                status: status.to_string(),
                progress,
            }],
        })
    }

    async fn file_list(&self, job_id: &JobId) -> Result<Vec<JobFile>, PortalError> {
        let mut state = self.enter("file_list")?;
        let finished = job_mut(&mut state, job_id)?.status() == JobStatus::Finished;

        let file = |name: &str, size: Option<u64>, simulation: Option<String>| JobFile {
            job_id: Some(job_id.to_string()),
            file_name: name.to_string(),
            file_size: size,
            simulation_id: simulation,
            download_request: Some(HttpRequest {
                method: "GET".into(),
                uri: mem_uri(job_id, name),
                ..Default::default()
            }),
        };

        let mut files: Vec<JobFile> = state
            .uploads
            .get(job_id)
            .map(|uploads| {
                uploads
                    .iter()
                    .map(|(name, data)| file(name, Some(data.len() as u64), None))
                    .collect()
            })
            .unwrap_or_default();

        if finished {
            files.extend(state.result_files.iter().map(|(name, data)| {
                let size = data.as_ref().map(|d| d.len() as u64);
                file(name, size, Some(simulation_id(job_id)))
            }));
        }
        Ok(files)
    }

    async fn upload_file(&self, job_id: &JobId, name: &str, data: Bytes) -> Result<(), PortalError> {
        let mut state = self.enter("upload_file")?;
        job_mut(&mut state, job_id)?;
        if state.failing_uploads.contains(name) {
            return Err(PortalError::Remote {
                status: 503,
                message: format!("storage rejected {name}"),
            });
        }
        state
            .uploads
            .entry(job_id.clone())
            .or_default()
            .insert(name.to_string(), data);
        Ok(())
    }

    async fn download_file(&self, file: &JobFile) -> Result<Bytes, PortalError> {
        let state = self.enter("download_file")?;
        let job_id = JobId::new(file.job_id.clone().unwrap_or_default());

        if file.is_result() {
            return state
                .result_files
                .iter()
                .find(|(name, _)| *name == file.file_name)
                .and_then(|(_, data)| data.clone())
                .ok_or_else(|| PortalError::NotFound(file.file_name.clone()));
        }
        state
            .uploads
            .get(&job_id)
            .and_then(|uploads| uploads.get(&file.file_name))
            .cloned()
            .ok_or_else(|| PortalError::NotFound(file.file_name.clone()))
    }

    async fn blob_list(&self, object_id: &str) -> Result<Vec<Blob>, PortalError> {
        let state = self.enter("blob_list")?;
        Ok(state.blobs.get(object_id).cloned().unwrap_or_default())
    }

    async fn upload_blob(
        &self,
        job_id: &JobId,
        blob_type: BlobType,
        name: &str,
        data: Bytes,
    ) -> Result<String, PortalError> {
        let mut state = self.enter("upload_blob")?;
        job_mut(&mut state, job_id)?;
        if state.failing_uploads.contains(name) {
            return Err(PortalError::Remote {
                status: 503,
                message: format!("storage rejected {name}"),
            });
        }
        let blob_id = uuid::Uuid::new_v4().to_string();
        state
            .blobs
            .entry(job_id.to_string())
            .or_default()
            .push(Blob {
                blob_id: blob_id.clone(),
                object_id: Some(job_id.to_string()),
                blob_type,
                original_file_name: Some(name.to_string()),
                file_size: Some(data.len() as u64),
                hash: None,
                parent_blob_id: None,
            });
        Ok(blob_id)
    }

    async fn tag(&self, tag: &Tag) -> Result<(), PortalError> {
        let mut state = self.enter("tag")?;
        if !state.tags.contains(tag) {
            state.tags.push(tag.clone());
        }
        Ok(())
    }

    async fn untag(&self, tag: &Tag) -> Result<(), PortalError> {
        let mut state = self.enter("untag")?;
        state.tags.retain(|t| t != tag);
        Ok(())
    }

    async fn tag_list(&self, item_id: &str) -> Result<Vec<Tag>, PortalError> {
        let state = self.enter("tag_list")?;
        Ok(state
            .tags
            .iter()
            .filter(|t| t.item_id == item_id)
            .cloned()
            .collect())
    }
}
