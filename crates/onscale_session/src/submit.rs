//! The submission workflow: create the job, upload its files, estimate, submit.
//!
//! ```text
//! PENDING -> CREATED -> UPLOADING -> ESTIMATING -> ESTIMATED -> SUBMITTED
//!                           |            |             |
//!                         FAILED   ESTIMATE_FAILED  BUDGET_EXCEEDED
//! ```
//!
//! A job record exists from `CREATED` on. Whatever happens afterwards,
//! [`SubmissionWorkflow::job_id`] tells the caller which job to look at.

use chrono::Local;
use onscale_core::constants::defaults::{APPLICATION, DOCKER_TAG};
use onscale_core::prelude::*;
use std::fmt;
use tracing::{info, warn};

use crate::accounts::HpcSelector;
use crate::error::{OnscaleError, Result};
use crate::job::JobHandle;
use crate::ledger::SubmissionLedger;
use crate::payload::PreparedPayload;
use crate::session::Session;

/// Caller choices for one submission. Everything left unset is estimated or defaulted.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitOptions {
    /// Core hours the job may cost. Infinite by default, which picks the cheapest candidate.
    pub max_spend: f64,
    pub job_name: Option<String>,
    pub hpc: HpcSelector,
    pub precision: Precision,
    pub docker_tag_id: Option<String>,
    pub job_type: Option<String>,
    /// RAM in MB. Together with `core_hour_estimate` and cores or parts, skips the estimator.
    pub ram: Option<u64>,
    pub cores: Option<u32>,
    pub core_hour_estimate: Option<f64>,
    pub number_of_parts: Option<u32>,
    pub supervisor_id: Option<String>,
    /// Key under which the created job is recorded in a [`SubmissionLedger`].
    pub idempotency_key: Option<String>,
    /// Stop after the configuration is chosen, without submitting.
    pub estimate_only: bool,
}

impl Default for SubmitOptions {
    fn default() -> Self {
        Self {
            max_spend: f64::INFINITY,
            job_name: None,
            hpc: HpcSelector::AccountDefault,
            precision: Precision::Single,
            docker_tag_id: None,
            job_type: None,
            ram: None,
            cores: None,
            core_hour_estimate: None,
            number_of_parts: None,
            supervisor_id: None,
            idempotency_key: None,
            estimate_only: false,
        }
    }
}

impl SubmitOptions {
    pub fn with_max_spend(mut self, max_spend: f64) -> Self {
        self.max_spend = max_spend;
        self
    }

    pub fn with_job_name(mut self, name: impl Into<String>) -> Self {
        self.job_name = Some(name.into());
        self
    }

    pub fn with_hpc(mut self, hpc: HpcSelector) -> Self {
        self.hpc = hpc;
        self
    }

    pub fn with_precision(mut self, precision: Precision) -> Self {
        self.precision = precision;
        self
    }

    pub fn with_parts(mut self, parts: u32) -> Self {
        self.number_of_parts = Some(parts);
        self
    }

    /// Runs with exactly these resources instead of asking the estimator.
    pub fn with_resources(mut self, cores: u32, ram: u64, core_hours: f64) -> Self {
        self.cores = Some(cores);
        self.ram = Some(ram);
        self.core_hour_estimate = Some(core_hours);
        self
    }

    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }

    pub fn estimate_only(mut self) -> Self {
        self.estimate_only = true;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionState {
    Pending,
    Created,
    Uploading,
    Estimating,
    Estimated,
    EstimateFailed,
    Submitted,
    Failed,
    BudgetExceeded,
}

impl fmt::Display for SubmissionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SubmissionState::Pending => "PENDING",
            SubmissionState::Created => "CREATED",
            SubmissionState::Uploading => "UPLOADING",
            SubmissionState::Estimating => "ESTIMATING",
            SubmissionState::Estimated => "ESTIMATED",
            SubmissionState::EstimateFailed => "ESTIMATE_FAILED",
            SubmissionState::Submitted => "SUBMITTED",
            SubmissionState::Failed => "FAILED",
            SubmissionState::BudgetExceeded => "BUDGET_EXCEEDED",
        };
        f.write_str(s)
    }
}

/// Cores and parts as the platform runs them.
///
/// More than one part means two cores per part. Cores without parts (or with more than one)
/// give half as many parts, rounded up. A single part without cores runs on two cores.
pub fn normalize_cores(cores: Option<u32>, parts: Option<u32>) -> (Option<u32>, Option<u32>) {
    match (cores, parts) {
        (_, Some(p)) if p > 1 => (Some(2 * p), Some(p)),
        (Some(c), p) if p != Some(1) => (Some(c), Some(c.div_ceil(2))),
        (None, Some(1)) => (Some(2), Some(1)),
        other => other,
    }
}

/// `{stem}_{YYYYmmdd-HHMMSS}` in local time.
pub fn default_job_name(stem: &str) -> String {
    format!("{stem}_{}", Local::now().format("%Y%m%d-%H%M%S"))
}

/// One submission attempt.
pub struct SubmissionWorkflow<'a, A: PortalApi> {
    session: &'a Session<A>,
    payload: PreparedPayload,
    options: SubmitOptions,
    ledger: Option<&'a mut SubmissionLedger>,
    state: SubmissionState,
    job_id: Option<JobId>,
    estimate: Option<EstimateOption>,
}

impl<'a, A: PortalApi> SubmissionWorkflow<'a, A> {
    pub fn new(session: &'a Session<A>, payload: PreparedPayload, options: SubmitOptions) -> Self {
        Self {
            session,
            payload,
            options,
            ledger: None,
            state: SubmissionState::Pending,
            job_id: None,
            estimate: None,
        }
    }

    /// Deduplicates by [`SubmitOptions::idempotency_key`] against `ledger`.
    ///
    /// A recorded job that was submitted is returned as is. One still in `CREATED` is
    /// uploaded, estimated and submitted again under its existing id.
    pub fn with_ledger(mut self, ledger: &'a mut SubmissionLedger) -> Self {
        self.ledger = Some(ledger);
        self
    }

    pub fn state(&self) -> SubmissionState {
        self.state
    }

    /// The job this attempt created or reused, once there is one.
    pub fn job_id(&self) -> Option<&JobId> {
        self.job_id.as_ref()
    }

    /// The configuration the job was, or would have been, submitted with.
    pub fn chosen_estimate(&self) -> Option<&EstimateOption> {
        self.estimate.as_ref()
    }

    pub async fn run(&mut self) -> Result<JobHandle<A>> {
        let result = self.execute().await;
        if let Err(e) = &result {
            let settled = matches!(
                self.state,
                SubmissionState::Pending
                    | SubmissionState::Failed
                    | SubmissionState::EstimateFailed
                    | SubmissionState::BudgetExceeded
            );
            if !settled {
                self.state = SubmissionState::Failed;
            }
            warn!(job_id = ?self.job_id, state = %self.state, error = %e, "submission stopped");
        }
        result
    }

    fn transition(&mut self, state: SubmissionState) {
        info!(job_id = ?self.job_id, from = %self.state, to = %state, "submission");
        self.state = state;
    }

    async fn execute(&mut self) -> Result<JobHandle<A>> {
        let session = self.session;
        let api = session.api();
        let options = self.options.clone();

        // A recorded job that never left CREATED is picked up again from the upload.
        let mut resumed = None;
        if let Some(job_id) = self.recorded_job() {
            let handle = session.get_job(&job_id).await?;
            self.job_id = Some(job_id.clone());
            if handle.snapshot().status() != JobStatus::Created {
                self.transition(SubmissionState::Submitted);
                return Ok(handle);
            }
            info!(%job_id, "resuming recorded job");
            resumed = Some(handle);
        }

        let account_id = session.current_account().account_id.clone();
        let hpc = session.resolve_hpc(&options.hpc).await?;
        let (cores, parts) = normalize_cores(options.cores, options.number_of_parts);
        let job_name = resumed
            .as_ref()
            .and_then(|h| h.name())
            .map(str::to_string)
            .or_else(|| options.job_name.clone())
            .unwrap_or_else(|| default_job_name(self.payload.name()));

        let job_id = match resumed {
            Some(handle) => {
                self.transition(SubmissionState::Created);
                handle.id()
            }
            None => {
                let job_id = api
                    .job_init(&JobInitRequest {
                        account_id: account_id.clone(),
                        hpc_id: Some(hpc.hpc_id.clone()),
                        job_name: Some(job_name.clone()),
                    })
                    .await?;
                self.job_id = Some(job_id.clone());
                self.transition(SubmissionState::Created);

                if let (Some(key), Some(ledger)) = (
                    options.idempotency_key.as_deref(),
                    self.ledger.as_deref_mut(),
                ) {
                    ledger.record(key, &job_id).await?;
                }
                job_id
            }
        };

        let bundle = self.payload.finalize(&job_id)?;

        self.transition(SubmissionState::Uploading);
        for file in bundle.files() {
            if let Err(source) = api.upload_file(&job_id, &file.name, file.data.clone()).await {
                self.transition(SubmissionState::Failed);
                return Err(OnscaleError::Upload {
                    file: file.name.clone(),
                    source,
                });
            }
        }

        let operation = bundle.operation();
        let precision = if operation.solver() == "REFLEX" {
            Precision::Single
        } else {
            options.precision
        };

        let chosen = match (options.ram, options.core_hour_estimate, cores) {
            (Some(ram), Some(core_hours), Some(cores)) => {
                if core_hours > options.max_spend {
                    self.transition(SubmissionState::BudgetExceeded);
                    return Err(OnscaleError::BudgetExceeded {
                        job_id,
                        estimate: core_hours,
                        max_spend: options.max_spend,
                    });
                }
                EstimateOption {
                    estimate_id: String::new(),
                    cores,
                    memory: ram,
                    run_time: core_hours * 3600.0 / f64::from(cores.max(1)),
                    parts: parts.unwrap_or(1),
                    estimate_type: "manual".to_string(),
                    hash: None,
                    cost: core_hours,
                    parameters: serde_json::Value::Null,
                }
            }
            _ => {
                self.transition(SubmissionState::Estimating);
                let request = EstimateRequest {
                    job_id: job_id.to_string(),
                    blob_id: None,
                    main_file: bundle.main_file().to_string(),
                    solver: operation.solver().to_string(),
                    precision,
                    docker_tag: DOCKER_TAG.to_string(),
                    docker_tag_id: options.docker_tag_id.clone(),
                    application: APPLICATION.to_string(),
                    required_blobs: Vec::new(),
                };
                let results = match api.estimate(&request).await {
                    Ok(results) => results,
                    Err(source) => {
                        self.transition(SubmissionState::EstimateFailed);
                        return Err(OnscaleError::EstimateFailed { job_id, source });
                    }
                };
                match results.nearest(options.max_spend, parts) {
                    Some(option) => option,
                    None => {
                        self.transition(SubmissionState::BudgetExceeded);
                        let cheapest = results
                            .lowest_core_hour_spend(None)
                            .map_or(f64::INFINITY, |o| o.cost);
                        return Err(OnscaleError::BudgetExceeded {
                            job_id,
                            estimate: cheapest,
                            max_spend: options.max_spend,
                        });
                    }
                }
            }
        };
        info!(
            %job_id,
            cores = chosen.cores,
            parts = chosen.parts,
            core_hours = chosen.cost,
            "configuration chosen"
        );
        self.estimate = Some(chosen.clone());
        self.transition(SubmissionState::Estimated);

        if options.estimate_only {
            return session.get_job(&job_id).await;
        }

        let operation = if chosen.cores > hpc.mnmpi_threshold() {
            operation.to_mnmpi()
        } else {
            operation
        };
        let linked = self.payload.linked_files();
        let mut dependent_jobs: Vec<String> = Vec::new();
        for l in linked {
            if !dependent_jobs.contains(&l.job_id) {
                dependent_jobs.push(l.job_id.clone());
            }
        }

        let request = JobSubmitRequest {
            job_id: job_id.to_string(),
            job_name: Some(job_name),
            account_id,
            hpc_id: Some(hpc.hpc_id.clone()),
            job_type: options
                .job_type
                .clone()
                .unwrap_or_else(|| format!("{} simulation", session.portal())),
            main_file: bundle.main_file().to_string(),
            operation: Some(operation),
            precision,
            docker_tag: DOCKER_TAG.to_string(),
            docker_tag_id: options.docker_tag_id.clone(),
            application: APPLICATION.to_string(),
            ram_estimate: chosen.memory,
            cores_required: chosen.cores,
            core_hour_estimate: chosen.cost,
            number_of_parts: Some(chosen.parts),
            simulation_count: 1,
            supervisor_id: options.supervisor_id.clone(),
            file_dependencies: linked.iter().map(LinkedFile::dependency_path).collect(),
            file_aliases: linked.iter().map(LinkedFile::alias_path).collect(),
            file_dependent_job_id_list: dependent_jobs,
        };
        let record = api.job_submit(&request).await?;
        self.transition(SubmissionState::Submitted);
        Ok(JobHandle::new(api.clone(), record))
    }

    fn recorded_job(&self) -> Option<JobId> {
        let key = self.options.idempotency_key.as_deref()?;
        self.ledger.as_deref()?.get(key).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_normalisation() {
        assert_eq!(normalize_cores(None, Some(4)), (Some(8), Some(4)));
        assert_eq!(normalize_cores(Some(3), Some(4)), (Some(8), Some(4)));
        assert_eq!(normalize_cores(Some(7), None), (Some(7), Some(4)));
        assert_eq!(normalize_cores(Some(6), Some(0)), (Some(6), Some(3)));
        assert_eq!(normalize_cores(None, Some(1)), (Some(2), Some(1)));
        assert_eq!(normalize_cores(Some(4), Some(1)), (Some(4), Some(1)));
        assert_eq!(normalize_cores(None, None), (None, None));
    }

    #[test]
    fn default_name_has_a_timestamp() {
        let name = default_job_name("beam");
        let (stem, stamp) = name.split_once('_').unwrap();
        assert_eq!(stem, "beam");
        assert_eq!(stamp.len(), "20240101-120000".len());
        assert_eq!(stamp.as_bytes()[8], b'-');
    }

    #[test]
    fn states_display_like_the_platform() {
        assert_eq!(SubmissionState::EstimateFailed.to_string(), "ESTIMATE_FAILED");
        assert_eq!(SubmissionState::BudgetExceeded.to_string(), "BUDGET_EXCEEDED");
    }
}
