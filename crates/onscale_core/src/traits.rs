use crate::account::*;
use crate::error::*;
use crate::estimate::*;
use crate::job::*;
use crate::portal::PortalTarget;

use bytes::Bytes;
use std::path::PathBuf;

/// Access to one OnScale portal on behalf of one authenticated user.
///
/// Every method is exactly one remote operation. Implementations must not cache responses
/// and must not retry.
pub trait PortalApi: Send + Sync + 'static + Clone {
    /// The deployment this implementation talks to.
    fn portal(&self) -> PortalTarget;

    /// Returns the user owning the token. Fails with [`AuthError`] if the token is rejected.
    fn user_details(&self) -> impl Future<Output = Result<UserDetails, PortalError>> + Send;

    /// Lists the accounts visible to the user, in platform order.
    fn account_list(&self) -> impl Future<Output = Result<Vec<Account>, PortalError>> + Send;

    fn hpc_list(
        &self,
        account_id: &str,
    ) -> impl Future<Output = Result<Vec<HpcDescriptor>, PortalError>> + Send;

    fn account_balance(
        &self,
        account_id: &str,
    ) -> impl Future<Output = Result<AccountBalance, PortalError>> + Send;

    /// Allocates a new job record and returns its id.
    fn job_init(
        &self,
        request: &JobInitRequest,
    ) -> impl Future<Output = Result<JobId, PortalError>> + Send;

    fn job_load(&self, job_id: &JobId) -> impl Future<Output = Result<JobRecord, PortalError>> + Send;

    /// Jobs of an account, most recent first.
    fn job_list(
        &self,
        account_id: &str,
        max: Option<usize>,
    ) -> impl Future<Output = Result<Vec<JobRecord>, PortalError>> + Send;

    fn job_submit(
        &self,
        request: &JobSubmitRequest,
    ) -> impl Future<Output = Result<JobRecord, PortalError>> + Send;

    fn job_rename(
        &self,
        job_id: &JobId,
        name: &str,
    ) -> impl Future<Output = Result<(), PortalError>> + Send;

    /// Requests an estimate and waits until the platform reports results or gives up.
    fn estimate(
        &self,
        request: &EstimateRequest,
    ) -> impl Future<Output = Result<EstimateResults, PortalError>> + Send;

    fn job_stop(
        &self,
        job_id: &JobId,
    ) -> impl Future<Output = Result<Vec<StopSimulationResponse>, PortalError>> + Send;

    fn simulation_stop(
        &self,
        job_id: &JobId,
        simulation_id: &str,
    ) -> impl Future<Output = Result<StopSimulationResponse, PortalError>> + Send;

    fn job_progress(
        &self,
        job_id: &JobId,
    ) -> impl Future<Output = Result<JobProgress, PortalError>> + Send;

    fn file_list(
        &self,
        job_id: &JobId,
    ) -> impl Future<Output = Result<Vec<JobFile>, PortalError>> + Send;

    /// Stores `data` as `name` in the job's input directory.
    fn upload_file(
        &self,
        job_id: &JobId,
        name: &str,
        data: Bytes,
    ) -> impl Future<Output = Result<(), PortalError>> + Send;

    fn download_file(
        &self,
        file: &JobFile,
    ) -> impl Future<Output = Result<Bytes, PortalError>> + Send;

    fn blob_list(
        &self,
        object_id: &str,
    ) -> impl Future<Output = Result<Vec<Blob>, PortalError>> + Send;

    /// Uploads a blob owned by the job and returns its id.
    fn upload_blob(
        &self,
        job_id: &JobId,
        blob_type: BlobType,
        name: &str,
        data: Bytes,
    ) -> impl Future<Output = Result<String, PortalError>> + Send;

    fn tag(&self, tag: &Tag) -> impl Future<Output = Result<(), PortalError>> + Send;

    fn untag(&self, tag: &Tag) -> impl Future<Output = Result<(), PortalError>> + Send;

    fn tag_list(&self, item_id: &str) -> impl Future<Output = Result<Vec<Tag>, PortalError>> + Send;
}

/// Something that can be turned into a solver input file.
pub trait SimulationDescription: Send + Sync {
    /// Solver input bytes, uploaded verbatim as the job's main file.
    fn serialize(&self) -> Result<Bytes, DescriptionError>;

    /// Extension of the main file without the dot, e.g. `json`.
    fn input_extension(&self) -> &str;

    fn operation(&self) -> Operation;

    /// Base for generated job names.
    fn name(&self) -> String {
        "simulation".to_string()
    }

    /// Geometry, material and other files the input refers to.
    fn auxiliary_files(&self) -> Vec<PathBuf> {
        Vec::new()
    }

    /// Outputs of earlier jobs this simulation reads.
    fn linked_files(&self) -> Vec<LinkedFile> {
        Vec::new()
    }
}
