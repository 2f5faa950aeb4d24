use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

/// Server-assigned identity of a job. Never changes once issued.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for JobId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for JobId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for JobId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Remote status of a job.
///
/// Unrecognised values are kept in [`JobStatus::Unknown`] instead of failing to parse.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum JobStatus {
    Created,
    Queued,
    Running,
    Paused,
    Finished,
    Failed,
    Stopped,
    Cancelled,
    Unknown(String),
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Finished | JobStatus::Failed | JobStatus::Stopped | JobStatus::Cancelled
        )
    }

    pub fn as_str(&self) -> &str {
        match self {
            JobStatus::Created => "CREATED",
            JobStatus::Queued => "QUEUED",
            JobStatus::Running => "RUNNING",
            JobStatus::Paused => "PAUSED",
            JobStatus::Finished => "FINISHED",
            JobStatus::Failed => "FAILED",
            JobStatus::Stopped => "STOPPED",
            JobStatus::Cancelled => "CANCELLED",
            JobStatus::Unknown(s) => s,
        }
    }
}

impl From<String> for JobStatus {
    fn from(value: String) -> Self {
        match value.to_ascii_uppercase().as_str() {
            "CREATED" => JobStatus::Created,
            "QUEUED" | "PENDING" => JobStatus::Queued,
            "RUNNING" => JobStatus::Running,
            "PAUSED" => JobStatus::Paused,
            "FINISHED" | "COMPLETE" | "COMPLETED" => JobStatus::Finished,
            "FAILED" | "ERROR" => JobStatus::Failed,
            "STOPPED" => JobStatus::Stopped,
            "CANCELLED" | "CANCELED" => JobStatus::Cancelled,
            _ => JobStatus::Unknown(value),
        }
    }
}

impl From<JobStatus> for String {
    fn from(value: JobStatus) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The kind of run the platform performs for a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Operation {
    Simulation,
    Build,
    Review,
    Mpi,
    Mnmpi,
    #[serde(rename = "EMSIMULATION")]
    EmSimulation,
    #[serde(rename = "EMMPI")]
    EmMpi,
    #[serde(rename = "EMMNMPI")]
    EmMnmpi,
    ReflexMpi,
    ReflexMnmpi,
    MoebiusMpi,
    MoebiusMnmpi,
    OpenfoamMpi,
    OpenfoamMnmpi,
    SparselizardMpi,
    SparselizardMnmpi,
}

impl Operation {
    /// Default operation for a solver input file, judged by its extension.
    pub fn from_input_file(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "json" => Some(Operation::ReflexMpi),
            "flxinp" => Some(Operation::Simulation),
            "bldinp" => Some(Operation::Build),
            "revinp" => Some(Operation::Review),
            _ => None,
        }
    }

    /// The multi-node variant of this operation. Operations without one map to themselves.
    pub fn to_mnmpi(self) -> Self {
        match self {
            Operation::ReflexMpi => Operation::ReflexMnmpi,
            Operation::SparselizardMpi => Operation::SparselizardMnmpi,
            Operation::Simulation | Operation::Mpi => Operation::Mnmpi,
            Operation::EmSimulation | Operation::EmMpi => Operation::EmMnmpi,
            Operation::MoebiusMpi => Operation::MoebiusMnmpi,
            Operation::OpenfoamMpi => Operation::OpenfoamMnmpi,
            other => other,
        }
    }

    /// Solver family used by the estimator.
    pub fn solver(self) -> &'static str {
        match self {
            Operation::ReflexMpi | Operation::ReflexMnmpi => "REFLEX",
            Operation::MoebiusMpi | Operation::MoebiusMnmpi => "MOEBIUS",
            Operation::OpenfoamMpi | Operation::OpenfoamMnmpi => "OPENFOAM",
            _ => "FLEX",
        }
    }

    /// Extension of the main input file the platform expects for this operation.
    pub fn input_extension(self) -> &'static str {
        match self {
            Operation::ReflexMpi | Operation::ReflexMnmpi => "json",
            Operation::Build => "bldinp",
            Operation::Review => "revinp",
            _ => "flxinp",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Precision {
    #[default]
    Single,
    Double,
}

/// Snapshot of a job as returned by `POST /job/load`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct JobRecord {
    pub job_id: String,
    pub job_name: Option<String>,
    pub account_id: Option<String>,
    pub hpc_id: Option<String>,
    /// Milliseconds since the unix epoch.
    pub created_date: Option<i64>,
    pub last_status: Option<JobStatus>,
    pub operation: Option<Operation>,
    pub precision: Option<Precision>,
    pub cores_required: Option<u32>,
    pub ram_estimate: Option<u64>,
    pub core_hour_estimate: Option<f64>,
    pub number_of_parts: Option<u32>,
    pub main_file: Option<String>,
    pub docker_tag_id: Option<String>,
    pub job_type: Option<String>,
    pub simulation_count: Option<u32>,
    pub job_cost: Option<f64>,
    #[serde(default)]
    pub tags: Vec<Tag>,
}

impl JobRecord {
    pub fn id(&self) -> JobId {
        JobId::new(self.job_id.clone())
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_date
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
    }

    pub fn status(&self) -> JobStatus {
        self.last_status.clone().unwrap_or(JobStatus::Created)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JobInitRequest {
    pub account_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hpc_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobInitResponse {
    pub job_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobLoadRequest {
    pub job_id: String,
    pub exclude_simulation: bool,
    pub exclude_job_status: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobListRequest {
    pub account_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_num: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRequest {
    pub job_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRenameRequest {
    pub job_id: String,
    pub job_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationStopRequest {
    pub job_id: String,
    pub simulation_id: String,
}

/// Everything the platform needs to start executing an estimated job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct JobSubmitRequest {
    pub job_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_name: Option<String>,
    pub account_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hpc_id: Option<String>,
    pub job_type: String,
    pub main_file: String,
    pub operation: Option<Operation>,
    pub precision: Precision,
    pub docker_tag: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docker_tag_id: Option<String>,
    pub application: String,
    pub ram_estimate: u64,
    pub cores_required: u32,
    pub core_hour_estimate: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number_of_parts: Option<u32>,
    pub simulation_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supervisor_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub file_dependencies: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub file_aliases: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub file_dependent_job_id_list: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StopSimulationResponse {
    pub simulation_id: Option<String>,
    pub status: String,
}

impl StopSimulationResponse {
    pub fn stopped(&self) -> bool {
        self.status.eq_ignore_ascii_case("STOPPED")
    }
}

/// Progress of every simulation in a job, from `POST /job/progress`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct JobProgress {
    pub job_id: Option<String>,
    #[serde(default, alias = "simulations")]
    pub simulation_progress_list: Vec<SimulationProgress>,
}

/// `progress` values sent in place of a percentage.
pub const PROGRESS_CANCELLED: i32 = -1;
pub const PROGRESS_FAILED: i32 = -2;
pub const PROGRESS_DELAYED: i32 = -3;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SimulationProgress {
    pub simulation_id: String,
    pub simulation_index: Option<u32>,
    #[serde(default)]
    pub status: String,
    /// A percentage, or one of the negative `PROGRESS_*` markers.
    #[serde(default)]
    pub progress: i32,
}

impl SimulationProgress {
    /// The status implied by a negative marker, if `progress` is one.
    pub fn marker_status(&self) -> Option<JobStatus> {
        match self.progress {
            PROGRESS_CANCELLED => Some(JobStatus::Cancelled),
            PROGRESS_FAILED => Some(JobStatus::Failed),
            PROGRESS_DELAYED => Some(JobStatus::Unknown("DELAYED".to_string())),
            _ => None,
        }
    }
}

/// A presigned request for moving a file in or out of platform storage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct HttpRequest {
    #[serde(default = "default_method")]
    pub method: String,
    pub uri: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub form_fields: BTreeMap<String, String>,
}

fn default_method() -> String {
    "GET".to_string()
}

/// A file stored against a job. Files with a simulation id are results.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct JobFile {
    pub job_id: Option<String>,
    pub file_name: String,
    pub file_size: Option<u64>,
    pub simulation_id: Option<String>,
    pub download_request: Option<HttpRequest>,
}

impl JobFile {
    pub fn is_result(&self) -> bool {
        self.simulation_id.is_some()
    }

    /// The extension of the file name including the leading dot, if any.
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{e}"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BlobType {
    Cad,
    Simapi,
    Simmetadata,
    Material,
    Csv,
    Modeldb,
    Bincad,
    Brep,
    Meshauto,
    Meshcustom,
    Other,
}

impl BlobType {
    /// Blob type implied by a file name, if the platform knows the extension.
    pub fn from_file_name(name: &str) -> Option<Self> {
        let ext = Path::new(name).extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "jfp" => Some(BlobType::Modeldb),
            "step" | "stp" => Some(BlobType::Cad),
            "csv" => Some(BlobType::Csv),
            "py" => Some(BlobType::Simapi),
            "bincad" => Some(BlobType::Bincad),
            "brep" => Some(BlobType::Brep),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Blob {
    pub blob_id: String,
    pub object_id: Option<String>,
    pub blob_type: BlobType,
    pub original_file_name: Option<String>,
    pub file_size: Option<u64>,
    pub hash: Option<String>,
    pub parent_blob_id: Option<String>,
}

/// Metadata part of a `POST /blob/upload` multipart request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BlobUploadRequest {
    pub object_id: String,
    pub object_type: String,
    pub blob_type: BlobType,
    pub file_size: u64,
    pub hash: String,
    pub blob_title: String,
    pub blob_description: String,
}

/// A free-form label attached to a job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    pub item_id: String,
    pub tag: String,
    #[serde(rename = "type")]
    pub tag_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemIdRequest {
    pub item_id: String,
}

/// A file produced by an earlier job that a new job depends on.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LinkedFile {
    pub job_id: String,
    pub simulation_id: Option<String>,
    pub file_name: String,
    /// Name the file is visible under inside the new job.
    pub alias: String,
}

impl LinkedFile {
    pub fn new(
        job_id: impl Into<String>,
        file_name: impl Into<String>,
        alias: impl Into<String>,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            simulation_id: None,
            file_name: file_name.into(),
            alias: alias.into(),
        }
    }

    pub fn in_simulation(mut self, simulation_id: impl Into<String>) -> Self {
        self.simulation_id = Some(simulation_id.into());
        self
    }

    /// Dependency path sent with the submit request.
    pub fn dependency_path(&self) -> String {
        let owner = self.simulation_id.as_deref().unwrap_or(&self.job_id);
        format!("/{owner}/{}", self.file_name)
    }

    /// Full path recorded in the simulation metadata file.
    pub fn metadata_path(&self) -> String {
        match &self.simulation_id {
            Some(sim) => format!("/{}/{sim}/{}", self.job_id, self.file_name),
            None => format!("/{}/{}", self.job_id, self.file_name),
        }
    }

    pub fn alias_path(&self) -> String {
        format!("/{}", self.alias)
    }
}
