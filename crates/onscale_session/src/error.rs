use onscale_core::prelude::*;
use thiserror::Error;

/// Everything a session operation can fail with.
#[derive(Error, Debug)]
pub enum OnscaleError {
    /// Credentials were invalid, expired or insufficient.
    #[error(transparent)]
    Authentication(#[from] AuthError),

    /// No usable profile, or the profile store could not be read.
    #[error(transparent)]
    Configuration(#[from] ConfigError),

    /// The payload or the arguments can't be submitted as given.
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Two selectors were given where exactly one is allowed.
    #[error("Parameter conflict: {0}")]
    ParameterConflict(String),

    /// Neither of the accepted selectors was given.
    #[error("Missing parameter: {0}")]
    MissingParameter(String),

    /// The account name is not unique, select by id instead.
    #[error("Account name '{name}' is shared by accounts {}", ids.join(", "))]
    AmbiguousAccountName { name: String, ids: Vec<String> },

    #[error("Upload of '{file}' failed: {source}")]
    Upload {
        file: String,
        #[source]
        source: PortalError,
    },

    #[error("Download of '{file}' failed: {source}")]
    Download {
        file: String,
        #[source]
        source: PortalError,
    },

    /// No estimate fits the budget. The job record exists and can be fetched by id.
    #[error("Job {job_id} would cost {estimate:.3} core hours, over the max spend of {max_spend}")]
    BudgetExceeded {
        job_id: JobId,
        /// Cheapest candidate, infinite when the estimator returned none.
        estimate: f64,
        max_spend: f64,
    },

    #[error("Estimate failed for job {job_id}: {source}")]
    EstimateFailed {
        job_id: JobId,
        #[source]
        source: PortalError,
    },

    /// Opaque platform-side failure.
    #[error("Platform error: {0}")]
    Remote(#[source] PortalError),

    #[error("Job {job_id} still {last_status} when the wait timed out")]
    Timeout { job_id: JobId, last_status: JobStatus },

    #[error("Cancelled")]
    Cancelled,

    #[error("Submission ledger error: {0}")]
    Ledger(String),
}

impl From<PortalError> for OnscaleError {
    fn from(value: PortalError) -> Self {
        match value {
            PortalError::Auth(e) => OnscaleError::Authentication(e),
            PortalError::NotFound(what) => OnscaleError::NotFound(what),
            other => OnscaleError::Remote(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, OnscaleError>;
