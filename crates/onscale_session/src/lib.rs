//! # OnScale Session
//!
//! The user-facing side of the OnScale client, generic over any [`PortalApi`].
//!
//! - **[`ProfileStore`]**: stored credentials and the rules for picking a profile.
//! - **[`Session`]**: an authenticated user, the accounts they can see and the HPCs behind them.
//! - **[`PayloadBuilder`]**: turns a [`SimulationDescription`] or an input file into an upload bundle.
//! - **[`SubmissionWorkflow`]**: create, upload, estimate and submit, one observable step at a time.
//! - **[`JobHandle`]**: status, files, tags and waiting for one remote job.
//! - **[`ProgressTracker`]**: per-simulation progress, with terminal bars in [`ProgressBars`].
//!
//! ## Example
//!
//! ```rust
//! use onscale_mock::InMemoryPortal;
//! use onscale_session::prelude::*;
//!
//! # async fn run() -> std::result::Result<(), OnscaleError> {
//! let portal = InMemoryPortal::default().with_account("a-1", "Acme");
//! let session = Session::establish(portal, None).await?;
//! assert_eq!(session.current_account().account_name, "Acme");
//! # Ok(())
//! # }
//! ```
//!
//! [`PortalApi`]: onscale_core::traits::PortalApi
//! [`SimulationDescription`]: onscale_core::traits::SimulationDescription

pub mod accounts;
pub mod error;
mod fs;
pub mod job;
pub mod ledger;
pub mod payload;
pub mod poll;
pub mod profile;
pub mod progress;
pub mod session;
pub mod submit;

pub use accounts::{AccountDirectory, HpcSelector};
pub use error::{OnscaleError, Result};
pub use job::{DownloadReport, JobHandle, ResultFilter, StopOutcome};
pub use ledger::SubmissionLedger;
pub use payload::{JsonDescription, PayloadBuilder, PreparedPayload, UploadBundle};
pub use poll::PollPolicy;
pub use profile::{Profile, ProfileStore};
pub use progress::{ProgressBars, ProgressTracker};
pub use session::Session;
pub use submit::{SubmissionState, SubmissionWorkflow, SubmitOptions};

pub use tokio_util::sync::CancellationToken;

pub mod prelude {
    pub use super::accounts::*;
    pub use super::error::*;
    pub use super::job::*;
    pub use super::ledger::*;
    pub use super::payload::*;
    pub use super::poll::*;
    pub use super::profile::*;
    pub use super::progress::*;
    pub use super::session::*;
    pub use super::submit::*;
    pub use onscale_core::prelude::*;
    pub use tokio_util::sync::CancellationToken;
}
