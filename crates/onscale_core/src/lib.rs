//! # OnScale Core
//!
//! Types and traits shared by the OnScale client crates.
//!
//! Defines the wire protocol spoken with an OnScale portal.
//!
//! - **[`PortalApi`](traits::PortalApi)**: One authenticated connection to a portal. Implemented over HTTP by `onscale_client` and in memory by `onscale_mock`.
//! - **[`SimulationDescription`](traits::SimulationDescription)**: Anything that serializes into solver input.
//! - **[`EstimateResults`](estimate::EstimateResults)**: Candidate configurations returned by the estimator, with the selection policies used before submission.

pub mod account;
pub mod constants;
pub mod error;
pub mod estimate;
pub mod job;
pub mod portal;
pub mod traits;

pub mod prelude {
    pub use super::account::*;
    pub use super::error::*;
    pub use super::estimate::*;
    pub use super::job::*;
    pub use super::portal::*;
    pub use super::traits::*;
}
