//! # OnScale
//![![License](https://img.shields.io/badge/license-MIT%2FApache-blue.svg)](https://github.com/onscale/onscale_client#license)
//!
//! An async client for the OnScale cloud simulation platform: log in with a stored profile,
//! pick an account and HPC, upload a simulation, estimate and submit it, then follow the job
//! until it ends and download its results.
//!
//! This crate serves as an entry point, re-exporting the core types and optionally the
//! session layer, the HTTP client and the in-memory portal via feature flags.
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | **`sdk`** | Profiles, sessions, payloads, submission and job handles (`onscale_session`). Enabled by default. |
//! | **`client`** | The HTTP + websocket portal client (`onscale_client`). |
//! | **`mock`** | An in-memory portal for tests and demos (`onscale_mock`). |
//!
//! ## Example
//!
//! ```toml
//! [dependencies]
//! onscale = { version = "0.3", features = ["client"] }
//! ```
//!
//! ```rust,no_run
//! use onscale::prelude::*;
//!
//! # #[cfg(all(feature = "sdk", feature = "client"))]
//! # async fn run() -> Result<()> {
//! let session = onscale::connect(Some(PortalTarget::Prod), None).await?;
//!
//! let mut job = session
//!     .submit(
//!         PayloadBuilder::from_input_file("beam.flxinp").with_file("beam.step"),
//!         SubmitOptions::default().with_max_spend(5.0),
//!     )
//!     .await?;
//!
//! job.wait_for_terminal(&PollPolicy::default(), &CancellationToken::new())
//!     .await?;
//! job.download_results("results", &ResultFilter::All).await?;
//! # Ok(())
//! # }
//! ```

pub use onscale_core::*;

#[cfg(feature = "sdk")]
pub mod session {
    pub use onscale_session::*;
}

#[cfg(feature = "client")]
pub mod client {
    pub use onscale_client::*;
}

#[cfg(feature = "mock")]
pub mod mock {
    pub use onscale_mock::*;
}

/// Resolves a stored profile and logs in to its portal over HTTP.
///
/// See [`ProfileStore::resolve`](onscale_session::ProfileStore::resolve) for how the
/// profile is picked.
#[cfg(all(feature = "sdk", feature = "client"))]
pub async fn connect(
    portal: Option<onscale_core::portal::PortalTarget>,
    alias: Option<&str>,
) -> onscale_session::Result<onscale_session::Session<onscale_client::PortalClient>> {
    let store = tokio::task::spawn_blocking(onscale_session::ProfileStore::open_default)
        .await
        .map_err(|e| onscale_core::error::ConfigError::Io(std::io::Error::other(e)))??;
    let (alias, profile) = store.resolve(portal, alias)?;
    tracing::debug!(alias, portal = %profile.portal, "resolved profile");

    let config = onscale_client::PortalClientConfig::for_portal(profile.portal);
    let api = onscale_client::PortalClient::new(config, profile.token.clone());
    onscale_session::Session::login(api, &alias, profile).await
}

pub mod prelude {
    pub use onscale_core::prelude::*;

    #[cfg(feature = "sdk")]
    pub use onscale_session::prelude::*;

    #[cfg(feature = "client")]
    pub use onscale_client::{PortalClient, PortalClientConfig};

    #[cfg(feature = "mock")]
    pub use onscale_mock::InMemoryPortal;
}
