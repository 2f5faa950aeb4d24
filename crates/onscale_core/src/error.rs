use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AuthError {
    /// The token was rejected.
    /// Returned for **HTTP 401** responses.
    #[error("Unauthorized: Credentials invalid")]
    Invalid,

    /// The token was valid but has expired.
    /// Returned for **HTTP 401** responses that say so.
    #[error("Unauthorized: Credentials expired")]
    Expired,

    /// No token was available.
    #[error("Unauthorized: Credentials missing")]
    Missing,

    /// The token is valid but lacks permission for the request.
    /// Returned for **HTTP 403** responses.
    #[error("Insufficient permissions: {0}")]
    Forbidden(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    /// No stored profile targets the requested portal.
    #[error("No profile configured for portal '{portal}'")]
    NoMatchingProfile { portal: String },

    /// Several profiles target the portal and none was chosen.
    #[error("Several profiles match portal '{portal}': {}", candidates.join(", "))]
    AmbiguousProfile {
        portal: String,
        candidates: Vec<String>,
    },

    /// The requested alias doesn't exist in the profile store.
    #[error("Unknown profile '{0}'")]
    UnknownProfile(String),

    /// The requested alias exists but targets another portal.
    #[error("Profile '{alias}' targets portal '{actual}', not '{requested}'")]
    PortalMismatch {
        alias: String,
        requested: String,
        actual: String,
    },

    #[error("Unknown portal '{0}'")]
    UnknownPortal(String),

    /// The stored token is not a developer or supervisor token.
    #[error("Invalid developer token for profile '{0}'")]
    InvalidToken(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum PortalError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// The platform has no such job, file or account.
    /// Returned for **HTTP 404** responses.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// The platform rejected the request payload.
    /// Returned for other **HTTP 4xx** responses.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Opaque platform-side failure, with whatever detail the API provided.
    /// Returned for **HTTP 5xx** responses and websocket `error` messages.
    #[error("Platform returned error {status}: {message}")]
    Remote { status: u16, message: String },

    /// The request never produced a response (DNS, TLS, connection reset, ...).
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The portal implementation does not support this call.
    #[error("Feature not supported: {0}")]
    Unsupported(String),
}

impl PortalError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, PortalError::NotFound(_))
    }
}

/// A simulation description could not be turned into solver input.
#[derive(Error, Debug)]
#[error("Could not serialize simulation: {0}")]
pub struct DescriptionError(pub String);

impl From<serde_json::Error> for DescriptionError {
    fn from(value: serde_json::Error) -> Self {
        DescriptionError(value.to_string())
    }
}
