use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

/// A deployment of the OnScale platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PortalTarget {
    Test,
    Dev,
    #[default]
    Prod,
}

impl PortalTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            PortalTarget::Test => "test",
            PortalTarget::Dev => "dev",
            PortalTarget::Prod => "prod",
        }
    }

    /// Base url of the REST API, e.g. `https://prod.portal.onscale.com/api`.
    pub fn api_url(&self) -> String {
        format!("https://{}.portal.onscale.com/api", self.as_str())
    }

    /// Base url of the websocket endpoints, e.g. `wss://prod.portal.onscale.com`.
    pub fn socket_url(&self) -> String {
        format!("wss://{}.portal.onscale.com", self.as_str())
    }
}

impl fmt::Display for PortalTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PortalTarget {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "test" => Ok(PortalTarget::Test),
            "dev" | "development" => Ok(PortalTarget::Dev),
            "prod" | "production" => Ok(PortalTarget::Prod),
            _ => Err(ConfigError::UnknownPortal(s.to_string())),
        }
    }
}
