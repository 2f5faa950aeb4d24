//! Stored credential profiles and the rules for picking one.

use onscale_core::constants::defaults::PROFILE_ENV;
use onscale_core::prelude::*;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::fs::atomic_write_blocking;

const UUID: &str = "[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}";
const UUID4: &str = "[0-9a-f]{8}-[0-9a-f]{4}-4[0-9a-f]{3}-[89ab][0-9a-f]{3}-[0-9a-f]{12}";

/// Credentials for one user on one portal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Profile {
    pub portal: PortalTarget,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    pub token: String,
    /// Account to select after login, by id or name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
}

impl Profile {
    pub fn new(portal: PortalTarget, token: impl Into<String>) -> Self {
        Self {
            portal,
            user: None,
            token: token.into(),
            account: None,
        }
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn with_account(mut self, account: impl Into<String>) -> Self {
        self.account = Some(account.into());
        self
    }
}

/// `<uuid>_<13 digit timestamp>_<uuid>`.
pub fn is_dev_token(token: &str) -> bool {
    matches_pattern(&format!("^{UUID}_[0-9]{{13}}_{UUID}$"), token)
}

/// `<uuid4>_<uuid4>`.
pub fn is_supervisor_token(token: &str) -> bool {
    matches_pattern(&format!("^{UUID4}_{UUID4}$"), token)
}

fn matches_pattern(pattern: &str, token: &str) -> bool {
    Regex::new(pattern)
        .map(|re| re.is_match(token))
        .unwrap_or(false)
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ProfileFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    default: Option<String>,
    #[serde(default)]
    profiles: BTreeMap<String, Profile>,
}

/// The JSON profile file, `~/.onscale/config` unless told otherwise.
#[derive(Debug)]
pub struct ProfileStore {
    path: PathBuf,
    file: ProfileFile,
}

impl ProfileStore {
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".onscale").join("config"))
    }

    pub fn open_default() -> Result<Self, ConfigError> {
        let path = Self::default_path().ok_or_else(|| {
            ConfigError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                "no home directory for the profile store",
            ))
        })?;
        Self::load(path)
    }

    /// Reads the store at `path`. A missing file is an empty store.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let file = match std::fs::read(&path) {
            Ok(data) => serde_json::from_slice(&data)?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => ProfileFile::default(),
            Err(e) => return Err(e.into()),
        };
        debug!(path = %path.display(), "loaded profile store");
        Ok(Self { path, file })
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        let data = serde_json::to_vec_pretty(&self.file)?;
        atomic_write_blocking(&self.path, &data)?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn profiles(&self) -> &BTreeMap<String, Profile> {
        &self.file.profiles
    }

    pub fn profile(&self, alias: &str) -> Option<&Profile> {
        self.file.profiles.get(alias)
    }

    pub fn default_alias(&self) -> Option<&str> {
        self.file.default.as_deref()
    }

    /// Aliases of the profiles targeting `portal`, sorted.
    pub fn aliases_for(&self, portal: PortalTarget) -> Vec<String> {
        self.file
            .profiles
            .iter()
            .filter(|(_, p)| p.portal == portal)
            .map(|(alias, _)| alias.clone())
            .collect()
    }

    /// Adds or replaces a profile. The first profile stored becomes the default.
    pub fn upsert(&mut self, alias: &str, profile: Profile) -> Result<(), ConfigError> {
        if !is_dev_token(&profile.token) && !is_supervisor_token(&profile.token) {
            return Err(ConfigError::InvalidToken(alias.to_string()));
        }
        self.file.profiles.insert(alias.to_string(), profile);
        if self.file.default.is_none() {
            self.file.default = Some(alias.to_string());
        }
        Ok(())
    }

    /// Removes a profile. If it was the default, the first remaining alias takes over.
    pub fn remove(&mut self, alias: &str) -> Option<Profile> {
        let removed = self.file.profiles.remove(alias)?;
        if self.file.default.as_deref() == Some(alias) {
            self.file.default = self.file.profiles.keys().next().cloned();
        }
        Some(removed)
    }

    pub fn set_default(&mut self, alias: &str) -> Result<(), ConfigError> {
        if !self.file.profiles.contains_key(alias) {
            return Err(ConfigError::UnknownProfile(alias.to_string()));
        }
        self.file.default = Some(alias.to_string());
        Ok(())
    }

    /// Picks the profile to log in with.
    ///
    /// An explicit alias wins. Otherwise the profiles on `portal` are considered, and with
    /// no portal either the `ONSCALE_DEFAULT_PROFILE` variable, then the stored default,
    /// then a lone profile. Several candidates are never guessed between.
    pub fn resolve(
        &self,
        portal: Option<PortalTarget>,
        alias: Option<&str>,
    ) -> Result<(String, &Profile), ConfigError> {
        let env_default = std::env::var(PROFILE_ENV).ok();
        self.resolve_with_default(portal, alias, env_default.as_deref())
    }

    pub fn resolve_with_default(
        &self,
        portal: Option<PortalTarget>,
        alias: Option<&str>,
        env_default: Option<&str>,
    ) -> Result<(String, &Profile), ConfigError> {
        if let Some(alias) = alias {
            let profile = self
                .profile(alias)
                .ok_or_else(|| ConfigError::UnknownProfile(alias.to_string()))?;
            if let Some(requested) = portal.filter(|p| *p != profile.portal) {
                return Err(ConfigError::PortalMismatch {
                    alias: alias.to_string(),
                    requested: requested.to_string(),
                    actual: profile.portal.to_string(),
                });
            }
            return Ok((alias.to_string(), profile));
        }

        if let Some(portal) = portal {
            return self.single(self.aliases_for(portal), &portal.to_string());
        }

        let preferred = env_default
            .filter(|a| self.file.profiles.contains_key(*a))
            .or(self.default_alias());
        if let Some((alias, profile)) = preferred.and_then(|a| self.profile(a).map(|p| (a, p))) {
            return Ok((alias.to_string(), profile));
        }

        self.single(self.file.profiles.keys().cloned().collect(), "any")
    }

    fn single(
        &self,
        mut candidates: Vec<String>,
        portal: &str,
    ) -> Result<(String, &Profile), ConfigError> {
        match candidates.len() {
            0 => Err(ConfigError::NoMatchingProfile {
                portal: portal.to_string(),
            }),
            1 => {
                let alias = candidates.remove(0);
                let profile = self
                    .profile(&alias)
                    .ok_or_else(|| ConfigError::UnknownProfile(alias.clone()))?;
                Ok((alias, profile))
            }
            _ => Err(ConfigError::AmbiguousProfile {
                portal: portal.to_string(),
                candidates,
            }),
        }
    }
}
