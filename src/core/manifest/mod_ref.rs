use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::error::{ModpackError, ModpackResult};

/// Registry release channel, ordered by stability.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReleaseType {
    #[default]
    Release,
    Beta,
    Alpha,
}

impl ReleaseType {
    pub const ALL: [ReleaseType; 3] = [ReleaseType::Release, ReleaseType::Beta, ReleaseType::Alpha];

    /// Higher is more stable: release > beta > alpha.
    pub fn stability(self) -> u8 {
        match self {
            ReleaseType::Release => 2,
            ReleaseType::Beta => 1,
            ReleaseType::Alpha => 0,
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "release" => Some(ReleaseType::Release),
            "beta" => Some(ReleaseType::Beta),
            "alpha" => Some(ReleaseType::Alpha),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ReleaseType::Release => "release",
            ReleaseType::Beta => "beta",
            ReleaseType::Alpha => "alpha",
        }
    }
}

impl fmt::Display for ReleaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a mod reference asks the resolver for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VersionPreference {
    /// Newest compatible file, preferring this channel or anything more stable.
    ReleaseType(ReleaseType),
    /// Exactly this registry file.
    FileId(u64),
}

impl VersionPreference {
    fn from_token(token: &str) -> Option<Self> {
        if let Some(release_type) = ReleaseType::from_token(token) {
            return Some(VersionPreference::ReleaseType(release_type));
        }
        token.parse::<u64>().ok().map(VersionPreference::FileId)
    }
}

impl fmt::Display for VersionPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionPreference::ReleaseType(release_type) => write!(f, "{}", release_type),
            VersionPreference::FileId(id) => write!(f, "{}", id),
        }
    }
}

/// A registry mod as written in the manifest: `identifier[:version]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RegistryModRef {
    pub identifier: String,
    pub version: Option<VersionPreference>,
}

impl RegistryModRef {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            version: None,
        }
    }

    pub fn pinned(identifier: impl Into<String>, version: VersionPreference) -> Self {
        Self {
            identifier: identifier.into(),
            version: Some(version),
        }
    }
}

impl FromStr for RegistryModRef {
    type Err = ModpackError;

    /// Splits on the last `:`. An empty version segment means "no pin".
    fn from_str(raw: &str) -> ModpackResult<Self> {
        let raw = raw.trim();
        let invalid = |reason: &str| ModpackError::InvalidModReference {
            reference: raw.to_string(),
            reason: reason.to_string(),
        };

        let (identifier, version) = match raw.rsplit_once(':') {
            Some((identifier, version)) => (identifier.trim(), Some(version.trim())),
            None => (raw, None),
        };

        if identifier.is_empty() {
            return Err(invalid("empty identifier"));
        }
        if identifier.contains(':') {
            return Err(invalid("identifier must not contain ':'"));
        }

        let version = match version.filter(|v| !v.is_empty()) {
            None => None,
            Some(token) => Some(VersionPreference::from_token(token).ok_or_else(|| {
                invalid("version must be release, beta, alpha or a numeric file id")
            })?),
        };

        Ok(Self {
            identifier: identifier.to_string(),
            version,
        })
    }
}

impl fmt::Display for RegistryModRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(version) => write!(f, "{}:{}", self.identifier, version),
            None => f.write_str(&self.identifier),
        }
    }
}
