//! Plugin and project versions
//!
//! Version Format:
//! - Plugin versions: `v{number}` or `v{number}-{stage}` (e.g., `v3`, `v2-alpha`)
//! - Project versions: `{number}` or `{number}-{stage}` (e.g., `3`, `3-alpha`)
//!
//! Both order by number first, then by stage (`alpha < beta < stable`).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum VersionError {
    #[error("Version is empty")]
    Empty,

    #[error("Invalid plugin version '{0}': expected 'v{{number}}' or 'v{{number}}-{{stage}}'")]
    MissingPrefix(String),

    #[error("Invalid version number in '{0}'")]
    InvalidNumber(String),

    #[error("Unknown stage '{0}': expected 'alpha' or 'beta'")]
    UnknownStage(String),

    #[error("Stable version 0 is not allowed, use an alpha or beta stage")]
    StableZero,
}

/// Release stage of a version
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    Alpha,
    Beta,
    #[default]
    Stable,
}

impl Stage {
    /// Returns the suffix used in version strings (empty for stable)
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Alpha => "alpha",
            Stage::Beta => "beta",
            Stage::Stable => "",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "alpha" => Ok(Stage::Alpha),
            "beta" => Ok(Stage::Beta),
            "" => Ok(Stage::Stable),
            other => Err(VersionError::UnknownStage(other.to_string())),
        }
    }
}

/// Splits `{number}[-{stage}]` into its parts
fn parse_parts(raw: &str, body: &str) -> Result<(u32, Stage), VersionError> {
    let (number, stage) = match body.split_once('-') {
        Some((number, stage)) => (number, Some(stage)),
        None => (body, None),
    };

    if number.is_empty() || !number.chars().all(|c| c.is_ascii_digit()) {
        return Err(VersionError::InvalidNumber(raw.to_string()));
    }

    let number = number
        .parse()
        .map_err(|_| VersionError::InvalidNumber(raw.to_string()))?;

    let stage = match stage {
        // "3-" is not a stable version
        Some("") => return Err(VersionError::UnknownStage(String::new())),
        Some(stage) => stage.parse()?,
        None => Stage::Stable,
    };

    Ok((number, stage))
}

fn write_parts(f: &mut fmt::Formatter<'_>, number: u32, stage: Stage) -> fmt::Result {
    match stage {
        Stage::Stable => write!(f, "{}", number),
        stage => write!(f, "{}-{}", number, stage),
    }
}

/// Version of a plugin, e.g. `v3` or `v2-alpha`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    pub number: u32,
    pub stage: Stage,
}

impl Version {
    /// Creates a stable version
    pub const fn stable(number: u32) -> Self {
        Self {
            number,
            stage: Stage::Stable,
        }
    }

    pub const fn new(number: u32, stage: Stage) -> Self {
        Self { number, stage }
    }

    /// Checks that the version can be released
    pub fn validate(&self) -> Result<(), VersionError> {
        if self.number == 0 && self.stage == Stage::Stable {
            return Err(VersionError::StableZero);
        }
        Ok(())
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("v")?;
        write_parts(f, self.number, self.stage)
    }
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(VersionError::Empty);
        }

        let body = s
            .strip_prefix('v')
            .ok_or_else(|| VersionError::MissingPrefix(s.to_string()))?;

        let (number, stage) = parse_parts(s, body)?;
        let version = Self { number, stage };
        version.validate()?;

        Ok(version)
    }
}

/// Version of the on-disk project descriptor schema, e.g. `3` or `3-alpha`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProjectVersion {
    pub number: u32,
    pub stage: Stage,
}

impl ProjectVersion {
    pub const fn stable(number: u32) -> Self {
        Self {
            number,
            stage: Stage::Stable,
        }
    }

    pub const fn new(number: u32, stage: Stage) -> Self {
        Self { number, stage }
    }
}

impl fmt::Display for ProjectVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_parts(f, self.number, self.stage)
    }
}

impl FromStr for ProjectVersion {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(VersionError::Empty);
        }

        let (number, stage) = parse_parts(s, s)?;
        if number == 0 && stage == Stage::Stable {
            return Err(VersionError::StableZero);
        }

        Ok(Self { number, stage })
    }
}

impl TryFrom<String> for ProjectVersion {
    type Error = VersionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ProjectVersion> for String {
    fn from(version: ProjectVersion) -> Self {
        version.to_string()
    }
}

/// Renders a list of project versions as `[3, 4-alpha]`
pub fn display_versions(versions: &[ProjectVersion]) -> String {
    let parts: Vec<String> = versions.iter().map(|v| v.to_string()).collect();
    format!("[{}]", parts.join(", "))
}
