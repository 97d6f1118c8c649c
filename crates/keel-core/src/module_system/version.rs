use std::fmt;

use semver::Version;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for version handling
#[derive(Debug, Clone, Error)]
pub enum VersionError {
    #[error("Invalid version '{input}': {message}")]
    ParseError { input: String, message: String },

    #[error("Inverted version bounds: minimum {min} is greater than maximum {max}")]
    InvertedBounds { min: Version, max: Version },
}

/// Parse a semantic version string, mapping failures to [`VersionError`].
pub fn parse_version(input: &str) -> Result<Version, VersionError> {
    Version::parse(input).map_err(|e| VersionError::ParseError {
        input: input.to_string(),
        message: e.to_string(),
    })
}

/// An inclusive version interval `[min, max]`.
///
/// Both ends are inclusive; an absent maximum means "any version at or above
/// the minimum". Pre-release versions order below their base release per
/// semver, so `1.0.0-rc.1` satisfies a constraint with `max = 1.0.0` but a
/// constraint with `min = 1.0.0` rejects it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionConstraint {
    min: Version,
    max: Option<Version>,
}

impl VersionConstraint {
    /// Create a constraint, rejecting inverted bounds.
    pub fn new(min: Version, max: Option<Version>) -> Result<Self, VersionError> {
        if let Some(ref max_v) = max {
            if &min > max_v {
                return Err(VersionError::InvertedBounds {
                    min,
                    max: max_v.clone(),
                });
            }
        }
        Ok(Self { min, max })
    }

    /// A constraint satisfied by any version at or above `min`.
    pub fn at_least(min: Version) -> Self {
        Self { min, max: None }
    }

    pub fn min(&self) -> &Version {
        &self.min
    }

    pub fn max(&self) -> Option<&Version> {
        self.max.as_ref()
    }

    /// Whether `version` falls within the interval (inclusive on both ends).
    pub fn contains(&self, version: &Version) -> bool {
        if version < &self.min {
            return false;
        }
        match &self.max {
            Some(max) => version <= max,
            None => true,
        }
    }
}

impl fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.max {
            Some(max) => write!(f, ">={}, <={}", self.min, max),
            None => write!(f, ">={}", self.min),
        }
    }
}
