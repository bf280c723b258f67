// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Name the engine advertises to drivers alongside the application's own.
pub const ENGINE_NAME: &str = "Lumen";
pub const ENGINE_VERSION: Version = Version::new(0, 1, 0);

pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .try_init();
}

/// Three-part `major.minor.patch` version.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(try_from = "String")]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl Version {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl Default for Version {
    fn default() -> Self {
        Self::new(1, 0, 0)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum VersionParseError {
    #[error("expected `major.minor.patch`, got {0:?}")]
    Shape(String),
    #[error("invalid version component {0:?}")]
    Component(String),
}

impl FromStr for Version {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split('.').collect();
        let [major, minor, patch] = parts.as_slice() else {
            return Err(VersionParseError::Shape(s.to_owned()));
        };
        let num = |p: &str| {
            p.parse::<u32>()
                .map_err(|_| VersionParseError::Component(p.to_owned()))
        };
        Ok(Self::new(num(major)?, num(minor)?, num(patch)?))
    }
}

impl TryFrom<String> for Version {
    type Error = VersionParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_three_part_version() {
        assert_eq!("1.2.3".parse::<Version>(), Ok(Version::new(1, 2, 3)));
        assert_eq!(" 0.10.0 ".parse::<Version>(), Ok(Version::new(0, 10, 0)));
    }

    #[test]
    fn rejects_malformed_versions() {
        assert_eq!(
            "1.2".parse::<Version>(),
            Err(VersionParseError::Shape("1.2".into()))
        );
        assert_eq!(
            "1.x.3".parse::<Version>(),
            Err(VersionParseError::Component("x".into()))
        );
        assert!("1.2.3.4".parse::<Version>().is_err());
    }

    #[test]
    fn displays_dotted() {
        assert_eq!(ENGINE_VERSION.to_string(), "0.1.0");
    }
}
