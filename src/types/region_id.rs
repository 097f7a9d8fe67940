// ABOUTME: Validated cloud region identifier.
// ABOUTME: Provides the hyphen-collapsed form used in resource-name prefixes.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegionIdError {
    #[error("region identifier cannot be empty")]
    Empty,

    #[error("invalid character in region identifier: '{0}'")]
    InvalidChar(char),
}

/// A cloud region identifier such as `us-east-1` or `ap-northeast-2`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RegionId(String);

impl RegionId {
    pub fn new(value: &str) -> Result<Self, RegionIdError> {
        if value.is_empty() {
            return Err(RegionIdError::Empty);
        }

        for c in value.chars() {
            if !c.is_ascii_lowercase() && !c.is_ascii_digit() && c != '-' {
                return Err(RegionIdError::InvalidChar(c));
            }
        }

        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The region with hyphens collapsed, as embedded in resource-name
    /// prefixes: `ap-northeast-2` becomes `apnortheast2`.
    pub fn compact(&self) -> String {
        self.0.replace('-', "")
    }
}

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<'de> Deserialize<'de> for RegionId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        RegionId::new(&value).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compact_collapses_hyphens() {
        let region = RegionId::new("ap-northeast-2").unwrap();
        assert_eq!(region.compact(), "apnortheast2");
    }

    #[test]
    fn rejects_uppercase() {
        assert!(RegionId::new("US-EAST-1").is_err());
    }
}
