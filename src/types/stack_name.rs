// ABOUTME: Validated stack name for deployable units.
// ABOUTME: Stack names feed resource-name prefixes, so the character set is strict.

use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StackNameError {
    #[error("stack name cannot be empty")]
    Empty,

    #[error("stack name exceeds maximum length of 63 characters")]
    TooLong,

    #[error("stack name cannot start with a hyphen")]
    StartsWithHyphen,

    #[error("stack name cannot end with a hyphen")]
    EndsWithHyphen,

    #[error("stack name must be lowercase")]
    NotLowercase,

    #[error("invalid character in stack name: '{0}'")]
    InvalidChar(char),
}

/// Name of one deployable unit (one manifest entry).
///
/// The stack name is embedded in every generated resource name, so it is
/// restricted to lowercase alphanumerics and interior hyphens.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StackName(String);

impl StackName {
    pub fn new(value: &str) -> Result<Self, StackNameError> {
        if value.is_empty() {
            return Err(StackNameError::Empty);
        }

        if value.len() > 63 {
            return Err(StackNameError::TooLong);
        }

        if value.starts_with('-') {
            return Err(StackNameError::StartsWithHyphen);
        }

        if value.ends_with('-') {
            return Err(StackNameError::EndsWithHyphen);
        }

        for c in value.chars() {
            if c.is_ascii_uppercase() {
                return Err(StackNameError::NotLowercase);
            }
            if !c.is_ascii_lowercase() && !c.is_ascii_digit() && c != '-' {
                return Err(StackNameError::InvalidChar(c));
            }
        }

        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StackName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_lowercase_with_hyphens() {
        assert!(StackName::new("hello-world2").is_ok());
    }

    #[test]
    fn rejects_uppercase() {
        assert!(matches!(
            StackName::new("Hello"),
            Err(StackNameError::NotLowercase)
        ));
    }

    #[test]
    fn rejects_leading_and_trailing_hyphen() {
        assert!(matches!(
            StackName::new("-app"),
            Err(StackNameError::StartsWithHyphen)
        ));
        assert!(matches!(
            StackName::new("app-"),
            Err(StackNameError::EndsWithHyphen)
        ));
    }

    #[test]
    fn rejects_underscore() {
        // Underscore separates the environment from the region in the
        // resource prefix, so it cannot appear inside the stack name.
        assert!(matches!(
            StackName::new("my_app"),
            Err(StackNameError::InvalidChar('_'))
        ));
    }
}
