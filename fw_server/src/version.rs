//! Firmware version parsing and ordering.
//!
//! Device and release versions are compared as integer (major, minor,
//! patch) triples, never as strings. Anything after the first `+` or `-`
//! (pre-release tags, build metadata) is ignored; absent minor/patch
//! components default to zero.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid version string: {0}")]
pub struct VersionParseError(pub String);

/// The (major, minor, patch) decomposition of a version string.
///
/// The derived `Ord` compares field by field in declaration order, which
/// is exactly the required priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct VersionTriple {
    pub major: i32,
    pub minor: i32,
    pub patch: i32,
}

impl VersionTriple {
    pub fn new(major: i32, minor: i32, patch: i32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Parse a raw version string into a triple.
    ///
    /// Accepts an optional leading `v`, drops everything after the first
    /// `+` or `-`, and rejects non-integer or negative components.
    pub fn parse(raw: &str) -> Result<Self, VersionParseError> {
        let trimmed = raw.trim();
        let body = trimmed
            .strip_prefix('v')
            .or_else(|| trimmed.strip_prefix('V'))
            .unwrap_or(trimmed);
        let body = match body.find(['+', '-']) {
            Some(at) => &body[..at],
            None => body,
        };

        let mut components = [0i32; 3];
        let mut count = 0;
        for part in body.split('.') {
            if count == 3 {
                return Err(VersionParseError(raw.to_string()));
            }
            let value: i32 = part
                .parse()
                .map_err(|_| VersionParseError(raw.to_string()))?;
            if value < 0 {
                return Err(VersionParseError(raw.to_string()));
            }
            components[count] = value;
            count += 1;
        }
        if count == 0 || body.is_empty() {
            return Err(VersionParseError(raw.to_string()));
        }

        Ok(Self {
            major: components[0],
            minor: components[1],
            patch: components[2],
        })
    }
}

impl FromStr for VersionTriple {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for VersionTriple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_prefixed_and_zero_padded_components() {
        assert_eq!(
            VersionTriple::parse("v1.02.3").unwrap(),
            VersionTriple::new(1, 2, 3)
        );
    }

    #[test]
    fn missing_components_default_to_zero() {
        assert_eq!(
            VersionTriple::parse("2.1").unwrap(),
            VersionTriple::new(2, 1, 0)
        );
        assert_eq!(VersionTriple::parse("7").unwrap(), VersionTriple::new(7, 0, 0));
    }

    #[test]
    fn drops_prerelease_and_build_metadata() {
        assert_eq!(
            VersionTriple::parse("1.2.3-beta+7").unwrap(),
            VersionTriple::new(1, 2, 3)
        );
        assert_eq!(
            VersionTriple::parse("2.0.0+build.5").unwrap(),
            VersionTriple::new(2, 0, 0)
        );
    }

    #[test]
    fn rejects_non_numeric_input() {
        assert!(VersionTriple::parse("abc").is_err());
        assert!(VersionTriple::parse("").is_err());
        assert!(VersionTriple::parse("1.x.3").is_err());
        assert!(VersionTriple::parse("1.2.3.4").is_err());
    }

    #[test]
    fn orders_numerically_not_lexicographically() {
        assert!(VersionTriple::new(9, 0, 0) < VersionTriple::new(10, 0, 0));
        assert!(VersionTriple::new(1, 9, 0) < VersionTriple::new(1, 10, 0));
        assert!(VersionTriple::new(1, 0, 9) < VersionTriple::new(1, 0, 10));
        assert!(VersionTriple::new(2, 0, 0) > VersionTriple::new(1, 99, 99));
    }
}
