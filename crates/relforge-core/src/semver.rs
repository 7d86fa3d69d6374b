//! Semantic version derivation for artifact version strings.

use std::fmt;
use std::str::FromStr;

use crate::error::CompileError;

/// Three-part semantic version derived from an artifact's version string.
///
/// Director artifacts version loosely: "42", "1.2", and "1.2.3" are all
/// valid. Missing segments are zero. Segments that fail integer parsing
/// degrade to zero rather than failing; only a segment *count* above three
/// is rejected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct SemanticVersion {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl SemanticVersion {
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        SemanticVersion {
            major,
            minor,
            patch,
        }
    }

    /// Split `version` on `.` and assign up to three segments in order.
    pub fn parse(version: &str) -> Result<Self, CompileError> {
        let parts: Vec<&str> = version.split('.').collect();
        if parts.len() > 3 {
            return Err(CompileError::VersionUnparsable {
                version: version.to_string(),
            });
        }

        let mut segments = parts
            .iter()
            .map(|part| part.parse::<u64>().unwrap_or(0));

        Ok(SemanticVersion {
            major: segments.next().unwrap_or(0),
            minor: segments.next().unwrap_or(0),
            patch: segments.next().unwrap_or(0),
        })
    }
}

impl fmt::Display for SemanticVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for SemanticVersion {
    type Err = CompileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SemanticVersion::parse(s)
    }
}
