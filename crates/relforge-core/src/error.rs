//! Error taxonomy for the compilation pipeline.

use std::path::PathBuf;

use relforge_director::DirectorError;

use crate::token::TokenError;

/// Errors produced by the compilation pipeline.
///
/// Every variant is terminal: the orchestrator performs no retries, recovery,
/// or reclassification, and the first failure halts all subsequent steps.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("could not read archive {path:?}: {source}")]
    ArchiveUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path:?} is not a gzip archive")]
    NotGzip { path: PathBuf },

    #[error("error while reading {path:?}: {source}")]
    ArchiveCorrupt {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not find {entry} in {path:?}")]
    ManifestEntryNotFound { entry: String, path: PathBuf },

    #[error("could not parse metadata in {path:?}: {source}")]
    MetadataUnparsable {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("could not parse semantic version from {version}")]
    VersionUnparsable { version: String },

    #[error(transparent)]
    DirectorRequestFailed(#[from] DirectorError),

    #[error("could not write compiled release to {path:?}: {source}")]
    OutputWriteFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    TokenGenerationFailure(#[from] TokenError),

    #[error("could not serialize deployment manifest: {0}")]
    ManifestUnserializable(#[source] serde_yaml::Error),
}

/// Result type for compilation pipeline operations.
pub type Result<T> = std::result::Result<T, CompileError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_entry_not_found_names_the_path() {
        let err = CompileError::ManifestEntryNotFound {
            entry: "release.MF".to_string(),
            path: PathBuf::from("/tmp/some-release.tgz"),
        };
        let msg = err.to_string();
        assert!(msg.contains("release.MF"));
        assert!(msg.contains("/tmp/some-release.tgz"));
    }

    #[test]
    fn test_version_unparsable_names_the_version() {
        let err = CompileError::VersionUnparsable {
            version: "1.2.3.4".to_string(),
        };
        assert!(err.to_string().contains("1.2.3.4"));
    }

    #[test]
    fn test_director_error_passes_through_verbatim() {
        let err = CompileError::from(DirectorError::Transport("boom".to_string()));
        assert_eq!(err.to_string(), "request to director failed: boom");
    }
}
