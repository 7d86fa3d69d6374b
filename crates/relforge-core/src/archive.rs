//! Archive metadata extraction for release and stemcell tarballs.
//!
//! Both artifact kinds are gzip-compressed tar archives carrying an embedded
//! YAML manifest (`release.MF` / `stemcell.MF`). Extraction scans the tar
//! stream for that entry, parses the name and version out of it, and derives
//! the semantic version used for naming throughout the rest of the pipeline.
//!
//! The metadata value never holds an open file. Uploads re-open the archive
//! on demand via [`ArtifactMetadata::open_content`], so the content stream is
//! scope-bound to the upload call and released on every exit path.

use std::ffi::OsStr;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use serde::{Deserialize, Deserializer};

use crate::error::CompileError;
use crate::semver::SemanticVersion;
use relforge_director::UploadPayload;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Identity and version metadata extracted from an artifact tarball.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactMetadata {
    pub name: String,
    pub version: String,
    pub semver: SemanticVersion,
    source_path: PathBuf,
    size_bytes: u64,
}

impl ArtifactMetadata {
    /// Extract metadata from a release tarball (`release.MF`, `name` key).
    pub fn from_release_tarball(path: impl AsRef<Path>) -> Result<Self, CompileError> {
        extract(path.as_ref(), "release.MF", parse_release_manifest)
    }

    /// Extract metadata from a stemcell tarball (`stemcell.MF`,
    /// `operating_system` key).
    pub fn from_stemcell_tarball(path: impl AsRef<Path>) -> Result<Self, CompileError> {
        extract(path.as_ref(), "stemcell.MF", parse_stemcell_manifest)
    }

    /// Path the metadata was extracted from.
    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    /// Size of the whole archive file, from the stat taken at extraction.
    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    /// Re-open the source archive as a fresh, start-positioned stream.
    ///
    /// The returned payload owns the handle; dropping it (inside the upload
    /// call, on success or error) releases the file.
    pub async fn open_content(&self) -> Result<UploadPayload, CompileError> {
        let content = tokio::fs::File::open(&self.source_path)
            .await
            .map_err(|source| CompileError::ArchiveUnreadable {
                path: self.source_path.clone(),
                source,
            })?;
        Ok(UploadPayload {
            content,
            size_bytes: self.size_bytes,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ReleaseManifest {
    name: String,
    #[serde(deserialize_with = "version_scalar")]
    version: String,
}

#[derive(Debug, Deserialize)]
struct StemcellManifest {
    operating_system: String,
    #[serde(deserialize_with = "version_scalar")]
    version: String,
}

fn parse_release_manifest(content: &[u8]) -> Result<(String, String), serde_yaml::Error> {
    let manifest: ReleaseManifest = serde_yaml::from_slice(content)?;
    Ok((manifest.name, manifest.version))
}

fn parse_stemcell_manifest(content: &[u8]) -> Result<(String, String), serde_yaml::Error> {
    let manifest: StemcellManifest = serde_yaml::from_slice(content)?;
    Ok((manifest.operating_system, manifest.version))
}

/// Versions appear both quoted and as bare numeric scalars (`version: 42`);
/// accept either and stringify.
fn version_scalar<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_yaml::Value::deserialize(deserializer)?;
    match value {
        serde_yaml::Value::String(s) => Ok(s),
        serde_yaml::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "version must be a scalar, got {other:?}"
        ))),
    }
}

fn extract(
    path: &Path,
    entry_name: &str,
    parse: fn(&[u8]) -> Result<(String, String), serde_yaml::Error>,
) -> Result<ArtifactMetadata, CompileError> {
    let unreadable = |source| CompileError::ArchiveUnreadable {
        path: path.to_path_buf(),
        source,
    };

    let mut file = File::open(path).map_err(unreadable)?;
    let size_bytes = file.metadata().map_err(unreadable)?.len();

    let mut magic = [0u8; 2];
    let looks_gzipped = match file.read_exact(&mut magic) {
        Ok(()) => magic == GZIP_MAGIC,
        Err(_) => false,
    };
    if !looks_gzipped {
        return Err(CompileError::NotGzip {
            path: path.to_path_buf(),
        });
    }
    file.seek(SeekFrom::Start(0)).map_err(unreadable)?;

    let content = read_manifest_entry(path, entry_name, file)?;
    let (name, version) =
        parse(&content).map_err(|source| CompileError::MetadataUnparsable {
            path: path.to_path_buf(),
            source,
        })?;
    let semver = SemanticVersion::parse(&version)?;

    Ok(ArtifactMetadata {
        name,
        version,
        semver,
        source_path: path.to_path_buf(),
        size_bytes,
    })
}

/// Scan tar entries in stream order and return the body of the first entry
/// whose base filename matches `entry_name`.
fn read_manifest_entry(
    path: &Path,
    entry_name: &str,
    file: File,
) -> Result<Vec<u8>, CompileError> {
    let corrupt = |source| CompileError::ArchiveCorrupt {
        path: path.to_path_buf(),
        source,
    };

    let mut archive = tar::Archive::new(GzDecoder::new(file));
    let entries = archive.entries().map_err(corrupt)?;

    for entry in entries {
        let mut entry = entry.map_err(corrupt)?;
        let is_match = {
            let header_path = entry.path().map_err(corrupt)?;
            header_path.file_name() == Some(OsStr::new(entry_name))
        };
        if is_match {
            let mut content = Vec::new();
            entry.read_to_end(&mut content).map_err(corrupt)?;
            return Ok(content);
        }
    }

    Err(CompileError::ManifestEntryNotFound {
        entry: entry_name.to_string(),
        path: path.to_path_buf(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Write;

    use flate2::write::GzEncoder;
    use flate2::Compression;
    use tempfile::TempDir;

    fn write_tarball(path: &Path, entries: &[(&str, &[u8])]) {
        let file = File::create(path).expect("create tarball");
        let encoder = GzEncoder::new(file, Compression::default());
        let mut builder = tar::Builder::new(encoder);
        for (name, data) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, name, *data).expect("append");
        }
        builder
            .into_inner()
            .expect("finish tar")
            .finish()
            .expect("finish gzip");
    }

    fn release_tarball(dir: &TempDir, manifest: &str) -> PathBuf {
        let path = dir.path().join("some-release.tgz");
        write_tarball(&path, &[("release.MF", manifest.as_bytes())]);
        path
    }

    #[test]
    fn test_extracts_release_name_and_version() {
        let dir = TempDir::new().expect("tempdir");
        let path = release_tarball(&dir, "---\nname: some-release\nversion: 42\n");

        let metadata = ArtifactMetadata::from_release_tarball(&path).expect("extract");
        assert_eq!(metadata.name, "some-release");
        assert_eq!(metadata.version, "42");
        assert_eq!(metadata.semver, SemanticVersion::new(42, 0, 0));
        assert_eq!(metadata.source_path(), path.as_path());
        assert_eq!(
            metadata.size_bytes(),
            std::fs::metadata(&path).expect("stat").len()
        );
    }

    #[test]
    fn test_extracts_two_and_three_part_versions() {
        let dir = TempDir::new().expect("tempdir");

        let path = release_tarball(&dir, "name: r\nversion: \"1.2\"\n");
        let metadata = ArtifactMetadata::from_release_tarball(&path).expect("extract");
        assert_eq!(metadata.semver, SemanticVersion::new(1, 2, 0));

        let path = release_tarball(&dir, "name: r\nversion: 1.2.3\n");
        let metadata = ArtifactMetadata::from_release_tarball(&path).expect("extract");
        assert_eq!(metadata.version, "1.2.3");
        assert_eq!(metadata.semver, SemanticVersion::new(1, 2, 3));
    }

    #[test]
    fn test_four_part_version_fails() {
        let dir = TempDir::new().expect("tempdir");
        let path = release_tarball(&dir, "name: r\nversion: 1.2.3.4\n");

        let err = ArtifactMetadata::from_release_tarball(&path).expect_err("should fail");
        assert!(matches!(err, CompileError::VersionUnparsable { .. }));
    }

    #[test]
    fn test_matches_entry_by_base_filename() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("nested.tgz");
        write_tarball(
            &path,
            &[
                ("jobs/worker.tgz", b"ignored".as_slice()),
                (
                    "some-dir/release.MF",
                    b"name: nested-release\nversion: 7\n".as_slice(),
                ),
            ],
        );

        let metadata = ArtifactMetadata::from_release_tarball(&path).expect("extract");
        assert_eq!(metadata.name, "nested-release");
    }

    #[test]
    fn test_stemcell_name_comes_from_operating_system() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("stemcell.tgz");
        // Stemcell manifests carry both a `name` and an `operating_system`;
        // the operating system is the identity the manifest needs.
        write_tarball(
            &path,
            &[(
                "stemcell.MF",
                b"name: light-stemcell-xen\noperating_system: some-linux\nversion: 1.2.3\n"
                    .as_slice(),
            )],
        );

        let metadata = ArtifactMetadata::from_stemcell_tarball(&path).expect("extract");
        assert_eq!(metadata.name, "some-linux");
        assert_eq!(metadata.version, "1.2.3");
    }

    #[test]
    fn test_missing_file_is_unreadable() {
        let err = ArtifactMetadata::from_release_tarball("missing-release-1.tgz")
            .expect_err("should fail");
        assert!(matches!(err, CompileError::ArchiveUnreadable { .. }));
    }

    #[test]
    fn test_plain_file_is_not_gzip() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("plain.tgz");
        std::fs::write(&path, "not a gzip archive").expect("write");

        let err = ArtifactMetadata::from_release_tarball(&path).expect_err("should fail");
        assert!(matches!(err, CompileError::NotGzip { .. }));
    }

    #[test]
    fn test_missing_manifest_entry_names_the_path() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("no-manifest.tgz");
        write_tarball(&path, &[("README.md", b"hello".as_slice())]);

        let err = ArtifactMetadata::from_release_tarball(&path).expect_err("should fail");
        assert!(matches!(err, CompileError::ManifestEntryNotFound { .. }));
        assert!(err.to_string().contains("release.MF"));
        assert!(err.to_string().contains(path.to_str().expect("utf8 path")));
    }

    #[test]
    fn test_truncated_tar_is_corrupt() {
        let dir = TempDir::new().expect("tempdir");

        // Build a valid tar with a large entry, truncate it mid-entry, then
        // re-gzip the damaged bytes.
        let mut tar_bytes = Vec::new();
        {
            let mut builder = tar::Builder::new(&mut tar_bytes);
            let body = vec![b'x'; 4096];
            let mut header = tar::Header::new_gnu();
            header.set_size(body.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder
                .append_data(&mut header, "jobs/big-file", body.as_slice())
                .expect("append");
            builder.finish().expect("finish tar");
        }
        tar_bytes.truncate(700);

        let path = dir.path().join("truncated.tgz");
        let file = File::create(&path).expect("create");
        let mut encoder = GzEncoder::new(file, Compression::default());
        encoder.write_all(&tar_bytes).expect("gzip");
        encoder.finish().expect("finish gzip");

        let err = ArtifactMetadata::from_release_tarball(&path).expect_err("should fail");
        assert!(matches!(err, CompileError::ArchiveCorrupt { .. }));
        assert!(err.to_string().contains(path.to_str().expect("utf8 path")));
    }

    #[test]
    fn test_unparsable_manifest_content_fails() {
        let dir = TempDir::new().expect("tempdir");
        let path = release_tarball(&dir, "name: [unterminated\n");

        let err = ArtifactMetadata::from_release_tarball(&path).expect_err("should fail");
        assert!(matches!(err, CompileError::MetadataUnparsable { .. }));
    }

    #[test]
    fn test_manifest_missing_version_fails() {
        let dir = TempDir::new().expect("tempdir");
        let path = release_tarball(&dir, "name: some-release\n");

        let err = ArtifactMetadata::from_release_tarball(&path).expect_err("should fail");
        assert!(matches!(err, CompileError::MetadataUnparsable { .. }));
    }

    #[tokio::test]
    async fn test_open_content_yields_the_whole_archive() {
        use tokio::io::AsyncReadExt;

        let dir = TempDir::new().expect("tempdir");
        let path = release_tarball(&dir, "name: some-release\nversion: 42\n");
        let metadata = ArtifactMetadata::from_release_tarball(&path).expect("extract");

        let payload = metadata.open_content().await.expect("open content");
        assert_eq!(payload.size_bytes, metadata.size_bytes());

        let mut file = payload.content;
        let mut streamed = Vec::new();
        file.read_to_end(&mut streamed).await.expect("read");
        assert_eq!(streamed, std::fs::read(&path).expect("read file"));
    }
}
