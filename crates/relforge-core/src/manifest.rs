//! Deployment manifest generation.
//!
//! The manifest is the YAML document the director deploys; compiling the
//! release against the stemcell is a side effect of that deployment. The
//! document carries no instance groups and a fixed update policy, so the
//! deployment itself does nothing beyond forcing compilation.

use serde::Serialize;

use crate::archive::ArtifactMetadata;
use crate::error::CompileError;

#[derive(Debug, Serialize)]
struct DeploymentManifest {
    name: String,
    director_uuid: String,
    releases: Vec<ReleaseEntry>,
    stemcells: Vec<StemcellEntry>,
    update: UpdatePolicy,
    instance_groups: Vec<serde_yaml::Value>,
}

#[derive(Debug, Serialize)]
struct ReleaseEntry {
    name: String,
    version: String,
}

#[derive(Debug, Serialize)]
struct StemcellEntry {
    alias: String,
    os: String,
    version: String,
}

#[derive(Debug, Serialize)]
struct UpdatePolicy {
    canaries: u32,
    max_in_flight: u32,
    canary_watch_time: String,
    update_watch_time: String,
}

/// Renders deployment manifests. Pure and deterministic.
#[derive(Debug, Default)]
pub struct ManifestGenerator;

impl ManifestGenerator {
    pub fn new() -> Self {
        ManifestGenerator
    }

    /// Render the deployment manifest for one release/stemcell pair.
    ///
    /// Exactly one release entry (name and version copied verbatim) and one
    /// stemcell entry (alias fixed to `default`).
    pub fn generate(
        &self,
        director_uuid: &str,
        deployment_name: &str,
        release: &ArtifactMetadata,
        stemcell: &ArtifactMetadata,
    ) -> Result<Vec<u8>, CompileError> {
        let manifest = DeploymentManifest {
            name: deployment_name.to_string(),
            director_uuid: director_uuid.to_string(),
            releases: vec![ReleaseEntry {
                name: release.name.clone(),
                version: release.version.clone(),
            }],
            stemcells: vec![StemcellEntry {
                alias: "default".to_string(),
                os: stemcell.name.clone(),
                version: stemcell.version.clone(),
            }],
            update: UpdatePolicy {
                canaries: 1,
                max_in_flight: 1,
                canary_watch_time: "1000-1001".to_string(),
                update_watch_time: "1000-1001".to_string(),
            },
            instance_groups: Vec::new(),
        };

        serde_yaml::to_string(&manifest)
            .map(String::into_bytes)
            .map_err(CompileError::ManifestUnserializable)
    }
}
