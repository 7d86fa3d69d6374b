//! One-shot compilation orchestration.
//!
//! Drives the director through a strictly linear sequence: clear prior
//! state, upload the artifacts, deploy a generated manifest (which triggers
//! compilation), export and download the compiled release, then tear down.
//! Each step runs only if every prior step succeeded; the first failure is
//! returned verbatim and halts the rest of the sequence. No step is retried
//! and no rollback exists beyond the delete/cleanup steps already in the
//! sequence.

use std::path::PathBuf;
use std::sync::Arc;

use relforge_director::{DirectorGateway, ExportRequest};

use crate::archive::ArtifactMetadata;
use crate::error::{CompileError, Result};
use crate::manifest::ManifestGenerator;
use crate::reporter::ProgressReporter;
use crate::token::TokenGenerator;

/// The compilation orchestrator and its collaborators.
///
/// Owns nothing shared: the metadata, manifest, and output file it creates
/// belong exclusively to one run. Two concurrent runs against the same
/// director are unsafe, since both clear "all current deployments".
pub struct Compiler {
    pub release_tarball: PathBuf,
    pub stemcell_tarball: PathBuf,
    pub output_dir: PathBuf,
    pub director: Arc<dyn DirectorGateway>,
    pub manifest_generator: ManifestGenerator,
    pub token_generator: Box<dyn TokenGenerator>,
    pub reporter: Arc<dyn ProgressReporter>,
}

impl Compiler {
    /// Run the full sequence; returns the compiled tarball's path.
    pub async fn run(&self) -> Result<PathBuf> {
        self.reporter.line("deleting existing deployments");
        let deployments = self.director.deployments().await?;
        for deployment in deployments {
            self.director.delete_deployment(&deployment.name).await?;
        }

        self.reporter.line("preparing compiler");
        self.director.cleanup().await?;

        self.reporter.line("fetching director information");
        let info = self.director.info().await?;

        self.reporter.line("generating deployment name");
        let token = self.token_generator.generate()?;
        let deployment_name = format!("compile-release-{token}");

        self.reporter.line("parsing release details");
        let release = ArtifactMetadata::from_release_tarball(&self.release_tarball)?;

        self.reporter.line("parsing stemcell details");
        let stemcell = ArtifactMetadata::from_stemcell_tarball(&self.stemcell_tarball)?;

        self.reporter.line(&format!(
            "uploading stemcell {} {}",
            stemcell.name, stemcell.version
        ));
        self.director
            .upload_stemcell(stemcell.open_content().await?)
            .await?;

        self.reporter.line(&format!(
            "uploading release {} {}",
            release.name, release.version
        ));
        self.director
            .upload_release(release.open_content().await?)
            .await?;

        self.reporter.line("generating deployment manifest");
        let manifest =
            self.manifest_generator
                .generate(&info.uuid, &deployment_name, &release, &stemcell)?;

        self.reporter.line("deploying to director");
        self.director.deploy(&manifest).await?;

        self.reporter.line("compiling the release");
        let resource_id = self
            .director
            .export_release(ExportRequest {
                deployment_name: &deployment_name,
                release_name: &release.name,
                release_version: &release.version,
                stemcell_name: &stemcell.name,
                stemcell_version: &stemcell.version,
            })
            .await?;

        self.reporter.line("downloading the compiled release");
        let output_path = self.output_dir.join(format!(
            "{}-{}-{}.tgz",
            release.name, release.semver, stemcell.semver
        ));
        let write_failure = |source| CompileError::OutputWriteFailure {
            path: output_path.clone(),
            source,
        };
        let mut output = tokio::fs::File::create(&output_path)
            .await
            .map_err(write_failure)?;
        let mut resource = self.director.resource(&resource_id).await?;
        tokio::io::copy(&mut resource, &mut output)
            .await
            .map_err(write_failure)?;

        self.reporter.line("deleting the deployment");
        self.director.delete_deployment(&deployment_name).await?;

        self.reporter.line("cleaning up");
        self.director.cleanup().await?;

        Ok(output_path)
    }
}
