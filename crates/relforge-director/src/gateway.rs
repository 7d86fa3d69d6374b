//! Gateway trait and wire types for the director.
//!
//! The director is the remote service that owns deployments, stores uploaded
//! artifacts, and performs compilation as a side effect of deploying. The
//! orchestrator only ever talks to it through [`DirectorGateway`], so tests
//! substitute the in-memory fake from the `fakes` module.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncRead;

use crate::error::DirectorResult;

/// A named deployment tracked by the director.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deployment {
    pub name: String,
}

/// Director identity, queried once per run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectorInfo {
    pub uuid: String,
}

/// Handle for a director-side task returned by side-effecting calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(pub u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque identifier for an exported artifact, retrievable as a byte stream.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceId(pub String);

impl ResourceId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An artifact's full archive bytes handed to an upload call.
///
/// The file handle is freshly opened and start-positioned; the declared size
/// lets implementations set Content-Length without a second stat. Ownership
/// moves into the upload call, so the handle is released on every exit path.
#[derive(Debug)]
pub struct UploadPayload {
    pub content: tokio::fs::File,
    pub size_bytes: u64,
}

/// Parameters identifying a compiled release to export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportRequest<'a> {
    pub deployment_name: &'a str,
    pub release_name: &'a str,
    pub release_version: &'a str,
    pub stemcell_name: &'a str,
    pub stemcell_version: &'a str,
}

/// Streamed body of an exported resource.
pub type ResourceStream = Box<dyn AsyncRead + Send + Unpin>;

/// Deployment lifecycle, artifact upload, export, and resource retrieval.
///
/// Every method blocks (awaits) until the director has finished the
/// operation, including any server-side task the call spawns. Implementations
/// own timeout and pacing policy; callers perform no retries.
#[async_trait]
pub trait DirectorGateway: Send + Sync {
    /// List deployments currently tracked by the director.
    async fn deployments(&self) -> DirectorResult<Vec<Deployment>>;

    /// Delete a deployment by name.
    async fn delete_deployment(&self, name: &str) -> DirectorResult<()>;

    /// Run director-wide garbage collection. Idempotent.
    async fn cleanup(&self) -> DirectorResult<TaskId>;

    /// Fetch director identity.
    async fn info(&self) -> DirectorResult<DirectorInfo>;

    /// Upload a stemcell archive verbatim.
    async fn upload_stemcell(&self, payload: UploadPayload) -> DirectorResult<TaskId>;

    /// Upload a release archive verbatim.
    async fn upload_release(&self, payload: UploadPayload) -> DirectorResult<TaskId>;

    /// Submit a deployment manifest; the director compiles the referenced
    /// release against the referenced stemcell as a side effect.
    async fn deploy(&self, manifest: &[u8]) -> DirectorResult<TaskId>;

    /// Request export of a compiled release; returns the resource to fetch.
    async fn export_release(&self, request: ExportRequest<'_>) -> DirectorResult<ResourceId>;

    /// Fetch an exported resource's bytes.
    async fn resource(&self, resource_id: &ResourceId) -> DirectorResult<ResourceStream>;
}
