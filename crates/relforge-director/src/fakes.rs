//! In-memory fake director (testing only).
//!
//! [`FakeDirector`] satisfies [`DirectorGateway`] without any network: it
//! records every call in order, captures uploaded bytes fully, and serves
//! scripted responses or failures per method.

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::io::AsyncReadExt;

use crate::error::{DirectorError, DirectorResult};
use crate::gateway::{
    Deployment, DirectorGateway, DirectorInfo, ExportRequest, ResourceId, ResourceStream, TaskId,
    UploadPayload,
};

/// Gateway methods, used to script failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GatewayMethod {
    Deployments,
    DeleteDeployment,
    Cleanup,
    Info,
    UploadStemcell,
    UploadRelease,
    Deploy,
    ExportRelease,
    Resource,
}

/// One recorded gateway call with the arguments that identify it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedCall {
    Deployments,
    DeleteDeployment(String),
    Cleanup,
    Info,
    UploadStemcell,
    UploadRelease,
    Deploy,
    ExportRelease,
    Resource(String),
}

/// Export parameters captured by the fake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedExport {
    pub deployment_name: String,
    pub release_name: String,
    pub release_version: String,
    pub stemcell_name: String,
    pub stemcell_version: String,
}

#[derive(Debug, Default)]
struct FakeState {
    calls: Vec<RecordedCall>,
    fail_on: HashMap<GatewayMethod, String>,
    deployments: Vec<Deployment>,
    uuid: String,
    resource_id: String,
    resource_body: Vec<u8>,
    uploaded_stemcell: Option<Vec<u8>>,
    uploaded_release: Option<Vec<u8>>,
    deployed_manifest: Option<Vec<u8>>,
    export_request: Option<RecordedExport>,
    next_task: u64,
}

/// In-memory director backed by a `Mutex<FakeState>`.
#[derive(Debug, Default)]
pub struct FakeDirector {
    state: Mutex<FakeState>,
}

impl FakeDirector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the deployment list returned by `deployments`.
    pub fn set_deployments(&self, names: &[&str]) {
        let mut state = self.state.lock().unwrap();
        state.deployments = names
            .iter()
            .map(|name| Deployment {
                name: name.to_string(),
            })
            .collect();
    }

    /// Script the director UUID returned by `info`.
    pub fn set_uuid(&self, uuid: &str) {
        self.state.lock().unwrap().uuid = uuid.to_string();
    }

    /// Script the resource id produced by `export_release` and the body
    /// served for it by `resource`.
    pub fn set_resource(&self, id: &str, body: &[u8]) {
        let mut state = self.state.lock().unwrap();
        state.resource_id = id.to_string();
        state.resource_body = body.to_vec();
    }

    /// Make every call to `method` fail with a transport error carrying
    /// `message`. The call is still recorded.
    pub fn fail_on(&self, method: GatewayMethod, message: &str) {
        self.state
            .lock()
            .unwrap()
            .fail_on
            .insert(method, message.to_string());
    }

    /// All calls received so far, in order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Names passed to `delete_deployment`, in order.
    pub fn deleted_deployments(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter_map(|call| match call {
                RecordedCall::DeleteDeployment(name) => Some(name.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn uploaded_stemcell(&self) -> Option<Vec<u8>> {
        self.state.lock().unwrap().uploaded_stemcell.clone()
    }

    pub fn uploaded_release(&self) -> Option<Vec<u8>> {
        self.state.lock().unwrap().uploaded_release.clone()
    }

    pub fn deployed_manifest(&self) -> Option<Vec<u8>> {
        self.state.lock().unwrap().deployed_manifest.clone()
    }

    pub fn export_request(&self) -> Option<RecordedExport> {
        self.state.lock().unwrap().export_request.clone()
    }

    /// Record the call, then fail it if scripted to.
    fn begin(&self, method: GatewayMethod, call: RecordedCall) -> DirectorResult<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(call);
        if let Some(message) = state.fail_on.get(&method) {
            return Err(DirectorError::Transport(message.clone()));
        }
        Ok(())
    }
}

fn next_task(state: &mut FakeState) -> TaskId {
    state.next_task += 1;
    TaskId(state.next_task)
}

#[async_trait]
impl DirectorGateway for FakeDirector {
    async fn deployments(&self) -> DirectorResult<Vec<Deployment>> {
        self.begin(GatewayMethod::Deployments, RecordedCall::Deployments)?;
        Ok(self.state.lock().unwrap().deployments.clone())
    }

    async fn delete_deployment(&self, name: &str) -> DirectorResult<()> {
        self.begin(
            GatewayMethod::DeleteDeployment,
            RecordedCall::DeleteDeployment(name.to_string()),
        )
    }

    async fn cleanup(&self) -> DirectorResult<TaskId> {
        self.begin(GatewayMethod::Cleanup, RecordedCall::Cleanup)?;
        Ok(next_task(&mut self.state.lock().unwrap()))
    }

    async fn info(&self) -> DirectorResult<DirectorInfo> {
        self.begin(GatewayMethod::Info, RecordedCall::Info)?;
        Ok(DirectorInfo {
            uuid: self.state.lock().unwrap().uuid.clone(),
        })
    }

    async fn upload_stemcell(&self, payload: UploadPayload) -> DirectorResult<TaskId> {
        self.begin(GatewayMethod::UploadStemcell, RecordedCall::UploadStemcell)?;
        let mut content = Vec::new();
        let mut file = payload.content;
        file.read_to_end(&mut content).await?;
        let mut state = self.state.lock().unwrap();
        state.uploaded_stemcell = Some(content);
        Ok(next_task(&mut state))
    }

    async fn upload_release(&self, payload: UploadPayload) -> DirectorResult<TaskId> {
        self.begin(GatewayMethod::UploadRelease, RecordedCall::UploadRelease)?;
        let mut content = Vec::new();
        let mut file = payload.content;
        file.read_to_end(&mut content).await?;
        let mut state = self.state.lock().unwrap();
        state.uploaded_release = Some(content);
        Ok(next_task(&mut state))
    }

    async fn deploy(&self, manifest: &[u8]) -> DirectorResult<TaskId> {
        self.begin(GatewayMethod::Deploy, RecordedCall::Deploy)?;
        let mut state = self.state.lock().unwrap();
        state.deployed_manifest = Some(manifest.to_vec());
        Ok(next_task(&mut state))
    }

    async fn export_release(&self, request: ExportRequest<'_>) -> DirectorResult<ResourceId> {
        self.begin(GatewayMethod::ExportRelease, RecordedCall::ExportRelease)?;
        let mut state = self.state.lock().unwrap();
        state.export_request = Some(RecordedExport {
            deployment_name: request.deployment_name.to_string(),
            release_name: request.release_name.to_string(),
            release_version: request.release_version.to_string(),
            stemcell_name: request.stemcell_name.to_string(),
            stemcell_version: request.stemcell_version.to_string(),
        });
        Ok(ResourceId(state.resource_id.clone()))
    }

    async fn resource(&self, resource_id: &ResourceId) -> DirectorResult<ResourceStream> {
        self.begin(
            GatewayMethod::Resource,
            RecordedCall::Resource(resource_id.0.clone()),
        )?;
        let body = self.state.lock().unwrap().resource_body.clone();
        Ok(Box::new(Cursor::new(body)))
    }
}
