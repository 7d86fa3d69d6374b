//! HTTP client for the director REST API.
//!
//! The director acknowledges side-effecting calls with a redirect whose
//! `Location` points at a task; the client never follows redirects itself and
//! instead polls the task to completion. No overall timeout is enforced here;
//! a run waits as long as the director keeps a task alive.

use std::time::Duration;

use futures::TryStreamExt;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE, LOCATION};
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tokio_util::codec::{BytesCodec, FramedRead};
use tokio_util::io::StreamReader;
use tracing::debug;

use crate::error::{DirectorError, DirectorResult};
use crate::gateway::{
    Deployment, DirectorGateway, DirectorInfo, ExportRequest, ResourceId, ResourceStream, TaskId,
    UploadPayload,
};

const TASK_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Connection settings for a director.
#[derive(Debug, Clone)]
pub struct DirectorConfig {
    /// Director API endpoint, e.g. `https://192.168.50.6:25555`.
    pub url: String,
    pub username: String,
    pub password: String,
    /// Accept invalid TLS certificates. Lab directors commonly present
    /// self-signed certs.
    pub allow_insecure_tls: bool,
}

impl DirectorConfig {
    pub fn new(url: &str, username: &str, password: &str) -> Self {
        DirectorConfig {
            url: url.trim_end_matches('/').to_string(),
            username: username.to_string(),
            password: password.to_string(),
            allow_insecure_tls: false,
        }
    }

    /// Accept invalid director TLS certificates.
    pub fn with_insecure_tls(mut self) -> Self {
        self.allow_insecure_tls = true;
        self
    }
}

/// Director client speaking the REST API over HTTPS with basic auth.
pub struct DirectorClient {
    config: DirectorConfig,
    http: reqwest::Client,
}

impl DirectorClient {
    pub fn new(config: DirectorConfig) -> DirectorResult<Self> {
        let mut builder = reqwest::Client::builder()
            .user_agent(concat!("relforge/", env!("CARGO_PKG_VERSION")))
            .redirect(reqwest::redirect::Policy::none());

        if config.allow_insecure_tls {
            builder = builder.danger_accept_invalid_certs(true);
        }

        Ok(DirectorClient {
            config,
            http: builder.build()?,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.url, path)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, self.endpoint(path))
            .basic_auth(&self.config.username, Some(&self.config.password))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> DirectorResult<T> {
        let response = self.request(Method::GET, path).send().await?;
        if !response.status().is_success() {
            return Err(unexpected_status(response).await);
        }
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Resolve a redirect response into its task and poll it to completion.
    async fn finish_task(&self, response: Response) -> DirectorResult<TaskId> {
        if !response.status().is_redirection() {
            return Err(unexpected_status(response).await);
        }
        let id = task_id_from_redirect(&response)?;
        self.await_task(id).await
    }

    async fn await_task(&self, id: TaskId) -> DirectorResult<TaskId> {
        loop {
            let task: Task = self.get_json(&format!("/tasks/{id}")).await?;
            match task.state.as_str() {
                "done" => {
                    debug!(task = %id, "task done");
                    return Ok(id);
                }
                "queued" | "processing" | "cancelling" => {
                    tokio::time::sleep(TASK_POLL_INTERVAL).await;
                }
                state => {
                    return Err(DirectorError::TaskFailed {
                        id: id.0,
                        state: state.to_string(),
                    })
                }
            }
        }
    }

    async fn upload_archive(&self, path: &str, payload: UploadPayload) -> DirectorResult<TaskId> {
        let body = reqwest::Body::wrap_stream(FramedRead::new(payload.content, BytesCodec::new()));
        let response = self
            .request(Method::POST, path)
            .header(CONTENT_TYPE, "application/x-compressed")
            .header(CONTENT_LENGTH, payload.size_bytes)
            .body(body)
            .send()
            .await?;
        self.finish_task(response).await
    }
}

#[derive(Debug, Deserialize)]
struct Task {
    state: String,
}

#[derive(Debug, Deserialize)]
struct ExportResultRow {
    blobstore_id: String,
}

#[async_trait::async_trait]
impl DirectorGateway for DirectorClient {
    async fn deployments(&self) -> DirectorResult<Vec<Deployment>> {
        self.get_json("/deployments").await
    }

    async fn delete_deployment(&self, name: &str) -> DirectorResult<()> {
        debug!(deployment = name, "deleting deployment");
        let response = self
            .request(Method::DELETE, &format!("/deployments/{name}?force=true"))
            .send()
            .await?;
        self.finish_task(response).await?;
        Ok(())
    }

    async fn cleanup(&self) -> DirectorResult<TaskId> {
        let response = self
            .request(Method::POST, "/cleanup")
            .json(&json!({ "config": { "remove_all": true } }))
            .send()
            .await?;
        self.finish_task(response).await
    }

    async fn info(&self) -> DirectorResult<DirectorInfo> {
        self.get_json("/info").await
    }

    async fn upload_stemcell(&self, payload: UploadPayload) -> DirectorResult<TaskId> {
        self.upload_archive("/stemcells", payload).await
    }

    async fn upload_release(&self, payload: UploadPayload) -> DirectorResult<TaskId> {
        self.upload_archive("/releases", payload).await
    }

    async fn deploy(&self, manifest: &[u8]) -> DirectorResult<TaskId> {
        let response = self
            .request(Method::POST, "/deployments")
            .header(CONTENT_TYPE, "text/yaml")
            .body(manifest.to_vec())
            .send()
            .await?;
        self.finish_task(response).await
    }

    async fn export_release(&self, request: ExportRequest<'_>) -> DirectorResult<ResourceId> {
        let response = self
            .request(Method::POST, "/releases/export")
            .json(&json!({
                "deployment_name": request.deployment_name,
                "release_name": request.release_name,
                "release_version": request.release_version,
                "stemcell_os": request.stemcell_name,
                "stemcell_version": request.stemcell_version,
            }))
            .send()
            .await?;
        let task = self.finish_task(response).await?;

        // The task's result output carries one JSON row naming the blob.
        let output = self
            .request(Method::GET, &format!("/tasks/{task}/output?type=result"))
            .send()
            .await?;
        if !output.status().is_success() {
            return Err(unexpected_status(output).await);
        }
        let body = output.text().await?;
        for line in body.lines() {
            if let Ok(row) = serde_json::from_str::<ExportResultRow>(line) {
                return Ok(ResourceId(row.blobstore_id));
            }
        }
        Err(DirectorError::MalformedResponse(format!(
            "export task {task} result output carried no blobstore id"
        )))
    }

    async fn resource(&self, resource_id: &ResourceId) -> DirectorResult<ResourceStream> {
        let response = self
            .request(Method::GET, &format!("/resources/{resource_id}"))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(unexpected_status(response).await);
        }
        let stream = response
            .bytes_stream()
            .map_err(|err| std::io::Error::new(std::io::ErrorKind::Other, err));
        Ok(Box::new(StreamReader::new(stream)))
    }
}

fn task_id_from_redirect(response: &Response) -> DirectorResult<TaskId> {
    let location = response
        .headers()
        .get(LOCATION)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| {
            DirectorError::MalformedResponse("redirect without a Location header".to_string())
        })?;

    location
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .and_then(|segment| segment.parse().ok())
        .map(TaskId)
        .ok_or_else(|| {
            DirectorError::MalformedResponse(format!("unexpected task location {location:?}"))
        })
}

async fn unexpected_status(response: Response) -> DirectorError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    DirectorError::UnexpectedStatus { status, body }
}
