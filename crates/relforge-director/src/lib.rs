//! Director gateway for relforge.
//!
//! Defines the trait boundary the compilation orchestrator drives, the wire
//! types shared across implementations, an HTTP client for a real director,
//! and in-memory fakes for testing.

pub mod client;
pub mod error;
pub mod fakes;
pub mod gateway;

pub use client::{DirectorClient, DirectorConfig};
pub use error::{DirectorError, DirectorResult};
pub use gateway::{
    Deployment, DirectorGateway, DirectorInfo, ExportRequest, ResourceId, ResourceStream, TaskId,
    UploadPayload,
};
