//! # contract: network seams of the pipeline
//!
//! Two async traits stand between the core pipeline and the cloud:
//!
//! - [`ModelRuntime`]: sends one serialized model request and returns the raw
//!   response body. Model-family specifics (request shape, response parsing)
//!   stay in [`crate::generation`]; the runtime only moves bytes.
//! - [`ObjectStore`]: stores one object. Key, content type and cache metadata
//!   are computed by [`crate::uploader`]; the store only performs the write.
//!
//! ## Mocking & Testing
//! Both traits are annotated for `mockall`, so consumers get `MockModelRuntime`
//! and `MockObjectStore` for deterministic tests (exported with the default
//! `test-export-mocks` feature).
//!
//! ## Errors
//! Implementors convert transport and service failures into
//! [`PipelineError::Generation`] / [`PipelineError::Upload`] with a
//! machine-readable code and a human-readable message. No retries happen here.

use std::collections::BTreeMap;

use async_trait::async_trait;
#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;

use crate::error::PipelineError;

/// One synchronous model invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct InvokeRequest {
    pub model_id: String,
    /// Serialized JSON request body.
    pub body: Vec<u8>,
}

/// One object write.
#[derive(Debug, Clone, PartialEq)]
pub struct PutObjectRequest {
    pub bucket: String,
    pub key: String,
    pub body: Vec<u8>,
    pub content_type: &'static str,
    pub cache_control: &'static str,
    /// User metadata stored alongside the object.
    pub metadata: BTreeMap<String, String>,
}

/// Invokes a generative model and returns its raw JSON response body.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait ModelRuntime: Send + Sync {
    async fn invoke_model(&self, request: InvokeRequest) -> Result<Vec<u8>, PipelineError>;
}

/// Writes objects to a remote bucket.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put_object(&self, request: PutObjectRequest) -> Result<(), PipelineError>;
}
