//! Amazon S3 implementation of the core [`ObjectStore`] seam, plus the bucket
//! probes used by `prompt-deploy check`.

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use prompt_deploy_core::contract::{ObjectStore, PutObjectRequest};
use prompt_deploy_core::PipelineError;

use crate::aws::error_parts;
use crate::check::CheckOutcome;

pub const PROBE_KEY: &str = "test/setup-verification.txt";
const PROBE_BODY: &str = "This is a test file from setup verification";

pub struct S3Store {
    client: Client,
}

impl S3Store {
    pub fn new(sdk_config: &SdkConfig) -> Self {
        tracing::info!(region = ?sdk_config.region(), "Initialized S3 client");
        Self {
            client: Client::new(sdk_config),
        }
    }

    /// Head, list, write and delete against `bucket`. Stops at the first failing step.
    pub async fn probe_bucket(&self, bucket: &str) -> Vec<CheckOutcome> {
        let name = |step: &str| format!("S3 bucket {bucket}: {step}");
        let mut outcomes = Vec::new();

        if let Err(e) = self.client.head_bucket().bucket(bucket).send().await {
            let (code, message) = error_parts(&e);
            let detail = match code.as_str() {
                "NotFound" | "404" | "NoSuchBucket" => format!("bucket '{bucket}' does not exist"),
                "Forbidden" | "403" | "AccessDenied" => {
                    format!("access denied; check s3:ListBucket and s3:PutObject permissions ({message})")
                }
                _ => format!("{code} - {message}"),
            };
            outcomes.push(CheckOutcome::fail(name("exists"), detail));
            return outcomes;
        }
        outcomes.push(CheckOutcome::pass(name("exists"), "bucket is accessible"));

        match self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .max_keys(1)
            .send()
            .await
        {
            Ok(_) => outcomes.push(CheckOutcome::pass(name("list"), "can list objects")),
            Err(e) => {
                let (code, message) = error_parts(&e);
                outcomes.push(CheckOutcome::fail(name("list"), format!("{code} - {message}")));
                return outcomes;
            }
        }

        let write = self
            .client
            .put_object()
            .bucket(bucket)
            .key(PROBE_KEY)
            .body(ByteStream::from_static(PROBE_BODY.as_bytes()))
            .content_type("text/plain")
            .send()
            .await;
        if let Err(e) = write {
            let (code, message) = error_parts(&e);
            outcomes.push(CheckOutcome::fail(name("write"), format!("{code} - {message}")));
            return outcomes;
        }
        outcomes.push(CheckOutcome::pass(name("write"), "can write objects"));

        match self
            .client
            .delete_object()
            .bucket(bucket)
            .key(PROBE_KEY)
            .send()
            .await
        {
            Ok(_) => outcomes.push(CheckOutcome::pass(name("delete"), "can delete objects")),
            Err(e) => {
                let (code, message) = error_parts(&e);
                outcomes.push(CheckOutcome::fail(name("delete"), format!("{code} - {message}")));
            }
        }
        outcomes
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn put_object(&self, request: PutObjectRequest) -> Result<(), PipelineError> {
        let PutObjectRequest {
            bucket,
            key,
            body,
            content_type,
            cache_control,
            metadata,
        } = request;

        let mut put = self
            .client
            .put_object()
            .bucket(&bucket)
            .key(&key)
            .body(ByteStream::from(body))
            .content_type(content_type)
            .cache_control(cache_control);
        for (name, value) in metadata {
            put = put.metadata(name, value);
        }

        match put.send().await {
            Ok(_) => {
                tracing::info!(bucket = %bucket, key = %key, "Uploaded to S3");
                Ok(())
            }
            Err(e) => {
                let (code, message) = error_parts(&e);
                tracing::error!(bucket = %bucket, key = %key, code = %code, error = %message, "S3 upload error");
                Err(PipelineError::Upload { code, message })
            }
        }
    }
}
