//! Upload of saved outputs to a remote bucket.
//!
//! [`Target`] holds the validated bucket/region/prefix triple and derives
//! object keys and public URLs from it. [`ObjectStoreUploader`] reads the local
//! file, picks the content type from the key's extension and hands the write
//! to an [`ObjectStore`].

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{error, info};

use crate::contract::{ObjectStore, PutObjectRequest};
use crate::error::{PipelineError, Result};
use crate::names;

pub const CACHE_CONTROL: &str = "max-age=300";
pub const DIGEST_METADATA_KEY: &str = "content-sha256";

/// Where uploads go. Construction is the only place names are validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    region: String,
    bucket: String,
    /// Empty, or ending in exactly one `/`.
    prefix: String,
}

impl Target {
    pub fn new(region: &str, bucket: &str, prefix: &str) -> Result<Self> {
        if !names::is_allowed_region(region) {
            return Err(PipelineError::InvalidTarget(format!(
                "region {region:?} is not one of: {}",
                names::ALLOWED_REGIONS.join(", ")
            )));
        }
        if !names::is_valid_bucket_name(bucket) {
            return Err(PipelineError::InvalidTarget(format!(
                "invalid bucket name: {bucket:?}"
            )));
        }
        if !names::is_valid_prefix(prefix) {
            return Err(PipelineError::InvalidTarget(format!(
                "invalid prefix: {prefix:?}"
            )));
        }

        let trimmed = prefix.trim_end_matches('/');
        let prefix = if trimmed.is_empty() {
            String::new()
        } else {
            format!("{trimmed}/")
        };
        info!(region, bucket, prefix = %prefix, "Upload target configured");
        Ok(Self {
            region: region.to_string(),
            bucket: bucket.to_string(),
            prefix,
        })
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// `<prefix>outputs/<file_name>`
    pub fn key_for(&self, file_name: &str) -> String {
        format!("{}outputs/{}", self.prefix, file_name)
    }

    pub fn url_for(&self, key: &str) -> String {
        format!(
            "https://{}.s3.{}.amazonaws.com/{}",
            self.bucket, self.region, key
        )
    }
}

pub fn content_type_for(key: &str) -> &'static str {
    match Path::new(key).extension().and_then(|ext| ext.to_str()) {
        Some("html") => "text/html",
        Some("md") => "text/markdown",
        _ => "text/plain",
    }
}

/// What an upload produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadReceipt {
    pub key: String,
    pub url: String,
    pub content_type: &'static str,
    pub bytes: usize,
    pub content_sha256: String,
}

pub struct ObjectStoreUploader<S> {
    store: S,
    target: Target,
}

impl<S: ObjectStore> ObjectStoreUploader<S> {
    pub fn new(store: S, target: Target) -> Self {
        Self { store, target }
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub async fn upload(&self, local_path: &Path, remote_key: &str) -> Result<UploadReceipt> {
        let body = fs::read(local_path).map_err(|e| PipelineError::from_io(local_path, e))?;
        let content_type = content_type_for(remote_key);
        let content_sha256 = {
            let mut hasher = Sha256::new();
            hasher.update(&body);
            format!("{:x}", hasher.finalize())
        };
        let bytes = body.len();

        info!(
            bucket = self.target.bucket(),
            key = remote_key,
            content_type,
            bytes,
            "Uploading output"
        );
        let request = PutObjectRequest {
            bucket: self.target.bucket.clone(),
            key: remote_key.to_string(),
            body,
            content_type,
            cache_control: CACHE_CONTROL,
            metadata: BTreeMap::from([(DIGEST_METADATA_KEY.to_string(), content_sha256.clone())]),
        };
        self.store.put_object(request).await.map_err(|e| {
            error!(key = remote_key, error = %e, "Upload failed");
            e
        })?;

        let url = self.target.url_for(remote_key);
        info!(
            uri = %format!("s3://{}/{}", self.target.bucket(), remote_key),
            url = %url,
            "Uploaded output"
        );
        Ok(UploadReceipt {
            key: remote_key.to_string(),
            url,
            content_type,
            bytes,
            content_sha256,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::MockObjectStore;
    use tempfile::tempdir;

    #[test]
    fn content_type_follows_extension() {
        assert_eq!(content_type_for("beta/outputs/report.html"), "text/html");
        assert_eq!(content_type_for("beta/outputs/notes.md"), "text/markdown");
        assert_eq!(content_type_for("beta/outputs/data.csv"), "text/plain");
        assert_eq!(content_type_for("no-extension"), "text/plain");
    }

    #[test]
    fn target_normalises_prefix() {
        let target = Target::new("us-east-1", "test-bucket", "beta").unwrap();
        assert_eq!(target.prefix(), "beta/");
        assert_eq!(target.key_for("a.html"), "beta/outputs/a.html");

        let target = Target::new("us-east-1", "test-bucket", "prod//").unwrap();
        assert_eq!(target.prefix(), "prod/");

        let target = Target::new("us-east-1", "test-bucket", "").unwrap();
        assert_eq!(target.key_for("a.md"), "outputs/a.md");
    }

    #[test]
    fn target_builds_regional_url() {
        let target = Target::new("eu-west-1", "my-bucket", "beta/").unwrap();
        assert_eq!(
            target.url_for("beta/outputs/a.html"),
            "https://my-bucket.s3.eu-west-1.amazonaws.com/beta/outputs/a.html"
        );
    }

    #[test]
    fn target_rejects_invalid_parts() {
        assert!(matches!(
            Target::new("invalid-region", "test-bucket", "beta/"),
            Err(PipelineError::InvalidTarget(ref m)) if m.contains("region")
        ));
        assert!(matches!(
            Target::new("us-east-1", "Invalid_Bucket", "beta/"),
            Err(PipelineError::InvalidTarget(ref m)) if m.contains("bucket")
        ));
        assert!(matches!(
            Target::new("us-east-1", "test-bucket", "../etc/"),
            Err(PipelineError::InvalidTarget(ref m)) if m.contains("prefix")
        ));
    }

    #[tokio::test]
    async fn upload_sets_content_type_cache_control_and_digest() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("report.html");
        fs::write(&file, "abc").unwrap();

        let mut store = MockObjectStore::new();
        store
            .expect_put_object()
            .withf(|req| {
                req.bucket == "test-bucket"
                    && req.key == "beta/outputs/report.html"
                    && req.body == b"abc"
                    && req.content_type == "text/html"
                    && req.cache_control == "max-age=300"
                    && req.metadata[DIGEST_METADATA_KEY]
                        == "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
            })
            .times(1)
            .returning(|_| Ok(()));

        let uploader = ObjectStoreUploader::new(
            store,
            Target::new("us-east-1", "test-bucket", "beta/").unwrap(),
        );
        let receipt = uploader
            .upload(&file, "beta/outputs/report.html")
            .await
            .unwrap();
        assert_eq!(
            receipt.url,
            "https://test-bucket.s3.us-east-1.amazonaws.com/beta/outputs/report.html"
        );
        assert_eq!(receipt.bytes, 3);
    }

    #[tokio::test]
    async fn markdown_and_other_extensions() {
        let dir = tempdir().unwrap();
        for (name, expected) in [("notes.md", "text/markdown"), ("log.txt", "text/plain")] {
            let file = dir.path().join(name);
            fs::write(&file, "x").unwrap();

            let mut store = MockObjectStore::new();
            store
                .expect_put_object()
                .withf(move |req| req.content_type == expected)
                .times(1)
                .returning(|_| Ok(()));

            let uploader = ObjectStoreUploader::new(
                store,
                Target::new("us-east-1", "test-bucket", "").unwrap(),
            );
            let receipt = uploader.upload(&file, &format!("outputs/{name}")).await.unwrap();
            assert_eq!(receipt.content_type, expected);
        }
    }

    #[tokio::test]
    async fn store_failures_surface_as_upload_errors() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("a.md");
        fs::write(&file, "x").unwrap();

        let mut store = MockObjectStore::new();
        store.expect_put_object().returning(|_| {
            Err(PipelineError::Upload {
                code: "AccessDenied".into(),
                message: "denied".into(),
            })
        });

        let uploader = ObjectStoreUploader::new(
            store,
            Target::new("us-east-1", "test-bucket", "beta/").unwrap(),
        );
        let err = uploader.upload(&file, "beta/outputs/a.md").await.unwrap_err();
        assert!(matches!(err, PipelineError::Upload { ref code, .. } if code == "AccessDenied"));
    }
}
