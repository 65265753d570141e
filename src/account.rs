//! Account-level AWS lookups used by `prompt-deploy check`: who the
//! credentials belong to, and which foundation models Bedrock offers.

use async_trait::async_trait;
use aws_config::SdkConfig;

use crate::aws::error_parts;

/// Owner of the credentials, as reported by STS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    pub account: String,
    pub arn: String,
}

/// A failed AWS call, reduced to its error code and message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceError {
    pub code: String,
    pub message: String,
}

impl ServiceError {
    fn from_sdk<E>(err: &E) -> Self
    where
        E: aws_sdk_s3::error::ProvideErrorMetadata + std::error::Error + 'static,
    {
        let (code, message) = error_parts(err);
        Self { code, message }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AccountInspector: Send + Sync {
    async fn caller_identity(&self) -> Result<CallerIdentity, ServiceError>;

    /// Ids of every foundation model visible in the configured region.
    async fn foundation_model_ids(&self) -> Result<Vec<String>, ServiceError>;
}

pub struct AwsAccount {
    sts: aws_sdk_sts::Client,
    bedrock: aws_sdk_bedrock::Client,
}

impl AwsAccount {
    pub fn new(sdk_config: &SdkConfig) -> Self {
        Self {
            sts: aws_sdk_sts::Client::new(sdk_config),
            bedrock: aws_sdk_bedrock::Client::new(sdk_config),
        }
    }
}

#[async_trait]
impl AccountInspector for AwsAccount {
    async fn caller_identity(&self) -> Result<CallerIdentity, ServiceError> {
        let output = self.sts.get_caller_identity().send().await.map_err(|e| {
            let err = ServiceError::from_sdk(&e);
            tracing::error!(code = %err.code, error = %err.message, "STS GetCallerIdentity failed");
            err
        })?;
        Ok(CallerIdentity {
            account: output.account().unwrap_or_default().to_string(),
            arn: output.arn().unwrap_or_default().to_string(),
        })
    }

    async fn foundation_model_ids(&self) -> Result<Vec<String>, ServiceError> {
        let output = self
            .bedrock
            .list_foundation_models()
            .send()
            .await
            .map_err(|e| {
                let err = ServiceError::from_sdk(&e);
                tracing::error!(code = %err.code, error = %err.message, "Bedrock ListFoundationModels failed");
                err
            })?;
        Ok(output
            .model_summaries()
            .iter()
            .map(|m| m.model_id().to_string())
            .collect())
    }
}
