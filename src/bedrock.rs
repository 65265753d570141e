//! Amazon Bedrock implementation of the core [`ModelRuntime`] seam.
//!
//! Request bodies arrive fully built by the core generation client; this module
//! only performs the `InvokeModel` call and maps SDK failures to
//! [`PipelineError::Generation`].

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_bedrockruntime::primitives::Blob;
use aws_sdk_bedrockruntime::Client;
use prompt_deploy_core::contract::{InvokeRequest, ModelRuntime};
use prompt_deploy_core::PipelineError;

use crate::aws::error_parts;

pub struct BedrockRuntime {
    client: Client,
}

impl BedrockRuntime {
    pub fn new(sdk_config: &SdkConfig) -> Self {
        tracing::info!(
            region = ?sdk_config.region(),
            "Initialized Bedrock runtime client"
        );
        Self {
            client: Client::new(sdk_config),
        }
    }
}

#[async_trait]
impl ModelRuntime for BedrockRuntime {
    async fn invoke_model(&self, request: InvokeRequest) -> Result<Vec<u8>, PipelineError> {
        let result = self
            .client
            .invoke_model()
            .model_id(&request.model_id)
            .content_type("application/json")
            .accept("application/json")
            .body(Blob::new(request.body))
            .send()
            .await;

        match result {
            Ok(output) => {
                let body = output.body().as_ref().to_vec();
                tracing::debug!(model_id = %request.model_id, bytes = body.len(), "Bedrock responded");
                Ok(body)
            }
            Err(e) => {
                let (code, message) = error_parts(&e);
                tracing::error!(model_id = %request.model_id, code = %code, error = %message, "Bedrock API error");
                Err(PipelineError::Generation { code, message })
            }
        }
    }
}
