//! Model-family specific request building and response parsing.
//!
//! Supported families are a closed set ([`ModelFamily`]); each one owns its
//! request shape and response extractor. A model id that matches no family is
//! rejected before any network call.

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::config::ModelParams;
use crate::contract::{InvokeRequest, ModelRuntime};
use crate::error::{PipelineError, Result};

pub const DEFAULT_MODEL_ID: &str = "anthropic.claude-3-sonnet-20240229-v1:0";
pub const ANTHROPIC_VERSION: &str = "bedrock-2023-05-31";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFamily {
    /// Messages API: `content[0].text`.
    AnthropicClaude,
    /// Text generation API: `results[0].outputText`.
    AmazonTitan,
}

impl ModelFamily {
    pub const ALL: [ModelFamily; 2] = [ModelFamily::AnthropicClaude, ModelFamily::AmazonTitan];

    /// Substring of a model id that selects this family.
    pub fn marker(&self) -> &'static str {
        match self {
            ModelFamily::AnthropicClaude => "anthropic.claude",
            ModelFamily::AmazonTitan => "amazon.titan",
        }
    }

    pub fn detect(model_id: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|family| model_id.contains(family.marker()))
            .ok_or_else(|| PipelineError::UnsupportedModel(model_id.to_string()))
    }

    pub fn request_body(&self, prompt: &str, params: &ModelParams) -> Result<Vec<u8>> {
        let body = match self {
            ModelFamily::AnthropicClaude => serde_json::to_vec(&ClaudeRequest {
                anthropic_version: ANTHROPIC_VERSION,
                max_tokens: params.max_tokens,
                temperature: params.temperature,
                top_p: params.top_p,
                messages: [ClaudeMessage {
                    role: "user",
                    content: prompt,
                }],
            }),
            ModelFamily::AmazonTitan => serde_json::to_vec(&TitanRequest {
                input_text: prompt,
                text_generation_config: TitanGenerationConfig {
                    max_token_count: params.max_tokens,
                    temperature: params.temperature,
                    top_p: params.top_p,
                },
            }),
        };
        body.map_err(|e| PipelineError::Generation {
            code: "InvalidRequest".into(),
            message: e.to_string(),
        })
    }

    pub fn extract_text(&self, body: &[u8]) -> Result<String> {
        let text = match self {
            ModelFamily::AnthropicClaude => serde_json::from_slice::<ClaudeResponse>(body)
                .map(|r| r.content.into_iter().next().map(|c| c.text)),
            ModelFamily::AmazonTitan => serde_json::from_slice::<TitanResponse>(body)
                .map(|r| r.results.into_iter().next().map(|c| c.output_text)),
        };
        match text {
            Ok(Some(text)) => Ok(text),
            Ok(None) => Err(malformed_response("response contained no generated text")),
            Err(e) => Err(malformed_response(e.to_string())),
        }
    }
}

fn malformed_response(message: impl Into<String>) -> PipelineError {
    PipelineError::Generation {
        code: "MalformedResponse".into(),
        message: message.into(),
    }
}

#[derive(Serialize)]
struct ClaudeRequest<'a> {
    anthropic_version: &'static str,
    max_tokens: u32,
    temperature: f64,
    top_p: f64,
    messages: [ClaudeMessage<'a>; 1],
}

#[derive(Serialize)]
struct ClaudeMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ClaudeResponse {
    content: Vec<ClaudeContent>,
}

#[derive(Deserialize)]
struct ClaudeContent {
    text: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TitanRequest<'a> {
    input_text: &'a str,
    text_generation_config: TitanGenerationConfig,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TitanGenerationConfig {
    max_token_count: u32,
    temperature: f64,
    top_p: f64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TitanResponse {
    results: Vec<TitanResult>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TitanResult {
    output_text: String,
}

/// Turns a rendered prompt into generated text through a [`ModelRuntime`].
pub struct GenerationClient<R> {
    runtime: R,
    default_model_id: String,
}

impl<R: ModelRuntime> GenerationClient<R> {
    pub fn new(runtime: R) -> Self {
        Self {
            runtime,
            default_model_id: DEFAULT_MODEL_ID.to_string(),
        }
    }

    pub async fn invoke(
        &self,
        prompt: &str,
        model_id: Option<&str>,
        params: Option<&ModelParams>,
    ) -> Result<String> {
        let model_id = model_id.unwrap_or(self.default_model_id.as_str());
        let params = params.copied().unwrap_or_default();
        let family = ModelFamily::detect(model_id).map_err(|e| {
            error!(model_id, "Unsupported model family");
            e
        })?;

        let body = family.request_body(prompt, &params)?;
        info!(model_id, ?family, max_tokens = params.max_tokens, "Invoking model");

        let response = self
            .runtime
            .invoke_model(InvokeRequest {
                model_id: model_id.to_string(),
                body,
            })
            .await
            .map_err(|e| {
                error!(model_id, error = %e, "Model invocation failed");
                e
            })?;

        let text = family.extract_text(&response)?;
        info!(model_id, bytes = text.len(), "Model returned generated text");
        Ok(text)
    }
}
