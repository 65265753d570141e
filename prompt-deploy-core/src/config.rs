//! `config` module: loads one prompt configuration record from a JSON file.
//!
//! This is the only place where untrusted JSON is parsed into the strongly
//! typed [`PromptConfig`]. Loading is all-or-nothing:
//!
//! 1. the file path is confined under the prompts root,
//! 2. the text is parsed as JSON ([`PipelineError::MalformedConfig`]),
//! 3. the object is checked against the schema: required fields, filename and
//!    output-name patterns, the output format enum and model parameter ranges
//!    ([`PipelineError::SchemaValidation`]),
//! 4. the number of variables is capped at [`MAX_VARIABLES`]
//!    ([`PipelineError::LimitExceeded`]).

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info};

use crate::error::{PipelineError, Result};
use crate::paths;

pub const MAX_VARIABLES: usize = 50;
pub const MAX_TOKENS_LIMIT: i64 = 100_000;

pub const DEFAULT_MAX_TOKENS: u32 = 2048;
pub const DEFAULT_TEMPERATURE: f64 = 0.7;
pub const DEFAULT_TOP_P: f64 = 0.9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Html,
    Md,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Html => "html",
            OutputFormat::Md => "md",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Sampling parameters sent with every generation request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ModelParams {
    pub max_tokens: u32,
    pub temperature: f64,
    pub top_p: f64,
}

impl Default for ModelParams {
    fn default() -> Self {
        Self {
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            top_p: DEFAULT_TOP_P,
        }
    }
}

/// A validated prompt configuration. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PromptConfig {
    /// Template file name inside the templates root, e.g. `welcome.txt`.
    pub template: String,
    /// Base name for the output file and remote key.
    pub output_name: String,
    pub output_format: OutputFormat,
    /// `None` selects the generation client's default model.
    pub model_id: Option<String>,
    pub model_params: ModelParams,
    pub variables: BTreeMap<String, String>,
}

impl PromptConfig {
    /// `<output_name>.<format>`
    pub fn output_file_name(&self) -> String {
        format!("{}.{}", self.output_name, self.output_format.extension())
    }

    /// Validates an already parsed JSON document. Exposed separately from
    /// [`ConfigLoader::load`] so callers holding JSON in memory skip the filesystem.
    pub fn from_json(value: Value) -> Result<Self> {
        if !value.is_object() {
            return Err(PipelineError::SchemaValidation(
                "configuration must be a JSON object".into(),
            ));
        }
        let raw: RawPromptConfig = serde_json::from_value(value)
            .map_err(|e| PipelineError::SchemaValidation(e.to_string()))?;
        let config = raw.validate()?;

        if config.variables.len() > MAX_VARIABLES {
            return Err(PipelineError::LimitExceeded {
                what: "variables",
                actual: config.variables.len(),
                limit: MAX_VARIABLES,
            });
        }
        Ok(config)
    }
}

#[derive(Debug, Deserialize)]
struct RawPromptConfig {
    template: String,
    output_name: String,
    #[serde(default)]
    output_format: Option<OutputFormat>,
    #[serde(default)]
    model_id: Option<String>,
    #[serde(default)]
    model_params: RawModelParams,
    variables: serde_json::Map<String, Value>,
}

#[derive(Debug, Default, Deserialize)]
struct RawModelParams {
    max_tokens: Option<i64>,
    temperature: Option<f64>,
    top_p: Option<f64>,
}

fn template_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-zA-Z0-9_-]+\.txt$").expect("template pattern is valid"))
}

fn output_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-zA-Z0-9_-]+$").expect("output name pattern is valid"))
}

fn schema_error(message: impl Into<String>) -> PipelineError {
    PipelineError::SchemaValidation(message.into())
}

impl RawPromptConfig {
    fn validate(self) -> Result<PromptConfig> {
        if !template_pattern().is_match(&self.template) {
            return Err(schema_error(format!(
                "'template' {:?} does not match ^[a-zA-Z0-9_-]+\\.txt$",
                self.template
            )));
        }
        if !output_name_pattern().is_match(&self.output_name) {
            return Err(schema_error(format!(
                "'output_name' {:?} does not match ^[a-zA-Z0-9_-]+$",
                self.output_name
            )));
        }

        let defaults = ModelParams::default();
        let max_tokens = match self.model_params.max_tokens {
            Some(n) if (1..=MAX_TOKENS_LIMIT).contains(&n) => n as u32,
            Some(n) => {
                return Err(schema_error(format!(
                    "'model_params.max_tokens' {n} is outside 1..={MAX_TOKENS_LIMIT}"
                )))
            }
            None => defaults.max_tokens,
        };
        let temperature = unit_interval("temperature", self.model_params.temperature)?
            .unwrap_or(defaults.temperature);
        let top_p = unit_interval("top_p", self.model_params.top_p)?.unwrap_or(defaults.top_p);

        let mut variables = BTreeMap::new();
        for (name, value) in self.variables {
            let text = match value {
                Value::String(s) => s,
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                other => {
                    return Err(schema_error(format!(
                        "variable {name:?} must be a string, number or boolean, got {other}"
                    )))
                }
            };
            variables.insert(name, text);
        }

        Ok(PromptConfig {
            template: self.template,
            output_name: self.output_name,
            output_format: self.output_format.unwrap_or_default(),
            model_id: self.model_id,
            model_params: ModelParams {
                max_tokens,
                temperature,
                top_p,
            },
            variables,
        })
    }
}

fn unit_interval(field: &str, value: Option<f64>) -> Result<Option<f64>> {
    match value {
        Some(v) if (0.0..=1.0).contains(&v) => Ok(Some(v)),
        Some(v) => Err(schema_error(format!(
            "'model_params.{field}' {v} is outside 0..=1"
        ))),
        None => Ok(None),
    }
}

/// Loads prompt configurations confined to a single root directory.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    root: PathBuf,
}

impl ConfigLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn load(&self, path: &Path) -> Result<PromptConfig> {
        let confined = paths::validate(path, &self.root)?;
        info!(config_path = %confined.display(), "Loading configuration from file");

        let content = fs::read_to_string(&confined).map_err(|e| {
            error!(error = %e, config_path = %confined.display(), "Failed to read config file");
            PipelineError::from_io(path, e)
        })?;

        let value: Value = serde_json::from_str(&content).map_err(|e| {
            error!(error = %e, config_path = %confined.display(), "Invalid JSON in configuration file");
            PipelineError::MalformedConfig {
                path: path.to_path_buf(),
                source: e,
            }
        })?;

        match PromptConfig::from_json(value) {
            Ok(config) => {
                info!(
                    config_path = %confined.display(),
                    template = %config.template,
                    variables = config.variables.len(),
                    "Configuration loaded and validated successfully"
                );
                Ok(config)
            }
            Err(e) => {
                error!(error = %e, config_path = %confined.display(), "Configuration validation failed");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_apply_when_optional_fields_are_absent() {
        let config = PromptConfig::from_json(json!({
            "template": "welcome.txt",
            "output_name": "welcome",
            "variables": {}
        }))
        .unwrap();

        assert_eq!(config.output_format, OutputFormat::Html);
        assert_eq!(config.model_id, None);
        assert_eq!(config.model_params, ModelParams::default());
        assert_eq!(config.output_file_name(), "welcome.html");
    }

    #[test]
    fn partial_model_params_fill_from_defaults() {
        let config = PromptConfig::from_json(json!({
            "template": "a.txt",
            "output_name": "a",
            "model_params": { "max_tokens": 512 },
            "variables": {}
        }))
        .unwrap();

        assert_eq!(config.model_params.max_tokens, 512);
        assert_eq!(config.model_params.temperature, DEFAULT_TEMPERATURE);
        assert_eq!(config.model_params.top_p, DEFAULT_TOP_P);
    }

    #[test]
    fn scalar_variables_are_stringified() {
        let config = PromptConfig::from_json(json!({
            "template": "a.txt",
            "output_name": "a",
            "variables": { "year": 2024, "draft": false, "name": "Ada" }
        }))
        .unwrap();

        assert_eq!(config.variables["year"], "2024");
        assert_eq!(config.variables["draft"], "false");
        assert_eq!(config.variables["name"], "Ada");
    }

    #[test]
    fn nested_variable_values_are_rejected() {
        let err = PromptConfig::from_json(json!({
            "template": "a.txt",
            "output_name": "a",
            "variables": { "list": [1, 2] }
        }))
        .unwrap_err();
        assert!(matches!(err, PipelineError::SchemaValidation(_)));
    }

    #[test]
    fn non_object_documents_are_rejected() {
        let err = PromptConfig::from_json(json!(["template.txt"])).unwrap_err();
        assert!(matches!(err, PipelineError::SchemaValidation(_)));
    }

    #[test]
    fn md_format_uses_md_extension() {
        let config = PromptConfig::from_json(json!({
            "template": "a.txt",
            "output_name": "notes",
            "output_format": "md",
            "variables": {}
        }))
        .unwrap();
        assert_eq!(config.output_file_name(), "notes.md");
    }
}
