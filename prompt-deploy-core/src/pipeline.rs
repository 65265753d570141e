//! High-level pipeline: orchestrates config → template → render → generate → save → upload.
//!
//! Each prompt configuration record moves through the [`Stage`]s in order and
//! ends either as a [`ProcessingResult`] or as a [`RecordFailure`] carrying the
//! stage that failed and the originating [`PipelineError`].
//!
//! # Responsibilities
//! - Sequential processing: records in a batch are handled one after another,
//!   each network call completes before the next step starts
//! - Failure isolation: a failed record is reported and the batch moves on
//! - Logging: every record runs inside a `record` span that is a child of the
//!   span handed to [`Pipeline::new`]
//!
//! # Navigation
//! - Entrypoints: [`Pipeline::process`], [`Pipeline::process_batch`]
//! - Supporting types: [`Layout`], [`BatchReport`]

use std::borrow::Cow;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use tracing::{debug, error, info, info_span, warn, Instrument, Span};

use crate::config::ConfigLoader;
use crate::contract::{ModelRuntime, ObjectStore};
use crate::error::PipelineError;
use crate::generation::GenerationClient;
use crate::output::OutputWriter;
use crate::template::{self, TemplateLoader};
use crate::uploader::ObjectStoreUploader;

pub const PROMPTS_DIR: &str = "prompts";
pub const TEMPLATES_DIR: &str = "prompt_templates";
pub const OUTPUTS_DIR: &str = "outputs";

/// Characters of rendered prompts and generated text shown in logs.
pub const PREVIEW_CHARS: usize = 500;

/// The three directories a pipeline reads from and writes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub prompts_dir: PathBuf,
    pub templates_dir: PathBuf,
    pub outputs_dir: PathBuf,
}

impl Layout {
    /// `<root>/prompts`, `<root>/prompt_templates` and `<root>/outputs`.
    pub fn rooted_at(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            prompts_dir: root.join(PROMPTS_DIR),
            templates_dir: root.join(TEMPLATES_DIR),
            outputs_dir: root.join(OUTPUTS_DIR),
        }
    }

    pub fn dirs(&self) -> [&Path; 3] {
        [&self.prompts_dir, &self.templates_dir, &self.outputs_dir]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    LoadConfig,
    LoadTemplate,
    Render,
    Invoke,
    Write,
    Upload,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Failed,
}

/// Outcome of one successfully processed record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessingResult {
    pub config_path: PathBuf,
    pub output_path: PathBuf,
    pub remote_key: String,
    pub remote_url: String,
    pub content_sha256: String,
    pub status: Status,
}

#[derive(Debug)]
pub struct RecordFailure {
    pub config_path: PathBuf,
    pub stage: Stage,
    pub error: PipelineError,
}

impl Serialize for RecordFailure {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("RecordFailure", 5)?;
        state.serialize_field("config_path", &self.config_path)?;
        state.serialize_field("stage", &self.stage)?;
        state.serialize_field("error_kind", self.error.kind())?;
        state.serialize_field("error", &self.error.to_string())?;
        state.serialize_field("status", &Status::Failed)?;
        state.end()
    }
}

/// Results of a batch, in input order within each list.
#[derive(Debug, Default, Serialize)]
pub struct BatchReport {
    pub succeeded: Vec<ProcessingResult>,
    pub failed: Vec<RecordFailure>,
}

impl BatchReport {
    pub fn success_count(&self) -> usize {
        self.succeeded.len()
    }

    pub fn failure_count(&self) -> usize {
        self.failed.len()
    }

    pub fn urls(&self) -> impl Iterator<Item = &str> {
        self.succeeded.iter().map(|r| r.remote_url.as_str())
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }
}

/// `text` cut to `max_chars` characters, with `...` appended when cut.
pub fn preview(text: &str, max_chars: usize) -> Cow<'_, str> {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => Cow::Owned(format!("{}...", &text[..idx])),
        None => Cow::Borrowed(text),
    }
}

fn failed_at(config_path: &Path, stage: Stage) -> impl FnOnce(PipelineError) -> RecordFailure + '_ {
    move |error| RecordFailure {
        config_path: config_path.to_path_buf(),
        stage,
        error,
    }
}

pub struct Pipeline<R, S> {
    configs: ConfigLoader,
    templates: TemplateLoader,
    writer: OutputWriter,
    generator: GenerationClient<R>,
    uploader: ObjectStoreUploader<S>,
    span: Span,
}

impl<R, S> Pipeline<R, S>
where
    R: ModelRuntime,
    S: ObjectStore,
{
    /// `span` is the parent of every per-record span this pipeline opens.
    pub fn new(
        layout: &Layout,
        generator: GenerationClient<R>,
        uploader: ObjectStoreUploader<S>,
        span: Span,
    ) -> Self {
        Self {
            configs: ConfigLoader::new(&layout.prompts_dir),
            templates: TemplateLoader::new(&layout.templates_dir),
            writer: OutputWriter::new(&layout.outputs_dir),
            generator,
            uploader,
            span,
        }
    }

    /// Runs one configuration record through every stage.
    pub async fn process(&self, config_path: &Path) -> Result<ProcessingResult, RecordFailure> {
        let span = info_span!(parent: &self.span, "record", config = %config_path.display());
        self.run_record(config_path).instrument(span).await
    }

    async fn run_record(&self, config_path: &Path) -> Result<ProcessingResult, RecordFailure> {
        info!("Starting prompt processing");

        let config = self
            .configs
            .load(config_path)
            .map_err(failed_at(config_path, Stage::LoadConfig))?;

        let template_path = self.templates.root().join(&config.template);
        let template = self
            .templates
            .load(&template_path)
            .map_err(failed_at(config_path, Stage::LoadTemplate))?;

        let used: BTreeSet<&str> = template::placeholders(template.as_str()).into_iter().collect();
        let unused: Vec<&str> = config
            .variables
            .keys()
            .map(String::as_str)
            .filter(|name| !used.contains(name))
            .collect();
        if !unused.is_empty() {
            warn!(?unused, "Variables not referenced by template");
        }

        let prompt = template
            .render(&config.variables)
            .map_err(failed_at(config_path, Stage::Render))?;
        debug!(prompt = %preview(&prompt, PREVIEW_CHARS), "Rendered prompt");

        let generated = self
            .generator
            .invoke(&prompt, config.model_id.as_deref(), Some(&config.model_params))
            .await
            .map_err(failed_at(config_path, Stage::Invoke))?;
        debug!(content = %preview(&generated, PREVIEW_CHARS), "Generated content");

        let file_name = config.output_file_name();
        let output_path = self
            .writer
            .write(
                &generated,
                &self.writer.root().join(&file_name),
                config.output_format,
            )
            .map_err(failed_at(config_path, Stage::Write))?;

        let remote_key = self.uploader.target().key_for(&file_name);
        let receipt = self
            .uploader
            .upload(&output_path, &remote_key)
            .await
            .map_err(failed_at(config_path, Stage::Upload))?;

        info!(url = %receipt.url, "Prompt processed successfully");
        Ok(ProcessingResult {
            config_path: config_path.to_path_buf(),
            output_path,
            remote_key: receipt.key,
            remote_url: receipt.url,
            content_sha256: receipt.content_sha256,
            status: Status::Success,
        })
    }

    /// Processes every record in order. A failing record never stops the batch.
    pub async fn process_batch<P: AsRef<Path>>(&self, config_paths: &[P]) -> BatchReport {
        let mut report = BatchReport::default();

        for config_path in config_paths {
            let config_path = config_path.as_ref();
            match self.process(config_path).await {
                Ok(result) => {
                    info!(parent: &self.span, config = %config_path.display(), "Record succeeded");
                    report.succeeded.push(result);
                }
                Err(failure) => {
                    error!(
                        parent: &self.span,
                        config = %config_path.display(),
                        stage = ?failure.stage,
                        error_kind = failure.error.kind(),
                        error = %failure.error,
                        "Record failed"
                    );
                    report.failed.push(failure);
                }
            }
        }

        info!(
            parent: &self.span,
            succeeded = report.success_count(),
            failed = report.failure_count(),
            "Batch complete"
        );
        report
    }
}
