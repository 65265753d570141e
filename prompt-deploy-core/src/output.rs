//! Writes generated content to the local outputs directory.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{error, info};

use crate::config::OutputFormat;
use crate::error::{PipelineError, Result};
use crate::paths;

pub const MAX_OUTPUT_SIZE: u64 = 10 * 1024 * 1024;

const HTML_HEAD: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Generated Content</title>
    <style>
        body {
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, Oxygen, Ubuntu, Cantarell, sans-serif;
            line-height: 1.6;
            max-width: 800px;
            margin: 0 auto;
            padding: 20px;
            color: #333;
        }
        pre {
            background: #f4f4f4;
            border: 1px solid #ddd;
            border-radius: 4px;
            padding: 15px;
            overflow-x: auto;
        }
        code {
            background: #f4f4f4;
            padding: 2px 6px;
            border-radius: 3px;
        }
    </style>
</head>
<body>
"#;

const HTML_TAIL: &str = "\n</body>\n</html>";

/// True when `content` already is a full HTML document.
pub fn is_html_document(content: &str) -> bool {
    let trimmed = content.trim_start();
    trimmed.starts_with("<!DOCTYPE") || trimmed.starts_with("<html")
}

/// Embeds `content` unchanged in a minimal standalone HTML page.
pub fn wrap_html(content: &str) -> String {
    let mut page = String::with_capacity(HTML_HEAD.len() + content.len() + HTML_TAIL.len());
    page.push_str(HTML_HEAD);
    page.push_str(content);
    page.push_str(HTML_TAIL);
    page
}

/// Writes outputs confined to a single root directory.
#[derive(Debug, Clone)]
pub struct OutputWriter {
    root: PathBuf,
}

impl OutputWriter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Writes `content` to `path`, replacing any existing file. Returns the
    /// resolved path that was written.
    pub fn write(&self, content: &str, path: &Path, format: OutputFormat) -> Result<PathBuf> {
        let confined = paths::validate(path, &self.root)?;

        let document = match format {
            OutputFormat::Html if !is_html_document(content) => wrap_html(content),
            _ => content.to_string(),
        };
        let size = document.len() as u64;
        if size > MAX_OUTPUT_SIZE {
            error!(size, limit = MAX_OUTPUT_SIZE, "Generated output too large");
            return Err(PipelineError::SizeExceeded {
                what: format!("output {}", path.display()),
                size,
                limit: MAX_OUTPUT_SIZE,
            });
        }

        if let Some(parent) = confined.parent() {
            fs::create_dir_all(parent).map_err(|e| PipelineError::from_io(parent, e))?;
        }
        fs::write(&confined, document.as_bytes()).map_err(|e| {
            error!(error = %e, path = %confined.display(), "Failed to write output");
            PipelineError::from_io(&confined, e)
        })?;

        info!(path = %confined.display(), bytes = size, %format, "Saved output");
        Ok(confined)
    }
}
