//! Prompt templates: loading from disk and `$name` / `${name}` substitution.
//!
//! Substitution is a single left-to-right pass. Identifiers are ASCII letters,
//! digits and underscores, not starting with a digit. Inserted values are never
//! rescanned, and a `$` that does not open a valid placeholder is copied as-is.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, error, info};

use crate::error::{PipelineError, Result};
use crate::paths;

pub const MAX_TEMPLATE_SIZE: u64 = 100 * 1024;

/// Raw template text, as read from disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    content: String,
}

impl Template {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.content
    }

    pub fn render(&self, variables: &BTreeMap<String, String>) -> Result<String> {
        render(&self.content, variables)
    }
}

/// Substitutes every placeholder in `template`.
///
/// Fails with [`PipelineError::MissingVariable`] naming the first placeholder
/// (in reading order) that has no entry in `variables`.
pub fn render(template: &str, variables: &BTreeMap<String, String>) -> Result<String> {
    let mut rendered = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(pos) = rest.find('$') {
        rendered.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];
        match placeholder(after) {
            Some((name, consumed)) => {
                let value = variables.get(name).ok_or_else(|| {
                    error!(variable = name, "Missing required variable");
                    PipelineError::MissingVariable(name.to_string())
                })?;
                rendered.push_str(value);
                rest = &after[consumed..];
            }
            None => {
                rendered.push('$');
                rest = after;
            }
        }
    }
    rendered.push_str(rest);

    debug!(bytes = rendered.len(), "Template rendered successfully");
    Ok(rendered)
}

/// Placeholder names in reading order, duplicates included.
pub fn placeholders(template: &str) -> Vec<&str> {
    let mut names = Vec::new();
    let mut rest = template;
    while let Some(pos) = rest.find('$') {
        let after = &rest[pos + 1..];
        match placeholder(after) {
            Some((name, consumed)) => {
                names.push(name);
                rest = &after[consumed..];
            }
            None => rest = after,
        }
    }
    names
}

/// Parses the text following a `$`; returns the identifier and how many bytes it spans.
fn placeholder(after: &str) -> Option<(&str, usize)> {
    if let Some(braced) = after.strip_prefix('{') {
        let len = identifier_len(braced);
        if len > 0 && braced[len..].starts_with('}') {
            return Some((&braced[..len], len + 2));
        }
        return None;
    }
    let len = identifier_len(after);
    (len > 0).then(|| (&after[..len], len))
}

fn identifier_len(s: &str) -> usize {
    let bytes = s.as_bytes();
    match bytes.first() {
        Some(b) if b.is_ascii_alphabetic() || *b == b'_' => {}
        _ => return 0,
    }
    bytes
        .iter()
        .take_while(|b| b.is_ascii_alphanumeric() || **b == b'_')
        .count()
}

/// Reads templates confined to a single root directory.
#[derive(Debug, Clone)]
pub struct TemplateLoader {
    root: PathBuf,
}

impl TemplateLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn load(&self, path: &Path) -> Result<Template> {
        let confined = paths::validate(path, &self.root)?;
        info!(template = %confined.display(), "Loading template");

        let size = fs::metadata(&confined)
            .map_err(|e| {
                error!(error = %e, template = %confined.display(), "Template not readable");
                PipelineError::from_io(path, e)
            })?
            .len();
        if size > MAX_TEMPLATE_SIZE {
            error!(size, limit = MAX_TEMPLATE_SIZE, "Template too large");
            return Err(PipelineError::SizeExceeded {
                what: format!("template {}", path.display()),
                size,
                limit: MAX_TEMPLATE_SIZE,
            });
        }

        let content = fs::read_to_string(&confined).map_err(|e| PipelineError::from_io(path, e))?;
        info!(bytes = content.len(), "Template loaded successfully");
        Ok(Template::new(content))
    }
}
