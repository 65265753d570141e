//! Path confinement: every file the pipeline reads or writes must resolve
//! inside a designated root directory.
//!
//! Resolution follows symlinks for the part of the path that exists and keeps
//! the non-existent remainder lexically, so a missing file inside the root
//! still confines cleanly and is reported later by the loader as not found.
//! A `..` after a missing component pops it and filesystem resolution resumes
//! from there. Containment is checked per path component: `/base-evil`
//! is not inside `/base`.

use std::env;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use tracing::{debug, error};

use crate::error::{PipelineError, Result};

/// Resolves `candidate` and `base` and returns the resolved candidate if it lies
/// within the resolved base.
pub fn validate(candidate: &Path, base: &Path) -> Result<PathBuf> {
    let traversal = || PipelineError::PathTraversal {
        path: candidate.to_path_buf(),
        base: base.to_path_buf(),
    };

    let resolved_base = resolve(base).map_err(|e| {
        error!(base = %base.display(), error = %e, "Failed to resolve base directory");
        traversal()
    })?;
    let resolved = resolve(candidate).map_err(|e| {
        error!(path = %candidate.display(), error = %e, "Failed to resolve path");
        traversal()
    })?;

    if !resolved.starts_with(&resolved_base) {
        error!(
            path = %candidate.display(),
            base = %base.display(),
            "Path traversal attempt detected"
        );
        return Err(traversal());
    }

    debug!(path = %resolved.display(), "Path confined");
    Ok(resolved)
}

/// Absolute, symlink-free form of `path`. Components past the first
/// non-existent one are appended without touching the filesystem.
pub fn resolve(path: &Path) -> io::Result<PathBuf> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        env::current_dir()?.join(path)
    };

    let mut resolved = PathBuf::new();
    let mut on_disk = true;
    for component in absolute.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => resolved.push(component),
            Component::CurDir => {}
            Component::ParentDir => {
                resolved.pop();
                // The parent may exist again; keep following symlinks.
                on_disk = true;
            }
            Component::Normal(part) => {
                resolved.push(part);
                if !on_disk {
                    continue;
                }
                match fs::canonicalize(&resolved) {
                    Ok(real) => resolved = real,
                    // A dangling symlink still has metadata of its own.
                    Err(e)
                        if e.kind() == io::ErrorKind::NotFound
                            && fs::symlink_metadata(&resolved).is_err() =>
                    {
                        on_disk = false;
                    }
                    Err(e) => return Err(e),
                }
            }
        }
    }
    Ok(resolved)
}
