//! Built-in resource classes backed by the local filesystem
//!
//! Every class keeps its live state in a subdirectory of the state
//! directory, one entry per resource name.

pub mod file;
pub mod link;

use anyhow::{Result, bail};
use fruitkit::ClassBuilder;
use std::path::{Path, PathBuf};

/// Kinds of every built-in class, in registration order
pub const KINDS: &[&str] = &[file::KIND, link::KIND];

/// Builder for the built-in class `kind`, rooted at `state_dir`
pub fn builder(kind: &str, state_dir: &Path) -> Option<ClassBuilder> {
    match kind {
        file::KIND => Some(file::class(state_dir)),
        link::KIND => Some(link::class(state_dir)),
        _ => None,
    }
}

/// Path of the entry for resource `name` inside `dir`
///
/// Names become file names, so they must be a single path component.
pub(crate) fn entry_path(dir: &Path, name: &str) -> Result<PathBuf> {
    if name.is_empty()
        || name == "."
        || name == ".."
        || name.contains('/')
        || name.contains('\\')
    {
        bail!("Invalid resource name for a filesystem entry: {name:?}");
    }
    Ok(dir.join(name))
}
