//! Workspace-rooted file operations for action handlers.
//!
//! Every filename the model emits is resolved under a single workspace
//! directory; nothing outside it is touched. Filenames are validated before
//! resolution so a stray absolute path or `..` component cannot escape the
//! root.

use std::fs;
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use tracing::debug;

/// A fixed root directory for all file actions.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the workspace root if it does not exist yet.
    pub fn ensure_exists(&self) -> Result<()> {
        fs::create_dir_all(&self.root)
            .with_context(|| format!("create workspace {}", self.root.display()))
    }

    /// Resolve a model-emitted filename under the root.
    pub fn resolve(&self, filename: &str) -> Result<PathBuf> {
        validate_filename(filename)?;
        Ok(self.root.join(filename))
    }

    /// Write `contents` to `filename`, truncating any existing file and
    /// creating intermediate directories as needed.
    pub fn write_file(&self, filename: &str, contents: &str) -> Result<()> {
        let path = self.resolve(filename)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create directory {}", parent.display()))?;
        }
        fs::write(&path, contents).with_context(|| format!("write {}", path.display()))?;
        debug!(path = %path.display(), bytes = contents.len(), "wrote file");
        Ok(())
    }

    /// Read `filename` if it exists, returning `None` for a missing file.
    pub fn read_file(&self, filename: &str) -> Result<Option<String>> {
        let path = self.resolve(filename)?;
        if !path.is_file() {
            return Ok(None);
        }
        let contents =
            fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
        Ok(Some(contents))
    }
}

/// Reject filenames that would resolve outside the workspace root.
fn validate_filename(filename: &str) -> Result<()> {
    if filename.trim().is_empty() {
        return Err(anyhow!("filename must not be empty"));
    }
    let path = Path::new(filename);
    if path.is_absolute() {
        return Err(anyhow!("filename must be relative (got '{filename}')"));
    }
    if path
        .components()
        .any(|c| matches!(c, Component::ParentDir))
    {
        return Err(anyhow!("filename must not contain '..' (got '{filename}')"));
    }
    Ok(())
}
