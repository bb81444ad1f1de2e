//! The transient concat list.
//!
//! The list exists only for the duration of one concat invocation: it is
//! written right before the engine starts and removed once the engine has
//! settled, whatever the outcome.

use std::future::Future;
use std::path::{Path, PathBuf};

use clipchain_common::error::{ClipchainError, ClipchainResult};

/// A concat list file on disk. Removed by [`ConcatList::release`], or on drop
/// as a fallback when the owning future is dropped mid-flight.
#[derive(Debug)]
pub struct ConcatList {
    path: PathBuf,
    released: bool,
}

impl ConcatList {
    /// Write `inputs` to `list_path`, one quoted absolute path per line, in order.
    ///
    /// Every input must already exist.
    pub fn create(list_path: &Path, inputs: &[PathBuf]) -> ClipchainResult<Self> {
        let content = render_concat_list(inputs)?;
        std::fs::write(list_path, content).map_err(|e| ClipchainError::filesystem(list_path, e))?;
        tracing::debug!(path = %list_path.display(), entries = inputs.len(), "Concat list written");
        Ok(Self {
            path: list_path.to_path_buf(),
            released: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the list file. A file that is already gone counts as released.
    pub fn release(mut self) -> ClipchainResult<()> {
        self.released = true;
        remove_if_present(&self.path)
    }
}

impl Drop for ConcatList {
    fn drop(&mut self) {
        if !self.released {
            if let Err(e) = remove_if_present(&self.path) {
                tracing::warn!(error = %e, "Failed to remove concat list on drop");
            }
        }
    }
}

fn remove_if_present(path: &Path) -> ClipchainResult<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(ClipchainError::filesystem(path, e)),
    }
}

/// Render the list body. Zero inputs is an `EmptyInput` error.
pub fn render_concat_list(inputs: &[PathBuf]) -> ClipchainResult<String> {
    if inputs.is_empty() {
        return Err(ClipchainError::empty_input(
            "concatenation needs at least one input clip",
        ));
    }

    let mut lines = Vec::with_capacity(inputs.len());
    for input in inputs {
        let absolute = std::fs::canonicalize(input).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ClipchainError::FileNotFound {
                    path: input.clone(),
                }
            } else {
                ClipchainError::filesystem(input, e)
            }
        })?;
        lines.push(format!(
            "file '{}'",
            absolute.to_string_lossy().replace('\'', "'\\''")
        ));
    }
    let mut content = lines.join("\n");
    content.push('\n');
    Ok(content)
}

/// Run `body` with a concat list for `inputs` that exists before `body`
/// starts and is gone once it settles.
///
/// A failure to remove the list is logged and never replaces the result of
/// `body`.
pub async fn with_concat_list<T, F, Fut>(
    list_path: &Path,
    inputs: &[PathBuf],
    body: F,
) -> ClipchainResult<T>
where
    F: FnOnce(PathBuf) -> Fut,
    Fut: Future<Output = ClipchainResult<T>>,
{
    let list = ConcatList::create(list_path, inputs)?;
    let result = body(list.path().to_path_buf()).await;

    if let Err(e) = list.release() {
        tracing::warn!(
            error = %e,
            stage_ok = result.is_ok(),
            "Concat list cleanup failed"
        );
    }

    result
}
