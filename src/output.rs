//! Files produced by tasks and written to the output directory.

use std::fs;
use std::io;

use camino::{Utf8Path, Utf8PathBuf};

/// Represents a single output file to be written to the `dist` directory.
///
/// The runner collects the `Output`s of every successful task and writes them
/// to the filesystem once the graph has settled.
#[derive(Debug, Clone, Hash)]
pub struct Output {
    /// The destination path of the file, relative to the `dist` directory.
    pub path: Utf8PathBuf,
    /// The text of the file to be written.
    pub data: String,
}

impl Output {
    /// Creates a new text output at the given relative path.
    pub fn text(path: impl Into<Utf8PathBuf>, data: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            data: data.into(),
        }
    }
}

/// Saves all outputs to the output directory, overwriting existing files.
pub(crate) fn save_outputs(dist: &Utf8Path, outputs: &[Output]) -> io::Result<()> {
    if outputs.is_empty() {
        return Ok(());
    }

    fs::create_dir_all(dist)?;

    for output in outputs {
        let file_path = dist.join(&output.path);

        if let Some(parent_dir) = file_path.parent() {
            fs::create_dir_all(parent_dir)?;
        }

        tracing::debug!("Writing {file_path}");
        fs::write(&file_path, &output.data)?;
    }

    Ok(())
}
