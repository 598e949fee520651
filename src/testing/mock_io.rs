//! Temporary files and directories for testing file-backed graphs.

use crate::io::jsonl::{read_jsonl_records, write_jsonl_vec};
use crate::record::Record;
use std::path::{Path, PathBuf};
use tempfile::{NamedTempFile, TempDir};

/// A temporary file that is deleted when dropped.
pub struct TempFilePath {
    _temp_file: NamedTempFile,
    path: PathBuf,
}

impl TempFilePath {
    /// Create a new temporary file.
    ///
    /// # Errors
    ///
    /// Returns an error if the temporary file cannot be created.
    pub fn new() -> std::io::Result<Self> {
        let temp_file = NamedTempFile::new()?;
        let path = temp_file.path().to_path_buf();
        Ok(Self {
            _temp_file: temp_file,
            path,
        })
    }

    /// Create a new temporary file with a specific extension.
    ///
    /// # Errors
    ///
    /// Returns an error if the temporary file cannot be created.
    pub fn with_extension(extension: &str) -> std::io::Result<Self> {
        let temp_file = tempfile::Builder::new()
            .suffix(&format!(".{extension}"))
            .tempfile()?;
        let path = temp_file.path().to_path_buf();
        Ok(Self {
            _temp_file: temp_file,
            path,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// A temporary directory that is deleted, with its contents, when dropped.
pub struct TempDirPath {
    _temp_dir: TempDir,
    path: PathBuf,
}

impl TempDirPath {
    /// Create a new temporary directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the temporary directory cannot be created.
    pub fn new() -> std::io::Result<Self> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().to_path_buf();
        Ok(Self {
            _temp_dir: temp_dir,
            path,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A path for `filename` inside this directory.
    #[must_use]
    pub fn file_path(&self, filename: &str) -> PathBuf {
        self.path.join(filename)
    }

    /// Number of entries currently in the directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be listed.
    pub fn entry_count(&self) -> std::io::Result<usize> {
        Ok(std::fs::read_dir(&self.path)?.count())
    }
}

/// Create a temporary JSON Lines file holding `records`.
///
/// # Errors
///
/// Returns an error if the file cannot be created or written.
///
/// # Example
///
/// ```
/// use compgraph::record;
/// use compgraph::testing::{mock_jsonl_file, read_jsonl_output};
///
/// let file = mock_jsonl_file(&[record! { "id" => 1, "value" => "foo" }])?;
/// assert_eq!(read_jsonl_output(file.path())?, vec![record! { "id" => 1, "value" => "foo" }]);
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn mock_jsonl_file(records: &[Record]) -> anyhow::Result<TempFilePath> {
    let temp = TempFilePath::with_extension("jsonl")?;
    write_jsonl_vec(temp.path(), records)?;
    Ok(temp)
}

/// Read every record of a JSON Lines file, for assertions.
///
/// # Errors
///
/// Returns an error if the file cannot be read or a line is not a JSON object.
pub fn read_jsonl_output(path: impl AsRef<Path>) -> anyhow::Result<Vec<Record>> {
    read_jsonl_records(path)?.collect()
}
