//! Delimited record archiving
//!
//! An `Archiver` writes a header row followed by one record per call to a delimited text file,
//! used for the per-task timing logs and the simulation output log.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External imports
use csv::{Writer, WriterBuilder};
use std::fs::File;
use std::path::{Path, PathBuf};
use thiserror::Error;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// An object used to write delimited archive files.
pub struct Archiver {
    writer: Writer<File>,
    path: PathBuf,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors raised while creating or writing an archive.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Cannot create the archive file {0:?}: {1}")]
    CreateFailed(PathBuf, std::io::Error),

    #[error("Cannot write to the archive: {0}")]
    WriteFailed(csv::Error),

    #[error("Cannot flush the archive: {0}")]
    FlushFailed(std::io::Error),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Archiver {
    /// Create a new archiver at a path relative to `arch_root`, writing the header immediately.
    ///
    /// Any missing parent directories are created. An existing file is truncated.
    pub fn from_path<P: AsRef<Path>>(
        arch_root: &Path,
        path: P,
        delimiter: u8,
        header: &[&str],
    ) -> Result<Self, ArchiveError> {
        let full_path = arch_root.join(path);

        if let Some(parent) = full_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ArchiveError::CreateFailed(full_path.clone(), e))?;
        }

        let file = File::create(&full_path)
            .map_err(|e| ArchiveError::CreateFailed(full_path.clone(), e))?;

        let mut writer = WriterBuilder::new()
            .delimiter(delimiter)
            .has_headers(false)
            .from_writer(file);

        writer.write_record(header).map_err(ArchiveError::WriteFailed)?;

        Ok(Self {
            writer,
            path: full_path,
        })
    }

    /// Write one record of numeric fields.
    ///
    /// Records are buffered, call `flush` to force them to disk.
    pub fn write_values(&mut self, values: &[f64]) -> Result<(), ArchiveError> {
        for v in values {
            self.writer
                .write_field(format!("{:.6}", v))
                .map_err(ArchiveError::WriteFailed)?;
        }
        self.writer
            .write_record(None::<&[u8]>)
            .map_err(ArchiveError::WriteFailed)
    }

    /// Flush any buffered records to disk.
    pub fn flush(&mut self) -> Result<(), ArchiveError> {
        self.writer.flush().map_err(ArchiveError::FlushFailed)
    }

    /// Full path of the archive file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}
