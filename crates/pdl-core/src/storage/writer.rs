//! Sequential writer for one staged part (or the single-stream destination).

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use crate::error::StorageError;

/// Buffered file writer. Owned by exactly one worker.
pub struct PartWriter {
    inner: BufWriter<File>,
    path: PathBuf,
}

impl PartWriter {
    /// Open `path` for writing: append to existing data, or create/truncate.
    pub fn open(path: PathBuf, append: bool) -> Result<Self, StorageError> {
        let mut opts = File::options();
        opts.create(true);
        if append {
            opts.append(true);
        } else {
            opts.write(true).truncate(true);
        }
        let file = opts.open(&path).map_err(|e| StorageError::new(&path, e))?;
        Ok(Self {
            inner: BufWriter::new(file),
            path,
        })
    }

    pub fn write_chunk(&mut self, data: &[u8]) -> Result<(), StorageError> {
        self.inner
            .write_all(data)
            .map_err(|e| StorageError::new(&self.path, e))
    }

    /// Flush buffered data and sync it to disk.
    pub fn finish(mut self) -> Result<(), StorageError> {
        self.inner
            .flush()
            .map_err(|e| StorageError::new(&self.path, e))?;
        self.inner
            .get_ref()
            .sync_all()
            .map_err(|e| StorageError::new(&self.path, e))
    }
}
