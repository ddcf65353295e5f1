//! Staging area for range data.
//!
//! One staging directory per job, `<destination>.parts/`, next to the
//! destination file. Each range writes to its own `part-<index>` entry, so no
//! two workers ever touch the same file.

mod writer;

pub use writer::PartWriter;

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::StorageError;
use crate::planner::Range;

/// Suffix appended to the destination file name to form the staging directory.
pub const STAGING_SUFFIX: &str = ".parts";

/// Staging directory for a destination: `file.iso` → `file.iso.parts`.
pub fn staging_dir(destination: &Path) -> PathBuf {
    let mut o: OsString = destination.as_os_str().to_owned();
    o.push(STAGING_SUFFIX);
    PathBuf::from(o)
}

/// Per-range staging state as found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartState {
    pub index: usize,
    pub path: PathBuf,
    /// Bytes of this range already staged (0 unless resuming).
    pub bytes_present: u64,
}

/// Owns the staging directory of one job.
#[derive(Debug, Clone)]
pub struct PartStore {
    dir: PathBuf,
    resume: bool,
}

impl PartStore {
    pub fn for_destination(destination: &Path, resume: bool) -> Self {
        Self {
            dir: staging_dir(destination),
            resume,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn resume(&self) -> bool {
        self.resume
    }

    /// Create the staging directory. Without resume, leftovers from an earlier
    /// run are discarded first.
    pub fn prepare(&self) -> Result<(), StorageError> {
        if !self.resume && self.dir.exists() {
            tracing::debug!(dir = %self.dir.display(), "discarding stale staging directory");
            fs::remove_dir_all(&self.dir).map_err(|e| StorageError::new(&self.dir, e))?;
        }
        fs::create_dir_all(&self.dir).map_err(|e| StorageError::new(&self.dir, e))
    }

    pub fn part_path(&self, index: usize) -> PathBuf {
        self.dir.join(format!("part-{}", index))
    }

    /// Bytes of `range` already staged.
    ///
    /// 0 when resume is off or the part file does not exist. A part file larger
    /// than the range is stale and also reports 0; the next writer truncates it.
    /// Any other I/O error is surfaced.
    pub fn inspect(&self, range: &Range) -> Result<u64, StorageError> {
        if !self.resume {
            return Ok(0);
        }
        let path = self.part_path(range.index);
        let present = match fs::metadata(&path) {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(StorageError::new(path, e)),
        };
        if present > range.len() {
            tracing::warn!(
                index = range.index,
                present,
                expected = range.len(),
                "staged part larger than its range, refetching"
            );
            return Ok(0);
        }
        Ok(present)
    }

    pub fn part_state(&self, range: &Range) -> Result<PartState, StorageError> {
        Ok(PartState {
            index: range.index,
            path: self.part_path(range.index),
            bytes_present: self.inspect(range)?,
        })
    }

    /// Open the part file for `range`: append when resuming a partial part,
    /// truncate otherwise.
    pub fn writer(&self, range: &Range, append: bool) -> Result<PartWriter, StorageError> {
        PartWriter::open(self.part_path(range.index), append)
    }

    pub fn remove_part(&self, index: usize) -> Result<(), StorageError> {
        let path = self.part_path(index);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::new(path, e)),
        }
    }

    /// Remove the whole staging directory. Missing directory is not an error.
    pub fn remove_all(&self) -> Result<(), StorageError> {
        match fs::remove_dir_all(&self.dir) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::new(&self.dir, e)),
        }
    }
}
