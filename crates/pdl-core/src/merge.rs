//! Merge: concatenate staged parts, in index order, into the destination.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::error::{MergeError, StorageError};
use crate::planner::Range;
use crate::storage::PartStore;

/// Concatenate every staged part of `ranges` into `destination`.
///
/// Must only run after every fetch of the job succeeded. Each part must hold
/// exactly its range's length; it is removed right after it has been copied.
/// The staging directory is removed on success and, best-effort, on failure.
/// Returns the destination length.
pub fn merge(destination: &Path, store: &PartStore, ranges: &[Range]) -> Result<u64, MergeError> {
    let result = concat_parts(destination, store, ranges);
    if let Err(e) = store.remove_all() {
        tracing::warn!(dir = %store.dir().display(), "failed to remove staging directory: {}", e);
        if result.is_ok() {
            return Err(MergeError::Storage(e));
        }
    }
    result
}

fn concat_parts(destination: &Path, store: &PartStore, ranges: &[Range]) -> Result<u64, MergeError> {
    let mut ordered: Vec<&Range> = ranges.iter().collect();
    ordered.sort_by_key(|r| r.index);
    let expected_total: u64 = ordered.iter().map(|r| r.len()).sum();

    let file = File::create(destination).map_err(|e| StorageError::new(destination, e))?;
    let mut out = BufWriter::new(file);
    let mut total = 0u64;

    for range in ordered {
        let copied = if range.is_empty() {
            0
        } else {
            copy_part(store, range, &mut out)?
        };
        total += copied;
        store.remove_part(range.index)?;
        tracing::debug!(index = range.index, copied, "part merged");
    }

    out.flush().map_err(|e| StorageError::new(destination, e))?;
    out.get_ref()
        .sync_all()
        .map_err(|e| StorageError::new(destination, e))?;

    if total != expected_total {
        return Err(MergeError::Length {
            expected: expected_total,
            actual: total,
        });
    }
    Ok(total)
}

fn copy_part(store: &PartStore, range: &Range, out: &mut impl Write) -> Result<u64, MergeError> {
    let path = store.part_path(range.index);
    let mut part = File::open(&path).map_err(|e| StorageError::new(&path, e))?;
    let actual = part
        .metadata()
        .map_err(|e| StorageError::new(&path, e))?
        .len();
    if actual != range.len() {
        return Err(MergeError::PartSize {
            index: range.index,
            expected: range.len(),
            actual,
        });
    }
    io::copy(&mut part, out).map_err(|e| MergeError::Storage(StorageError::new(&path, e)))
}
