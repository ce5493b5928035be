//! Range partitioning for chunked downloads

use std::path::{Path, PathBuf};

/// One byte range of a download and the part file that receives it.
///
/// Ephemeral: descriptors live for the duration of one download job and
/// their part files are deleted as the merge consumes them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkDescriptor {
    pub index: usize,
    /// First byte of the range.
    pub start: u64,
    /// Last byte of the range, inclusive.
    pub end: u64,
    /// Part file this range is written to.
    pub path: PathBuf,
}

impl ChunkDescriptor {
    /// Number of bytes in this range.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Always false: [`plan_chunks`] only ever produces non-empty
    /// ranges, so this exists purely as the companion to [`len`].
    ///
    /// [`len`]: ChunkDescriptor::len
    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }
}

/// Partition `[0, total)` into fixed-size ranges.
///
/// The final chunk absorbs the remainder. Part files sit next to the
/// destination as `<dest>.part<i>`. A zero chunk size plans nothing;
/// `ChunkedDownloader` rejects that configuration at construction.
#[must_use]
pub fn plan_chunks(total: u64, chunk_size: u64, dest: &Path) -> Vec<ChunkDescriptor> {
    if chunk_size == 0 {
        return Vec::new();
    }

    let mut chunks = Vec::new();
    let mut start = 0u64;
    while start < total {
        let end = (start + chunk_size - 1).min(total - 1);
        let index = chunks.len();
        chunks.push(ChunkDescriptor {
            index,
            start,
            end,
            path: part_path(dest, index),
        });
        start = end + 1;
    }
    chunks
}

fn part_path(dest: &Path, index: usize) -> PathBuf {
    let mut name = dest
        .file_name()
        .map(std::ffi::OsStr::to_os_string)
        .unwrap_or_default();
    name.push(format!(".part{index}"));
    dest.with_file_name(name)
}
