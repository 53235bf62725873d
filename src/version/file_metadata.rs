//! File metadata for sorted table files.

use std::fmt;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};

use crate::options::{BYTES_PER_SEEK, DEFAULT_ALLOWED_SEEKS, MIN_ALLOWED_SEEKS};
use crate::types::InternalKey;

/// Metadata about a table file.
///
/// The file number, size and key range are fixed at construction and are
/// what the manifest persists. The reference count and seek budget are
/// runtime-only counters: they are never encoded, start from defaults when a
/// descriptor is decoded or cloned, and are only touched by the Version that
/// holds the file and by the read path.
pub struct FileMetaData {
    /// Unique file number.
    number: u64,
    /// File size in bytes.
    file_size: u64,
    /// Smallest internal key served by the table (inclusive).
    smallest: InternalKey,
    /// Largest internal key served by the table (inclusive).
    largest: InternalKey,
    /// Number of Versions currently holding this file.
    refs: AtomicUsize,
    /// Seeks allowed until the file should be compacted.
    allowed_seeks: AtomicI64,
}

impl FileMetaData {
    /// Create new file metadata.
    ///
    /// `smallest` and `largest` are taken as given; they are not re-derived
    /// or checked here.
    pub fn new(number: u64, file_size: u64, smallest: InternalKey, largest: InternalKey) -> Self {
        Self {
            number,
            file_size,
            smallest,
            largest,
            refs: AtomicUsize::new(0),
            allowed_seeks: AtomicI64::new(DEFAULT_ALLOWED_SEEKS),
        }
    }

    /// Get the file number.
    pub fn number(&self) -> u64 {
        self.number
    }

    /// Get the file size.
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Get the smallest key.
    pub fn smallest(&self) -> &InternalKey {
        &self.smallest
    }

    /// Get the largest key.
    pub fn largest(&self) -> &InternalKey {
        &self.largest
    }

    /// Number of Versions currently holding this file.
    pub fn refs(&self) -> usize {
        self.refs.load(Ordering::Acquire)
    }

    pub(crate) fn add_ref(&self) {
        self.refs.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn release_ref(&self) {
        let prev = self.refs.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(prev > 0, "file {} released more often than held", self.number);
    }

    /// Seeks remaining before this file becomes a compaction candidate.
    pub fn allowed_seeks(&self) -> i64 {
        self.allowed_seeks.load(Ordering::Relaxed)
    }

    /// Charge one seek to this file.
    ///
    /// Returns true once the budget is exhausted.
    pub fn record_seek(&self) -> bool {
        self.allowed_seeks.fetch_sub(1, Ordering::Relaxed) - 1 <= 0
    }

    /// Size the seek budget from the file size.
    ///
    /// One seek costs about as much as compacting 16KB of data, so a file
    /// may absorb `file_size / 16KB` wasted seeks (at least 100) before it is
    /// worth compacting.
    pub fn reset_allowed_seeks_for_size(&self) {
        let seeks = ((self.file_size / BYTES_PER_SEEK) as i64).max(MIN_ALLOWED_SEEKS);
        self.allowed_seeks.store(seeks, Ordering::Relaxed);
    }

    /// Check if the file's user key range overlaps `[smallest, largest]`.
    pub fn overlaps_user_range(&self, smallest: &[u8], largest: &[u8]) -> bool {
        self.largest.user_key() >= smallest && self.smallest.user_key() <= largest
    }

    /// Human-readable form: `number:size[smallest .. largest]`.
    pub fn debug_string(&self) -> String {
        format!(
            "{}:{}[{} .. {}]",
            self.number,
            self.file_size,
            self.smallest.debug_string(),
            self.largest.debug_string()
        )
    }
}

impl Clone for FileMetaData {
    fn clone(&self) -> Self {
        Self::new(
            self.number,
            self.file_size,
            self.smallest.clone(),
            self.largest.clone(),
        )
    }
}

impl PartialEq for FileMetaData {
    fn eq(&self, other: &Self) -> bool {
        self.number == other.number
            && self.file_size == other.file_size
            && self.smallest == other.smallest
            && self.largest == other.largest
    }
}

impl Eq for FileMetaData {}

impl fmt::Debug for FileMetaData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileMetaData")
            .field("number", &self.number)
            .field("file_size", &self.file_size)
            .field("smallest", &self.smallest)
            .field("largest", &self.largest)
            .field("refs", &self.refs())
            .field("allowed_seeks", &self.allowed_seeks())
            .finish()
    }
}
