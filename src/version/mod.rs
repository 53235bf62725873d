//! Version management for tracking live table files.
//!
//! The version system provides:
//! - **FileMetaData**: Information about each table file
//! - **VersionEdit**: Delta between two Versions, and the manifest record format
//! - **Version**: Immutable snapshot of all files organized by level
//! - **VersionBuilder**: Folds a batch of edits into the next Version
//! - **Manifest**: Append-only log of encoded VersionEdits
//! - **VersionSet**: Owns the current Version and the manifest
//!
//! # LSM-Tree File Organization
//!
//! ```text
//! Level 0:  [SST-1] [SST-2] [SST-3]  (overlapping keys, flush order)
//! Level 1:  [SST-4][SST-5][SST-6]    (non-overlapping, sorted)
//! Level 2:  [SST-7][SST-8][SST-9][SST-10]  (non-overlapping, sorted)
//! ...
//! ```
//!
//! # Recovery
//!
//! On startup:
//! 1. Read CURRENT file to find active manifest
//! 2. Replay all VersionEdits from manifest
//! 3. Reconstruct the current Version

mod builder;
mod file_metadata;
mod manifest;
#[allow(clippy::module_inception)]
mod version;
mod version_edit;
mod version_set;

pub use builder::VersionBuilder;
pub use file_metadata::FileMetaData;
pub use manifest::{ManifestReader, ManifestWriter, RecordType, HEADER_SIZE};
pub use version::Version;
pub use version_edit::VersionEdit;
pub use version_set::VersionSet;

/// Tag values identifying each field of an encoded VersionEdit.
///
/// Tags are written as varint32. Value 8 was used by an old large-value
/// record and is no longer recognized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum EditTag {
    /// Comparator name.
    Comparator = 1,
    /// Log number.
    LogNumber = 2,
    /// Next file number.
    NextFileNumber = 3,
    /// Last sequence number.
    LastSequence = 4,
    /// Compaction pointer for a level.
    CompactPointer = 5,
    /// Deleted file (level, file_number).
    DeletedFile = 6,
    /// New file (level, file_number, size, smallest, largest).
    NewFile = 7,
    /// Previous log number.
    PrevLogNumber = 9,
}

impl EditTag {
    /// Map a wire value to its tag.
    pub fn from_u32(v: u32) -> Option<Self> {
        match v {
            1 => Some(EditTag::Comparator),
            2 => Some(EditTag::LogNumber),
            3 => Some(EditTag::NextFileNumber),
            4 => Some(EditTag::LastSequence),
            5 => Some(EditTag::CompactPointer),
            6 => Some(EditTag::DeletedFile),
            7 => Some(EditTag::NewFile),
            9 => Some(EditTag::PrevLogNumber),
            _ => None,
        }
    }

    /// Wire value of this tag.
    pub fn to_u32(self) -> u32 {
        self as u32
    }

    /// Field name used in corruption messages.
    pub fn field_name(self) -> &'static str {
        match self {
            EditTag::Comparator => "comparator name",
            EditTag::LogNumber => "log number",
            EditTag::NextFileNumber => "next file number",
            EditTag::LastSequence => "last sequence number",
            EditTag::CompactPointer => "compaction pointer",
            EditTag::DeletedFile => "deleted file",
            EditTag::NewFile => "new-file entry",
            EditTag::PrevLogNumber => "previous log number",
        }
    }
}
