//! # lsm-manifest
//!
//! File-set bookkeeping for a LevelDB-style LSM tree: the VersionEdit record
//! format, the manifest log it is stored in, and the VersionSet that replays
//! it into the current set of live table files.
//!
//! ## Features
//!
//! - **LevelDB-compatible edits**: tagged varint encoding of log numbers,
//!   sequence watermarks, compaction pointers, and added/deleted files
//! - **Checksummed manifest log**: 32KB blocks, fragmented records, torn-tail
//!   tolerant recovery
//! - **Immutable Versions**: readers hold an `Arc<Version>` while edits are
//!   installed atomically
//! - **Pluggable ordering**: user comparators, checked against the manifest on
//!   reopen
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use lsm_manifest::{InternalKey, Options, ValueType, VersionEdit, VersionSet};
//!
//! let versions = VersionSet::open("./my_db".as_ref(), Arc::new(Options::default()))?;
//!
//! let mut edit = VersionEdit::new();
//! edit.set_log_number(versions.new_file_number());
//! edit.add_file(
//!     0,
//!     versions.new_file_number(),
//!     4096,
//!     InternalKey::new("a", 5, ValueType::Value),
//!     InternalKey::new("m", 1, ValueType::Value),
//! );
//! versions.log_and_apply(&mut edit)?;
//!
//! assert_eq!(versions.current().num_files(0), 1);
//! ```

// Public modules
pub mod error;
pub mod options;
pub mod slice;
pub mod types;
pub mod util;
pub mod version;

// Re-export main types for convenience
pub use error::{Error, Result};
pub use options::{Options, OptionsBuilder, SyncMode, MAX_LEVELS};
pub use slice::Slice;
pub use types::{InternalKey, SequenceNumber, ValueType};

// Comparators
pub use util::comparator::{BytewiseComparator, Comparator, InternalKeyComparator};

// Versions and the manifest
pub use version::{
    FileMetaData, ManifestReader, ManifestWriter, Version, VersionBuilder, VersionEdit,
    VersionSet,
};
