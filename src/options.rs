//! Configuration options for version management and the manifest log.

use std::fmt;
use std::sync::Arc;

use crate::util::comparator::{BytewiseComparator, Comparator};

/// Maximum number of levels in the LSM tree.
pub const MAX_LEVELS: usize = 7;

/// Seek budget a freshly constructed file descriptor starts with.
pub const DEFAULT_ALLOWED_SEEKS: i64 = 1 << 30;

/// Lower bound on the seek budget of a file entering a Version.
pub const MIN_ALLOWED_SEEKS: i64 = 100;

/// One seek is charged for roughly this many bytes of table data.
pub const BYTES_PER_SEEK: u64 = 16 * 1024;

/// Block size for the manifest log (32KB).
pub const MANIFEST_BLOCK_SIZE: usize = 32 * 1024;

/// Manifest sync mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncMode {
    /// Sync after every appended edit (safest).
    #[default]
    Always,
    /// Sync after N bytes written.
    Bytes {
        /// Number of bytes before sync.
        bytes: usize,
    },
    /// Let the OS decide when to sync (may lose recent edits on crash).
    None,
}

/// Version set configuration options.
#[derive(Clone)]
pub struct Options {
    /// Create the manifest if the directory has no CURRENT file.
    pub create_if_missing: bool,

    /// Return an error if a CURRENT file already exists.
    pub error_if_exists: bool,

    /// Treat damaged manifest records as fatal instead of skipping them.
    pub paranoid_checks: bool,

    /// Manifest sync mode.
    pub sync_mode: SyncMode,

    /// User key comparator. Its name is recorded in the manifest.
    pub comparator: Arc<dyn Comparator>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            error_if_exists: false,
            paranoid_checks: true,
            sync_mode: SyncMode::default(),
            comparator: Arc::new(BytewiseComparator::new()),
        }
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("create_if_missing", &self.create_if_missing)
            .field("error_if_exists", &self.error_if_exists)
            .field("paranoid_checks", &self.paranoid_checks)
            .field("sync_mode", &self.sync_mode)
            .field("comparator", &self.comparator.name())
            .finish()
    }
}

impl Options {
    /// Create new options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the options.
    pub fn validate(&self) -> crate::Result<()> {
        if self.comparator.name().is_empty() {
            return Err(crate::Error::invalid_argument(
                "comparator name must not be empty",
            ));
        }

        if let SyncMode::Bytes { bytes } = self.sync_mode {
            if bytes == 0 {
                return Err(crate::Error::invalid_argument(
                    "sync_mode bytes threshold must be non-zero",
                ));
            }
        }

        Ok(())
    }
}

/// Builder for Options.
#[derive(Debug, Clone, Default)]
pub struct OptionsBuilder {
    options: Options,
}

impl OptionsBuilder {
    /// Create a new builder with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set create_if_missing.
    pub fn create_if_missing(mut self, value: bool) -> Self {
        self.options.create_if_missing = value;
        self
    }

    /// Set error_if_exists.
    pub fn error_if_exists(mut self, value: bool) -> Self {
        self.options.error_if_exists = value;
        self
    }

    /// Set paranoid_checks.
    pub fn paranoid_checks(mut self, value: bool) -> Self {
        self.options.paranoid_checks = value;
        self
    }

    /// Set sync mode.
    pub fn sync_mode(mut self, mode: SyncMode) -> Self {
        self.options.sync_mode = mode;
        self
    }

    /// Set the user key comparator.
    pub fn comparator(mut self, comparator: Arc<dyn Comparator>) -> Self {
        self.options.comparator = comparator;
        self
    }

    /// Build the options.
    pub fn build(self) -> crate::Result<Options> {
        self.options.validate()?;
        Ok(self.options)
    }
}
