//! VersionSet - owns the current Version, the file-number counters and the
//! manifest that makes them durable.
//!
//! Every change to the set of live files goes through [`VersionSet::log_and_apply`]:
//! the edit is folded into the next Version, appended to the manifest, and
//! only then installed. Recovery replays the manifest named by CURRENT.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use arc_swap::ArcSwap;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::options::{Options, MAX_LEVELS};
use crate::types::{InternalKey, SequenceNumber};
use crate::util::comparator::InternalKeyComparator;
use crate::util::filename::{
    database_exists, manifest_file_path, parse_file_name, read_current_file, set_current_file,
    FileType,
};
use crate::{Error, Result};

use super::{ManifestReader, ManifestWriter, Version, VersionBuilder, VersionEdit};

/// Manages the chain of Versions and the manifest.
pub struct VersionSet {
    /// Database directory path.
    db_path: PathBuf,
    options: Arc<Options>,
    icmp: InternalKeyComparator,
    /// Current version (atomically swappable).
    current: ArcSwap<Version>,
    /// Versions installed so far that may still be held by readers.
    installed: Mutex<Vec<Weak<Version>>>,
    next_file_number: AtomicU64,
    last_sequence: AtomicU64,
    log_number: AtomicU64,
    prev_log_number: AtomicU64,
    manifest_number: AtomicU64,
    /// Open manifest writer. Also serializes `log_and_apply`.
    manifest: Mutex<Option<ManifestWriter>>,
    /// Key at which the next compaction of each level should start.
    compact_pointers: RwLock<[Option<InternalKey>; MAX_LEVELS]>,
}

impl VersionSet {
    /// Create an empty VersionSet. Nothing is read or written until
    /// [`recover`](Self::recover) or [`create_new_manifest`](Self::create_new_manifest).
    pub fn new(db_path: &Path, options: Arc<Options>) -> Self {
        let icmp = InternalKeyComparator::new(Arc::clone(&options.comparator));
        let current = Arc::new(Version::new(icmp.clone()));
        Self {
            db_path: db_path.to_path_buf(),
            options,
            icmp,
            installed: Mutex::new(vec![Arc::downgrade(&current)]),
            current: ArcSwap::new(current),
            next_file_number: AtomicU64::new(1),
            last_sequence: AtomicU64::new(0),
            log_number: AtomicU64::new(0),
            prev_log_number: AtomicU64::new(0),
            manifest_number: AtomicU64::new(0),
            manifest: Mutex::new(None),
            compact_pointers: RwLock::new(Default::default()),
        }
    }

    /// Open the VersionSet stored in `db_path`, creating it if allowed.
    pub fn open(db_path: &Path, options: Arc<Options>) -> Result<Self> {
        options.validate()?;
        let versions = Self::new(db_path, options);

        if database_exists(db_path) {
            if versions.options.error_if_exists {
                return Err(Error::AlreadyExists(format!(
                    "{} (error_if_exists is set)",
                    db_path.display()
                )));
            }
            versions.recover()?;
        } else {
            if !versions.options.create_if_missing {
                return Err(Error::NotFound(format!(
                    "{} has no CURRENT file (create_if_missing is false)",
                    db_path.display()
                )));
            }
            fs::create_dir_all(db_path)?;
            versions.create_new_manifest()?;
        }
        Ok(versions)
    }

    /// Get the database path.
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Options this set was opened with.
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Internal key comparator derived from the configured user comparator.
    pub fn comparator(&self) -> &InternalKeyComparator {
        &self.icmp
    }

    /// Get the current version.
    pub fn current(&self) -> Arc<Version> {
        self.current.load_full()
    }

    /// Allocate a new file number.
    pub fn new_file_number(&self) -> u64 {
        self.next_file_number.fetch_add(1, Ordering::SeqCst)
    }

    /// Next file number that will be allocated.
    pub fn next_file_number(&self) -> u64 {
        self.next_file_number.load(Ordering::SeqCst)
    }

    /// Make sure `number` is never handed out by `new_file_number`.
    pub fn mark_file_number_used(&self, number: u64) {
        self.next_file_number
            .fetch_max(number.saturating_add(1), Ordering::SeqCst);
    }

    /// Return `number` to the allocator if it was the most recent one
    /// handed out.
    pub fn reuse_file_number(&self, number: u64) {
        let _ = self.next_file_number.compare_exchange(
            number.saturating_add(1),
            number,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
    }

    /// Get the last sequence number.
    pub fn last_sequence(&self) -> SequenceNumber {
        self.last_sequence.load(Ordering::SeqCst)
    }

    /// Advance the last sequence number.
    pub fn set_last_sequence(&self, seq: SequenceNumber) {
        debug_assert!(
            seq >= self.last_sequence(),
            "last sequence moved backwards: {} -> {}",
            self.last_sequence(),
            seq
        );
        self.last_sequence.store(seq, Ordering::SeqCst);
    }

    /// Number of the write-ahead log that is current.
    pub fn log_number(&self) -> u64 {
        self.log_number.load(Ordering::SeqCst)
    }

    /// Number of the log still being compacted, or 0.
    pub fn prev_log_number(&self) -> u64 {
        self.prev_log_number.load(Ordering::SeqCst)
    }

    /// Number of the manifest CURRENT points at, or 0 before the first one.
    pub fn manifest_number(&self) -> u64 {
        self.manifest_number.load(Ordering::SeqCst)
    }

    /// Compaction pointer for a level.
    pub fn compact_pointer(&self, level: usize) -> Option<InternalKey> {
        self.compact_pointers.read()[level].clone()
    }

    /// Numbers of every table file referenced by a Version that is still
    /// alive, including Versions held only by readers.
    pub fn live_files(&self) -> BTreeSet<u64> {
        let mut installed = self.installed.lock();
        installed.retain(|v| v.strong_count() > 0);
        installed
            .iter()
            .filter_map(Weak::upgrade)
            .flat_map(|v| v.live_file_numbers())
            .collect()
    }

    /// Number of files per level, e.g. `files[ 2 1 0 0 0 0 0 ]`.
    pub fn level_summary(&self) -> String {
        let current = self.current();
        let counts: Vec<String> = (0..MAX_LEVELS)
            .map(|level| current.num_files(level).to_string())
            .collect();
        format!("files[ {} ]", counts.join(" "))
    }

    /// Recover the VersionSet from the manifest named by CURRENT.
    ///
    /// Returns `Ok(false)` if there is no CURRENT file. The recovered
    /// manifest is left untouched; the next install writes a fresh one.
    pub fn recover(&self) -> Result<bool> {
        let manifest_name = match read_current_file(&self.db_path)? {
            Some(name) => name,
            None => return Ok(false),
        };
        let manifest_number = match parse_file_name(&manifest_name) {
            Some((FileType::Manifest, number)) => number,
            _ => {
                return Err(Error::corruption(format!(
                    "CURRENT names {:?}, which is not a manifest",
                    manifest_name
                )))
            }
        };

        let path = manifest_file_path(&self.db_path, manifest_number);
        let mut reader = match ManifestReader::open(&path, self.options.paranoid_checks) {
            Ok(reader) => reader,
            Err(Error::NotFound(_)) => {
                return Err(Error::corruption(format!(
                    "CURRENT points to missing manifest {}",
                    manifest_name
                )))
            }
            Err(e) => return Err(e),
        };

        let mut builder = VersionBuilder::new(Arc::new(Version::new(self.icmp.clone())));
        let mut compact_pointers: [Option<InternalKey>; MAX_LEVELS] = Default::default();
        let mut log_number = None;
        let mut prev_log_number = None;
        let mut next_file_number = None;
        let mut last_sequence = None;
        let mut edits = 0usize;

        while let Some(edit) = reader.read_edit()? {
            if let Some(name) = edit.comparator_name() {
                let ours = self.options.comparator.name();
                if name != ours {
                    warn!(stored = name, configured = ours, "comparator mismatch");
                    return Err(Error::invalid_argument(format!(
                        "{} does not match existing comparator {}",
                        ours, name
                    )));
                }
            }

            builder.apply(&edit);
            for (level, key) in edit.compact_pointers() {
                compact_pointers[*level] = Some(key.clone());
            }
            log_number = edit.log_number().or(log_number);
            prev_log_number = edit.prev_log_number().or(prev_log_number);
            next_file_number = edit.next_file_number().or(next_file_number);
            last_sequence = edit.last_sequence().or(last_sequence);
            edits += 1;
        }

        let next_file_number = next_file_number
            .ok_or_else(|| Error::corruption("no meta-nextfile entry in manifest"))?;
        let log_number =
            log_number.ok_or_else(|| Error::corruption("no meta-lognumber entry in manifest"))?;
        let last_sequence = last_sequence
            .ok_or_else(|| Error::corruption("no last-sequence-number entry in manifest"))?;
        let prev_log_number = prev_log_number.unwrap_or(0);

        let version = builder.save_to()?;

        self.next_file_number.store(next_file_number, Ordering::SeqCst);
        self.mark_file_number_used(manifest_number);
        self.mark_file_number_used(log_number);
        self.mark_file_number_used(prev_log_number);
        for number in version.live_file_numbers() {
            self.mark_file_number_used(number);
        }
        self.last_sequence.store(last_sequence, Ordering::SeqCst);
        self.log_number.store(log_number, Ordering::SeqCst);
        self.prev_log_number.store(prev_log_number, Ordering::SeqCst);
        self.manifest_number.store(manifest_number, Ordering::SeqCst);
        *self.compact_pointers.write() = compact_pointers;
        *self.manifest.lock() = None;
        self.install(version);

        info!(
            manifest = %manifest_name,
            edits,
            dropped_bytes = reader.dropped_bytes(),
            next_file = self.next_file_number(),
            last_sequence,
            log_number,
            prev_log_number,
            summary = %self.level_summary(),
            "recovered version set"
        );
        Ok(true)
    }

    /// Start a new manifest holding a snapshot of the current state and
    /// point CURRENT at it.
    pub fn create_new_manifest(&self) -> Result<()> {
        let mut manifest = self.manifest.lock();
        self.roll_manifest(&mut manifest)
    }

    /// Persist `edit` and install the Version it produces.
    ///
    /// Log number and previous log number are filled in from the current
    /// state when the edit leaves them unset. Next file number and last
    /// sequence are raised to the edit's values when those are higher, and
    /// the edit then carries the set's values.
    /// On error the current Version is unchanged.
    pub fn log_and_apply(&self, edit: &mut VersionEdit) -> Result<()> {
        let mut manifest = self.manifest.lock();
        if manifest.is_none() {
            self.roll_manifest(&mut manifest)?;
        }

        match edit.log_number() {
            Some(number) => {
                debug_assert!(number >= self.log_number());
                debug_assert!(number < self.next_file_number());
            }
            None => edit.set_log_number(self.log_number()),
        }
        if edit.prev_log_number().is_none() {
            edit.set_prev_log_number(self.prev_log_number());
        }
        // Watermarks only move forward: a caller value raises the set's
        // counter, and the edit always records the counter.
        if let Some(number) = edit.next_file_number() {
            self.mark_file_number_used(number.saturating_sub(1));
        }
        edit.set_next_file_number(self.next_file_number());
        if let Some(seq) = edit.last_sequence() {
            self.last_sequence.fetch_max(seq, Ordering::SeqCst);
        }
        edit.set_last_sequence(self.last_sequence());

        let mut builder = VersionBuilder::new(self.current());
        builder.apply(edit);
        let version = builder.save_to()?;

        let writer = manifest
            .as_mut()
            .ok_or_else(|| Error::internal("manifest writer missing after roll"))?;
        if let Err(e) = writer.add_edit(edit) {
            warn!(manifest = writer.number(), error = %e, "manifest append failed");
            *manifest = None;
            return Err(e);
        }

        if let Some(number) = edit.log_number() {
            self.log_number.store(number, Ordering::SeqCst);
        }
        if let Some(number) = edit.prev_log_number() {
            self.prev_log_number.store(number, Ordering::SeqCst);
        }
        {
            let mut pointers = self.compact_pointers.write();
            for (level, key) in edit.compact_pointers() {
                pointers[*level] = Some(key.clone());
            }
        }
        self.install(version);

        debug!(
            added = edit.new_files().len(),
            deleted = edit.deleted_files().len(),
            summary = %self.level_summary(),
            "applied version edit"
        );
        Ok(())
    }

    fn install(&self, version: Version) {
        let version = Arc::new(version);
        {
            let mut installed = self.installed.lock();
            installed.retain(|v| v.strong_count() > 0);
            installed.push(Arc::downgrade(&version));
        }
        self.current.store(version);
    }

    /// Snapshot of everything a fresh manifest must start with.
    fn snapshot(&self) -> VersionEdit {
        let mut edit = VersionEdit::new();
        edit.set_comparator_name(self.options.comparator.name());
        edit.set_log_number(self.log_number());
        edit.set_prev_log_number(self.prev_log_number());
        edit.set_next_file_number(self.next_file_number());
        edit.set_last_sequence(self.last_sequence());

        for (level, key) in self.compact_pointers.read().iter().enumerate() {
            if let Some(key) = key {
                edit.set_compact_pointer(level, key.clone());
            }
        }
        for (level, file) in self.current().all_files() {
            edit.add_file(
                level,
                file.number(),
                file.file_size(),
                file.smallest().clone(),
                file.largest().clone(),
            );
        }
        edit
    }

    /// Caller holds the manifest lock.
    fn roll_manifest(&self, slot: &mut Option<ManifestWriter>) -> Result<()> {
        let number = self.new_file_number();
        let path = manifest_file_path(&self.db_path, number);

        let written = (|| -> Result<ManifestWriter> {
            let mut writer = ManifestWriter::create(&path, number, self.options.sync_mode)?;
            writer.add_edit(&self.snapshot())?;
            writer.sync()?;
            set_current_file(&self.db_path, number)?;
            Ok(writer)
        })();

        let writer = match written {
            Ok(writer) => writer,
            Err(e) => {
                warn!(manifest = number, error = %e, "failed to start new manifest");
                let _ = fs::remove_file(&path);
                return Err(e);
            }
        };

        let old_number = self.manifest_number.swap(number, Ordering::SeqCst);
        if let Some(old) = slot.replace(writer) {
            let _ = old.close();
        }
        if old_number != 0 {
            let old_path = manifest_file_path(&self.db_path, old_number);
            if let Err(e) = fs::remove_file(&old_path) {
                debug!(path = %old_path.display(), error = %e, "could not remove old manifest");
            }
        }

        info!(manifest = number, summary = %self.level_summary(), "installed new manifest");
        Ok(())
    }
}
