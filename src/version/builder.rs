//! VersionBuilder - folds a batch of VersionEdits into the next Version.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::options::MAX_LEVELS;
use crate::util::comparator::{Comparator, InternalKeyComparator};
use crate::{Error, Result};

use super::{FileMetaData, Version, VersionEdit};

#[derive(Default)]
struct LevelState {
    deleted: BTreeSet<u64>,
    added: Vec<Arc<FileMetaData>>,
}

/// Accumulates edits on top of a base Version without touching it.
///
/// Edits are applied in order: a file deleted by an earlier edit and added by
/// a later one is kept, a file added and later deleted is dropped.
pub struct VersionBuilder {
    base: Arc<Version>,
    icmp: InternalKeyComparator,
    levels: [LevelState; MAX_LEVELS],
}

impl VersionBuilder {
    /// Create a builder on top of `base`.
    pub fn new(base: Arc<Version>) -> Self {
        let icmp = base.comparator().clone();
        Self {
            base,
            icmp,
            levels: Default::default(),
        }
    }

    /// Apply one edit's file additions and deletions.
    pub fn apply(&mut self, edit: &VersionEdit) {
        for &(level, number) in edit.deleted_files() {
            self.levels[level].deleted.insert(number);
        }

        for (level, file) in edit.new_files() {
            let state = &mut self.levels[*level];
            let file = Arc::new(file.clone());
            file.reset_allowed_seeks_for_size();

            state.deleted.remove(&file.number());
            state.added.retain(|f| f.number() != file.number());
            state.added.push(file);
        }
    }

    /// Produce the Version that results from the applied edits.
    ///
    /// Files in every level are ordered by smallest key (ties by file
    /// number). Overlapping key ranges in levels above 0 are reported as
    /// corruption.
    pub fn save_to(self) -> Result<Version> {
        let mut files: [Vec<Arc<FileMetaData>>; MAX_LEVELS] = Default::default();

        for (level, state) in self.levels.iter().enumerate() {
            let replaced: BTreeSet<u64> = state.added.iter().map(|f| f.number()).collect();

            let mut merged: Vec<Arc<FileMetaData>> = self
                .base
                .files(level)
                .iter()
                .filter(|f| !replaced.contains(&f.number()))
                .chain(state.added.iter())
                .filter(|f| !state.deleted.contains(&f.number()))
                .cloned()
                .collect();

            merged.sort_by(|a, b| self.by_smallest_key(a, b));

            if level > 0 {
                self.check_disjoint(level, &merged)?;
            }
            files[level] = merged;
        }

        Ok(Version::with_files(self.icmp, files))
    }

    fn by_smallest_key(&self, a: &FileMetaData, b: &FileMetaData) -> Ordering {
        self.icmp
            .compare(a.smallest().encoded(), b.smallest().encoded())
            .then_with(|| a.number().cmp(&b.number()))
    }

    fn check_disjoint(&self, level: usize, files: &[Arc<FileMetaData>]) -> Result<()> {
        for pair in files.windows(2) {
            let (prev, next) = (&pair[0], &pair[1]);
            if self
                .icmp
                .compare(prev.largest().encoded(), next.smallest().encoded())
                != Ordering::Less
            {
                return Err(Error::corruption(format!(
                    "overlapping ranges in level {}: {} and {}",
                    level,
                    prev.debug_string(),
                    next.debug_string()
                )));
            }
        }
        Ok(())
    }
}
