//! Version - immutable snapshot of live table files.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt::Write;
use std::sync::Arc;

use crate::options::MAX_LEVELS;
use crate::util::comparator::InternalKeyComparator;

use super::FileMetaData;

/// An immutable snapshot of all table files at a point in time.
///
/// Every file held by a Version has its reference count raised for as long
/// as the Version lives, so a file whose count is zero and which is absent
/// from the current Version may be removed from disk.
#[derive(Debug)]
pub struct Version {
    /// Files at each level (0 to MAX_LEVELS-1).
    /// Level 0 files may overlap; higher levels are sorted and non-overlapping.
    files: [Vec<Arc<FileMetaData>>; MAX_LEVELS],
    /// Ordering used for key-range queries.
    icmp: InternalKeyComparator,
}

impl Version {
    /// Create an empty version.
    pub fn new(icmp: InternalKeyComparator) -> Self {
        Self {
            files: Default::default(),
            icmp,
        }
    }

    /// Create a version holding the given files.
    pub(crate) fn with_files(
        icmp: InternalKeyComparator,
        files: [Vec<Arc<FileMetaData>>; MAX_LEVELS],
    ) -> Self {
        for file in files.iter().flatten() {
            file.add_ref();
        }
        Self { files, icmp }
    }

    /// The comparator this version orders files with.
    pub fn comparator(&self) -> &InternalKeyComparator {
        &self.icmp
    }

    /// Get files at a specific level.
    pub fn files(&self, level: usize) -> &[Arc<FileMetaData>] {
        &self.files[level]
    }

    /// Get number of files at a level.
    pub fn num_files(&self, level: usize) -> usize {
        self.files[level].len()
    }

    /// Get total number of files across all levels.
    pub fn total_files(&self) -> usize {
        self.files.iter().map(|f| f.len()).sum()
    }

    /// Get total size of the files at a level.
    pub fn level_bytes(&self, level: usize) -> u64 {
        self.files[level].iter().map(|f| f.file_size()).sum()
    }

    /// Get an iterator over all files at all levels.
    pub fn all_files(&self) -> impl Iterator<Item = (usize, &Arc<FileMetaData>)> {
        self.files
            .iter()
            .enumerate()
            .flat_map(|(level, files)| files.iter().map(move |f| (level, f)))
    }

    /// Numbers of every file referenced by this version.
    pub fn live_file_numbers(&self) -> BTreeSet<u64> {
        self.all_files().map(|(_, f)| f.number()).collect()
    }

    /// Find files at `level` whose user key range overlaps
    /// `[smallest, largest]`.
    pub fn overlapping_files(
        &self,
        level: usize,
        smallest: &[u8],
        largest: &[u8],
    ) -> Vec<Arc<FileMetaData>> {
        let files = &self.files[level];
        let before = |f: &Arc<FileMetaData>| {
            self.icmp.compare_user_keys(f.largest().user_key(), smallest) == Ordering::Less
        };
        let after = |f: &Arc<FileMetaData>| {
            self.icmp.compare_user_keys(f.smallest().user_key(), largest) == Ordering::Greater
        };

        if level == 0 {
            // Level 0 files may overlap, check all
            return files
                .iter()
                .filter(|&f| !before(f) && !after(f))
                .cloned()
                .collect();
        }

        // Higher levels are sorted and disjoint: skip to the first candidate
        let start = files.partition_point(|f| before(f));
        files[start..]
            .iter()
            .take_while(|&f| !after(f))
            .cloned()
            .collect()
    }

    /// Human-readable listing of every level.
    pub fn debug_string(&self) -> String {
        let mut out = String::new();
        for (level, files) in self.files.iter().enumerate() {
            let _ = writeln!(out, "--- level {} ---", level);
            for file in files {
                let _ = writeln!(out, " {}", file.debug_string());
            }
        }
        out
    }
}

impl Clone for Version {
    fn clone(&self) -> Self {
        Self::with_files(self.icmp.clone(), self.files.clone())
    }
}

impl Drop for Version {
    fn drop(&mut self) {
        for file in self.files.iter().flatten() {
            file.release_ref();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{InternalKey, ValueType};

    fn make_key(user_key: &[u8], seq: u64) -> InternalKey {
        InternalKey::new(user_key, seq, ValueType::Value)
    }

    fn make_file(num: u64, smallest: &[u8], largest: &[u8]) -> Arc<FileMetaData> {
        Arc::new(FileMetaData::new(
            num,
            1024,
            make_key(smallest, 1),
            make_key(largest, 1),
        ))
    }

    #[test]
    fn test_version_empty() {
        let version = Version::new(InternalKeyComparator::default());
        assert_eq!(version.total_files(), 0);
        assert_eq!(version.num_files(0), 0);
        assert!(version.live_file_numbers().is_empty());
    }

    #[test]
    fn test_version_refs_follow_lifetime() {
        let file = make_file(1, b"a", b"c");
        let mut files: [Vec<Arc<FileMetaData>>; MAX_LEVELS] = Default::default();
        files[0].push(Arc::clone(&file));

        let v1 = Version::with_files(InternalKeyComparator::default(), files);
        assert_eq!(file.refs(), 1);

        let v2 = v1.clone();
        assert_eq!(file.refs(), 2);

        drop(v1);
        assert_eq!(file.refs(), 1);
        drop(v2);
        assert_eq!(file.refs(), 0);
    }

    #[test]
    fn test_overlapping_files_level0() {
        let mut files: [Vec<Arc<FileMetaData>>; MAX_LEVELS] = Default::default();
        files[0].push(make_file(1, b"a", b"c"));
        files[0].push(make_file(2, b"b", b"d"));
        files[0].push(make_file(3, b"x", b"z"));
        let version = Version::with_files(InternalKeyComparator::default(), files);

        assert_eq!(version.overlapping_files(0, b"b", b"c").len(), 2);

        let overlapping = version.overlapping_files(0, b"y", b"z");
        assert_eq!(overlapping.len(), 1);
        assert_eq!(overlapping[0].number(), 3);

        assert!(version.overlapping_files(0, b"e", b"w").is_empty());
    }

    #[test]
    fn test_overlapping_files_higher_level() {
        let mut files: [Vec<Arc<FileMetaData>>; MAX_LEVELS] = Default::default();
        files[1].push(make_file(1, b"a", b"c"));
        files[1].push(make_file(2, b"d", b"f"));
        files[1].push(make_file(3, b"g", b"i"));
        files[1].push(make_file(4, b"j", b"l"));
        let version = Version::with_files(InternalKeyComparator::default(), files);

        let overlapping = version.overlapping_files(1, b"e", b"h");
        let numbers: Vec<u64> = overlapping.iter().map(|f| f.number()).collect();
        assert_eq!(numbers, vec![2, 3]);

        let overlapping = version.overlapping_files(1, b"a", b"a");
        assert_eq!(overlapping.len(), 1);
        assert_eq!(overlapping[0].number(), 1);

        assert!(version.overlapping_files(1, b"m", b"z").is_empty());
    }

    #[test]
    fn test_all_files_and_sizes() {
        let mut files: [Vec<Arc<FileMetaData>>; MAX_LEVELS] = Default::default();
        files[0].push(make_file(1, b"a", b"b"));
        files[1].push(make_file(2, b"c", b"d"));
        files[2].push(make_file(3, b"e", b"f"));
        let version = Version::with_files(InternalKeyComparator::default(), files);

        let levels: Vec<usize> = version.all_files().map(|(level, _)| level).collect();
        assert_eq!(levels, vec![0, 1, 2]);
        assert_eq!(version.level_bytes(1), 1024);
        assert_eq!(
            version.live_file_numbers().into_iter().collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert!(version.debug_string().contains("--- level 2 ---\n 3:1024"));
    }
}
