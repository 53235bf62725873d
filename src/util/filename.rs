//! Database file naming conventions and the CURRENT pointer.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// File types in the database directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    /// Write-ahead log file.
    Log,
    /// Sorted table file.
    Table,
    /// Manifest file (version history).
    Manifest,
    /// Current file (points to current manifest).
    Current,
    /// Temporary file.
    Temp,
}

/// Name of the manifest file with the given number, relative to the db dir.
pub fn manifest_name(number: u64) -> String {
    format!("MANIFEST-{:06}", number)
}

/// Generate the current file path.
pub fn current_file_path(db_path: &Path) -> PathBuf {
    db_path.join("CURRENT")
}

/// Generate a manifest file path.
pub fn manifest_file_path(db_path: &Path, number: u64) -> PathBuf {
    db_path.join(manifest_name(number))
}

/// Generate a log (WAL) file path.
pub fn log_file_path(db_path: &Path, number: u64) -> PathBuf {
    db_path.join(format!("{:06}.log", number))
}

/// Generate a table file path.
pub fn table_file_path(db_path: &Path, number: u64) -> PathBuf {
    db_path.join(format!("{:06}.ldb", number))
}

/// Generate a temporary file path.
pub fn temp_file_path(db_path: &Path, number: u64) -> PathBuf {
    db_path.join(format!("{:06}.dbtmp", number))
}

/// Parse a file name and return its type and number.
///
/// Returns `None` if the file name doesn't match any known pattern.
pub fn parse_file_name(name: &str) -> Option<(FileType, u64)> {
    if name == "CURRENT" {
        return Some((FileType::Current, 0));
    }

    if let Some(suffix) = name.strip_prefix("MANIFEST-") {
        return parse_number(suffix).map(|n| (FileType::Manifest, n));
    }

    let (num_str, ext) = name.split_once('.')?;
    let number = parse_number(num_str)?;
    let file_type = match ext {
        "log" => FileType::Log,
        "ldb" | "sst" => FileType::Table,
        "dbtmp" => FileType::Temp,
        _ => return None,
    };
    Some((file_type, number))
}

fn parse_number(s: &str) -> Option<u64> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// Point CURRENT at the manifest with the given number.
///
/// The new contents are written to a temp file, synced, and renamed over
/// CURRENT, so readers see either the old or the new manifest name. The
/// directory is synced after the rename, so the switch is durable before
/// the caller removes the old manifest.
pub fn set_current_file(db_path: &Path, manifest_number: u64) -> Result<()> {
    let temp_path = temp_file_path(db_path, manifest_number);

    let written = (|| -> Result<()> {
        let mut file = File::create(&temp_path)?;
        writeln!(file, "{}", manifest_name(manifest_number))?;
        file.sync_all()?;
        fs::rename(&temp_path, current_file_path(db_path))?;
        sync_dir(db_path)?;
        Ok(())
    })();

    if written.is_err() {
        let _ = fs::remove_file(&temp_path);
    }
    written
}

/// Read the manifest name recorded in CURRENT.
///
/// Returns `Ok(None)` if there is no CURRENT file.
pub fn read_current_file(db_path: &Path) -> Result<Option<String>> {
    let content = match fs::read_to_string(current_file_path(db_path)) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let name = content
        .strip_suffix('\n')
        .filter(|name| !name.is_empty())
        .ok_or_else(|| Error::corruption("CURRENT file does not end with newline"))?;
    Ok(Some(name.to_string()))
}

/// Sync a directory so renames and removals in it are durable.
pub fn sync_dir(path: &Path) -> Result<()> {
    File::open(path)?.sync_all()?;
    Ok(())
}

/// Check if a database exists at the given path.
pub fn database_exists(db_path: &Path) -> bool {
    current_file_path(db_path).exists()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_file_paths() {
        let db_path = Path::new("/data/db");

        assert_eq!(current_file_path(db_path), Path::new("/data/db/CURRENT"));
        assert_eq!(
            manifest_file_path(db_path, 5),
            Path::new("/data/db/MANIFEST-000005")
        );
        assert_eq!(log_file_path(db_path, 123), Path::new("/data/db/000123.log"));
        assert_eq!(
            table_file_path(db_path, 456),
            Path::new("/data/db/000456.ldb")
        );
        assert_eq!(
            temp_file_path(db_path, 789),
            Path::new("/data/db/000789.dbtmp")
        );
    }

    #[test]
    fn test_parse_file_name() {
        assert_eq!(parse_file_name("CURRENT"), Some((FileType::Current, 0)));
        assert_eq!(
            parse_file_name("MANIFEST-000005"),
            Some((FileType::Manifest, 5))
        );
        assert_eq!(parse_file_name("000123.log"), Some((FileType::Log, 123)));
        assert_eq!(parse_file_name("000456.ldb"), Some((FileType::Table, 456)));
        assert_eq!(parse_file_name("000456.sst"), Some((FileType::Table, 456)));
        assert_eq!(parse_file_name("000789.dbtmp"), Some((FileType::Temp, 789)));

        assert_eq!(parse_file_name("MANIFEST-"), None);
        assert_eq!(parse_file_name("MANIFEST-+12"), None);
        assert_eq!(parse_file_name("manifest-000001"), None);
        assert_eq!(parse_file_name("random.txt"), None);
        assert_eq!(parse_file_name("abc.log"), None);
    }

    #[test]
    fn test_set_and_read_current() {
        let dir = tempdir().unwrap();

        assert_eq!(read_current_file(dir.path()).unwrap(), None);
        assert!(!database_exists(dir.path()));

        set_current_file(dir.path(), 42).unwrap();
        assert_eq!(
            read_current_file(dir.path()).unwrap(),
            Some("MANIFEST-000042".to_string())
        );
        assert!(database_exists(dir.path()));
        assert!(!temp_file_path(dir.path(), 42).exists());

        set_current_file(dir.path(), 43).unwrap();
        assert_eq!(
            read_current_file(dir.path()).unwrap(),
            Some("MANIFEST-000043".to_string())
        );
    }

    #[test]
    fn test_sync_dir() {
        let dir = tempdir().unwrap();
        sync_dir(dir.path()).unwrap();

        let missing = dir.path().join("missing");
        assert!(sync_dir(&missing).is_err());
        assert!(set_current_file(&missing, 1).is_err());
        assert!(!temp_file_path(&missing, 1).exists());
    }

    #[test]
    fn test_current_without_newline_is_corruption() {
        let dir = tempdir().unwrap();
        fs::write(current_file_path(dir.path()), "MANIFEST-000001").unwrap();

        let err = read_current_file(dir.path()).unwrap_err();
        assert!(err.is_corruption());
    }
}
