//! Manifest log - append-only sequence of encoded VersionEdits.
//!
//! The file is split into 32KB blocks. Each record is stored as one or more
//! physical fragments, every fragment carrying a 7-byte header:
//!
//! ```text
//! +-------------------+---------------+----------+-----------------+
//! | masked crc32 (4)  | length u16 (2)| type (1) | payload (length)|
//! +-------------------+---------------+----------+-----------------+
//! ```
//!
//! The checksum covers the type byte and the payload. A block tail too short
//! for a header is zero-filled.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Read, Write};
use std::ops::Range;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::options::{SyncMode, MANIFEST_BLOCK_SIZE};
use crate::util::crc::{crc32_multi, mask_crc, unmask_crc};
use crate::version::VersionEdit;
use crate::{Error, Result};

const BLOCK_SIZE: usize = MANIFEST_BLOCK_SIZE;

/// Fragment header size: checksum (4) + length (2) + type (1).
pub const HEADER_SIZE: usize = 7;

/// Physical fragment types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RecordType {
    /// Reserved for preallocated, never written space.
    Zero = 0,
    /// The whole record in one fragment.
    Full = 1,
    /// First fragment of a record.
    First = 2,
    /// Interior fragment of a record.
    Middle = 3,
    /// Final fragment of a record.
    Last = 4,
}

impl RecordType {
    /// Map a header byte to its type.
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(RecordType::Zero),
            1 => Some(RecordType::Full),
            2 => Some(RecordType::First),
            3 => Some(RecordType::Middle),
            4 => Some(RecordType::Last),
            _ => None,
        }
    }

    /// Header byte of this type.
    pub fn to_byte(self) -> u8 {
        self as u8
    }
}

fn fragment_checksum(record_type: u8, payload: &[u8]) -> u32 {
    crc32_multi(&[&[record_type], payload])
}

/// Appends records to a manifest file.
pub struct ManifestWriter {
    writer: BufWriter<File>,
    path: PathBuf,
    number: u64,
    /// Offset within the current block.
    block_offset: usize,
    sync_mode: SyncMode,
    unsynced_bytes: usize,
}

impl ManifestWriter {
    /// Create (or truncate) the manifest at `path`.
    pub fn create(path: &Path, number: u64, sync_mode: SyncMode) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        debug!(path = %path.display(), number, "created manifest");
        Ok(Self::with_file(file, path, number, 0, sync_mode))
    }

    /// Open an existing manifest and continue writing at its end.
    pub fn open_for_append(path: &Path, number: u64, sync_mode: SyncMode) -> Result<Self> {
        let file = OpenOptions::new().append(true).open(path)?;
        let size = file.metadata()?.len();
        let block_offset = (size % BLOCK_SIZE as u64) as usize;
        debug!(path = %path.display(), number, size, "reopened manifest for append");
        Ok(Self::with_file(file, path, number, block_offset, sync_mode))
    }

    fn with_file(
        file: File,
        path: &Path,
        number: u64,
        block_offset: usize,
        sync_mode: SyncMode,
    ) -> Self {
        Self {
            writer: BufWriter::with_capacity(BLOCK_SIZE, file),
            path: path.to_path_buf(),
            number,
            block_offset,
            sync_mode,
            unsynced_bytes: 0,
        }
    }

    /// Manifest file number.
    pub fn number(&self) -> u64 {
        self.number
    }

    /// Manifest file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Encode and append one edit.
    pub fn add_edit(&mut self, edit: &VersionEdit) -> Result<()> {
        let record = edit.encode();
        self.add_record(&record)?;
        debug!(manifest = self.number, bytes = record.len(), "appended version edit");
        Ok(())
    }

    /// Append one logical record, fragmenting it across blocks as needed.
    ///
    /// An empty record is written as a single empty `Full` fragment.
    pub fn add_record(&mut self, data: &[u8]) -> Result<()> {
        let mut rest = data;
        let mut first = true;

        loop {
            let leftover = BLOCK_SIZE - self.block_offset;
            if leftover < HEADER_SIZE {
                if leftover > 0 {
                    self.writer.write_all(&[0u8; HEADER_SIZE][..leftover])?;
                    self.unsynced_bytes += leftover;
                }
                self.block_offset = 0;
            }

            let avail = BLOCK_SIZE - self.block_offset - HEADER_SIZE;
            let take = rest.len().min(avail);
            let last = take == rest.len();

            let record_type = match (first, last) {
                (true, true) => RecordType::Full,
                (true, false) => RecordType::First,
                (false, true) => RecordType::Last,
                (false, false) => RecordType::Middle,
            };
            self.emit_fragment(record_type, &rest[..take])?;

            rest = &rest[take..];
            first = false;
            if last {
                break;
            }
        }

        self.maybe_sync()
    }

    fn emit_fragment(&mut self, record_type: RecordType, payload: &[u8]) -> Result<()> {
        debug_assert!(self.block_offset + HEADER_SIZE + payload.len() <= BLOCK_SIZE);

        let crc = mask_crc(fragment_checksum(record_type.to_byte(), payload));
        let mut header = [0u8; HEADER_SIZE];
        header[..4].copy_from_slice(&crc.to_le_bytes());
        header[4..6].copy_from_slice(&(payload.len() as u16).to_le_bytes());
        header[6] = record_type.to_byte();

        self.writer.write_all(&header)?;
        self.writer.write_all(payload)?;

        self.block_offset += HEADER_SIZE + payload.len();
        self.unsynced_bytes += HEADER_SIZE + payload.len();
        Ok(())
    }

    fn maybe_sync(&mut self) -> Result<()> {
        match self.sync_mode {
            SyncMode::Always => self.sync(),
            SyncMode::Bytes { bytes } if self.unsynced_bytes >= bytes => self.sync(),
            SyncMode::Bytes { .. } | SyncMode::None => self.flush(),
        }
    }

    /// Flush buffered data and fsync the file.
    pub fn sync(&mut self) -> Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_data()?;
        self.unsynced_bytes = 0;
        Ok(())
    }

    /// Flush buffered data to the OS without syncing.
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    /// Sync and close the manifest.
    pub fn close(mut self) -> Result<()> {
        self.sync()
    }
}

enum Fragment {
    Data(RecordType, Range<usize>),
    /// A damaged fragment was skipped.
    Skipped,
    Eof,
}

/// Reads records back from a manifest file.
///
/// With `paranoid` set any damaged fragment fails the read with
/// [`Error::Corruption`]. Otherwise the damaged bytes are skipped and
/// reported through `tracing`. A record cut short by the end of the file is
/// a torn final write and ends the log quietly in both modes.
pub struct ManifestReader {
    file: File,
    path: PathBuf,
    paranoid: bool,
    buffer: Vec<u8>,
    /// Read position within `buffer`.
    pos: usize,
    /// Valid bytes in `buffer`.
    len: usize,
    /// File offset just past the buffered block.
    buffer_end: u64,
    eof: bool,
    dropped_bytes: u64,
}

impl ManifestReader {
    /// Open the manifest at `path`.
    pub fn open(path: &Path, paranoid: bool) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self {
            file,
            path: path.to_path_buf(),
            paranoid,
            buffer: vec![0u8; BLOCK_SIZE],
            pos: 0,
            len: 0,
            buffer_end: 0,
            eof: false,
            dropped_bytes: 0,
        })
    }

    /// Manifest file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes skipped because they were damaged.
    pub fn dropped_bytes(&self) -> u64 {
        self.dropped_bytes
    }

    /// Read and decode the next edit.
    ///
    /// A record that does not decode is always fatal: its checksum was
    /// valid, so the bytes are what the writer produced.
    pub fn read_edit(&mut self) -> Result<Option<VersionEdit>> {
        match self.read_record()? {
            Some(record) => VersionEdit::decode(&record).map(Some),
            None => Ok(None),
        }
    }

    /// Read every remaining edit.
    pub fn read_all_edits(&mut self) -> Result<Vec<VersionEdit>> {
        let mut edits = Vec::new();
        while let Some(edit) = self.read_edit()? {
            edits.push(edit);
        }
        Ok(edits)
    }

    /// Read the next logical record.
    pub fn read_record(&mut self) -> Result<Option<Vec<u8>>> {
        let mut scratch = Vec::new();
        let mut in_record = false;

        loop {
            match self.read_fragment()? {
                Fragment::Data(RecordType::Full, range) => {
                    if in_record {
                        self.report("partial record without end", scratch.len())?;
                    }
                    return Ok(Some(self.buffer[range].to_vec()));
                }
                Fragment::Data(RecordType::First, range) => {
                    if in_record {
                        self.report("partial record without end", scratch.len())?;
                    }
                    scratch.clear();
                    scratch.extend_from_slice(&self.buffer[range]);
                    in_record = true;
                }
                Fragment::Data(RecordType::Middle, range) => {
                    if in_record {
                        scratch.extend_from_slice(&self.buffer[range]);
                    } else {
                        self.report("missing start of fragmented record", range.len())?;
                    }
                }
                Fragment::Data(RecordType::Last, range) => {
                    if in_record {
                        scratch.extend_from_slice(&self.buffer[range]);
                        return Ok(Some(scratch));
                    }
                    self.report("missing start of fragmented record", range.len())?;
                }
                Fragment::Data(RecordType::Zero, range) => {
                    self.report("unexpected zero-type fragment", range.len())?;
                }
                Fragment::Skipped => {
                    if in_record {
                        self.report("error in middle of record", scratch.len())?;
                        scratch.clear();
                        in_record = false;
                    }
                }
                Fragment::Eof => {
                    if in_record {
                        debug!(
                            path = %self.path.display(),
                            bytes = scratch.len(),
                            "ignoring torn record at end of manifest"
                        );
                    }
                    return Ok(None);
                }
            }
        }
    }

    fn read_fragment(&mut self) -> Result<Fragment> {
        loop {
            if self.len - self.pos < HEADER_SIZE {
                if self.eof {
                    // Short trailer or a torn header.
                    return Ok(Fragment::Eof);
                }
                self.fill_block()?;
                continue;
            }

            let header = &self.buffer[self.pos..self.pos + HEADER_SIZE];
            let stored_crc = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
            let length = u16::from_le_bytes([header[4], header[5]]) as usize;
            let type_byte = header[6];

            if HEADER_SIZE + length > self.len - self.pos {
                if self.eof {
                    return Ok(Fragment::Eof);
                }
                let skipped = self.len - self.pos;
                self.report("bad fragment length", skipped)?;
                self.pos = self.len;
                return Ok(Fragment::Skipped);
            }

            if type_byte == RecordType::Zero.to_byte() && length == 0 {
                // Preallocated space; nothing more in this block.
                self.pos = self.len;
                continue;
            }

            let start = self.pos + HEADER_SIZE;
            let end = start + length;
            if unmask_crc(stored_crc) != fragment_checksum(type_byte, &self.buffer[start..end]) {
                // The length itself may be damaged, so the rest of the block
                // cannot be trusted.
                let skipped = self.len - self.pos;
                self.report("checksum mismatch", skipped)?;
                self.pos = self.len;
                return Ok(Fragment::Skipped);
            }
            self.pos = end;

            match RecordType::from_byte(type_byte) {
                Some(record_type) => return Ok(Fragment::Data(record_type, start..end)),
                None => {
                    self.report(
                        &format!("unknown fragment type {}", type_byte),
                        HEADER_SIZE + length,
                    )?;
                    return Ok(Fragment::Skipped);
                }
            }
        }
    }

    fn fill_block(&mut self) -> Result<()> {
        let mut filled = 0;
        while filled < BLOCK_SIZE {
            let n = self.file.read(&mut self.buffer[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        if filled < BLOCK_SIZE {
            self.eof = true;
        }
        self.pos = 0;
        self.len = filled;
        self.buffer_end += filled as u64;
        Ok(())
    }

    /// File offset of the current read position.
    fn offset(&self) -> u64 {
        self.buffer_end - (self.len - self.pos) as u64
    }

    fn report(&mut self, reason: &str, bytes: usize) -> Result<()> {
        let offset = self.offset();
        if self.paranoid {
            return Err(Error::corruption(format!(
                "{}: {} at offset {}",
                self.path.display(),
                reason,
                offset
            )));
        }
        warn!(
            path = %self.path.display(),
            offset,
            bytes,
            reason,
            "skipping damaged manifest data"
        );
        self.dropped_bytes += bytes as u64;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{InternalKey, ValueType};
    use std::fs;
    use tempfile::tempdir;

    fn make_key(user_key: &[u8], seq: u64) -> InternalKey {
        InternalKey::new(user_key, seq, ValueType::Value)
    }

    fn write_records(path: &Path, records: &[Vec<u8>]) {
        let mut writer = ManifestWriter::create(path, 1, SyncMode::None).unwrap();
        for record in records {
            writer.add_record(record).unwrap();
        }
        writer.close().unwrap();
    }

    fn read_records(path: &Path, paranoid: bool) -> Result<Vec<Vec<u8>>> {
        let mut reader = ManifestReader::open(path, paranoid)?;
        let mut records = Vec::new();
        while let Some(record) = reader.read_record()? {
            records.push(record);
        }
        Ok(records)
    }

    fn corrupt_byte(path: &Path, offset: usize) {
        let mut data = fs::read(path).unwrap();
        data[offset] ^= 0xff;
        fs::write(path, data).unwrap();
    }

    #[test]
    fn test_empty_manifest() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("MANIFEST-000001");
        ManifestWriter::create(&path, 1, SyncMode::None)
            .unwrap()
            .close()
            .unwrap();

        let mut reader = ManifestReader::open(&path, true).unwrap();
        assert!(reader.read_edit().unwrap().is_none());
    }

    #[test]
    fn test_edits_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("MANIFEST-000001");

        let mut writer = ManifestWriter::create(&path, 1, SyncMode::Always).unwrap();
        let mut written = Vec::new();
        for i in 0..10u64 {
            let mut edit = VersionEdit::new();
            edit.set_last_sequence(i * 100);
            edit.add_file(
                (i % 7) as usize,
                i + 1,
                1024 * (i + 1),
                make_key(b"start", i + 1),
                make_key(b"end", i),
            );
            if i % 3 == 0 {
                edit.delete_file(1, 1000 + i);
            }
            writer.add_edit(&edit).unwrap();
            written.push(edit);
        }
        writer.close().unwrap();

        let mut reader = ManifestReader::open(&path, true).unwrap();
        assert_eq!(reader.read_all_edits().unwrap(), written);
        assert_eq!(reader.dropped_bytes(), 0);
    }

    #[test]
    fn test_empty_record() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("MANIFEST-000001");
        write_records(&path, &[Vec::new(), b"x".to_vec()]);

        assert_eq!(fs::metadata(&path).unwrap().len() as usize, 2 * HEADER_SIZE + 1);
        assert_eq!(
            read_records(&path, true).unwrap(),
            vec![Vec::new(), b"x".to_vec()]
        );
    }

    #[test]
    fn test_record_spanning_blocks() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("MANIFEST-000001");
        let big: Vec<u8> = (0..3 * BLOCK_SIZE).map(|i| (i % 251) as u8).collect();
        write_records(&path, &[b"small".to_vec(), big.clone(), b"tail".to_vec()]);

        assert_eq!(
            read_records(&path, true).unwrap(),
            vec![b"small".to_vec(), big, b"tail".to_vec()]
        );
    }

    #[test]
    fn test_block_trailer_is_zero_filled() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("MANIFEST-000001");
        // Leaves 3 bytes in the first block, too few for a header.
        let first = vec![b'a'; BLOCK_SIZE - HEADER_SIZE - 3];
        write_records(&path, &[first.clone(), b"next".to_vec()]);

        let data = fs::read(&path).unwrap();
        assert_eq!(data.len(), BLOCK_SIZE + HEADER_SIZE + 4);
        assert_eq!(&data[BLOCK_SIZE - 3..BLOCK_SIZE], &[0, 0, 0]);
        assert_eq!(
            read_records(&path, true).unwrap(),
            vec![first, b"next".to_vec()]
        );
    }

    #[test]
    fn test_append_after_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("MANIFEST-000001");

        let mut first = VersionEdit::new();
        first.set_log_number(1);
        let mut writer = ManifestWriter::create(&path, 1, SyncMode::None).unwrap();
        writer.add_edit(&first).unwrap();
        writer.close().unwrap();

        let mut second = VersionEdit::new();
        second.set_log_number(2);
        let mut writer = ManifestWriter::open_for_append(&path, 1, SyncMode::Always).unwrap();
        assert_eq!(writer.number(), 1);
        writer.add_edit(&second).unwrap();
        writer.close().unwrap();

        let mut reader = ManifestReader::open(&path, true).unwrap();
        assert_eq!(reader.read_all_edits().unwrap(), vec![first, second]);
    }

    #[test]
    fn test_torn_tail_is_end_of_log() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("MANIFEST-000001");
        write_records(&path, &[b"complete".to_vec(), b"torn record".to_vec()]);

        let size = fs::metadata(&path).unwrap().len();
        let file = OpenOptions::new().write(true).open(&path).unwrap();
        file.set_len(size - 3).unwrap();

        assert_eq!(read_records(&path, true).unwrap(), vec![b"complete".to_vec()]);
    }

    #[test]
    fn test_torn_fragmented_record_is_end_of_log() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("MANIFEST-000001");
        let big = vec![7u8; BLOCK_SIZE + 100];
        write_records(&path, &[b"complete".to_vec(), big]);

        // Cut into the Last fragment; the First fragment is intact.
        let file = OpenOptions::new().write(true).open(&path).unwrap();
        file.set_len(BLOCK_SIZE as u64 + 20).unwrap();

        assert_eq!(read_records(&path, true).unwrap(), vec![b"complete".to_vec()]);
    }

    #[test]
    fn test_checksum_mismatch_paranoid() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("MANIFEST-000001");
        write_records(&path, &[b"one".to_vec(), b"two".to_vec(), b"three".to_vec()]);
        // Payload of the second record.
        corrupt_byte(&path, HEADER_SIZE + 3 + HEADER_SIZE);

        let mut reader = ManifestReader::open(&path, true).unwrap();
        assert_eq!(reader.read_record().unwrap(), Some(b"one".to_vec()));
        let err = reader.read_record().unwrap_err();
        assert!(err.is_corruption());
        assert!(err.to_string().contains("checksum mismatch at offset 10"));
    }

    #[test]
    fn test_checksum_mismatch_lenient_skips_block() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("MANIFEST-000001");
        let spanning = vec![9u8; 40_000];
        write_records(
            &path,
            &[b"0123456789".to_vec(), spanning, b"survivor".to_vec()],
        );
        corrupt_byte(&path, HEADER_SIZE);

        let mut reader = ManifestReader::open(&path, false).unwrap();
        let mut records = Vec::new();
        while let Some(record) = reader.read_record().unwrap() {
            records.push(record);
        }

        // The damaged block takes the first record and the head of the
        // spanning one with it; its orphaned tail is dropped too.
        assert_eq!(records, vec![b"survivor".to_vec()]);
        assert!(reader.dropped_bytes() >= BLOCK_SIZE as u64);
    }

    #[test]
    fn test_undecodable_edit_is_fatal() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("MANIFEST-000001");
        // Tag 8 is retired.
        write_records(&path, &[vec![8, 1]]);

        let mut reader = ManifestReader::open(&path, false).unwrap();
        let err = reader.read_edit().unwrap_err();
        assert!(err.is_corruption());
    }

    #[test]
    fn test_record_type_bytes() {
        for b in 0..=4u8 {
            assert_eq!(RecordType::from_byte(b).map(RecordType::to_byte), Some(b));
        }
        assert_eq!(RecordType::from_byte(5), None);
    }
}
