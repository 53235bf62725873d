//! VersionEdit - describes changes between versions.
//!
//! An edit is the unit of durability (one manifest record) and of atomicity
//! (a Version is derived from whole edits only). The encoding is a sequence of
//! tagged fields:
//!
//! ```text
//! Comparator      1 | len | name
//! LogNumber       2 | varint64
//! PrevLogNumber   9 | varint64
//! NextFileNumber  3 | varint64
//! LastSequence    4 | varint64
//! CompactPointer  5 | level | len | internal key      (repeated)
//! DeletedFile     6 | level | varint64 file number    (repeated)
//! NewFile         7 | level | number | size | len | smallest | len | largest
//! ```
//!
//! Tags, levels and lengths are varint32. Fields are always emitted in the
//! order above, so equal edits encode to identical bytes.

use bytes::{Bytes, BytesMut};
use std::collections::BTreeSet;
use std::fmt::Write;

use crate::options::MAX_LEVELS;
use crate::slice::Slice;
use crate::types::{InternalKey, SequenceNumber};
use crate::util::coding::{
    get_length_prefixed_slice, get_varint32, get_varint64, put_length_prefixed_slice,
    put_varint32, put_varint64,
};
use crate::{Error, Result};

use super::{EditTag, FileMetaData};

/// A VersionEdit describes the changes between two Versions.
///
/// It records:
/// - Watermarks: log numbers, next file number, last sequence
/// - Compaction pointers per level
/// - Files to delete, as a set of (level, file number)
/// - Files to add, in insertion order
///
/// Construct one per flush, compaction or recovery step; do not reuse an
/// edit after it has been logged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionEdit {
    comparator: Option<String>,
    log_number: Option<u64>,
    prev_log_number: Option<u64>,
    next_file_number: Option<u64>,
    last_sequence: Option<SequenceNumber>,
    compact_pointers: Vec<(usize, InternalKey)>,
    deleted_files: BTreeSet<(usize, u64)>,
    new_files: Vec<(usize, FileMetaData)>,
}

impl VersionEdit {
    /// Create a new empty edit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset to the empty state.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Record the name of the comparator that orders user keys.
    pub fn set_comparator_name(&mut self, name: impl Into<String>) {
        self.comparator = Some(name.into());
    }

    /// Set the log number.
    pub fn set_log_number(&mut self, num: u64) {
        self.log_number = Some(num);
    }

    /// Set the previous log number.
    pub fn set_prev_log_number(&mut self, num: u64) {
        self.prev_log_number = Some(num);
    }

    /// Set the next file number.
    pub fn set_next_file_number(&mut self, num: u64) {
        self.next_file_number = Some(num);
    }

    /// Set the last sequence number.
    pub fn set_last_sequence(&mut self, seq: SequenceNumber) {
        self.last_sequence = Some(seq);
    }

    /// Record where the next compaction of `level` should resume.
    ///
    /// Pairs accumulate; when several name the same level the last one wins
    /// on application.
    pub fn set_compact_pointer(&mut self, level: usize, key: InternalKey) {
        assert!(level < MAX_LEVELS, "level {} out of range", level);
        self.compact_pointers.push((level, key));
    }

    /// Add the specified file at the specified level.
    ///
    /// `smallest` and `largest` must be the smallest and largest keys in the
    /// file.
    pub fn add_file(
        &mut self,
        level: usize,
        number: u64,
        file_size: u64,
        smallest: InternalKey,
        largest: InternalKey,
    ) {
        assert!(level < MAX_LEVELS, "level {} out of range", level);
        debug_assert!(
            !self.deleted_files.contains(&(level, number)),
            "file {} both added to and deleted from level {}",
            number,
            level
        );
        self.new_files
            .push((level, FileMetaData::new(number, file_size, smallest, largest)));
    }

    /// Delete the specified file from the specified level.
    ///
    /// Deleting the same file twice is a no-op.
    pub fn delete_file(&mut self, level: usize, number: u64) {
        assert!(level < MAX_LEVELS, "level {} out of range", level);
        debug_assert!(
            !self
                .new_files
                .iter()
                .any(|(l, f)| *l == level && f.number() == number),
            "file {} both added to and deleted from level {}",
            number,
            level
        );
        self.deleted_files.insert((level, number));
    }

    /// Check if the edit is empty.
    pub fn is_empty(&self) -> bool {
        self.comparator.is_none()
            && self.log_number.is_none()
            && self.prev_log_number.is_none()
            && self.next_file_number.is_none()
            && self.last_sequence.is_none()
            && self.compact_pointers.is_empty()
            && self.deleted_files.is_empty()
            && self.new_files.is_empty()
    }

    /// Comparator name, if recorded.
    pub fn comparator_name(&self) -> Option<&str> {
        self.comparator.as_deref()
    }

    /// Log number, if set.
    pub fn log_number(&self) -> Option<u64> {
        self.log_number
    }

    /// Previous log number, if set.
    pub fn prev_log_number(&self) -> Option<u64> {
        self.prev_log_number
    }

    /// Next file number, if set.
    pub fn next_file_number(&self) -> Option<u64> {
        self.next_file_number
    }

    /// Last sequence number, if set.
    pub fn last_sequence(&self) -> Option<SequenceNumber> {
        self.last_sequence
    }

    /// Compaction pointers in the order they were set.
    pub fn compact_pointers(&self) -> &[(usize, InternalKey)] {
        &self.compact_pointers
    }

    /// Files to delete, as (level, file number).
    pub fn deleted_files(&self) -> &BTreeSet<(usize, u64)> {
        &self.deleted_files
    }

    /// Files to add, in the order they were added.
    pub fn new_files(&self) -> &[(usize, FileMetaData)] {
        &self.new_files
    }

    /// Append the encoded edit to `buf`.
    pub fn encode_to(&self, buf: &mut BytesMut) {
        if let Some(ref name) = self.comparator {
            put_varint32(buf, EditTag::Comparator.to_u32());
            put_length_prefixed_slice(buf, name.as_bytes());
        }
        if let Some(num) = self.log_number {
            put_varint32(buf, EditTag::LogNumber.to_u32());
            put_varint64(buf, num);
        }
        if let Some(num) = self.prev_log_number {
            put_varint32(buf, EditTag::PrevLogNumber.to_u32());
            put_varint64(buf, num);
        }
        if let Some(num) = self.next_file_number {
            put_varint32(buf, EditTag::NextFileNumber.to_u32());
            put_varint64(buf, num);
        }
        if let Some(seq) = self.last_sequence {
            put_varint32(buf, EditTag::LastSequence.to_u32());
            put_varint64(buf, seq);
        }

        for (level, key) in &self.compact_pointers {
            put_varint32(buf, EditTag::CompactPointer.to_u32());
            put_varint32(buf, *level as u32);
            put_length_prefixed_slice(buf, key.encoded());
        }

        for &(level, number) in &self.deleted_files {
            put_varint32(buf, EditTag::DeletedFile.to_u32());
            put_varint32(buf, level as u32);
            put_varint64(buf, number);
        }

        for (level, file) in &self.new_files {
            put_varint32(buf, EditTag::NewFile.to_u32());
            put_varint32(buf, *level as u32);
            put_varint64(buf, file.number());
            put_varint64(buf, file.file_size());
            put_length_prefixed_slice(buf, file.smallest().encoded());
            put_length_prefixed_slice(buf, file.largest().encoded());
        }
    }

    /// Encode the edit to bytes.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(256);
        self.encode_to(&mut buf);
        buf.freeze()
    }

    /// Decode an edit from bytes.
    ///
    /// Decoding is all-or-nothing: any unknown tag, truncated field or level
    /// outside `[0, MAX_LEVELS)` yields `Error::Corruption` and no edit.
    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut edit = VersionEdit::new();
        let mut reader = EditReader::new(data);

        while !reader.is_empty() {
            let tag_offset = reader.offset();
            let raw = reader.varint32("tag")?;
            let tag = EditTag::from_u32(raw).ok_or_else(|| {
                Error::corruption(format!(
                    "version edit: unknown tag {} (at byte {})",
                    raw, tag_offset
                ))
            })?;
            let field = tag.field_name();

            match tag {
                EditTag::Comparator => {
                    let name = reader.length_prefixed(field)?;
                    let name = std::str::from_utf8(name.data()).map_err(|_| {
                        Error::corruption(format!(
                            "version edit: {} is not valid UTF-8 (at byte {})",
                            field, tag_offset
                        ))
                    })?;
                    edit.comparator = Some(name.to_string());
                }
                EditTag::LogNumber => {
                    edit.log_number = Some(reader.varint64(field)?);
                }
                EditTag::PrevLogNumber => {
                    edit.prev_log_number = Some(reader.varint64(field)?);
                }
                EditTag::NextFileNumber => {
                    edit.next_file_number = Some(reader.varint64(field)?);
                }
                EditTag::LastSequence => {
                    edit.last_sequence = Some(reader.varint64(field)?);
                }
                EditTag::CompactPointer => {
                    let level = reader.level(field)?;
                    let key = reader.internal_key(field)?;
                    edit.compact_pointers.push((level, key));
                }
                EditTag::DeletedFile => {
                    let level = reader.level(field)?;
                    let number = reader.varint64(field)?;
                    edit.deleted_files.insert((level, number));
                }
                EditTag::NewFile => {
                    let level = reader.level(field)?;
                    let number = reader.varint64(field)?;
                    let file_size = reader.varint64(field)?;
                    let smallest = reader.internal_key(field)?;
                    let largest = reader.internal_key(field)?;
                    edit.new_files.push((
                        level,
                        FileMetaData::new(number, file_size, smallest, largest),
                    ));
                }
            }
        }

        Ok(edit)
    }

    /// Stable human-readable dump of every present field, in encoding order.
    pub fn debug_string(&self) -> String {
        let mut out = String::from("VersionEdit {");
        if let Some(ref name) = self.comparator {
            let _ = write!(out, "\n  Comparator: {}", name);
        }
        if let Some(num) = self.log_number {
            let _ = write!(out, "\n  LogNumber: {}", num);
        }
        if let Some(num) = self.prev_log_number {
            let _ = write!(out, "\n  PrevLogNumber: {}", num);
        }
        if let Some(num) = self.next_file_number {
            let _ = write!(out, "\n  NextFile: {}", num);
        }
        if let Some(seq) = self.last_sequence {
            let _ = write!(out, "\n  LastSeq: {}", seq);
        }
        for (level, key) in &self.compact_pointers {
            let _ = write!(out, "\n  CompactPointer: {} {}", level, key.debug_string());
        }
        for (level, number) in &self.deleted_files {
            let _ = write!(out, "\n  DeleteFile: {} {}", level, number);
        }
        for (level, file) in &self.new_files {
            let _ = write!(out, "\n  AddFile: {} {}", level, file.debug_string());
        }
        out.push_str("\n}\n");
        out
    }
}

/// Cursor over an encoded edit that turns short reads into corruption errors
/// naming the field and the byte offset.
struct EditReader<'a> {
    total: usize,
    input: Slice<'a>,
}

impl<'a> EditReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self {
            total: data.len(),
            input: Slice::new(data),
        }
    }

    fn is_empty(&self) -> bool {
        self.input.is_empty()
    }

    fn offset(&self) -> usize {
        self.total - self.input.len()
    }

    fn truncated(&self, field: &str) -> Error {
        Error::corruption(format!(
            "version edit: {} truncated or malformed (at byte {})",
            field,
            self.offset()
        ))
    }

    fn varint32(&mut self, field: &str) -> Result<u32> {
        get_varint32(&mut self.input).ok_or_else(|| self.truncated(field))
    }

    fn varint64(&mut self, field: &str) -> Result<u64> {
        get_varint64(&mut self.input).ok_or_else(|| self.truncated(field))
    }

    fn length_prefixed(&mut self, field: &str) -> Result<Slice<'a>> {
        get_length_prefixed_slice(&mut self.input).ok_or_else(|| self.truncated(field))
    }

    fn level(&mut self, field: &str) -> Result<usize> {
        let offset = self.offset();
        let level = self.varint32(field)? as usize;
        if level >= MAX_LEVELS {
            return Err(Error::corruption(format!(
                "version edit: {}: bad level {} (at byte {})",
                field, level, offset
            )));
        }
        Ok(level)
    }

    fn internal_key(&mut self, field: &str) -> Result<InternalKey> {
        let offset = self.offset();
        let raw = self.length_prefixed(field)?;
        InternalKey::decode_from(raw.data()).ok_or_else(|| {
            Error::corruption(format!(
                "version edit: {}: invalid internal key (at byte {})",
                field, offset
            ))
        })
    }
}
