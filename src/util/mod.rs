//! Shared helpers: varint coding, checksums, comparators and file names.

pub mod coding;
pub mod comparator;
pub mod crc;
pub mod filename;
