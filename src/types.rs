//! Core key types.

use bytes::{BufMut, Bytes, BytesMut};
use std::cmp::Ordering;
use std::fmt;

use crate::slice::escape_bytes;
use crate::util::coding::decode_fixed64;

/// Monotonically assigned write sequence number.
pub type SequenceNumber = u64;

/// Largest sequence number that fits next to the value type in the trailer.
pub const MAX_SEQUENCE_NUMBER: SequenceNumber = (1 << 56) - 1;

/// Length of the packed (sequence, type) trailer of an internal key.
pub const INTERNAL_KEY_TRAILER_LEN: usize = 8;

/// Value type indicator in internal keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum ValueType {
    /// Deletion marker (tombstone).
    Deletion = 0,
    /// Normal value.
    Value = 1,
}

impl ValueType {
    /// Value type used when building a key to seek to: sorts first among
    /// entries with the same user key and sequence.
    pub const FOR_SEEK: ValueType = ValueType::Value;

    /// Create from byte.
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(ValueType::Deletion),
            1 => Some(ValueType::Value),
            _ => None,
        }
    }

    /// Convert to byte.
    pub fn to_byte(self) -> u8 {
        self as u8
    }
}

fn pack_sequence_and_type(sequence: SequenceNumber, value_type: ValueType) -> u64 {
    debug_assert!(sequence <= MAX_SEQUENCE_NUMBER);
    (sequence << 8) | value_type.to_byte() as u64
}

/// Return the user key portion of an encoded internal key.
///
/// Inputs shorter than the trailer are returned unchanged.
pub fn extract_user_key(internal_key: &[u8]) -> &[u8] {
    if internal_key.len() < INTERNAL_KEY_TRAILER_LEN {
        internal_key
    } else {
        &internal_key[..internal_key.len() - INTERNAL_KEY_TRAILER_LEN]
    }
}

/// Internal key format used for storage and in version edits.
///
/// An internal key combines:
/// - User key (the key provided by the user)
/// - Sequence number (version for MVCC)
/// - Value type (Value or Deletion)
///
/// The key is kept in its encoded form, which is what the manifest stores:
/// ```text
/// [user_key][fixed64 little-endian: sequence << 8 | value_type]
/// ```
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct InternalKey {
    rep: Bytes,
}

impl InternalKey {
    /// Create a new internal key.
    pub fn new(
        user_key: impl AsRef<[u8]>,
        sequence: SequenceNumber,
        value_type: ValueType,
    ) -> Self {
        let user_key = user_key.as_ref();
        let mut buf = BytesMut::with_capacity(user_key.len() + INTERNAL_KEY_TRAILER_LEN);
        buf.put_slice(user_key);
        buf.put_u64_le(pack_sequence_and_type(sequence, value_type));
        Self { rep: buf.freeze() }
    }

    /// Rebuild an internal key from its encoded form.
    ///
    /// Returns `None` if the input is too short to hold the trailer or the
    /// value type is unknown.
    pub fn decode_from(data: &[u8]) -> Option<Self> {
        let trailer = data.len().checked_sub(INTERNAL_KEY_TRAILER_LEN)?;
        let packed = decode_fixed64(&data[trailer..])?;
        ValueType::from_byte((packed & 0xff) as u8)?;
        Some(Self {
            rep: Bytes::copy_from_slice(data),
        })
    }

    /// The encoded key bytes.
    pub fn encoded(&self) -> &[u8] {
        &self.rep
    }

    /// Get the user key.
    pub fn user_key(&self) -> &[u8] {
        extract_user_key(&self.rep)
    }

    fn packed_trailer(&self) -> u64 {
        decode_fixed64(&self.rep[self.rep.len() - INTERNAL_KEY_TRAILER_LEN..]).unwrap_or(0)
    }

    /// Get the sequence number.
    pub fn sequence(&self) -> SequenceNumber {
        self.packed_trailer() >> 8
    }

    /// Get the value type.
    pub fn value_type(&self) -> ValueType {
        ValueType::from_byte((self.packed_trailer() & 0xff) as u8).unwrap_or(ValueType::Deletion)
    }

    /// Human-readable form: `'user_key' @ sequence : type`.
    pub fn debug_string(&self) -> String {
        format!(
            "'{}' @ {} : {}",
            escape_bytes(self.user_key()),
            self.sequence(),
            self.value_type().to_byte()
        )
    }
}

impl fmt::Debug for InternalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InternalKey({})", self.debug_string())
    }
}

impl Ord for InternalKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.user_key().cmp(other.user_key()) {
            // Same user key: newer sequence first
            Ordering::Equal => other.packed_trailer().cmp(&self.packed_trailer()),
            ord => ord,
        }
    }
}

impl PartialOrd for InternalKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
