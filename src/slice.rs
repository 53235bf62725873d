//! Borrowed byte views.
//!
//! A [`Slice`] points into a buffer owned by someone else. The lifetime
//! parameter ties the view to that buffer, so a slice can never outlive the
//! storage it refers to. Slices are `Copy` and may be read from any number of
//! threads at once; narrowing one with [`Slice::remove_prefix`] only changes
//! the caller's copy.

use bytes::Bytes;
use std::cmp::Ordering;
use std::fmt;
use std::ops::Index;

/// A non-owning view over a run of bytes.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Slice<'a> {
    data: &'a [u8],
}

impl<'a> Slice<'a> {
    /// Create a slice referring to `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    /// Create an empty slice.
    pub fn empty() -> Self {
        Self { data: &[] }
    }

    /// The referenced bytes.
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Length of the referenced data in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the slice is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Drop the first `n` bytes from this view.
    ///
    /// # Panics
    ///
    /// Panics if `n > self.len()`.
    pub fn remove_prefix(&mut self, n: usize) {
        assert!(n <= self.data.len(), "remove_prefix past end of slice");
        self.data = &self.data[n..];
    }

    /// Split off the first `n` bytes, advancing this view past them.
    ///
    /// Returns `None` without consuming anything if fewer than `n` bytes remain.
    pub fn take_prefix(&mut self, n: usize) -> Option<Slice<'a>> {
        if n > self.data.len() {
            return None;
        }
        let (head, tail) = self.data.split_at(n);
        self.data = tail;
        Some(Slice::new(head))
    }

    /// Three-way comparison: bytewise, then shorter first.
    pub fn compare(&self, other: &Slice<'_>) -> Ordering {
        self.data.cmp(other.data)
    }

    /// Check whether `prefix` is a prefix of this slice.
    pub fn starts_with(&self, prefix: &Slice<'_>) -> bool {
        self.data.starts_with(prefix.data)
    }

    /// Copy the referenced bytes into a vector.
    pub fn to_vec(&self) -> Vec<u8> {
        self.data.to_vec()
    }

    /// Copy the referenced bytes into an owned `Bytes`.
    pub fn to_bytes(&self) -> Bytes {
        Bytes::copy_from_slice(self.data)
    }
}

impl Index<usize> for Slice<'_> {
    type Output = u8;

    fn index(&self, n: usize) -> &u8 {
        &self.data[n]
    }
}

impl PartialOrd for Slice<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Slice<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.compare(other)
    }
}

impl<'a> From<&'a [u8]> for Slice<'a> {
    fn from(data: &'a [u8]) -> Self {
        Slice::new(data)
    }
}

impl<'a, const N: usize> From<&'a [u8; N]> for Slice<'a> {
    fn from(data: &'a [u8; N]) -> Self {
        Slice::new(data)
    }
}

impl<'a> From<&'a str> for Slice<'a> {
    fn from(s: &'a str) -> Self {
        Slice::new(s.as_bytes())
    }
}

impl<'a> From<&'a Vec<u8>> for Slice<'a> {
    fn from(v: &'a Vec<u8>) -> Self {
        Slice::new(v)
    }
}

impl<'a> From<&'a Bytes> for Slice<'a> {
    fn from(b: &'a Bytes) -> Self {
        Slice::new(b)
    }
}

impl AsRef<[u8]> for Slice<'_> {
    fn as_ref(&self) -> &[u8] {
        self.data
    }
}

impl fmt::Debug for Slice<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Slice(\"{}\")", escape_bytes(self.data))
    }
}

/// Render bytes for humans: printable ASCII as-is, anything else as `\xNN`.
pub fn escape_bytes(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len());
    for &b in data {
        if (b' '..=b'~').contains(&b) {
            out.push(b as char);
        } else {
            out.push_str(&format!("\\x{:02x}", b));
        }
    }
    out
}
