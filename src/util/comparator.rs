//! Key comparison utilities.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use crate::types::{extract_user_key, INTERNAL_KEY_TRAILER_LEN};
use crate::util::coding::decode_fixed64;

/// Trait for comparing keys.
///
/// The name is persisted in the manifest; reopening a database with a
/// comparator of a different name is refused.
pub trait Comparator: Send + Sync {
    /// Compare two keys.
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering;

    /// Get the name of this comparator.
    fn name(&self) -> &str;
}

/// Default bytewise comparator (lexicographic ordering).
#[derive(Debug, Clone, Copy, Default)]
pub struct BytewiseComparator;

impl BytewiseComparator {
    /// Create a new bytewise comparator.
    pub fn new() -> Self {
        Self
    }
}

impl Comparator for BytewiseComparator {
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        a.cmp(b)
    }

    fn name(&self) -> &str {
        "leveldb.BytewiseComparator"
    }
}

/// Compare encoded internal keys (user_key + sequence + type).
///
/// Internal keys are compared by:
/// 1. User key in ascending order, using the wrapped user comparator
/// 2. Sequence number in descending order (newer first)
/// 3. Type in descending order
#[derive(Clone)]
pub struct InternalKeyComparator {
    user_comparator: Arc<dyn Comparator>,
}

impl InternalKeyComparator {
    /// Create an internal key comparator over the given user comparator.
    pub fn new(user_comparator: Arc<dyn Comparator>) -> Self {
        Self { user_comparator }
    }

    /// Get the user comparator.
    pub fn user_comparator(&self) -> &Arc<dyn Comparator> {
        &self.user_comparator
    }

    /// Compare two user keys with the wrapped comparator.
    pub fn compare_user_keys(&self, a: &[u8], b: &[u8]) -> Ordering {
        self.user_comparator.compare(a, b)
    }
}

impl Default for InternalKeyComparator {
    fn default() -> Self {
        Self::new(Arc::new(BytewiseComparator::new()))
    }
}

impl fmt::Debug for InternalKeyComparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InternalKeyComparator")
            .field("user_comparator", &self.user_comparator.name())
            .finish()
    }
}

impl Comparator for InternalKeyComparator {
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        match self
            .user_comparator
            .compare(extract_user_key(a), extract_user_key(b))
        {
            Ordering::Equal => {
                if a.len() >= INTERNAL_KEY_TRAILER_LEN && b.len() >= INTERNAL_KEY_TRAILER_LEN {
                    let tail_a = decode_fixed64(&a[a.len() - INTERNAL_KEY_TRAILER_LEN..]);
                    let tail_b = decode_fixed64(&b[b.len() - INTERNAL_KEY_TRAILER_LEN..]);
                    // Descending: larger (sequence, type) comes first
                    tail_b.cmp(&tail_a)
                } else {
                    // Malformed keys, fall back to length comparison
                    a.len().cmp(&b.len())
                }
            }
            ord => ord,
        }
    }

    fn name(&self) -> &str {
        "leveldb.InternalKeyComparator"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{InternalKey, ValueType};

    /// Orders user keys from largest to smallest.
    struct ReverseComparator;

    impl Comparator for ReverseComparator {
        fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
            b.cmp(a)
        }

        fn name(&self) -> &str {
            "test.ReverseComparator"
        }
    }

    #[test]
    fn test_bytewise_compare() {
        let cmp = BytewiseComparator::new();

        assert_eq!(cmp.compare(b"abc", b"abc"), Ordering::Equal);
        assert_eq!(cmp.compare(b"abc", b"abd"), Ordering::Less);
        assert_eq!(cmp.compare(b"abd", b"abc"), Ordering::Greater);
        assert_eq!(cmp.compare(b"ab", b"abc"), Ordering::Less);
        assert_eq!(cmp.compare(b"", b"a"), Ordering::Less);
    }

    #[test]
    fn test_internal_key_comparator() {
        let cmp = InternalKeyComparator::default();

        let older = InternalKey::new(b"user", 100, ValueType::Value);
        let newer = InternalKey::new(b"user", 200, ValueType::Value);

        // Higher sequence should come first (descending)
        assert_eq!(cmp.compare(newer.encoded(), older.encoded()), Ordering::Less);
        assert_eq!(cmp.compare(older.encoded(), newer.encoded()), Ordering::Greater);

        // Same sequence: Value (1) sorts before Deletion (0)
        let put = InternalKey::new(b"user", 100, ValueType::Value);
        let del = InternalKey::new(b"user", 100, ValueType::Deletion);
        assert_eq!(cmp.compare(put.encoded(), del.encoded()), Ordering::Less);

        // Different user keys dominate
        let a = InternalKey::new(b"aaa", 1, ValueType::Value);
        let b = InternalKey::new(b"bbb", 100, ValueType::Value);
        assert_eq!(cmp.compare(a.encoded(), b.encoded()), Ordering::Less);
    }

    #[test]
    fn test_internal_key_comparator_custom_user_order() {
        let cmp = InternalKeyComparator::new(Arc::new(ReverseComparator));

        let a = InternalKey::new(b"aaa", 1, ValueType::Value);
        let b = InternalKey::new(b"bbb", 1, ValueType::Value);
        assert_eq!(cmp.compare(a.encoded(), b.encoded()), Ordering::Greater);
        assert_eq!(cmp.user_comparator().name(), "test.ReverseComparator");
    }
}
