//! Partition-scoped cache keys.
//!
//! A key cannot be built without naming its partition, so every read and
//! write is bound to exactly one partition.

/// Separator byte between the partition name and the URL key.
///
/// 0xFF never occurs in UTF-8, so the split is unambiguous.
const SEPARATOR: u8 = 0xFF;

/// A cache key that belongs to exactly one partition.
///
/// # Binary Format
///
/// `[partition name bytes][0xFF][url key bytes]`
///
/// Keys sort by partition first, so a partition's entries are contiguous and
/// can be collected with a prefix scan.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PartitionScopedKey {
    inner: PartitionKeyInner,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PartitionKeyInner {
    partition: String,
    key: String,
}

impl PartitionScopedKey {
    pub fn new(partition: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            inner: PartitionKeyInner {
                partition: partition.into(),
                key: key.into(),
            },
        }
    }

    pub fn partition(&self) -> &str {
        &self.inner.partition
    }

    pub fn key(&self) -> &str {
        &self.inner.key
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut bytes = Self::partition_prefix(&self.inner.partition);
        bytes.extend_from_slice(self.inner.key.as_bytes());
        bytes
    }

    /// Decode a key from bytes.
    ///
    /// Returns `None` if the separator is missing or either half is not UTF-8.
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        let split = bytes.iter().position(|b| *b == SEPARATOR)?;
        let partition = std::str::from_utf8(&bytes[..split]).ok()?;
        let key = std::str::from_utf8(&bytes[split + 1..]).ok()?;
        Some(Self::new(partition, key))
    }

    /// Prefix shared by every key of `partition`.
    pub fn partition_prefix(partition: &str) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(partition.len() + 1);
        bytes.extend_from_slice(partition.as_bytes());
        bytes.push(SEPARATOR);
        bytes
    }
}
