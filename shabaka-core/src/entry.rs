//! Cache entries and the read-only views derived from them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::exchange::{is_hop_by_hop, HeaderList, PlayerResponse, ResponseSource, SOURCE_HEADER};

/// The most recent successful response for one key in one partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub status: u16,
    pub headers: HeaderList,
    pub body: Vec<u8>,
    pub captured_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Capture a response under `key`.
    ///
    /// Hop-by-hop headers, `set-cookie` and the provenance header are not
    /// kept; replaying them from cache would be wrong.
    pub fn from_response(key: impl Into<String>, response: &PlayerResponse) -> Self {
        let headers = response
            .headers
            .iter()
            .filter(|(name, _)| {
                !is_hop_by_hop(name)
                    && !name.eq_ignore_ascii_case("set-cookie")
                    && !name.eq_ignore_ascii_case(SOURCE_HEADER)
            })
            .cloned()
            .collect();
        Self {
            key: key.into(),
            status: response.status,
            headers,
            body: response.body.clone(),
            captured_at: Utc::now(),
        }
    }

    pub fn size_bytes(&self) -> u64 {
        self.body.len() as u64
    }

    /// Replay this entry as a response.
    pub fn to_response(&self) -> PlayerResponse {
        PlayerResponse {
            status: self.status,
            headers: self.headers.clone(),
            body: self.body.clone(),
            source: ResponseSource::Cache,
        }
    }

    pub fn meta(&self) -> EntryMeta {
        EntryMeta {
            key: self.key.clone(),
            size_bytes: self.size_bytes(),
            captured_at: self.captured_at,
        }
    }
}

/// Listing view of an entry, without its body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryMeta {
    pub key: String,
    pub size_bytes: u64,
    pub captured_at: DateTime<Utc>,
}

/// Snapshot of the media partition, computed on demand.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(into = "CacheStatusWire", from = "CacheStatusWire")]
pub struct CacheStatus {
    pub entry_count: u64,
    pub total_byte_size: u64,
    pub keys: Vec<String>,
}

impl CacheStatus {
    /// Build a status from listed entries, preserving their order.
    pub fn from_entries<'a>(entries: impl IntoIterator<Item = &'a EntryMeta>) -> Self {
        entries
            .into_iter()
            .fold(CacheStatus::default(), |mut status, meta| {
                status.entry_count += 1;
                status.total_byte_size += meta.size_bytes;
                status.keys.push(meta.key.clone());
                status
            })
    }

    /// Total size in mebibytes, two decimals, as the display app expects.
    pub fn total_size_mb(&self) -> String {
        format!("{:.2}", self.total_byte_size as f64 / (1024.0 * 1024.0))
    }
}

/// Wire form understood by the display application.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheStatusWire {
    #[serde(rename = "mediaCount")]
    media_count: u64,
    #[serde(rename = "totalSize")]
    total_size: u64,
    #[serde(rename = "totalSizeMB", default)]
    total_size_mb: String,
    #[serde(rename = "cachedUrls")]
    cached_urls: Vec<String>,
}

impl From<CacheStatus> for CacheStatusWire {
    fn from(status: CacheStatus) -> Self {
        Self {
            media_count: status.entry_count,
            total_size: status.total_byte_size,
            total_size_mb: status.total_size_mb(),
            cached_urls: status.keys,
        }
    }
}

impl From<CacheStatusWire> for CacheStatus {
    fn from(wire: CacheStatusWire) -> Self {
        Self {
            entry_count: wire.media_count,
            total_byte_size: wire.total_size,
            keys: wire.cached_urls,
        }
    }
}

/// Statistics about cache usage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses.
    pub misses: u64,
    /// Number of entries currently stored across all partitions.
    pub entry_count: u64,
    /// Number of partitions currently registered.
    pub partition_count: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn meta(key: &str, size: u64) -> EntryMeta {
        EntryMeta {
            key: key.to_string(),
            size_bytes: size,
            captured_at: Utc::now(),
        }
    }

    #[test]
    fn test_entry_drops_cookies_and_hop_headers() {
        let response = PlayerResponse::from_network(
            200,
            vec![
                ("content-type".to_string(), "video/mp4".to_string()),
                ("set-cookie".to_string(), "session=abc".to_string()),
                ("transfer-encoding".to_string(), "chunked".to_string()),
            ],
            vec![1, 2, 3],
        );
        let entry = CacheEntry::from_response("/static/uploads/a.mp4", &response);
        assert_eq!(entry.headers.len(), 1);
        assert_eq!(entry.size_bytes(), 3);

        let replay = entry.to_response();
        assert_eq!(replay.source, ResponseSource::Cache);
        assert_eq!(replay.body, vec![1, 2, 3]);
        assert_eq!(replay.header("content-type"), Some("video/mp4"));
    }

    #[test]
    fn test_cache_status_wire_format() {
        let entries = [meta("/static/uploads/a.mp4", 1024 * 1024), meta("/static/uploads/b.png", 512 * 1024)];
        let status = CacheStatus::from_entries(entries.iter());
        assert_eq!(status.entry_count, 2);
        assert_eq!(status.total_byte_size, 1536 * 1024);

        let wire = serde_json::to_value(&status).expect("status serializes");
        assert_eq!(wire["mediaCount"], Value::from(2));
        assert_eq!(wire["totalSizeMB"], Value::from("1.50"));
        assert_eq!(wire["cachedUrls"][0], Value::from("/static/uploads/a.mp4"));

        let back: CacheStatus = serde_json::from_value(wire).expect("status deserializes");
        assert_eq!(back, status);
    }

    #[test]
    fn test_cache_stats_hit_rate() {
        let stats = CacheStats {
            hits: 80,
            misses: 20,
            ..Default::default()
        };
        assert!((stats.hit_rate() - 0.8).abs() < 0.001);
        assert!((CacheStats::default().hit_rate() - 0.0).abs() < 0.001);
    }
}
