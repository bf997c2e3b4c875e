//! Read-only view of the playlist the server schedules for this screen.

use serde_json::Value;

use crate::exchange::is_remote_url;

/// One playlist entry as far as caching is concerned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistItem {
    pub url: String,
    pub is_remote: bool,
}

impl PlaylistItem {
    pub fn new(url: impl Into<String>) -> Self {
        let url = url.into();
        let is_remote = is_remote_url(&url);
        Self { url, is_remote }
    }
}

/// Ordered playlist items.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PlaylistDescription {
    pub items: Vec<PlaylistItem>,
}

impl PlaylistDescription {
    /// Read the items out of a `{"playlist": [...]}` document.
    ///
    /// Anything that is not an array under `playlist` yields no items; entries
    /// without a string `url` are skipped.
    pub fn from_json(document: &Value) -> Self {
        let items = document
            .get("playlist")
            .and_then(Value::as_array)
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|entry| entry.get("url").and_then(Value::as_str))
                    .filter(|url| !url.is_empty())
                    .map(PlaylistItem::new)
                    .collect()
            })
            .unwrap_or_default();
        Self { items }
    }

    /// Parse raw response bytes. Non-JSON bodies yield `None`.
    pub fn from_slice(body: &[u8]) -> Option<Self> {
        serde_json::from_slice::<Value>(body)
            .ok()
            .map(|document| Self::from_json(&document))
    }

    /// URLs served by the player server itself, in playlist order.
    pub fn local_urls(&self) -> impl Iterator<Item = &str> {
        self.items
            .iter()
            .filter(|item| !item.is_remote)
            .map(|item| item.url.as_str())
    }
}
