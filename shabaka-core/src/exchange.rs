//! Intercepted requests, proxy responses and the helpers shared by every
//! handler for building them.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Header stamped on every response the router produces.
pub const SOURCE_HEADER: &str = "x-offline-source";

/// Ordered header list. Names are kept lowercase.
pub type HeaderList = Vec<(String, String)>;

/// Headers that describe a single transport hop and are never forwarded or
/// stored.
const HOP_BY_HOP: [&str; 10] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "host",
    "content-length",
];

/// Whether a header must be dropped when crossing the proxy.
pub fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP
        .iter()
        .any(|hop| hop.eq_ignore_ascii_case(name))
}

fn find_header<'a>(headers: &'a HeaderList, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// Whether a URL points at a remote origin rather than at the player server.
pub fn is_remote_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// Normalize a URL to the origin-relative key used by the cache partitions.
///
/// Absolute URLs on `origin` are reduced to path + query. Absolute URLs on any
/// other origin return `None`.
pub fn normalize_key(url: &str, origin: &str) -> Option<String> {
    if is_remote_url(url) {
        let origin = origin.trim_end_matches('/');
        let rest = url.strip_prefix(origin)?;
        return match rest.chars().next() {
            None => Some("/".to_string()),
            Some('/') => Some(rest.to_string()),
            Some('?') => Some(format!("/{}", rest)),
            // Same prefix but a different host, e.g. origin.example.org
            Some(_) => None,
        };
    }
    if url.starts_with('/') {
        Some(url.to_string())
    } else {
        Some(format!("/{}", url))
    }
}

/// A request issued by the display application, as seen by the proxy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterceptedRequest {
    /// Upper-case HTTP method.
    pub method: String,
    /// Origin-relative path and query. Doubles as the cache key.
    pub target: String,
    pub headers: HeaderList,
    pub body: Vec<u8>,
}

impl InterceptedRequest {
    pub fn new(method: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            method: method.into().to_ascii_uppercase(),
            target: target.into(),
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn get(target: impl Into<String>) -> Self {
        Self::new("GET", target)
    }

    /// A POST carrying a JSON document.
    pub fn post_json(target: impl Into<String>, payload: &Value) -> Self {
        let mut request = Self::new("POST", target);
        request.body = payload.to_string().into_bytes();
        request.with_header("content-type", "application/json")
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into().to_ascii_lowercase();
        self.headers.retain(|(n, _)| *n != name);
        self.headers.push((name, value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn is_get(&self) -> bool {
        self.method == "GET"
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// Parse the body as JSON.
    pub fn json_body(&self) -> Option<Value> {
        serde_json::from_slice(&self.body).ok()
    }
}

/// Where a response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseSource {
    Network,
    Cache,
    Synthetic,
}

impl ResponseSource {
    pub fn as_str(self) -> &'static str {
        match self {
            ResponseSource::Network => "network",
            ResponseSource::Cache => "cache",
            ResponseSource::Synthetic => "synthetic",
        }
    }
}

/// A response handed back to the display application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerResponse {
    pub status: u16,
    pub headers: HeaderList,
    pub body: Vec<u8>,
    pub source: ResponseSource,
}

impl PlayerResponse {
    /// Build a response that came back from the upstream server.
    pub fn from_network(status: u16, headers: HeaderList, body: Vec<u8>) -> Self {
        Self {
            status,
            headers,
            body,
            source: ResponseSource::Network,
        }
    }

    /// A synthetic JSON response.
    pub fn json(status: u16, value: &Value) -> Self {
        Self {
            status,
            headers: vec![("content-type".to_string(), "application/json".to_string())],
            body: value.to_string().into_bytes(),
            source: ResponseSource::Synthetic,
        }
    }

    /// `{"offline": true}`
    pub fn offline() -> Self {
        Self::json(200, &json!({ "offline": true }))
    }

    /// `{"error": message, "offline": true}`
    pub fn offline_error(status: u16, message: &str) -> Self {
        Self::json(status, &json!({ "error": message, "offline": true }))
    }

    /// `{"queued": true, "offline": true}`
    pub fn queued_offline() -> Self {
        Self::json(200, &json!({ "queued": true, "offline": true }))
    }

    /// Whether the status is 2xx.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Whether the body is the whole resource and may be cached.
    ///
    /// Only a plain 200 qualifies; a 206 carries a byte range.
    pub fn is_cacheable(&self) -> bool {
        self.status == 200
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    pub fn json_body(&self) -> Option<Value> {
        serde_json::from_slice(&self.body).ok()
    }

    /// Whether the body carries an explicit `offline: true` flag.
    pub fn is_offline(&self) -> bool {
        self.json_body()
            .and_then(|body| body.get("offline").and_then(Value::as_bool))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORIGIN: &str = "http://player.local:5000";

    #[test]
    fn test_normalize_relative_paths() {
        assert_eq!(
            normalize_key("/static/uploads/a.mp4", ORIGIN).as_deref(),
            Some("/static/uploads/a.mp4")
        );
        assert_eq!(
            normalize_key("static/uploads/a.mp4", ORIGIN).as_deref(),
            Some("/static/uploads/a.mp4")
        );
    }

    #[test]
    fn test_normalize_same_origin_absolute() {
        assert_eq!(
            normalize_key("http://player.local:5000/static/uploads/a.mp4?v=2", ORIGIN).as_deref(),
            Some("/static/uploads/a.mp4?v=2")
        );
        assert_eq!(
            normalize_key("http://player.local:5000", ORIGIN).as_deref(),
            Some("/")
        );
    }

    #[test]
    fn test_normalize_foreign_origin() {
        assert_eq!(normalize_key("https://cdn.example.com/a.mp4", ORIGIN), None);
        assert_eq!(
            normalize_key("http://player.local:50001/a.mp4", ORIGIN),
            None
        );
    }

    #[test]
    fn test_hop_by_hop_case_insensitive() {
        assert!(is_hop_by_hop("Transfer-Encoding"));
        assert!(is_hop_by_hop("host"));
        assert!(!is_hop_by_hop("content-type"));
    }

    #[test]
    fn test_only_full_responses_are_cacheable() {
        let full = PlayerResponse::from_network(200, Vec::new(), b"0123456789".to_vec());
        let partial = PlayerResponse::from_network(206, Vec::new(), b"0123".to_vec());
        let empty = PlayerResponse::from_network(204, Vec::new(), Vec::new());

        assert!(full.is_cacheable());
        assert!(partial.is_success());
        assert!(!partial.is_cacheable());
        assert!(!empty.is_cacheable());
    }

    #[test]
    fn test_synthetic_bodies() {
        let offline = PlayerResponse::offline();
        assert_eq!(offline.status, 200);
        assert!(offline.is_offline());
        assert_eq!(offline.source, ResponseSource::Synthetic);

        let queued = PlayerResponse::queued_offline();
        let body = queued.json_body().expect("queued body is JSON");
        assert_eq!(body["queued"], Value::Bool(true));
        assert_eq!(body["offline"], Value::Bool(true));

        let media = PlayerResponse::offline_error(503, "Media not available offline");
        assert_eq!(media.status, 503);
        assert_eq!(
            media.json_body().expect("error body is JSON")["error"],
            "Media not available offline"
        );
    }

    #[test]
    fn test_request_header_replacement() {
        let request = InterceptedRequest::get("/player/display")
            .with_header("Cookie", "a=1")
            .with_header("cookie", "a=2");
        assert_eq!(request.headers.len(), 1);
        assert_eq!(request.header("COOKIE"), Some("a=2"));
    }
}
