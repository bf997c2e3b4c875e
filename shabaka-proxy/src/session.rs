//! Display session credentials.
//!
//! Background fetches (precache, drain, refresh) have no display request of
//! their own, so they replay the cookie and authorization the display last
//! presented.

use std::sync::{Mutex, MutexGuard};

use shabaka_core::InterceptedRequest;

const REPLAYED_HEADERS: [&str; 2] = ["cookie", "authorization"];

#[derive(Debug, Default)]
pub struct SessionHeaders {
    values: Mutex<Vec<(String, String)>>,
}

impl SessionHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<(String, String)>> {
        self.values.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Remember credentials carried by a display request.
    pub fn observe(&self, request: &InterceptedRequest) {
        let mut values = self.lock();
        for name in REPLAYED_HEADERS {
            if let Some(value) = request.header(name) {
                values.retain(|(n, _)| n != name);
                values.push((name.to_string(), value.to_string()));
            }
        }
    }

    /// Attach remembered credentials the request does not already carry.
    pub fn apply(&self, mut request: InterceptedRequest) -> InterceptedRequest {
        for (name, value) in self.lock().iter() {
            if request.header(name).is_none() {
                request = request.with_header(name.clone(), value.clone());
            }
        }
        request
    }
}
