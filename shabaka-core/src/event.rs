//! Queued telemetry events and the timestamp sequencer that keys them.

use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Primary key of a queued event: microseconds since the UNIX epoch, made
/// strictly increasing by [`TimestampSequencer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventTimestamp(i64);

impl EventTimestamp {
    pub const fn from_micros(micros: i64) -> Self {
        Self(micros)
    }

    pub fn as_micros(self) -> i64 {
        self.0
    }

    /// Order-preserving big-endian encoding, including negative values.
    pub fn to_key_bytes(self) -> [u8; 8] {
        ((self.0 as u64) ^ (1 << 63)).to_be_bytes()
    }

    /// Inverse of [`EventTimestamp::to_key_bytes`].
    pub fn from_key_bytes(bytes: &[u8]) -> Option<Self> {
        let raw: [u8; 8] = bytes.try_into().ok()?;
        Some(Self((u64::from_be_bytes(raw) ^ (1 << 63)) as i64))
    }
}

impl fmt::Display for EventTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A telemetry event waiting for delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedEvent {
    pub timestamp: EventTimestamp,
    /// The record exactly as the display application sent it.
    pub payload: Value,
}

/// Source of wall-clock time in microseconds.
pub trait Clock: fmt::Debug + Send + Sync {
    fn now_micros(&self) -> i64;
}

/// The system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_micros(&self) -> i64 {
        Utc::now().timestamp_micros()
    }
}

/// Hands out strictly increasing event timestamps.
///
/// Each call returns `max(clock, previous + 1)`, so two events enqueued within
/// the same clock tick still get distinct keys.
#[derive(Debug)]
pub struct TimestampSequencer {
    clock: Arc<dyn Clock>,
    last: AtomicI64,
}

impl TimestampSequencer {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            last: AtomicI64::new(i64::MIN),
        }
    }

    pub fn system() -> Self {
        Self::new(Arc::new(SystemClock))
    }

    /// Never hand out a timestamp at or below `floor`.
    ///
    /// Called with the largest persisted key when a queue is reopened.
    pub fn seed(&self, floor: EventTimestamp) {
        self.last.fetch_max(floor.as_micros(), Ordering::SeqCst);
    }

    /// Next unique timestamp.
    pub fn next(&self) -> EventTimestamp {
        let now = self.clock.now_micros();
        let previous = match self.last.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
            Some(now.max(last.saturating_add(1)))
        }) {
            Ok(previous) | Err(previous) => previous,
        };
        EventTimestamp(now.max(previous.saturating_add(1)))
    }
}

impl Default for TimestampSequencer {
    fn default() -> Self {
        Self::system()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[derive(Debug)]
    struct StuckClock(i64);

    impl Clock for StuckClock {
        fn now_micros(&self) -> i64 {
            self.0
        }
    }

    #[test]
    fn test_sequencer_breaks_clock_ties() {
        let sequencer = TimestampSequencer::new(Arc::new(StuckClock(1_000)));
        let a = sequencer.next();
        let b = sequencer.next();
        let c = sequencer.next();
        assert_eq!(a.as_micros(), 1_000);
        assert_eq!(b.as_micros(), 1_001);
        assert_eq!(c.as_micros(), 1_002);
    }

    #[test]
    fn test_sequencer_respects_seed() {
        let sequencer = TimestampSequencer::new(Arc::new(StuckClock(10)));
        sequencer.seed(EventTimestamp::from_micros(500));
        assert_eq!(sequencer.next().as_micros(), 501);
    }

    #[test]
    fn test_sequencer_follows_advancing_clock() {
        let sequencer = TimestampSequencer::system();
        let a = sequencer.next();
        let b = sequencer.next();
        assert!(b > a);
    }

    proptest! {
        #[test]
        fn prop_key_bytes_preserve_order(a in any::<i64>(), b in any::<i64>()) {
            let (ta, tb) = (EventTimestamp::from_micros(a), EventTimestamp::from_micros(b));
            prop_assert_eq!(ta.cmp(&tb), ta.to_key_bytes().cmp(&tb.to_key_bytes()));
            prop_assert_eq!(EventTimestamp::from_key_bytes(&ta.to_key_bytes()), Some(ta));
        }
    }
}
