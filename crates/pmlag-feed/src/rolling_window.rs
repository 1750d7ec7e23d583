//! Time-bounded observation windows.

use std::collections::VecDeque;
use std::time::Duration;

/// Anything carrying a millisecond timestamp.
pub trait Timestamped {
    fn ts_ms(&self) -> i64;
}

/// Result of a lag query: the newest entry and the comparison entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LaggedPair<'a, T> {
    pub current: Option<&'a T>,
    pub lagged: Option<&'a T>,
}

/// Ordered-by-time sequence bounded by a retention horizon.
///
/// Entries are non-decreasing in timestamp. Trimming only pops from the
/// front and keeps the newest entry that is at or beyond the horizon, so
/// there is always an anchor for "price N seconds ago" and the window is
/// never emptied by trimming.
#[derive(Debug, Clone)]
pub struct RollingWindow<T> {
    entries: VecDeque<T>,
    retention_ms: i64,
}

impl<T: Timestamped> RollingWindow<T> {
    pub fn new(retention: Duration) -> Self {
        Self {
            entries: VecDeque::new(),
            retention_ms: retention.as_millis() as i64,
        }
    }

    pub fn retention(&self) -> Duration {
        Duration::from_millis(self.retention_ms.max(0) as u64)
    }

    /// Append an entry and trim relative to its timestamp.
    ///
    /// Returns `false` (and discards the entry) if it is older than the
    /// newest entry already held.
    pub fn push(&mut self, entry: T) -> bool {
        let ts = entry.ts_ms();
        if self.entries.back().is_some_and(|last| ts < last.ts_ms()) {
            return false;
        }
        self.entries.push_back(entry);
        self.trim(ts);
        true
    }

    /// Drop entries whose successor is already past the retention horizon.
    pub fn trim(&mut self, now_ms: i64) {
        while self.entries.len() > 1
            && self
                .entries
                .get(1)
                .is_some_and(|next| now_ms - next.ts_ms() > self.retention_ms)
        {
            self.entries.pop_front();
        }
    }

    pub fn latest(&self) -> Option<&T> {
        self.entries.back()
    }

    pub fn oldest(&self) -> Option<&T> {
        self.entries.front()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter()
    }

    /// Entries with `since_ms <= ts <= until_ms`.
    pub fn range(&self, since_ms: i64, until_ms: i64) -> impl Iterator<Item = &T> {
        self.entries
            .iter()
            .skip_while(move |e| e.ts_ms() < since_ms)
            .take_while(move |e| e.ts_ms() <= until_ms)
    }

    /// Freshness-gated lag selection.
    ///
    /// `current` is the newest entry. `lagged` starts at `current` and walks
    /// forward from the oldest entry while `now - ts >= horizon`. When the
    /// newest entry is itself `stale_after` old, `lagged` is `None`.
    pub fn lagged(&self, horizon: Duration, stale_after: Duration, now_ms: i64) -> LaggedPair<'_, T> {
        let Some(current) = self.entries.back() else {
            return LaggedPair {
                current: None,
                lagged: None,
            };
        };

        if now_ms - current.ts_ms() >= stale_after.as_millis() as i64 {
            return LaggedPair {
                current: Some(current),
                lagged: None,
            };
        }

        let horizon_ms = horizon.as_millis() as i64;
        let mut lagged = current;
        for entry in &self.entries {
            if now_ms - entry.ts_ms() >= horizon_ms {
                lagged = entry;
            } else {
                break;
            }
        }

        LaggedPair {
            current: Some(current),
            lagged: Some(lagged),
        }
    }
}
