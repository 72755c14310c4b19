//! Structured telemetry for edit log sessions.
//!
//! An [`EditLogObserver`] receives one [`EditLogEvent`] per lifecycle step
//! (load, backup, append, per-ping apply, close). Observers must not block or
//! perform I/O; the default [`NoOpEditLogObserver`] does nothing.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use serde::Serialize;

use crate::record::ByteSwap;

// ---------------------------------------------------------------------------
// Event schema
// ---------------------------------------------------------------------------

/// One edit log lifecycle step, as seen by an [`EditLogObserver`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum EditLogEvent {
    /// Existing edits were read and sorted.
    Loaded {
        /// Edit records loaded, excluding header blocks.
        records: usize,
        /// Byte order conversion applied to every record.
        byte_swap: ByteSwap,
    },

    /// The existing log was damaged and the session continues without edits.
    LoadRecovered {
        /// Rendered load error.
        reason: String,
    },

    /// The existing log was copied aside before output was opened.
    BackupCreated {
        /// Size of the backup copy.
        bytes: u64,
    },

    /// One requested edit was appended to the authoritative log.
    RequestedAppended {
        /// Beam number as written, multiplicity offset included.
        beam: i32,
        /// On-disk action code.
        action_code: i32,
    },

    /// One net beam change was appended to the applied-edit stream.
    AppliedAppended {
        /// Beam number as written, multiplicity offset included.
        beam: i32,
        /// On-disk action code.
        action_code: i32,
    },

    /// Apply finished for one ping.
    PingApplied {
        /// Loaded edits inside the ping's time window.
        window_len: usize,
        /// Edits that set a beam flag.
        applied: usize,
        /// Edits retired because their beam is not in the ping.
        out_of_range: usize,
        /// Edits retired because they targeted a null beam.
        no_effect: usize,
        /// Net changes written to the applied-edit stream.
        emitted: usize,
    },

    /// Streams were flushed and released.
    Closed {
        /// Records appended to the authoritative log this session.
        requested_written: u64,
        /// Records appended to the applied-edit stream this session.
        applied_written: u64,
        /// Loaded edits that never matched a beam.
        unused: usize,
    },
}

impl EditLogEvent {
    #[must_use]
    pub const fn kind_str(&self) -> &'static str {
        match self {
            Self::Loaded { .. } => "loaded",
            Self::LoadRecovered { .. } => "load_recovered",
            Self::BackupCreated { .. } => "backup_created",
            Self::RequestedAppended { .. } => "requested_appended",
            Self::AppliedAppended { .. } => "applied_appended",
            Self::PingApplied { .. } => "ping_applied",
            Self::Closed { .. } => "closed",
        }
    }
}

// ---------------------------------------------------------------------------
// Observers
// ---------------------------------------------------------------------------

/// Sink for [`EditLogEvent`]s. Shared across threads behind an `Arc`.
pub trait EditLogObserver: Send + Sync {
    /// Called synchronously on the session's thread after each step.
    fn on_event(&self, event: &EditLogEvent);
}

/// Observer that ignores every event.
pub struct NoOpEditLogObserver;

impl EditLogObserver for NoOpEditLogObserver {
    #[inline(always)]
    fn on_event(&self, _event: &EditLogEvent) {}
}

/// Counter observer.
#[derive(Debug, Default)]
pub struct EditLogMetrics {
    loads: AtomicU64,
    loads_recovered: AtomicU64,
    requested_appended: AtomicU64,
    applied_appended: AtomicU64,
    pings_applied: AtomicU64,
    out_of_range: AtomicU64,
    no_effect: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EditLogMetricsSnapshot {
    pub loads: u64,
    pub loads_recovered: u64,
    pub requested_appended: u64,
    pub applied_appended: u64,
    pub pings_applied: u64,
    pub out_of_range: u64,
    pub no_effect: u64,
}

impl EditLogMetrics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn snapshot(&self) -> EditLogMetricsSnapshot {
        EditLogMetricsSnapshot {
            loads: self.loads.load(Ordering::Relaxed),
            loads_recovered: self.loads_recovered.load(Ordering::Relaxed),
            requested_appended: self.requested_appended.load(Ordering::Relaxed),
            applied_appended: self.applied_appended.load(Ordering::Relaxed),
            pings_applied: self.pings_applied.load(Ordering::Relaxed),
            out_of_range: self.out_of_range.load(Ordering::Relaxed),
            no_effect: self.no_effect.load(Ordering::Relaxed),
        }
    }
}

impl EditLogObserver for EditLogMetrics {
    fn on_event(&self, event: &EditLogEvent) {
        match event {
            EditLogEvent::Loaded { .. } => {
                self.loads.fetch_add(1, Ordering::Relaxed);
            }
            EditLogEvent::LoadRecovered { .. } => {
                self.loads_recovered.fetch_add(1, Ordering::Relaxed);
            }
            EditLogEvent::RequestedAppended { .. } => {
                self.requested_appended.fetch_add(1, Ordering::Relaxed);
            }
            EditLogEvent::AppliedAppended { .. } => {
                self.applied_appended.fetch_add(1, Ordering::Relaxed);
            }
            EditLogEvent::PingApplied {
                out_of_range,
                no_effect,
                ..
            } => {
                self.pings_applied.fetch_add(1, Ordering::Relaxed);
                self.out_of_range
                    .fetch_add(*out_of_range as u64, Ordering::Relaxed);
                self.no_effect.fetch_add(*no_effect as u64, Ordering::Relaxed);
            }
            EditLogEvent::BackupCreated { .. } | EditLogEvent::Closed { .. } => {}
        }
    }
}

/// Keeps the most recent events for diagnostics.
pub struct EditLogEventRing {
    inner: Mutex<RingInner>,
}

struct RingInner {
    buf: Vec<EditLogEvent>,
    capacity: usize,
    write_pos: usize,
    count: usize,
}

impl EditLogEventRing {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Mutex::new(RingInner {
                buf: Vec::with_capacity(capacity),
                capacity,
                write_pos: 0,
                count: 0,
            }),
        }
    }

    /// Stored events, oldest first.
    #[must_use]
    pub fn events(&self) -> Vec<EditLogEvent> {
        let inner = self.inner.lock();
        let n = inner.count.min(inner.capacity);
        let start = if inner.count >= inner.capacity {
            inner.write_pos
        } else {
            0
        };
        (0..n)
            .map(|i| inner.buf[(start + i) % inner.capacity].clone())
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        let inner = self.inner.lock();
        inner.count.min(inner.capacity)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EditLogObserver for EditLogEventRing {
    fn on_event(&self, event: &EditLogEvent) {
        let mut inner = self.inner.lock();
        let pos = inner.write_pos;
        if inner.buf.len() < inner.capacity {
            inner.buf.push(event.clone());
        } else {
            inner.buf[pos] = event.clone();
        }
        inner.write_pos = (pos + 1) % inner.capacity;
        inner.count += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_event_variants() -> Vec<EditLogEvent> {
        vec![
            EditLogEvent::Loaded {
                records: 12,
                byte_swap: ByteSwap::Reverse,
            },
            EditLogEvent::LoadRecovered {
                reason: "truncated edit record".to_owned(),
            },
            EditLogEvent::BackupCreated { bytes: 192 },
            EditLogEvent::RequestedAppended {
                beam: 4,
                action_code: 1,
            },
            EditLogEvent::AppliedAppended {
                beam: 4,
                action_code: 1,
            },
            EditLogEvent::PingApplied {
                window_len: 3,
                applied: 2,
                out_of_range: 1,
                no_effect: 0,
                emitted: 1,
            },
            EditLogEvent::Closed {
                requested_written: 1,
                applied_written: 1,
                unused: 0,
            },
        ]
    }

    #[test]
    fn every_event_serializes_to_json() {
        for event in all_event_variants() {
            let json = serde_json::to_string(&event)
                .unwrap_or_else(|e| panic!("failed to serialize {}: {e}", event.kind_str()));
            let value: serde_json::Value = serde_json::from_str(&json)
                .unwrap_or_else(|e| panic!("JSON not parseable for {}: {e}", event.kind_str()));
            assert!(value.is_object(), "{} must serialize as an object", event.kind_str());
        }
    }

    #[test]
    fn kind_strings_are_unique() {
        let mut kinds: Vec<_> = all_event_variants().iter().map(EditLogEvent::kind_str).collect();
        kinds.sort_unstable();
        kinds.dedup();
        assert_eq!(kinds.len(), all_event_variants().len());
    }

    #[test]
    fn metrics_count_events() {
        let metrics = EditLogMetrics::new();
        for event in all_event_variants() {
            metrics.on_event(&event);
        }
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.loads, 1);
        assert_eq!(snapshot.loads_recovered, 1);
        assert_eq!(snapshot.requested_appended, 1);
        assert_eq!(snapshot.applied_appended, 1);
        assert_eq!(snapshot.pings_applied, 1);
        assert_eq!(snapshot.out_of_range, 1);
        assert_eq!(snapshot.no_effect, 0);
    }

    #[test]
    fn ring_keeps_most_recent() {
        let ring = EditLogEventRing::new(3);
        assert!(ring.is_empty());
        for event in all_event_variants() {
            ring.on_event(&event);
        }
        let kinds: Vec<_> = ring.events().iter().map(EditLogEvent::kind_str).collect();
        assert_eq!(kinds, vec!["applied_appended", "ping_applied", "closed"]);
        assert_eq!(ring.len(), 3);
    }
}
