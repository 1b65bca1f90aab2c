use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// One observation of the subtitle region from an OCR or transcription backend.
///
/// An empty `text` is a valid observation: it means the backend looked and saw
/// no subtitle, which the reconciler treats as silence evidence.
#[derive(Debug, Clone)]
pub struct RawSnapshot {
    pub text: String,
    /// Capture time in milliseconds on the source's monotonic clock.
    pub ts_ms: i64,
    /// Mean recognition confidence in [0, 1], when the backend reports one.
    pub confidence: Option<f32>,
}

impl RawSnapshot {
    pub fn new(text: impl Into<String>, ts_ms: i64) -> Self {
        Self {
            text: text.into(),
            ts_ms,
            confidence: None,
        }
    }

    /// An explicit "no subtitle visible" marker.
    pub fn empty(ts_ms: i64) -> Self {
        Self::new(String::new(), ts_ms)
    }
}

/// A cleaned snapshot ready for similarity comparison.
#[derive(Debug, Clone)]
pub struct NormalizedUnit {
    pub text: String,
    pub ts_ms: i64,
    pub confidence: Option<f32>,
    /// Length of `text` in chars, cached for threshold checks.
    pub chars: usize,
}

impl NormalizedUnit {
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// A finalized subtitle line ready for translation or display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalizedLine {
    /// Strictly increasing per stream instance, starting at 0.
    pub seq: u64,
    pub text: String,
    /// First time a contributing snapshot was seen.
    pub start_ms: i64,
    /// Last time a contributing snapshot updated the line.
    pub end_ms: i64,
}

/// Atomic counters for stream pipeline statistics.
#[derive(Debug, Clone)]
pub struct StreamStats {
    pub snapshots_seen: Arc<AtomicU64>,
    pub snapshots_empty: Arc<AtomicU64>,
    pub snapshots_dropped: Arc<AtomicU64>,
    pub lines_finalized: Arc<AtomicU64>,
    pub lines_dropped: Arc<AtomicU64>,
}

impl StreamStats {
    pub fn new() -> Self {
        Self {
            snapshots_seen: Arc::new(AtomicU64::new(0)),
            snapshots_empty: Arc::new(AtomicU64::new(0)),
            snapshots_dropped: Arc::new(AtomicU64::new(0)),
            lines_finalized: Arc::new(AtomicU64::new(0)),
            lines_dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn inc_snapshots_seen(&self) {
        self.snapshots_seen.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_snapshots_empty(&self) {
        self.snapshots_empty.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_snapshots_dropped(&self) {
        self.snapshots_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_lines_finalized(&self) {
        self.lines_finalized.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_lines_dropped(&self) {
        self.lines_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshots_seen(&self) -> u64 {
        self.snapshots_seen.load(Ordering::Relaxed)
    }

    pub fn snapshots_empty(&self) -> u64 {
        self.snapshots_empty.load(Ordering::Relaxed)
    }

    pub fn snapshots_dropped(&self) -> u64 {
        self.snapshots_dropped.load(Ordering::Relaxed)
    }

    pub fn lines_finalized(&self) -> u64 {
        self.lines_finalized.load(Ordering::Relaxed)
    }

    pub fn lines_dropped(&self) -> u64 {
        self.lines_dropped.load(Ordering::Relaxed)
    }
}

impl Default for StreamStats {
    fn default() -> Self {
        Self::new()
    }
}
