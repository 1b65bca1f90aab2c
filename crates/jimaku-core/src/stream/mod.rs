mod debounce;
mod emit;
mod queue;
mod reconciler;

pub use queue::{LineReceiver, LineRecvError, LineRecvTimeoutError};
pub use reconciler::FinalizeReason;

use crate::config::ReconcilerConfig;
use crate::error::{ConfigError, StreamError};
use crate::normalize::normalize;
use crate::source::SnapshotSource;
use crate::types::{RawSnapshot, StreamStats};
use emit::Emitter;
use log::{debug, info, warn};
use queue::{LineSender, SendOutcome, line_channel};
use reconciler::{ClosedCandidate, LineReconciler};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// One reconciliation stream: normalizer, scorer, reconciler, emitter, and
/// the bounded hand-off channel to downstream consumers.
///
/// `ingest`, `tick`, and `flush` are non-blocking and cheap; they sit on the
/// capture loop's hot path. Each call pushes at most one finalized line.
pub struct SubtitleStream {
    reconciler: LineReconciler,
    emitter: Emitter,
    line_tx: LineSender,
    stats: StreamStats,
}

impl SubtitleStream {
    /// Validate `config` and open a fresh stream. The receiver is the
    /// consumer half of the finalized-line channel; sequence numbers restart
    /// at 0 for every stream instance.
    pub fn start(
        config: ReconcilerConfig,
        stats: StreamStats,
    ) -> Result<(Self, LineReceiver), ConfigError> {
        config.validate()?;
        let (line_tx, line_rx) = line_channel(config.line_queue_capacity);
        Ok((
            Self {
                reconciler: LineReconciler::new(config),
                emitter: Emitter::new(),
                line_tx,
                stats,
            },
            line_rx,
        ))
    }

    /// Feed one observation. Snapshots must arrive in non-decreasing
    /// timestamp order.
    pub fn ingest(&mut self, raw: RawSnapshot) {
        self.stats.inc_snapshots_seen();
        let unit = normalize(&raw);
        if unit.is_empty() {
            self.stats.inc_snapshots_empty();
        }
        if let Some(closed) = self.reconciler.ingest(unit) {
            self.push(closed);
        }
    }

    /// Feed an explicit "no subtitle visible" marker.
    pub fn ingest_empty(&mut self, ts_ms: i64) {
        self.ingest(RawSnapshot::empty(ts_ms));
    }

    /// Evaluate the passive finalize triggers (stability, silence) without
    /// new input. Call periodically when the capture cadence is slow.
    pub fn tick(&mut self, now_ms: i64) {
        if let Some(closed) = self.reconciler.tick(now_ms) {
            self.push(closed);
        }
    }

    /// Force-finalize any open candidate and reset to empty. Candidates
    /// below the configured minimum length are discarded.
    pub fn flush(&mut self) {
        if let Some(closed) = self.reconciler.flush() {
            self.push(closed);
        }
    }

    pub fn is_open(&self) -> bool {
        self.reconciler.is_open()
    }

    /// Lines emitted so far by this stream instance.
    pub fn lines_emitted(&self) -> u64 {
        self.emitter.emitted()
    }

    fn push(&mut self, closed: ClosedCandidate) {
        let reason = closed.reason;
        let units = closed.contributing_units;
        let empties = closed.trailing_empties;
        let line = self.emitter.emit(closed);
        debug!(
            "finalized #{} ({reason:?}, {units} units, {empties} trailing empties, {}..{} ms): {}",
            line.seq, line.start_ms, line.end_ms, line.text
        );
        self.stats.inc_lines_finalized();
        match self.line_tx.send_drop_oldest(line) {
            SendOutcome::Sent => {}
            SendOutcome::DroppedOldest => {
                warn!("line queue full, dropped oldest finalized line");
                self.stats.inc_lines_dropped();
            }
            SendOutcome::Disconnected => {}
        }
    }
}

/// Worker that drains a snapshot source into a [`SubtitleStream`] on its own
/// thread, ticking while idle so silence finalization happens without input.
pub struct StreamProcessor {
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl StreamProcessor {
    /// Start the source and the processor thread. Returns a receiver for
    /// finalized lines.
    pub fn start(
        mut source: Box<dyn SnapshotSource>,
        config: ReconcilerConfig,
        stats: StreamStats,
    ) -> Result<(Self, LineReceiver), StreamError> {
        source.start().map_err(StreamError::Source)?;
        let (mut stream, line_rx) = SubtitleStream::start(config, stats)?;

        let running = Arc::new(AtomicBool::new(true));
        let running_clone = Arc::clone(&running);

        let thread = thread::Builder::new()
            .name("jimaku-reconciler".into())
            .spawn(move || {
                info!("reconciler thread started");
                while running_clone.load(Ordering::Relaxed) {
                    if let Some(snapshot) = source.try_recv() {
                        stream.ingest(snapshot);
                    } else {
                        thread::sleep(Duration::from_millis(2));
                        stream.tick(source.now_ms());
                    }
                }

                // Stopping must not leak an open candidate into a later run.
                stream.flush();
                source.stop();
                info!("reconciler thread stopped, {} lines", stream.lines_emitted());
            })
            .map_err(|e| StreamError::Spawn(e.to_string()))?;

        Ok((
            Self {
                running,
                thread: Some(thread),
            },
            line_rx,
        ))
    }

    /// Signal the processor to stop, flush, and wait for the thread.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for StreamProcessor {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SourceError;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    fn config() -> ReconcilerConfig {
        ReconcilerConfig {
            continuation_threshold: 0.5,
            new_line_threshold: 0.25,
            stability_ms: 400,
            silence_ms: 800,
            min_candidate_chars: 2,
            history_window: 8,
            line_queue_capacity: 16,
        }
    }

    fn start(config: ReconcilerConfig) -> (SubtitleStream, LineReceiver) {
        SubtitleStream::start(config, StreamStats::new()).unwrap()
    }

    fn drain(rx: &LineReceiver) -> Vec<crate::types::FinalizedLine> {
        let mut lines = Vec::new();
        while let Ok(Some(line)) = rx.try_recv() {
            lines.push(line);
        }
        lines
    }

    #[test]
    fn rejects_invalid_config() {
        let mut config = config();
        config.silence_ms = 0;
        assert!(SubtitleStream::start(config, StreamStats::new()).is_err());
    }

    #[test]
    fn acceptance_sequence_yields_single_line() {
        let (mut stream, rx) = start(config());
        stream.ingest(RawSnapshot::new("今天", 0));
        stream.ingest(RawSnapshot::new("今天天气", 100));
        stream.ingest(RawSnapshot::new("今天天气", 200));
        stream.ingest(RawSnapshot::new("今天天气很好", 300));
        for ts in (400..=1200).step_by(100) {
            stream.ingest_empty(ts);
        }
        let lines = drain(&rx);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].text, "今天天气很好");
        assert_eq!(lines[0].seq, 0);
    }

    #[test]
    fn new_line_splitting_yields_two_lines() {
        let (mut stream, rx) = start(config());
        for ts in [0, 100, 200] {
            stream.ingest(RawSnapshot::new("今天天气很好", ts));
        }
        for ts in [300, 400, 500] {
            stream.ingest(RawSnapshot::new("明日放送予定", ts));
        }
        stream.flush();
        let lines = drain(&rx);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].text, "今天天气很好");
        assert_eq!(lines[1].text, "明日放送予定");
    }

    #[test]
    fn sequence_numbers_are_unique_and_ordered() {
        // Pseudo-random unit stream; however it reconciles, every emitted
        // sequence number must appear exactly once, in order, with strictly
        // ordered timestamps.
        let (mut stream, rx) = start(config());
        let words = ["alpha", "bravo gamma", "delta", "epsilon zeta eta", "theta"];
        let mut seed = 0x2545f491u64;
        for i in 0..400i64 {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let pick = (seed >> 33) as usize % (words.len() + 1);
            let ts = i * 90;
            if pick == words.len() {
                stream.ingest_empty(ts);
            } else {
                stream.ingest(RawSnapshot::new(words[pick], ts));
            }
        }
        stream.flush();

        let lines = drain(&rx);
        assert!(!lines.is_empty());
        // The queue drops oldest on overflow, so the surviving window must be
        // a run of consecutive sequence numbers ending at the last emitted.
        for pair in lines.windows(2) {
            assert_eq!(pair[1].seq, pair[0].seq + 1);
            assert!(pair[1].start_ms >= pair[0].end_ms);
        }
        assert_eq!(lines.last().unwrap().seq, stream.lines_emitted() - 1);
    }

    #[test]
    fn flush_on_empty_stream_emits_nothing() {
        let (mut stream, rx) = start(config());
        stream.flush();
        assert!(drain(&rx).is_empty());
        assert_eq!(stream.lines_emitted(), 0);
    }

    #[test]
    fn stats_track_snapshots_and_lines() {
        let stats = StreamStats::new();
        let (mut stream, rx) = SubtitleStream::start(config(), stats.clone()).unwrap();
        stream.ingest(RawSnapshot::new("hello world", 0));
        stream.ingest_empty(100);
        stream.ingest(RawSnapshot::new("[MUSIC]", 200));
        stream.flush();
        drop(rx);
        assert_eq!(stats.snapshots_seen(), 3);
        assert_eq!(stats.snapshots_empty(), 2);
        assert_eq!(stats.lines_finalized(), 1);
    }

    #[test]
    fn queue_overflow_drops_oldest_and_counts() {
        let mut config = config();
        config.line_queue_capacity = 2;
        let stats = StreamStats::new();
        let (mut stream, rx) = SubtitleStream::start(config, stats.clone()).unwrap();
        let lines = ["aaaa", "bbbb", "cccc", "dddd"];
        for (i, text) in lines.iter().enumerate() {
            let ts = i as i64 * 1000;
            stream.ingest(RawSnapshot::new(*text, ts));
            stream.ingest(RawSnapshot::new(*text, ts + 100));
            stream.tick(ts + 600);
        }
        let received = drain(&rx);
        assert_eq!(received.len(), 2);
        assert_eq!(stats.lines_dropped(), 2);
        assert_eq!(received[0].text, "cccc");
        assert_eq!(received[1].text, "dddd");
    }

    /// Replays scripted snapshots, then reports a far-future clock so the
    /// processor's idle tick times out the final candidate.
    struct ScriptedSource {
        events: Mutex<VecDeque<RawSnapshot>>,
        last_ts: i64,
        end_now: i64,
        stopped: Arc<AtomicBool>,
    }

    impl SnapshotSource for ScriptedSource {
        fn start(&mut self) -> Result<(), SourceError> {
            Ok(())
        }

        fn stop(&mut self) {
            self.stopped.store(true, Ordering::Relaxed);
        }

        fn try_recv(&mut self) -> Option<RawSnapshot> {
            let next = self.events.lock().unwrap().pop_front()?;
            self.last_ts = next.ts_ms;
            Some(next)
        }

        fn now_ms(&self) -> i64 {
            if self.events.lock().unwrap().is_empty() {
                self.end_now
            } else {
                self.last_ts
            }
        }
    }

    #[test]
    fn processor_drains_source_and_flushes_on_stop() {
        let stopped = Arc::new(AtomicBool::new(false));
        let events: VecDeque<RawSnapshot> = [
            RawSnapshot::new("今天天气很好", 0),
            RawSnapshot::new("今天天气很好", 150),
            RawSnapshot::new("明日放送予定", 300),
        ]
        .into_iter()
        .collect();
        let source = ScriptedSource {
            events: Mutex::new(events),
            last_ts: 0,
            end_now: 10_000,
            stopped: Arc::clone(&stopped),
        };

        let (mut processor, rx) =
            StreamProcessor::start(Box::new(source), config(), StreamStats::new()).unwrap();

        let first = rx.recv_timeout(Duration::from_secs(2)).expect("first line");
        assert_eq!(first.text, "今天天气很好");
        let second = rx.recv_timeout(Duration::from_secs(2)).expect("second line");
        assert_eq!(second.text, "明日放送予定");

        processor.stop();
        assert!(stopped.load(Ordering::Relaxed));
    }
}
