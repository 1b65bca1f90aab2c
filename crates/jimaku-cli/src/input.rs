use jimaku_core::error::SourceError;
use jimaku_core::source::SnapshotSource;
use jimaku_core::types::RawSnapshot;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fs;
use std::io::{self, BufRead};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, mpsc};
use std::thread;
use std::time::Instant;

#[derive(Debug, thiserror::Error)]
pub enum InputError {
    #[error("input io error: {0}")]
    Io(#[from] io::Error),
    #[error("input parse error at line {line}: {source}")]
    Parse {
        line: usize,
        source: serde_json::Error,
    },
    #[error("snapshots out of order at line {line}")]
    OutOfOrder { line: usize },
}

/// One recorded observation in a JSONL replay file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayRecord {
    pub ts_ms: i64,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub confidence: Option<f32>,
}

/// Reads stdin lines as snapshots at wall-clock arrival time. A blank line is
/// an explicit "no subtitle visible" marker; EOF raises the finished flag.
pub struct StdinSource {
    rx: Option<mpsc::Receiver<String>>,
    epoch: Instant,
    finished: Arc<AtomicBool>,
}

impl StdinSource {
    pub fn new() -> Self {
        Self {
            rx: None,
            epoch: Instant::now(),
            finished: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Raised by the reader thread once stdin reaches EOF.
    pub fn finished_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.finished)
    }
}

impl Default for StdinSource {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotSource for StdinSource {
    fn start(&mut self) -> Result<(), SourceError> {
        let (tx, rx) = mpsc::channel();
        let finished = Arc::clone(&self.finished);
        // The reader blocks on stdin; it is never joined, it just parks on
        // read until EOF or process exit.
        thread::Builder::new()
            .name("jimaku-stdin".into())
            .spawn(move || {
                let stdin = io::stdin();
                for line in stdin.lock().lines() {
                    match line {
                        Ok(text) => {
                            if tx.send(text).is_err() {
                                break;
                            }
                        }
                        Err(_) => break,
                    }
                }
                finished.store(true, Ordering::Relaxed);
            })
            .map_err(|e| SourceError::StartFailed(e.to_string()))?;
        self.rx = Some(rx);
        self.epoch = Instant::now();
        Ok(())
    }

    fn stop(&mut self) {
        self.rx = None;
    }

    fn try_recv(&mut self) -> Option<RawSnapshot> {
        let rx = self.rx.as_ref()?;
        match rx.try_recv() {
            Ok(text) => Some(RawSnapshot::new(text, self.now_ms())),
            Err(_) => None,
        }
    }

    fn now_ms(&self) -> i64 {
        self.epoch.elapsed().as_millis() as i64
    }
}

/// Replays a recorded snapshot stream with its original timestamps, so a
/// tuning run over the same recording is reproducible.
pub struct ReplaySource {
    records: VecDeque<RawSnapshot>,
    last_ts: i64,
    finished: Arc<AtomicBool>,
}

impl ReplaySource {
    pub fn from_path(path: &Path) -> Result<Self, InputError> {
        let raw = fs::read_to_string(path)?;
        let mut records = VecDeque::new();
        let mut prev_ts = i64::MIN;
        for (idx, line) in raw.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let record: ReplayRecord =
                serde_json::from_str(line).map_err(|source| InputError::Parse {
                    line: idx + 1,
                    source,
                })?;
            if record.ts_ms < prev_ts {
                return Err(InputError::OutOfOrder { line: idx + 1 });
            }
            prev_ts = record.ts_ms;
            records.push_back(RawSnapshot {
                text: record.text,
                ts_ms: record.ts_ms,
                confidence: record.confidence,
            });
        }
        Ok(Self {
            records,
            last_ts: 0,
            finished: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn finished_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.finished)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl SnapshotSource for ReplaySource {
    fn start(&mut self) -> Result<(), SourceError> {
        Ok(())
    }

    fn stop(&mut self) {}

    fn try_recv(&mut self) -> Option<RawSnapshot> {
        match self.records.pop_front() {
            Some(snapshot) => {
                self.last_ts = snapshot.ts_ms;
                if self.records.is_empty() {
                    self.finished.store(true, Ordering::Relaxed);
                }
                Some(snapshot)
            }
            None => {
                self.finished.store(true, Ordering::Relaxed);
                None
            }
        }
    }

    /// Replay time is data-driven: it stands still at the last delivered
    /// timestamp, so the trailing candidate is closed by the stop flush
    /// rather than a wall-clock race.
    fn now_ms(&self) -> i64 {
        self.last_ts
    }
}
