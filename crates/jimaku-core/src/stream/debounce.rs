/// Arrival and change clock for one open candidate.
///
/// All times are milliseconds on the stream's monotonic clock. The reconciler
/// feeds it every observation; the passive finalize triggers (stability,
/// silence) read elapsed spans from it, so a periodic tick can finalize even
/// when no new snapshot arrives.
#[derive(Debug, Clone, Copy)]
pub(crate) struct DebounceClock {
    /// Last time the candidate text meaningfully changed (or an ambiguous
    /// unit reset the stability window). Starts at creation time.
    last_change_ms: i64,
    /// Last time a non-empty snapshot contributed. Empty snapshots and
    /// missing input both leave this behind, which is exactly silence.
    last_content_ms: i64,
    empty_run: u32,
}

impl DebounceClock {
    pub(crate) fn new(now_ms: i64) -> Self {
        Self {
            last_change_ms: now_ms,
            last_content_ms: now_ms,
            empty_run: 0,
        }
    }

    pub(crate) fn note_content(&mut self, now_ms: i64, changed: bool) {
        self.last_content_ms = now_ms;
        self.empty_run = 0;
        if changed {
            self.last_change_ms = now_ms;
        }
    }

    pub(crate) fn note_empty(&mut self, _now_ms: i64) {
        self.empty_run += 1;
    }

    pub(crate) fn empty_run(&self) -> u32 {
        self.empty_run
    }

    /// How long the candidate text has sat unchanged.
    pub(crate) fn stable_for(&self, now_ms: i64) -> i64 {
        now_ms - self.last_change_ms
    }

    /// How long since any non-empty snapshot contributed.
    pub(crate) fn silent_for(&self, now_ms: i64) -> i64 {
        now_ms - self.last_content_ms
    }
}
