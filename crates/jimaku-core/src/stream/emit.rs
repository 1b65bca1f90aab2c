use super::reconciler::ClosedCandidate;
use crate::types::FinalizedLine;

/// Freezes closed candidates into [`FinalizedLine`]s with per-stream sequence
/// numbers.
///
/// At-most-once emission is structural: a `ClosedCandidate` is consumed by
/// value, so no candidate instance can be emitted twice. Monotonic sequence
/// numbers and non-overlapping time ranges are invariants of the sequential
/// pipeline; breaking them is a programming error and asserts.
pub(crate) struct Emitter {
    next_seq: u64,
    last_end_ms: i64,
}

impl Emitter {
    pub(crate) fn new() -> Self {
        Self {
            next_seq: 0,
            last_end_ms: i64::MIN,
        }
    }

    pub(crate) fn emit(&mut self, closed: ClosedCandidate) -> FinalizedLine {
        assert!(
            closed.start_ms >= self.last_end_ms,
            "finalized line ranges must not overlap: start {} < previous end {}",
            closed.start_ms,
            self.last_end_ms
        );
        assert!(
            closed.end_ms >= closed.start_ms,
            "finalized line must not end before it starts"
        );

        let line = FinalizedLine {
            seq: self.next_seq,
            text: closed.text,
            start_ms: closed.start_ms,
            end_ms: closed.end_ms,
        };
        self.next_seq += 1;
        self.last_end_ms = line.end_ms;
        line
    }

    pub(crate) fn emitted(&self) -> u64 {
        self.next_seq
    }
}
