use super::debounce::DebounceClock;
use crate::config::ReconcilerConfig;
use crate::score::score;
use crate::types::NormalizedUnit;
use std::collections::VecDeque;

/// Why a candidate was finalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalizeReason {
    /// An unrelated line appeared while this one was open.
    NewLine,
    /// The text sat unchanged for the stability window.
    Stability,
    /// No non-empty snapshot arrived for the silence window.
    Silence,
    /// The stream owner forced a flush.
    Flush,
}

/// The currently-forming subtitle line, owned exclusively by the reconciler.
#[derive(Debug)]
struct CandidateLine {
    text: String,
    chars: usize,
    confidence: Option<f32>,
    first_seen_ms: i64,
    last_update_ms: i64,
    /// Recent contributing units, bounded by `history_window`.
    history: VecDeque<NormalizedUnit>,
    clock: DebounceClock,
}

/// A candidate frozen at finalize time, ready for the emitter.
#[derive(Debug)]
pub(crate) struct ClosedCandidate {
    pub(crate) text: String,
    pub(crate) start_ms: i64,
    pub(crate) end_ms: i64,
    pub(crate) reason: FinalizeReason,
    pub(crate) contributing_units: usize,
    pub(crate) trailing_empties: u32,
}

impl CandidateLine {
    fn open(unit: NormalizedUnit, window: usize) -> Self {
        let now = unit.ts_ms;
        let mut history = VecDeque::with_capacity(window);
        let text = unit.text.clone();
        let chars = unit.chars;
        let confidence = unit.confidence;
        history.push_back(unit);
        Self {
            text,
            chars,
            confidence,
            first_seen_ms: now,
            last_update_ms: now,
            history,
            clock: DebounceClock::new(now),
        }
    }

    /// Fold a continuation unit in. Ambiguous units join the history but may
    /// not replace the text, and they reset the stability window so a single
    /// noisy frame never finalizes a still-forming line.
    fn absorb(&mut self, unit: NormalizedUnit, ambiguous: bool, window: usize) {
        let now = unit.ts_ms;
        let mut changed = false;
        if !ambiguous && self.prefers(&unit) {
            self.text = unit.text.clone();
            self.chars = unit.chars;
            self.confidence = unit.confidence;
            changed = true;
        }
        self.last_update_ms = now;
        self.clock.note_content(now, changed || ambiguous);
        self.history.push_back(unit);
        while self.history.len() > window {
            self.history.pop_front();
        }
    }

    /// Is `unit` a more complete reading than the current text? Longer wins;
    /// at equal length, recognition confidence breaks the tie.
    fn prefers(&self, unit: &NormalizedUnit) -> bool {
        if unit.text == self.text {
            return false;
        }
        if unit.chars != self.chars {
            return unit.chars > self.chars;
        }
        match (unit.confidence, self.confidence) {
            (Some(u), Some(c)) => u > c,
            _ => false,
        }
    }

    fn finalize_reason(&self, now_ms: i64, config: &ReconcilerConfig) -> Option<FinalizeReason> {
        if self.clock.silent_for(now_ms) >= config.silence_ms {
            return Some(FinalizeReason::Silence);
        }
        // Stability needs corroboration: at least two contributing units and
        // a non-trivial length, so a lone partial word is never emitted.
        if self.history.len() >= 2
            && self.chars >= config.min_candidate_chars
            && self.clock.stable_for(now_ms) >= config.stability_ms
        {
            return Some(FinalizeReason::Stability);
        }
        None
    }

    fn close(self, reason: FinalizeReason) -> ClosedCandidate {
        ClosedCandidate {
            text: self.text,
            start_ms: self.first_seen_ms,
            end_ms: self.last_update_ms,
            reason,
            contributing_units: self.history.len(),
            trailing_empties: self.clock.empty_run(),
        }
    }
}

enum State {
    Empty,
    Open(CandidateLine),
}

/// Sequential state machine that merges noisy repeated observations of one
/// subtitle region into finalized lines.
///
/// Runtime states are `Empty` and `Open`; finalizing is the instantaneous
/// hand-off of a [`ClosedCandidate`] to the caller, after which the machine is
/// `Empty` again. At most one candidate is ever open, by construction.
pub(crate) struct LineReconciler {
    config: ReconcilerConfig,
    state: State,
}

impl LineReconciler {
    /// `config` must already be validated.
    pub(crate) fn new(config: ReconcilerConfig) -> Self {
        Self {
            config,
            state: State::Empty,
        }
    }

    /// Feed one unit, in non-decreasing timestamp order. Returns at most one
    /// closed candidate.
    pub(crate) fn ingest(&mut self, unit: NormalizedUnit) -> Option<ClosedCandidate> {
        let now = unit.ts_ms;

        if unit.is_empty() {
            // Silence evidence: never mutates the text, may time it out.
            if let State::Open(candidate) = &mut self.state {
                candidate.clock.note_empty(now);
                return self.check_passive(now);
            }
            return None;
        }

        match std::mem::replace(&mut self.state, State::Empty) {
            State::Empty => {
                self.state = State::Open(CandidateLine::open(unit, self.config.history_window));
                None
            }
            State::Open(mut candidate) => {
                let similarity = score(&candidate.text, &unit.text);
                if similarity < self.config.new_line_threshold {
                    // Unrelated content: the old line left the screen between
                    // frames. Close it and open the new one immediately.
                    let closed = candidate.close(FinalizeReason::NewLine);
                    self.state = State::Open(CandidateLine::open(unit, self.config.history_window));
                    return Some(closed);
                }
                let ambiguous = similarity < self.config.continuation_threshold;
                candidate.absorb(unit, ambiguous, self.config.history_window);
                self.state = State::Open(candidate);
                self.check_passive(now)
            }
        }
    }

    /// Evaluate the passive triggers without new input.
    pub(crate) fn tick(&mut self, now_ms: i64) -> Option<ClosedCandidate> {
        self.check_passive(now_ms)
    }

    /// Force-finalize. Candidates below `min_candidate_chars` are discarded
    /// rather than emitted as partial words. Always leaves the machine empty.
    pub(crate) fn flush(&mut self) -> Option<ClosedCandidate> {
        match std::mem::replace(&mut self.state, State::Empty) {
            State::Empty => None,
            State::Open(candidate) => {
                if candidate.chars >= self.config.min_candidate_chars {
                    Some(candidate.close(FinalizeReason::Flush))
                } else {
                    None
                }
            }
        }
    }

    pub(crate) fn is_open(&self) -> bool {
        matches!(self.state, State::Open(_))
    }

    fn check_passive(&mut self, now_ms: i64) -> Option<ClosedCandidate> {
        let reason = match &self.state {
            State::Open(candidate) => candidate.finalize_reason(now_ms, &self.config)?,
            State::Empty => return None,
        };
        match std::mem::replace(&mut self.state, State::Empty) {
            State::Open(candidate) => Some(candidate.close(reason)),
            State::Empty => unreachable!("checked open above"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize;
    use crate::types::RawSnapshot;

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

    fn unit(text: &str, ts_ms: i64) -> NormalizedUnit {
        normalize(&RawSnapshot::new(text, ts_ms))
    }

    fn unit_conf(text: &str, ts_ms: i64, confidence: f32) -> NormalizedUnit {
        normalize(&RawSnapshot {
            text: text.into(),
            ts_ms,
            confidence: Some(confidence),
        })
    }

    #[test]
    fn empty_units_are_ignored_when_empty() {
        let mut rec = LineReconciler::new(config());
        assert!(rec.ingest(unit("", 0)).is_none());
        assert!(rec.ingest(unit("   ", 100)).is_none());
        assert!(!rec.is_open());
    }

    #[test]
    fn first_non_empty_unit_opens_a_candidate() {
        let mut rec = LineReconciler::new(config());
        assert!(rec.ingest(unit("今天", 0)).is_none());
        assert!(rec.is_open());
    }

    #[test]
    fn incremental_reveal_converges_to_longest() {
        // The concrete acceptance sequence: reveal, repeat, reveal, silence.
        let mut rec = LineReconciler::new(config());
        assert!(rec.ingest(unit("今天", 0)).is_none());
        assert!(rec.ingest(unit("今天天气", 100)).is_none());
        assert!(rec.ingest(unit("今天天气", 200)).is_none());
        assert!(rec.ingest(unit("今天天气很好", 300)).is_none());

        let mut closed = None;
        for ts in (400..=1200).step_by(100) {
            if let Some(c) = rec.ingest(unit("", ts)) {
                closed = Some(c);
                break;
            }
        }
        let closed = closed.expect("trailing quiet span should finalize");
        assert_eq!(closed.text, "今天天气很好");
        assert_eq!(closed.start_ms, 0);
        assert_eq!(closed.end_ms, 300);
        assert!(!rec.is_open());
    }

    #[test]
    fn stability_finalizes_unchanged_text() {
        let mut rec = LineReconciler::new(config());
        assert!(rec.ingest(unit("hello world", 0)).is_none());
        assert!(rec.ingest(unit("hello world", 150)).is_none());
        assert!(rec.ingest(unit("hello world", 300)).is_none());
        // Unchanged since creation: stability window elapses at 400.
        let closed = rec.ingest(unit("hello world", 450)).expect("stable");
        assert_eq!(closed.reason, FinalizeReason::Stability);
        assert_eq!(closed.text, "hello world");
    }

    #[test]
    fn single_unit_never_finalizes_on_stability() {
        let mut rec = LineReconciler::new(config());
        assert!(rec.ingest(unit("hello world", 0)).is_none());
        // Only the silence trigger may close a lone observation.
        let closed = rec.tick(700).map(|c| c.reason);
        assert_eq!(closed, None);
        let closed = rec.tick(900).expect("silence").reason;
        assert_eq!(closed, FinalizeReason::Silence);
    }

    #[test]
    fn short_candidate_not_finalized_on_stability() {
        let mut config = config();
        config.min_candidate_chars = 4;
        let mut rec = LineReconciler::new(config);
        assert!(rec.ingest(unit("ab", 0)).is_none());
        assert!(rec.ingest(unit("ab", 100)).is_none());
        assert!(rec.tick(600).is_none());
        // Silence still times it out so the machine cannot wedge.
        assert!(rec.tick(900).is_some());
    }

    #[test]
    fn unrelated_text_splits_into_two_lines() {
        let mut rec = LineReconciler::new(config());
        for ts in [0, 100, 200] {
            assert!(rec.ingest(unit("今天天气很好", ts)).is_none());
        }
        let closed = rec.ingest(unit("明日放送予定", 300)).expect("new line");
        assert_eq!(closed.reason, FinalizeReason::NewLine);
        assert_eq!(closed.text, "今天天气很好");
        assert_eq!(closed.end_ms, 200);
        assert!(rec.is_open());

        let second = rec.flush().expect("open candidate");
        assert_eq!(second.text, "明日放送予定");
        assert_eq!(second.start_ms, 300);
    }

    #[test]
    fn ambiguous_units_do_not_replace_text_or_satisfy_stability() {
        let mut rec = LineReconciler::new(config());
        assert!(rec.ingest(unit("今天天气很好啊朋友们", 0)).is_none());
        assert!(rec.ingest(unit("今天天气很好啊朋友们", 100)).is_none());
        // Similarity ~0.33: between the thresholds, kept as continuation.
        assert!(rec.ingest(unit("很好", 350)).is_none());
        // The ambiguous frame reset the stability clock at 350.
        assert!(rec.tick(700).is_none());
        let closed = rec.tick(760).expect("stable again");
        assert_eq!(closed.reason, FinalizeReason::Stability);
        assert_eq!(closed.text, "今天天气很好啊朋友们");
    }

    #[test]
    fn silence_timeout_via_empty_run() {
        let mut rec = LineReconciler::new(config());
        assert!(rec.ingest(unit("hello there", 0)).is_none());
        let mut closed = None;
        for ts in (100..=1000).step_by(100) {
            if let Some(c) = rec.ingest(unit("", ts)) {
                closed = Some((c, ts));
                break;
            }
        }
        let (closed, ts) = closed.expect("empty run should time out");
        assert_eq!(closed.reason, FinalizeReason::Silence);
        assert_eq!(closed.text, "hello there");
        assert_eq!(ts, 800);
    }

    #[test]
    fn silence_timeout_via_tick_without_input() {
        let mut rec = LineReconciler::new(config());
        assert!(rec.ingest(unit("hello there", 0)).is_none());
        assert!(rec.tick(500).is_none());
        let closed = rec.tick(800).expect("tick past silence window");
        assert_eq!(closed.reason, FinalizeReason::Silence);
    }

    #[test]
    fn confidence_breaks_equal_length_ties() {
        let mut rec = LineReconciler::new(config());
        assert!(rec.ingest(unit_conf("今天夭气很好", 0, 0.6)).is_none());
        assert!(rec.ingest(unit_conf("今天天气很好", 100, 0.9)).is_none());
        let closed = rec.flush().expect("open candidate");
        assert_eq!(closed.text, "今天天气很好");
    }

    #[test]
    fn lower_confidence_same_length_does_not_replace() {
        let mut rec = LineReconciler::new(config());
        assert!(rec.ingest(unit_conf("今天天气很好", 0, 0.9)).is_none());
        assert!(rec.ingest(unit_conf("今天夭气很好", 100, 0.4)).is_none());
        let closed = rec.flush().expect("open candidate");
        assert_eq!(closed.text, "今天天气很好");
    }

    #[test]
    fn flush_on_empty_is_noop() {
        let mut rec = LineReconciler::new(config());
        assert!(rec.flush().is_none());
    }

    #[test]
    fn flush_discards_below_min_chars() {
        let mut config = config();
        config.min_candidate_chars = 4;
        let mut rec = LineReconciler::new(config);
        assert!(rec.ingest(unit("ab", 0)).is_none());
        assert!(rec.flush().is_none());
        assert!(!rec.is_open());
    }

    #[test]
    fn flush_emits_substantial_candidate() {
        let mut rec = LineReconciler::new(config());
        assert!(rec.ingest(unit("hello world", 0)).is_none());
        let closed = rec.flush().expect("flush");
        assert_eq!(closed.reason, FinalizeReason::Flush);
        assert_eq!(closed.text, "hello world");
        assert!(!rec.is_open());
        // No state leaks into the next line.
        assert!(rec.ingest(unit("next line", 100)).is_none());
        let next = rec.flush().expect("flush");
        assert_eq!(next.start_ms, 100);
    }

    #[test]
    fn history_window_is_bounded() {
        let mut rec = LineReconciler::new(config());
        for ts in 0..20 {
            // Alternate two close variants so nothing finalizes on stability.
            let text = if ts % 2 == 0 { "hello world" } else { "hello worlds" };
            assert!(rec.ingest(unit(text, ts * 10)).is_none());
        }
        let closed = rec.flush().expect("open candidate");
        assert!(closed.contributing_units <= 8);
    }
}
