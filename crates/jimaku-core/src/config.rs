use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

/// Tuning for one reconciliation stream, supplied once at stream start.
///
/// The defaults are the values the original subtitle pipeline converged on
/// for CJK-to-English OCR at 3-4 captures per second. Thresholds are tuning
/// parameters: recalibrate per language pair and capture cadence rather than
/// trusting these universally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcilerConfig {
    /// Similarity at or above which a snapshot extends the open candidate.
    pub continuation_threshold: f64,
    /// Similarity below which a snapshot opens a brand-new line.
    pub new_line_threshold: f64,
    /// How long the candidate text must sit unchanged before it finalizes.
    pub stability_ms: i64,
    /// How long without a non-empty snapshot before an open candidate finalizes.
    pub silence_ms: i64,
    /// Candidates shorter than this never finalize on stability or flush.
    pub min_candidate_chars: usize,
    /// How many recent contributing units the candidate keeps for voting.
    pub history_window: usize,
    /// Capacity of the finalized-line channel to downstream consumers.
    pub line_queue_capacity: usize,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            continuation_threshold: 0.5,
            new_line_threshold: 0.25,
            stability_ms: 400,
            silence_ms: 800,
            min_candidate_chars: 2,
            history_window: 8,
            line_queue_capacity: 16,
        }
    }
}

impl ReconcilerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_threshold("continuation_threshold", self.continuation_threshold)?;
        check_threshold("new_line_threshold", self.new_line_threshold)?;
        if self.new_line_threshold >= self.continuation_threshold {
            return Err(ConfigError::ThresholdOrder {
                new_line: self.new_line_threshold,
                continuation: self.continuation_threshold,
            });
        }
        check_duration("stability_ms", self.stability_ms)?;
        check_duration("silence_ms", self.silence_ms)?;
        if self.min_candidate_chars < 1 {
            return Err(ConfigError::TooSmall {
                name: "min_candidate_chars",
                min: 1,
            });
        }
        if self.history_window < 2 {
            return Err(ConfigError::TooSmall {
                name: "history_window",
                min: 2,
            });
        }
        if self.line_queue_capacity < 1 {
            return Err(ConfigError::TooSmall {
                name: "line_queue_capacity",
                min: 1,
            });
        }
        Ok(())
    }
}

fn check_threshold(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&value) || value.is_nan() {
        return Err(ConfigError::ThresholdRange { name, value });
    }
    Ok(())
}

fn check_duration(name: &'static str, value: i64) -> Result<(), ConfigError> {
    if value <= 0 {
        return Err(ConfigError::NonPositiveDuration { name, value });
    }
    Ok(())
}
