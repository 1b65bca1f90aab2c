use crate::error::SourceError;
use crate::types::RawSnapshot;

/// Trait for snapshot producers: OCR capture loops, speech transcription
/// feeds, or recorded replays.
///
/// Snapshots must come out of `try_recv` in non-decreasing `ts_ms` order, on
/// the same monotonic clock `now_ms` reads. The reconciler does not correct
/// out-of-order delivery; that is a contract violation by the source.
pub trait SnapshotSource: Send {
    fn start(&mut self) -> Result<(), SourceError>;

    fn stop(&mut self);

    /// Non-blocking poll for the next observation.
    fn try_recv(&mut self) -> Option<RawSnapshot>;

    /// Current reading of the clock that timestamps this source's snapshots,
    /// used by the pipeline to tick silence finalization while idle.
    fn now_ms(&self) -> i64;
}
