use crate::types::FinalizedLine;
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SendOutcome {
    Sent,
    DroppedOldest,
    Disconnected,
}

struct QueueState {
    closed: bool,
    items: VecDeque<FinalizedLine>,
}

struct LineQueue {
    capacity: usize,
    state: Mutex<QueueState>,
    available: Condvar,
}

/// Producer half. Never blocks: on overflow the oldest line is dropped so the
/// capture loop is never held up by a slow translation consumer.
pub(crate) struct LineSender {
    inner: Arc<LineQueue>,
}

/// Consumer half, handed to translation/display collaborators.
pub struct LineReceiver {
    inner: Arc<LineQueue>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineRecvError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineRecvTimeoutError {
    Timeout,
    Disconnected,
}

impl fmt::Display for LineRecvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("line channel closed")
    }
}

impl fmt::Display for LineRecvTimeoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LineRecvTimeoutError::Timeout => f.write_str("line receive timed out"),
            LineRecvTimeoutError::Disconnected => f.write_str("line channel closed"),
        }
    }
}

impl std::error::Error for LineRecvError {}
impl std::error::Error for LineRecvTimeoutError {}

pub(crate) fn line_channel(capacity: usize) -> (LineSender, LineReceiver) {
    debug_assert!(capacity > 0, "line channel capacity must be non-zero");
    let queue = Arc::new(LineQueue {
        capacity: capacity.max(1),
        state: Mutex::new(QueueState {
            closed: false,
            items: VecDeque::with_capacity(capacity),
        }),
        available: Condvar::new(),
    });

    (
        LineSender {
            inner: Arc::clone(&queue),
        },
        LineReceiver { inner: queue },
    )
}

impl LineSender {
    pub(crate) fn send_drop_oldest(&self, line: FinalizedLine) -> SendOutcome {
        let mut state = self.inner.state.lock().unwrap();
        if state.closed {
            return SendOutcome::Disconnected;
        }

        let mut dropped = false;
        if state.items.len() == self.inner.capacity {
            state.items.pop_front();
            dropped = true;
        }

        state.items.push_back(line);
        self.inner.available.notify_one();

        if dropped {
            SendOutcome::DroppedOldest
        } else {
            SendOutcome::Sent
        }
    }
}

impl Drop for LineSender {
    fn drop(&mut self) {
        let mut state = self.inner.state.lock().unwrap();
        if !state.closed {
            state.closed = true;
            self.inner.available.notify_all();
        }
    }
}

impl LineReceiver {
    pub fn recv(&self) -> Result<FinalizedLine, LineRecvError> {
        let mut state = self.inner.state.lock().unwrap();
        loop {
            if let Some(item) = state.items.pop_front() {
                return Ok(item);
            }

            if state.closed {
                return Err(LineRecvError);
            }

            state = self.inner.available.wait(state).unwrap();
        }
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Result<FinalizedLine, LineRecvTimeoutError> {
        let mut state = self.inner.state.lock().unwrap();
        let start = Instant::now();
        let mut remaining = timeout;

        loop {
            if let Some(item) = state.items.pop_front() {
                return Ok(item);
            }

            if state.closed {
                return Err(LineRecvTimeoutError::Disconnected);
            }

            let (next_state, result) = self.inner.available.wait_timeout(state, remaining).unwrap();
            state = next_state;

            if result.timed_out() {
                return Err(LineRecvTimeoutError::Timeout);
            }

            let elapsed = start.elapsed();
            if elapsed >= timeout {
                return Err(LineRecvTimeoutError::Timeout);
            }
            remaining = timeout - elapsed;
        }
    }

    /// Non-blocking poll, for consumers that interleave other work.
    pub fn try_recv(&self) -> Result<Option<FinalizedLine>, LineRecvError> {
        let mut state = self.inner.state.lock().unwrap();
        if let Some(item) = state.items.pop_front() {
            return Ok(Some(item));
        }
        if state.closed {
            return Err(LineRecvError);
        }
        Ok(None)
    }
}
