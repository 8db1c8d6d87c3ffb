//! Time-bounded batch assembly.

use std::time::{Duration, Instant};

use vigil_models::{Batch, Frame};

/// Buffers admitted frames into ordered batches.
///
/// A batch completes when it reaches the current size limit or when the
/// max-wait deadline (armed by the first buffered frame) passes, whichever
/// comes first. The deadline keeps end-to-end latency bounded even when
/// frames trickle in.
pub struct BatchAssembler {
    buffer: Vec<Frame>,
    max_wait: Duration,
    first_buffered_at: Option<Instant>,
}

impl BatchAssembler {
    pub fn new(max_wait: Duration) -> Self {
        Self {
            buffer: Vec::new(),
            max_wait,
            first_buffered_at: None,
        }
    }

    /// Number of frames currently buffered.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Deadline by which the buffered partial batch must be dispatched.
    /// `None` while the buffer is empty.
    pub fn deadline(&self) -> Option<Instant> {
        self.first_buffered_at.map(|t| t + self.max_wait)
    }

    /// Buffer one admitted frame. Returns a completed batch once the buffer
    /// reaches `size_limit`.
    pub fn offer(&mut self, frame: Frame, size_limit: usize) -> Option<Batch> {
        if self.buffer.is_empty() {
            self.first_buffered_at = Some(Instant::now());
        }
        self.buffer.push(frame);
        if self.buffer.len() >= size_limit.max(1) {
            self.take()
        } else {
            None
        }
    }

    /// Emit the buffered partial batch if its deadline has passed.
    pub fn expire(&mut self, now: Instant) -> Option<Batch> {
        match self.deadline() {
            Some(deadline) if now >= deadline => self.take(),
            _ => None,
        }
    }

    /// Emit whatever is buffered. An empty buffer yields no batch.
    pub fn flush(&mut self) -> Option<Batch> {
        self.take()
    }

    fn take(&mut self) -> Option<Batch> {
        self.first_buffered_at = None;
        Batch::new(std::mem::take(&mut self.buffer))
    }
}
