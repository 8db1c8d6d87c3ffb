//! Content analysis over a rolling window of admitted frames.
//!
//! Signals are computed from small downsampled luma digests rather than the
//! full frames, so the window costs kilobytes regardless of input
//! resolution. Computation runs at a fixed cadence to bound per-frame cost.

use std::collections::VecDeque;

use vigil_models::{ContentSignals, Frame};

/// Side length of the square digest each frame is reduced to.
const DIGEST_EDGE: usize = 16;

/// Luma gradient above which a digest cell counts as an edge.
const EDGE_THRESHOLD: f64 = 24.0;

/// Downsampled luma digest of one frame.
#[derive(Debug, Clone)]
struct FrameDigest {
    cells: [u8; DIGEST_EDGE * DIGEST_EDGE],
}

impl FrameDigest {
    /// Nearest-neighbor downsample of the frame's luma plane.
    fn from_frame(frame: &Frame) -> Self {
        let mut cells = [0u8; DIGEST_EDGE * DIGEST_EDGE];
        let width = frame.width as usize;
        let height = frame.height as usize;
        for gy in 0..DIGEST_EDGE {
            let sy = gy * height / DIGEST_EDGE;
            for gx in 0..DIGEST_EDGE {
                let sx = gx * width / DIGEST_EDGE;
                cells[gy * DIGEST_EDGE + gx] = frame.data[sy * width + sx];
            }
        }
        Self { cells }
    }
}

/// Derives motion intensity and scene complexity from recent frames.
///
/// Pure over its window: `observe` only buffers and, at cadence boundaries,
/// recomputes; it never touches anything outside the analyzer.
pub struct ContentAnalyzer {
    window: VecDeque<FrameDigest>,
    window_len: usize,
    cadence: u64,
    observed: u64,
    latest: ContentSignals,
}

impl ContentAnalyzer {
    pub fn new(window_len: usize, cadence: u64) -> Self {
        Self {
            window: VecDeque::with_capacity(window_len),
            window_len: window_len.max(2),
            cadence: cadence.max(1),
            observed: 0,
            latest: ContentSignals::default(),
        }
    }

    /// Most recently computed signals.
    pub fn signals(&self) -> ContentSignals {
        self.latest
    }

    /// Feed one admitted frame. Returns fresh signals when the cadence
    /// boundary is reached and the window holds enough frames.
    pub fn observe(&mut self, frame: &Frame) -> Option<ContentSignals> {
        if self.window.len() == self.window_len {
            self.window.pop_front();
        }
        self.window.push_back(FrameDigest::from_frame(frame));
        self.observed += 1;

        if self.observed % self.cadence != 0 || self.window.len() < 2 {
            return None;
        }
        self.latest = compute_signals(self.window.make_contiguous());
        Some(self.latest)
    }
}

/// Compute both signals from a window of digests.
fn compute_signals(window: &[FrameDigest]) -> ContentSignals {
    ContentSignals::new(motion_intensity(window), scene_complexity(window))
}

/// Mean absolute luma difference between consecutive digests, normalized
/// to `[0, 1]`.
fn motion_intensity(window: &[FrameDigest]) -> f64 {
    if window.len() < 2 {
        return 0.0;
    }
    let mut total = 0u64;
    let mut samples = 0u64;
    for pair in window.windows(2) {
        for (a, b) in pair[0].cells.iter().zip(pair[1].cells.iter()) {
            total += a.abs_diff(*b) as u64;
            samples += 1;
        }
    }
    total as f64 / samples as f64 / 255.0
}

/// Fraction of digest cells in the newest frame whose local gradient
/// exceeds the edge threshold.
fn scene_complexity(window: &[FrameDigest]) -> f64 {
    let Some(digest) = window.last() else {
        return 0.0;
    };
    let mut edges = 0usize;
    let mut cells = 0usize;
    for y in 0..DIGEST_EDGE - 1 {
        for x in 0..DIGEST_EDGE - 1 {
            let here = digest.cells[y * DIGEST_EDGE + x] as f64;
            let right = digest.cells[y * DIGEST_EDGE + x + 1] as f64;
            let down = digest.cells[(y + 1) * DIGEST_EDGE + x] as f64;
            if (here - right).abs() + (here - down).abs() > EDGE_THRESHOLD {
                edges += 1;
            }
            cells += 1;
        }
    }
    edges as f64 / cells as f64
}
