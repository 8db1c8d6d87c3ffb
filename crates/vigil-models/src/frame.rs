//! Frames and per-frame detections.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Bytes per pixel for the grayscale luma buffers the pipeline carries.
pub const BYTES_PER_PIXEL: usize = 1;

/// Validation failure for a frame offered to the pipeline.
///
/// Invalid frames are dropped and logged; they never abort a session.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameValidationError {
    #[error("frame {sequence} has an empty pixel buffer")]
    EmptyBuffer { sequence: u64 },

    #[error("frame {sequence} has zero dimensions ({width}x{height})")]
    ZeroDimensions { sequence: u64, width: u32, height: u32 },

    #[error("frame {sequence} buffer length {actual} does not match {width}x{height}")]
    BufferMismatch {
        sequence: u64,
        width: u32,
        height: u32,
        actual: usize,
    },
}

/// A single video frame admitted into the pipeline.
///
/// Frames carry a monotonically increasing sequence index assigned at
/// ingestion and are consumed by exactly one batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame {
    /// Monotonically increasing index assigned at ingestion.
    pub sequence: u64,
    /// Capture timestamp.
    pub captured_at: DateTime<Utc>,
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Raw luma pixel buffer, row-major, `width * height` bytes.
    #[serde(skip_serializing, default)]
    pub data: Vec<u8>,
}

impl Frame {
    /// Create a frame captured now.
    pub fn new(sequence: u64, width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            sequence,
            captured_at: Utc::now(),
            width,
            height,
            data,
        }
    }

    /// Structural validation: non-empty buffer consistent with dimensions.
    pub fn validate(&self) -> Result<(), FrameValidationError> {
        if self.width == 0 || self.height == 0 {
            return Err(FrameValidationError::ZeroDimensions {
                sequence: self.sequence,
                width: self.width,
                height: self.height,
            });
        }
        if self.data.is_empty() {
            return Err(FrameValidationError::EmptyBuffer {
                sequence: self.sequence,
            });
        }
        let expected = self.width as usize * self.height as usize * BYTES_PER_PIXEL;
        if self.data.len() != expected {
            return Err(FrameValidationError::BufferMismatch {
                sequence: self.sequence,
                width: self.width,
                height: self.height,
                actual: self.data.len(),
            });
        }
        Ok(())
    }
}

/// Axis-aligned bounding box in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// A single behavior detection within one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Behavior class label (e.g. "loitering", "intrusion").
    pub label: String,
    /// Model confidence in `[0, 1]`.
    pub confidence: f32,
    /// Region the detection applies to.
    pub bbox: BoundingBox,
}
