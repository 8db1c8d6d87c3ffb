//! Shared data models for the Vigil behavior-detection inference engine.
//!
//! This crate provides Serde-serializable types for:
//! - Frames, detections, and batches flowing through the pipeline
//! - Accelerator memory samples and the adaptive batch-size policy
//! - Frame-sampling signals and skip plans
//! - Fallback tiers for graceful degradation
//! - Processing-attempt records and telemetry events

pub mod attempt;
pub mod batch;
pub mod frame;
pub mod memory;
pub mod policy;
pub mod sampling;
pub mod telemetry;
pub mod tier;

// Re-export common types
pub use attempt::{AttemptOutcome, BatchSpan, ProcessingAttempt};
pub use batch::{Batch, BatchOutcome, BatchResult};
pub use frame::{BoundingBox, Detection, Frame, FrameValidationError};
pub use memory::MemorySample;
pub use policy::BatchSizePolicy;
pub use sampling::{ContentSignals, SkipPlan, MAX_STRIDE, MIN_STRIDE};
pub use telemetry::{TelemetryEvent, TelemetryKind};
pub use tier::{DeviceClass, FallbackTier, PrecisionMode};
