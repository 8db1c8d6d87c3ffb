//! Engine error types.

use thiserror::Error;
use vigil_models::ProcessingAttempt;

use crate::config::ConfigError;

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Every fallback tier failed for some unit of work. Fatal for the
    /// session; carries the full attempt history for diagnostics.
    #[error("all fallback tiers exhausted after {} attempts", .attempts.len())]
    AllTiersExhausted { attempts: Vec<ProcessingAttempt> },

    /// The model returned a detection list whose length does not match the
    /// submitted unit. Treated as fatal: results would be garbled.
    #[error("model returned {got} detection lists for {expected} frames")]
    ModelContract { expected: usize, got: usize },

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The caller dropped the result receiver while the session was running.
    #[error("result channel closed by receiver")]
    ResultChannelClosed,

    /// Internal pipeline task failed to join.
    #[error("pipeline task panicked or was aborted: {0}")]
    TaskJoin(String),
}
