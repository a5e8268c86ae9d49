//! Stage trait and render options
//!
//! A stage is one step of the signal chain. Stages are built fresh for every
//! render and hold only their parameters; per-render state such as filter
//! history or delay lines lives on the stack of `process`.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::engine::AudioBuffer;
use crate::error::Result;

/// Base trait for all signal chain stages
///
/// A stage consumes the buffer produced by the previous stage and returns the
/// buffer for the next one. Only the pitch stage changes the length.
pub trait Stage: Send + Sync {
    /// Stage identifier used in logs
    fn name(&self) -> &'static str;

    /// Process a whole buffer
    fn process(&self, input: AudioBuffer) -> Result<AudioBuffer>;
}

/// Per-render knobs that are not part of an effect definition
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    /// Seed for the reverb impulse noise. `None` draws fresh entropy per
    /// render, so two renders of the same reverb effect differ.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reverb_seed: Option<u64>,
}

impl RenderOptions {
    pub fn seeded(seed: u64) -> Self {
        Self {
            reverb_seed: Some(seed),
        }
    }
}

/// Cooperative cancellation flag shared between a render and its owner
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation; the render stops before its next stage
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
