use edugen_common::GenerationRequest;
use serde::{Deserialize, Serialize};

/// Events published by a generation session to its consumers (CLI,
/// TUI). Buffer snapshots are monotonically growing within a session;
/// a `GenerationStarted` resets the sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StudioEvent {
    GenerationStarted,
    /// Throttled snapshot of the accumulated content.
    BufferUpdate { content: String },
    /// Final, always-flushed content.
    GenerationComplete { content: String },
    GenerationFailed { message: String },
    ImageQueueStarted { pending: usize },
    ImageStarted { slide: usize },
    ImageReady { slide: usize },
    ImageFailed {
        slide: usize,
        message: String,
        retryable: bool,
    },
    /// A quota hit that will be retried once the cooldown passes.
    ImageQuotaWait { slide: usize, attempt: u32 },
    /// Live countdown while the queue waits out the provider rate
    /// limit before touching `slide` next.
    CooldownTick { slide: usize, remaining_secs: u64 },
    ImageQueueIdle,
    ShutdownComplete,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Op {
    StartGeneration { request: GenerationRequest },
    /// Re-arm a permanently failed image task.
    RetryImage { slide: usize },
    /// The slide the user is looking at; served first by the queue.
    SetViewedSlide { slide: usize },
    Shutdown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    pub id: String,
    pub op: Op,
}

impl Submission {
    pub fn new(op: Op) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            op,
        }
    }
}
