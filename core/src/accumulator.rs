//! Append-only buffer for content arriving piecewise from the
//! generation stream, with a publish throttle so consumers are not
//! redrawn on every delta.

use std::time::Duration;
use tokio::time::Instant;

/// Publish timing; a tighter interval is handy in tests.
#[derive(Debug, Clone)]
pub struct PublishPolicy {
    pub min_interval: Duration,
}

impl Default for PublishPolicy {
    fn default() -> Self {
        Self {
            min_interval: Duration::from_millis(50),
        }
    }
}

/// Owned by the active generation session; `start()` tears the
/// previous buffer down. Published snapshots only ever grow within a
/// session, so consumers may render suffixes.
#[derive(Debug)]
pub struct StreamAccumulator {
    buffer: String,
    published: String,
    last_publish: Option<Instant>,
    policy: PublishPolicy,
    error: Option<String>,
    generating: bool,
}

impl StreamAccumulator {
    pub fn new(policy: PublishPolicy) -> Self {
        Self {
            buffer: String::new(),
            published: String::new(),
            last_publish: None,
            policy,
            error: None,
            generating: false,
        }
    }

    /// Reset for a new generation: empty buffer, cleared error state.
    pub fn start(&mut self) {
        self.buffer.clear();
        self.published.clear();
        self.last_publish = None;
        self.error = None;
        self.generating = true;
    }

    /// Append a chunk. Returns a snapshot when a publish is due, i.e.
    /// at most once per `min_interval` measured from the last publish.
    pub fn append(&mut self, chunk: &str) -> Option<&str> {
        self.buffer.push_str(chunk);
        let due = match self.last_publish {
            Some(last) => last.elapsed() >= self.policy.min_interval,
            None => true,
        };
        if due {
            self.published.clone_from(&self.buffer);
            self.last_publish = Some(Instant::now());
            Some(&self.published)
        } else {
            None
        }
    }

    /// Completion flush: always publishes, so a chunk landing inside
    /// the throttle window is never lost.
    pub fn finish(&mut self) -> &str {
        self.published.clone_from(&self.buffer);
        self.last_publish = Some(Instant::now());
        self.generating = false;
        &self.published
    }

    /// Record a user-facing failure; the last published buffer stays
    /// intact so partial results survive.
    pub fn fail(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
        self.generating = false;
    }

    pub fn published(&self) -> &str {
        &self.published
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_generating(&self) -> bool {
        self.generating
    }
}

impl Default for StreamAccumulator {
    fn default() -> Self {
        Self::new(PublishPolicy::default())
    }
}
