//! Sequential image-enrichment worker.
//!
//! Slides asking for an illustration are served one call at a time:
//! the provider's free tier enforces a hard request rate, so the queue
//! is a strictly sequential worker over a priority-ordered backlog,
//! never a parallel pool. The slide the user is looking at goes first,
//! everything else follows in ascending index order.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use edugen_gemini::{GeminiError, ImageClient, ImagePayload};
use edugen_protocol::StudioEvent;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::segment::SlideDeck;

/// Seam for the image-generation collaborator.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate(&self, prompt: &str, aspect_ratio: &str)
        -> Result<ImagePayload, GeminiError>;
}

#[async_trait]
impl ImageGenerator for ImageClient {
    async fn generate(
        &self,
        prompt: &str,
        aspect_ratio: &str,
    ) -> Result<ImagePayload, GeminiError> {
        ImageClient::generate(self, prompt, aspect_ratio).await
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    InFlight,
    Succeeded,
    Failed {
        message: String,
        permanent: bool,
        retryable: bool,
    },
}

#[derive(Debug, Clone)]
pub struct ImageTask {
    pub slide: usize,
    pub prompt: String,
    pub attempts: u32,
    pub state: TaskState,
}

#[derive(Debug, Clone)]
pub struct QueuePolicy {
    /// Wait between calls and before a quota retry.
    pub cooldown: Duration,
    /// Total attempts for a task failing on quota before it is marked
    /// permanently failed.
    pub max_quota_attempts: u32,
    pub aspect_ratio: String,
}

impl Default for QueuePolicy {
    fn default() -> Self {
        Self {
            cooldown: Duration::from_secs(60),
            max_quota_attempts: 2,
            aspect_ratio: "16:9".to_string(),
        }
    }
}

/// Shared queue state. `active` is the mutual-exclusion flag; `epoch`
/// invalidates results of calls that were in flight when a new
/// generation started.
#[derive(Debug, Default)]
pub struct QueueState {
    tasks: BTreeMap<usize, ImageTask>,
    cache: HashMap<usize, ImagePayload>,
    viewed_slide: usize,
    active: bool,
    epoch: u64,
}

impl QueueState {
    /// Register a task for every slide with an unresolved directive:
    /// no cached result and no permanently failed task.
    pub fn load_tasks(&mut self, deck: &SlideDeck) {
        for slide in &deck.slides {
            let Some(prompt) = &slide.image_prompt else {
                continue;
            };
            if self.cache.contains_key(&slide.index) {
                continue;
            }
            if let Some(task) = self.tasks.get(&slide.index) {
                if matches!(task.state, TaskState::Failed { permanent: true, .. }) {
                    continue;
                }
            }
            self.tasks.insert(
                slide.index,
                ImageTask {
                    slide: slide.index,
                    prompt: prompt.clone(),
                    attempts: 0,
                    state: TaskState::Pending,
                },
            );
        }
    }

    fn next_pending(&self) -> Option<usize> {
        let viewed = self.tasks.get(&self.viewed_slide);
        if viewed.map(|t| t.state == TaskState::Pending) == Some(true) {
            return Some(self.viewed_slide);
        }
        self.tasks
            .values()
            .find(|t| t.state == TaskState::Pending)
            .map(|t| t.slide)
    }

    fn pending_count(&self) -> usize {
        self.tasks
            .values()
            .filter(|t| t.state == TaskState::Pending)
            .count()
    }

    pub fn image(&self, slide: usize) -> Option<&ImagePayload> {
        self.cache.get(&slide)
    }

    pub fn images(&self) -> HashMap<usize, ImagePayload> {
        self.cache.clone()
    }

    pub fn task_state(&self, slide: usize) -> Option<&TaskState> {
        self.tasks.get(&slide).map(|t| &t.state)
    }

    pub fn attempts(&self, slide: usize) -> u32 {
        self.tasks.get(&slide).map(|t| t.attempts).unwrap_or(0)
    }

    pub fn set_viewed_slide(&mut self, slide: usize) {
        self.viewed_slide = slide;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Re-arm a permanently failed task. Returns whether anything
    /// changed.
    pub fn rearm(&mut self, slide: usize) -> bool {
        match self.tasks.get_mut(&slide) {
            Some(task) if matches!(task.state, TaskState::Failed { permanent: true, .. }) => {
                task.state = TaskState::Pending;
                task.attempts = 0;
                true
            }
            _ => false,
        }
    }

    /// Tear-down for a new generation: the slide index space changes,
    /// so tasks and cached results are dropped and the epoch bump
    /// makes any still-in-flight call discard its result on arrival.
    pub fn reset(&mut self) {
        self.tasks.clear();
        self.cache.clear();
        self.viewed_slide = 0;
        self.epoch = self.epoch.wrapping_add(1);
    }
}

/// Handle owning the shared state and spawning queue runs. Clones
/// share the same state and event channel.
#[derive(Clone)]
pub struct ImageQueue {
    state: Arc<Mutex<QueueState>>,
    policy: QueuePolicy,
    events: async_channel::Sender<StudioEvent>,
}

impl ImageQueue {
    pub fn new(policy: QueuePolicy, events: async_channel::Sender<StudioEvent>) -> Self {
        Self {
            state: Arc::new(Mutex::new(QueueState::default())),
            policy,
            events,
        }
    }

    pub fn state(&self) -> Arc<Mutex<QueueState>> {
        self.state.clone()
    }

    /// Start a queue run. No-op when a run is already active or when
    /// nothing is pending; at most one run executes at a time.
    pub async fn activate(&self, generator: Arc<dyn ImageGenerator>) -> bool {
        let (epoch, pending) = {
            let mut st = self.state.lock().await;
            if st.active {
                return false;
            }
            let pending = st.pending_count();
            if pending == 0 {
                return false;
            }
            st.active = true;
            (st.epoch, pending)
        };

        let _ = self
            .events
            .send(StudioEvent::ImageQueueStarted { pending })
            .await;

        let state = self.state.clone();
        let policy = self.policy.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            run_queue(state, policy, events, generator, epoch).await;
        });
        true
    }

    /// User-initiated retry of a permanently failed task; re-triggers
    /// the queue if it is idle.
    pub async fn retry(&self, slide: usize, generator: Arc<dyn ImageGenerator>) -> bool {
        let rearmed = {
            let mut st = self.state.lock().await;
            st.rearm(slide)
        };
        if rearmed {
            self.activate(generator).await;
        }
        rearmed
    }

    pub async fn reset(&self) {
        let mut st = self.state.lock().await;
        st.reset();
    }
}

async fn run_queue(
    state: Arc<Mutex<QueueState>>,
    policy: QueuePolicy,
    events: async_channel::Sender<StudioEvent>,
    generator: Arc<dyn ImageGenerator>,
    epoch: u64,
) {
    loop {
        // Pick the next task; stop when the backlog is drained or the
        // session moved on.
        let picked = {
            let mut st = state.lock().await;
            if st.epoch != epoch {
                st.active = false;
                return;
            }
            match st.next_pending() {
                Some(slide) => {
                    let task = match st.tasks.get_mut(&slide) {
                        Some(t) => t,
                        None => {
                            st.active = false;
                            return;
                        }
                    };
                    task.state = TaskState::InFlight;
                    task.attempts += 1;
                    Some((slide, task.prompt.clone(), task.attempts))
                }
                None => {
                    st.active = false;
                    None
                }
            }
        };

        let Some((slide, prompt, attempt)) = picked else {
            let _ = events.send(StudioEvent::ImageQueueIdle).await;
            return;
        };

        let _ = events.send(StudioEvent::ImageStarted { slide }).await;
        debug!(slide, attempt, "image call");
        let result = generator.generate(&prompt, &policy.aspect_ratio).await;

        enum Outcome {
            Success,
            QuotaWait,
            Permanent { message: String, retryable: bool },
        }

        let outcome = {
            let mut st = state.lock().await;
            if st.epoch != epoch {
                // The slide index space changed while the call was in
                // flight; the result no longer means anything.
                st.active = false;
                return;
            }
            let Some(task) = st.tasks.get_mut(&slide) else {
                st.active = false;
                return;
            };
            match result {
                Ok(payload) => {
                    task.state = TaskState::Succeeded;
                    st.cache.insert(slide, payload);
                    Outcome::Success
                }
                Err(err) if err.is_quota() => {
                    if attempt >= policy.max_quota_attempts {
                        let message = err.to_string();
                        task.state = TaskState::Failed {
                            message: message.clone(),
                            permanent: true,
                            retryable: true,
                        };
                        Outcome::Permanent {
                            message,
                            retryable: true,
                        }
                    } else {
                        task.state = TaskState::Pending;
                        Outcome::QuotaWait
                    }
                }
                Err(err) => {
                    warn!(slide, "image generation failed: {}", err);
                    let message =
                        "Không thể tạo hình minh họa cho slide này.".to_string();
                    task.state = TaskState::Failed {
                        message: message.clone(),
                        permanent: true,
                        retryable: false,
                    };
                    Outcome::Permanent {
                        message,
                        retryable: false,
                    }
                }
            }
        };

        match outcome {
            Outcome::Success => {
                let _ = events.send(StudioEvent::ImageReady { slide }).await;
                let more = { state.lock().await.next_pending() };
                match more {
                    Some(next) => {
                        if !cooldown(&state, &events, next, policy.cooldown, epoch).await {
                            return;
                        }
                    }
                    None => continue,
                }
            }
            Outcome::QuotaWait => {
                let _ = events
                    .send(StudioEvent::ImageQuotaWait { slide, attempt })
                    .await;
                if !cooldown(&state, &events, slide, policy.cooldown, epoch).await {
                    return;
                }
            }
            Outcome::Permanent { message, retryable } => {
                let _ = events
                    .send(StudioEvent::ImageFailed {
                        slide,
                        message,
                        retryable,
                    })
                    .await;
            }
        }
    }
}

/// Wait out the provider rate limit, ticking a countdown once per
/// second. Returns false when the session epoch changed mid-wait.
async fn cooldown(
    state: &Arc<Mutex<QueueState>>,
    events: &async_channel::Sender<StudioEvent>,
    slide: usize,
    total: Duration,
    epoch: u64,
) -> bool {
    let secs = total.as_secs();
    for remaining in (1..=secs).rev() {
        let _ = events
            .send(StudioEvent::CooldownTick {
                slide,
                remaining_secs: remaining,
            })
            .await;
        tokio::time::sleep(Duration::from_secs(1)).await;
        let mut st = state.lock().await;
        if st.epoch != epoch {
            st.active = false;
            return false;
        }
    }
    let leftover = total - Duration::from_secs(secs);
    if !leftover.is_zero() {
        tokio::time::sleep(leftover).await;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use edugen_common::Theme;
    use crate::segment::Slide;

    fn payload() -> ImagePayload {
        ImagePayload {
            mime_type: "image/png".to_string(),
            data_base64: "aGVsbG8=".to_string(),
        }
    }

    fn deck(prompts: &[(usize, Option<&str>)]) -> SlideDeck {
        SlideDeck {
            theme: Theme::Default,
            slides: prompts
                .iter()
                .map(|(index, prompt)| Slide {
                    index: *index,
                    title: format!("Slide {}", index),
                    body: vec![],
                    image_prompt: prompt.map(str::to_string),
                })
                .collect(),
        }
    }

    struct ScriptedGenerator {
        script: Mutex<VecDeque<Result<ImagePayload, GeminiError>>>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedGenerator {
        fn new(script: Vec<Result<ImagePayload, GeminiError>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                calls: Mutex::new(Vec::new()),
            })
        }

        async fn calls(&self) -> Vec<String> {
            self.calls.lock().await.clone()
        }
    }

    #[async_trait]
    impl ImageGenerator for ScriptedGenerator {
        async fn generate(
            &self,
            prompt: &str,
            _aspect_ratio: &str,
        ) -> Result<ImagePayload, GeminiError> {
            self.calls.lock().await.push(prompt.to_string());
            self.script
                .lock()
                .await
                .pop_front()
                .unwrap_or(Ok(payload()))
        }
    }

    fn policy() -> QueuePolicy {
        QueuePolicy {
            cooldown: Duration::from_secs(3),
            max_quota_attempts: 2,
            aspect_ratio: "16:9".to_string(),
        }
    }

    async fn drain_until_idle(rx: &async_channel::Receiver<StudioEvent>) -> Vec<StudioEvent> {
        let mut events = Vec::new();
        while let Ok(ev) = rx.recv().await {
            let done = matches!(ev, StudioEvent::ImageQueueIdle);
            events.push(ev);
            if done {
                break;
            }
        }
        events
    }

    #[tokio::test(start_paused = true)]
    async fn fills_all_slides_with_cooldown_between_calls() {
        let (tx, rx) = async_channel::unbounded();
        let queue = ImageQueue::new(policy(), tx);
        {
            let mut st = queue.state.lock().await;
            st.load_tasks(&deck(&[(0, Some("cây xanh")), (1, Some("bầu trời"))]));
        }
        let gen = ScriptedGenerator::new(vec![Ok(payload()), Ok(payload())]);
        assert!(queue.activate(gen.clone()).await);

        let events = drain_until_idle(&rx).await;
        let st = queue.state.lock().await;
        assert!(st.image(0).is_some());
        assert!(st.image(1).is_some());
        // One cooldown ran between the two calls.
        let ticks = events
            .iter()
            .filter(|e| matches!(e, StudioEvent::CooldownTick { .. }))
            .count();
        assert_eq!(ticks, 3);
        assert_eq!(gen.calls().await, vec!["cây xanh", "bầu trời"]);
    }

    #[tokio::test(start_paused = true)]
    async fn viewed_slide_is_served_first() {
        let (tx, rx) = async_channel::unbounded();
        let queue = ImageQueue::new(policy(), tx);
        {
            let mut st = queue.state.lock().await;
            st.load_tasks(&deck(&[
                (0, Some("ảnh 0")),
                (1, Some("ảnh 1")),
                (2, Some("ảnh 2")),
            ]));
            st.set_viewed_slide(2);
        }
        let gen = ScriptedGenerator::new(vec![]);
        assert!(queue.activate(gen.clone()).await);
        drain_until_idle(&rx).await;
        assert_eq!(gen.calls().await, vec!["ảnh 2", "ảnh 0", "ảnh 1"]);
    }

    #[tokio::test(start_paused = true)]
    async fn quota_failure_becomes_permanent_after_two_attempts() {
        let (tx, rx) = async_channel::unbounded();
        let queue = ImageQueue::new(policy(), tx);
        {
            let mut st = queue.state.lock().await;
            st.load_tasks(&deck(&[(0, Some("minh họa"))]));
        }
        let gen = ScriptedGenerator::new(vec![
            Err(GeminiError::QuotaExceeded),
            Err(GeminiError::QuotaExceeded),
        ]);
        assert!(queue.activate(gen.clone()).await);
        let events = drain_until_idle(&rx).await;

        let st = queue.state.lock().await;
        assert_eq!(st.attempts(0), 2);
        assert!(matches!(
            st.task_state(0),
            Some(TaskState::Failed {
                permanent: true,
                retryable: true,
                ..
            })
        ));
        assert!(events
            .iter()
            .any(|e| matches!(e, StudioEvent::ImageQuotaWait { slide: 0, attempt: 1 })));
        assert!(events.iter().any(|e| matches!(
            e,
            StudioEvent::ImageFailed {
                slide: 0,
                retryable: true,
                ..
            }
        )));
        assert_eq!(gen.calls().await.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn generic_failure_is_permanent_after_one_attempt() {
        let (tx, rx) = async_channel::unbounded();
        let queue = ImageQueue::new(policy(), tx);
        {
            let mut st = queue.state.lock().await;
            st.load_tasks(&deck(&[(0, Some("minh họa"))]));
        }
        let gen = ScriptedGenerator::new(vec![Err(GeminiError::Stream("reset".into()))]);
        assert!(queue.activate(gen.clone()).await);
        drain_until_idle(&rx).await;

        let st = queue.state.lock().await;
        assert_eq!(st.attempts(0), 1);
        assert!(matches!(
            st.task_state(0),
            Some(TaskState::Failed {
                permanent: true,
                retryable: false,
                ..
            })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn manual_retry_rearms_and_reactivates() {
        let (tx, rx) = async_channel::unbounded();
        let queue = ImageQueue::new(policy(), tx);
        {
            let mut st = queue.state.lock().await;
            st.load_tasks(&deck(&[(0, Some("minh họa"))]));
        }
        let gen = ScriptedGenerator::new(vec![Err(GeminiError::Stream("reset".into()))]);
        assert!(queue.activate(gen.clone()).await);
        drain_until_idle(&rx).await;

        let gen2 = ScriptedGenerator::new(vec![Ok(payload())]);
        assert!(queue.retry(0, gen2.clone()).await);
        drain_until_idle(&rx).await;
        let st = queue.state.lock().await;
        assert_eq!(st.task_state(0), Some(&TaskState::Succeeded));
        assert!(st.image(0).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn activation_is_mutually_exclusive() {
        let (tx, _rx) = async_channel::unbounded();
        let queue = ImageQueue::new(policy(), tx);
        {
            let mut st = queue.state.lock().await;
            st.load_tasks(&deck(&[(0, Some("minh họa"))]));
            st.active = true;
        }
        let gen = ScriptedGenerator::new(vec![]);
        assert!(!queue.activate(gen).await);
    }

    #[tokio::test(start_paused = true)]
    async fn activation_without_unresolved_slides_is_noop() {
        let (tx, _rx) = async_channel::unbounded();
        let queue = ImageQueue::new(policy(), tx);
        {
            let mut st = queue.state.lock().await;
            st.load_tasks(&deck(&[(0, None), (1, None)]));
        }
        let gen = ScriptedGenerator::new(vec![]);
        assert!(!queue.activate(gen).await);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_discards_stale_results() {
        let (tx, rx) = async_channel::unbounded();
        let queue = ImageQueue::new(policy(), tx);
        {
            let mut st = queue.state.lock().await;
            st.load_tasks(&deck(&[(0, Some("minh họa cũ"))]));
        }

        struct SlowGenerator;
        #[async_trait]
        impl ImageGenerator for SlowGenerator {
            async fn generate(
                &self,
                _prompt: &str,
                _aspect_ratio: &str,
            ) -> Result<ImagePayload, GeminiError> {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(ImagePayload {
                    mime_type: "image/png".to_string(),
                    data_base64: "aGVsbG8=".to_string(),
                })
            }
        }

        assert!(queue.activate(Arc::new(SlowGenerator)).await);
        // New generation starts while the call is in flight.
        queue.reset().await;

        // Let the in-flight call land; its result must be discarded.
        tokio::time::sleep(Duration::from_secs(10)).await;
        while let Ok(ev) = rx.try_recv() {
            assert!(
                !matches!(ev, StudioEvent::ImageReady { .. }),
                "stale image result was committed"
            );
        }
        let st = queue.state.lock().await;
        assert!(st.image(0).is_none());
        assert!(!st.active);
    }
}
