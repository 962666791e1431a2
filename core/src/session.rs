//! One generation session: owns the stream buffer, the slide deck and
//! the image queue, and publishes progress as [`StudioEvent`]s.
//! Created fresh per generation; calling [`GenerationSession::generate`]
//! again tears the previous run down, so no state outlives its
//! session by accident.

use std::collections::HashMap;
use std::sync::Arc;

use edugen_common::{GenerationRequest, WorkMode};
use edugen_gemini::{GeminiClient, ImageClient, ImagePayload, StreamEvent};
use edugen_protocol::{Op, StudioEvent, Submission};
use tokio::sync::Mutex;
use tracing::{error, info};

use crate::accumulator::{PublishPolicy, StreamAccumulator};
use crate::client::{StubGenerator, TextGenerator};
use crate::config::Config;
use crate::error::Result;
use crate::image_queue::{ImageGenerator, ImageQueue, QueuePolicy, QueueState};
use crate::prompt;
use crate::segment::{split_slides, SlideDeck};

pub struct GenerationSession {
    config: Config,
    accumulator: StreamAccumulator,
    queue: ImageQueue,
    events_tx: async_channel::Sender<StudioEvent>,
    text: Arc<dyn TextGenerator>,
    images: Option<Arc<dyn ImageGenerator>>,
    deck: Option<SlideDeck>,
    mode: Option<WorkMode>,
}

impl GenerationSession {
    pub fn new(config: Config) -> (Self, async_channel::Receiver<StudioEvent>) {
        let text: Arc<dyn TextGenerator> = match &config.api_key {
            Some(key) => Arc::new(GeminiClient::new_with_model(
                key.clone(),
                config.model.clone(),
            )),
            None => Arc::new(StubGenerator),
        };
        let images: Option<Arc<dyn ImageGenerator>> = config.api_key.as_ref().map(|key| {
            Arc::new(ImageClient::new_with_model(
                key.clone(),
                config.image_model.clone(),
            )) as Arc<dyn ImageGenerator>
        });
        Self::with_collaborators(
            config,
            text,
            images,
            PublishPolicy::default(),
            QueuePolicy::default(),
        )
    }

    /// Construction seam for tests and alternative collaborators.
    pub fn with_collaborators(
        config: Config,
        text: Arc<dyn TextGenerator>,
        images: Option<Arc<dyn ImageGenerator>>,
        publish: PublishPolicy,
        queue_policy: QueuePolicy,
    ) -> (Self, async_channel::Receiver<StudioEvent>) {
        let (events_tx, events_rx) = async_channel::unbounded();
        let queue = ImageQueue::new(queue_policy, events_tx.clone());
        (
            Self {
                config,
                accumulator: StreamAccumulator::new(publish),
                queue,
                events_tx,
                text,
                images,
                deck: None,
                mode: None,
            },
            events_rx,
        )
    }

    /// Run one generation to completion. Failures are converted to
    /// events and recorded state, never propagated as faults; partial
    /// content already published stays available.
    pub async fn generate(&mut self, request: GenerationRequest) -> Result<()> {
        info!(mode = ?request.mode, topic = %request.topic, "generation start");
        self.deck = None;
        self.mode = Some(request.mode);
        self.queue.reset().await;
        self.accumulator.start();
        self.emit(StudioEvent::GenerationStarted).await;

        let parts = prompt::select(&request);
        let mut rx = match self
            .text
            .stream(
                parts.system_instruction,
                &parts.user_prompt,
                self.config.temperature,
            )
            .await
        {
            Ok(rx) => rx,
            Err(e) => {
                let message = e.to_string();
                error!("generation rejected: {}", message);
                self.accumulator.fail(message.clone());
                self.emit(StudioEvent::GenerationFailed { message }).await;
                return Ok(());
            }
        };

        loop {
            match rx.recv().await {
                Some(StreamEvent::Delta(delta)) => {
                    if let Some(snapshot) = self.accumulator.append(&delta) {
                        let content = snapshot.to_string();
                        self.emit(StudioEvent::BufferUpdate { content }).await;
                    }
                }
                Some(StreamEvent::Error(e)) => {
                    let message = e.to_string();
                    error!("stream failed: {}", message);
                    self.accumulator.fail(message.clone());
                    self.emit(StudioEvent::GenerationFailed { message }).await;
                    return Ok(());
                }
                Some(StreamEvent::Done) | None => break,
            }
        }

        let content = self.accumulator.finish().to_string();
        self.emit(StudioEvent::GenerationComplete {
            content: content.clone(),
        })
        .await;

        if request.mode.is_presentation() {
            let deck = split_slides(&content);
            {
                let state = self.queue.state();
                let mut st = state.lock().await;
                st.load_tasks(&deck);
            }
            self.deck = Some(deck);
            if let Some(images) = &self.images {
                self.queue.activate(images.clone()).await;
            }
        }
        Ok(())
    }

    /// Dispatch one submitted operation. The serializable op form is
    /// what scripted frontends hand over; interactive consumers may
    /// also call the individual methods directly.
    pub async fn submit(&mut self, submission: Submission) -> Result<()> {
        match submission.op {
            Op::StartGeneration { request } => self.generate(request).await,
            Op::RetryImage { slide } => {
                self.retry_image(slide).await;
                Ok(())
            }
            Op::SetViewedSlide { slide } => {
                self.set_viewed_slide(slide).await;
                Ok(())
            }
            Op::Shutdown => {
                self.queue.reset().await;
                self.emit(StudioEvent::ShutdownComplete).await;
                Ok(())
            }
        }
    }

    async fn emit(&self, event: StudioEvent) {
        let _ = self.events_tx.send(event).await;
    }

    pub fn published(&self) -> &str {
        self.accumulator.published()
    }

    pub fn error(&self) -> Option<&str> {
        self.accumulator.error()
    }

    pub fn is_generating(&self) -> bool {
        self.accumulator.is_generating()
    }

    pub fn mode(&self) -> Option<WorkMode> {
        self.mode
    }

    pub fn deck(&self) -> Option<&SlideDeck> {
        self.deck.as_ref()
    }

    /// Shared queue state, for consumers that render per-slide image
    /// status directly.
    pub fn queue_state(&self) -> Arc<Mutex<QueueState>> {
        self.queue.state()
    }

    /// Cheap handle to the image queue; clones share state, so a
    /// consumer can keep one after the session moved elsewhere.
    pub fn image_queue(&self) -> ImageQueue {
        self.queue.clone()
    }

    pub fn image_generator(&self) -> Option<Arc<dyn ImageGenerator>> {
        self.images.clone()
    }

    pub async fn images(&self) -> HashMap<usize, ImagePayload> {
        self.queue.state().lock().await.images()
    }

    pub async fn set_viewed_slide(&self, slide: usize) {
        self.queue.state().lock().await.set_viewed_slide(slide);
    }

    /// Re-arm a permanently failed image task and re-trigger the queue
    /// if idle. Returns false when there is nothing to retry.
    pub async fn retry_image(&self, slide: usize) -> bool {
        match &self.images {
            Some(images) => self.queue.retry(slide, images.clone()).await,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use edugen_common::{Difficulty, Grade, QuestionType, Theme};
    use edugen_gemini::GeminiError;
    use std::time::Duration;
    use tokio::sync::mpsc;

    enum Script {
        Complete(&'static [&'static str]),
        FailAfter(&'static [&'static str]),
    }

    struct ScriptedText(Script);

    #[async_trait]
    impl TextGenerator for ScriptedText {
        async fn stream(
            &self,
            _system_instruction: &str,
            _user_prompt: &str,
            _temperature: f32,
        ) -> std::result::Result<mpsc::Receiver<StreamEvent>, GeminiError> {
            let (tx, rx) = mpsc::channel(16);
            let (chunks, fail) = match &self.0 {
                Script::Complete(chunks) => (chunks.to_vec(), false),
                Script::FailAfter(chunks) => (chunks.to_vec(), true),
            };
            tokio::spawn(async move {
                for c in chunks {
                    if tx.send(StreamEvent::Delta(c.to_string())).await.is_err() {
                        return;
                    }
                }
                if fail {
                    let _ = tx.send(StreamEvent::Error(GeminiError::QuotaExceeded)).await;
                } else {
                    let _ = tx.send(StreamEvent::Done).await;
                }
            });
            Ok(rx)
        }
    }

    struct OkImages;

    #[async_trait]
    impl ImageGenerator for OkImages {
        async fn generate(
            &self,
            _prompt: &str,
            _aspect_ratio: &str,
        ) -> std::result::Result<ImagePayload, GeminiError> {
            Ok(ImagePayload {
                mime_type: "image/png".to_string(),
                data_base64: "aGVsbG8=".to_string(),
            })
        }
    }

    fn request(mode: WorkMode) -> GenerationRequest {
        GenerationRequest {
            mode,
            subject: "Toán".to_string(),
            grade: Grade::new(9).expect("valid grade"),
            topic: "Phương trình bậc hai".to_string(),
            requirements: String::new(),
            instructions: String::new(),
            question_type: QuestionType::Mixed,
            difficulty: Difficulty::Mixed,
            question_count: 10,
        }
    }

    fn session(
        script: Script,
        images: Option<Arc<dyn ImageGenerator>>,
    ) -> (GenerationSession, async_channel::Receiver<StudioEvent>) {
        GenerationSession::with_collaborators(
            Config::default(),
            Arc::new(ScriptedText(script)),
            images,
            PublishPolicy {
                min_interval: Duration::from_millis(50),
            },
            QueuePolicy {
                cooldown: Duration::from_secs(1),
                max_quota_attempts: 2,
                aspect_ratio: "16:9".to_string(),
            },
        )
    }

    #[tokio::test(start_paused = true)]
    async fn final_content_is_chunk_concatenation() {
        let chunks: &[&str] = &["Câu 1: ", "Tính ", "2 + 2."];
        let (mut s, rx) = session(Script::Complete(chunks), None);
        s.generate(request(WorkMode::Exercise)).await.expect("generate");
        assert_eq!(s.published(), chunks.concat());
        assert!(s.error().is_none());

        let mut saw_complete = false;
        while let Ok(ev) = rx.try_recv() {
            if let StudioEvent::GenerationComplete { content } = ev {
                assert_eq!(content, chunks.concat());
                saw_complete = true;
            }
        }
        assert!(saw_complete);
    }

    #[tokio::test(start_paused = true)]
    async fn stream_failure_preserves_partial_content() {
        let chunks: &[&str] = &["Một phần nội dung đã tới."];
        let (mut s, rx) = session(Script::FailAfter(chunks), None);
        s.generate(request(WorkMode::Exercise)).await.expect("generate");
        assert_eq!(s.published(), chunks.concat());
        assert!(s.error().is_some());
        let mut saw_failed = false;
        while let Ok(ev) = rx.try_recv() {
            if matches!(ev, StudioEvent::GenerationFailed { .. }) {
                saw_failed = true;
            }
        }
        assert!(saw_failed);
    }

    #[tokio::test(start_paused = true)]
    async fn presentation_segments_and_enriches_images() {
        let chunks: &[&str] = &[
            "[THEME: Cam]\n### Slide 1: Mở đầu\nNội dung A\n",
            "---\n### Slide 2: Kết\n[IMAGE_PROMPT: a sunset]\nNội dung B",
        ];
        let (mut s, rx) = session(Script::Complete(chunks), Some(Arc::new(OkImages)));
        s.generate(request(WorkMode::Presentation)).await.expect("generate");

        let deck = s.deck().expect("deck");
        assert_eq!(deck.theme, Theme::Cam);
        assert_eq!(deck.len(), 2);

        // Queue run completes under the paused clock.
        loop {
            match rx.recv().await {
                Ok(StudioEvent::ImageQueueIdle) => break,
                Ok(_) => {}
                Err(_) => panic!("event channel closed early"),
            }
        }
        let images = s.images().await;
        assert!(images.contains_key(&1));
        assert!(!images.contains_key(&0));
    }

    #[tokio::test(start_paused = true)]
    async fn new_generation_tears_down_previous_state() {
        let chunks: &[&str] = &["### Slide 1: Cũ\n[IMAGE_PROMPT: old]\nNội dung cũ"];
        let (mut s, rx) = session(Script::Complete(chunks), Some(Arc::new(OkImages)));
        s.generate(request(WorkMode::Presentation)).await.expect("generate");
        loop {
            match rx.recv().await {
                Ok(StudioEvent::ImageQueueIdle) => break,
                Ok(_) => {}
                Err(_) => panic!("event channel closed early"),
            }
        }
        assert!(!s.images().await.is_empty());

        s.generate(request(WorkMode::Exercise)).await.expect("generate");
        assert!(s.images().await.is_empty());
        assert!(s.deck().is_none());
        assert_eq!(s.published(), chunks.concat());
    }

    #[tokio::test(start_paused = true)]
    async fn submitted_ops_drive_the_session() {
        let chunks: &[&str] = &["### Slide 1: A\nNội dung dài hơn năm ký tự"];
        let (mut s, rx) = session(Script::Complete(chunks), None);
        s.submit(Submission::new(Op::StartGeneration {
            request: request(WorkMode::Presentation),
        }))
        .await
        .expect("submit");
        assert!(s.deck().is_some());

        s.submit(Submission::new(Op::SetViewedSlide { slide: 0 }))
            .await
            .expect("submit");

        s.submit(Submission::new(Op::Shutdown)).await.expect("submit");
        let mut saw_shutdown = false;
        while let Ok(ev) = rx.try_recv() {
            if matches!(ev, StudioEvent::ShutdownComplete) {
                saw_shutdown = true;
            }
        }
        assert!(saw_shutdown);
    }

    #[tokio::test(start_paused = true)]
    async fn without_api_key_stub_generates_a_deck() {
        let (mut s, _rx) = GenerationSession::new(Config::default());
        s.generate(request(WorkMode::Presentation)).await.expect("generate");
        let deck = s.deck().expect("deck");
        assert!(deck.len() >= 2);
        assert_eq!(deck.theme, Theme::XanhDuong);
    }
}
