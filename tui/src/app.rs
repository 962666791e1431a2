use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Paragraph, Wrap},
};
use std::collections::HashMap;
use std::io;
use std::sync::Arc;
use unicode_width::UnicodeWidthStr;

use edugen_common::{GenerationRequest, WorkMode};
use edugen_core::image_queue::{ImageGenerator, ImageQueue};
use edugen_core::segment::{split_slides, SlideDeck};
use edugen_core::{Config, GenerationSession};
use edugen_protocol::StudioEvent;

use crate::style::{body_line, hex_color, title_line};

/// Interactive studio: stream content live, browse slides as they
/// appear, watch image enrichment, retry failed images with 'r'.
pub async fn run_studio(config: Config, request: GenerationRequest) -> Result<()> {
    let (mut session, events) = GenerationSession::new(config);
    let queue = session.image_queue();
    let generator = session.image_generator();
    let mode = request.mode;
    let topic = request.topic.clone();

    tokio::spawn(async move {
        let _ = session.generate(request).await;
    });

    let mut app = StudioApp::new(mode, topic, events, queue, generator);
    app.run().await
}

pub struct StudioApp {
    running: bool,
    mode: WorkMode,
    topic: String,
    content: String,
    deck: Option<SlideDeck>,
    current_slide: usize,
    generating: bool,
    error: Option<String>,
    status: String,
    image_notes: HashMap<usize, String>,
    events: async_channel::Receiver<StudioEvent>,
    queue: ImageQueue,
    generator: Option<Arc<dyn ImageGenerator>>,
}

impl StudioApp {
    pub fn new(
        mode: WorkMode,
        topic: String,
        events: async_channel::Receiver<StudioEvent>,
        queue: ImageQueue,
        generator: Option<Arc<dyn ImageGenerator>>,
    ) -> Self {
        Self {
            running: true,
            mode,
            topic,
            content: String::new(),
            deck: None,
            current_slide: 0,
            generating: true,
            error: None,
            status: "Đang chuẩn bị...".to_string(),
            image_notes: HashMap::new(),
            events,
            queue,
            generator,
        }
    }

    pub async fn run(&mut self) -> Result<()> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        while self.running {
            terminal.draw(|f| self.draw(f))?;

            // Local clone so the recv future does not hold a borrow of
            // self across the handler bodies.
            let events = self.events.clone();
            tokio::select! {
                ev = events.recv() => {
                    if let Ok(ev) = ev {
                        self.handle_event(ev);
                    }
                }
                event_result = tokio::task::spawn_blocking(|| event::poll(std::time::Duration::from_millis(50))) => {
                    if let Ok(Ok(true)) = event_result {
                        if let Ok(Event::Key(key)) = event::read() {
                            match key.code {
                                KeyCode::Char('q') | KeyCode::Esc => {
                                    self.running = false;
                                }
                                KeyCode::Left | KeyCode::Char('h') => {
                                    self.change_slide(-1).await;
                                }
                                KeyCode::Right | KeyCode::Char('l') => {
                                    self.change_slide(1).await;
                                }
                                KeyCode::Char('r') => {
                                    self.retry_current_image().await;
                                }
                                _ => {}
                            }
                        }
                    }
                }
            }
        }

        disable_raw_mode()?;
        execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
        terminal.show_cursor()?;

        Ok(())
    }

    fn handle_event(&mut self, ev: StudioEvent) {
        match ev {
            StudioEvent::GenerationStarted => {
                self.generating = true;
                self.error = None;
                self.status = "Đang tạo nội dung...".to_string();
            }
            StudioEvent::BufferUpdate { content } => {
                self.set_content(content);
            }
            StudioEvent::GenerationComplete { content } => {
                self.set_content(content);
                self.generating = false;
                self.status = "Hoàn tất.".to_string();
            }
            StudioEvent::GenerationFailed { message } => {
                self.generating = false;
                self.error = Some(message);
            }
            StudioEvent::ImageQueueStarted { pending } => {
                self.status = format!("Đang tạo {} hình minh họa...", pending);
            }
            StudioEvent::ImageStarted { slide } => {
                self.image_notes
                    .insert(slide, "Đang tạo hình minh họa...".to_string());
            }
            StudioEvent::ImageReady { slide } => {
                self.image_notes
                    .insert(slide, "Đã có hình minh họa.".to_string());
            }
            StudioEvent::ImageQuotaWait { slide, attempt } => {
                self.image_notes.insert(
                    slide,
                    format!("Hết hạn ngạch (lần {}), đang chờ thử lại...", attempt),
                );
            }
            StudioEvent::CooldownTick {
                slide,
                remaining_secs,
            } => {
                self.status = format!(
                    "Chờ hạn ngạch: {}s (tiếp theo: slide {})",
                    remaining_secs,
                    slide + 1
                );
            }
            StudioEvent::ImageFailed {
                slide,
                message,
                retryable,
            } => {
                let note = if retryable {
                    format!("{} Nhấn 'r' để thử lại.", message)
                } else {
                    format!("{} Nhấn 'r' để thử lại thủ công.", message)
                };
                self.image_notes.insert(slide, note);
            }
            StudioEvent::ImageQueueIdle => {
                self.status = "Hình minh họa: xong.".to_string();
            }
            StudioEvent::ShutdownComplete => {}
        }
    }

    /// Re-segment on every snapshot; slides may appear and earlier
    /// slides may be amended until the stream finishes.
    fn set_content(&mut self, content: String) {
        self.content = content;
        if self.mode.is_presentation() {
            let deck = split_slides(&self.content);
            if self.current_slide >= deck.len() && !deck.is_empty() {
                self.current_slide = deck.len() - 1;
            }
            self.deck = Some(deck);
        }
    }

    async fn change_slide(&mut self, delta: i64) {
        let Some(deck) = &self.deck else { return };
        if deck.is_empty() {
            return;
        }
        let last = deck.len() as i64 - 1;
        let next = (self.current_slide as i64 + delta).clamp(0, last);
        self.current_slide = next as usize;
        self.queue
            .state()
            .lock()
            .await
            .set_viewed_slide(self.current_slide);
    }

    async fn retry_current_image(&mut self) {
        let Some(generator) = self.generator.clone() else {
            return;
        };
        if self.queue.retry(self.current_slide, generator).await {
            self.image_notes
                .insert(self.current_slide, "Đang thử lại...".to_string());
        }
    }

    fn draw(&self, f: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(3), Constraint::Length(3)])
            .split(f.area());

        if self.mode.is_presentation() {
            self.draw_slide(f, chunks[0]);
        } else {
            self.draw_document(f, chunks[0]);
        }
        self.draw_status(f, chunks[1]);
    }

    fn draw_document(&self, f: &mut Frame, area: Rect) {
        let title = format!("EduGen — {}", self.mode.label());
        let block = Block::default().title(title).borders(Borders::ALL);
        let paragraph = Paragraph::new(self.content.as_str())
            .block(block)
            .wrap(Wrap { trim: false });
        f.render_widget(paragraph, area);
    }

    fn draw_slide(&self, f: &mut Frame, area: Rect) {
        let Some(deck) = &self.deck else {
            let block = Block::default().title("EduGen").borders(Borders::ALL);
            let paragraph = Paragraph::new("Chưa có slide nào...").block(block);
            f.render_widget(paragraph, area);
            return;
        };
        let Some(slide) = deck.slides.get(self.current_slide) else {
            return;
        };
        let palette = deck.theme.palette();

        let mut border_title = format!(
            "Slide {}/{} — {}",
            self.current_slide + 1,
            deck.len(),
            deck.theme.name()
        );
        while border_title.width() > area.width.saturating_sub(4) as usize {
            border_title.pop();
        }

        let block = Block::default()
            .title(border_title)
            .borders(Borders::ALL)
            .style(Style::default().bg(hex_color(palette.slide_bg)));

        let mut lines = vec![title_line(&slide.title, &palette), Line::from("")];
        for body in &slide.body {
            lines.push(body_line(body, &palette));
        }
        if slide.image_prompt.is_some() {
            lines.push(Line::from(""));
            let note = self
                .image_notes
                .get(&self.current_slide)
                .map(String::as_str)
                .unwrap_or("[hình minh họa đang chờ]");
            lines.push(Line::from(note.to_string()).centered());
        }

        let paragraph = Paragraph::new(lines)
            .block(block)
            .wrap(Wrap { trim: true });
        f.render_widget(paragraph, area);
    }

    fn draw_status(&self, f: &mut Frame, area: Rect) {
        let clock = chrono::Local::now().format("%H:%M:%S");
        let line = match &self.error {
            Some(message) => Line::from(Span::styled(
                format!("Lỗi: {}", message),
                Style::default().fg(Color::Red),
            )),
            None => {
                let spinner = if self.generating { "… " } else { "" };
                Line::from(format!(
                    "{}{}  |  {}  |  ←/→ chuyển slide, r thử lại hình, q thoát  |  {}",
                    spinner, self.status, self.topic, clock
                ))
            }
        };
        let block = Block::default().borders(Borders::ALL);
        f.render_widget(Paragraph::new(line).block(block), area);
    }
}
