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
use std::io;
use std::path::Path;
use unicode_width::UnicodeWidthStr;

use edugen_core::segment::{split_slides, SlideDeck};

use crate::style::{body_line, hex_color, title_line};

/// Open a saved markdown deck in the slide viewer.
pub async fn run_preview(path: &Path) -> Result<()> {
    let content = tokio::fs::read_to_string(path).await?;
    let deck = split_slides(&content);
    if deck.is_empty() {
        anyhow::bail!("Tệp không chứa slide nào: {}", path.display());
    }
    SlidePreview::new(deck).run().await
}

pub struct SlidePreview {
    deck: SlideDeck,
    current_slide: usize,
    running: bool,
}

impl SlidePreview {
    pub fn new(deck: SlideDeck) -> Self {
        Self {
            deck,
            current_slide: 0,
            running: true,
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

            if let Event::Key(key) = event::read()? {
                match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => {
                        self.running = false;
                    }
                    KeyCode::Left | KeyCode::Char('h') => {
                        self.previous_slide();
                    }
                    KeyCode::Right | KeyCode::Char('l') => {
                        self.next_slide();
                    }
                    _ => {}
                }
            }
        }

        disable_raw_mode()?;
        execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
        terminal.show_cursor()?;

        Ok(())
    }

    fn draw(&self, f: &mut Frame) {
        let size = f.area();
        let palette = self.deck.theme.palette();

        let Some(slide) = self.deck.slides.get(self.current_slide) else {
            return;
        };

        let mut border_title = format!(
            "Slide {}/{} — {}",
            self.current_slide + 1,
            self.deck.len(),
            self.deck.theme.name()
        );
        // Keep the border title inside the frame on narrow terminals.
        while border_title.width() > size.width.saturating_sub(4) as usize {
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
            lines.push(Line::from("[hình minh họa]").centered());
        }

        let paragraph = Paragraph::new(lines)
            .block(block)
            .wrap(Wrap { trim: true });

        f.render_widget(paragraph, size);
    }

    fn next_slide(&mut self) {
        if self.current_slide < self.deck.len().saturating_sub(1) {
            self.current_slide += 1;
        }
    }

    fn previous_slide(&mut self) {
        if self.current_slide > 0 {
            self.current_slide -= 1;
        }
    }
}
