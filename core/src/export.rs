//! Builds the structured descriptors handed to the document/deck
//! writer collaborators. The core's responsibility ends at a complete,
//! correctly ordered descriptor; the in-repo writer serializes it to
//! JSON at a timestamped path.

use std::collections::HashMap;
use std::path::Path;

use chrono::Local;
use edugen_common::{Palette, Theme, WorkMode};
use edugen_gemini::ImagePayload;
use serde::Serialize;

use crate::error::Result;
use crate::markup::{bold_runs, styled_runs, StyledRun};
use crate::segment::SlideDeck;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Block {
    Heading { text: String, level: u8 },
    Paragraph { runs: Vec<StyledRun> },
    Table { rows: Vec<Vec<String>> },
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentDescriptor {
    pub title: String,
    pub blocks: Vec<Block>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SlideExport {
    pub index: usize,
    pub title_runs: Vec<StyledRun>,
    pub bullets: Vec<Vec<StyledRun>>,
    pub image: Option<ImagePayload>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeckDescriptor {
    pub theme: Theme,
    pub palette: Palette,
    pub slides: Vec<SlideExport>,
}

/// Flat document: heading per mode, pipe tables recognized while
/// consecutive lines start and end with `|`, everything else styled
/// paragraphs.
pub fn build_document(mode: WorkMode, content: &str) -> DocumentDescriptor {
    let title = match mode {
        WorkMode::LessonPlan => "GIÁO ÁN PHÁT TRIỂN NĂNG LỰC SỐ (NLS)",
        _ => "BÀI TẬP VÀ LỜI GIẢI CHI TIẾT",
    };

    let mut blocks = Vec::new();
    let mut table_rows: Vec<Vec<String>> = Vec::new();

    for line in content.lines() {
        let trimmed = line.trim();
        if is_table_row(trimmed) {
            let cells = table_cells(trimmed);
            if !is_separator_row(&cells) {
                table_rows.push(cells);
            }
            continue;
        }
        if !table_rows.is_empty() {
            blocks.push(Block::Table {
                rows: std::mem::take(&mut table_rows),
            });
        }
        if let Some(heading) = heading_block(trimmed) {
            blocks.push(heading);
        } else {
            blocks.push(Block::Paragraph {
                runs: styled_runs(trimmed),
            });
        }
    }
    if !table_rows.is_empty() {
        blocks.push(Block::Table { rows: table_rows });
    }

    DocumentDescriptor {
        title: title.to_string(),
        blocks,
    }
}

fn is_table_row(line: &str) -> bool {
    line.len() >= 2 && line.starts_with('|') && line.ends_with('|')
}

fn table_cells(line: &str) -> Vec<String> {
    let inner: Vec<&str> = line.split('|').collect();
    inner[1..inner.len() - 1]
        .iter()
        .map(|c| c.trim().to_string())
        .collect()
}

/// A delimiter row has cells of only dashes and colons (at least one
/// dash); it separates the header visually and is never data.
fn is_separator_row(cells: &[String]) -> bool {
    !cells.is_empty()
        && cells.iter().all(|cell| {
            let bare: String = cell.chars().filter(|&c| c != ':').collect();
            !bare.is_empty() && bare.chars().all(|c| c == '-')
        })
}

fn heading_block(line: &str) -> Option<Block> {
    for (marker, level) in [("### ", 3u8), ("## ", 2), ("# ", 1)] {
        if let Some(rest) = line.strip_prefix(marker) {
            return Some(Block::Heading {
                text: rest.trim().to_string(),
                level,
            });
        }
    }
    None
}

/// Deck descriptor: one slide entry per [`crate::segment::Slide`],
/// title and body as styled runs, cached image payloads attached by
/// slide index.
pub fn build_deck(deck: &SlideDeck, images: &HashMap<usize, ImagePayload>) -> DeckDescriptor {
    let slides = deck
        .slides
        .iter()
        .map(|slide| SlideExport {
            index: slide.index,
            title_runs: bold_runs(&slide.title),
            bullets: slide.body.iter().map(|line| bold_runs(line)).collect(),
            image: images.get(&slide.index).cloned(),
        })
        .collect();

    DeckDescriptor {
        theme: deck.theme,
        palette: deck.theme.palette(),
        slides,
    }
}

/// `EduGen_Slide_20240101_120000.json` style filenames.
pub fn export_filename(prefix: &str, ext: &str) -> String {
    format!(
        "{}_{}.{}",
        prefix,
        Local::now().format("%Y%m%d_%H%M%S"),
        ext
    )
}

/// Hand-off point to the file-writing collaborator.
pub async fn write_json(path: &Path, descriptor: &impl Serialize) -> Result<()> {
    let json = serde_json::to_string_pretty(descriptor)?;
    tokio::fs::write(path, json).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::split_slides;

    #[test]
    fn table_rows_are_grouped_and_separator_dropped() {
        let content = "Bảng điểm:\n| Tên | Điểm |\n| --- | :---: |\n| An | 9 |\nHết bảng.";
        let doc = build_document(WorkMode::Exercise, content);
        let table = doc
            .blocks
            .iter()
            .find_map(|b| match b {
                Block::Table { rows } => Some(rows),
                _ => None,
            })
            .expect("table block");
        assert_eq!(
            table,
            &vec![
                vec!["Tên".to_string(), "Điểm".to_string()],
                vec!["An".to_string(), "9".to_string()],
            ]
        );
        // The non-pipe line after the table closed it.
        assert!(matches!(doc.blocks.last(), Some(Block::Paragraph { .. })));
    }

    #[test]
    fn table_at_end_of_content_is_flushed() {
        let content = "| A | B |\n| 1 | 2 |";
        let doc = build_document(WorkMode::Exercise, content);
        assert!(matches!(doc.blocks.last(), Some(Block::Table { .. })));
    }

    #[test]
    fn lesson_plan_gets_its_own_title() {
        let doc = build_document(WorkMode::LessonPlan, "nội dung");
        assert_eq!(doc.title, "GIÁO ÁN PHÁT TRIỂN NĂNG LỰC SỐ (NLS)");
    }

    #[test]
    fn headings_and_math_runs_in_document() {
        let content = "### PHẦN 2: ĐÁP ÁN VÀ LỜI GIẢI\nĐáp án là $x = 2$.";
        let doc = build_document(WorkMode::Exercise, content);
        assert!(matches!(
            &doc.blocks[0],
            Block::Heading { text, level: 3 } if text == "PHẦN 2: ĐÁP ÁN VÀ LỜI GIẢI"
        ));
        let Block::Paragraph { runs } = &doc.blocks[1] else {
            panic!("expected paragraph");
        };
        assert!(runs.iter().any(|r| r.math && r.text == "x = 2"));
    }

    #[test]
    fn deck_export_attaches_images_by_index() {
        let deck = split_slides(
            "[THEME: Tím]\n### Slide 1: A\n**Khái niệm** chính\n---\n### Slide 2: B\nNội dung B",
        );
        let mut images = HashMap::new();
        images.insert(
            1usize,
            ImagePayload {
                mime_type: "image/png".to_string(),
                data_base64: "aGVsbG8=".to_string(),
            },
        );
        let exported = build_deck(&deck, &images);
        assert_eq!(exported.theme, Theme::Tim);
        assert_eq!(exported.palette, Theme::Tim.palette());
        assert!(exported.slides[0].image.is_none());
        assert!(exported.slides[1].image.is_some());
        // Bold markers became alternating runs.
        let first_bullet = &exported.slides[0].bullets[0];
        assert!(first_bullet[0].bold);
        assert!(!first_bullet[1].bold);
    }

    #[tokio::test]
    async fn write_json_produces_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(export_filename("EduGen_Slide", "json"));
        let deck = build_deck(&split_slides("### Slide 1: A\nNội dung dài"), &HashMap::new());
        write_json(&path, &deck).await.expect("write");
        let written = std::fs::read_to_string(&path).expect("read back");
        assert!(written.contains("\"slides\""));
    }
}
