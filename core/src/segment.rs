//! Turns the accumulated buffer into either a two-part flat document
//! or an ordered slide deck. Pure functions of (content, mode):
//! re-segmenting an unchanged buffer yields an identical result, so
//! callers may re-run this on every buffer publish while streaming.

use edugen_common::Theme;
use serde::{Deserialize, Serialize};

use crate::markup::{image_directive, slide_title, strip_math, theme_directive};

/// Verbatim marker splitting exercises into questions and answers.
pub const ANSWER_MARKER: &str = "### PHẦN 2: ĐÁP ÁN VÀ LỜI GIẢI";

/// Segments at or below this trimmed length are delimiter noise
/// (e.g. a trailing `---`), not slides.
pub const MIN_SEGMENT_CHARS: usize = 5;

const DEFAULT_SLIDE_TITLE: &str = "BÀI GIẢNG";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlatParts {
    pub questions: String,
    pub answers: Option<String>,
}

/// Split flat content at [`ANSWER_MARKER`]. The marker line belongs to
/// the answers part; both parts are trimmed. Without the marker all
/// content is part 1.
pub fn split_flat(content: &str) -> FlatParts {
    match content.find(ANSWER_MARKER) {
        Some(pos) => FlatParts {
            questions: content[..pos].trim().to_string(),
            answers: Some(content[pos..].trim().to_string()),
        },
        None => FlatParts {
            questions: content.trim().to_string(),
            answers: None,
        },
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slide {
    pub index: usize,
    pub title: String,
    pub body: Vec<String>,
    pub image_prompt: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlideDeck {
    pub theme: Theme,
    pub slides: Vec<Slide>,
}

impl SlideDeck {
    pub fn is_empty(&self) -> bool {
        self.slides.is_empty()
    }

    pub fn len(&self) -> usize {
        self.slides.len()
    }
}

/// Split presentation content on `---` into slides. The deck theme
/// comes from a `[THEME: ...]` directive in the first segment only;
/// body lines keep their `**` markers but lose math delimiters, and
/// image directives are lifted out of the display text.
pub fn split_slides(content: &str) -> SlideDeck {
    let mut segments: Vec<String> = content.split("---").map(str::to_string).collect();

    let mut theme = Theme::Default;
    if let Some(first) = segments.first_mut() {
        if let Some((name, rest)) = theme_directive(first) {
            theme = Theme::parse(&name);
            *first = rest;
        }
    }

    let slides = segments
        .iter()
        .filter(|s| s.trim().chars().count() > MIN_SEGMENT_CHARS)
        .enumerate()
        .map(|(index, raw)| parse_slide(index, raw))
        .collect();

    SlideDeck { theme, slides }
}

fn parse_slide(index: usize, raw: &str) -> Slide {
    let mut title = DEFAULT_SLIDE_TITLE.to_string();
    let mut body = Vec::new();
    let mut image_prompt = None;

    for line in raw.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(heading) = slide_title(line) {
            title = heading;
            continue;
        }
        if image_prompt.is_none() {
            if let Some((prompt, rest)) = image_directive(line) {
                image_prompt = Some(prompt);
                if !rest.is_empty() {
                    body.push(strip_math(&rest).trim().to_string());
                }
                continue;
            }
        }
        body.push(strip_math(line).trim().to_string());
    }

    Slide {
        index,
        title,
        body,
        image_prompt,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_split_at_marker() {
        let content = "Câu 1: 2 + 2 = ?\n\n### PHẦN 2: ĐÁP ÁN VÀ LỜI GIẢI\nCâu 1: 4\n";
        let parts = split_flat(content);
        assert_eq!(parts.questions, "Câu 1: 2 + 2 = ?");
        assert_eq!(
            parts.answers.as_deref(),
            Some("### PHẦN 2: ĐÁP ÁN VÀ LỜI GIẢI\nCâu 1: 4")
        );
    }

    #[test]
    fn flat_without_marker_is_single_part() {
        let parts = split_flat("  chỉ có đề bài  ");
        assert_eq!(parts.questions, "chỉ có đề bài");
        assert!(parts.answers.is_none());
    }

    #[test]
    fn counts_qualifying_segments_in_order() {
        let content = "Slide thứ nhất dài\n---\nab\n---\nSlide thứ hai dài\n---\n";
        let deck = split_slides(content);
        // "ab" and the trailing empty segment are noise.
        assert_eq!(deck.len(), 2);
        assert_eq!(deck.slides[0].index, 0);
        assert_eq!(deck.slides[1].index, 1);
        assert_eq!(deck.slides[0].body, vec!["Slide thứ nhất dài"]);
    }

    #[test]
    fn no_delimiter_yields_single_slide() {
        let deck = split_slides("### Chủ đề\nNội dung bài học");
        assert_eq!(deck.len(), 1);
        assert_eq!(deck.slides[0].title, "Chủ đề");
    }

    #[test]
    fn theme_applies_deck_wide_from_first_segment() {
        let content = "[THEME: Cam]\n### Slide 1: Mở đầu\nNội dung A\n---\n### Slide 2: Kết\n[IMAGE_PROMPT: a sunset]\nNội dung B";
        let deck = split_slides(content);
        assert_eq!(deck.theme, Theme::Cam);
        assert_eq!(deck.len(), 2);

        let first = &deck.slides[0];
        assert_eq!(first.title, "Mở đầu");
        assert_eq!(first.body, vec!["Nội dung A"]);
        assert!(first.image_prompt.is_none());

        let second = &deck.slides[1];
        assert_eq!(second.title, "Kết");
        assert_eq!(second.body, vec!["Nội dung B"]);
        assert_eq!(second.image_prompt.as_deref(), Some("a sunset"));
    }

    #[test]
    fn theme_in_later_segment_is_ignored() {
        let content = "### Slide 1: Đầu tiên\nNội dung\n---\n[THEME: Tím]\n### Slide 2: Sau\nNội dung nữa";
        let deck = split_slides(content);
        assert_eq!(deck.theme, Theme::Default);
    }

    #[test]
    fn unknown_theme_falls_back_to_default() {
        let deck = split_slides("[THEME: Hồng Phấn]\n### Slide 1: A\nNội dung dài hơn năm ký tự");
        assert_eq!(deck.theme, Theme::Default);
    }

    #[test]
    fn math_delimiters_are_stripped_from_slides() {
        let deck = split_slides("### Slide 1: Toán\nCông thức $E = mc^2$ nổi tiếng");
        assert_eq!(deck.slides[0].body, vec!["Công thức E = mc^2 nổi tiếng"]);
    }

    #[test]
    fn resegmenting_is_idempotent() {
        let content = "[THEME: Xanh Lá]\n### Slide 1: A\nNội dung A\n---\n### Slide 2: B\nNội dung B";
        let first = split_slides(content);
        let second = split_slides(content);
        assert_eq!(first, second);
    }
}
