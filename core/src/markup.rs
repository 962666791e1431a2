//! Inline markup scanning shared by the renderer and the exporters.
//!
//! Generated content uses a small markdown dialect: `**bold**` spans,
//! `$math$` spans, `### ` slide headings, and bracketed directives
//! (`[THEME: ...]`, `[IMAGE_PROMPT: ...]`). Everything that consumes
//! styled text goes through this module so the two sides never
//! disagree on how a line splits.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyledRun {
    pub text: String,
    pub bold: bool,
    pub math: bool,
}

impl StyledRun {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            bold: false,
            math: false,
        }
    }

    pub fn bold(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            bold: true,
            math: false,
        }
    }

    pub fn math(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            bold: false,
            math: true,
        }
    }
}

/// Split a line on `**` pairs. Parts alternate plain/bold by position;
/// empty parts are skipped without disturbing the alternation, so
/// `"A**B**C"` yields `[A plain, B bold, C plain]` and a line starting
/// with `**` begins with a bold run.
pub fn bold_runs(text: &str) -> Vec<StyledRun> {
    text.split("**")
        .enumerate()
        .filter(|(_, part)| !part.is_empty())
        .map(|(i, part)| StyledRun {
            text: part.to_string(),
            bold: i % 2 == 1,
            math: false,
        })
        .collect()
}

/// Full scan for flat-document export: `$...$` spans become math runs,
/// the text between them splits on `**`. An unpaired `$` is treated as
/// literal text.
pub fn styled_runs(line: &str) -> Vec<StyledRun> {
    let mut runs = Vec::new();
    let mut rest = line;
    loop {
        match rest.find('$') {
            Some(start) => {
                let after = &rest[start + 1..];
                match after.find('$') {
                    Some(end) => {
                        if start > 0 {
                            runs.extend(bold_runs(&rest[..start]));
                        }
                        if end > 0 {
                            runs.push(StyledRun::math(&after[..end]));
                        }
                        rest = &after[end + 1..];
                    }
                    None => {
                        // No closing delimiter; keep the rest verbatim.
                        runs.extend(bold_runs(rest));
                        break;
                    }
                }
            }
            None => {
                if !rest.is_empty() {
                    runs.extend(bold_runs(rest));
                }
                break;
            }
        }
    }
    runs
}

/// Remove math delimiters from slide-facing text.
pub fn strip_math(text: &str) -> String {
    text.chars().filter(|&c| c != '$').collect()
}

/// Extract a `[THEME: name]` directive. Returns the directive name and
/// the text with the directive (plus trailing whitespace) removed.
pub fn theme_directive(text: &str) -> Option<(String, String)> {
    extract_directive(text, "[THEME:")
}

/// Extract an `[IMAGE_PROMPT: description]` directive from a body
/// line. Returns the prompt and whatever display text remains.
pub fn image_directive(line: &str) -> Option<(String, String)> {
    extract_directive(line, "[IMAGE_PROMPT:").map(|(prompt, rest)| (prompt, rest.trim().to_string()))
}

fn extract_directive(text: &str, opener: &str) -> Option<(String, String)> {
    let start = text.find(opener)?;
    let after = &text[start + opener.len()..];
    let end = after.find(']')?;
    let value = after[..end].trim().to_string();
    let mut remainder = String::with_capacity(text.len());
    remainder.push_str(&text[..start]);
    remainder.push_str(after[end + 1..].trim_start());
    Some((value, remainder))
}

/// A `### ` heading line supplies the slide title; an optional
/// `Slide N:` prefix inside it is dropped.
pub fn slide_title(line: &str) -> Option<String> {
    let rest = line.trim().strip_prefix("### ")?;
    Some(strip_math(strip_slide_prefix(rest)).trim().to_string())
}

fn strip_slide_prefix(text: &str) -> &str {
    let t = text.trim_start();
    if let Some(after) = t.strip_prefix("Slide") {
        let after_num = after.trim_start();
        let digits_end = after_num
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(after_num.len());
        if digits_end > 0 {
            if let Some(tail) = after_num[digits_end..].strip_prefix(':') {
                return tail;
            }
        }
    }
    text
}
