use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::catalog::LITERATURE_SUBJECT;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkMode {
    Exercise,
    LessonPlan,
    Presentation,
}

impl WorkMode {
    pub fn label(&self) -> &'static str {
        match self {
            WorkMode::Exercise => "Tạo bài tập",
            WorkMode::LessonPlan => "Soạn Giáo Án NLS",
            WorkMode::Presentation => "Tạo Slide Bài Giảng",
        }
    }

    pub fn is_presentation(&self) -> bool {
        matches!(self, WorkMode::Presentation)
    }
}

impl FromStr for WorkMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "exercise" => Ok(WorkMode::Exercise),
            "lesson-plan" | "lesson_plan" => Ok(WorkMode::LessonPlan),
            "presentation" => Ok(WorkMode::Presentation),
            other => Err(anyhow::anyhow!(
                "unknown mode '{}', expected exercise | lesson-plan | presentation",
                other
            )),
        }
    }
}

/// School grade, 1 through 12.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grade(u8);

impl Grade {
    pub fn new(n: u8) -> Option<Self> {
        if (1..=12).contains(&n) {
            Some(Self(n))
        } else {
            None
        }
    }

    pub fn number(&self) -> u8 {
        self.0
    }

    pub fn label(&self) -> String {
        format!("Lớp {}", self.0)
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Grade {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let n: u8 = s.trim().parse()?;
        Grade::new(n).ok_or_else(|| anyhow::anyhow!("grade must be between 1 and 12, got {}", n))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuestionType {
    MultipleChoice,
    TrueFalse,
    ShortAnswer,
    Essay,
    Mixed,
}

impl QuestionType {
    pub fn label(&self) -> &'static str {
        match self {
            QuestionType::MultipleChoice => "Trắc nghiệm (4 lựa chọn)",
            QuestionType::TrueFalse => "Trắc nghiệm Đúng - Sai",
            QuestionType::ShortAnswer => "Điền đáp án / Trả lời ngắn",
            QuestionType::Essay => "Bài tự luận",
            QuestionType::Mixed => "Kết hợp (Khuyên dùng)",
        }
    }
}

impl FromStr for QuestionType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "multiple-choice" | "multiple_choice" => Ok(QuestionType::MultipleChoice),
            "true-false" | "true_false" => Ok(QuestionType::TrueFalse),
            "short-answer" | "short_answer" => Ok(QuestionType::ShortAnswer),
            "essay" => Ok(QuestionType::Essay),
            "mixed" => Ok(QuestionType::Mixed),
            other => Err(anyhow::anyhow!("unknown question type '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Difficulty {
    Recall,
    Understanding,
    Application,
    AdvancedApplication,
    Mixed,
}

impl Difficulty {
    pub fn label(&self) -> &'static str {
        match self {
            Difficulty::Recall => "Nhận biết",
            Difficulty::Understanding => "Thông hiểu",
            Difficulty::Application => "Vận dụng",
            Difficulty::AdvancedApplication => "Vận dụng cao",
            Difficulty::Mixed => "Kết hợp",
        }
    }
}

impl FromStr for Difficulty {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "recall" => Ok(Difficulty::Recall),
            "understanding" => Ok(Difficulty::Understanding),
            "application" => Ok(Difficulty::Application),
            "advanced" | "advanced-application" => Ok(Difficulty::AdvancedApplication),
            "mixed" => Ok(Difficulty::Mixed),
            other => Err(anyhow::anyhow!("unknown difficulty '{}'", other)),
        }
    }
}

/// Everything the user configured for one generation call. Immutable
/// once submitted; a new request means a new session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub mode: WorkMode,
    pub subject: String,
    pub grade: Grade,
    pub topic: String,
    pub requirements: String,
    pub instructions: String,
    pub question_type: QuestionType,
    pub difficulty: Difficulty,
    pub question_count: u32,
}

impl GenerationRequest {
    pub fn is_literature(&self) -> bool {
        self.subject == LITERATURE_SUBJECT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grade_bounds() {
        assert!(Grade::new(0).is_none());
        assert!(Grade::new(13).is_none());
        assert_eq!(Grade::new(12).map(|g| g.number()), Some(12));
    }

    #[test]
    fn mode_parses_both_spellings() {
        assert_eq!(
            "lesson_plan".parse::<WorkMode>().ok(),
            Some(WorkMode::LessonPlan)
        );
        assert_eq!(
            "lesson-plan".parse::<WorkMode>().ok(),
            Some(WorkMode::LessonPlan)
        );
        assert!("slides".parse::<WorkMode>().is_err());
    }
}
