pub mod catalog;
pub mod theme;
pub mod types;

pub use theme::{Palette, Theme};
pub use types::{Difficulty, GenerationRequest, Grade, QuestionType, WorkMode};
