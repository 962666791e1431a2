pub mod client;
pub mod error;
pub mod image;

pub use client::{GeminiClient, StreamEvent};
pub use error::GeminiError;
pub use image::{ImageClient, ImagePayload};
