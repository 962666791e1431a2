//! Core library: streaming accumulation, content segmentation, image
//! enrichment and export descriptors for the studio.

pub mod accumulator;
pub mod client;
pub mod config;
pub mod error;
pub mod export;
pub mod extract;
pub mod image_queue;
pub mod markup;
pub mod prompt;
pub mod segment;
pub mod session;

pub use config::Config;
pub use error::{Result, StudioError};
pub use session::GenerationSession;
