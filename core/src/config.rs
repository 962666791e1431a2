use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub api_key: Option<String>,
    pub model: String,
    pub image_model: String,
    pub temperature: f32,
    pub log_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gemini-3-flash-preview".to_string(),
            image_model: "imagen-3.0-generate-002".to_string(),
            temperature: 0.1,
            log_path: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(key) = std::env::var("GEMINI_API_KEY") {
            config.api_key = Some(key);
        }

        if let Ok(model) = std::env::var("EDUGEN_MODEL") {
            config.model = model;
        }

        if let Ok(model) = std::env::var("EDUGEN_IMAGE_MODEL") {
            config.image_model = model;
        }

        if let Ok(path) = std::env::var("EDUGEN_LOG_PATH") {
            config.log_path = Some(PathBuf::from(path));
        }

        config
    }
}
