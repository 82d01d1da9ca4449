//! API server configuration: bind address and upload constraints (§6).

use std::env;

pub const MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;
pub const ACCEPTED_EXTENSIONS: [&str; 6] = ["pdf", "png", "jpg", "jpeg", "tiff", "bmp"];
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    pub log_level: String,
}

impl ApiConfig {
    pub fn from_env() -> Self {
        Self {
            host: env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("API_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3000),
            log_level: env::var("API_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        }
    }

    pub fn local_dev() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "debug".to_string(),
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self::from_env()
    }
}
