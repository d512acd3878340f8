use std::env;
use std::path::PathBuf;

use wind_core::{DEFAULT_CACHE_ROOT, DEFAULT_MAX_DEPTH, DEFAULT_SOURCE_ROOT, DispatchOptions};

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub cors_origins: Vec<String>,
    pub source_root: PathBuf,
    pub cache_root: PathBuf,
    pub max_depth: u32,
}

#[derive(Debug, Clone)]
pub enum LogFormat {
    Text,
    Json,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            log_level: "wind_web_api=debug,wind_core=info,tower_http=debug".to_string(),
            log_format: LogFormat::Json,
            cors_origins: vec!["*".to_string()],
            source_root: PathBuf::from(DEFAULT_SOURCE_ROOT),
            cache_root: PathBuf::from(DEFAULT_CACHE_ROOT),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(host) = env::var("WIND_HOST") {
            config.host = host;
        }

        if let Ok(port_str) = env::var("WIND_PORT") {
            if let Ok(port) = port_str.parse::<u16>() {
                config.port = port;
            } else {
                eprintln!(
                    "Warning: Invalid WIND_PORT value '{}', using default {}",
                    port_str, config.port
                );
            }
        }

        if let Ok(log_level) = env::var("RUST_LOG") {
            config.log_level = log_level;
        } else if let Ok(log_level) = env::var("WIND_LOG_LEVEL") {
            config.log_level = log_level;
        }

        if let Ok(log_format) = env::var("WIND_LOG_FORMAT") {
            config.log_format = match log_format.to_lowercase().as_str() {
                "text" | "plain" => LogFormat::Text,
                "json" => LogFormat::Json,
                _ => {
                    eprintln!(
                        "Warning: Invalid WIND_LOG_FORMAT value '{}', using default JSON",
                        log_format
                    );
                    LogFormat::Json
                }
            };
        }

        if let Ok(cors_origins) = env::var("WIND_CORS_ORIGINS") {
            config.cors_origins = cors_origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        if let Ok(source_root) = env::var("WIND_SOURCE_ROOT") {
            config.source_root = PathBuf::from(source_root);
        }

        if let Ok(cache_root) = env::var("WIND_CACHE_ROOT") {
            config.cache_root = PathBuf::from(cache_root);
        }

        if let Ok(depth_str) = env::var("WIND_MAX_DEPTH") {
            match depth_str.parse::<u32>() {
                Ok(depth) if depth > 0 => config.max_depth = depth,
                _ => eprintln!(
                    "Warning: Invalid WIND_MAX_DEPTH value '{}', using default {}",
                    depth_str, config.max_depth
                ),
            }
        }

        config
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn server_url(&self) -> String {
        if self.port == 80 {
            format!("http://{}", self.host)
        } else if self.port == 443 {
            format!("https://{}", self.host)
        } else {
            format!("http://{}:{}", self.host, self.port)
        }
    }

    pub fn dispatch_options(&self) -> DispatchOptions {
        DispatchOptions {
            max_depth: self.max_depth,
        }
    }
}
