use config::{Config, ConfigError, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ApiConfig {
    pub server: Option<ServerConfig>,
    pub cors: Option<CorsConfig>,
    pub inference: Option<InferenceConfig>,
    pub pipeline: Option<PipelineConfig>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            server: Some(ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
            }),
            cors: Some(CorsConfig {
                allowed_origins: vec!["http://localhost:3000".to_string()],
            }),
            inference: Some(InferenceConfig::default()),
            pipeline: Some(PipelineConfig::default()),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct InferenceConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub max_tokens: u32,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.anthropic.com".to_string(),
            api_key: None,
            model: "claude-sonnet-4-5-20250929".to_string(),
            max_tokens: 4096,
        }
    }
}

/// Timing knobs for the extraction pipeline. Pacing and backoff are
/// zeroed in tests; the defaults match what clients expect to observe.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PipelineConfig {
    /// Cosmetic delay between progress steps
    pub pacing_ms: u64,
    pub poll_interval_ms: u64,
    pub max_poll_attempts: u32,
    /// Hard fallback when nothing has appeared yet
    pub stall_timeout_ms: u64,
    /// Linear backoff base for transient inference failures
    pub retry_backoff_base_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            pacing_ms: 300,
            poll_interval_ms: 1000,
            max_poll_attempts: 12,
            stall_timeout_ms: 10_000,
            retry_backoff_base_secs: 2,
        }
    }
}

impl ApiConfig {
    pub fn load() -> Result<(Self, PathBuf), ConfigError> {
        let config_path = get_config_path();

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ConfigError::Message(format!("Failed to create config directory: {e}"))
            })?;
        }

        if !config_path.exists() {
            let default_config = r#"
[server]
host = "127.0.0.1"
port = 8080

[cors]
allowed_origins = ["http://localhost:3000"]

[inference]
base_url = "https://api.anthropic.com"
# api_key = "your-api-key"
model = "claude-sonnet-4-5-20250929"
max_tokens = 4096

[pipeline]
pacing_ms = 300
poll_interval_ms = 1000
max_poll_attempts = 12
stall_timeout_ms = 10000
retry_backoff_base_secs = 2
"#;
            std::fs::write(&config_path, default_config).map_err(|e| {
                ConfigError::Message(format!("Failed to write default config: {e}"))
            })?;
        }

        let builder = Config::builder()
            .add_source(File::from(config_path.clone()))
            .build()?;

        let config: ApiConfig = builder.try_deserialize()?;

        Ok((config, config_path))
    }
}

pub fn get_config_path() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        config_dir.join("voxquote").join("api.toml")
    } else {
        PathBuf::from("api.toml")
    }
}
