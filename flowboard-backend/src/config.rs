/// Configuration for the FlowBoard backend.
/// Reads server.json from ~/.config/flowboard/server.json (or platform equivalent).
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// JSON snapshot of all projects and tasks. In-memory only when absent.
    #[serde(default)]
    pub data_file: Option<String>,
    /// env_logger filter, e.g. "info" or "flowboard=debug".
    #[serde(default)]
    pub log_level: Option<String>,
    #[serde(default)]
    pub ai: AiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_requests_per_second")]
    pub max_requests_per_second: usize,
}

fn default_port() -> u16 {
    5000
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_endpoint() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_requests_per_second() -> usize {
    5
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind_address: default_bind_address(),
            data_file: None,
            log_level: None,
            ai: AiConfig::default(),
        }
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_model(),
            endpoint: default_endpoint(),
            timeout_secs: default_timeout_secs(),
            max_requests_per_second: default_max_requests_per_second(),
        }
    }
}

/// Config path: $FLOWBOARD_CONFIG, else ~/.config/flowboard/server.json
pub fn default_config_path() -> PathBuf {
    if let Ok(path) = std::env::var("FLOWBOARD_CONFIG") {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("flowboard")
        .join("server.json")
}

/// Load config from path. Returns defaults if the file is missing or invalid.
///
/// Called before the logger is up, so problems are returned as a notice for
/// the caller to log once logging is initialised.
pub fn load_config(path: &Path) -> (ServerConfig, String) {
    match fs::read_to_string(path) {
        Ok(content) => match serde_json::from_str(&content) {
            Ok(config) => (config, format!("Loaded config from {}", path.display())),
            Err(e) => (
                ServerConfig::default(),
                format!("Failed to parse config {}: {}, using defaults", path.display(), e),
            ),
        },
        Err(_) => (
            ServerConfig::default(),
            format!("No config at {}, using defaults", path.display()),
        ),
    }
}

impl ServerConfig {
    /// Apply PORT, FLOWBOARD_DATA_FILE and GEMINI_API_KEY on top of the file.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(port) = lookup("PORT").and_then(|p| p.trim().parse().ok()) {
            self.port = port;
        }
        if let Some(file) = lookup("FLOWBOARD_DATA_FILE").filter(|f| !f.trim().is_empty()) {
            self.data_file = Some(file);
        }
        if let Some(key) = lookup("GEMINI_API_KEY").filter(|k| !k.trim().is_empty()) {
            self.ai.api_key = Some(key);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: ServerConfig =
            serde_json::from_str(r#"{"port": 6000, "ai": {"model": "gemini-2.5-pro"}}"#).unwrap();
        assert_eq!(config.port, 6000);
        assert_eq!(config.bind_address, "127.0.0.1");
        assert_eq!(config.ai.model, "gemini-2.5-pro");
        assert_eq!(config.ai.timeout_secs, 30);
        assert!(config.data_file.is_none());
    }

    #[test]
    fn test_missing_and_broken_files_fall_back() {
        let dir = tempfile::tempdir().unwrap();
        let (config, notice) = load_config(&dir.path().join("absent.json"));
        assert_eq!(config.port, 5000);
        assert!(notice.starts_with("No config"));

        let broken = dir.path().join("broken.json");
        fs::write(&broken, "{ not json").unwrap();
        let (config, notice) = load_config(&broken);
        assert_eq!(config.port, 5000);
        assert!(notice.starts_with("Failed to parse"));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("PORT", "7001"),
            ("FLOWBOARD_DATA_FILE", "/tmp/board.json"),
            ("GEMINI_API_KEY", ""),
        ]
        .into_iter()
        .collect();
        let config = ServerConfig::default().with_overrides(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.port, 7001);
        assert_eq!(config.data_file.as_deref(), Some("/tmp/board.json"));
        assert!(config.ai.api_key.is_none());
    }
}
