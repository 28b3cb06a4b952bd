use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";
pub const DEFAULT_MODEL: &str = "llama3.1:8b";

/// Hard ceiling on a single chat completion; a call that outlives it
/// degrades to the fallback message, never blocks the session forever.
pub const COMPLETION_TIMEOUT: Duration = Duration::from_secs(120);

/// Connectivity probe budget. Reachability reporting only.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GatewayConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
}

impl GatewayConfig {
    pub fn from_env() -> Self {
        let base_url = std::env::var("ASSISTANT_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_BASE_URL.into());
        let model =
            std::env::var("ASSISTANT_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.into());
        let api_key = std::env::var("ASSISTANT_API_KEY").ok();
        Self { base_url, model, api_key }
    }

    pub fn with_overrides(mut self, model: Option<String>, base_url: Option<String>) -> Self {
        if let Some(m) = model {
            self.model = m;
        }
        if let Some(u) = base_url {
            self.base_url = u;
        }
        self
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArtifactConfig {
    pub conversations_dir: PathBuf,
    pub specifications_dir: PathBuf,
}

impl ArtifactConfig {
    pub fn under(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            conversations_dir: root.join("conversations"),
            specifications_dir: root.join("specifications"),
        }
    }

    pub fn resolve(cli_root: Option<String>) -> Self {
        let root = cli_root
            .or_else(|| std::env::var("ASSISTANT_ARTIFACTS_DIR").ok())
            .unwrap_or_else(|| "artifacts".into());
        Self::under(root)
    }
}
