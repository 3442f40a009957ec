//! Configuration and data directory management.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_SCORER_URL: &str = "http://127.0.0.1:5000";
pub const DEFAULT_POSTAL_URL: &str = "https://api.postalpincode.in";

/// Paths to all Niti data files and directories.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataPaths {
    /// Root data directory (e.g., `data/`).
    pub root: PathBuf,
    /// SQLite database file (`data/niti.db`).
    pub database: PathBuf,
    /// Profile photo bucket (`data/profile-photos/`).
    pub profile_photos: PathBuf,
    /// LLM configuration (`data/llm-config.json`).
    pub llm_config_file: PathBuf,
}

impl DataPaths {
    /// Create data paths from a root directory. Creates directories if needed.
    pub fn new(root: impl AsRef<Path>) -> std::io::Result<Self> {
        let root = root.as_ref().to_path_buf();
        let paths = Self {
            database: root.join("niti.db"),
            profile_photos: root.join("profile-photos"),
            llm_config_file: root.join("llm-config.json"),
            root,
        };
        std::fs::create_dir_all(&paths.root)?;
        std::fs::create_dir_all(&paths.profile_photos)?;
        Ok(paths)
    }
}

/// Which scorer backs the eligibility matcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScorerMode {
    /// External recommendation process over HTTP.
    Http,
    /// Built-in rule evaluation against the local catalog.
    Rules,
}

impl std::str::FromStr for ScorerMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "http" => Ok(ScorerMode::Http),
            "rules" => Ok(ScorerMode::Rules),
            other => Err(Error::Config(format!("unknown scorer mode: {}", other))),
        }
    }
}

/// Top-level Niti configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NitiConfig {
    /// HTTP server port.
    pub port: u16,
    /// Data directory paths.
    pub data_paths: DataPaths,
    /// Base URL of the recommendation process.
    pub scorer_url: String,
    /// Base URL of the document verifier.
    pub verifier_url: String,
    /// Base URL of the postal-code lookup.
    pub postal_url: String,
    pub scorer_mode: ScorerMode,
    /// How long a login session stays valid.
    pub session_ttl_hours: i64,
    /// Timeout applied to every outbound call.
    pub http_timeout_secs: u64,
    /// Assistant instructions appended after the catalog context.
    pub system_prompt: Option<String>,
    /// Shared secret for the operator routes. Unset disables them.
    #[serde(default, skip_serializing)]
    pub admin_token: Option<String>,
}

impl NitiConfig {
    /// Create configuration from environment and defaults.
    pub fn from_env(data_dir: impl AsRef<Path>) -> Result<Self> {
        let port = env_parse("PORT").unwrap_or(DEFAULT_PORT);

        let scorer_url =
            std::env::var("NITI_SCORER_URL").unwrap_or_else(|_| DEFAULT_SCORER_URL.to_string());
        // The verifier ships in the same process as the scorer by default.
        let verifier_url =
            std::env::var("NITI_VERIFIER_URL").unwrap_or_else(|_| scorer_url.clone());
        let postal_url =
            std::env::var("NITI_POSTAL_URL").unwrap_or_else(|_| DEFAULT_POSTAL_URL.to_string());

        let scorer_mode = match std::env::var("NITI_SCORER") {
            Ok(v) => v.parse()?,
            Err(_) => ScorerMode::Http,
        };

        let data_paths = DataPaths::new(data_dir)?;

        Ok(Self {
            port,
            data_paths,
            scorer_url,
            verifier_url,
            postal_url,
            scorer_mode,
            session_ttl_hours: env_parse("NITI_SESSION_TTL_HOURS").unwrap_or(168),
            http_timeout_secs: env_parse("NITI_HTTP_TIMEOUT_SECS").unwrap_or(30),
            system_prompt: std::env::var("NITI_SYSTEM_PROMPT").ok(),
            admin_token: std::env::var("NITI_ADMIN_TOKEN")
                .ok()
                .filter(|t| !t.trim().is_empty()),
        })
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Session lifetime as a std duration, for idle limits.
    pub fn session_idle_limit(&self) -> Duration {
        Duration::from_secs(self.session_ttl_hours.max(0) as u64 * 3600)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}
