// src/config.rs

//! Configuration context
//!
//! One explicitly constructed [`Config`] is passed by reference into the
//! resolver and the stores; there is no ambient global state. The
//! context can be assembled in code or loaded from a JSON file.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

fn default_basearch() -> String {
    match std::env::consts::ARCH {
        "x86" => "i686".to_string(),
        other => other.to_string(),
    }
}

fn default_pass_limit() -> u32 {
    100
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("/var/cache/sift")
}

fn default_metadata_expire() -> u64 {
    3600
}

fn default_http_timeout() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

/// Definition of one remote repository
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RepoConfig {
    /// Repository id, used as the origin label on its packages
    pub id: String,
    /// Base URL the metadata index and artifacts hang off
    pub base_url: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Lower value wins when several repositories provide a candidate
    #[serde(default)]
    pub priority: i32,
    /// Seconds before cached metadata is considered stale
    #[serde(default = "default_metadata_expire")]
    pub metadata_expire: u64,
}

fn default_enabled() -> bool {
    true
}

/// The explicit configuration context
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Base architecture candidates are filtered against
    pub basearch: String,
    /// Permit multiple architectures of the same package name in one
    /// transaction
    pub allow_multilib: bool,
    /// Iteration cap for the resolver's fixed-point loop
    pub resolver_pass_limit: u32,
    /// Where repository metadata and downloaded artifacts are cached
    pub cache_dir: PathBuf,
    /// Default metadata expiry in seconds
    pub metadata_expire: u64,
    /// HTTP timeout in seconds
    pub http_timeout: u64,
    /// Download retry attempts
    pub max_retries: u32,
    /// Remote repository definitions
    pub repos: Vec<RepoConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            basearch: default_basearch(),
            allow_multilib: false,
            resolver_pass_limit: default_pass_limit(),
            cache_dir: default_cache_dir(),
            metadata_expire: default_metadata_expire(),
            http_timeout: default_http_timeout(),
            max_retries: default_max_retries(),
            repos: Vec::new(),
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a config from a JSON file; unknown keys are rejected
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
        serde_json::from_str(&text)
            .map_err(|e| Error::Config(format!("cannot parse {}: {}", path.display(), e)))
    }

    /// Only the enabled repositories, sorted by ascending priority value
    pub fn enabled_repos(&self) -> Vec<&RepoConfig> {
        let mut repos: Vec<&RepoConfig> = self.repos.iter().filter(|r| r.enabled).collect();
        repos.sort_by_key(|r| r.priority);
        repos
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = Config::new();
        assert!(!config.allow_multilib);
        assert_eq!(config.resolver_pass_limit, 100);
        assert!(config.repos.is_empty());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "basearch": "i686",
                "repos": [
                    {{"id": "updates", "base_url": "https://example.com/updates", "priority": 1}},
                    {{"id": "fedora", "base_url": "https://example.com/fedora", "priority": 2}},
                    {{"id": "testing", "base_url": "https://example.com/testing", "enabled": false}}
                ]
            }}"#
        )
        .unwrap();
        file.flush().unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.basearch, "i686");
        assert_eq!(config.repos.len(), 3);

        let enabled = config.enabled_repos();
        assert_eq!(enabled.len(), 2);
        assert_eq!(enabled[0].id, "updates");
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"no_such_key": true}}"#).unwrap();
        file.flush().unwrap();
        assert!(matches!(Config::load(file.path()), Err(Error::Config(_))));
    }
}
