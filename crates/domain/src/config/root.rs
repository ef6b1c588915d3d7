use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::Path;

use super::cache::CacheConfig;
use super::errors::ConfigError;
use super::group::GroupConfig;
use super::logging::LoggingConfig;
use crate::routing::{SuffixRule, CLEAN_GROUP, DIRTY_GROUP};

const LOCAL_CONFIG_PATH: &str = "sieve-dns.toml";
const SYSTEM_CONFIG_PATH: &str = "/etc/sieve-dns/config.toml";

/// Main configuration structure for Sieve DNS
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// UDP address the proxy listens on
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Per-upstream exchange timeout in milliseconds
    #[serde(default = "default_query_timeout")]
    pub query_timeout: u64,

    /// Rule list backing the global classifier
    #[serde(default)]
    pub gfwlist: Option<String>,

    /// Whether the rule list file is base64 encoded
    #[serde(default = "default_true")]
    pub gfwlist_b64: bool,

    #[serde(default)]
    pub hosts_files: Vec<String>,

    /// Inline hosts entries, hostname -> IP
    #[serde(default)]
    pub hosts: BTreeMap<String, String>,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Static suffix table, consulted in order
    #[serde(default, rename = "suffix")]
    pub suffixes: Vec<SuffixRule>,

    #[serde(default)]
    pub groups: BTreeMap<String, GroupConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            query_timeout: default_query_timeout(),
            gfwlist: None,
            gfwlist_b64: true,
            hosts_files: vec![],
            hosts: BTreeMap::new(),
            cache: CacheConfig::default(),
            logging: LoggingConfig::default(),
            suffixes: vec![],
            groups: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Load configuration from file or use defaults
    ///
    /// Priority order:
    /// 1. Explicitly provided path
    /// 2. sieve-dns.toml in current directory
    /// 3. /etc/sieve-dns/config.toml
    /// 4. Default configuration
    pub fn load(path: Option<&str>, cli_overrides: CliOverrides) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = path {
            Self::from_file(path)?
        } else if Path::new(LOCAL_CONFIG_PATH).exists() {
            Self::from_file(LOCAL_CONFIG_PATH)?
        } else if Path::new(SYSTEM_CONFIG_PATH).exists() {
            Self::from_file(SYSTEM_CONFIG_PATH)?
        } else {
            Self::default()
        };

        config.apply_cli_overrides(cli_overrides);
        config.normalize();
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::FileRead(path.to_string(), e.to_string()))?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let mut config: Self =
            toml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.normalize();
        Ok(config)
    }

    fn apply_cli_overrides(&mut self, overrides: CliOverrides) {
        if let Some(listen) = overrides.listen {
            self.listen = listen;
        }
        if let Some(level) = overrides.log_level {
            self.logging.level = level;
        }
    }

    fn normalize(&mut self) {
        if self.listen.starts_with(':') {
            self.listen = format!("0.0.0.0{}", self.listen);
        }
        self.cache.normalize();
    }

    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.listen.parse().map_err(|e| {
            ConfigError::Validation(format!("Invalid listen address '{}': {}", self.listen, e))
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.listen_addr()?;

        if self.query_timeout == 0 {
            return Err(ConfigError::Validation(
                "query_timeout cannot be 0".to_string(),
            ));
        }

        if self.cache.size == 0 {
            return Err(ConfigError::Validation(
                "cache size cannot be 0".to_string(),
            ));
        }

        for name in [CLEAN_GROUP, DIRTY_GROUP] {
            let has_upstream = self
                .groups
                .get(name)
                .is_some_and(|group| !group.valid_endpoints().is_empty());
            if !has_upstream {
                return Err(ConfigError::Validation(format!(
                    "Group '{}' needs at least one valid upstream server",
                    name
                )));
            }
        }

        for rule in &self.suffixes {
            if rule.normalized_suffix().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "Empty suffix routed to group '{}'",
                    rule.group
                )));
            }
            if !self.groups.contains_key(&rule.group) {
                return Err(ConfigError::Validation(format!(
                    "Suffix '{}' routes to unknown group '{}'",
                    rule.suffix, rule.group
                )));
            }
        }

        Ok(())
    }
}

/// Command-line overrides for configuration
#[derive(Debug, Default)]
pub struct CliOverrides {
    pub listen: Option<String>,
    pub log_level: Option<String>,
}

fn default_listen() -> String {
    "0.0.0.0:53".to_string()
}

fn default_query_timeout() -> u64 {
    2000
}

fn default_true() -> bool {
    true
}
