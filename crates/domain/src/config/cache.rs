use serde::{Deserialize, Serialize};

/// Response cache bounds. All TTLs are in seconds.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    #[serde(default = "default_size")]
    pub size: usize,

    #[serde(default = "default_min_ttl")]
    pub min_ttl: u32,

    #[serde(default = "default_max_ttl")]
    pub max_ttl: u32,

    /// Lifetime of the entry recorded when every upstream of a group failed.
    #[serde(default = "default_negative_ttl")]
    pub negative_ttl: u32,
}

impl CacheConfig {
    /// Raises `max_ttl` to `min_ttl` when configured below it.
    pub fn normalize(&mut self) {
        if self.max_ttl < self.min_ttl {
            self.max_ttl = self.min_ttl;
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            size: default_size(),
            min_ttl: default_min_ttl(),
            max_ttl: default_max_ttl(),
            negative_ttl: default_negative_ttl(),
        }
    }
}

fn default_size() -> usize {
    4096
}

fn default_min_ttl() -> u32 {
    60
}

fn default_max_ttl() -> u32 {
    86_400
}

fn default_negative_ttl() -> u32 {
    10
}
