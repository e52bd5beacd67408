//! Runtime configuration for a shim instance.
//!
//! Configuration is plain JSON so that FFI hosts can hand it over the same
//! way they hand over records:
//!
//! ```rust
//! use local_api_shim::shim_config::ShimConfig;
//!
//! let config = ShimConfig::from_json(r#"{"seed_on_init": false}"#)?;
//! assert_eq!(config.key_prefix, "alwasiloon_");
//! assert!(!config.seed_on_init);
//! # Ok::<(), local_api_shim::AppResponse>(())
//! ```

use serde::{Deserialize, Serialize};

use crate::app_response::Result;

pub const DEFAULT_KEY_PREFIX: &str = "alwasiloon_";

/// 10 MiB, the size LMDB environments are opened with unless overridden.
pub const DEFAULT_MAP_SIZE: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShimConfig {
    /// Prepended to every collection name to form its persistence key.
    pub key_prefix: String,
    /// Insert sample rows into empty `storage`, `sales` and `expenses` on open.
    pub seed_on_init: bool,
    /// LMDB map size in bytes. Writes beyond it fail with `MapFull`.
    pub map_size: usize,
}

impl Default for ShimConfig {
    fn default() -> Self {
        Self {
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            seed_on_init: true,
            map_size: DEFAULT_MAP_SIZE,
        }
    }
}

impl ShimConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
