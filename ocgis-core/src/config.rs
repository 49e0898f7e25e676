//! Run configuration
//!
//! Every field has a default, so a configuration file only needs to list the values it
//! changes.
//!
//! ```rust
//! use ocgis_core::config::{OcgConfig, Weighting};
//!
//! let config = OcgConfig::from_toml_str("ugid = 7\nweighting = \"uniform\"").unwrap();
//! assert_eq!(config.ugid, 7);
//! assert_eq!(config.weighting, Weighting::Uniform);
//! assert!(!config.skip_fill_value);
//! ```

use crate::errors::{OcgError, OcgResult};
use serde::{Deserialize, Serialize};

/// Fill value written into masked positions of numeric arrays
pub const DEFAULT_FILL_VALUE: f64 = 1e20;

/// How spatial cells are weighted when a variable is aggregated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Weighting {
    /// Cell area relative to the largest cell. Falls back to uniform weights when
    /// every geometry has zero area.
    #[default]
    Area,
    /// Every cell counts the same
    Uniform,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OcgConfig {
    /// Id of the selection geometry the collection was subset with.
    /// Default: 1
    pub ugid: i64,

    /// Drop melted records whose value equals the fill value.
    /// Default: false
    pub skip_fill_value: bool,

    /// Default: 1e20
    pub fill_value: f64,

    /// Default: area
    pub weighting: Weighting,
}

impl Default for OcgConfig {
    fn default() -> Self {
        Self {
            ugid: 1,
            skip_fill_value: false,
            fill_value: DEFAULT_FILL_VALUE,
            weighting: Weighting::Area,
        }
    }
}

impl OcgConfig {
    pub fn from_toml_str(text: &str) -> OcgResult<Self> {
        toml::from_str(text).map_err(|e| OcgError::Config(e.to_string()))
    }

    pub fn iter_options(&self) -> IterOptions {
        IterOptions {
            skip_fill_value: self.skip_fill_value,
            fill_value: self.fill_value,
        }
    }
}

/// Record filtering applied by the melting iterators
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IterOptions {
    pub skip_fill_value: bool,
    pub fill_value: f64,
}

impl Default for IterOptions {
    fn default() -> Self {
        OcgConfig::default().iter_options()
    }
}
