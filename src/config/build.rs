//! `[build]` section configuration.
//!
//! # Example
//!
//! ```toml
//! [build]
//! output = "dist"             # Artifact directory for `packserve build`
//! minify = true               # Default minification for all bundles
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Build output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Output directory for one-shot builds (relative to project root).
    pub output: PathBuf,

    /// Default minification, applied to bundles without an explicit `minify`.
    pub minify: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            output: PathBuf::from("dist"),
            minify: false,
        }
    }
}
