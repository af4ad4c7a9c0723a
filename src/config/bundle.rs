//! `[[bundle]]` entry configuration.
//!
//! Each entry describes one servable artifact: where it is mounted, which
//! source file it compiles from, the bundler command that produces it, and
//! the caching policy that governs rebuilds.
//!
//! # Example
//!
//! ```toml
//! [[bundle]]
//! route = "/app.js"
//! entry = "src/app.js"
//! command = ["esbuild", "--bundle", "$PACKSERVE_ENTRY"]
//! cache = "dynamic"           # "none" | "dynamic" | verbatim cache-control
//! minify = true
//! gzip = true
//! watch = ["src"]             # extra watch roots (default: entry's directory)
//!
//! [bundle.postcompile]
//! command = ["node", "scripts/banner.js"]
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::utils::path::normalize_path;

// ============================================================================
// CacheMode
// ============================================================================

/// Caching policy for one bundle route.
///
/// Parsed from the `cache` config string:
/// - `"none"` (or empty): no caching, every request builds
/// - `"dynamic"`: persistent watch-and-rebuild worker
/// - anything else: build once, cache forever, and use the string verbatim
///   as the `cache-control` response header
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CacheMode {
    #[default]
    None,
    Dynamic,
    Static(String),
}

impl CacheMode {
    pub fn parse(value: &str) -> Self {
        match value {
            "" | "none" => Self::None,
            "dynamic" => Self::Dynamic,
            other => Self::Static(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::None => "none",
            Self::Dynamic => "dynamic",
            Self::Static(value) => value,
        }
    }

    /// Modes that run a background build worker.
    pub fn wants_worker(&self) -> bool {
        !matches!(self, Self::None)
    }

    /// Only the dynamic mode watches sources and rebuilds.
    pub fn watch_enabled(&self) -> bool {
        matches!(self, Self::Dynamic)
    }

    /// The `cache-control` header value, present only for static modes.
    pub fn cache_control(&self) -> Option<&str> {
        match self {
            Self::Static(value) => Some(value),
            _ => None,
        }
    }
}

impl<'de> Deserialize<'de> for CacheMode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Ok(Self::parse(&value))
    }
}

impl Serialize for CacheMode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

// ============================================================================
// HookConfig
// ============================================================================

/// A transform hook: an external command that receives the artifact on stdin
/// and emits the transformed artifact on stdout. An empty command disables
/// the hook.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HookConfig {
    /// Command and arguments; `$PACKSERVE_*` variables are resolved.
    pub command: Vec<String>,

    /// Suppress the per-run log line.
    pub quiet: bool,
}

impl HookConfig {
    pub fn is_configured(&self) -> bool {
        !self.command.is_empty()
    }
}

// ============================================================================
// BundleConfig
// ============================================================================

/// One servable bundle artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BundleConfig {
    /// Project root (internal use only, set during config finalization)
    #[serde(skip)]
    pub root: PathBuf,

    /// URL path the artifact is served at (e.g. `/app.js`).
    pub route: String,

    /// Source entry file handed to the bundler command.
    pub entry: PathBuf,

    /// Bundler invocation producing the artifact on stdout.
    pub command: Vec<String>,

    /// Caching policy.
    pub cache: CacheMode,

    /// Minify the artifact. Defaults from `[build] minify`.
    pub minify: Option<bool>,

    /// Pre-encode a gzip body for content negotiation.
    pub gzip: bool,

    /// Extra watch roots for dynamic mode. Defaults to the entry's directory.
    pub watch: Vec<PathBuf>,

    /// Transform applied to every successful bundle.
    pub postcompile: HookConfig,

    /// Transform applied before minification (minify-enabled bundles only).
    pub preminify: HookConfig,

    /// Transform applied after minification (minify-enabled bundles only).
    pub postminify: HookConfig,
}

impl Default for BundleConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::new(),
            route: String::new(),
            entry: PathBuf::new(),
            command: Vec::new(),
            cache: CacheMode::None,
            minify: None,
            gzip: false,
            watch: Vec::new(),
            postcompile: HookConfig::default(),
            preminify: HookConfig::default(),
            postminify: HookConfig::default(),
        }
    }
}

impl BundleConfig {
    /// Effective minification flag (resolved during config finalization).
    pub fn minify_enabled(&self) -> bool {
        self.minify.unwrap_or(false)
    }

    /// Directories the dynamic-mode watcher attaches to.
    ///
    /// Configured roots win; otherwise the entry file's directory.
    pub fn watch_roots(&self) -> Vec<PathBuf> {
        if !self.watch.is_empty() {
            return self.watch.clone();
        }
        self.entry
            .parent()
            .map(|dir| vec![dir.to_path_buf()])
            .unwrap_or_default()
    }

    /// Resolve paths relative to the project root.
    pub fn normalize(&mut self, root: &Path) {
        self.root = root.to_path_buf();
        self.entry = normalize_path(&root.join(&self.entry));
        self.watch = self
            .watch
            .iter()
            .map(|p| normalize_path(&root.join(p)))
            .collect();
    }
}
