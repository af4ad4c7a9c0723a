//! Configuration management for `packserve.toml`.
//!
//! # Sections
//!
//! | Section      | Purpose                                              |
//! |--------------|------------------------------------------------------|
//! | `[serve]`    | Development server (interface, port)                 |
//! | `[build]`    | One-shot build output dir, minify default            |
//! | `[[bundle]]` | Servable artifacts (route, entry, command, caching)  |

mod build;
mod bundle;
mod error;
mod handle;
mod serve;

pub use build::BuildConfig;
pub use bundle::{BundleConfig, CacheMode, HookConfig};
pub use error::{ConfigDiagnostics, ConfigError};
pub use handle::{cfg, init_config};
pub use serve::ServeConfig;

use crate::{
    cli::{BuildArgs, Cli, Commands},
    log,
};
use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

// ============================================================================
// root configuration
// ============================================================================

/// Root configuration structure representing packserve.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// CLI arguments reference (internal use only)
    #[serde(skip)]
    pub cli: Option<&'static Cli>,

    /// Absolute path to the config file (internal use only)
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Project root directory - parent of config file (internal use only)
    #[serde(skip)]
    pub root: PathBuf,

    /// Development server settings
    #[serde(default)]
    pub serve: ServeConfig,

    /// Build output settings
    #[serde(default)]
    pub build: BuildConfig,

    /// Servable bundles
    #[serde(default, rename = "bundle")]
    pub bundles: Vec<BundleConfig>,
}

impl Config {
    /// Load configuration from CLI arguments.
    ///
    /// Searches upward from cwd to find the config file. The project root is
    /// the config file's parent directory.
    pub fn load(cli: &'static Cli) -> Result<Self> {
        let Some(config_path) = find_config_file(&cli.config) else {
            log!(
                "error";
                "Config file '{}' not found in this directory or any parent.",
                cli.config.display()
            );
            std::process::exit(1);
        };

        let mut config = Self::from_path(&config_path)?;

        config.config_path = config_path;
        config.cli = Some(cli);
        config.finalize(cli);
        config.validate()?;

        Ok(config)
    }

    /// Parse configuration from TOML string
    pub fn from_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        Ok(config)
    }

    /// Load configuration from file path with unknown field detection.
    fn from_path(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;

        let (config, ignored) = Self::parse_with_ignored(&content)?;

        if !ignored.is_empty() {
            Self::print_unknown_fields_warning(&ignored, path);
            if !Self::prompt_continue()? {
                bail!("Aborted due to unknown config fields");
            }
        }

        Ok(config)
    }

    /// Parse TOML content, collecting any unknown fields.
    fn parse_with_ignored(content: &str) -> Result<(Self, Vec<String>)> {
        let mut ignored = Vec::new();
        let deserializer = toml::Deserializer::new(content);
        let config = serde_ignored::deserialize(deserializer, |path: serde_ignored::Path| {
            ignored.push(path.to_string());
        })
        .map_err(ConfigError::Toml)?;
        Ok((config, ignored))
    }

    /// Print warning about unknown fields.
    fn print_unknown_fields_warning(fields: &[String], path: &Path) {
        let display_path = path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_else(|| path.to_string_lossy());
        eprintln!();
        log!("warning"; "unknown fields in {}:", display_path);
        log!("warning"; "ignoring:");
        for field in fields {
            eprintln!("- {}", field);
        }
        eprintln!();
    }

    /// Prompt user to continue. Returns true only if user explicitly confirms.
    fn prompt_continue() -> Result<bool> {
        use std::io::{self, Write};

        eprint!("Continue? [y/N] ");
        io::stderr().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;

        let input = input.trim().to_lowercase();
        Ok(input == "y" || input == "yes")
    }

    /// Finalize configuration after loading.
    fn finalize(&mut self, cli: &Cli) {
        let root = self
            .config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let root = crate::utils::path::normalize_path(&root);
        self.root = root.clone();

        self.apply_command_options(cli);

        // Resolve paths and per-bundle minify defaults. An explicit CLI
        // --minify beats per-bundle settings.
        let cli_minify = match &cli.command {
            Commands::Build { build_args } | Commands::Serve { build_args, .. } => {
                build_args.minify
            }
        };
        self.build.output = crate::utils::path::normalize_path(&root.join(&self.build.output));
        for bundle in &mut self.bundles {
            bundle.normalize(&root);
            if cli_minify.is_some() {
                bundle.minify = cli_minify;
            } else if bundle.minify.is_none() {
                bundle.minify = Some(self.build.minify);
            }
        }
    }

    /// Apply command-specific configuration options.
    fn apply_command_options(&mut self, cli: &Cli) {
        match &cli.command {
            Commands::Build { build_args } => {
                self.apply_build_args(build_args);
            }
            Commands::Serve {
                build_args,
                interface,
                port,
            } => {
                self.apply_build_args(build_args);
                Self::update_option(&mut self.serve.interface, interface.as_ref());
                Self::update_option(&mut self.serve.port, port.as_ref());
            }
        }
    }

    /// Apply build arguments from CLI.
    fn apply_build_args(&mut self, args: &BuildArgs) {
        crate::logger::set_verbose(args.verbose);
        Self::update_option(&mut self.build.minify, args.minify.as_ref());
    }

    /// Update config option if CLI value is provided.
    fn update_option<T: Clone>(config_option: &mut T, cli_option: Option<&T>) {
        if let Some(option) = cli_option {
            *config_option = option.clone();
        }
    }

    /// Get the root directory path
    pub fn get_root(&self) -> &Path {
        &self.root
    }

    // ========================================================================
    // validation
    // ========================================================================

    /// Validate configuration, collecting all errors before returning.
    pub fn validate(&self) -> Result<()> {
        let mut diag = ConfigDiagnostics::new();

        if self.bundles.is_empty() {
            diag.error_with_hint(
                "bundle",
                "no [[bundle]] entries configured",
                "add at least one [[bundle]] with route, entry and command",
            );
        }

        let mut seen_routes = std::collections::BTreeSet::new();
        for (i, bundle) in self.bundles.iter().enumerate() {
            bundle_diagnostics(bundle, i, &mut diag);
            if !bundle.route.is_empty() && !seen_routes.insert(bundle.route.as_str()) {
                diag.error(
                    format!("bundle[{i}].route"),
                    format!("duplicate route `{}`", bundle.route),
                );
            }
        }

        diag.into_result()
            .map_err(|e| ConfigError::Diagnostics(e).into())
    }
}

/// Per-bundle validation.
fn bundle_diagnostics(bundle: &BundleConfig, index: usize, diag: &mut ConfigDiagnostics) {
    if bundle.route.is_empty() || !bundle.route.starts_with('/') {
        diag.error(
            format!("bundle[{index}].route"),
            format!("route `{}` must start with `/`", bundle.route),
        );
    }

    if bundle.command.is_empty() {
        diag.error_with_hint(
            format!("bundle[{index}].command"),
            "bundler command is not configured",
            "e.g. command = [\"esbuild\", \"--bundle\", \"$PACKSERVE_ENTRY\"]",
        );
    }

    if !bundle.entry.as_os_str().is_empty() && !bundle.entry.is_file() {
        diag.error(
            format!("bundle[{index}].entry"),
            format!("entry `{}` does not exist", bundle.entry.display()),
        );
    }

    if let Some(value) = bundle.cache.cache_control()
        && value.chars().any(|c| c.is_control())
    {
        diag.error(
            format!("bundle[{index}].cache"),
            "cache-control value contains control characters",
        );
    }
}

/// Search upward from the current directory for the config file.
fn find_config_file(name: &Path) -> Option<PathBuf> {
    if name.is_absolute() {
        return name.exists().then(|| name.to_path_buf());
    }

    let mut dir = std::env::current_dir().ok()?;
    loop {
        let candidate = dir.join(name);
        if candidate.is_file() {
            return Some(candidate);
        }
        if !dir.pop() {
            return None;
        }
    }
}

// ============================================================================
// Test Helpers (available to all modules via `use crate::config::test_*`)
// ============================================================================

/// Parse config from a TOML snippet.
/// Panics if there are unknown fields (to catch config typos in tests).
#[cfg(test)]
pub fn test_parse_config(content: &str) -> Config {
    let (parsed, ignored) = Config::parse_with_ignored(content).unwrap();
    assert!(
        ignored.is_empty(),
        "test config has unknown fields: {:?}",
        ignored
    );
    parsed
}

// ============================================================================
// tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_str_invalid_toml() {
        let result: Result<Config, _> = toml::from_str("[serve\nport = 8080");
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_fields_detected() {
        let content = "[serve]\nport = 8080\n[unknown_section]\nfield = \"value\"";
        let (config, ignored) = Config::parse_with_ignored(content).unwrap();

        assert_eq!(config.serve.port, 8080);
        assert!(!ignored.is_empty());
        assert!(ignored.iter().any(|f| f.contains("unknown_section")));
    }

    #[test]
    fn test_no_unknown_fields() {
        let content = "[serve]\nport = 8080";
        let (_, ignored) = Config::parse_with_ignored(content).unwrap();
        assert!(ignored.is_empty());
    }

    #[test]
    fn test_validate_empty_bundles() {
        let config = test_parse_config("");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_route_and_command() {
        let temp = tempfile::TempDir::new().unwrap();
        let entry = temp.path().join("app.js");
        std::fs::write(&entry, "console.log(1)").unwrap();

        let mut config = test_parse_config("");
        config.bundles.push(BundleConfig {
            route: "app.js".into(), // missing leading slash
            entry: entry.clone(),
            command: vec![],
            ..Default::default()
        });

        let err = config.validate().unwrap_err();
        let display = format!("{err}");
        assert!(display.contains("must start with `/`"));
        assert!(display.contains("bundler command is not configured"));
    }

    #[test]
    fn test_validate_duplicate_routes() {
        let temp = tempfile::TempDir::new().unwrap();
        let entry = temp.path().join("app.js");
        std::fs::write(&entry, "console.log(1)").unwrap();

        let mut config = test_parse_config("");
        for _ in 0..2 {
            config.bundles.push(BundleConfig {
                route: "/app.js".into(),
                entry: entry.clone(),
                command: vec!["esbuild".into()],
                ..Default::default()
            });
        }

        let err = config.validate().unwrap_err();
        assert!(format!("{err}").contains("duplicate route"));
    }

    #[test]
    fn test_validate_missing_entry() {
        let mut config = test_parse_config("");
        config.bundles.push(BundleConfig {
            route: "/app.js".into(),
            entry: PathBuf::from("/nonexistent/app.js"),
            command: vec!["esbuild".into()],
            ..Default::default()
        });

        let err = config.validate().unwrap_err();
        assert!(format!("{err}").contains("does not exist"));
    }

    #[test]
    fn test_valid_config_passes() {
        let temp = tempfile::TempDir::new().unwrap();
        let entry = temp.path().join("app.js");
        std::fs::write(&entry, "console.log(1)").unwrap();

        let mut config = test_parse_config("");
        config.bundles.push(BundleConfig {
            route: "/app.js".into(),
            entry,
            command: vec!["esbuild".into(), "--bundle".into()],
            ..Default::default()
        });

        assert!(config.validate().is_ok());
    }
}
