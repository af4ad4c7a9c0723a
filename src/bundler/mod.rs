//! The bundler collaborator boundary.
//!
//! Module-graph compilation is delegated to an external compiler command
//! (esbuild, rollup, webpack - whatever the config names). This module owns
//! the contract only: one call produces the artifact bytes or an error.
//!
//! - [`Bundler`]: the opaque collaborator trait
//! - [`CommandBundler`]: production implementation running the configured
//!   command
//! - [`watch`]: decorator emitting change events for the bundle's sources

mod watch;

pub use watch::BundleWatcher;

use thiserror::Error;

use crate::config::BundleConfig;
use crate::hooks::{build_vars, resolve_args};
use crate::utils::exec::Cmd;

/// Bundling failure (module not found, syntax error in source, compiler
/// missing). Surfaced to the request path as a diagnosable error.
#[derive(Debug, Error)]
pub enum BundleError {
    #[error("failed to launch bundler: {detail}")]
    Launch { detail: String },

    #[error("bundler failed for `{entry}` ({status}):\n{stderr}")]
    Failed {
        entry: String,
        status: String,
        stderr: String,
    },
}

/// The module-graph compiler producing an artifact from source.
pub trait Bundler: Send + Sync {
    /// Produce the raw artifact bytes, or fail.
    fn bundle(&self) -> Result<Vec<u8>, BundleError>;
}

/// Production bundler: runs the configured external compiler command and
/// captures the artifact from stdout.
pub struct CommandBundler {
    argv: Vec<String>,
    vars: rustc_hash::FxHashMap<String, String>,
    root: std::path::PathBuf,
    entry: String,
}

impl CommandBundler {
    pub fn new(bundle: &BundleConfig) -> Self {
        let vars = build_vars(bundle);
        let argv = resolve_args(&bundle.command, &vars);
        Self {
            argv,
            vars,
            root: bundle.root.clone(),
            entry: bundle.entry.display().to_string(),
        }
    }
}

impl Bundler for CommandBundler {
    fn bundle(&self) -> Result<Vec<u8>, BundleError> {
        let mut cmd = Cmd::from_slice(&self.argv).envs(&self.vars);
        if !self.root.as_os_str().is_empty() {
            cmd = cmd.cwd(&self.root);
        }

        let output = cmd.run().map_err(|e| BundleError::Launch {
            detail: format!("{e:#}"),
        })?;

        if !output.status.success() {
            return Err(BundleError::Failed {
                entry: self.entry.clone(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(output.stdout)
    }
}
