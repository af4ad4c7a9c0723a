//! Transform hook execution.
//!
//! Hooks are external commands that receive the artifact on stdin and emit
//! the transformed artifact on stdout. They run in this process, next to the
//! build worker - nothing executable crosses the worker boundary, only the
//! argv arrays from the config.
//!
//! `$PACKSERVE_*` variables are resolved in arguments and exported to the
//! hook's environment.

use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::config::{BundleConfig, HookConfig};
use crate::utils::exec::Cmd;

/// Hook execution failure. Always a build failure for the bundle; never
/// silently swallowed.
#[derive(Debug, Error)]
pub enum HookError {
    #[error("`{name}` hook failed to launch: {detail}")]
    Launch { name: &'static str, detail: String },

    #[error("`{name}` hook failed ({status}):\n{stderr}")]
    Failed {
        name: &'static str,
        status: String,
        stderr: String,
    },
}

// ============================================================================
// Environment Variables
// ============================================================================

/// Build `$PACKSERVE_*` environment variables for hook and bundler execution
pub fn build_vars(bundle: &BundleConfig) -> FxHashMap<String, String> {
    let mut vars = FxHashMap::default();

    vars.insert(
        "PACKSERVE_ROOT".into(),
        bundle.root.display().to_string(),
    );
    vars.insert(
        "PACKSERVE_ENTRY".into(),
        bundle.entry.display().to_string(),
    );
    vars.insert("PACKSERVE_ROUTE".into(), bundle.route.clone());
    vars.insert(
        "PACKSERVE_MINIFY".into(),
        bundle.minify_enabled().to_string(),
    );

    vars
}

// ============================================================================
// Command Argument Resolution
// ============================================================================

/// Resolve `$PACKSERVE_*` variables in command arguments
///
/// Replaces occurrences of `$PACKSERVE_XXX` with actual values from the vars map
pub fn resolve_args(args: &[String], vars: &FxHashMap<String, String>) -> Vec<String> {
    args.iter()
        .map(|arg| {
            let mut result = arg.clone();
            for (key, value) in vars {
                let pattern = format!("${}", key);
                result = result.replace(&pattern, value);
            }
            result
        })
        .collect()
}

// ============================================================================
// Hook Execution
// ============================================================================

/// Pipe the artifact through a single hook.
///
/// An unconfigured hook passes the input through unchanged.
pub fn apply(
    hook: &HookConfig,
    name: &'static str,
    input: Vec<u8>,
    bundle: &BundleConfig,
) -> Result<Vec<u8>, HookError> {
    if !hook.is_configured() {
        return Ok(input);
    }

    let vars = build_vars(bundle);
    let resolved = resolve_args(&hook.command, &vars);

    if !hook.quiet {
        crate::debug!("hook"; "`{}` running ({} for {})", resolved[0], name, bundle.route);
    }

    let mut cmd = Cmd::from_slice(&resolved).envs(&vars).stdin(input);
    if !bundle.root.as_os_str().is_empty() {
        cmd = cmd.cwd(&bundle.root);
    }

    let output = cmd.run().map_err(|e| HookError::Launch {
        name,
        detail: format!("{e:#}"),
    })?;

    if !output.status.success() {
        return Err(HookError::Failed {
            name,
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(output.stdout)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn test_bundle() -> BundleConfig {
        BundleConfig {
            route: "/app.js".into(),
            entry: std::path::PathBuf::from("/project/src/app.js"),
            ..Default::default()
        }
    }

    #[test]
    fn test_resolve_args_simple() {
        let mut vars = FxHashMap::default();
        vars.insert("PACKSERVE_ENTRY".into(), "/path/to/app.js".into());
        vars.insert("PACKSERVE_ROOT".into(), "/path/to".into());

        let args = vec![
            "esbuild".into(),
            "--bundle".into(),
            "$PACKSERVE_ENTRY".into(),
        ];

        let resolved = resolve_args(&args, &vars);
        assert_eq!(resolved[0], "esbuild");
        assert_eq!(resolved[2], "/path/to/app.js");
    }

    #[test]
    fn test_resolve_args_no_vars() {
        let vars = FxHashMap::default();
        let args = vec!["echo".into(), "hello".into()];
        let resolved = resolve_args(&args, &vars);
        assert_eq!(resolved, args);
    }

    #[test]
    fn test_resolve_args_multiple_vars_in_one_arg() {
        let mut vars = FxHashMap::default();
        vars.insert("PACKSERVE_ROOT".into(), "/root".into());
        vars.insert("PACKSERVE_ROUTE".into(), "/app.js".into());

        let args = vec!["cp $PACKSERVE_ROOT/src $PACKSERVE_ROOT/out$PACKSERVE_ROUTE".into()];
        let resolved = resolve_args(&args, &vars);
        assert_eq!(resolved[0], "cp /root/src /root/out/app.js");
    }

    #[test]
    fn test_build_vars_contents() {
        let bundle = test_bundle();
        let vars = build_vars(&bundle);
        assert_eq!(vars["PACKSERVE_ROUTE"], "/app.js");
        assert_eq!(vars["PACKSERVE_ENTRY"], "/project/src/app.js");
        assert_eq!(vars["PACKSERVE_MINIFY"], "false");
    }

    #[test]
    fn test_apply_unconfigured_passthrough() {
        let bundle = test_bundle();
        let hook = HookConfig::default();
        let out = apply(&hook, "postcompile", b"var a=1;".to_vec(), &bundle).unwrap();
        assert_eq!(out, b"var a=1;");
    }

    #[cfg(unix)]
    #[test]
    fn test_apply_stdin_stdout_transform() {
        let bundle = test_bundle();
        let hook = HookConfig {
            command: vec!["tr".into(), "a-z".into(), "A-Z".into()],
            quiet: true,
        };
        let out = apply(&hook, "postcompile", b"var a=1;".to_vec(), &bundle).unwrap();
        assert_eq!(out, b"VAR A=1;");
    }

    #[cfg(unix)]
    #[test]
    fn test_apply_failing_hook_is_error() {
        let bundle = test_bundle();
        let hook = HookConfig {
            command: vec!["sh".into(), "-c".into(), "echo broken >&2; exit 3".into()],
            quiet: true,
        };
        let err = apply(&hook, "preminify", b"x".to_vec(), &bundle).unwrap_err();
        let display = format!("{err}");
        assert!(display.contains("preminify"));
        assert!(display.contains("broken"));
    }

    #[test]
    fn test_apply_missing_command_is_launch_error() {
        let bundle = test_bundle();
        let hook = HookConfig {
            command: vec!["definitely-not-a-real-binary-xyz".into()],
            quiet: true,
        };
        let err = apply(&hook, "postminify", b"x".to_vec(), &bundle).unwrap_err();
        assert!(matches!(err, HookError::Launch { .. }));
    }
}
