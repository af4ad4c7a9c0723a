//! The bundle transform pipeline.
//!
//! One complete build: bundle → postcompile → preminify → minify →
//! postminify. The minify-adjacent hooks run only when minification is
//! enabled. Minification failure falls back to the unminified artifact;
//! bundler and hook failures fail the build.

use thiserror::Error;

use crate::bundler::{BundleError, Bundler};
use crate::config::BundleConfig;
use crate::hooks::{self, HookError};

/// A failed build attempt. Surfaced to the request path as the error
/// payload so the client sees a diagnosable failure.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Bundle(#[from] BundleError),

    #[error(transparent)]
    Hook(#[from] HookError),
}

/// Run one complete build for a bundle.
pub fn run(bundler: &dyn Bundler, bundle: &BundleConfig) -> Result<Vec<u8>, BuildError> {
    let src = bundler.bundle()?;
    let src = hooks::apply(&bundle.postcompile, "postcompile", src, bundle)?;

    if !bundle.minify_enabled() {
        return Ok(src);
    }

    let src = hooks::apply(&bundle.preminify, "preminify", src, bundle)?;
    let src = match crate::minify::minify(&src) {
        Some(minified) => minified,
        None => {
            crate::log!("minify"; "skipped for {}: artifact did not minify", bundle.route);
            src
        }
    };
    let src = hooks::apply(&bundle.postminify, "postminify", src, bundle)?;

    Ok(src)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HookConfig;

    struct StaticBundler(Vec<u8>);

    impl Bundler for StaticBundler {
        fn bundle(&self) -> Result<Vec<u8>, BundleError> {
            Ok(self.0.clone())
        }
    }

    struct BrokenBundler;

    impl Bundler for BrokenBundler {
        fn bundle(&self) -> Result<Vec<u8>, BundleError> {
            Err(BundleError::Failed {
                entry: "src/app.js".into(),
                status: "exit status: 1".into(),
                stderr: "Could not resolve \"./missing\"".into(),
            })
        }
    }

    fn bundle_with_minify(minify: bool) -> BundleConfig {
        BundleConfig {
            route: "/app.js".into(),
            minify: Some(minify),
            ..Default::default()
        }
    }

    #[test]
    fn test_unminified_output_is_bundler_output() {
        let raw = b"const answer = 1 + 2;\nconsole.log( answer );\n".to_vec();
        let bundler = StaticBundler(raw.clone());
        let out = run(&bundler, &bundle_with_minify(false)).unwrap();
        assert_eq!(out, raw, "no hooks, no minify: bytes pass through verbatim");
    }

    #[test]
    fn test_minify_shrinks_output() {
        let raw = b"const answer = 1 + 2;\nconsole.log( answer );\n".to_vec();
        let bundler = StaticBundler(raw.clone());
        let out = run(&bundler, &bundle_with_minify(true)).unwrap();
        assert!(out.len() < raw.len());
    }

    #[test]
    fn test_minify_failure_falls_back_to_raw() {
        // Not JavaScript: the minifier refuses, the artifact survives
        let raw = b"%% not javascript %%".to_vec();
        let bundler = StaticBundler(raw.clone());
        let out = run(&bundler, &bundle_with_minify(true)).unwrap();
        assert_eq!(out, raw);
    }

    #[test]
    fn test_bundler_failure_propagates() {
        let err = run(&BrokenBundler, &bundle_with_minify(false)).unwrap_err();
        assert!(matches!(err, BuildError::Bundle(_)));
        assert!(format!("{err}").contains("Could not resolve"));
    }

    #[cfg(unix)]
    #[test]
    fn test_postcompile_hook_transforms_output() {
        let bundler = StaticBundler(b"var a=1;".to_vec());
        let mut bundle = bundle_with_minify(false);
        bundle.postcompile = HookConfig {
            command: vec!["tr".into(), "a-z".into(), "A-Z".into()],
            quiet: true,
        };
        let out = run(&bundler, &bundle).unwrap();
        assert_eq!(out, b"VAR A=1;");
    }

    #[cfg(unix)]
    #[test]
    fn test_preminify_hook_skipped_without_minify() {
        let bundler = StaticBundler(b"var a=1;".to_vec());
        let mut bundle = bundle_with_minify(false);
        // Would fail loudly if it ran
        bundle.preminify = HookConfig {
            command: vec!["sh".into(), "-c".into(), "exit 9".into()],
            quiet: true,
        };
        let out = run(&bundler, &bundle).unwrap();
        assert_eq!(out, b"var a=1;");
    }

    #[cfg(unix)]
    #[test]
    fn test_hook_failure_fails_build() {
        let bundler = StaticBundler(b"var a=1;".to_vec());
        let mut bundle = bundle_with_minify(false);
        bundle.postcompile = HookConfig {
            command: vec!["sh".into(), "-c".into(), "exit 2".into()],
            quiet: true,
        };
        let err = run(&bundler, &bundle).unwrap_err();
        assert!(matches!(err, BuildError::Hook(_)));
    }
}
