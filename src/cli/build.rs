//! One-shot build of every configured bundle into the output directory.

use anyhow::{Context, Result, bail};
use std::fs;

use crate::bundler::CommandBundler;
use crate::config::Config;
use crate::log;
use crate::utils::human_size;
use crate::worker::pipeline;

/// Build all bundles. Failures are collected so every bundle gets a chance
/// to build; any failure makes the command exit non-zero.
pub fn build_bundles(config: &Config) -> Result<()> {
    let output_dir = &config.build.output;
    fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create {}", output_dir.display()))?;

    let mut failures = 0usize;
    for bundle in &config.bundles {
        let bundler = CommandBundler::new(bundle);
        match pipeline::run(&bundler, bundle) {
            Ok(bytes) => {
                let target = output_dir.join(bundle.route.trim_start_matches('/'));
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::write(&target, &bytes)
                    .with_context(|| format!("failed to write {}", target.display()))?;
                log!("build"; "{} ({})", bundle.route, human_size(bytes.len()));
            }
            Err(e) => {
                log!("error"; "{}: {}", bundle.route, e);
                failures += 1;
            }
        }
    }

    if failures > 0 {
        bail!(
            "{} of {} bundle(s) failed to build",
            failures,
            config.bundles.len()
        );
    }
    Ok(())
}
