//! External command execution utilities.
//!
//! Provides a Builder-based API for running bundler and hook commands with
//! stdin piping and captured output.

#![allow(dead_code)]
//!
//! # Examples
//!
//! ```ignore
//! use crate::utils::exec::Cmd;
//!
//! // Bundler invocation
//! let output = Cmd::from_slice(&["esbuild", "--bundle", "src/app.js"])
//!     .cwd(root)
//!     .run()?;
//!
//! // Hook transform (artifact piped through stdin)
//! let output = Cmd::from_slice(&["node", "banner.js"])
//!     .stdin(bundle_bytes)
//!     .run()?;
//! ```

use anyhow::{Context, Result, bail};
use std::{
    ffi::{OsStr, OsString},
    io::Write,
    path::{Path, PathBuf},
    process::{Command, Output, Stdio},
};

/// Command builder for external process execution.
#[derive(Default)]
pub struct Cmd {
    program: OsString,
    args: Vec<OsString>,
    cwd: Option<PathBuf>,
    envs: Vec<(String, String)>,
    stdin_data: Option<Vec<u8>>,
}

impl Cmd {
    /// Create a new command builder.
    pub fn new<S: AsRef<OsStr>>(program: S) -> Self {
        Self {
            program: program.as_ref().to_owned(),
            ..Default::default()
        }
    }

    /// Create from a command array (e.g., `["npx", "esbuild", "--bundle"]`).
    pub fn from_slice<S: AsRef<OsStr>>(cmd: &[S]) -> Self {
        let mut iter = cmd.iter();
        let program = iter
            .next()
            .map(|s| s.as_ref().to_owned())
            .unwrap_or_default();
        let args: Vec<_> = iter.map(|s| s.as_ref().to_owned()).collect();
        Self {
            program,
            args,
            ..Default::default()
        }
    }

    /// Add multiple arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        for arg in args {
            let arg = arg.as_ref();
            if !arg.is_empty() {
                self.args.push(arg.to_owned());
            }
        }
        self
    }

    /// Set working directory.
    pub fn cwd<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.cwd = Some(dir.as_ref().to_owned());
        self
    }

    /// Set environment variables for the subprocess.
    pub fn envs<K, V, I>(mut self, vars: I) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
        I: IntoIterator<Item = (K, V)>,
    {
        for (k, v) in vars {
            self.envs
                .push((k.as_ref().to_owned(), v.as_ref().to_owned()));
        }
        self
    }

    /// Set stdin data to pipe to the process.
    pub fn stdin<D: AsRef<[u8]>>(mut self, data: D) -> Self {
        self.stdin_data = Some(data.as_ref().to_vec());
        self
    }

    /// Execute the command and return its captured output.
    ///
    /// The exit status is NOT checked here; callers decide whether a
    /// non-zero status is an error.
    pub fn run(self) -> Result<Output> {
        let program = self.program.to_string_lossy().into_owned();
        if program.is_empty() {
            bail!("empty command");
        }

        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        if let Some(dir) = &self.cwd {
            command.current_dir(dir);
        }
        for (key, value) in &self.envs {
            command.env(key, value);
        }

        command.stdin(if self.stdin_data.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        });

        let mut child = command
            .spawn()
            .with_context(|| format!("failed to launch `{program}`"))?;

        if let Some(data) = self.stdin_data {
            // Taking the handle drops it after the write, closing the pipe so
            // the child sees EOF.
            let mut stdin = child
                .stdin
                .take()
                .with_context(|| format!("failed to open stdin of `{program}`"))?;
            stdin
                .write_all(&data)
                .with_context(|| format!("failed to pipe input to `{program}`"))?;
        }

        child
            .wait_with_output()
            .with_context(|| format!("failed to wait for `{program}`"))
    }
}
