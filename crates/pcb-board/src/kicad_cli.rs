use anyhow::{Context, Result, anyhow};
use log::debug;
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;

#[cfg(target_os = "macos")]
mod paths {
    pub(crate) const DEFAULT_KICAD_CLI: &str =
        "/Applications/KiCad/KiCad.app/Contents/MacOS/kicad-cli";
}

#[cfg(target_os = "windows")]
mod paths {
    pub(crate) const DEFAULT_KICAD_CLI: &str = r"C:\Program Files\KiCad\9.0\bin\kicad-cli.exe";
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
mod paths {
    pub(crate) const DEFAULT_KICAD_CLI: &str = "/usr/bin/kicad-cli";
}

/// Location of `kicad-cli`: `$KICAD_CLI`, then the platform install path,
/// then whatever `kicad-cli` is on `PATH`.
pub fn kicad_cli_path() -> PathBuf {
    if let Ok(path) = std::env::var("KICAD_CLI") {
        let home = dirs::home_dir().unwrap_or_default();
        return PathBuf::from(path.replace('~', &home.to_string_lossy()));
    }
    let default = PathBuf::from(paths::DEFAULT_KICAD_CLI);
    if default.exists() {
        return default;
    }
    which::which("kicad-cli").unwrap_or(default)
}

/// Check if KiCad is installed and return a helpful error if not
pub fn check_kicad_installed() -> Result<()> {
    let kicad_path = kicad_cli_path();

    if !kicad_path.exists() {
        return Err(anyhow!(
            "KiCad CLI not found at expected location: {}\n\
             Please ensure KiCad is installed. You can download it from https://www.kicad.org/\n\
             If KiCad is installed in a non-standard location, set the KICAD_CLI environment variable.",
            kicad_path.display()
        ));
    }

    match Command::new(&kicad_path).arg("--version").output() {
        Ok(output) if output.status.success() => Ok(()),
        Ok(_) => Err(anyhow!(
            "KiCad CLI found but failed to execute. Please check your KiCad installation."
        )),
        Err(e) => Err(anyhow!(
            "Failed to execute KiCad CLI at {}: {}\n\
             Please ensure KiCad is properly installed and accessible.",
            kicad_path.display(),
            e
        )),
    }
}

/// Builder for KiCad CLI commands
#[derive(Debug, Default)]
pub struct KiCadCliBuilder {
    args: Vec<String>,
    env_vars: HashMap<String, String>,
    suppress_error_output: bool,
    current_dir: Option<PathBuf>,
}

impl KiCadCliBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a command (e.g., "pcb", "sch")
    pub fn command(mut self, cmd: &str) -> Self {
        self.args.push(cmd.to_string());
        self
    }

    /// Add a subcommand (e.g., "export", "drc")
    pub fn subcommand(mut self, subcmd: &str) -> Self {
        self.args.push(subcmd.to_string());
        self
    }

    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(|s| s.into()));
        self
    }

    /// Add a path argument
    pub fn path(self, path: &Path) -> Self {
        self.arg(path.to_string_lossy())
    }

    /// Suppress error output to stderr (useful for commands with verbose non-critical output)
    pub fn suppress_error_output(mut self, suppress: bool) -> Self {
        self.suppress_error_output = suppress;
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    pub fn env<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.env_vars.insert(key.into(), value.into());
        self
    }

    /// Execute the command, failing when kicad-cli exits unsuccessfully
    pub fn run(self) -> Result<()> {
        let suppress = self.suppress_error_output;
        let summary = self.args.join(" ");
        let output = self.output()?;

        if !output.status.success() {
            if !suppress {
                std::io::stderr().write_all(&output.stderr)?;
            }
            let stderr = String::from_utf8_lossy(&output.stderr);
            let detail = stderr.lines().rev().find(|l| !l.trim().is_empty());
            match detail {
                Some(line) => anyhow::bail!("kicad-cli {summary} failed: {}", line.trim()),
                None => anyhow::bail!("kicad-cli {summary} failed"),
            }
        }

        Ok(())
    }

    /// Execute the command and return its raw output
    pub fn output(self) -> Result<std::process::Output> {
        check_kicad_installed()?;

        let kicad_path = kicad_cli_path();
        debug!("Running {} {}", kicad_path.display(), self.args.join(" "));

        let mut cmd = Command::new(kicad_path);
        cmd.args(&self.args);
        if let Some(dir) = &self.current_dir {
            cmd.current_dir(dir);
        }
        for (key, value) in self.env_vars {
            cmd.env(key, value);
        }

        cmd.output().context("Failed to execute kicad-cli")
    }
}
