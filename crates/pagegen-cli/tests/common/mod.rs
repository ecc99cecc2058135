#![allow(clippy::expect_used, clippy::unwrap_used, dead_code)]

use assert_cmd::Command;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

pub const CMD_TIMEOUT: Duration = Duration::from_secs(15);

/// A scratch directory holding a config file whose durable cache lives inside it.
pub struct Sandbox {
    dir: TempDir,
}

impl Sandbox {
    pub fn new() -> Self {
        Self::with_config("")
    }

    /// Sandbox whose config file has `extra` appended after the `[cache]` section.
    pub fn with_config(extra: &str) -> Self {
        let dir = tempfile::tempdir().expect("failed to create sandbox");
        let cache_dir = dir.path().join("cache");
        let config = format!(
            "[site]\nyear = 2025\n\n[cache]\ndurable_dir = '{}'\n\n{extra}",
            cache_dir.display()
        );
        std::fs::write(dir.path().join("config.toml"), config).unwrap();
        Self { dir }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn config_path(&self) -> PathBuf {
        self.dir.path().join("config.toml")
    }

    pub fn write(&self, name: &str, content: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    /// A `pagegen` command pointed at this sandbox's config.
    pub fn cmd(&self) -> Command {
        let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("pagegen"));
        cmd.timeout(CMD_TIMEOUT);
        for var in [
            "PAGEGEN_GENERATOR_ENDPOINT",
            "PAGEGEN_GENERATOR_API_KEY",
            "PAGEGEN_CACHE_DIR",
            "PAGEGEN_RATE_LIMIT_MAX",
        ] {
            cmd.env_remove(var);
        }
        cmd.env("PAGEGEN_CONFIG", self.config_path());
        cmd
    }
}
