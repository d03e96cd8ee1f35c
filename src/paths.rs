//! Application path management for portable and installed modes.
//!
//! ## Mode Detection
//!
//! - **Working directory**: a `config.yaml` in the current directory wins.
//! - **Portable mode**: a `.portable` marker file next to the executable
//!   keeps config and logs in the executable's directory.
//! - **Installed mode** (default): the platform config directory
//!   (`%APPDATA%\Surface Remap`, `~/.config/Surface Remap`, ...).

use anyhow::Context;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Application name used for directories in installed mode
const APP_NAME: &str = "Surface Remap";

/// Application paths for config and logs.
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Path to the configuration file
    pub config: PathBuf,
    /// Path to the logs directory
    pub logs_dir: PathBuf,
    /// Whether config lives next to the executable or in the cwd
    pub is_portable: bool,
}

impl AppPaths {
    /// Detect the appropriate paths based on environment.
    ///
    /// Note: This is called before logging is initialized, so we use eprintln
    /// for early diagnostic output.
    pub fn detect() -> Self {
        let exe_dir = exe_dir();
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

        if cwd.join("config.yaml").exists() {
            #[cfg(debug_assertions)]
            eprintln!("[paths] Using config.yaml from cwd: {}", cwd.display());
            return Self::portable(&cwd);
        }

        if exe_dir.join(".portable").exists() {
            #[cfg(debug_assertions)]
            eprintln!("[paths] Running in PORTABLE mode (.portable marker found)");
            return Self::portable(&exe_dir);
        }

        let app_dir = dirs::config_dir()
            .unwrap_or_else(|| {
                eprintln!("[paths] WARNING: dirs::config_dir() returned None, falling back to exe dir");
                exe_dir.clone()
            })
            .join(APP_NAME);

        #[cfg(debug_assertions)]
        eprintln!("[paths] Running in INSTALLED mode (config dir: {})", app_dir.display());

        Self {
            config: app_dir.join("config.yaml"),
            logs_dir: app_dir.join("logs"),
            is_portable: false,
        }
    }

    /// Everything in one directory
    pub fn portable(dir: &Path) -> Self {
        Self {
            config: dir.join("config.yaml"),
            logs_dir: dir.join("logs"),
            is_portable: true,
        }
    }

    /// Paths for an explicitly given config file; logs go next to it
    pub fn for_config(config: impl Into<PathBuf>) -> Self {
        let config = config.into();
        let base = config
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));
        Self {
            logs_dir: base.join("logs"),
            config,
            is_portable: true,
        }
    }

    /// Get the base directory (for displaying in logs)
    pub fn base_dir(&self) -> PathBuf {
        self.config
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Ensure all required directories exist.
    ///
    /// In installed mode, also copies `config.example.yaml` to the config
    /// location if the config file doesn't exist.
    pub fn ensure_directories(&self) -> anyhow::Result<()> {
        if !self.logs_dir.exists() {
            debug!("Creating logs directory: {}", self.logs_dir.display());
            std::fs::create_dir_all(&self.logs_dir)?;
        }

        if !self.is_portable {
            if let Some(config_parent) = self.config.parent() {
                if !config_parent.exists() {
                    debug!("Creating config directory: {}", config_parent.display());
                    std::fs::create_dir_all(config_parent)?;
                }
            }

            if !self.config.exists() {
                self.copy_example_config()?;
            }
        }

        Ok(())
    }

    /// Copy `config.example.yaml` from next to the executable or the cwd
    fn copy_example_config(&self) -> anyhow::Result<()> {
        let candidates = [
            exe_dir().join("config.example.yaml"),
            PathBuf::from("config.example.yaml"),
        ];

        for example in candidates.iter().filter(|p| p.exists()) {
            info!("Copying example config to {}", self.config.display());
            std::fs::copy(example, &self.config).with_context(|| {
                format!(
                    "Failed to copy example config from {} to {}",
                    example.display(),
                    self.config.display()
                )
            })?;
            return Ok(());
        }

        info!("No config found, please create {}", self.config.display());
        Ok(())
    }
}

fn exe_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(|p| p.to_path_buf()))
        .unwrap_or_else(|| PathBuf::from("."))
}
