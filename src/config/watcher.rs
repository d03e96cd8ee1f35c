//! Hot reload of the live parts of the configuration
//!
//! The mapping table, modifiers and catalog are built once at startup. A
//! reloaded file only reaches the running engine through [`LiveUpdate`]:
//! the host settings and the raw-forwarding switch. Anything else that
//! changed is reported so the user knows a restart is needed.

use anyhow::{Context, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use serde_json::Value;
use std::path::Path;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::{AppConfig, SettingsConfig};

/// Time for an editor to finish writing before the file is re-read
const SETTLE_DELAY: Duration = Duration::from_millis(100);

/// What a reloaded file changes in the running engine
#[derive(Debug, Clone)]
pub struct LiveUpdate {
    /// New settings section, when it differs
    pub settings: Option<SettingsConfig>,
    /// New `surface.also_forward_raw`, when it differs
    pub also_forward_raw: Option<bool>,
    /// Sections that only take effect after a restart
    pub restart_required: Vec<&'static str>,
}

impl LiveUpdate {
    /// Compare a reloaded configuration against the one in effect
    pub fn diff(current: &AppConfig, reloaded: &AppConfig) -> Self {
        let settings = (current.settings != reloaded.settings).then(|| reloaded.settings.clone());
        let also_forward_raw = (current.surface.also_forward_raw != reloaded.surface.also_forward_raw)
            .then_some(reloaded.surface.also_forward_raw);

        let restart_required = structural_sections(current)
            .into_iter()
            .zip(structural_sections(reloaded))
            .filter(|((_, old), (_, new))| old != new)
            .map(|((name, _), _)| name)
            .collect();

        Self {
            settings,
            also_forward_raw,
            restart_required,
        }
    }

    /// Nothing to apply and nothing to report
    pub fn is_empty(&self) -> bool {
        self.settings.is_none() && self.also_forward_raw.is_none() && self.restart_required.is_empty()
    }
}

/// Sections baked into the engine at startup, serialized for comparison.
/// A section that fails to serialize compares as `Null` on both sides.
fn structural_sections(config: &AppConfig) -> Vec<(&'static str, Value)> {
    let surface = &config.surface;
    vec![
        ("midi", to_value(&config.midi)),
        (
            "surface",
            to_value(&(
                surface.channel,
                &surface.buttons,
                surface.external_indicator,
                surface.buttons_dispatch,
            )),
        ),
        ("layout", to_value(&config.layout)),
        ("controls", to_value(&config.controls)),
        ("modifiers", to_value(&config.modifiers)),
        ("toggle_groups", to_value(&config.toggle_groups)),
        ("overrides", to_value(&config.overrides)),
        ("sync_rate", to_value(&config.sync_rate)),
        ("host", to_value(&config.host)),
    ]
}

fn to_value<T: serde::Serialize>(section: &T) -> Value {
    serde_json::to_value(section).unwrap_or(Value::Null)
}

/// Watches the configuration file and yields [`LiveUpdate`]s
pub struct ConfigWatcher {
    _watcher: RecommendedWatcher,
    path: String,
    current: AppConfig,
    changed: mpsc::Receiver<()>,
}

impl ConfigWatcher {
    /// Load the configuration and start watching it
    pub async fn new(path: String) -> Result<(Self, AppConfig)> {
        let current = AppConfig::load(&path)
            .await
            .context("Failed to load initial config")?;

        // One pending signal is enough: the file is re-read in full anyway
        let (tx, changed) = mpsc::channel(1);
        let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| match res {
            Ok(event) if matches!(event.kind, EventKind::Modify(_)) => {
                debug!("Config file modified: {:?}", event.paths);
                let _ = tx.try_send(());
            }
            Ok(_) => {}
            Err(e) => error!("Watch error: {}", e),
        })?;

        watcher
            .watch(Path::new(&path), RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch config file: {}", path))?;
        info!("Config file watcher started for: {}", path);

        let initial = current.clone();
        Ok((
            Self {
                _watcher: watcher,
                path,
                current,
                changed,
            },
            initial,
        ))
    }

    /// Wait for the next reload that changes something. Invalid files are
    /// logged and skipped, keeping the configuration in effect. Returns
    /// `None` once the watcher is gone.
    pub async fn next_update(&mut self) -> Option<LiveUpdate> {
        loop {
            self.changed.recv().await?;
            tokio::time::sleep(SETTLE_DELAY).await;
            // Writes that landed while settling are covered by this read
            while self.changed.try_recv().is_ok() {}

            let reloaded = match AppConfig::load(&self.path).await {
                Ok(config) => config,
                Err(e) => {
                    warn!("Failed to reload config (keeping old config): {:#}", e);
                    continue;
                }
            };

            let update = LiveUpdate::diff(&self.current, &reloaded);
            if update.is_empty() {
                debug!("Config file rewritten without changes");
                continue;
            }
            self.current = reloaded;
            return Some(update);
        }
    }

    /// Configuration currently in effect
    pub fn current(&self) -> &AppConfig {
        &self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const BASE: &str = r#"
surface:
  also_forward_raw: true
controls:
  - { control: 31, kind: fader, targets: ["Cutoff", "Resonance"] }
"#;

    #[test]
    fn test_diff_settings_only() {
        let current = AppConfig::from_yaml(BASE).unwrap();
        let mut reloaded = current.clone();
        reloaded.settings.values.insert("Set 1 button".to_string(), 2);

        let update = LiveUpdate::diff(&current, &reloaded);
        assert_eq!(update.settings.unwrap().values["Set 1 button"], 2);
        assert_eq!(update.also_forward_raw, None);
        assert!(update.restart_required.is_empty());
    }

    #[test]
    fn test_diff_reports_structural_changes() {
        let current = AppConfig::from_yaml(BASE).unwrap();
        let reloaded = AppConfig::from_yaml(
            r#"
surface:
  also_forward_raw: false
  external_indicator: true
controls:
  - { control: 31, kind: fader, targets: ["Cutoff", "Drive"] }
"#,
        )
        .unwrap();

        let update = LiveUpdate::diff(&current, &reloaded);
        assert_eq!(update.also_forward_raw, Some(false));
        assert!(update.settings.is_none());
        assert_eq!(update.restart_required, vec!["surface", "controls"]);
    }

    #[test]
    fn test_diff_identical_is_empty() {
        let current = AppConfig::from_yaml(BASE).unwrap();
        assert!(LiveUpdate::diff(&current, &current.clone()).is_empty());
    }

    #[tokio::test]
    async fn test_watcher_emits_live_update() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config_path = temp_dir.path().join("test-config.yaml");
        fs::write(&config_path, BASE)?;

        let (mut watcher, config) = ConfigWatcher::new(config_path.to_string_lossy().to_string()).await?;
        assert!(config.surface.also_forward_raw);
        assert_eq!(config.controls[0].targets[0], "Cutoff");

        let modified = r#"
surface:
  also_forward_raw: false
controls:
  - { control: 31, kind: fader, targets: ["Cutoff", "Resonance"] }
settings:
  values:
    "Send MIDI CC": 0
"#;
        tokio::time::sleep(Duration::from_millis(100)).await;
        fs::write(&config_path, modified)?;

        let update = tokio::time::timeout(Duration::from_secs(2), watcher.next_update()).await?;

        if let Some(update) = update {
            assert_eq!(update.also_forward_raw, Some(false));
            assert_eq!(update.settings.unwrap().values["Send MIDI CC"], 0);
            assert!(update.restart_required.is_empty());
            assert!(!watcher.current().surface.also_forward_raw);
        }

        Ok(())
    }
}
