use anyhow::{anyhow, Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{
    fs,
    path::{Path, PathBuf},
    sync::{PoisonError, RwLock},
    time::{Duration, SystemTime},
};

use crate::audio::ToneSpec;
use crate::watcher::WatchConfig;

/// Watcher defaults the CLI falls back to when a flag is not given.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WatchSettings {
    #[serde(flatten)]
    pub config: WatchConfig,
    pub done_sound: Option<PathBuf>,
    pub chime_volume_pct: u8,
    pub tesseract_path: PathBuf,
    pub ocr_language: Option<String>,
}

impl Default for WatchSettings {
    fn default() -> Self {
        Self {
            config: WatchConfig::default(),
            done_sound: Some(PathBuf::from("done.wav")),
            chime_volume_pct: 80,
            tesseract_path: PathBuf::from("tesseract"),
            ocr_language: None,
        }
    }
}

/// Everything the shell beeper's volume panel used to control.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BeepSettings {
    pub mute: bool,
    pub master_volume_pct: u8,
    /// Running tick volume
    pub run_volume_pct: u8,
    pub stop_volume_pct: u8,
    /// Silence before the stop tone
    pub quiet_secs: f64,
    pub tick: ToneSpec,
    pub tick_gap_ms: u32,
    pub stop_tone: ToneSpec,
    pub second_stop_tone: Option<ToneSpec>,
}

impl Default for BeepSettings {
    fn default() -> Self {
        Self {
            mute: false,
            master_volume_pct: 60,
            run_volume_pct: 50,
            stop_volume_pct: 70,
            quiet_secs: 3.0,
            tick: ToneSpec::new(600, 30),
            tick_gap_ms: 120,
            stop_tone: ToneSpec::new(440, 160),
            second_stop_tone: Some(ToneSpec::new(330, 160)),
        }
    }
}

impl BeepSettings {
    /// Master and per-sound volume combined, 0 when muted.
    pub fn effective_volume(&self, per_sound_pct: u8) -> u8 {
        if self.mute {
            return 0;
        }
        let combined =
            u32::from(self.master_volume_pct.min(100)) * u32::from(per_sound_pct.min(100)) / 100;
        u8::try_from(combined.min(100)).unwrap_or(100)
    }

    pub fn tick_volume(&self) -> u8 {
        self.effective_volume(self.run_volume_pct)
    }

    pub fn stop_volume(&self) -> u8 {
        self.effective_volume(self.stop_volume_pct)
    }

    pub fn quiet_period(&self) -> Duration {
        if self.quiet_secs.is_nan() || self.quiet_secs <= 0.0 {
            return Duration::ZERO;
        }
        Duration::try_from_secs_f64(self.quiet_secs).unwrap_or(Duration::MAX)
    }

    pub fn tick_gap(&self) -> Duration {
        Duration::from_millis(u64::from(self.tick_gap_ms))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserSettings {
    pub watch: WatchSettings,
    pub beep: BeepSettings,
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<UserSettings>,
}

impl SettingsStore {
    /// `settings.json` in the per-user config directory.
    pub fn default_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("com", "donewatch", "donewatch")
            .ok_or_else(|| anyhow!("could not determine the config directory"))?;
        Ok(dirs.config_dir().join("settings.json"))
    }

    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = read_file(&path)?;
            parse_settings(&contents).unwrap_or_else(|err| {
                log::warn!("{} is not valid settings ({err:#}); using defaults", path.display());
                UserSettings::default()
            })
        } else {
            UserSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn snapshot(&self) -> UserSettings {
        self.data.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn watch(&self) -> WatchSettings {
        self.snapshot().watch
    }

    pub fn beep(&self) -> BeepSettings {
        self.snapshot().beep
    }

    pub fn reset(&self) -> Result<()> {
        let mut guard = self.data.write().unwrap_or_else(PoisonError::into_inner);
        *guard = UserSettings::default();
        self.persist(&guard)
    }

    /// Sets one value by dotted key, e.g. `beep.masterVolumePct 40`.
    ///
    /// `raw` is parsed as JSON when it can be, otherwise taken as a string,
    /// so `null`, `true`, numbers and objects all work from the shell.
    pub fn set(&self, key: &str, raw: &str) -> Result<()> {
        let mut guard = self.data.write().unwrap_or_else(PoisonError::into_inner);
        let updated = apply_setting(&guard, key, raw)?;
        *guard = updated;
        self.persist(&guard)
    }

    /// Re-reads the file, keeping the current values if it no longer parses.
    pub fn reload(&self) -> Result<()> {
        let data = parse_settings(&read_file(&self.path)?)
            .with_context(|| format!("{} is not valid settings", self.path.display()))?;
        let mut guard = self.data.write().unwrap_or_else(PoisonError::into_inner);
        *guard = data;
        Ok(())
    }

    pub fn modified(&self) -> Option<SystemTime> {
        fs::metadata(&self.path).and_then(|meta| meta.modified()).ok()
    }

    fn persist(&self, data: &UserSettings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}

fn read_file(path: &Path) -> Result<String> {
    fs::read_to_string(path)
        .with_context(|| format!("Failed to read settings from {}", path.display()))
}

fn parse_settings(contents: &str) -> Result<UserSettings> {
    Ok(serde_json::from_str(contents)?)
}

fn apply_setting(current: &UserSettings, key: &str, raw: &str) -> Result<UserSettings> {
    let mut root = serde_json::to_value(current)?;
    let value = serde_json::from_str::<Value>(raw).unwrap_or_else(|_| Value::String(raw.into()));

    let mut slot = &mut root;
    for part in key.split('.') {
        slot = slot
            .as_object_mut()
            .and_then(|map| map.get_mut(part))
            .ok_or_else(|| anyhow!("unknown setting '{key}'"))?;
    }
    *slot = value;

    serde_json::from_value(root).with_context(|| format!("invalid value '{raw}' for '{key}'"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.json")).unwrap();
        assert_eq!(store.snapshot(), UserSettings::default());
        assert!(store.modified().is_none());
    }

    #[test]
    fn updates_persist_across_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let store = SettingsStore::new(path.clone()).unwrap();

        store.set("beep.mute", "true").unwrap();
        store.set("beep.secondStopTone", "null").unwrap();
        let beep = store.beep();
        assert!(beep.mute);

        let reopened = SettingsStore::new(path).unwrap();
        assert_eq!(reopened.beep(), beep);
        assert!(reopened.modified().is_some());
    }

    #[test]
    fn corrupt_file_falls_back_to_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();
        let store = SettingsStore::new(path).unwrap();
        assert_eq!(store.snapshot(), UserSettings::default());
    }

    #[test]
    fn reload_keeps_current_values_on_bad_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let store = SettingsStore::new(path.clone()).unwrap();
        store.set("beep.mute", "true").unwrap();

        fs::write(&path, "{ half written").unwrap();
        assert!(store.reload().is_err());
        assert!(store.beep().mute);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"beep": {"quietSecs": 1.5}, "watch": {"keywords": ["Done"]}}"#)
            .unwrap();
        let store = SettingsStore::new(path).unwrap();
        assert_eq!(store.beep().quiet_secs, 1.5);
        assert_eq!(store.beep().tick, ToneSpec::new(600, 30));
        assert_eq!(store.watch().config.keywords, vec!["Done"]);
        assert_eq!(store.watch().config.poll_secs, 0.8);
    }

    #[test]
    fn set_by_dotted_key() {
        let dir = tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.json")).unwrap();

        store.set("beep.masterVolumePct", "40").unwrap();
        store.set("beep.secondStopTone", "null").unwrap();
        store.set("watch.keywords", r#"["Regenerate"]"#).unwrap();
        store.set("watch.ocrLanguage", "eng").unwrap();

        let settings = store.snapshot();
        assert_eq!(settings.beep.master_volume_pct, 40);
        assert_eq!(settings.beep.second_stop_tone, None);
        assert_eq!(settings.watch.config.keywords, vec!["Regenerate"]);
        assert_eq!(settings.watch.ocr_language.as_deref(), Some("eng"));
    }

    #[test]
    fn set_rejects_unknown_keys_and_bad_values() {
        let dir = tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.json")).unwrap();
        assert!(store.set("beep.volume", "3").is_err());
        assert!(store.set("beep.masterVolumePct", "loud").is_err());
        assert_eq!(store.snapshot(), UserSettings::default());
    }

    #[test]
    fn reload_picks_up_external_edits() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let store = SettingsStore::new(path.clone()).unwrap();
        store.reset().unwrap();

        let other = SettingsStore::new(path).unwrap();
        other.set("beep.mute", "true").unwrap();

        assert!(!store.beep().mute);
        store.reload().unwrap();
        assert!(store.beep().mute);
    }

    #[test]
    fn effective_volume_combines_master_and_mute() {
        let mut beep = BeepSettings::default();
        assert_eq!(beep.tick_volume(), 30);
        assert_eq!(beep.stop_volume(), 42);

        beep.master_volume_pct = 100;
        beep.run_volume_pct = 100;
        assert_eq!(beep.tick_volume(), 100);

        beep.master_volume_pct = 250;
        assert_eq!(beep.tick_volume(), 100);

        beep.mute = true;
        assert_eq!(beep.tick_volume(), 0);
        assert_eq!(beep.stop_volume(), 0);
    }

    #[test]
    fn quiet_period_guards_bad_values() {
        let mut beep = BeepSettings::default();
        assert_eq!(beep.quiet_period(), Duration::from_secs(3));
        beep.quiet_secs = -1.0;
        assert_eq!(beep.quiet_period(), Duration::ZERO);
        beep.quiet_secs = f64::NAN;
        assert_eq!(beep.quiet_period(), Duration::ZERO);
        beep.quiet_secs = 1e20;
        assert_eq!(beep.quiet_period(), Duration::MAX);
        beep.quiet_secs = f64::INFINITY;
        assert_eq!(beep.quiet_period(), Duration::MAX);
    }
}
