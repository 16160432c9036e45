//! Configuration management
//!
//! settings.json format:
//! ```json
//! {
//!   "app": {
//!     "demoMode": false,
//!     "roundSeconds": 30,
//!     "tapReward": "1",
//!     "welcomeBonus": "100",
//!     "referralBonus": "250"
//!   }
//! }
//! ```
//!
//! Amounts are JSON strings so they stay exact.

use std::collections::HashMap;
use std::path::Path;

use anyhow::Result;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

const DEFAULT_ROUND_SECONDS: u64 = 30;

fn default_tap_reward() -> Decimal {
    Decimal::ONE
}

fn default_welcome_bonus() -> Decimal {
    Decimal::from(100)
}

fn default_referral_bonus() -> Decimal {
    Decimal::from(250)
}

/// Raw settings.json structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsFile {
    #[serde(default)]
    app: AppSettings,
    // Preserve sections this build does not know about
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppSettings {
    #[serde(default)]
    demo_mode: bool,
    #[serde(default)]
    round_seconds: Option<u64>,
    #[serde(default)]
    tap_reward: Option<Decimal>,
    #[serde(default)]
    welcome_bonus: Option<Decimal>,
    #[serde(default)]
    referral_bonus: Option<Decimal>,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

/// Kointap configuration (resolved view of settings)
#[derive(Debug, Clone)]
pub struct Config {
    pub demo_mode: bool,
    /// Length of a tap round in seconds
    pub round_seconds: u64,
    /// KTC earned per unboosted tap
    pub tap_reward: Decimal,
    /// Credited to a new account when its referral code resolves
    pub welcome_bonus: Decimal,
    /// Credited to the referrer on a successful referred signup
    pub referral_bonus: Decimal,
    // Keep the raw settings for preservation when saving
    _raw_settings: SettingsFile,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            demo_mode: false,
            round_seconds: DEFAULT_ROUND_SECONDS,
            tap_reward: default_tap_reward(),
            welcome_bonus: default_welcome_bonus(),
            referral_bonus: default_referral_bonus(),
            _raw_settings: SettingsFile::default(),
        }
    }
}

impl Config {
    /// Load config from the data directory
    ///
    /// Demo mode can be enabled via:
    /// 1. Settings file (ktc demo on)
    /// 2. Environment variable KOINTAP_DEMO_MODE (for CI/testing)
    pub fn load(data_dir: &Path) -> Result<Self> {
        let settings_path = data_dir.join("settings.json");

        let raw: SettingsFile = if settings_path.exists() {
            let content = std::fs::read_to_string(&settings_path)?;
            serde_json::from_str(&content).unwrap_or_default()
        } else {
            SettingsFile::default()
        };

        // Check env var for demo mode override (for CI/testing)
        let demo_mode = match std::env::var("KOINTAP_DEMO_MODE").ok().as_deref() {
            Some("true" | "1" | "yes" | "TRUE" | "YES") => true,
            Some("false" | "0" | "no" | "FALSE" | "NO") => false,
            _ => raw.app.demo_mode,
        };

        Ok(Self {
            demo_mode,
            round_seconds: raw.app.round_seconds.unwrap_or(DEFAULT_ROUND_SECONDS),
            tap_reward: raw.app.tap_reward.unwrap_or_else(default_tap_reward),
            welcome_bonus: raw.app.welcome_bonus.unwrap_or_else(default_welcome_bonus),
            referral_bonus: raw.app.referral_bonus.unwrap_or_else(default_referral_bonus),
            _raw_settings: raw,
        })
    }

    /// Save config to the data directory.
    /// Preserves settings that this build doesn't manage.
    pub fn save(&self, data_dir: &Path) -> Result<()> {
        let settings_path = data_dir.join("settings.json");

        // Load existing settings to preserve fields we don't manage
        let mut settings = if settings_path.exists() {
            let content = std::fs::read_to_string(&settings_path)?;
            serde_json::from_str::<SettingsFile>(&content).unwrap_or_default()
        } else {
            SettingsFile::default()
        };

        // Update only the fields we manage
        settings.app.demo_mode = self.demo_mode;

        let content = serde_json::to_string_pretty(&settings)?;
        std::fs::write(&settings_path, content)?;
        Ok(())
    }

    /// Enable demo mode
    pub fn enable_demo_mode(&mut self) {
        self.demo_mode = true;
    }

    /// Disable demo mode
    pub fn disable_demo_mode(&mut self) {
        self.demo_mode = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_when_file_missing() {
        let dir = tempdir().unwrap();
        let config = Config::load(dir.path()).unwrap();

        assert!(!config.demo_mode);
        assert_eq!(config.round_seconds, 30);
        assert_eq!(config.tap_reward, Decimal::ONE);
        assert_eq!(config.welcome_bonus, Decimal::from(100));
        assert_eq!(config.referral_bonus, Decimal::from(250));
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempdir().unwrap();

        let mut config = Config::load(dir.path()).unwrap();
        config.enable_demo_mode();
        config.save(dir.path()).unwrap();

        let reloaded = Config::load(dir.path()).unwrap();
        assert!(reloaded.demo_mode);
    }

    #[test]
    fn test_unmanaged_settings_preserved() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("settings.json"),
            r#"{
                "app": { "demoMode": false, "roundSeconds": 10, "theme": "dark" },
                "desktop": { "windowWidth": 900 }
            }"#,
        )
        .unwrap();

        let mut config = Config::load(dir.path()).unwrap();
        assert_eq!(config.round_seconds, 10);
        config.enable_demo_mode();
        config.save(dir.path()).unwrap();

        let content = std::fs::read_to_string(dir.path().join("settings.json")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(value["app"]["demoMode"], true);
        assert_eq!(value["app"]["roundSeconds"], 10);
        assert_eq!(value["app"]["theme"], "dark");
        assert_eq!(value["desktop"]["windowWidth"], 900);
    }

    #[test]
    fn test_amounts_parse_from_strings() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("settings.json"),
            r#"{ "app": { "tapReward": "0.5", "welcomeBonus": "150" } }"#,
        )
        .unwrap();

        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.tap_reward, Decimal::new(5, 1));
        assert_eq!(config.welcome_bonus, Decimal::from(150));
    }
}
