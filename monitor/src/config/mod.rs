//! Configuration management: defaults, validation, loading from the environment.

pub mod app_config;
pub mod defaults;
pub mod validation;

pub use app_config::AppConfig;

use serde::Serialize;

use defaults::{DEFAULT_SETTINGS, keys};

/// A setting as reported at startup. Secret values are masked.
#[derive(Debug, Clone, Serialize)]
pub struct SettingInfo {
    pub key: &'static str,
    pub value: String,
    pub description: &'static str,
    /// `true` when the value came from the environment rather than the default.
    pub overridden: bool,
}

/// Effective value of every known setting, in declaration order.
pub fn settings_summary<F>(lookup: F) -> Vec<SettingInfo>
where
    F: Fn(&str) -> Option<String>,
{
    keys()
        .filter_map(|key| DEFAULT_SETTINGS.get(key))
        .map(|def| {
            let raw = lookup(def.key);
            let overridden = raw.is_some();
            let value = raw.unwrap_or_else(|| def.default.to_string());
            let value = if def.secret && !value.is_empty() {
                "***".to_string()
            } else {
                value
            };
            SettingInfo {
                key: def.key,
                value,
                description: def.description,
                overridden,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_masks_secrets_and_flags_overrides() {
        let summary = settings_summary(|key| (key == "IRC_CHANNELS").then(|| "shroud".to_string()));
        assert_eq!(summary.first().map(|s| s.key), Some("IRC_URL"));

        let pass = summary.iter().find(|s| s.key == "IRC_PASS").unwrap();
        assert_eq!(pass.value, "***");
        assert!(!pass.overridden);

        let channels = summary.iter().find(|s| s.key == "IRC_CHANNELS").unwrap();
        assert_eq!(channels.value, "shroud");
        assert!(channels.overridden);
    }
}
