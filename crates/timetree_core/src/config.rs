//! Runtime settings for the request layer and logging.
//!
//! # Invariants
//! - Unset fields fall back to Day resolution, UTC and the build-mode level.
//! - Settings are plain data; nothing here touches the database.

use crate::logging::default_log_level;
use crate::model::resolution::Resolution;
use crate::model::time::{TimeResult, TimezoneId};
use serde::{Deserialize, Serialize};

pub const ENV_DEFAULT_RESOLUTION: &str = "TIMETREE_DEFAULT_RESOLUTION";
pub const ENV_DEFAULT_TIMEZONE: &str = "TIMETREE_DEFAULT_TIMEZONE";
pub const ENV_LOG_LEVEL: &str = "TIMETREE_LOG_LEVEL";

/// Defaults applied to requests that omit resolution or timezone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeTreeSettings {
    pub default_resolution: Resolution,
    pub default_timezone: TimezoneId,
    pub log_level: String,
}

impl Default for TimeTreeSettings {
    fn default() -> Self {
        Self {
            default_resolution: Resolution::Day,
            default_timezone: TimezoneId::utc(),
            log_level: default_log_level().to_string(),
        }
    }
}

impl TimeTreeSettings {
    /// Reads overrides from `TIMETREE_*` environment variables.
    ///
    /// # Errors
    /// - Returns an error when a variable holds an unknown resolution or
    ///   timezone name.
    pub fn from_env() -> TimeResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> TimeResult<Self> {
        let mut settings = Self::default();
        if let Some(value) = lookup(ENV_DEFAULT_RESOLUTION) {
            settings.default_resolution = value.parse()?;
        }
        if let Some(value) = lookup(ENV_DEFAULT_TIMEZONE) {
            settings.default_timezone = TimezoneId::parse(&value)?;
        }
        if let Some(value) = lookup(ENV_LOG_LEVEL) {
            settings.log_level = value;
        }
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::{TimeTreeSettings, ENV_DEFAULT_RESOLUTION, ENV_DEFAULT_TIMEZONE};
    use crate::model::resolution::Resolution;
    use crate::model::time::TimezoneId;

    #[test]
    fn defaults_are_day_and_utc() {
        let settings = TimeTreeSettings::default();
        assert_eq!(settings.default_resolution, Resolution::Day);
        assert_eq!(settings.default_timezone, TimezoneId::utc());
    }

    #[test]
    fn lookup_overrides_defaults() {
        let settings = TimeTreeSettings::from_lookup(|key| match key {
            ENV_DEFAULT_RESOLUTION => Some("Hour".to_string()),
            ENV_DEFAULT_TIMEZONE => Some("Europe/Prague".to_string()),
            _ => None,
        })
        .unwrap();
        assert_eq!(settings.default_resolution, Resolution::Hour);
        assert_eq!(settings.default_timezone.name(), "Europe/Prague");
    }

    #[test]
    fn lookup_rejects_unknown_timezone() {
        let result = TimeTreeSettings::from_lookup(|key| {
            (key == ENV_DEFAULT_TIMEZONE).then(|| "Nowhere/Land".to_string())
        });
        assert!(result.is_err());
    }

    #[test]
    fn deserializes_partial_settings() {
        let settings: TimeTreeSettings =
            serde_json::from_str(r#"{"default_timezone":"Asia/Tokyo"}"#).unwrap();
        assert_eq!(settings.default_resolution, Resolution::Day);
        assert_eq!(settings.default_timezone.name(), "Asia/Tokyo");
    }
}
