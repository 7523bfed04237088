//! Runtime settings: display timezone, data-source timeouts, visibility policy.
//!
//! Loaded from an optional TOML file, overridden by `APCAL_*` environment
//! variables (`__` separates nested keys, e.g. `APCAL_VISIBILITY__AUDIENCE`).

use std::path::Path;
use std::time::Duration;

use chrono::Weekday;
use chrono_tz::Tz;
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;

use crate::error::{CalendarError, Result};
use crate::visibility::VisibilityPolicy;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// IANA name of the zone calendar dates are computed in.
    pub timezone: String,
    pub fetch_timeout_secs: u64,
    pub bulk_delete_timeout_secs: u64,
    pub week_start: Weekday,
    pub visibility: VisibilityPolicy,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            timezone: "UTC".to_string(),
            fetch_timeout_secs: 60,
            bulk_delete_timeout_secs: 60,
            week_start: Weekday::Mon,
            visibility: VisibilityPolicy::default(),
        }
    }
}

impl Settings {
    /// Load settings from `path` (if given) layered under the environment.
    ///
    /// # Errors
    /// Returns `CalendarError::Config` if the file cannot be read or a value
    /// has the wrong type.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml));
        }
        let settings = builder
            .add_source(
                Environment::with_prefix("APCAL")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }

    /// Parse from TOML text, without consulting the environment.
    pub fn from_toml(text: &str) -> Result<Self> {
        let settings = Config::builder()
            .add_source(File::from_str(text, FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }

    pub fn timezone(&self) -> Result<Tz> {
        self.timezone
            .parse()
            .map_err(|_| CalendarError::InvalidTimezone(self.timezone.clone()))
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn bulk_delete_timeout(&self) -> Duration {
        Duration::from_secs(self.bulk_delete_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::visibility::Audience;

    #[test]
    fn empty_document_yields_defaults() {
        let settings = Settings::from_toml("").unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.fetch_timeout(), Duration::from_secs(60));
    }

    #[test]
    fn nested_visibility_overrides() {
        let settings = Settings::from_toml(
            r#"
            timezone = "Asia/Vladivostok"
            week_start = "Sun"

            [visibility]
            audience = "everyone"
            declined_visible_to_members = true
            "#,
        )
        .unwrap();

        assert_eq!(settings.timezone().unwrap(), chrono_tz::Asia::Vladivostok);
        assert_eq!(settings.week_start, Weekday::Sun);
        assert_eq!(settings.visibility.audience, Audience::Everyone);
        assert!(settings.visibility.declined_visible_to_members);
        assert!(settings.visibility.pending_visible_to_members);
    }

    #[test]
    fn unknown_timezone_rejected() {
        let settings = Settings {
            timezone: "Mars/Olympus".to_string(),
            ..Settings::default()
        };
        assert!(matches!(
            settings.timezone(),
            Err(CalendarError::InvalidTimezone(name)) if name == "Mars/Olympus"
        ));
    }
}
