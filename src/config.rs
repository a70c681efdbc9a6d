use anyhow::{Context, Result, bail};
use serde_valid::Validate;
use std::{env, sync::OnceLock, time::Duration};

/// Application configuration loaded and validated at startup
#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Device connection configuration
    pub device: DeviceConfig,

    /// Optional endpoints and endpoint variants of the firmware
    pub variant: DeviceVariant,

    /// Panel behavior configuration
    pub panel: PanelConfig,
}

#[derive(Clone, Debug)]
pub struct DeviceConfig {
    pub base_url: String,
    pub credentials: Option<Credentials>,
}

/// Fixed Basic-Auth credential sent with every request
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &"***")
            .finish()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TimeEndpoint {
    #[default]
    CurrentTime,
    GetTime,
}

impl TimeEndpoint {
    pub fn path(&self) -> &'static str {
        match self {
            TimeEndpoint::CurrentTime => "/current-time",
            TimeEndpoint::GetTime => "/get-time",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeviceVariant {
    pub time_endpoint: TimeEndpoint,
    pub regions: bool,
    pub sun_times: bool,
}

impl Default for DeviceVariant {
    fn default() -> Self {
        Self {
            time_endpoint: TimeEndpoint::CurrentTime,
            regions: true,
            sun_times: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Validate)]
pub struct PanelConfig {
    #[validate(min_length = 1)]
    pub preferred_region: String,
    #[validate(minimum = 100)]
    pub poll_interval_ms: u64,
    #[validate(minimum = 1)]
    #[validate(maximum = 16)]
    pub group_buttons: u16,
    /// Period of the full settings refresh, `0` disables it
    pub settings_refresh_ms: u64,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            preferred_region: "Europe/Kyiv".to_string(),
            poll_interval_ms: 1000,
            group_buttons: 5,
            settings_refresh_ms: 0,
        }
    }
}

impl PanelConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn settings_refresh(&self) -> Option<Duration> {
        (self.settings_refresh_ms > 0).then(|| Duration::from_millis(self.settings_refresh_ms))
    }
}

impl AppConfig {
    /// Get or load the application configuration
    ///
    /// # Panics
    /// Panics if configuration loading fails. Call [`AppConfig::load`] first
    /// to report configuration errors gracefully.
    pub fn get() -> &'static Self {
        Self::cell().get_or_init(|| {
            Self::from_lookup(&|key| env::var(key).ok())
                .expect("failed to load application configuration")
        })
    }

    /// Load, validate and cache the configuration from environment variables
    pub fn load() -> Result<&'static Self> {
        if let Some(config) = Self::cell().get() {
            return Ok(config);
        }

        let config = Self::from_lookup(&|key| env::var(key).ok())?;
        Ok(Self::cell().get_or_init(|| config))
    }

    /// Build a configuration from an arbitrary variable source
    pub fn from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> Result<Self> {
        let device = DeviceConfig::load(lookup)?;
        let variant = DeviceVariant::load(lookup)?;
        let panel = PanelConfig::load(lookup)?;

        Ok(Self {
            device,
            variant,
            panel,
        })
    }

    fn cell() -> &'static OnceLock<AppConfig> {
        static APP_CONFIG: OnceLock<AppConfig> = OnceLock::new();
        &APP_CONFIG
    }
}

impl DeviceConfig {
    fn load(lookup: &impl Fn(&str) -> Option<String>) -> Result<Self> {
        let base_url = lookup("DEVICE_URL")
            .unwrap_or_else(|| "http://192.168.4.1".to_string())
            .trim_end_matches('/')
            .to_string();

        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            bail!("failed to parse DEVICE_URL: expected http:// or https:// scheme");
        }

        let credentials = match (lookup("DEVICE_AUTH_USER"), lookup("DEVICE_AUTH_PASSWORD")) {
            (Some(user), Some(password)) => Some(Credentials { user, password }),
            (None, None) => None,
            _ => bail!(
                "failed to load device credentials: DEVICE_AUTH_USER and DEVICE_AUTH_PASSWORD must be set together"
            ),
        };

        Ok(Self {
            base_url,
            credentials,
        })
    }
}

impl DeviceVariant {
    fn load(lookup: &impl Fn(&str) -> Option<String>) -> Result<Self> {
        let time_endpoint = match lookup("DEVICE_TIME_ENDPOINT").as_deref() {
            None | Some("current-time") => TimeEndpoint::CurrentTime,
            Some("get-time") => TimeEndpoint::GetTime,
            Some(other) => bail!(
                "failed to parse DEVICE_TIME_ENDPOINT: {other:?} is neither current-time nor get-time"
            ),
        };

        Ok(Self {
            time_endpoint,
            regions: flag(lookup, "DEVICE_REGIONS", true)?,
            sun_times: flag(lookup, "DEVICE_SUN_TIMES", true)?,
        })
    }
}

impl PanelConfig {
    fn load(lookup: &impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let preferred_region = lookup("PREFERRED_REGION").unwrap_or(defaults.preferred_region);

        let poll_interval_ms = match lookup("POLL_INTERVAL_MS") {
            Some(value) => value
                .parse::<u64>()
                .context("failed to parse POLL_INTERVAL_MS: invalid format")?,
            None => defaults.poll_interval_ms,
        };

        let group_buttons = match lookup("GROUP_BUTTONS") {
            Some(value) => value
                .parse::<u16>()
                .context("failed to parse GROUP_BUTTONS: invalid format")?,
            None => defaults.group_buttons,
        };

        let settings_refresh_ms = match lookup("SETTINGS_REFRESH_MS") {
            Some(value) => value
                .parse::<u64>()
                .context("failed to parse SETTINGS_REFRESH_MS: invalid format")?,
            None => defaults.settings_refresh_ms,
        };

        let config = Self {
            preferred_region,
            poll_interval_ms,
            group_buttons,
            settings_refresh_ms,
        };
        config
            .validate()
            .context("panel configuration validation failed")?;

        Ok(config)
    }
}

fn flag(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: bool) -> Result<bool> {
    match lookup(key).as_deref().map(str::to_ascii_lowercase).as_deref() {
        None => Ok(default),
        Some("1" | "true" | "yes" | "on") => Ok(true),
        Some("0" | "false" | "no" | "off") => Ok(false),
        Some(other) => bail!("failed to parse {key}: {other:?} is not a boolean"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<AppConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(&|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_without_variables() {
        let config = load(&[]).expect("defaults are valid");

        assert_eq!(config.device.base_url, "http://192.168.4.1");
        assert_eq!(config.device.credentials, None);
        assert_eq!(config.variant, DeviceVariant::default());
        assert_eq!(config.panel, PanelConfig::default());
        assert_eq!(config.panel.poll_interval(), Duration::from_secs(1));
    }

    #[test]
    fn strips_trailing_slash_from_device_url() {
        let config = load(&[("DEVICE_URL", "http://stairs.local/")]).unwrap();
        assert_eq!(config.device.base_url, "http://stairs.local");
    }

    #[test]
    fn rejects_device_url_without_scheme() {
        assert!(load(&[("DEVICE_URL", "stairs.local")]).is_err());
    }

    #[test]
    fn credentials_require_user_and_password() {
        let config = load(&[
            ("DEVICE_AUTH_USER", "admin"),
            ("DEVICE_AUTH_PASSWORD", "secret"),
        ])
        .unwrap();
        assert_eq!(
            config.device.credentials,
            Some(Credentials {
                user: "admin".to_string(),
                password: "secret".to_string(),
            })
        );

        assert!(load(&[("DEVICE_AUTH_USER", "admin")]).is_err());
    }

    #[test]
    fn credentials_debug_hides_password() {
        let credentials = Credentials {
            user: "admin".to_string(),
            password: "secret".to_string(),
        };
        assert!(!format!("{credentials:?}").contains("secret"));
    }

    #[test]
    fn parses_device_variant() {
        let config = load(&[
            ("DEVICE_TIME_ENDPOINT", "get-time"),
            ("DEVICE_REGIONS", "false"),
            ("DEVICE_SUN_TIMES", "0"),
        ])
        .unwrap();

        assert_eq!(config.variant.time_endpoint, TimeEndpoint::GetTime);
        assert_eq!(config.variant.time_endpoint.path(), "/get-time");
        assert!(!config.variant.regions);
        assert!(!config.variant.sun_times);
    }

    #[test]
    fn rejects_unknown_time_endpoint() {
        assert!(load(&[("DEVICE_TIME_ENDPOINT", "clock")]).is_err());
    }

    #[test]
    fn rejects_invalid_flag() {
        let err = load(&[("DEVICE_REGIONS", "maybe")]).unwrap_err();
        assert!(err.to_string().contains("DEVICE_REGIONS"));
    }

    #[test]
    fn rejects_too_short_poll_interval() {
        assert!(load(&[("POLL_INTERVAL_MS", "10")]).is_err());
        assert!(load(&[("POLL_INTERVAL_MS", "fast")]).is_err());
    }

    #[test]
    fn validates_group_button_count() {
        assert!(load(&[("GROUP_BUTTONS", "0")]).is_err());
        assert!(load(&[("GROUP_BUTTONS", "17")]).is_err());
        assert_eq!(load(&[("GROUP_BUTTONS", "8")]).unwrap().panel.group_buttons, 8);
    }

    #[test]
    fn settings_refresh_is_disabled_by_default() {
        assert_eq!(load(&[]).unwrap().panel.settings_refresh(), None);
        assert_eq!(
            load(&[("SETTINGS_REFRESH_MS", "30000")])
                .unwrap()
                .panel
                .settings_refresh(),
            Some(Duration::from_secs(30))
        );
    }
}
