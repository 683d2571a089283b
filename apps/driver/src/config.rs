use std::{fs, path::Path, time::Duration};

use anyhow::{anyhow, Context};
use courier_core::route::{
    DirectionsConfig, DEFAULT_DIRECTIONS_BASE_URL, DEFAULT_DIRECTIONS_PROFILE,
};
use serde::Deserialize;
use shared::domain::GeoPoint;
use tracing::warn;

pub const SETTINGS_FILE: &str = "driver.toml";

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub directions_base_url: String,
    pub directions_profile: String,
    pub mapbox_access_token: Option<String>,
    pub request_timeout_seconds: u64,
    pub orders_path: String,
    /// `lon,lat`
    pub driver_position: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            directions_base_url: DEFAULT_DIRECTIONS_BASE_URL.into(),
            directions_profile: DEFAULT_DIRECTIONS_PROFILE.into(),
            mapbox_access_token: None,
            request_timeout_seconds: 10,
            orders_path: "data/orders.json".into(),
            driver_position: "38.74776,9.047".into(),
        }
    }
}

impl Settings {
    pub fn directions_config(&self) -> DirectionsConfig {
        DirectionsConfig {
            base_url: normalize_base_url(&self.directions_base_url),
            profile: self.directions_profile.trim().to_string(),
            access_token: self
                .mapbox_access_token
                .as_deref()
                .map(str::trim)
                .filter(|token| !token.is_empty())
                .map(str::to_string),
            timeout: Duration::from_secs(self.request_timeout_seconds.max(1)),
        }
    }

    pub fn driver_position(&self) -> anyhow::Result<GeoPoint> {
        parse_position(&self.driver_position)
            .with_context(|| format!("invalid driver_position '{}'", self.driver_position))
    }
}

/// Keys accepted in `driver.toml`; anything else is ignored.
#[derive(Debug, Deserialize)]
struct SettingsFile {
    directions_base_url: Option<String>,
    directions_profile: Option<String>,
    mapbox_access_token: Option<String>,
    request_timeout_seconds: Option<Seconds>,
    orders_path: Option<String>,
    driver_position: Option<String>,
}

/// `3` and `"3"` are both accepted.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Seconds {
    Number(u64),
    Text(String),
}

impl SettingsFile {
    fn apply(self, settings: &mut Settings) {
        if let Some(v) = self.directions_base_url {
            settings.directions_base_url = v;
        }
        if let Some(v) = self.directions_profile {
            settings.directions_profile = v;
        }
        if let Some(v) = self.mapbox_access_token {
            settings.mapbox_access_token = Some(v);
        }
        match self.request_timeout_seconds {
            Some(Seconds::Number(parsed)) => settings.request_timeout_seconds = parsed,
            Some(Seconds::Text(v)) => match v.trim().parse::<u64>() {
                Ok(parsed) => settings.request_timeout_seconds = parsed,
                Err(_) => warn!(value = %v, "ignoring invalid request_timeout_seconds"),
            },
            None => {}
        }
        if let Some(v) = self.orders_path {
            settings.orders_path = v;
        }
        if let Some(v) = self.driver_position {
            settings.driver_position = v;
        }
    }
}

pub fn load_settings() -> Settings {
    load_settings_from(Path::new(SETTINGS_FILE), |key| std::env::var(key).ok())
}

/// Defaults, then the settings file (if readable), then the environment.
pub fn load_settings_from(path: &Path, env: impl Fn(&str) -> Option<String>) -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(path) {
        match toml::from_str::<SettingsFile>(&raw) {
            Ok(file_cfg) => file_cfg.apply(&mut settings),
            Err(err) => warn!(path = %path.display(), %err, "ignoring unreadable settings file"),
        }
    }

    if let Some(v) = env("MAPBOX_ACCESS_TOKEN") {
        settings.mapbox_access_token = Some(v);
    }
    if let Some(v) = env("APP__DIRECTIONS_BASE_URL") {
        settings.directions_base_url = v;
    }
    if let Some(v) = env("APP__DIRECTIONS_PROFILE") {
        settings.directions_profile = v;
    }
    if let Some(v) = env("APP__REQUEST_TIMEOUT_SECONDS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.request_timeout_seconds = parsed;
        }
    }
    if let Some(v) = env("APP__ORDERS_PATH") {
        settings.orders_path = v;
    }
    if let Some(v) = env("APP__DRIVER_POSITION") {
        settings.driver_position = v;
    }

    settings
}

pub fn normalize_base_url(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return DEFAULT_DIRECTIONS_BASE_URL.to_string();
    }
    trimmed.to_string()
}

/// Parses `lon,lat`.
pub fn parse_position(raw: &str) -> anyhow::Result<GeoPoint> {
    let (lon, lat) = raw
        .split_once(',')
        .ok_or_else(|| anyhow!("expected 'longitude,latitude', got '{raw}'"))?;
    let longitude = lon
        .trim()
        .parse::<f64>()
        .with_context(|| format!("invalid longitude '{}'", lon.trim()))?;
    let latitude = lat
        .trim()
        .parse::<f64>()
        .with_context(|| format!("invalid latitude '{}'", lat.trim()))?;
    Ok(GeoPoint::new(longitude, latitude)?)
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
