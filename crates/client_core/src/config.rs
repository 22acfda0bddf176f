use std::{fs, path::Path};

use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};
use shared::domain::LatLng;
use tracing::warn;
use url::Url;

pub const DEFAULT_CONFIG_FILE: &str = "locator.toml";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MapSettings {
    /// Center of the whole service area, shown when nothing is focused.
    pub default_center: LatLng,
    pub overview_zoom: u8,
    pub focused_zoom: u8,
}

impl Default for MapSettings {
    fn default() -> Self {
        Self {
            default_center: LatLng {
                lat: 14.0583,
                lng: 108.2772,
            },
            overview_zoom: 6,
            focused_zoom: 15,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClientSettings {
    pub api_url: String,
    pub collection: String,
    pub timeout_secs: u64,
    pub search_limit: u32,
    pub baseline_limit: u32,
    pub map: MapSettings,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8000".into(),
            collection: "entities".into(),
            timeout_secs: 10,
            search_limit: 50,
            baseline_limit: 1000,
            map: MapSettings::default(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileSettings {
    api_url: Option<String>,
    collection: Option<String>,
    timeout_secs: Option<u64>,
    search_limit: Option<u32>,
    baseline_limit: Option<u32>,
    map: Option<FileMapSettings>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileMapSettings {
    default_lat: Option<f64>,
    default_lng: Option<f64>,
    overview_zoom: Option<u8>,
    focused_zoom: Option<u8>,
}

/// Defaults, then `locator.toml` in the working directory, then environment.
pub fn load_settings() -> ClientSettings {
    let mut settings = ClientSettings::default();
    if let Ok(raw) = fs::read_to_string(DEFAULT_CONFIG_FILE) {
        if let Err(err) = apply_file(&mut settings, &raw) {
            warn!(error = %err, file = DEFAULT_CONFIG_FILE, "config: ignoring unreadable settings file");
        }
    }
    apply_env(&mut settings, |key| std::env::var(key).ok());
    settings
}

/// Like [`load_settings`] but with an explicit file that must exist and parse.
pub fn load_settings_from(path: &Path) -> anyhow::Result<ClientSettings> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read settings file '{}'", path.display()))?;
    let mut settings = ClientSettings::default();
    apply_file(&mut settings, &raw)
        .with_context(|| format!("invalid settings file '{}'", path.display()))?;
    apply_env(&mut settings, |key| std::env::var(key).ok());
    Ok(settings)
}

fn apply_file(settings: &mut ClientSettings, raw: &str) -> anyhow::Result<()> {
    let file: FileSettings = toml::from_str(raw)?;
    if let Some(v) = file.api_url {
        settings.api_url = v;
    }
    if let Some(v) = file.collection {
        settings.collection = v;
    }
    if let Some(v) = file.timeout_secs {
        settings.timeout_secs = v;
    }
    if let Some(v) = file.search_limit {
        settings.search_limit = v;
    }
    if let Some(v) = file.baseline_limit {
        settings.baseline_limit = v;
    }
    if let Some(map) = file.map {
        if let Some(v) = map.default_lat {
            settings.map.default_center.lat = v;
        }
        if let Some(v) = map.default_lng {
            settings.map.default_center.lng = v;
        }
        if let Some(v) = map.overview_zoom {
            settings.map.overview_zoom = v;
        }
        if let Some(v) = map.focused_zoom {
            settings.map.focused_zoom = v;
        }
    }
    Ok(())
}

fn apply_env(settings: &mut ClientSettings, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("LOCATOR_API_URL") {
        settings.api_url = v;
    }
    if let Some(v) = lookup("APP__API_URL") {
        settings.api_url = v;
    }
    if let Some(v) = lookup("APP__COLLECTION") {
        settings.collection = v;
    }
    if let Some(v) = lookup("APP__TIMEOUT_SECS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.timeout_secs = parsed;
        }
    }
    if let Some(v) = lookup("APP__SEARCH_LIMIT") {
        if let Ok(parsed) = v.parse::<u32>() {
            settings.search_limit = parsed;
        }
    }
    if let Some(v) = lookup("APP__BASELINE_LIMIT") {
        if let Ok(parsed) = v.parse::<u32>() {
            settings.baseline_limit = parsed;
        }
    }
}

impl ClientSettings {
    pub fn validate(&self) -> anyhow::Result<()> {
        let url = Url::parse(&self.api_url)
            .with_context(|| format!("invalid api url '{}'", self.api_url))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(anyhow!("api url must be http or https, got '{}'", url.scheme()));
        }
        if self.collection.trim_matches('/').is_empty() {
            return Err(anyhow!("collection path must not be empty"));
        }
        if self.timeout_secs == 0 {
            return Err(anyhow!("request timeout must be at least one second"));
        }
        if self.search_limit == 0 || self.baseline_limit == 0 {
            return Err(anyhow!("search and baseline limits must be positive"));
        }
        if self.map.focused_zoom <= self.map.overview_zoom {
            return Err(anyhow!(
                "focused zoom {} must be greater than overview zoom {}",
                self.map.focused_zoom,
                self.map.overview_zoom
            ));
        }
        self.map
            .default_center
            .validate()
            .context("invalid default map center")?;
        Ok(())
    }
}
