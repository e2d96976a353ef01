use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const APP_NAME: &str = "danmaq";

const DEFAULT_STREAM_SERVER: &str = "http://dm.tuna.moe/";
const DEFAULT_CHANNEL: &str = "demo";

const DEFAULT_FONT_SIZE: f32 = 36.0;
const DEFAULT_LINE_SPACING: f32 = 1.2;
const DEFAULT_FLY_DURATION_SECS: f32 = 10.0;
const DEFAULT_FIXED_DURATION_SECS: f32 = 5.0;
const DEFAULT_SPEED_SCALE: f32 = 1.0;
const DEFAULT_MAX_LANES: usize = 12;
const DEFAULT_OPACITY: f32 = 1.0;

const MIN_DURATION_SECS: f32 = 0.5;
const MAX_DURATION_SECS: f32 = 600.0;

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_RETRY_DELAY_MS: u64 = 1000;
const DEFAULT_MIN_INTERVAL_MS: u64 = 200;
const MAX_REQUEST_TIMEOUT_SECS: u64 = 600;
const MAX_DELAY_MS: u64 = 60_000;

/// Everything persisted between runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DanmaqConfig {
    pub http_stream_server: String,
    pub display: DisplayPreferences,
    pub polling: PollingSettings,
}

impl Default for DanmaqConfig {
    fn default() -> Self {
        Self {
            http_stream_server: DEFAULT_STREAM_SERVER.to_string(),
            display: DisplayPreferences::default(),
            polling: PollingSettings::default(),
        }
    }
}

/// Rendering options applied to danmaku created after they change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayPreferences {
    pub font_size: f32,
    /// Lane height as a multiple of the font size.
    pub line_spacing: f32,
    pub fly_duration_secs: f32,
    pub fixed_duration_secs: f32,
    pub speed_scale: f32,
    pub max_lanes: usize,
    pub opacity: f32,
    pub outline: bool,
}

impl Default for DisplayPreferences {
    fn default() -> Self {
        Self {
            font_size: DEFAULT_FONT_SIZE,
            line_spacing: DEFAULT_LINE_SPACING,
            fly_duration_secs: DEFAULT_FLY_DURATION_SECS,
            fixed_duration_secs: DEFAULT_FIXED_DURATION_SECS,
            speed_scale: DEFAULT_SPEED_SCALE,
            max_lanes: DEFAULT_MAX_LANES,
            opacity: DEFAULT_OPACITY,
            outline: true,
        }
    }
}

impl DisplayPreferences {
    /// Replaces values the settings file may hold but rendering cannot use
    /// (non-finite numbers, zero lanes, absurd sizes).
    pub fn sanitized(self) -> Self {
        let defaults = Self::default();
        Self {
            font_size: finite_or(self.font_size, defaults.font_size).clamp(6.0, 200.0),
            line_spacing: finite_or(self.line_spacing, defaults.line_spacing).clamp(1.0, 3.0),
            fly_duration_secs: finite_or(self.fly_duration_secs, defaults.fly_duration_secs)
                .clamp(MIN_DURATION_SECS, MAX_DURATION_SECS),
            fixed_duration_secs: finite_or(self.fixed_duration_secs, defaults.fixed_duration_secs)
                .clamp(MIN_DURATION_SECS, MAX_DURATION_SECS),
            speed_scale: finite_or(self.speed_scale, defaults.speed_scale).clamp(0.1, 10.0),
            max_lanes: self.max_lanes.clamp(1, 100),
            opacity: finite_or(self.opacity, defaults.opacity).clamp(0.0, 1.0),
            outline: self.outline,
        }
    }

    /// How long a scrolling danmaku stays on screen.
    pub fn fly_duration(&self) -> Duration {
        let scale = finite_or(self.speed_scale, DEFAULT_SPEED_SCALE).clamp(0.1, 10.0);
        bounded_duration(self.fly_duration_secs / scale, DEFAULT_FLY_DURATION_SECS)
    }

    /// How long a top or bottom danmaku stays on screen.
    pub fn fixed_duration(&self) -> Duration {
        bounded_duration(self.fixed_duration_secs, DEFAULT_FIXED_DURATION_SECS)
    }

    pub fn lane_height(&self) -> f32 {
        self.font_size * self.line_spacing.max(1.0)
    }

    pub fn lanes(&self) -> usize {
        self.max_lanes.max(1)
    }
}

fn finite_or(value: f32, fallback: f32) -> f32 {
    if value.is_finite() {
        value
    } else {
        fallback
    }
}

fn bounded_duration(secs: f32, fallback_secs: f32) -> Duration {
    let secs = finite_or(secs, fallback_secs).clamp(MIN_DURATION_SECS, MAX_DURATION_SECS);
    Duration::try_from_secs_f32(secs).unwrap_or(Duration::from_secs_f32(fallback_secs))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingSettings {
    pub request_timeout_secs: u64,
    /// Wait after a failed or rejected request.
    pub retry_delay_ms: u64,
    /// Shortest time between the starts of two requests that got a 200.
    pub min_interval_ms: u64,
}

impl Default for PollingSettings {
    fn default() -> Self {
        Self {
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
            min_interval_ms: DEFAULT_MIN_INTERVAL_MS,
        }
    }
}

impl PollingSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.clamp(1, MAX_REQUEST_TIMEOUT_SECS))
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms.min(MAX_DELAY_MS))
    }

    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms.min(MAX_DELAY_MS))
    }
}

/// The values behind the connection form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionPreferences {
    pub server_url: String,
    pub channel: String,
    pub access_token: String,
    pub save_as_default: bool,
}

impl ConnectionPreferences {
    pub fn from_config(config: &DanmaqConfig) -> Self {
        Self {
            server_url: config.http_stream_server.clone(),
            channel: DEFAULT_CHANNEL.to_string(),
            access_token: String::new(),
            save_as_default: false,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.server_url.trim().is_empty() {
            bail!("Server URL is empty.");
        }
        if self.channel.trim().is_empty() {
            bail!("Channel name is empty.");
        }
        Ok(())
    }
}

/// Reads and writes [`DanmaqConfig`] through confy, either in the
/// per-user config directory or at an explicit path.
#[derive(Debug, Clone, Default)]
pub struct SettingsStore {
    path: Option<PathBuf>,
}

impl SettingsStore {
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn load(&self) -> Result<DanmaqConfig> {
        match &self.path {
            Some(path) => confy::load_path(path)
                .with_context(|| format!("Could not load settings from {}", path.display())),
            None => confy::load(APP_NAME, None).context("Could not load settings"),
        }
    }

    /// Loads the settings, falling back to defaults when they cannot be read.
    pub fn load_or_default(&self) -> DanmaqConfig {
        self.load().unwrap_or_else(|load_error| {
            tracing::error!("{load_error:#}. Falling back to default settings.");
            DanmaqConfig::default()
        })
    }

    pub fn store(&self, config: &DanmaqConfig) -> Result<()> {
        match &self.path {
            Some(path) => confy::store_path(path, config)
                .with_context(|| format!("Could not store settings to {}", path.display())),
            None => confy::store(APP_NAME, None, config).context("Could not store settings"),
        }
    }

    /// Re-reads the settings, applies `change` and writes them back.
    pub fn update(&self, change: impl FnOnce(&mut DanmaqConfig)) -> Result<()> {
        let mut config = self.load()?;
        change(&mut config);
        self.store(&config)
    }

    pub fn save_default_server(&self, server: &str) -> Result<()> {
        self.update(|config| config.http_stream_server = server.to_string())?;
        tracing::info!(server, "Saved default stream server.");
        Ok(())
    }

    pub fn save_display(&self, display: &DisplayPreferences) -> Result<()> {
        self.update(|config| config.display = display.clone())?;
        tracing::info!("Saved display preferences.");
        Ok(())
    }
}
