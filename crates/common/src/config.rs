//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{HeatlensError, HeatlensResult};

/// Global application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Capture tracker settings.
    pub tracker: TrackerConfig,

    /// Dashboard rendering defaults.
    pub engine: EngineDefaults,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Capture tracker settings.
///
/// Uses the host page's camelCase key names; every key is optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TrackerConfig {
    /// Ingestion endpoint path.
    pub endpoint: String,

    /// Ceiling for the reported session duration.
    pub session_timeout_ms: i64,

    /// Maximum records per flush.
    pub batch_size: usize,

    /// Period of the flush timer.
    pub flush_interval_ms: u64,

    /// Master switch for heatmap sample capture.
    pub enable_heatmap: bool,

    pub track_scrolling: bool,
    pub track_clicks: bool,
    pub track_mouse_movement: bool,
    pub track_form_inputs: bool,

    /// Emit a `page_view` event on init.
    pub track_page_views: bool,
}

/// Dashboard rendering defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineDefaults {
    /// Canvas size in pixels.
    pub canvas_width: u32,
    pub canvas_height: u32,

    /// Capture resolution assumed for samples without viewport metadata.
    pub reference_width: u32,
    pub reference_height: u32,

    /// Global heat-layer opacity.
    pub opacity: f64,

    /// Pointer hit radius in canvas pixels.
    pub hit_radius_px: f64,

    /// TrueType/OpenType font for PNG labels. Without one, raster output
    /// carries no text.
    pub font_path: Option<PathBuf>,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "heatlens=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            endpoint: "/api/analytics".to_string(),
            session_timeout_ms: 30 * 60 * 1000,
            batch_size: 50,
            flush_interval_ms: 10_000,
            enable_heatmap: true,
            track_scrolling: true,
            track_clicks: true,
            track_mouse_movement: true,
            track_form_inputs: true,
            track_page_views: true,
        }
    }
}

impl TrackerConfig {
    /// Reject values that would stall delivery.
    pub fn validate(&self) -> HeatlensResult<()> {
        if self.batch_size == 0 {
            return Err(HeatlensError::config("batchSize must be at least 1"));
        }
        if self.flush_interval_ms == 0 {
            return Err(HeatlensError::config("flushIntervalMs must be positive"));
        }
        if self.endpoint.trim().is_empty() {
            return Err(HeatlensError::config("endpoint must not be empty"));
        }
        Ok(())
    }
}

impl Default for EngineDefaults {
    fn default() -> Self {
        Self {
            canvas_width: 1200,
            canvas_height: 800,
            reference_width: 1920,
            reference_height: 1080,
            opacity: 0.7,
            hit_radius_px: 20.0,
            font_path: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        let config_path = config_file_path();
        if config_path.exists() {
            match Self::load_from(&config_path) {
                Ok(config) => return config,
                Err(e) => {
                    tracing::warn!(path = ?config_path, error = %e, "Ignoring unreadable config");
                }
            }
        }
        Self::default()
    }

    /// Load config from an explicit path.
    pub fn load_from(path: &std::path::Path) -> HeatlensResult<Self> {
        if !path.exists() {
            return Err(HeatlensError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.tracker.validate()?;
        Ok(config)
    }

    /// Save config to the standard location.
    pub fn save(&self) -> Result<(), std::io::Error> {
        let config_path = config_file_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(config_path, json)
    }
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("heatlens").join("config.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracker_config_accepts_partial_host_json() {
        let raw = r#"{"endpoint":"/api/heat","batchSize":2,"trackMouseMovement":false}"#;
        let config: TrackerConfig = serde_json::from_str(raw).unwrap();
        assert_eq!(config.endpoint, "/api/heat");
        assert_eq!(config.batch_size, 2);
        assert!(!config.track_mouse_movement);
        assert_eq!(config.flush_interval_ms, 10_000);
        assert!(config.track_clicks);
    }

    #[test]
    fn test_tracker_config_validation() {
        assert!(TrackerConfig::default().validate().is_ok());
        let bad = TrackerConfig {
            batch_size: 0,
            ..Default::default()
        };
        assert!(matches!(bad.validate(), Err(HeatlensError::Config { .. })));
    }

    #[test]
    fn test_load_from_rejects_invalid_tracker_settings() {
        let dir = std::env::temp_dir().join("heatlens_test_config");
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.json");
        std::fs::write(&path, r#"{"tracker":{"flushIntervalMs":0}}"#).unwrap();

        assert!(AppConfig::load_from(&path).is_err());

        std::fs::write(&path, r#"{"engine":{"opacity":0.5}}"#).unwrap();
        let config = AppConfig::load_from(&path).unwrap();
        assert!((config.engine.opacity - 0.5).abs() < 1e-9);
        assert_eq!(config.engine.reference_width, 1920);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_load_from_missing_file() {
        let path = std::env::temp_dir().join("heatlens_definitely_missing.json");
        assert!(matches!(
            AppConfig::load_from(&path),
            Err(HeatlensError::FileNotFound { .. })
        ));
    }
}
