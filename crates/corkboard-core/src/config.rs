//! Engine tunables.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Lowest zoom factor the viewport accepts.
pub const MIN_ZOOM: f64 = 0.1;
/// Highest zoom factor the viewport accepts.
pub const MAX_ZOOM: f64 = 3.0;
/// Smallest scale a text-bearing entity can take.
pub const MIN_SCALE: f64 = 0.5;
/// Largest scale a text-bearing entity can take.
pub const MAX_SCALE: f64 = 3.0;

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Runtime configuration for an [`Engine`](crate::engine::Engine).
///
/// Every field has a default, so a partial JSON object is enough.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    pub min_zoom: f64,
    pub max_zoom: f64,
    /// Fractional zoom change per wheel notch.
    pub wheel_zoom_step: f64,
    /// Length of the animated "reset view" in milliseconds.
    pub reset_duration_ms: u64,
    /// Degrees of rotation per screen pixel of horizontal pointer travel.
    pub rotate_sensitivity: f64,
    /// Distance of the default pin from the top edge, in local units.
    pub default_pin_inset: f64,
    /// Color given to connections created locally.
    pub connection_color: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_zoom: MIN_ZOOM,
            max_zoom: MAX_ZOOM,
            wheel_zoom_step: 0.1,
            reset_duration_ms: 500,
            rotate_sensitivity: 0.5,
            default_pin_inset: 10.0,
            connection_color: "#c0392b".to_string(),
        }
    }
}

impl EngineConfig {
    /// Parse and validate a JSON configuration object.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_ZOOM..=MAX_ZOOM).contains(&self.min_zoom) {
            return Err(ConfigError::Invalid {
                field: "minZoom",
                reason: format!("must lie within [{}, {}]", MIN_ZOOM, MAX_ZOOM),
            });
        }
        if !(MIN_ZOOM..=MAX_ZOOM).contains(&self.max_zoom) {
            return Err(ConfigError::Invalid {
                field: "maxZoom",
                reason: format!("must lie within [{}, {}]", MIN_ZOOM, MAX_ZOOM),
            });
        }
        if self.min_zoom > self.max_zoom {
            return Err(ConfigError::Invalid {
                field: "minZoom",
                reason: format!("must not be above maxZoom ({})", self.max_zoom),
            });
        }
        if self.wheel_zoom_step <= 0.0 {
            return Err(ConfigError::Invalid {
                field: "wheelZoomStep",
                reason: "must be positive".to_string(),
            });
        }
        if self.default_pin_inset < 0.0 {
            return Err(ConfigError::Invalid {
                field: "defaultPinInset",
                reason: "must not be negative".to_string(),
            });
        }
        Ok(())
    }

    /// Reset animation length as a [`Duration`].
    pub fn reset_duration(&self) -> Duration {
        Duration::from_millis(self.reset_duration_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert!((config.min_zoom - 0.1).abs() < f64::EPSILON);
        assert!((config.max_zoom - 3.0).abs() < f64::EPSILON);
        assert!((config.rotate_sensitivity - 0.5).abs() < f64::EPSILON);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = EngineConfig::from_json(r#"{ "resetDurationMs": 250 }"#).unwrap();
        assert_eq!(config.reset_duration(), Duration::from_millis(250));
        assert!((config.default_pin_inset - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_rejects_inverted_zoom_range() {
        let err = EngineConfig::from_json(r#"{ "minZoom": 4.0, "maxZoom": 2.0 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "minZoom", .. }));
    }

    #[test]
    fn test_rejects_zoom_limits_outside_view_range() {
        let err = EngineConfig::from_json(r#"{ "minZoom": 0.01 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "minZoom", .. }));
        let err = EngineConfig::from_json(r#"{ "maxZoom": 8.0 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "maxZoom", .. }));
        assert!(EngineConfig::from_json(r#"{ "minZoom": 0.5, "maxZoom": 2.0 }"#).is_ok());
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(matches!(EngineConfig::from_json("not json"), Err(ConfigError::Parse(_))));
    }
}
