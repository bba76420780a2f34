use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    pub filter: FilterConfig,
    pub predictor: PredictorConfig,
    pub calibration: CalibrationConfig,
    pub gesture: GestureConfig,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub min_cutoff: f32,
    pub beta: f32,
    pub d_cutoff: f32,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            min_cutoff: 1.5,
            beta: 0.4,
            d_cutoff: 1.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictorConfig {
    pub max_velocity: f32,
    pub velocity_smoothing: f32,
    pub lookahead_ms: f32,
    pub max_extrapolation_ms: f32,
    pub min_update_interval_ms: f32,
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            max_velocity: 3.0,
            velocity_smoothing: 0.35,
            lookahead_ms: 65.0,
            max_extrapolation_ms: 150.0,
            min_update_interval_ms: 5.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    pub inside_margin: f32,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            inside_margin: 0.04,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GestureConfig {
    pub match_threshold: f32,
    pub extended_threshold: f32,
    pub curled_threshold: f32,
    pub confirm_frames: u32,
    pub release_frames: u32,
    pub labels: GestureLabels,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            match_threshold: 0.88,
            extended_threshold: 1.18,
            curled_threshold: 1.22,
            confirm_frames: 4,
            release_frames: 18,
            labels: GestureLabels::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GestureLabels {
    pub open_hand: String,
    pub two_finger: String,
    pub single_finger: String,
}

impl Default for GestureLabels {
    fn default() -> Self {
        Self {
            open_hand: "erase".to_string(),
            two_finger: "draw".to_string(),
            single_finger: "pointing".to_string(),
        }
    }
}

impl TrackingConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_json_str(&text).map_err(|err| match err {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.display().to_string(),
                source,
            },
            other => other,
        })?;
        log::info!("loaded tracking config from {}", path.display());
        Ok(config)
    }

    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text).map_err(|source| ConfigError::Parse {
            path: "<inline>".to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let f = &self.filter;
        if !(f.min_cutoff > 0.0 && f.d_cutoff > 0.0) || f.beta < 0.0 {
            return Err(ConfigError::Invalid(
                "filter cutoffs must be positive and beta non-negative".into(),
            ));
        }
        let p = &self.predictor;
        if p.max_velocity < 0.0 || !(0.0..=1.0).contains(&p.velocity_smoothing) {
            return Err(ConfigError::Invalid(
                "predictor max_velocity must be non-negative and smoothing within [0, 1]".into(),
            ));
        }
        if p.lookahead_ms < 0.0 || p.max_extrapolation_ms < 0.0 || p.min_update_interval_ms < 0.0
        {
            return Err(ConfigError::Invalid(
                "predictor intervals must be non-negative".into(),
            ));
        }
        if self.calibration.inside_margin < 0.0 {
            return Err(ConfigError::Invalid(
                "calibration inside_margin must be non-negative".into(),
            ));
        }
        let g = &self.gesture;
        if g.confirm_frames == 0 || g.release_frames == 0 {
            return Err(ConfigError::Invalid(
                "gesture confirm/release frame counts must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
