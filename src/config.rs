use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{backend::Backend, mask::uint_threshold, Error, Result};

/// Construction-time parameters of a shared dropout layer.
///
/// Deserializes from JSON such as
/// `{"dropout_ratio": 0.3, "scale_train": false, "backend": "parallel", "seed": 7}`.
/// `rate` is accepted as an alias for `dropout_ratio`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DropoutConfig {
    #[serde(alias = "rate")]
    pub dropout_ratio: f32,
    pub scale_train: bool,
    pub backend: Backend,
    pub seed: Option<u64>,
}

impl Default for DropoutConfig {
    fn default() -> Self {
        Self {
            dropout_ratio: 0.5,
            scale_train: true,
            backend: Backend::Cpu,
            seed: None,
        }
    }
}

impl DropoutConfig {
    pub fn new(dropout_ratio: f32, scale_train: bool) -> Self {
        Self {
            dropout_ratio,
            scale_train,
            ..Self::default()
        }
    }

    pub fn with_backend(mut self, backend: Backend) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Rejects ratios outside the open interval `(0, 1)`, NaN included.
    pub fn validate(&self) -> Result<()> {
        let ratio = self.dropout_ratio;
        if !(ratio > 0.0 && ratio < 1.0) || !self.scale().is_finite() {
            return Err(Error::InvalidRatio(ratio));
        }
        Ok(())
    }

    /// `1 / (1 - ratio)`.
    pub fn scale(&self) -> f32 {
        1.0 / (1.0 - self.dropout_ratio)
    }

    pub fn keep_probability(&self) -> f32 {
        1.0 - self.dropout_ratio
    }

    pub fn uint_threshold(&self) -> u32 {
        uint_threshold(self.dropout_ratio)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_scale_inverts_keep_probability() {
        for ratio in [0.01_f32, 0.1, 0.25, 0.5, 0.75, 0.9, 0.99] {
            let config = DropoutConfig::new(ratio, true);
            assert_abs_diff_eq!(config.scale() * config.keep_probability(), 1.0, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_validate_rejects_closed_bounds() {
        assert!(DropoutConfig::new(0.0, true).validate().is_err());
        assert!(DropoutConfig::new(1.0, true).validate().is_err());
        assert!(DropoutConfig::new(-0.2, true).validate().is_err());
        assert!(DropoutConfig::new(f32::NAN, true).validate().is_err());
        assert!(DropoutConfig::new(0.5, false).validate().is_ok());
    }

    #[test]
    fn test_defaults_from_empty_json() {
        let config = DropoutConfig::from_json_str("{}").unwrap();
        assert_eq!(config, DropoutConfig::default());
    }
}
