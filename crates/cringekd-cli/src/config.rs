use std::path::PathBuf;

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

/// Full runtime configuration loaded from TOML + env vars. Every value is a
/// default for the matching CLI flag; an explicit flag always wins.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub training: TrainingConfig,
    pub device: DeviceConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TrainingConfig {
    pub max_length: usize,
    pub batch_size: usize,
    pub epochs: usize,
    pub learning_rate: f64,
    /// KD temperature.
    pub temperature: f64,
    /// Weight for the KL component.
    pub alpha_kl: f64,
    /// Weight for the hard-label BCE component.
    pub alpha_ce: f64,
    /// Threshold for metrics reporting.
    pub positive_threshold: f32,
    pub seed: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeviceConfig {
    pub prefer_gpu: bool,
    pub cuda_device_id: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            training: TrainingConfig {
                max_length: 256,
                batch_size: 32,
                epochs: 3,
                learning_rate: 3e-5,
                temperature: 2.0,
                alpha_kl: 0.7,
                alpha_ce: 0.3,
                positive_threshold: 0.5,
                seed: 42,
            },
            device: DeviceConfig {
                prefer_gpu: true,
                cuda_device_id: 0,
            },
        }
    }
}

/// Load configuration from:
/// 1. Built-in defaults
/// 2. `config/default.toml` (if present)
/// 3. A custom config file path (if provided)
/// 4. Environment variables prefixed with `CRINGEKD_`
pub fn load_config(config_file: Option<&PathBuf>) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder()
        // Layer 1: defaults baked in
        .set_default("training.max_length", 256_i64)?
        .set_default("training.batch_size", 32_i64)?
        .set_default("training.epochs", 3_i64)?
        .set_default("training.learning_rate", 3e-5)?
        .set_default("training.temperature", 2.0)?
        .set_default("training.alpha_kl", 0.7)?
        .set_default("training.alpha_ce", 0.3)?
        .set_default("training.positive_threshold", 0.5)?
        .set_default("training.seed", 42_i64)?
        .set_default("device.prefer_gpu", true)?
        .set_default("device.cuda_device_id", 0_i64)?
        // Layer 2: project default.toml
        .add_source(File::with_name("config/default").required(false));

    // Layer 3: optional user-supplied config file
    if let Some(path) = config_file {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    // Layer 4: environment variables (CRINGEKD_TRAINING_EPOCHS, etc.)
    builder = builder.add_source(
        Environment::with_prefix("CRINGEKD")
            .separator("_")
            .try_parsing(true),
    );

    builder.build()?.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_argparse_era_values() {
        let cfg = load_config(None).unwrap();
        assert_eq!(cfg.training.max_length, 256);
        assert_eq!(cfg.training.batch_size, 32);
        assert_eq!(cfg.training.epochs, 3);
        assert!((cfg.training.learning_rate - 3e-5).abs() < f64::EPSILON);
        assert!((cfg.training.temperature - 2.0).abs() < f64::EPSILON);
        assert!((cfg.training.alpha_kl - 0.7).abs() < f64::EPSILON);
        assert!((cfg.training.alpha_ce - 0.3).abs() < f64::EPSILON);
        assert!((cfg.training.positive_threshold - 0.5).abs() < f32::EPSILON);
        assert_eq!(cfg.training.seed, 42);
    }

    #[test]
    fn test_default_device_config() {
        let cfg = load_config(None).unwrap();
        assert!(cfg.device.prefer_gpu);
        assert_eq!(cfg.device.cuda_device_id, 0);
    }

    #[test]
    fn test_custom_config_file_overrides_defaults() {
        let dir = std::env::temp_dir().join("cringekd_cfg_test");
        std::fs::create_dir_all(&dir).unwrap();
        let file = dir.join("custom.toml");
        std::fs::write(&file, "[training]\nepochs = 7\ntemperature = 4.0\n").unwrap();

        let cfg = load_config(Some(&file)).unwrap();
        assert_eq!(cfg.training.epochs, 7);
        assert!((cfg.training.temperature - 4.0).abs() < f64::EPSILON);
        // Untouched values keep their defaults.
        assert_eq!(cfg.training.batch_size, 32);

        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_app_config_default_matches_load_config() {
        let from_load = load_config(None).unwrap();
        let default = AppConfig::default();
        assert_eq!(from_load.training.epochs, default.training.epochs);
        assert_eq!(from_load.training.max_length, default.training.max_length);
        assert_eq!(from_load.device.prefer_gpu, default.device.prefer_gpu);
    }
}
