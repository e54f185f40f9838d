use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::camera::{CameraConfig, CameraFacing};

const DEFAULT_ATTEMPT_ID: &str = "attempt:local";
const DEFAULT_TEST_TIME_MINUTES: u32 = 30;
const DEFAULT_CAMERA_SOURCE: &str = "stub://candidate";
const DEFAULT_CAMERA_WIDTH: u32 = 320;
const DEFAULT_CAMERA_HEIGHT: u32 = 240;
const DEFAULT_ACQUISITION_DELAY_MS: u64 = 1500;
const DEFAULT_CHECK_INTERVAL_SECS: u64 = 60;
const DEFAULT_CHECK_PROBABILITY: f64 = 0.1;

#[derive(Debug, Deserialize, Default)]
struct ProctorConfigFile {
    attempt_id: Option<String>,
    test_time_minutes: Option<u32>,
    camera: Option<CameraConfigFile>,
    acquisition_delay_ms: Option<u64>,
    check: Option<CheckConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct CameraConfigFile {
    source: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    facing: Option<CameraFacing>,
}

#[derive(Debug, Deserialize, Default)]
struct CheckConfigFile {
    interval_secs: Option<u64>,
    probability: Option<f64>,
    seed: Option<u64>,
}

/// Configuration for one proctoring session.
///
/// `test_time_minutes` comes from the external test-metadata source; the rest
/// tunes the kernel itself.
#[derive(Debug, Clone)]
pub struct ProctorConfig {
    pub attempt_id: String,
    pub test_time_minutes: u32,
    pub camera: CameraConfig,
    /// Delay before the first automatic camera acquisition.
    pub acquisition_delay: Duration,
    /// Cadence of the periodic simulated check.
    pub check_interval: Duration,
    /// Per-tick probability of the simulated check emitting a violation.
    pub check_probability: f64,
    /// Fixed RNG seed for the simulated check; entropy when absent.
    pub check_seed: Option<u64>,
}

impl Default for ProctorConfig {
    fn default() -> Self {
        Self {
            attempt_id: DEFAULT_ATTEMPT_ID.to_string(),
            test_time_minutes: DEFAULT_TEST_TIME_MINUTES,
            camera: CameraConfig::default(),
            acquisition_delay: Duration::from_millis(DEFAULT_ACQUISITION_DELAY_MS),
            check_interval: Duration::from_secs(DEFAULT_CHECK_INTERVAL_SECS),
            check_probability: DEFAULT_CHECK_PROBABILITY,
            check_seed: None,
        }
    }
}

impl ProctorConfig {
    /// Load from the `PROCTOR_CONFIG` file (when set) and apply `PROCTOR_*`
    /// env overrides, then validate.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("PROCTOR_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        cfg.attempt_id = cfg.attempt_id.to_lowercase();
        Ok(cfg)
    }

    fn from_file(file: ProctorConfigFile) -> Self {
        let camera = CameraConfig {
            source: file
                .camera
                .as_ref()
                .and_then(|camera| camera.source.clone())
                .unwrap_or_else(|| DEFAULT_CAMERA_SOURCE.to_string()),
            width: file
                .camera
                .as_ref()
                .and_then(|camera| camera.width)
                .unwrap_or(DEFAULT_CAMERA_WIDTH),
            height: file
                .camera
                .as_ref()
                .and_then(|camera| camera.height)
                .unwrap_or(DEFAULT_CAMERA_HEIGHT),
            facing: file
                .camera
                .as_ref()
                .and_then(|camera| camera.facing)
                .unwrap_or_default(),
        };
        Self {
            attempt_id: file
                .attempt_id
                .unwrap_or_else(|| DEFAULT_ATTEMPT_ID.to_string()),
            test_time_minutes: file.test_time_minutes.unwrap_or(DEFAULT_TEST_TIME_MINUTES),
            camera,
            acquisition_delay: Duration::from_millis(
                file.acquisition_delay_ms
                    .unwrap_or(DEFAULT_ACQUISITION_DELAY_MS),
            ),
            check_interval: Duration::from_secs(
                file.check
                    .as_ref()
                    .and_then(|check| check.interval_secs)
                    .unwrap_or(DEFAULT_CHECK_INTERVAL_SECS),
            ),
            check_probability: file
                .check
                .as_ref()
                .and_then(|check| check.probability)
                .unwrap_or(DEFAULT_CHECK_PROBABILITY),
            check_seed: file.check.and_then(|check| check.seed),
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(id) = std::env::var("PROCTOR_ATTEMPT_ID") {
            if !id.trim().is_empty() {
                self.attempt_id = id;
            }
        }
        if let Ok(minutes) = std::env::var("PROCTOR_TEST_TIME_MINUTES") {
            self.test_time_minutes = minutes
                .parse()
                .map_err(|_| anyhow!("PROCTOR_TEST_TIME_MINUTES must be an integer"))?;
        }
        if let Ok(source) = std::env::var("PROCTOR_CAMERA_SOURCE") {
            if !source.trim().is_empty() {
                self.camera.source = source;
            }
        }
        if let Ok(facing) = std::env::var("PROCTOR_CAMERA_FACING") {
            if !facing.trim().is_empty() {
                self.camera.facing = facing.parse()?;
            }
        }
        if let Ok(delay) = std::env::var("PROCTOR_ACQUISITION_DELAY_MS") {
            let ms: u64 = delay
                .parse()
                .map_err(|_| anyhow!("PROCTOR_ACQUISITION_DELAY_MS must be an integer"))?;
            self.acquisition_delay = Duration::from_millis(ms);
        }
        if let Ok(interval) = std::env::var("PROCTOR_CHECK_INTERVAL_SECS") {
            let secs: u64 = interval
                .parse()
                .map_err(|_| anyhow!("PROCTOR_CHECK_INTERVAL_SECS must be an integer"))?;
            self.check_interval = Duration::from_secs(secs);
        }
        if let Ok(probability) = std::env::var("PROCTOR_CHECK_PROBABILITY") {
            self.check_probability = probability
                .parse()
                .map_err(|_| anyhow!("PROCTOR_CHECK_PROBABILITY must be a number"))?;
        }
        if let Ok(seed) = std::env::var("PROCTOR_CHECK_SEED") {
            self.check_seed = Some(
                seed.parse()
                    .map_err(|_| anyhow!("PROCTOR_CHECK_SEED must be an integer"))?,
            );
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        crate::validate_attempt_id(&self.attempt_id)?;

        if self.test_time_minutes == 0 {
            return Err(anyhow!("test_time_minutes must be greater than zero"));
        }
        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(anyhow!("camera geometry must be non-zero"));
        }
        if !(0.0..=1.0).contains(&self.check_probability) {
            return Err(anyhow!("check probability must be within [0, 1]"));
        }
        if self.check_interval.is_zero() {
            return Err(anyhow!("check interval must be greater than zero"));
        }
        Ok(())
    }

    /// Total attempt duration in seconds.
    pub fn total_seconds(&self) -> u32 {
        self.test_time_minutes * 60
    }
}

fn read_config_file(path: &Path) -> Result<ProctorConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}
