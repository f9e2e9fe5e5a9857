use std::{fs, path::Path, time::Duration};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::platform::FixturePlatform;

#[derive(Deserialize)]
pub struct Config {
    /// tracing filter directive, overridden by `RUST_LOG`
    pub log: Option<String>,

    #[serde(default)]
    pub sensor: SensorConfig,
    #[serde(default)]
    pub platform: FixturePlatform,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct SensorConfig {
    // how long a cycle may take before the driver stops waiting for it
    pub sense_window_length_millis: u64,
    pub post_sense_sleep_length_millis: u64,

    // keep the captured cells in the processed batch
    pub raw_data: bool,
}

impl SensorConfig {
    pub fn sense_window_length(&self) -> Duration {
        Duration::from_millis(self.sense_window_length_millis)
    }

    pub fn post_sense_sleep_length(&self) -> Duration {
        Duration::from_millis(self.post_sense_sleep_length_millis)
    }
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            sense_window_length_millis: 8_000,
            post_sense_sleep_length_millis: 15 * 60 * 1_000,
            raw_data: true,
        }
    }
}

pub fn load(path: &Path) -> Result<Config> {
    let data = fs::read_to_string(path).context("Failed to read config")?;
    parse(&data)
}

pub fn parse(data: &str) -> Result<Config> {
    let config = toml::from_str(data).context("Failed to parse config")?;
    Ok(config)
}
