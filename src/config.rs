use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::engine::udp::{MAX_BITRATE, MIN_BITRATE};
use crate::engine::EngineConfig;
use crate::session::BitratePolicy;

/// Default config location (extension resolved by the `config` crate)
pub const DEFAULT_CONFIG_PATH: &str = "config/voice-chat";

/// Prefix for environment overrides, e.g. `VOICE_CHAT__SERVER__PORT=9000`
pub const ENV_PREFIX: &str = "VOICE_CHAT";

const OPUS_SAMPLE_RATES: [u32; 5] = [8000, 12000, 16000, 24000, 48000];

/// Frame durations Opus can encode, in tenths of a millisecond (2.5 ms to 60 ms)
const OPUS_FRAME_DURATIONS: [u32; 6] = [25, 50, 100, 200, 400, 600];

/// Frame sizes in samples that Opus accepts at `sample_rate`
pub fn opus_frame_sizes(sample_rate: u32) -> Vec<usize> {
    OPUS_FRAME_DURATIONS
        .iter()
        .map(|tenths| (sample_rate as usize * *tenths as usize) / 10_000)
        .collect()
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub audio: AudioConfig,
    pub network: NetworkConfig,
    pub bitrate: BitratePolicy,
    pub http: HttpConfig,
}

/// Voice server used when a command does not name one
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 38592,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub frame_size: usize,
    pub playback_buffer_ms: u32,
    pub input_device: Option<String>,
    pub output_device: Option<String>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            frame_size: 480,
            playback_buffer_ms: 200,
            input_device: None,
            output_device: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub keepalive_interval_ms: u64,
    pub receive_timeout_ms: u64,
    pub max_receive_errors: u32,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            keepalive_interval_ms: 1000,
            receive_timeout_ms: 100,
            max_receive_errors: 50,
        }
    }
}

/// Local HTTP control API
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 8088,
        }
    }
}

impl Config {
    /// Load from `path`, which must exist, with environment overrides
    pub fn load(path: &str) -> Result<Self> {
        Self::build(path, true)
    }

    /// Load from `path` if present, otherwise start from defaults
    pub fn load_optional(path: &str) -> Result<Self> {
        Self::build(path, false)
    }

    fn build(path: &str, required: bool) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(required))
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()
            .with_context(|| format!("Failed to read config {}", path))?;

        let cfg: Config = settings
            .try_deserialize()
            .context("Invalid configuration")?;
        cfg.validate()?;

        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            bail!("server.port must be greater than zero");
        }

        if self.bitrate.supported.is_empty() {
            bail!("bitrate.supported must list at least one bitrate");
        }
        if let Some(bps) = self
            .bitrate
            .supported
            .iter()
            .find(|bps| !(MIN_BITRATE..=MAX_BITRATE).contains(*bps))
        {
            bail!(
                "bitrate {} outside the Opus range {}..={}",
                bps,
                MIN_BITRATE,
                MAX_BITRATE
            );
        }
        if !self.bitrate.is_supported(self.bitrate.default) {
            bail!(
                "bitrate.default {} is not in bitrate.supported {:?}",
                self.bitrate.default,
                self.bitrate.supported
            );
        }

        if !OPUS_SAMPLE_RATES.contains(&self.audio.sample_rate) {
            bail!("audio.sample_rate {} is not an Opus rate", self.audio.sample_rate);
        }
        let frame_sizes = opus_frame_sizes(self.audio.sample_rate);
        if !frame_sizes.contains(&self.audio.frame_size) {
            bail!(
                "audio.frame_size {} is not an Opus frame at {} Hz (expected one of {:?})",
                self.audio.frame_size,
                self.audio.sample_rate,
                frame_sizes
            );
        }

        if self.network.keepalive_interval_ms == 0 || self.network.receive_timeout_ms == 0 {
            bail!("network intervals must be greater than zero");
        }
        if self.network.max_receive_errors == 0 {
            bail!("network.max_receive_errors must be greater than zero");
        }

        Ok(())
    }

    /// Settings for the built-in UDP engine
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            sample_rate: self.audio.sample_rate,
            frame_size: self.audio.frame_size,
            playback_buffer_ms: self.audio.playback_buffer_ms,
            keepalive_interval: Duration::from_millis(self.network.keepalive_interval_ms),
            receive_timeout: Duration::from_millis(self.network.receive_timeout_ms),
            max_receive_errors: self.network.max_receive_errors,
            initial_bitrate: self.bitrate.default,
            input_device: self.audio.input_device.clone(),
            output_device: self.audio.output_device.clone(),
        }
    }
}
