use anyhow::{Context, Result};
use serde::Deserialize;

use crate::live::client::DEFAULT_ENDPOINT;
use crate::session::{SessionProfile, SessionVariant, DEFAULT_MODEL, PLAYBACK_SAMPLE_RATE};

/// Prefix of environment variables overriding the config file
pub const ENV_PREFIX: &str = "LIVE_VOICE";

#[derive(Debug, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub model: ModelConfig,
    pub audio: AudioConfig,
    #[serde(default)]
    pub session: SessionSettings,
}

#[derive(Debug, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

#[derive(Debug, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Deserialize)]
pub struct ModelConfig {
    /// Usually supplied through `LIVE_VOICE__MODEL__API_KEY`
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_model")]
    pub model: String,
}

#[derive(Debug, Deserialize)]
pub struct AudioConfig {
    /// WAV file used as the microphone
    pub input_path: String,
    /// WAV file the model's speech is rendered to
    pub output_path: String,
    #[serde(default = "default_capture_rate")]
    pub capture_sample_rate: u32,
    #[serde(default = "default_playback_rate")]
    pub playback_sample_rate: u32,
    #[serde(default = "default_frame_size")]
    pub frame_size: usize,
}

#[derive(Debug, Deserialize)]
pub struct SessionSettings {
    #[serde(default = "default_variant")]
    pub profile: SessionVariant,
    /// Overrides the profile's prebuilt voice
    pub voice: Option<String>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            profile: default_variant(),
            voice: None,
        }
    }
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_capture_rate() -> u32 {
    16000
}

fn default_playback_rate() -> u32 {
    PLAYBACK_SAMPLE_RATE
}

fn default_frame_size() -> usize {
    4096
}

fn default_variant() -> SessionVariant {
    SessionVariant::Companion
}

impl Config {
    /// Load `path` (extension optional) and overlay `LIVE_VOICE__*` variables
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()
            .with_context(|| format!("Failed to read config from {}", path))?;

        Ok(settings.try_deserialize()?)
    }

    /// Session profile for `variant`, with audio and model settings applied
    pub fn profile(&self, variant: SessionVariant) -> SessionProfile {
        let mut profile = SessionProfile::for_variant(variant).with_model(&self.model.model);

        if let Some(voice) = &self.session.voice {
            profile = profile.with_voice(voice);
        }

        profile.capture.sample_rate = self.audio.capture_sample_rate;
        profile.capture.frame_size = self.audio.frame_size;
        profile.playback_sample_rate = self.audio.playback_sample_rate;
        profile
    }
}
