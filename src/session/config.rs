use serde::{Deserialize, Serialize};

use crate::audio::CaptureConfig;
use crate::live::config::LiveConfig;
use crate::tools::{assistant_declarations, ASSISTANT_INSTRUCTION};

/// Model used for real-time voice sessions
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-native-audio-preview-09-2025";

/// Voice of the conversational companion
pub const COMPANION_VOICE: &str = "Zephyr";

/// Rate of the model's speech output
pub const PLAYBACK_SAMPLE_RATE: u32 = 24000;

/// The two flavours of voice session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionVariant {
    /// Conversational companion with a running transcript
    Companion,
    /// Hands-free navigation assistant with tools
    Assistant,
}

/// Everything that differs between session variants
#[derive(Debug, Clone)]
pub struct SessionProfile {
    pub variant: SessionVariant,
    /// Model identifier passed to the connector
    pub model: String,
    /// Options sent when the channel opens
    pub live: LiveConfig,
    /// Microphone capture settings
    pub capture: CaptureConfig,
    /// Output context sample rate
    pub playback_sample_rate: u32,
}

impl SessionProfile {
    /// Companion: spoken replies, both sides transcribed, no tools
    pub fn companion() -> Self {
        Self {
            variant: SessionVariant::Companion,
            model: DEFAULT_MODEL.to_string(),
            live: LiveConfig {
                input_transcription: true,
                output_transcription: true,
                voice: Some(COMPANION_VOICE.to_string()),
                ..LiveConfig::default()
            },
            capture: CaptureConfig::default(),
            playback_sample_rate: PLAYBACK_SAMPLE_RATE,
        }
    }

    /// Assistant: spoken replies plus navigate/generate tools
    pub fn assistant() -> Self {
        Self {
            variant: SessionVariant::Assistant,
            model: DEFAULT_MODEL.to_string(),
            live: LiveConfig {
                system_instruction: Some(ASSISTANT_INSTRUCTION.to_string()),
                function_declarations: assistant_declarations(),
                ..LiveConfig::default()
            },
            capture: CaptureConfig::default(),
            playback_sample_rate: PLAYBACK_SAMPLE_RATE,
        }
    }

    pub fn for_variant(variant: SessionVariant) -> Self {
        match variant {
            SessionVariant::Companion => Self::companion(),
            SessionVariant::Assistant => Self::assistant(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_voice(mut self, voice: impl Into<String>) -> Self {
        self.live.voice = Some(voice.into());
        self
    }
}
