use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Output modality requested from the model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ResponseModality {
    Audio,
    Text,
}

/// Parameter schema type of a function declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SchemaType {
    Object,
    String,
}

/// Parameter schema with named fields and a required-fields list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    #[serde(rename = "type")]
    pub kind: SchemaType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, Schema>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
}

impl Schema {
    pub fn string(description: impl Into<String>) -> Self {
        Self {
            kind: SchemaType::String,
            description: Some(description.into()),
            properties: BTreeMap::new(),
            required: Vec::new(),
        }
    }

    /// Object schema; every listed property is required
    pub fn object(description: impl Into<String>, properties: Vec<(&str, Schema)>) -> Self {
        let required = properties.iter().map(|(name, _)| name.to_string()).collect();
        Self {
            kind: SchemaType::Object,
            description: Some(description.into()),
            properties: properties
                .into_iter()
                .map(|(name, schema)| (name.to_string(), schema))
                .collect(),
            required,
        }
    }
}

/// A tool the model may invoke on the client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDeclaration {
    pub name: String,
    pub parameters: Schema,
}

/// Options sent when the model session is opened
#[derive(Debug, Clone, PartialEq)]
pub struct LiveConfig {
    pub response_modalities: Vec<ResponseModality>,
    /// Ask the server to transcribe the user's speech
    pub input_transcription: bool,
    /// Ask the server to transcribe the model's speech
    pub output_transcription: bool,
    /// Prebuilt voice name
    pub voice: Option<String>,
    pub system_instruction: Option<String>,
    pub function_declarations: Vec<FunctionDeclaration>,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            response_modalities: vec![ResponseModality::Audio],
            input_transcription: false,
            output_transcription: false,
            voice: None,
            system_instruction: None,
            function_declarations: Vec::new(),
        }
    }
}
