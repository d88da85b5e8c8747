use serde::{Deserialize, Serialize};

use crate::live::config::{FunctionDeclaration, Schema};

/// Top-level tabs of the application the assistant can navigate to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MainTab {
    Timeless,
    Studio,
    Companion,
    Explorer,
}

impl MainTab {
    pub const ALL: [MainTab; 4] = [
        MainTab::Timeless,
        MainTab::Studio,
        MainTab::Companion,
        MainTab::Explorer,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            MainTab::Timeless => "timeless",
            MainTab::Studio => "studio",
            MainTab::Companion => "companion",
            MainTab::Explorer => "explorer",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tab| tab.id() == id)
    }
}

pub const NAVIGATE: &str = "navigate";
pub const GENERATE_IMAGE: &str = "generateImage";

/// System instruction of the hands-free navigation assistant
pub const ASSISTANT_INSTRUCTION: &str = "You are a helpful voice assistant for a web application called 'Gemini Creative Suite'. You can navigate between tabs and help generate images. Be concise and confirm actions. The tabs are 'timeless', 'studio', 'companion', and 'explorer'.";

pub fn navigate_declaration() -> FunctionDeclaration {
    FunctionDeclaration {
        name: NAVIGATE.to_string(),
        parameters: Schema::object(
            "Navigate to a specific tab in the application.",
            vec![(
                "tab",
                Schema::string(
                    "The tab to navigate to. Can be 'timeless', 'studio', 'companion', or 'explorer'.",
                ),
            )],
        ),
    }
}

pub fn generate_image_declaration() -> FunctionDeclaration {
    FunctionDeclaration {
        name: GENERATE_IMAGE.to_string(),
        parameters: Schema::object(
            "Generate an image based on a user's text prompt.",
            vec![(
                "prompt",
                Schema::string("The user's description of the image they want to generate."),
            )],
        ),
    }
}

/// Declarations offered by the navigation assistant
pub fn assistant_declarations() -> Vec<FunctionDeclaration> {
    vec![navigate_declaration(), generate_image_declaration()]
}
