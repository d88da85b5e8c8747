use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

use super::declarations::{MainTab, GENERATE_IMAGE, NAVIGATE};
use crate::error::SessionError;
use crate::live::config::FunctionDeclaration;
use crate::session::SessionObserver;

/// Result sent back for an invocation whose name is not recognized
pub const FUNCTION_NOT_FOUND: &str = "Function not found";

/// Result sent back once a recognized action has been applied
pub const OK_RESULT: &str = "OK";

/// Local actions the model can trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolAction {
    Navigate,
    GenerateImage,
}

impl ToolAction {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            NAVIGATE => Some(ToolAction::Navigate),
            GENERATE_IMAGE => Some(ToolAction::GenerateImage),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ToolAction::Navigate => NAVIGATE,
            ToolAction::GenerateImage => GENERATE_IMAGE,
        }
    }
}

/// Maps remote tool invocations onto the caller's UI callbacks
pub struct ToolDispatcher {
    enabled: HashSet<ToolAction>,
    target: Arc<dyn SessionObserver>,
}

impl ToolDispatcher {
    /// Enable the actions named by `declarations`; unknown names are ignored
    pub fn new(declarations: &[FunctionDeclaration], target: Arc<dyn SessionObserver>) -> Self {
        let enabled = declarations
            .iter()
            .filter_map(|d| ToolAction::from_name(&d.name))
            .collect();

        Self { enabled, target }
    }

    pub fn supports(&self, name: &str) -> bool {
        ToolAction::from_name(name).is_some_and(|action| self.enabled.contains(&action))
    }

    /// Apply the named action and return the result string to acknowledge
    ///
    /// Arguments are not validated against the declared schema.
    pub fn dispatch(&self, name: &str, args: &Value) -> Result<String, SessionError> {
        let action = ToolAction::from_name(name)
            .filter(|action| self.enabled.contains(action))
            .ok_or_else(|| SessionError::UnsupportedTool(name.to_string()))?;

        match action {
            ToolAction::Navigate => {
                let tab = string_arg(args, "tab");
                if MainTab::from_id(&tab).is_none() {
                    warn!("Navigating to unknown tab '{}'", tab);
                }
                info!("Tool call: navigate to '{}'", tab);
                self.target.on_navigate_requested(&tab);
            }
            ToolAction::GenerateImage => {
                let prompt = string_arg(args, "prompt");
                info!("Tool call: generate image");
                self.target.on_generate_requested(&prompt);
            }
        }

        Ok(OK_RESULT.to_string())
    }
}

/// Read an argument as text; non-strings are passed as their JSON form
fn string_arg(args: &Value, key: &str) -> String {
    match args.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}
