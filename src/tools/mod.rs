//! Tools the model can invoke on the client (navigation assistant)

pub mod declarations;
pub mod dispatcher;

pub use declarations::{assistant_declarations, MainTab, ASSISTANT_INSTRUCTION};
pub use dispatcher::{ToolAction, ToolDispatcher, FUNCTION_NOT_FOUND, OK_RESULT};
