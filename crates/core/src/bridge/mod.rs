//! Bridge to the external script execution service.

mod dispatcher;
mod types;

pub use dispatcher::{BridgeError, ChannelDispatcher, ScriptDispatcher};
pub use types::{ScriptExecutionRequest, ScriptExecutionUpdate, ScriptStatus};
