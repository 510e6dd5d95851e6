//! Model Context Protocol bridge over the Redfish access layer.
//!
//! [`redfish_tool_table`] builds the tools agents may call and
//! [`StdioServer`] serves them as newline-delimited JSON-RPC.

pub mod protocol;
mod redfish_tools;
mod server;
mod table;
mod tool;

pub use redfish_tools::{RedfishToolsError, redfish_tool_table};
pub use server::{ServerInfo, StdioServer};
pub use table::{ToolCallError, ToolCallResult, ToolHandler, ToolTable, ToolTableError};
pub use tool::{ToolDefinition, ToolDefinitionError};
