//! Ordered registration table of tools and their handlers.

use super::ToolDefinition;
use crate::redfish::services::{AccessError, Invocation};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

/// Errors returned by tool handlers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToolCallError {
    /// The arguments do not match the tool's input schema.
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),
    /// The Redfish access layer failed.
    #[error(transparent)]
    Access(#[from] AccessError),
    /// The handler result could not be rendered.
    #[error("cannot render tool result: {0}")]
    Render(String),
}

/// Result type for tool handlers.
pub type ToolCallResult = Result<Value, ToolCallError>;

/// Executes one tool.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Runs the tool with `arguments` under `invocation`.
    async fn call(&self, arguments: Value, invocation: &Invocation) -> ToolCallResult;
}

/// Errors raised while building a tool table.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToolTableError {
    /// A tool with the same name is already registered.
    #[error("tool {0} is registered twice")]
    DuplicateName(String),
}

struct ToolEntry {
    definition: ToolDefinition,
    handler: Arc<dyn ToolHandler>,
}

/// Tools in registration order.
#[derive(Default)]
pub struct ToolTable {
    entries: Vec<ToolEntry>,
}

impl ToolTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a tool.
    ///
    /// # Errors
    ///
    /// Returns [`ToolTableError::DuplicateName`] when the name is taken.
    pub fn register(
        &mut self,
        definition: ToolDefinition,
        handler: Arc<dyn ToolHandler>,
    ) -> Result<(), ToolTableError> {
        if self.lookup(definition.name()).is_some() {
            return Err(ToolTableError::DuplicateName(definition.name().to_owned()));
        }
        self.entries.push(ToolEntry { definition, handler });
        Ok(())
    }

    /// Returns the tool definitions in registration order.
    #[must_use]
    pub fn definitions(&self) -> Vec<&ToolDefinition> {
        self.entries.iter().map(|entry| &entry.definition).collect()
    }

    /// Returns the handler registered under `name`.
    #[must_use]
    pub fn handler(&self, name: &str) -> Option<Arc<dyn ToolHandler>> {
        self.lookup(name).map(|entry| Arc::clone(&entry.handler))
    }

    /// Returns the number of registered tools.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns whether no tool is registered.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn lookup(&self, name: &str) -> Option<&ToolEntry> {
        self.entries.iter().find(|entry| entry.definition.name() == name)
    }
}
