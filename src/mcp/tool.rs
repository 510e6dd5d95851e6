//! Tool definition value object.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Validation errors for tool definitions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToolDefinitionError {
    /// The tool name is empty after trimming.
    #[error("tool name must not be empty")]
    EmptyName,
    /// The tool description is empty after trimming.
    #[error("tool description must not be empty")]
    EmptyDescription,
    /// The input schema is not a JSON object.
    #[error("input schema for tool {0} must be a JSON object")]
    InvalidInputSchema(String),
}

/// Metadata advertised for one tool in `tools/list`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    name: String,
    description: String,
    input_schema: Value,
}

impl ToolDefinition {
    /// Creates a validated tool definition.
    ///
    /// # Errors
    ///
    /// Returns [`ToolDefinitionError`] when the name or description is empty
    /// or the schema is not an object.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: Value,
    ) -> Result<Self, ToolDefinitionError> {
        let normalized_name = name.into().trim().to_owned();
        if normalized_name.is_empty() {
            return Err(ToolDefinitionError::EmptyName);
        }

        let normalized_description = description.into().trim().to_owned();
        if normalized_description.is_empty() {
            return Err(ToolDefinitionError::EmptyDescription);
        }

        if !input_schema.is_object() {
            return Err(ToolDefinitionError::InvalidInputSchema(normalized_name));
        }

        Ok(Self {
            name: normalized_name,
            description: normalized_description,
            input_schema,
        })
    }

    /// Returns the tool name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the tool description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the JSON schema of the tool arguments.
    #[must_use]
    pub const fn input_schema(&self) -> &Value {
        &self.input_schema
    }
}
