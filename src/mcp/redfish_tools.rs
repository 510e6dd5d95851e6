//! Redfish tools exposed to agents.

use super::{
    ToolCallError, ToolCallResult, ToolDefinition, ToolDefinitionError, ToolHandler, ToolTable,
    ToolTableError,
};
use crate::redfish::{
    domain::RedfishRequest,
    ports::TransportFactory,
    services::{Invocation, RedfishAccess},
};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use thiserror::Error;
use url::Url;

/// Errors raised while assembling the Redfish tool table.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RedfishToolsError {
    /// A built-in definition failed validation.
    #[error(transparent)]
    Definition(#[from] ToolDefinitionError),
    /// Two tools share a name.
    #[error(transparent)]
    Table(#[from] ToolTableError),
}

/// Builds the table of Redfish tools over `access`.
///
/// # Errors
///
/// Returns [`RedfishToolsError`] if a built-in definition is invalid.
pub fn redfish_tool_table<F>(access: &RedfishAccess<F>) -> Result<ToolTable, RedfishToolsError>
where
    F: TransportFactory + 'static,
{
    let mut table = ToolTable::new();
    table.register(
        ToolDefinition::new(
            "list_endpoints",
            "List the address and port of every Redfish endpoint the server can reach.",
            json!({"type": "object", "properties": {}}),
        )?,
        Arc::new(ListEndpoints {
            access: access.clone(),
        }),
    )?;
    table.register(
        ToolDefinition::new(
            "list_servers",
            "List the addresses of every registered Redfish server.",
            json!({"type": "object", "properties": {}}),
        )?,
        Arc::new(ListServers {
            access: access.clone(),
        }),
    )?;
    table.register(
        ToolDefinition::new(
            "get_resource_data",
            "Read a Redfish resource. The URL names a registered server and the resource path, \
             for example https://10.0.0.5/redfish/v1/Systems.",
            json!({
                "type": "object",
                "properties": {
                    "url": {
                        "type": "string",
                        "description": "Absolute URL of the Redfish resource."
                    }
                },
                "required": ["url"]
            }),
        )?,
        Arc::new(GetResourceData {
            access: access.clone(),
        }),
    )?;
    Ok(table)
}

struct ListEndpoints<F: TransportFactory> {
    access: RedfishAccess<F>,
}

#[async_trait]
impl<F> ToolHandler for ListEndpoints<F>
where
    F: TransportFactory + 'static,
{
    async fn call(&self, _arguments: Value, _invocation: &Invocation) -> ToolCallResult {
        serde_json::to_value(self.access.list_endpoints()).map_err(|err| ToolCallError::Render(err.to_string()))
    }
}

struct ListServers<F: TransportFactory> {
    access: RedfishAccess<F>,
}

#[async_trait]
impl<F> ToolHandler for ListServers<F>
where
    F: TransportFactory + 'static,
{
    async fn call(&self, _arguments: Value, _invocation: &Invocation) -> ToolCallResult {
        let addresses: Vec<String> = self
            .access
            .list_hosts()
            .iter()
            .map(|host| host.address().to_string())
            .collect();
        Ok(json!(addresses))
    }
}

#[derive(Debug, Deserialize)]
struct ResourceArguments {
    url: String,
}

/// Target of a `get_resource_data` call.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ResourceTarget {
    address: String,
    request: RedfishRequest,
}

impl ResourceTarget {
    fn parse(raw: &str) -> Result<Self, ToolCallError> {
        let invalid = |reason: &str| ToolCallError::InvalidArguments(format!("{reason}: {raw}"));
        let url = Url::parse(raw.trim()).map_err(|_| invalid("not an absolute URL"))?;
        let address = url
            .host_str()
            .filter(|host| !host.is_empty())
            .ok_or_else(|| invalid("URL has no host"))?
            .to_owned();
        if url.path().is_empty() || url.path() == "/" {
            return Err(invalid("URL has no resource path"));
        }
        let path = url
            .query()
            .map_or_else(|| url.path().to_owned(), |query| format!("{}?{query}", url.path()));
        let request = RedfishRequest::get(path).map_err(|err| invalid(&err.to_string()))?;
        Ok(Self { address, request })
    }
}

struct GetResourceData<F: TransportFactory> {
    access: RedfishAccess<F>,
}

#[async_trait]
impl<F> ToolHandler for GetResourceData<F>
where
    F: TransportFactory + 'static,
{
    async fn call(&self, arguments: Value, invocation: &Invocation) -> ToolCallResult {
        let ResourceArguments { url } =
            serde_json::from_value(arguments).map_err(|err| ToolCallError::InvalidArguments(err.to_string()))?;
        let target = ResourceTarget::parse(&url)?;
        let response = self
            .access
            .fetch(&target.address, &target.request, invocation)
            .await?;
        Ok(response.into_payload())
    }
}
