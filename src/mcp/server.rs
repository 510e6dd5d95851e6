//! Newline-delimited JSON-RPC server over an async byte stream.

use super::ToolTable;
use super::protocol::{
    CancelledParams, DEFAULT_PROTOCOL_VERSION, INVALID_PARAMS, INVALID_REQUEST, IncomingMessage, JsonRpcResponse,
    METHOD_NOT_FOUND, PARSE_ERROR, ToolCallParams, tool_result,
};
use super::table::{ToolCallError, ToolCallResult};
use crate::redfish::services::Invocation;
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::io;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Name and version announced during `initialize`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerInfo {
    name: String,
    version: String,
}

impl ServerInfo {
    /// Creates server information.
    #[must_use]
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }

    /// Returns the server name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the server version.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }
}

impl Default for ServerInfo {
    fn default() -> Self {
        Self::new(env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
    }
}

struct Completion {
    key: String,
    cancelled: bool,
    response: JsonRpcResponse,
}

struct Connection {
    completions: mpsc::UnboundedSender<Completion>,
    calls: JoinSet<()>,
    in_flight: HashMap<String, CancellationToken>,
}

/// Serves a [`ToolTable`] to one client.
///
/// Tool calls run concurrently on their own tasks; every other method is
/// answered inline in arrival order. A tool call reusing the id of one still
/// in flight is refused.
pub struct StdioServer {
    tools: Arc<ToolTable>,
    info: ServerInfo,
}

impl StdioServer {
    /// Creates a server for `tools`.
    #[must_use]
    pub fn new(tools: ToolTable, info: ServerInfo) -> Self {
        Self {
            tools: Arc::new(tools),
            info,
        }
    }

    /// Returns the announced server information.
    #[must_use]
    pub const fn info(&self) -> &ServerInfo {
        &self.info
    }

    /// Reads requests from `reader` and writes responses to `writer` until
    /// end of input or `shutdown` fires.
    ///
    /// In-flight tool calls are cancelled on exit and their tasks drained
    /// before returning. Responses for cancelled calls are not written.
    ///
    /// # Errors
    ///
    /// Returns an I/O error when reading or writing the stream fails.
    pub async fn serve<R, W>(&self, reader: R, mut writer: W, shutdown: CancellationToken) -> io::Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = BufReader::new(reader).lines();
        let (completions, mut finished) = mpsc::unbounded_channel();
        let mut connection = Connection {
            completions,
            calls: JoinSet::new(),
            in_flight: HashMap::new(),
        };
        info!(server = self.info.name(), "serving MCP over stdio");

        loop {
            tokio::select! {
                biased;
                () = shutdown.cancelled() => {
                    info!("shutdown requested");
                    break;
                }
                Some(completion) = finished.recv() => {
                    write_completion(&mut writer, &mut connection.in_flight, completion).await?;
                }
                Some(joined) = connection.calls.join_next(), if !connection.calls.is_empty() => {
                    if let Err(err) = joined {
                        warn!(error = %err, "tool call task failed");
                    }
                }
                line = lines.next_line() => {
                    let Some(text) = line? else {
                        debug!("end of input");
                        break;
                    };
                    if let Some(response) = self.dispatch_line(&text, &mut connection) {
                        write_response(&mut writer, &response).await?;
                    }
                }
            }
        }

        for token in connection.in_flight.values() {
            token.cancel();
        }
        let Connection {
            completions,
            mut calls,
            mut in_flight,
        } = connection;
        drop(completions);
        while let Some(completion) = finished.recv().await {
            write_completion(&mut writer, &mut in_flight, completion).await?;
        }
        while let Some(joined) = calls.join_next().await {
            if let Err(err) = joined {
                warn!(error = %err, "tool call task failed");
            }
        }
        writer.flush().await
    }

    fn dispatch_line(&self, text: &str, connection: &mut Connection) -> Option<JsonRpcResponse> {
        if text.trim().is_empty() {
            return None;
        }
        let raw: Value = match serde_json::from_str(text) {
            Ok(value) => value,
            Err(err) => {
                return Some(JsonRpcResponse::failure(
                    Value::Null,
                    PARSE_ERROR,
                    format!("parse error: {err}"),
                ));
            }
        };
        let id_hint = raw.get("id").cloned().unwrap_or(Value::Null);
        let message = match IncomingMessage::deserialize(raw) {
            Ok(message) => message,
            Err(err) => {
                return Some(JsonRpcResponse::failure(
                    id_hint,
                    INVALID_REQUEST,
                    format!("invalid request: {err}"),
                ));
            }
        };

        debug!(method = message.method.as_str(), "received message");
        let IncomingMessage { id, method, params } = message;
        let Some(request_id) = id else {
            handle_notification(&method, params, connection);
            return None;
        };
        match method.as_str() {
            "initialize" => Some(JsonRpcResponse::success(request_id, self.initialize_result(&params))),
            "ping" => Some(JsonRpcResponse::success(request_id, json!({}))),
            "tools/list" => Some(JsonRpcResponse::success(request_id, self.tools_list_result())),
            "tools/call" => self.start_tool_call(request_id, params, connection),
            other => Some(JsonRpcResponse::failure(
                request_id,
                METHOD_NOT_FOUND,
                format!("method not found: {other}"),
            )),
        }
    }

    fn initialize_result(&self, params: &Value) -> Value {
        let version = params
            .get("protocolVersion")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_PROTOCOL_VERSION);
        json!({
            "protocolVersion": version,
            "capabilities": {"tools": {"listChanged": false}},
            "serverInfo": {"name": self.info.name(), "version": self.info.version()},
        })
    }

    fn tools_list_result(&self) -> Value {
        json!({"tools": self.tools.definitions()})
    }

    fn start_tool_call(&self, id: Value, params: Value, connection: &mut Connection) -> Option<JsonRpcResponse> {
        let call = match serde_json::from_value::<ToolCallParams>(params) {
            Ok(call) => call,
            Err(err) => {
                return Some(JsonRpcResponse::failure(
                    id,
                    INVALID_PARAMS,
                    format!("invalid tools/call params: {err}"),
                ));
            }
        };
        let Some(handler) = self.tools.handler(&call.name) else {
            return Some(JsonRpcResponse::failure(
                id,
                INVALID_PARAMS,
                format!("unknown tool: {}", call.name),
            ));
        };

        let key = id.to_string();
        if connection.in_flight.contains_key(&key) {
            return Some(JsonRpcResponse::failure(
                id,
                INVALID_REQUEST,
                format!("request id {key} is already in flight"),
            ));
        }
        let token = CancellationToken::new();
        connection.in_flight.insert(key.clone(), token.clone());
        let completions = connection.completions.clone();
        let arguments = call.arguments.unwrap_or_else(|| json!({}));
        let tool = call.name;
        connection.calls.spawn(async move {
            let invocation = Invocation::with_cancellation(token);
            debug!(tool = tool.as_str(), invocation = %invocation.id(), "tool call started");
            let outcome = handler.call(arguments, &invocation).await;
            let completion = Completion {
                key,
                cancelled: invocation.is_cancelled(),
                response: JsonRpcResponse::success(id, render_outcome(outcome)),
            };
            if completions.send(completion).is_err() {
                debug!(tool = tool.as_str(), "connection closed before tool call finished");
            }
        });
        None
    }
}

fn handle_notification(method: &str, params: Value, connection: &Connection) {
    match method {
        "notifications/initialized" => debug!("client initialized"),
        "notifications/cancelled" => match serde_json::from_value::<CancelledParams>(params) {
            Ok(cancelled) => {
                if let Some(token) = connection.in_flight.get(&cancelled.request_id.to_string()) {
                    info!(
                        request_id = %cancelled.request_id,
                        reason = cancelled.reason.as_deref().unwrap_or("unspecified"),
                        "cancelling tool call"
                    );
                    token.cancel();
                }
            }
            Err(err) => debug!(error = %err, "ignoring malformed cancellation"),
        },
        other => debug!(method = other, "ignoring notification"),
    }
}

fn render_outcome(outcome: ToolCallResult) -> Value {
    let rendered = outcome.and_then(|value| {
        serde_json::to_string_pretty(&value).map_err(|err| ToolCallError::Render(err.to_string()))
    });
    match rendered {
        Ok(text) => tool_result(text, false),
        Err(err) => tool_result(err.to_string(), true),
    }
}

async fn write_completion<W>(
    writer: &mut W,
    in_flight: &mut HashMap<String, CancellationToken>,
    completion: Completion,
) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    in_flight.remove(&completion.key);
    if completion.cancelled {
        debug!(request_id = completion.key.as_str(), "suppressing response to cancelled call");
        return Ok(());
    }
    write_response(writer, &completion.response).await
}

async fn write_response<W>(writer: &mut W, response: &JsonRpcResponse) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut line = serde_json::to_vec(response).map_err(io::Error::from)?;
    line.push(b'\n');
    writer.write_all(&line).await?;
    writer.flush().await
}
