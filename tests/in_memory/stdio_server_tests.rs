//! JSON-RPC conversations with the stdio server over an in-memory pipe.

use super::helpers::{HOST_A, Harness, backoff};
use eyre::{OptionExt, eyre};
use redfish_mcp::mcp::{ServerInfo, StdioServer, protocol::JsonRpcResponse, redfish_tool_table};
use redfish_mcp::redfish::domain::{BackoffConfig, RedfishResponse};
use serde_json::{Value, json};
use std::io;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, Lines, ReadHalf, WriteHalf};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const READ_TIMEOUT: Duration = Duration::from_secs(5);

struct Client {
    writer: WriteHalf<DuplexStream>,
    lines: Lines<BufReader<ReadHalf<DuplexStream>>>,
    server: JoinHandle<io::Result<()>>,
    shutdown: CancellationToken,
    harness: Harness,
}

impl Client {
    async fn start(policy: BackoffConfig) -> eyre::Result<Self> {
        let harness = Harness::with_hosts(&[HOST_A], policy).await?;
        harness
            .factory
            .set_fallback_response(HOST_A, RedfishResponse::ok(json!({"Id": "Systems"})));
        let server = StdioServer::new(
            redfish_tool_table(&harness.access)?,
            ServerInfo::new("redfish-test", "0.0.1"),
        );

        let (client_io, server_io) = tokio::io::duplex(64 * 1024);
        let (server_read, server_write) = tokio::io::split(server_io);
        let (client_read, writer) = tokio::io::split(client_io);
        let shutdown = CancellationToken::new();
        let token = shutdown.clone();
        let task = tokio::spawn(async move { server.serve(server_read, server_write, token).await });

        Ok(Self {
            writer,
            lines: BufReader::new(client_read).lines(),
            server: task,
            shutdown,
            harness,
        })
    }

    async fn send_raw(&mut self, line: &str) -> eyre::Result<()> {
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;
        Ok(())
    }

    async fn send(&mut self, message: &Value) -> eyre::Result<()> {
        let line = serde_json::to_string(message)?;
        self.send_raw(&line).await
    }

    async fn request(&mut self, id: i64, method: &str, params: Value) -> eyre::Result<()> {
        self.send(&json!({"jsonrpc": "2.0", "id": id, "method": method, "params": params}))
            .await
    }

    async fn receive(&mut self) -> eyre::Result<JsonRpcResponse> {
        let line = tokio::time::timeout(READ_TIMEOUT, self.lines.next_line())
            .await??
            .ok_or_eyre("server closed the stream")?;
        Ok(serde_json::from_str(&line)?)
    }

    async fn call(&mut self, id: i64, method: &str, params: Value) -> eyre::Result<JsonRpcResponse> {
        self.request(id, method, params).await?;
        self.receive().await
    }

    /// Closes the input and returns every response written before exit.
    async fn finish(mut self) -> eyre::Result<Vec<JsonRpcResponse>> {
        self.writer.shutdown().await?;
        let mut remaining: Vec<JsonRpcResponse> = Vec::new();
        while let Some(line) = tokio::time::timeout(READ_TIMEOUT, self.lines.next_line()).await?? {
            remaining.push(serde_json::from_str(&line)?);
        }
        tokio::time::timeout(READ_TIMEOUT, self.server).await???;
        Ok(remaining)
    }
}

fn result(response: JsonRpcResponse) -> eyre::Result<Value> {
    match (response.result, response.error) {
        (Some(value), None) => Ok(value),
        (_, Some(error)) => Err(eyre!("unexpected error {}: {}", error.code, error.message)),
        (None, None) => Err(eyre!("response carries neither result nor error")),
    }
}

fn tool_text(result: &Value) -> eyre::Result<&str> {
    result
        .pointer("/content/0/text")
        .and_then(Value::as_str)
        .ok_or_eyre("tool result has no text content")
}

#[tokio::test]
async fn initialize_echoes_protocol_version_and_server_info() -> eyre::Result<()> {
    let mut client = Client::start(backoff(0)?).await?;

    let response = client
        .call(1, "initialize", json!({"protocolVersion": "2025-03-26", "capabilities": {}}))
        .await?;

    assert_eq!(response.id, json!(1));
    assert_eq!(
        result(response)?,
        json!({
            "protocolVersion": "2025-03-26",
            "capabilities": {"tools": {"listChanged": false}},
            "serverInfo": {"name": "redfish-test", "version": "0.0.1"},
        })
    );
    client.send(&json!({"jsonrpc": "2.0", "method": "notifications/initialized"})).await?;
    let pong = client.call(2, "ping", json!({})).await?;
    assert_eq!(pong.id, json!(2));
    assert_eq!(result(pong)?, json!({}));

    assert!(client.finish().await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn tools_are_listed_in_registration_order() -> eyre::Result<()> {
    let mut client = Client::start(backoff(0)?).await?;

    let listed = result(client.call(1, "tools/list", json!({})).await?)?;

    let tools = listed
        .get("tools")
        .and_then(Value::as_array)
        .ok_or_eyre("tools array")?;
    let names: Vec<&str> = tools
        .iter()
        .filter_map(|tool| tool.get("name").and_then(Value::as_str))
        .collect();
    assert_eq!(names, vec!["list_endpoints", "list_servers", "get_resource_data"]);
    assert!(tools.iter().all(|tool| tool.get("inputSchema").is_some()));
    client.finish().await?;
    Ok(())
}

#[tokio::test]
async fn resource_reads_return_headers_and_data() -> eyre::Result<()> {
    let mut client = Client::start(backoff(0)?).await?;

    let called = result(
        client
            .call(
                3,
                "tools/call",
                json!({"name": "get_resource_data", "arguments": {"url": "https://10.0.0.5/redfish/v1/Systems"}}),
            )
            .await?,
    )?;

    assert_eq!(called.get("isError"), Some(&json!(false)));
    let payload: Value = serde_json::from_str(tool_text(&called)?)?;
    assert_eq!(payload, json!({"headers": {}, "data": {"Id": "Systems"}}));
    assert_eq!(client.harness.factory.sent_paths(HOST_A), vec!["/redfish/v1/Systems"]);
    client.finish().await?;
    Ok(())
}

#[tokio::test]
async fn listing_tools_report_registered_hosts() -> eyre::Result<()> {
    let mut client = Client::start(backoff(0)?).await?;

    let servers = result(
        client
            .call(1, "tools/call", json!({"name": "list_servers", "arguments": {}}))
            .await?,
    )?;
    let endpoints = result(
        client
            .call(2, "tools/call", json!({"name": "list_endpoints"}))
            .await?,
    )?;

    assert_eq!(serde_json::from_str::<Value>(tool_text(&servers)?)?, json!([HOST_A]));
    assert_eq!(
        serde_json::from_str::<Value>(tool_text(&endpoints)?)?,
        json!([{"address": HOST_A, "port": 443}])
    );
    client.finish().await?;
    Ok(())
}

#[tokio::test]
async fn access_failures_are_tool_errors() -> eyre::Result<()> {
    let mut client = Client::start(backoff(0)?).await?;

    let unknown_host = result(
        client
            .call(
                1,
                "tools/call",
                json!({"name": "get_resource_data", "arguments": {"url": "https://10.9.9.9/redfish/v1"}}),
            )
            .await?,
    )?;
    let bad_url = result(
        client
            .call(
                2,
                "tools/call",
                json!({"name": "get_resource_data", "arguments": {"url": "/redfish/v1"}}),
            )
            .await?,
    )?;

    assert_eq!(unknown_host.get("isError"), Some(&json!(true)));
    assert!(tool_text(&unknown_host)?.contains("10.9.9.9"));
    assert_eq!(bad_url.get("isError"), Some(&json!(true)));
    assert_eq!(client.harness.factory.total_calls(), 0);
    client.finish().await?;
    Ok(())
}

#[tokio::test]
async fn protocol_errors_use_json_rpc_codes() -> eyre::Result<()> {
    let mut client = Client::start(backoff(0)?).await?;

    let unknown_method = client.call(1, "resources/list", json!({})).await?;
    let unknown_tool = client
        .call(2, "tools/call", json!({"name": "reboot", "arguments": {}}))
        .await?;
    let missing_name = client.call(3, "tools/call", json!({"arguments": {}})).await?;
    client.send_raw("{not json").await?;
    let parse_error = client.receive().await?;
    client.send_raw(r#"{"jsonrpc":"2.0","id":9}"#).await?;
    let invalid_request = client.receive().await?;

    let codes: Vec<Option<i64>> = [&unknown_method, &unknown_tool, &missing_name, &parse_error, &invalid_request]
        .iter()
        .map(|response| response.error.as_ref().map(|error| error.code))
        .collect();
    assert_eq!(
        codes,
        vec![Some(-32601), Some(-32602), Some(-32602), Some(-32700), Some(-32600)]
    );
    assert_eq!(parse_error.id, Value::Null);
    assert_eq!(invalid_request.id, json!(9));
    client.finish().await?;
    Ok(())
}

#[tokio::test]
async fn cancelled_calls_get_no_response() -> eyre::Result<()> {
    let mut client = Client::start(backoff(1)?).await?;
    client.harness.factory.script_status(HOST_A, 503, 5);

    client
        .request(
            7,
            "tools/call",
            json!({"name": "get_resource_data", "arguments": {"url": "https://10.0.0.5/redfish/v1/Systems"}}),
        )
        .await?;
    client
        .send(&json!({
            "jsonrpc": "2.0",
            "method": "notifications/cancelled",
            "params": {"requestId": 7, "reason": "user aborted"}
        }))
        .await?;
    let pong = client.call(8, "ping", json!({})).await?;
    assert_eq!(pong.id, json!(8));

    // An uncancelled call would answer after its one-second backoff.
    tokio::time::sleep(Duration::from_millis(1500)).await;
    let remaining = client.finish().await?;

    assert!(
        remaining.iter().all(|response| response.id != json!(7)),
        "cancelled call answered: {remaining:?}"
    );
    assert!(remaining.is_empty());
    Ok(())
}

#[tokio::test]
async fn reused_in_flight_ids_are_refused() -> eyre::Result<()> {
    let mut client = Client::start(backoff(1)?).await?;
    client.harness.factory.script_status(HOST_A, 503, 1);
    let read = json!({"name": "get_resource_data", "arguments": {"url": "https://10.0.0.5/redfish/v1/Systems"}});

    client.request(7, "tools/call", read.clone()).await?;
    let duplicate = client.call(7, "tools/call", read.clone()).await?;
    let original = client.receive().await?;
    let reused = client.call(7, "tools/call", read).await?;

    assert_eq!(duplicate.id, json!(7));
    assert_eq!(duplicate.error.as_ref().map(|error| error.code), Some(-32600));
    assert_eq!(original.id, json!(7));
    assert_eq!(result(original)?.get("isError"), Some(&json!(false)));
    assert_eq!(result(reused)?.get("isError"), Some(&json!(false)));
    assert_eq!(client.harness.factory.send_calls(HOST_A), 3);
    assert!(client.finish().await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn shutdown_token_stops_the_server() -> eyre::Result<()> {
    let mut client = Client::start(backoff(0)?).await?;
    client.call(1, "ping", json!({})).await?;

    client.shutdown.cancel();

    let closed = tokio::time::timeout(READ_TIMEOUT, client.lines.next_line()).await??;
    assert!(closed.is_none());
    tokio::time::timeout(READ_TIMEOUT, client.server).await???;
    Ok(())
}
