//! Rinse tool server - JSON-RPC 2.0 over HTTP
//!
//! Exposes one cleaning [`Session`] as **Tools** and **Resources** to any
//! client that speaks the Model Context Protocol shape of JSON-RPC.
//!
//! # Protocol
//!
//! | Method                        | Purpose                                    |
//! |-------------------------------|--------------------------------------------|
//! | `initialize`                  | Handshake, returns server capabilities     |
//! | `tools/list`                  | Enumerate available tools                  |
//! | `tools/call`                  | Run a tool (`load_csv`, `fill_missing`...) |
//! | `resources/list`              | Enumerate exposed resources                |
//! | `resources/read`              | Read the current CSV export                |
//!
//! Every [`Operation`] is a tool named after its tag, taking the operation's
//! fields as arguments. A rejected operation is still a successful JSON-RPC
//! call: its result carries `isError: true` and the warning text.
//!
//! ```text
//! ┌──────────────┐   JSON-RPC   ┌──────────────┐  write lock  ┌──────────┐
//! │    Client    │─────────────▶│  Axum Router │─────────────▶│ Session  │
//! │              │◀─────────────│  (async)     │◀─────────────│ (owned)  │
//! └──────────────┘              └──────────────┘              └──────────┘
//! ```

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::config::CleanConfig;
use crate::data::Upload;
use crate::session::{LoadOutcome, Operation, Session};

const EXPORT_URI: &str = "rinse://session/export";

// ─── JSON-RPC 2.0 types ────────────────────────────────────────────────────

/// JSON-RPC 2.0 request envelope.
#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

/// JSON-RPC 2.0 response envelope.
#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

#[derive(Debug, Serialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
}

impl JsonRpcResponse {
    fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            id,
            result: Some(result),
            error: None,
        }
    }

    fn error(id: Option<Value>, code: i32, message: String) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            id,
            result: None,
            error: Some(JsonRpcError { code, message }),
        }
    }
}

const METHOD_NOT_FOUND: i32 = -32601;
const INVALID_PARAMS: i32 = -32602;
const INTERNAL_ERROR: i32 = -32603;

// ─── MCP protocol types ────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ToolDescriptor {
    name: &'static str,
    description: &'static str,
    #[serde(rename = "inputSchema")]
    input_schema: Value,
}

#[derive(Debug, Serialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    content_type: &'static str,
    text: String,
}

/// Build a `tools/call` result.
fn tool_result(
    id: Option<Value>,
    text: String,
    is_error: bool,
    metadata: Option<Value>,
) -> JsonRpcResponse {
    let content = vec![ContentBlock {
        content_type: "text",
        text,
    }];
    let mut result = json!({
        "content": content,
        "isError": is_error,
    });
    if let Some(metadata) = metadata {
        result["metadata"] = metadata;
    }
    JsonRpcResponse::success(id, result)
}

// ─── Shared state ───────────────────────────────────────────────────────────

/// One session per server process. Every tool call takes the lock, so
/// operations are applied one at a time in arrival order.
pub type SharedSession = Arc<RwLock<Session>>;

// ─── Server bootstrap ──────────────────────────────────────────────────────

/// Router with the JSON-RPC endpoint and `/health`.
pub fn build_router(state: SharedSession) -> Router {
    Router::new()
        .route("/", post(handle_jsonrpc))
        .route("/health", get(health_check))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve a fresh session on `127.0.0.1:port` until the process exits.
pub async fn start_server(config: CleanConfig, port: u16) -> Result<()> {
    let state: SharedSession = Arc::new(RwLock::new(Session::new(config)));
    let app = build_router(state);

    let addr = format!("127.0.0.1:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("tool server listening on http://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}

async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({"status": "ok", "server": "rinse"})))
}

// ─── JSON-RPC dispatcher ───────────────────────────────────────────────────

async fn handle_jsonrpc(
    State(state): State<SharedSession>,
    Json(req): Json<JsonRpcRequest>,
) -> impl IntoResponse {
    let response = match req.method.as_str() {
        "initialize" => handle_initialize(req.id),
        // Notification; acknowledged with an empty result
        "initialized" | "notifications/initialized" => JsonRpcResponse::success(req.id, json!({})),
        "tools/list" => handle_tools_list(req.id),
        "tools/call" => handle_tools_call(req.id, req.params, &state).await,
        "resources/list" => handle_resources_list(req.id, &state).await,
        "resources/read" => handle_resources_read(req.id, req.params, &state).await,
        _ => JsonRpcResponse::error(
            req.id,
            METHOD_NOT_FOUND,
            format!("Method not found: {}", req.method),
        ),
    };

    Json(response)
}

// ─── Method handlers ────────────────────────────────────────────────────────

fn handle_initialize(id: Option<Value>) -> JsonRpcResponse {
    JsonRpcResponse::success(
        id,
        json!({
            "protocolVersion": "2024-11-05",
            "capabilities": {
                "tools": { "listChanged": false },
                "resources": { "listChanged": false },
            },
            "serverInfo": {
                "name": "rinse",
                "version": env!("CARGO_PKG_VERSION"),
            },
        }),
    )
}

fn column_property() -> Value {
    json!({ "type": "string", "description": "Current name of the column" })
}

fn tool_descriptors() -> Vec<ToolDescriptor> {
    vec![
        ToolDescriptor {
            name: "load_csv",
            description: "Load CSV text into the session. Loading a different file discards \
                          the current dataset and log; loading the same file again does nothing.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "content": { "type": "string", "description": "Raw CSV text" },
                    "name": {
                        "type": "string",
                        "description": "File name used to tell uploads apart"
                    }
                },
                "required": ["content"]
            }),
        },
        ToolDescriptor {
            name: "dataset_overview",
            description: "Shape, column types, duplicate count, missing values per column \
                          and a preview of the first rows.",
            input_schema: json!({ "type": "object", "properties": {} }),
        },
        ToolDescriptor {
            name: "reset",
            description: "Discard the dataset, column names and operation log.",
            input_schema: json!({ "type": "object", "properties": {} }),
        },
        ToolDescriptor {
            name: "export_csv",
            description: "Serialize the current dataset to CSV.",
            input_schema: json!({ "type": "object", "properties": {} }),
        },
        ToolDescriptor {
            name: "convert_type",
            description: "Convert a column to numeric, datetime or categorical. Values that \
                          cannot be converted become missing.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "column": column_property(),
                    "target": { "type": "string", "enum": ["numeric", "timestamp", "categorical"] }
                },
                "required": ["column", "target"]
            }),
        },
        ToolDescriptor {
            name: "rename_columns",
            description: "Trim every column name, then apply a bulk transform.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "transform": {
                        "type": "string",
                        "enum": ["capitalize", "uppercase", "lowercase", "spaces_to_underscore"]
                    }
                },
                "required": ["transform"]
            }),
        },
        ToolDescriptor {
            name: "rename_column",
            description: "Rename a single column.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "column": column_property(),
                    "new_name": { "type": "string" }
                },
                "required": ["column", "new_name"]
            }),
        },
        ToolDescriptor {
            name: "remove_duplicates",
            description: "Drop rows that repeat an earlier row, keeping first occurrences.",
            input_schema: json!({ "type": "object", "properties": {} }),
        },
        ToolDescriptor {
            name: "drop_columns_with_missing",
            description: "Drop every column that contains a missing value.",
            input_schema: json!({ "type": "object", "properties": {} }),
        },
        ToolDescriptor {
            name: "drop_rows_with_missing",
            description: "Drop every row that contains a missing value.",
            input_schema: json!({ "type": "object", "properties": {} }),
        },
        ToolDescriptor {
            name: "fill_missing",
            description: "Fill the missing values of one column.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "column": column_property(),
                    "strategy": {
                        "type": "string",
                        "enum": ["zero", "mean", "median", "mode", "forward_fill", "backward_fill"]
                    }
                },
                "required": ["column", "strategy"]
            }),
        },
    ]
}

fn handle_tools_list(id: Option<Value>) -> JsonRpcResponse {
    JsonRpcResponse::success(id, json!({ "tools": tool_descriptors() }))
}

async fn handle_tools_call(
    id: Option<Value>,
    params: Value,
    state: &SharedSession,
) -> JsonRpcResponse {
    let tool_name = match params.get("name").and_then(|v| v.as_str()) {
        Some(name) => name.to_string(),
        None => return JsonRpcResponse::error(id, INVALID_PARAMS, "Missing tool name".into()),
    };
    let arguments = match params.get("arguments") {
        Some(Value::Object(map)) => map.clone(),
        Some(Value::Null) | None => serde_json::Map::new(),
        Some(_) => {
            return JsonRpcResponse::error(id, INVALID_PARAMS, "arguments must be an object".into())
        }
    };

    match tool_name.as_str() {
        "load_csv" => tool_load_csv(id, arguments, state).await,
        "dataset_overview" => tool_dataset_overview(id, state).await,
        "reset" => {
            state.write().await.reset();
            tool_result(id, "Session reset".into(), false, None)
        }
        "export_csv" => tool_export_csv(id, state).await,
        _ => {
            // Operation tools: the tool name is the operation tag
            let mut tagged = arguments;
            tagged.insert("op".into(), Value::String(tool_name.clone()));
            match serde_json::from_value::<Operation>(Value::Object(tagged)) {
                Ok(op) => tool_apply(id, op, state).await,
                Err(_) if !tool_descriptors().iter().any(|t| t.name == tool_name) => {
                    let message = format!("Unknown tool: {}", tool_name);
                    JsonRpcResponse::error(id, INVALID_PARAMS, message)
                }
                Err(e) => JsonRpcResponse::error(
                    id,
                    INVALID_PARAMS,
                    format!("Invalid arguments for {}: {}", tool_name, e),
                ),
            }
        }
    }
}

/// `load_csv` - present an upload to the session.
async fn tool_load_csv(
    id: Option<Value>,
    args: serde_json::Map<String, Value>,
    state: &SharedSession,
) -> JsonRpcResponse {
    let content = match args.get("content").and_then(|v| v.as_str()) {
        Some(c) => c.to_string(),
        None => {
            let message = "Missing required parameter: content".to_string();
            return JsonRpcResponse::error(id, INVALID_PARAMS, message);
        }
    };
    let name = args
        .get("name")
        .and_then(|v| v.as_str())
        .unwrap_or("upload.csv")
        .to_string();

    let upload = Upload::from_bytes(name.clone(), content.into_bytes());
    let mut session = state.clone().write_owned().await;

    // Parsing is CPU-bound; keep it off the async workers
    let result = tokio::task::spawn_blocking(move || session.load(&upload)).await;

    match result {
        Ok(Ok(outcome)) => {
            let text = match &outcome {
                LoadOutcome::Loaded { rows, columns } => {
                    format!("Loaded {}: {} rows, {} columns", name, rows, columns)
                }
                LoadOutcome::Unchanged => format!("{} is already loaded", name),
            };
            tool_result(id, text, false, serde_json::to_value(&outcome).ok())
        }
        Ok(Err(e)) => tool_result(id, e.to_string(), true, None),
        Err(e) => JsonRpcResponse::error(id, INTERNAL_ERROR, format!("Task join error: {}", e)),
    }
}

/// Operation tools - apply one operation under the write lock.
async fn tool_apply(id: Option<Value>, op: Operation, state: &SharedSession) -> JsonRpcResponse {
    let mut session = state.clone().write_owned().await;
    let result = tokio::task::spawn_blocking(move || session.apply(op)).await;

    match result {
        Ok(Ok(report)) => {
            let metadata = serde_json::to_value(&report).ok();
            tool_result(id, report.to_string(), false, metadata)
        }
        Ok(Err(e)) => tool_result(id, e.to_string(), true, None),
        Err(e) => JsonRpcResponse::error(id, INTERNAL_ERROR, format!("Task join error: {}", e)),
    }
}

/// `dataset_overview` - text summary plus structured metadata.
async fn tool_dataset_overview(id: Option<Value>, state: &SharedSession) -> JsonRpcResponse {
    let session = state.read().await;
    match session.overview() {
        Ok(overview) => {
            let metadata = serde_json::to_value(&overview).ok();
            tool_result(id, overview.to_string(), false, metadata)
        }
        Err(e) => tool_result(id, e.to_string(), true, None),
    }
}

/// `export_csv` - the CSV text of the current dataset.
async fn tool_export_csv(id: Option<Value>, state: &SharedSession) -> JsonRpcResponse {
    let session = state.read().await;
    match session.export() {
        Ok(export) => {
            let metadata = json!({ "filename": export.filename, "size_bytes": export.bytes.len() });
            let text = String::from_utf8_lossy(&export.bytes).into_owned();
            tool_result(id, text, false, Some(metadata))
        }
        Err(e) => tool_result(id, e.to_string(), true, None),
    }
}

/// `resources/list` - the export is listed only while a dataset is loaded.
async fn handle_resources_list(id: Option<Value>, state: &SharedSession) -> JsonRpcResponse {
    let session = state.read().await;

    let resources: Vec<Value> = match session.dataset() {
        Some(ds) => vec![json!({
            "uri": EXPORT_URI,
            "name": session.config().export_filename,
            "description": format!(
                "Current dataset as CSV ({} rows, {} columns)",
                ds.row_count(),
                ds.column_count()
            ),
            "mimeType": "text/csv",
        })],
        None => Vec::new(),
    };

    JsonRpcResponse::success(id, json!({ "resources": resources }))
}

/// `resources/read` - return the current export.
async fn handle_resources_read(
    id: Option<Value>,
    params: Value,
    state: &SharedSession,
) -> JsonRpcResponse {
    let uri = params.get("uri").and_then(|v| v.as_str()).unwrap_or("");
    if uri != EXPORT_URI {
        return JsonRpcResponse::error(id, INVALID_PARAMS, format!("Unknown resource: {}", uri));
    }

    let session = state.read().await;
    match session.export() {
        Ok(export) => JsonRpcResponse::success(
            id,
            json!({
                "contents": [{
                    "uri": EXPORT_URI,
                    "mimeType": "text/csv",
                    "text": String::from_utf8_lossy(&export.bytes),
                }]
            }),
        ),
        Err(e) => JsonRpcResponse::error(id, INTERNAL_ERROR, e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    fn new_state() -> SharedSession {
        Arc::new(RwLock::new(Session::default()))
    }

    async fn rpc(state: &SharedSession, method: &str, params: Value) -> Value {
        let body = json!({ "jsonrpc": "2.0", "id": 1, "method": method, "params": params });
        let request = Request::builder()
            .method("POST")
            .uri("/")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();

        let response = build_router(state.clone()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn call(state: &SharedSession, tool: &str, arguments: Value) -> Value {
        rpc(state, "tools/call", json!({ "name": tool, "arguments": arguments })).await
    }

    fn text_of(response: &Value) -> &str {
        response["result"]["content"][0]["text"].as_str().unwrap()
    }

    #[test]
    fn test_jsonrpc_response_error() {
        let resp = JsonRpcResponse::error(Some(json!(1)), -32600, "Invalid request".into());
        assert!(resp.result.is_none());
        assert_eq!(resp.error.unwrap().code, -32600);
    }

    #[test]
    fn test_every_operation_has_a_tool() {
        let names: Vec<&str> = tool_descriptors().iter().map(|t| t.name).collect();
        for op in [
            "convert_type",
            "rename_columns",
            "rename_column",
            "remove_duplicates",
            "drop_columns_with_missing",
            "drop_rows_with_missing",
            "fill_missing",
        ] {
            assert!(names.contains(&op), "missing tool {op}");
        }
    }

    #[tokio::test]
    async fn test_health() {
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let response = build_router(new_state()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let state = new_state();
        let response = rpc(&state, "tools/explode", json!({})).await;
        assert_eq!(response["error"]["code"], METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_clean_through_tools() {
        let state = new_state();

        let response = call(
            &state,
            "load_csv",
            json!({ "content": "Name,Age\nAlice,30\nBob,\nAlice,30\n", "name": "people.csv" }),
        )
        .await;
        assert_eq!(response["result"]["isError"], false);
        assert_eq!(text_of(&response), "Loaded people.csv: 3 rows, 2 columns");

        call(&state, "remove_duplicates", json!({})).await;
        let args = json!({ "column": "Age", "strategy": "mean" });
        let response = call(&state, "fill_missing", args).await;
        assert_eq!(response["result"]["isError"], false);

        let response = call(&state, "export_csv", json!({})).await;
        assert_eq!(text_of(&response), "Name,Age\nAlice,30.0\nBob,30.0\n");
        assert_eq!(response["result"]["metadata"]["filename"], "updated_data_web_app.csv");

        let response = rpc(&state, "resources/read", json!({ "uri": EXPORT_URI })).await;
        assert_eq!(
            response["result"]["contents"][0]["text"],
            "Name,Age\nAlice,30.0\nBob,30.0\n"
        );
    }

    #[tokio::test]
    async fn test_rejected_operation_is_tool_error() {
        let state = new_state();
        call(&state, "load_csv", json!({ "content": "a,b\n1,2\n" })).await;

        let args = json!({ "column": "a", "new_name": "" });
        let response = call(&state, "rename_column", args).await;
        assert_eq!(response["result"]["isError"], true);
        assert_eq!(text_of(&response), "Column names cannot be empty");

        let session = state.read().await;
        assert_eq!(session.column_names().unwrap(), &["a", "b"]);
    }

    #[tokio::test]
    async fn test_operation_before_load() {
        let state = new_state();
        let response = call(&state, "drop_rows_with_missing", json!({})).await;
        assert_eq!(response["result"]["isError"], true);

        let response = rpc(&state, "resources/list", json!({})).await;
        assert_eq!(response["result"]["resources"].as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_bad_arguments() {
        let state = new_state();
        let args = json!({ "column": "Age", "strategy": "average" });
        let response = call(&state, "fill_missing", args).await;
        assert_eq!(response["error"]["code"], INVALID_PARAMS);

        let response = call(&state, "launch", json!({})).await;
        assert_eq!(response["error"]["code"], INVALID_PARAMS);
        assert_eq!(response["error"]["message"], "Unknown tool: launch");
    }

    #[tokio::test]
    async fn test_reset_tool() {
        let state = new_state();
        call(&state, "load_csv", json!({ "content": "a\n1\n" })).await;
        call(&state, "reset", json!({})).await;
        assert!(!state.read().await.is_loaded());
    }
}
