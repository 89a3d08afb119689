//! MCP server for Ollama model management
//!
//! - Serves MCP over stdio (newline-delimited JSON-RPC 2.0)
//! - Declares ten tools mapping one-to-one onto Ollama REST endpoints
//! - Forwards per-call progress/error notifications as
//!   `notifications/message`

use clap::Parser;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;

use crate::ollama::{OllamaClient, ToolContext, DEFAULT_OLLAMA_URL, DEFAULT_PS_PATH};

// -----------------------------------------------------------------------------
// CLI
// -----------------------------------------------------------------------------

#[derive(Parser, Debug, Clone)]
#[command(name = "ollama-mcp-server", about = "MCP server for the Ollama API")]
pub struct CliArgs {
    /// Base URL of the Ollama daemon
    #[arg(long, env = "OLLAMA_API_URL", default_value = DEFAULT_OLLAMA_URL)]
    pub ollama_url: String,
    /// Endpoint for the running-models listing; this route has moved
    /// between Ollama releases, so it is configurable
    #[arg(long, env = "OLLAMA_PS_PATH", default_value = DEFAULT_PS_PATH)]
    pub ps_path: String,
}

impl Default for CliArgs {
    fn default() -> Self {
        Self {
            ollama_url: DEFAULT_OLLAMA_URL.to_string(),
            ps_path: DEFAULT_PS_PATH.to_string(),
        }
    }
}

// -----------------------------------------------------------------------------
// JSON-RPC structs (MCP)
// -----------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: &'static str,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

#[derive(Debug, Serialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

#[derive(Debug, Serialize)]
struct Tool {
    name: String,
    description: String,
    #[serde(rename = "inputSchema")]
    input_schema: Value,
}

// -----------------------------------------------------------------------------
// Notification context
// -----------------------------------------------------------------------------

/// [`ToolContext`] backed by the outbound stdout channel: info/error
/// reports become MCP `notifications/message` lines.
pub struct NotifyContext {
    tx: mpsc::UnboundedSender<String>,
}

impl NotifyContext {
    pub fn new(tx: mpsc::UnboundedSender<String>) -> Self {
        Self { tx }
    }

    fn send(&self, level: &str, message: &str) {
        let notification = json!({
            "jsonrpc": "2.0",
            "method": "notifications/message",
            "params": {
                "level": level,
                "logger": "ollama",
                "data": message,
            }
        });
        // A closed channel means the session is shutting down; nothing
        // useful to do with the report at that point.
        let _ = self.tx.send(notification.to_string());
    }
}

impl ToolContext for NotifyContext {
    fn info(&self, message: &str) {
        self.send("info", message);
    }

    fn error(&self, message: &str) {
        self.send("error", message);
    }
}

// -----------------------------------------------------------------------------
// Entry point
// -----------------------------------------------------------------------------

pub async fn run_with_args(args: CliArgs) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let client = OllamaClient::new(&args.ollama_url, &args.ps_path);

    eprintln!(
        "[ollama-mcp-server] starting (ollama_url={}, ps_path={})",
        client.base_url(),
        args.ps_path
    );

    run_stdio_loop(client).await?;
    Ok(())
}

// -----------------------------------------------------------------------------
// MCP stdio loop
// -----------------------------------------------------------------------------

async fn run_stdio_loop(client: OllamaClient) -> io::Result<()> {
    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();

    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    // Writer task owns stdout; responses and notifications from
    // concurrent tool calls are serialized through the channel.
    let writer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(line) = rx.recv().await {
            if stdout.write_all(line.as_bytes()).await.is_err() {
                break;
            }
            if stdout.write_all(b"\n").await.is_err() {
                break;
            }
            if stdout.flush().await.is_err() {
                break;
            }
        }
    });

    eprintln!("[ollama-mcp-server] stdio MCP loop ready on stdin/stdout");

    while let Some(line) = lines.next_line().await? {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        match serde_json::from_str::<JsonRpcRequest>(trimmed) {
            Ok(request) => {
                eprintln!("[ollama-mcp-server] MCP recv: {}", request.method);
                if request.method == "tools/call" {
                    // Each call runs on its own task so a slow remote
                    // generation does not block other invocations.
                    let client = client.clone();
                    let tx = tx.clone();
                    tokio::spawn(async move {
                        if let Some(response) = handle_request(request, &client, &tx).await {
                            send_response(&tx, response);
                        }
                    });
                } else if let Some(response) = handle_request(request, &client, &tx).await {
                    send_response(&tx, response);
                }
            }
            Err(e) => {
                eprintln!("[ollama-mcp-server] parse error: {}", e);
                send_response(
                    &tx,
                    JsonRpcResponse {
                        jsonrpc: "2.0",
                        id: Value::Null,
                        result: None,
                        error: Some(JsonRpcError {
                            code: -32700,
                            message: format!("Parse error: {}", e),
                            data: None,
                        }),
                    },
                );
            }
        }
    }

    drop(tx);
    let _ = writer.await;
    Ok(())
}

fn send_response(tx: &mpsc::UnboundedSender<String>, response: JsonRpcResponse) {
    let line = serde_json::to_string(&response).unwrap_or_else(|e| {
        format!(
            "{{\"jsonrpc\":\"2.0\",\"id\":null,\"error\":{{\"code\":-32000,\"message\":\"Serialize error: {}\"}}}}",
            e
        )
    });
    let _ = tx.send(line);
}

pub async fn handle_request(
    request: JsonRpcRequest,
    client: &OllamaClient,
    tx: &mpsc::UnboundedSender<String>,
) -> Option<JsonRpcResponse> {
    // Notifications carry no id and receive no reply.
    if request.id.is_none() {
        return None;
    }
    let id = request.id.unwrap_or(Value::Null);

    match request.method.as_str() {
        "initialize" => Some(JsonRpcResponse {
            jsonrpc: "2.0",
            id,
            result: Some(json!({
                "protocolVersion": "2024-11-05",
                "capabilities": {"tools": {}, "logging": {}},
                "serverInfo": {
                    "name": "ollama-mcp-server",
                    "version": env!("CARGO_PKG_VERSION"),
                }
            })),
            error: None,
        }),
        "tools/list" => {
            let tools = get_tools();
            Some(JsonRpcResponse {
                jsonrpc: "2.0",
                id,
                result: Some(json!({ "tools": tools })),
                error: None,
            })
        }
        "tools/call" => {
            let params = request.params.unwrap_or(json!({}));
            let tool_name = params.get("name").and_then(|v| v.as_str()).unwrap_or("");
            let arguments = params.get("arguments").cloned().unwrap_or(json!({}));

            let ctx = NotifyContext::new(tx.clone());
            let (text, is_error) = match execute_tool(client, tool_name, &arguments, &ctx).await {
                // Remote failures come back through the Ok path as
                // "Error: ..." strings per the adapter's contract.
                Ok(result) => {
                    let failed = result.starts_with("Error: ");
                    (result, failed)
                }
                Err(error) => (error, true),
            };

            Some(JsonRpcResponse {
                jsonrpc: "2.0",
                id,
                result: Some(json!({
                    "content": [{ "type": "text", "text": text }],
                    "isError": is_error
                })),
                error: None,
            })
        }
        _ => Some(JsonRpcResponse {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(JsonRpcError {
                code: -32601,
                message: format!("Method not found: {}", request.method),
                data: None,
            }),
        }),
    }
}

// -----------------------------------------------------------------------------
// Tooling
// -----------------------------------------------------------------------------

fn name_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "name": {"type": "string", "description": "Name of the model"}
        },
        "required": ["name"]
    })
}

fn get_tools() -> Vec<Tool> {
    vec![
        Tool {
            name: "create".to_string(),
            description: "Create a model from a Modelfile.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "name": {"type": "string", "description": "Name for the new model"},
                    "modelfile": {"type": "string", "description": "Contents of the Modelfile"}
                },
                "required": ["name", "modelfile"]
            }),
        },
        Tool {
            name: "show".to_string(),
            description: "Show information for a model.".to_string(),
            input_schema: name_schema(),
        },
        Tool {
            name: "run".to_string(),
            description: "Run a model against a prompt, with optional generation parameters."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "name": {"type": "string", "description": "Name of the model to run"},
                    "prompt": {"type": "string", "description": "Prompt to send to the model"}
                },
                "required": ["name", "prompt"],
                "additionalProperties": {
                    "type": ["string", "number", "boolean"],
                    "description": "Extra generation parameters forwarded to the API as-is"
                }
            }),
        },
        Tool {
            name: "stop".to_string(),
            description: "Stop a running model.".to_string(),
            input_schema: name_schema(),
        },
        Tool {
            name: "pull".to_string(),
            description: "Pull a model from a registry.".to_string(),
            input_schema: name_schema(),
        },
        Tool {
            name: "push".to_string(),
            description: "Push a model to a registry.".to_string(),
            input_schema: name_schema(),
        },
        Tool {
            name: "list_models".to_string(),
            description: "List all available models.".to_string(),
            input_schema: json!({"type": "object", "properties": {}}),
        },
        Tool {
            name: "ps".to_string(),
            description: "List running models.".to_string(),
            input_schema: json!({"type": "object", "properties": {}}),
        },
        Tool {
            name: "cp".to_string(),
            description: "Copy a model.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "source": {"type": "string", "description": "Model to copy from"},
                    "destination": {"type": "string", "description": "Name of the copy"}
                },
                "required": ["source", "destination"]
            }),
        },
        Tool {
            name: "rm".to_string(),
            description: "Remove a model.".to_string(),
            input_schema: name_schema(),
        },
    ]
}

pub async fn execute_tool(
    client: &OllamaClient,
    name: &str,
    args: &Value,
    ctx: &dyn ToolContext,
) -> Result<String, String> {
    match name {
        "create" => {
            let model = require_str(args, "name")?;
            let modelfile = require_str(args, "modelfile")?;
            Ok(client.create_model(model, modelfile, ctx).await)
        }
        "show" => Ok(client.show_model(require_str(args, "name")?, ctx).await),
        "run" => {
            let model = require_str(args, "name")?;
            let prompt = require_str(args, "prompt")?;
            let params = extra_params(args, &["name", "prompt"])?;
            Ok(client.run_model(model, prompt, &params, ctx).await)
        }
        "stop" => Ok(client.stop_model(require_str(args, "name")?, ctx).await),
        "pull" => Ok(client.pull_model(require_str(args, "name")?, ctx).await),
        "push" => Ok(client.push_model(require_str(args, "name")?, ctx).await),
        "list_models" => Ok(client.list_models(ctx).await),
        "ps" => Ok(client.list_running(ctx).await),
        "cp" => {
            let source = require_str(args, "source")?;
            let destination = require_str(args, "destination")?;
            Ok(client.copy_model(source, destination, ctx).await)
        }
        "rm" => Ok(client.remove_model(require_str(args, "name")?, ctx).await),
        _ => Err(format!("Unknown tool: {}", name)),
    }
}

fn require_str<'a>(args: &'a Value, key: &str) -> Result<&'a str, String> {
    args.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| format!("Missing required parameter: {}", key))
}

/// Collect the free-form extra parameters of `run`. The accepted set is
/// not enumerated here (the remote API owns it), but values must be
/// scalars: string, number, or boolean.
fn extra_params(args: &Value, reserved: &[&str]) -> Result<Map<String, Value>, String> {
    let mut params = Map::new();
    if let Some(object) = args.as_object() {
        for (key, value) in object {
            if reserved.contains(&key.as_str()) {
                continue;
            }
            if !(value.is_string() || value.is_number() || value.is_boolean()) {
                return Err(format!(
                    "Parameter {} must be a string, number, or boolean",
                    key
                ));
            }
            params.insert(key.clone(), value.clone());
        }
    }
    Ok(params)
}
