//! HTTP client for the Ollama model-serving API.
//!
//! Every operation is a single request/response round trip against
//! `{base_url}/{endpoint}`: one fresh connection, no pooling, no retry,
//! no timeout (model pulls and generations can legitimately take a long
//! time). Failures of any kind (transport error, non-2xx status,
//! malformed JSON) are reported through the caller's [`ToolContext`]
//! and folded into an `Error: ...` result string; they never cross the
//! operation boundary as faults.

use reqwest::Method;
use serde_json::{json, Map, Value};

/// Default Ollama API endpoint
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Default route for the running-models listing. Ollama has moved this
/// route between releases, so it stays configurable (`--ps-path` /
/// `OLLAMA_PS_PATH`) instead of being hard-coded.
pub const DEFAULT_PS_PATH: &str = "running";

/// Placeholder returned when a generate response carries no text.
pub const NO_RESPONSE_PLACEHOLDER: &str = "No response generated";

/// Per-call progress/error reporting channel supplied by the host.
///
/// Injected as a capability so the translation logic is testable
/// without a live MCP session.
pub trait ToolContext: Send + Sync {
    fn info(&self, message: &str);
    fn error(&self, message: &str);
}

/// Client for the Ollama HTTP API.
///
/// Holds only immutable configuration, so one instance can be shared
/// freely across concurrent tool calls.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    base_url: String,
    ps_path: String,
}

impl OllamaClient {
    pub fn new(base_url: &str, ps_path: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            ps_path: ps_path.to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Perform one HTTP call and parse the JSON body.
    async fn request(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<Value>,
    ) -> Result<Value, String> {
        let url = format!("{}/{}", self.base_url, endpoint);
        let client = reqwest::Client::new();
        let mut request = client.request(method, &url);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await.map_err(|e| e.to_string())?;
        let status = response.status();
        if !status.is_success() {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(format!("HTTP {}: {}", status, text));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| format!("Invalid JSON response: {}", e))
    }

    /// Create a model from a Modelfile.
    pub async fn create_model(
        &self,
        name: &str,
        modelfile: &str,
        ctx: &dyn ToolContext,
    ) -> String {
        ctx.info(&format!("Creating model {} from Modelfile", name));
        match self
            .request(
                Method::POST,
                "create",
                Some(json!({"name": name, "modelfile": modelfile})),
            )
            .await
        {
            Ok(_) => format!("Model {} created successfully", name),
            Err(e) => {
                ctx.error(&format!("Error creating model: {}", e));
                format!("Error: {}", e)
            }
        }
    }

    /// Show information for a model.
    pub async fn show_model(&self, name: &str, ctx: &dyn ToolContext) -> String {
        ctx.info(&format!("Fetching information for model {}", name));
        let endpoint = format!("show?name={}", urlencoding::encode(name));
        match self.request(Method::GET, &endpoint, None).await {
            Ok(response) => pretty(&response),
            Err(e) => {
                ctx.error(&format!("Error showing model info: {}", e));
                format!("Error: {}", e)
            }
        }
    }

    /// Run a model against a prompt. Extra generation parameters are an
    /// open map merged into the request body after `model`/`prompt`;
    /// the dispatch layer has already checked they are scalars.
    pub async fn run_model(
        &self,
        name: &str,
        prompt: &str,
        params: &Map<String, Value>,
        ctx: &dyn ToolContext,
    ) -> String {
        ctx.info(&format!("Running model {}", name));
        let mut body = Map::new();
        body.insert("model".to_string(), json!(name));
        body.insert("prompt".to_string(), json!(prompt));
        for (key, value) in params {
            body.insert(key.clone(), value.clone());
        }

        match self
            .request(Method::POST, "generate", Some(Value::Object(body)))
            .await
        {
            Ok(response) => response
                .get("response")
                .and_then(Value::as_str)
                .unwrap_or(NO_RESPONSE_PLACEHOLDER)
                .to_string(),
            Err(e) => {
                ctx.error(&format!("Error running model: {}", e));
                format!("Error: {}", e)
            }
        }
    }

    /// Stop a running model.
    pub async fn stop_model(&self, name: &str, ctx: &dyn ToolContext) -> String {
        ctx.info(&format!("Stopping model {}", name));
        let endpoint = format!("stop?name={}", urlencoding::encode(name));
        match self.request(Method::POST, &endpoint, None).await {
            Ok(_) => format!("Model {} stopped successfully", name),
            Err(e) => {
                ctx.error(&format!("Error stopping model: {}", e));
                format!("Error: {}", e)
            }
        }
    }

    /// Pull a model from a registry.
    pub async fn pull_model(&self, name: &str, ctx: &dyn ToolContext) -> String {
        ctx.info(&format!("Pulling model {}", name));
        match self
            .request(Method::POST, "pull", Some(json!({"name": name})))
            .await
        {
            Ok(_) => format!("Model {} pulled successfully", name),
            Err(e) => {
                ctx.error(&format!("Error pulling model: {}", e));
                format!("Error: {}", e)
            }
        }
    }

    /// Push a model to a registry.
    pub async fn push_model(&self, name: &str, ctx: &dyn ToolContext) -> String {
        ctx.info(&format!("Pushing model {}", name));
        match self
            .request(Method::POST, "push", Some(json!({"name": name})))
            .await
        {
            Ok(_) => format!("Model {} pushed successfully", name),
            Err(e) => {
                ctx.error(&format!("Error pushing model: {}", e));
                format!("Error: {}", e)
            }
        }
    }

    /// List all models. Unwraps the `models` field of the response;
    /// an absent field renders as an empty array.
    pub async fn list_models(&self, ctx: &dyn ToolContext) -> String {
        ctx.info("Listing models");
        match self.request(Method::GET, "tags", None).await {
            Ok(response) => {
                let models = response.get("models").cloned().unwrap_or_else(|| json!([]));
                pretty(&models)
            }
            Err(e) => {
                ctx.error(&format!("Error listing models: {}", e));
                format!("Error: {}", e)
            }
        }
    }

    /// List running models.
    pub async fn list_running(&self, ctx: &dyn ToolContext) -> String {
        ctx.info("Listing running models");
        match self.request(Method::GET, &self.ps_path, None).await {
            Ok(response) => pretty(&response),
            Err(e) => {
                ctx.error(&format!("Error listing running models: {}", e));
                format!("Error: {}", e)
            }
        }
    }

    /// Copy a model.
    pub async fn copy_model(
        &self,
        source: &str,
        destination: &str,
        ctx: &dyn ToolContext,
    ) -> String {
        ctx.info(&format!("Copying model from {} to {}", source, destination));
        match self
            .request(
                Method::POST,
                "copy",
                Some(json!({"source": source, "destination": destination})),
            )
            .await
        {
            Ok(_) => format!(
                "Model copied from {} to {} successfully",
                source, destination
            ),
            Err(e) => {
                ctx.error(&format!("Error copying model: {}", e));
                format!("Error: {}", e)
            }
        }
    }

    /// Remove a model.
    pub async fn remove_model(&self, name: &str, ctx: &dyn ToolContext) -> String {
        ctx.info(&format!("Removing model {}", name));
        let endpoint = format!("delete?name={}", urlencoding::encode(name));
        match self.request(Method::DELETE, &endpoint, None).await {
            Ok(_) => format!("Model {} removed successfully", name),
            Err(e) => {
                ctx.error(&format!("Error removing model: {}", e));
                format!("Error: {}", e)
            }
        }
    }
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("Error: {}", e))
}
