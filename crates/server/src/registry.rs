//! Name -> tool routing for the MCP surface.
//!
//! Every registered tool pairs its advertised rmcp [`Tool`] with the [`ArgumentValidator`] for its
//! input schema and the [`ToolHandler`] that runs the call. Arguments that fail
//! validation are rejected with `invalid_params` and never reach a handler.

use async_trait::async_trait;
use rmcp::ErrorData as McpError;
use rmcp::model::{CallToolResult, Content, JsonObject, Tool};
use serde_json::{Value, json};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use victualia_openapi_tools::semantics::local_read_only;
use victualia_openapi_tools::{
    ApiResponse, ArgumentValidator, Catalog, EndpointDescriptor, IssueKind, OpenApiToolSource,
    ToolInputSchema, ValidationErrors,
};

pub const LIST_ENDPOINTS_TOOL: &str = "list_endpoints";
pub const API_INFO_TOOL: &str = "api_info";

/// Runs one tool call with arguments that already passed validation.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn invoke(&self, arguments: JsonObject) -> CallToolResult;
}

struct RegisteredTool {
    tool: Tool,
    validator: ArgumentValidator,
    handler: Arc<dyn ToolHandler>,
}

/// All tools exposed for one catalog snapshot.
pub struct ToolRegistry {
    tools: Vec<RegisteredTool>,
    by_name: HashMap<String, usize>,
}

impl ToolRegistry {
    /// Register the utility tools plus one tool per catalog endpoint.
    ///
    /// Utility names are reserved first; endpoint names that collide with an earlier tool get a
    /// numeric suffix (`_1`, `_2`, ...).
    #[must_use]
    pub fn new(source: &OpenApiToolSource, catalog: &Catalog) -> Self {
        let mut names: HashSet<String> = HashSet::new();
        names.insert(LIST_ENDPOINTS_TOOL.to_string());
        names.insert(API_INFO_TOOL.to_string());

        let mut summaries = Vec::with_capacity(catalog.len());
        let mut endpoint_tools = Vec::with_capacity(catalog.len());
        for entry in catalog.entries() {
            let name = reserve_unique_tool_name(&mut names, &entry.endpoint.name);
            if name != entry.endpoint.name {
                tracing::warn!(
                    tool = %entry.endpoint.name,
                    renamed = %name,
                    path = %entry.endpoint.path,
                    "Duplicate tool name; registering under a suffixed name"
                );
            }

            summaries.push(EndpointSummary::new(&name, &entry.endpoint));
            endpoint_tools.push(RegisteredTool {
                tool: entry.to_tool(&name),
                validator: entry.validator.clone(),
                handler: Arc::new(EndpointHandler {
                    source: source.clone(),
                    endpoint: entry.endpoint.clone(),
                }),
            });
        }

        let mut info = json!({
            "title": catalog.info().title,
            "version": catalog.info().version,
            "baseUrl": source.base_url(),
            "totalEndpoints": catalog.len(),
        });
        if let Some(description) = &catalog.info().description {
            info["description"] = json!(description);
        }

        let mut tools = vec![
            utility_tool(
                LIST_ENDPOINTS_TOOL,
                "List all available Victualia API endpoints with their methods and paths",
                "List endpoints",
                Arc::new(ListEndpointsHandler { endpoints: summaries }),
            ),
            utility_tool(
                API_INFO_TOOL,
                "Get information about the Victualia API",
                "API info",
                Arc::new(ApiInfoHandler { info }),
            ),
        ];
        tools.extend(endpoint_tools);

        let by_name = tools
            .iter()
            .enumerate()
            .map(|(idx, t)| (t.tool.name.to_string(), idx))
            .collect();
        Self { tools, by_name }
    }

    #[must_use]
    pub fn list_tools(&self) -> Vec<Tool> {
        self.tools.iter().map(|t| t.tool.clone()).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Validate `arguments` and run the named tool.
    ///
    /// # Errors
    ///
    /// Returns `invalid_params` for an unknown tool or arguments that fail validation.
    pub async fn call(
        &self,
        name: &str,
        arguments: Option<JsonObject>,
    ) -> Result<CallToolResult, McpError> {
        let Some(registered) = self.by_name.get(name).map(|&idx| &self.tools[idx]) else {
            return Err(McpError::invalid_params(format!("unknown tool: {name}"), None));
        };

        let arguments = arguments.unwrap_or_default();
        let validated = registered
            .validator
            .parse_arguments(&arguments)
            .map_err(|e| invalid_arguments(name, &e))?;

        Ok(registered.handler.invoke(validated).await)
    }
}

fn utility_tool(
    name: &str,
    description: &str,
    title: &str,
    handler: Arc<dyn ToolHandler>,
) -> RegisteredTool {
    let input_schema = ToolInputSchema::default();
    let mut tool = Tool::new(
        name.to_string(),
        description.to_string(),
        Arc::new(input_schema.to_json_schema()),
    );
    tool.annotations = Some(local_read_only(title));
    RegisteredTool {
        tool,
        validator: ArgumentValidator::new(input_schema),
        handler,
    }
}

fn reserve_unique_tool_name(tool_names: &mut HashSet<String>, base: &str) -> String {
    if tool_names.insert(base.to_string()) {
        return base.to_string();
    }

    let mut counter = 1;
    loop {
        let candidate = format!("{base}_{counter}");
        if tool_names.insert(candidate.clone()) {
            return candidate;
        }
        counter += 1;
    }
}

fn invalid_arguments(tool: &str, errors: &ValidationErrors) -> McpError {
    let violations: Vec<Value> = errors
        .issues()
        .iter()
        .map(|issue| match issue.kind {
            IssueKind::MissingRequired => json!({
                "type": "missing-required-parameter",
                "parameter": issue
                    .instance_path
                    .trim_start_matches('/')
                    .replace("~1", "/")
                    .replace("~0", "~"),
            }),
            IssueKind::Constraint => json!({
                "type": "constraint-violation",
                "message": issue.message,
                "instancePath": issue.instance_path,
            }),
        })
        .collect();

    McpError::invalid_params(
        format!("Invalid params for '{tool}': {errors}"),
        Some(json!({ "violations": violations })),
    )
}

// ============================================================================
// Handlers
// ============================================================================

struct EndpointHandler {
    source: OpenApiToolSource,
    endpoint: EndpointDescriptor,
}

#[async_trait]
impl ToolHandler for EndpointHandler {
    async fn invoke(&self, arguments: JsonObject) -> CallToolResult {
        match self.source.dispatch(&self.endpoint, &arguments).await {
            Ok(response) => response_result(&response),
            Err(e) => {
                tracing::warn!(tool = %self.endpoint.name, error = %e, "API request failed");
                CallToolResult::error(vec![Content::text(format!("Error: {e}"))])
            }
        }
    }
}

fn response_result(response: &ApiResponse) -> CallToolResult {
    match serde_json::to_string_pretty(response) {
        Ok(text) => CallToolResult::success(vec![Content::text(text)]),
        Err(e) => CallToolResult::error(vec![Content::text(format!("Error: {e}"))]),
    }
}

#[derive(Debug, Clone, serde::Serialize)]
struct EndpointSummary {
    name: String,
    method: String,
    path: String,
    description: String,
}

impl EndpointSummary {
    fn new(name: &str, endpoint: &EndpointDescriptor) -> Self {
        Self {
            name: name.to_string(),
            method: endpoint.method.to_string(),
            path: endpoint.path.clone(),
            description: endpoint
                .description
                .lines()
                .next()
                .unwrap_or_default()
                .to_string(),
        }
    }
}

struct ListEndpointsHandler {
    endpoints: Vec<EndpointSummary>,
}

#[async_trait]
impl ToolHandler for ListEndpointsHandler {
    async fn invoke(&self, _arguments: JsonObject) -> CallToolResult {
        json_result(&json!(self.endpoints))
    }
}

struct ApiInfoHandler {
    info: Value,
}

#[async_trait]
impl ToolHandler for ApiInfoHandler {
    async fn invoke(&self, _arguments: JsonObject) -> CallToolResult {
        json_result(&self.info)
    }
}

fn json_result(value: &Value) -> CallToolResult {
    let text = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
    CallToolResult::success(vec![Content::text(text)])
}
