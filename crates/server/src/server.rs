//! rmcp `ServerHandler` over the tool registry.

use crate::registry::ToolRegistry;
use rmcp::model::{
    CallToolRequestParams, CallToolResult, Implementation, ListToolsResult,
    PaginatedRequestParams, ServerCapabilities, ServerInfo,
};
use rmcp::service::RequestContext;
use rmcp::{ErrorData as McpError, RoleServer, ServerHandler};
use std::future::Future;
use std::sync::Arc;
use victualia_openapi_tools::document::ApiInfo;

const INSTRUCTIONS: &str = "Tools for the Victualia household inventory API. Call `list_endpoints` \
to see every available endpoint and `api_info` for the API version and base URL.";

/// MCP server exposing one registry snapshot. Only the tools capability is advertised.
#[derive(Clone)]
pub struct VictualiaServer {
    registry: Arc<ToolRegistry>,
    api_info: ApiInfo,
}

impl VictualiaServer {
    #[must_use]
    pub fn new(registry: ToolRegistry, api_info: ApiInfo) -> Self {
        Self {
            registry: Arc::new(registry),
            api_info,
        }
    }

    #[must_use]
    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }
}

impl ServerHandler for VictualiaServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: env!("CARGO_PKG_NAME").to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                title: Some(format!("{} MCP", self.api_info.title)),
                ..Default::default()
            },
            instructions: Some(INSTRUCTIONS.to_string()),
            ..Default::default()
        }
    }

    fn list_tools(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> impl Future<Output = Result<ListToolsResult, McpError>> + Send + '_ {
        async move {
            Ok(ListToolsResult {
                tools: self.registry.list_tools(),
                next_cursor: None,
                meta: None,
            })
        }
    }

    fn call_tool(
        &self,
        request: CallToolRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> impl Future<Output = Result<CallToolResult, McpError>> + Send + '_ {
        async move {
            tracing::debug!(tool = %request.name, "tools/call");
            self.registry.call(&request.name, request.arguments).await
        }
    }
}
