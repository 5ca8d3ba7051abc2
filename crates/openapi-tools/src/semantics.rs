//! MCP tool hints derived from HTTP method semantics (RFC 9110).

use reqwest::Method;
use rmcp::model::ToolAnnotations;

/// Annotations for a tool that performs `method` against the remote API.
///
/// Every endpoint tool talks to an external system, so `openWorldHint` is always set. Methods
/// outside the exposed set only get that hint.
#[must_use]
pub fn annotations_for_method(method: &Method, title: Option<String>) -> ToolAnnotations {
    let (read_only, destructive, idempotent) = match method.as_str() {
        "GET" | "HEAD" | "OPTIONS" => (Some(true), Some(false), Some(true)),
        "POST" => (Some(false), Some(false), Some(false)),
        "PUT" | "DELETE" => (Some(false), Some(true), Some(true)),
        // PATCH may or may not be idempotent.
        "PATCH" => (Some(false), Some(true), None),
        _ => (None, None, None),
    };

    ToolAnnotations {
        title,
        read_only_hint: read_only,
        destructive_hint: destructive,
        idempotent_hint: idempotent,
        open_world_hint: Some(true),
    }
}

/// Annotations for a tool answered locally from the loaded catalog.
#[must_use]
pub fn local_read_only(title: &str) -> ToolAnnotations {
    ToolAnnotations {
        title: Some(title.to_string()),
        read_only_hint: Some(true),
        destructive_hint: Some(false),
        idempotent_hint: Some(true),
        open_world_hint: Some(false),
    }
}
