//! Flattening of the document's path/operation tree into endpoint descriptors.

use crate::document::{ApiDocument, OperationObject, ParameterObject, RequestBodyObject};
use crate::resolver::resolve_local;
use regex::Regex;
use reqwest::Method;
use serde_json::Value;
use std::sync::LazyLock;

/// HTTP methods exposed as tools, in per-path emission order.
const METHODS: [(&str, Method); 5] = [
    ("get", Method::GET),
    ("post", Method::POST),
    ("put", Method::PUT),
    ("patch", Method::PATCH),
    ("delete", Method::DELETE),
];

static NON_ALNUM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-zA-Z0-9]").expect("valid regex"));
static NON_NAME_CHAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-zA-Z0-9_-]").expect("valid regex"));

/// One callable HTTP operation.
#[derive(Debug, Clone, PartialEq)]
pub struct EndpointDescriptor {
    /// Normalized tool name (not yet de-duplicated).
    pub name: String,
    pub description: String,
    pub method: Method,
    /// Path template, e.g. `/homes/{homeId}`.
    pub path: String,
    /// Path-level parameters first, then operation-level ones.
    pub parameters: Vec<ParameterObject>,
    pub request_body: Option<RequestBodyObject>,
    pub operation_id: Option<String>,
    pub tags: Vec<String>,
}

/// Extract every supported operation, in document order.
#[must_use]
pub fn extract(doc: &ApiDocument) -> Vec<EndpointDescriptor> {
    let root = doc.root();
    let mut out = Vec::new();

    for (path, item) in doc.paths() {
        let Some(item_obj) = item.as_object() else {
            tracing::warn!(path = %path, "Skipping path item that is not an object");
            continue;
        };
        let shared_params = item_obj
            .get("parameters")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();

        for (key, method) in &METHODS {
            let Some(raw_op) = item_obj.get(*key) else {
                continue;
            };
            let op: OperationObject = match serde_json::from_value(raw_op.clone()) {
                Ok(op) => op,
                Err(e) => {
                    tracing::warn!(path = %path, method = %method, error = %e, "Skipping malformed operation");
                    continue;
                }
            };

            let parameters = shared_params
                .iter()
                .chain(op.parameters.iter())
                .filter_map(|raw| parse_parameter(root, raw, path))
                .collect();

            let request_body = op
                .request_body
                .as_ref()
                .and_then(|raw| parse_request_body(root, raw, path));

            out.push(EndpointDescriptor {
                name: tool_name(op.operation_id.as_deref(), key, path),
                description: describe(&op, method, path),
                method: method.clone(),
                path: path.clone(),
                parameters,
                request_body,
                operation_id: op.operation_id,
                tags: op.tags,
            });
        }
    }

    out
}

fn parse_parameter(root: &Value, raw: &Value, path: &str) -> Option<ParameterObject> {
    let Some(resolved) = resolve_local(root, raw) else {
        tracing::warn!(path, "Skipping unresolvable parameter reference");
        return None;
    };
    match serde_json::from_value(resolved.clone()) {
        Ok(p) => Some(p),
        Err(e) => {
            tracing::warn!(path, error = %e, "Skipping malformed parameter");
            None
        }
    }
}

fn parse_request_body(root: &Value, raw: &Value, path: &str) -> Option<RequestBodyObject> {
    let Some(resolved) = resolve_local(root, raw) else {
        tracing::warn!(path, "Skipping unresolvable request body reference");
        return None;
    };
    match serde_json::from_value(resolved.clone()) {
        Ok(b) => Some(b),
        Err(e) => {
            tracing::warn!(path, error = %e, "Skipping malformed request body");
            None
        }
    }
}

/// `operationId` if present, else `<method>_<path>`; then normalized to `[a-z0-9_-]`.
pub(crate) fn tool_name(operation_id: Option<&str>, method: &str, path: &str) -> String {
    let raw = match operation_id.filter(|id| !id.is_empty()) {
        Some(id) => id.to_string(),
        None => format!("{method}_{}", NON_ALNUM.replace_all(path, "_")),
    };
    NON_NAME_CHAR.replace_all(&raw, "_").to_lowercase()
}

fn describe(op: &OperationObject, method: &Method, path: &str) -> String {
    let route = format!("[{method} {path}]");
    [op.summary.as_deref(), op.description.as_deref(), Some(route.as_str())]
        .into_iter()
        .flatten()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}
