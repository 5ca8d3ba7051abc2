//! Lenient `OpenAPI` document model.
//!
//! Real-world specs are frequently partially invalid. Instead of deserializing the whole document
//! into strict types (where one bad schema fails everything), the document is kept as a JSON tree
//! and individual path items, operations, parameters and request bodies are parsed on demand by
//! the extractor. Schema nodes are never typed; they go straight to the schema translator.

use crate::error::{OpenApiToolsError, Result};
use crate::resolver::SchemaRegistry;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A loaded `OpenAPI` document.
#[derive(Debug, Clone)]
pub struct ApiDocument {
    root: Value,
    info: ApiInfo,
}

/// Document metadata (`info`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiInfo {
    pub title: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ApiInfo {
    fn from_value(info: Option<&Value>) -> Self {
        let field = |key: &str| {
            info.and_then(|i| i.get(key))
                .and_then(Value::as_str)
                .map(str::to_string)
        };
        Self {
            title: field("title").unwrap_or_default(),
            version: field("version").unwrap_or_default(),
            description: field("description"),
        }
    }
}

impl ApiDocument {
    /// Wrap an already-parsed document tree.
    ///
    /// # Errors
    ///
    /// Returns an error if the root is not an object or `paths` is present but not an object.
    pub fn from_value(root: Value) -> Result<Self> {
        let Some(obj) = root.as_object() else {
            return Err(OpenApiToolsError::OpenApi(
                "OpenAPI document must be a JSON/YAML object".to_string(),
            ));
        };
        if let Some(paths) = obj.get("paths")
            && !paths.is_null()
            && !paths.is_object()
        {
            return Err(OpenApiToolsError::OpenApi(
                "OpenAPI document 'paths' must be an object".to_string(),
            ));
        }

        let info = ApiInfo::from_value(obj.get("info"));
        Ok(Self { root, info })
    }

    /// Parse a document from JSON or YAML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the content is neither valid JSON nor valid YAML, or if the parsed
    /// tree is not a usable document.
    pub fn parse(content: &str, location: &str) -> Result<Self> {
        let root: Value = match serde_json::from_str(content) {
            Ok(v) => v,
            Err(_) => serde_yaml::from_str(content).map_err(|e| {
                OpenApiToolsError::OpenApiSpecParse {
                    location: location.to_string(),
                    source: e,
                }
            })?,
        };
        Self::from_value(root)
    }

    /// Placeholder document used when the real spec could not be loaded.
    #[must_use]
    pub fn fallback() -> Self {
        let root = serde_json::json!({
            "openapi": "3.0.0",
            "info": { "title": "Victualia API", "version": "1.0.0" },
            "paths": {}
        });
        let info = ApiInfo::from_value(root.get("info"));
        Self { root, info }
    }

    #[must_use]
    pub fn info(&self) -> &ApiInfo {
        &self.info
    }

    #[must_use]
    pub fn root(&self) -> &Value {
        &self.root
    }

    /// Path entries in document order.
    pub fn paths(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.root
            .get("paths")
            .and_then(Value::as_object)
            .into_iter()
            .flat_map(Map::iter)
    }

    /// Registry of reusable schemas declared by this document.
    #[must_use]
    pub fn schema_registry(&self) -> SchemaRegistry<'_> {
        SchemaRegistry::from_document(&self.root)
    }
}

/// One operation under a path item.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationObject {
    #[serde(default)]
    pub operation_id: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Raw parameter entries (inline objects or `$ref`s).
    #[serde(default)]
    pub parameters: Vec<Value>,
    /// Raw request body (inline object or `$ref`).
    #[serde(default)]
    pub request_body: Option<Value>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Where a parameter is placed in the outgoing request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamLocation {
    Path,
    Query,
    Header,
    Cookie,
}

/// A parameter declaration (after `$ref` resolution).
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ParameterObject {
    pub name: String,
    #[serde(rename = "in")]
    pub location: ParamLocation,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub required: bool,
    /// Raw schema node; may itself be a `$ref`.
    #[serde(default)]
    pub schema: Option<Value>,
}

/// A request body declaration (after `$ref` resolution).
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RequestBodyObject {
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub description: Option<String>,
    /// Media type -> `{ "schema": ... }`.
    #[serde(default)]
    pub content: Map<String, Value>,
}

impl RequestBodyObject {
    /// The schema of the JSON media entry, if any.
    ///
    /// Prefers the exact `application/json` key, then any media type whose essence is
    /// `application/json` (e.g. with a `charset` parameter).
    #[must_use]
    pub fn json_schema(&self) -> Option<&Value> {
        let media = self.content.get("application/json").or_else(|| {
            self.content.iter().find_map(|(k, v)| {
                let essence = k.split(';').next().unwrap_or_default().trim();
                essence.eq_ignore_ascii_case("application/json").then_some(v)
            })
        })?;
        media.get("schema").filter(|s| !s.is_null())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_yaml_and_keeps_path_order() {
        let yaml = r#"
openapi: "3.0.0"
info:
  title: Victualia
  version: "1.2"
paths:
  /zeta:
    get: {}
  /alpha:
    get: {}
  /mid:
    post: {}
"#;
        let doc = ApiDocument::parse(yaml, "inline").unwrap();
        assert_eq!(doc.info().title, "Victualia");
        assert_eq!(doc.info().version, "1.2");
        assert_eq!(doc.info().description, None);
        let paths: Vec<&str> = doc.paths().map(|(p, _)| p.as_str()).collect();
        assert_eq!(paths, vec!["/zeta", "/alpha", "/mid"]);
    }

    #[test]
    fn rejects_non_object_documents() {
        assert!(ApiDocument::parse("[1, 2, 3]", "inline").is_err());
        assert!(ApiDocument::from_value(json!({ "paths": [] })).is_err());
        assert!(ApiDocument::parse("{ not: [valid", "inline").is_err());
    }

    #[test]
    fn tolerates_missing_info_and_paths() {
        let doc = ApiDocument::from_value(json!({ "openapi": "3.0.0" })).unwrap();
        assert_eq!(doc.info().title, "");
        assert_eq!(doc.paths().count(), 0);
    }

    #[test]
    fn fallback_document_is_empty() {
        let doc = ApiDocument::fallback();
        assert_eq!(doc.info().title, "Victualia API");
        assert_eq!(doc.info().version, "1.0.0");
        assert_eq!(doc.paths().count(), 0);
    }

    #[test]
    fn request_body_json_schema_selection() {
        let body: RequestBodyObject = serde_json::from_value(json!({
            "required": true,
            "content": {
                "text/plain": { "schema": { "type": "string" } },
                "application/json; charset=utf-8": { "schema": { "type": "object" } }
            }
        }))
        .unwrap();
        assert_eq!(body.json_schema(), Some(&json!({ "type": "object" })));

        let form_only: RequestBodyObject = serde_json::from_value(json!({
            "content": { "multipart/form-data": { "schema": { "type": "object" } } }
        }))
        .unwrap();
        assert_eq!(form_only.json_schema(), None);
    }
}
