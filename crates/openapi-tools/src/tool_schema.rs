//! Per-endpoint tool input schemas.

use crate::document::ParameterObject;
use crate::extract::EndpointDescriptor;
use crate::resolver::SchemaRegistry;
use crate::schema::{
    SchemaKind, ValidationSchema, object_json_schema, string_enum, strip_fields, translate,
};
use rmcp::model::JsonObject;
use serde_json::Value;

/// Name of the field carrying the JSON request body.
pub const BODY_FIELD: &str = "body";

const BODY_FALLBACK_DESCRIPTION: &str = "Request body (JSON object)";

/// Ordered field map describing a tool's flat argument object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolInputSchema {
    fields: Vec<(String, ValidationSchema)>,
}

impl ToolInputSchema {
    /// Insert a field; a later insert with the same name replaces the earlier one in place.
    pub fn insert(&mut self, name: impl Into<String>, schema: ValidationSchema) {
        let name = name.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = schema,
            None => self.fields.push((name, schema)),
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ValidationSchema> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, s)| s)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &ValidationSchema)> {
        self.fields.iter().map(|(n, s)| (n.as_str(), s))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// JSON Schema advertised as the MCP tool `inputSchema`.
    #[must_use]
    pub fn to_json_schema(&self) -> JsonObject {
        match object_json_schema(&self.fields) {
            Value::Object(obj) => obj,
            _ => JsonObject::new(),
        }
    }

    /// Keep only declared arguments, with undeclared keys removed from nested objects too.
    #[must_use]
    pub fn strip_undeclared(&self, args: &JsonObject) -> JsonObject {
        strip_fields(&self.fields, args)
    }
}

/// Build the input schema for one endpoint.
#[must_use]
pub fn build(endpoint: &EndpointDescriptor, registry: &SchemaRegistry<'_>) -> ToolInputSchema {
    let mut schema = ToolInputSchema::default();

    for param in &endpoint.parameters {
        schema.insert(param.name.clone(), parameter_schema(param, registry));
    }

    if let Some(body) = &endpoint.request_body
        && let Some(body_schema) = body.json_schema()
    {
        let mut field = match translate(body_schema, registry) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(
                    tool = %endpoint.name,
                    error = %e,
                    "Failed to derive request body schema; accepting any JSON object"
                );
                ValidationSchema::new(SchemaKind::Record).describe(BODY_FALLBACK_DESCRIPTION)
            }
        };
        if !body.required {
            field = field.optional();
        }
        schema.insert(BODY_FIELD, field);
    }

    schema
}

/// Scalar schema for a path/query/header/cookie parameter.
fn parameter_schema(param: &ParameterObject, registry: &SchemaRegistry<'_>) -> ValidationSchema {
    let node = param.schema.as_ref().and_then(|s| {
        registry.resolve_chain(s).unwrap_or_else(|e| {
            tracing::warn!(parameter = %param.name, error = %e, "Failed to resolve parameter schema");
            None
        })
    });

    let kind = match node {
        Some(node) => match string_enum(node.get("enum")) {
            Some(options) => SchemaKind::Enum(options),
            None => match node.get("type").and_then(Value::as_str) {
                Some("integer" | "number") => SchemaKind::Number,
                Some("boolean") => SchemaKind::Boolean,
                Some("array") => SchemaKind::Array(Box::new(ValidationSchema::any())),
                _ => SchemaKind::String,
            },
        },
        None => SchemaKind::String,
    };

    let mut schema = ValidationSchema::new(kind);
    if !param.required {
        schema = schema.optional();
    }
    if let Some(desc) = param.description.as_deref().filter(|d| !d.is_empty()) {
        schema = schema.describe(desc);
    }
    schema
}
