//! Translation of `OpenAPI` schema nodes into runtime validation schemas.
//!
//! The translator is total over arbitrary JSON input: odd or unsupported shapes degrade to an
//! unconstrained schema instead of failing. The only error is a registry section that cannot be
//! read at all.
//!
//! The produced [`ValidationSchema`] uses a small vocabulary that maps 1:1 back to JSON Schema
//! (see [`ValidationSchema::to_json_schema`]). The rendered schema is both the advertised MCP
//! tool `inputSchema` and what call arguments are validated against.

use crate::error::SchemaError;
use crate::resolver::{SchemaRegistry, is_truthy, ref_of};
use serde_json::{Map, Value, json};
use std::collections::HashSet;

/// Shape accepted by a [`ValidationSchema`].
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaKind {
    /// Accepts any value, including null.
    Any,
    String,
    /// Closed set of string literals.
    Enum(Vec<String>),
    Number,
    Boolean,
    Array(Box<ValidationSchema>),
    /// Known fields in declaration order. Unknown keys are accepted and stripped.
    Object(Vec<(String, ValidationSchema)>),
    /// String-keyed map of arbitrary values.
    Record,
    /// Object with no declared shape; unknown keys are kept.
    OpenObject,
}

/// A derived runtime validation schema.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationSchema {
    kind: SchemaKind,
    nullable: bool,
    optional: bool,
    description: Option<String>,
}

impl ValidationSchema {
    #[must_use]
    pub fn new(kind: SchemaKind) -> Self {
        Self {
            kind,
            nullable: false,
            optional: false,
            description: None,
        }
    }

    #[must_use]
    pub fn any() -> Self {
        Self::new(SchemaKind::Any)
    }

    /// Also accept `null`.
    #[must_use]
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// May be omitted by the enclosing object.
    #[must_use]
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Attach documentation. Has no effect on validation.
    #[must_use]
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn kind(&self) -> &SchemaKind {
        &self.kind
    }

    #[must_use]
    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    #[must_use]
    pub fn is_optional(&self) -> bool {
        self.optional
    }

    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Look up a declared field of an object schema.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&ValidationSchema> {
        match &self.kind {
            SchemaKind::Object(fields) => fields.iter().find(|(n, _)| n == name).map(|(_, s)| s),
            _ => None,
        }
    }

    /// Drop object keys the schema does not declare, at every depth.
    ///
    /// Records and open objects keep their keys. Call this on values that already passed
    /// validation.
    #[must_use]
    pub fn strip_undeclared(&self, value: &Value) -> Value {
        match (&self.kind, value) {
            (SchemaKind::Object(fields), Value::Object(obj)) => {
                Value::Object(strip_fields(fields, obj))
            }
            (SchemaKind::Array(items), Value::Array(arr)) => {
                Value::Array(arr.iter().map(|v| items.strip_undeclared(v)).collect())
            }
            _ => value.clone(),
        }
    }

    /// Render as a JSON Schema object.
    #[must_use]
    pub fn to_json_schema(&self) -> Value {
        let mut out = match &self.kind {
            SchemaKind::Any => json!({}),
            SchemaKind::String => json!({ "type": "string" }),
            SchemaKind::Enum(options) => json!({ "type": "string", "enum": options }),
            SchemaKind::Number => json!({ "type": "number" }),
            SchemaKind::Boolean => json!({ "type": "boolean" }),
            SchemaKind::Array(items) => json!({ "type": "array", "items": items.to_json_schema() }),
            SchemaKind::Object(fields) => object_json_schema(fields),
            SchemaKind::Record => json!({ "type": "object", "additionalProperties": {} }),
            SchemaKind::OpenObject => {
                json!({ "type": "object", "properties": {}, "additionalProperties": true })
            }
        };

        if self.nullable && self.kind != SchemaKind::Any {
            out = nullable_json_schema(out);
        }
        if let (Some(desc), Some(obj)) = (&self.description, out.as_object_mut()) {
            obj.insert("description".to_string(), Value::String(desc.clone()));
        }
        out
    }
}

/// Keep only the declared fields of `obj`, each stripped by its own schema.
pub(crate) fn strip_fields(
    fields: &[(String, ValidationSchema)],
    obj: &Map<String, Value>,
) -> Map<String, Value> {
    fields
        .iter()
        .filter_map(|(name, schema)| {
            obj.get(name)
                .map(|v| (name.clone(), schema.strip_undeclared(v)))
        })
        .collect()
}

pub(crate) fn object_json_schema(fields: &[(String, ValidationSchema)]) -> Value {
    let mut properties = Map::new();
    let mut required: Vec<Value> = Vec::new();
    for (name, schema) in fields {
        properties.insert(name.clone(), schema.to_json_schema());
        if !schema.optional {
            required.push(Value::String(name.clone()));
        }
    }

    let mut out = json!({ "type": "object", "properties": properties });
    if !required.is_empty() {
        out["required"] = Value::Array(required);
    }
    out
}

fn nullable_json_schema(mut schema: Value) -> Value {
    if schema.get("enum").is_none()
        && let Some(ty) = schema.get("type").and_then(Value::as_str).map(str::to_string)
    {
        schema["type"] = json!([ty, "null"]);
        return schema;
    }
    json!({ "anyOf": [schema, { "type": "null" }] })
}


// ============================================================================
// Translation
// ============================================================================

/// Translate a schema node into a validation schema.
///
/// # Errors
///
/// Returns an error only if a `$ref` points into a registry section that cannot be read.
pub fn translate(
    node: &Value,
    registry: &SchemaRegistry<'_>,
) -> Result<ValidationSchema, SchemaError> {
    Translator {
        registry,
        resolving: HashSet::new(),
    }
    .translate(node)
}

struct Translator<'r, 'a> {
    registry: &'r SchemaRegistry<'a>,
    /// Refs currently being expanded on this call stack.
    resolving: HashSet<String>,
}

impl Translator<'_, '_> {
    fn translate(&mut self, node: &Value) -> Result<ValidationSchema, SchemaError> {
        let Some(obj) = node.as_object() else {
            return Ok(ValidationSchema::any());
        };

        if let Some(reference) = ref_of(node) {
            return self.translate_ref(reference);
        }

        let (ty, null_in_type) = declared_type(obj);
        let kind = match ty {
            Some("string") => string_kind(obj),
            Some("integer" | "number") => SchemaKind::Number,
            Some("boolean") => SchemaKind::Boolean,
            Some("array") => {
                let items = match obj.get("items") {
                    Some(items) if is_truthy(items) => self.translate(items)?,
                    _ => ValidationSchema::any(),
                };
                SchemaKind::Array(Box::new(items))
            }
            Some("object") => self.object_kind(obj)?,
            // Unions (anyOf/oneOf) and untyped nodes are not discriminated.
            _ => SchemaKind::Any,
        };

        let mut schema = ValidationSchema::new(kind);
        if null_in_type || obj.get("nullable") == Some(&Value::Bool(true)) {
            schema = schema.nullable();
        }
        if let Some(desc) = obj
            .get("description")
            .and_then(Value::as_str)
            .filter(|d| !d.is_empty())
        {
            schema = schema.describe(desc);
        }
        Ok(schema)
    }

    fn translate_ref(&mut self, reference: &str) -> Result<ValidationSchema, SchemaError> {
        let Some(target) = self.registry.lookup(reference)? else {
            return Ok(ValidationSchema::any());
        };
        if !self.resolving.insert(reference.to_string()) {
            tracing::debug!(reference, "Cyclic schema $ref; using unconstrained schema");
            return Ok(ValidationSchema::any());
        }
        let out = self.translate(target);
        self.resolving.remove(reference);
        out
    }

    fn object_kind(&mut self, obj: &Map<String, Value>) -> Result<SchemaKind, SchemaError> {
        if let Some(properties) = obj.get("properties").and_then(Value::as_object) {
            let required: Vec<&str> = obj
                .get("required")
                .and_then(Value::as_array)
                .map(|r| r.iter().filter_map(Value::as_str).collect())
                .unwrap_or_default();

            let mut fields = Vec::with_capacity(properties.len());
            for (key, prop) in properties {
                let mut field = self.translate(prop)?;
                if !required.contains(&key.as_str()) {
                    field = field.optional();
                }
                fields.push((key.clone(), field));
            }
            return Ok(SchemaKind::Object(fields));
        }

        if obj.get("additionalProperties").is_some_and(is_truthy) {
            return Ok(SchemaKind::Record);
        }
        Ok(SchemaKind::OpenObject)
    }
}

/// The declared `type`, plus whether a `"null"` entry in a type array implies nullability.
fn declared_type(obj: &Map<String, Value>) -> (Option<&str>, bool) {
    match obj.get("type") {
        Some(Value::String(t)) => (Some(t.as_str()), false),
        Some(Value::Array(types)) => {
            let names: Vec<&str> = types.iter().filter_map(Value::as_str).collect();
            let ty = names.iter().copied().find(|t| *t != "null");
            (ty, names.contains(&"null"))
        }
        _ => (None, false),
    }
}

fn string_kind(obj: &Map<String, Value>) -> SchemaKind {
    match string_enum(obj.get("enum")) {
        Some(options) => SchemaKind::Enum(options),
        None => SchemaKind::String,
    }
}

/// String members of an `enum` array, or `None` if there are none.
pub(crate) fn string_enum(node: Option<&Value>) -> Option<Vec<String>> {
    let options: Vec<String> = node?
        .as_array()?
        .iter()
        .filter_map(Value::as_str)
        .map(str::to_string)
        .collect();
    (!options.is_empty()).then_some(options)
}
