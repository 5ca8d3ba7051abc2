//! `OpenAPI` `$ref` resolution.
//!
//! Two kinds of references are handled here:
//! - schema refs (`#/components/schemas/<name>`, and Swagger 2.0 `#/definitions/<name>`), looked up
//!   through a [`SchemaRegistry`] built from the document's reusable schema sections;
//! - local component refs for parameters and request bodies (`#/components/parameters/...`),
//!   followed through the document with JSON pointers.
//!
//! Only same-document refs are supported. Anything else resolves to `None` and callers degrade.

use crate::error::SchemaError;
use serde_json::Value;
use std::collections::HashSet;

pub const COMPONENT_SCHEMA_PREFIX: &str = "#/components/schemas/";
pub const DEFINITIONS_PREFIX: &str = "#/definitions/";

/// Read-only lookup table of named reusable schemas.
#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaRegistry<'a> {
    components: Option<&'a Value>,
    definitions: Option<&'a Value>,
}

impl<'a> SchemaRegistry<'a> {
    /// Build the registry from a document root (`components.schemas` + `definitions`).
    #[must_use]
    pub fn from_document(root: &'a Value) -> Self {
        Self {
            components: root.get("components").and_then(|c| c.get("schemas")),
            definitions: root.get("definitions"),
        }
    }

    /// A registry with no schemas at all.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Look up the schema a `$ref` points at.
    ///
    /// Returns `Ok(None)` when the reference is not a schema ref or the name is unknown.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::RegistryUnavailable`] if the section the ref points into exists but
    /// is not an object.
    pub fn lookup(&self, reference: &str) -> Result<Option<&'a Value>, SchemaError> {
        let (section, section_name, name) =
            if let Some(name) = reference.strip_prefix(COMPONENT_SCHEMA_PREFIX) {
                (self.components, "components.schemas", name)
            } else if let Some(name) = reference.strip_prefix(DEFINITIONS_PREFIX) {
                (self.definitions, "definitions", name)
            } else {
                return Ok(None);
            };

        let Some(section) = section.filter(|s| !s.is_null()) else {
            return Ok(None);
        };
        let Some(schemas) = section.as_object() else {
            return Err(SchemaError::RegistryUnavailable {
                section: section_name,
            });
        };

        Ok(schemas
            .get(&unescape_pointer_token(name))
            .filter(|v| is_truthy(v)))
    }

    /// Follow a schema `$ref` chain until a non-ref schema is reached.
    ///
    /// Used for parameter schemas, where only the referenced node's own `type`/`enum` matter.
    /// Returns `None` for unresolvable or cyclic chains.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry section cannot be read.
    pub fn resolve_chain(&self, node: &'a Value) -> Result<Option<&'a Value>, SchemaError> {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut cur = node;
        while let Some(reference) = ref_of(cur) {
            if !seen.insert(reference) {
                return Ok(None);
            }
            match self.lookup(reference)? {
                Some(next) => cur = next,
                None => return Ok(None),
            }
        }
        Ok(Some(cur))
    }
}

/// The `$ref` string of a node, if it has a non-empty one.
#[must_use]
pub fn ref_of(node: &Value) -> Option<&str> {
    node.get("$ref")
        .and_then(Value::as_str)
        .filter(|r| !r.is_empty())
}

/// Resolve a same-document `$ref` chain (e.g. `#/components/parameters/Limit`).
///
/// Items without a `$ref` are returned unchanged. Returns `None` for external, unresolvable or
/// cyclic references.
#[must_use]
pub fn resolve_local<'a>(root: &'a Value, item: &'a Value) -> Option<&'a Value> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut cur = item;
    while let Some(reference) = ref_of(cur) {
        if !seen.insert(reference) {
            tracing::warn!(reference, "Cyclic $ref detected");
            return None;
        }
        let Some(pointer) = reference.strip_prefix('#') else {
            tracing::warn!(reference, "Unsupported external $ref");
            return None;
        };
        if !pointer.is_empty() && !pointer.starts_with('/') {
            tracing::warn!(
                reference,
                "Unsupported $ref fragment (expected JSON pointer starting with '/')"
            );
            return None;
        }
        cur = root.pointer(pointer)?;
    }
    Some(cur)
}

/// JavaScript-style truthiness, used where the document format treats "present" loosely.
#[must_use]
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn unescape_pointer_token(token: &str) -> String {
    token.replace("~1", "/").replace("~0", "~")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn lookup_resolves_component_and_definition_refs() {
        let root = json!({
            "components": { "schemas": { "Home": { "type": "object" } } },
            "definitions": { "Item": { "type": "string" } }
        });
        let registry = SchemaRegistry::from_document(&root);

        assert_eq!(
            registry.lookup("#/components/schemas/Home").unwrap(),
            Some(&json!({ "type": "object" }))
        );
        assert_eq!(
            registry.lookup("#/definitions/Item").unwrap(),
            Some(&json!({ "type": "string" }))
        );
        assert_eq!(registry.lookup("#/components/schemas/Missing").unwrap(), None);
        assert_eq!(registry.lookup("other.yaml#/Home").unwrap(), None);
    }

    #[test]
    fn lookup_fails_when_section_is_not_an_object() {
        let root = json!({ "components": { "schemas": ["not", "a", "map"] } });
        let registry = SchemaRegistry::from_document(&root);
        assert!(registry.lookup("#/components/schemas/Home").is_err());
        // Non-schema refs never touch the registry.
        assert_eq!(registry.lookup("#/paths/x").unwrap(), None);
    }

    #[test]
    fn lookup_unescapes_pointer_tokens() {
        let root = json!({ "components": { "schemas": { "a/b": { "type": "boolean" } } } });
        let registry = SchemaRegistry::from_document(&root);
        assert!(registry.lookup("#/components/schemas/a~1b").unwrap().is_some());
    }

    #[test]
    fn resolve_chain_stops_on_cycles() {
        let root = json!({ "components": { "schemas": {
            "A": { "$ref": "#/components/schemas/B" },
            "B": { "$ref": "#/components/schemas/A" },
            "C": { "$ref": "#/components/schemas/D" },
            "D": { "type": "string", "enum": ["x"] }
        } } });
        let registry = SchemaRegistry::from_document(&root);

        let cyclic = json!({ "$ref": "#/components/schemas/A" });
        assert_eq!(registry.resolve_chain(&cyclic).unwrap(), None);

        let chained = json!({ "$ref": "#/components/schemas/C" });
        assert_eq!(
            registry.resolve_chain(&chained).unwrap(),
            Some(&json!({ "type": "string", "enum": ["x"] }))
        );
    }

    #[test]
    fn resolve_local_follows_pointers() {
        let root = json!({
            "components": { "parameters": {
                "Limit": { "name": "limit", "in": "query" },
                "Alias": { "$ref": "#/components/parameters/Limit" },
                "Loop": { "$ref": "#/components/parameters/Loop" }
            } }
        });
        let alias = json!({ "$ref": "#/components/parameters/Alias" });
        assert_eq!(
            resolve_local(&root, &alias),
            Some(&json!({ "name": "limit", "in": "query" }))
        );

        let looped = json!({ "$ref": "#/components/parameters/Loop" });
        assert_eq!(resolve_local(&root, &looped), None);

        let external = json!({ "$ref": "common.yaml#/components/parameters/Limit" });
        assert_eq!(resolve_local(&root, &external), None);

        let inline = json!({ "name": "q", "in": "query" });
        assert_eq!(resolve_local(&root, &inline), Some(&inline));
    }

    #[test]
    fn truthiness_matches_loose_presence_rules() {
        assert!(!is_truthy(&json!(null)));
        assert!(!is_truthy(&json!(false)));
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!("")));
        assert!(is_truthy(&json!({})));
        assert!(is_truthy(&json!([])));
        assert!(is_truthy(&json!(true)));
    }
}
