//! Call-time validation of tool arguments against the advertised input schema.

use crate::tool_schema::ToolInputSchema;
use jsonschema::Validator;
use jsonschema::error::ValidationErrorKind;
use rmcp::model::JsonObject;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueKind {
    /// A required top-level argument is absent.
    MissingRequired,
    /// Any other schema violation, at any depth.
    Constraint,
}

/// A single validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub kind: IssueKind,
    /// JSON pointer to the offending value (empty for the root).
    pub instance_path: String,
    pub message: String,
}

/// All violations found while validating one argument object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationErrors(pub Vec<ValidationIssue>);

impl ValidationErrors {
    #[must_use]
    pub fn issues(&self) -> &[ValidationIssue] {
        &self.0
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "validation failed with {} error(s)", self.0.len())?;
        for (i, issue) in self.0.iter().enumerate() {
            let sep = if i == 0 { ": " } else { "; " };
            let at = if issue.instance_path.is_empty() {
                "/"
            } else {
                issue.instance_path.as_str()
            };
            write!(f, "{sep}{at}: {}", issue.message)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

/// A [`ToolInputSchema`] together with the compiled validator for its JSON Schema rendering.
///
/// Arguments are checked against exactly the schema advertised in the tool listing. Only key
/// stripping happens outside the validator.
#[derive(Clone)]
pub struct ArgumentValidator {
    schema: ToolInputSchema,
    compiled: Option<Arc<Validator>>,
}

impl ArgumentValidator {
    #[must_use]
    pub fn new(schema: ToolInputSchema) -> Self {
        let rendered = Value::Object(schema.to_json_schema());
        let compiled = match jsonschema::validator_for(&rendered) {
            Ok(v) => Some(Arc::new(v)),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "Failed to compile tool input schema; only required arguments are checked"
                );
                None
            }
        };
        Self { schema, compiled }
    }

    #[must_use]
    pub fn schema(&self) -> &ToolInputSchema {
        &self.schema
    }

    /// Validate a flat argument object, returning it with undeclared keys removed.
    ///
    /// # Errors
    ///
    /// Returns every violation found; nothing should be dispatched in that case.
    pub fn parse_arguments(&self, args: &JsonObject) -> Result<JsonObject, ValidationErrors> {
        let mut issues: Vec<ValidationIssue> = self
            .schema
            .fields()
            .filter(|(name, field)| !field.is_optional() && !args.contains_key(*name))
            .map(|(name, _)| ValidationIssue {
                kind: IssueKind::MissingRequired,
                instance_path: format!("/{}", escape_pointer_token(name)),
                message: format!("missing required argument '{name}'"),
            })
            .collect();

        if let Some(compiled) = &self.compiled {
            let instance = Value::Object(args.clone());
            let mut violations = Vec::new();
            for e in compiled.iter_errors(&instance) {
                let instance_path = e.instance_path().to_string();
                // Top-level `required` is already reported above.
                if instance_path.is_empty()
                    && matches!(e.kind(), ValidationErrorKind::Required { .. })
                {
                    continue;
                }
                violations.push(ValidationIssue {
                    kind: IssueKind::Constraint,
                    instance_path,
                    message: e.to_string(),
                });
            }
            violations.sort_by(|a, b| a.instance_path.cmp(&b.instance_path));
            issues.extend(violations);
        }

        if issues.is_empty() {
            Ok(self.schema.strip_undeclared(args))
        } else {
            Err(ValidationErrors(issues))
        }
    }
}

impl fmt::Debug for ArgumentValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArgumentValidator")
            .field("schema", &self.schema)
            .field("compiled", &self.compiled.is_some())
            .finish()
    }
}

fn escape_pointer_token(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}
