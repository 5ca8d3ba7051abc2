//! OpenAPI->MCP tooling for the Victualia API.
//!
//! A loaded document is flattened into endpoint descriptors, each with an input schema derived
//! from its parameters and JSON request body. Schemas render into JSON Schema for the MCP tool
//! listing, and call arguments are validated against that same rendering.

pub mod config;
pub mod dispatch;
pub mod document;
pub mod error;
pub mod extract;
pub mod resolver;
pub mod runtime;
pub mod schema;
pub mod semantics;
pub mod tool_schema;
pub mod validate;

pub use config::{ApiServerConfig, HashPolicy};
pub use dispatch::{ApiClient, ApiResponse};
pub use error::{OpenApiToolsError, Result};
pub use extract::EndpointDescriptor;
pub use runtime::{Catalog, CatalogEntry, OpenApiToolSource};
pub use schema::ValidationSchema;
pub use tool_schema::ToolInputSchema;
pub use validate::{ArgumentValidator, IssueKind, ValidationErrors, ValidationIssue};
