//! Error types for `victualia-openapi-tools`.

use thiserror::Error;

/// Main error type for `OpenAPI` tooling.
#[derive(Error, Debug)]
pub enum OpenApiToolsError {
    /// Configuration errors (invalid config values).
    #[error("Configuration error: {0}")]
    Config(String),

    /// Startup errors (spec failed to load in time).
    #[error("Startup error: {0}")]
    Startup(String),

    /// Runtime errors (tool call failed, invalid arguments, bad URL).
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// HTTP errors (non-2xx while fetching the spec).
    #[error("HTTP error: {0}")]
    Http(String),

    /// `OpenAPI` errors (spec hash mismatch, unusable document).
    #[error("OpenAPI error: {0}")]
    OpenApi(String),

    #[error("OpenAPI error: failed to fetch spec from '{url}': {message}")]
    OpenApiSpecFetch { url: String, message: String },

    #[error("OpenAPI error: failed to read spec body from '{url}': {message}")]
    OpenApiSpecReadBody { url: String, message: String },

    #[error("OpenAPI error: failed to read spec file '{path}': {source}")]
    OpenApiSpecReadFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("OpenAPI error: failed to parse OpenAPI spec from '{location}': {source}")]
    OpenApiSpecParse {
        location: String,
        #[source]
        source: serde_yaml::Error,
    },

    /// JSON (de)serialization errors.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client errors (transport failures during a tool call).
    #[error("Request error: {0}")]
    Request(String),
}

/// Failure to read the schema registry during translation.
///
/// This is the only way schema translation can fail; malformed schema nodes degrade to an
/// unconstrained schema instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("schema registry section '{section}' is not an object")]
    RegistryUnavailable { section: &'static str },
}

/// Result type alias for `OpenAPI` tooling operations.
pub type Result<T> = std::result::Result<T, OpenApiToolsError>;
