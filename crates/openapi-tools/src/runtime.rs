//! Loading the `OpenAPI` document and owning the derived tool catalog.

use crate::config::{ApiServerConfig, HashPolicy};
use crate::dispatch::{ApiClient, ApiResponse, sanitize_reqwest_error};
use crate::document::{ApiDocument, ApiInfo};
use crate::error::{OpenApiToolsError, Result};
use crate::extract::{EndpointDescriptor, extract};
use crate::semantics::annotations_for_method;
use crate::tool_schema::{ToolInputSchema, build};
use crate::validate::ArgumentValidator;
use reqwest::Client;
use reqwest::header::ACCEPT;
use rmcp::model::{JsonObject, Tool};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;

/// An endpoint together with its derived input schema and compiled argument validator.
#[derive(Debug, Clone)]
pub struct CatalogEntry {
    pub endpoint: EndpointDescriptor,
    pub validator: ArgumentValidator,
}

impl CatalogEntry {
    #[must_use]
    pub fn input_schema(&self) -> &ToolInputSchema {
        self.validator.schema()
    }

    /// The MCP tool advertised for this endpoint under `name`.
    #[must_use]
    pub fn to_tool(&self, name: &str) -> Tool {
        let mut tool = Tool::new(
            name.to_string(),
            self.endpoint.description.clone(),
            Arc::new(self.input_schema().to_json_schema()),
        );
        tool.annotations = Some(annotations_for_method(
            &self.endpoint.method,
            self.endpoint.operation_id.clone(),
        ));
        tool
    }
}

/// Immutable snapshot of everything derived from one document load.
#[derive(Debug, Clone)]
pub struct Catalog {
    document: ApiDocument,
    entries: Vec<CatalogEntry>,
}

impl Catalog {
    /// Derive endpoints and their input schemas from a document.
    #[must_use]
    pub fn from_document(document: ApiDocument) -> Self {
        let registry = document.schema_registry();
        let entries = extract(&document)
            .into_iter()
            .map(|endpoint| {
                let validator = ArgumentValidator::new(build(&endpoint, &registry));
                CatalogEntry {
                    endpoint,
                    validator,
                }
            })
            .collect();
        Self { document, entries }
    }

    /// Empty catalog used when the document could not be loaded.
    #[must_use]
    pub fn fallback() -> Self {
        Self {
            document: ApiDocument::fallback(),
            entries: Vec::new(),
        }
    }

    #[must_use]
    pub fn info(&self) -> &ApiInfo {
        self.document.info()
    }

    #[must_use]
    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Tool source backed by a remote (or local) `OpenAPI` document.
#[derive(Clone)]
pub struct OpenApiToolSource {
    config: ApiServerConfig,
    client: Client,
    api: ApiClient,
}

impl OpenApiToolSource {
    /// Create a source. Nothing is fetched until [`Self::start`] or [`Self::load`].
    #[must_use]
    pub fn new(config: ApiServerConfig) -> Self {
        let client = Client::new();
        let api = ApiClient::new(
            client.clone(),
            config.base_url.clone(),
            config.bearer_token().map(str::to_string),
        );
        Self {
            config,
            client,
            api,
        }
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        self.api.base_url()
    }

    /// Load the document and derive a catalog from it.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be fetched, verified or parsed.
    pub async fn load(&self) -> Result<Catalog> {
        let document = self.load_spec().await?;
        let catalog = Catalog::from_document(document);

        tracing::info!(
            title = %catalog.info().title,
            version = %catalog.info().version,
            endpoints = catalog.len(),
            "Loaded OpenAPI spec"
        );
        Ok(catalog)
    }

    /// Load the document within `startup_timeout`.
    ///
    /// Never fails: on error or timeout the empty fallback catalog is installed and the error is
    /// logged, so the server can still answer utility calls.
    pub async fn start(&self, startup_timeout: Duration) -> Catalog {
        let err = match tokio::time::timeout(startup_timeout, self.load()).await {
            Ok(Ok(catalog)) => return catalog,
            Ok(Err(e)) => e,
            Err(_) => OpenApiToolsError::Startup(format!(
                "Timed out after {}s loading OpenAPI spec from '{}'",
                startup_timeout.as_secs(),
                self.config.spec
            )),
        };

        tracing::warn!(error = %err, "Failed to load OpenAPI spec; serving without API endpoints");
        Catalog::fallback()
    }

    /// Call the API for one endpoint with validated arguments.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or if the request cannot be built.
    pub async fn dispatch(
        &self,
        endpoint: &EndpointDescriptor,
        arguments: &JsonObject,
    ) -> Result<ApiResponse> {
        self.api.dispatch(endpoint, arguments).await
    }

    async fn load_spec(&self) -> Result<ApiDocument> {
        let content = if self.config.spec_is_url() {
            self.fetch_spec().await?
        } else {
            tracing::info!(path = %self.config.spec, "Loading OpenAPI spec from file");
            tokio::fs::read_to_string(&self.config.spec)
                .await
                .map_err(|e| OpenApiToolsError::OpenApiSpecReadFile {
                    path: self.config.spec.clone(),
                    source: e,
                })?
        };

        verify_hash(
            &content,
            self.config.spec_hash.as_deref(),
            self.config.spec_hash_policy,
        )?;
        ApiDocument::parse(&content, &self.config.spec)
    }

    async fn fetch_spec(&self) -> Result<String> {
        let url = &self.config.spec;
        tracing::info!(url = %url, "Fetching OpenAPI spec");

        let mut request = self.client.get(url).header(ACCEPT, "application/json");
        if let Some(token) = self.config.bearer_token() {
            request = request.bearer_auth(token);
        }
        let resp = request
            .send()
            .await
            .map_err(|e| OpenApiToolsError::OpenApiSpecFetch {
                url: url.clone(),
                message: sanitize_reqwest_error(&e),
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(OpenApiToolsError::Http(format!(
                "Failed to fetch OpenAPI spec: {} {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or_default()
            )));
        }

        resp.text()
            .await
            .map_err(|e| OpenApiToolsError::OpenApiSpecReadBody {
                url: url.clone(),
                message: sanitize_reqwest_error(&e),
            })
    }
}

impl std::fmt::Debug for OpenApiToolSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenApiToolSource")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Check the document against an expected `sha256:<hex>` digest.
fn verify_hash(content: &str, expected: Option<&str>, policy: HashPolicy) -> Result<()> {
    let Some(expected) = expected.filter(|h| !h.is_empty()) else {
        return Ok(());
    };
    if policy == HashPolicy::Ignore {
        return Ok(());
    }

    let actual = format!("sha256:{}", hex::encode(Sha256::digest(content.as_bytes())));
    if actual.eq_ignore_ascii_case(expected) {
        return Ok(());
    }

    match policy {
        HashPolicy::Fail => Err(OpenApiToolsError::OpenApi(format!(
            "Spec hash mismatch. Expected: {expected}, Got: {actual}"
        ))),
        HashPolicy::Warn => {
            tracing::warn!(expected, actual = %actual, "OpenAPI spec hash mismatch");
            Ok(())
        }
        HashPolicy::Ignore => Ok(()),
    }
}
