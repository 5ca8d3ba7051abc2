//! Command-line and environment configuration.

use clap::{Parser, ValueEnum};
use std::time::Duration;
use victualia_openapi_tools::config::{DEFAULT_BASE_URL, DEFAULT_SPEC_URL};
use victualia_openapi_tools::{ApiServerConfig, HashPolicy};

/// Log output format (stderr).
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

/// Expose the Victualia REST API to MCP clients over stdio.
#[derive(Debug, Clone, Parser)]
#[command(name = "victualia-mcp", version, about)]
pub struct Cli {
    /// `OpenAPI` document location (http(s) URL or file path)
    #[arg(long, env = "VICTUALIA_OPENAPI_URL", default_value = DEFAULT_SPEC_URL)]
    pub openapi_url: String,

    /// Base URL every endpoint path is appended to
    #[arg(long, env = "VICTUALIA_API_URL", default_value = DEFAULT_BASE_URL)]
    pub api_url: String,

    /// Bearer credential for the spec fetch and all API calls (empty means none)
    #[arg(long, env = "VICTUALIA_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Expected document hash, `sha256:<hex>`
    #[arg(long, env = "VICTUALIA_OPENAPI_SHA256")]
    pub openapi_sha256: Option<String>,

    /// What to do when the document hash does not match: warn, fail or ignore
    #[arg(long, env = "VICTUALIA_OPENAPI_HASH_POLICY", default_value = "warn")]
    pub openapi_hash_policy: HashPolicy,

    /// Upper bound on loading the document at startup
    #[arg(long, env = "VICTUALIA_STARTUP_TIMEOUT_SECS", default_value_t = 30)]
    pub startup_timeout_secs: u64,

    #[arg(long, env = "VICTUALIA_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

impl Cli {
    #[must_use]
    pub fn api_config(&self) -> ApiServerConfig {
        ApiServerConfig {
            spec: self.openapi_url.clone(),
            base_url: self.api_url.clone(),
            api_key: self.api_key.clone(),
            spec_hash: self.openapi_sha256.clone().filter(|h| !h.is_empty()),
            spec_hash_policy: self.openapi_hash_policy,
        }
    }

    #[must_use]
    pub fn startup_timeout(&self) -> Duration {
        Duration::from_secs(self.startup_timeout_secs)
    }
}
