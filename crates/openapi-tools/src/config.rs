use serde::{Deserialize, Serialize};
use std::fmt;

/// Default location of the Victualia `OpenAPI` document.
pub const DEFAULT_SPEC_URL: &str = "https://www.victualia.app/api/v1/openapi.json";

/// Default base URL for API calls.
pub const DEFAULT_BASE_URL: &str = "https://www.victualia.app/api/v1";

/// Configuration for an OpenAPI-based tool source.
#[derive(Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiServerConfig {
    /// `OpenAPI` spec location (URL or file path).
    #[serde(default = "default_spec")]
    pub spec: String,

    /// Base URL every endpoint path is appended to.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Bearer credential sent with the spec fetch and every API call.
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    /// Optional spec hash (`sha256:<hex>`) for version detection.
    #[serde(default)]
    pub spec_hash: Option<String>,

    /// Hash policy: warn, fail, or ignore.
    #[serde(default)]
    pub spec_hash_policy: HashPolicy,
}

fn default_spec() -> String {
    DEFAULT_SPEC_URL.to_string()
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

impl Default for ApiServerConfig {
    fn default() -> Self {
        Self {
            spec: default_spec(),
            base_url: default_base_url(),
            api_key: None,
            spec_hash: None,
            spec_hash_policy: HashPolicy::default(),
        }
    }
}

impl ApiServerConfig {
    /// The bearer credential, if one is configured and non-empty.
    #[must_use]
    pub fn bearer_token(&self) -> Option<&str> {
        self.api_key.as_deref().filter(|k| !k.is_empty())
    }

    /// Whether the spec location is an http(s) URL rather than a file path.
    #[must_use]
    pub fn spec_is_url(&self) -> bool {
        self.spec.starts_with("http://") || self.spec.starts_with("https://")
    }
}

impl fmt::Debug for ApiServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiServerConfig")
            .field("spec", &self.spec)
            .field("base_url", &self.base_url)
            .field("api_key", &self.bearer_token().map(|_| "<redacted>"))
            .field("spec_hash", &self.spec_hash)
            .field("spec_hash_policy", &self.spec_hash_policy)
            .finish()
    }
}

/// Hash verification policy.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HashPolicy {
    /// Log warning if hash doesn't match.
    #[default]
    Warn,
    /// Fail loading if hash doesn't match.
    Fail,
    /// Ignore hash verification.
    Ignore,
}

impl std::str::FromStr for HashPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "warn" => Ok(HashPolicy::Warn),
            "fail" => Ok(HashPolicy::Fail),
            "ignore" => Ok(HashPolicy::Ignore),
            other => Err(format!(
                "unknown hash policy '{other}' (expected warn, fail or ignore)"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_api_key_is_treated_as_absent() {
        let cfg = ApiServerConfig {
            api_key: Some(String::new()),
            ..ApiServerConfig::default()
        };
        assert_eq!(cfg.bearer_token(), None);

        let cfg = ApiServerConfig {
            api_key: Some("secret".to_string()),
            ..ApiServerConfig::default()
        };
        assert_eq!(cfg.bearer_token(), Some("secret"));
        assert!(!format!("{cfg:?}").contains("secret"));
    }

    #[test]
    fn deserializes_with_defaults() {
        let cfg: ApiServerConfig = serde_json::from_str(r#"{"spec": "./openapi.yaml"}"#).unwrap();
        assert_eq!(cfg.spec, "./openapi.yaml");
        assert_eq!(cfg.base_url, DEFAULT_BASE_URL);
        assert_eq!(cfg.spec_hash_policy, HashPolicy::Warn);
        assert!(!cfg.spec_is_url());
    }

    #[test]
    fn parses_hash_policy() {
        assert_eq!("FAIL".parse::<HashPolicy>(), Ok(HashPolicy::Fail));
        assert!("strict".parse::<HashPolicy>().is_err());
    }
}
