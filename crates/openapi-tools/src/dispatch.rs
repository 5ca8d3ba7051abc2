//! Turning a validated argument bag into one HTTP request against the live API.

use crate::document::ParamLocation;
use crate::error::{OpenApiToolsError, Result};
use crate::extract::EndpointDescriptor;
use crate::tool_schema::BODY_FIELD;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method};
use rmcp::model::JsonObject;
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use url::Url;

/// Outcome of a dispatched call. Non-2xx statuses are ordinary responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse {
    pub status: u16,
    pub status_text: String,
    /// Parsed JSON for JSON responses, raw text otherwise.
    pub data: Value,
}

/// HTTP client bound to one API base URL and credential.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    #[must_use]
    pub fn new(client: Client, base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.filter(|k| !k.is_empty()),
        }
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Perform the request described by `endpoint` with already-validated arguments.
    ///
    /// Exactly one network call is made, with no retry.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL or a header cannot be built, or on transport failure.
    pub async fn dispatch(
        &self,
        endpoint: &EndpointDescriptor,
        arguments: &JsonObject,
    ) -> Result<ApiResponse> {
        let url = self.build_url(endpoint, arguments)?;
        let headers = self.build_headers(endpoint, arguments)?;

        let mut request = self
            .client
            .request(endpoint.method.clone(), url)
            .headers(headers);
        if let Some(body) = request_body(&endpoint.method, arguments) {
            request = request.body(serde_json::to_vec(body)?);
        }

        tracing::debug!(tool = %endpoint.name, method = %endpoint.method, path = %endpoint.path, "Dispatching API request");
        let response = request
            .send()
            .await
            .map_err(|e| OpenApiToolsError::Request(sanitize_reqwest_error(&e)))?;

        classify(response).await
    }

    fn build_url(&self, endpoint: &EndpointDescriptor, arguments: &JsonObject) -> Result<Url> {
        let mut path = endpoint.path.clone();
        for param in params_in(endpoint, ParamLocation::Path) {
            if let Some(value) = present(arguments, &param.name) {
                let encoded = encode_uri_component(&value_to_string(value));
                path = path.replace(&format!("{{{}}}", param.name), &encoded);
            }
        }

        let raw = format!("{}{}", self.base_url.trim_end_matches('/'), path);
        let mut url = Url::parse(&raw)
            .map_err(|e| OpenApiToolsError::Runtime(format!("Invalid URL '{raw}': {e}")))?;

        let query: Vec<(&str, String)> = params_in(endpoint, ParamLocation::Query)
            .filter_map(|p| present(arguments, &p.name).map(|v| (p.name.as_str(), value_to_string(v))))
            .collect();
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }

        Ok(url)
    }

    fn build_headers(&self, endpoint: &EndpointDescriptor, arguments: &JsonObject) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if let Some(key) = &self.api_key {
            let value = HeaderValue::from_str(&format!("Bearer {key}")).map_err(|_| {
                OpenApiToolsError::Config("API key is not a valid header value".to_string())
            })?;
            headers.insert(AUTHORIZATION, value);
        }

        for param in params_in(endpoint, ParamLocation::Header) {
            let Some(value) = present(arguments, &param.name) else {
                continue;
            };
            let name = HeaderName::from_bytes(param.name.as_bytes()).map_err(|e| {
                OpenApiToolsError::Runtime(format!("Invalid header name '{}': {e}", param.name))
            })?;
            let value = HeaderValue::from_str(&value_to_string(value)).map_err(|e| {
                OpenApiToolsError::Runtime(format!("Invalid value for header '{}': {e}", param.name))
            })?;
            headers.insert(name, value);
        }

        if request_body(&endpoint.method, arguments).is_some() {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }
        Ok(headers)
    }
}

fn params_in(
    endpoint: &EndpointDescriptor,
    location: ParamLocation,
) -> impl Iterator<Item = &crate::document::ParameterObject> {
    endpoint
        .parameters
        .iter()
        .filter(move |p| p.location == location)
}

/// An argument counts as present when the key exists and is not null.
fn present<'a>(arguments: &'a JsonObject, name: &str) -> Option<&'a Value> {
    arguments.get(name).filter(|v| !v.is_null())
}

fn request_body<'a>(method: &Method, arguments: &'a JsonObject) -> Option<&'a Value> {
    if *method == Method::POST || *method == Method::PUT || *method == Method::PATCH {
        present(arguments, BODY_FIELD)
    } else {
        None
    }
}

async fn classify(response: reqwest::Response) -> Result<ApiResponse> {
    let status = response.status();
    let is_json = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.contains("application/json"));

    let text = response
        .text()
        .await
        .map_err(|e| OpenApiToolsError::Request(sanitize_reqwest_error(&e)))?;
    let data = if is_json {
        serde_json::from_str(&text).unwrap_or(Value::String(text))
    } else {
        Value::String(text)
    };

    Ok(ApiResponse {
        status: status.as_u16(),
        status_text: status.canonical_reason().unwrap_or_default().to_string(),
        data,
    })
}

/// Render an argument for a path, query or header slot.
pub(crate) fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Array(items) => items
            .iter()
            .map(value_to_string)
            .collect::<Vec<_>>()
            .join(","),
        Value::Number(n) => number_to_string(n),
        Value::Bool(_) | Value::Object(_) => value.to_string(),
    }
}

/// Whole floats within the exact-integer range render without a fraction (`42.0` -> `42`).
fn number_to_string(n: &Number) -> String {
    const MAX_EXACT_INT: f64 = 9_007_199_254_740_992.0;
    if n.is_f64()
        && let Some(f) = n.as_f64()
        && f.is_finite()
        && f.fract() == 0.0
        && f.abs() <= MAX_EXACT_INT
    {
        return (f as i64).to_string();
    }
    n.to_string()
}

/// Percent-encode everything except `A-Z a-z 0-9 - _ . ! ~ * ' ( )`.
fn encode_uri_component(s: &str) -> String {
    const HEX: &[u8; 16] = b"0123456789ABCDEF";
    let mut out = String::with_capacity(s.len());
    for &b in s.as_bytes() {
        if b.is_ascii_alphanumeric()
            || matches!(b, b'-' | b'_' | b'.' | b'!' | b'~' | b'*' | b'\'' | b'(' | b')')
        {
            out.push(b as char);
        } else {
            out.push('%');
            out.push(HEX[(b >> 4) as usize] as char);
            out.push(HEX[(b & 0x0F) as usize] as char);
        }
    }
    out
}

/// Error text with the request URL stripped of credentials, query and fragment.
pub(crate) fn sanitize_reqwest_error(e: &reqwest::Error) -> String {
    let mut msg = e.to_string();
    if let Some(u) = e.url() {
        let mut redacted = u.clone();
        let _ = redacted.set_username("");
        let _ = redacted.set_password(None);
        redacted.set_query(None);
        redacted.set_fragment(None);
        msg = msg.replace(u.as_str(), redacted.as_str());
    }
    msg
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::ApiDocument;
    use crate::extract::extract;
    use axum::Router;
    use axum::body::Bytes;
    use axum::http::{HeaderMap as AxumHeaders, StatusCode, Uri};
    use axum::response::IntoResponse;
    use axum::routing::any;
    use serde_json::json;
    use std::sync::{Arc, Mutex};
    use victualia_test_support::{spawn_router, unreachable_base_url};

    #[derive(Debug, Clone, Default)]
    struct Seen {
        method: String,
        uri: String,
        headers: Vec<(String, String)>,
        body: String,
    }

    type Recorder = Arc<Mutex<Vec<Seen>>>;

    fn echo_router(recorder: Recorder) -> Router {
        Router::new().route(
            "/{*path}",
            any(
                move |method: axum::http::Method, uri: Uri, headers: AxumHeaders, body: Bytes| {
                    let recorder = recorder.clone();
                    async move {
                        let seen = Seen {
                            method: method.to_string(),
                            uri: uri.to_string(),
                            headers: headers
                                .iter()
                                .map(|(k, v)| {
                                    (k.to_string(), v.to_str().unwrap_or_default().to_string())
                                })
                                .collect(),
                            body: String::from_utf8_lossy(&body).to_string(),
                        };
                        recorder.lock().unwrap().push(seen);
                        axum::Json(json!({ "ok": true }))
                    }
                },
            ),
        )
    }

    fn header<'a>(seen: &'a Seen, name: &str) -> Vec<&'a str> {
        seen.headers
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    fn endpoint(doc: Value, index: usize) -> EndpointDescriptor {
        extract(&ApiDocument::from_value(doc).unwrap()).remove(index)
    }

    fn args(value: Value) -> JsonObject {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn stringifies_like_url_parameters() {
        assert_eq!(value_to_string(&json!("a b")), "a b");
        assert_eq!(value_to_string(&json!(42)), "42");
        assert_eq!(value_to_string(&json!(1.5)), "1.5");
        assert_eq!(value_to_string(&json!(-3)), "-3");
        assert_eq!(value_to_string(&json!(false)), "false");
        assert_eq!(value_to_string(&json!([1, "x", true])), "1,x,true");
        assert_eq!(value_to_string(&json!({ "k": 1 })), r#"{"k":1}"#);
    }

    #[test]
    fn whole_floats_render_without_fraction() {
        let parsed: Value = serde_json::from_str("42.0").unwrap();
        assert_eq!(value_to_string(&parsed), "42");
        assert_eq!(value_to_string(&json!(-7.0)), "-7");
        assert_eq!(value_to_string(&json!(0.0)), "0");
        assert_eq!(value_to_string(&json!(2.5)), "2.5");
    }

    #[tokio::test]
    async fn whole_float_arguments_fill_path_and_query_as_integers() {
        let recorder = Recorder::default();
        let server = spawn_router(echo_router(recorder.clone())).await.unwrap();
        let ep = endpoint(
            json!({ "paths": { "/homes/{id}": { "get": { "parameters": [
                { "name": "id", "in": "path", "required": true, "schema": { "type": "integer" } },
                { "name": "limit", "in": "query", "schema": { "type": "integer" } }
            ] } } } }),
            0,
        );
        let client = ApiClient::new(Client::new(), server.base_url.clone(), None);
        client
            .dispatch(&ep, &args(json!({ "id": 42.0, "limit": 10.0 })))
            .await
            .unwrap();
        assert_eq!(recorder.lock().unwrap()[0].uri, "/homes/42?limit=10");
    }

    #[test]
    fn encodes_uri_components() {
        assert_eq!(encode_uri_component("a b/c"), "a%20b%2Fc");
        assert_eq!(encode_uri_component("it's-(ok)!*~._"), "it's-(ok)!*~._");
        assert_eq!(encode_uri_component("é"), "%C3%A9");
    }

    #[tokio::test]
    async fn substitutes_path_and_appends_query() {
        let recorder = Recorder::default();
        let server = spawn_router(echo_router(recorder.clone())).await.unwrap();
        let ep = endpoint(
            json!({ "paths": { "/homes/{homeId}/items/{homeId}": { "get": { "parameters": [
                { "name": "homeId", "in": "path", "required": true },
                { "name": "q", "in": "query" },
                { "name": "tags", "in": "query", "schema": { "type": "array" } },
                { "name": "unused", "in": "query" }
            ] } } } }),
            0,
        );
        let client = ApiClient::new(Client::new(), format!("{}/", server.base_url), None);

        let resp = client
            .dispatch(
                &ep,
                &args(json!({ "homeId": "a b", "q": "milk & eggs", "tags": ["x", "y"], "unused": null })),
            )
            .await
            .unwrap();
        assert_eq!(resp.status, 200);
        assert_eq!(resp.status_text, "OK");
        assert_eq!(resp.data, json!({ "ok": true }));

        let seen = recorder.lock().unwrap()[0].clone();
        assert_eq!(seen.method, "GET");
        assert_eq!(seen.uri, "/homes/a%20b/items/a%20b?q=milk+%26+eggs&tags=x%2Cy");
        assert_eq!(header(&seen, "accept"), vec!["application/json"]);
        assert!(header(&seen, "authorization").is_empty());
        assert!(header(&seen, "content-type").is_empty());
    }

    #[tokio::test]
    async fn omits_query_string_when_no_query_values() {
        let recorder = Recorder::default();
        let server = spawn_router(echo_router(recorder.clone())).await.unwrap();
        let ep = endpoint(
            json!({ "paths": { "/items": { "get": { "parameters": [{ "name": "q", "in": "query" }] } } } }),
            0,
        );
        let client = ApiClient::new(Client::new(), server.base_url.clone(), None);
        client.dispatch(&ep, &JsonObject::new()).await.unwrap();
        assert_eq!(recorder.lock().unwrap()[0].uri, "/items");
    }

    #[tokio::test]
    async fn sends_auth_header_params_and_json_body() {
        let recorder = Recorder::default();
        let server = spawn_router(echo_router(recorder.clone())).await.unwrap();
        let ep = endpoint(
            json!({ "paths": { "/items": { "post": {
                "parameters": [
                    { "name": "X-Home", "in": "header" },
                    { "name": "Accept", "in": "header" },
                    { "name": "session", "in": "cookie" }
                ],
                "requestBody": { "content": { "application/json": { "schema": { "type": "object" } } } }
            } } } }),
            0,
        );
        let client = ApiClient::new(Client::new(), server.base_url.clone(), Some("k-123".to_string()));

        client
            .dispatch(
                &ep,
                &args(json!({
                    "X-Home": 7,
                    "Accept": "text/plain",
                    "session": "s",
                    "body": { "name": "rice", "qty": 2 }
                })),
            )
            .await
            .unwrap();

        let seen = recorder.lock().unwrap()[0].clone();
        assert_eq!(seen.method, "POST");
        assert_eq!(header(&seen, "authorization"), vec!["Bearer k-123"]);
        assert_eq!(header(&seen, "x-home"), vec!["7"]);
        assert_eq!(header(&seen, "accept"), vec!["text/plain"]);
        assert_eq!(header(&seen, "content-type"), vec!["application/json"]);
        assert!(header(&seen, "cookie").is_empty());
        let body: Value = serde_json::from_str(&seen.body).unwrap();
        assert_eq!(body, json!({ "name": "rice", "qty": 2 }));
    }

    #[tokio::test]
    async fn body_ignored_for_get_and_null_body() {
        let recorder = Recorder::default();
        let server = spawn_router(echo_router(recorder.clone())).await.unwrap();
        let doc = json!({ "paths": { "/items": {
            "get": {},
            "put": { "requestBody": { "content": { "application/json": { "schema": {} } } } }
        } } });
        let client = ApiClient::new(Client::new(), server.base_url.clone(), None);

        client
            .dispatch(&endpoint(doc.clone(), 0), &args(json!({ "body": { "a": 1 } })))
            .await
            .unwrap();
        client
            .dispatch(&endpoint(doc.clone(), 1), &args(json!({ "body": null })))
            .await
            .unwrap();
        client
            .dispatch(&endpoint(doc, 1), &args(json!({ "body": false })))
            .await
            .unwrap();

        let seen = recorder.lock().unwrap().clone();
        assert!(seen[0].body.is_empty());
        assert!(header(&seen[0], "content-type").is_empty());
        assert!(seen[1].body.is_empty());
        assert_eq!(seen[2].body, "false");
    }

    #[tokio::test]
    async fn classifies_non_json_and_error_responses() {
        let app = Router::new()
            .route("/text", any(|| async { "plain body" }))
            .route(
                "/broken-json",
                any(|| async {
                    (
                        StatusCode::BAD_GATEWAY,
                        [(axum::http::header::CONTENT_TYPE, "application/json")],
                        "{not json",
                    )
                        .into_response()
                }),
            )
            .route(
                "/missing",
                any(|| async {
                    (StatusCode::NOT_FOUND, axum::Json(json!({ "error": "no such item" })))
                }),
            );
        let server = spawn_router(app).await.unwrap();
        let client = ApiClient::new(Client::new(), server.base_url.clone(), None);
        let doc = json!({ "paths": {
            "/text": { "get": {} },
            "/broken-json": { "get": {} },
            "/missing": { "delete": {} }
        } });

        let text = client.dispatch(&endpoint(doc.clone(), 0), &JsonObject::new()).await.unwrap();
        assert_eq!(text.data, json!("plain body"));

        let broken = client.dispatch(&endpoint(doc.clone(), 1), &JsonObject::new()).await.unwrap();
        assert_eq!(broken.status, 502);
        assert_eq!(broken.status_text, "Bad Gateway");
        assert_eq!(broken.data, json!("{not json"));

        let missing = client.dispatch(&endpoint(doc, 2), &JsonObject::new()).await.unwrap();
        assert_eq!(missing.status, 404);
        assert_eq!(missing.data, json!({ "error": "no such item" }));
        assert_eq!(
            serde_json::to_value(&missing).unwrap(),
            json!({ "status": 404, "statusText": "Not Found", "data": { "error": "no such item" } })
        );
    }

    #[tokio::test]
    async fn transport_failure_is_an_error() {
        let ep = endpoint(json!({ "paths": { "/items": { "get": {} } } }), 0);
        let client = ApiClient::new(Client::new(), unreachable_base_url().unwrap(), None);
        let err = client.dispatch(&ep, &JsonObject::new()).await.unwrap_err();
        assert!(matches!(err, OpenApiToolsError::Request(_)));
    }

    #[tokio::test]
    async fn invalid_base_url_is_a_runtime_error() {
        let ep = endpoint(json!({ "paths": { "/items": { "get": {} } } }), 0);
        let client = ApiClient::new(Client::new(), "not a url", None);
        let err = client.dispatch(&ep, &JsonObject::new()).await.unwrap_err();
        assert!(matches!(err, OpenApiToolsError::Runtime(_)));
    }
}
