//! HTTP API client for the Tracker REST API.
//!
//! Requests are plain data ([`ApiRequest`]) executed by a [`Transport`]. The
//! production transport is reqwest; tests swap in a recording fake.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracker_shared::ApiError;
use url::Url;

use crate::auth_session::Credentials;

/// One REST call: method, path relative to the API base, query pairs, JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        let path = path.into();
        let path = if path.starts_with('/') {
            path
        } else {
            format!("/{path}")
        };
        Self {
            method,
            path,
            query: Vec::new(),
            body: None,
        }
    }

    pub fn with_query(mut self, query: QueryParams) -> Self {
        self.query = query.into_pairs();
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Value of the first query parameter called `name`.
    pub fn query_value(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Query string builder that drops parameters the API treats as "no filter".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryParams(Vec<(String, String)>);

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `name=value` unless the value is absent, blank, or the `"all"` sentinel
    /// the filter dropdowns use.
    pub fn filter(mut self, name: &str, value: Option<&str>) -> Self {
        if let Some(v) = value.map(str::trim).filter(|v| !is_unfiltered(v)) {
            self.0.push((name.to_string(), v.to_string()));
        }
        self
    }

    /// Add free text as typed. Only an absent or empty value is dropped.
    pub fn text(mut self, name: &str, value: Option<&str>) -> Self {
        if let Some(v) = value.filter(|v| !v.is_empty()) {
            self.0.push((name.to_string(), v.to_string()));
        }
        self
    }

    /// Add `name=value` when a value is present.
    pub fn opt<T: ToString>(mut self, name: &str, value: Option<T>) -> Self {
        if let Some(v) = value {
            self.0.push((name.to_string(), v.to_string()));
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_pairs(self) -> Vec<(String, String)> {
        self.0
    }
}

/// Whether a dropdown value means "no filter".
pub fn is_unfiltered(value: &str) -> bool {
    let value = value.trim();
    value.is_empty() || value.eq_ignore_ascii_case("all")
}

/// Executes [`ApiRequest`]s. Returns `Ok(None)` for an empty success body.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn execute(&self, request: ApiRequest) -> Result<Option<Value>, ApiError>;
}

/// reqwest-backed transport sending the session's bearer token.
pub struct HttpTransport {
    client: Client,
    base_url: String,
    credentials: Credentials,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>, credentials: Credentials) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credentials,
        }
    }

    fn url(&self, request: &ApiRequest) -> Result<Url, ApiError> {
        let mut url = Url::parse(&format!("{}{}", self.base_url, request.path))
            .map_err(|e| ApiError::InvalidUrl(format!("{}{}: {e}", self.base_url, request.path)))?;
        if !request.query.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(request.query.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        }
        Ok(url)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: ApiRequest) -> Result<Option<Value>, ApiError> {
        let url = self.url(&request)?;
        crate::log_debug!("{} {}", request.method, url);

        let mut rb = self.client.request(request.method.clone(), url);
        if let Some(token) = self.credentials.token() {
            rb = rb.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            rb = rb.json(body);
        }

        let resp = rb.send().await.map_err(|e| ApiError::Network(e.to_string()))?;

        let status = resp.status().as_u16();
        let is_success = resp.status().is_success();
        let text = resp
            .text()
            .await
            .map_err(|e| ApiError::Network(format!("failed to read body: {e}")))?;

        if !is_success {
            crate::log_warn!("{} {} failed with {}", request.method, request.path, status);
            return Err(ApiError::Http { status, body: text });
        }

        if text.trim().is_empty() {
            return Ok(None);
        }
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|e| ApiError::Deserialize(e.to_string()))
    }
}

/// Typed front of a [`Transport`].
#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn Transport>,
}

impl ApiClient {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Client talking HTTP to `base_url`.
    pub fn http(base_url: impl Into<String>, credentials: Credentials) -> Self {
        Self::new(Arc::new(HttpTransport::new(base_url, credentials)))
    }

    pub async fn send<TRes: DeserializeOwned>(&self, request: ApiRequest) -> Result<TRes, ApiError> {
        let body = self.transport.execute(request).await?;
        serde_json::from_value(body.unwrap_or(Value::Null))
            .map_err(|e| ApiError::Deserialize(e.to_string()))
    }

    pub async fn get_json<TRes: DeserializeOwned>(
        &self,
        path: &str,
        query: QueryParams,
    ) -> Result<TRes, ApiError> {
        self.send(ApiRequest::new(Method::GET, path).with_query(query))
            .await
    }

    pub async fn post_json<TReq: Serialize, TRes: DeserializeOwned>(
        &self,
        path: &str,
        body: &TReq,
    ) -> Result<TRes, ApiError> {
        self.send(ApiRequest::new(Method::POST, path).with_body(to_body(body)?))
            .await
    }

    pub async fn patch_json<TReq: Serialize, TRes: DeserializeOwned>(
        &self,
        path: &str,
        body: &TReq,
    ) -> Result<TRes, ApiError> {
        self.send(ApiRequest::new(Method::PATCH, path).with_body(to_body(body)?))
            .await
    }

    pub async fn delete(&self, path: &str) -> Result<(), ApiError> {
        self.transport
            .execute(ApiRequest::new(Method::DELETE, path))
            .await
            .map(|_| ())
    }
}

fn to_body<T: Serialize>(body: &T) -> Result<Value, ApiError> {
    serde_json::to_value(body).map_err(|e| ApiError::Deserialize(e.to_string()))
}

/// Percent-encode one path segment (ids coming from the UI).
pub fn segment(raw: &str) -> String {
    urlencoding::encode(raw).into_owned()
}
