//! Raw HTTP access to the gymtrack backend.
//!
//! `HttpTransport` knows how to turn an [`ApiRequest`] into a reqwest call
//! and how to map non-2xx responses onto [`ApiError`]. It holds no session
//! state; the caller decides which token (if any) to attach.

use std::time::Duration;

use reqwest::multipart::{Form, Part};
use reqwest::{header, Client, Method, Response, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use super::ApiError;

/// Body of an outgoing request. Kept as plain data so a request can be
/// rebuilt and resent after a token refresh.
#[derive(Debug, Clone)]
pub enum RequestBody {
    Empty,
    Json(Value),
    Multipart(FilePart),
}

/// A single file field of a multipart upload.
#[derive(Clone)]
pub struct FilePart {
    pub field: String,
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for FilePart {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilePart")
            .field("field", &self.field)
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Method, path segments and body of one backend call.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    segments: Vec<String>,
    body: RequestBody,
}

impl ApiRequest {
    pub fn new(method: Method, segments: &[&str], body: RequestBody) -> Self {
        Self {
            method,
            segments: segments.iter().map(|s| s.to_string()).collect(),
            body,
        }
    }

    pub fn get(segments: &[&str]) -> Self {
        Self::new(Method::GET, segments, RequestBody::Empty)
    }

    pub fn post(segments: &[&str], body: Value) -> Self {
        Self::new(Method::POST, segments, RequestBody::Json(body))
    }

    pub fn put(segments: &[&str], body: Value) -> Self {
        Self::new(Method::PUT, segments, RequestBody::Json(body))
    }

    pub fn patch_file(segments: &[&str], part: FilePart) -> Self {
        Self::new(Method::PATCH, segments, RequestBody::Multipart(part))
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Path for logging, e.g. `/exercises/bygroup/costas`.
    pub fn path(&self) -> String {
        format!("/{}", self.segments.join("/"))
    }
}

/// Shared reqwest client bound to one backend base URL.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: Url,
}

impl HttpTransport {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| ApiError::InvalidRequest(format!("bad base URL {:?}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::InvalidRequest(format!(
                "base URL {} cannot carry a path",
                base_url
            )));
        }

        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolve path segments against the base URL. Each segment is
    /// percent-encoded, so a group name like "membros superiores" is safe.
    pub fn endpoint<S: AsRef<str>>(&self, segments: &[S]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidRequest(format!("base URL {} cannot carry a path", self.base_url)))?
            .pop_if_empty()
            .extend(segments.iter().map(|s| s.as_ref()));
        Ok(url)
    }

    fn build(&self, request: &ApiRequest, token: Option<&str>) -> Result<reqwest::RequestBuilder, ApiError> {
        let url = self.endpoint(&request.segments)?;
        let mut builder = self
            .client
            .request(request.method.clone(), url)
            .header(header::ACCEPT, "application/json");

        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }

        builder = match &request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(body) => builder.json(body),
            RequestBody::Multipart(file) => {
                let part = Part::bytes(file.bytes.clone())
                    .file_name(file.file_name.clone())
                    .mime_str(&file.content_type)
                    .map_err(|e| ApiError::InvalidRequest(format!("bad content type: {}", e)))?;
                builder.multipart(Form::new().part(file.field.clone(), part))
            }
        };

        Ok(builder)
    }

    /// Send a request, returning the response only if it was successful.
    pub async fn send(&self, request: &ApiRequest, token: Option<&str>) -> Result<Response, ApiError> {
        let path = request.path();
        debug!(method = %request.method, path = %path, authenticated = token.is_some(), "Sending request");

        let response = self.build(request, token)?.send().await?;
        Self::check_response(response, &path).await
    }

    /// Send a request and parse the JSON body of the successful response.
    pub async fn send_json<T: DeserializeOwned>(
        &self,
        request: &ApiRequest,
        token: Option<&str>,
    ) -> Result<T, ApiError> {
        let response = self.send(request, token).await?;
        Self::decode(response, &request.path()).await
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: Response, path: &str) -> Result<Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(path = path, status = %status, "Request failed");
            Err(ApiError::from_status(status, &body))
        }
    }

    pub async fn decode<T: DeserializeOwned>(response: Response, path: &str) -> Result<T, ApiError> {
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| {
            ApiError::InvalidResponse(format!("Failed to parse response from {}: {}", path, e))
        })
    }
}
