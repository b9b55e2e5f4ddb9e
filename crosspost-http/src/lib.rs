//! Minimal HTTP client with safe logging and flexible auth.
//!
//! - Request options: headers, `Auth`, query params, absolute URLs
//! - Every request gets the fixed 20s timeout (5s to connect)
//! - Bodies: JSON, urlencoded forms, raw bytes, multipart
//! - Redacts secret form/query fields and never logs secret values
//! - Optional *raw* request/response logging via `CROSSPOST_HTTP_RAW=1`
//!
//! Requests are sent exactly once. Callers that want retries must loop themselves.
//!
//! Example (no_run):
//! ```rust
//! # async fn demo() -> Result<(), crosspost_http::HttpError> {
//! let client = crosspost_http::HttpClient::new("https://api.example.com")?;
//! let got: serde_json::Value = client
//!     .get_json("v1/items", crosspost_http::RequestOpts::default())
//!     .await?;
//! # Ok(()) }
//! ```
//!
//! Security: `Auth::Bearer` values are sanitized before use, and logs only
//! ever include the auth kind (bearer/header/none), not the secret.
//!
//! Observability: structured `tracing` events are emitted for request start,
//! response headers, body snippets (truncated), final errors, and (optionally)
//! raw request/response lines (target `http.raw`) when `CROSSPOST_HTTP_RAW=1`.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::multipart::Form;
use reqwest::{Client, Method, StatusCode, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::borrow::Cow;
use std::env;
use std::time::Duration;
use thiserror::Error;

/// Whole-request transport timeout.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

// ==============================
// Raw logging toggles
// ==============================

const RAW_ENV: &str = "CROSSPOST_HTTP_RAW";
const RAW_MAX_BODY: usize = 64 * 1024; // cap raw body logs (64 KiB)

fn raw_enabled() -> bool {
    matches!(
        env::var(RAW_ENV).as_deref(),
        Ok("1") | Ok("true") | Ok("yes")
    )
}

fn is_secret_field(name: &str) -> bool {
    matches!(
        name.to_ascii_lowercase().as_str(),
        "access_token"
            | "authorization"
            | "auth"
            | "key"
            | "api_key"
            | "token"
            | "secret"
            | "client_secret"
            | "code"
            | "bearer"
            | "oauth_token"
    )
}

/// Render a best-effort curl command for repro/debug, with secrets redacted.
fn make_curl(method: &Method, url: &Url, headers: &HeaderMap, body: Option<&Body>) -> String {
    let mut parts = vec!["curl".to_string(), format!("-X{}", method)];
    for (name, val) in redact_headers(headers) {
        parts.push(format!("-H '{}: {}'", name, val.replace('\'', r"'\''")));
    }
    match body {
        Some(Body::Json(bytes)) => {
            let mut s = String::from_utf8_lossy(bytes).to_string();
            if s.len() > RAW_MAX_BODY {
                s.truncate(RAW_MAX_BODY);
                s.push('…');
            }
            parts.push(format!("-d '{}'", s.replace('\'', r"'\''")));
        }
        Some(Body::Form(fields)) => {
            for (k, v) in redact_pairs(fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))) {
                parts.push(format!("--data-urlencode '{}={}'", k, v.replace('\'', r"'\''")));
            }
        }
        Some(Body::Bytes(bytes)) => {
            parts.push(format!("--data-binary @- # ({} bytes)", bytes.len()));
        }
        Some(Body::Multipart(_)) => parts.push("-F <multipart>".to_string()),
        None => {}
    }
    parts.push(format!("'{}'", url.as_str()));
    parts.join(" ")
}

/// Redact sensitive headers for logging
fn redact_headers(h: &HeaderMap) -> Vec<(String, String)> {
    h.iter()
        .map(|(k, v)| {
            let key = k.as_str().to_string();
            let mut val = v.to_str().unwrap_or("").to_string();
            if key.eq_ignore_ascii_case("authorization") {
                val = "<redacted>".into();
            }
            (key, val)
        })
        .collect()
}

fn redact_pairs<'a, I>(pairs: I) -> Vec<(String, String)>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    pairs
        .into_iter()
        .map(|(k, v)| {
            (
                k.to_string(),
                if is_secret_field(k) {
                    "<redacted>".to_string()
                } else {
                    v.to_string()
                },
            )
        })
        .collect()
}

// ==============================
// Errors
// ==============================

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("invalid URL: {0}")]
    Url(String),
    #[error("request build failed: {0}")]
    Build(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("decode error: {0}, body_snippet: {1}")]
    Decode(String, String),
    #[error(
        "server returned error {status}: {}, request_id={request_id}",
        describe_api(.message, .body)
    )]
    Api {
        status: StatusCode,
        /// Message reported by the provider, when the body carried one.
        message: Option<String>,
        /// Truncated response body.
        body: String,
        request_id: String,
    },
}

fn describe_api(message: &Option<String>, body: &str) -> String {
    match message {
        Some(m) => m.clone(),
        None => body.to_string(),
    }
}

// ==============================
// Auth, bodies & request options
// ==============================

/// Authentication strategies supported by the HTTP client helpers.
///
/// ```
/// use crosspost_http::Auth;
///
/// let bearer = Auth::Bearer("token");
/// match bearer {
///     Auth::Bearer(value) => assert_eq!(value, "token"),
///     _ => unreachable!(),
/// }
/// ```
#[derive(Clone, Debug)]
pub enum Auth<'a> {
    /// Authorization: Bearer <token>
    Bearer(&'a str),
    /// Prebuilt header (e.g. an OAuth 1.0a `Authorization: OAuth ...` value)
    Header {
        name: HeaderName,
        value: HeaderValue,
    },
    None,
}

/// Request payloads understood by [`HttpClient::send`].
pub enum Body {
    /// Serialized JSON bytes, sent with `Content-Type: application/json`.
    Json(Vec<u8>),
    /// `application/x-www-form-urlencoded` fields.
    Form(Vec<(String, String)>),
    /// Raw binary payload.
    Bytes(Vec<u8>),
    Multipart(Form),
}

impl Body {
    pub fn json<B: Serialize + ?Sized>(value: &B) -> Result<Self, HttpError> {
        serde_json::to_vec(value)
            .map(Body::Json)
            .map_err(|e| HttpError::Build(format!("json body: {e}")))
    }

    fn kind(&self) -> &'static str {
        match self {
            Body::Json(_) => "json",
            Body::Form(_) => "form",
            Body::Bytes(_) => "bytes",
            Body::Multipart(_) => "multipart",
        }
    }
}

/// Per-request tuning knobs for the HTTP client.
///
/// ```
/// use crosspost_http::{Auth, RequestOpts};
/// use std::borrow::Cow;
///
/// let opts = RequestOpts {
///     auth: Some(Auth::Bearer("demo")),
///     query: Some(vec![("action", Cow::Borrowed("registerUpload"))]),
///     ..Default::default()
/// };
///
/// assert_eq!(opts.query.as_ref().map(Vec::len), Some(1));
/// assert!(opts.allow_absolute == false);
/// ```
#[derive(Clone, Debug, Default)]
pub struct RequestOpts<'a> {
    pub auth: Option<Auth<'a>>,
    pub headers: Option<HeaderMap>,
    pub query: Option<Vec<(&'a str, Cow<'a, str>)>>,
    /// If true and `path` is an absolute URL, use it as-is (ignore base).
    pub allow_absolute: bool,
}

/// Successful response with the body fully buffered.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Decode the body as JSON. An empty body decodes as `null`, so `Option<T>` works
    /// for endpoints that may answer `201` without content.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, HttpError> {
        let bytes: &[u8] = if self.body.iter().all(u8::is_ascii_whitespace) {
            b"null"
        } else {
            &self.body
        };
        serde_json::from_slice::<T>(bytes).map_err(|e| {
            let snippet = snip_body(&self.body);
            tracing::warn!(
                serde_line=%e.line(),
                serde_col=%e.column(),
                serde_err=%e.to_string(),
                body_snippet=%snippet,
                "http.response.decode_error"
            );
            HttpError::Decode(e.to_string(), snippet)
        })
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

// ==============================
// Client
// ==============================

#[derive(Clone)]
pub struct HttpClient {
    base: Url,
    inner: Client,
}

impl HttpClient {
    /// Construct a client anchored to a base URL.
    ///
    /// ```
    /// use crosspost_http::{HttpClient, HttpError};
    ///
    /// let client = HttpClient::new("https://api.example.com/v2/")?;
    /// let url = client.resolve("me", false)?;
    /// assert_eq!(url.as_str(), "https://api.example.com/v2/me");
    /// # Ok::<(), HttpError>(())
    /// ```
    pub fn new(base: &str) -> Result<Self, HttpError> {
        let base = Url::parse(base).map_err(|e| HttpError::Url(e.to_string()))?;
        let inner = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| HttpError::Build(e.to_string()))?;
        Ok(Self { base, inner })
    }

    /// Resolve `path` against the base (or as-is when absolute and allowed).
    pub fn resolve(&self, path: &str, allow_absolute: bool) -> Result<Url, HttpError> {
        if allow_absolute {
            if let Ok(abs) = Url::parse(path) {
                return Ok(abs);
            }
        }
        self.base
            .join(path)
            .map_err(|e| HttpError::Url(e.to_string()))
    }

    /// GET JSON with per-request options.
    pub async fn get_json<T>(&self, path: &str, opts: RequestOpts<'_>) -> Result<T, HttpError>
    where
        T: DeserializeOwned,
    {
        self.send(Method::GET, path, None, opts).await?.json()
    }

    /// POST JSON with per-request options.
    pub async fn post_json_opts<B, T>(
        &self,
        path: &str,
        body: &B,
        opts: RequestOpts<'_>,
    ) -> Result<T, HttpError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send(Method::POST, path, Some(Body::json(body)?), opts)
            .await?
            .json()
    }

    /// POST an urlencoded form and decode the JSON answer.
    pub async fn post_form_json<T>(
        &self,
        path: &str,
        fields: Vec<(String, String)>,
        opts: RequestOpts<'_>,
    ) -> Result<T, HttpError>
    where
        T: DeserializeOwned,
    {
        self.send(Method::POST, path, Some(Body::Form(fields)), opts)
            .await?
            .json()
    }

    /// PUT raw bytes; the response body is not consumed by callers.
    pub async fn put_bytes(
        &self,
        path: &str,
        bytes: Vec<u8>,
        opts: RequestOpts<'_>,
    ) -> Result<(), HttpError> {
        self.send(Method::PUT, path, Some(Body::Bytes(bytes)), opts)
            .await
            .map(|_| ())
    }

    // ==============================
    // Core request implementation
    // ==============================

    /// Send one request. Non-2xx answers become [`HttpError::Api`].
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<Body>,
        opts: RequestOpts<'_>,
    ) -> Result<HttpResponse, HttpError> {
        let url = self.resolve(path, opts.allow_absolute)?;

        // ----- Build request -----
        let mut rb = self.inner.request(method.clone(), url.clone());


        if let Some(q) = &opts.query {
            let pairs: Vec<(&str, &str)> = q.iter().map(|(k, v)| (*k, v.as_ref())).collect();
            rb = rb.query(&pairs);
        }

        if let Some(hdrs) = &opts.headers {
            rb = rb.headers(hdrs.clone());
        }

        if let Some(auth) = &opts.auth {
            match auth {
                Auth::Bearer(tok) => {
                    let tok = sanitize_token(tok)?;
                    rb = rb.bearer_auth(tok);
                }
                Auth::Header { name, value } => {
                    rb = rb.header(name, value);
                }
                Auth::None => {}
            }
        }

        // ----- Safe request logging (pre-send) -----
        let auth_kind = match &opts.auth {
            Some(Auth::Bearer(_)) => "bearer",
            Some(Auth::Header { .. }) => "header",
            Some(Auth::None) | None => "none",
        };

        let redacted_q = opts
            .query
            .as_ref()
            .map(|q| redact_pairs(q.iter().map(|(k, v)| (*k, v.as_ref()))))
            .unwrap_or_default();

        // Lightweight request id without extra deps
        let req_id = format!(
            "r{:x}",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos()
        );

        tracing::debug!(
            req_id=%req_id,
            method=%method,
            host_path=%format!("{}{}", url.host_str().unwrap_or("-"), url.path()),
            query=?redacted_q,
            auth_kind,
            body_kind=body.as_ref().map(Body::kind).unwrap_or("none"),
            "http.request.start"
        );

        if raw_enabled() {
            let merged = opts.headers.clone().unwrap_or_default();
            let curl = make_curl(&method, &url, &merged, body.as_ref());
            tracing::debug!(target: "http.raw", %req_id, %curl, "request");
        }

        rb = match body {
            Some(Body::Json(bytes)) => rb
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(bytes),
            Some(Body::Form(fields)) => rb.form(&fields),
            Some(Body::Bytes(bytes)) => rb.body(bytes),
            Some(Body::Multipart(form)) => rb.multipart(form),
            None => rb,
        };

        // ----- Send -----
        let t0 = std::time::Instant::now();
        let resp = rb.send().await.map_err(|err| {
            let message = err.to_string();
            tracing::warn!(req_id=%req_id, message=%message, "http.network_error.send");
            HttpError::Network(message)
        })?;
        let status = resp.status();
        let headers = resp.headers().clone();
        let bytes = resp.bytes().await.map_err(|err| {
            let message = err.to_string();
            tracing::warn!(req_id=%req_id, message=%message, "http.network_error.body");
            HttpError::Network(message)
        })?;
        let dur_ms = t0.elapsed().as_millis() as u64;

        let req_hdr_id = headers
            .get("x-request-id")
            .or_else(|| headers.get("x-li-uuid"))
            .or_else(|| headers.get("x-transaction-id"))
            .and_then(|v| v.to_str().ok())
            .unwrap_or("-")
            .to_string();

        let remain = headers
            .get("x-rate-limit-remaining")
            .and_then(|v| v.to_str().ok());

        tracing::debug!(
            req_id=%req_id,
            %status,
            duration_ms=dur_ms,
            body_len=bytes.len(),
            x_request_id=%req_hdr_id,
            rate_limit.remaining=?remain,
            "http.response.headers"
        );

        if raw_enabled() {
            let hdrs = redact_headers(&headers);
            let truncated = bytes.len() > RAW_MAX_BODY;
            let text = String::from_utf8_lossy(&bytes[..bytes.len().min(RAW_MAX_BODY)]);
            tracing::info!(
                target:"http.raw",
                %req_id,
                status=%status,
                duration_ms=dur_ms,
                headers=?hdrs,
                body=%text,
                truncated
            );
        }

        let snippet = snip_body(&bytes);
        tracing::trace!(req_id=%req_id, body_snippet=%snippet, "http.response.body_snippet");

        if status.is_success() {
            return Ok(HttpResponse {
                status,
                headers,
                body: bytes.to_vec(),
            });
        }

        let message = extract_error_message(&bytes);
        tracing::warn!(
            req_id=%req_id,
            %status,
            message=?message,
            x_request_id=%req_hdr_id,
            body_snippet=%snippet,
            "http.error"
        );
        Err(HttpError::Api {
            status,
            message,
            body: snippet,
            request_id: req_hdr_id,
        })
    }
}

// ==============================
// Helpers
// ==============================

/// Pull a human readable message out of the error envelopes used by the
/// providers we talk to.
fn extract_error_message(body: &[u8]) -> Option<String> {
    #[derive(serde::Deserialize)]
    struct TwErrors {
        errors: Vec<TwErr>,
    }
    #[derive(serde::Deserialize)]
    struct TwErr {
        #[serde(default)]
        message: String,
        #[serde(default)]
        detail: String,
        #[serde(default)]
        title: String,
    }

    // OAuth 2.0: {"error":"invalid_request","error_description":"..."}
    // LinkedIn REST: {"message":"...","serviceErrorCode":65600,"status":401}
    #[derive(serde::Deserialize)]
    struct Msg {
        #[serde(default)]
        message: String,
        #[serde(default)]
        error_description: String,
        #[serde(default)]
        detail: String,
        #[serde(default)]
        error: serde_json::Value,
    }

    if let Ok(tw) = serde_json::from_slice::<TwErrors>(body) {
        if let Some(first) = tw.errors.into_iter().next() {
            for candidate in [first.message, first.detail, first.title] {
                if !candidate.is_empty() {
                    return Some(candidate);
                }
            }
        }
    }
    if let Ok(m) = serde_json::from_slice::<Msg>(body) {
        for candidate in [m.message, m.error_description, m.detail] {
            if !candidate.is_empty() {
                return Some(candidate);
            }
        }
        if let Some(e) = m.error.as_str().filter(|e| !e.is_empty()) {
            return Some(e.to_string());
        }
    }
    None
}

fn snip_body(body: &[u8]) -> String {
    let mut snip = String::from_utf8_lossy(body).to_string();
    if snip.len() > 500 {
        let mut cut = 500;
        while !snip.is_char_boundary(cut) {
            cut -= 1;
        }
        snip.truncate(cut);
        snip.push_str("...");
    }
    snip
}

fn sanitize_token(raw: &str) -> Result<String, HttpError> {
    let mut s = raw
        .trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .to_string();

    s.retain(|ch| !ch.is_ascii_whitespace());

    if s.is_empty() {
        return Err(HttpError::Build("bearer token is empty".into()));
    }
    if !s.is_ascii() {
        return Err(HttpError::Build("bearer token contains non-ASCII bytes".into()));
    }
    if s.bytes().any(|b| b < 0x20 || b == 0x7F) {
        return Err(HttpError::Build(
            "bearer token contains control characters".into(),
        ));
    }

    HeaderValue::from_str(&format!("Bearer {}", s))
        .map_err(|e| HttpError::Build(format!("invalid Authorization header: {e}")))?;
    Ok(s)
}
