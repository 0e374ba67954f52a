//! The external API client capability set (spec.md §6.1).
//!
//! Actions see `&dyn ApiClient` as their first argument. The core ships one
//! production adapter, [`ReqwestApiClient`], built on `reqwest`'s blocking
//! client — the same dependency (`reqwest`, with the `blocking` feature)
//! the teacher crate already carries for its own outbound HTTP calls. Auth
//! header injection, retries, and connection pooling policy are
//! deliberately left to whatever the caller wraps this in — out of scope
//! per spec.md §1.

use crate::action::{ActionResult, HttpRequest, HttpResponse};
use crate::value::Value;
use std::collections::BTreeMap;
use std::time::Instant;

/// Per-call options mirroring the reference implementation's
/// `get/post/put/patch/delete(path, *, json, data, headers, params)`
/// keyword arguments.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub json: Option<Value>,
    pub data: Option<Value>,
    pub headers: BTreeMap<String, String>,
    pub params: BTreeMap<String, String>,
}

impl RequestOptions {
    pub fn json(value: Value) -> Self {
        Self {
            json: Some(value),
            ..Default::default()
        }
    }
}

/// Minimum capability an object-safe API client must expose (spec.md §6.1).
pub trait ApiClient: Send + Sync {
    fn get(&self, path: &str, opts: RequestOptions) -> ActionResult;
    fn post(&self, path: &str, opts: RequestOptions) -> ActionResult;
    fn put(&self, path: &str, opts: RequestOptions) -> ActionResult;
    fn patch(&self, path: &str, opts: RequestOptions) -> ActionResult;
    fn delete(&self, path: &str, opts: RequestOptions) -> ActionResult;
}

/// A minimal, production-shaped [`ApiClient`] over `reqwest::blocking`.
///
/// Transport failures are converted to `ActionResult::from_error` rather
/// than propagated as an error type — per spec.md §6.1's "error-converted
/// mode" contract.
pub struct ReqwestApiClient {
    base_url: String,
    client: reqwest::blocking::Client,
    default_headers: BTreeMap<String, String>,
}

impl ReqwestApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::blocking::Client::new(),
            default_headers: BTreeMap::new(),
        }
    }

    pub fn with_default_headers(mut self, headers: BTreeMap<String, String>) -> Self {
        self.default_headers = headers;
        self
    }

    fn request(&self, method: reqwest::Method, path: &str, opts: RequestOptions) -> ActionResult {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        let mut merged_headers = self.default_headers.clone();
        merged_headers.extend(opts.headers.clone());

        let body = opts.json.clone().or_else(|| opts.data.clone());
        let request = HttpRequest {
            method: method.to_string(),
            url: url.clone(),
            headers: merged_headers.clone(),
            body: body.clone(),
        };

        let mut builder = self.client.request(method, &url);
        for (k, v) in &merged_headers {
            builder = builder.header(k, v);
        }
        if !opts.params.is_empty() {
            builder = builder.query(&opts.params.into_iter().collect::<Vec<_>>());
        }
        if let Some(json) = &opts.json {
            builder = builder.json::<serde_json::Value>(&json.clone().into());
        } else if let Some(data) = &opts.data {
            builder = builder.json::<serde_json::Value>(&data.clone().into());
        }

        let start = Instant::now();
        match builder.send() {
            Ok(resp) => {
                let duration_ms = start.elapsed().as_secs_f64() * 1000.0;
                let status = resp.status().as_u16();
                let headers = resp
                    .headers()
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or_default().to_string()))
                    .collect::<BTreeMap<_, _>>();
                let is_json = headers
                    .get("content-type")
                    .map(|ct| ct.starts_with("application/json"))
                    .unwrap_or(false);
                let body = if is_json {
                    resp.json::<serde_json::Value>().ok().map(Value::from)
                } else {
                    resp.text().ok().map(Value::Str)
                };
                ActionResult::from_response(
                    request,
                    HttpResponse { status, headers, body },
                    duration_ms,
                )
            }
            Err(e) => ActionResult::from_error(request, e.to_string()),
        }
    }
}

impl ApiClient for ReqwestApiClient {
    fn get(&self, path: &str, opts: RequestOptions) -> ActionResult {
        self.request(reqwest::Method::GET, path, opts)
    }
    fn post(&self, path: &str, opts: RequestOptions) -> ActionResult {
        self.request(reqwest::Method::POST, path, opts)
    }
    fn put(&self, path: &str, opts: RequestOptions) -> ActionResult {
        self.request(reqwest::Method::PUT, path, opts)
    }
    fn patch(&self, path: &str, opts: RequestOptions) -> ActionResult {
        self.request(reqwest::Method::PATCH, path, opts)
    }
    fn delete(&self, path: &str, opts: RequestOptions) -> ActionResult {
        self.request(reqwest::Method::DELETE, path, opts)
    }
}

/// Test-only doubles kept out of `testing` (which is the spec-grounded
/// Rollbackable/ResourceGraph fixture module) since these are purely for
/// this crate's own unit tests, not part of the public testing surface.
#[cfg(test)]
pub(crate) mod tests_support {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct RecordingApi {
        pub calls: Mutex<Vec<(String, String)>>,
    }

    impl ApiClient for RecordingApi {
        fn get(&self, path: &str, _opts: RequestOptions) -> ActionResult {
            self.record("GET", path)
        }
        fn post(&self, path: &str, _opts: RequestOptions) -> ActionResult {
            self.record("POST", path)
        }
        fn put(&self, path: &str, _opts: RequestOptions) -> ActionResult {
            self.record("PUT", path)
        }
        fn patch(&self, path: &str, _opts: RequestOptions) -> ActionResult {
            self.record("PATCH", path)
        }
        fn delete(&self, path: &str, _opts: RequestOptions) -> ActionResult {
            self.record("DELETE", path)
        }
    }

    impl RecordingApi {
        fn record(&self, method: &str, path: &str) -> ActionResult {
            self.calls.lock().unwrap().push((method.to_string(), path.to_string()));
            ActionResult::from_response(
                HttpRequest {
                    method: method.to_string(),
                    url: path.to_string(),
                    headers: BTreeMap::new(),
                    body: None,
                },
                HttpResponse {
                    status: 200,
                    headers: BTreeMap::new(),
                    body: Some(Value::map()),
                },
                0.5,
            )
        }
    }
}
