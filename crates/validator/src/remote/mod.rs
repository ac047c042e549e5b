//! Remote (async) validation.
//!
//! The `remote` validator turns a field value into a [`Request`], sends it
//! through a [`RemoteTransport`] and decides validity from the [`Response`]
//! with a named strategy ([`AsyncValidator`]). Two strategies are always
//! present: `default` (valid iff the status is 2xx) and `reverse` (valid iff
//! it is not).
//!
//! Requests are deduplicated: identical requests issued before the cache is
//! cleared share one in-flight future. Forms clear the cache on every native
//! submit.

#[cfg(feature = "http")]
mod http;

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use moka::sync::Cache;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::{ConfigError, ConfigResult, TransportError};
use crate::outcome::{Check, Rejection};
use crate::registry::{CheckContext, Validator};
use crate::requirement::{Requirement, RequirementKind, RequirementType, Requirements};

#[cfg(feature = "http")]
pub use http::HttpTransport;

/// Priority of remote constraints: after every built-in.
pub const REMOTE_PRIORITY: i32 = -1;

const CACHE_CAPACITY: u64 = 1_000;

// ============================================================================
// WIRE TYPES
// ============================================================================

/// An outbound validation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Upper-case HTTP method.
    pub method: String,
    /// Absolute URL, `{value}` already substituted.
    pub url: String,
    /// Query (GET/HEAD) or form body parameters.
    pub params: BTreeMap<String, String>,
}

impl Request {
    /// Canonical serialisation used as the deduplication key.
    pub fn cache_key(&self) -> String {
        let params = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(&self.params)
            .finish();
        format!("{} {}?{}", self.method, self.url, params)
    }
}

/// What came back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// HTTP status code.
    pub status: u16,
    /// Response body.
    pub body: String,
}

impl Response {
    /// `true` for a 2xx status.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends validation requests.
pub trait RemoteTransport: Send + Sync {
    /// Sends one request. Timeouts are the transport's concern.
    fn send(&self, request: Request) -> BoxFuture<'static, Result<Response, TransportError>>;
}

/// Transport used when none is configured: every request fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTransport;

impl RemoteTransport for NoTransport {
    fn send(&self, _request: Request) -> BoxFuture<'static, Result<Response, TransportError>> {
        futures::future::ready(Err(TransportError::Unavailable)).boxed()
    }
}

// ============================================================================
// STRATEGIES
// ============================================================================

type ResponseCheck = dyn Fn(&Response) -> bool + Send + Sync;

/// A named way of judging a remote response.
#[derive(Clone)]
pub struct AsyncValidator {
    check: Arc<ResponseCheck>,
    url: Option<String>,
    options: Map<String, Value>,
}

impl AsyncValidator {
    /// A strategy judging responses with `check`.
    pub fn new<F>(check: F) -> Self
    where
        F: Fn(&Response) -> bool + Send + Sync + 'static,
    {
        Self {
            check: Arc::new(check),
            url: None,
            options: Map::new(),
        }
    }

    /// URL used instead of the constraint's own.
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Request options merged over the constraint's (`type`/`method`, `data`).
    #[must_use]
    pub fn with_options(mut self, options: Map<String, Value>) -> Self {
        self.options = options;
        self
    }
}

impl fmt::Debug for AsyncValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncValidator")
            .field("url", &self.url)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

type SharedResponse = Shared<BoxFuture<'static, Result<Response, TransportError>>>;

/// The strategy table, the transport and the request cache.
pub struct RemoteValidators {
    strategies: RwLock<HashMap<String, AsyncValidator>>,
    transport: Arc<dyn RemoteTransport>,
    cache: Cache<String, SharedResponse>,
}

impl RemoteValidators {
    /// A table with the `default` and `reverse` strategies.
    pub fn new(transport: Arc<dyn RemoteTransport>) -> Self {
        let strategies = HashMap::from([
            ("default".to_owned(), AsyncValidator::new(Response::is_success)),
            ("reverse".to_owned(), AsyncValidator::new(|r: &Response| !r.is_success())),
        ]);
        Self {
            strategies: RwLock::new(strategies),
            transport,
            cache: Cache::builder().max_capacity(CACHE_CAPACITY).build(),
        }
    }

    /// Adds or replaces a strategy.
    pub fn add_async_validator(&self, name: impl Into<String>, validator: AsyncValidator) {
        let name = name.into();
        debug!(strategy = %name, "async validator registered");
        self.strategies.write().insert(name, validator);
    }

    /// `true` when a strategy is registered under `name`.
    pub fn has_async_validator(&self, name: &str) -> bool {
        self.strategies.read().contains_key(name)
    }

    /// Forgets every cached request.
    pub fn clear_cache(&self) {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks();
    }

    /// Number of cached requests.
    pub fn cached_requests(&self) -> u64 {
        self.cache.run_pending_tasks();
        self.cache.entry_count()
    }

    /// The `remote` validator backed by this table.
    pub fn validator(self: &Arc<Self>) -> Validator {
        let guard = Arc::clone(self);
        let remote = Arc::clone(self);
        Validator::new(
            "remote",
            RequirementType::keyed(
                RequirementKind::String,
                [
                    ("validator", RequirementKind::String),
                    ("reverse", RequirementKind::Boolean),
                    ("options", RequirementKind::Object),
                ],
            ),
        )
        .priority(REMOTE_PRIORITY)
        .guard(move |req| guard.strategy(req).map(|_| ()))
        .string(move |value, req, ctx| remote.check(value, req, ctx))
    }

    fn strategy(&self, requirements: &Requirements) -> ConfigResult<(String, AsyncValidator)> {
        let name = match requirements.extra("validator").and_then(Requirement::as_str) {
            Some(name) => name.to_owned(),
            None if requirements.extra("reverse").and_then(Requirement::as_bool) == Some(true) => "reverse".to_owned(),
            None => "default".to_owned(),
        };
        let strategy = self
            .strategies
            .read()
            .get(&name)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownAsyncValidator(name.clone()))?;
        Ok((name, strategy))
    }

    /// Builds the request for `value`.
    pub fn request(&self, value: &str, requirements: &Requirements, ctx: &CheckContext<'_>) -> ConfigResult<Request> {
        let (_, strategy) = self.strategy(requirements)?;
        Ok(build_request(value, requirements, &strategy, ctx))
    }

    fn check(&self, value: &str, requirements: &Requirements, ctx: &CheckContext<'_>) -> Check {
        let (name, strategy) = match self.strategy(requirements) {
            Ok(found) => found,
            Err(error) => {
                warn!(%error, "remote constraint rejected");
                return Check::Ready(false);
            }
        };
        let request = build_request(value, requirements, &strategy, ctx);
        let key = request.cache_key();
        let transport = Arc::clone(&self.transport);
        let response = self
            .cache
            .get_with(key.clone(), move || transport.send(request).shared());
        let judge = Arc::clone(&strategy.check);

        Check::Deferred(
            async move {
                match response.await {
                    Ok(response) if judge(&response) => Ok(()),
                    Ok(response) => {
                        debug!(strategy = %name, status = response.status, %key, "remote check rejected");
                        Err(Rejection::new())
                    }
                    Err(error) => {
                        debug!(strategy = %name, %error, %key, "remote request failed");
                        Err(Rejection::new())
                    }
                }
            }
            .boxed(),
        )
    }
}

impl fmt::Debug for RemoteValidators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.strategies.read().keys().cloned().collect();
        names.sort();
        f.debug_struct("RemoteValidators")
            .field("strategies", &names)
            .field("cached_requests", &self.cache.entry_count())
            .finish_non_exhaustive()
    }
}

/// Percent-encodes `value` for use anywhere in a URL. A literal `+` is
/// already `%2B` here, so every remaining `+` stands for a space.
fn encode_component(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

fn build_request(value: &str, requirements: &Requirements, strategy: &AsyncValidator, ctx: &CheckContext<'_>) -> Request {
    let template = strategy
        .url
        .clone()
        .or_else(|| requirements.first().map(ToString::to_string))
        .unwrap_or_default();

    let mut params = BTreeMap::new();
    let url = if template.contains("{value}") {
        template.replace("{value}", &encode_component(value))
    } else {
        if let Some(key) = ctx.key() {
            params.insert(key.to_owned(), value.to_owned());
        }
        template
    };

    // Strategy options win over the constraint's own.
    let mut options = match requirements.extra("options").and_then(Requirement::as_object) {
        Some(Value::Object(map)) => map.clone(),
        _ => Map::new(),
    };
    for (key, value) in &strategy.options {
        options.insert(key.clone(), value.clone());
    }

    let method = options
        .get("type")
        .or_else(|| options.get("method"))
        .and_then(Value::as_str)
        .map_or_else(|| "GET".to_owned(), str::to_ascii_uppercase);
    if let Some(Value::Object(data)) = options.get("data") {
        for (key, value) in data {
            let rendered = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            params.insert(key.clone(), rendered);
        }
    }

    Request { method, url, params }
}
