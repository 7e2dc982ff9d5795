//! HTTP client with retry logic, hooks and cookie tracking.
//!
//! The [`Client`] type is the main entry point for making HTTP requests.
//! Use [`ClientBuilder`] or [`Client::from_config`] to create clients.
//!
//! One call goes through three phases:
//!
//! 1. **Building** - the URL is parsed, query options applied, headers merged
//!    (defaults, then base headers, then call headers), credentials attached,
//!    the cookie store chosen and the request hooks run.
//! 2. **Attempting** - up to `max_attempts` sends of the same captured request.
//!    Transport failures the retry predicate accepts are retried after a
//!    backoff sleep; any HTTP response ends the loop, whatever its status.
//! 3. **Finishing** - response headers are recorded on the client, the body
//!    is read and gunzipped, and the outcome (success or error) goes through
//!    the response hook chain.

use crate::{
    config::{Config, DEFAULT_TIMEOUT, DEFAULT_USER_AGENT},
    cookie::CookieStore,
    hook::{self, RequestParts, ResponseHook},
    metadata::{CallOption, RequestMetadata},
    response::{self, Response},
    retry::{RetryOnTransient, RetryPolicy, RetryPredicate},
    transport::Transport,
    Error, Result,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use bytes::Bytes;
use http::{header, HeaderMap, HeaderName, HeaderValue, Method};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};
use url::Url;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// A resilient HTTP client.
///
/// The client is cheap to clone; clones share configuration, cookies and the
/// underlying connection setup. All setters take `&self` and may be called
/// while other calls are in flight; a call reads the configuration once,
/// while building its request.
///
/// # Examples
///
/// ```no_run
/// use fetchwell::{CallOption, Client, RetryPolicy};
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), fetchwell::Error> {
/// let client = Client::builder()
///     .proxy("socks5://127.0.0.1:1080")
///     .timeout(Duration::from_secs(10))
///     .retry_policy(RetryPolicy {
///         max_attempts: 5,
///         ..RetryPolicy::default()
///     })
///     .default_header("Referer", "https://example.com/")?
///     .build()?;
///
/// let page = client.get("https://example.com/items", [CallOption::query([("page", "1")])]).await?;
/// println!("{}: {}", page.status, page.text());
///
/// let login = client
///     .json("https://example.com/api/login", &serde_json::json!({"user": "admin"}), [])
///     .await?;
/// println!("cookies now: {:?}", client.cookies().export_all());
/// # let _ = login;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    base_headers: RwLock<HeaderMap>,
    user_agent: RwLock<String>,
    timeout: RwLock<Duration>,
    transport: RwLock<TransportState>,
    cookies: Arc<CookieStore>,
    cookies_disabled: AtomicBool,
    response_hook: RwLock<Option<ResponseHook>>,
    last_headers: RwLock<HeaderMap>,
    retry_policy: RetryPolicy,
    retry_predicate: Box<dyn RetryPredicate>,
}

/// The transport and the HTTP clients built from it, which are dropped
/// whenever the transport changes and rebuilt on the next call.
struct TransportState {
    transport: Transport,
    /// Attached to the persistent cookie store.
    http: Option<reqwest::Client>,
    /// Without any cookie store, used while cookies are disabled.
    cookieless: Option<reqwest::Client>,
}

impl TransportState {
    fn cached(&self, cookieless: bool) -> &Option<reqwest::Client> {
        if cookieless {
            &self.cookieless
        } else {
            &self.http
        }
    }

    fn cached_mut(&mut self, cookieless: bool) -> &mut Option<reqwest::Client> {
        if cookieless {
            &mut self.cookieless
        } else {
            &mut self.http
        }
    }
}

/// A request body.
#[derive(Debug, Clone)]
pub enum Body {
    /// No body.
    Empty,
    /// `application/x-www-form-urlencoded` pairs.
    Form(Vec<(String, String)>),
    /// Already-encoded JSON, sent as `application/json; charset=utf-8`.
    Json(Bytes),
    /// Arbitrary bytes with an optional content type.
    Raw {
        /// Sent as `Content-Type` when present
        content_type: Option<String>,
        /// The body
        data: Bytes,
    },
}

impl Body {
    fn content_type(&self) -> Option<&str> {
        match self {
            Body::Empty => None,
            Body::Form(_) => Some(FORM_CONTENT_TYPE),
            Body::Json(_) => Some(JSON_CONTENT_TYPE),
            Body::Raw { content_type, .. } => content_type.as_deref(),
        }
    }

    fn into_bytes(self) -> Bytes {
        match self {
            Body::Empty => Bytes::new(),
            Body::Form(pairs) => Bytes::from(
                url::form_urlencoded::Serializer::new(String::new())
                    .extend_pairs(pairs)
                    .finish(),
            ),
            Body::Json(data) | Body::Raw { data, .. } => data,
        }
    }
}

/// What a call ended with, before the response hooks see it.
struct Outcome {
    status: u16,
    headers: HeaderMap,
    attempts: usize,
    body: Result<Bytes>,
}

impl Outcome {
    fn failed(attempts: usize, error: Error) -> Self {
        Self {
            status: 0,
            headers: HeaderMap::new(),
            attempts,
            body: Err(error),
        }
    }
}

impl Client {
    /// Creates a new `ClientBuilder` for configuring a client.
    ///
    /// # Examples
    ///
    /// ```
    /// use fetchwell::Client;
    ///
    /// let client = Client::builder().user_agent("crawler/1.0").build().unwrap();
    /// assert_eq!(client.user_agent(), "crawler/1.0");
    /// ```
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Creates a client from a [`Config`].
    ///
    /// # Errors
    ///
    /// Returns an error if a header is invalid or the proxy is rejected.
    pub fn from_config(config: Config) -> Result<Self> {
        ClientBuilder::from_config(config)?.build()
    }

    /// Makes a GET request. Query options are appended to the URL.
    pub async fn get(
        &self,
        url: &str,
        options: impl IntoIterator<Item = CallOption>,
    ) -> Result<Response> {
        self.execute(Method::GET, url, Body::Empty, options).await
    }

    /// Makes a DELETE request. Query options are appended to the URL.
    pub async fn delete(
        &self,
        url: &str,
        options: impl IntoIterator<Item = CallOption>,
    ) -> Result<Response> {
        self.execute(Method::DELETE, url, Body::Empty, options).await
    }

    /// Makes a POST request with a form-encoded body.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use fetchwell::Client;
    ///
    /// # async fn example() -> Result<(), fetchwell::Error> {
    /// let client = Client::builder().build()?;
    /// let response = client
    ///     .post("https://example.com/login", [("user", "admin"), ("password", "admin")], [])
    ///     .await?;
    /// println!("{}", response.status);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn post<K, V>(
        &self,
        url: &str,
        form: impl IntoIterator<Item = (K, V)>,
        options: impl IntoIterator<Item = CallOption>,
    ) -> Result<Response>
    where
        K: Into<String>,
        V: Into<String>,
    {
        let form = form.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        self.execute(Method::POST, url, Body::Form(form), options).await
    }

    /// Makes a POST request with `payload` serialized as JSON.
    ///
    /// A serialization failure is reported as [`Error::SerializationFailed`]
    /// through the response hooks; nothing is sent.
    pub async fn json<T>(
        &self,
        url: &str,
        payload: &T,
        options: impl IntoIterator<Item = CallOption>,
    ) -> Result<Response>
    where
        T: Serialize + ?Sized,
    {
        let body = serde_json::to_vec(payload)
            .map(|data| Body::Json(Bytes::from(data)))
            .map_err(Error::from);
        self.run(Method::POST, url, body, options).await
    }

    /// Makes a POST request with an already-encoded JSON payload, sent verbatim.
    pub async fn json_raw(
        &self,
        url: &str,
        payload: impl Into<Bytes>,
        options: impl IntoIterator<Item = CallOption>,
    ) -> Result<Response> {
        self.execute(Method::POST, url, Body::Json(payload.into()), options)
            .await
    }

    /// Makes a request with any method and body.
    ///
    /// # Errors
    ///
    /// Whatever the response hooks leave as the outcome. Without hooks:
    /// [`Error::InvalidUrl`], [`Error::ConfigurationError`] for invalid
    /// headers, [`Error::Network`] for a terminal transport error,
    /// [`Error::MaxRetriesExceeded`] when every attempt failed with a
    /// transient error, and [`Error::Decode`] for a corrupt gzip body.
    pub async fn execute(
        &self,
        method: Method,
        url: &str,
        body: Body,
        options: impl IntoIterator<Item = CallOption>,
    ) -> Result<Response> {
        self.run(method, url, Ok(body), options).await
    }

    async fn run(
        &self,
        method: Method,
        url: &str,
        body: Result<Body>,
        options: impl IntoIterator<Item = CallOption>,
    ) -> Result<Response> {
        let start_time = Instant::now();
        let metadata = RequestMetadata::from_options(options);
        let global_hook = read(&self.inner.response_hook).clone();

        let outcome = match self.build_request(method, url, body, &metadata) {
            Ok(parts) => self.send_with_retry(&parts, metadata.no_cookie).await,
            Err(e) => {
                tracing::warn!(error = %e, url = %url, "Failed to build request");
                Outcome::failed(0, e)
            }
        };

        let body = hook::run_response_hooks(
            &metadata.response_hooks,
            global_hook.as_ref(),
            outcome.status,
            outcome.body,
        )?;

        Ok(Response::new(
            outcome.status,
            body,
            outcome.headers,
            start_time.elapsed(),
            outcome.attempts,
        ))
    }

    /// Builds the request parts shared by every attempt.
    fn build_request(
        &self,
        method: Method,
        url: &str,
        body: Result<Body>,
        metadata: &RequestMetadata,
    ) -> Result<RequestParts> {
        let mut url = Url::parse(url)?;
        set_query(&mut url, &metadata.query);

        let body = body?;

        let mut headers = HeaderMap::new();
        headers.insert(
            header::USER_AGENT,
            header_value(read(&self.inner.user_agent).as_str())?,
        );
        headers.insert(header::ACCEPT_LANGUAGE, HeaderValue::from_static("en"));
        if let Some(content_type) = body.content_type() {
            headers.insert(header::CONTENT_TYPE, header_value(content_type)?);
        }

        for (name, value) in read(&self.inner.base_headers).iter() {
            headers.insert(name, value.clone());
        }

        for (name, value) in &metadata.headers {
            headers.insert(header_name(name)?, header_value(value)?);
        }

        if let Some((username, password)) = &metadata.basic_auth {
            headers.insert(header::AUTHORIZATION, basic_auth(username, password)?);
        }

        let mut parts = RequestParts {
            method,
            url,
            headers,
            body: body.into_bytes(),
        };
        hook::run_request_hooks(&metadata.request_hooks, &mut parts);

        Ok(parts)
    }

    /// Runs the attempt loop.
    async fn send_with_retry(&self, parts: &RequestParts, isolated: bool) -> Outcome {
        let http = match self.http_client(isolated) {
            Ok(http) => http,
            Err(e) => return Outcome::failed(0, e),
        };
        let timeout = *read(&self.inner.timeout);
        let policy = &self.inner.retry_policy;
        let mut attempt = 0;

        loop {
            tracing::debug!(
                method = %parts.method,
                url = %parts.url,
                attempt = attempt,
                "Executing HTTP request"
            );

            let error = match http.execute(attempt_request(parts, timeout)).await {
                Ok(response) => return self.finish(response, attempt + 1).await,
                Err(e) => Error::Network(e),
            };

            tracing::warn!(
                error = %error,
                attempt = attempt,
                method = %parts.method,
                url = %parts.url,
                "Request failed"
            );

            if !self.inner.retry_predicate.should_retry(&error, attempt) {
                return Outcome::failed(attempt + 1, error);
            }

            match policy.delay_for_attempt(attempt) {
                Some(delay) => {
                    tracing::info!(
                        delay_ms = delay.as_millis(),
                        attempt = attempt,
                        "Retrying request after delay"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                None if attempt == 0 => return Outcome::failed(1, error),
                None => {
                    return Outcome::failed(
                        attempt + 1,
                        Error::MaxRetriesExceeded {
                            attempts: attempt + 1,
                            last_error: Box::new(error),
                        },
                    )
                }
            }
        }
    }

    /// Records the response headers and reads the decoded body.
    async fn finish(&self, response: reqwest::Response, attempts: usize) -> Outcome {
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        *write(&self.inner.last_headers) = headers.clone();

        tracing::info!(status = status, attempts = attempts, "Received HTTP response");

        let body = match response.bytes().await {
            Ok(raw) => response::decode_body(status, &headers, raw),
            Err(e) => Err(Error::Network(e)),
        };

        if let Err(e) = &body {
            tracing::error!(error = %e, status = status, "Failed to read response body");
        }

        Outcome {
            status,
            headers,
            attempts,
            body,
        }
    }

    /// Returns the HTTP client for one call.
    ///
    /// Calls sharing the persistent cookie store reuse one lazily built
    /// client, and so do calls made while cookies are disabled. Isolated
    /// calls get a client of their own with a fresh store.
    fn http_client(&self, isolated: bool) -> Result<reqwest::Client> {
        let cookieless = self.inner.cookies_disabled.load(Ordering::Relaxed);

        if isolated && !cookieless {
            let transport = read(&self.inner.transport).transport.clone();
            return transport.build_client(Some(Arc::new(CookieStore::new())));
        }

        let cached = read(&self.inner.transport).cached(cookieless).clone();
        if let Some(http) = cached {
            return Ok(http);
        }

        let mut state = write(&self.inner.transport);
        if let Some(http) = state.cached(cookieless) {
            return Ok(http.clone());
        }
        let store = (!cookieless).then(|| self.inner.cookies.clone());
        let http = state.transport.build_client(store)?;
        *state.cached_mut(cookieless) = Some(http.clone());
        Ok(http)
    }

    /// Merges `headers` into the base headers sent with every request.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigurationError`] if any name or value is invalid,
    /// in which case nothing is changed.
    pub fn set_headers<K, V>(&self, headers: impl IntoIterator<Item = (K, V)>) -> Result<()>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let parsed = headers
            .into_iter()
            .map(|(k, v)| Ok((header_name(k.as_ref())?, header_value(v.as_ref())?)))
            .collect::<Result<Vec<_>>>()?;

        let mut base = write(&self.inner.base_headers);
        for (name, value) in parsed {
            base.insert(name, value);
        }
        Ok(())
    }

    /// Replaces the user agent.
    pub fn set_user_agent(&self, user_agent: impl Into<String>) {
        *write(&self.inner.user_agent) = user_agent.into();
    }

    /// Replaces the per-attempt timeout.
    pub fn set_timeout(&self, timeout: Duration) {
        *write(&self.inner.timeout) = timeout;
    }

    /// Switches to the transport selected by `spec`.
    ///
    /// See [`Transport::from_proxy_spec`]. Calls already in flight keep the
    /// transport they started with.
    pub fn set_proxy(&self, spec: &str) {
        self.set_transport(Transport::from_proxy_spec(spec));
    }

    /// Switches to `transport`.
    pub fn set_transport(&self, transport: Transport) {
        tracing::debug!(transport = %transport, "Switching transport");
        let mut state = write(&self.inner.transport);
        state.transport = transport;
        state.http = None;
        state.cookieless = None;
    }

    /// Sets or clears the client-wide response hook.
    pub fn set_response_hook(&self, hook: Option<ResponseHook>) {
        *write(&self.inner.response_hook) = hook;
    }

    /// Enables or disables cookie handling for all calls of this client.
    pub fn set_cookies_disabled(&self, disabled: bool) {
        self.inner.cookies_disabled.store(disabled, Ordering::Relaxed);
    }

    /// The headers of the most recent response received by any call.
    pub fn last_headers(&self) -> HeaderMap {
        read(&self.inner.last_headers).clone()
    }

    /// The persistent cookie store shared by this client's calls.
    pub fn cookies(&self) -> &CookieStore {
        &self.inner.cookies
    }

    /// The current transport.
    pub fn transport(&self) -> Transport {
        read(&self.inner.transport).transport.clone()
    }

    /// The current user agent.
    pub fn user_agent(&self) -> String {
        read(&self.inner.user_agent).clone()
    }

    /// The current per-attempt timeout.
    pub fn timeout(&self) -> Duration {
        *read(&self.inner.timeout)
    }
}

/// Builds one attempt from the captured parts. The body is cloned from the
/// captured bytes each time, so every attempt sends it in full.
fn attempt_request(parts: &RequestParts, timeout: Duration) -> reqwest::Request {
    let mut request = reqwest::Request::new(parts.method.clone(), parts.url.clone());
    *request.headers_mut() = parts.headers.clone();
    *request.timeout_mut() = Some(timeout);

    let bodiless = matches!(parts.method, Method::GET | Method::HEAD | Method::DELETE);
    if !parts.body.is_empty() || !bodiless {
        *request.body_mut() = Some(reqwest::Body::from(parts.body.clone()));
    }

    request
}

/// Sets query parameters, replacing any existing pairs with the same key.
fn set_query(url: &mut Url, params: &[(String, String)]) {
    if params.is_empty() {
        return;
    }

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| !params.iter().any(|(key, _)| key.as_str() == k.as_ref()))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    let mut pairs = url.query_pairs_mut();
    pairs.clear();
    pairs.extend_pairs(kept);
    for (key, value) in params {
        pairs.append_pair(key, value);
    }
}

fn header_name(name: &str) -> Result<HeaderName> {
    HeaderName::try_from(name)
        .map_err(|e| Error::ConfigurationError(format!("Invalid header name: {}", e)))
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::try_from(value)
        .map_err(|e| Error::ConfigurationError(format!("Invalid header value: {}", e)))
}

fn basic_auth(username: &str, password: &str) -> Result<HeaderValue> {
    let encoded = BASE64.encode(format!("{}:{}", username, password));
    let mut value = header_value(&format!("Basic {}", encoded))?;
    value.set_sensitive(true);
    Ok(value)
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

/// Builder for configuring and creating a [`Client`].
///
/// # Examples
///
/// ```
/// use fetchwell::{ClientBuilder, RetryPolicy, Transport};
/// use std::time::Duration;
///
/// let client = ClientBuilder::new()
///     .proxy("http://127.0.0.1:8888")
///     .timeout(Duration::from_secs(5))
///     .retry_policy(RetryPolicy::none())
///     .default_header("X-Team", "ingest")
///     .unwrap()
///     .build()
///     .unwrap();
///
/// assert!(matches!(client.transport(), Transport::HttpProxy(_)));
/// ```
pub struct ClientBuilder {
    user_agent: String,
    default_headers: HeaderMap,
    timeout: Duration,
    transport: Transport,
    retry_policy: RetryPolicy,
    retry_predicate: Option<Box<dyn RetryPredicate>>,
    response_hook: Option<ResponseHook>,
    cookie_store: Option<Arc<CookieStore>>,
    cookies_disabled: bool,
}

impl ClientBuilder {
    /// Creates a new `ClientBuilder` with default settings.
    pub fn new() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            default_headers: HeaderMap::new(),
            timeout: DEFAULT_TIMEOUT,
            transport: Transport::Direct,
            retry_policy: RetryPolicy::default(),
            retry_predicate: None,
            response_hook: None,
            cookie_store: None,
            cookies_disabled: false,
        }
    }

    /// Creates a builder seeded from a [`Config`].
    ///
    /// # Errors
    ///
    /// Returns an error if a configured header is invalid.
    pub fn from_config(config: Config) -> Result<Self> {
        let mut builder = Self::new()
            .user_agent(config.user_agent())
            .timeout(config.timeout());

        if let Some(proxy) = &config.proxy {
            builder = builder.proxy(proxy);
        }

        for (name, value) in &config.headers {
            builder = builder.default_header(name, value)?;
        }

        Ok(builder)
    }

    /// Sets the user agent.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Adds a default header that will be included in all requests.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn default_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self> {
        let name = header_name(name.as_ref())?;
        let value = header_value(value.as_ref())?;
        self.default_headers.insert(name, value);
        Ok(self)
    }

    /// Sets the per-attempt timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Selects the transport from a proxy specification.
    pub fn proxy(mut self, spec: &str) -> Self {
        self.transport = Transport::from_proxy_spec(spec);
        self
    }

    /// Sets the transport.
    pub fn transport(mut self, transport: Transport) -> Self {
        self.transport = transport;
        self
    }

    /// Sets the retry policy.
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Sets a custom retry predicate.
    ///
    /// By default, transport errors are retried when
    /// [`should_retry`](crate::retry::should_retry) classifies them as transient.
    pub fn retry_predicate(mut self, predicate: Box<dyn RetryPredicate>) -> Self {
        self.retry_predicate = Some(predicate);
        self
    }

    /// Sets the client-wide response hook, run after every call-scoped one.
    pub fn response_hook(mut self, hook: ResponseHook) -> Self {
        self.response_hook = Some(hook);
        self
    }

    /// Uses `store` as the persistent cookie store, e.g. to share it between clients.
    pub fn cookie_store(mut self, store: Arc<CookieStore>) -> Self {
        self.cookie_store = Some(store);
        self
    }

    /// Disables cookie handling.
    pub fn disable_cookies(mut self) -> Self {
        self.cookies_disabled = true;
        self
    }

    /// Builds the configured `Client`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client for the transport cannot be built.
    pub fn build(self) -> Result<Client> {
        let cookies = self.cookie_store.unwrap_or_default();
        let http = self.transport.build_client(Some(cookies.clone()))?;

        let retry_predicate = self
            .retry_predicate
            .unwrap_or_else(|| Box::new(RetryOnTransient));

        Ok(Client {
            inner: Arc::new(ClientInner {
                base_headers: RwLock::new(self.default_headers),
                user_agent: RwLock::new(self.user_agent),
                timeout: RwLock::new(self.timeout),
                transport: RwLock::new(TransportState {
                    transport: self.transport,
                    http: Some(http),
                    cookieless: None,
                }),
                cookies,
                cookies_disabled: AtomicBool::new(self.cookies_disabled),
                response_hook: RwLock::new(self.response_hook),
                last_headers: RwLock::new(HeaderMap::new()),
                retry_policy: self.retry_policy,
                retry_predicate,
            }),
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
