//! Request and response hooks.
//!
//! A request hook sees the fully built request once per call, before the
//! first attempt, and may rewrite its URL, headers or body (e.g. to add a
//! signature). Whatever body it leaves behind is the body sent on every
//! attempt.
//!
//! A response hook sees each terminal outcome once: the status (0 when no
//! response was received) and either the decoded body or the error. It
//! returns the outcome the caller gets. Call-scoped hooks run first, in the
//! order given; the client-wide hook runs last and receives their output.
//!
//! Hooks may run concurrently for concurrent calls on one client.

use crate::Result;
use bytes::Bytes;
use http::{HeaderMap, Method};
use std::sync::Arc;
use url::Url;

/// The outgoing request as seen by a [`RequestHook`].
#[derive(Debug, Clone)]
pub struct RequestParts {
    /// The HTTP method.
    pub method: Method,
    /// The full target URL, query included.
    pub url: Url,
    /// Every header that will be sent, except cookies.
    pub headers: HeaderMap,
    /// The buffered body. Empty for bodiless requests.
    pub body: Bytes,
}

/// Mutates a request before it is sent.
pub type RequestHook = Arc<dyn Fn(&mut RequestParts) + Send + Sync>;

/// Transforms the terminal outcome of a call.
pub type ResponseHook = Arc<dyn Fn(u16, Result<Bytes>) -> Result<Bytes> + Send + Sync>;

/// Wraps a closure as a [`RequestHook`].
///
/// # Examples
///
/// ```
/// use fetchwell::hook::request_hook;
/// use http::HeaderValue;
///
/// let sign = request_hook(|req| {
///     let signature = format!("len={}", req.body.len());
///     if let Ok(value) = HeaderValue::from_str(&signature) {
///         req.headers.insert("x-signature", value);
///     }
/// });
/// # let _ = sign;
/// ```
pub fn request_hook<F>(f: F) -> RequestHook
where
    F: Fn(&mut RequestParts) + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Wraps a closure as a [`ResponseHook`].
///
/// # Examples
///
/// ```
/// use fetchwell::{hook::response_hook, Error};
///
/// // Turn 4xx/5xx into errors.
/// let strict = response_hook(|status, outcome| {
///     let body = outcome?;
///     if status >= 400 {
///         return Err(Error::hook(format!("status {status}")));
///     }
///     Ok(body)
/// });
/// # let _ = strict;
/// ```
pub fn response_hook<F>(f: F) -> ResponseHook
where
    F: Fn(u16, Result<Bytes>) -> Result<Bytes> + Send + Sync + 'static,
{
    Arc::new(f)
}

pub(crate) fn run_request_hooks(hooks: &[RequestHook], parts: &mut RequestParts) {
    for hook in hooks {
        hook(parts);
    }
}

pub(crate) fn run_response_hooks(
    call: &[ResponseHook],
    global: Option<&ResponseHook>,
    status: u16,
    outcome: Result<Bytes>,
) -> Result<Bytes> {
    let outcome = call
        .iter()
        .fold(outcome, |outcome, hook| hook(status, outcome));

    match global {
        Some(hook) => hook(status, outcome),
        None => outcome,
    }
}
