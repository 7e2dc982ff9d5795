//! Per-call options.
//!
//! Every request method takes a sequence of [`CallOption`]s. Options apply
//! in order; when two of them set the same header or query key, the later
//! one wins.

use crate::hook::{self, RequestHook, RequestParts, ResponseHook};
use crate::Result;
use bytes::Bytes;
use std::fmt;

/// Reserved header key that isolates a call from the client's cookie store
/// when set to `"true"`. It is never sent.
pub const NO_COOKIE_HEADER: &str = "__nocookie__";

/// One option for a single call.
///
/// # Examples
///
/// ```no_run
/// use fetchwell::{CallOption, Client};
///
/// # async fn example() -> Result<(), fetchwell::Error> {
/// let client = Client::builder().build()?;
///
/// let response = client
///     .get(
///         "https://api.example.com/search",
///         [
///             CallOption::query([("q", "rust"), ("page", "2")]),
///             CallOption::headers([("Authorization", "Bearer token")]),
///             CallOption::NoCookie,
///         ],
///     )
///     .await?;
/// println!("{}", response.text());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub enum CallOption {
    /// Query parameters appended to the URL, replacing existing keys.
    Query(Vec<(String, String)>),

    /// Headers overriding the client's base headers for this call.
    ///
    /// The reserved key [`NO_COOKIE_HEADER`] is recognised here.
    Headers(Vec<(String, String)>),

    /// Runs once before the first attempt.
    RequestHook(RequestHook),

    /// Runs once on the terminal outcome, before the client-wide hook.
    ResponseHook(ResponseHook),

    /// Use a fresh, empty cookie store for this call only.
    NoCookie,

    /// Send HTTP basic credentials with this call only.
    BasicAuth {
        /// The user name
        username: String,
        /// The password
        password: String,
    },
}

impl CallOption {
    /// Builds a [`CallOption::Query`] from key/value pairs.
    pub fn query<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        CallOption::Query(collect_pairs(pairs))
    }

    /// Builds a [`CallOption::Headers`] from name/value pairs.
    pub fn headers<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        CallOption::Headers(collect_pairs(pairs))
    }

    /// Builds a [`CallOption::RequestHook`] from a closure.
    pub fn request_hook<F>(f: F) -> Self
    where
        F: Fn(&mut RequestParts) + Send + Sync + 'static,
    {
        CallOption::RequestHook(hook::request_hook(f))
    }

    /// Builds a [`CallOption::ResponseHook`] from a closure.
    pub fn response_hook<F>(f: F) -> Self
    where
        F: Fn(u16, Result<Bytes>) -> Result<Bytes> + Send + Sync + 'static,
    {
        CallOption::ResponseHook(hook::response_hook(f))
    }

    /// Builds a [`CallOption::BasicAuth`].
    pub fn basic_auth(username: impl Into<String>, password: impl Into<String>) -> Self {
        CallOption::BasicAuth {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for CallOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallOption::Query(pairs) => f.debug_tuple("Query").field(pairs).finish(),
            CallOption::Headers(pairs) => f.debug_tuple("Headers").field(pairs).finish(),
            CallOption::RequestHook(_) => f.write_str("RequestHook(..)"),
            CallOption::ResponseHook(_) => f.write_str("ResponseHook(..)"),
            CallOption::NoCookie => f.write_str("NoCookie"),
            CallOption::BasicAuth { username, .. } => f
                .debug_struct("BasicAuth")
                .field("username", username)
                .finish_non_exhaustive(),
        }
    }
}

fn collect_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Vec<(String, String)>
where
    K: Into<String>,
    V: Into<String>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// The options of one call, sorted by concern.
#[derive(Default)]
pub(crate) struct RequestMetadata {
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub request_hooks: Vec<RequestHook>,
    pub response_hooks: Vec<ResponseHook>,
    pub no_cookie: bool,
    pub basic_auth: Option<(String, String)>,
}

impl RequestMetadata {
    pub fn from_options(options: impl IntoIterator<Item = CallOption>) -> Self {
        let mut metadata = Self::default();

        for option in options {
            match option {
                CallOption::Query(pairs) => metadata.query.extend(pairs),
                CallOption::Headers(pairs) => {
                    for (name, value) in pairs {
                        if name.eq_ignore_ascii_case(NO_COOKIE_HEADER) {
                            metadata.no_cookie |= value.eq_ignore_ascii_case("true");
                        } else {
                            metadata.headers.push((name, value));
                        }
                    }
                }
                CallOption::RequestHook(hook) => metadata.request_hooks.push(hook),
                CallOption::ResponseHook(hook) => metadata.response_hooks.push(hook),
                CallOption::NoCookie => metadata.no_cookie = true,
                CallOption::BasicAuth { username, password } => {
                    metadata.basic_auth = Some((username, password))
                }
            }
        }

        metadata
    }
}
