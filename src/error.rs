//! Error types for request execution.
//!
//! Every terminal outcome of a call is expressed as an [`Error`] and passes
//! through the response hook chain before it reaches the caller, so hooks can
//! rewrite or replace any of these variants.

/// The main error type for HTTP calls made through a [`Client`](crate::Client).
///
/// # Examples
///
/// ```no_run
/// use fetchwell::{Client, Error};
///
/// # async fn example() -> Result<(), Error> {
/// let client = Client::builder().build()?;
///
/// match client.get("https://example.com/", []).await {
///     Ok(response) => println!("{} bytes", response.body.len()),
///     Err(Error::MaxRetriesExceeded { attempts, last_error }) => {
///         eprintln!("gave up after {attempts} attempts: {last_error}");
///     }
///     Err(Error::InvalidUrl(e)) => eprintln!("bad url: {e}"),
///     Err(e) => eprintln!("other error: {e}"),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A network-level error occurred (connection failed, reset, timed out, etc.).
    ///
    /// Whether it is worth retrying is decided by [`crate::retry::should_retry`].
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The target URL could not be parsed. Never retried.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Invalid configuration was provided, such as a malformed header name or
    /// a transport that could not be built.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Every attempt failed with a transient error.
    ///
    /// # Fields
    ///
    /// * `attempts` - The number of attempts made
    /// * `last_error` - The error of the final attempt
    #[error("Max retries exceeded after {attempts} attempts: {last_error}")]
    MaxRetriesExceeded {
        /// The number of attempts made
        attempts: usize,
        /// The last error encountered
        last_error: Box<Error>,
    },

    /// The response declared `Content-Encoding: gzip` but the body was not a
    /// valid gzip stream.
    #[error("Failed to decode gzip response (status {status}): {source}")]
    Decode {
        /// The HTTP status code of the response
        status: u16,
        /// The decoder error
        #[source]
        source: std::io::Error,
    },

    /// [`Response::json`](crate::Response::json) could not deserialize the body.
    ///
    /// The raw body is kept so the mismatch can be debugged.
    #[error("Failed to deserialize response (status {status}): {serde_error}")]
    DeserializationFailed {
        /// The raw response body
        raw_response: String,
        /// The serde error message
        serde_error: String,
        /// The HTTP status code
        status: u16,
    },

    /// The JSON payload could not be serialized.
    #[error("Failed to serialize request: {0}")]
    SerializationFailed(#[from] serde_json::Error),

    /// A response hook rejected the outcome.
    #[error("Rejected by hook: {0}")]
    Hook(String),
}

impl Error {
    /// Returns `true` if this error describes a transient network failure.
    ///
    /// # Examples
    ///
    /// ```
    /// use fetchwell::Error;
    ///
    /// let err = Error::Hook("not found".to_string());
    /// assert!(!err.is_retryable());
    /// ```
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Network(e) => crate::retry::should_retry(e),
            Error::InvalidUrl(_)
            | Error::ConfigurationError(_)
            | Error::MaxRetriesExceeded { .. }
            | Error::Decode { .. }
            | Error::DeserializationFailed { .. }
            | Error::SerializationFailed(_)
            | Error::Hook(_) => false,
        }
    }

    /// Returns the HTTP status code attached to this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Decode { status, .. } => Some(*status),
            Error::DeserializationFailed { status, .. } => Some(*status),
            Error::Network(e) => e.status().map(|s| s.as_u16()),
            Error::MaxRetriesExceeded { last_error, .. } => last_error.status(),
            _ => None,
        }
    }

    /// Builds a [`Error::Hook`] from anything displayable.
    pub fn hook(message: impl std::fmt::Display) -> Self {
        Error::Hook(message.to_string())
    }
}

/// A specialized `Result` type for HTTP calls.
///
/// This is a convenience alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
