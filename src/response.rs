//! Completed responses and body decoding.
//!
//! A [`Response`] is what a call returns once an attempt got an HTTP answer
//! and the hook chain accepted it. The body has already been decompressed.

use crate::{Error, Result};
use bytes::Bytes;
use http::{header::CONTENT_ENCODING, HeaderMap, StatusCode};
use serde::de::DeserializeOwned;
use std::borrow::Cow;
use std::io::Read;
use std::time::Duration;

/// The outcome of a successful call.
///
/// Any status code counts as success here: 4xx and 5xx answers are returned
/// like any other, leaving it to the caller or a response hook to reject them.
///
/// # Examples
///
/// ```no_run
/// use fetchwell::Client;
///
/// # async fn example() -> Result<(), fetchwell::Error> {
/// let client = Client::builder().build()?;
/// let response = client.get("https://example.com/", []).await?;
///
/// println!("Status: {}", response.status);
/// println!("Took {:?} over {} attempt(s)", response.latency, response.attempts);
/// println!("{}", response.text());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Response {
    /// The HTTP status code of the response.
    ///
    /// `0` when no response was received and a response hook turned the
    /// failure into a body.
    pub status: u16,

    /// The body, after gzip decoding and the response hooks.
    pub body: Bytes,

    /// The response headers as received.
    pub headers: HeaderMap,

    /// Time from the first attempt until the body was read, backoff included.
    pub latency: Duration,

    /// The number of attempts made. `1` when the first attempt got through.
    pub attempts: usize,
}

impl Response {
    /// Creates a new `Response`.
    pub fn new(
        status: u16,
        body: Bytes,
        headers: HeaderMap,
        latency: Duration,
        attempts: usize,
    ) -> Self {
        Self {
            status,
            body,
            headers,
            latency,
            attempts,
        }
    }

    /// The status as a typed code, if one was received.
    pub fn status_code(&self) -> Option<StatusCode> {
        StatusCode::from_u16(self.status).ok()
    }

    /// The body as text, with invalid UTF-8 replaced.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// Deserializes the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DeserializationFailed`] with the raw body if it does
    /// not match `T`.
    ///
    /// # Examples
    ///
    /// ```
    /// # use fetchwell::Response;
    /// # use bytes::Bytes;
    /// # use http::HeaderMap;
    /// # use std::time::Duration;
    /// let response = Response::new(
    ///     200,
    ///     Bytes::from_static(br#"{"id": 7}"#),
    ///     HeaderMap::new(),
    ///     Duration::from_millis(10),
    ///     1,
    /// );
    ///
    /// let value: serde_json::Value = response.json().unwrap();
    /// assert_eq!(value["id"], 7);
    /// ```
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(|e| Error::DeserializationFailed {
            raw_response: self.text().into_owned(),
            serde_error: e.to_string(),
            status: self.status,
        })
    }

    /// Returns `true` if the call needed more than one attempt.
    pub fn was_retried(&self) -> bool {
        self.attempts > 1
    }

    /// Returns a header value by name, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }
}

impl AsRef<[u8]> for Response {
    fn as_ref(&self) -> &[u8] {
        &self.body
    }
}

/// Returns `true` if the headers declare a gzip-encoded body.
pub(crate) fn is_gzip(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_ENCODING)
        .and_then(|v| v.to_str().ok())
        .map(|v| {
            let v = v.trim();
            v.eq_ignore_ascii_case("gzip") || v.eq_ignore_ascii_case("x-gzip")
        })
        .unwrap_or(false)
}

/// Decompresses `body` when the headers say it is gzip, otherwise returns it as is.
pub(crate) fn decode_body(status: u16, headers: &HeaderMap, body: Bytes) -> Result<Bytes> {
    if !is_gzip(headers) {
        return Ok(body);
    }

    let mut decoder = flate2::read::GzDecoder::new(body.as_ref());
    let mut decoded = Vec::new();
    decoder
        .read_to_end(&mut decoded)
        .map_err(|source| Error::Decode { status, source })?;

    Ok(Bytes::from(decoded))
}
