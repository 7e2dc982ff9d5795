//! Transport selection: direct, HTTP proxy, or SOCKS5 proxy.
//!
//! A [`Transport`] describes how connections are established. It is realised
//! as a `reqwest` client configured with:
//!
//! - no idle pooled connections (keep-alive off, one connection per attempt);
//! - TLS certificate verification disabled.
//!
//! The second point is a deliberate trust-everything policy for scraping and
//! ingestion workloads. It makes every connection open to interception, so do
//! not use this crate for traffic where server authenticity matters.

use crate::{cookie::CookieStore, Error, Result};
use std::fmt;
use std::sync::Arc;
use url::Url;

/// Default port of a SOCKS5 proxy given without one.
const DEFAULT_SOCKS5_PORT: u16 = 1080;

/// How requests reach the network.
///
/// # Examples
///
/// ```
/// use fetchwell::Transport;
///
/// assert_eq!(Transport::from_proxy_spec(""), Transport::Direct);
///
/// let http = Transport::from_proxy_spec("http://127.0.0.1:8888");
/// assert!(matches!(http, Transport::HttpProxy(_)));
///
/// let socks = Transport::from_proxy_spec("socks5://127.0.0.1:1080");
/// assert_eq!(socks, Transport::Socks5("127.0.0.1:1080".to_string()));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Transport {
    /// Connect straight to the target. Environment proxy variables are ignored.
    #[default]
    Direct,

    /// Send every request, plain or TLS, through this HTTP proxy.
    HttpProxy(Url),

    /// Dial through a SOCKS5 proxy at this `host:port`.
    ///
    /// The proxy resolves target hostnames. Its connection is opened when a
    /// request is dialed, not when the transport is built, so an unreachable
    /// proxy surfaces as a connection error of the call.
    Socks5(String),
}

impl Transport {
    /// Selects a transport from a proxy specification.
    ///
    /// - an empty spec selects [`Transport::Direct`];
    /// - an `http://` URL selects [`Transport::HttpProxy`];
    /// - anything else is used as a SOCKS5 address: the authority of a URL
    ///   with another scheme (`socks5://host:port`), or the spec itself when it
    ///   is a bare `host:port`.
    pub fn from_proxy_spec(spec: &str) -> Self {
        let spec = spec.trim();
        if spec.is_empty() {
            return Transport::Direct;
        }

        match Url::parse(spec) {
            Ok(url) if url.scheme() == "http" => Transport::HttpProxy(url),
            Ok(url) => match url.host_str() {
                Some(host) => Transport::Socks5(format!(
                    "{}:{}",
                    host,
                    url.port().unwrap_or(DEFAULT_SOCKS5_PORT)
                )),
                // "localhost:1080" parses as scheme "localhost" with path "1080".
                None => Transport::Socks5(spec.to_string()),
            },
            Err(_) => Transport::Socks5(spec.to_string()),
        }
    }

    /// Returns a `reqwest` builder that connects the way this transport says.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigurationError`] if the proxy address is rejected.
    pub fn client_builder(&self) -> Result<reqwest::ClientBuilder> {
        let builder = reqwest::Client::builder()
            .pool_max_idle_per_host(0)
            .danger_accept_invalid_certs(true);

        let builder = match self {
            Transport::Direct => builder.no_proxy(),
            Transport::HttpProxy(url) => builder.proxy(proxy(url.as_str())?),
            Transport::Socks5(addr) => builder.proxy(proxy(&format!("socks5h://{addr}"))?),
        };

        Ok(builder)
    }

    /// Builds the HTTP client for this transport, attached to `cookies` when given.
    pub(crate) fn build_client(&self, cookies: Option<Arc<CookieStore>>) -> Result<reqwest::Client> {
        let mut builder = self.client_builder()?;
        if let Some(store) = cookies {
            builder = builder.cookie_provider(store);
        }

        tracing::debug!(transport = %self, "Building HTTP client");

        builder.build().map_err(|e| {
            Error::ConfigurationError(format!("Failed to build HTTP client: {}", e))
        })
    }
}

fn proxy(url: &str) -> Result<reqwest::Proxy> {
    reqwest::Proxy::all(url)
        .map_err(|e| Error::ConfigurationError(format!("Invalid proxy {}: {}", url, e)))
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transport::Direct => f.write_str("direct"),
            Transport::HttpProxy(url) => write!(f, "http proxy {}", url),
            Transport::Socks5(addr) => write!(f, "socks5 proxy {}", addr),
        }
    }
}
