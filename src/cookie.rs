//! A cookie jar whose contents can be exported.
//!
//! Standard jars only answer "which cookies go to this URL". [`CookieStore`]
//! keeps that behaviour (delegating to `reqwest`'s jar for domain, path,
//! secure and expiry matching) and additionally records, per exact request
//! URL, the cookies that were set by it, so everything can be dumped without
//! knowing the domains involved.

use cookie::Cookie;
use http::HeaderValue;
use reqwest::cookie::{CookieStore as HttpCookieStore, Jar};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use url::Url;

/// Cookie jar plus an export table keyed by request URL.
///
/// The store is handed to the HTTP stack, which calls it for every response
/// carrying `Set-Cookie` and every outgoing request, so a client sharing one
/// store carries cookies across calls automatically.
///
/// # Examples
///
/// ```
/// use fetchwell::{Cookie, CookieStore};
/// use url::Url;
///
/// let store = CookieStore::new();
/// let url = Url::parse("https://example.com/login").unwrap();
///
/// store.set_cookies(&url, vec![Cookie::new("session", "abc")]);
///
/// let exported = store.export_all();
/// assert_eq!(exported[&url][0].value(), "abc");
/// assert_eq!(store.cookies(&url)[0].name(), "session");
/// ```
#[derive(Debug, Default)]
pub struct CookieStore {
    jar: Jar,
    exported: RwLock<HashMap<Url, Vec<Cookie<'static>>>>,
}

impl CookieStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `cookies` as if `url` had responded with them.
    ///
    /// The jar applies its usual rules to them, and the export entry for
    /// `url` is replaced by `cookies`.
    pub fn set_cookies(&self, url: &Url, cookies: Vec<Cookie<'static>>) {
        let headers = cookies
            .iter()
            .filter_map(|c| HeaderValue::from_str(&c.to_string()).ok())
            .collect();
        self.record(url, headers, cookies);
    }

    /// Returns the cookies the jar would send to `url`.
    pub fn cookies(&self, url: &Url) -> Vec<Cookie<'static>> {
        let Some(header) = self.jar.cookies(url) else {
            return Vec::new();
        };
        let Ok(header) = header.to_str() else {
            return Vec::new();
        };

        Cookie::split_parse(header.to_owned())
            .filter_map(|c| c.ok())
            .collect()
    }

    /// Returns an independent copy of every URL entry recorded so far.
    pub fn export_all(&self) -> HashMap<Url, Vec<Cookie<'static>>> {
        self.exported
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of URLs that have set cookies.
    pub fn len(&self) -> usize {
        self.exported
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns `true` if no cookies were ever recorded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn record(&self, url: &Url, headers: Vec<HeaderValue>, cookies: Vec<Cookie<'static>>) {
        let mut exported = self
            .exported
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        self.jar.set_cookies(&mut headers.iter(), url);
        exported.insert(url.clone(), cookies);

        tracing::debug!(url = %url, count = headers.len(), "Stored cookies");
    }
}

impl HttpCookieStore for CookieStore {
    fn set_cookies(&self, cookie_headers: &mut dyn Iterator<Item = &HeaderValue>, url: &Url) {
        let headers: Vec<HeaderValue> = cookie_headers.cloned().collect();
        let cookies = headers
            .iter()
            .filter_map(|h| h.to_str().ok())
            .filter_map(|s| Cookie::parse(s.to_owned()).ok())
            .collect();
        self.record(url, headers, cookies);
    }

    fn cookies(&self, url: &Url) -> Option<HeaderValue> {
        self.jar.cookies(url)
    }
}
