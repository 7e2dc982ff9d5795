//! # Fetchwell - A resilient HTTP request engine
//!
//! Fetchwell is a small HTTP client built on top of `reqwest` for scraping and
//! API automation. It selects a transport (direct, HTTP proxy or SOCKS5),
//! keeps a cookie store that can be exported, retries transient network
//! failures with exponential backoff, gunzips bodies, and lets hooks rewrite
//! requests and outcomes.
//!
//! ## Quick Start
//!
//! ```no_run
//! use fetchwell::{CallOption, Client};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), fetchwell::Error> {
//!     let client = Client::builder()
//!         .proxy("socks5://127.0.0.1:1080")
//!         .timeout(Duration::from_secs(15))
//!         .build()?;
//!
//!     // Form login; the session cookie lands in the client's store
//!     client
//!         .post("https://example.com/login", [("user", "admin"), ("password", "admin")], [])
//!         .await?;
//!
//!     let page = client
//!         .get("https://example.com/dashboard", [CallOption::query([("tab", "stats")])])
//!         .await?;
//!     println!("{} after {} attempt(s)", page.status, page.attempts);
//!
//!     for (url, cookies) in client.cookies().export_all() {
//!         println!("{url}: {cookies:?}");
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Transport selection** - A single proxy string picks direct, HTTP proxy or SOCKS5
//! - **Exportable cookies** - Every cookie the server set, grouped by the URL that set it
//! - **Transient-failure retries** - Resets, refusals, EOFs and timeouts are retried; HTTP statuses never are
//! - **Hooks** - Sign requests before they go out; rewrite or reject outcomes after
//! - **Gzip decoding** - Bodies marked `Content-Encoding: gzip` are decompressed
//! - **Automatic logging** - Structured logging with `tracing`
//!
//! ## Error Handling
//!
//! Every terminal outcome goes through the response hooks first, so a hook
//! can turn an error into a body or a body into an error:
//!
//! ```no_run
//! use fetchwell::{hook, Client, Error};
//!
//! # async fn example() -> Result<(), Error> {
//! let client = Client::builder()
//!     .response_hook(hook::response_hook(|status, outcome| {
//!         let body = outcome?;
//!         if status >= 500 {
//!             return Err(Error::hook(format!("server error {status}")));
//!         }
//!         Ok(body)
//!     }))
//!     .build()?;
//!
//! match client.get("https://example.com/", []).await {
//!     Ok(response) => println!("{}", response.text()),
//!     Err(Error::MaxRetriesExceeded { attempts, last_error }) => {
//!         eprintln!("gave up after {attempts} attempts: {last_error}");
//!     }
//!     Err(e) => eprintln!("request failed: {e}"),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Retries
//!
//! ```no_run
//! use fetchwell::{Client, RetryPolicy};
//! use std::time::Duration;
//!
//! # fn example() -> Result<(), fetchwell::Error> {
//! let client = Client::builder()
//!     .retry_policy(RetryPolicy {
//!         max_attempts: 5,
//!         base_delay: Duration::from_millis(200),
//!         max_delay: Duration::from_secs(5),
//!         jitter: true,
//!     })
//!     .build()?;
//! # let _ = client;
//! # Ok(())
//! # }
//! ```

mod client;
mod config;
pub mod cookie;
mod error;
pub mod hook;
pub mod metadata;
mod response;
pub mod retry;
mod transport;

pub use client::{Body, Client, ClientBuilder};
pub use config::{Config, DEFAULT_TIMEOUT, DEFAULT_USER_AGENT};
pub use self::cookie::CookieStore;
pub use error::{Error, Result};
pub use metadata::{CallOption, NO_COOKIE_HEADER};
pub use response::Response;
pub use retry::{RetryPolicy, RetryPredicate};
pub use transport::Transport;

pub use ::cookie::Cookie;
