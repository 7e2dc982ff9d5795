//! Retry classification and backoff for transient network failures.
//!
//! Network stacks report the same condition at different layers: as a typed
//! `io::Error`, as a `hyper`/`reqwest` error flag, as a wrapped OS error, or
//! only as a message relayed by an intermediate proxy. [`should_retry`] walks
//! the whole error chain and checks all of them.
//!
//! Only transport-level failures are retried. HTTP status codes, including
//! 5xx, are handed to the caller and its hooks.

use crate::Error;
use rand::Rng;
use std::error::Error as StdError;
use std::io;
use std::time::Duration;

/// Lower-cased message fragments that mark an error as transient.
const RETRY_PATTERNS: &[&str] = &[
    "connection refused",
    "bad gateway",
    "stream timeout",
    "connection reset by peer",
    "broken pipe",
    "unexpected eof",
    "upstream connect error or discon",
    "i/o timeout",
    "no such host",
    "tls: handshake failure",
    "use of closed network connection",
    "server misbehaving",
];

/// `io::ErrorKind` names, lower-cased, as they appear in `Debug` output.
const DEBUG_KIND_PATTERNS: &[&str] = &[
    "connectionrefused",
    "connectionreset",
    "connectionaborted",
    "unexpectedeof",
    "timedout",
];

/// Decides whether a failed attempt is worth retrying.
///
/// The decision is a pure function of the error value. In order, the chain is
/// checked for: a broken stream (unexpected EOF, incomplete message, reset,
/// aborted, refused), a timeout, an OS error code for reset/aborted/refused,
/// and any message containing one of the known transient patterns. Last, the
/// `Debug` rendering of each error is searched for the same patterns and
/// kind names, which reaches causes an error keeps without exposing them.
///
/// # Examples
///
/// ```
/// use fetchwell::retry::should_retry;
/// use std::io;
///
/// let reset = io::Error::from(io::ErrorKind::ConnectionReset);
/// assert!(should_retry(&reset));
///
/// let missing = io::Error::new(io::ErrorKind::Other, "not found");
/// assert!(!should_retry(&missing));
/// ```
pub fn should_retry(err: &(dyn StdError + 'static)) -> bool {
    let chain = || Chain::new(err);

    if chain().any(is_broken_stream) {
        return true;
    }

    if chain().any(is_timeout) {
        return true;
    }

    if chain().any(is_connection_os_error) {
        return true;
    }

    if chain().any(|e| matches_retry_pattern(&e.to_string())) {
        return true;
    }

    // Some connectors (reqwest's SOCKS dialer among them) keep the io error
    // they failed with as a private field, outside `source()` and `Display`.
    chain().any(|e| matches_debug_pattern(&format!("{e:?}")))
}

/// Returns `true` if the message contains a known transient-failure pattern.
pub(crate) fn matches_retry_pattern(message: &str) -> bool {
    let message = message.to_lowercase();
    RETRY_PATTERNS
        .iter()
        .any(|pattern| message.contains(pattern))
}

/// Like [`matches_retry_pattern`], and also accepts the `io::ErrorKind`
/// names a `Debug` rendering shows for the broken-stream kinds.
fn matches_debug_pattern(rendered: &str) -> bool {
    let rendered = rendered.to_lowercase();
    matches_retry_pattern(&rendered)
        || DEBUG_KIND_PATTERNS
            .iter()
            .any(|pattern| rendered.contains(pattern))
}

fn is_connection_kind(kind: io::ErrorKind) -> bool {
    matches!(
        kind,
        io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionRefused
    )
}

fn is_broken_stream(err: &(dyn StdError + 'static)) -> bool {
    if let Some(e) = err.downcast_ref::<io::Error>() {
        return e.kind() == io::ErrorKind::UnexpectedEof || is_connection_kind(e.kind());
    }
    if let Some(e) = err.downcast_ref::<hyper::Error>() {
        return e.is_incomplete_message();
    }
    false
}

fn is_timeout(err: &(dyn StdError + 'static)) -> bool {
    if let Some(e) = err.downcast_ref::<reqwest::Error>() {
        return e.is_timeout();
    }
    if let Some(e) = err.downcast_ref::<hyper::Error>() {
        return e.is_timeout();
    }
    if let Some(e) = err.downcast_ref::<io::Error>() {
        return e.kind() == io::ErrorKind::TimedOut;
    }
    err.is::<tokio::time::error::Elapsed>()
}

fn is_connection_os_error(err: &(dyn StdError + 'static)) -> bool {
    err.downcast_ref::<io::Error>()
        .and_then(io::Error::raw_os_error)
        .map(|code| is_connection_kind(io::Error::from_raw_os_error(code).kind()))
        .unwrap_or(false)
}

/// Depth-first walk over an error and everything it wraps.
///
/// Besides `source()`, the payload of a custom `io::Error` is visited too:
/// `io::Error::source` skips it and only reports the payload's own source.
struct Chain<'a> {
    stack: Vec<&'a (dyn StdError + 'static)>,
}

impl<'a> Chain<'a> {
    fn new(err: &'a (dyn StdError + 'static)) -> Self {
        Self { stack: vec![err] }
    }
}

impl<'a> Iterator for Chain<'a> {
    type Item = &'a (dyn StdError + 'static);

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.stack.pop()?;
        if let Some(source) = current.source() {
            self.stack.push(source);
        }
        if let Some(inner) = current.downcast_ref::<io::Error>().and_then(io::Error::get_ref) {
            self.stack.push(inner);
        }
        Some(current)
    }
}

/// How many attempts a call gets and how long to wait between them.
///
/// The wait after failed attempt `n` (0-based) is `base_delay * 2^(n + 1)`,
/// capped at `max_delay`. With `jitter`, a random extra in `[0, base_delay)`
/// is added; since each step at least doubles, the delays stay strictly
/// increasing below the cap.
///
/// # Examples
///
/// ```
/// use fetchwell::RetryPolicy;
/// use std::time::Duration;
///
/// let policy = RetryPolicy {
///     max_attempts: 3,
///     base_delay: Duration::from_millis(100),
///     max_delay: Duration::from_secs(10),
///     jitter: false,
/// };
///
/// assert_eq!(policy.delay_for_attempt(0), Some(Duration::from_millis(200)));
/// assert_eq!(policy.delay_for_attempt(1), Some(Duration::from_millis(400)));
/// assert_eq!(policy.delay_for_attempt(2), None);
/// ```
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one.
    pub max_attempts: usize,
    /// The backoff unit.
    pub base_delay: Duration,
    /// Upper bound for the exponential part of the delay.
    pub max_delay: Duration,
    /// Whether to add a random extra of up to one `base_delay`.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            jitter: false,
        }
    }
}

impl RetryPolicy {
    /// A policy that makes a single attempt.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Returns the delay to sleep after the given failed attempt (0-based),
    /// or `None` when no attempts remain.
    pub fn delay_for_attempt(&self, attempt: usize) -> Option<Duration> {
        if attempt.saturating_add(1) >= self.max_attempts {
            return None;
        }

        let shift = u32::try_from(attempt).unwrap_or(u32::MAX).saturating_add(1).min(31);
        let delay = self
            .base_delay
            .saturating_mul(1u32 << shift)
            .min(self.max_delay);

        if self.jitter && !self.base_delay.is_zero() {
            let bound = u64::try_from(self.base_delay.as_nanos()).unwrap_or(u64::MAX);
            let extra = rand::thread_rng().gen_range(0..bound);
            Some(delay.saturating_add(Duration::from_nanos(extra)))
        } else {
            Some(delay)
        }
    }
}

/// Trait for deciding whether a failed attempt should be retried.
///
/// The default predicate, [`RetryOnTransient`], delegates to
/// [`should_retry`]. Implement this trait to narrow or widen that decision.
///
/// # Examples
///
/// ```
/// use fetchwell::{Error, RetryPredicate};
///
/// struct FirstAttemptOnly;
///
/// impl RetryPredicate for FirstAttemptOnly {
///     fn should_retry(&self, error: &Error, attempt: usize) -> bool {
///         attempt == 0 && error.is_retryable()
///     }
/// }
/// ```
pub trait RetryPredicate: Send + Sync {
    /// Determines whether the call should be retried.
    ///
    /// # Arguments
    ///
    /// * `error` - The error of the failed attempt
    /// * `attempt` - The attempt that failed (0-based)
    fn should_retry(&self, error: &Error, attempt: usize) -> bool;
}

/// Retry every error the classifier considers transient.
#[derive(Debug, Clone, Copy)]
pub struct RetryOnTransient;

impl RetryPredicate for RetryOnTransient {
    fn should_retry(&self, error: &Error, _attempt: usize) -> bool {
        error.is_retryable()
    }
}

/// Never retry.
#[derive(Debug, Clone, Copy)]
pub struct NeverRetry;

impl RetryPredicate for NeverRetry {
    fn should_retry(&self, _error: &Error, _attempt: usize) -> bool {
        false
    }
}
