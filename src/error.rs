//! # Error Module
//!
//! Errors fall into two families:
//!
//! - [`SetupError`] is returned synchronously by registration calls
//!   (`Router::get`, `Router::param`, `Application::mount`, ...) when a pattern
//!   or hook cannot be accepted. Setup errors are never deferred to request time.
//! - [`DispatchError`] is the value carried by a walk while it is in error mode.
//!   It wraps whatever a handler returned (`anyhow::Error`) or a caught panic, and
//!   is cheap to clone so the param cache can replay it.
//!
//! [`HttpError`] is the typed error handlers return when they want the terminal
//! finalizer to use a specific status code.

use http::StatusCode;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Registration-time failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SetupError {
    /// The path pattern could not be compiled into a matcher.
    #[error("invalid path pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// The pattern as supplied
        pattern: String,
        /// What the compiler rejected
        reason: String,
    },

    /// A param hook was registered without a usable parameter name.
    #[error("invalid parameter name '{0}' for param hook")]
    InvalidParamName(String),

    /// A `use`-style call was made with no handlers at all.
    #[error("{0}() requires at least one handler")]
    MissingHandler(&'static str),
}

impl SetupError {
    pub(crate) fn pattern(pattern: impl Into<String>, reason: impl Into<String>) -> Self {
        SetupError::InvalidPattern {
            pattern: pattern.into(),
            reason: reason.into(),
        }
    }
}

/// Error with an HTTP status attached.
///
/// Return it (through `anyhow`) from a handler to choose the status the
/// finalizer responds with. Statuses outside `400..=599` are ignored by the
/// finalizer and replaced with 500.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct HttpError {
    pub status: StatusCode,
    pub message: String,
    /// Whether `message` may be shown to the client in production mode
    pub expose: bool,
}

impl HttpError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            expose: status.is_client_error(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

/// The error value a walk carries while in error mode.
///
/// Clones share the underlying `anyhow::Error`.
#[derive(Clone)]
pub struct DispatchError {
    inner: Arc<anyhow::Error>,
}

impl DispatchError {
    /// Wrap a handler error. An `anyhow::Error` that already wraps a
    /// `DispatchError` (an error handler forwarding what it received) is
    /// unwrapped instead of nested.
    pub fn new(err: anyhow::Error) -> Self {
        match err.downcast::<DispatchError>() {
            Ok(existing) => existing,
            Err(err) => Self {
                inner: Arc::new(err),
            },
        }
    }

    pub fn msg(message: impl fmt::Display + fmt::Debug + Send + Sync + 'static) -> Self {
        Self::new(anyhow::Error::msg(message))
    }

    /// Build an error from a caught panic payload.
    pub(crate) fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "handler panicked".to_string()
        };
        Self::new(anyhow::Error::new(HttpError::internal(message)))
    }

    /// Status declared by an [`HttpError`] anywhere in the cause chain.
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        self.http_error().map(|e| e.status)
    }

    #[must_use]
    pub fn http_error(&self) -> Option<&HttpError> {
        self.inner.chain().find_map(|e| e.downcast_ref::<HttpError>())
    }

    /// Downcast the original error.
    #[must_use]
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        self.inner.downcast_ref::<E>()
    }

    #[must_use]
    pub fn as_anyhow(&self) -> &anyhow::Error {
        &self.inner
    }
}

impl fmt::Debug for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.inner, f)
    }
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.inner, f)
    }
}

impl std::error::Error for DispatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.inner.source()
    }
}

impl From<HttpError> for DispatchError {
    fn from(err: HttpError) -> Self {
        Self::new(anyhow::Error::new(err))
    }
}

impl From<anyhow::Error> for DispatchError {
    fn from(err: anyhow::Error) -> Self {
        Self::new(err)
    }
}
