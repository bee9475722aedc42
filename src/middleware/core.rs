use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use crate::error::DispatchError;
use crate::request::Request;
use crate::response::Response;

/// What a handler asks the walk to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Next {
    /// Resume with the next matching layer
    Continue,
    /// Abandon the rest of the current route
    SkipRoute,
    /// Abandon the rest of the current router
    SkipRouter,
    /// The response is complete; stop dispatching
    Done,
}

/// Return type of every handler. `Err` enters error mode.
pub type HandlerResult = anyhow::Result<Next>;

/// A normal middleware or route handler.
pub trait Middleware: Send + Sync {
    fn handle(&self, req: &mut Request, res: &mut Response) -> HandlerResult;
}

impl<F> Middleware for F
where
    F: Fn(&mut Request, &mut Response) -> HandlerResult + Send + Sync,
{
    fn handle(&self, req: &mut Request, res: &mut Response) -> HandlerResult {
        self(req, res)
    }
}

/// An error handler, invoked only while the walk carries an error.
///
/// Returning `Ok(Next::Continue)` recovers and resumes normal dispatch;
/// returning `Err` replaces the pending error.
pub trait ErrorMiddleware: Send + Sync {
    fn handle_error(
        &self,
        err: &DispatchError,
        req: &mut Request,
        res: &mut Response,
    ) -> HandlerResult;
}

impl<F> ErrorMiddleware for F
where
    F: Fn(&DispatchError, &mut Request, &mut Response) -> HandlerResult + Send + Sync,
{
    fn handle_error(
        &self,
        err: &DispatchError,
        req: &mut Request,
        res: &mut Response,
    ) -> HandlerResult {
        self(err, req, res)
    }
}

/// A parameter hook: runs before handlers whose path binds the parameter.
/// Receives the value and the parameter name.
pub trait ParamHook: Send + Sync {
    fn call(&self, req: &mut Request, res: &mut Response, value: &str, name: &str)
        -> HandlerResult;
}

impl<F> ParamHook for F
where
    F: Fn(&mut Request, &mut Response, &str, &str) -> HandlerResult + Send + Sync,
{
    fn call(
        &self,
        req: &mut Request,
        res: &mut Response,
        value: &str,
        name: &str,
    ) -> HandlerResult {
        self(req, res, value, name)
    }
}

/// A handler tagged with its kind at registration.
#[derive(Clone)]
pub enum Handler {
    Middleware(Arc<dyn Middleware>),
    Error(Arc<dyn ErrorMiddleware>),
}

impl Handler {
    pub fn middleware<F>(f: F) -> Self
    where
        F: Fn(&mut Request, &mut Response) -> HandlerResult + Send + Sync + 'static,
    {
        Handler::Middleware(Arc::new(f))
    }

    pub fn error<F>(f: F) -> Self
    where
        F: Fn(&DispatchError, &mut Request, &mut Response) -> HandlerResult + Send + Sync + 'static,
    {
        Handler::Error(Arc::new(f))
    }

    /// Wrap any [`Middleware`] implementation (a struct, a mounted router).
    pub fn from_middleware(m: impl Middleware + 'static) -> Self {
        Handler::Middleware(Arc::new(m))
    }

    #[must_use]
    pub fn is_error_handler(&self) -> bool {
        matches!(self, Handler::Error(_))
    }

    /// Run for a request in normal mode. Error handlers pass through.
    pub(crate) fn handle_request(&self, req: &mut Request, res: &mut Response) -> Signal {
        match self {
            Handler::Middleware(m) => guarded(|| m.handle(req, res)),
            Handler::Error(_) => Signal::Continue,
        }
    }

    /// Run for a request in error mode. Normal handlers forward the error.
    pub(crate) fn handle_error(
        &self,
        err: &DispatchError,
        req: &mut Request,
        res: &mut Response,
    ) -> Signal {
        match self {
            Handler::Error(h) => guarded(|| h.handle_error(err, req, res)),
            Handler::Middleware(_) => Signal::Fail(err.clone()),
        }
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Handler::Middleware(_) => f.write_str("Handler::Middleware"),
            Handler::Error(_) => f.write_str("Handler::Error"),
        }
    }
}

/// Outcome of one handler invocation as seen by the walk.
#[derive(Debug, Clone)]
pub(crate) enum Signal {
    Continue,
    SkipRoute,
    SkipRouter,
    Fail(DispatchError),
    Done,
}

impl From<HandlerResult> for Signal {
    fn from(result: HandlerResult) -> Self {
        match result {
            Ok(Next::Continue) => Signal::Continue,
            Ok(Next::SkipRoute) => Signal::SkipRoute,
            Ok(Next::SkipRouter) => Signal::SkipRouter,
            Ok(Next::Done) => Signal::Done,
            Err(e) => Signal::Fail(DispatchError::new(e)),
        }
    }
}

/// Invoke a handler, converting a panic into a failure.
///
/// The handler's single return value is the only signal taken from it, so a
/// panic after the handler has decided its outcome can never be observed twice.
pub(crate) fn guarded(f: impl FnOnce() -> HandlerResult) -> Signal {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result.into(),
        Err(payload) => {
            let err = DispatchError::from_panic(payload);
            tracing::error!(panic_message = %err, "Handler panicked");
            Signal::Fail(err)
        }
    }
}
