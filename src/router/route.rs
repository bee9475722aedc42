use arc_swap::ArcSwap;
use http::Method;
use std::fmt;
use std::sync::Arc;
use tracing::trace;

use crate::error::DispatchError;
use crate::middleware::{Handler, HandlerResult, Signal};
use crate::request::Request;
use crate::response::Response;

#[derive(Clone)]
struct RouteEntry {
    /// `None` matches every method
    method: Option<Method>,
    handler: Handler,
}

struct RouteInner {
    path: Arc<str>,
    stack: ArcSwap<Vec<RouteEntry>>,
}

/// A path plus an append-only list of per-method handlers.
///
/// `Route` is a cheap handle: clones share the same handler list, so the value
/// returned by [`Router::route`](super::Router::route) can keep being extended
/// after it is registered.
///
/// ```rust
/// use waypoint::middleware::Next;
/// use waypoint::router::Router;
///
/// let router = Router::new();
/// router
///     .route("/users")
///     .unwrap()
///     .get(|_req, res| { res.send("list"); Ok(Next::Done) })
///     .put(|_req, res| { res.send("replace"); Ok(Next::Done) });
/// ```
#[derive(Clone)]
pub struct Route {
    inner: Arc<RouteInner>,
}

impl Route {
    pub(crate) fn new(path: impl Into<Arc<str>>) -> Self {
        Self {
            inner: Arc::new(RouteInner {
                path: path.into(),
                stack: ArcSwap::from_pointee(Vec::new()),
            }),
        }
    }

    /// The pattern this route was registered with.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.inner.path
    }

    pub(crate) fn path_arc(&self) -> Arc<str> {
        Arc::clone(&self.inner.path)
    }

    /// Append a tagged handler for `method` (`None` for every method).
    pub fn handler(&self, method: Option<Method>, handler: Handler) -> &Self {
        trace!(route = %self.inner.path, method = ?method, "adding route handler");
        let entry = RouteEntry { method, handler };
        self.inner.stack.rcu(|stack| {
            let mut next = Vec::clone(stack);
            next.push(entry.clone());
            next
        });
        self
    }

    /// Append a handler for one method.
    pub fn method<F>(&self, method: Method, f: F) -> &Self
    where
        F: Fn(&mut Request, &mut Response) -> HandlerResult + Send + Sync + 'static,
    {
        self.handler(Some(method), Handler::middleware(f))
    }

    /// Append a handler for every method.
    pub fn all<F>(&self, f: F) -> &Self
    where
        F: Fn(&mut Request, &mut Response) -> HandlerResult + Send + Sync + 'static,
    {
        self.handler(None, Handler::middleware(f))
    }

    /// Append an error handler that sees errors raised by earlier handlers of
    /// this route, whatever the method.
    pub fn error<F>(&self, f: F) -> &Self
    where
        F: Fn(&DispatchError, &mut Request, &mut Response) -> HandlerResult
            + Send
            + Sync
            + 'static,
    {
        self.handler(None, Handler::error(f))
    }

    pub fn get<F>(&self, f: F) -> &Self
    where
        F: Fn(&mut Request, &mut Response) -> HandlerResult + Send + Sync + 'static,
    {
        self.method(Method::GET, f)
    }

    pub fn post<F>(&self, f: F) -> &Self
    where
        F: Fn(&mut Request, &mut Response) -> HandlerResult + Send + Sync + 'static,
    {
        self.method(Method::POST, f)
    }

    pub fn put<F>(&self, f: F) -> &Self
    where
        F: Fn(&mut Request, &mut Response) -> HandlerResult + Send + Sync + 'static,
    {
        self.method(Method::PUT, f)
    }

    pub fn delete<F>(&self, f: F) -> &Self
    where
        F: Fn(&mut Request, &mut Response) -> HandlerResult + Send + Sync + 'static,
    {
        self.method(Method::DELETE, f)
    }

    pub fn patch<F>(&self, f: F) -> &Self
    where
        F: Fn(&mut Request, &mut Response) -> HandlerResult + Send + Sync + 'static,
    {
        self.method(Method::PATCH, f)
    }

    pub fn head<F>(&self, f: F) -> &Self
    where
        F: Fn(&mut Request, &mut Response) -> HandlerResult + Send + Sync + 'static,
    {
        self.method(Method::HEAD, f)
    }

    pub fn options<F>(&self, f: F) -> &Self
    where
        F: Fn(&mut Request, &mut Response) -> HandlerResult + Send + Sync + 'static,
    {
        self.method(Method::OPTIONS, f)
    }

    pub fn trace<F>(&self, f: F) -> &Self
    where
        F: Fn(&mut Request, &mut Response) -> HandlerResult + Send + Sync + 'static,
    {
        self.method(Method::TRACE, f)
    }

    pub fn connect<F>(&self, f: F) -> &Self
    where
        F: Fn(&mut Request, &mut Response) -> HandlerResult + Send + Sync + 'static,
    {
        self.method(Method::CONNECT, f)
    }

    fn has_method(stack: &[RouteEntry], method: &Method) -> bool {
        stack.iter().any(|e| e.method.as_ref() == Some(method))
    }

    fn has_catch_all(stack: &[RouteEntry]) -> bool {
        stack
            .iter()
            .any(|e| e.method.is_none() && !e.handler.is_error_handler())
    }

    /// Method a request is served as: `HEAD` falls back to `GET` when no
    /// `HEAD` handler is registered.
    fn effective_method(stack: &[RouteEntry], method: &Method) -> Method {
        if *method == Method::HEAD && !Self::has_method(stack, &Method::HEAD) {
            Method::GET
        } else {
            method.clone()
        }
    }

    /// Whether a request with `method` would run at least one handler here.
    #[must_use]
    pub fn handles_method(&self, method: &Method) -> bool {
        let stack = self.inner.stack.load();
        if Self::has_catch_all(&stack) {
            return true;
        }
        let method = Self::effective_method(&stack, method);
        Self::has_method(&stack, &method)
    }

    /// Distinct registered methods in declaration order. `GET` implies `HEAD`,
    /// listed right after it unless `HEAD` is registered itself.
    #[must_use]
    pub fn methods(&self) -> Vec<Method> {
        let stack = self.inner.stack.load();
        let implied_head = !Self::has_method(&stack, &Method::HEAD);
        let mut methods: Vec<Method> = Vec::new();
        for method in stack.iter().filter_map(|e| e.method.as_ref()) {
            if methods.contains(method) {
                continue;
            }
            methods.push(method.clone());
            if implied_head && *method == Method::GET {
                methods.push(Method::HEAD);
            }
        }
        methods
    }

    /// Run the handlers registered for the request's method in order.
    ///
    /// `SkipRoute` ends this route and lets the router continue; an error left
    /// pending after the last handler is returned as `Fail`.
    pub(crate) fn dispatch(&self, req: &mut Request, res: &mut Response) -> Signal {
        let stack = self.inner.stack.load_full();
        let method = Self::effective_method(&stack, req.method());
        req.route = Some(self.path_arc());

        let mut pending: Option<DispatchError> = None;
        for entry in stack.iter() {
            if entry.method.as_ref().is_some_and(|m| *m != method) {
                continue;
            }
            let signal = match &pending {
                Some(err) => entry.handler.handle_error(err, req, res),
                None => entry.handler.handle_request(req, res),
            };
            match signal {
                Signal::Continue => pending = None,
                Signal::SkipRoute => return Signal::Continue,
                Signal::SkipRouter => return Signal::SkipRouter,
                Signal::Fail(err) => pending = Some(err),
                Signal::Done => return Signal::Done,
            }
        }

        match pending {
            Some(err) => Signal::Fail(err),
            None => Signal::Continue,
        }
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("path", &self.inner.path)
            .field("methods", &self.methods())
            .finish()
    }
}
