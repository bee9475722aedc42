use std::sync::Arc;

use super::route::Route;
use crate::error::{DispatchError, HttpError};
use crate::matcher::{ParamKey, PathMatch, PathMatcher};
use crate::middleware::{Handler, Signal};
use crate::request::Request;
use crate::response::Response;

/// What a layer runs once its matcher accepts the path.
#[derive(Clone)]
pub(crate) enum LayerKind {
    /// `use`-style middleware, error middleware or a mounted router
    Handler(Handler),
    /// A route; matched exactly and filtered by method
    Route(Route),
}

/// One entry in a router's stack: a compiled matcher and what it guards.
#[derive(Clone)]
pub(crate) struct Layer {
    matcher: Arc<PathMatcher>,
    kind: LayerKind,
    /// Short description for dispatch logs
    label: &'static str,
}

impl Layer {
    pub(crate) fn handler(matcher: PathMatcher, handler: Handler, label: &'static str) -> Self {
        Self {
            matcher: Arc::new(matcher),
            kind: LayerKind::Handler(handler),
            label,
        }
    }

    pub(crate) fn route(matcher: PathMatcher, route: Route) -> Self {
        Self {
            matcher: Arc::new(matcher),
            kind: LayerKind::Route(route),
            label: "route",
        }
    }

    #[inline]
    pub(crate) fn matches(&self, path: &str) -> Result<Option<PathMatch>, HttpError> {
        self.matcher.matches(path)
    }

    #[inline]
    pub(crate) fn keys(&self) -> &[ParamKey] {
        self.matcher.keys()
    }

    pub(crate) fn label(&self) -> &'static str {
        self.label
    }

    pub(crate) fn as_route(&self) -> Option<&Route> {
        match &self.kind {
            LayerKind::Route(route) => Some(route),
            LayerKind::Handler(_) => None,
        }
    }

    /// Always false for routes; the walk skips them while an error is pending.
    pub(crate) fn is_error_handler(&self) -> bool {
        match &self.kind {
            LayerKind::Handler(handler) => handler.is_error_handler(),
            LayerKind::Route(_) => false,
        }
    }

    /// Invoke the layer for `req`, in error mode when `err` is set.
    pub(crate) fn invoke(
        &self,
        err: Option<&DispatchError>,
        req: &mut Request,
        res: &mut Response,
    ) -> Signal {
        match (&self.kind, err) {
            (LayerKind::Route(route), None) => route.dispatch(req, res),
            (LayerKind::Route(_), Some(err)) => Signal::Fail(err.clone()),
            (LayerKind::Handler(handler), None) => handler.handle_request(req, res),
            (LayerKind::Handler(handler), Some(err)) => handler.handle_error(err, req, res),
        }
    }
}
