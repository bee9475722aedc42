//! # Middleware Module
//!
//! Handler contracts for the dispatch core and the built-in layers every
//! application starts with.
//!
//! A handler receives the request and response and returns a [`Next`] telling
//! the walk what to do, or an error which switches the walk into error mode:
//!
//! ```rust
//! use waypoint::middleware::{HandlerResult, Next};
//! use waypoint::{Request, Response};
//!
//! fn require_json(req: &mut Request, _res: &mut Response) -> HandlerResult {
//!     if req.get_header("content-type") != Some("application/json") {
//!         anyhow::bail!(waypoint::HttpError::bad_request("expected JSON"));
//!     }
//!     Ok(Next::Continue)
//! }
//! ```

mod core;
mod query;

pub use core::{ErrorMiddleware, Handler, HandlerResult, Middleware, Next, ParamHook};
pub(crate) use core::{guarded, Signal};
pub use query::QueryParser;
