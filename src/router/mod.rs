//! # Router Module
//!
//! The dispatch engine. A [`Router`] is an ordered stack of layers; each layer
//! pairs a compiled [`PathMatcher`](crate::matcher::PathMatcher) with either a
//! tagged handler (middleware or error middleware), a [`Route`], or a mounted
//! sub-router. [`Router::handle`] walks that stack for one request.
//!
//! ## Walk
//!
//! ```text
//!   normal mode ──Err / panic──▶ error mode
//!       ▲                            │
//!       └──── error handler ─────────┘
//!             returns Continue
//! ```
//!
//! - Layers are tried strictly in registration order; the first match at each
//!   step wins.
//! - Normal mode visits non-error layers; error mode visits only error layers.
//!   Routes never match while an error is pending.
//! - `use`-style layers strip their matched prefix from `req.url` and append it
//!   to `req.base_url` for the duration of the handler.
//! - `Next::SkipRoute` abandons the current route, `Next::SkipRouter` the
//!   current router, `Next::Done` the whole dispatch.
//! - Param hooks run before the handler of every layer that binds a hooked
//!   parameter, at most once per router, name and value within a request.
//!
//! ## Example
//!
//! ```rust
//! use http::Method;
//! use waypoint::middleware::Next;
//! use waypoint::router::{Exit, Router};
//! use waypoint::{Request, Response};
//!
//! let router = Router::new();
//! router
//!     .get("/users/:id", |req: &mut Request, res: &mut Response| {
//!         res.send(format!("user {}", req.param("id").unwrap_or_default()));
//!         Ok(Next::Done)
//!     })
//!     .unwrap();
//!
//! let mut req = Request::new(Method::GET, "/users/7");
//! let mut res = Response::for_request(&req);
//! assert!(matches!(router.handle(&mut req, &mut res), Exit::Done));
//! assert_eq!(res.text(), "user 7");
//! ```

mod core;
mod layer;
mod params;
mod route;

pub use core::{Exit, Router, RouterOptions};
pub(crate) use params::ParamCache;
pub use route::Route;
