//! # Waypoint
//!
//! **Waypoint** is the dispatch core of a middleware-style HTTP framework: an
//! ordered stack of path-matched layers, walked once per request, in which each
//! handler decides whether the walk continues, skips ahead, enters error mode,
//! or ends.
//!
//! ## Architecture
//!
//! - **[`matcher`]** - Compiles `:name`/`*`/regex path patterns and extracts
//!   percent-decoded parameters
//! - **[`middleware`]** - The handler contract ([`Next`], [`Middleware`],
//!   [`ErrorMiddleware`]) and built-in layers
//! - **[`router`]** - Layers, routes, param hooks and the dispatch walk
//! - **[`application`]** - Root router, settings, mounting and the terminal
//!   404/500 handler
//! - **[`runtime_config`]** / **[`telemetry`]** - Environment configuration and
//!   `tracing` subscriber setup
//!
//! ### Request Flow
//!
//! ```mermaid
//! sequenceDiagram
//!     participant App as Application
//!     participant Router
//!     participant Layer
//!     participant Hooks as ParamRegistry
//!     participant Handler
//!     participant Final as Final handler
//!
//!     App->>Router: handle(req, res)
//!     loop each matching layer, in order
//!         Router->>Layer: matches(path)
//!         Layer-->>Router: PathMatch { path, params }
//!         Router->>Hooks: process(params)
//!         Router->>Handler: handle(req, res)
//!         Handler-->>Router: Ok(Next) / Err(e)
//!     end
//!     Router-->>App: Exit::Done / Exit::Next(err)
//!     App->>Final: finalize(err) on Exit::Next
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use http::{Method, StatusCode};
//! use waypoint::runtime_config::RuntimeConfig;
//! use waypoint::{Application, HttpError, Next, Request, Router};
//!
//! let app = Application::with_config(RuntimeConfig::default());
//!
//! let users = Router::new();
//! users
//!     .get("/:id", |req, res| {
//!         let id = req.param("id").unwrap_or_default();
//!         if id == "0" {
//!             return Err(HttpError::not_found("no such user").into());
//!         }
//!         res.json(&serde_json::json!({ "id": id }))?;
//!         Ok(Next::Done)
//!     })
//!     .unwrap();
//! app.use_router("/users", &users).unwrap();
//!
//! let res = app.handle(Request::new(Method::GET, "/users/42"));
//! assert_eq!(res.text(), r#"{"id":"42"}"#);
//!
//! let res = app.handle(Request::new(Method::GET, "/users/0"));
//! assert_eq!(res.status(), StatusCode::NOT_FOUND);
//! ```

pub mod application;
pub mod error;
pub mod ids;
pub mod matcher;
pub mod middleware;
pub mod request;
pub mod response;
pub mod router;
pub mod runtime_config;
pub mod telemetry;

pub use application::Application;
pub use error::{DispatchError, HttpError, SetupError};
pub use ids::RequestId;
pub use matcher::{Params, Pattern};
pub use middleware::{ErrorMiddleware, Handler, HandlerResult, Middleware, Next, ParamHook};
pub use request::Request;
pub use response::Response;
pub use router::{Exit, Route, Router, RouterOptions};
