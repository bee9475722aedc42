//! # Application Module
//!
//! [`Application`] wraps a root [`Router`](crate::router::Router) with the
//! pieces a complete dispatch needs:
//!
//! - **Default layers**: a query-string parser and the `X-Powered-By` header,
//!   installed when the root router is first created.
//! - **Settings**: a loosely typed map with parent fallback (see [`settings`]).
//! - **Mount tree**: [`Application::mount`] nests one application in another.
//!   Mountpaths, the weak parent link and mount listeners are maintained here.
//! - **Terminal handler**: when the root walk is exhausted the request ends in
//!   a 404 or an error document with hardened headers.
//!
//! ## Mounting
//!
//! ```text
//!   app ── /blog ──▶ blog ── /admin ──▶ admin
//!
//!   GET /blog/admin/users
//!     in blog:  base_url = "/blog"        url = "/admin/users"
//!     in admin: base_url = "/blog/admin"  url = "/users"
//!     admin.path() == "/blog/admin"
//! ```

mod core;
mod finalhandler;
pub mod settings;

pub use core::Application;
pub use settings::truthy;
