//! # Matcher Module
//!
//! Compiles route patterns into [`PathMatcher`]s and extracts ordered
//! parameter bindings from request paths.
//!
//! ## Pattern syntax
//!
//! | Pattern            | Matches                 | Params                  |
//! |--------------------|-------------------------|-------------------------|
//! | `/users`           | `/users`, `/USERS`      | -                       |
//! | `/users/:id`       | `/users/42`             | `id = "42"`             |
//! | `/users/:id?`      | `/users`, `/users/42`   | `id = None` / `"42"`    |
//! | `/users/:id(\d+)`  | `/users/42` only        | `id = "42"`             |
//! | `/:file.:ext`      | `/notes.txt`            | `file`, `ext`           |
//! | `/assets/*`        | `/assets/css/site.css`  | `0 = "css/site.css"`    |
//! | `Regex` `^/v(\d)/` | `/v2/...`               | `0 = "2"`               |
//! | `["/a", "/b/:x"]`  | either alternative      | shared key list         |
//!
//! Matching is case-insensitive unless [`MatchOptions::sensitive`] is set, and
//! tolerates one trailing slash unless [`MatchOptions::strict`] is set.
//!
//! Exact matchers (`end = true`) are used for routes. Prefix matchers
//! (`end = false`) are used by `use`-style layers: `/foo` matches `/foo` and
//! `/foo/bar` but never `/foobar`, and the matched prefix is reported so the
//! router can strip it from the URL.
//!
//! ## Example
//!
//! ```rust
//! use waypoint::matcher::{MatchOptions, PathMatcher};
//!
//! let m = PathMatcher::compile("/a/:x", MatchOptions::route()).unwrap();
//! let found = m.matches("/a/b").unwrap().unwrap();
//! assert_eq!(found.params.get("x"), Some("b"));
//! ```

mod core;
mod decode;
mod params;

pub use core::{MatchOptions, ParamKey, PathMatch, PathMatcher, Pattern};
pub use decode::decode_param;
pub use params::{ParamVec, Params, MAX_INLINE_PARAMS};
