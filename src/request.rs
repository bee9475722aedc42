//! Request view owned by one dispatch.

use http::header::{HeaderName, HeaderValue};
use http::{Extensions, HeaderMap, Method};
use std::collections::HashMap;
use std::sync::Arc;

use crate::ids::RequestId;
use crate::matcher::Params;
use crate::router::ParamCache;

/// An incoming request as seen by the dispatch core.
///
/// `url` and `base_url` change as the request descends into mounted routers:
/// inside a router mounted at `/blog`, a request for `/blog/x?y=1` has
/// `base_url == "/blog"` and `url == "/x?y=1"`, while `original_url` stays
/// `/blog/x?y=1` for the whole walk.
#[derive(Debug)]
pub struct Request {
    pub request_id: RequestId,
    method: Method,
    /// Current URL (path and query) relative to the router being walked
    pub url: String,
    /// Concatenation of the prefixes stripped by enclosing routers
    pub base_url: String,
    original_url: String,
    /// Bindings of the most recently matched layer
    pub params: Params,
    /// Pattern of the route currently executing
    pub route: Option<Arc<str>>,
    /// Parsed query string (filled by the built-in query layer)
    pub query: HashMap<String, String>,
    pub headers: HeaderMap,
    /// Arbitrary values added by middleware (body parsers, auth, ...)
    pub extensions: Extensions,
    pub(crate) param_cache: ParamCache,
}

impl Request {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            request_id: RequestId::new(),
            method,
            original_url: url.clone(),
            url,
            base_url: String::new(),
            params: Params::new(),
            route: None,
            query: HashMap::new(),
            headers: HeaderMap::new(),
            extensions: Extensions::new(),
            param_cache: ParamCache::default(),
        }
    }

    /// Builder-style header insertion.
    #[must_use]
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    #[inline]
    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    #[inline]
    #[must_use]
    pub fn original_url(&self) -> &str {
        &self.original_url
    }

    /// Path portion of the current `url`, used for matching.
    #[must_use]
    pub fn path(&self) -> &str {
        split_query(&self.url).0
    }

    /// Query string of the current `url`, without the `?`.
    #[must_use]
    pub fn query_string(&self) -> Option<&str> {
        split_query(&self.url).1
    }

    /// Get a header by name (case-insensitive)
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Get a path parameter by name.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name)
    }
}

fn split_query(url: &str) -> (&str, Option<&str>) {
    match url.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (url, None),
    }
}

/// Parse query string parameters
///
/// URL-decodes names and values; repeated names keep the last value.
pub fn parse_query(query: &str) -> HashMap<String, String> {
    url::form_urlencoded::parse(query.as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_strips_query() {
        let req = Request::new(Method::GET, "/users/1?expand=true");
        assert_eq!(req.path(), "/users/1");
        assert_eq!(req.query_string(), Some("expand=true"));
        assert_eq!(req.original_url(), "/users/1?expand=true");
    }

    #[test]
    fn test_parse_query_decodes() {
        let q = parse_query("name=J%C3%B6rg&tag=a+b&tag=c");
        assert_eq!(q.get("name").map(String::as_str), Some("Jörg"));
        assert_eq!(q.get("tag").map(String::as_str), Some("c"));
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let req = Request::new(Method::GET, "/").with_header(
            HeaderName::from_static("x-request-id"),
            HeaderValue::from_static("abc"),
        );
        assert_eq!(req.get_header("X-Request-Id"), Some("abc"));
    }
}
