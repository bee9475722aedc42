//! Minimal response sink written by handlers and the finalizer.

use http::header::{self, HeaderName, HeaderValue};
use http::{HeaderMap, Method, StatusCode};
use serde::Serialize;

use crate::request::Request;

/// Reason phrase for a status, falling back to the numeric code.
pub(crate) fn status_reason(status: StatusCode) -> String {
    status
        .canonical_reason()
        .map_or_else(|| status.as_str().to_string(), str::to_string)
}

/// Response under construction for one request.
///
/// Once [`send`](Response::send), [`json`](Response::json) or
/// [`end`](Response::end) has been called the response is finished; further
/// writes are ignored. Bodies of responses to `HEAD` requests are dropped while
/// `Content-Length` still reflects what would have been sent.
#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
    finished: bool,
    suppress_body: bool,
}

impl Default for Response {
    fn default() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Vec::new(),
            finished: false,
            suppress_body: false,
        }
    }
}

impl Response {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Response for `req`; bodies are suppressed for `HEAD`.
    #[must_use]
    pub fn for_request(req: &Request) -> Self {
        Self {
            suppress_body: req.method() == Method::HEAD,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn set_status(&mut self, status: StatusCode) -> &mut Self {
        self.status = status;
        self
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn set_header(&mut self, name: HeaderName, value: HeaderValue) -> &mut Self {
        self.headers.insert(name, value);
        self
    }

    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Finish with `body`. Defaults the content type to HTML, like a string body.
    pub fn send(&mut self, body: impl Into<Vec<u8>>) {
        if !self.headers.contains_key(header::CONTENT_TYPE) {
            self.headers.insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/html; charset=utf-8"),
            );
        }
        self.finish(body.into());
    }

    /// Finish with a JSON body.
    ///
    /// # Errors
    ///
    /// Serialization failures are returned so handlers can propagate them with `?`.
    pub fn json<T: Serialize + ?Sized>(&mut self, value: &T) -> anyhow::Result<()> {
        let body = serde_json::to_vec(value)?;
        self.headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        self.finish(body);
        Ok(())
    }

    /// Finish with the status and its reason phrase as a plain-text body.
    pub fn send_status(&mut self, status: StatusCode) {
        self.status = status;
        self.headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        self.finish(status_reason(status).into_bytes());
    }

    /// Finish without a body.
    pub fn end(&mut self) {
        self.finish(Vec::new());
    }

    fn finish(&mut self, body: Vec<u8>) {
        if self.finished {
            return;
        }
        self.headers
            .insert(header::CONTENT_LENGTH, HeaderValue::from(body.len()));
        if !self.suppress_body {
            self.body = body;
        }
        self.finished = true;
    }

    /// Whether the response has been finalized.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Body as UTF-8 (lossy).
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Reset status, headers and body. Used by the finalizer before writing an
    /// error document.
    pub(crate) fn clear(&mut self) {
        self.status = StatusCode::OK;
        self.headers.clear();
        self.body.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_reason() {
        assert_eq!(status_reason(StatusCode::OK), "OK");
        assert_eq!(status_reason(StatusCode::NOT_FOUND), "Not Found");
    }

    #[test]
    fn test_second_send_is_ignored() {
        let mut res = Response::new();
        res.send("first");
        res.send("second");
        assert_eq!(res.text(), "first");
        assert_eq!(res.header("content-length"), Some("5"));
    }

    #[test]
    fn test_head_suppresses_body() {
        let req = Request::new(Method::HEAD, "/");
        let mut res = Response::for_request(&req);
        res.send("hello");
        assert!(res.body().is_empty());
        assert_eq!(res.header("content-length"), Some("5"));
    }

    #[test]
    fn test_json_sets_content_type() {
        let mut res = Response::new();
        res.json(&serde_json::json!({"ok": true})).unwrap();
        assert_eq!(res.header("content-type"), Some("application/json"));
        assert_eq!(res.text(), r#"{"ok":true}"#);
    }
}
