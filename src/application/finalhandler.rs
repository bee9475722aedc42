//! Terminal handler run when the root router's walk is exhausted.

use http::header::{self, HeaderName, HeaderValue};
use http::StatusCode;
use tracing::{debug, error};

use crate::error::DispatchError;
use crate::request::Request;
use crate::response::{status_reason, Response};

const CONTENT_SECURITY_POLICY: HeaderName = HeaderName::from_static("content-security-policy");
const X_CONTENT_TYPE_OPTIONS: HeaderName = HeaderName::from_static("x-content-type-options");

/// Respond with a 404 (no error) or an error document.
///
/// A response that is already finished is left untouched.
pub(crate) fn finalize(err: Option<&DispatchError>, env: &str, req: &Request, res: &mut Response) {
    let (status, message) = match err {
        Some(err) => {
            if env != "test" {
                error!(
                    request_id = %req.request_id,
                    method = %req.method(),
                    url = %req.original_url(),
                    error = ?err,
                    "unhandled error"
                );
            }
            let status = error_status(err, res.status());
            (status, error_message(err, status, env))
        }
        None => {
            debug!(method = %req.method(), url = %req.original_url(), "no route matched");
            let path = req
                .original_url()
                .split_once('?')
                .map_or(req.original_url(), |(path, _)| path);
            (
                StatusCode::NOT_FOUND,
                format!("Cannot {} {}", req.method(), path),
            )
        }
    };

    if res.is_finished() {
        debug!(status = status.as_u16(), "response already sent; not finalizing");
        return;
    }

    res.clear();
    res.set_status(status);
    res.set_header(
        CONTENT_SECURITY_POLICY,
        HeaderValue::from_static("default-src 'none'"),
    );
    res.set_header(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    res.set_header(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/html; charset=utf-8"),
    );
    res.send(html_document(&message));
}

/// The error's own status when it is a 4xx/5xx, else the response's status
/// when that already signals an error, else 500.
fn error_status(err: &DispatchError, current: StatusCode) -> StatusCode {
    let is_error = |s: StatusCode| (400..=599).contains(&s.as_u16());
    match err.status() {
        Some(status) if is_error(status) => status,
        _ if is_error(current) => current,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_message(err: &DispatchError, status: StatusCode, env: &str) -> String {
    if env != "production" {
        return format!("{:?}", err.as_anyhow());
    }
    match err.http_error() {
        Some(http) if http.expose && http.status == status => http.message.clone(),
        _ => status_reason(status),
    }
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn html_document(message: &str) -> String {
    let body = escape_html(message)
        .replace('\n', "<br>")
        .replace("  ", " &nbsp;");
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>Error</title>\n</head>\n<body>\n<pre>{body}</pre>\n</body>\n</html>\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HttpError;
    use http::Method;

    fn header<'a>(res: &'a Response, name: &str) -> Option<&'a str> {
        res.header(name)
    }

    #[test]
    fn test_not_found_document() {
        let req = Request::new(Method::GET, "/missing?x=<1>");
        let mut res = Response::for_request(&req);
        finalize(None, "test", &req, &mut res);
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert!(res.text().contains("<pre>Cannot GET /missing</pre>"));
        assert_eq!(header(&res, "content-security-policy"), Some("default-src 'none'"));
        assert_eq!(header(&res, "x-content-type-options"), Some("nosniff"));
        assert_eq!(
            header(&res, "content-type"),
            Some("text/html; charset=utf-8")
        );
        assert_eq!(
            header(&res, "content-length"),
            Some(res.body().len().to_string().as_str())
        );
    }

    #[test]
    fn test_error_status_selection() {
        let teapot = DispatchError::from(HttpError::new(StatusCode::IM_A_TEAPOT, "short"));
        assert_eq!(error_status(&teapot, StatusCode::OK), StatusCode::IM_A_TEAPOT);

        let redirect = DispatchError::from(HttpError::new(StatusCode::FOUND, "moved"));
        assert_eq!(
            error_status(&redirect, StatusCode::OK),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            error_status(&redirect, StatusCode::SERVICE_UNAVAILABLE),
            StatusCode::SERVICE_UNAVAILABLE
        );

        let plain = DispatchError::msg("boom");
        assert_eq!(
            error_status(&plain, StatusCode::OK),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_production_hides_details() {
        let req = Request::new(Method::GET, "/");
        let mut res = Response::new();
        let err = DispatchError::msg("database password is hunter2");
        finalize(Some(&err), "production", &req, &mut res);
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(res.text().contains("<pre>Internal Server Error</pre>"));
        assert!(!res.text().contains("hunter2"));
    }

    #[test]
    fn test_production_exposes_client_error_message() {
        let req = Request::new(Method::GET, "/");
        let mut res = Response::new();
        let err = DispatchError::from(HttpError::bad_request("missing field name"));
        finalize(Some(&err), "production", &req, &mut res);
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert!(res.text().contains("missing field name"));
    }

    #[test]
    fn test_development_shows_message_escaped() {
        let req = Request::new(Method::GET, "/");
        let mut res = Response::new();
        let err = DispatchError::msg("bad <input>");
        finalize(Some(&err), "development", &req, &mut res);
        assert!(res.text().contains("bad &lt;input&gt;"));
    }

    #[test]
    fn test_existing_headers_are_cleared() {
        let req = Request::new(Method::GET, "/");
        let mut res = Response::new();
        res.set_header(
            HeaderName::from_static("x-powered-by"),
            HeaderValue::from_static("waypoint"),
        );
        finalize(Some(&DispatchError::msg("x")), "test", &req, &mut res);
        assert_eq!(header(&res, "x-powered-by"), None);
    }

    #[test]
    fn test_finished_response_is_untouched() {
        let req = Request::new(Method::GET, "/");
        let mut res = Response::new();
        res.send("done");
        finalize(Some(&DispatchError::msg("late")), "test", &req, &mut res);
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.text(), "done");
    }
}
