use super::{HandlerResult, Middleware, Next};
use crate::request::{parse_query, Request};
use crate::response::Response;

/// Fills `req.query` from the query string of the current URL.
///
/// Installed as the first layer of every application's router. A request that
/// already carries a parsed query (for example inside a mounted application) is
/// left untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryParser;

impl Middleware for QueryParser {
    fn handle(&self, req: &mut Request, _res: &mut Response) -> HandlerResult {
        if req.query.is_empty() {
            if let Some(query) = req.query_string() {
                req.query = parse_query(query);
            }
        }
        Ok(Next::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;

    #[test]
    fn test_query_parser_fills_query() {
        let mut req = Request::new(Method::GET, "/search?q=rust&page=2");
        let mut res = Response::new();
        let next = QueryParser.handle(&mut req, &mut res).unwrap();
        assert_eq!(next, Next::Continue);
        assert_eq!(req.query.get("q").map(String::as_str), Some("rust"));
        assert_eq!(req.query.get("page").map(String::as_str), Some("2"));
    }
}
