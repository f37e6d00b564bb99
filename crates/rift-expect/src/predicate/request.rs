//! Request-level matchers attached to an expectation beyond method and path.

use super::field_matcher::{FieldArgs, FieldMatcher};
use crate::error::ExpectError;
use crate::request::Request;
use std::fmt;
use std::sync::Arc;

/// Predicate over a whole request.
pub type RequestPredicate = Arc<dyn Fn(&Request) -> bool + Send + Sync>;

/// A single field condition on a request.
#[derive(Clone)]
pub enum RequestMatcher {
    /// Query string parameters
    Query(FieldMatcher),
    /// Headers (keys compared against lower-cased names)
    Header(FieldMatcher),
    /// Form-decoded body
    Body(FieldMatcher),
    /// Arbitrary predicate
    With(RequestPredicate),
}

impl RequestMatcher {
    pub fn query(args: impl FieldArgs) -> Result<Self, ExpectError> {
        Ok(RequestMatcher::Query(FieldMatcher::new(args)?))
    }

    pub fn header(args: impl FieldArgs) -> Result<Self, ExpectError> {
        Ok(RequestMatcher::Header(
            FieldMatcher::new(args)?.with_lowercase_keys(),
        ))
    }

    pub fn body(args: impl FieldArgs) -> Result<Self, ExpectError> {
        Ok(RequestMatcher::Body(FieldMatcher::new(args)?))
    }

    pub fn with(predicate: impl Fn(&Request) -> bool + Send + Sync + 'static) -> Self {
        RequestMatcher::With(Arc::new(predicate))
    }

    /// Check the request. Body matching decodes the form and may fail.
    pub fn matches(&self, request: &Request) -> Result<bool, ExpectError> {
        match self {
            RequestMatcher::Query(m) => Ok(m.matches(request.query())),
            RequestMatcher::Header(m) => Ok(m.matches(request.headers())),
            RequestMatcher::Body(m) => Ok(m.matches(request.form()?)),
            RequestMatcher::With(predicate) => Ok(predicate(request)),
        }
    }
}

impl fmt::Display for RequestMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestMatcher::Query(m) => write!(f, "query string matching {}", m.description()),
            RequestMatcher::Header(m) => write!(f, "header matching {}", m.description()),
            RequestMatcher::Body(m) => write!(f, "body matching {}", m.description()),
            RequestMatcher::With(_) => f.write_str("custom request matcher"),
        }
    }
}

impl fmt::Debug for RequestMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestMatcher::Query(m) => f.debug_tuple("Query").field(m).finish(),
            RequestMatcher::Header(m) => f.debug_tuple("Header").field(m).finish(),
            RequestMatcher::Body(m) => f.debug_tuple("Body").field(m).finish(),
            RequestMatcher::With(_) => f.write_str("With(..)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predicate::MatchArg;
    use crate::request::FORM_CONTENT_TYPE;

    #[test]
    fn test_query_matcher() {
        let matcher = RequestMatcher::query(("page", MatchArg::pattern(r"^\d+$"))).unwrap();

        assert!(matcher.matches(&Request::get("/items?page=3")).unwrap());
        assert!(!matcher.matches(&Request::get("/items?page=x")).unwrap());
        assert!(!matcher.matches(&Request::get("/items")).unwrap());
        assert_eq!(matcher.to_string(), r#"query string matching page="^\\d+$""#);
    }

    #[test]
    fn test_header_matcher_ignores_key_case() {
        let matcher = RequestMatcher::header(("Authorization", MatchArg::pattern("^Bearer "))).unwrap();

        let req = Request::get("/").header("authorization", "Bearer t0ken");
        assert!(matcher.matches(&req).unwrap());

        let req = Request::get("/").header("AUTHORIZATION", "Basic abc");
        assert!(!matcher.matches(&req).unwrap());
    }

    #[test]
    fn test_body_matcher() {
        let matcher = RequestMatcher::body(("title", "My first blog post")).unwrap();

        let req = Request::post("/posts").form_body([("title", "My first blog post")]);
        assert!(matcher.matches(&req).unwrap());

        let req = Request::post("/posts").form_body([("title", "Another")]);
        assert!(!matcher.matches(&req).unwrap());

        assert_eq!(
            matcher.to_string(),
            r#"body matching title="My first blog post""#
        );
    }

    #[test]
    fn test_body_matcher_propagates_parse_errors() {
        let matcher = RequestMatcher::body("title").unwrap();
        let req = Request::post("/posts")
            .header("content-type", FORM_CONTENT_TYPE)
            .body("title=%G1");

        let err = matcher.matches(&req).unwrap_err();
        assert!(matches!(err, ExpectError::FormBody(_)));
    }

    #[test]
    fn test_with_matcher() {
        let matcher = RequestMatcher::with(|req: &Request| req.raw_body().is_empty());

        assert!(matcher.matches(&Request::get("/")).unwrap());
        assert!(!matcher.matches(&Request::post("/").body("x")).unwrap());
        assert_eq!(matcher.to_string(), "custom request matcher");
    }
}
