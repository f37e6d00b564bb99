//! Response writing for expectations that carry a mock response.
//!
//! A [`Handler`] writes into a [`ResponseWriter`]. When an expectation with a
//! response override handles a request, its handler runs first; the default
//! handler runs after it only when call-through is set, or when no override
//! applies at all.

use crate::request::Request;
use bytes::{Bytes, BytesMut};
use http_body_util::Full;
use hyper::http::{HeaderName, HeaderValue};
use hyper::{HeaderMap, Response, StatusCode};
use std::fmt;
use std::sync::Arc;

/// Something that can answer a request.
pub trait Handler: Send + Sync {
    fn handle(&self, request: &Request, writer: &mut ResponseWriter);
}

impl<F> Handler for F
where
    F: Fn(&Request, &mut ResponseWriter) + Send + Sync,
{
    fn handle(&self, request: &Request, writer: &mut ResponseWriter) {
        self(request, writer)
    }
}

/// Fixed status and body.
#[derive(Debug, Clone)]
pub struct CannedResponse {
    status: StatusCode,
    body: Bytes,
}

impl CannedResponse {
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

impl Handler for CannedResponse {
    fn handle(&self, _request: &Request, writer: &mut ResponseWriter) {
        writer.write_status(self.status);
        writer.write(&self.body);
    }
}

/// Handler attached to an expectation, plus whether the default handler still runs.
#[derive(Clone)]
pub struct ResponseOverride {
    pub handler: Arc<dyn Handler>,
    pub call_through: bool,
}

impl fmt::Debug for ResponseOverride {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseOverride")
            .field("call_through", &self.call_through)
            .finish_non_exhaustive()
    }
}

/// Accumulates a response. The first status written wins; body writes append.
#[derive(Debug, Default)]
pub struct ResponseWriter {
    status: Option<StatusCode>,
    headers: HeaderMap,
    body: BytesMut,
}

impl ResponseWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_status(&mut self, status: StatusCode) {
        if self.status.is_none() {
            self.status = Some(status);
        }
    }

    /// Set a header. Invalid names or values are ignored.
    pub fn header(&mut self, name: &str, value: &str) {
        if let (Ok(name), Ok(value)) = (
            HeaderName::try_from(name),
            HeaderValue::try_from(value),
        ) {
            self.headers.insert(name, value);
        }
    }

    pub fn write(&mut self, chunk: impl AsRef<[u8]>) {
        self.body.extend_from_slice(chunk.as_ref());
    }

    /// Status written so far, or 200.
    pub fn status(&self) -> StatusCode {
        self.status.unwrap_or(StatusCode::OK)
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn into_response(self) -> Response<Full<Bytes>> {
        let status = self.status();
        let mut response = Response::new(Full::new(self.body.freeze()));
        *response.status_mut() = status;
        *response.headers_mut() = self.headers;
        response
    }
}

/// Run the override (if any), then the default handler unless the override
/// stops the chain.
pub fn dispatch(
    request: &Request,
    response: Option<&ResponseOverride>,
    default_handler: Option<&dyn Handler>,
) -> ResponseWriter {
    let mut writer = ResponseWriter::new();

    if let Some(response) = response {
        response.handler.handle(request, &mut writer);
        if !response.call_through {
            return writer;
        }
    }

    if let Some(handler) = default_handler {
        handler.handle(request, &mut writer);
    }
    writer
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use hyper::header::CONTENT_TYPE;

    fn default_handler(_: &Request, writer: &mut ResponseWriter) {
        writer.write("default");
    }

    fn canned(call_through: bool) -> ResponseOverride {
        ResponseOverride {
            handler: Arc::new(CannedResponse::new(StatusCode::CREATED, "mock")),
            call_through,
        }
    }

    #[test]
    fn test_writer_first_status_wins() {
        let mut writer = ResponseWriter::new();
        assert_eq!(writer.status(), StatusCode::OK);

        writer.write_status(StatusCode::ACCEPTED);
        writer.write_status(StatusCode::NOT_FOUND);
        writer.write("a");
        writer.write(b"b");

        assert_eq!(writer.status(), StatusCode::ACCEPTED);
        assert_eq!(writer.body(), b"ab");
    }

    #[test]
    fn test_writer_ignores_invalid_headers() {
        let mut writer = ResponseWriter::new();
        writer.header("content-type", "text/plain");
        writer.header("bad header", "x");

        assert_eq!(writer.headers().len(), 1);
        assert_eq!(
            writer.headers().get(CONTENT_TYPE),
            Some(&HeaderValue::from_static("text/plain"))
        );
    }

    #[test]
    fn test_dispatch_override_only() {
        let req = Request::get("/");
        let writer = dispatch(&req, Some(&canned(false)), Some(&default_handler));

        assert_eq!(writer.status(), StatusCode::CREATED);
        assert_eq!(writer.body(), b"mock");
    }

    #[test]
    fn test_dispatch_call_through() {
        let req = Request::get("/");
        let writer = dispatch(&req, Some(&canned(true)), Some(&default_handler));

        assert_eq!(writer.status(), StatusCode::CREATED);
        assert_eq!(writer.body(), b"mockdefault");
    }

    #[test]
    fn test_dispatch_without_override() {
        let req = Request::get("/");
        let writer = dispatch(&req, None, Some(&default_handler));
        assert_eq!(writer.status(), StatusCode::OK);
        assert_eq!(writer.body(), b"default");

        let writer = dispatch(&req, None, None);
        assert!(writer.body().is_empty());
    }

    #[tokio::test]
    async fn test_into_response() {
        let mut writer = ResponseWriter::new();
        writer.write_status(StatusCode::IM_A_TEAPOT);
        writer.header("x-mock", "1");
        writer.write("short and stout");

        let response = writer.into_response();
        assert_eq!(response.status(), StatusCode::IM_A_TEAPOT);
        assert_eq!(response.headers().get("x-mock").unwrap(), "1");

        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(body, Bytes::from("short and stout"));
    }
}
