//! Thread-safe expecter for transports that deliver requests concurrently.
//!
//! All declaration, logging and reporting go through one mutex, so a server
//! handling several connections at once still sees a single ordered stream of
//! calls. Response handlers run after the lock is released.

use crate::error::ExpectError;
use crate::expectation::ExpectationId;
use crate::expecter::Expecter;
use crate::report::TestReporter;
use crate::request::Request;
use crate::response::{dispatch, Handler, ResponseWriter};
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Body;
use hyper::{Response, StatusCode};
use parking_lot::{Mutex, MutexGuard};
use std::convert::Infallible;
use std::fmt;
use std::sync::Arc;
use tracing::error;

/// Cloneable handle to a mutex-guarded [`Expecter`] plus an optional default handler.
#[derive(Clone, Default)]
pub struct SharedExpecter {
    inner: Arc<Mutex<Expecter>>,
    default_handler: Option<Arc<dyn Handler>>,
    errors: Arc<Mutex<Vec<ExpectError>>>,
}

impl SharedExpecter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handler that answers requests no mock response covers, and runs after
    /// mock responses that call through.
    pub fn with_default_handler(mut self, handler: impl Handler + 'static) -> Self {
        self.default_handler = Some(Arc::new(handler));
        self
    }

    /// Report the verdict through `reporter` when it runs its cleanups.
    pub fn with_reporter(self, reporter: &dyn TestReporter) -> Self {
        reporter.helper();
        let shared = self.clone();
        reporter.register_cleanup(Box::new(move |reporter| shared.report(reporter)));
        self
    }

    /// Lock the expecter, e.g. to declare expectations.
    pub fn lock(&self) -> MutexGuard<'_, Expecter> {
        self.inner.lock()
    }

    /// Open the scope of `id`, run `f` without holding the lock, then close
    /// the scope on every exit path, including a panic in `f`.
    ///
    /// Requests served from other threads while `f` runs see the scope open.
    pub fn in_scope<R>(&self, id: ExpectationId, f: impl FnOnce() -> R) -> Result<R, ExpectError> {
        self.lock().enter_scope(id)?;
        let _guard = ScopeGuard { shared: self, id };
        Ok(f())
    }

    pub fn log_request(&self, request: Request) -> Result<Option<ExpectationId>, ExpectError> {
        self.lock().log_request(request).inspect_err(|e| self.errors.lock().push(e.clone()))
    }

    /// Log the request and run the mock response and/or default handler.
    pub fn serve(&self, request: Request) -> Result<ResponseWriter, ExpectError> {
        let request = Arc::new(request);
        let response = {
            let mut expecter = self.lock();
            let matched = expecter
                .log_shared(Arc::clone(&request))
                .inspect_err(|e| self.errors.lock().push(e.clone()))?;
            matched.and_then(|id| expecter.tree().get(id)?.response().cloned())
        };
        Ok(dispatch(
            &request,
            response.as_ref(),
            self.default_handler.as_deref(),
        ))
    }

    /// Collect a hyper request's body and serve it.
    pub async fn handle<B>(&self, req: hyper::Request<B>) -> Result<Response<Full<Bytes>>, ExpectError>
    where
        B: Body,
        B::Error: fmt::Display,
    {
        let (parts, body) = req.into_parts();
        let body = body
            .collect()
            .await
            .map_err(|e| ExpectError::BodyRead(e.to_string()))?
            .to_bytes();

        let request = Request::from_parts(&parts, body);
        Ok(self.serve(request)?.into_response())
    }

    /// Like [`handle`](Self::handle), for use with `hyper::service::service_fn`.
    /// Malformed requests get a 400 carrying the error; the error is kept and
    /// reported at teardown.
    pub async fn respond<B>(&self, req: hyper::Request<B>) -> Result<Response<Full<Bytes>>, Infallible>
    where
        B: Body,
        B::Error: fmt::Display,
    {
        match self.handle(req).await {
            Ok(response) => Ok(response),
            Err(e) => {
                error!(error = %e, "Failed to process request");
                let mut writer = ResponseWriter::new();
                writer.write_status(StatusCode::BAD_REQUEST);
                writer.write(e.to_string());
                Ok(writer.into_response())
            }
        }
    }

    /// Errors raised while logging requests, in arrival order.
    pub fn errors(&self) -> Vec<ExpectError> {
        self.errors.lock().clone()
    }

    /// Report request errors, then the expecter's verdict.
    pub fn report(&self, reporter: &dyn TestReporter) {
        reporter.helper();
        for e in self.errors.lock().iter() {
            reporter.error(&format!("Failed to process request: {e}"));
        }
        self.lock().report(reporter);
    }
}

/// Closes a scope opened through [`SharedExpecter::in_scope`] when dropped.
struct ScopeGuard<'a> {
    shared: &'a SharedExpecter,
    id: ExpectationId,
}

impl Drop for ScopeGuard<'_> {
    fn drop(&mut self) {
        self.shared.lock().exit_scope(self.id);
    }
}
