//! Declaration surface and match resolution.
//!
//! An [`Expecter`] owns the expectation tree plus the lists of matched and
//! unmatched requests. Expectations are declared with [`Expecter::expect`],
//! refined through the chainable [`Expectation`] handle, and satisfied by
//! requests passed to [`Expecter::log_request`].
//!
//! ```
//! use rift_expect::{Expecter, Request};
//!
//! let mut hex = Expecter::new();
//! hex.expect("GET", "/status").unwrap().once().unwrap();
//! hex.log_request(Request::get("/status")).unwrap();
//! assert!(hex.pass());
//! ```

use crate::error::ExpectError;
use crate::expectation::{ExpectationId, ExpectationNode, ExpectationTree, Quantifier};
use crate::predicate::{FieldArgs, MatchArg, RequestMatcher, StringMatcher};
use crate::request::Request;
use crate::response::{dispatch, CannedResponse, Handler, ResponseWriter};
use bytes::Bytes;
use hyper::StatusCode;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Top-level object onto which expectations are declared.
#[derive(Debug, Default)]
pub struct Expecter {
    tree: ExpectationTree,
    matched: Vec<Arc<Request>>,
    unmatched: Vec<Arc<Request>>,
}

impl Expecter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare an expectation under the current scope. It becomes the current
    /// scope, so later declarations nest under it until a scope is closed.
    pub fn expect(
        &mut self,
        method: impl Into<MatchArg>,
        path: impl Into<MatchArg>,
    ) -> Result<Expectation<'_>, ExpectError> {
        let method = StringMatcher::new(method)?;
        let path = StringMatcher::new(path)?;
        let id = self.tree.declare(method, path);
        Ok(Expectation { expecter: self, id })
    }

    /// Reopen the handle of an already declared expectation.
    pub fn expectation(&mut self, id: ExpectationId) -> Option<Expectation<'_>> {
        if id == self.tree.root() || self.tree.get(id).is_none() {
            return None;
        }
        Some(Expectation { expecter: self, id })
    }

    /// Run `f` with `id` as the current scope, then close that scope.
    ///
    /// The scope is closed on every exit path, including a panic in `f`,
    /// which is resumed afterwards.
    pub fn in_scope<R>(
        &mut self,
        id: ExpectationId,
        f: impl FnOnce(&mut Expecter) -> R,
    ) -> Result<R, ExpectError> {
        self.enter_scope(id)?;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| f(&mut *self)));
        self.exit_scope(id);

        match outcome {
            Ok(value) => Ok(value),
            Err(payload) => panic::resume_unwind(payload),
        }
    }

    /// Make `id` the current scope without closing it afterwards. Pair with
    /// [`exit_scope`](Self::exit_scope), or use [`in_scope`](Self::in_scope).
    pub fn enter_scope(&mut self, id: ExpectationId) -> Result<(), ExpectError> {
        self.tree.enter(id)
    }

    /// Close the scope opened by `id` and make its parent current.
    pub fn exit_scope(&mut self, id: ExpectationId) {
        self.tree.exit(id);
    }

    /// Match a request against the live scope chain.
    ///
    /// Every live expectation that accepts the request records it. The
    /// returned expectation is the outermost one that matched. A request
    /// nothing matches is kept as unmatched. If a body cannot be decoded
    /// while matching, the error is returned and no state changes.
    pub fn log_request(&mut self, request: Request) -> Result<Option<ExpectationId>, ExpectError> {
        self.log_shared(Arc::new(request))
    }

    pub(crate) fn log_shared(&mut self, request: Arc<Request>) -> Result<Option<ExpectationId>, ExpectError> {
        let mut accepted = Vec::new();
        for id in self.tree.live_chain() {
            let accepts = self.tree.node(id).accepts(&request).inspect_err(|e| {
                error!(method = request.method(), path = request.path(), error = %e, "Failed to match request");
            })?;
            if accepts {
                accepted.push(id);
            }
        }

        for &id in &accepted {
            self.tree.node_mut(id).record(Arc::clone(&request));
        }

        // Innermost first, so the last accepted node is the outermost
        let matched = accepted.last().copied();
        match matched {
            Some(id) => {
                debug!(
                    method = request.method(),
                    path = request.path(),
                    expectation = %self.tree.node(id).describe(),
                    matched = accepted.len(),
                    "Request matched"
                );
                self.matched.push(request);
            }
            None => {
                warn!(method = request.method(), path = request.path(), "Unmatched request");
                self.unmatched.push(request);
            }
        }
        Ok(matched)
    }

    /// Log a request and produce its response: the matched expectation's mock
    /// response, then `default_handler` if there is none or it calls through.
    pub fn serve(
        &mut self,
        request: Request,
        default_handler: Option<&dyn Handler>,
    ) -> Result<ResponseWriter, ExpectError> {
        let request = Arc::new(request);
        let response = self
            .log_shared(Arc::clone(&request))?
            .and_then(|id| self.tree.node(id).response().cloned());
        Ok(dispatch(&request, response.as_ref(), default_handler))
    }

    pub fn tree(&self) -> &ExpectationTree {
        &self.tree
    }

    pub fn get(&self, id: ExpectationId) -> Option<&ExpectationNode> {
        self.tree.get(id).filter(|node| node.id() != self.tree.root())
    }

    /// Requests that matched at least one expectation, in arrival order.
    pub fn matched_requests(&self) -> &[Arc<Request>] {
        &self.matched
    }

    /// Requests that matched no live expectation, in arrival order.
    pub fn unmatched_requests(&self) -> &[Arc<Request>] {
        &self.unmatched
    }
}

/// Chainable handle on a declared expectation.
pub struct Expectation<'a> {
    expecter: &'a mut Expecter,
    id: ExpectationId,
}

impl<'a> Expectation<'a> {
    pub fn id(&self) -> ExpectationId {
        self.id
    }

    pub fn node(&self) -> &ExpectationNode {
        self.expecter.tree.node(self.id)
    }

    fn node_mut(&mut self) -> &mut ExpectationNode {
        self.expecter.tree.node_mut(self.id)
    }

    fn push(mut self, matcher: RequestMatcher) -> Self {
        self.node_mut().push_matcher(matcher);
        self
    }

    // ===== Field matchers =====

    /// Require matching query string parameters.
    pub fn with_query(self, args: impl FieldArgs) -> Result<Self, ExpectError> {
        let matcher = RequestMatcher::query(args)?;
        Ok(self.push(matcher))
    }

    /// Require matching headers. Literal header names ignore case.
    pub fn with_header(self, args: impl FieldArgs) -> Result<Self, ExpectError> {
        let matcher = RequestMatcher::header(args)?;
        Ok(self.push(matcher))
    }

    /// Require matching form body parameters.
    pub fn with_body(self, args: impl FieldArgs) -> Result<Self, ExpectError> {
        let matcher = RequestMatcher::body(args)?;
        Ok(self.push(matcher))
    }

    /// Require an arbitrary predicate over the request.
    pub fn with(self, predicate: impl Fn(&Request) -> bool + Send + Sync + 'static) -> Self {
        self.push(RequestMatcher::with(predicate))
    }

    // ===== Quantifiers =====

    fn quantify(mut self, quantifier: Quantifier) -> Result<Self, ExpectError> {
        self.node_mut().set_quantifier(quantifier)?;
        Ok(self)
    }

    pub fn never(self) -> Result<Self, ExpectError> {
        self.quantify(Quantifier::never())
    }

    pub fn once(self) -> Result<Self, ExpectError> {
        self.quantify(Quantifier::once())
    }

    pub fn times(self, n: usize) -> Result<Self, ExpectError> {
        self.quantify(Quantifier::exactly(n))
    }

    pub fn at_least(self, n: usize) -> Result<Self, ExpectError> {
        self.quantify(Quantifier::at_least(n))
    }

    pub fn at_most(self, n: usize) -> Result<Self, ExpectError> {
        self.quantify(Quantifier::at_most(n))
    }

    pub fn between(self, min: usize, max: usize) -> Result<Self, ExpectError> {
        self.quantify(Quantifier::between(min, max)?)
    }

    // ===== Responses =====

    /// Answer matched requests with a fixed status and body.
    pub fn respond_with(self, status: u16, body: impl Into<Bytes>) -> Result<Self, ExpectError> {
        let status = StatusCode::from_u16(status).map_err(|_| ExpectError::InvalidStatus(status))?;
        self.respond_with_handler(CannedResponse::new(status, body))
    }

    /// Answer matched requests with a closure.
    pub fn respond_with_fn(
        self,
        f: impl Fn(&Request, &mut ResponseWriter) + Send + Sync + 'static,
    ) -> Result<Self, ExpectError> {
        self.respond_with_handler(f)
    }

    /// Answer matched requests with `handler` instead of the default handler.
    pub fn respond_with_handler(
        mut self,
        handler: impl Handler + 'static,
    ) -> Result<Self, ExpectError> {
        self.node_mut().set_handler(Arc::new(handler))?;
        Ok(self)
    }

    /// Also run the default handler after the mock response.
    pub fn and_call_through(mut self) -> Result<Self, ExpectError> {
        self.node_mut().set_call_through()?;
        Ok(self)
    }

    /// Log every request this expectation matches at debug level.
    pub fn debug(mut self) -> Self {
        self.node_mut().set_debug();
        self
    }

    /// Open a scope on this expectation for the duration of `f`.
    pub fn in_scope<R>(self, f: impl FnOnce(&mut Expecter) -> R) -> Result<R, ExpectError> {
        self.expecter.in_scope(self.id, f)
    }
}
