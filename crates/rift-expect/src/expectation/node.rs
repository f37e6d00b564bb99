use super::quantifier::Quantifier;
use crate::error::ExpectError;
use crate::predicate::{RequestMatcher, StringMatcher};
use crate::request::Request;
use crate::response::{Handler, ResponseOverride};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Stable handle to a node in an [`ExpectationTree`](super::ExpectationTree).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ExpectationId(pub(crate) usize);

impl ExpectationId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for ExpectationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One declared expectation.
#[derive(Debug)]
pub struct ExpectationNode {
    id: ExpectationId,
    method: StringMatcher,
    path: StringMatcher,
    matchers: Vec<RequestMatcher>,
    quantifier: Option<Quantifier>,
    matches: Vec<Arc<Request>>,
    response: Option<ResponseOverride>,
    debug: bool,
    closed: bool,
    parent: Option<ExpectationId>,
    children: Vec<ExpectationId>,
}

impl ExpectationNode {
    pub(crate) fn new(
        id: ExpectationId,
        parent: Option<ExpectationId>,
        method: StringMatcher,
        path: StringMatcher,
    ) -> Self {
        Self {
            id,
            method,
            path,
            matchers: Vec::new(),
            quantifier: None,
            matches: Vec::new(),
            response: None,
            debug: false,
            closed: false,
            parent,
            children: Vec::new(),
        }
    }

    /// The sentinel anchoring the tree. It matches nothing.
    pub(crate) fn root() -> Self {
        Self::new(ExpectationId(0), None, StringMatcher::None, StringMatcher::None)
    }

    pub fn id(&self) -> ExpectationId {
        self.id
    }

    pub fn method(&self) -> &StringMatcher {
        &self.method
    }

    pub fn path(&self) -> &StringMatcher {
        &self.path
    }

    pub fn matchers(&self) -> &[RequestMatcher] {
        &self.matchers
    }

    pub fn quantifier(&self) -> Option<&Quantifier> {
        self.quantifier.as_ref()
    }

    /// Requests that satisfied this expectation, in arrival order.
    pub fn matched_requests(&self) -> &[Arc<Request>] {
        &self.matches
    }

    pub fn response(&self) -> Option<&ResponseOverride> {
        self.response.as_ref()
    }

    pub fn is_debug(&self) -> bool {
        self.debug
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn parent(&self) -> Option<ExpectationId> {
        self.parent
    }

    pub fn children(&self) -> &[ExpectationId] {
        &self.children
    }

    // ===== Declaration =====

    pub(crate) fn push_child(&mut self, child: ExpectationId) {
        self.children.push(child);
    }

    pub(crate) fn push_matcher(&mut self, matcher: RequestMatcher) {
        self.matchers.push(matcher);
    }

    pub(crate) fn set_quantifier(&mut self, quantifier: Quantifier) -> Result<(), ExpectError> {
        if self.quantifier.is_some() {
            return Err(ExpectError::QuantifierAlreadySet(self.describe()));
        }
        self.quantifier = Some(quantifier);
        Ok(())
    }

    pub(crate) fn set_handler(&mut self, handler: Arc<dyn Handler>) -> Result<(), ExpectError> {
        if self.response.is_some() {
            return Err(ExpectError::ResponseAlreadySet(self.describe()));
        }
        self.response = Some(ResponseOverride {
            handler,
            call_through: false,
        });
        Ok(())
    }

    pub(crate) fn set_call_through(&mut self) -> Result<(), ExpectError> {
        match self.response.as_mut() {
            Some(response) => {
                response.call_through = true;
                Ok(())
            }
            None => Err(ExpectError::CallThroughWithoutResponse(self.describe())),
        }
    }

    pub(crate) fn set_debug(&mut self) {
        self.debug = true;
    }

    pub(crate) fn close(&mut self) {
        self.closed = true;
    }

    // ===== Matching =====

    /// Whether the request satisfies this expectation. Does not record it.
    ///
    /// Method and path are checked first; field matchers only run when both
    /// accept, so a body is never decoded for a request on another route.
    pub fn accepts(&self, request: &Request) -> Result<bool, ExpectError> {
        if !self.method.matches(request.method()) || !self.path.matches(request.path()) {
            return Ok(false);
        }

        for matcher in &self.matchers {
            if !matcher.matches(request)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    pub(crate) fn record(&mut self, request: Arc<Request>) {
        if self.debug {
            debug!(
                expectation = %self.describe(),
                method = request.method(),
                path = request.path(),
                received_at = %request.received_at(),
                query = ?request.query(),
                headers = ?request.headers(),
                form = ?request.form().ok(),
                "Debug expectation matched request"
            );
        }

        self.matches.push(request);
        if let Some(quantifier) = self.quantifier.as_mut() {
            quantifier.record();
        }
    }

    // ===== Evaluation =====

    /// Satisfied quantifier, or at least one match when there is none.
    pub fn pass(&self) -> bool {
        match &self.quantifier {
            Some(quantifier) => quantifier.is_satisfied(),
            None => !self.matches.is_empty(),
        }
    }

    /// Why the expectation failed, or `None` if it passes.
    pub fn failure_reason(&self) -> Option<String> {
        if self.pass() {
            return None;
        }

        Some(match &self.quantifier {
            Some(quantifier) if !self.matches.is_empty() => format!(
                "expected {} matches, got {}",
                quantifier.describe_expected(),
                quantifier.count()
            ),
            _ => "no matching requests".to_string(),
        })
    }

    /// `<method> <path>[ with <matchers>]`
    pub fn describe(&self) -> String {
        let mut out = format!("{} {}", self.method, self.path);
        if !self.matchers.is_empty() {
            let matchers = self
                .matchers
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            out.push_str(" with ");
            out.push_str(&matchers);
        }
        out
    }

    /// Description followed by the verdict, as shown in the summary.
    pub fn summary_line(&self) -> String {
        match self.failure_reason() {
            None => format!("{} - passed", self.describe()),
            Some(reason) => format!("{} - failed, {}", self.describe(), reason),
        }
    }
}
