//! HTTP expectations for tests.
//!
//! Declare the requests a client under test should send, log the requests it
//! actually sends, then verify that every expectation was met the right number
//! of times.
//!
//! Expectations live in a tree of nested scopes. A request can satisfy any
//! expectation on the live scope chain (the current scope and its ancestors),
//! but never one whose scope has already closed.
//!
//! ```
//! use rift_expect::{Expecter, Request};
//!
//! let mut hex = Expecter::new();
//! hex.expect("GET", "/users").unwrap().never().unwrap();
//! hex.log_request(Request::get("/users")).unwrap();
//!
//! assert!(hex.fail());
//! assert_eq!(
//!     hex.failed_expectations()[0].summary_line(),
//!     "GET /users - failed, expected 0 matches, got 1"
//! );
//! ```

pub mod config;
pub mod error;
pub mod expectation;
pub mod expecter;
pub mod predicate;
pub mod report;
pub mod request;
pub mod response;
pub mod service;

pub use error::{ExpectError, VerificationError};
pub use expectation::{ExpectationId, ExpectationNode, Quantifier};
pub use expecter::{Expectation, Expecter};
pub use predicate::MatchArg;
pub use report::{Report, TestReporter, TracingReporter, UnmatchedReport};
pub use request::Request;
pub use response::{Handler, ResponseWriter};
pub use service::SharedExpecter;
