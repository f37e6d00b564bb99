//! Declarative expectation files and recorded request files.
//!
//! ## Module Structure
//!
//! - `expectations`: YAML expectation entries and their declaration into an [`Expecter`](crate::Expecter)
//! - `requests`: recorded requests that can be replayed through `log_request`

mod expectations;
mod requests;

pub use expectations::{
    ExpectationConfig, ExpectationFile, MatcherConfig, PairConfig, RespondConfig, TimesConfig,
    TimesKeyword,
};
pub use requests::{RecordedRequest, RequestFile};
