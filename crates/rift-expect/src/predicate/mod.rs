//! Composable matcher language for expectations.
//!
//! # Module Structure
//!
//! - `string_matcher` - Matcher arguments and single-string matchers (literal, regex, predicate, wildcards)
//! - `field_matcher` - Key/value multimap matchers for query strings, headers and form bodies
//! - `request` - Request-level matchers (query, header, body, custom predicate)

mod field_matcher;
mod request;
mod string_matcher;

pub use field_matcher::{FieldArgs, FieldMatcher, KeyValueMatcher};
pub use request::{RequestMatcher, RequestPredicate};
pub use string_matcher::{MatchArg, StringMatcher, StringPredicate};
