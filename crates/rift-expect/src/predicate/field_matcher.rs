//! Key/value multimap matcher shared by query strings, headers and form bodies.
//!
//! A [`FieldMatcher`] is a list of key/value matcher pairs. Each pair is
//! satisfied when some key in the multimap matches the key matcher and some
//! value under that key matches the value matcher. Every pair must be
//! satisfied for the field matcher to match.

use super::string_matcher::{MatchArg, StringMatcher};
use crate::error::ExpectError;
use crate::request::Params;
use regex::Regex;

/// One key/value condition.
#[derive(Debug, Clone)]
pub struct KeyValueMatcher {
    pub key: StringMatcher,
    pub value: StringMatcher,
}

impl KeyValueMatcher {
    fn compile(key: MatchArg, value: MatchArg) -> Result<Self, ExpectError> {
        Ok(Self {
            key: StringMatcher::compile(key)?,
            value: StringMatcher::compile(value)?,
        })
    }

    fn is_satisfied_by(&self, params: &Params) -> bool {
        params.iter().any(|(key, values)| {
            self.key.matches(key) && values.iter().any(|v| self.value.matches(v))
        })
    }
}

/// Compiled field matcher for efficient runtime evaluation.
#[derive(Debug, Clone)]
pub struct FieldMatcher {
    pairs: Vec<KeyValueMatcher>,
    description: String,
}

impl FieldMatcher {
    /// Build a matcher from zero, one or two arguments.
    ///
    /// - no arguments: matches any non-empty multimap
    /// - one string, regex or predicate: that key must be present, with any value
    /// - one map: every entry is a key/value pair that must be present
    /// - two arguments: a single key/value pair
    pub fn new(args: impl FieldArgs) -> Result<Self, ExpectError> {
        Self::compile(args.into_args())
    }

    pub fn compile(args: Vec<MatchArg>) -> Result<Self, ExpectError> {
        let description = describe_args(&args);
        let mut args = args.into_iter();

        let pairs = match (args.next(), args.next(), args.len()) {
            (None, _, _) => vec![KeyValueMatcher::compile(MatchArg::Any, MatchArg::Any)?],
            (Some(MatchArg::Map(entries)), None, _) => entries
                .into_iter()
                .map(|(key, value)| KeyValueMatcher::compile(key, value))
                .collect::<Result<Vec<_>, _>>()?,
            (Some(key), None, _) => vec![KeyValueMatcher::compile(key, MatchArg::Any)?],
            (Some(key), Some(value), 0) => vec![KeyValueMatcher::compile(key, value)?],
            (Some(_), Some(_), rest) => return Err(ExpectError::TooManyArguments(rest + 2)),
        };

        Ok(Self { pairs, description })
    }

    /// Lower-case literal keys, for matching against lower-cased header names.
    pub fn with_lowercase_keys(mut self) -> Self {
        self.pairs = self
            .pairs
            .into_iter()
            .map(|pair| KeyValueMatcher {
                key: pair.key.into_lowercase(),
                value: pair.value,
            })
            .collect();
        self
    }

    pub fn pairs(&self) -> &[KeyValueMatcher] {
        &self.pairs
    }

    /// Check if every pair is satisfied by the multimap.
    pub fn matches(&self, params: &Params) -> bool {
        self.pairs.iter().all(|pair| pair.is_satisfied_by(params))
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

fn describe_args(args: &[MatchArg]) -> String {
    match args {
        [] => "<any>".to_string(),
        [single] => single.to_string(),
        [key, value] => format!("{}={:?}", key, value.to_string()),
        _ => format!("<{} arguments>", args.len()),
    }
}

/// Argument lists accepted by field matcher declarations.
///
/// Implemented for `()`, single arguments, `(key,)`, `(key, value)` tuples and
/// explicit `Vec<MatchArg>` lists.
pub trait FieldArgs {
    fn into_args(self) -> Vec<MatchArg>;
}

impl FieldArgs for () {
    fn into_args(self) -> Vec<MatchArg> {
        Vec::new()
    }
}

impl<K: Into<MatchArg>> FieldArgs for (K,) {
    fn into_args(self) -> Vec<MatchArg> {
        vec![self.0.into()]
    }
}

impl<K: Into<MatchArg>, V: Into<MatchArg>> FieldArgs for (K, V) {
    fn into_args(self) -> Vec<MatchArg> {
        vec![self.0.into(), self.1.into()]
    }
}

impl FieldArgs for Vec<MatchArg> {
    fn into_args(self) -> Vec<MatchArg> {
        self
    }
}

impl FieldArgs for MatchArg {
    fn into_args(self) -> Vec<MatchArg> {
        vec![self]
    }
}

impl FieldArgs for &str {
    fn into_args(self) -> Vec<MatchArg> {
        vec![self.into()]
    }
}

impl FieldArgs for String {
    fn into_args(self) -> Vec<MatchArg> {
        vec![self.into()]
    }
}

impl FieldArgs for Regex {
    fn into_args(self) -> Vec<MatchArg> {
        vec![self.into()]
    }
}
