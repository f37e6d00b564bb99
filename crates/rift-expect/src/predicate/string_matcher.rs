//! String matching types and compilation.
//!
//! [`MatchArg`] is what callers hand to declaration methods: a literal, a regex
//! (compiled or not), a predicate closure, a wildcard, or a map of key/value
//! arguments. [`StringMatcher`] is the compiled form used to test a single
//! string (a method, a path, or a parameter key or value).

use crate::error::ExpectError;
use regex::Regex;
use std::fmt;
use std::sync::Arc;

/// Predicate over a single string value.
pub type StringPredicate = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Heterogeneous matcher argument supplied by a test author.
#[derive(Clone)]
pub enum MatchArg {
    /// Exact string equality
    Literal(String),
    /// Regex source, compiled when the matcher is built
    Pattern(String),
    /// Pre-compiled regex
    Regex(Regex),
    /// Arbitrary predicate
    Predicate(StringPredicate),
    /// Matches every string
    Any,
    /// Matches no string
    None,
    /// Key/value pairs; only valid as a field matcher argument
    Map(Vec<(MatchArg, MatchArg)>),
}

impl MatchArg {
    /// A regex argument, compiled when the matcher is built.
    pub fn pattern(source: impl Into<String>) -> Self {
        MatchArg::Pattern(source.into())
    }

    /// A predicate argument.
    pub fn predicate(f: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        MatchArg::Predicate(Arc::new(f))
    }

    /// A map argument matching every listed key/value pair.
    pub fn map<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<MatchArg>,
        V: Into<MatchArg>,
    {
        MatchArg::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl From<&str> for MatchArg {
    fn from(value: &str) -> Self {
        MatchArg::Literal(value.to_string())
    }
}

impl From<String> for MatchArg {
    fn from(value: String) -> Self {
        MatchArg::Literal(value)
    }
}

impl From<&String> for MatchArg {
    fn from(value: &String) -> Self {
        MatchArg::Literal(value.clone())
    }
}

impl From<Regex> for MatchArg {
    fn from(value: Regex) -> Self {
        MatchArg::Regex(value)
    }
}

impl fmt::Display for MatchArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchArg::Literal(s) | MatchArg::Pattern(s) => f.write_str(s),
            MatchArg::Regex(re) => f.write_str(re.as_str()),
            MatchArg::Predicate(_) => f.write_str("<custom matcher>"),
            MatchArg::Any => f.write_str("<any>"),
            MatchArg::None => f.write_str("<none>"),
            MatchArg::Map(entries) => {
                f.write_str("{")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}={:?}", key, value.to_string())?;
                }
                f.write_str("}")
            }
        }
    }
}

impl fmt::Debug for MatchArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchArg::Literal(s) => f.debug_tuple("Literal").field(s).finish(),
            MatchArg::Pattern(s) => f.debug_tuple("Pattern").field(s).finish(),
            MatchArg::Regex(re) => f.debug_tuple("Regex").field(&re.as_str()).finish(),
            MatchArg::Predicate(_) => f.write_str("Predicate(..)"),
            MatchArg::Any => f.write_str("Any"),
            MatchArg::None => f.write_str("None"),
            MatchArg::Map(entries) => f.debug_tuple("Map").field(entries).finish(),
        }
    }
}

/// Compiled matcher for a single string value.
#[derive(Clone)]
pub enum StringMatcher {
    Literal(String),
    Regex(Arc<Regex>),
    Predicate(StringPredicate),
    Any,
    None,
}

impl StringMatcher {
    /// Compile a matcher from anything convertible into a [`MatchArg`].
    pub fn new(arg: impl Into<MatchArg>) -> Result<Self, ExpectError> {
        Self::compile(arg.into())
    }

    /// Compile a [`MatchArg`]. Maps cannot match a single string and are rejected.
    pub fn compile(arg: MatchArg) -> Result<Self, ExpectError> {
        match arg {
            MatchArg::Literal(s) => Ok(StringMatcher::Literal(s)),
            MatchArg::Pattern(source) => Ok(StringMatcher::Regex(Arc::new(Regex::new(&source)?))),
            MatchArg::Regex(re) => Ok(StringMatcher::Regex(Arc::new(re))),
            MatchArg::Predicate(f) => Ok(StringMatcher::Predicate(f)),
            MatchArg::Any => Ok(StringMatcher::Any),
            MatchArg::None => Ok(StringMatcher::None),
            map @ MatchArg::Map(_) => Err(ExpectError::UnsupportedMatcher(format!(
                "map argument {map}"
            ))),
        }
    }

    /// Check if a candidate string matches.
    pub fn matches(&self, candidate: &str) -> bool {
        match self {
            StringMatcher::Literal(s) => s == candidate,
            // Regex search, not a full match; anchor the pattern to require one
            StringMatcher::Regex(re) => re.is_match(candidate),
            StringMatcher::Predicate(f) => f(candidate),
            StringMatcher::Any => true,
            StringMatcher::None => false,
        }
    }

    /// Lower-case a literal, leaving other variants untouched.
    pub(crate) fn into_lowercase(self) -> Self {
        match self {
            StringMatcher::Literal(s) => StringMatcher::Literal(s.to_ascii_lowercase()),
            other => other,
        }
    }
}

impl fmt::Display for StringMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StringMatcher::Literal(s) => f.write_str(s),
            StringMatcher::Regex(re) => f.write_str(re.as_str()),
            StringMatcher::Predicate(_) => f.write_str("<custom matcher>"),
            StringMatcher::Any => f.write_str("<any>"),
            StringMatcher::None => f.write_str("<none>"),
        }
    }
}

impl fmt::Debug for StringMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StringMatcher::Literal(s) => f.debug_tuple("Literal").field(s).finish(),
            StringMatcher::Regex(re) => f.debug_tuple("Regex").field(&re.as_str()).finish(),
            StringMatcher::Predicate(_) => f.write_str("Predicate(..)"),
            StringMatcher::Any => f.write_str("Any"),
            StringMatcher::None => f.write_str("None"),
        }
    }
}
