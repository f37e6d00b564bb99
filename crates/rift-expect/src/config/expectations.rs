use crate::error::ExpectError;
use crate::expectation::ExpectationId;
use crate::expecter::{Expectation, Expecter};
use crate::predicate::{MatchArg, StringMatcher};
use crate::request::Request;
use crate::response::ResponseWriter;
use anyhow::Context;
use hyper::StatusCode;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// A file of declarative expectations.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ExpectationFile {
    #[serde(default)]
    pub expectations: Vec<ExpectationConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpectationConfig {
    pub method: MatcherConfig,
    pub path: MatcherConfig,
    /// Query string pairs. Present but empty means "any non-empty query".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<Vec<PairConfig>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<Vec<PairConfig>>,
    /// Form body pairs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Vec<PairConfig>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub times: Option<TimesConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub respond: Option<RespondConfig>,
    #[serde(default)]
    pub call_through: bool,
    #[serde(default)]
    pub debug: bool,
}

/// A single string matcher. A plain string is a literal.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(untagged)]
pub enum MatcherConfig {
    Literal(String),
    Equals { equals: String },
    Matches { matches: String },
    /// `true` matches anything, `false` matches nothing
    Exists { exists: bool },
}

impl MatcherConfig {
    pub fn to_arg(&self) -> MatchArg {
        match self {
            MatcherConfig::Literal(s) | MatcherConfig::Equals { equals: s } => s.into(),
            MatcherConfig::Matches { matches } => MatchArg::pattern(matches),
            MatcherConfig::Exists { exists: true } => MatchArg::Any,
            MatcherConfig::Exists { exists: false } => MatchArg::None,
        }
    }
}

/// One key/value pair of a field matcher. A missing value accepts any value.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PairConfig {
    pub key: MatcherConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<MatcherConfig>,
}

/// Field matcher arguments for a list of pairs: none, one key, one key and
/// value, or a map of several pairs.
fn field_args(pairs: &[PairConfig]) -> Vec<MatchArg> {
    match pairs {
        [] => Vec::new(),
        [PairConfig { key, value: None }] => vec![key.to_arg()],
        [PairConfig {
            key,
            value: Some(value),
        }] => vec![key.to_arg(), value.to_arg()],
        _ => vec![MatchArg::Map(
            pairs
                .iter()
                .map(|pair| {
                    let value = pair.value.as_ref().map_or(MatchArg::Any, MatcherConfig::to_arg);
                    (pair.key.to_arg(), value)
                })
                .collect(),
        )],
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TimesKeyword {
    Never,
    Once,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum TimesConfig {
    Keyword(TimesKeyword),
    Exactly {
        exactly: usize,
    },
    AtLeast {
        #[serde(rename = "atLeast")]
        at_least: usize,
    },
    AtMost {
        #[serde(rename = "atMost")]
        at_most: usize,
    },
    Between {
        between: [usize; 2],
    },
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RespondConfig {
    #[serde(default = "default_status")]
    pub status: u16,
    #[serde(default)]
    pub body: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
}

fn default_status() -> u16 {
    200
}

impl ExpectationFile {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, anyhow::Error> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_yaml_str(&contents).with_context(|| format!("Invalid file {}", path.display()))
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, anyhow::Error> {
        let file: ExpectationFile = serde_yaml::from_str(yaml)?;
        file.validate()?;
        Ok(file)
    }

    /// Check every entry can be declared.
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        for (index, entry) in self.expectations.iter().enumerate() {
            entry
                .validate()
                .with_context(|| format!("expectations[{index}]"))?;
        }
        Ok(())
    }
}

impl ExpectationConfig {
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        StringMatcher::compile(self.method.to_arg()).context("method")?;
        StringMatcher::compile(self.path.to_arg()).context("path")?;

        let fields = [("query", &self.query), ("headers", &self.headers), ("body", &self.body)];
        for (name, pairs) in fields {
            for pair in pairs.iter().flatten() {
                StringMatcher::compile(pair.key.to_arg()).with_context(|| format!("{name} key"))?;
                if let Some(value) = &pair.value {
                    StringMatcher::compile(value.to_arg())
                        .with_context(|| format!("{name} value"))?;
                }
            }
        }

        if let Some(TimesConfig::Between { between: [min, max] }) = self.times {
            if min > max {
                anyhow::bail!("times.between must have min <= max, got [{min}, {max}]");
            }
        }

        match &self.respond {
            Some(respond) if StatusCode::from_u16(respond.status).is_err() => {
                anyhow::bail!("Invalid response status code: {}", respond.status)
            }
            None if self.call_through => {
                anyhow::bail!("callThrough requires a respond section")
            }
            _ => Ok(()),
        }
    }

    /// Declare this entry under the expecter's current scope.
    pub fn declare(&self, expecter: &mut Expecter) -> Result<ExpectationId, ExpectError> {
        let mut exp = expecter.expect(self.method.to_arg(), self.path.to_arg())?;

        if let Some(pairs) = &self.query {
            exp = exp.with_query(field_args(pairs))?;
        }
        if let Some(pairs) = &self.headers {
            exp = exp.with_header(field_args(pairs))?;
        }
        if let Some(pairs) = &self.body {
            exp = exp.with_body(field_args(pairs))?;
        }
        if let Some(times) = &self.times {
            exp = apply_times(exp, times)?;
        }
        if let Some(respond) = &self.respond {
            let status = StatusCode::from_u16(respond.status)
                .map_err(|_| ExpectError::InvalidStatus(respond.status))?;
            let body = respond.body.clone();
            let headers = respond.headers.clone();
            exp = exp.respond_with_fn(move |_: &Request, writer: &mut ResponseWriter| {
                writer.write_status(status);
                for (name, value) in &headers {
                    writer.header(name, value);
                }
                writer.write(&body);
            })?;
        }
        if self.call_through {
            exp = exp.and_call_through()?;
        }
        if self.debug {
            exp = exp.debug();
        }
        Ok(exp.id())
    }
}

fn apply_times<'a>(exp: Expectation<'a>, times: &TimesConfig) -> Result<Expectation<'a>, ExpectError> {
    match *times {
        TimesConfig::Keyword(TimesKeyword::Never) => exp.never(),
        TimesConfig::Keyword(TimesKeyword::Once) => exp.once(),
        TimesConfig::Exactly { exactly } => exp.times(exactly),
        TimesConfig::AtLeast { at_least } => exp.at_least(at_least),
        TimesConfig::AtMost { at_most } => exp.at_most(at_most),
        TimesConfig::Between { between: [min, max] } => exp.between(min, max),
    }
}

impl Expecter {
    /// Declare every entry of `file` in order, without opening scopes.
    pub fn declare_file(&mut self, file: &ExpectationFile) -> Result<Vec<ExpectationId>, ExpectError> {
        file.expectations
            .iter()
            .map(|entry| entry.declare(self))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::Request;

    #[test]
    fn test_parse_expectation_file() {
        let yaml = r#"
expectations:
  - method: GET
    path:
      matches: "^/users/\\d+$"
    query:
      - key: page
        value:
          matches: "^\\d+$"
    times: once
  - method:
      exists: true
    path: /health
    headers:
      - key: X-Health-Check
    times:
      between: [1, 3]
  - method: POST
    path: /posts
    body: []
    times:
      atLeast: 2
    respond:
      status: 201
      body: created
    callThrough: true
"#;
        let file = ExpectationFile::from_yaml_str(yaml).unwrap();
        assert_eq!(file.expectations.len(), 3);

        let first = &file.expectations[0];
        assert_eq!(first.method, MatcherConfig::Literal("GET".into()));
        assert_eq!(
            first.path,
            MatcherConfig::Matches {
                matches: r"^/users/\d+$".into()
            }
        );
        assert_eq!(first.times, Some(TimesConfig::Keyword(TimesKeyword::Once)));

        assert_eq!(file.expectations[1].method, MatcherConfig::Exists { exists: true });
        assert_eq!(
            file.expectations[1].times,
            Some(TimesConfig::Between { between: [1, 3] })
        );

        let third = &file.expectations[2];
        assert_eq!(third.body.as_ref().map(Vec::len), Some(0));
        assert_eq!(third.times, Some(TimesConfig::AtLeast { at_least: 2 }));
        assert_eq!(third.respond.as_ref().unwrap().status, 201);
        assert!(third.call_through);
    }

    #[test]
    fn test_validate_rejects_bad_entries() {
        let err = ExpectationFile::from_yaml_str(
            "expectations:\n  - method: GET\n    path: /\n    callThrough: true\n",
        )
        .unwrap_err();
        assert!(format!("{err:#}").contains("callThrough requires a respond section"));

        let err = ExpectationFile::from_yaml_str(
            "expectations:\n  - method: GET\n    path:\n      matches: \"(\"\n",
        )
        .unwrap_err();
        assert!(format!("{err:#}").contains("expectations[0]"));

        let err = ExpectationFile::from_yaml_str(
            "expectations:\n  - method: GET\n    path: /\n    times:\n      between: [3, 1]\n",
        )
        .unwrap_err();
        assert!(format!("{err:#}").contains("min <= max"));

        let err = ExpectationFile::from_yaml_str(
            "expectations:\n  - method: GET\n    path: /\n    respond:\n      status: 1000\n",
        )
        .unwrap_err();
        assert!(format!("{err:#}").contains("1000"));
    }

    #[test]
    fn test_field_args_shapes() {
        let pair = |key: &str, value: Option<&str>| PairConfig {
            key: MatcherConfig::Literal(key.into()),
            value: value.map(|v| MatcherConfig::Literal(v.into())),
        };

        assert!(field_args(&[]).is_empty());
        assert_eq!(field_args(&[pair("a", None)]).len(), 1);
        assert_eq!(field_args(&[pair("a", Some("1"))]).len(), 2);

        let args = field_args(&[pair("a", Some("1")), pair("b", None)]);
        assert_eq!(args.len(), 1);
        assert_eq!(args[0].to_string(), r#"{a="1", b="<any>"}"#);
    }

    #[test]
    fn test_declare_file() {
        let yaml = r#"
expectations:
  - method: GET
    path: /status
    times: once
    respond:
      status: 202
      body: accepted
      headers:
        x-mock: "yes"
  - method: POST
    path: /posts
    body:
      - key: title
        value: My first blog post
"#;
        let file = ExpectationFile::from_yaml_str(yaml).unwrap();
        let mut hex = Expecter::new();
        let ids = hex.declare_file(&file).unwrap();
        assert_eq!(ids.len(), 2);

        let writer = hex.serve(Request::get("/status"), None).unwrap();
        assert_eq!(writer.status(), StatusCode::ACCEPTED);
        assert_eq!(writer.body(), b"accepted");
        assert_eq!(writer.headers().get("x-mock").unwrap(), "yes");

        hex.log_request(Request::post("/posts").form_body([("title", "My first blog post")]))
            .unwrap();
        assert!(hex.pass(), "{}", hex.summary());
        assert_eq!(
            hex.get(ids[1]).unwrap().summary_line(),
            r#"POST /posts with body matching title="My first blog post" - passed"#
        );
    }
}
