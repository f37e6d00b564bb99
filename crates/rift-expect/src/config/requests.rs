use crate::error::ExpectError;
use crate::expectation::ExpectationId;
use crate::expecter::Expecter;
use crate::request::Request;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Recorded requests to replay against declared expectations.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct RequestFile {
    #[serde(default)]
    pub requests: Vec<RecordedRequest>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordedRequest {
    pub method: String,
    /// Path, optionally with a query string
    pub path: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub query: BTreeMap<String, Vec<String>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, Vec<String>>,
    /// Form fields, encoded as an `application/x-www-form-urlencoded` body
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form: Option<BTreeMap<String, String>>,
    /// Raw body, sent as-is
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

impl RecordedRequest {
    pub fn to_request(&self) -> Request {
        let mut request = Request::new(self.method.as_str(), &self.path);
        for (name, values) in &self.query {
            for value in values {
                request = request.query_param(name, value);
            }
        }
        for (name, values) in &self.headers {
            for value in values {
                request = request.header(name, value);
            }
        }

        if let Some(form) = &self.form {
            request = request.form_body(form);
        }
        if let Some(body) = &self.body {
            request = request.body(body.clone());
        }
        match &self.content_type {
            Some(content_type) => request.set_header("content-type", content_type),
            None => request,
        }
    }
}

impl RequestFile {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, anyhow::Error> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_yaml_str(&contents).with_context(|| format!("Invalid file {}", path.display()))
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, anyhow::Error> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Log every request in order. Stops at the first request that fails to parse.
    pub fn replay(&self, expecter: &mut Expecter) -> Result<Vec<Option<ExpectationId>>, ExpectError> {
        self.requests
            .iter()
            .map(|recorded| expecter.log_request(recorded.to_request()))
            .collect()
    }
}
