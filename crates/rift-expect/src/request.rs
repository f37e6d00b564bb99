//! Request representation consumed by the matcher engine.
//!
//! A [`Request`] exposes the method, path, query parameters, headers and the
//! form-decoded body of an HTTP request. Header names are stored lower-cased.
//! The form body is decoded lazily, the first time a body matcher asks for it,
//! so requests that are never body-matched never fail to parse.

use crate::error::ExpectError;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use hyper::http::request::Parts;
use once_cell::sync::OnceCell;
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

/// Multimap of parameter name to its values, in arrival order.
pub type Params = HashMap<String, Vec<String>>;

/// Content type that triggers form decoding of the request body.
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Methods whose body is decoded as a form.
const FORM_METHODS: [&str; 3] = ["POST", "PUT", "PATCH"];

/// An incoming HTTP request as seen by expectations.
#[derive(Debug, Clone)]
pub struct Request {
    method: String,
    path: String,
    query: Params,
    headers: Params,
    body: Bytes,
    form: OnceCell<Result<Params, String>>,
    received_at: DateTime<Utc>,
}

impl Request {
    /// Create a request from a method and a target such as `/users?page=2`.
    pub fn new(method: impl Into<String>, target: &str) -> Self {
        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path, parse_query(query)),
            None => (target, Params::new()),
        };

        Self {
            method: method.into(),
            path: path.to_string(),
            query,
            headers: Params::new(),
            body: Bytes::new(),
            form: OnceCell::new(),
            received_at: Utc::now(),
        }
    }

    pub fn get(target: &str) -> Self {
        Self::new("GET", target)
    }

    pub fn post(target: &str) -> Self {
        Self::new("POST", target)
    }

    /// Append a query parameter value.
    pub fn query_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.entry(name.into()).or_default().push(value.into());
        self
    }

    /// Append a header value. The name is lower-cased.
    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers
            .entry(name.to_ascii_lowercase())
            .or_default()
            .push(value.into());
        self
    }

    /// Replace all values of a header.
    pub fn set_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.remove(&name.to_ascii_lowercase());
        self.header(name, value)
    }

    /// Replace the raw body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self.form = OnceCell::new();
        self
    }

    /// Replace the body with form-encoded pairs and set the matching content type.
    pub fn form_body<K, V>(self, pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let encoded = pairs
            .into_iter()
            .map(|(k, v)| {
                format!(
                    "{}={}",
                    urlencoding::encode(k.as_ref()),
                    urlencoding::encode(v.as_ref())
                )
            })
            .collect::<Vec<_>>()
            .join("&");

        self.set_header("content-type", FORM_CONTENT_TYPE).body(encoded)
    }

    /// Build a request from hyper request parts and an already collected body.
    ///
    /// The path is percent-decoded; a path that does not decode is kept raw.
    pub fn from_parts(parts: &Parts, body: Bytes) -> Self {
        let mut headers = Params::new();
        for (name, value) in parts.headers.iter() {
            headers
                .entry(name.as_str().to_string())
                .or_default()
                .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
        }

        Self {
            method: parts.method.as_str().to_string(),
            path: decode_path(parts.uri.path()),
            query: parts.uri.query().map(parse_query).unwrap_or_default(),
            headers,
            body,
            form: OnceCell::new(),
            received_at: Utc::now(),
        }
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> &Params {
        &self.query
    }

    pub fn headers(&self) -> &Params {
        &self.headers
    }

    /// All values of a header, looked up case-insensitively.
    pub fn header_values(&self, name: &str) -> &[String] {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header_values("content-type").first().map(String::as_str)
    }

    pub fn raw_body(&self) -> &[u8] {
        &self.body
    }

    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }

    /// Whether the body is decoded as a form: a POST, PUT or PATCH whose
    /// content type declares a form-encoded body.
    pub fn is_form_encoded(&self) -> bool {
        if !FORM_METHODS.iter().any(|m| m.eq_ignore_ascii_case(&self.method)) {
            return false;
        }
        self.content_type()
            .and_then(|ct| ct.split(';').next())
            .is_some_and(|mime| mime.trim().eq_ignore_ascii_case(FORM_CONTENT_TYPE))
    }

    /// The form-decoded body. Empty when the body is not form-encoded or the
    /// method carries no form.
    pub fn form(&self) -> Result<&Params, ExpectError> {
        self.form
            .get_or_init(|| self.decode_form())
            .as_ref()
            .map_err(|reason| ExpectError::FormBody(reason.clone()))
    }

    fn decode_form(&self) -> Result<Params, String> {
        if !self.is_form_encoded() {
            return Ok(Params::new());
        }
        let text = std::str::from_utf8(&self.body)
            .map_err(|e| format!("body is not valid UTF-8: {e}"))?;
        parse_form(text)
    }
}

impl From<hyper::Request<Bytes>> for Request {
    fn from(req: hyper::Request<Bytes>) -> Self {
        let (parts, body) = req.into_parts();
        Self::from_parts(&parts, body)
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path)
    }
}

/// Parse a query string, URL-decoding keys and values.
///
/// Pairs that fail to decode are skipped. A key without `=` gets an empty value.
pub fn parse_query(query: &str) -> Params {
    let mut params = Params::new();
    for pair in query.split('&').filter(|s| !s.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        match (decode_component(key), decode_component(value)) {
            (Ok(key), Ok(value)) => params.entry(key).or_default().push(value),
            _ => debug!(pair, "Skipping undecodable query parameter"),
        }
    }
    params
}

/// Parse a form-encoded body. Unlike [`parse_query`], any undecodable pair is an error.
pub fn parse_form(body: &str) -> Result<Params, String> {
    let mut params = Params::new();
    for pair in body.split('&').filter(|s| !s.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        let key = decode_component(key)?;
        let value = decode_component(value)?;
        params.entry(key).or_default().push(value);
    }
    Ok(params)
}

fn decode_path(raw: &str) -> String {
    match urlencoding::decode(raw) {
        Ok(path) => path.into_owned(),
        Err(e) => {
            debug!(path = raw, error = %e, "Keeping undecodable path as-is");
            raw.to_string()
        }
    }
}

fn decode_component(raw: &str) -> Result<String, String> {
    let bytes = raw.as_bytes();
    let mut from = 0;
    while let Some(offset) = raw[from..].find('%') {
        let at = from + offset;
        let escape_ok = bytes
            .get(at + 1..at + 3)
            .is_some_and(|hex| hex.iter().all(u8::is_ascii_hexdigit));
        if !escape_ok {
            return Err(format!("invalid percent escape in {raw:?}"));
        }
        from = at + 3;
    }

    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(Cow::into_owned)
        .map_err(|e| format!("{raw:?} does not decode to UTF-8: {e}"))
}
