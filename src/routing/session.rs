//! Session identifier extraction.
//!
//! The identifier comes from a named query parameter, or failing that from
//! the same parameter in an `application/x-www-form-urlencoded` body. Names
//! match exactly, values are percent-decoded and the first occurrence wins.

use axum::http::{header, HeaderMap};
use url::form_urlencoded;

/// Extracts the session identifier from requests.
#[derive(Debug, Clone)]
pub struct SessionExtractor {
    param: String,
}

impl SessionExtractor {
    pub fn new(param: impl Into<String>) -> Self {
        Self {
            param: param.into(),
        }
    }

    /// Name of the parameter carrying the session identifier.
    pub fn param(&self) -> &str {
        &self.param
    }

    /// Non-empty identifier from the query string.
    pub fn from_query(&self, query: Option<&str>) -> Option<String> {
        query
            .and_then(|q| self.first(q.as_bytes()))
            .filter(|s| !s.is_empty())
    }

    /// Non-empty identifier from a URL-encoded form body.
    pub fn from_form_body(&self, body: &[u8]) -> Option<String> {
        self.first(body).filter(|s| !s.is_empty())
    }

    fn first(&self, input: &[u8]) -> Option<String> {
        form_urlencoded::parse(input)
            .find(|(name, _)| name == self.param.as_str())
            .map(|(_, value)| value.into_owned())
    }
}

/// True if the request body is a URL-encoded form.
pub fn is_form_body(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .is_some_and(|mime| mime.trim().eq_ignore_ascii_case("application/x-www-form-urlencoded"))
}
