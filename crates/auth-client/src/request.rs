//! Outbound request descriptor
//!
//! A descriptor owns everything needed to send a request again: method, path,
//! headers and body. It is cloned into each dispatch, so a replay after a
//! token refresh carries exactly the original request.

use bytes::Bytes;
use reqwest::Method;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use serde::Serialize;

use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    id: String,
    pub method: Method,
    /// Path relative to the API base URL (may include a query string), or an
    /// absolute URL.
    pub path: String,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
    already_retried: bool,
}

impl RequestDescriptor {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            id: format!("req_{}", uuid::Uuid::new_v4().as_simple()),
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            body: None,
            already_retried: false,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Add or replace a header.
    pub fn header(mut self, name: &str, value: &str) -> Result<Self> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| Error::InvalidRequest(format!("invalid header name {name:?}: {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| Error::InvalidRequest(format!("invalid header value for {name}: {e}")))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Serialize `value` as the JSON body.
    pub fn json<T: Serialize + ?Sized>(mut self, value: &T) -> Result<Self> {
        let body = serde_json::to_vec(value)
            .map_err(|e| Error::InvalidRequest(format!("serializing JSON body: {e}")))?;
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        self.body = Some(Bytes::from(body));
        Ok(self)
    }

    /// Raw body bytes; content-type is left to the caller.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Identifier used in tracing spans.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn already_retried(&self) -> bool {
        self.already_retried
    }

    /// Consume this request's single replay.
    pub fn mark_retried(&mut self) {
        self.already_retried = true;
    }

    /// Set `Authorization: Bearer <token>` on this descriptor.
    pub fn set_bearer(&mut self, token: &str) -> Result<()> {
        self.headers.insert(AUTHORIZATION, bearer_value(token)?);
        Ok(())
    }
}

/// Build a sensitive `Bearer` header value.
pub(crate) fn bearer_value(token: &str) -> Result<HeaderValue> {
    let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
        .map_err(|e| Error::InvalidRequest(format!("invalid token value: {e}")))?;
    value.set_sensitive(true);
    Ok(value)
}
