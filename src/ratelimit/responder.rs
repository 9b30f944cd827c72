//! Responses for denied requests.
//!
//! The middleware never decides what a denial looks like. It hands the
//! request to a [`DenialResponder`], which lets JSON endpoints answer with a
//! plain `429` while fragment-swapping pages render an inline message.

use crate::error::{FloodgateError, Result};
use axum::{
    extract::Request,
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};

/// Builds the response for a rate-limited request
pub trait DenialResponder: Send + Sync + 'static {
    fn respond(&self, request: &Request) -> Response;
}

impl<F> DenialResponder for F
where
    F: Fn(&Request) -> Response + Send + Sync + 'static,
{
    fn respond(&self, request: &Request) -> Response {
        self(request)
    }
}

/// Plain `429 Too Many Requests`
#[derive(Debug, Clone, Copy, Default)]
pub struct TooManyRequests;

impl DenialResponder for TooManyRequests {
    fn respond(&self, _request: &Request) -> Response {
        (StatusCode::TOO_MANY_REQUESTS, "Too many requests").into_response()
    }
}

/// A message rendered in place, with a caller-chosen status and headers
///
/// Defaults to `200 OK` for clients that ignore the body of non-2xx
/// responses.
#[derive(Debug, Clone)]
pub struct InlineMessage {
    status: StatusCode,
    headers: HeaderMap,
    body: String,
}

impl InlineMessage {
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    #[must_use]
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    /// Add a response header, rejecting invalid names or values
    pub fn with_header(mut self, name: &str, value: &str) -> Result<Self> {
        let name = HeaderName::try_from(name).map_err(|e| {
            FloodgateError::configuration(format!("Invalid header name '{}': {}", name, e))
        })?;
        let value = HeaderValue::try_from(value).map_err(|e| {
            FloodgateError::configuration(format!("Invalid value for header '{}': {}", name, e))
        })?;
        self.headers.insert(name, value);
        Ok(self)
    }
}

impl DenialResponder for InlineMessage {
    fn respond(&self, _request: &Request) -> Response {
        (self.status, self.headers.clone(), self.body.clone()).into_response()
    }
}

/// Inline message for fragment requests, `429` for everything else
///
/// A request is a fragment request when it carries the marker header with
/// the marker value, `HX-Request: true` by default.
#[derive(Debug, Clone)]
pub struct FragmentAware {
    marker: HeaderName,
    marker_value: HeaderValue,
    inline: InlineMessage,
}

impl FragmentAware {
    pub fn new(inline: InlineMessage) -> Self {
        Self {
            marker: HeaderName::from_static("hx-request"),
            marker_value: HeaderValue::from_static("true"),
            inline,
        }
    }

    /// Recognize fragment requests by a different header
    pub fn with_marker(mut self, name: &str, value: &str) -> Result<Self> {
        self.marker = HeaderName::try_from(name).map_err(|e| {
            FloodgateError::configuration(format!("Invalid marker header '{}': {}", name, e))
        })?;
        self.marker_value = HeaderValue::try_from(value).map_err(|e| {
            FloodgateError::configuration(format!("Invalid marker value '{}': {}", value, e))
        })?;
        Ok(self)
    }

    fn is_fragment(&self, request: &Request) -> bool {
        request
            .headers()
            .get(&self.marker)
            .is_some_and(|v| v.as_bytes().eq_ignore_ascii_case(self.marker_value.as_bytes()))
    }
}

impl DenialResponder for FragmentAware {
    fn respond(&self, request: &Request) -> Response {
        if self.is_fragment(request) {
            self.inline.respond(request)
        } else {
            TooManyRequests.respond(request)
        }
    }
}
