//! Transport seam
//!
//! The record layer never speaks HTTP itself. Every network interaction is a
//! [`Request`] handed to a [`Transport`] implementation supplied by the
//! application, which answers asynchronously with a [`Response`] or a
//! [`TransportError`]. Retries, timeouts and cancellation belong to the
//! transport; this layer performs none of them.

mod memory;

pub use memory::MemoryTransport;

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::Attributes;

/// Result type for transport operations
pub type TransportResult<T> = Result<T, TransportError>;

/// Boxed future returned by [`Transport::request`]
pub type TransportFuture<'a> = Pin<Box<dyn Future<Output = TransportResult<Response>> + Send + 'a>>;

/// The four persistence verbs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verb {
    Create,
    Read,
    Update,
    Delete,
}

impl Verb {
    /// Conventional HTTP method for this verb
    pub fn http_method(&self) -> &'static str {
        match self {
            Verb::Create => "POST",
            Verb::Read => "GET",
            Verb::Update => "PUT",
            Verb::Delete => "DELETE",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Create => "create",
            Verb::Read => "read",
            Verb::Update => "update",
            Verb::Delete => "delete",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A request for the transport collaborator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Request {
    pub verb: Verb,
    pub url: String,
    /// Record body for create and update
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    /// Query criteria for reads
    #[serde(skip_serializing_if = "Attributes::is_empty")]
    pub params: Attributes,
}

impl Request {
    pub fn new(verb: Verb, url: impl Into<String>) -> Self {
        Self {
            verb,
            url: url.into(),
            body: None,
            params: Attributes::new(),
        }
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_params(mut self, params: Attributes) -> Self {
        self.params = params;
        self
    }
}

/// Response body shapes the record layer understands.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Empty,
    Record(Attributes),
    Records(Vec<Attributes>),
}

impl Payload {
    /// Classifies a JSON body: null, an object, or an array of objects.
    pub fn from_value(value: Value) -> TransportResult<Self> {
        match value {
            Value::Null => Ok(Payload::Empty),
            Value::Object(map) => Ok(Payload::Record(map)),
            Value::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    Value::Object(map) => Ok(map),
                    other => Err(TransportError::UnexpectedPayload(format!(
                        "expected an object in record list, got {}",
                        json_type_name(&other)
                    ))),
                })
                .collect::<TransportResult<Vec<_>>>()
                .map(Payload::Records),
            other => Err(TransportError::UnexpectedPayload(format!(
                "expected an object or array, got {}",
                json_type_name(&other)
            ))),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Payload::Empty => "empty",
            Payload::Record(_) => "record",
            Payload::Records(_) => "records",
        }
    }
}

/// A transport answer.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: u16,
    pub payload: Payload,
}

impl Response {
    pub fn new(status: u16, payload: Payload) -> Self {
        Self { status, payload }
    }

    pub fn ok(payload: Payload) -> Self {
        Self::new(200, payload)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Transport failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The request never produced a response
    #[error("network error: {0}")]
    Network(String),

    /// The server answered with a non-success status
    #[error("request failed with status {status}: {message}")]
    Status { status: u16, message: String },

    /// The response body had an unexpected shape
    #[error("unexpected payload: {0}")]
    UnexpectedPayload(String),
}

impl TransportError {
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            message: message.into(),
        }
    }

    pub fn not_found(url: &str) -> Self {
        Self::status(404, format!("{} not found", url))
    }

    /// HTTP status, when the server answered
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status_code() == Some(404)
    }
}

/// The asynchronous request/response collaborator.
pub trait Transport: Send + Sync {
    /// Issues one request
    fn request(&self, request: Request) -> TransportFuture<'_>;
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_verb_methods() {
        assert_eq!(Verb::Create.http_method(), "POST");
        assert_eq!(Verb::Read.http_method(), "GET");
        assert_eq!(Verb::Update.http_method(), "PUT");
        assert_eq!(Verb::Delete.http_method(), "DELETE");
        assert_eq!(Verb::Delete.to_string(), "delete");
    }

    #[test]
    fn test_payload_classification() {
        assert_eq!(Payload::from_value(Value::Null).unwrap(), Payload::Empty);
        assert!(matches!(
            Payload::from_value(json!({"id": 1})).unwrap(),
            Payload::Record(_)
        ));
        match Payload::from_value(json!([{"id": 1}, {"id": 2}])).unwrap() {
            Payload::Records(records) => assert_eq!(records.len(), 2),
            other => panic!("unexpected payload {:?}", other),
        }
        assert!(Payload::from_value(json!([1, 2])).is_err());
        assert!(Payload::from_value(json!("text")).is_err());
    }

    #[test]
    fn test_response_success_range() {
        assert!(Response::new(201, Payload::Empty).is_success());
        assert!(!Response::new(404, Payload::Empty).is_success());
    }

    #[test]
    fn test_error_status() {
        let err = TransportError::not_found("/posts/9");
        assert!(err.is_not_found());
        assert_eq!(err.status_code(), Some(404));
        assert_eq!(TransportError::Network("x".into()).status_code(), None);
    }

    #[test]
    fn test_request_serializes_without_empty_parts() {
        let request = Request::new(Verb::Read, "/posts");
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json, json!({"verb": "read", "url": "/posts"}));
    }
}
