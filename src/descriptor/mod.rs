//! # Request Descriptor Assembler
//!
//! Turns one method call plus its arguments into a transport-agnostic
//! [`RequestDescriptor`].
//!
//! Work is split in two phases. [`RequestTemplate::compile`] runs once per
//! method when the model is built: it resolves the path template against the
//! base path, picks a role for every parameter, parses static headers and
//! selects body and any-status behaviour. [`RequestTemplate::assemble`] runs
//! per call and only looks at argument values. It is synchronous, never
//! touches the network and fails with [`AssembleError`] instead of panicking
//! when the caller breaks the call contract.
//!
//! ## Header layering
//!
//! Headers are applied in four layers, lowest priority first: type, property,
//! method, parameter. Within one layer the first touch of a name replaces
//! whatever lower layers set, further values for the same name are appended,
//! and a removal drops every entry.

mod args;
mod assemble;
mod template;

pub use args::{ArgValue, BytesArg, CancelArg, PropertyValues};
pub use assemble::{CompileError, RequestTemplate};
pub(crate) use assemble::{header_name, header_value, resolve_encoding};
pub use template::{is_absolute, join, PathTemplate, Segment, TemplateError};

use crate::model::ResponseShape;
use bytes::Bytes;
use http::{HeaderMap, Method};
use serde_json::{Map, Value};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// One query-string element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryPart {
    Pair(String, String),
    /// Appended verbatim, already encoded by the caller
    Raw(String),
}

/// Body payload, classified at bind time.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Bytes(Bytes),
    Text(String),
    /// Form pairs in insertion order, not yet encoded
    UrlEncoded(Vec<(String, String)>),
    /// Handed to the body serializer at send time
    Serialized(Value),
}

impl RequestBody {
    /// `application/x-www-form-urlencoded` rendering of a form body.
    pub fn form_encoded(pairs: &[(String, String)]) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .finish()
    }
}

/// Everything a transport needs to issue one request.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    /// Interface method this request was built for
    pub operation: String,
    pub method: Method,
    /// Resolved path, relative to the transport's base URL unless absolute
    pub path: String,
    pub query: Vec<QueryPart>,
    pub headers: HeaderMap,
    pub body: Option<RequestBody>,
    pub cancellation: Option<CancellationToken>,
    pub response: ResponseShape,
    pub allow_any_status_code: bool,
    /// Out-of-band values for the transport, never sent on the wire
    pub properties: Map<String, Value>,
}

impl RequestDescriptor {
    /// Encoded query string without the leading `?`.
    pub fn query_string(&self) -> String {
        self.query
            .iter()
            .map(|part| match part {
                QueryPart::Pair(k, v) => {
                    format!("{}={}", urlencoding::encode(k), urlencoding::encode(v))
                }
                QueryPart::Raw(raw) => raw.clone(),
            })
            .collect::<Vec<_>>()
            .join("&")
    }

    /// Path plus query string, as sent.
    pub fn path_and_query(&self) -> String {
        let query = self.query_string();
        if query.is_empty() {
            self.path.clone()
        } else if self.path.contains('?') {
            format!("{}&{}", self.path, query)
        } else {
            format!("{}?{}", self.path, query)
        }
    }

    /// All values for a header, in order.
    pub fn header_values(&self, name: &str) -> Vec<&str> {
        self.headers
            .get_all(name)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect()
    }
}

/// Call-time contract violations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssembleError {
    #[error("`{operation}` takes {expected} argument(s), got {got}")]
    ArgumentCount {
        operation: String,
        expected: usize,
        got: usize,
    },
    #[error("invalid argument `{parameter}`: {reason}")]
    InvalidArgument { parameter: String, reason: String },
    #[error("invalid value for header `{name}`: {reason}")]
    InvalidHeaderValue { name: String, reason: String },
}
