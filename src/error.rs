use crate::descriptor::AssembleError;
use crate::validator::Diagnostic;
use http::StatusCode;
use thiserror::Error;

/// Errors surfaced by bound clients.
#[derive(Debug, Error)]
pub enum Error {
    /// The interface failed validation; every diagnostic is attached
    #[error("interface `{interface}` has invalid declarations: {}", summary(.diagnostics))]
    InvalidDeclaration {
        interface: String,
        diagnostics: Vec<Diagnostic>,
    },

    /// The method does not exist or was excluded by a member-level error
    #[error("interface `{interface}` has no bindable method `{method}`")]
    UnknownMethod { interface: String, method: String },

    #[error(transparent)]
    Assemble(#[from] AssembleError),

    /// An argument could not be lowered through the serializer
    #[error("failed to serialize argument `{parameter}`: {source}")]
    Serialize {
        parameter: String,
        #[source]
        source: serde_json::Error,
    },

    #[cfg(feature = "transport")]
    #[error(transparent)]
    Transport(#[from] reqwest::Error),

    /// Failure reported by a non-reqwest requester
    #[error("requester failed: {0}")]
    Requester(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Non-success status with the any-status policy off
    #[error("HTTP error: {status} for URL: {url}\nResponse body (truncated): {body_snippet}")]
    Http {
        url: String,
        status: StatusCode,
        body_snippet: String,
    },

    #[error("Failed to parse response from URL: {url}\nSource error: {source}\nResponse body (truncated): {body_snippet}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
        body_snippet: String,
    },

    #[error("request cancelled")]
    Cancelled,

    #[error("Invalid URL: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

fn summary(diagnostics: &[Diagnostic]) -> String {
    let errors: Vec<String> = diagnostics
        .iter()
        .filter(|d| d.is_error())
        .map(|d| format!("[{}] {}", d.code, d.message))
        .collect();
    errors.join("; ")
}

/// Truncate a response body for error messages
pub fn snippet(s: &str, limit: usize) -> String {
    const ELLIPSIS: &str = "…";
    if s.chars().count() <= limit {
        s.to_string()
    } else {
        let mut out = s.chars().take(limit).collect::<String>();
        out.push_str(ELLIPSIS);
        out
    }
}
