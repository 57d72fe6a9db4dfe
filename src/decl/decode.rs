//! Literal decoding shared by both declaration sources.
//!
//! A source only has to say how to read a string, a bool or a bare identifier
//! out of one of its literals ([`Literal`]); turning an attribute into a
//! [`Declaration`] is the same code for runtime values and `syn` expressions.

use super::types::{
    BodyEncoding, Declaration, HeaderDecl, PathDecl, QueryDecl, RequestDecl,
    SerializationMethods, SourceRef, ValueStyle,
};
use http::Method;
use thiserror::Error;

/// Read access to one literal attribute argument.
pub trait Literal {
    fn as_str(&self) -> Option<String>;
    fn as_bool(&self) -> Option<bool>;
    /// A bare identifier such as `url_encoded`
    fn as_ident(&self) -> Option<String>;
    /// Short rendering for diagnostics
    fn describe(&self) -> String;
}

/// One argument as written: positional, or `name = value`.
#[derive(Debug, Clone, PartialEq)]
pub struct RawArg<L> {
    pub name: Option<String>,
    pub value: L,
}

/// An attribute before decoding.
#[derive(Debug, Clone, PartialEq)]
pub struct RawAttribute<L> {
    pub name: String,
    pub args: Vec<RawArg<L>>,
    pub source: SourceRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("unknown declaration `{0}`")]
    Unknown(String),
    #[error("`{attribute}` expects {expected}, found {found}")]
    WrongType {
        attribute: String,
        expected: &'static str,
        found: String,
    },
    #[error("`{attribute}` requires {what}")]
    Missing { attribute: String, what: &'static str },
    #[error("`{attribute}` takes at most {max} positional argument(s)")]
    TooManyArguments { attribute: String, max: usize },
    #[error("`{attribute}` has no argument named `{name}`")]
    UnknownArgument { attribute: String, name: String },
    #[error("`{attribute}`: {reason}")]
    Invalid { attribute: String, reason: String },
}

const VERBS: [&str; 8] = [
    "get", "post", "put", "delete", "patch", "head", "options", "trace",
];

const VOCABULARY: [&str; 11] = [
    "request",
    "base_path",
    "header",
    "path",
    "query",
    "raw_query_string",
    "query_map",
    "body",
    "allow_any_status_code",
    "serialization",
    "request_property",
];

/// Whether `name` belongs to the declaration vocabulary.
pub fn is_declaration(name: &str) -> bool {
    VERBS.contains(&name) || VOCABULARY.contains(&name)
}

struct Args<'a, L> {
    attribute: &'a str,
    positional: Vec<&'a L>,
    named: Vec<(&'a str, &'a L)>,
}

impl<'a, L: Literal> Args<'a, L> {
    fn new(raw: &'a RawAttribute<L>) -> Self {
        let mut positional = Vec::new();
        let mut named = Vec::new();
        for arg in &raw.args {
            match &arg.name {
                Some(name) => named.push((name.as_str(), &arg.value)),
                None => positional.push(&arg.value),
            }
        }
        Args {
            attribute: &raw.name,
            positional,
            named,
        }
    }

    fn limit(&self, max: usize, allowed: &[&str]) -> Result<(), DecodeError> {
        if self.positional.len() > max {
            return Err(DecodeError::TooManyArguments {
                attribute: self.attribute.to_string(),
                max,
            });
        }
        if let Some((name, _)) = self.named.iter().find(|(n, _)| !allowed.contains(n)) {
            return Err(DecodeError::UnknownArgument {
                attribute: self.attribute.to_string(),
                name: name.to_string(),
            });
        }
        Ok(())
    }

    fn wrong(&self, expected: &'static str, lit: &L) -> DecodeError {
        DecodeError::WrongType {
            attribute: self.attribute.to_string(),
            expected,
            found: lit.describe(),
        }
    }

    fn string(&self, lit: &L) -> Result<String, DecodeError> {
        lit.as_str().ok_or_else(|| self.wrong("a string", lit))
    }

    fn positional_str(&self, index: usize) -> Result<Option<String>, DecodeError> {
        self.positional
            .get(index)
            .map(|lit| self.string(lit))
            .transpose()
    }

    fn named(&self, key: &str) -> Option<&'a L> {
        self.named
            .iter()
            .find(|(n, _)| *n == key)
            .map(|(_, lit)| *lit)
    }

    fn named_str(&self, key: &str) -> Result<Option<String>, DecodeError> {
        self.named(key).map(|lit| self.string(lit)).transpose()
    }

    fn named_bool(&self, key: &str) -> Result<Option<bool>, DecodeError> {
        self.named(key)
            .map(|lit| lit.as_bool().ok_or_else(|| self.wrong("a bool", lit)))
            .transpose()
    }

    /// Enum selectors accept a bare identifier or a string.
    fn selector(&self, lit: &L) -> Result<String, DecodeError> {
        lit.as_ident()
            .or_else(|| lit.as_str())
            .map(|s| s.to_ascii_lowercase().replace('_', ""))
            .ok_or_else(|| self.wrong("an identifier", lit))
    }

    fn style(&self, lit: &L) -> Result<ValueStyle, DecodeError> {
        match self.selector(lit)?.as_str() {
            "tostring" => Ok(ValueStyle::ToString),
            "serialized" => Ok(ValueStyle::Serialized),
            _ => Err(self.wrong("`to_string` or `serialized`", lit)),
        }
    }

    fn named_style(&self, key: &str) -> Result<Option<ValueStyle>, DecodeError> {
        self.named(key).map(|lit| self.style(lit)).transpose()
    }

    fn encoding(&self, lit: &L) -> Result<BodyEncoding, DecodeError> {
        match self.selector(lit)?.as_str() {
            "default" => Ok(BodyEncoding::Default),
            "serialized" => Ok(BodyEncoding::Serialized),
            "urlencoded" => Ok(BodyEncoding::UrlEncoded),
            _ => Err(self.wrong("`default`, `serialized` or `url_encoded`", lit)),
        }
    }

    fn invalid(&self, reason: impl Into<String>) -> DecodeError {
        DecodeError::Invalid {
            attribute: self.attribute.to_string(),
            reason: reason.into(),
        }
    }
}

/// Split `"Name: value"` into a header declaration.
///
/// No delimiter means "remove"; a delimiter followed by nothing sets the empty value.
pub fn parse_header(line: &str) -> HeaderDecl {
    match line.split_once(':') {
        Some((name, value)) => HeaderDecl {
            name: name.trim().to_string(),
            value: Some(value.trim().to_string()),
        },
        None => HeaderDecl {
            name: line.trim().to_string(),
            value: None,
        },
    }
}

/// Decode one raw attribute into a [`Declaration`].
pub fn decode<L: Literal>(raw: &RawAttribute<L>) -> Result<Declaration, DecodeError> {
    let args = Args::new(raw);
    let name = raw.name.as_str();

    if VERBS.contains(&name) {
        args.limit(1, &[])?;
        let path = args.positional_str(0)?.unwrap_or_default();
        let method = Method::from_bytes(name.to_ascii_uppercase().as_bytes())
            .map_err(|e| args.invalid(e.to_string()))?;
        return Ok(Declaration::Request(RequestDecl { method, path }));
    }

    match name {
        "request" => {
            args.limit(2, &[])?;
            let verb = args.positional_str(0)?.ok_or(DecodeError::Missing {
                attribute: name.to_string(),
                what: "an HTTP verb",
            })?;
            let method = Method::from_bytes(verb.trim().to_ascii_uppercase().as_bytes())
                .map_err(|_| args.invalid(format!("`{verb}` is not a valid HTTP verb")))?;
            let path = args.positional_str(1)?.unwrap_or_default();
            Ok(Declaration::Request(RequestDecl { method, path }))
        }
        "base_path" => {
            args.limit(1, &[])?;
            let path = args.positional_str(0)?.ok_or(DecodeError::Missing {
                attribute: name.to_string(),
                what: "a path",
            })?;
            Ok(Declaration::BasePath(path))
        }
        "header" => {
            args.limit(2, &[])?;
            let first = args.positional_str(0)?.ok_or(DecodeError::Missing {
                attribute: name.to_string(),
                what: "a header name",
            })?;
            let header = match args.positional_str(1)? {
                Some(value) => {
                    if first.contains(':') {
                        return Err(args.invalid("header name must not contain ':'"));
                    }
                    HeaderDecl {
                        name: first.trim().to_string(),
                        value: Some(value),
                    }
                }
                None => parse_header(&first),
            };
            if header.name.is_empty() {
                return Err(args.invalid("header name is empty"));
            }
            Ok(Declaration::Header(header))
        }
        "path" => {
            args.limit(1, &["name", "encode", "style"])?;
            let name_arg = match args.positional_str(0)? {
                Some(n) => Some(n),
                None => args.named_str("name")?,
            };
            Ok(Declaration::Path(PathDecl {
                name: name_arg,
                encode: args.named_bool("encode")?.unwrap_or(true),
                style: args.named_style("style")?,
            }))
        }
        "query" => {
            args.limit(1, &["name", "style"])?;
            let name_arg = match args.positional_str(0)? {
                Some(n) => Some(n),
                None => args.named_str("name")?,
            };
            Ok(Declaration::Query(QueryDecl {
                name: name_arg,
                style: args.named_style("style")?,
            }))
        }
        "raw_query_string" => {
            args.limit(0, &[])?;
            Ok(Declaration::RawQueryString)
        }
        "query_map" => {
            args.limit(0, &["style"])?;
            Ok(Declaration::QueryMap {
                style: args.named_style("style")?,
            })
        }
        "body" => {
            args.limit(1, &["encoding"])?;
            let lit = args
                .positional
                .first()
                .copied()
                .or_else(|| args.named("encoding"));
            let encoding = match lit {
                Some(lit) => args.encoding(lit)?,
                None => BodyEncoding::Default,
            };
            Ok(Declaration::Body(encoding))
        }
        "allow_any_status_code" => {
            args.limit(1, &[])?;
            let allow = match args.positional.first() {
                Some(lit) => lit.as_bool().ok_or_else(|| args.wrong("a bool", lit))?,
                None => true,
            };
            Ok(Declaration::AllowAnyStatusCode(allow))
        }
        "serialization" => {
            args.limit(0, &["body", "query", "path"])?;
            let body = args.named("body").map(|lit| args.encoding(lit)).transpose()?;
            let methods = SerializationMethods {
                body,
                query: args.named_style("query")?,
                path: args.named_style("path")?,
            };
            if methods == SerializationMethods::default() {
                return Err(args.invalid("at least one of `body`, `query` or `path` is required"));
            }
            Ok(Declaration::Serialization(methods))
        }
        "request_property" => {
            args.limit(1, &["key"])?;
            let key = match args.positional_str(0)? {
                Some(k) => Some(k),
                None => args.named_str("key")?,
            };
            Ok(Declaration::RequestProperty { key })
        }
        other => Err(DecodeError::Unknown(other.to_string())),
    }
}
