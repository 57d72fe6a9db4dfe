use http::Method;
use std::fmt;

/// Where a declaration was attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    Type,
    Property,
    Method,
    Parameter,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Type => write!(f, "type"),
            Scope::Property => write!(f, "property"),
            Scope::Method => write!(f, "method"),
            Scope::Parameter => write!(f, "parameter"),
        }
    }
}

/// How a path or query value is rendered to text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValueStyle {
    /// Scalars as their plain text form
    #[default]
    ToString,
    /// Compact JSON via the value serializer
    Serialized,
}

/// Requested body encoding for a body-bound parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BodyEncoding {
    /// Defer to the method/type serialization override
    #[default]
    Default,
    Serialized,
    UrlEncoded,
}

/// Serialization overrides declared at type or method scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SerializationMethods {
    pub body: Option<BodyEncoding>,
    pub query: Option<ValueStyle>,
    pub path: Option<ValueStyle>,
}

/// Verb plus path template, e.g. `#[get("users/{id}")]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDecl {
    pub method: Method,
    pub path: String,
}

/// A static or dynamic header declaration.
///
/// At type, property and method scope `value: None` (no `:` delimiter) removes the
/// header, `Some("")` sets it to the empty string. At parameter scope only the name
/// is meaningful; the value comes from the argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderDecl {
    pub name: String,
    pub value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathDecl {
    pub name: Option<String>,
    pub encode: bool,
    pub style: Option<ValueStyle>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryDecl {
    pub name: Option<String>,
    pub style: Option<ValueStyle>,
}

/// One decoded metadata item.
///
/// The closed set of everything an interface, property, method or parameter can
/// declare. Decoding from literal attribute arguments happens once, during
/// analysis; nothing downstream looks at raw attributes again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Declaration {
    Request(RequestDecl),
    BasePath(String),
    Header(HeaderDecl),
    Path(PathDecl),
    Query(QueryDecl),
    RawQueryString,
    QueryMap { style: Option<ValueStyle> },
    Body(BodyEncoding),
    AllowAnyStatusCode(bool),
    Serialization(SerializationMethods),
    RequestProperty { key: Option<String> },
}

impl Declaration {
    /// Attribute name used in both declaration sources.
    pub fn kind(&self) -> &'static str {
        match self {
            Declaration::Request(_) => "request",
            Declaration::BasePath(_) => "base_path",
            Declaration::Header(_) => "header",
            Declaration::Path(_) => "path",
            Declaration::Query(_) => "query",
            Declaration::RawQueryString => "raw_query_string",
            Declaration::QueryMap { .. } => "query_map",
            Declaration::Body(_) => "body",
            Declaration::AllowAnyStatusCode(_) => "allow_any_status_code",
            Declaration::Serialization(_) => "serialization",
            Declaration::RequestProperty { .. } => "request_property",
        }
    }

    pub fn allowed_in(&self, scope: Scope) -> bool {
        use Scope::*;
        match self {
            Declaration::Request(_) => scope == Method,
            Declaration::BasePath(_) => scope == Type,
            Declaration::Header(_) => true,
            Declaration::Path(_) | Declaration::Query(_) | Declaration::RequestProperty { .. } => {
                matches!(scope, Property | Parameter)
            }
            Declaration::RawQueryString | Declaration::QueryMap { .. } | Declaration::Body(_) => {
                scope == Parameter
            }
            Declaration::AllowAnyStatusCode(_) | Declaration::Serialization(_) => {
                matches!(scope, Type | Method)
            }
        }
    }

    /// True for declarations that give a parameter or property its role.
    pub fn is_binding(&self) -> bool {
        matches!(
            self,
            Declaration::Header(_)
                | Declaration::Path(_)
                | Declaration::Query(_)
                | Declaration::RawQueryString
                | Declaration::QueryMap { .. }
                | Declaration::Body(_)
                | Declaration::RequestProperty { .. }
        )
    }
}

/// Back-reference from a decoded declaration to the literal it came from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SourceRef {
    /// Attribute name as written, e.g. `get` or `header`
    pub attribute: String,
    pub line: Option<usize>,
    pub column: Option<usize>,
}

impl SourceRef {
    pub fn new(attribute: impl Into<String>) -> Self {
        SourceRef {
            attribute: attribute.into(),
            line: None,
            column: None,
        }
    }

    pub fn at(mut self, line: usize, column: usize) -> Self {
        self.line = Some(line);
        self.column = Some(column);
        self
    }
}

/// A decoded declaration owned by the model element that collected it.
///
/// Equality ignores `source`: the two declaration sources locate literals
/// differently but must still produce equal models.
#[derive(Debug, Clone)]
pub struct AttributeModel<T> {
    pub value: T,
    pub scope: Scope,
    /// Interface the declaration was collected from
    pub declared_by: String,
    pub source: SourceRef,
}

impl<T> AttributeModel<T> {
    pub fn new(value: T, scope: Scope, declared_by: impl Into<String>, source: SourceRef) -> Self {
        AttributeModel {
            value,
            scope,
            declared_by: declared_by.into(),
            source,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> AttributeModel<U> {
        AttributeModel {
            value: f(self.value),
            scope: self.scope,
            declared_by: self.declared_by,
            source: self.source,
        }
    }
}

impl<T: PartialEq> PartialEq for AttributeModel<T> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
            && self.scope == other.scope
            && self.declared_by == other.declared_by
    }
}

impl<T: Eq> Eq for AttributeModel<T> {}
