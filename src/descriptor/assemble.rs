use super::args::{ArgValue, PropertyValues};
use super::template::{is_absolute, join, PathTemplate, TemplateError};
use super::{AssembleError, QueryPart, RequestBody, RequestDescriptor};
use crate::decl::{BodyEncoding, HeaderDecl, SerializationMethods, ValueStyle};
use crate::model::{
    MethodModel, ParameterRole, PropertyModel, PropertyRole, ResponseShape, TypeKind, TypeModel,
};
use http::header::{HeaderMap, HeaderName, HeaderValue};
use http::Method;
use serde_json::{Map, Value};
use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error("method `{0}` has no single request declaration")]
    NoRequest(String),
    #[error("invalid path template: {0}")]
    Template(#[from] TemplateError),
    #[error("invalid header `{name}`: {reason}")]
    Header { name: String, reason: String },
}

/// A static header operation: set when `value` is present, remove otherwise.
#[derive(Debug, Clone)]
struct HeaderOp {
    name: HeaderName,
    value: Option<HeaderValue>,
}

pub(crate) fn header_name(name: &str) -> Result<HeaderName, String> {
    HeaderName::from_bytes(name.as_bytes()).map_err(|e| e.to_string())
}

pub(crate) fn header_value(value: &str) -> Result<HeaderValue, String> {
    HeaderValue::from_str(value).map_err(|e| e.to_string())
}

fn static_op(decl: &HeaderDecl) -> Result<HeaderOp, CompileError> {
    let invalid = |reason| CompileError::Header {
        name: decl.name.clone(),
        reason,
    };
    Ok(HeaderOp {
        name: header_name(&decl.name).map_err(invalid)?,
        value: decl
            .value
            .as_deref()
            .map(header_value)
            .transpose()
            .map_err(invalid)?,
    })
}

/// Apply one header layer on top of `headers`.
fn apply_layer(headers: &mut HeaderMap, ops: impl IntoIterator<Item = HeaderOp>) {
    let mut touched: HashSet<HeaderName> = HashSet::new();
    for op in ops {
        let first = touched.insert(op.name.clone());
        match op.value {
            None => {
                headers.remove(&op.name);
            }
            Some(value) if first => {
                headers.insert(op.name, value);
            }
            Some(value) => {
                headers.append(op.name, value);
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyKind {
    Bytes,
    Text,
    UrlEncoded,
    Serialized,
}

/// Resolve the body encoding: parameter, then method, then type, then serialized.
pub(crate) fn resolve_encoding(
    declared: BodyEncoding,
    method: Option<&SerializationMethods>,
    ty: Option<&SerializationMethods>,
) -> BodyEncoding {
    match declared {
        BodyEncoding::Default => method
            .and_then(|m| m.body)
            .or_else(|| ty.and_then(|t| t.body))
            .filter(|e| *e != BodyEncoding::Default)
            .unwrap_or(BodyEncoding::Serialized),
        explicit => explicit,
    }
}

fn body_kind(declared: BodyEncoding, resolved: BodyEncoding, kind: TypeKind) -> BodyKind {
    match (kind, resolved) {
        (TypeKind::Bytes, _) => BodyKind::Bytes,
        (TypeKind::Text, _) if declared != BodyEncoding::Serialized => BodyKind::Text,
        (_, BodyEncoding::UrlEncoded) => BodyKind::UrlEncoded,
        _ => BodyKind::Serialized,
    }
}

#[derive(Debug, Clone)]
enum Slot {
    Query { name: String, style: ValueStyle },
    Path,
    Header { name: HeaderName },
    RawQuery,
    QueryMap { style: ValueStyle },
    Body(BodyKind),
    Cancellation,
    RequestProperty { key: String },
}

#[derive(Debug, Clone)]
struct ParamSlot {
    name: String,
    slot: Slot,
}

/// Placeholder binding, keyed by lowercased placeholder name.
#[derive(Debug, Clone)]
enum PathSource {
    Argument(usize),
    Property(String),
}

#[derive(Debug, Clone)]
struct PathBinding {
    key: String,
    source: PathSource,
    encode: bool,
    style: ValueStyle,
}

#[derive(Debug, Clone)]
enum PropertySlot {
    Header {
        name: HeaderName,
        default: Option<HeaderValue>,
    },
    Query {
        name: String,
        style: ValueStyle,
    },
    RequestProperty {
        key: String,
    },
}

#[derive(Debug, Clone)]
struct PropertyBinding {
    property: String,
    slot: PropertySlot,
}

/// Everything about one method that does not depend on argument values.
#[derive(Debug, Clone)]
pub struct RequestTemplate {
    method_name: String,
    declared_by: String,
    method: Method,
    path: PathTemplate,
    path_bindings: Vec<PathBinding>,
    type_headers: Vec<HeaderOp>,
    method_headers: Vec<HeaderOp>,
    properties: Vec<PropertyBinding>,
    params: Vec<ParamSlot>,
    response: ResponseShape,
    allow_any_status_code: bool,
}

fn style_or(declared: Option<ValueStyle>, fallback: ValueStyle) -> ValueStyle {
    declared.unwrap_or(fallback)
}

impl RequestTemplate {
    /// Bind-time work for one method of `ty`.
    pub fn compile(ty: &TypeModel, method: &MethodModel) -> Result<Self, CompileError> {
        let request = method
            .request()
            .ok_or_else(|| CompileError::NoRequest(method.name.clone()))?;

        let method_ser = method.serialization.as_ref().map(|s| &s.value);
        let type_ser = ty.serialization.as_ref().map(|s| &s.value);
        let query_style = method_ser
            .and_then(|s| s.query)
            .or_else(|| type_ser.and_then(|s| s.query))
            .unwrap_or_default();
        let path_style = method_ser
            .and_then(|s| s.path)
            .or_else(|| type_ser.and_then(|s| s.path))
            .unwrap_or_default();

        let raw_path = &request.value.path;
        let full_path = match &ty.base_path {
            Some(base) if !is_absolute(raw_path) => join(&base.value, raw_path),
            _ => raw_path.clone(),
        };
        let path = PathTemplate::parse(&full_path)?;

        let mut path_bindings = Vec::new();
        let mut params = Vec::with_capacity(method.parameters.len());
        for param in &method.parameters {
            let slot = match param.role() {
                ParameterRole::Query { name, style } => Slot::Query {
                    name,
                    style: style_or(style, query_style),
                },
                ParameterRole::Path {
                    name,
                    encode,
                    style,
                } => {
                    path_bindings.push(PathBinding {
                        key: name.to_lowercase(),
                        source: PathSource::Argument(param.index),
                        encode,
                        style: style_or(style, path_style),
                    });
                    Slot::Path
                }
                ParameterRole::Header { name } => Slot::Header {
                    name: header_name(&name).map_err(|reason| CompileError::Header {
                        name: name.clone(),
                        reason,
                    })?,
                },
                ParameterRole::RawQueryString => Slot::RawQuery,
                ParameterRole::QueryMap { style } => Slot::QueryMap {
                    style: style_or(style, query_style),
                },
                ParameterRole::Body(declared) => {
                    let resolved = resolve_encoding(declared, method_ser, type_ser);
                    Slot::Body(body_kind(declared, resolved, param.kind))
                }
                ParameterRole::Cancellation => Slot::Cancellation,
                ParameterRole::RequestProperty { key } => Slot::RequestProperty { key },
            };
            params.push(ParamSlot {
                name: param.name.clone(),
                slot,
            });
        }

        let mut properties = Vec::new();
        for property in &ty.properties {
            if let Some(binding) = Self::property_binding(property, path_style, query_style)? {
                match binding {
                    Bound::Path(b) => path_bindings.push(b),
                    Bound::Other(b) => properties.push(b),
                }
            }
        }

        let type_headers = ty
            .headers
            .iter()
            .map(|h| static_op(&h.value))
            .collect::<Result<Vec<_>, _>>()?;
        let method_headers = method
            .headers
            .iter()
            .map(|h| static_op(&h.value))
            .collect::<Result<Vec<_>, _>>()?;

        let allow_any_status_code = method
            .allow_any_status_code
            .as_ref()
            .map(|a| a.value)
            .or_else(|| ty.allow_any_status_for(&method.declared_by))
            .unwrap_or(false);

        Ok(RequestTemplate {
            method_name: method.name.clone(),
            declared_by: method.declared_by.clone(),
            method: request.value.method.clone(),
            path,
            path_bindings,
            type_headers,
            method_headers,
            properties,
            params,
            response: method.response.clone(),
            allow_any_status_code,
        })
    }

    fn property_binding(
        property: &PropertyModel,
        path_style: ValueStyle,
        query_style: ValueStyle,
    ) -> Result<Option<Bound>, CompileError> {
        let Some(role) = property.role() else {
            return Ok(None);
        };
        let slot = match role {
            PropertyRole::Path {
                name,
                encode,
                style,
            } => {
                return Ok(Some(Bound::Path(PathBinding {
                    key: name.to_lowercase(),
                    source: PathSource::Property(property.name.clone()),
                    encode,
                    style: style_or(style, path_style),
                })))
            }
            PropertyRole::Header { name, default } => {
                let invalid = |reason| CompileError::Header {
                    name: name.clone(),
                    reason,
                };
                PropertySlot::Header {
                    name: header_name(&name).map_err(invalid)?,
                    default: default
                        .as_deref()
                        .map(header_value)
                        .transpose()
                        .map_err(invalid)?,
                }
            }
            PropertyRole::Query { name, style } => PropertySlot::Query {
                name,
                style: style_or(style, query_style),
            },
            PropertyRole::RequestProperty { key } => PropertySlot::RequestProperty { key },
        };
        Ok(Some(Bound::Other(PropertyBinding {
            property: property.name.clone(),
            slot,
        })))
    }

    pub fn method_name(&self) -> &str {
        &self.method_name
    }

    /// Interface that declares the method; differs from the bound interface
    /// for inherited methods.
    pub fn declared_by(&self) -> &str {
        &self.declared_by
    }

    pub fn http_method(&self) -> &Method {
        &self.method
    }

    pub fn path_template(&self) -> &PathTemplate {
        &self.path
    }

    pub fn response(&self) -> &ResponseShape {
        &self.response
    }

    pub fn allow_any_status_code(&self) -> bool {
        self.allow_any_status_code
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }

    /// Build the descriptor for one call.
    pub fn assemble(
        &self,
        args: &[ArgValue],
        properties: &PropertyValues,
    ) -> Result<RequestDescriptor, AssembleError> {
        if args.len() != self.params.len() {
            return Err(AssembleError::ArgumentCount {
                operation: self.method_name.clone(),
                expected: self.params.len(),
                got: args.len(),
            });
        }

        let mut headers = HeaderMap::new();
        let mut query = Vec::new();
        let mut body = None;
        let mut cancellation = None;
        let mut bag = Map::new();

        apply_layer(&mut headers, self.type_headers.iter().cloned());

        let mut property_headers = Vec::new();
        for binding in &self.properties {
            let value = properties.get(&binding.property);
            match &binding.slot {
                PropertySlot::Header { name, default } => {
                    if value.is_null() {
                        if let Some(default) = default {
                            property_headers.push(HeaderOp {
                                name: name.clone(),
                                value: Some(default.clone()),
                            });
                        }
                        continue;
                    }
                    for text in scalar_texts(value, ValueStyle::ToString) {
                        property_headers.push(HeaderOp {
                            name: name.clone(),
                            value: Some(to_header_value(name, &text)?),
                        });
                    }
                }
                PropertySlot::Query { name, style } => {
                    push_pairs(&mut query, name, value, *style);
                }
                PropertySlot::RequestProperty { key } => {
                    if !value.is_null() {
                        bag.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        apply_layer(&mut headers, property_headers);
        apply_layer(&mut headers, self.method_headers.iter().cloned());

        let mut param_headers = Vec::new();
        for (slot, arg) in self.params.iter().zip(args) {
            match &slot.slot {
                Slot::Path => {}
                Slot::Cancellation => match arg {
                    ArgValue::Cancel(token) => cancellation = Some(token.clone()),
                    ArgValue::Null => {}
                    other => return Err(wrong_kind(slot, other, "a cancellation token")),
                },
                Slot::Header { name } => match value_of(slot, arg)? {
                    Value::Null => param_headers.push(HeaderOp {
                        name: name.clone(),
                        value: None,
                    }),
                    value => {
                        for text in scalar_texts(value, ValueStyle::ToString) {
                            param_headers.push(HeaderOp {
                                name: name.clone(),
                                value: Some(to_header_value(name, &text)?),
                            });
                        }
                    }
                },
                Slot::Query { name, style } => {
                    push_pairs(&mut query, name, value_of(slot, arg)?, *style);
                }
                Slot::RawQuery => match value_of(slot, arg)? {
                    Value::Null => {}
                    Value::String(raw) => {
                        if !raw.is_empty() {
                            query.push(QueryPart::Raw(raw.clone()));
                        }
                    }
                    _ => return Err(invalid(slot, "a raw query string must be a string")),
                },
                Slot::QueryMap { style } => match value_of(slot, arg)? {
                    Value::Null => {}
                    Value::Object(map) => {
                        for (key, value) in map {
                            push_pairs(&mut query, key, value, *style);
                        }
                    }
                    _ => return Err(invalid(slot, "a query map must be an object")),
                },
                Slot::Body(kind) => body = body_of(slot, *kind, arg)?,
                Slot::RequestProperty { key } => {
                    let value = value_of(slot, arg)?;
                    if !value.is_null() {
                        bag.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        apply_layer(&mut headers, param_headers);

        let path = self.render_path(args, properties)?;

        Ok(RequestDescriptor {
            operation: self.method_name.clone(),
            method: self.method.clone(),
            path,
            query,
            headers,
            body,
            cancellation,
            response: self.response.clone(),
            allow_any_status_code: self.allow_any_status_code,
            properties: bag,
        })
    }

    fn render_path(
        &self,
        args: &[ArgValue],
        properties: &PropertyValues,
    ) -> Result<String, AssembleError> {
        let mut failure = None;
        let rendered = self.path.render(|placeholder| {
            let key = placeholder.to_lowercase();
            // Arguments shadow properties of the same name
            let binding = self
                .path_bindings
                .iter()
                .filter(|b| b.key == key)
                .min_by_key(|b| matches!(b.source, PathSource::Property(_)))?;
            let value = match &binding.source {
                PathSource::Argument(index) => {
                    let slot = self.params.get(*index)?;
                    match args.get(*index).map(|arg| value_of(slot, arg)) {
                        Some(Ok(value)) => value,
                        Some(Err(e)) => {
                            if failure.is_none() {
                                failure = Some(e);
                            }
                            return Some(String::new());
                        }
                        None => return None,
                    }
                }
                PathSource::Property(name) => properties.get(name),
            };
            Some(path_text(value, binding.style, binding.encode))
        });
        match failure {
            Some(e) => Err(e),
            None => Ok(rendered),
        }
    }
}

enum Bound {
    Path(PathBinding),
    Other(PropertyBinding),
}

fn invalid(slot: &ParamSlot, reason: impl Into<String>) -> AssembleError {
    AssembleError::InvalidArgument {
        parameter: slot.name.clone(),
        reason: reason.into(),
    }
}

fn wrong_kind(slot: &ParamSlot, arg: &ArgValue, expected: &str) -> AssembleError {
    invalid(slot, format!("expected {expected}, got {}", arg.kind()))
}

static NULL: Value = Value::Null;

/// The JSON value of a non-bytes, non-cancellation argument.
fn value_of<'a>(slot: &ParamSlot, arg: &'a ArgValue) -> Result<&'a Value, AssembleError> {
    match arg {
        ArgValue::Null => Ok(&NULL),
        ArgValue::Value(value) => Ok(value),
        other => Err(wrong_kind(slot, other, "a value")),
    }
}

fn body_of(
    slot: &ParamSlot,
    kind: BodyKind,
    arg: &ArgValue,
) -> Result<Option<RequestBody>, AssembleError> {
    if arg.is_null() {
        return Ok(None);
    }
    let body = match (kind, arg) {
        (BodyKind::Bytes, ArgValue::Bytes(bytes)) => RequestBody::Bytes(bytes.clone()),
        (BodyKind::Bytes, ArgValue::Value(Value::String(s))) => {
            RequestBody::Bytes(bytes::Bytes::copy_from_slice(s.as_bytes()))
        }
        (BodyKind::Text, ArgValue::Value(Value::String(s))) => RequestBody::Text(s.clone()),
        (BodyKind::UrlEncoded, ArgValue::Value(Value::Object(map))) => {
            let mut pairs = Vec::new();
            for (key, value) in map {
                for text in scalar_texts(value, ValueStyle::ToString) {
                    pairs.push((key.clone(), text));
                }
            }
            RequestBody::UrlEncoded(pairs)
        }
        (BodyKind::UrlEncoded, ArgValue::Value(_)) => {
            return Err(invalid(slot, "a url-encoded body must be an object"))
        }
        (BodyKind::Serialized, ArgValue::Value(value)) => RequestBody::Serialized(value.clone()),
        (BodyKind::Bytes, other) => return Err(wrong_kind(slot, other, "bytes")),
        (BodyKind::Text, other) => return Err(wrong_kind(slot, other, "a string")),
        (_, other) => return Err(wrong_kind(slot, other, "a value")),
    };
    Ok(Some(body))
}

/// Text of a single scalar in the given style.
fn scalar_text(value: &Value, style: ValueStyle) -> String {
    match (style, value) {
        (ValueStyle::ToString, Value::String(s)) => s.clone(),
        (ValueStyle::ToString, Value::Null) => String::new(),
        _ => value.to_string(),
    }
}

/// One text per non-null element for sequences, one text for anything else,
/// none for null.
fn scalar_texts(value: &Value, style: ValueStyle) -> Vec<String> {
    match value {
        Value::Null => Vec::new(),
        Value::Array(items) if style == ValueStyle::ToString => items
            .iter()
            .filter(|v| !v.is_null())
            .map(|v| scalar_text(v, style))
            .collect(),
        other => vec![scalar_text(other, style)],
    }
}

fn push_pairs(query: &mut Vec<QueryPart>, name: &str, value: &Value, style: ValueStyle) {
    for text in scalar_texts(value, style) {
        query.push(QueryPart::Pair(name.to_string(), text));
    }
}

fn path_text(value: &Value, style: ValueStyle, encode: bool) -> String {
    let encode_one = |text: String| {
        if encode {
            urlencoding::encode(&text).into_owned()
        } else {
            text
        }
    };
    match value {
        Value::Null => String::new(),
        Value::Array(items) if style == ValueStyle::ToString => items
            .iter()
            .map(|v| encode_one(scalar_text(v, style)))
            .collect::<Vec<_>>()
            .join(","),
        other => encode_one(scalar_text(other, style)),
    }
}

fn to_header_value(name: &HeaderName, text: &str) -> Result<HeaderValue, AssembleError> {
    header_value(text).map_err(|reason| AssembleError::InvalidHeaderValue {
        name: name.as_str().to_string(),
        reason,
    })
}
