use crate::decl::{
    AttributeModel, BodyEncoding, Declaration, HeaderDecl, RequestDecl, SerializationMethods,
    ValueStyle,
};
use std::collections::{BTreeMap, HashSet};

/// Coarse classification of a declared value type.
///
/// Only the distinctions assembly and validation care about are kept: text and
/// bytes bodies are passed through verbatim, cancellation and requester handles
/// are recognized by type identity, everything else goes through the serializer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TypeKind {
    Text,
    Bytes,
    Cancellation,
    Requester,
    #[default]
    Value,
}

/// How a method takes `self`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Receiver {
    #[default]
    Ref,
    RefMut,
    /// `self` by value; a disposal method consumes the client
    Owned,
    /// No receiver at all
    Static,
}

/// Expected response shape, derived from the declared return type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseShape {
    Void,
    Text,
    Raw,
    Deserialize { ty: String },
    WithResponse { ty: String },
}

impl ResponseShape {
    pub fn type_name(&self) -> Option<&str> {
        match self {
            ResponseShape::Deserialize { ty } | ResponseShape::WithResponse { ty } => Some(ty),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssociatedKind {
    Type,
    Const,
}

/// Associated type or const on the interface. A generated client cannot
/// implement these, so their presence is a type-level error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssociatedItemModel {
    pub name: String,
    pub kind: AssociatedKind,
}

/// The single role a parameter plays in request assembly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParameterRole {
    Query {
        name: String,
        style: Option<ValueStyle>,
    },
    Path {
        name: String,
        encode: bool,
        style: Option<ValueStyle>,
    },
    Header {
        name: String,
    },
    RawQueryString,
    QueryMap {
        style: Option<ValueStyle>,
    },
    Body(BodyEncoding),
    Cancellation,
    RequestProperty {
        key: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterModel {
    pub name: String,
    pub index: usize,
    pub bindings: Vec<AttributeModel<Declaration>>,
    pub kind: TypeKind,
    /// Declared as `&mut T`
    pub is_by_ref: bool,
    pub is_cancellation: bool,
}

impl ParameterModel {
    /// Role derived from the first binding, or a query parameter named after
    /// the parameter when it has none.
    pub fn role(&self) -> ParameterRole {
        if self.is_cancellation {
            return ParameterRole::Cancellation;
        }
        let Some(binding) = self.bindings.first() else {
            return ParameterRole::Query {
                name: self.name.clone(),
                style: None,
            };
        };
        match &binding.value {
            Declaration::Path(p) => ParameterRole::Path {
                name: p.name.clone().unwrap_or_else(|| self.name.clone()),
                encode: p.encode,
                style: p.style,
            },
            Declaration::Query(q) => ParameterRole::Query {
                name: q.name.clone().unwrap_or_else(|| self.name.clone()),
                style: q.style,
            },
            Declaration::Header(h) => ParameterRole::Header {
                name: h.name.clone(),
            },
            Declaration::RawQueryString => ParameterRole::RawQueryString,
            Declaration::QueryMap { style } => ParameterRole::QueryMap { style: *style },
            Declaration::Body(encoding) => ParameterRole::Body(*encoding),
            Declaration::RequestProperty { key } => ParameterRole::RequestProperty {
                key: key.clone().unwrap_or_else(|| self.name.clone()),
            },
            // Non-binding declarations never reach `bindings`
            _ => ParameterRole::Query {
                name: self.name.clone(),
                style: None,
            },
        }
    }
}

/// The role of a bound property. Unbound properties have none.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyRole {
    Header {
        name: String,
        default: Option<String>,
    },
    Path {
        name: String,
        encode: bool,
        style: Option<ValueStyle>,
    },
    Query {
        name: String,
        style: Option<ValueStyle>,
    },
    RequestProperty {
        key: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyModel {
    pub name: String,
    pub bindings: Vec<AttributeModel<Declaration>>,
    pub kind: TypeKind,
    pub is_requester: bool,
    pub has_getter: bool,
    pub has_setter: bool,
}

impl PropertyModel {
    pub fn role(&self) -> Option<PropertyRole> {
        let binding = self.bindings.first()?;
        let role = match &binding.value {
            Declaration::Header(h) => PropertyRole::Header {
                name: h.name.clone(),
                default: h.value.clone(),
            },
            Declaration::Path(p) => PropertyRole::Path {
                name: p.name.clone().unwrap_or_else(|| self.name.clone()),
                encode: p.encode,
                style: p.style,
            },
            Declaration::Query(q) => PropertyRole::Query {
                name: q.name.clone().unwrap_or_else(|| self.name.clone()),
                style: q.style,
            },
            Declaration::RequestProperty { key } => PropertyRole::RequestProperty {
                key: key.clone().unwrap_or_else(|| self.name.clone()),
            },
            _ => return None,
        };
        Some(role)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodModel {
    pub name: String,
    /// Interface the method is declared on
    pub declared_by: String,
    pub requests: Vec<AttributeModel<RequestDecl>>,
    pub allow_any_status_code: Option<AttributeModel<bool>>,
    pub serialization: Option<AttributeModel<SerializationMethods>>,
    pub headers: Vec<AttributeModel<HeaderDecl>>,
    pub parameters: Vec<ParameterModel>,
    pub response: ResponseShape,
    pub receiver: Receiver,
    pub is_disposal: bool,
}

impl MethodModel {
    /// The request declaration, when there is exactly one.
    pub fn request(&self) -> Option<&AttributeModel<RequestDecl>> {
        match self.requests.as_slice() {
            [only] => Some(only),
            _ => None,
        }
    }
}

/// Normalized, backend-independent description of one interface.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TypeModel {
    pub name: String,
    pub accessible: bool,
    /// Every interface visited, self first
    pub interfaces: Vec<String>,
    /// Direct parents of each visited interface
    pub extends: BTreeMap<String, Vec<String>>,
    pub base_path: Option<AttributeModel<String>>,
    pub headers: Vec<AttributeModel<HeaderDecl>>,
    pub allow_any_status_code: Vec<AttributeModel<bool>>,
    pub serialization: Option<AttributeModel<SerializationMethods>>,
    pub properties: Vec<PropertyModel>,
    pub methods: Vec<MethodModel>,
    pub associated_items: Vec<AssociatedItemModel>,
}

impl TypeModel {
    pub fn method(&self, name: &str) -> Option<&MethodModel> {
        self.methods.iter().find(|m| m.name == name)
    }

    pub fn property(&self, name: &str) -> Option<&PropertyModel> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// `interface` and every interface it extends, transitively.
    pub fn lineage<'a>(&'a self, interface: &'a str) -> HashSet<&'a str> {
        let mut seen = HashSet::new();
        let mut pending = vec![interface];
        while let Some(name) = pending.pop() {
            if !seen.insert(name) {
                continue;
            }
            if let Some(parents) = self.extends.get(name) {
                pending.extend(parents.iter().map(String::as_str));
            }
        }
        seen
    }

    /// The type-level any-status default for a member of `interface`: the
    /// first declaration in traversal order made by that interface or one it
    /// extends.
    pub fn allow_any_status_for(&self, interface: &str) -> Option<bool> {
        let lineage = self.lineage(interface);
        self.allow_any_status_code
            .iter()
            .find(|a| lineage.contains(a.declared_by.as_str()))
            .map(|a| a.value)
    }
}
