//! Runtime declaration backend.
//!
//! Interfaces are described with builder values and analyzed when the process
//! first asks for their model. The proc-macro lowers annotated traits into
//! exactly these builders, so generated clients go through this backend.
//!
//! ```rust
//! use brrtclient::analyzer::{Attr, InterfaceDecl, MethodDecl, ParamDecl};
//! use brrtclient::model::ResponseShape;
//!
//! let api = InterfaceDecl::new("UsersApi")
//!     .attr(Attr::new("base_path").arg("api/v1"))
//!     .method(
//!         MethodDecl::new("get_user")
//!             .attr(Attr::new("get").arg("users/{id}"))
//!             .param(ParamDecl::new("id").attr(Attr::new("path")))
//!             .returns(ResponseShape::Deserialize { ty: "User".into() }),
//!     );
//! let (model, diagnostics) = brrtclient::analyzer::analyze(&&api);
//! assert!(diagnostics.is_empty());
//! assert_eq!(model.methods.len(), 1);
//! ```

use super::{DeclarationSource, RawAssociated, RawMember, RawMethod, RawParam, RawProperty};
use crate::decl::{self, RawArg, RawAttribute, SourceRef};
use crate::model::{AssociatedKind, Receiver, ResponseShape, TypeKind};

/// A runtime attribute argument.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Str(String),
    Bool(bool),
    Int(i64),
    /// A bare selector such as `url_encoded`
    Ident(String),
}

impl decl::Literal for Literal {
    fn as_str(&self) -> Option<String> {
        match self {
            Literal::Str(s) => Some(s.clone()),
            _ => None,
        }
    }

    fn as_bool(&self) -> Option<bool> {
        match self {
            Literal::Bool(b) => Some(*b),
            _ => None,
        }
    }

    fn as_ident(&self) -> Option<String> {
        match self {
            Literal::Ident(s) => Some(s.clone()),
            _ => None,
        }
    }

    fn describe(&self) -> String {
        match self {
            Literal::Str(s) => format!("string {s:?}"),
            Literal::Bool(b) => format!("bool `{b}`"),
            Literal::Int(i) => format!("integer `{i}`"),
            Literal::Ident(s) => format!("identifier `{s}`"),
        }
    }
}

impl From<&str> for Literal {
    fn from(s: &str) -> Self {
        Literal::Str(s.to_string())
    }
}

impl From<String> for Literal {
    fn from(s: String) -> Self {
        Literal::Str(s)
    }
}

impl From<bool> for Literal {
    fn from(b: bool) -> Self {
        Literal::Bool(b)
    }
}

impl From<i64> for Literal {
    fn from(i: i64) -> Self {
        Literal::Int(i)
    }
}

/// One attribute: a vocabulary name plus literal arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct Attr {
    pub name: String,
    pub args: Vec<RawArg<Literal>>,
}

impl Attr {
    pub fn new(name: impl Into<String>) -> Self {
        Attr {
            name: name.into(),
            args: Vec::new(),
        }
    }

    /// Positional argument
    pub fn arg(mut self, value: impl Into<Literal>) -> Self {
        self.args.push(RawArg {
            name: None,
            value: value.into(),
        });
        self
    }

    /// Positional bare identifier
    pub fn ident(mut self, ident: impl Into<String>) -> Self {
        self.args.push(RawArg {
            name: None,
            value: Literal::Ident(ident.into()),
        });
        self
    }

    /// `key = value` argument
    pub fn named(mut self, key: impl Into<String>, value: impl Into<Literal>) -> Self {
        self.args.push(RawArg {
            name: Some(key.into()),
            value: value.into(),
        });
        self
    }

    /// `key = ident` argument
    pub fn named_ident(mut self, key: impl Into<String>, ident: impl Into<String>) -> Self {
        self.args.push(RawArg {
            name: Some(key.into()),
            value: Literal::Ident(ident.into()),
        });
        self
    }

    fn raw(&self) -> RawAttribute<Literal> {
        RawAttribute {
            name: self.name.clone(),
            args: self.args.clone(),
            source: SourceRef::new(&self.name),
        }
    }
}

fn raw_all(attrs: &[Attr]) -> Vec<RawAttribute<Literal>> {
    attrs.iter().map(Attr::raw).collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParamDecl {
    pub name: String,
    pub attributes: Vec<Attr>,
    pub kind: TypeKind,
    pub by_ref: bool,
}

impl ParamDecl {
    pub fn new(name: impl Into<String>) -> Self {
        ParamDecl {
            name: name.into(),
            attributes: Vec::new(),
            kind: TypeKind::Value,
            by_ref: false,
        }
    }

    pub fn attr(mut self, attr: Attr) -> Self {
        self.attributes.push(attr);
        self
    }

    pub fn kind(mut self, kind: TypeKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn by_ref(mut self) -> Self {
        self.by_ref = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodDecl {
    pub name: String,
    pub attributes: Vec<Attr>,
    pub receiver: Receiver,
    pub params: Vec<ParamDecl>,
    pub returns: ResponseShape,
    pub provided: bool,
}

impl MethodDecl {
    pub fn new(name: impl Into<String>) -> Self {
        MethodDecl {
            name: name.into(),
            attributes: Vec::new(),
            receiver: Receiver::Ref,
            params: Vec::new(),
            returns: ResponseShape::Void,
            provided: false,
        }
    }

    pub fn attr(mut self, attr: Attr) -> Self {
        self.attributes.push(attr);
        self
    }

    pub fn param(mut self, param: ParamDecl) -> Self {
        self.params.push(param);
        self
    }

    pub fn returns(mut self, shape: ResponseShape) -> Self {
        self.returns = shape;
        self
    }

    pub fn receiver(mut self, receiver: Receiver) -> Self {
        self.receiver = receiver;
        self
    }

    /// Mark as having a default body
    pub fn provided(mut self) -> Self {
        self.provided = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PropertyDecl {
    pub name: String,
    pub attributes: Vec<Attr>,
    pub kind: TypeKind,
    pub getter: bool,
    pub setter: bool,
}

impl PropertyDecl {
    /// A property with both accessors
    pub fn new(name: impl Into<String>) -> Self {
        PropertyDecl {
            name: name.into(),
            attributes: Vec::new(),
            kind: TypeKind::Value,
            getter: true,
            setter: true,
        }
    }

    pub fn attr(mut self, attr: Attr) -> Self {
        self.attributes.push(attr);
        self
    }

    pub fn kind(mut self, kind: TypeKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn read_only(mut self) -> Self {
        self.setter = false;
        self
    }

    pub fn write_only(mut self) -> Self {
        self.getter = false;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MemberDecl {
    Method(MethodDecl),
    Property(PropertyDecl),
    Associated { name: String, kind: AssociatedKind },
}

/// A declared interface.
#[derive(Debug, Clone, PartialEq)]
pub struct InterfaceDecl {
    pub name: String,
    pub accessible: bool,
    pub attributes: Vec<Attr>,
    pub extends: Vec<InterfaceDecl>,
    pub members: Vec<MemberDecl>,
}

impl InterfaceDecl {
    pub fn new(name: impl Into<String>) -> Self {
        InterfaceDecl {
            name: name.into(),
            accessible: true,
            attributes: Vec::new(),
            extends: Vec::new(),
            members: Vec::new(),
        }
    }

    /// Not visible to the binding layer
    pub fn private(mut self) -> Self {
        self.accessible = false;
        self
    }

    pub fn attr(mut self, attr: Attr) -> Self {
        self.attributes.push(attr);
        self
    }

    pub fn extends(mut self, parent: InterfaceDecl) -> Self {
        self.extends.push(parent);
        self
    }

    pub fn method(mut self, method: MethodDecl) -> Self {
        self.members.push(MemberDecl::Method(method));
        self
    }

    pub fn property(mut self, property: PropertyDecl) -> Self {
        self.members.push(MemberDecl::Property(property));
        self
    }

    pub fn associated(mut self, name: impl Into<String>, kind: AssociatedKind) -> Self {
        self.members.push(MemberDecl::Associated {
            name: name.into(),
            kind,
        });
        self
    }
}

impl<'a> DeclarationSource for &'a InterfaceDecl {
    type Literal = Literal;

    fn name(&self) -> String {
        self.name.clone()
    }

    fn is_accessible(&self) -> bool {
        self.accessible
    }

    fn attributes(&self) -> Vec<RawAttribute<Literal>> {
        raw_all(&self.attributes)
    }

    fn inherited(&self) -> Vec<Self> {
        let this: &'a InterfaceDecl = self;
        this.extends.iter().collect()
    }

    fn members(&self) -> Vec<RawMember<Literal>> {
        self.members
            .iter()
            .map(|member| match member {
                MemberDecl::Method(m) => RawMember::Method(RawMethod {
                    name: m.name.clone(),
                    attributes: raw_all(&m.attributes),
                    receiver: m.receiver,
                    params: m
                        .params
                        .iter()
                        .map(|p| RawParam {
                            name: p.name.clone(),
                            attributes: raw_all(&p.attributes),
                            kind: p.kind,
                            by_ref: p.by_ref,
                        })
                        .collect(),
                    returns: m.returns.clone(),
                    provided: m.provided,
                    source: SourceRef::new(&m.name),
                }),
                MemberDecl::Property(p) => RawMember::Property(RawProperty {
                    name: p.name.clone(),
                    attributes: raw_all(&p.attributes),
                    kind: p.kind,
                    getter: p.getter,
                    setter: p.setter,
                    source: SourceRef::new(&p.name),
                }),
                MemberDecl::Associated { name, kind } => RawMember::Associated(RawAssociated {
                    name: name.clone(),
                    kind: *kind,
                    source: SourceRef::new(name),
                }),
            })
            .collect()
    }
}
