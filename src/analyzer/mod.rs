//! # Declaration Analyzer
//!
//! Walks an interface definition and everything it inherits into a normalized
//! [`TypeModel`].
//!
//! ## Backends
//!
//! The walk is written once against [`DeclarationSource`], a small capability
//! set: name, accessibility, attributes, inherited interfaces and members.
//! Two implementations exist:
//!
//! - [`runtime`]: builder values ([`InterfaceDecl`]) assembled in code, holding
//!   runtime [`runtime::Literal`] arguments
//! - [`source`]: traits parsed from Rust source with `syn`, whose attribute
//!   arguments are constant expressions
//!
//! Both must produce equal models for equivalent declarations; the shared
//! decoding in [`crate::decl`] and the shared walk below are what make that hold.
//!
//! ## Traversal order
//!
//! Self first, then a depth-first pre-order walk of inherited interfaces in
//! declared order. An interface reached twice is visited once, at its first
//! position, which also cuts cycles.

pub mod runtime;
pub mod source;

pub use runtime::{Attr, InterfaceDecl, MethodDecl, ParamDecl, PropertyDecl};
pub use source::{SourceGraph, SourceInterface};

use crate::decl::{
    decode, is_declaration, AttributeModel, Declaration, Literal, RawAttribute, Scope, SourceRef,
};
use crate::model::{
    AssociatedItemModel, AssociatedKind, MethodModel, ParameterModel, PropertyModel, Receiver,
    ResponseShape, TypeKind, TypeModel,
};
use crate::validator::{codes, DeclLocation, Diagnostic};
use std::collections::HashSet;
use tracing::debug;

/// Symbol capabilities the analyzer needs from a declaration backend.
pub trait DeclarationSource: Clone {
    type Literal: Literal;

    fn name(&self) -> String;
    fn is_accessible(&self) -> bool;
    /// Type-scoped attributes, in declaration order
    fn attributes(&self) -> Vec<RawAttribute<Self::Literal>>;
    /// Directly inherited interfaces, in declaration order
    fn inherited(&self) -> Vec<Self>;
    fn members(&self) -> Vec<RawMember<Self::Literal>>;
}

#[derive(Debug, Clone)]
pub struct RawParam<L> {
    pub name: String,
    pub attributes: Vec<RawAttribute<L>>,
    pub kind: TypeKind,
    pub by_ref: bool,
}

#[derive(Debug, Clone)]
pub struct RawMethod<L> {
    pub name: String,
    pub attributes: Vec<RawAttribute<L>>,
    pub receiver: Receiver,
    pub params: Vec<RawParam<L>>,
    pub returns: ResponseShape,
    /// Has a default body; not part of the generated surface
    pub provided: bool,
    pub source: SourceRef,
}

#[derive(Debug, Clone)]
pub struct RawProperty<L> {
    pub name: String,
    pub attributes: Vec<RawAttribute<L>>,
    pub kind: TypeKind,
    pub getter: bool,
    pub setter: bool,
    pub source: SourceRef,
}

#[derive(Debug, Clone)]
pub struct RawAssociated {
    pub name: String,
    pub kind: AssociatedKind,
    pub source: SourceRef,
}

#[derive(Debug, Clone)]
pub enum RawMember<L> {
    Method(RawMethod<L>),
    Property(RawProperty<L>),
    Associated(RawAssociated),
}

impl<L> RawMember<L> {
    pub fn name(&self) -> &str {
        match self {
            RawMember::Method(m) => &m.name,
            RawMember::Property(p) => &p.name,
            RawMember::Associated(a) => &a.name,
        }
    }
}

/// Interfaces in traversal order, `root` first.
pub fn traverse<S: DeclarationSource>(root: &S) -> Vec<S> {
    fn visit<S: DeclarationSource>(node: S, seen: &mut HashSet<String>, order: &mut Vec<S>) {
        if !seen.insert(node.name()) {
            return;
        }
        let parents = node.inherited();
        order.push(node);
        for parent in parents {
            visit(parent, seen, order);
        }
    }

    let mut seen = HashSet::new();
    let mut order = Vec::new();
    visit(root.clone(), &mut seen, &mut order);
    order
}

struct Analysis {
    interface: String,
    diagnostics: Vec<Diagnostic>,
}

impl Analysis {
    fn location(&self) -> DeclLocation {
        DeclLocation::interface(&self.interface)
    }

    /// Decode one attribute for `scope`, reporting anything that does not fit.
    fn decode<L: Literal>(
        &mut self,
        raw: &RawAttribute<L>,
        scope: Scope,
        location: DeclLocation,
    ) -> Option<Declaration> {
        let location = location.at(raw.source.line, raw.source.column);
        if !is_declaration(&raw.name) {
            self.diagnostics.push(
                Diagnostic::warning(
                    codes::UNKNOWN_DECLARATION,
                    location,
                    format!("`{}` is not a known declaration and is ignored", raw.name),
                )
                .with_suggestion("Check the attribute name for typos"),
            );
            return None;
        }
        let decl = match decode(raw) {
            Ok(decl) => decl,
            Err(e) => {
                self.diagnostics.push(Diagnostic::error(
                    codes::MALFORMED_DECLARATION,
                    location,
                    e.to_string(),
                ));
                return None;
            }
        };
        if !decl.allowed_in(scope) {
            self.diagnostics.push(Diagnostic::error(
                codes::MISPLACED_DECLARATION,
                location,
                format!("`{}` is not allowed at {} scope", decl.kind(), scope),
            ));
            return None;
        }
        Some(decl)
    }

    fn redundant(&mut self, location: DeclLocation, source: &SourceRef, kind: &str) {
        self.diagnostics.push(
            Diagnostic::warning(
                codes::REDUNDANT_DECLARATION,
                location.at(source.line, source.column),
                format!("`{kind}` is already declared with higher priority; this one is ignored"),
            )
            .with_suggestion(format!("Remove the extra `{kind}`")),
        );
    }

    fn collect_type_scope<S: DeclarationSource>(&mut self, iface: &S, model: &mut TypeModel) {
        let declared_by = iface.name();
        let location = DeclLocation::interface(&declared_by);
        for raw in iface.attributes() {
            let Some(decl) = self.decode(&raw, Scope::Type, location.clone()) else {
                continue;
            };
            let kind = decl.kind();
            let source = &raw.source;
            match decl {
                Declaration::Header(h) => model.headers.push(type_scoped(h, &declared_by, source)),
                Declaration::AllowAnyStatusCode(allow) => {
                    model.allow_any_status_code.push(type_scoped(allow, &declared_by, source))
                }
                Declaration::BasePath(path) => {
                    if model.base_path.is_some() {
                        self.redundant(location.clone(), &raw.source, kind);
                    } else {
                        model.base_path = Some(type_scoped(path, &declared_by, source));
                    }
                }
                Declaration::Serialization(methods) => {
                    if model.serialization.is_some() {
                        self.redundant(location.clone(), &raw.source, kind);
                    } else {
                        model.serialization = Some(type_scoped(methods, &declared_by, source));
                    }
                }
                _ => {}
            }
        }
    }

    fn property<L: Literal>(&mut self, raw: RawProperty<L>) -> PropertyModel {
        let location = self.location().property(&raw.name);
        let mut bindings = Vec::new();
        for attr in &raw.attributes {
            if let Some(decl) = self.decode(attr, Scope::Property, location.clone()) {
                bindings.push(AttributeModel::new(
                    decl,
                    Scope::Property,
                    &self.interface,
                    attr.source.clone(),
                ));
            }
        }
        PropertyModel {
            name: raw.name,
            bindings,
            kind: raw.kind,
            is_requester: raw.kind == TypeKind::Requester,
            has_getter: raw.getter,
            has_setter: raw.setter,
        }
    }

    fn method<L: Literal>(&mut self, raw: RawMethod<L>) -> MethodModel {
        let location = self.location().member(&raw.name);
        let mut model = MethodModel {
            name: raw.name.clone(),
            declared_by: self.interface.clone(),
            requests: Vec::new(),
            allow_any_status_code: None,
            serialization: None,
            headers: Vec::new(),
            parameters: Vec::with_capacity(raw.params.len()),
            response: raw.returns.clone(),
            receiver: raw.receiver,
            is_disposal: false,
        };

        for attr in &raw.attributes {
            let Some(decl) = self.decode(attr, Scope::Method, location.clone()) else {
                continue;
            };
            let kind = decl.kind();
            let source = attr.source.clone();
            match decl {
                Declaration::Request(r) => model.requests.push(AttributeModel::new(
                    r,
                    Scope::Method,
                    &self.interface,
                    source,
                )),
                Declaration::Header(h) => model.headers.push(AttributeModel::new(
                    h,
                    Scope::Method,
                    &self.interface,
                    source,
                )),
                Declaration::AllowAnyStatusCode(allow) => {
                    if model.allow_any_status_code.is_some() {
                        self.redundant(location.clone(), &source, kind);
                    } else {
                        model.allow_any_status_code = Some(AttributeModel::new(
                            allow,
                            Scope::Method,
                            &self.interface,
                            source,
                        ));
                    }
                }
                Declaration::Serialization(methods) => {
                    if model.serialization.is_some() {
                        self.redundant(location.clone(), &source, kind);
                    } else {
                        model.serialization = Some(AttributeModel::new(
                            methods,
                            Scope::Method,
                            &self.interface,
                            source,
                        ));
                    }
                }
                _ => {}
            }
        }

        for (index, param) in raw.params.into_iter().enumerate() {
            let param_location = location.clone().parameter(&param.name);
            let mut bindings = Vec::new();
            for attr in &param.attributes {
                if let Some(decl) = self.decode(attr, Scope::Parameter, param_location.clone()) {
                    bindings.push(AttributeModel::new(
                        decl,
                        Scope::Parameter,
                        &self.interface,
                        attr.source.clone(),
                    ));
                }
            }
            model.parameters.push(ParameterModel {
                name: param.name,
                index,
                bindings,
                kind: param.kind,
                is_by_ref: param.by_ref,
                is_cancellation: param.kind == TypeKind::Cancellation,
            });
        }

        model.is_disposal = model.requests.is_empty()
            && model.receiver == Receiver::Owned
            && model.parameters.is_empty()
            && model.response == ResponseShape::Void;
        model
    }
}

fn type_scoped<T>(value: T, declared_by: &str, source: &SourceRef) -> AttributeModel<T> {
    AttributeModel::new(value, Scope::Type, declared_by, source.clone())
}

/// Analyze `source` and everything it inherits.
///
/// Members of inherited interfaces are part of the model, so a client bound to
/// `source` assembles them with its own type-level declarations.
///
/// Never fails: problems are reported as diagnostics and the offending
/// declaration is skipped. Use [`crate::validator::validate`] to decide whether
/// the result can be bound.
pub fn analyze<S: DeclarationSource>(source: &S) -> (TypeModel, Vec<Diagnostic>) {
    let name = source.name();
    let mut cx = Analysis {
        interface: name.clone(),
        diagnostics: Vec::new(),
    };
    let mut model = TypeModel {
        name,
        accessible: source.is_accessible(),
        ..Default::default()
    };

    let order = traverse(source);
    for iface in &order {
        let name = iface.name();
        let parents = iface.inherited().iter().map(DeclarationSource::name).collect();
        model.interfaces.push(name.clone());
        model.extends.insert(name, parents);
        cx.collect_type_scope(iface, &mut model);
    }

    // Inherited members join the model after the bound interface's own; a
    // member already declared closer to the root shadows same-named ones.
    let mut declared: HashSet<String> = HashSet::new();
    for iface in &order {
        cx.interface = iface.name();
        let members = iface.members();
        let names: Vec<String> = members.iter().map(|m| m.name().to_string()).collect();
        for member in members {
            if declared.contains(member.name()) {
                debug!(
                    interface = %cx.interface,
                    member = %member.name(),
                    "Skipping shadowed inherited member"
                );
                continue;
            }
            match member {
                RawMember::Associated(item) => model.associated_items.push(AssociatedItemModel {
                    name: item.name,
                    kind: item.kind,
                }),
                RawMember::Property(property) => {
                    let property = cx.property(property);
                    model.properties.push(property);
                }
                RawMember::Method(method) if method.provided => {
                    debug!(
                        interface = %cx.interface,
                        method = %method.name,
                        "Skipping provided method"
                    );
                }
                RawMember::Method(method) => {
                    let method = cx.method(method);
                    model.methods.push(method);
                }
            }
        }
        declared.extend(names);
    }

    debug!(
        interface = %model.name,
        interfaces = model.interfaces.len(),
        methods = model.methods.len(),
        properties = model.properties.len(),
        diagnostics = cx.diagnostics.len(),
        "Analyzed interface"
    );

    (model, cx.diagnostics)
}
