//! Source declaration backend.
//!
//! Reads traits straight from Rust syntax trees, before anything is compiled.
//! Used by the proc-macro (one trait at a time) and by the lint CLI (whole
//! files). Attribute arguments must be constant expressions: string, bool and
//! integer literals, or bare identifiers for selectors.
//!
//! A trait method marked `#[property]` is a property accessor rather than a
//! request method: `fn token(&self) -> T` is the getter and
//! `fn set_token(&mut self, value: T)` the setter, merged by name.

use super::{DeclarationSource, RawAssociated, RawMember, RawMethod, RawParam, RawProperty};
use crate::decl::{is_declaration, Literal, RawArg, RawAttribute, SourceRef};
use crate::model::{AssociatedKind, Receiver, ResponseShape, TypeKind};
use proc_macro2::Span;
use quote::ToTokens;
use syn::punctuated::Punctuated;
use syn::spanned::Spanned;
use syn::{
    Attribute, Expr, FnArg, GenericArgument, Item, ItemTrait, Lit, Meta, Pat, PathArguments,
    ReturnType, Token, TraitItem, TraitItemFn, Type, TypeParamBound, Visibility,
};

/// Marker attribute for property accessors.
pub const PROPERTY_MARKER: &str = "property";

/// A constant expression used as an attribute argument.
#[derive(Debug, Clone, PartialEq)]
pub struct ExprLiteral(pub Expr);

impl Literal for ExprLiteral {
    fn as_str(&self) -> Option<String> {
        match &self.0 {
            Expr::Lit(lit) => match &lit.lit {
                Lit::Str(s) => Some(s.value()),
                _ => None,
            },
            Expr::Group(group) => ExprLiteral((*group.expr).clone()).as_str(),
            _ => None,
        }
    }

    fn as_bool(&self) -> Option<bool> {
        match &self.0 {
            Expr::Lit(lit) => match &lit.lit {
                Lit::Bool(b) => Some(b.value),
                _ => None,
            },
            _ => None,
        }
    }

    fn as_ident(&self) -> Option<String> {
        match &self.0 {
            Expr::Path(path) if path.qself.is_none() => {
                path.path.get_ident().map(|ident| ident.to_string())
            }
            _ => None,
        }
    }

    fn describe(&self) -> String {
        format!("`{}`", self.0.to_token_stream())
    }
}

fn source_ref(name: &str, span: Span) -> SourceRef {
    let start = span.start();
    if start.line == 0 {
        SourceRef::new(name)
    } else {
        SourceRef::new(name).at(start.line, start.column + 1)
    }
}

fn attribute_name(attr: &Attribute) -> Option<String> {
    attr.path()
        .segments
        .last()
        .map(|segment| segment.ident.to_string())
}

/// Whether the attribute belongs to the declaration vocabulary or is the
/// property marker. The macro strips exactly these.
pub fn is_vocabulary_attribute(attr: &Attribute) -> bool {
    attribute_name(attr)
        .map(|name| is_declaration(&name) || name == PROPERTY_MARKER)
        .unwrap_or(false)
}

fn has_property_marker(attrs: &[Attribute]) -> bool {
    attrs
        .iter()
        .any(|a| attribute_name(a).as_deref() == Some(PROPERTY_MARKER))
}

/// Lower one attribute into its raw form.
///
/// Argument lists that do not parse as expressions become a single verbatim
/// argument, which decoding then reports as malformed.
fn raw_attribute(attr: &Attribute) -> Option<RawAttribute<ExprLiteral>> {
    let name = attribute_name(attr)?;
    if !is_declaration(&name) {
        return None;
    }
    let source = source_ref(&name, attr.span());
    let args = match &attr.meta {
        Meta::Path(_) => Vec::new(),
        Meta::NameValue(nv) => vec![RawArg {
            name: None,
            value: ExprLiteral(nv.value.clone()),
        }],
        Meta::List(list) => {
            match list.parse_args_with(Punctuated::<Expr, Token![,]>::parse_terminated) {
                Ok(exprs) => exprs.into_iter().map(raw_arg).collect(),
                Err(_) => vec![RawArg {
                    name: None,
                    value: ExprLiteral(Expr::Verbatim(list.tokens.clone())),
                }],
            }
        }
    };
    Some(RawAttribute { name, args, source })
}

fn raw_arg(expr: Expr) -> RawArg<ExprLiteral> {
    if let Expr::Assign(assign) = &expr {
        if let Expr::Path(left) = &*assign.left {
            if let Some(ident) = left.path.get_ident() {
                return RawArg {
                    name: Some(ident.to_string()),
                    value: ExprLiteral((*assign.right).clone()),
                };
            }
        }
    }
    RawArg {
        name: None,
        value: ExprLiteral(expr),
    }
}

fn raw_attributes(attrs: &[Attribute]) -> Vec<RawAttribute<ExprLiteral>> {
    attrs.iter().filter_map(raw_attribute).collect()
}

fn compact(tokens: impl ToTokens) -> String {
    tokens
        .to_token_stream()
        .to_string()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect()
}

fn last_segment(ty: &Type) -> Option<&syn::PathSegment> {
    match ty {
        Type::Path(path) => path.path.segments.last(),
        Type::Group(group) => last_segment(&group.elem),
        Type::Paren(paren) => last_segment(&paren.elem),
        _ => None,
    }
}

fn first_type_argument(segment: &syn::PathSegment) -> Option<&Type> {
    match &segment.arguments {
        PathArguments::AngleBracketed(args) => args.args.iter().find_map(|arg| match arg {
            GenericArgument::Type(ty) => Some(ty),
            _ => None,
        }),
        _ => None,
    }
}

fn strip_reference(ty: &Type) -> &Type {
    match ty {
        Type::Reference(r) => strip_reference(&r.elem),
        Type::Group(group) => strip_reference(&group.elem),
        Type::Paren(paren) => strip_reference(&paren.elem),
        other => other,
    }
}

/// `Requester` itself, `dyn Requester` or either behind `Arc`/`Box`/`Rc`,
/// matched on the last path segment.
fn is_requester(ty: &Type) -> bool {
    let names_requester = |path: &syn::Path| {
        path.segments
            .last()
            .is_some_and(|segment| segment.ident == "Requester")
    };
    match strip_reference(ty) {
        Type::TraitObject(object) => object.bounds.iter().any(|bound| match bound {
            TypeParamBound::Trait(t) => names_requester(&t.path),
            _ => false,
        }),
        other => match last_segment(other) {
            Some(segment) if segment.ident == "Requester" => true,
            Some(segment) if ["Arc", "Box", "Rc"].iter().any(|w| segment.ident == w) => {
                first_type_argument(segment).is_some_and(is_requester)
            }
            _ => false,
        },
    }
}

/// Classify a declared parameter or property type.
pub fn classify_type(ty: &Type) -> TypeKind {
    let ty = strip_reference(ty);
    if let Type::Slice(slice) = ty {
        return if compact(&slice.elem) == "u8" {
            TypeKind::Bytes
        } else {
            TypeKind::Value
        };
    }
    if is_requester(ty) {
        return TypeKind::Requester;
    }
    let Some(segment) = last_segment(ty) else {
        return TypeKind::Value;
    };
    match segment.ident.to_string().as_str() {
        "Option" => first_type_argument(segment)
            .map(classify_type)
            .unwrap_or(TypeKind::Value),
        "str" | "String" => TypeKind::Text,
        "Cow" => match first_type_argument(segment).map(compact).as_deref() {
            Some("str") => TypeKind::Text,
            Some("[u8]") => TypeKind::Bytes,
            _ => TypeKind::Value,
        },
        "Bytes" => TypeKind::Bytes,
        "Vec" => match first_type_argument(segment).map(compact).as_deref() {
            Some("u8") => TypeKind::Bytes,
            _ => TypeKind::Value,
        },
        "CancellationToken" => TypeKind::Cancellation,
        _ => TypeKind::Value,
    }
}

/// Derive the response shape from a declared return type.
///
/// `Result<T, E>` is unwrapped to `T` first.
pub fn classify_return(output: &ReturnType) -> ResponseShape {
    let ReturnType::Type(_, ty) = output else {
        return ResponseShape::Void;
    };
    let mut ty: &Type = ty;
    if let Some(segment) = last_segment(ty) {
        if segment.ident == "Result" {
            if let Some(inner) = first_type_argument(segment) {
                ty = inner;
            }
        }
    }
    if let Type::Tuple(tuple) = ty {
        if tuple.elems.is_empty() {
            return ResponseShape::Void;
        }
    }
    match last_segment(ty) {
        Some(segment) if segment.ident == "String" => ResponseShape::Text,
        Some(segment) if segment.ident == "RawResponse" => ResponseShape::Raw,
        Some(segment) if segment.ident == "Response" => match first_type_argument(segment) {
            Some(inner) => ResponseShape::WithResponse { ty: compact(inner) },
            None => ResponseShape::Deserialize { ty: compact(ty) },
        },
        _ => ResponseShape::Deserialize { ty: compact(ty) },
    }
}

fn receiver(method: &TraitItemFn) -> Receiver {
    match method.sig.inputs.first() {
        Some(FnArg::Receiver(r)) if r.reference.is_some() => {
            if r.mutability.is_some() {
                Receiver::RefMut
            } else {
                Receiver::Ref
            }
        }
        Some(FnArg::Receiver(_)) => Receiver::Owned,
        _ => Receiver::Static,
    }
}

fn param_name(pat: &Pat, index: usize) -> String {
    match pat {
        Pat::Ident(ident) => ident.ident.to_string(),
        _ => format!("arg{index}"),
    }
}

fn params(method: &TraitItemFn) -> Vec<RawParam<ExprLiteral>> {
    method
        .sig
        .inputs
        .iter()
        .filter_map(|arg| match arg {
            FnArg::Typed(typed) => Some(typed),
            FnArg::Receiver(_) => None,
        })
        .enumerate()
        .map(|(index, typed)| RawParam {
            name: param_name(&typed.pat, index),
            attributes: raw_attributes(&typed.attrs),
            kind: classify_type(&typed.ty),
            by_ref: matches!(&*typed.ty, Type::Reference(r) if r.mutability.is_some()),
        })
        .collect()
}

/// Every trait in a parsed source file, inline modules included.
#[derive(Debug, Clone, Default)]
pub struct SourceGraph {
    traits: Vec<ItemTrait>,
}

impl SourceGraph {
    pub fn parse(src: &str) -> syn::Result<Self> {
        let file = syn::parse_file(src)?;
        Ok(Self::from_file(&file))
    }

    pub fn from_file(file: &syn::File) -> Self {
        fn collect(items: &[Item], out: &mut Vec<ItemTrait>) {
            for item in items {
                match item {
                    Item::Trait(t) => out.push(t.clone()),
                    Item::Mod(m) => {
                        if let Some((_, items)) = &m.content {
                            collect(items, out);
                        }
                    }
                    _ => {}
                }
            }
        }
        let mut traits = Vec::new();
        collect(&file.items, &mut traits);
        SourceGraph { traits }
    }

    pub fn from_traits(traits: Vec<ItemTrait>) -> Self {
        SourceGraph { traits }
    }

    pub fn interface(&self, name: &str) -> Option<SourceInterface<'_>> {
        self.traits
            .iter()
            .find(|t| t.ident == name)
            .map(|item| SourceInterface { graph: self, item })
    }

    pub fn interfaces(&self) -> impl Iterator<Item = SourceInterface<'_>> {
        self.traits
            .iter()
            .map(move |item| SourceInterface { graph: self, item })
    }
}

/// One trait inside a [`SourceGraph`].
#[derive(Debug, Clone, Copy)]
pub struct SourceInterface<'g> {
    graph: &'g SourceGraph,
    item: &'g ItemTrait,
}

impl<'g> SourceInterface<'g> {
    pub fn item(&self) -> &'g ItemTrait {
        self.item
    }

    /// Carries at least one vocabulary attribute at any scope.
    pub fn is_declared(&self) -> bool {
        if self.item.attrs.iter().any(is_vocabulary_attribute) {
            return true;
        }
        self.item.items.iter().any(|item| match item {
            TraitItem::Fn(f) => {
                f.attrs.iter().any(is_vocabulary_attribute)
                    || f.sig.inputs.iter().any(|arg| match arg {
                        FnArg::Typed(t) => t.attrs.iter().any(is_vocabulary_attribute),
                        FnArg::Receiver(_) => false,
                    })
            }
            _ => false,
        })
    }

    fn property_members(&self, members: &mut Vec<RawMember<ExprLiteral>>, method: &TraitItemFn) {
        let name = method.sig.ident.to_string();
        let is_setter = name.starts_with("set_") && receiver(method) == Receiver::RefMut;
        let property = if is_setter {
            name.trim_start_matches("set_").to_string()
        } else {
            name.clone()
        };
        let kind = if is_setter {
            params(method)
                .first()
                .map(|p| p.kind)
                .unwrap_or(TypeKind::Value)
        } else {
            match &method.sig.output {
                ReturnType::Type(_, ty) => classify_type(ty),
                ReturnType::Default => TypeKind::Value,
            }
        };
        let attributes = raw_attributes(&method.attrs);

        let existing = members.iter_mut().find_map(|m| match m {
            RawMember::Property(p) if p.name == property => Some(p),
            _ => None,
        });
        match existing {
            Some(p) => {
                p.attributes.extend(attributes);
                if is_setter {
                    p.setter = true;
                } else {
                    p.getter = true;
                    p.kind = kind;
                }
            }
            None => members.push(RawMember::Property(RawProperty {
                name: property.clone(),
                attributes,
                kind,
                getter: !is_setter,
                setter: is_setter,
                source: source_ref(&property, method.sig.ident.span()),
            })),
        }
    }
}

impl<'g> DeclarationSource for SourceInterface<'g> {
    type Literal = ExprLiteral;

    fn name(&self) -> String {
        self.item.ident.to_string()
    }

    fn is_accessible(&self) -> bool {
        !matches!(self.item.vis, Visibility::Inherited)
    }

    fn attributes(&self) -> Vec<RawAttribute<ExprLiteral>> {
        raw_attributes(&self.item.attrs)
    }

    fn inherited(&self) -> Vec<Self> {
        self.item
            .supertraits
            .iter()
            .filter_map(|bound| match bound {
                TypeParamBound::Trait(t) => t.path.segments.last(),
                _ => None,
            })
            .filter_map(|segment| self.graph.interface(&segment.ident.to_string()))
            .collect()
    }

    fn members(&self) -> Vec<RawMember<ExprLiteral>> {
        let mut members = Vec::new();
        for item in &self.item.items {
            match item {
                TraitItem::Fn(method) if has_property_marker(&method.attrs) => {
                    self.property_members(&mut members, method);
                }
                TraitItem::Fn(method) => {
                    let name = method.sig.ident.to_string();
                    members.push(RawMember::Method(RawMethod {
                        source: source_ref(&name, method.sig.ident.span()),
                        name,
                        attributes: raw_attributes(&method.attrs),
                        receiver: receiver(method),
                        params: params(method),
                        returns: classify_return(&method.sig.output),
                        provided: method.default.is_some(),
                    }));
                }
                TraitItem::Type(ty) => members.push(RawMember::Associated(RawAssociated {
                    name: ty.ident.to_string(),
                    kind: AssociatedKind::Type,
                    source: source_ref(&ty.ident.to_string(), ty.ident.span()),
                })),
                TraitItem::Const(c) => members.push(RawMember::Associated(RawAssociated {
                    name: c.ident.to_string(),
                    kind: AssociatedKind::Const,
                    source: source_ref(&c.ident.to_string(), c.ident.span()),
                })),
                _ => {}
            }
        }
        members
    }
}
