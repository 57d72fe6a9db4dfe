//! # Validator Module
//!
//! Checks an analyzed [`TypeModel`] and turns it into a bindable
//! [`ClientModel`].
//!
//! ## Overview
//!
//! Validation never stops at the first problem. Every rule runs and reports a
//! [`Diagnostic`]; the severity and location of each decide what survives:
//!
//! - an error with no member in its location is fatal for the whole interface,
//!   and no model is produced
//! - an error that names a member excludes that method, siblings still bind
//! - warnings and infos are carried on the resulting model
//!
//! Diagnostics produced by the analyzer (malformed, misplaced or unknown
//! declarations) are merged in first, so a single list describes everything
//! wrong with a declaration.
//!
//! ## Usage
//!
//! ```rust
//! use brrtclient::analyzer::{Attr, InterfaceDecl, MethodDecl};
//! use brrtclient::validator::build;
//!
//! let api = InterfaceDecl::new("Api")
//!     .method(MethodDecl::new("ping").attr(Attr::new("get").arg("ping")));
//! let validated = build(&&api);
//! assert!(validated.model.is_some());
//! ```

mod diagnostic;


pub use diagnostic::{codes, print_diagnostics, DeclLocation, Diagnostic, Severity};

use crate::analyzer::{analyze, DeclarationSource};
use crate::decl::{AttributeModel, BodyEncoding, Declaration, HeaderDecl, SourceRef};
use crate::descriptor::{
    header_name, header_value, is_absolute, join, resolve_encoding, PathTemplate, RequestTemplate,
};
use crate::model::{
    ClientModel, MethodModel, ParameterRole, PropertyModel, PropertyRole, Receiver, TypeKind,
    TypeModel,
};
use std::collections::{HashMap, HashSet};
use tracing::{info, warn};

/// Outcome of validating one interface.
#[derive(Debug, Clone)]
pub struct Validated {
    /// Absent when any type-level error was found
    pub model: Option<ClientModel>,
    pub diagnostics: Vec<Diagnostic>,
}

impl Validated {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.is_error())
    }
}

/// Analyze and validate in one step.
pub fn build<S: DeclarationSource>(source: &S) -> Validated {
    let (model, diagnostics) = analyze(source);
    validate(model, diagnostics)
}

struct Checker<'m> {
    ty: &'m TypeModel,
    diagnostics: Vec<Diagnostic>,
}

impl<'m> Checker<'m> {
    fn location(&self) -> DeclLocation {
        DeclLocation::interface(&self.ty.name)
    }

    fn at<T>(location: DeclLocation, attr: &AttributeModel<T>) -> DeclLocation {
        let SourceRef { line, column, .. } = &attr.source;
        location.at(*line, *column)
    }

    fn push(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    fn check_type(&mut self) {
        let ty = self.ty;
        if !ty.accessible {
            self.push(
                Diagnostic::error(
                    codes::INACCESSIBLE_INTERFACE,
                    self.location(),
                    format!("interface `{}` is not accessible to generated code", ty.name),
                )
                .with_suggestion("Declare the interface with `pub` or `pub(crate)` visibility"),
            );
        }

        for item in &ty.associated_items {
            self.push(
                Diagnostic::error(
                    codes::UNSUPPORTED_ASSOCIATED_ITEM,
                    self.location(),
                    format!(
                        "associated {:?} `{}` cannot be implemented by a generated client",
                        item.kind, item.name
                    )
                    .to_lowercase(),
                )
                .with_suggestion("Move the item out of the interface"),
            );
        }

        let ordinary: Vec<_> = ty.methods.iter().filter(|m| !m.is_disposal).collect();
        if !ordinary.is_empty() && ordinary.iter().all(|m| m.requests.is_empty()) {
            self.push(
                Diagnostic::error(
                    codes::NO_REQUEST_DECLARATIONS,
                    self.location(),
                    format!("interface `{}` declares methods but no requests", ty.name),
                )
                .with_suggestion("Annotate methods with a verb such as #[get(\"path\")]"),
            );
        }

        for header in &ty.headers {
            let location = Self::at(self.location(), header);
            self.check_static_header(&header.value, location);
        }

        if let Some(base) = &ty.base_path {
            if let Err(e) = PathTemplate::parse(&base.value) {
                self.push(Diagnostic::error(
                    codes::INVALID_PATH_TEMPLATE,
                    Self::at(self.location(), base),
                    format!("base path `{}`: {}", base.value, e),
                ));
            }
        }

        let mut requester_seen = false;
        for property in &ty.properties {
            self.check_property(property, &mut requester_seen);
        }
    }

    fn check_static_header(&mut self, header: &HeaderDecl, location: DeclLocation) {
        if let Err(reason) = header_name(&header.name) {
            self.push(Diagnostic::error(
                codes::INVALID_HEADER,
                location,
                format!("invalid header name `{}`: {}", header.name, reason),
            ));
            return;
        }
        if let Some(value) = &header.value {
            if let Err(reason) = header_value(value) {
                self.push(Diagnostic::error(
                    codes::INVALID_HEADER,
                    location,
                    format!("invalid value for header `{}`: {}", header.name, reason),
                ));
            }
        }
    }

    fn check_property(&mut self, property: &PropertyModel, requester_seen: &mut bool) {
        let location = self.location().property(&property.name);

        if property.is_requester {
            let misuse = if *requester_seen {
                Some("only one requester property is allowed")
            } else if !property.has_getter {
                Some("the requester property needs a getter")
            } else if property.has_setter {
                Some("the requester property must not have a setter")
            } else if !property.bindings.is_empty() {
                Some("the requester property must not carry declarations")
            } else {
                None
            };
            *requester_seen = true;
            if let Some(message) = misuse {
                self.push(Diagnostic::error(
                    codes::REQUESTER_PROPERTY,
                    location,
                    message,
                ));
            }
            return;
        }

        if property.bindings.is_empty() {
            self.push(
                Diagnostic::error(
                    codes::MISSING_PROPERTY_BINDING,
                    location,
                    format!("property `{}` has no binding declaration", property.name),
                )
                .with_suggestion("Add #[header], #[path], #[query] or #[request_property]"),
            );
            return;
        }

        if property.bindings.len() > 1 {
            self.push(Diagnostic::error(
                codes::MULTIPLE_BINDING_ROLES,
                Self::at(location.clone(), &property.bindings[1]),
                format!(
                    "property `{}` declares {} binding roles, only one is allowed",
                    property.name,
                    property.bindings.len()
                ),
            ));
        }

        if !(property.has_getter && property.has_setter) {
            self.push(Diagnostic::error(
                codes::PROPERTY_ACCESSORS,
                location.clone(),
                format!("bound property `{}` needs both a getter and a setter", property.name),
            ));
        }

        if let Some(binding) = property.bindings.first() {
            if let Declaration::Header(header) = &binding.value {
                let location = Self::at(location, binding);
                self.check_static_header(header, location);
            }
        }
    }

    fn check_method(&mut self, method: &MethodModel, used_placeholders: &mut HashSet<String>) {
        let location = DeclLocation::interface(&method.declared_by).member(&method.name);

        if method.receiver == Receiver::Static {
            self.push(Diagnostic::error(
                codes::STATIC_METHOD,
                location,
                format!("`{}` has no receiver and cannot be called on a client", method.name),
            ));
            return;
        }
        if method.is_disposal {
            return;
        }

        match method.requests.len() {
            0 => self.push(
                Diagnostic::error(
                    codes::MISSING_REQUEST_DECLARATION,
                    location.clone(),
                    format!("`{}` has no request declaration", method.name),
                )
                .with_suggestion("Annotate it with a verb such as #[get(\"path\")]"),
            ),
            1 => {}
            n => self.push(Diagnostic::error(
                codes::MULTIPLE_REQUEST_DECLARATIONS,
                Self::at(location.clone(), &method.requests[1]),
                format!("`{}` has {} request declarations, exactly one is allowed", method.name, n),
            )),
        }

        for header in &method.headers {
            let location = Self::at(location.clone(), header);
            self.check_static_header(&header.value, location);
        }

        self.check_parameters(method, &location);

        if let Some(request) = method.request() {
            self.check_path(method, request, &location, used_placeholders);
        }
    }

    fn check_parameters(&mut self, method: &MethodModel, location: &DeclLocation) {
        let ty = self.ty;
        let method_ser = method.serialization.as_ref().map(|s| &s.value);
        let type_ser = ty.serialization.as_ref().map(|s| &s.value);
        let mut bodies = 0;
        let mut cancellations = 0;

        for param in &method.parameters {
            let location = location.clone().parameter(&param.name);

            if param.is_by_ref {
                self.push(
                    Diagnostic::error(
                        codes::BY_REF_PARAMETER,
                        location.clone(),
                        format!("`{}` is taken by mutable reference", param.name),
                    )
                    .with_suggestion("Take the value by shared reference or by value"),
                );
            }

            if param.is_cancellation {
                cancellations += 1;
                if cancellations == 2 {
                    self.push(Diagnostic::error(
                        codes::MULTIPLE_CANCELLATION_PARAMETERS,
                        location.clone(),
                        format!("`{}` declares more than one cancellation token", method.name),
                    ));
                }
                if let Some(binding) = param.bindings.first() {
                    self.push(Diagnostic::error(
                        codes::BINDING_ON_CANCELLATION,
                        Self::at(location.clone(), binding),
                        format!("cancellation token `{}` cannot carry `{}`", param.name, binding.value.kind()),
                    ));
                }
                continue;
            }

            if param.bindings.len() > 1 {
                self.push(Diagnostic::error(
                    codes::MULTIPLE_BINDING_ROLES,
                    Self::at(location.clone(), &param.bindings[1]),
                    format!(
                        "`{}` declares {} binding roles, only one is allowed",
                        param.name,
                        param.bindings.len()
                    ),
                ));
            }

            if let Some(binding) = param.bindings.first() {
                if let Declaration::Header(header) = &binding.value {
                    let location = Self::at(location.clone(), binding);
                    if header.value.is_some() {
                        self.push(
                            Diagnostic::error(
                                codes::HEADER_VALUE_ON_PARAMETER,
                                location.clone(),
                                format!("header `{}` on a parameter cannot declare a value", header.name),
                            )
                            .with_suggestion(format!("Use #[header(\"{}\")]", header.name)),
                        );
                    }
                    if let Err(reason) = header_name(&header.name) {
                        self.push(Diagnostic::error(
                            codes::INVALID_HEADER,
                            location,
                            format!("invalid header name `{}`: {}", header.name, reason),
                        ));
                    }
                }
            }

            if let ParameterRole::Body(declared) = param.role() {
                bodies += 1;
                if bodies == 2 {
                    self.push(Diagnostic::error(
                        codes::MULTIPLE_BODY_PARAMETERS,
                        location.clone(),
                        format!("`{}` declares more than one body", method.name),
                    ));
                }
                let resolved = resolve_encoding(declared, method_ser, type_ser);
                if resolved == BodyEncoding::UrlEncoded
                    && matches!(param.kind, TypeKind::Text | TypeKind::Bytes)
                {
                    self.push(Diagnostic::error(
                        codes::INVALID_BODY_ENCODING,
                        location,
                        format!("`{}` is text or bytes and cannot be url-encoded", param.name),
                    ));
                }
            }
        }
    }

    fn check_path(
        &mut self,
        method: &MethodModel,
        request: &AttributeModel<crate::decl::RequestDecl>,
        location: &DeclLocation,
        used_placeholders: &mut HashSet<String>,
    ) {
        let ty = self.ty;
        let raw = &request.value.path;
        let full = match &ty.base_path {
            Some(base) if !is_absolute(raw) => join(&base.value, raw),
            _ => raw.clone(),
        };
        let template = match PathTemplate::parse(&full) {
            Ok(template) => template,
            Err(e) => {
                self.push(Diagnostic::error(
                    codes::INVALID_PATH_TEMPLATE,
                    Self::at(location.clone(), request),
                    format!("`{}`: {}", full, e),
                ));
                return;
            }
        };

        let placeholders: Vec<String> = template.placeholders().map(str::to_lowercase).collect();
        let placeholder_set: HashSet<&str> = placeholders.iter().map(String::as_str).collect();
        used_placeholders.extend(placeholders.iter().cloned());

        let mut bound: HashMap<String, &str> = HashMap::new();
        for param in &method.parameters {
            let ParameterRole::Path { name, .. } = param.role() else {
                continue;
            };
            let key = name.to_lowercase();
            let param_location = location.clone().parameter(&param.name);
            if bound.insert(key.clone(), &param.name).is_some() {
                self.push(Diagnostic::error(
                    codes::DUPLICATE_PATH_PARAMETER,
                    param_location,
                    format!("placeholder `{{{}}}` is bound by more than one parameter", name),
                ));
                continue;
            }
            if !placeholder_set.contains(key.as_str()) {
                self.push(
                    Diagnostic::error(
                        codes::UNUSED_PATH_PARAMETER,
                        param_location,
                        format!("`{}` binds `{{{}}}` which `{}` does not contain", param.name, name, full),
                    )
                    .with_suggestion("Add the placeholder or bind the parameter as a query"),
                );
            }
        }

        let property_keys: HashSet<String> = ty
            .properties
            .iter()
            .filter_map(|p| match p.role() {
                Some(PropertyRole::Path { name, .. }) => Some(name.to_lowercase()),
                _ => None,
            })
            .collect();

        let mut reported = HashSet::new();
        for (original, key) in template.placeholders().zip(&placeholders) {
            if bound.contains_key(key) || property_keys.contains(key) || !reported.insert(key) {
                continue;
            }
            self.push(
                Diagnostic::error(
                    codes::MISSING_PATH_PARAMETER,
                    Self::at(location.clone(), request),
                    format!("placeholder `{{{}}}` in `{}` has no matching parameter", original, full),
                )
                .with_suggestion(format!("Add a parameter annotated #[path(\"{}\")]", original)),
            );
        }
    }

    fn check_unused_path_properties(&mut self, used_placeholders: &HashSet<String>) {
        let ty = self.ty;
        for property in &ty.properties {
            if let Some(PropertyRole::Path { name, .. }) = property.role() {
                if !used_placeholders.contains(&name.to_lowercase()) {
                    self.push(Diagnostic::info(
                        codes::UNUSED_PATH_PROPERTY,
                        self.location().property(&property.name),
                        format!("path property `{}` is not used by any request path", property.name),
                    ));
                }
            }
        }
    }
}

/// Validate an analyzed model, merging in the analyzer's own diagnostics.
pub fn validate(ty: TypeModel, analysis: Vec<Diagnostic>) -> Validated {
    let mut checker = Checker {
        ty: &ty,
        diagnostics: analysis,
    };
    checker.check_type();

    let mut names = HashSet::new();
    let mut used_placeholders = HashSet::new();
    for method in &ty.methods {
        if !names.insert(method.name.as_str()) {
            checker.push(Diagnostic::error(
                codes::DUPLICATE_METHOD,
                DeclLocation::interface(&method.declared_by).member(&method.name),
                format!("method `{}` is declared more than once", method.name),
            ));
        }
        checker.check_method(method, &mut used_placeholders);
    }
    checker.check_unused_path_properties(&used_placeholders);

    let mut diagnostics = checker.diagnostics;
    for d in diagnostics.iter().filter(|d| d.is_error()) {
        warn!(
            interface = %ty.name,
            code = d.code,
            location = %d.location,
            "{}", d.message
        );
    }

    if diagnostics.iter().any(Diagnostic::is_type_fatal) {
        info!(
            interface = %ty.name,
            errors = diagnostics.iter().filter(|d| d.is_error()).count(),
            "Interface rejected"
        );
        return Validated {
            model: None,
            diagnostics,
        };
    }

    let excluded: HashSet<String> = diagnostics
        .iter()
        .filter(|d| d.is_error())
        .filter_map(|d| d.location.member.clone())
        .collect();

    let mut templates = Vec::new();
    let mut disposal = None;
    for method in &ty.methods {
        if excluded.contains(&method.name) {
            continue;
        }
        if method.is_disposal {
            if disposal.is_none() {
                disposal = Some(method.name.clone());
            }
            continue;
        }
        match RequestTemplate::compile(&ty, method) {
            Ok(template) => templates.push(template),
            Err(e) => diagnostics.push(Diagnostic::error(
                codes::INVALID_PATH_TEMPLATE,
                DeclLocation::interface(&method.declared_by).member(&method.name),
                e.to_string(),
            )),
        }
    }

    info!(
        interface = %ty.name,
        methods = templates.len(),
        excluded = excluded.len(),
        diagnostics = diagnostics.len(),
        "Interface validated"
    );

    Validated {
        model: Some(ClientModel {
            ty,
            templates,
            disposal,
            diagnostics: diagnostics.clone(),
        }),
        diagnostics,
    }
}
