use brrtclient::analyzer::source::{
    classify_return, classify_type, is_vocabulary_attribute, ExprLiteral, SourceGraph,
    SourceInterface, PROPERTY_MARKER,
};
use brrtclient::analyzer::{DeclarationSource, RawMember, RawMethod, RawParam, RawProperty};
use brrtclient::decl::{Literal, RawAttribute};
use brrtclient::model::{AssociatedKind, Receiver, ResponseShape, TypeKind};
use brrtclient::validator::{self, codes, Diagnostic};
use proc_macro2::{Span, TokenStream};
use quote::{format_ident, quote};
use syn::{
    parse_quote, Expr, ExprLit, FnArg, Ident, ItemTrait, Lit, Pat, Path, PathArguments,
    ReturnType, Signature, TraitBoundModifier, TraitItem, TraitItemFn, Type, TypeParamBound,
};

/// Supertraits that are not interfaces
const MARKER_TRAITS: &[&str] = &["Send", "Sync", "Sized", "Unpin"];

pub fn expand(item: ItemTrait) -> syn::Result<TokenStream> {
    if !item.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &item.generics,
            "generic interfaces are not supported",
        ));
    }

    let parents = parent_declarations(&item);
    let graph = SourceGraph::from_traits(vec![item.clone()]);
    let name = item.ident.to_string();
    let iface = graph
        .interface(&name)
        .ok_or_else(|| syn::Error::new(item.ident.span(), "interface not found"))?;

    let validated = validator::build(&iface);
    check(&item, &validated.diagnostics, !parents.is_empty())?;
    let disposal = validated.model.as_ref().and_then(|m| m.disposal.clone());

    let decl_ident = format_ident!("{}Declaration", item.ident);
    let client_ident = format_ident!("{}Client", item.ident);
    let declaration = lower_interface(&iface, &parents)?;
    let methods = implement(&item, &decl_ident, disposal.as_deref())?;

    let stripped = strip(item);
    let vis = &stripped.vis;
    let trait_ident = &stripped.ident;
    let marker_doc = format!("Declaration marker for [`{name}`].");
    let alias_doc = format!("A client bound to [`{name}`].");

    Ok(quote! {
        #[allow(async_fn_in_trait)]
        #stripped

        #[doc = #marker_doc]
        #[derive(Debug, Clone, Copy, Default)]
        #vis struct #decl_ident;

        impl ::brrtclient::Declared for #decl_ident {
            fn declaration() -> ::brrtclient::analyzer::InterfaceDecl {
                #declaration
            }

            fn interface_name() -> ::std::string::String {
                ::std::string::String::from(#name)
            }
        }

        impl #decl_ident {
            /// Bind `requester` to this interface.
            #vis fn client<R: ::brrtclient::Requester + 'static>(
                requester: R,
            ) -> ::brrtclient::Result<::brrtclient::ApiClient<R>> {
                ::brrtclient::ApiClient::for_interface::<Self>(requester)
            }
        }

        #[doc = #alias_doc]
        #vis type #client_ident<R> = ::brrtclient::ApiClient<R>;

        impl<R: ::brrtclient::Requester + 'static> #trait_ident for ::brrtclient::ApiClient<R> {
            #(#methods)*
        }
    })
}

/// `<Parent>Declaration` paths for every interface supertrait.
fn parent_declarations(item: &ItemTrait) -> Vec<Path> {
    item.supertraits
        .iter()
        .filter_map(|bound| match bound {
            TypeParamBound::Trait(t) if matches!(t.modifier, TraitBoundModifier::None) => {
                Some(&t.path)
            }
            _ => None,
        })
        .filter(|path| {
            path.segments
                .last()
                .map(|s| !MARKER_TRAITS.contains(&s.ident.to_string().as_str()))
                .unwrap_or(false)
        })
        .map(|path| {
            let mut path = path.clone();
            if let Some(last) = path.segments.last_mut() {
                last.ident = format_ident!("{}Declaration", last.ident);
                last.arguments = PathArguments::None;
            }
            path
        })
        .collect()
}

/// Every error diagnostic as one combined compile error.
///
/// Supertraits are not visible here, so placeholders they contribute through
/// their base path cannot be matched; the registry re-validates with the full
/// graph when the client is bound.
fn check(item: &ItemTrait, diagnostics: &[Diagnostic], has_parents: bool) -> syn::Result<()> {
    let mut combined: Option<syn::Error> = None;
    for d in diagnostics.iter().filter(|d| d.is_error()) {
        if has_parents && d.code == codes::UNUSED_PATH_PARAMETER {
            continue;
        }
        let mut message = format!("[{}] {}", d.code, d.message);
        if let Some(suggestion) = &d.suggestion {
            message.push_str("\nhelp: ");
            message.push_str(suggestion);
        }
        let err = syn::Error::new(span_of(item, d), message);
        match &mut combined {
            Some(all) => all.combine(err),
            None => combined = Some(err),
        }
    }
    match combined {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

fn span_of(item: &ItemTrait, d: &Diagnostic) -> Span {
    let location = &d.location;
    let Some(member) = location.member.as_deref().or(location.property.as_deref()) else {
        return item.ident.span();
    };
    for trait_item in &item.items {
        let TraitItem::Fn(f) = trait_item else {
            continue;
        };
        let name = f.sig.ident.to_string();
        if name != member && name.strip_prefix("set_") != Some(member) {
            continue;
        }
        if let Some(parameter) = &location.parameter {
            for input in &f.sig.inputs {
                if let FnArg::Typed(t) = input {
                    if let Pat::Ident(pat) = &*t.pat {
                        if pat.ident == parameter {
                            return pat.ident.span();
                        }
                    }
                }
            }
        }
        return f.sig.ident.span();
    }
    item.ident.span()
}

// ---------------------------------------------------------------------------
// Declaration lowering: source attributes into runtime builder calls
// ---------------------------------------------------------------------------

enum Lowered {
    Value(TokenStream),
    Ident(String),
}

fn lower_literal(value: &ExprLiteral) -> syn::Result<Lowered> {
    if let Some(s) = value.as_str() {
        return Ok(Lowered::Value(quote!(#s)));
    }
    if let Some(b) = value.as_bool() {
        return Ok(Lowered::Value(quote!(#b)));
    }
    if let Expr::Lit(ExprLit {
        lit: Lit::Int(int), ..
    }) = &value.0
    {
        let n: i64 = int.base10_parse()?;
        let lit = proc_macro2::Literal::i64_suffixed(n);
        return Ok(Lowered::Value(quote!(#lit)));
    }
    if let Some(ident) = value.as_ident() {
        return Ok(Lowered::Ident(ident));
    }
    Err(syn::Error::new_spanned(
        &value.0,
        "attribute arguments must be string, bool or integer literals, or bare identifiers",
    ))
}

fn lower_attr(attr: &RawAttribute<ExprLiteral>) -> syn::Result<TokenStream> {
    let name = &attr.name;
    let mut tokens = quote!(::brrtclient::analyzer::Attr::new(#name));
    for arg in &attr.args {
        tokens = match (&arg.name, lower_literal(&arg.value)?) {
            (None, Lowered::Value(v)) => quote!(#tokens.arg(#v)),
            (None, Lowered::Ident(i)) => quote!(#tokens.ident(#i)),
            (Some(key), Lowered::Value(v)) => quote!(#tokens.named(#key, #v)),
            (Some(key), Lowered::Ident(i)) => quote!(#tokens.named_ident(#key, #i)),
        };
    }
    Ok(tokens)
}

fn kind_tokens(kind: TypeKind) -> TokenStream {
    match kind {
        TypeKind::Text => quote!(::brrtclient::model::TypeKind::Text),
        TypeKind::Bytes => quote!(::brrtclient::model::TypeKind::Bytes),
        TypeKind::Cancellation => quote!(::brrtclient::model::TypeKind::Cancellation),
        TypeKind::Requester => quote!(::brrtclient::model::TypeKind::Requester),
        TypeKind::Value => quote!(::brrtclient::model::TypeKind::Value),
    }
}

fn receiver_tokens(receiver: Receiver) -> TokenStream {
    match receiver {
        Receiver::Ref => quote!(::brrtclient::model::Receiver::Ref),
        Receiver::RefMut => quote!(::brrtclient::model::Receiver::RefMut),
        Receiver::Owned => quote!(::brrtclient::model::Receiver::Owned),
        Receiver::Static => quote!(::brrtclient::model::Receiver::Static),
    }
}

fn shape_tokens(shape: &ResponseShape) -> TokenStream {
    match shape {
        ResponseShape::Void => quote!(::brrtclient::model::ResponseShape::Void),
        ResponseShape::Text => quote!(::brrtclient::model::ResponseShape::Text),
        ResponseShape::Raw => quote!(::brrtclient::model::ResponseShape::Raw),
        ResponseShape::Deserialize { ty } => quote! {
            ::brrtclient::model::ResponseShape::Deserialize { ty: ::std::string::String::from(#ty) }
        },
        ResponseShape::WithResponse { ty } => quote! {
            ::brrtclient::model::ResponseShape::WithResponse { ty: ::std::string::String::from(#ty) }
        },
    }
}

fn lower_param(param: &RawParam<ExprLiteral>) -> syn::Result<TokenStream> {
    let name = &param.name;
    let kind = kind_tokens(param.kind);
    let mut tokens = quote!(::brrtclient::analyzer::ParamDecl::new(#name).kind(#kind));
    if param.by_ref {
        tokens = quote!(#tokens.by_ref());
    }
    for attr in &param.attributes {
        let attr = lower_attr(attr)?;
        tokens = quote!(#tokens.attr(#attr));
    }
    Ok(tokens)
}

fn lower_method(method: &RawMethod<ExprLiteral>) -> syn::Result<TokenStream> {
    let name = &method.name;
    let mut tokens = quote!(::brrtclient::analyzer::MethodDecl::new(#name));
    for attr in &method.attributes {
        let attr = lower_attr(attr)?;
        tokens = quote!(#tokens.attr(#attr));
    }
    for param in &method.params {
        let param = lower_param(param)?;
        tokens = quote!(#tokens.param(#param));
    }
    let shape = shape_tokens(&method.returns);
    let receiver = receiver_tokens(method.receiver);
    tokens = quote!(#tokens.returns(#shape).receiver(#receiver));
    if method.provided {
        tokens = quote!(#tokens.provided());
    }
    Ok(tokens)
}

fn lower_property(property: &RawProperty<ExprLiteral>) -> syn::Result<TokenStream> {
    let name = &property.name;
    let kind = kind_tokens(property.kind);
    let mut tokens = quote!(::brrtclient::analyzer::PropertyDecl::new(#name).kind(#kind));
    if !property.setter {
        tokens = quote!(#tokens.read_only());
    }
    if !property.getter {
        tokens = quote!(#tokens.write_only());
    }
    for attr in &property.attributes {
        let attr = lower_attr(attr)?;
        tokens = quote!(#tokens.attr(#attr));
    }
    Ok(tokens)
}

fn lower_interface(iface: &SourceInterface<'_>, parents: &[Path]) -> syn::Result<TokenStream> {
    let name = iface.name();
    let mut tokens = quote!(::brrtclient::analyzer::InterfaceDecl::new(#name));
    if !iface.is_accessible() {
        tokens = quote!(#tokens.private());
    }
    for attr in iface.attributes() {
        let attr = lower_attr(&attr)?;
        tokens = quote!(#tokens.attr(#attr));
    }
    for parent in parents {
        tokens = quote!(#tokens.extends(<#parent as ::brrtclient::Declared>::declaration()));
    }
    for member in iface.members() {
        tokens = match member {
            RawMember::Method(method) => {
                let method = lower_method(&method)?;
                quote!(#tokens.method(#method))
            }
            RawMember::Property(property) => {
                let property = lower_property(&property)?;
                quote!(#tokens.property(#property))
            }
            RawMember::Associated(associated) => {
                let name = &associated.name;
                let kind = match associated.kind {
                    AssociatedKind::Type => quote!(::brrtclient::model::AssociatedKind::Type),
                    AssociatedKind::Const => quote!(::brrtclient::model::AssociatedKind::Const),
                };
                quote!(#tokens.associated(#name, #kind))
            }
        };
    }
    Ok(tokens)
}

// ---------------------------------------------------------------------------
// Client implementation
// ---------------------------------------------------------------------------

struct ImplArg {
    ident: Ident,
    name: String,
    kind: TypeKind,
}

fn has_property_marker(f: &TraitItemFn) -> bool {
    f.attrs.iter().any(|a| {
        a.path()
            .segments
            .last()
            .map(|s| s.ident == PROPERTY_MARKER)
            .unwrap_or(false)
    })
}

fn is_setter(f: &TraitItemFn) -> bool {
    let mutable_receiver = matches!(
        f.sig.inputs.first(),
        Some(FnArg::Receiver(r)) if r.reference.is_some() && r.mutability.is_some()
    );
    f.sig.ident.to_string().starts_with("set_") && mutable_receiver
}

fn returns_result(output: &ReturnType) -> bool {
    match output {
        ReturnType::Type(_, ty) => match &**ty {
            Type::Path(path) => path
                .path
                .segments
                .last()
                .map(|s| s.ident == "Result")
                .unwrap_or(false),
            _ => false,
        },
        ReturnType::Default => false,
    }
}

/// The trait signature with vocabulary attributes dropped and parameters
/// renamed to plain identifiers the body can refer to.
fn impl_signature(sig: &Signature) -> (Signature, Vec<ImplArg>) {
    let mut sig = sig.clone();
    let mut args = Vec::new();
    let typed = sig.inputs.iter_mut().filter_map(|input| match input {
        FnArg::Typed(t) => Some(t),
        FnArg::Receiver(_) => None,
    });
    for (index, arg) in typed.enumerate() {
        let name = match &*arg.pat {
            Pat::Ident(pat) => pat.ident.to_string(),
            _ => format!("arg{index}"),
        };
        let ident = format_ident!("__arg{}", index);
        arg.attrs.retain(|a| !is_vocabulary_attribute(a));
        arg.pat = Box::new(parse_quote!(#ident));
        args.push(ImplArg {
            ident,
            name,
            kind: classify_type(&arg.ty),
        });
    }
    (sig, args)
}

fn property_body(f: &TraitItemFn, args: &[ImplArg]) -> syn::Result<TokenStream> {
    let name = f.sig.ident.to_string();
    if is_setter(f) {
        let property = name.trim_start_matches("set_");
        let value = args.first().ok_or_else(|| {
            syn::Error::new(f.sig.ident.span(), "property setters take the new value")
        })?;
        let value = &value.ident;
        return Ok(quote!(::brrtclient::ApiClient::store_property(self, #property, &#value)));
    }
    let requester = match &f.sig.output {
        ReturnType::Type(_, ty) => classify_type(ty) == TypeKind::Requester,
        ReturnType::Default => false,
    };
    if requester {
        Ok(quote!(::core::convert::Into::into(::brrtclient::ApiClient::requester_handle(self))))
    } else {
        Ok(quote!(::brrtclient::ApiClient::property_value(self, #name).unwrap_or_default()))
    }
}

fn request_body(f: &TraitItemFn, decl: &Ident, args: &[ImplArg]) -> syn::Result<TokenStream> {
    if f.sig.asyncness.is_none() {
        return Err(syn::Error::new(
            f.sig.ident.span(),
            "request methods must be `async fn`",
        ));
    }
    if !returns_result(&f.sig.output) {
        return Err(syn::Error::new(
            f.sig.ident.span(),
            "request methods must return a `Result` whose error converts from `brrtclient::Error`",
        ));
    }

    let name = f.sig.ident.to_string();
    let lowered = args.iter().map(|arg| {
        let ident = &arg.ident;
        let parameter = &arg.name;
        match arg.kind {
            TypeKind::Bytes => quote!(::brrtclient::BytesArg::into_arg(#ident)),
            TypeKind::Cancellation => quote!(::brrtclient::CancelArg::into_arg(#ident)),
            _ => quote! {
                match ::brrtclient::ArgValue::from_serialize(&#ident) {
                    ::core::result::Result::Ok(value) => value,
                    ::core::result::Result::Err(source) => {
                        return ::core::result::Result::Err(::core::convert::Into::into(
                            ::brrtclient::Error::Serialize {
                                parameter: ::std::string::String::from(#parameter),
                                source,
                            },
                        ))
                    }
                }
            },
        }
    });
    let convert = match classify_return(&f.sig.output) {
        ResponseShape::Void => quote!(__reply.into_unit()),
        ResponseShape::Text => quote!(__reply.into_text()),
        ResponseShape::Raw => quote!(::core::result::Result::<_, ::brrtclient::Error>::Ok(__reply.into_raw())),
        ResponseShape::Deserialize { .. } => quote!(__reply.into_json()),
        ResponseShape::WithResponse { .. } => quote!(__reply.into_response()),
    };

    Ok(quote! {
        let __args: ::std::vec::Vec<::brrtclient::ArgValue> = ::std::vec![#(#lowered),*];
        let __reply =
            match ::brrtclient::ApiClient::invoke_as::<#decl>(self, #name, __args).await {
                ::core::result::Result::Ok(reply) => reply,
                ::core::result::Result::Err(err) => {
                    return ::core::result::Result::Err(::core::convert::Into::into(err))
                }
            };
        match #convert {
            ::core::result::Result::Ok(value) => ::core::result::Result::Ok(value),
            ::core::result::Result::Err(err) => {
                ::core::result::Result::Err(::core::convert::Into::into(err))
            }
        }
    })
}

fn implement(item: &ItemTrait, decl: &Ident, disposal: Option<&str>) -> syn::Result<Vec<TokenStream>> {
    let mut methods = Vec::new();
    for trait_item in &item.items {
        let TraitItem::Fn(f) = trait_item else {
            continue;
        };
        // Provided methods keep their default body
        if f.default.is_some() {
            continue;
        }
        if !f.sig.generics.params.is_empty() {
            return Err(syn::Error::new_spanned(
                &f.sig.generics,
                "generic methods are not supported",
            ));
        }

        let (sig, args) = impl_signature(&f.sig);
        let name = f.sig.ident.to_string();
        let body = if has_property_marker(f) {
            property_body(f, &args)?
        } else if disposal == Some(name.as_str()) {
            quote!(::brrtclient::ApiClient::dispose(self))
        } else {
            request_body(f, decl, &args)?
        };
        methods.push(quote!(#sig { #body }));
    }
    Ok(methods)
}

fn strip(mut item: ItemTrait) -> ItemTrait {
    item.attrs.retain(|a| !is_vocabulary_attribute(a));
    for trait_item in &mut item.items {
        if let TraitItem::Fn(f) = trait_item {
            f.attrs.retain(|a| !is_vocabulary_attribute(a));
            for input in &mut f.sig.inputs {
                if let FnArg::Typed(t) = input {
                    t.attrs.retain(|a| !is_vocabulary_attribute(a));
                }
            }
        }
    }
    item
}
