//! `#[api]`: turns an annotated trait into a brrtclient interface.
//!
//! The trait is analyzed and validated while it compiles; every error
//! diagnostic becomes a compile error at the offending declaration. On success
//! the macro emits, next to the cleaned-up trait:
//!
//! - `<Trait>Declaration`, a marker implementing `brrtclient::Declared` whose
//!   runtime declaration is built from the same attributes
//! - `impl <Trait> for brrtclient::ApiClient<R>`, forwarding every request
//!   method to `ApiClient::invoke_as`, so inherited methods called through a
//!   child client use the child's headers, properties and base path
//! - `<Trait>Client<R>`, an alias for the bound client type
//!
//! Request methods must be `async fn` returning a `Result` whose error type
//! converts from `brrtclient::Error`. Supertraits other than `Send`, `Sync`,
//! `Sized` and `Unpin` must be `#[api]` traits themselves.

mod expand;

use proc_macro::TokenStream;
use syn::{parse_macro_input, ItemTrait};

#[proc_macro_attribute]
pub fn api(attr: TokenStream, item: TokenStream) -> TokenStream {
    if !attr.is_empty() {
        return syn::Error::new(
            proc_macro2::Span::call_site(),
            "#[api] takes no arguments; put declarations on the trait itself",
        )
        .to_compile_error()
        .into();
    }
    let item = parse_macro_input!(item as ItemTrait);
    match expand::expand(item) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}
