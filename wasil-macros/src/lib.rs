//! Procedural macros for Wasil.
//!
//! Provides `#[derive(Injectable)]`, which declares a struct's constructor
//! parameters from its fields:
//! - `Arc<T>`: a required dependency on `T`
//! - `Option<Arc<T>>`: an optional dependency, `None` when `T` is not registered
//! - `#[inject(name = "...")]`: depend on a named registration
//! - `#[inject(default)]`: not injected, filled with `Default::default()`
//!
//! # Examples
//! ```rust,ignore
//! #[derive(Injectable)]
//! struct UserService {
//!     repo: Arc<UserRepository>,
//!     #[inject(name = "audit")]
//!     log: Arc<Logger>,
//!     cache: Option<Arc<Cache>>,
//!     #[inject(default)]
//!     hits: AtomicU64,
//! }
//! ```

use darling::ast::{Data, Fields, Style};
use darling::{FromDeriveInput, FromField};
use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{DeriveInput, GenericArgument, PathArguments, Type, parse_macro_input};

#[derive(FromDeriveInput)]
#[darling(attributes(injectable), supports(struct_any))]
struct InjectableInput {
    ident: syn::Ident,
    generics: syn::Generics,
    data: Data<(), InjectField>,
    /// Path to the `wasil` crate, for re-exporting crates.
    #[darling(rename = "crate", default)]
    krate: Option<syn::Path>,
}

#[derive(FromField)]
#[darling(attributes(inject))]
struct InjectField {
    ident: Option<syn::Ident>,
    ty: Type,
    #[darling(default)]
    name: Option<String>,
    #[darling(rename = "default", default)]
    use_default: bool,
}

enum FieldKind<'a> {
    Required(&'a Type),
    Optional(&'a Type),
    Default,
}

/// Derive `Injectable` for a struct whose fields are its dependencies.
///
/// Fields are resolved in declaration order. Every field must be `Arc<T>`,
/// `Option<Arc<T>>`, or marked `#[inject(default)]`.
#[proc_macro_derive(Injectable, attributes(inject, injectable))]
pub fn derive_injectable(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match InjectableInput::from_derive_input(&input).and_then(|parsed| expand(&parsed)) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.write_errors().into(),
    }
}

fn expand(input: &InjectableInput) -> darling::Result<TokenStream2> {
    let krate = input
        .krate
        .clone()
        .unwrap_or_else(|| syn::parse_quote!(::wasil));

    let fields: &Fields<InjectField> = match &input.data {
        Data::Struct(fields) => fields,
        Data::Enum(_) => return Err(darling::Error::unsupported_shape("enum")),
    };

    let mut errors = darling::Error::accumulator();
    let mut params = Vec::new();
    let mut values = Vec::new();

    for field in &fields.fields {
        let Some(kind) = errors.handle(classify(field)) else {
            continue;
        };

        let value = match kind {
            FieldKind::Required(inner) => {
                params.push(param_tokens(&krate, inner, field.name.as_deref(), false));
                quote! { args.take::<#inner>()? }
            }
            FieldKind::Optional(inner) => {
                params.push(param_tokens(&krate, inner, field.name.as_deref(), true));
                quote! { args.take_optional::<#inner>()? }
            }
            FieldKind::Default => quote! { ::core::default::Default::default() },
        };

        values.push(match &field.ident {
            Some(ident) => quote! { #ident: #value },
            None => value,
        });
    }
    errors.finish()?;

    let body = match fields.style {
        Style::Struct => quote! { Self { #(#values),* } },
        Style::Tuple => quote! { Self( #(#values),* ) },
        Style::Unit => quote! { Self },
    };

    let ident = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
    let args_ident = if params.is_empty() {
        format_ident!("_args")
    } else {
        format_ident!("args")
    };

    Ok(quote! {
        impl #impl_generics #krate::Injectable for #ident #ty_generics #where_clause {
            fn params() -> ::std::vec::Vec<#krate::Param> {
                ::std::vec![#(#params),*]
            }

            fn construct(#args_ident: &mut #krate::Args<'_>) -> ::core::result::Result<Self, #krate::BoxError> {
                ::core::result::Result::Ok(#body)
            }
        }
    })
}

fn classify(field: &InjectField) -> darling::Result<FieldKind<'_>> {
    if field.use_default {
        if field.name.is_some() {
            return Err(darling::Error::custom("`name` has no effect on a `default` field").with_span(&field.ty));
        }
        return Ok(FieldKind::Default);
    }

    if let Some(inner) = generic_argument(&field.ty, "Arc") {
        return Ok(FieldKind::Required(inner));
    }

    if let Some(inner) = generic_argument(&field.ty, "Option").and_then(|option| generic_argument(option, "Arc")) {
        return Ok(FieldKind::Optional(inner));
    }

    Err(darling::Error::custom(
        "injected fields must be `Arc<T>` or `Option<Arc<T>>`; mark other fields `#[inject(default)]`",
    )
    .with_span(&field.ty))
}

/// `T` when `ty` is `Wrapper<T>` (by last path segment).
fn generic_argument<'a>(ty: &'a Type, wrapper: &str) -> Option<&'a Type> {
    let Type::Path(path) = ty else {
        return None;
    };
    let segment = path.path.segments.last()?;
    if segment.ident != wrapper {
        return None;
    }
    let PathArguments::AngleBracketed(arguments) = &segment.arguments else {
        return None;
    };
    match arguments.args.first()? {
        GenericArgument::Type(inner) if arguments.args.len() == 1 => Some(inner),
        _ => None,
    }
}

fn param_tokens(krate: &syn::Path, inner: &Type, name: Option<&str>, optional: bool) -> TokenStream2 {
    let param = match name {
        Some(name) => quote! { #krate::Param::named::<#inner>(#name) },
        None => quote! { #krate::Param::of::<#inner>() },
    };
    if optional {
        quote! { #param.or_default() }
    } else {
        param
    }
}
