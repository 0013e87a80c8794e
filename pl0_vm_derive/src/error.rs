//! Derive macro for error types.
//!
//! Generates `std::fmt::Display` and `std::error::Error` implementations, and a
//! `From` conversion for every field tagged `#[from]`.
//!
//! # Usage
//!
//! ```ignore
//! use pl0_vm_derive::Error;
//!
//! #[derive(Debug, Error)]
//! pub enum LoadError {
//!     #[error("invalid opcode {0}")]
//!     InvalidOpcode(u8),
//!
//!     #[error("address {address} is outside the stack")]
//!     InvalidAddress { address: i64, sp: isize },
//!
//!     #[error("machine fault: {0}")]
//!     Machine(#[from] VMError),
//! }
//! ```
//!
//! # Supported Features
//!
//! - Unit variants: `#[error("message")]`
//! - Tuple variants with positional args: `#[error("error: {0}")]` or `{0:?}`
//! - Struct variants with named args: `#[error("expected {expected}")]`
//! - `#[source]` on a field: returned from `Error::source`
//! - `#[from]` on the only field of a variant: implies `#[source]` and adds `From`
//!
//! Only the fields a message mentions are handed to `write!`, so a variant can
//! carry context that its message leaves out.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{ToTokens, format_ident, quote};
use syn::{Data, DeriveInput, Fields, Lit, Meta, Type, parse_macro_input};

/// Derives `Display`, `Error` and optional `From` impls for an enum or struct.
pub fn derive_error(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match expand_error_derive(&input) {
        Ok(tokens) => TokenStream::from(tokens),
        Err(err) => err.to_compile_error().into(),
    }
}

/// A field that `Error::source` should expose.
struct SourceField<'a> {
    index: usize,
    ty: &'a Type,
    from: bool,
}

fn expand_error_derive(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let mut display_arms = Vec::new();
    let mut source_arms = Vec::new();
    let mut from_impls = Vec::new();

    match &input.data {
        Data::Enum(data_enum) => {
            for variant in &data_enum.variants {
                let variant_name = &variant.ident;
                let path = quote!(Self::#variant_name);
                let message = extract_error_message_from_attrs(
                    &variant.attrs,
                    &variant.ident,
                    &format!("variant `{}`", variant_name),
                )?;
                display_arms.push(display_arm(&message, &variant.fields, &path));

                if let Some(source) = find_source_field(&variant.fields)? {
                    source_arms.push(source_arm(&variant.fields, &source, &path));
                    if source.from {
                        from_impls.push(from_body(&variant.fields, &source, &path));
                    }
                }
            }
        }
        Data::Struct(data_struct) => {
            let path = quote!(Self);
            let message = extract_error_message_from_attrs(
                &input.attrs,
                &input.ident,
                &format!("type `{}`", input.ident),
            )?;
            display_arms.push(display_arm(&message, &data_struct.fields, &path));

            if let Some(source) = find_source_field(&data_struct.fields)? {
                source_arms.push(source_arm(&data_struct.fields, &source, &path));
                if source.from {
                    from_impls.push(from_body(&data_struct.fields, &source, &path));
                }
            }
        }
        Data::Union(_) => {
            return Err(syn::Error::new_spanned(
                input,
                "Error derive does not support unions",
            ));
        }
    }

    let source_fn = if source_arms.is_empty() {
        quote! {}
    } else {
        quote! {
            #[allow(unreachable_patterns)]
            fn source(&self) -> ::std::option::Option<&(dyn ::std::error::Error + 'static)> {
                match self {
                    #(#source_arms)*
                    _ => ::std::option::Option::None,
                }
            }
        }
    };

    let from_impls = from_impls.into_iter().map(|(ty, body)| {
        quote! {
            impl #impl_generics ::std::convert::From<#ty> for #name #ty_generics #where_clause {
                fn from(source: #ty) -> Self {
                    #body
                }
            }
        }
    });

    Ok(quote! {
        impl #impl_generics ::std::fmt::Display for #name #ty_generics #where_clause {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                match self {
                    #(#display_arms)*
                }
            }
        }

        impl #impl_generics ::std::error::Error for #name #ty_generics #where_clause {
            #source_fn
        }

        #(#from_impls)*
    })
}

/// Builds `pattern => write!(...)` for one variant (or the struct itself).
fn display_arm(message: &str, fields: &Fields, path: &TokenStream2) -> TokenStream2 {
    match fields {
        Fields::Unit => quote! {
            #path => write!(f, #message),
        },
        Fields::Unnamed(unnamed) => {
            let format_str = convert_positional_to_named(message, unnamed.unnamed.len());
            let mut bindings = Vec::new();
            let mut args = Vec::new();
            for i in 0..unnamed.unnamed.len() {
                let ident = format_ident!("f{}", i);
                if references_field(&format_str, &ident.to_string()) {
                    args.push(quote!(#ident = #ident));
                    bindings.push(ident.to_token_stream());
                } else {
                    bindings.push(quote!(_));
                }
            }
            quote! {
                #path(#(#bindings),*) => write!(f, #format_str #(, #args)*),
            }
        }
        Fields::Named(named) => {
            let used: Vec<_> = named
                .named
                .iter()
                .filter_map(|field| field.ident.as_ref())
                .filter(|ident| references_field(message, &ident.to_string()))
                .collect();
            quote! {
                #path { #(#used,)* .. } => write!(f, #message #(, #used = #used)*),
            }
        }
    }
}

/// Builds `pattern => Some(field)` for the variant's source field.
fn source_arm(fields: &Fields, source: &SourceField<'_>, path: &TokenStream2) -> TokenStream2 {
    let binding = format_ident!("__source");
    let pattern = match fields {
        Fields::Named(named) => {
            let ident = named.named[source.index].ident.as_ref();
            quote!(#path { #ident: #binding, .. })
        }
        Fields::Unnamed(unnamed) => {
            let slots = (0..unnamed.unnamed.len()).map(|i| {
                if i == source.index {
                    binding.to_token_stream()
                } else {
                    quote!(_)
                }
            });
            quote!(#path(#(#slots),*))
        }
        Fields::Unit => unreachable!("unit variants have no source field"),
    };
    quote! {
        #pattern => ::std::option::Option::Some(#binding as &(dyn ::std::error::Error + 'static)),
    }
}

/// Returns the converted type and the constructor expression for a `#[from]` field.
fn from_body<'a>(
    fields: &Fields,
    source: &SourceField<'a>,
    path: &TokenStream2,
) -> (&'a Type, TokenStream2) {
    let body = match fields {
        Fields::Named(named) => {
            let ident = named.named[source.index].ident.as_ref();
            quote!(#path { #ident: source })
        }
        _ => quote!(#path(source)),
    };
    (source.ty, body)
}

/// Locates the field tagged `#[source]` or `#[from]`, if any.
fn find_source_field(fields: &Fields) -> syn::Result<Option<SourceField<'_>>> {
    let mut found: Option<SourceField<'_>> = None;
    for (index, field) in fields.iter().enumerate() {
        let from = field.attrs.iter().any(|a| a.path().is_ident("from"));
        let source = from || field.attrs.iter().any(|a| a.path().is_ident("source"));
        if !source {
            continue;
        }
        if found.is_some() {
            return Err(syn::Error::new_spanned(
                field,
                "only one field may be marked #[source] or #[from]",
            ));
        }
        if from && fields.len() != 1 {
            return Err(syn::Error::new_spanned(
                field,
                "#[from] requires the variant to have exactly one field",
            ));
        }
        found = Some(SourceField {
            index,
            ty: &field.ty,
            from,
        });
    }
    Ok(found)
}

/// Extracts the error message from attributes.
fn extract_error_message_from_attrs<T: ToTokens>(
    attrs: &[syn::Attribute],
    target: &T,
    target_desc: &str,
) -> syn::Result<String> {
    for attr in attrs {
        if attr.path().is_ident("error") {
            if let Meta::List(meta_list) = &attr.meta {
                let lit = syn::parse2::<Lit>(meta_list.tokens.clone()).map_err(|_| {
                    syn::Error::new_spanned(
                        &attr.meta,
                        "failed to parse #[error] attribute; expected a string literal like #[error(\"stack underflow\")]",
                    )
                })?;

                if let Lit::Str(lit_str) = lit {
                    return Ok(lit_str.value());
                }

                return Err(syn::Error::new_spanned(
                    &attr.meta,
                    "invalid #[error] attribute: message must be a string literal, e.g. #[error(\"invalid opcode {0}\")]",
                ));
            }

            return Err(syn::Error::new_spanned(
                &attr.meta,
                "invalid #[error] attribute; use #[error(\"message\")] to describe the error",
            ));
        }
    }

    Err(syn::Error::new_spanned(
        target,
        format!(
            "missing #[error(\"...\")] attribute on {}; every error variant must declare a display message",
            target_desc
        ),
    ))
}

/// Returns true when `message` interpolates `name`, with or without a format spec.
fn references_field(message: &str, name: &str) -> bool {
    message.contains(&format!("{{{}}}", name)) || message.contains(&format!("{{{}:", name))
}

/// Converts positional format args `{0}`, `{1:?}` to named args `{f0}`, `{f1:?}`.
fn convert_positional_to_named(format_str: &str, field_count: usize) -> String {
    let mut result = format_str.to_string();
    for i in (0..field_count).rev() {
        result = result
            .replace(&format!("{{{}}}", i), &format!("{{f{}}}", i))
            .replace(&format!("{{{}:", i), &format!("{{f{}:", i));
    }
    result
}
