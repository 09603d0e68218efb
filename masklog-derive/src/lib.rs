//! Derive macro for `masklog`.
//!
//! This crate generates the rendering code behind `#[derive(Loggable)]`. It:
//! - reads `#[loggable(...)]` container and field attributes
//! - emits a `Loggable` implementation that describes the value to a renderer
//! - emits the static `FieldPolicies` table for structs
//!
//! It does **not** render or mask anything itself. Those live in the main
//! `masklog` crate and are applied at runtime.

// <https://doc.rust-lang.org/rustc/lints/listing/allowed-by-default.html>
#![warn(
    anonymous_parameters,
    bare_trait_objects,
    elided_lifetimes_in_paths,
    missing_copy_implementations,
    rust_2018_idioms,
    trivial_casts,
    trivial_numeric_casts,
    unreachable_pub,
    unsafe_code,
    unused_extern_crates,
    unused_import_braces
)]
// <https://rust-lang.github.io/rust-clippy/stable>
#![warn(
    clippy::all,
    clippy::cargo,
    clippy::dbg_macro,
    clippy::float_cmp_const,
    clippy::get_unwrap,
    clippy::mem_forget,
    clippy::nursery,
    clippy::pedantic,
    clippy::todo,
    clippy::unwrap_used,
    clippy::uninlined_format_args
)]
// Allow some clippy lints
#![allow(
    clippy::default_trait_access,
    clippy::doc_markdown,
    clippy::if_not_else,
    clippy::module_name_repetitions,
    clippy::multiple_crate_versions,
    clippy::must_use_candidate,
    clippy::needless_pass_by_value,
    clippy::needless_ifs,
    clippy::use_self,
    clippy::cargo_common_metadata,
    clippy::missing_errors_doc,
    clippy::enum_glob_use,
    clippy::struct_excessive_bools,
    clippy::missing_const_for_fn,
    clippy::redundant_pub_crate,
    clippy::result_large_err,
    clippy::future_not_send,
    clippy::option_if_let_else,
    clippy::from_over_into,
    clippy::manual_inspect
)]
// Allow some lints while testing
#![cfg_attr(test, allow(clippy::non_ascii_literal, clippy::unwrap_used))]

#[allow(unused_extern_crates)]
extern crate proc_macro;

use proc_macro2::TokenStream;
use proc_macro_crate::{crate_name, FoundCrate};
use quote::{format_ident, quote};
use syn::{parse_macro_input, spanned::Spanned, Data, DeriveInput, Result};

mod container;
mod derive_enum;
mod derive_struct;
mod generics;
mod strategy;
mod transform;
mod types;
use container::{parse_container_options, ContainerOptions};
use derive_enum::derive_enum;
use derive_struct::derive_struct;
use generics::add_loggable_bounds;

/// Derives `masklog::Loggable` for structs and enums.
///
/// # Container Attributes
///
/// - `#[loggable(rename = "Name")]` - Record name used in the rendering instead of the type name
///   (structs only).
/// - `#[loggable(display)]` - Render the whole value through its `Display` implementation as a
///   scalar. No field attributes apply.
///
/// # Field Attributes
///
/// - **No annotation**: The field is rendered with its own policies, recursing into nested
///   `Loggable` records.
/// - `#[loggable(exclude)]`: The field renders as `[EXCLUDED]`. Its value is never touched, so
///   its type needs no `Loggable` impl.
/// - `#[loggable(mask)]` / `#[loggable(mask(visible = 2, char = '#', position = "prefix"))]`: The
///   field is rendered, then masked. Unset options default to 4 visible characters, `*` and
///   suffix.
/// - `#[loggable(skip)]`: The field is left out of the record.
///
/// `PhantomData` fields are omitted. Unions are rejected at compile time.
///
/// # Additional Generated Impls
///
/// - `FieldPolicies` (structs): the static field-to-policy table.
/// - `slog::Value` (behind `cfg(feature = "slog")`): logs the redacted rendering.
#[proc_macro_derive(Loggable, attributes(loggable))]
pub fn derive_loggable(input: proc_macro::TokenStream) -> proc_macro::TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand(input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.into_compile_error().into(),
    }
}

/// Returns the token stream to reference the masklog crate root.
///
/// Handles crate renaming (e.g., `my_log = { package = "masklog", ... }`).
/// Inside masklog itself (unit, integration and doc tests alike) the path is
/// `::masklog`, which the crate provides through `extern crate self`.
fn crate_root() -> TokenStream {
    match crate_name("masklog") {
        Ok(FoundCrate::Itself) => quote! { ::masklog },
        Ok(FoundCrate::Name(name)) => {
            let ident = format_ident!("{}", name);
            quote! { ::#ident }
        }
        Err(_) => quote! { ::masklog },
    }
}

fn crate_path(item: &str) -> TokenStream {
    let root = crate_root();
    let item_ident = format_ident!("{}", item);
    quote! { #root::#item_ident }
}

struct DeriveOutput {
    describe_body: TokenStream,
    used_generics: Vec<syn::Ident>,
    policy_entries: Option<Vec<TokenStream>>,
}

fn expand(input: DeriveInput) -> Result<TokenStream> {
    let DeriveInput {
        ident,
        generics,
        data,
        attrs,
        ..
    } = input;

    let ContainerOptions { rename, display } = parse_container_options(&attrs)?;
    let crate_root = crate_root();

    if display {
        if rename.is_some() {
            return Err(syn::Error::new(
                ident.span(),
                "`rename` has no effect together with `display`",
            ));
        }
        return Ok(expand_display(&ident, &generics, &crate_root));
    }

    let derive_output = match data {
        Data::Struct(data) => {
            let record_name = rename.unwrap_or_else(|| ident.to_string());
            let output = derive_struct(&record_name, data, &generics)?;
            DeriveOutput {
                describe_body: output.describe_body,
                used_generics: output.used_generics,
                policy_entries: Some(output.policy_entries),
            }
        }
        Data::Enum(data) => {
            if rename.is_some() {
                return Err(syn::Error::new(
                    ident.span(),
                    "`rename` is only supported on structs",
                ));
            }
            let output = derive_enum(data, &generics)?;
            DeriveOutput {
                describe_body: output.describe_body,
                used_generics: output.used_generics,
                policy_entries: None,
            }
        }
        Data::Union(u) => {
            return Err(syn::Error::new(
                u.union_token.span(),
                "`Loggable` cannot be derived for unions",
            ));
        }
    };

    let bounded = add_loggable_bounds(generics.clone(), &derive_output.used_generics);
    let (impl_generics, ty_generics, where_clause) = bounded.split_for_impl();
    let describe_body = &derive_output.describe_body;

    let policies_impl = derive_output.policy_entries.map_or_else(
        || quote! {},
        |entries| {
            let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();
            quote! {
                impl #impl_generics #crate_root::FieldPolicies for #ident #ty_generics #where_clause {
                    const FIELD_POLICIES: &'static [#crate_root::FieldPolicy] = &[#(#entries),*];
                }
            }
        },
    );

    let slog_impl = slog_impl(&ident, &bounded, &crate_root);

    Ok(quote! {
        impl #impl_generics #crate_root::Loggable for #ident #ty_generics #where_clause {
            fn describe(&self, out: &mut #crate_root::Renderer) {
                #describe_body
            }
        }

        #policies_impl

        #slog_impl
    })
}

fn expand_display(ident: &syn::Ident, generics: &syn::Generics, crate_root: &TokenStream) -> TokenStream {
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();
    let predicates = where_clause.map(|clause| &clause.predicates);
    let slog_impl = slog_impl(ident, generics, crate_root);
    quote! {
        impl #impl_generics #crate_root::Loggable for #ident #ty_generics
        where
            #ident #ty_generics: ::core::fmt::Display,
            #predicates
        {
            fn describe(&self, out: &mut #crate_root::Renderer) {
                out.scalar(self);
            }
        }

        #slog_impl
    }
}

/// `slog::Value` impl, compiled only when the deriving crate has masklog's
/// `slog` feature enabled. It reaches slog through masklog's re-export, so the
/// deriving crate needs no direct `slog` dependency.
#[cfg(feature = "slog")]
fn slog_impl(ident: &syn::Ident, generics: &syn::Generics, crate_root: &TokenStream) -> TokenStream {
    let slog = quote! { #crate_root::slog::__slog };
    let mut slog_generics = generics.clone();
    let (_, ty_generics, _) = generics.split_for_impl();
    let self_ty: syn::Type = syn::parse_quote!(#ident #ty_generics);
    slog_generics
        .make_where_clause()
        .predicates
        .push(syn::parse_quote!(#self_ty: #crate_root::Loggable));
    let (impl_generics, ty_generics, where_clause) = slog_generics.split_for_impl();
    quote! {
        impl #impl_generics #slog::Value for #ident #ty_generics #where_clause {
            fn serialize(
                &self,
                record: &#slog::Record<'_>,
                key: #slog::Key,
                serializer: &mut dyn #slog::Serializer,
            ) -> #slog::Result {
                let rendered = #crate_root::slog::Rendered::new(self);
                #slog::Value::serialize(&rendered, record, key, serializer)
            }
        }
    }
}

#[cfg(not(feature = "slog"))]
fn slog_impl(_ident: &syn::Ident, _generics: &syn::Generics, _crate_root: &TokenStream) -> TokenStream {
    quote! {}
}
