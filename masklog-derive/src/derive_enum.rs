//! Enum-specific `Loggable` derivation.
//!
//! Unit variants render as their bare name. Variants with data render as a
//! record named after the variant, with the same field rules as structs.

use proc_macro2::{Ident, TokenStream};
use quote::{format_ident, quote};
use syn::{spanned::Spanned, DataEnum, Fields, Index, Result};

use crate::{
    strategy::{parse_field_strategy, Strategy},
    transform::{generate_field_tokens, DeriveContext},
};

pub(crate) struct EnumDeriveOutput {
    pub(crate) describe_body: TokenStream,
    pub(crate) used_generics: Vec<Ident>,
}

pub(crate) fn derive_enum(data: DataEnum, generics: &syn::Generics) -> Result<EnumDeriveOutput> {
    let mut used_generics = Vec::new();
    let mut arms = Vec::new();

    for variant in data.variants {
        let mut ctx = DeriveContext {
            generics,
            used_generics: &mut used_generics,
        };
        let variant_ident = &variant.ident;
        let variant_name = variant_ident.to_string();

        let arm = match variant.fields {
            Fields::Unit => quote! {
                Self::#variant_ident => out.text(#variant_name),
            },
            Fields::Named(fields) => {
                let mut patterns = Vec::new();
                let mut calls = Vec::new();
                for field in fields.named {
                    let Some(ident) = field.ident.as_ref() else {
                        continue;
                    };
                    let strategy = parse_field_strategy(&field.attrs)?;
                    let name = ident.to_string();
                    let name = name.strip_prefix("r#").map_or(name.clone(), ToString::to_string);
                    let binding = format_ident!("__masklog_{}", name);
                    let access = quote! { #binding };
                    if let Some(tokens) =
                        generate_field_tokens(&mut ctx, &field.ty, &name, &access, field.span(), &strategy)
                    {
                        if !matches!(strategy, Strategy::Exclude) {
                            patterns.push(quote! { #ident: #binding });
                        }
                        calls.push(tokens.call);
                    }
                }
                quote! {
                    Self::#variant_ident { #(#patterns,)* .. } => {
                        out.record(#variant_name) #(#calls)*;
                    }
                }
            }
            Fields::Unnamed(fields) => {
                let mut patterns = Vec::new();
                let mut calls = Vec::new();
                for (index, field) in fields.unnamed.into_iter().enumerate() {
                    let strategy = parse_field_strategy(&field.attrs)?;
                    let name = index.to_string();
                    let binding = format_ident!("__masklog_{}", index);
                    let access = quote! { #binding };
                    let tokens =
                        generate_field_tokens(&mut ctx, &field.ty, &name, &access, field.span(), &strategy);
                    match tokens {
                        Some(tokens) if !matches!(strategy, Strategy::Exclude) => {
                            let position = Index::from(index);
                            patterns.push(quote! { #position: #binding });
                            calls.push(tokens.call);
                        }
                        Some(tokens) => calls.push(tokens.call),
                        None => {}
                    }
                }
                quote! {
                    Self::#variant_ident { #(#patterns,)* .. } => {
                        out.record(#variant_name) #(#calls)*;
                    }
                }
            }
        };
        arms.push(arm);
    }

    let describe_body = if arms.is_empty() {
        quote! { match *self {} }
    } else {
        quote! {
            match self {
                #(#arms)*
            }
        }
    };

    Ok(EnumDeriveOutput {
        describe_body,
        used_generics,
    })
}
