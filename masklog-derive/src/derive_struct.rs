//! Struct-specific `Loggable` derivation.
//!
//! Structs render as `Name{field=value, ...}` in declaration order. Tuple
//! struct fields are named by position (`0`, `1`, ...).

use proc_macro2::{Ident, TokenStream};
use quote::quote;
use syn::{spanned::Spanned, DataStruct, Fields, Index, Result};

use crate::{
    strategy::parse_field_strategy,
    transform::{generate_field_tokens, DeriveContext},
};

pub(crate) struct StructDeriveOutput {
    pub(crate) describe_body: TokenStream,
    pub(crate) policy_entries: Vec<TokenStream>,
    pub(crate) used_generics: Vec<Ident>,
}

pub(crate) fn derive_struct(record_name: &str, data: DataStruct, generics: &syn::Generics) -> Result<StructDeriveOutput> {
    let mut used_generics = Vec::new();
    let mut calls = Vec::new();
    let mut policy_entries = Vec::new();
    let mut ctx = DeriveContext {
        generics,
        used_generics: &mut used_generics,
    };

    let fields: Vec<syn::Field> = match data.fields {
        Fields::Named(fields) => fields.named.into_iter().collect(),
        Fields::Unnamed(fields) => fields.unnamed.into_iter().collect(),
        Fields::Unit => Vec::new(),
    };

    for (index, field) in fields.into_iter().enumerate() {
        let span = field.span();
        let strategy = parse_field_strategy(&field.attrs)?;
        let (name, access) = match &field.ident {
            Some(ident) => (ident.to_string(), quote! { &self.#ident }),
            None => {
                let position = Index::from(index);
                (index.to_string(), quote! { &self.#position })
            }
        };
        let name = name.strip_prefix("r#").map_or(name.clone(), ToString::to_string);

        if let Some(tokens) = generate_field_tokens(&mut ctx, &field.ty, &name, &access, span, &strategy) {
            calls.push(tokens.call);
            policy_entries.push(tokens.policy_entry);
        }
    }

    Ok(StructDeriveOutput {
        describe_body: quote! {
            out.record(#record_name) #(#calls)*;
        },
        policy_entries,
        used_generics,
    })
}
