//! Shared field rendering logic for struct and enum derivation.

use proc_macro2::{Ident, Span, TokenStream};
use quote::{quote, quote_spanned};

use crate::{
    crate_path,
    generics::collect_generics_from_type,
    strategy::{MaskOptions, Position, Strategy},
    types::is_phantom_data,
};

/// Accumulated state during field processing.
pub(crate) struct DeriveContext<'a> {
    pub(crate) generics: &'a syn::Generics,
    /// Generic parameters that need a `Loggable` bound.
    pub(crate) used_generics: &'a mut Vec<Ident>,
}

/// Output for one field: the record call and the static policy entry.
pub(crate) struct FieldTokens {
    /// A `.field(..)` / `.excluded(..)` call on the record writer.
    pub(crate) call: TokenStream,
    /// A `FieldPolicy` expression for the static policy table.
    pub(crate) policy_entry: TokenStream,
}

/// `RedactionPolicy` constant expression for a strategy.
pub(crate) fn policy_tokens(strategy: &Strategy) -> TokenStream {
    let policy = crate_path("RedactionPolicy");
    match strategy {
        Strategy::Plain | Strategy::Skip => quote! { #policy::None },
        Strategy::Exclude => quote! { #policy::Exclude },
        Strategy::Mask(options) => {
            let spec = mask_spec_tokens(options);
            quote! { #policy::Mask(#spec) }
        }
    }
}

fn mask_spec_tokens(options: &MaskOptions) -> TokenStream {
    let mask_spec = crate_path("MaskSpec");
    let mask_position = crate_path("MaskPosition");
    let visible = options
        .visible
        .map_or_else(|| quote! { #mask_spec::DEFAULT_VISIBLE_CHARS }, |visible| quote! { #visible });
    let mask_char = options
        .mask_char
        .map_or_else(|| quote! { #mask_spec::DEFAULT_MASK_CHAR }, |mask_char| quote! { #mask_char });
    let position = match options.position.unwrap_or(Position::Suffix) {
        Position::Prefix => quote! { #mask_position::Prefix },
        Position::Suffix => quote! { #mask_position::Suffix },
    };
    quote! { #mask_spec::new(#visible, #mask_char, #position) }
}

/// Generates the rendering tokens for a single field.
///
/// `access` is an expression of type `&FieldType`. Returns `None` for fields
/// left out of the record (`skip` and `PhantomData` markers).
///
/// ## Field Rendering Rules
///
/// | Annotation | Behavior |
/// |------------|----------|
/// | None | Render with the field's own policies |
/// | `#[loggable(exclude)]` | `[EXCLUDED]`, value untouched |
/// | `#[loggable(mask)]` | Render, then mask |
/// | `#[loggable(skip)]` | Omitted |
pub(crate) fn generate_field_tokens(
    ctx: &mut DeriveContext<'_>,
    ty: &syn::Type,
    name: &str,
    access: &TokenStream,
    span: Span,
    strategy: &Strategy,
) -> Option<FieldTokens> {
    let field_policy = crate_path("FieldPolicy");
    let policy = policy_tokens(strategy);
    let policy_entry = quote! { #field_policy::new(#name, #policy) };

    match strategy {
        Strategy::Skip => None,
        Strategy::Plain if is_phantom_data(ty) => None,
        Strategy::Exclude => Some(FieldTokens {
            call: quote_spanned! { span => .excluded(#name) },
            policy_entry,
        }),
        Strategy::Plain | Strategy::Mask(_) => {
            collect_generics_from_type(ty, ctx.generics, ctx.used_generics);
            Some(FieldTokens {
                call: quote_spanned! { span => .field(#name, &#policy, #access) },
                policy_entry,
            })
        }
    }
}
