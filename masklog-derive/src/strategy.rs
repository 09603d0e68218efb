//! Parsing of `#[loggable(...)]` field attributes.
//!
//! This module maps attribute syntax to rendering decisions and produces
//! structured errors for invalid forms.

use proc_macro2::Span;
use syn::{meta::ParseNestedMeta, spanned::Spanned, Attribute, LitChar, LitInt, LitStr, Meta, Result};

/// Which end of a masked value stays visible.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Position {
    Prefix,
    Suffix,
}

/// Arguments of `#[loggable(mask(...))]`; unset values take the runtime
/// defaults (4 visible, `*`, suffix).
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub(crate) struct MaskOptions {
    pub(crate) visible: Option<usize>,
    pub(crate) mask_char: Option<char>,
    pub(crate) position: Option<Position>,
}

/// Field rendering strategy based on `#[loggable(...)]` attributes.
///
/// ## Strategy Mapping
///
/// | Attribute | Strategy | Rendering |
/// |-----------|----------|-----------|
/// | None | `Plain` | `name=<value>`, recursing into composites |
/// | `#[loggable(exclude)]` | `Exclude` | `name=[EXCLUDED]` |
/// | `#[loggable(mask)]` | `Mask` | `name=<masked rendering>` |
/// | `#[loggable(skip)]` | `Skip` | omitted |
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) enum Strategy {
    /// No annotation: render the value with its own field policies.
    Plain,
    /// Never render the value.
    Exclude,
    /// Render, then mask the rendered text.
    Mask(MaskOptions),
    /// Leave the field out of the record entirely.
    Skip,
}

fn set_strategy(target: &mut Option<Strategy>, next: Strategy, span: Span) -> Result<()> {
    if target.is_some() {
        return Err(syn::Error::new(
            span,
            "multiple #[loggable] options specified on the same field",
        ));
    }
    *target = Some(next);
    Ok(())
}

fn parse_mask_options(meta: &ParseNestedMeta<'_>) -> Result<MaskOptions> {
    let mut options = MaskOptions::default();
    if meta.input.is_empty() || meta.input.peek(syn::Token![,]) {
        return Ok(options);
    }
    meta.parse_nested_meta(|inner| {
        if inner.path.is_ident("visible") {
            let value: LitInt = inner.value()?.parse()?;
            options.visible = Some(value.base10_parse()?);
        } else if inner.path.is_ident("char") {
            let value: LitChar = inner.value()?.parse()?;
            options.mask_char = Some(value.value());
        } else if inner.path.is_ident("position") {
            let value: LitStr = inner.value()?.parse()?;
            options.position = Some(match value.value().as_str() {
                "prefix" => Position::Prefix,
                "suffix" => Position::Suffix,
                _ => {
                    return Err(syn::Error::new(
                        value.span(),
                        "mask position must be \"prefix\" or \"suffix\"",
                    ))
                }
            });
        } else {
            return Err(inner.error("unknown mask option; expected `visible`, `char` or `position`"));
        }
        Ok(())
    })?;
    Ok(options)
}

pub(crate) fn parse_field_strategy(attrs: &[Attribute]) -> Result<Strategy> {
    let mut strategy: Option<Strategy> = None;
    for attr in attrs {
        if !attr.path().is_ident("loggable") {
            continue;
        }

        match &attr.meta {
            Meta::Path(_) => {
                return Err(syn::Error::new(
                    attr.span(),
                    "expected an option: #[loggable(exclude)], #[loggable(mask)] or #[loggable(skip)]",
                ));
            }
            Meta::List(list) => {
                list.parse_nested_meta(|meta| {
                    let span = meta.path.span();
                    if meta.path.is_ident("exclude") {
                        set_strategy(&mut strategy, Strategy::Exclude, span)
                    } else if meta.path.is_ident("skip") {
                        set_strategy(&mut strategy, Strategy::Skip, span)
                    } else if meta.path.is_ident("mask") {
                        let options = parse_mask_options(&meta)?;
                        set_strategy(&mut strategy, Strategy::Mask(options), span)
                    } else {
                        Err(meta.error("unknown field option; expected `exclude`, `mask` or `skip`"))
                    }
                })?;
            }
            Meta::NameValue(_) => {
                return Err(syn::Error::new(
                    attr.span(),
                    "name-value syntax is not supported for #[loggable]",
                ));
            }
        }
    }

    Ok(strategy.unwrap_or(Strategy::Plain))
}
