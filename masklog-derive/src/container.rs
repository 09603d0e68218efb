//! Container-level attribute parsing for `#[derive(Loggable)]`.
//!
//! This module handles attributes on the struct/enum itself, not on fields.

use syn::{Attribute, LitStr, Meta, Result};

/// Options parsed from container-level `#[loggable(...)]` attributes.
#[derive(Clone, Debug, Default)]
pub(crate) struct ContainerOptions {
    /// Record name written before `{`; defaults to the type name.
    pub(crate) rename: Option<String>,
    /// Render through `Display` as a scalar instead of as a record.
    pub(crate) display: bool,
}

/// Parses container-level `#[loggable(...)]` attributes.
pub(crate) fn parse_container_options(attrs: &[Attribute]) -> Result<ContainerOptions> {
    let mut options = ContainerOptions::default();

    for attr in attrs {
        if !attr.path().is_ident("loggable") {
            continue;
        }

        match &attr.meta {
            Meta::Path(_) => {
                // Bare #[loggable] on container - currently no meaning, ignore
            }
            Meta::List(list) => {
                list.parse_nested_meta(|meta| {
                    if meta.path.is_ident("rename") {
                        let name: LitStr = meta.value()?.parse()?;
                        if name.value().is_empty() {
                            return Err(meta.error("`rename` must not be empty"));
                        }
                        options.rename = Some(name.value());
                        Ok(())
                    } else if meta.path.is_ident("display") {
                        options.display = true;
                        Ok(())
                    } else {
                        Err(meta.error(format!(
                            "unknown container option `{}`; expected `rename` or `display`",
                            meta.path
                                .get_ident()
                                .map_or_else(|| "?".to_string(), ToString::to_string)
                        )))
                    }
                })?;
            }
            Meta::NameValue(nv) => {
                return Err(syn::Error::new_spanned(
                    nv,
                    "name-value syntax is not supported for container-level #[loggable]",
                ));
            }
        }
    }

    Ok(options)
}
