//! Redaction policies for fields and parameters.
//!
//! Policies are pure string transformations. They do not traverse structures
//! or decide which values are sensitive; that is the job of the rendering
//! engine and the policy registry.

use std::{fmt, str::FromStr};

use crate::error::ParsePositionError;

/// Placeholder written in place of excluded values.
pub const EXCLUDED_PLACEHOLDER: &str = "[EXCLUDED]";

/// Placeholder written when a value cannot be read while rendering.
pub const INACCESSIBLE_PLACEHOLDER: &str = "[INACCESSIBLE]";

/// Literal written for absent values.
pub const NULL_LITERAL: &str = "null";

/// Which end of a masked value stays visible.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum MaskPosition {
    /// Keep the first `visible_chars` characters, mask the remainder.
    Prefix,
    /// Mask the leading characters, keep the last `visible_chars` visible.
    #[default]
    Suffix,
}

impl fmt::Display for MaskPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Prefix => f.write_str("prefix"),
            Self::Suffix => f.write_str("suffix"),
        }
    }
}

impl FromStr for MaskPosition {
    type Err = ParsePositionError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value.eq_ignore_ascii_case("prefix") {
            Ok(Self::Prefix)
        } else if value.eq_ignore_ascii_case("suffix") {
            Ok(Self::Suffix)
        } else {
            Err(ParsePositionError(value.to_string()))
        }
    }
}

/// Masking parameters: how many characters stay visible, with which symbol
/// the rest is hidden, and at which end the visible part sits.
///
/// Masking operates on Unicode scalar values.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct MaskSpec {
    visible_chars: usize,
    mask_char: char,
    position: MaskPosition,
}

impl MaskSpec {
    /// Default number of visible characters.
    pub const DEFAULT_VISIBLE_CHARS: usize = 4;
    /// Default masking symbol.
    pub const DEFAULT_MASK_CHAR: char = '*';

    /// Constructs a mask specification.
    #[must_use]
    pub const fn new(visible_chars: usize, mask_char: char, position: MaskPosition) -> Self {
        Self {
            visible_chars,
            mask_char,
            position,
        }
    }

    /// Keeps the first `visible_chars` characters visible.
    #[must_use]
    pub const fn prefix(visible_chars: usize) -> Self {
        Self::new(visible_chars, Self::DEFAULT_MASK_CHAR, MaskPosition::Prefix)
    }

    /// Keeps the last `visible_chars` characters visible.
    #[must_use]
    pub const fn suffix(visible_chars: usize) -> Self {
        Self::new(visible_chars, Self::DEFAULT_MASK_CHAR, MaskPosition::Suffix)
    }

    /// Uses a specific masking character.
    #[must_use]
    pub const fn with_mask_char(mut self, mask_char: char) -> Self {
        self.mask_char = mask_char;
        self
    }

    pub const fn visible_chars(&self) -> usize {
        self.visible_chars
    }

    pub const fn mask_char(&self) -> char {
        self.mask_char
    }

    pub const fn position(&self) -> MaskPosition {
        self.position
    }

    /// Applies the mask to `text`.
    #[must_use]
    pub fn apply_to(&self, text: &str) -> String {
        apply_mask(text, self.visible_chars, self.mask_char, self.position)
    }
}

impl Default for MaskSpec {
    fn default() -> Self {
        Self::suffix(Self::DEFAULT_VISIBLE_CHARS)
    }
}

/// The policy attached to a field or a parameter position.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum RedactionPolicy {
    /// Render normally, recursing into composite values.
    #[default]
    None,
    /// Never render the value; write [`EXCLUDED_PLACEHOLDER`] instead.
    Exclude,
    /// Render, then mask the rendered text.
    Mask(MaskSpec),
}

impl RedactionPolicy {
    /// Masking with the default parameters (4 visible, `*`, suffix).
    #[must_use]
    pub const fn default_mask() -> Self {
        Self::Mask(MaskSpec::suffix(MaskSpec::DEFAULT_VISIBLE_CHARS))
    }

    pub const fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}

impl From<MaskSpec> for RedactionPolicy {
    fn from(spec: MaskSpec) -> Self {
        Self::Mask(spec)
    }
}

/// Masks `text`, keeping `visible_chars` characters at the end chosen by
/// `position`.
///
/// If the text is not longer than `visible_chars`, every character is masked.
/// Empty input yields empty output.
#[must_use]
pub fn apply_mask(text: &str, visible_chars: usize, mask_char: char, position: MaskPosition) -> String {
    let mut chars: Vec<char> = text.chars().collect();
    let total = chars.len();

    if total <= visible_chars {
        chars.fill(mask_char);
        return chars.into_iter().collect();
    }

    let masked = match position {
        MaskPosition::Suffix => &mut chars[..total - visible_chars],
        MaskPosition::Prefix => &mut chars[visible_chars..],
    };
    masked.fill(mask_char);
    chars.into_iter().collect()
}

/// Masks the display form of `value` with the default parameters.
///
/// Handy for values logged by hand, e.g. an address pulled out of a request.
#[must_use]
pub fn mask_value(value: &dyn fmt::Display) -> String {
    mask_value_with(value, &MaskSpec::default())
}

/// Masks the display form of `value` with `spec`.
#[must_use]
pub fn mask_value_with(value: &dyn fmt::Display, spec: &MaskSpec) -> String {
    spec.apply_to(&value.to_string())
}
