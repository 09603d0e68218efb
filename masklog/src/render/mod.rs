//! Redaction-aware rendering of runtime values into log-safe text.
//!
//! The engine never fails: unreadable values render as `[INACCESSIBLE]`,
//! overly deep nesting as `[MAX DEPTH]`, and shared-pointer cycles as
//! `[CYCLE]`.

mod loggable;
mod renderer;

pub use loggable::{field_policy, DebugValue, DisplayValue, FieldPolicies, FieldPolicy, Loggable};
pub use renderer::{
    RecordWriter, RenderOptions, Renderer, CYCLE_PLACEHOLDER, MAX_DEPTH_PLACEHOLDER,
};

use crate::policy::{MaskSpec, RedactionPolicy};

/// Renders `value` with field-level policies honored and no top-level policy.
#[must_use]
pub fn render(value: &dyn Loggable) -> String {
    Renderer::new().render(value)
}

/// Renders `value`, then masks the result with `mask`.
///
/// `None` stays `null`.
#[must_use]
pub fn render_field(value: &dyn Loggable, mask: &MaskSpec) -> String {
    render_with_policy(value, &RedactionPolicy::Mask(*mask))
}

/// Renders `value` under a top-level `policy`.
#[must_use]
pub fn render_with_policy(value: &dyn Loggable, policy: &RedactionPolicy) -> String {
    Renderer::new().render_with_policy(value, policy)
}
