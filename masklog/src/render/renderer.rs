//! The rendering machinery: a string buffer plus the recursion guards.
//!
//! [`Loggable`] implementations describe themselves by calling into a
//! [`Renderer`]. The renderer owns the output buffer, enforces the depth
//! limit, and tracks shared pointers on the current path so reference cycles
//! terminate.

use std::{
    fmt::{self, Write as _},
    panic::{self, AssertUnwindSafe},
};

use super::loggable::Loggable;
use crate::policy::{
    MaskSpec, RedactionPolicy, EXCLUDED_PLACEHOLDER, INACCESSIBLE_PLACEHOLDER, NULL_LITERAL,
};

/// Written when nesting exceeds [`RenderOptions::max_depth`].
pub const MAX_DEPTH_PLACEHOLDER: &str = "[MAX DEPTH]";

/// Written when a shared pointer refers back to a value being rendered.
pub const CYCLE_PLACEHOLDER: &str = "[CYCLE]";

/// Knobs for a rendering pass.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RenderOptions {
    /// Maximum number of nested values rendered below the root.
    pub max_depth: usize,
}

impl RenderOptions {
    pub const DEFAULT_MAX_DEPTH: usize = 32;
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            max_depth: Self::DEFAULT_MAX_DEPTH,
        }
    }
}

/// Accumulates the rendering of one value.
pub struct Renderer {
    buf: String,
    depth: usize,
    max_depth: usize,
    shared_path: Vec<*const ()>,
    failures: usize,
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer {
    #[must_use]
    pub fn new() -> Self {
        Self::with_options(RenderOptions::default())
    }

    #[must_use]
    pub fn with_options(options: RenderOptions) -> Self {
        Self {
            buf: String::new(),
            depth: 0,
            max_depth: options.max_depth,
            shared_path: Vec::new(),
            failures: 0,
        }
    }

    /// Renders `value` as the root of this pass and returns the text.
    ///
    /// A panic raised by a `Loggable` implementation is contained at the
    /// nearest enclosing value, which renders as [`INACCESSIBLE_PLACEHOLDER`].
    #[must_use]
    pub fn render(mut self, value: &dyn Loggable) -> String {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.nested(value);
            self.buf
        }));
        outcome.unwrap_or_else(|_| INACCESSIBLE_PLACEHOLDER.to_string())
    }

    /// Renders `value` under `policy` as the root of this pass.
    #[must_use]
    pub fn render_with_policy(mut self, value: &dyn Loggable, policy: &RedactionPolicy) -> String {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.policy_value(policy, value);
            self.buf
        }));
        outcome.unwrap_or_else(|_| INACCESSIBLE_PLACEHOLDER.to_string())
    }

    /// Writes the null literal.
    pub fn null(&mut self) {
        self.buf.push_str(NULL_LITERAL);
    }

    /// Writes the display form of a scalar, unmasked.
    pub fn scalar(&mut self, value: &dyn fmt::Display) {
        // Writing into a String cannot fail unless Display itself errors.
        if write!(self.buf, "{value}").is_err() {
            self.buf.push_str(INACCESSIBLE_PLACEHOLDER);
        }
    }

    /// Writes literal text, unmasked.
    pub fn text(&mut self, text: &str) {
        self.buf.push_str(text);
    }

    /// Marks the value as unreadable.
    pub fn inaccessible(&mut self) {
        self.buf.push_str(INACCESSIBLE_PLACEHOLDER);
    }

    /// Renders an ordered sequence as `[a, b, c]`.
    pub fn seq<I>(&mut self, items: I)
    where
        I: IntoIterator,
        I::Item: Loggable,
    {
        self.buf.push('[');
        for (index, item) in items.into_iter().enumerate() {
            if index > 0 {
                self.buf.push_str(", ");
            }
            self.nested(&item);
        }
        self.buf.push(']');
    }

    /// Renders a sequence whose iteration order is unspecified.
    ///
    /// Items are sorted by their rendered text so repeated renderings of the
    /// same value produce identical output.
    pub fn unordered_seq<I>(&mut self, items: I)
    where
        I: IntoIterator,
        I::Item: Loggable,
    {
        let mut rendered: Vec<String> = items
            .into_iter()
            .map(|item| self.detached(|out| out.nested(&item)))
            .collect();
        rendered.sort_unstable();
        self.buf.push('[');
        self.buf.push_str(&rendered.join(", "));
        self.buf.push(']');
    }

    /// Renders ordered entries as `{k=v, k=v}`.
    pub fn map<I, K, V>(&mut self, entries: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Loggable,
        V: Loggable,
    {
        self.buf.push('{');
        for (index, (key, value)) in entries.into_iter().enumerate() {
            if index > 0 {
                self.buf.push_str(", ");
            }
            self.nested(&key);
            self.buf.push('=');
            self.nested(&value);
        }
        self.buf.push('}');
    }

    /// Renders entries whose iteration order is unspecified, sorted by text.
    pub fn unordered_map<I, K, V>(&mut self, entries: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Loggable,
        V: Loggable,
    {
        let mut rendered: Vec<String> = entries
            .into_iter()
            .map(|(key, value)| {
                self.detached(|out| {
                    out.nested(&key);
                    out.buf.push('=');
                    out.nested(&value);
                })
            })
            .collect();
        rendered.sort_unstable();
        self.buf.push('{');
        self.buf.push_str(&rendered.join(", "));
        self.buf.push('}');
    }

    /// Starts a `TypeName{field=value, ...}` record.
    ///
    /// The closing brace is written when the returned writer is finished or
    /// dropped.
    pub fn record(&mut self, type_name: &str) -> RecordWriter<'_> {
        self.buf.push_str(type_name);
        self.buf.push('{');
        RecordWriter {
            out: self,
            first: true,
        }
    }

    /// Renders a value reached through a shared pointer at `addr`.
    ///
    /// If the same allocation is already being rendered further up the path,
    /// [`CYCLE_PLACEHOLDER`] is written instead of recursing.
    pub fn shared(&mut self, addr: *const (), value: &dyn Loggable) {
        if self.shared_path.contains(&addr) {
            self.buf.push_str(CYCLE_PLACEHOLDER);
            return;
        }
        self.shared_path.push(addr);
        value.describe(self);
        self.shared_path.pop();
    }

    /// Renders a child value, enforcing the depth limit.
    ///
    /// A panic raised while the child describes itself is contained here:
    /// whatever the child wrote is discarded and [`INACCESSIBLE_PLACEHOLDER`]
    /// takes its place, so sibling values still render.
    pub fn nested(&mut self, value: &dyn Loggable) {
        if self.depth > self.max_depth {
            self.buf.push_str(MAX_DEPTH_PLACEHOLDER);
            return;
        }
        let (len, depth, shared) = (self.buf.len(), self.depth, self.shared_path.len());
        self.depth += 1;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| value.describe(self)));
        if outcome.is_err() {
            self.buf.truncate(len);
            self.shared_path.truncate(shared);
            self.failures += 1;
            self.buf.push_str(INACCESSIBLE_PLACEHOLDER);
        }
        self.depth = depth;
    }

    /// Renders `value` honoring `policy`.
    pub fn policy_value(&mut self, policy: &RedactionPolicy, value: &dyn Loggable) {
        match policy {
            RedactionPolicy::None => self.nested(value),
            RedactionPolicy::Exclude => self.buf.push_str(EXCLUDED_PLACEHOLDER),
            RedactionPolicy::Mask(spec) => self.masked(spec, value),
        }
    }

    /// Renders `value`, then masks the resulting text.
    ///
    /// Null values stay `null`; masking applies to what would otherwise be
    /// printed. A value that could not be rendered stays unmasked as
    /// [`INACCESSIBLE_PLACEHOLDER`].
    pub fn masked(&mut self, spec: &MaskSpec, value: &dyn Loggable) {
        if value.is_null() {
            self.null();
            return;
        }
        let failures = self.failures;
        let text = self.detached(|out| out.nested(value));
        if self.failures == failures {
            self.buf.push_str(&spec.apply_to(&text));
        } else {
            self.buf.push_str(INACCESSIBLE_PLACEHOLDER);
        }
    }

    /// Runs `render` against an empty buffer and returns what it wrote,
    /// keeping depth and cycle state.
    fn detached(&mut self, render: impl FnOnce(&mut Self)) -> String {
        let saved = std::mem::take(&mut self.buf);
        render(self);
        std::mem::replace(&mut self.buf, saved)
    }
}

/// Writes the fields of a record started with [`Renderer::record`].
pub struct RecordWriter<'r> {
    out: &'r mut Renderer,
    first: bool,
}

impl RecordWriter<'_> {
    fn separator(&mut self, name: &str) {
        if !self.first {
            self.out.buf.push_str(", ");
        }
        self.first = false;
        self.out.buf.push_str(name);
        self.out.buf.push('=');
    }

    /// Writes `name=<value under policy>`.
    pub fn field(&mut self, name: &str, policy: &RedactionPolicy, value: &dyn Loggable) -> &mut Self {
        self.separator(name);
        self.out.policy_value(policy, value);
        self
    }

    /// Writes `name=[EXCLUDED]` without touching the value.
    pub fn excluded(&mut self, name: &str) -> &mut Self {
        self.separator(name);
        self.out.buf.push_str(EXCLUDED_PLACEHOLDER);
        self
    }

    /// Writes `name=[INACCESSIBLE]`.
    pub fn inaccessible(&mut self, name: &str) -> &mut Self {
        self.separator(name);
        self.out.inaccessible();
        self
    }

    /// Closes the record.
    pub fn finish(self) {}
}

impl Drop for RecordWriter<'_> {
    fn drop(&mut self) {
        self.out.buf.push('}');
    }
}
