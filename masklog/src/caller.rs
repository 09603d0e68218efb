//! Resolves which registered method is calling the logger.
//!
//! Direct log calls carry no method identity. When the caller does not bind
//! one explicitly (see [`MaskedLogger::bind`](crate::MaskedLogger::bind)),
//! the resolver inspects the current stack: it skips the frames of this
//! library and of the runtime, takes the first frame outside both as the
//! caller, and looks that frame up among the registered methods.
//!
//! Stack inspection is best-effort. Inlined callers have no frame of their
//! own, stripped binaries have no symbols, and two registrations sharing a
//! type name and method name are told apart by registration order only. A
//! failed resolution yields `None` and the arguments are redacted without
//! parameter policies.

use std::{
    backtrace::{Backtrace, BacktraceStatus},
    borrow::Cow,
    sync::Arc,
};

use dashmap::DashMap;

use crate::{descriptor::MethodDescriptor, registry::PolicyRegistry};

const LIBRARY_PREFIXES: &[&str] = &["masklog::"];

const RUNTIME_PREFIXES: &[&str] = &[
    "std::",
    "core::",
    "alloc::",
    "backtrace::",
    "test::",
    "__rust",
    "rust_begin_unwind",
];

/// Maps stack frames to registered method descriptors, with a memo cache
/// keyed by `Type.method`.
#[derive(Debug)]
pub struct CallerResolver {
    registry: Arc<PolicyRegistry>,
    library_prefixes: Vec<Cow<'static, str>>,
    cache: DashMap<String, Option<Arc<MethodDescriptor>>>,
}

impl CallerResolver {
    #[must_use]
    pub fn new(registry: Arc<PolicyRegistry>) -> Self {
        Self {
            registry,
            library_prefixes: LIBRARY_PREFIXES.iter().map(|&prefix| Cow::Borrowed(prefix)).collect(),
            cache: DashMap::new(),
        }
    }

    /// Treats frames under `prefix` (a module path such as `app::logging::`)
    /// as part of the logging facility, so wrappers around the logger are
    /// skipped too.
    #[must_use]
    pub fn with_library_prefix(mut self, prefix: impl Into<Cow<'static, str>>) -> Self {
        self.library_prefixes.push(prefix.into());
        self
    }

    pub fn registry(&self) -> &Arc<PolicyRegistry> {
        &self.registry
    }

    /// Resolves the registered method that called into this library.
    #[inline(never)]
    pub fn resolve_caller_policy_context(&self) -> Option<Arc<MethodDescriptor>> {
        let backtrace = Backtrace::force_capture();
        if backtrace.status() != BacktraceStatus::Captured {
            return None;
        }
        let rendered = backtrace.to_string();
        self.resolve_frames(frame_symbols(&rendered))
    }

    /// Walks `frames` innermost first: skips everything up to and including
    /// the frames of the logging facility, skips runtime frames, and resolves
    /// the first frame left.
    pub fn resolve_frames<'s>(&self, frames: impl IntoIterator<Item = &'s str>) -> Option<Arc<MethodDescriptor>> {
        let mut inside_library = false;
        for symbol in frames {
            let cleaned = clean_symbol(symbol);
            if self.is_library(&cleaned) {
                inside_library = true;
                continue;
            }
            if !inside_library || is_runtime(&cleaned) {
                continue;
            }
            return self.resolve_cleaned(&cleaned);
        }
        None
    }

    /// Resolves one demangled frame symbol such as `app::Service::login` or
    /// `<app::Service as app::Api>::login::{{closure}}`.
    pub fn resolve_frame(&self, symbol: &str) -> Option<Arc<MethodDescriptor>> {
        self.resolve_cleaned(&clean_symbol(symbol))
    }

    fn resolve_cleaned(&self, cleaned: &str) -> Option<Arc<MethodDescriptor>> {
        let (owner, method) = split_owner(cleaned)?;
        let key = format!("{owner}.{method}");
        if let Some(hit) = self.cache.get(&key) {
            return hit.clone();
        }
        self.cache
            .entry(key)
            .or_insert_with(|| self.registry.find_by_frame(owner, method))
            .clone()
    }

    fn is_library(&self, cleaned: &str) -> bool {
        self.library_prefixes
            .iter()
            .any(|prefix| cleaned.starts_with(prefix.as_ref()))
    }
}

fn is_runtime(cleaned: &str) -> bool {
    RUNTIME_PREFIXES.iter().any(|prefix| cleaned.starts_with(prefix))
}

/// Symbol names of a rendered `std::backtrace::Backtrace`, innermost first.
fn frame_symbols(rendered: &str) -> impl Iterator<Item = &str> {
    rendered.lines().filter_map(|line| {
        let (index, symbol) = line.trim_start().split_once(": ")?;
        let is_index = !index.is_empty() && index.bytes().all(|byte| byte.is_ascii_digit());
        is_index.then_some(symbol.trim())
    })
}

/// Normalizes a demangled symbol to a plain `a::b::Type::method` path.
///
/// Drops the trailing hash, reduces `<Type as Trait>` to `Type`, removes
/// generic arguments and closure or shim segments.
pub(crate) fn clean_symbol(symbol: &str) -> String {
    let symbol = strip_hash(symbol.trim());
    let symbol = qualified_self(symbol);
    let without_generics = strip_generics(&symbol);
    without_generics
        .split("::")
        .filter(|segment| !segment.is_empty() && !segment.starts_with('{'))
        .collect::<Vec<_>>()
        .join("::")
}

fn strip_hash(symbol: &str) -> &str {
    match symbol.rsplit_once("::") {
        Some((head, last))
            if last.len() == 17
                && last.starts_with('h')
                && last[1..].bytes().all(|byte| byte.is_ascii_hexdigit()) =>
        {
            head
        }
        _ => symbol,
    }
}

/// `<A as B>::rest` becomes `A::rest`; `<A>::rest` becomes `A::rest`.
fn qualified_self(symbol: &str) -> Cow<'_, str> {
    if !symbol.starts_with('<') {
        return Cow::Borrowed(symbol);
    }
    let mut depth = 0_usize;
    let mut close = None;
    for (offset, ch) in symbol.char_indices() {
        match ch {
            '<' => depth += 1,
            '>' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    close = Some(offset);
                    break;
                }
            }
            _ => {}
        }
    }
    let Some(close) = close else {
        return Cow::Borrowed(symbol);
    };
    let inner = &symbol[1..close];
    let self_type = top_level_as(inner).map_or(inner, |split| &inner[..split]);
    Cow::Owned(format!("{}{}", self_type.trim(), &symbol[close + 1..]))
}

/// Byte offset of the first ` as ` outside any generic argument list.
fn top_level_as(inner: &str) -> Option<usize> {
    let mut depth = 0_usize;
    for (offset, ch) in inner.char_indices() {
        match ch {
            '<' => depth += 1,
            '>' => depth = depth.saturating_sub(1),
            ' ' if depth == 0 && inner[offset..].starts_with(" as ") => return Some(offset),
            _ => {}
        }
    }
    None
}

fn strip_generics(symbol: &str) -> String {
    let mut depth = 0_usize;
    let mut out = String::with_capacity(symbol.len());
    for ch in symbol.chars() {
        match ch {
            '<' => depth += 1,
            '>' => depth = depth.saturating_sub(1),
            _ if depth == 0 => out.push(ch),
            _ => {}
        }
    }
    out
}

/// Splits `a::b::Type::method` into `("Type", "method")`.
fn split_owner(cleaned: &str) -> Option<(&str, &str)> {
    let (path, method) = cleaned.rsplit_once("::")?;
    let owner = path.rsplit("::").next().unwrap_or(path);
    (!owner.is_empty() && !method.is_empty()).then_some((owner, method))
}
