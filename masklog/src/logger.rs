//! Direct logging with caller-aware redaction.
//!
//! [`MaskedLogger`] is a drop-in for ad-hoc log calls. Templates use
//! sequential `{}` placeholders; every argument is rendered under the
//! parameter policy of the calling method at the same position.
//!
//! The calling method is taken from an explicit binding when there is one:
//!
//! ```rust
//! use std::sync::Arc;
//! use masklog::{
//!     CallerResolver, Loggable, MaskedLogger, MemorySink, MethodDescriptor, MethodPolicies,
//!     PolicyRegistry,
//! };
//!
//! let login = MethodDescriptor::new("AuthService", "login")
//!     .param("email", "String")
//!     .param("password", "String");
//! let registry = PolicyRegistry::builder()
//!     .method(login.clone(), MethodPolicies::new().exclude(1))
//!     .build()?;
//! let resolver = Arc::new(CallerResolver::new(Arc::new(registry)));
//! let logger = MaskedLogger::new("auth", MemorySink::new(), resolver);
//!
//! let email = "alice@example.com";
//! let password = "hunter2";
//! let args: [&dyn Loggable; 2] = [&email, &password];
//! logger.bind(&login).info("login {} / {}", &args);
//!
//! assert_eq!(logger.sink().texts(), ["login alice@example.com / [EXCLUDED]"]);
//! # Ok::<(), masklog::RegistryError>(())
//! ```
//!
//! Without a binding, the caller is resolved from the stack; see
//! [`CallerResolver`].

use std::{borrow::Cow, error::Error, fmt, sync::Arc};

use crate::{
    caller::CallerResolver,
    descriptor::MethodDescriptor,
    level::Level,
    operation::{render_trace, ThrownError},
    policy::RedactionPolicy,
    render::{Loggable, RenderOptions, Renderer},
    sink::Sink,
};

/// Replaces sequential `{}` placeholders with `values`.
///
/// Placeholders beyond the last value stay verbatim; values beyond the last
/// placeholder are dropped.
#[must_use]
pub fn fill_placeholders(template: &str, values: &[String]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut values = values.iter();
    let mut rest = template;
    while let Some(offset) = rest.find("{}") {
        out.push_str(&rest[..offset]);
        match values.next() {
            Some(value) => out.push_str(value),
            None => out.push_str("{}"),
        }
        rest = &rest[offset + 2..];
    }
    out.push_str(rest);
    out
}

/// A logger for one target that redacts its arguments.
pub struct MaskedLogger<S> {
    target: Cow<'static, str>,
    sink: S,
    resolver: Arc<CallerResolver>,
    render_options: RenderOptions,
}

impl<S: fmt::Debug> fmt::Debug for MaskedLogger<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MaskedLogger")
            .field("target", &self.target)
            .field("sink", &self.sink)
            .finish_non_exhaustive()
    }
}

impl<S: Sink> MaskedLogger<S> {
    pub fn new(target: impl Into<Cow<'static, str>>, sink: S, resolver: Arc<CallerResolver>) -> Self {
        Self {
            target: target.into(),
            sink,
            resolver,
            render_options: RenderOptions::default(),
        }
    }

    /// A logger whose target is the type name of `T`.
    pub fn for_type<T: ?Sized>(sink: S, resolver: Arc<CallerResolver>) -> Self {
        Self::new(std::any::type_name::<T>(), sink, resolver)
    }

    #[must_use]
    pub fn with_render_options(mut self, render_options: RenderOptions) -> Self {
        self.render_options = render_options;
        self
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn is_enabled(&self, level: Level) -> bool {
        self.sink.is_enabled(level)
    }

    /// Binds an explicit method identity; no stack inspection happens.
    pub fn bind<'l>(&'l self, method: &'l MethodDescriptor) -> BoundLogger<'l, S> {
        BoundLogger {
            logger: self,
            method,
        }
    }

    #[inline(never)]
    pub fn trace(&self, template: &str, args: &[&dyn Loggable]) {
        self.log(Level::Trace, template, args);
    }

    #[inline(never)]
    pub fn debug(&self, template: &str, args: &[&dyn Loggable]) {
        self.log(Level::Debug, template, args);
    }

    #[inline(never)]
    pub fn info(&self, template: &str, args: &[&dyn Loggable]) {
        self.log(Level::Info, template, args);
    }

    #[inline(never)]
    pub fn warn(&self, template: &str, args: &[&dyn Loggable]) {
        self.log(Level::Warn, template, args);
    }

    #[inline(never)]
    pub fn error(&self, template: &str, args: &[&dyn Loggable]) {
        self.log(Level::Error, template, args);
    }

    /// Logs `template` followed by the cause chain of `error`.
    ///
    /// The message is not templated and the error is not redacted.
    pub fn error_with<E: Error + 'static>(&self, template: &str, error: &E) {
        if !self.is_enabled(Level::Error) {
            return;
        }
        let mut text = template.to_string();
        for link in render_trace(&ThrownError::new(error)) {
            text.push_str("\n\t");
            text.push_str(&link);
        }
        self.sink.message(Level::Error, &self.target, &text);
    }

    /// Logs at `level`, resolving parameter policies from the calling method.
    #[inline(never)]
    pub fn log(&self, level: Level, template: &str, args: &[&dyn Loggable]) {
        if !self.is_enabled(level) {
            return;
        }
        let method = if args.is_empty() {
            None
        } else {
            self.resolver.resolve_caller_policy_context()
        };
        self.write(level, template, args, method.as_deref());
    }

    fn write(&self, level: Level, template: &str, args: &[&dyn Loggable], method: Option<&MethodDescriptor>) {
        let registry = self.resolver.registry();
        let rendered: Vec<String> = args
            .iter()
            .enumerate()
            .map(|(index, value)| {
                let policy = method.map_or(RedactionPolicy::None, |method| {
                    registry.policy_for_parameter(method, index)
                });
                Renderer::with_options(self.render_options).render_with_policy(*value, &policy)
            })
            .collect();
        self.sink
            .message(level, &self.target, &fill_placeholders(template, &rendered));
    }
}

/// A [`MaskedLogger`] bound to an explicit method.
pub struct BoundLogger<'l, S> {
    logger: &'l MaskedLogger<S>,
    method: &'l MethodDescriptor,
}

impl<S: Sink> BoundLogger<'_, S> {
    pub fn method(&self) -> &MethodDescriptor {
        self.method
    }

    pub fn log(&self, level: Level, template: &str, args: &[&dyn Loggable]) {
        if self.logger.is_enabled(level) {
            self.logger.write(level, template, args, Some(self.method));
        }
    }

    pub fn trace(&self, template: &str, args: &[&dyn Loggable]) {
        self.log(Level::Trace, template, args);
    }

    pub fn debug(&self, template: &str, args: &[&dyn Loggable]) {
        self.log(Level::Debug, template, args);
    }

    pub fn info(&self, template: &str, args: &[&dyn Loggable]) {
        self.log(Level::Info, template, args);
    }

    pub fn warn(&self, template: &str, args: &[&dyn Loggable]) {
        self.log(Level::Warn, template, args);
    }

    pub fn error(&self, template: &str, args: &[&dyn Loggable]) {
        self.log(Level::Error, template, args);
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::Cell, sync::Arc};

    use super::{fill_placeholders, MaskedLogger};
    use crate::{
        caller::CallerResolver,
        descriptor::MethodDescriptor,
        level::Level,
        policy::MaskSpec,
        registry::{MethodPolicies, PolicyRegistry},
        render::{Loggable, Renderer},
        sink::MemorySink,
    };

    fn transfer() -> MethodDescriptor {
        MethodDescriptor::new("bank::Transfers", "send")
            .param("iban", "String")
            .param("amount", "u64")
    }

    fn logger(sink: MemorySink) -> MaskedLogger<MemorySink> {
        let registry = PolicyRegistry::builder()
            .method(transfer(), MethodPolicies::new().mask(0, MaskSpec::suffix(4)))
            .build()
            .unwrap();
        MaskedLogger::new("bank", sink, Arc::new(CallerResolver::new(Arc::new(registry))))
    }

    #[test]
    fn placeholders_fill_in_order() {
        let values = vec!["a".to_string(), "b".to_string()];
        assert_eq!(fill_placeholders("{} then {}", &values), "a then b");
        assert_eq!(fill_placeholders("{} {} {}", &values), "a b {}");
        assert_eq!(fill_placeholders("none", &values), "none");
        assert_eq!(fill_placeholders("{}", &[]), "{}");
    }

    #[test]
    fn bound_logger_applies_parameter_policies() {
        let logger = logger(MemorySink::new());
        let iban = "DE89370400440532013000".to_string();
        let args: [&dyn Loggable; 2] = [&iban, &250_u64];
        logger.bind(&transfer()).warn("sending {} ({})", &args);

        let messages = logger.sink().messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].level, Level::Warn);
        assert_eq!(messages[0].target, "bank");
        assert_eq!(messages[0].text, "sending ******************3000 (250)");
    }

    #[test]
    fn unresolved_caller_renders_without_policies() {
        let logger = logger(MemorySink::new());
        let iban = "DE89370400440532013000".to_string();
        let args: [&dyn Loggable; 1] = [&iban];
        logger.info("iban {}", &args);
        assert_eq!(logger.sink().texts(), ["iban DE89370400440532013000"]);
    }

    struct Counting<'c>(&'c Cell<usize>);

    impl Loggable for Counting<'_> {
        fn describe(&self, out: &mut Renderer) {
            self.0.set(self.0.get() + 1);
            out.text("counted");
        }
    }

    #[test]
    fn disabled_level_renders_nothing() {
        let logger = logger(MemorySink::with_min_level(Level::Warn));
        let renders = Cell::new(0);
        let counting = Counting(&renders);
        let args: [&dyn Loggable; 1] = [&counting];

        logger.debug("value {}", &args);
        logger.bind(&transfer()).info("value {}", &args);
        assert_eq!(renders.get(), 0);
        assert!(logger.sink().messages().is_empty());

        logger.error("value {}", &args);
        assert_eq!(renders.get(), 1);
    }

    #[test]
    fn error_with_appends_cause_chain() {
        let logger = logger(MemorySink::new());
        let error = std::io::Error::other("disk full");
        logger.error_with("write failed", &error);
        assert_eq!(logger.sink().texts(), ["write failed\n\tError: disk full"]);
    }
}
