//! Entry, exit and exception records for instrumented operations.
//!
//! [`OperationLogger::instrument`] wraps a fallible call: it renders the
//! operation message before the call, records the redacted arguments, times
//! the call, and records either the redacted result or the error. The call's
//! outcome is returned unchanged; logging never turns a success into a
//! failure or swallows an error.

use std::{
    any::type_name,
    error::Error,
    fmt,
    panic::{self, AssertUnwindSafe},
    ptr,
    sync::Arc,
    time::Instant,
};

use crate::{
    descriptor::{simple_name, MethodDescriptor},
    level::Level,
    policy::{RedactionPolicy, INACCESSIBLE_PLACEHOLDER},
    registry::{ExceptionRule, OperationConfig, PolicyRegistry},
    render::{Loggable, RenderOptions, Renderer},
    sink::Sink,
};

/// Logged when the root cause of an error has a blank message.
pub const NO_ERROR_MESSAGE: &str = "No error message";

/// Header preceding the cause chain of an error matched by a rule.
pub const HANDLED_TRACE_HEADER: &str = "Full trace for handled error:";

/// Header preceding the cause chain of an error no rule matched.
pub const UNHANDLED_TRACE_HEADER: &str = "Full trace for unhandled error:";

// =============================================================================
// Events
// =============================================================================

/// One record produced by the operation logger.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct OperationEvent {
    /// Simple name of the declaring type.
    pub class_name: String,
    pub method: String,
    /// The formatted operation message; may be empty.
    pub message: String,
    pub level: Level,
    #[cfg_attr(feature = "serde", serde(flatten))]
    pub kind: EventKind,
}

#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(tag = "operation", rename_all = "lowercase"))]
pub enum EventKind {
    Entry {
        arguments: Vec<String>,
    },
    Exit {
        result: String,
        duration_ms: u64,
    },
    Exception {
        error_type: String,
        error_message: String,
        /// The error matched one of the operation's exception rules.
        handled: bool,
        print_trace: bool,
        /// Cause chain, outermost first; empty unless `print_trace`.
        trace: Vec<String>,
    },
}

impl OperationEvent {
    /// `entry`, `exit` or `exception`.
    pub const fn operation(&self) -> &'static str {
        match self.kind {
            EventKind::Entry { .. } => "entry",
            EventKind::Exit { .. } => "exit",
            EventKind::Exception { .. } => "exception",
        }
    }

    /// The single-line human-readable form.
    #[must_use]
    pub fn line(&self) -> String {
        match &self.kind {
            EventKind::Entry { arguments } => format!(
                "{} - Entry - Method: {} - Arguments: [{}]",
                self.message,
                self.method,
                arguments.join(", ")
            ),
            EventKind::Exit {
                result,
                duration_ms,
            } => format!(
                "{} - Exit - Method: {} - Result: {result} - Duration: {duration_ms}ms",
                self.message, self.method
            ),
            EventKind::Exception {
                error_type,
                error_message,
                handled,
                ..
            } => format!(
                "[{}] {} error - Type: {error_type} - Message: {error_message}",
                self.method,
                if *handled { "Handled" } else { "Unhandled" }
            ),
        }
    }

    /// Header and cause chain to print after the line, if requested.
    pub fn trace(&self) -> Option<(&'static str, &[String])> {
        match &self.kind {
            EventKind::Exception {
                handled,
                print_trace: true,
                trace,
                ..
            } => Some((
                if *handled {
                    HANDLED_TRACE_HEADER
                } else {
                    UNHANDLED_TRACE_HEADER
                },
                trace.as_slice(),
            )),
            _ => None,
        }
    }

    /// The line followed by the trace block, one entry per line.
    #[must_use]
    pub fn text(&self) -> String {
        let mut text = self.line();
        if let Some((header, trace)) = self.trace() {
            text.push('\n');
            text.push_str(header);
            for link in trace {
                text.push_str("\n\t");
                text.push_str(link);
            }
        }
        text
    }

    /// The event as a JSON object.
    #[cfg(feature = "serde")]
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self)
            .unwrap_or_else(|_| serde_json::Value::String("Failed to serialize event".to_string()))
    }
}

impl fmt::Display for OperationEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.line())
    }
}

// =============================================================================
// Errors
// =============================================================================

/// An error raised by an instrumented call, with its concrete type name.
#[derive(Clone, Copy)]
pub struct ThrownError<'a> {
    error: &'a (dyn Error + 'static),
    type_name: &'static str,
}

impl<'a> ThrownError<'a> {
    pub fn new<E: Error + 'static>(error: &'a E) -> Self {
        Self {
            error,
            type_name: simple_name(type_name::<E>()),
        }
    }

    /// For errors whose concrete type is erased; the type renders as
    /// `dyn Error`.
    pub fn from_dyn(error: &'a (dyn Error + 'static)) -> Self {
        Self {
            error,
            type_name: "dyn Error",
        }
    }

    pub fn error(&self) -> &'a (dyn Error + 'static) {
        self.error
    }

    pub const fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl fmt::Debug for ThrownError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThrownError")
            .field("type_name", &self.type_name)
            .field("message", &self.error.to_string())
            .finish()
    }
}

/// Links followed before [`cause_chain`] gives up on a chain.
pub const MAX_CAUSE_DEPTH: usize = 64;

/// `error` followed by its sources, outermost first.
///
/// A link is a repeat when both its address and its vtable match an earlier
/// link; a wrapper and the error stored at its start share an address but
/// not a type. The walk stops at the first repeat or after
/// [`MAX_CAUSE_DEPTH`] links.
pub fn cause_chain<'e>(error: &'e (dyn Error + 'static)) -> Vec<&'e (dyn Error + 'static)> {
    let mut chain = vec![error];
    let mut current = error;
    while let Some(next) = current.source() {
        if chain.len() >= MAX_CAUSE_DEPTH || chain.iter().any(|seen| ptr::eq(*seen, next)) {
            break;
        }
        chain.push(next);
        current = next;
    }
    chain
}

/// The innermost error of the cause chain.
pub fn root_cause<'e>(error: &'e (dyn Error + 'static)) -> &'e (dyn Error + 'static) {
    cause_chain(error).last().copied().unwrap_or(error)
}

/// Message of the root cause, or [`NO_ERROR_MESSAGE`] when it is blank.
#[must_use]
pub fn root_cause_message(error: &(dyn Error + 'static)) -> String {
    let message = root_cause(error).to_string();
    if message.trim().is_empty() {
        NO_ERROR_MESSAGE.to_string()
    } else {
        message
    }
}

pub(crate) fn render_trace(thrown: &ThrownError<'_>) -> Vec<String> {
    cause_chain(thrown.error)
        .into_iter()
        .enumerate()
        .map(|(index, link)| {
            if index == 0 {
                format!("{}: {link}", thrown.type_name)
            } else {
                format!("Caused by: {link}")
            }
        })
        .collect()
}

// =============================================================================
// Logger
// =============================================================================

/// Emits operation records with parameter policies from a registry.
pub struct OperationLogger<S> {
    sink: S,
    registry: Arc<PolicyRegistry>,
    render_options: RenderOptions,
}

impl<S: fmt::Debug> fmt::Debug for OperationLogger<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationLogger")
            .field("sink", &self.sink)
            .field("render_options", &self.render_options)
            .finish_non_exhaustive()
    }
}

impl<S: Sink> OperationLogger<S> {
    pub fn new(sink: S, registry: Arc<PolicyRegistry>) -> Self {
        Self {
            sink,
            registry,
            render_options: RenderOptions::default(),
        }
    }

    #[must_use]
    pub fn with_render_options(mut self, render_options: RenderOptions) -> Self {
        self.render_options = render_options;
        self
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn registry(&self) -> &Arc<PolicyRegistry> {
        &self.registry
    }

    fn render(&self, value: &dyn Loggable, policy: &RedactionPolicy) -> String {
        Renderer::with_options(self.render_options).render_with_policy(value, policy)
    }

    /// Renders the argument at `index` under its parameter policy.
    pub fn render_argument(&self, method: &MethodDescriptor, index: usize, value: &dyn Loggable) -> String {
        self.render(value, &self.registry.policy_for_parameter(method, index))
    }

    /// Renders every argument under its parameter policy.
    pub fn render_arguments(&self, method: &MethodDescriptor, args: &[&dyn Loggable]) -> Vec<String> {
        args.iter()
            .enumerate()
            .map(|(index, value)| self.render_argument(method, index, *value))
            .collect()
    }

    /// Replaces `{0}`, `{1}`, ... in `template` with the policy-aware
    /// rendering of the corresponding argument.
    ///
    /// The template is scanned once, so text inside a rendered argument is
    /// never substituted again. Placeholders without a matching argument stay
    /// verbatim. A blank template yields an empty message.
    pub fn format_message(&self, template: &str, method: &MethodDescriptor, args: &[&dyn Loggable]) -> String {
        if template.trim().is_empty() {
            return String::new();
        }
        let mut rendered: Vec<Option<String>> = vec![None; args.len()];
        let mut message = String::with_capacity(template.len());
        let mut rest = template;
        while let Some(open) = rest.find('{') {
            message.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            let digits = after.find(|c: char| !c.is_ascii_digit()).unwrap_or(after.len());
            let index = after[..digits].parse::<usize>().ok().filter(|index| *index < args.len());
            match index {
                Some(index) if digits > 0 && after[digits..].starts_with('}') => {
                    let text = rendered[index]
                        .get_or_insert_with(|| self.render_argument(method, index, args[index]));
                    message.push_str(text);
                    rest = &after[digits + 1..];
                }
                _ => {
                    message.push('{');
                    rest = after;
                }
            }
        }
        message.push_str(rest);
        message
    }

    fn event(&self, method: &MethodDescriptor, message: String, level: Level, kind: EventKind) -> OperationEvent {
        OperationEvent {
            class_name: method.simple_type_name().to_string(),
            method: method.name().to_string(),
            message,
            level,
            kind,
        }
    }

    fn deliver(&self, event: &OperationEvent) {
        if self.sink.is_enabled(event.level) {
            self.sink.emit(event);
        }
    }

    /// Builds and delivers an event. If building or delivering panics, the
    /// event built by `fallback` is delivered instead; a panic there is
    /// swallowed too, so the logged call is never affected.
    fn emit(&self, build: impl FnOnce() -> OperationEvent, fallback: impl FnOnce() -> OperationEvent) {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.deliver(&build())));
        if outcome.is_err() {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.deliver(&fallback())));
            drop(outcome);
        }
    }

    /// Records the redacted arguments at the configured level.
    ///
    /// Nothing is emitted when `config.include_args` is false.
    pub fn log_entry(&self, method: &MethodDescriptor, config: &OperationConfig, message: &str, args: &[&dyn Loggable]) {
        if !config.include_args || !self.sink.is_enabled(config.level) {
            return;
        }
        self.emit(
            || {
                let arguments = self.render_arguments(method, args);
                self.event(method, message.to_string(), config.level, EventKind::Entry { arguments })
            },
            || {
                let arguments = vec![INACCESSIBLE_PLACEHOLDER.to_string(); args.len()];
                self.event(method, message.to_string(), config.level, EventKind::Entry { arguments })
            },
        );
    }

    /// Records the redacted result and duration at the configured level.
    ///
    /// Nothing is emitted when `config.include_result` is false.
    pub fn log_exit(
        &self,
        method: &MethodDescriptor,
        config: &OperationConfig,
        message: &str,
        result: &dyn Loggable,
        duration_ms: u64,
    ) {
        if !config.include_result || !self.sink.is_enabled(config.level) {
            return;
        }
        let exit = |result: String| {
            self.event(
                method,
                message.to_string(),
                config.level,
                EventKind::Exit {
                    result,
                    duration_ms,
                },
            )
        };
        self.emit(
            || exit(self.render(result, &RedactionPolicy::None)),
            || exit(INACCESSIBLE_PLACEHOLDER.to_string()),
        );
    }

    /// Records a failed call.
    ///
    /// The first rule matching `error` decides the level, the message
    /// (formatted against `args`, or the root-cause message when the rule has
    /// no template) and whether the trace is printed. Without a match the
    /// record uses `default_level`, the root-cause message and always carries
    /// the trace.
    pub fn log_exception(
        &self,
        method: &MethodDescriptor,
        args: &[&dyn Loggable],
        error: &ThrownError<'_>,
        rules: &[ExceptionRule],
        default_level: Level,
    ) {
        self.emit(
            || {
                let matched = rules.iter().find(|rule| rule.matches(error.error()));
                let (level, error_message, handled, print_trace) = match matched {
                    Some(rule) => {
                        let message = if rule.message().is_empty() {
                            root_cause_message(error.error())
                        } else {
                            self.format_message(rule.message(), method, args)
                        };
                        (rule.level(), message, true, rule.print_trace())
                    }
                    None => (default_level, root_cause_message(error.error()), false, true),
                };
                let trace = if print_trace {
                    render_trace(error)
                } else {
                    Vec::new()
                };
                self.event(
                    method,
                    String::new(),
                    level,
                    EventKind::Exception {
                        error_type: error.type_name().to_string(),
                        error_message,
                        handled,
                        print_trace,
                        trace,
                    },
                )
            },
            || self.fallback_exception(method, error, default_level),
        );
    }

    /// The record for a failure whose rule evaluation or rendering panicked:
    /// unhandled, at `default_level`, with whatever of the root-cause message
    /// and trace can still be produced.
    fn fallback_exception(&self, method: &MethodDescriptor, error: &ThrownError<'_>, default_level: Level) -> OperationEvent {
        let error_message = panic::catch_unwind(AssertUnwindSafe(|| root_cause_message(error.error())))
            .unwrap_or_else(|_| NO_ERROR_MESSAGE.to_string());
        let trace = panic::catch_unwind(AssertUnwindSafe(|| render_trace(error))).unwrap_or_default();
        self.event(
            method,
            String::new(),
            default_level,
            EventKind::Exception {
                error_type: error.type_name().to_string(),
                error_message,
                handled: false,
                print_trace: true,
                trace,
            },
        )
    }

    /// Runs `call` under the configuration registered for `method`, or the
    /// default configuration when none is registered.
    ///
    /// ```rust
    /// use std::sync::Arc;
    /// use masklog::{
    ///     Loggable, MaskSpec, MemorySink, MethodDescriptor, MethodPolicies, OperationConfig,
    ///     OperationLogger, PolicyRegistry,
    /// };
    ///
    /// let login = MethodDescriptor::new("AuthService", "login").param("email", "String");
    /// let registry = PolicyRegistry::builder()
    ///     .method(
    ///         login.clone(),
    ///         MethodPolicies::new()
    ///             .mask(0, MaskSpec::default())
    ///             .config(OperationConfig::new("User {0} logged in")),
    ///     )
    ///     .build()?;
    ///
    /// let logger = OperationLogger::new(MemorySink::new(), Arc::new(registry));
    /// let email = "alice@example.com".to_string();
    /// let args: [&dyn Loggable; 1] = [&email];
    /// let outcome: Result<bool, std::io::Error> = logger.instrument(&login, &args, || Ok(true));
    ///
    /// assert!(outcome.is_ok());
    /// assert_eq!(logger.sink().events()[0].message, "User *************.com logged in");
    /// # Ok::<(), masklog::RegistryError>(())
    /// ```
    pub fn instrument<T, E, F>(&self, method: &MethodDescriptor, args: &[&dyn Loggable], call: F) -> Result<T, E>
    where
        T: Loggable,
        E: Error + 'static,
        F: FnOnce() -> Result<T, E>,
    {
        match self.registry.operation_config(method) {
            Some(config) => self.instrument_with(&config, method, args, call),
            None => self.instrument_with(&OperationConfig::default(), method, args, call),
        }
    }

    /// Runs `call` under an explicit configuration.
    pub fn instrument_with<T, E, F>(
        &self,
        config: &OperationConfig,
        method: &MethodDescriptor,
        args: &[&dyn Loggable],
        call: F,
    ) -> Result<T, E>
    where
        T: Loggable,
        E: Error + 'static,
        F: FnOnce() -> Result<T, E>,
    {
        let message = self.format_message(&config.message, method, args);
        self.log_entry(method, config, &message, args);

        let started = Instant::now();
        let outcome = call();
        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        match &outcome {
            Ok(value) => self.log_exit(method, config, &message, value, duration_ms),
            Err(error) => {
                if config.log_unexpected_exceptions || !config.exceptions.is_empty() {
                    self.log_exception(
                        method,
                        args,
                        &ThrownError::new(error),
                        &config.exceptions,
                        config.unexpected_level,
                    );
                }
            }
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use std::{error::Error, fmt, io, sync::Arc};

    use super::{
        cause_chain, root_cause_message, EventKind, OperationEvent, OperationLogger, ThrownError,
        MAX_CAUSE_DEPTH, NO_ERROR_MESSAGE,
    };
    use crate::{
        descriptor::MethodDescriptor,
        level::Level,
        policy::MaskSpec,
        registry::{ExceptionRule, MethodPolicies, OperationConfig, PolicyRegistry},
        render::Loggable,
        sink::MemorySink,
    };

    #[derive(Debug)]
    struct Layer {
        message: &'static str,
        source: Option<Box<Layer>>,
    }

    impl fmt::Display for Layer {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(self.message)
        }
    }

    impl Error for Layer {
        fn source(&self) -> Option<&(dyn Error + 'static)> {
            self.source.as_deref().map(|layer| layer as &(dyn Error + 'static))
        }
    }

    fn chain(messages: &[&'static str]) -> Layer {
        let mut layer: Option<Box<Layer>> = None;
        for &message in messages.iter().rev() {
            layer = Some(Box::new(Layer {
                message,
                source: layer,
            }));
        }
        *layer.unwrap()
    }

    #[derive(Debug)]
    struct SelfReferential;

    impl fmt::Display for SelfReferential {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("loop")
        }
    }

    impl Error for SelfReferential {
        fn source(&self) -> Option<&(dyn Error + 'static)> {
            Some(self)
        }
    }

    #[derive(Debug)]
    struct LookupError(io::Error);

    impl fmt::Display for LookupError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("lookup failed")
        }
    }

    impl Error for LookupError {
        fn source(&self) -> Option<&(dyn Error + 'static)> {
            Some(&self.0)
        }
    }

    fn checkout() -> MethodDescriptor {
        MethodDescriptor::new("shop::Checkout", "pay")
            .param("card", "String")
            .param("amount", "u64")
    }

    fn logger(policies: MethodPolicies) -> OperationLogger<MemorySink> {
        let registry = PolicyRegistry::builder()
            .method(checkout(), policies)
            .build()
            .unwrap();
        OperationLogger::new(MemorySink::new(), Arc::new(registry))
    }

    #[test]
    fn root_cause_walks_to_innermost_error() {
        let error = chain(&["outer", "middle", "inner"]);
        assert_eq!(cause_chain(&error).len(), 3);
        assert_eq!(root_cause_message(&error), "inner");
    }

    #[test]
    fn blank_root_cause_uses_sentinel() {
        let error = chain(&["outer", "middle", "  "]);
        assert_eq!(root_cause_message(&error), NO_ERROR_MESSAGE);
    }

    #[test]
    fn self_referential_source_terminates() {
        assert_eq!(cause_chain(&SelfReferential).len(), 1);
        assert_eq!(root_cause_message(&SelfReferential), "loop");
    }

    #[test]
    fn wrapper_sharing_its_source_address_is_followed() {
        let error = LookupError(io::Error::new(io::ErrorKind::NotFound, "no such user"));
        let chain = cause_chain(&error);
        assert_eq!(chain.len(), 2);
        assert!(chain[1].is::<io::Error>());
        assert_eq!(root_cause_message(&error), "no such user");
    }

    #[test]
    fn long_chains_are_capped() {
        let messages = vec!["link"; MAX_CAUSE_DEPTH + 10];
        assert_eq!(cause_chain(&chain(&messages)).len(), MAX_CAUSE_DEPTH);
    }

    #[test]
    fn rendered_arguments_are_not_substituted_again() {
        let logger = logger(MethodPolicies::new());
        let braces = "{1}".to_string();
        let args: [&dyn Loggable; 2] = [&braces, &7_u64];
        assert_eq!(
            logger.format_message("{0} then {1} then {x} then {", &checkout(), &args),
            "{1} then 7 then {x} then {"
        );
    }

    #[test]
    fn panicking_rule_falls_back_to_unhandled_record() {
        let logger = logger(MethodPolicies::new());
        let config = OperationConfig::new("")
            .with_unexpected_level(Level::Warn)
            .with_exception(ExceptionRule::matching("buggy", |_| panic!("rule failed")));

        let outcome: Result<(), LookupError> = logger.instrument_with(&config, &checkout(), &[], || {
            Err(LookupError(io::Error::other("declined")))
        });
        assert_eq!(outcome.unwrap_err().to_string(), "lookup failed");

        let events = logger.sink().events();
        let event = events.last().unwrap();
        assert_eq!(event.level, Level::Warn);
        match &event.kind {
            EventKind::Exception {
                error_type,
                error_message,
                handled,
                print_trace,
                trace,
            } => {
                assert_eq!(error_type, "LookupError");
                assert_eq!(error_message, "declined");
                assert!(!*handled);
                assert!(*print_trace);
                assert_eq!(trace, &["LookupError: lookup failed", "Caused by: declined"]);
            }
            other => panic!("expected exception, got {other:?}"),
        }
    }

    struct Exploding;

    impl Loggable for Exploding {
        fn describe(&self, _out: &mut crate::render::Renderer) {
            panic!("cannot read");
        }
    }

    #[test]
    fn unreadable_arguments_and_results_still_log() {
        let logger = logger(MethodPolicies::new());
        let config = OperationConfig::new("");
        let args: [&dyn Loggable; 2] = [&Exploding, &3_u64];

        let outcome: Result<u8, io::Error> = logger.instrument_with(&config, &checkout(), &args, || Ok(1));
        assert_eq!(outcome.unwrap(), 1);

        let events = logger.sink().events();
        assert_eq!(events.len(), 2);
        match &events[0].kind {
            EventKind::Entry { arguments } => assert_eq!(arguments, &["[INACCESSIBLE]", "3"]),
            other => panic!("expected entry, got {other:?}"),
        }
    }

    #[test]
    fn format_message_applies_parameter_policies() {
        let logger = logger(MethodPolicies::new().mask(0, MaskSpec::suffix(4)));
        let card = "4111111111111111".to_string();
        let args: [&dyn Loggable; 2] = [&card, &250_u64];
        assert_eq!(
            logger.format_message("Paying {1} with {0} ({2})", &checkout(), &args),
            "Paying 250 with ************1111 ({2})"
        );
    }

    #[test]
    fn blank_template_formats_to_empty() {
        let logger = logger(MethodPolicies::new());
        let args: [&dyn Loggable; 1] = [&1_u8];
        assert_eq!(logger.format_message("   ", &checkout(), &args), "");
    }

    #[test]
    fn excluded_parameter_never_appears() {
        let logger = logger(MethodPolicies::new().exclude(0));
        let card = "4111111111111111".to_string();
        let args: [&dyn Loggable; 2] = [&card, &10_u64];
        let outcome: Result<(), io::Error> =
            logger.instrument_with(&OperationConfig::new("pay {0}"), &checkout(), &args, || Ok(()));
        assert!(outcome.is_ok());

        for event in logger.sink().events() {
            assert!(!event.text().contains("4111"), "leaked in {event:?}");
        }
        assert_eq!(
            logger.sink().events()[0].line(),
            "pay [EXCLUDED] - Entry - Method: pay - Arguments: [[EXCLUDED], 10]"
        );
    }

    #[test]
    fn exit_records_result_and_duration() {
        let logger = logger(MethodPolicies::new());
        let args: [&dyn Loggable; 2] = [&"c", &1_u64];
        let outcome: Result<&str, io::Error> =
            logger.instrument_with(&OperationConfig::new("paying"), &checkout(), &args, || {
                Ok("receipt-1")
            });
        assert_eq!(outcome.unwrap(), "receipt-1");

        let events = logger.sink().events();
        assert_eq!(events.len(), 2);
        match &events[1].kind {
            EventKind::Exit { result, .. } => assert_eq!(result, "receipt-1"),
            other => panic!("expected exit, got {other:?}"),
        }
        assert!(events[1].line().starts_with("paying - Exit - Method: pay - Result: receipt-1 - Duration: "));
    }

    #[test]
    fn unmatched_error_is_unhandled_with_trace() {
        let logger = logger(MethodPolicies::new());
        let config = OperationConfig::new("").with_unexpected_level(Level::Warn);
        let outcome: Result<(), Layer> =
            logger.instrument_with(&config, &checkout(), &[], || Err(chain(&["declined", "insufficient funds"])));
        assert_eq!(outcome.unwrap_err().message, "declined");

        let events = logger.sink().events();
        let event = events.last().unwrap();
        assert_eq!(event.level, Level::Warn);
        assert_eq!(
            event.line(),
            "[pay] Unhandled error - Type: Layer - Message: insufficient funds"
        );
        let (header, trace) = event.trace().unwrap();
        assert_eq!(header, super::UNHANDLED_TRACE_HEADER);
        assert_eq!(trace, ["Layer: declined", "Caused by: insufficient funds"]);
    }

    #[test]
    fn first_matching_rule_wins() {
        let logger = logger(MethodPolicies::new().mask(0, MaskSpec::suffix(2)));
        let config = OperationConfig::new("")
            .with_exception(ExceptionRule::any().with_level(Level::Warn).with_message("card {0} failed"))
            .with_exception(ExceptionRule::for_type::<io::Error>().with_level(Level::Debug));
        let card = "12345678".to_string();
        let args: [&dyn Loggable; 2] = [&card, &5_u64];

        let outcome: Result<(), io::Error> =
            logger.instrument_with(&config, &checkout(), &args, || Err(io::Error::other("io")));
        assert!(outcome.is_err());

        let events = logger.sink().events();
        let event = events.last().unwrap();
        assert_eq!(event.level, Level::Warn);
        assert_eq!(event.line(), "[pay] Handled error - Type: Error - Message: card ******78 failed");
        assert!(event.trace().is_none());
    }

    #[test]
    fn rule_without_template_uses_root_cause() {
        let logger = logger(MethodPolicies::new());
        let config = OperationConfig::new("")
            .with_exception(ExceptionRule::for_type::<Layer>().with_print_trace(true));
        let outcome: Result<(), Layer> =
            logger.instrument_with(&config, &checkout(), &[], || Err(chain(&["a", "b", ""])));
        assert!(outcome.is_err());

        let events = logger.sink().events();
        let event = events.last().unwrap();
        assert_eq!(event.level, Level::Error);
        match &event.kind {
            EventKind::Exception {
                error_message,
                handled,
                trace,
                ..
            } => {
                assert_eq!(error_message, NO_ERROR_MESSAGE);
                assert!(*handled);
                assert_eq!(trace.len(), 3);
            }
            other => panic!("expected exception, got {other:?}"),
        }
        assert_eq!(event.trace().unwrap().0, super::HANDLED_TRACE_HEADER);
    }

    #[test]
    fn disabled_unexpected_logging_without_rules_is_silent() {
        let logger = logger(MethodPolicies::new());
        let config = OperationConfig::new("").with_log_unexpected_exceptions(false);
        let outcome: Result<(), io::Error> =
            logger.instrument_with(&config, &checkout(), &[], || Err(io::Error::other("quiet")));
        assert_eq!(outcome.unwrap_err().to_string(), "quiet");

        assert!(logger
            .sink()
            .events()
            .iter()
            .all(|event| event.operation() != "exception"));
    }

    #[test]
    fn thrown_error_reports_simple_type_name() {
        let error = io::Error::other("x");
        assert_eq!(ThrownError::new(&error).type_name(), "Error");
        assert_eq!(ThrownError::from_dyn(&error).type_name(), "dyn Error");
    }

    #[test]
    fn trace_text_follows_the_line() {
        let event = OperationEvent {
            class_name: "Checkout".into(),
            method: "pay".into(),
            message: String::new(),
            level: Level::Error,
            kind: EventKind::Exception {
                error_type: "Layer".into(),
                error_message: "boom".into(),
                handled: false,
                print_trace: true,
                trace: vec!["Layer: boom".into()],
            },
        };
        assert_eq!(
            event.text(),
            "[pay] Unhandled error - Type: Layer - Message: boom\nFull trace for unhandled error:\n\tLayer: boom"
        );
    }

    #[cfg(feature = "serde")]
    #[test]
    fn events_serialize_with_operation_tag() {
        let event = OperationEvent {
            class_name: "Checkout".into(),
            method: "pay".into(),
            message: "m".into(),
            level: Level::Info,
            kind: EventKind::Exit {
                result: "ok".into(),
                duration_ms: 3,
            },
        };
        let json = event.to_json();
        assert_eq!(json["operation"], "exit");
        assert_eq!(json["level"], "INFO");
        assert_eq!(json["duration_ms"], 3);
        assert_eq!(json["class_name"], "Checkout");
    }
}
