//! `slog` integration: a sink that forwards records to a `slog::Logger`, and
//! `slog::Value` adapters that log the redacted rendering of a value.
//!
//! The adapters never hand the original value to `slog`. Rendering happens
//! when the adapter is built, with the same engine and policies as every
//! other entry point of this crate.
//!
//! ```rust
//! use masklog::slog::IntoRendered;
//! use masklog::{Loggable, MaskSpec};
//!
//! #[derive(Loggable)]
//! struct Card {
//!     #[loggable(mask)]
//!     number: String,
//! }
//!
//! let card = Card { number: "4111111111111111".into() };
//! let logger = slog::Logger::root(slog::Discard, slog::o!());
//! slog::info!(logger, "charging"; "card" => card.rendered(), "pan" => card.number.masked(MaskSpec::default()));
//! ```

use serde_json::Value as JsonValue;
use slog::{Key, Logger, Record, Result as SlogResult, Serializer, Value as SlogValue};

use crate::{
    level::Level,
    operation::OperationEvent,
    policy::{MaskSpec, RedactionPolicy},
    render::{render, render_with_policy, Loggable},
    sink::Sink,
};

// Path used by `#[derive(Loggable)]` for its `slog::Value` impl.
#[doc(hidden)]
pub use ::slog as __slog;

/// A `slog::Value` holding the rendered, redacted text of a value.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Rendered {
    text: String,
}

impl Rendered {
    /// Renders `value` with its field policies.
    pub fn new(value: &dyn Loggable) -> Self {
        Self {
            text: render(value),
        }
    }

    /// Renders `value` under a top-level `policy`.
    pub fn with_policy(value: &dyn Loggable, policy: &RedactionPolicy) -> Self {
        Self {
            text: render_with_policy(value, policy),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }
}

impl SlogValue for Rendered {
    fn serialize(&self, _record: &Record<'_>, key: Key, serializer: &mut dyn Serializer) -> SlogResult {
        serializer.emit_str(key, &self.text)
    }
}

/// Converts values into `slog::Value`s that log only their redacted form.
pub trait IntoRendered: Loggable + Sized {
    /// The rendering with field policies honored.
    fn rendered(&self) -> Rendered {
        Rendered::new(self)
    }

    /// The rendering, masked with `spec`.
    fn masked(&self, spec: MaskSpec) -> Rendered {
        Rendered::with_policy(self, &RedactionPolicy::Mask(spec))
    }

    /// `[EXCLUDED]`; the value itself is never rendered.
    fn excluded(&self) -> Rendered {
        Rendered::with_policy(self, &RedactionPolicy::Exclude)
    }
}

impl<T> IntoRendered for T where T: Loggable {}

/// An operation event emitted as a nested structured value.
struct EventJson {
    value: JsonValue,
}

impl SlogValue for EventJson {
    fn serialize(&self, record: &Record<'_>, key: Key, serializer: &mut dyn Serializer) -> SlogResult {
        let nested = slog::Serde(self.value.clone());
        SlogValue::serialize(&nested, record, key, serializer)
    }
}

// slog's logging macros take the level as a token, so each level needs its
// own expansion.
macro_rules! log_at {
    ($logger:expr, $level:expr, $($args:tt)+) => {
        match $level {
            Level::Trace => slog::trace!($logger, $($args)+),
            Level::Debug => slog::debug!($logger, $($args)+),
            Level::Info => slog::info!($logger, $($args)+),
            Level::Warn => slog::warn!($logger, $($args)+),
            Level::Error => slog::error!($logger, $($args)+),
        }
    };
}

/// Forwards records to a `slog::Logger`.
///
/// Operation events are logged with their human-readable text as the
/// message and the structured event under the `event` key, alongside
/// `operation`, `class` and `method`. Level filtering is left to the drain.
#[derive(Clone, Debug)]
pub struct SlogSink {
    logger: Logger,
}

impl SlogSink {
    pub fn new(logger: Logger) -> Self {
        Self { logger }
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }
}

impl Sink for SlogSink {
    fn emit(&self, event: &OperationEvent) {
        let text = event.text();
        let json = EventJson {
            value: event.to_json(),
        };
        log_at!(
            self.logger,
            event.level,
            "{}", text;
            "operation" => event.operation(),
            "class" => event.class_name.as_str(),
            "method" => event.method.as_str(),
            "event" => json
        );
    }

    fn message(&self, level: Level, target: &str, text: &str) {
        log_at!(self.logger, level, "{}", text; "target" => target);
    }
}
