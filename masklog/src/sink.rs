//! Destinations for records.
//!
//! A [`Sink`] receives fully redacted records: operation events from the
//! [`OperationLogger`](crate::OperationLogger) and formatted messages from
//! the [`MaskedLogger`](crate::MaskedLogger). Transport, formatting and
//! routing belong to the backend behind the sink.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::{level::Level, operation::OperationEvent};

/// Receives redacted records.
pub trait Sink: Send + Sync {
    /// Whether records at `level` would be kept. Loggers skip rendering
    /// entirely when this returns `false`.
    fn is_enabled(&self, _level: Level) -> bool {
        true
    }

    /// Receives an operation event.
    fn emit(&self, event: &OperationEvent);

    /// Receives a message logged through a direct logger.
    fn message(&self, level: Level, target: &str, text: &str);
}

impl<T: Sink + ?Sized> Sink for Arc<T> {
    fn is_enabled(&self, level: Level) -> bool {
        (**self).is_enabled(level)
    }

    fn emit(&self, event: &OperationEvent) {
        (**self).emit(event);
    }

    fn message(&self, level: Level, target: &str, text: &str) {
        (**self).message(level, target, text);
    }
}

impl<T: Sink + ?Sized> Sink for Box<T> {
    fn is_enabled(&self, level: Level) -> bool {
        (**self).is_enabled(level)
    }

    fn emit(&self, event: &OperationEvent) {
        (**self).emit(event);
    }

    fn message(&self, level: Level, target: &str, text: &str) {
        (**self).message(level, target, text);
    }
}

/// A message captured by [`MemorySink`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LoggedMessage {
    pub level: Level,
    pub target: String,
    pub text: String,
}

/// Keeps every record in memory. Useful in tests and for buffering.
#[derive(Debug)]
pub struct MemorySink {
    min_level: Level,
    events: Mutex<Vec<OperationEvent>>,
    messages: Mutex<Vec<LoggedMessage>>,
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MemorySink {
    /// Accepts every level.
    #[must_use]
    pub fn new() -> Self {
        Self::with_min_level(Level::Trace)
    }

    /// Accepts `min_level` and above.
    #[must_use]
    pub fn with_min_level(min_level: Level) -> Self {
        Self {
            min_level,
            events: Mutex::new(Vec::new()),
            messages: Mutex::new(Vec::new()),
        }
    }

    pub fn events(&self) -> Vec<OperationEvent> {
        lock(&self.events).clone()
    }

    pub fn messages(&self) -> Vec<LoggedMessage> {
        lock(&self.messages).clone()
    }

    /// Texts of all captured messages, in order.
    pub fn texts(&self) -> Vec<String> {
        lock(&self.messages)
            .iter()
            .map(|message| message.text.clone())
            .collect()
    }

    pub fn clear(&self) {
        lock(&self.events).clear();
        lock(&self.messages).clear();
    }
}

impl Sink for MemorySink {
    fn is_enabled(&self, level: Level) -> bool {
        level >= self.min_level
    }

    fn emit(&self, event: &OperationEvent) {
        lock(&self.events).push(event.clone());
    }

    fn message(&self, level: Level, target: &str, text: &str) {
        lock(&self.messages).push(LoggedMessage {
            level,
            target: target.to_string(),
            text: text.to_string(),
        });
    }
}
