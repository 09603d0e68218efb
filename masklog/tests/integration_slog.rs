//! Integration tests for the slog module.
//!
//! These tests verify that:
//! - `Rendered` values carry only the redacted rendering into slog
//! - derived types implement `slog::Value` through the same rendering
//! - `SlogSink` forwards operation events and messages with structured keys

#![cfg(feature = "slog")]

use std::{
    cell::RefCell,
    collections::HashMap,
    fmt::Arguments,
    sync::{Arc, Mutex},
};

use masklog::{
    slog::{IntoRendered, Rendered, SlogSink},
    CallerResolver, Level, Loggable, MaskSpec, MaskedLogger, MethodDescriptor, MethodPolicies,
    OperationConfig, OperationLogger, PolicyRegistry, RedactionPolicy,
};
use serde_json::Value as JsonValue;

// A test serializer that captures serialized key-value pairs
struct CapturingSerializer {
    captured: RefCell<HashMap<String, CapturedValue>>,
}

#[derive(Debug, Clone, PartialEq)]
enum CapturedValue {
    Str(String),
    Bool(bool),
    I64(i64),
    U64(u64),
    F64(f64),
    Unit,
    None,
    // For nested serde values, we capture the JSON representation
    Serde(JsonValue),
}

impl CapturingSerializer {
    fn new() -> Self {
        Self {
            captured: RefCell::new(HashMap::new()),
        }
    }

    fn get(&self, key: &str) -> Option<CapturedValue> {
        self.captured.borrow().get(key).cloned()
    }
}

impl slog::Serializer for CapturingSerializer {
    fn emit_arguments(&mut self, key: slog::Key, val: &Arguments<'_>) -> slog::Result {
        self.captured
            .borrow_mut()
            .insert(key.into(), CapturedValue::Str(val.to_string()));
        Ok(())
    }

    fn emit_str(&mut self, key: slog::Key, val: &str) -> slog::Result {
        self.captured
            .borrow_mut()
            .insert(key.into(), CapturedValue::Str(val.into()));
        Ok(())
    }

    fn emit_bool(&mut self, key: slog::Key, val: bool) -> slog::Result {
        self.captured
            .borrow_mut()
            .insert(key.into(), CapturedValue::Bool(val));
        Ok(())
    }

    fn emit_i64(&mut self, key: slog::Key, val: i64) -> slog::Result {
        self.captured
            .borrow_mut()
            .insert(key.into(), CapturedValue::I64(val));
        Ok(())
    }

    fn emit_u64(&mut self, key: slog::Key, val: u64) -> slog::Result {
        self.captured
            .borrow_mut()
            .insert(key.into(), CapturedValue::U64(val));
        Ok(())
    }

    fn emit_f64(&mut self, key: slog::Key, val: f64) -> slog::Result {
        self.captured
            .borrow_mut()
            .insert(key.into(), CapturedValue::F64(val));
        Ok(())
    }

    fn emit_unit(&mut self, key: slog::Key) -> slog::Result {
        self.captured
            .borrow_mut()
            .insert(key.into(), CapturedValue::Unit);
        Ok(())
    }

    fn emit_none(&mut self, key: slog::Key) -> slog::Result {
        self.captured
            .borrow_mut()
            .insert(key.into(), CapturedValue::None);
        Ok(())
    }

    fn emit_serde(&mut self, key: slog::Key, val: &dyn slog::SerdeValue) -> slog::Result {
        // Serialize the value to JSON to capture it
        let json = serde_json::to_value(val.as_serde()).unwrap_or(JsonValue::Null);
        self.captured
            .borrow_mut()
            .insert(key.into(), CapturedValue::Serde(json));
        Ok(())
    }
}

/// Helper function to serialize a slog::Value into any Serializer.
fn serialize_to_capture<V: slog::Value, S: slog::Serializer>(
    value: &V,
    key: &'static str,
    serializer: &mut S,
) {
    // The record is created and used in a single expression to avoid lifetime issues
    static RS: slog::RecordStatic<'static> = slog::record_static!(slog::Level::Info, "");
    // We need to ensure format_args! result lives long enough
    let args = format_args!("");
    let record = slog::Record::new(&RS, &args, slog::b!());
    value.serialize(&record, key, serializer).unwrap();
}

/// A drain that keeps the message and key-value pairs of every record.
#[derive(Clone, Default)]
struct CapturingDrain {
    records: Arc<Mutex<Vec<CapturedRecord>>>,
}

#[derive(Debug, Clone)]
struct CapturedRecord {
    level: slog::Level,
    message: String,
    values: HashMap<String, CapturedValue>,
}

impl CapturingDrain {
    fn records(&self) -> Vec<CapturedRecord> {
        self.records.lock().unwrap().clone()
    }
}

impl slog::Drain for CapturingDrain {
    type Ok = ();
    type Err = slog::Never;

    fn log(&self, record: &slog::Record<'_>, _values: &slog::OwnedKVList) -> Result<(), slog::Never> {
        let mut serializer = CapturingSerializer::new();
        slog::KV::serialize(&record.kv(), record, &mut serializer).unwrap();
        self.records.lock().unwrap().push(CapturedRecord {
            level: record.level(),
            message: record.msg().to_string(),
            values: serializer.captured.into_inner(),
        });
        Ok(())
    }
}

// ============================================================================
// Value adapters
// ============================================================================

#[derive(Loggable)]
struct User {
    username: String,
    #[loggable(exclude)]
    password: String,
    #[loggable(mask)]
    email: String,
}

fn user() -> User {
    User {
        username: "alice".into(),
        password: "super_secret_password".into(),
        email: "alice@example.com".into(),
    }
}

#[test]
fn test_rendered_emits_redacted_string() {
    let mut serializer = CapturingSerializer::new();
    serialize_to_capture(&user().rendered(), "user", &mut serializer);

    assert_eq!(
        serializer.get("user"),
        Some(CapturedValue::Str(
            "User{username=alice, password=[EXCLUDED], email=*************.com}".into()
        ))
    );
}

#[test]
fn test_derived_value_impl_uses_rendering() {
    let mut serializer = CapturingSerializer::new();
    serialize_to_capture(&user(), "user", &mut serializer);

    match serializer.get("user") {
        Some(CapturedValue::Str(value)) => {
            assert!(!value.contains("super_secret_password"));
            assert!(value.contains("password=[EXCLUDED]"));
        }
        other => panic!("Expected Str value for 'user' key, got {other:?}"),
    }
}

#[test]
fn test_masked_and_excluded_adapters() {
    let phone = "555-123-4567".to_string();
    let mut serializer = CapturingSerializer::new();
    serialize_to_capture(&phone.masked(MaskSpec::default()), "phone", &mut serializer);
    serialize_to_capture(&phone.excluded(), "hidden", &mut serializer);
    serialize_to_capture(
        &Rendered::with_policy(&phone, &RedactionPolicy::None),
        "plain",
        &mut serializer,
    );

    assert_eq!(serializer.get("phone"), Some(CapturedValue::Str("********4567".into())));
    assert_eq!(serializer.get("hidden"), Some(CapturedValue::Str("[EXCLUDED]".into())));
    assert_eq!(serializer.get("plain"), Some(CapturedValue::Str(phone)));
}

#[test]
fn test_generic_derived_value() {
    #[derive(Loggable)]
    struct Wrapper<T> {
        inner: T,
    }

    let wrapper = Wrapper { inner: user() };
    let mut serializer = CapturingSerializer::new();
    serialize_to_capture(&wrapper, "wrapper", &mut serializer);

    match serializer.get("wrapper") {
        Some(CapturedValue::Str(value)) => assert!(value.starts_with("Wrapper{inner=User{")),
        other => panic!("Expected Str value, got {other:?}"),
    }
}

// ============================================================================
// Sink
// ============================================================================

fn transfer() -> MethodDescriptor {
    MethodDescriptor::new("bank::Transfers", "send")
        .param("iban", "String")
        .param("amount", "u64")
}

fn registry() -> Arc<PolicyRegistry> {
    Arc::new(
        PolicyRegistry::builder()
            .method(
                transfer(),
                MethodPolicies::new()
                    .mask(0, MaskSpec::default())
                    .config(OperationConfig::new("Sending {1}").with_level(Level::Info)),
            )
            .build()
            .unwrap(),
    )
}

#[test]
fn test_sink_forwards_operation_events() {
    let drain = CapturingDrain::default();
    let logger = slog::Logger::root(drain.clone(), slog::o!());
    let operations = OperationLogger::new(SlogSink::new(logger), registry());

    let iban = "DE89370400440532013000".to_string();
    let amount = 250_u64;
    let args: [&dyn Loggable; 2] = [&iban, &amount];
    let _: Result<bool, std::io::Error> = operations.instrument(&transfer(), &args, || Ok(true));

    let records = drain.records();
    assert_eq!(records.len(), 2);

    let entry = &records[0];
    assert_eq!(entry.level, slog::Level::Info);
    assert_eq!(
        entry.message,
        "Sending 250 - Entry - Method: send - Arguments: [******************3000, 250]"
    );
    assert_eq!(entry.values.get("operation"), Some(&CapturedValue::Str("entry".into())));
    assert_eq!(entry.values.get("class"), Some(&CapturedValue::Str("Transfers".into())));
    assert_eq!(entry.values.get("method"), Some(&CapturedValue::Str("send".into())));
    match entry.values.get("event") {
        Some(CapturedValue::Serde(json)) => {
            assert_eq!(json["operation"], "entry");
            assert_eq!(json["arguments"][0], "******************3000");
        }
        other => panic!("Expected Serde value for 'event' key, got {other:?}"),
    }

    assert_eq!(records[1].values.get("operation"), Some(&CapturedValue::Str("exit".into())));
    assert!(records
        .iter()
        .all(|record| !record.message.contains("DE89370400440532013000")));
}

#[test]
fn test_sink_forwards_messages() {
    let drain = CapturingDrain::default();
    let logger = slog::Logger::root(drain.clone(), slog::o!());
    let resolver = Arc::new(CallerResolver::new(registry()));
    let masked = MaskedLogger::new("bank", SlogSink::new(logger), resolver);

    let method = transfer();
    let iban = "DE89370400440532013000".to_string();
    let args: [&dyn Loggable; 1] = [&iban];
    masked.bind(&method).warn("retrying {}", &args);

    let records = drain.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].level, slog::Level::Warning);
    assert_eq!(records[0].message, "retrying ******************3000");
    assert_eq!(records[0].values.get("target"), Some(&CapturedValue::Str("bank".into())));
}
