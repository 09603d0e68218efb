//! Redaction-aware structured logging.
//!
//! This crate renders arguments, return values and errors of application
//! operations into log records while honoring per-field and per-parameter
//! redaction policies:
//! - **Rendering**: values describe themselves through [`Loggable`]; the
//!   renderer bounds depth, detects shared cycles and contains panics.
//! - **Policies**: `None`, `Exclude` or `Mask`, declared on fields with
//!   `#[derive(Loggable)]` and on method parameters in a [`PolicyRegistry`].
//! - **Operation logging**: [`OperationLogger`] emits entry, exit and error
//!   records around a call.
//! - **Ad-hoc logging**: [`MaskedLogger`] fills `{}` placeholders with
//!   arguments masked by the policies of the calling method.
//!
//! ```rust
//! use masklog::{render, Loggable};
//!
//! #[derive(Loggable)]
//! struct Login {
//!     user: String,
//!     #[loggable(exclude)]
//!     password: String,
//!     #[loggable(mask)]
//!     email: String,
//! }
//!
//! let login = Login {
//!     user: "alice".into(),
//!     password: "hunter2".into(),
//!     email: "alice@example.com".into(),
//! };
//! assert_eq!(
//!     render(&login),
//!     "Login{user=alice, password=[EXCLUDED], email=*************.com}"
//! );
//! ```
//!
//! What it does not do:
//! - format or ship records; that is the job of a [`Sink`] (e.g. `slog`)
//! - intercept calls on its own; callers wrap operations explicitly

// <https://doc.rust-lang.org/rustc/lints/listing/allowed-by-default.html>
#![warn(
    anonymous_parameters,
    bare_trait_objects,
    elided_lifetimes_in_paths,
    missing_copy_implementations,
    rust_2018_idioms,
    trivial_casts,
    trivial_numeric_casts,
    unreachable_pub,
    unsafe_code,
    unused_extern_crates,
    unused_import_braces
)]
// <https://rust-lang.github.io/rust-clippy/stable>
#![warn(
    clippy::all,
    clippy::cargo,
    clippy::dbg_macro,
    clippy::float_cmp_const,
    clippy::get_unwrap,
    clippy::mem_forget,
    clippy::nursery,
    clippy::pedantic,
    clippy::todo,
    clippy::unwrap_used,
    clippy::uninlined_format_args
)]
// Allow some clippy lints
#![allow(
    clippy::default_trait_access,
    clippy::doc_markdown,
    clippy::if_not_else,
    clippy::module_name_repetitions,
    clippy::multiple_crate_versions,
    clippy::must_use_candidate,
    clippy::needless_pass_by_value,
    clippy::needless_ifs,
    clippy::use_self,
    clippy::cargo_common_metadata,
    clippy::missing_errors_doc,
    clippy::enum_glob_use,
    clippy::struct_excessive_bools,
    clippy::missing_const_for_fn,
    clippy::redundant_pub_crate,
    clippy::result_large_err,
    clippy::future_not_send,
    clippy::option_if_let_else,
    clippy::from_over_into,
    clippy::manual_inspect
)]
// Allow some lints while testing
#![cfg_attr(test, allow(clippy::non_ascii_literal, clippy::unwrap_used))]

pub use masklog_derive::Loggable;

#[allow(unused_extern_crates)]
extern crate self as masklog;

// Module declarations
mod caller;
mod descriptor;
mod error;
mod level;
mod logger;
mod operation;
mod policy;
mod registry;
mod render;
mod sink;
#[cfg(feature = "slog")]
pub mod slog;

// Re-exports
pub use caller::CallerResolver;
pub use descriptor::{FieldDescriptor, MethodDescriptor, ParamDescriptor};
pub use error::{ParseLevelError, ParsePositionError, RegistryError};
pub use level::Level;
pub use logger::{fill_placeholders, BoundLogger, MaskedLogger};
pub use operation::{
    cause_chain, root_cause, root_cause_message, EventKind, OperationEvent, OperationLogger,
    ThrownError, HANDLED_TRACE_HEADER, MAX_CAUSE_DEPTH, NO_ERROR_MESSAGE, UNHANDLED_TRACE_HEADER,
};
pub use policy::{
    apply_mask, mask_value, mask_value_with, MaskPosition, MaskSpec, RedactionPolicy,
    EXCLUDED_PLACEHOLDER, INACCESSIBLE_PLACEHOLDER, NULL_LITERAL,
};
pub use registry::{
    ExceptionRule, MethodPolicies, OperationConfig, PolicyRegistry, PolicyRegistryBuilder,
};
pub use render::{
    field_policy, render, render_field, render_with_policy, DebugValue, DisplayValue,
    FieldPolicies, FieldPolicy, Loggable, RecordWriter, RenderOptions, Renderer,
    CYCLE_PLACEHOLDER, MAX_DEPTH_PLACEHOLDER,
};
pub use sink::{LoggedMessage, MemorySink, Sink};
