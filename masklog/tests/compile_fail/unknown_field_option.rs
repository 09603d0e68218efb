//! Test: An unknown field option should fail.
//!
//! Only `exclude`, `mask` and `skip` are accepted on fields.

use masklog::Loggable;

#[derive(Loggable)]
struct Login {
    // ERROR: `redact` is not a field option, use `exclude` or `mask`
    #[loggable(redact)]
    password: String,
}

fn main() {}
