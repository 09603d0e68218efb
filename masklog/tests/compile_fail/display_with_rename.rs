//! Test: `display` together with `rename` should fail.
//!
//! A `display` type renders through its `Display` impl, so there is no
//! record name to rename.

use masklog::Loggable;

#[derive(Loggable)]
#[loggable(display, rename = "Id")]
struct OrderId(u64);

fn main() {}
