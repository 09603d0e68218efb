//! Test: Deriving `Loggable` for a union should fail.
//!
//! The active field of a union is unknown, so there is nothing safe to render.

use masklog::Loggable;

#[derive(Loggable)]
union Bits {
    int: u32,
    float: f32,
}

fn main() {}
