//! Test: `rename` on an enum should fail.
//!
//! Enum variants render under their own names, so a container name has no
//! place in the output.

use masklog::Loggable;

#[derive(Loggable)]
#[loggable(rename = "Status")]
enum State {
    Idle,
    Busy,
}

fn main() {}
