//! Configuration helpers shared by the subcommands.

mod duration;

pub use duration::{parse_duration, parse_duration_to_secs};
