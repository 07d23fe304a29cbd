//! Command-line interface for staycompare.

mod commands;
pub mod icons;

pub use commands::{is_verbose, run};
