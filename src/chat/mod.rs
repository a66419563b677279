//! Chat module
//!
//! Turns Data Analytics messages into the JSON the frontend renders,
//! including chart specs.

pub mod chart;
pub mod format;

pub use chart::process_chart;
pub use format::format_message;
