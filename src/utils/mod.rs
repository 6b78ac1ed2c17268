//! Generic utility primitives with zero domain knowledge.
//!
//! - `io` - File I/O with consistent error handling
//! - `parser` - Regex extraction and path helpers
//! - `template` - String template rendering

pub mod io;
pub mod parser;
pub mod template;
