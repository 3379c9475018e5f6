//! Channel layer for output accumulation and pattern matching.
//!
//! This module handles the byte-level side of interactive sessions:
//! ANSI stripping, read-position bookkeeping, and locating the earliest
//! pattern or literal match in streamed output.

mod buffer;
mod patterns;

pub use buffer::PatternBuffer;
pub use patterns::{Located, compile_prompt_pattern, earliest_literal, earliest_match};
