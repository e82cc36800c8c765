//! Conversion of raw property strings into typed values.
//!
//! The [`ValueConverter`] owns an open registry of per-type rules and falls back
//! to coercion for primitive types. Values wrapped in `#{ ... }` are evaluated by
//! a pluggable [`ExpressionEvaluator`] first.

mod converter;
mod expression;
pub mod rules;

pub use converter::ValueConverter;
pub use expression::{ExpressionEvaluator, SimpleEvaluator, strip_markers};
