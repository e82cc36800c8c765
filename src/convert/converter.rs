//! Typed conversion of raw property values.

use super::expression::{ExpressionEvaluator, SimpleEvaluator, strip_markers};
use super::rules;
use crate::error::{PropertyError, Result};
use std::any::{Any, TypeId, type_name};
use std::borrow::Cow;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

/// A type-erased conversion rule. `None` means "not a literal of this type".
type ErasedRule = Arc<dyn Fn(&str) -> Option<Box<dyn Any + Send>> + Send + Sync>;

/// Converts raw property strings into typed values.
///
/// Conversion runs in three steps:
///
/// 1. A value wrapped in `#{ ... }` is evaluated by the configured
///    [`ExpressionEvaluator`]; its output replaces the raw string.
/// 2. If a rule is registered for the target type, it is applied. Rules report
///    "no match" by returning `None`, which surfaces as `Ok(None)`.
/// 3. Otherwise the value is coerced by inspecting the target type: integers,
///    floats, `bool`, `char`, `String` and `PathBuf`. A failed coercion is a
///    [`PropertyError::ConversionError`].
///
/// Built-in rules cover `std::time::Duration`, `chrono::TimeDelta`,
/// `chrono::NaiveDate`, `chrono::NaiveDateTime` and `chrono::NaiveTime`.
///
/// # Examples
///
/// ```rust
/// use reloadable_properties::convert::ValueConverter;
/// use std::time::Duration;
///
/// let converter = ValueConverter::new();
/// assert_eq!(converter.convert::<i32>("#{ 1+1 }").unwrap(), Some(2));
/// assert_eq!(converter.convert::<Duration>("5m").unwrap(), Some(Duration::from_secs(300)));
/// assert_eq!(converter.convert::<Duration>("whenever").unwrap(), None);
/// ```
#[derive(Clone)]
pub struct ValueConverter {
    rules: HashMap<TypeId, ErasedRule>,
    evaluator: Arc<dyn ExpressionEvaluator>,
}

impl ValueConverter {
    /// Create a converter with the built-in rules and the [`SimpleEvaluator`].
    pub fn new() -> Self {
        Self::empty()
            .with_rule(rules::parse_duration)
            .with_rule(rules::parse_period)
            .with_rule(rules::parse_date)
            .with_rule(rules::parse_date_time)
            .with_rule(rules::parse_time)
    }

    /// Create a converter with no registered rules (generic coercion only).
    pub fn empty() -> Self {
        Self {
            rules: HashMap::new(),
            evaluator: Arc::new(SimpleEvaluator),
        }
    }

    /// Register (or replace) the rule for type `T`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use reloadable_properties::convert::ValueConverter;
    ///
    /// #[derive(Debug, PartialEq)]
    /// struct Percent(u8);
    ///
    /// let converter = ValueConverter::new().with_rule(|raw: &str| {
    ///     raw.strip_suffix('%')?.parse().ok().map(Percent)
    /// });
    /// assert_eq!(converter.convert::<Percent>("42%").unwrap(), Some(Percent(42)));
    /// ```
    pub fn with_rule<T, F>(mut self, rule: F) -> Self
    where
        T: Any + Send,
        F: Fn(&str) -> Option<T> + Send + Sync + 'static,
    {
        let erased: ErasedRule =
            Arc::new(move |input: &str| rule(input).map(|v| Box::new(v) as Box<dyn Any + Send>));
        self.rules.insert(TypeId::of::<T>(), erased);
        self
    }

    /// Replace the expression evaluator.
    pub fn with_evaluator(mut self, evaluator: impl ExpressionEvaluator + 'static) -> Self {
        self.evaluator = Arc::new(evaluator);
        self
    }

    /// Returns `true` if a rule is registered for `T`.
    pub fn has_rule<T: Any>(&self) -> bool {
        self.rules.contains_key(&TypeId::of::<T>())
    }

    /// Evaluate `raw` if it is an expression, otherwise return it unchanged.
    ///
    /// # Errors
    ///
    /// Returns a [`PropertyError::ConversionError`] wrapping the evaluator's error.
    pub fn resolve_expression<'a>(&self, raw: &'a str) -> Result<Cow<'a, str>> {
        let Some(expression) = strip_markers(raw) else {
            return Ok(Cow::Borrowed(raw));
        };

        self.evaluator
            .evaluate(expression)
            .map(Cow::Owned)
            .map_err(|e| PropertyError::ConversionError {
                value: raw.to_string(),
                target: "expression",
                reason: "expression evaluation failed".to_string(),
                source: Some(e),
            })
    }

    /// Convert `raw` into a `T`.
    ///
    /// Returns `Ok(None)` when a registered rule reports that the input is not
    /// a literal of `T`.
    ///
    /// # Errors
    ///
    /// Returns a [`PropertyError::ConversionError`] if expression evaluation
    /// fails, if `T` has no rule and is not a coercible type, or if coercion
    /// fails.
    pub fn convert<T: Any + Send>(&self, raw: &str) -> Result<Option<T>> {
        let input = self.resolve_expression(raw)?;

        let boxed = match self.rules.get(&TypeId::of::<T>()) {
            Some(rule) => match rule(&input) {
                Some(value) => value,
                None => return Ok(None),
            },
            None => coerce(TypeId::of::<T>(), &input)
                .ok_or_else(|| {
                    PropertyError::conversion(
                        raw,
                        type_name::<T>(),
                        "no conversion rule registered for this type",
                    )
                })?
                .map_err(|reason| PropertyError::conversion(raw, type_name::<T>(), reason))?,
        };

        boxed.downcast::<T>().map(|v| Some(*v)).map_err(|_| {
            PropertyError::conversion(raw, type_name::<T>(), "conversion rule produced another type")
        })
    }

    /// Convert `raw` into a `T`, treating "no match" as an error.
    ///
    /// # Errors
    ///
    /// Everything [`convert`](Self::convert) returns, plus a
    /// [`PropertyError::ConversionError`] when the rule reports no match.
    pub fn convert_required<T: Any + Send>(&self, raw: &str) -> Result<T> {
        self.convert::<T>(raw)?.ok_or_else(|| {
            PropertyError::conversion(raw, type_name::<T>(), "value is not a literal of this type")
        })
    }
}

impl Default for ValueConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ValueConverter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValueConverter")
            .field("rules", &self.rules.len())
            .finish_non_exhaustive()
    }
}

type Coerced = std::result::Result<Box<dyn Any + Send>, String>;

macro_rules! coerce_from_str {
    ($target:expr, $input:expr, $($ty:ty),+ $(,)?) => {
        $(
            if $target == TypeId::of::<$ty>() {
                return Some(
                    $input
                        .trim()
                        .parse::<$ty>()
                        .map(|v| Box::new(v) as Box<dyn Any + Send>)
                        .map_err(|e| e.to_string()),
                );
            }
        )+
    };
}

/// Best-effort conversion by target type. `None` means the type is not coercible.
fn coerce(target: TypeId, input: &str) -> Option<Coerced> {
    if target == TypeId::of::<String>() {
        return Some(Ok(Box::new(input.to_string())));
    }
    if target == TypeId::of::<PathBuf>() {
        return Some(Ok(Box::new(PathBuf::from(input.trim()))));
    }
    if target == TypeId::of::<bool>() {
        return Some(
            rules::parse_bool(input)
                .map(|v| Box::new(v) as Box<dyn Any + Send>)
                .ok_or_else(|| "not a boolean".to_string()),
        );
    }

    coerce_from_str!(
        target, input, i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64,
        char,
    );

    None
}
