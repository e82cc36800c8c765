//! Expression markers and the evaluator seam.
//!
//! A raw value of the form `#{ <expr> }` is handed to an [`ExpressionEvaluator`]
//! instead of being taken literally. The crate ships [`SimpleEvaluator`], which
//! understands integer/float arithmetic, string literals and a handful of
//! string methods. Embedders with a richer expression language plug in their
//! own implementation.

use crate::error::BoxError;
use std::fmt;

const OPEN_MARKER: &str = "#{";
const CLOSE_MARKER: &str = "}";

/// Evaluates the inner text of an expression value.
pub trait ExpressionEvaluator: Send + Sync {
    /// Evaluate `expression` (markers and surrounding whitespace already stripped)
    /// and render the result as a string.
    ///
    /// # Errors
    ///
    /// Returns the evaluator's own error; callers wrap it in a conversion error.
    fn evaluate(&self, expression: &str) -> Result<String, BoxError>;
}

impl<F> ExpressionEvaluator for F
where
    F: Fn(&str) -> Result<String, BoxError> + Send + Sync,
{
    fn evaluate(&self, expression: &str) -> Result<String, BoxError> {
        self(expression)
    }
}

/// Returns the trimmed inner text if `raw` is wrapped in expression markers.
pub fn strip_markers(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();
    if trimmed.len() < OPEN_MARKER.len() + CLOSE_MARKER.len() {
        return None;
    }
    trimmed
        .strip_prefix(OPEN_MARKER)
        .and_then(|rest| rest.strip_suffix(CLOSE_MARKER))
        .map(str::trim)
}

/// Default evaluator: arithmetic, string literals and simple string methods.
///
/// Supported syntax:
///
/// - integer and decimal literals, `true` / `false`
/// - string literals in single or double quotes (a doubled quote escapes it)
/// - `+ - * / %` with the usual precedence, unary minus, parentheses
/// - `+` concatenates when either side is a string
/// - methods on strings: `concat(x)`, `toUpperCase()`, `toLowerCase()`,
///   `trim()`, `length()`
/// - `new String(x)` as an identity constructor
///
/// # Examples
///
/// ```rust
/// use reloadable_properties::convert::{ExpressionEvaluator, SimpleEvaluator};
///
/// let evaluator = SimpleEvaluator;
/// assert_eq!(evaluator.evaluate("1+1").unwrap(), "2");
/// assert_eq!(evaluator.evaluate("new String('a').concat('b')").unwrap(), "ab");
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleEvaluator;

impl ExpressionEvaluator for SimpleEvaluator {
    fn evaluate(&self, expression: &str) -> Result<String, BoxError> {
        let tokens = tokenize(expression)?;
        let mut parser = Parser {
            tokens,
            pos: 0,
            depth: 0,
        };
        let value = parser.expression()?;
        if let Some(token) = parser.peek() {
            return Err(EvalError(format!("unexpected token {:?}", token)).into());
        }
        Ok(value.to_string())
    }
}

#[derive(Debug)]
struct EvalError(String);

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for EvalError {}

type EvalResult<T> = Result<T, EvalError>;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Int(i64),
    Float(f64),
    Str(String),
    Ident(String),
    Op(char),
}

#[derive(Debug, Clone, PartialEq)]
enum Value {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Bool(v) => write!(f, "{}", v),
            Value::Str(v) => write!(f, "{}", v),
        }
    }
}

impl Value {
    fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }
}

fn tokenize(input: &str) -> EvalResult<Vec<Token>> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
        } else if c.is_ascii_digit() {
            let start = i;
            while i < chars.len() && chars[i].is_ascii_digit() {
                i += 1;
            }
            let is_float =
                i + 1 < chars.len() && chars[i] == '.' && chars[i + 1].is_ascii_digit();
            if is_float {
                i += 1;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
            }
            let literal: String = chars[start..i].iter().collect();
            let token = if is_float {
                literal
                    .parse()
                    .map(Token::Float)
                    .map_err(|e| EvalError(format!("bad number '{}': {}", literal, e)))?
            } else {
                literal
                    .parse()
                    .map(Token::Int)
                    .map_err(|e| EvalError(format!("bad number '{}': {}", literal, e)))?
            };
            tokens.push(token);
        } else if c == '\'' || c == '"' {
            let quote = c;
            let mut text = String::new();
            i += 1;
            loop {
                match chars.get(i) {
                    None => return Err(EvalError("unterminated string literal".to_string())),
                    Some(&ch) if ch == quote => {
                        if chars.get(i + 1) == Some(&quote) {
                            text.push(quote);
                            i += 2;
                        } else {
                            i += 1;
                            break;
                        }
                    }
                    Some(&ch) => {
                        text.push(ch);
                        i += 1;
                    }
                }
            }
            tokens.push(Token::Str(text));
        } else if c.is_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            tokens.push(Token::Ident(chars[start..i].iter().collect()));
        } else if "+-*/%().,".contains(c) {
            tokens.push(Token::Op(c));
            i += 1;
        } else {
            return Err(EvalError(format!("unexpected character '{}'", c)));
        }
    }

    Ok(tokens)
}

/// Deepest nesting of parentheses, calls and unary minus an expression may use.
const MAX_NESTING: usize = 64;

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn nested<T>(&mut self, parse: impl FnOnce(&mut Self) -> EvalResult<T>) -> EvalResult<T> {
        if self.depth >= MAX_NESTING {
            return Err(EvalError(format!(
                "expression nested deeper than {} levels",
                MAX_NESTING
            )));
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn eat_op(&mut self, op: char) -> bool {
        if self.peek() == Some(&Token::Op(op)) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_op(&mut self, op: char) -> EvalResult<()> {
        if self.eat_op(op) {
            Ok(())
        } else {
            Err(EvalError(format!("expected '{}'", op)))
        }
    }

    fn expression(&mut self) -> EvalResult<Value> {
        self.nested(Self::sum)
    }

    fn sum(&mut self) -> EvalResult<Value> {
        let mut lhs = self.term()?;
        loop {
            if self.eat_op('+') {
                let rhs = self.term()?;
                lhs = add(lhs, rhs)?;
            } else if self.eat_op('-') {
                let rhs = self.term()?;
                lhs = arithmetic('-', lhs, rhs)?;
            } else {
                return Ok(lhs);
            }
        }
    }

    fn term(&mut self) -> EvalResult<Value> {
        let mut lhs = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Op(op @ ('*' | '/' | '%'))) => *op,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.unary()?;
            lhs = arithmetic(op, lhs, rhs)?;
        }
    }

    fn unary(&mut self) -> EvalResult<Value> {
        if self.eat_op('-') {
            return match self.nested(Self::unary)? {
                Value::Int(v) => v
                    .checked_neg()
                    .map(Value::Int)
                    .ok_or_else(|| EvalError("integer overflow".to_string())),
                Value::Float(v) => Ok(Value::Float(-v)),
                other => Err(EvalError(format!("cannot negate '{}'", other))),
            };
        }
        self.postfix()
    }

    fn postfix(&mut self) -> EvalResult<Value> {
        let mut value = self.primary()?;
        while self.eat_op('.') {
            let method = match self.next() {
                Some(Token::Ident(name)) => name,
                _ => return Err(EvalError("expected method name after '.'".to_string())),
            };
            let args = self.arguments()?;
            value = call_method(value, &method, args)?;
        }
        Ok(value)
    }

    fn arguments(&mut self) -> EvalResult<Vec<Value>> {
        self.expect_op('(')?;
        let mut args = Vec::new();
        if self.eat_op(')') {
            return Ok(args);
        }
        loop {
            args.push(self.expression()?);
            if self.eat_op(')') {
                return Ok(args);
            }
            self.expect_op(',')?;
        }
    }

    fn primary(&mut self) -> EvalResult<Value> {
        match self.next() {
            Some(Token::Int(v)) => Ok(Value::Int(v)),
            Some(Token::Float(v)) => Ok(Value::Float(v)),
            Some(Token::Str(v)) => Ok(Value::Str(v)),
            Some(Token::Ident(ident)) => match ident.as_str() {
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                "new" => self.constructor(),
                other => Err(EvalError(format!("unknown identifier '{}'", other))),
            },
            Some(Token::Op('(')) => {
                let value = self.expression()?;
                self.expect_op(')')?;
                Ok(value)
            }
            Some(token) => Err(EvalError(format!("unexpected token {:?}", token))),
            None => Err(EvalError("unexpected end of expression".to_string())),
        }
    }

    fn constructor(&mut self) -> EvalResult<Value> {
        match self.next() {
            Some(Token::Ident(name)) if name == "String" => {
                let mut args = self.arguments()?;
                match (args.pop(), args.is_empty()) {
                    (None, _) => Ok(Value::Str(String::new())),
                    (Some(arg), true) => Ok(Value::Str(arg.to_string())),
                    (Some(_), false) => {
                        Err(EvalError("String takes at most one argument".to_string()))
                    }
                }
            }
            Some(Token::Ident(name)) => Err(EvalError(format!("cannot construct '{}'", name))),
            _ => Err(EvalError("expected type name after 'new'".to_string())),
        }
    }
}

fn add(lhs: Value, rhs: Value) -> EvalResult<Value> {
    match (&lhs, &rhs) {
        (Value::Str(_), _) | (_, Value::Str(_)) => Ok(Value::Str(format!("{}{}", lhs, rhs))),
        _ => arithmetic('+', lhs, rhs),
    }
}

fn arithmetic(op: char, lhs: Value, rhs: Value) -> EvalResult<Value> {
    if let (Value::Int(a), Value::Int(b)) = (&lhs, &rhs) {
        let (a, b) = (*a, *b);
        if (op == '/' || op == '%') && b == 0 {
            return Err(EvalError("division by zero".to_string()));
        }
        let result = match op {
            '+' => a.checked_add(b),
            '-' => a.checked_sub(b),
            '*' => a.checked_mul(b),
            '/' => a.checked_div(b),
            _ => a.checked_rem(b),
        };
        return result
            .map(Value::Int)
            .ok_or_else(|| EvalError("integer overflow".to_string()));
    }

    let (Some(a), Some(b)) = (lhs.as_f64(), rhs.as_f64()) else {
        return Err(EvalError(format!(
            "operator '{}' not applicable to '{}' and '{}'",
            op, lhs, rhs
        )));
    };
    let result = match op {
        '+' => a + b,
        '-' => a - b,
        '*' => a * b,
        '/' => a / b,
        _ => a % b,
    };
    Ok(Value::Float(result))
}

fn call_method(target: Value, method: &str, args: Vec<Value>) -> EvalResult<Value> {
    let Value::Str(text) = target else {
        return Err(EvalError(format!("method '{}' requires a string target", method)));
    };

    match (method, args.as_slice()) {
        ("concat", [arg]) => Ok(Value::Str(format!("{}{}", text, arg))),
        ("toUpperCase", []) => Ok(Value::Str(text.to_uppercase())),
        ("toLowerCase", []) => Ok(Value::Str(text.to_lowercase())),
        ("trim", []) => Ok(Value::Str(text.trim().to_string())),
        ("length", []) => Ok(Value::Int(text.chars().count() as i64)),
        _ => Err(EvalError(format!(
            "unknown method '{}' with {} argument(s)",
            method,
            args.len()
        ))),
    }
}
