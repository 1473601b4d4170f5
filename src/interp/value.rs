//! Interpreter value representation and host conversion
//!
//! Values inside the interpreter use shared, mutable containers so that
//! scripts observe JavaScript reference semantics. The host side of the
//! debugger only ever sees [`serde_json::Value`], produced through the
//! [`NativeConverter`] trait.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use thiserror::Error;

use super::ast::{FunctionDef, NodeRef};
use super::scope::Scope;
use super::RuntimeError;

/// Host callback behind a native function: `(this, args) -> result`
pub type NativeFn = Rc<dyn Fn(&Value, &[Value]) -> Result<Value, RuntimeError>>;

/// Array nesting rendered by [`Value::join`]
pub const MAX_DISPLAY_DEPTH: usize = 64;

/// An interpreter value
#[derive(Clone)]
pub enum Value {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Str(Rc<str>),
    Array(Rc<RefCell<Vec<Value>>>),
    Object(Rc<RefCell<BTreeMap<String, Value>>>),
    Function(Rc<Function>),
}

/// Callable values
pub enum Function {
    /// A script-defined function closing over its defining scope
    Closure {
        node: NodeRef,
        def: Rc<FunctionDef>,
        scope: Rc<Scope>,
    },
    /// A host function
    Native { name: String, func: NativeFn },
}

impl Function {
    pub fn name(&self) -> &str {
        match self {
            Function::Closure { def, .. } => def.display_name(),
            Function::Native { name, .. } => name,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Function(func) => write!(f, "[Function {}]", func.name()),
            other => write!(f, "{}", other.to_display()),
        }
    }
}

impl PartialEq for Value {
    /// Strict equality (`===`), except that NaN equals itself so tests can
    /// compare values structurally
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) if a.is_nan() && b.is_nan() => true,
            _ => self.strict_equals(other),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(Rc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(Rc::from(s))
    }
}

impl Value {
    pub fn array(items: Vec<Value>) -> Self {
        Value::Array(Rc::new(RefCell::new(items)))
    }

    pub fn object(props: BTreeMap<String, Value>) -> Self {
        Value::Object(Rc::new(RefCell::new(props)))
    }

    pub fn native(
        name: &str,
        func: impl Fn(&Value, &[Value]) -> Result<Value, RuntimeError> + 'static,
    ) -> Self {
        Value::Function(Rc::new(Function::Native {
            name: name.to_string(),
            func: Rc::new(func),
        }))
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null | Value::Array(_) | Value::Object(_) => "object",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::Str(_) => "string",
            Value::Function(_) => "function",
        }
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Str(s) => !s.is_empty(),
            Value::Array(_) | Value::Object(_) | Value::Function(_) => true,
        }
    }

    pub fn to_number(&self) -> f64 {
        match self {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Bool(b) => f64::from(u8::from(*b)),
            Value::Number(n) => *n,
            Value::Str(s) => {
                let t = s.trim();
                if t.is_empty() {
                    0.0
                } else {
                    t.parse().unwrap_or(f64::NAN)
                }
            }
            // Arrays convert through their joined text: [] is 0, [5] is 5
            Value::Array(_) => Value::from(self.to_display()).to_number(),
            Value::Object(_) | Value::Function(_) => f64::NAN,
        }
    }

    /// String conversion as performed by `String(value)` and `+` concatenation
    pub fn to_display(&self) -> String {
        match self {
            Value::Undefined => "undefined".to_string(),
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::Str(s) => s.to_string(),
            Value::Array(_) => self.join(","),
            Value::Object(_) => "[object Object]".to_string(),
            Value::Function(func) => format!("function {}() {{ [code] }}", func.name()),
        }
    }

    /// Elements joined with `sep`, as `Array.prototype.join` does
    ///
    /// Non-arrays display as themselves. An array that contains itself, or
    /// nesting past [`MAX_DISPLAY_DEPTH`], renders as empty text.
    pub fn join(&self, sep: &str) -> String {
        self.join_at(sep, &mut Vec::new())
    }

    fn join_at(&self, sep: &str, open: &mut Vec<*const RefCell<Vec<Value>>>) -> String {
        let Value::Array(items) = self else {
            return self.to_display();
        };
        let ptr = Rc::as_ptr(items);
        if open.contains(&ptr) || open.len() >= MAX_DISPLAY_DEPTH {
            return String::new();
        }
        open.push(ptr);
        let parts: Vec<String> = items
            .borrow()
            .iter()
            .map(|v| match v {
                Value::Undefined | Value::Null => String::new(),
                Value::Array(_) => v.join_at(",", open),
                v => v.to_display(),
            })
            .collect();
        open.pop();
        parts.join(sep)
    }

    pub fn strict_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Abstract equality (`==`) for the primitive cases scripts rely on
    pub fn loose_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined | Value::Null, Value::Undefined | Value::Null) => true,
            (Value::Undefined | Value::Null, _) | (_, Value::Undefined | Value::Null) => false,
            (Value::Number(_) | Value::Bool(_) | Value::Str(_), Value::Number(_) | Value::Bool(_))
            | (Value::Number(_) | Value::Bool(_), Value::Str(_)) => {
                self.to_number() == other.to_number()
            }
            _ => self.strict_equals(other),
        }
    }
}

/// Format a number the way JavaScript prints it
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n == 0.0 {
        // Covers -0, which JavaScript prints without a sign
        "0".to_string()
    } else {
        format!("{n}")
    }
}

/// Failure converting between interpreter and host values
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConversionError {
    #[error("Value nesting exceeds {0} levels (cyclic structure?)")]
    TooDeep(usize),

    #[error("Number {0} has no host representation")]
    UnrepresentableNumber(String),
}

/// Adapter between interpreter values and host-native values
///
/// The debugger core only depends on this trait, never on the interpreter's
/// internal representation.
pub trait NativeConverter {
    /// Interpreter value to host value
    fn to_native(&self, value: &Value) -> Result<serde_json::Value, ConversionError>;

    /// Host value to interpreter value
    fn from_native(&self, native: &serde_json::Value) -> Result<Value, ConversionError>;
}

/// Default converter mapping to and from JSON
#[derive(Debug, Clone)]
pub struct JsonConverter {
    max_depth: usize,
}

impl Default for JsonConverter {
    fn default() -> Self {
        Self { max_depth: 32 }
    }
}

impl JsonConverter {
    pub fn new(max_depth: usize) -> Self {
        Self { max_depth }
    }

    fn to_native_at(&self, value: &Value, depth: usize) -> Result<serde_json::Value, ConversionError> {
        if depth > self.max_depth {
            return Err(ConversionError::TooDeep(self.max_depth));
        }
        Ok(match value {
            Value::Undefined | Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            // NaN and the infinities have no JSON form; JSON.stringify uses null too
            Value::Number(n) => serde_json::Number::from_f64(*n)
                .map(|num| {
                    if n.fract() == 0.0 && n.abs() < 9.007_199_254_740_992e15 {
                        serde_json::Value::from(*n as i64)
                    } else {
                        serde_json::Value::Number(num)
                    }
                })
                .unwrap_or(serde_json::Value::Null),
            Value::Str(s) => serde_json::Value::String(s.to_string()),
            Value::Array(items) => serde_json::Value::Array(
                items
                    .borrow()
                    .iter()
                    .map(|v| self.to_native_at(v, depth + 1))
                    .collect::<Result<_, _>>()?,
            ),
            Value::Object(props) => serde_json::Value::Object(
                props
                    .borrow()
                    .iter()
                    .map(|(k, v)| Ok((k.clone(), self.to_native_at(v, depth + 1)?)))
                    .collect::<Result<_, ConversionError>>()?,
            ),
            Value::Function(func) => serde_json::Value::String(format!("[Function {}]", func.name())),
        })
    }

    fn from_native_at(&self, native: &serde_json::Value, depth: usize) -> Result<Value, ConversionError> {
        if depth > self.max_depth {
            return Err(ConversionError::TooDeep(self.max_depth));
        }
        Ok(match native {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => Value::Number(
                n.as_f64()
                    .ok_or_else(|| ConversionError::UnrepresentableNumber(n.to_string()))?,
            ),
            serde_json::Value::String(s) => Value::from(s.as_str()),
            serde_json::Value::Array(items) => Value::array(
                items
                    .iter()
                    .map(|v| self.from_native_at(v, depth + 1))
                    .collect::<Result<_, _>>()?,
            ),
            serde_json::Value::Object(map) => Value::object(
                map.iter()
                    .map(|(k, v)| Ok((k.clone(), self.from_native_at(v, depth + 1)?)))
                    .collect::<Result<_, ConversionError>>()?,
            ),
        })
    }
}

impl NativeConverter for JsonConverter {
    fn to_native(&self, value: &Value) -> Result<serde_json::Value, ConversionError> {
        self.to_native_at(value, 0)
    }

    fn from_native(&self, native: &serde_json::Value) -> Result<Value, ConversionError> {
        self.from_native_at(native, 0)
    }
}
