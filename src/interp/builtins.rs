//! Global objects and primitive methods available to scripts

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use super::scope::Scope;
use super::value::{format_number, JsonConverter, NativeConverter, Value};
use super::RuntimeError;

/// Shared buffer receiving `console.log` lines
pub type OutputBuffer = Rc<RefCell<Vec<String>>>;

fn arg(args: &[Value], i: usize) -> Value {
    args.get(i).cloned().unwrap_or(Value::Undefined)
}

fn num(args: &[Value], i: usize) -> f64 {
    arg(args, i).to_number()
}

/// Text used by `console.log`: strings raw, structures as JSON
fn log_text(value: &Value, converter: &JsonConverter) -> String {
    match value {
        Value::Array(_) | Value::Object(_) => converter
            .to_native(value)
            .map(|v| v.to_string())
            .unwrap_or_else(|_| value.to_display()),
        other => other.to_display(),
    }
}

/// Install the standard globals into `global`
///
/// `conversion_depth` bounds structure nesting for `JSON` and `console.log`.
pub fn install(global: &Scope, output: &OutputBuffer, conversion_depth: usize) {
    global.declare("undefined", Value::Undefined, true);
    global.declare("NaN", Value::Number(f64::NAN), true);
    global.declare("Infinity", Value::Number(f64::INFINITY), true);

    global.declare("Math", math_object(), true);
    global.declare("JSON", json_object(conversion_depth), true);
    global.declare("console", console_object(output, conversion_depth), true);

    global.declare(
        "isNaN",
        Value::native("isNaN", |_, args| Ok(Value::Bool(num(args, 0).is_nan()))),
        true,
    );
    global.declare(
        "parseFloat",
        Value::native("parseFloat", |_, args| {
            let text = arg(args, 0).to_display();
            let trimmed = text.trim_start();
            // Longest numeric prefix, as parseFloat does
            let end = (1..=trimmed.len())
                .rev()
                .find(|&i| trimmed.is_char_boundary(i) && trimmed[..i].parse::<f64>().is_ok())
                .unwrap_or(0);
            Ok(Value::Number(
                trimmed[..end].parse::<f64>().unwrap_or(f64::NAN),
            ))
        }),
        true,
    );
    global.declare(
        "Number",
        Value::native("Number", |_, args| {
            Ok(Value::Number(args.first().map(Value::to_number).unwrap_or(0.0)))
        }),
        true,
    );
    global.declare(
        "String",
        Value::native("String", |_, args| {
            Ok(Value::from(
                args.first().map(Value::to_display).unwrap_or_default(),
            ))
        }),
        true,
    );
}

fn math_object() -> Value {
    let mut props = BTreeMap::new();
    props.insert("PI".to_string(), Value::Number(std::f64::consts::PI));
    props.insert("E".to_string(), Value::Number(std::f64::consts::E));
    props.insert("LN2".to_string(), Value::Number(std::f64::consts::LN_2));
    props.insert("LN10".to_string(), Value::Number(std::f64::consts::LN_10));
    props.insert("SQRT2".to_string(), Value::Number(std::f64::consts::SQRT_2));

    let unary: &[(&str, fn(f64) -> f64)] = &[
        ("abs", f64::abs),
        ("sqrt", f64::sqrt),
        ("cbrt", f64::cbrt),
        ("exp", f64::exp),
        ("log", f64::ln),
        ("log2", f64::log2),
        ("log10", f64::log10),
        ("sin", f64::sin),
        ("cos", f64::cos),
        ("tan", f64::tan),
        ("asin", f64::asin),
        ("acos", f64::acos),
        ("atan", f64::atan),
        ("sinh", f64::sinh),
        ("cosh", f64::cosh),
        ("tanh", f64::tanh),
        ("floor", f64::floor),
        ("ceil", f64::ceil),
        ("trunc", f64::trunc),
        ("sign", js_sign),
        ("round", js_round),
    ];
    for (name, f) in unary {
        let f = *f;
        props.insert(
            name.to_string(),
            Value::native(&format!("Math.{name}"), move |_, args| {
                Ok(Value::Number(f(num(args, 0))))
            }),
        );
    }

    props.insert(
        "pow".to_string(),
        Value::native("Math.pow", |_, args| {
            Ok(Value::Number(num(args, 0).powf(num(args, 1))))
        }),
    );
    props.insert(
        "atan2".to_string(),
        Value::native("Math.atan2", |_, args| {
            Ok(Value::Number(num(args, 0).atan2(num(args, 1))))
        }),
    );
    props.insert(
        "max".to_string(),
        Value::native("Math.max", |_, args| {
            Ok(Value::Number(args.iter().map(Value::to_number).fold(
                f64::NEG_INFINITY,
                |acc, n| if n.is_nan() || acc.is_nan() { f64::NAN } else { acc.max(n) },
            )))
        }),
    );
    props.insert(
        "min".to_string(),
        Value::native("Math.min", |_, args| {
            Ok(Value::Number(args.iter().map(Value::to_number).fold(
                f64::INFINITY,
                |acc, n| if n.is_nan() || acc.is_nan() { f64::NAN } else { acc.min(n) },
            )))
        }),
    );

    Value::object(props)
}

fn js_sign(n: f64) -> f64 {
    if n.is_nan() || n == 0.0 {
        n
    } else {
        n.signum()
    }
}

/// JavaScript rounds halves toward positive infinity
fn js_round(n: f64) -> f64 {
    (n + 0.5).floor()
}

fn json_object(depth: usize) -> Value {
    let mut props = BTreeMap::new();
    props.insert(
        "stringify".to_string(),
        Value::native("JSON.stringify", move |_, args| {
            let value = arg(args, 0);
            if value.is_undefined() {
                return Ok(Value::Undefined);
            }
            JsonConverter::new(depth)
                .to_native(&value)
                .map(|v| Value::from(v.to_string()))
                .map_err(|e| RuntimeError::type_error(e.to_string()))
        }),
    );
    props.insert(
        "parse".to_string(),
        Value::native("JSON.parse", move |_, args| {
            let text = arg(args, 0).to_display();
            let native: serde_json::Value = serde_json::from_str(&text)
                .map_err(|e| RuntimeError::Syntax(format!("JSON.parse: {e}")))?;
            JsonConverter::new(depth)
                .from_native(&native)
                .map_err(|e| RuntimeError::type_error(e.to_string()))
        }),
    );
    Value::object(props)
}

fn console_object(output: &OutputBuffer, depth: usize) -> Value {
    let mut props = BTreeMap::new();
    let sink = output.clone();
    props.insert(
        "log".to_string(),
        Value::native("console.log", move |_, args| {
            let converter = JsonConverter::new(depth);
            let line = args
                .iter()
                .map(|v| log_text(v, &converter))
                .collect::<Vec<_>>()
                .join(" ");
            tracing::trace!(line = %line, "console.log");
            sink.borrow_mut().push(line);
            Ok(Value::Undefined)
        }),
    );
    Value::object(props)
}

/// Methods and properties of primitive and array receivers
pub fn primitive_property(receiver: &Value, key: &str) -> Option<Value> {
    match (receiver, key) {
        (Value::Array(items), "length") => Some(Value::Number(items.borrow().len() as f64)),
        (Value::Array(_), "push") => Some(Value::native("push", |this, args| {
            let Value::Array(items) = this else {
                return Err(RuntimeError::type_error("push called on non-array"));
            };
            let mut items = items.borrow_mut();
            items.extend(args.iter().cloned());
            Ok(Value::Number(items.len() as f64))
        })),
        (Value::Array(_), "pop") => Some(Value::native("pop", |this, _| {
            let Value::Array(items) = this else {
                return Err(RuntimeError::type_error("pop called on non-array"));
            };
            Ok(items.borrow_mut().pop().unwrap_or(Value::Undefined))
        })),
        (Value::Array(_), "join") => Some(Value::native("join", |this, args| {
            if !matches!(this, Value::Array(_)) {
                return Err(RuntimeError::type_error("join called on non-array"));
            }
            let sep = match arg(args, 0) {
                Value::Undefined => ",".to_string(),
                other => other.to_display(),
            };
            Ok(Value::from(this.join(&sep)))
        })),
        (Value::Array(_), "indexOf") => Some(Value::native("indexOf", |this, args| {
            let Value::Array(items) = this else {
                return Err(RuntimeError::type_error("indexOf called on non-array"));
            };
            let needle = arg(args, 0);
            let index = items
                .borrow()
                .iter()
                .position(|v| v.strict_equals(&needle))
                .map(|i| i as f64)
                .unwrap_or(-1.0);
            Ok(Value::Number(index))
        })),
        (Value::Array(items), index) => index
            .parse::<usize>()
            .ok()
            .map(|i| items.borrow().get(i).cloned().unwrap_or(Value::Undefined)),
        (Value::Str(s), "length") => Some(Value::Number(s.chars().count() as f64)),
        (Value::Str(_), "toUpperCase") => Some(Value::native("toUpperCase", |this, _| {
            Ok(Value::from(this.to_display().to_uppercase()))
        })),
        (Value::Str(_), "toLowerCase") => Some(Value::native("toLowerCase", |this, _| {
            Ok(Value::from(this.to_display().to_lowercase()))
        })),
        (Value::Str(s), index) => index
            .parse::<usize>()
            .ok()
            .map(|i| s.chars().nth(i).map(|c| Value::from(c.to_string())).unwrap_or(Value::Undefined)),
        (Value::Number(_), "toFixed") => Some(Value::native("toFixed", |this, args| {
            let digits = num(args, 0);
            let digits = if digits.is_nan() { 0.0 } else { digits };
            if !(0.0..=100.0).contains(&digits) {
                return Err(RuntimeError::Range(
                    "toFixed() digits argument must be between 0 and 100".to_string(),
                ));
            }
            let n = this.to_number();
            if !n.is_finite() {
                return Ok(Value::from(format_number(n)));
            }
            Ok(Value::from(format!("{:.*}", digits as usize, n)))
        })),
        (Value::Number(_) | Value::Bool(_), "toString") => {
            Some(Value::native("toString", |this, _| Ok(Value::from(this.to_display()))))
        }
        (Value::Function(func), "name") => Some(Value::from(func.name())),
        _ => None,
    }
}
