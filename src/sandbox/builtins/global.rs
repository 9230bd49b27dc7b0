//! Output capture, conversion functions and global constants.

use super::{arg, define_global, namespace, native};
use crate::sandbox::EvalResult;
use crate::sandbox::interpreter::Interpreter;
use crate::sandbox::value::{NativeFn, Value};
use crate::syntax::number::{is_js_whitespace, parse_float_prefix, parse_integer_digits};
use crate::transform::{CAPTURE_HOOK, OUTPUT_LEVELS};

pub(super) fn install(interpreter: &mut Interpreter) -> EvalResult<()> {
    let console = namespace(interpreter, "console")?;
    for level in OUTPUT_LEVELS {
        let function = native(interpreter, level, 0, log, None)?;
        console.borrow_mut().define_hidden(level, Value::Object(function));
    }

    for (name, length, function) in [
        ("print", 0, log as NativeFn),
        (CAPTURE_HOOK, 1, capture),
        ("parseInt", 2, parse_int),
        ("parseFloat", 1, parse_float),
        ("isNaN", 1, is_nan),
        ("isFinite", 1, is_finite),
    ] {
        let function = native(interpreter, name, length, function, None)?;
        define_global(interpreter, name, Value::Object(function));
    }

    let mut global = interpreter.global.borrow_mut();
    global.declare("NaN", Value::Number(f64::NAN), false);
    global.declare("Infinity", Value::Number(f64::INFINITY), false);
    global.declare("undefined", Value::Undefined, false);
    Ok(())
}

fn log(interpreter: &mut Interpreter, _this: &Value, args: &[Value]) -> EvalResult<Value> {
    let line = interpreter.format_line(args)?;
    interpreter.capture(line)?;
    Ok(Value::Undefined)
}

/// `__capture(level, ...args)`, the target of instrumented output calls.
fn capture(interpreter: &mut Interpreter, _this: &Value, args: &[Value]) -> EvalResult<Value> {
    if let Some(Value::String(level)) = args.first() {
        tracing::trace!(level = %level, "captured output");
    }
    log(interpreter, &Value::Undefined, args.get(1..).unwrap_or_default())
}

fn parse_int(interpreter: &mut Interpreter, _this: &Value, args: &[Value]) -> EvalResult<Value> {
    let text = interpreter.to_string(&arg(args, 0))?;
    let radix = interpreter.to_number(&arg(args, 1))?;
    Ok(Value::Number(parse_int_text(&text, radix)))
}

/// `parseInt` on already-converted arguments.
pub(super) fn parse_int_text(text: &str, radix: f64) -> f64 {
    let trimmed = text.trim_start_matches(is_js_whitespace);
    let (negative, unsigned) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };
    let mut radix = if radix.is_finite() { radix.trunc() as i64 } else { 0 };
    let mut digits = unsigned;
    if radix == 0 || radix == 16 {
        if let Some(rest) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
            digits = rest;
            radix = 16;
        }
    }
    if radix == 0 {
        radix = 10;
    }
    if !(2..=36).contains(&radix) {
        return f64::NAN;
    }
    let radix = radix as u32;
    let end = digits
        .char_indices()
        .find(|(_, ch)| !ch.is_digit(radix))
        .map_or(digits.len(), |(index, _)| index);
    match parse_integer_digits(&digits[..end], radix) {
        Some(value) if negative => -value,
        Some(value) => value,
        None => f64::NAN,
    }
}

fn parse_float(interpreter: &mut Interpreter, _this: &Value, args: &[Value]) -> EvalResult<Value> {
    let text = interpreter.to_string(&arg(args, 0))?;
    Ok(Value::Number(parse_float_prefix(&text)))
}

fn is_nan(interpreter: &mut Interpreter, _this: &Value, args: &[Value]) -> EvalResult<Value> {
    Ok(Value::Boolean(interpreter.to_number(&arg(args, 0))?.is_nan()))
}

fn is_finite(interpreter: &mut Interpreter, _this: &Value, args: &[Value]) -> EvalResult<Value> {
    Ok(Value::Boolean(interpreter.to_number(&arg(args, 0))?.is_finite()))
}

#[cfg(test)]
mod tests {
    use super::parse_int_text;

    #[test]
    fn parse_int_prefixes() {
        assert_eq!(parse_int_text("  42px", f64::NAN), 42.0);
        assert_eq!(parse_int_text("-0x1F", 0.0), -31.0);
        assert_eq!(parse_int_text("101", 2.0), 5.0);
        assert!(parse_int_text("xyz", 10.0).is_nan());
        assert!(parse_int_text("12", 1.0).is_nan());
    }
}
