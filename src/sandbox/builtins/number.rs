//! `Number`, `Boolean` and their prototypes.

use super::global::parse_int_text;
use super::{arg, constructor, methods};
use crate::sandbox::EvalResult;
use crate::sandbox::interpreter::{ErrorKind, Interpreter};
use crate::sandbox::value::Value;
use crate::syntax::number::{format_number, format_radix, parse_float_prefix, to_fixed};

/// `Number.MAX_SAFE_INTEGER`.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

pub(super) fn install(interpreter: &mut Interpreter) -> EvalResult<()> {
    let prototype = interpreter.realm.number_prototype.clone();
    let number = constructor(interpreter, "Number", 1, call, None, &prototype)?;
    methods(
        interpreter,
        &number,
        &[
            ("isInteger", 1, is_integer),
            ("isSafeInteger", 1, is_safe_integer),
            ("isFinite", 1, is_finite),
            ("isNaN", 1, is_nan),
            ("parseFloat", 1, parse_float),
            ("parseInt", 2, parse_int),
        ],
    )?;
    {
        let mut number = number.borrow_mut();
        for (name, value) in [
            ("MAX_SAFE_INTEGER", MAX_SAFE_INTEGER),
            ("MIN_SAFE_INTEGER", -MAX_SAFE_INTEGER),
            ("EPSILON", f64::EPSILON),
            ("MAX_VALUE", f64::MAX),
            ("MIN_VALUE", 5e-324),
            ("POSITIVE_INFINITY", f64::INFINITY),
            ("NEGATIVE_INFINITY", f64::NEG_INFINITY),
            ("NaN", f64::NAN),
        ] {
            number.define_hidden(name, Value::Number(value));
        }
    }
    methods(
        interpreter,
        &prototype,
        &[
            ("toFixed", 1, to_fixed_method),
            ("toString", 1, to_string),
            ("valueOf", 0, value_of),
        ],
    )?;

    let prototype = interpreter.realm.boolean_prototype.clone();
    constructor(interpreter, "Boolean", 1, boolean, None, &prototype)?;
    methods(
        interpreter,
        &prototype,
        &[
            ("toString", 0, boolean_to_string),
            ("valueOf", 0, boolean_value_of),
        ],
    )
}

fn call(interpreter: &mut Interpreter, _this: &Value, args: &[Value]) -> EvalResult<Value> {
    match args.first() {
        None => Ok(Value::Number(0.0)),
        Some(value) => Ok(Value::Number(interpreter.to_number(value)?)),
    }
}

fn number_arg(args: &[Value]) -> Option<f64> {
    match args.first() {
        Some(Value::Number(number)) => Some(*number),
        _ => None,
    }
}

fn is_integer(_interpreter: &mut Interpreter, _this: &Value, args: &[Value]) -> EvalResult<Value> {
    Ok(Value::Boolean(
        number_arg(args).is_some_and(|number| number.is_finite() && number.trunc() == number),
    ))
}

fn is_safe_integer(_interpreter: &mut Interpreter, _this: &Value, args: &[Value]) -> EvalResult<Value> {
    Ok(Value::Boolean(number_arg(args).is_some_and(|number| {
        number.trunc() == number && number.abs() <= MAX_SAFE_INTEGER
    })))
}

fn is_finite(_interpreter: &mut Interpreter, _this: &Value, args: &[Value]) -> EvalResult<Value> {
    Ok(Value::Boolean(number_arg(args).is_some_and(f64::is_finite)))
}

fn is_nan(_interpreter: &mut Interpreter, _this: &Value, args: &[Value]) -> EvalResult<Value> {
    Ok(Value::Boolean(number_arg(args).is_some_and(f64::is_nan)))
}

fn parse_float(interpreter: &mut Interpreter, _this: &Value, args: &[Value]) -> EvalResult<Value> {
    let text = interpreter.to_string(&arg(args, 0))?;
    Ok(Value::Number(parse_float_prefix(&text)))
}

fn parse_int(interpreter: &mut Interpreter, _this: &Value, args: &[Value]) -> EvalResult<Value> {
    let text = interpreter.to_string(&arg(args, 0))?;
    let radix = interpreter.to_number(&arg(args, 1))?;
    Ok(Value::Number(parse_int_text(&text, radix)))
}

fn this_number(interpreter: &mut Interpreter, this: &Value, method: &str) -> EvalResult<f64> {
    match this {
        Value::Number(number) => Ok(*number),
        _ => Err(interpreter.type_error(format!(
            "Number.prototype.{method} requires that 'this' be a Number"
        ))),
    }
}

fn to_fixed_method(interpreter: &mut Interpreter, this: &Value, args: &[Value]) -> EvalResult<Value> {
    let number = this_number(interpreter, this, "toFixed")?;
    let digits = interpreter.to_integer(args.first(), 0.0)?;
    if !(0.0..=100.0).contains(&digits) {
        return Err(interpreter.throw(ErrorKind::Range, "toFixed() digits argument must be between 0 and 100"));
    }
    if !number.is_finite() || number.abs() >= 1e21 {
        return Ok(Value::string(format_number(number)));
    }
    Ok(Value::string(to_fixed(number, digits as usize)))
}

fn to_string(interpreter: &mut Interpreter, this: &Value, args: &[Value]) -> EvalResult<Value> {
    let number = this_number(interpreter, this, "toString")?;
    let radix = interpreter.to_integer(args.first(), 10.0)?;
    if !(2.0..=36.0).contains(&radix) {
        return Err(interpreter.throw(ErrorKind::Range, "toString() radix must be between 2 and 36"));
    }
    if radix == 10.0 {
        return Ok(Value::string(format_number(number)));
    }
    Ok(Value::string(format_radix(number, radix as u32)))
}

fn value_of(interpreter: &mut Interpreter, this: &Value, _args: &[Value]) -> EvalResult<Value> {
    this_number(interpreter, this, "valueOf").map(Value::Number)
}

fn boolean(_interpreter: &mut Interpreter, _this: &Value, args: &[Value]) -> EvalResult<Value> {
    Ok(Value::Boolean(arg(args, 0).truthy()))
}

fn this_boolean(interpreter: &mut Interpreter, this: &Value, method: &str) -> EvalResult<bool> {
    match this {
        Value::Boolean(flag) => Ok(*flag),
        _ => Err(interpreter.type_error(format!(
            "Boolean.prototype.{method} requires that 'this' be a Boolean"
        ))),
    }
}

fn boolean_to_string(interpreter: &mut Interpreter, this: &Value, _args: &[Value]) -> EvalResult<Value> {
    let flag = this_boolean(interpreter, this, "toString")?;
    Ok(Value::string(if flag { "true" } else { "false" }))
}

fn boolean_value_of(interpreter: &mut Interpreter, this: &Value, _args: &[Value]) -> EvalResult<Value> {
    this_boolean(interpreter, this, "valueOf").map(Value::Boolean)
}

#[cfg(test)]
mod tests {
    use crate::sandbox::{ExecutionLimits, SandboxExecutor};
    use crate::syntax::parse_program;

    fn logs(src: &str) -> Vec<String> {
        let program = parse_program(src).unwrap();
        let result = SandboxExecutor::new().execute(&program, &ExecutionLimits::default());
        assert!(result.success, "{:?}", result.error);
        result.logs
    }

    #[test]
    fn number_statics_and_formatting() {
        assert_eq!(
            logs(
                "print(Number('12.5'), Number(''), Number('x'), Number.isInteger(5), Number.isInteger('5'));
                 print((3.14159).toFixed(2), (255).toString(16), (5).toString(2), Number.MAX_SAFE_INTEGER);
                 print(Number.isNaN('abc'), isNaN('abc'), Number.parseInt('08'), Boolean(''), true.toString());
                 try { (1).toFixed(101); } catch (e) { print(e.name); }"
            ),
            [
                "12.5 0 NaN true false",
                "3.14 ff 101 9007199254740991",
                "false true 8 false true",
                "RangeError",
            ]
        );
    }
}
