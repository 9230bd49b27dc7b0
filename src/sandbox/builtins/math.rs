//! The `Math` namespace.

use super::{arg, methods, namespace};
use crate::sandbox::EvalResult;
use crate::sandbox::interpreter::Interpreter;
use crate::sandbox::operators::{to_int32, to_uint32};
use crate::sandbox::value::Value;
use crate::syntax::number::js_pow;

pub(super) fn install(interpreter: &mut Interpreter) -> EvalResult<()> {
    let math = namespace(interpreter, "Math")?;
    methods(
        interpreter,
        &math,
        &[
            ("abs", 1, unary::<0>),
            ("floor", 1, unary::<1>),
            ("ceil", 1, unary::<2>),
            ("round", 1, unary::<3>),
            ("trunc", 1, unary::<4>),
            ("sign", 1, unary::<5>),
            ("sqrt", 1, unary::<6>),
            ("cbrt", 1, unary::<7>),
            ("exp", 1, unary::<8>),
            ("log", 1, unary::<9>),
            ("log2", 1, unary::<10>),
            ("log10", 1, unary::<11>),
            ("sin", 1, unary::<12>),
            ("cos", 1, unary::<13>),
            ("tan", 1, unary::<14>),
            ("asin", 1, unary::<15>),
            ("acos", 1, unary::<16>),
            ("atan", 1, unary::<17>),
            ("fround", 1, unary::<18>),
            ("clz32", 1, unary::<19>),
            ("atan2", 2, atan2),
            ("pow", 2, pow),
            ("hypot", 2, hypot),
            ("imul", 2, imul),
            ("max", 2, max),
            ("min", 2, min),
            ("random", 0, random),
        ],
    )?;
    let mut math = math.borrow_mut();
    for (name, value) in [
        ("PI", std::f64::consts::PI),
        ("E", std::f64::consts::E),
        ("LN2", std::f64::consts::LN_2),
        ("LN10", std::f64::consts::LN_10),
        ("LOG2E", std::f64::consts::LOG2_E),
        ("LOG10E", std::f64::consts::LOG10_E),
        ("SQRT2", std::f64::consts::SQRT_2),
        ("SQRT1_2", std::f64::consts::FRAC_1_SQRT_2),
    ] {
        math.define_hidden(name, Value::Number(value));
    }
    Ok(())
}

/// `Math.round`: halves round towards positive infinity.
fn round(number: f64) -> f64 {
    if !number.is_finite() || number.fract() == 0.0 {
        return number;
    }
    let rounded = (number + 0.5).floor();
    if rounded == 0.0 && number < 0.0 { -0.0 } else { rounded }
}

fn sign(number: f64) -> f64 {
    if number.is_nan() || number == 0.0 {
        number
    } else {
        number.signum()
    }
}

fn unary<const OP: usize>(interpreter: &mut Interpreter, _this: &Value, args: &[Value]) -> EvalResult<Value> {
    let x = interpreter.to_number(&arg(args, 0))?;
    let result = match OP {
        0 => x.abs(),
        1 => x.floor(),
        2 => x.ceil(),
        3 => round(x),
        4 => x.trunc(),
        5 => sign(x),
        6 => x.sqrt(),
        7 => x.cbrt(),
        8 => x.exp(),
        9 => x.ln(),
        10 => x.log2(),
        11 => x.log10(),
        12 => x.sin(),
        13 => x.cos(),
        14 => x.tan(),
        15 => x.asin(),
        16 => x.acos(),
        17 => x.atan(),
        18 => f64::from(x as f32),
        _ => f64::from(to_uint32(x).leading_zeros()),
    };
    Ok(Value::Number(result))
}

fn pair(interpreter: &mut Interpreter, args: &[Value]) -> EvalResult<(f64, f64)> {
    Ok((
        interpreter.to_number(&arg(args, 0))?,
        interpreter.to_number(&arg(args, 1))?,
    ))
}

fn atan2(interpreter: &mut Interpreter, _this: &Value, args: &[Value]) -> EvalResult<Value> {
    let (y, x) = pair(interpreter, args)?;
    Ok(Value::Number(y.atan2(x)))
}

fn pow(interpreter: &mut Interpreter, _this: &Value, args: &[Value]) -> EvalResult<Value> {
    let (base, exponent) = pair(interpreter, args)?;
    Ok(Value::Number(js_pow(base, exponent)))
}

fn imul(interpreter: &mut Interpreter, _this: &Value, args: &[Value]) -> EvalResult<Value> {
    let (a, b) = pair(interpreter, args)?;
    Ok(Value::Number(f64::from(to_int32(a).wrapping_mul(to_int32(b)))))
}

fn numbers(interpreter: &mut Interpreter, args: &[Value]) -> EvalResult<Vec<f64>> {
    args.iter().map(|value| interpreter.to_number(value)).collect()
}

fn hypot(interpreter: &mut Interpreter, _this: &Value, args: &[Value]) -> EvalResult<Value> {
    let values = numbers(interpreter, args)?;
    if values.iter().any(|value| value.is_infinite()) {
        return Ok(Value::Number(f64::INFINITY));
    }
    Ok(Value::Number(values.iter().map(|value| value * value).sum::<f64>().sqrt()))
}

fn max(interpreter: &mut Interpreter, _this: &Value, args: &[Value]) -> EvalResult<Value> {
    let mut result = f64::NEG_INFINITY;
    for value in numbers(interpreter, args)? {
        if value.is_nan() {
            return Ok(Value::Number(f64::NAN));
        }
        if value > result || (value == 0.0 && result == 0.0 && result.is_sign_negative()) {
            result = value;
        }
    }
    Ok(Value::Number(result))
}

fn min(interpreter: &mut Interpreter, _this: &Value, args: &[Value]) -> EvalResult<Value> {
    let mut result = f64::INFINITY;
    for value in numbers(interpreter, args)? {
        if value.is_nan() {
            return Ok(Value::Number(f64::NAN));
        }
        if value < result || (value == 0.0 && result == 0.0 && value.is_sign_negative()) {
            result = value;
        }
    }
    Ok(Value::Number(result))
}

fn random(interpreter: &mut Interpreter, _this: &Value, _args: &[Value]) -> EvalResult<Value> {
    Ok(Value::Number(interpreter.random.next_f64()))
}

#[cfg(test)]
mod tests {
    use super::round;

    #[test]
    fn rounding_matches_javascript() {
        assert_eq!(round(2.5), 3.0);
        assert_eq!(round(-2.5), -2.0);
        assert_eq!(round(-2.6), -3.0);
        assert!(round(-0.4).is_sign_negative());
    }
}
