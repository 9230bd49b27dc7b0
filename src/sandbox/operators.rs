//! Conversions, operators and property access with JavaScript semantics.

use super::EvalResult;
use super::interpreter::{ErrorKind, Interpreter};
use super::value::{Callable, ObjectRef, Value, WriteError, array_index, has_property, lookup};
use crate::syntax::ast::BinaryOp;
use crate::syntax::number::{format_number, js_pow, parse_number};
use std::cmp::Ordering;
use std::rc::Rc;

/// Preferred result type of [`Interpreter::to_primitive`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Hint {
    Default,
    Number,
    String,
}

/// `ToInt32`.
pub(crate) fn to_int32(number: f64) -> i32 {
    to_uint32(number) as i32
}

/// `ToUint32`.
pub(crate) fn to_uint32(number: f64) -> u32 {
    if !number.is_finite() {
        return 0;
    }
    let wrapped = number.trunc().rem_euclid(4_294_967_296.0);
    wrapped as u32
}

/// `===`.
pub(crate) fn strict_equals(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
        (Value::Boolean(a), Value::Boolean(b)) => a == b,
        (Value::Number(a), Value::Number(b)) => a == b,
        (Value::String(a), Value::String(b)) => a == b,
        (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
        _ => false,
    }
}

/// `SameValueZero`: `===` except that `NaN` equals itself.
pub(crate) fn same_value_zero(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) if a.is_nan() && b.is_nan() => true,
        _ => strict_equals(left, right),
    }
}

/// Length of a string in UTF-16 code units.
pub(crate) fn utf16_length(text: &str) -> usize {
    if text.is_ascii() {
        text.len()
    } else {
        text.encode_utf16().count()
    }
}

/// The UTF-16 code unit at `index`, as a one-unit string.
pub(crate) fn utf16_unit_at(text: &str, index: usize) -> Option<Rc<str>> {
    if text.is_ascii() {
        return text.get(index..index + 1).map(Rc::from);
    }
    let unit = text.encode_utf16().nth(index)?;
    Some(Rc::from(String::from_utf16_lossy(&[unit])))
}

impl Interpreter {
    pub(crate) fn to_primitive(&mut self, value: &Value, hint: Hint) -> EvalResult<Value> {
        let Value::Object(object) = value else {
            return Ok(value.clone());
        };
        let order = match hint {
            Hint::String => ["toString", "valueOf"],
            Hint::Default | Hint::Number => ["valueOf", "toString"],
        };
        for name in order {
            if let Some(method) = lookup(object, name).filter(Value::is_callable) {
                let result = self.call(&method, value, &[])?;
                if !matches!(result, Value::Object(_)) {
                    return Ok(result);
                }
            }
        }
        Err(self.type_error("Cannot convert object to primitive value"))
    }

    pub(crate) fn to_number(&mut self, value: &Value) -> EvalResult<f64> {
        Ok(match value {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Boolean(flag) => f64::from(u8::from(*flag)),
            Value::Number(number) => *number,
            Value::String(text) => parse_number(text),
            Value::Object(_) => {
                let primitive = self.to_primitive(value, Hint::Number)?;
                return self.to_number(&primitive);
            }
        })
    }

    pub(crate) fn to_string(&mut self, value: &Value) -> EvalResult<Rc<str>> {
        Ok(match value {
            Value::Undefined => Rc::from("undefined"),
            Value::Null => Rc::from("null"),
            Value::Boolean(flag) => Rc::from(if *flag { "true" } else { "false" }),
            Value::Number(number) => Rc::from(format_number(*number)),
            Value::String(text) => text.clone(),
            Value::Object(_) => {
                let primitive = self.to_primitive(value, Hint::String)?;
                return self.to_string(&primitive);
            }
        })
    }

    pub(crate) fn to_property_key(&mut self, value: &Value) -> EvalResult<Rc<str>> {
        match value {
            Value::Number(number) if number.fract() == 0.0 && *number >= 0.0 && *number < 1e15 => {
                Ok(Rc::from((*number as u64).to_string()))
            }
            _ => self.to_string(value),
        }
    }

    /// Integer argument with `undefined` → `default` (`ToIntegerOrInfinity`).
    pub(crate) fn to_integer(&mut self, value: Option<&Value>, default: f64) -> EvalResult<f64> {
        match value {
            None | Some(Value::Undefined) => Ok(default),
            Some(value) => {
                let number = self.to_number(value)?;
                Ok(if number.is_nan() { 0.0 } else { number.trunc() })
            }
        }
    }

    pub(crate) fn binary(&mut self, operator: BinaryOp, left: &Value, right: &Value) -> EvalResult<Value> {
        let number = |value: f64| -> EvalResult<Value> { Ok(Value::Number(value)) };
        match operator {
            BinaryOp::Add => {
                let left = self.to_primitive(left, Hint::Default)?;
                let right = self.to_primitive(right, Hint::Default)?;
                if matches!(left, Value::String(_)) || matches!(right, Value::String(_)) {
                    let left = self.to_string(&left)?;
                    let right = self.to_string(&right)?;
                    self.check_string_length(left.len() + right.len())?;
                    let mut joined = String::with_capacity(left.len() + right.len());
                    joined.push_str(&left);
                    joined.push_str(&right);
                    Ok(Value::string(joined))
                } else {
                    number(self.to_number(&left)? + self.to_number(&right)?)
                }
            }
            BinaryOp::Sub => number(self.to_number(left)? - self.to_number(right)?),
            BinaryOp::Mul => number(self.to_number(left)? * self.to_number(right)?),
            BinaryOp::Div => number(self.to_number(left)? / self.to_number(right)?),
            BinaryOp::Rem => number(self.to_number(left)? % self.to_number(right)?),
            BinaryOp::Exp => {
                let base = self.to_number(left)?;
                number(js_pow(base, self.to_number(right)?))
            }
            BinaryOp::Eq => self.loose_equals(left, right).map(Value::Boolean),
            BinaryOp::NotEq => self.loose_equals(left, right).map(|equal| Value::Boolean(!equal)),
            BinaryOp::StrictEq => Ok(Value::Boolean(strict_equals(left, right))),
            BinaryOp::StrictNotEq => Ok(Value::Boolean(!strict_equals(left, right))),
            BinaryOp::Lt | BinaryOp::LtEq | BinaryOp::Gt | BinaryOp::GtEq => {
                let left = self.to_primitive(left, Hint::Number)?;
                let right = self.to_primitive(right, Hint::Number)?;
                let ordering = self.compare(&left, &right)?;
                let result = match (operator, ordering) {
                    (_, None) => false,
                    (BinaryOp::Lt, Some(ordering)) => ordering == Ordering::Less,
                    (BinaryOp::LtEq, Some(ordering)) => ordering != Ordering::Greater,
                    (BinaryOp::Gt, Some(ordering)) => ordering == Ordering::Greater,
                    (_, Some(ordering)) => ordering != Ordering::Less,
                };
                Ok(Value::Boolean(result))
            }
            BinaryOp::BitAnd | BinaryOp::BitOr | BinaryOp::BitXor => {
                let a = to_int32(self.to_number(left)?);
                let b = to_int32(self.to_number(right)?);
                let result = match operator {
                    BinaryOp::BitAnd => a & b,
                    BinaryOp::BitOr => a | b,
                    _ => a ^ b,
                };
                number(result as f64)
            }
            BinaryOp::Shl => {
                let a = to_int32(self.to_number(left)?);
                let shift = to_uint32(self.to_number(right)?) & 31;
                number(a.wrapping_shl(shift) as f64)
            }
            BinaryOp::Shr => {
                let a = to_int32(self.to_number(left)?);
                let shift = to_uint32(self.to_number(right)?) & 31;
                number((a >> shift) as f64)
            }
            BinaryOp::UShr => {
                let a = to_uint32(self.to_number(left)?);
                let shift = to_uint32(self.to_number(right)?) & 31;
                number((a >> shift) as f64)
            }
            BinaryOp::InstanceOf => self.instance_of(left, right).map(Value::Boolean),
            BinaryOp::In => {
                let Value::Object(object) = right else {
                    let key = self.to_string(left)?;
                    let shown = self.describe(right);
                    return Err(self.type_error(format!(
                        "Cannot use 'in' operator to search for '{key}' in {shown}"
                    )));
                };
                let key = self.to_property_key(left)?;
                Ok(Value::Boolean(has_property(object, &key)))
            }
        }
    }

    /// Order two primitives; `None` when either is `NaN`.
    fn compare(&mut self, left: &Value, right: &Value) -> EvalResult<Option<Ordering>> {
        if let (Value::String(a), Value::String(b)) = (left, right) {
            return Ok(Some(a.encode_utf16().cmp(b.encode_utf16())));
        }
        let a = self.to_number(left)?;
        let b = self.to_number(right)?;
        Ok(a.partial_cmp(&b))
    }

    /// `==`.
    pub(crate) fn loose_equals(&mut self, left: &Value, right: &Value) -> EvalResult<bool> {
        Ok(match (left, right) {
            (Value::Undefined | Value::Null, Value::Undefined | Value::Null) => true,
            (Value::Undefined | Value::Null, _) | (_, Value::Undefined | Value::Null) => false,
            (Value::Number(a), Value::String(b)) => *a == parse_number(b),
            (Value::String(a), Value::Number(b)) => parse_number(a) == *b,
            (Value::Boolean(flag), other) => {
                return self.loose_equals(&Value::Number(f64::from(u8::from(*flag))), other);
            }
            (other, Value::Boolean(flag)) => {
                return self.loose_equals(other, &Value::Number(f64::from(u8::from(*flag))));
            }
            (Value::Object(_), Value::Number(_) | Value::String(_)) => {
                let primitive = self.to_primitive(left, Hint::Default)?;
                return self.loose_equals(&primitive, right);
            }
            (Value::Number(_) | Value::String(_), Value::Object(_)) => {
                let primitive = self.to_primitive(right, Hint::Default)?;
                return self.loose_equals(left, &primitive);
            }
            _ => strict_equals(left, right),
        })
    }

    /// `value instanceof constructor`.
    pub(crate) fn instance_of(&mut self, value: &Value, constructor: &Value) -> EvalResult<bool> {
        let Some(constructor) = constructor.as_function().cloned() else {
            return Err(self.type_error("Right-hand side of 'instanceof' is not callable"));
        };
        let target = match constructor.borrow().callable() {
            Some(Callable::Bound { target, .. }) => Some(target.clone()),
            _ => None,
        };
        if let Some(target) = target {
            return self.instance_of(value, &Value::Object(target));
        }
        let Value::Object(object) = value else {
            return Ok(false);
        };
        let prototype = match lookup(&constructor, "prototype") {
            Some(Value::Object(prototype)) => prototype,
            _ => {
                return Err(self.type_error(
                    "Function has non-object prototype in instanceof check",
                ));
            }
        };
        let mut current = object.borrow().prototype.clone();
        while let Some(candidate) = current {
            if Rc::ptr_eq(&candidate, &prototype) {
                return Ok(true);
            }
            current = candidate.borrow().prototype.clone();
        }
        Ok(false)
    }

    /// `base[key]`.
    pub(crate) fn get_property(&mut self, base: &Value, key: &str) -> EvalResult<Value> {
        let prototype = match base {
            Value::Object(object) => return Ok(lookup(object, key).unwrap_or_default()),
            Value::String(text) => {
                if key == "length" {
                    return Ok(Value::from(utf16_length(text)));
                }
                if let Some(index) = array_index(key) {
                    return Ok(utf16_unit_at(text, index).map(Value::String).unwrap_or_default());
                }
                &self.realm.string_prototype
            }
            Value::Number(_) => &self.realm.number_prototype,
            Value::Boolean(_) => &self.realm.boolean_prototype,
            Value::Undefined | Value::Null => {
                let shown = self.describe(base);
                return Err(self.type_error(format!(
                    "Cannot read properties of {shown} (reading '{key}')"
                )));
            }
        };
        Ok(lookup(prototype, key).unwrap_or_default())
    }

    /// `base[key] = value`.
    pub(crate) fn put_property(&mut self, base: &Value, key: &str, value: Value) -> EvalResult<()> {
        match base {
            Value::Object(object) => {
                let result = object.borrow_mut().set_own(key, value);
                match result {
                    Ok(()) => Ok(()),
                    Err(WriteError::Frozen) => Err(self.frozen_error(object, key)),
                    Err(WriteError::ArrayLength) => Err(self.throw(ErrorKind::Range, "Invalid array length")),
                }
            }
            Value::Undefined | Value::Null => {
                let shown = self.describe(base);
                Err(self.type_error(format!("Cannot set properties of {shown} (setting '{key}')")))
            }
            primitive => {
                let kind = primitive.type_of();
                let shown = self.to_string(primitive)?;
                Err(self.type_error(format!("Cannot create property '{key}' on {kind} '{shown}'")))
            }
        }
    }

    /// `delete base[key]`.
    pub(crate) fn delete_property(&mut self, base: &Value, key: &str) -> EvalResult<bool> {
        match base {
            Value::Object(object) => {
                let result = object.borrow_mut().delete(key);
                match result {
                    Ok(deleted) => Ok(deleted),
                    Err(_) => Err(self.type_error(format!("Cannot delete property '{key}' of #<Object>"))),
                }
            }
            Value::Undefined | Value::Null => {
                Err(self.type_error("Cannot convert undefined or null to object"))
            }
            _ => Ok(true),
        }
    }

    fn frozen_error(&mut self, object: &ObjectRef, key: &str) -> super::Abort {
        if object.borrow().has_own(key) {
            self.type_error(format!(
                "Cannot assign to read only property '{key}' of object"
            ))
        } else {
            self.type_error(format!("Cannot add property {key}, object is not extensible"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int32_wraps() {
        assert_eq!(to_int32(4_294_967_296.0 + 5.0), 5);
        assert_eq!(to_int32(2_147_483_648.0), i32::MIN);
        assert_eq!(to_int32(-1.0), -1);
        assert_eq!(to_uint32(-1.0), u32::MAX);
        assert_eq!(to_int32(f64::NAN), 0);
        assert_eq!(to_int32(3.9), 3);
    }

    #[test]
    fn equality_helpers() {
        assert!(strict_equals(&Value::from(0.0), &Value::from(-0.0)));
        assert!(!strict_equals(&Value::from(f64::NAN), &Value::from(f64::NAN)));
        assert!(same_value_zero(&Value::from(f64::NAN), &Value::from(f64::NAN)));
        assert!(!strict_equals(&Value::string("1"), &Value::from(1.0)));
    }

    #[test]
    fn utf16_positions() {
        assert_eq!(utf16_length("abc"), 3);
        assert_eq!(utf16_length("😀"), 2);
        assert_eq!(utf16_unit_at("héllo", 1).as_deref(), Some("é"));
        assert_eq!(utf16_unit_at("abc", 3), None);
    }
}
