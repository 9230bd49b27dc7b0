//! `Function.prototype`.

use super::{arg, methods};
use crate::sandbox::EvalResult;
use crate::sandbox::interpreter::Interpreter;
use crate::sandbox::value::{Callable, Value, lookup};

pub(super) fn install(interpreter: &mut Interpreter) -> EvalResult<()> {
    let prototype = interpreter.realm.function_prototype.clone();
    methods(
        interpreter,
        &prototype,
        &[
            ("call", 1, call),
            ("apply", 2, apply),
            ("bind", 1, bind),
            ("toString", 0, to_string),
        ],
    )
}

fn ensure_callable(interpreter: &mut Interpreter, this: &Value, method: &str) -> EvalResult<()> {
    if this.is_callable() {
        Ok(())
    } else {
        Err(interpreter.type_error(format!("Function.prototype.{method} called on a non-function")))
    }
}

fn call(interpreter: &mut Interpreter, this: &Value, args: &[Value]) -> EvalResult<Value> {
    ensure_callable(interpreter, this, "call")?;
    let rest = args.get(1..).unwrap_or_default();
    interpreter.call(this, &arg(args, 0), rest)
}

fn apply(interpreter: &mut Interpreter, this: &Value, args: &[Value]) -> EvalResult<Value> {
    ensure_callable(interpreter, this, "apply")?;
    let list = match arg(args, 1) {
        Value::Undefined | Value::Null => Vec::new(),
        Value::Object(object) if object.borrow().is_array() => {
            object.borrow().elements().cloned().unwrap_or_default()
        }
        Value::Object(object) => {
            // Array-likes: `{ length: n, 0: ..., 1: ... }`, `arguments`.
            let length = lookup(&object, "length").unwrap_or_default();
            let length = interpreter.to_integer(Some(&length), 0.0)?.max(0.0) as usize;
            let mut list = Vec::with_capacity(length.min(1024));
            for index in 0..length {
                interpreter.tick()?;
                list.push(lookup(&object, &index.to_string()).unwrap_or_default());
            }
            list
        }
        _ => return Err(interpreter.type_error("CreateListFromArrayLike called on non-object")),
    };
    interpreter.call(this, &arg(args, 0), &list)
}

fn bind(interpreter: &mut Interpreter, this: &Value, args: &[Value]) -> EvalResult<Value> {
    ensure_callable(interpreter, this, "bind")?;
    let Value::Object(target) = this else {
        return Ok(Value::Undefined);
    };
    let name = match lookup(target, "name") {
        Some(Value::String(name)) => format!("bound {name}"),
        _ => "bound ".to_string(),
    };
    let length = match lookup(target, "length") {
        Some(Value::Number(length)) => (length as usize).saturating_sub(args.len().saturating_sub(1)),
        _ => 0,
    };
    let callable = Callable::Bound {
        target: target.clone(),
        this: arg(args, 0),
        args: args.get(1..).map(<[Value]>::to_vec).unwrap_or_default(),
    };
    Ok(Value::Object(interpreter.function_object(callable, &name, length)?))
}

fn to_string(interpreter: &mut Interpreter, this: &Value, _args: &[Value]) -> EvalResult<Value> {
    ensure_callable(interpreter, this, "toString")?;
    let Value::Object(function) = this else {
        return Ok(Value::Undefined);
    };
    let source = interpreter.function_source(function);
    Ok(Value::string(source))
}
