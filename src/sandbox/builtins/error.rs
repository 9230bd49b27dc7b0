//! The error constructors.

use super::{arg, constructor, methods};
use crate::sandbox::EvalResult;
use crate::sandbox::interpreter::{ErrorKind, Interpreter};
use crate::sandbox::value::{NativeCtor, NativeFn, ObjectKind, ObjectRef, Value, lookup};

pub(super) fn install(interpreter: &mut Interpreter) -> EvalResult<()> {
    let table: [(ErrorKind, NativeFn, NativeCtor); 5] = [
        (ErrorKind::Error, call::<0>, construct::<0>),
        (ErrorKind::Type, call::<1>, construct::<1>),
        (ErrorKind::Range, call::<2>, construct::<2>),
        (ErrorKind::Reference, call::<3>, construct::<3>),
        (ErrorKind::Syntax, call::<4>, construct::<4>),
    ];
    let mut base = None;
    for (kind, call, construct) in table {
        let prototype = interpreter.realm.error_prototype(kind);
        let function = constructor(interpreter, kind.name(), 1, call, Some(construct), &prototype)?;
        {
            let mut borrowed = prototype.borrow_mut();
            borrowed.define_hidden("name", Value::string(kind.name()));
            borrowed.define_hidden("message", Value::string(""));
        }
        match &base {
            None => base = Some(function),
            // `TypeError.__proto__ === Error`
            Some(base) => function.borrow_mut().prototype = Some(base.clone()),
        }
    }
    let prototype = interpreter.realm.error_prototype(ErrorKind::Error);
    methods(interpreter, &prototype, &[("toString", 0, to_string)])
}

fn call<const KIND: usize>(interpreter: &mut Interpreter, _this: &Value, args: &[Value]) -> EvalResult<Value> {
    let kind = ErrorKind::ALL[KIND];
    let prototype = interpreter.realm.error_prototype(kind);
    create(interpreter, prototype, args)
}

fn construct<const KIND: usize>(
    interpreter: &mut Interpreter,
    args: &[Value],
    new_target: &ObjectRef,
) -> EvalResult<Value> {
    let prototype = match lookup(new_target, "prototype") {
        Some(Value::Object(prototype)) => prototype,
        _ => interpreter.realm.error_prototype(ErrorKind::ALL[KIND]),
    };
    create(interpreter, prototype, args)
}

fn create(interpreter: &mut Interpreter, prototype: ObjectRef, args: &[Value]) -> EvalResult<Value> {
    let error = interpreter.alloc(crate::sandbox::value::Object::new(ObjectKind::Error, Some(prototype)))?;
    let message = arg(args, 0);
    if !matches!(message, Value::Undefined) {
        let message = interpreter.to_string(&message)?;
        error.borrow_mut().define_hidden("message", Value::String(message));
    }
    if let Value::Object(options) = arg(args, 1) {
        if let Some(cause) = lookup(&options, "cause") {
            error.borrow_mut().define_hidden("cause", cause);
        }
    }
    Ok(Value::Object(error))
}

/// `Error.prototype.toString`: `name: message`, dropping empty parts.
fn to_string(interpreter: &mut Interpreter, this: &Value, _args: &[Value]) -> EvalResult<Value> {
    let Value::Object(object) = this else {
        return Err(interpreter.type_error("Error.prototype.toString called on non-object"));
    };
    let name = match lookup(object, "name") {
        None | Some(Value::Undefined) => "Error".into(),
        Some(name) => interpreter.to_string(&name)?,
    };
    let message = match lookup(object, "message") {
        None | Some(Value::Undefined) => "".into(),
        Some(message) => interpreter.to_string(&message)?,
    };
    let text = match (name.is_empty(), message.is_empty()) {
        (true, _) => message.to_string(),
        (false, true) => name.to_string(),
        (false, false) => format!("{name}: {message}"),
    };
    Ok(Value::string(text))
}
