//! Intrinsic objects and the allow-listed global bindings.
//!
//! Every context gets its own copies: nothing here is shared between
//! executions, so a program that mutates `Array.prototype` only affects
//! itself.

mod array;
mod error;
mod function;
mod global;
mod json;
mod math;
mod number;
mod object;
mod string;

use super::EvalResult;
use super::heap::{Heap, HeapExhausted};
use super::interpreter::{ErrorKind, Interpreter};
use super::value::{Callable, NativeCtor, NativeFn, NativeFunction, Object, ObjectKind, ObjectRef, Value};

/// Prototypes the evaluator needs direct access to.
pub(crate) struct Realm {
    pub object_prototype: ObjectRef,
    pub function_prototype: ObjectRef,
    pub array_prototype: ObjectRef,
    pub string_prototype: ObjectRef,
    pub number_prototype: ObjectRef,
    pub boolean_prototype: ObjectRef,
    error_prototypes: Vec<ObjectRef>,
}

impl Realm {
    /// Allocate the bare prototype objects; their methods come from [`install`].
    pub(crate) fn bootstrap(heap: &mut Heap) -> Result<Realm, HeapExhausted> {
        let object_prototype = heap.alloc(Object::new(ObjectKind::Ordinary, None))?;
        let mut derived = || heap.alloc(Object::new(ObjectKind::Ordinary, Some(object_prototype.clone())));
        let function_prototype = derived()?;
        let array_prototype = derived()?;
        let string_prototype = derived()?;
        let number_prototype = derived()?;
        let boolean_prototype = derived()?;
        let base_error = derived()?;

        let mut error_prototypes = vec![base_error.clone()];
        for _ in 1..ErrorKind::ALL.len() {
            error_prototypes.push(heap.alloc(Object::new(ObjectKind::Ordinary, Some(base_error.clone())))?);
        }
        Ok(Realm {
            object_prototype,
            function_prototype,
            array_prototype,
            string_prototype,
            number_prototype,
            boolean_prototype,
            error_prototypes,
        })
    }

    pub(crate) fn error_prototype(&self, kind: ErrorKind) -> ObjectRef {
        let index = ErrorKind::ALL
            .iter()
            .position(|candidate| *candidate == kind)
            .unwrap_or(0);
        self.error_prototypes[index].clone()
    }
}

/// Populate the prototypes and bind the allow-listed globals.
pub(crate) fn install(interpreter: &mut Interpreter) -> EvalResult<()> {
    object::install(interpreter)?;
    function::install(interpreter)?;
    array::install(interpreter)?;
    string::install(interpreter)?;
    number::install(interpreter)?;
    math::install(interpreter)?;
    json::install(interpreter)?;
    error::install(interpreter)?;
    global::install(interpreter)?;
    Ok(())
}

/// Argument `index`, or `undefined`.
pub(crate) fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or_default()
}

/// A builtin function object.
pub(crate) fn native(
    interpreter: &mut Interpreter,
    name: &'static str,
    length: usize,
    call: NativeFn,
    construct: Option<NativeCtor>,
) -> EvalResult<ObjectRef> {
    let callable = Callable::Native(NativeFunction {
        name,
        call,
        construct,
    });
    interpreter.function_object(callable, name, length)
}

/// Install non-enumerable methods on `target`.
pub(crate) fn methods(
    interpreter: &mut Interpreter,
    target: &ObjectRef,
    table: &[(&'static str, usize, NativeFn)],
) -> EvalResult<()> {
    for (name, length, call) in table {
        let function = native(interpreter, name, *length, *call, None)?;
        target.borrow_mut().define_hidden(*name, Value::Object(function));
    }
    Ok(())
}

/// A constructor wired to its prototype, bound as a global.
pub(crate) fn constructor(
    interpreter: &mut Interpreter,
    name: &'static str,
    length: usize,
    call: NativeFn,
    construct: Option<NativeCtor>,
    prototype: &ObjectRef,
) -> EvalResult<ObjectRef> {
    let function = native(interpreter, name, length, call, construct)?;
    function
        .borrow_mut()
        .define_hidden("prototype", Value::Object(prototype.clone()));
    prototype
        .borrow_mut()
        .define_hidden("constructor", Value::Object(function.clone()));
    define_global(interpreter, name, Value::Object(function.clone()));
    Ok(function)
}

/// A plain namespace object (`Math`, `JSON`, `console`) bound as a global.
pub(crate) fn namespace(interpreter: &mut Interpreter, name: &'static str) -> EvalResult<ObjectRef> {
    let object = interpreter.new_object()?;
    define_global(interpreter, name, Value::Object(object.clone()));
    Ok(object)
}

pub(crate) fn define_global(interpreter: &mut Interpreter, name: &str, value: Value) {
    interpreter.global.borrow_mut().declare(name, value, true);
}

/// `this` as an object, or a `TypeError` naming the method.
pub(crate) fn this_object(interpreter: &mut Interpreter, this: &Value, method: &str) -> EvalResult<ObjectRef> {
    match this {
        Value::Object(object) => Ok(object.clone()),
        _ => Err(interpreter.type_error(format!("{method} called on non-object"))),
    }
}

/// Callback argument of an array method.
pub(crate) fn callback(interpreter: &mut Interpreter, value: &Value) -> EvalResult<Value> {
    if value.is_callable() {
        Ok(value.clone())
    } else {
        let shown = interpreter.describe(value);
        Err(interpreter.type_error(format!("{shown} is not a function")))
    }
}

/// Clamp a relative index argument (`slice`, `at`, `splice`) into `0..=length`.
pub(crate) fn relative_index(position: f64, length: usize) -> usize {
    let length = length as f64;
    let index = if position < 0.0 {
        (length + position).max(0.0)
    } else {
        position.min(length)
    };
    index as usize
}
