//! `Object` and `Object.prototype`.

use super::{arg, constructor, methods, this_object};
use crate::sandbox::EvalResult;
use crate::sandbox::interpreter::Interpreter;
use crate::sandbox::value::{Object, ObjectKind, ObjectRef, Value, lookup};
use std::rc::Rc;

pub(super) fn install(interpreter: &mut Interpreter) -> EvalResult<()> {
    let prototype = interpreter.realm.object_prototype.clone();
    let object = constructor(interpreter, "Object", 1, call, Some(construct), &prototype)?;
    methods(
        interpreter,
        &object,
        &[
            ("keys", 1, keys),
            ("values", 1, values),
            ("entries", 1, entries),
            ("assign", 2, assign),
            ("freeze", 1, freeze),
            ("isFrozen", 1, is_frozen),
            ("create", 2, create),
            ("getPrototypeOf", 1, get_prototype_of),
            ("fromEntries", 1, from_entries),
            ("getOwnPropertyNames", 1, get_own_property_names),
        ],
    )?;
    methods(
        interpreter,
        &prototype,
        &[
            ("hasOwnProperty", 1, has_own_property),
            ("toString", 0, to_string),
            ("valueOf", 0, value_of),
        ],
    )
}

fn call(interpreter: &mut Interpreter, _this: &Value, args: &[Value]) -> EvalResult<Value> {
    match arg(args, 0) {
        Value::Object(object) => Ok(Value::Object(object)),
        _ => Ok(Value::Object(interpreter.new_object()?)),
    }
}

fn construct(interpreter: &mut Interpreter, args: &[Value], _new_target: &ObjectRef) -> EvalResult<Value> {
    call(interpreter, &Value::Undefined, args)
}

/// Argument 0 as an object, for the `Object.*` helpers.
fn target(interpreter: &mut Interpreter, args: &[Value]) -> EvalResult<Option<ObjectRef>> {
    match args.first() {
        Some(Value::Object(object)) => Ok(Some(object.clone())),
        None | Some(Value::Undefined | Value::Null) => {
            Err(interpreter.type_error("Cannot convert undefined or null to object"))
        }
        Some(_) => Ok(None),
    }
}

/// Own enumerable keys of argument 0 (strings expose their indices).
fn own_keys(interpreter: &mut Interpreter, args: &[Value]) -> EvalResult<Vec<Rc<str>>> {
    if let Some(Value::String(text)) = args.first() {
        let length = crate::sandbox::operators::utf16_length(text);
        return Ok((0..length).map(|index| Rc::from(index.to_string())).collect());
    }
    Ok(match target(interpreter, args)? {
        Some(object) => object.borrow().own_keys(),
        None => Vec::new(),
    })
}

fn keys(interpreter: &mut Interpreter, _this: &Value, args: &[Value]) -> EvalResult<Value> {
    let keys = own_keys(interpreter, args)?
        .into_iter()
        .map(Value::String)
        .collect();
    Ok(Value::Object(interpreter.new_array(keys)?))
}

fn values(interpreter: &mut Interpreter, _this: &Value, args: &[Value]) -> EvalResult<Value> {
    let source = arg(args, 0);
    let mut values = Vec::new();
    for key in own_keys(interpreter, args)? {
        interpreter.tick()?;
        values.push(interpreter.get_property(&source, &key)?);
    }
    Ok(Value::Object(interpreter.new_array(values)?))
}

fn entries(interpreter: &mut Interpreter, _this: &Value, args: &[Value]) -> EvalResult<Value> {
    let source = arg(args, 0);
    let mut entries = Vec::new();
    for key in own_keys(interpreter, args)? {
        interpreter.tick()?;
        let value = interpreter.get_property(&source, &key)?;
        let pair = interpreter.new_array(vec![Value::String(key), value])?;
        entries.push(Value::Object(pair));
    }
    Ok(Value::Object(interpreter.new_array(entries)?))
}

fn assign(interpreter: &mut Interpreter, _this: &Value, args: &[Value]) -> EvalResult<Value> {
    let Some(target) = target(interpreter, args)? else {
        return Ok(arg(args, 0));
    };
    for source in args.iter().skip(1) {
        interpreter.copy_own_properties(&target, source)?;
    }
    Ok(Value::Object(target))
}

fn freeze(_interpreter: &mut Interpreter, _this: &Value, args: &[Value]) -> EvalResult<Value> {
    let value = arg(args, 0);
    if let Value::Object(object) = &value {
        object.borrow_mut().frozen = true;
    }
    Ok(value)
}

fn is_frozen(_interpreter: &mut Interpreter, _this: &Value, args: &[Value]) -> EvalResult<Value> {
    Ok(Value::Boolean(match args.first() {
        Some(Value::Object(object)) => object.borrow().frozen,
        _ => true,
    }))
}

fn create(interpreter: &mut Interpreter, _this: &Value, args: &[Value]) -> EvalResult<Value> {
    let prototype = match arg(args, 0) {
        Value::Object(prototype) => Some(prototype),
        Value::Null => None,
        other => {
            let shown = interpreter.describe(&other);
            return Err(interpreter.type_error(format!(
                "Object prototype may only be an Object or null: {shown}"
            )));
        }
    };
    let object = interpreter.alloc(Object::new(ObjectKind::Ordinary, prototype))?;
    if let Value::Object(properties) = arg(args, 1) {
        let keys = properties.borrow().own_keys();
        for key in keys {
            if let Some(Value::Object(descriptor)) = lookup(&properties, &key) {
                let value = lookup(&descriptor, "value").unwrap_or_default();
                object.borrow_mut().set_own(&key, value).ok();
            }
        }
    }
    Ok(Value::Object(object))
}

fn get_prototype_of(interpreter: &mut Interpreter, _this: &Value, args: &[Value]) -> EvalResult<Value> {
    let prototype = match arg(args, 0) {
        Value::Object(object) => object.borrow().prototype.clone(),
        Value::String(_) => Some(interpreter.realm.string_prototype.clone()),
        Value::Number(_) => Some(interpreter.realm.number_prototype.clone()),
        Value::Boolean(_) => Some(interpreter.realm.boolean_prototype.clone()),
        Value::Undefined | Value::Null => {
            return Err(interpreter.type_error("Cannot convert undefined or null to object"));
        }
    };
    Ok(prototype.map(Value::Object).unwrap_or(Value::Null))
}

fn from_entries(interpreter: &mut Interpreter, _this: &Value, args: &[Value]) -> EvalResult<Value> {
    let source = arg(args, 0);
    let object = interpreter.new_object()?;
    for entry in interpreter.iterate(&source, None)? {
        let key = interpreter.get_property(&entry, "0")?;
        let key = interpreter.to_property_key(&key)?;
        let value = interpreter.get_property(&entry, "1")?;
        object.borrow_mut().set_own(&key, value).ok();
    }
    Ok(Value::Object(object))
}

fn get_own_property_names(interpreter: &mut Interpreter, _this: &Value, args: &[Value]) -> EvalResult<Value> {
    let keys: Vec<Value> = match target(interpreter, args)? {
        Some(object) => {
            let borrowed = object.borrow();
            let mut keys = borrowed.own_keys();
            if borrowed.is_array() {
                keys.push(Rc::from("length"));
            }
            for hidden in borrowed.properties.keys(false) {
                if !keys.contains(&hidden) {
                    keys.push(hidden);
                }
            }
            keys.into_iter().map(Value::String).collect()
        }
        None => Vec::new(),
    };
    Ok(Value::Object(interpreter.new_array(keys)?))
}

fn has_own_property(interpreter: &mut Interpreter, this: &Value, args: &[Value]) -> EvalResult<Value> {
    let key = interpreter.to_property_key(&arg(args, 0))?;
    Ok(Value::Boolean(match this {
        Value::Object(object) => object.borrow().has_own(&key),
        Value::String(text) => {
            key.as_ref() == "length"
                || crate::sandbox::value::array_index(&key)
                    .is_some_and(|index| index < crate::sandbox::operators::utf16_length(text))
        }
        _ => false,
    }))
}

fn to_string(_interpreter: &mut Interpreter, this: &Value, _args: &[Value]) -> EvalResult<Value> {
    let tag = match this {
        Value::Undefined => "Undefined",
        Value::Null => "Null",
        Value::Object(object) => match &object.borrow().kind {
            ObjectKind::Array(_) => "Array",
            ObjectKind::Function(_) => "Function",
            ObjectKind::Error => "Error",
            ObjectKind::Ordinary => "Object",
        },
        Value::String(_) => "String",
        Value::Number(_) => "Number",
        Value::Boolean(_) => "Boolean",
    };
    Ok(Value::string(format!("[object {tag}]")))
}

fn value_of(interpreter: &mut Interpreter, this: &Value, _args: &[Value]) -> EvalResult<Value> {
    match this {
        Value::Undefined | Value::Null => Ok(Value::Object(this_object(interpreter, this, "Object.prototype.valueOf")?)),
        other => Ok(other.clone()),
    }
}
