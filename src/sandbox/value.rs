//! Runtime values and objects.

use super::scope::ScopeRef;
use crate::syntax::ast::{Class, Function};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

/// Shared, mutable object handle.
pub(crate) type ObjectRef = Rc<RefCell<Object>>;

/// Longest array the sandbox will materialize.
pub(crate) const MAX_ARRAY_LENGTH: usize = 1 << 24;

/// A JavaScript value.
#[derive(Clone, Default)]
pub(crate) enum Value {
    #[default]
    Undefined,
    Null,
    Boolean(bool),
    Number(f64),
    String(Rc<str>),
    Object(ObjectRef),
}

impl Value {
    pub(crate) fn string(text: impl Into<Rc<str>>) -> Value {
        Value::String(text.into())
    }

    pub(crate) fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    pub(crate) fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(object) => Some(object),
            _ => None,
        }
    }

    /// The object if it can be called.
    pub(crate) fn as_function(&self) -> Option<&ObjectRef> {
        self.as_object()
            .filter(|object| matches!(object.borrow().kind, ObjectKind::Function(_)))
    }

    pub(crate) fn is_callable(&self) -> bool {
        self.as_function().is_some()
    }

    pub(crate) fn truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Boolean(value) => *value,
            Value::Number(value) => *value != 0.0 && !value.is_nan(),
            Value::String(value) => !value.is_empty(),
            Value::Object(_) => true,
        }
    }

    pub(crate) fn type_of(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "object",
            Value::Boolean(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Object(_) if self.is_callable() => "function",
            Value::Object(_) => "object",
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("undefined"),
            Value::Null => f.write_str("null"),
            Value::Boolean(value) => write!(f, "{value}"),
            Value::Number(value) => write!(f, "{value}"),
            Value::String(value) => write!(f, "{value:?}"),
            // Objects can be cyclic.
            Value::Object(object) => write!(f, "<object {:p}>", Rc::as_ptr(object)),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<usize> for Value {
    fn from(value: usize) -> Self {
        Value::Number(value as f64)
    }
}

impl From<ObjectRef> for Value {
    fn from(object: ObjectRef) -> Self {
        Value::Object(object)
    }
}

/// Canonical array index of a property key (`"0"`, `"17"`, never `"01"`).
pub(crate) fn array_index(key: &str) -> Option<usize> {
    let bytes = key.as_bytes();
    if bytes.is_empty() || bytes.len() > 10 || (bytes.len() > 1 && bytes[0] == b'0') {
        return None;
    }
    if !bytes.iter().all(u8::is_ascii_digit) {
        return None;
    }
    key.parse::<u64>()
        .ok()
        .filter(|index| *index < u32::MAX as u64)
        .map(|index| index as usize)
}

/// Attributes and value of an own property.
#[derive(Debug, Clone)]
pub(crate) struct Property {
    pub value: Value,
    pub enumerable: bool,
}

/// Own properties in insertion order, with a hash index for lookups.
#[derive(Debug, Default, Clone)]
pub(crate) struct PropertyMap {
    entries: Vec<(Rc<str>, Property)>,
    index: HashMap<Rc<str>, usize>,
}

impl PropertyMap {
    pub(crate) fn get(&self, key: &str) -> Option<&Property> {
        self.index.get(key).map(|slot| &self.entries[*slot].1)
    }

    pub(crate) fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    pub(crate) fn insert(&mut self, key: Rc<str>, property: Property) {
        match self.index.get(&key) {
            Some(slot) => self.entries[*slot].1 = property,
            None => {
                self.index.insert(key.clone(), self.entries.len());
                self.entries.push((key, property));
            }
        }
    }

    /// Overwrite the value of an existing property, keeping its attributes.
    pub(crate) fn set_value(&mut self, key: &str, value: Value) -> bool {
        match self.index.get(key) {
            Some(slot) => {
                self.entries[*slot].1.value = value;
                true
            }
            None => false,
        }
    }

    pub(crate) fn remove(&mut self, key: &str) -> Option<Property> {
        let slot = self.index.remove(key)?;
        let (_, property) = self.entries.remove(slot);
        for (shifted, (key, _)) in self.entries.iter().enumerate().skip(slot) {
            self.index.insert(key.clone(), shifted);
        }
        Some(property)
    }

    /// Keys in property order: integer keys ascending, then insertion order.
    pub(crate) fn keys(&self, enumerable_only: bool) -> Vec<Rc<str>> {
        let visible = self
            .entries
            .iter()
            .filter(|(_, property)| property.enumerable || !enumerable_only);
        let mut integers: Vec<(usize, Rc<str>)> = Vec::new();
        let mut names = Vec::new();
        for (key, _) in visible {
            match array_index(key) {
                Some(index) => integers.push((index, key.clone())),
                None => names.push(key.clone()),
            }
        }
        integers.sort_by_key(|(index, _)| *index);
        integers.into_iter().map(|(_, key)| key).chain(names).collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn values(&self) -> impl Iterator<Item = &Value> {
        self.entries.iter().map(|(_, property)| &property.value)
    }

    pub(crate) fn clear(&mut self) -> Vec<Value> {
        self.index.clear();
        self.entries
            .drain(..)
            .map(|(_, property)| property.value)
            .collect()
    }
}

/// Behaviour attached to an object.
#[derive(Clone)]
pub(crate) enum ObjectKind {
    Ordinary,
    Array(Vec<Value>),
    Function(Callable),
    /// Instances created by the `Error` constructors.
    Error,
}

/// Why a property write was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum WriteError {
    Frozen,
    ArrayLength,
}

/// A heap object.
pub(crate) struct Object {
    pub kind: ObjectKind,
    pub properties: PropertyMap,
    pub prototype: Option<ObjectRef>,
    pub frozen: bool,
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match &self.kind {
            ObjectKind::Ordinary => "Object",
            ObjectKind::Array(_) => "Array",
            ObjectKind::Function(_) => "Function",
            ObjectKind::Error => "Error",
        };
        f.debug_struct(kind)
            .field("properties", &self.properties.len())
            .field("frozen", &self.frozen)
            .finish()
    }
}

impl Object {
    pub(crate) fn new(kind: ObjectKind, prototype: Option<ObjectRef>) -> Self {
        Self {
            kind,
            properties: PropertyMap::default(),
            prototype,
            frozen: false,
        }
    }

    pub(crate) fn is_array(&self) -> bool {
        matches!(self.kind, ObjectKind::Array(_))
    }

    pub(crate) fn elements(&self) -> Option<&Vec<Value>> {
        match &self.kind {
            ObjectKind::Array(elements) => Some(elements),
            _ => None,
        }
    }

    pub(crate) fn callable(&self) -> Option<&Callable> {
        match &self.kind {
            ObjectKind::Function(callable) => Some(callable),
            _ => None,
        }
    }

    pub(crate) fn get_own(&self, key: &str) -> Option<Value> {
        if let ObjectKind::Array(elements) = &self.kind {
            if key == "length" {
                return Some(Value::from(elements.len()));
            }
            if let Some(index) = array_index(key) {
                return elements.get(index).cloned();
            }
        }
        self.properties.get(key).map(|property| property.value.clone())
    }

    pub(crate) fn has_own(&self, key: &str) -> bool {
        if let ObjectKind::Array(elements) = &self.kind {
            if key == "length" {
                return true;
            }
            if let Some(index) = array_index(key) {
                return index < elements.len();
            }
        }
        self.properties.contains(key)
    }

    /// Create or overwrite an own, enumerable data property.
    pub(crate) fn set_own(&mut self, key: &str, value: Value) -> Result<(), WriteError> {
        if self.frozen {
            return Err(WriteError::Frozen);
        }
        if let ObjectKind::Array(elements) = &mut self.kind {
            if key == "length" {
                let length = match value {
                    Value::Number(length)
                        if length >= 0.0 && length.fract() == 0.0 && length <= MAX_ARRAY_LENGTH as f64 =>
                    {
                        length as usize
                    }
                    _ => return Err(WriteError::ArrayLength),
                };
                elements.resize(length, Value::Undefined);
                return Ok(());
            }
            if let Some(index) = array_index(key) {
                if index >= MAX_ARRAY_LENGTH {
                    return Err(WriteError::ArrayLength);
                }
                if index >= elements.len() {
                    elements.resize(index + 1, Value::Undefined);
                }
                elements[index] = value;
                return Ok(());
            }
        }
        if !self.properties.set_value(key, value.clone()) {
            self.properties.insert(
                Rc::from(key),
                Property {
                    value,
                    enumerable: true,
                },
            );
        }
        Ok(())
    }

    /// Define a non-enumerable property (methods, `constructor`, `name`).
    pub(crate) fn define_hidden(&mut self, key: impl Into<Rc<str>>, value: Value) {
        self.properties.insert(
            key.into(),
            Property {
                value,
                enumerable: false,
            },
        );
    }

    pub(crate) fn delete(&mut self, key: &str) -> Result<bool, WriteError> {
        if self.frozen {
            return Err(WriteError::Frozen);
        }
        if let ObjectKind::Array(elements) = &mut self.kind {
            if key == "length" {
                return Ok(false);
            }
            if let Some(index) = array_index(key) {
                if let Some(slot) = elements.get_mut(index) {
                    *slot = Value::Undefined;
                }
                return Ok(true);
            }
        }
        self.properties.remove(key);
        Ok(true)
    }

    /// Own enumerable keys in property order.
    pub(crate) fn own_keys(&self) -> Vec<Rc<str>> {
        let mut keys: Vec<Rc<str>> = match &self.kind {
            ObjectKind::Array(elements) => (0..elements.len())
                .map(|index| Rc::from(index.to_string()))
                .collect(),
            _ => Vec::new(),
        };
        keys.extend(self.properties.keys(true));
        keys
    }

    /// Drop every value held by this object, returning them so the caller
    /// decides when they are released.
    pub(crate) fn clear(&mut self) -> Vec<Value> {
        let mut released = self.properties.clear();
        match std::mem::replace(&mut self.kind, ObjectKind::Ordinary) {
            ObjectKind::Array(elements) => released.extend(elements),
            ObjectKind::Function(callable) => callable.release(&mut released),
            ObjectKind::Ordinary | ObjectKind::Error => {}
        }
        if let Some(prototype) = self.prototype.take() {
            released.push(Value::Object(prototype));
        }
        released
    }
}

/// Walk the prototype chain of `object` looking for `key`.
pub(crate) fn lookup(object: &ObjectRef, key: &str) -> Option<Value> {
    let mut current = object.clone();
    loop {
        let next = {
            let borrowed = current.borrow();
            if let Some(value) = borrowed.get_own(key) {
                return Some(value);
            }
            borrowed.prototype.clone()
        };
        current = next?;
    }
}

/// Whether `key` exists anywhere on the prototype chain of `object`.
pub(crate) fn has_property(object: &ObjectRef, key: &str) -> bool {
    let mut current = Some(object.clone());
    while let Some(object) = current {
        let borrowed = object.borrow();
        if borrowed.has_own(key) {
            return true;
        }
        current = borrowed.prototype.clone();
    }
    false
}

/// Host function implementing a builtin.
pub(crate) type NativeFn =
    fn(&mut super::interpreter::Interpreter, &Value, &[Value]) -> super::EvalResult<Value>;

/// Host function invoked by `new`; receives `new.target`.
pub(crate) type NativeCtor =
    fn(&mut super::interpreter::Interpreter, &[Value], &ObjectRef) -> super::EvalResult<Value>;

/// A builtin function.
#[derive(Clone, Copy)]
pub(crate) struct NativeFunction {
    pub name: &'static str,
    pub call: NativeFn,
    pub construct: Option<NativeCtor>,
}

/// How a closure treats `this` and `new`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ClosureKind {
    /// `function` declarations and expressions.
    Normal,
    /// Arrow functions: lexical `this`, not constructible.
    Arrow,
    /// Object and class methods: not constructible.
    Method,
}

/// A user-defined function together with its captured scope.
pub(crate) struct Closure {
    pub function: Arc<Function>,
    pub scope: ScopeRef,
    pub kind: ClosureKind,
    /// Object whose prototype `super` resolves against.
    pub home: Option<ObjectRef>,
}

/// An instance field declared in a class body.
pub(crate) struct FieldInit {
    pub key: Rc<str>,
    /// Index into the class members.
    pub member: usize,
}

/// A class constructor.
pub(crate) struct ClassInfo {
    pub class: Arc<Class>,
    pub scope: ScopeRef,
    pub derived: bool,
    pub prototype: ObjectRef,
    pub fields: Vec<FieldInit>,
}

/// What happens when a function object is called.
#[derive(Clone)]
pub(crate) enum Callable {
    Native(NativeFunction),
    Closure(Rc<Closure>),
    Class(Rc<ClassInfo>),
    Bound {
        target: ObjectRef,
        this: Value,
        args: Vec<Value>,
    },
}

impl Callable {
    fn release(self, released: &mut Vec<Value>) {
        match self {
            Callable::Native(_) | Callable::Closure(_) | Callable::Class(_) => {}
            Callable::Bound { target, this, args } => {
                released.push(Value::Object(target));
                released.push(this);
                released.extend(args);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn array_index_is_canonical() {
        assert_eq!(array_index("0"), Some(0));
        assert_eq!(array_index("42"), Some(42));
        assert_eq!(array_index("042"), None);
        assert_eq!(array_index("-1"), None);
        assert_eq!(array_index("1.5"), None);
        assert_eq!(array_index("4294967295"), None);
    }

    #[test]
    fn integer_keys_come_first() {
        let mut map = PropertyMap::default();
        for key in ["b", "2", "a", "1"] {
            map.insert(
                Rc::from(key),
                Property {
                    value: Value::Null,
                    enumerable: true,
                },
            );
        }
        let keys: Vec<_> = map.keys(true).iter().map(|k| k.to_string()).collect();
        assert_eq!(keys, ["1", "2", "b", "a"]);

        map.remove("2");
        assert!(map.get("a").is_some());
        assert_eq!(map.len(), 3);
    }

    #[test]
    fn arrays_grow_and_truncate_through_writes() {
        let mut array = Object::new(ObjectKind::Array(Vec::new()), None);
        array.set_own("2", Value::from(true)).unwrap();
        assert_eq!(array.elements().map(Vec::len), Some(3));
        array.set_own("length", Value::from(1.0)).unwrap();
        assert_eq!(array.elements().map(Vec::len), Some(1));
        assert_eq!(
            array.set_own("length", Value::from(-1.0)),
            Err(WriteError::ArrayLength)
        );
        array.frozen = true;
        assert_eq!(
            array.set_own("0", Value::Null),
            Err(WriteError::Frozen)
        );
    }
}
