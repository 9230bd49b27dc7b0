use super::{ErrorKind, Interpreter};
use crate::sandbox::scope::{self, ScopeRef};
use crate::sandbox::value::{ObjectRef, Value, lookup};
use crate::sandbox::EvalResult;
use crate::syntax::ast::{Expr, Pattern, PatternKind};
use crate::syntax::codegen;
use std::collections::HashSet;
use std::rc::Rc;

/// How a pattern stores the values it binds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BindMode {
    /// Plain assignment and `var`: the binding must already exist.
    Assign,
    /// `let`/`const`/parameters/`catch`: create or initialize in this scope.
    Initialize,
}

/// Values produced by `for-of`, spread and array destructuring.
pub(crate) enum Iteration {
    /// Reads the array at every step, so appends during iteration are seen.
    Array { array: ObjectRef, next: usize },
    Items(std::vec::IntoIter<Value>),
}

impl Iterator for Iteration {
    type Item = Value;

    fn next(&mut self) -> Option<Value> {
        match self {
            Iteration::Array { array, next } => {
                let item = array.borrow().elements()?.get(*next).cloned()?;
                *next += 1;
                Some(item)
            }
            Iteration::Items(items) => items.next(),
        }
    }
}

impl Interpreter {
    /// Start iterating `value`; `source` names the value in the error.
    pub(crate) fn iterate(&mut self, value: &Value, source: Option<&Expr>) -> EvalResult<Iteration> {
        match value {
            Value::Object(object) if object.borrow().is_array() => Ok(Iteration::Array {
                array: object.clone(),
                next: 0,
            }),
            Value::String(text) => {
                let chars: Vec<Value> = text
                    .chars()
                    .map(|ch| Value::string(ch.to_string()))
                    .collect();
                Ok(Iteration::Items(chars.into_iter()))
            }
            other => {
                let name = match source {
                    Some(expr) => codegen::generate_expression(expr),
                    None => self.describe(other),
                };
                Err(self.type_error(format!("{name} is not iterable")))
            }
        }
    }

    /// Short rendering of a value for error messages.
    pub(crate) fn describe(&self, value: &Value) -> String {
        match value {
            Value::String(text) => format!("\"{text}\""),
            Value::Object(object) if object.borrow().is_array() => "object".to_string(),
            Value::Object(_) if value.is_callable() => "function".to_string(),
            Value::Object(_) => "object".to_string(),
            Value::Number(number) => crate::syntax::number::format_number(*number),
            Value::Boolean(flag) => flag.to_string(),
            Value::Null => "null".to_string(),
            Value::Undefined => "undefined".to_string(),
        }
    }

    /// Keys visited by `for-in`: enumerable own keys, then inherited ones.
    pub(crate) fn for_in_keys(&mut self, value: &Value) -> EvalResult<Vec<Rc<str>>> {
        let mut current = match value {
            Value::Object(object) => Some(object.clone()),
            Value::String(text) => {
                let length = text.encode_utf16().count();
                return Ok((0..length).map(|index| Rc::from(index.to_string())).collect());
            }
            _ => None,
        };
        let mut seen = HashSet::new();
        let mut keys = Vec::new();
        while let Some(object) = current {
            self.tick()?;
            let borrowed = object.borrow();
            for key in borrowed.own_keys() {
                if seen.insert(key.clone()) {
                    keys.push(key);
                }
            }
            current = borrowed.prototype.clone();
        }
        Ok(keys)
    }

    /// Store `value` into the names or members described by `pattern`.
    pub(crate) fn bind_pattern(
        &mut self,
        pattern: &Pattern,
        value: Value,
        scope: &ScopeRef,
        mode: BindMode,
    ) -> EvalResult<()> {
        match &pattern.kind {
            PatternKind::Identifier { name } => match mode {
                BindMode::Initialize => {
                    scope::initialize(scope, name, value);
                    Ok(())
                }
                BindMode::Assign => self.assign_name(name, value, scope),
            },
            PatternKind::Expression { expression } => self.assign_to_expression(expression, value, scope),
            PatternKind::Object { properties, rest } => {
                if value.is_nullish() {
                    let shown = self.describe(&value);
                    return Err(self.type_error(format!(
                        "Cannot destructure '{shown}' as it is {shown}."
                    )));
                }
                let mut used = Vec::with_capacity(properties.len());
                for property in properties {
                    let key = self.property_key(&property.key, scope)?;
                    let mut item = self.get_property(&value, &key)?;
                    if let (Value::Undefined, Some(default)) = (&item, &property.default) {
                        item = self.eval_named(default, scope, target_name(&property.value))?;
                    }
                    self.bind_pattern(&property.value, item, scope, mode)?;
                    used.push(key);
                }
                if let Some(rest) = rest {
                    let remainder = self.new_object()?;
                    if let Value::Object(source) = &value {
                        let keys = source.borrow().own_keys();
                        for key in keys {
                            if used.contains(&key) {
                                continue;
                            }
                            let item = lookup(source, &key).unwrap_or_default();
                            remainder.borrow_mut().set_own(&key, item).ok();
                        }
                    }
                    self.bind_pattern(rest, Value::Object(remainder), scope, mode)?;
                }
                Ok(())
            }
            PatternKind::Array { elements, rest } => {
                let mut items = self.iterate(&value, None)?;
                for element in elements {
                    let item = items.next().unwrap_or_default();
                    let Some(element) = element else { continue };
                    let item = match (&item, &element.default) {
                        (Value::Undefined, Some(default)) => {
                            self.eval_named(default, scope, target_name(&element.target))?
                        }
                        _ => item,
                    };
                    self.bind_pattern(&element.target, item, scope, mode)?;
                }
                if let Some(rest) = rest {
                    let remainder: Vec<Value> = items.collect();
                    let array = self.new_array(remainder)?;
                    self.bind_pattern(rest, Value::Object(array), scope, mode)?;
                }
                Ok(())
            }
        }
    }

    /// Assign to an existing binding.
    pub(crate) fn assign_name(&mut self, name: &str, value: Value, scope: &ScopeRef) -> EvalResult<()> {
        match scope::write(scope, name, value) {
            scope::Access::Value(_) => Ok(()),
            scope::Access::Uninitialized => Err(self.throw(
                ErrorKind::Reference,
                format!("Cannot access '{name}' before initialization"),
            )),
            scope::Access::Constant => Err(self.type_error("Assignment to constant variable.")),
            scope::Access::Unresolved => {
                Err(self.throw(ErrorKind::Reference, format!("{name} is not defined")))
            }
        }
    }
}

/// Name given to an anonymous function used as a default value.
fn target_name(pattern: &Pattern) -> Option<&str> {
    match &pattern.kind {
        PatternKind::Identifier { name } => Some(name),
        _ => None,
    }
}
