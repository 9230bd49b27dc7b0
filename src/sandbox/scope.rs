//! Lexical environments.

use super::value::{ObjectRef, Value};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Shared handle to a scope.
pub(crate) type ScopeRef = Rc<RefCell<Scope>>;

/// One variable slot.
#[derive(Debug, Clone)]
pub(crate) struct Binding {
    pub value: Value,
    pub mutable: bool,
    /// `false` while a `let`/`const`/`class` binding is in its dead zone.
    pub initialized: bool,
}

/// Per-call state found on the nearest function scope.
#[derive(Debug, Clone, Default)]
pub(crate) struct Frame {
    /// `None` inside a derived constructor until `super()` returns.
    pub this: Option<Value>,
    /// Object `super.x` resolves against (its prototype is searched).
    pub home: Option<ObjectRef>,
    /// Function being executed.
    pub callee: Option<ObjectRef>,
    /// Constructor `new` was applied to, when called as a constructor.
    pub new_target: Option<ObjectRef>,
}

/// A set of bindings plus a link to the enclosing scope.
#[derive(Debug, Default)]
pub(crate) struct Scope {
    bindings: HashMap<Rc<str>, Binding>,
    pub parent: Option<ScopeRef>,
    /// Present on function (and global) scopes; arrows and blocks have none.
    pub frame: Option<Frame>,
}

/// Outcome of resolving a name for reading or writing.
pub(crate) enum Access {
    Value(Value),
    Uninitialized,
    Constant,
    Unresolved,
}

impl Scope {
    pub(crate) fn new(parent: Option<ScopeRef>, frame: Option<Frame>) -> Self {
        Self {
            bindings: HashMap::new(),
            parent,
            frame,
        }
    }

    /// Create a binding in its dead zone (hoisted `let`/`const`/`class`).
    pub(crate) fn declare_uninitialized(&mut self, name: &str, mutable: bool) {
        self.bindings.insert(
            Rc::from(name),
            Binding {
                value: Value::Undefined,
                mutable,
                initialized: false,
            },
        );
    }

    /// Create (or reset) an initialized binding.
    pub(crate) fn declare(&mut self, name: &str, value: Value, mutable: bool) {
        self.bindings.insert(
            Rc::from(name),
            Binding {
                value,
                mutable,
                initialized: true,
            },
        );
    }

    /// Declare a `var` unless a binding already exists here.
    pub(crate) fn declare_var(&mut self, name: &str) {
        if !self.bindings.contains_key(name) {
            self.declare(name, Value::Undefined, true);
        }
    }

    /// Values bound directly in this scope.
    pub(crate) fn values(&self) -> impl Iterator<Item = &Value> {
        self.bindings.values().map(|binding| &binding.value)
    }

    pub(crate) fn clear(&mut self) -> Vec<Value> {
        let mut released: Vec<Value> = self
            .bindings
            .drain()
            .map(|(_, binding)| binding.value)
            .collect();
        if let Some(frame) = self.frame.take() {
            released.extend(frame.this);
            released.extend(frame.home.map(Value::Object));
            released.extend(frame.callee.map(Value::Object));
            released.extend(frame.new_target.map(Value::Object));
        }
        released
    }
}

/// Read `name`, walking outwards from `scope`.
pub(crate) fn read(scope: &ScopeRef, name: &str) -> Access {
    let mut current = scope.clone();
    loop {
        let next = {
            let borrowed = current.borrow();
            if let Some(binding) = borrowed.bindings.get(name) {
                return if binding.initialized {
                    Access::Value(binding.value.clone())
                } else {
                    Access::Uninitialized
                };
            }
            borrowed.parent.clone()
        };
        match next {
            Some(parent) => current = parent,
            None => return Access::Unresolved,
        }
    }
}

/// Assign to an existing binding, walking outwards from `scope`.
pub(crate) fn write(scope: &ScopeRef, name: &str, value: Value) -> Access {
    let mut current = scope.clone();
    loop {
        let next = {
            let mut borrowed = current.borrow_mut();
            if let Some(binding) = borrowed.bindings.get_mut(name) {
                return if !binding.initialized {
                    Access::Uninitialized
                } else if !binding.mutable {
                    Access::Constant
                } else {
                    binding.value = value;
                    Access::Value(Value::Undefined)
                };
            }
            borrowed.parent.clone()
        };
        match next {
            Some(parent) => current = parent,
            None => return Access::Unresolved,
        }
    }
}

/// Initialize a binding created by [`Scope::declare_uninitialized`].
pub(crate) fn initialize(scope: &ScopeRef, name: &str, value: Value) {
    let mut borrowed = scope.borrow_mut();
    match borrowed.bindings.get_mut(name) {
        Some(binding) => {
            binding.value = value;
            binding.initialized = true;
        }
        None => borrowed.declare(name, value, true),
    }
}

/// Nearest scope carrying a [`Frame`].
pub(crate) fn frame_scope(scope: &ScopeRef) -> ScopeRef {
    let mut current = scope.clone();
    loop {
        let next = {
            let borrowed = current.borrow();
            if borrowed.frame.is_some() {
                return current.clone();
            }
            borrowed.parent.clone()
        };
        match next {
            Some(parent) => current = parent,
            None => return current,
        }
    }
}

/// Copy of `scope` for the next iteration of a `for (let ...)` loop.
pub(crate) fn copy_bindings(scope: &ScopeRef, into: &ScopeRef) {
    let source = scope.borrow();
    let mut target = into.borrow_mut();
    for (name, binding) in &source.bindings {
        target.bindings.insert(name.clone(), binding.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_walk_outwards_and_respect_dead_zones() {
        let global = Rc::new(RefCell::new(Scope::new(None, Some(Frame::default()))));
        global.borrow_mut().declare("a", Value::from(1.0), true);
        let inner = Rc::new(RefCell::new(Scope::new(Some(global.clone()), None)));
        inner.borrow_mut().declare_uninitialized("b", false);

        assert!(matches!(read(&inner, "a"), Access::Value(Value::Number(n)) if n == 1.0));
        assert!(matches!(read(&inner, "b"), Access::Uninitialized));
        assert!(matches!(read(&inner, "c"), Access::Unresolved));

        initialize(&inner, "b", Value::Null);
        assert!(matches!(write(&inner, "b", Value::Null), Access::Constant));
        assert!(matches!(write(&inner, "a", Value::from(2.0)), Access::Value(_)));
        assert!(Rc::ptr_eq(&frame_scope(&inner), &global));
    }
}
