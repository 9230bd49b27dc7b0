use super::patterns::BindMode;
use super::{Completion, ErrorKind, Interpreter};
use crate::sandbox::scope::{self, Frame, ScopeRef};
use crate::sandbox::value::{
    Callable, ClassInfo, Closure, ClosureKind, FieldInit, Object, ObjectKind, ObjectRef, Value, lookup,
};
use crate::sandbox::EvalResult;
use crate::syntax::ast::{Class, ClassMemberValue, Function, FunctionBody, Param, PatternKind};
use std::rc::Rc;
use std::sync::Arc;

/// Whether `new` may be applied to `value`.
pub(crate) fn is_constructor(value: &Value) -> bool {
    let Some(object) = value.as_object() else {
        return false;
    };
    match object.borrow().callable() {
        Some(Callable::Native(native)) => native.construct.is_some(),
        Some(Callable::Closure(closure)) => closure.kind == ClosureKind::Normal,
        Some(Callable::Class(_)) => true,
        Some(Callable::Bound { target, .. }) => is_constructor(&Value::Object(target.clone())),
        None => false,
    }
}

/// Number of parameters before the first default or rest.
fn declared_length(params: &[Param]) -> usize {
    params
        .iter()
        .take_while(|param| param.default.is_none() && !param.rest)
        .count()
}

impl Interpreter {
    /// Allocate a function object with the usual `name`/`length` properties.
    pub(crate) fn function_object(&mut self, callable: Callable, name: &str, length: usize) -> EvalResult<ObjectRef> {
        let prototype = self.realm.function_prototype.clone();
        let function = self.alloc(Object::new(ObjectKind::Function(callable), Some(prototype)))?;
        {
            let mut borrowed = function.borrow_mut();
            borrowed.define_hidden("name", Value::string(name));
            borrowed.define_hidden("length", Value::from(length));
        }
        Ok(function)
    }

    /// Closure for a function declaration, expression or arrow.
    pub(crate) fn function_value(
        &mut self,
        function: &Arc<Function>,
        scope: &ScopeRef,
        name: Option<&str>,
    ) -> EvalResult<Value> {
        let kind = if function.is_arrow {
            ClosureKind::Arrow
        } else {
            ClosureKind::Normal
        };
        let name = function.id.as_deref().or(name).unwrap_or("");
        let closure = self.closure(function, scope, kind, None, name)?;
        if kind == ClosureKind::Normal {
            let prototype = self.new_object()?;
            prototype
                .borrow_mut()
                .define_hidden("constructor", Value::Object(closure.clone()));
            closure
                .borrow_mut()
                .define_hidden("prototype", Value::Object(prototype));
        }
        Ok(Value::Object(closure))
    }

    /// Closure for an object-literal or class method.
    pub(crate) fn method_value(
        &mut self,
        function: &Arc<Function>,
        scope: &ScopeRef,
        home: &ObjectRef,
        name: &str,
    ) -> EvalResult<Value> {
        let closure = self.closure(function, scope, ClosureKind::Method, Some(home.clone()), name)?;
        Ok(Value::Object(closure))
    }

    fn closure(
        &mut self,
        function: &Arc<Function>,
        scope: &ScopeRef,
        kind: ClosureKind,
        home: Option<ObjectRef>,
        name: &str,
    ) -> EvalResult<ObjectRef> {
        let callable = Callable::Closure(Rc::new(Closure {
            function: Arc::clone(function),
            scope: scope.clone(),
            kind,
            home,
        }));
        self.function_object(callable, name, declared_length(&function.params))
    }

    /// Call any function value.
    pub(crate) fn call(&mut self, function: &Value, this: &Value, args: &[Value]) -> EvalResult<Value> {
        let Some(object) = function.as_function() else {
            let shown = self.describe(function);
            return Err(self.type_error(format!("{shown} is not a function")));
        };
        let object = object.clone();
        let callable = object.borrow().callable().cloned();
        let Some(callable) = callable else {
            return Ok(Value::Undefined);
        };
        self.enter_call()?;
        let result = match callable {
            Callable::Native(native) => (native.call)(self, this, args),
            Callable::Closure(closure) => {
                let this = match closure.kind {
                    ClosureKind::Arrow => None,
                    ClosureKind::Normal | ClosureKind::Method => Some(this.clone()),
                };
                let frame = this.map(|this| Frame {
                    this: Some(this),
                    home: closure.home.clone(),
                    callee: Some(object.clone()),
                    new_target: None,
                });
                self.invoke(&closure.function, &closure.scope, frame, args)
                    .map(|(value, _)| value)
            }
            Callable::Class(info) => {
                let name = info.class.id.clone().unwrap_or_default();
                Err(self.type_error(format!("Class constructor {name} cannot be invoked without 'new'")))
            }
            Callable::Bound {
                target,
                this: bound_this,
                args: bound_args,
            } => {
                let mut all = bound_args;
                all.extend_from_slice(args);
                self.call(&Value::Object(target), &bound_this, &all)
            }
        };
        self.leave_call();
        result
    }

    /// `new constructor(...args)`, with `new.target` set to `new_target`.
    pub(crate) fn construct(
        &mut self,
        constructor: &ObjectRef,
        args: &[Value],
        new_target: &ObjectRef,
    ) -> EvalResult<Value> {
        let callable = constructor.borrow().callable().cloned();
        let Some(callable) = callable else {
            return Err(self.type_error("object is not a constructor"));
        };
        self.enter_call()?;
        let result = self.construct_callable(callable, constructor, args, new_target);
        self.leave_call();
        result
    }

    fn construct_callable(
        &mut self,
        callable: Callable,
        constructor: &ObjectRef,
        args: &[Value],
        new_target: &ObjectRef,
    ) -> EvalResult<Value> {
        match callable {
            Callable::Native(native) => match native.construct {
                Some(construct) => construct(self, args, new_target),
                None => Err(self.type_error(format!("{} is not a constructor", native.name))),
            },
            Callable::Closure(closure) if closure.kind == ClosureKind::Normal => {
                let this = Value::Object(self.instance_of_target(new_target)?);
                let frame = Frame {
                    this: Some(this.clone()),
                    home: None,
                    callee: Some(constructor.clone()),
                    new_target: Some(new_target.clone()),
                };
                self.invoke(&closure.function, &closure.scope, Some(frame), args)
                    .map(|(value, _)| match value {
                        Value::Object(_) => value,
                        _ => this,
                    })
            }
            Callable::Closure(_) => Err(self.type_error("function is not a constructor")),
            Callable::Class(info) => self.construct_class(&info, constructor, args, new_target),
            Callable::Bound { target, args: bound_args, .. } => {
                let mut all = bound_args;
                all.extend_from_slice(args);
                let new_target = if Rc::ptr_eq(new_target, constructor) {
                    target.clone()
                } else {
                    new_target.clone()
                };
                self.construct(&target, &all, &new_target)
            }
        }
    }

    /// Fresh object whose prototype is `new_target.prototype`.
    pub(crate) fn instance_of_target(&mut self, new_target: &ObjectRef) -> EvalResult<ObjectRef> {
        self.instance_with(new_target, ObjectKind::Ordinary)
    }

    /// Like [`Self::instance_of_target`] with a specific object kind.
    pub(crate) fn instance_with(&mut self, new_target: &ObjectRef, kind: ObjectKind) -> EvalResult<ObjectRef> {
        let prototype = match lookup(new_target, "prototype") {
            Some(Value::Object(prototype)) => prototype,
            _ => self.realm.object_prototype.clone(),
        };
        self.alloc(Object::new(kind, Some(prototype)))
    }

    /// Bind parameters and run a function body in a new scope.
    ///
    /// Returns the completion value and the function scope, whose frame a
    /// derived constructor inspects afterwards.
    fn invoke(
        &mut self,
        function: &Arc<Function>,
        parent: &ScopeRef,
        frame: Option<Frame>,
        args: &[Value],
    ) -> EvalResult<(Value, ScopeRef)> {
        let has_frame = frame.is_some();
        let scope = self.new_scope(parent, frame)?;
        let facts = self.function_facts(function);
        if has_frame && facts.uses_arguments {
            let arguments = self.new_array(args.to_vec())?;
            scope
                .borrow_mut()
                .declare("arguments", Value::Object(arguments), true);
        }

        for (index, param) in function.params.iter().enumerate() {
            let value = if param.rest {
                let rest = args.get(index..).map(<[Value]>::to_vec).unwrap_or_default();
                Value::Object(self.new_array(rest)?)
            } else {
                let value = args.get(index).cloned().unwrap_or_default();
                match (&value, &param.default) {
                    (Value::Undefined, Some(default)) => {
                        let name = match &param.pattern.kind {
                            PatternKind::Identifier { name } => Some(name.as_str()),
                            _ => None,
                        };
                        self.eval_named(default, &scope, name)?
                    }
                    _ => value,
                }
            };
            self.bind_pattern(&param.pattern, value, &scope, BindMode::Initialize)?;
        }

        {
            let mut borrowed = scope.borrow_mut();
            for name in &facts.var_names {
                borrowed.declare_var(name);
            }
        }

        let value = match &function.body {
            FunctionBody::Block(body) => {
                self.declare_block(body, &scope)?;
                match self.exec_statements(body, &scope)? {
                    Completion::Return(value) => value,
                    _ => Value::Undefined,
                }
            }
            FunctionBody::Expression(expr) => self.eval(expr, &scope)?,
        };
        Ok((value, scope))
    }

    /// Evaluate a class definition to its constructor.
    pub(crate) fn eval_class(
        &mut self,
        class: &Arc<Class>,
        scope: &ScopeRef,
        name: Option<&str>,
    ) -> EvalResult<ObjectRef> {
        let name: Rc<str> = Rc::from(class.id.as_deref().or(name).unwrap_or(""));

        // Named classes see their own binding inside the body.
        let class_scope = match &class.id {
            Some(id) => {
                let inner = self.new_scope(scope, None)?;
                inner.borrow_mut().declare_uninitialized(id, false);
                inner
            }
            None => scope.clone(),
        };

        let (parent_constructor, parent_prototype) = match &class.super_class {
            None => (
                self.realm.function_prototype.clone(),
                Some(self.realm.object_prototype.clone()),
            ),
            Some(super_class) => {
                let parent = self.eval(super_class, &class_scope)?;
                match parent {
                    Value::Null => (self.realm.function_prototype.clone(), None),
                    Value::Object(parent) if is_constructor(&Value::Object(parent.clone())) => {
                        let prototype = match lookup(&parent, "prototype") {
                            Some(Value::Object(prototype)) => Some(prototype),
                            Some(Value::Null) => None,
                            _ => {
                                return Err(self.type_error(
                                    "Class extends value does not have valid prototype property",
                                ));
                            }
                        };
                        (parent, prototype)
                    }
                    other => {
                        let shown = self.describe(&other);
                        return Err(self.type_error(format!(
                            "Class extends value {shown} is not a constructor or null"
                        )));
                    }
                }
            }
        };

        let prototype = self.alloc(Object::new(ObjectKind::Ordinary, parent_prototype))?;

        // Keys are computed once, in source order, before anything runs.
        let mut keys = Vec::with_capacity(class.members.len());
        for member in &class.members {
            keys.push(self.property_key(&member.key, &class_scope)?);
        }
        let fields = class
            .members
            .iter()
            .enumerate()
            .filter(|(_, member)| !member.is_static && matches!(member.value, ClassMemberValue::Field(_)))
            .map(|(index, _)| FieldInit {
                key: keys[index].clone(),
                member: index,
            })
            .collect();

        let length = class
            .constructor
            .as_ref()
            .map(|constructor| declared_length(&constructor.params))
            .unwrap_or(0);
        let info = Rc::new(ClassInfo {
            class: Arc::clone(class),
            scope: class_scope.clone(),
            derived: class.super_class.is_some(),
            prototype: prototype.clone(),
            fields,
        });
        let constructor = self.function_object(Callable::Class(info), &name, length)?;
        {
            let mut borrowed = constructor.borrow_mut();
            borrowed.prototype = Some(parent_constructor);
            borrowed.define_hidden("prototype", Value::Object(prototype.clone()));
        }
        prototype
            .borrow_mut()
            .define_hidden("constructor", Value::Object(constructor.clone()));

        for (member, key) in class.members.iter().zip(&keys) {
            if let ClassMemberValue::Method(function) = &member.value {
                let home = if member.is_static { &constructor } else { &prototype };
                let method = self.method_value(function, &class_scope, home, key)?;
                home.borrow_mut().define_hidden(key.clone(), method);
            }
        }

        if let Some(id) = &class.id {
            scope::initialize(&class_scope, id, Value::Object(constructor.clone()));
        }

        for (member, key) in class.members.iter().zip(&keys) {
            if let (true, ClassMemberValue::Field(init)) = (member.is_static, &member.value) {
                let frame = Frame {
                    this: Some(Value::Object(constructor.clone())),
                    home: Some(constructor.clone()),
                    callee: None,
                    new_target: None,
                };
                let field_scope = self.new_scope(&class_scope, Some(frame))?;
                let value = match init {
                    Some(init) => self.eval_named(init, &field_scope, Some(&**key))?,
                    None => Value::Undefined,
                };
                self.put_property(&Value::Object(constructor.clone()), key, value)?;
            }
        }

        Ok(constructor)
    }

    fn construct_class(
        &mut self,
        info: &Rc<ClassInfo>,
        constructor: &ObjectRef,
        args: &[Value],
        new_target: &ObjectRef,
    ) -> EvalResult<Value> {
        let this = if info.derived {
            None
        } else {
            let this = self.instance_of_target(new_target)?;
            self.init_fields(info, &this)?;
            Some(Value::Object(this))
        };
        let frame = Frame {
            this,
            home: Some(info.prototype.clone()),
            callee: Some(constructor.clone()),
            new_target: Some(new_target.clone()),
        };

        let (returned, scope) = match &info.class.constructor {
            Some(function) => self.invoke(function, &info.scope, Some(frame), args)?,
            None => {
                let scope = self.new_scope(&info.scope, Some(frame))?;
                if info.derived {
                    self.super_call(args, &scope)?;
                }
                (Value::Undefined, scope)
            }
        };
        if let Value::Object(_) = returned {
            return Ok(returned);
        }
        let this = scope.borrow().frame.as_ref().and_then(|frame| frame.this.clone());
        match this {
            Some(this) => Ok(this),
            None => Err(self.throw(
                ErrorKind::Reference,
                "Must call super constructor in derived class before accessing 'this' or returning from derived constructor",
            )),
        }
    }

    /// Evaluate instance field initializers onto `this`.
    fn init_fields(&mut self, info: &ClassInfo, this: &ObjectRef) -> EvalResult<()> {
        if info.fields.is_empty() {
            return Ok(());
        }
        let frame = Frame {
            this: Some(Value::Object(this.clone())),
            home: Some(info.prototype.clone()),
            callee: None,
            new_target: None,
        };
        let scope = self.new_scope(&info.scope, Some(frame))?;
        for field in &info.fields {
            let member = &info.class.members[field.member];
            let value = match &member.value {
                ClassMemberValue::Field(Some(init)) => self.eval_named(init, &scope, Some(&*field.key))?,
                _ => Value::Undefined,
            };
            self.put_property(&Value::Object(this.clone()), &field.key, value)?;
        }
        Ok(())
    }

    /// `super(...args)` inside a derived constructor.
    pub(crate) fn super_call(&mut self, args: &[Value], scope: &ScopeRef) -> EvalResult<Value> {
        let frame_scope = scope::frame_scope(scope);
        let (callee, new_target, initialized) = {
            let borrowed = frame_scope.borrow();
            match &borrowed.frame {
                Some(frame) => (
                    frame.callee.clone(),
                    frame.new_target.clone(),
                    frame.this.is_some(),
                ),
                None => (None, None, false),
            }
        };
        let (Some(callee), Some(new_target)) = (callee, new_target) else {
            return Err(self.throw(ErrorKind::Syntax, "'super' keyword unexpected here"));
        };
        if initialized {
            return Err(self.throw(ErrorKind::Reference, "Super constructor may only be called once"));
        }

        let parent = callee.borrow().prototype.clone();
        let parent = match parent {
            Some(parent) if is_constructor(&Value::Object(parent.clone())) => parent,
            _ => return Err(self.type_error("Super constructor null of anonymous class is not a constructor")),
        };
        let this = self.construct(&parent, args, &new_target)?;

        if let Some(frame) = frame_scope.borrow_mut().frame.as_mut() {
            frame.this = Some(this.clone());
        }
        let info = match callee.borrow().callable() {
            Some(Callable::Class(info)) => Some(info.clone()),
            _ => None,
        };
        if let (Some(info), Value::Object(object)) = (info, &this) {
            self.init_fields(&info, object)?;
        }
        Ok(this)
    }
}
