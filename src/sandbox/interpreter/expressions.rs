use super::patterns::BindMode;
use super::{ErrorKind, Interpreter};
use super::functions::is_constructor;
use crate::sandbox::operators::to_int32;
use crate::sandbox::scope::{self, Access, ScopeRef};
use crate::sandbox::value::{Callable, ObjectRef, Value};
use crate::sandbox::EvalResult;
use crate::syntax::ast::*;
use crate::syntax::codegen;
use crate::syntax::number::format_number;
use std::ops::Deref;
use std::rc::Rc;
use std::sync::Arc;

/// A property key that avoids allocating for `.name` accesses.
pub(crate) enum Key<'a> {
    Borrowed(&'a str),
    Shared(Rc<str>),
}

impl Deref for Key<'_> {
    type Target = str;

    fn deref(&self) -> &str {
        match self {
            Key::Borrowed(key) => key,
            Key::Shared(key) => key,
        }
    }
}

/// Target of a compound or logical assignment, resolved once.
enum Reference<'a> {
    Name(&'a str),
    Property { object: Value, key: Key<'a> },
}

impl Interpreter {
    pub(crate) fn eval(&mut self, expr: &Expr, scope: &ScopeRef) -> EvalResult<Value> {
        match &expr.kind {
            ExprKind::Number { value } => Ok(Value::Number(*value)),
            ExprKind::String { value } => Ok(Value::string(value.as_str())),
            ExprKind::Boolean { value } => Ok(Value::Boolean(*value)),
            ExprKind::Null => Ok(Value::Null),
            ExprKind::Template { quasis, expressions } => {
                let mut text = String::new();
                for (index, quasi) in quasis.iter().enumerate() {
                    text.push_str(quasi);
                    if let Some(expression) = expressions.get(index) {
                        let value = self.eval(expression, scope)?;
                        text.push_str(&self.to_string(&value)?);
                        self.check_string_length(text.len())?;
                    }
                }
                Ok(Value::string(text))
            }
            ExprKind::Identifier { name } => self.lookup_name(name, scope),
            ExprKind::This => self.this_value(scope),
            ExprKind::Array { elements } => {
                let mut items = Vec::with_capacity(elements.len());
                for element in elements {
                    match element {
                        Some(Expr {
                            kind: ExprKind::Spread { argument },
                            ..
                        }) => {
                            let value = self.eval(argument, scope)?;
                            items.extend(self.iterate(&value, Some(argument))?);
                        }
                        Some(element) => items.push(self.eval(element, scope)?),
                        None => items.push(Value::Undefined),
                    }
                }
                Ok(Value::Object(self.new_array(items)?))
            }
            ExprKind::Object { properties } => self.eval_object(properties, scope),
            ExprKind::Function(function) | ExprKind::Arrow(function) => {
                self.function_value(function, scope, None)
            }
            ExprKind::Class(class) => Ok(Value::Object(self.eval_class(class, scope, None)?)),
            ExprKind::Unary { operator, argument } => self.eval_unary(*operator, argument, scope),
            ExprKind::Update {
                operator,
                prefix,
                argument,
            } => self.eval_update(*operator, *prefix, argument, scope),
            ExprKind::Binary {
                operator,
                left,
                right,
            } => {
                let left = self.eval(left, scope)?;
                let right = self.eval(right, scope)?;
                self.binary(*operator, &left, &right)
            }
            ExprKind::Logical {
                operator,
                left,
                right,
            } => {
                let left = self.eval(left, scope)?;
                if short_circuits(*operator, &left) {
                    Ok(left)
                } else {
                    self.eval(right, scope)
                }
            }
            ExprKind::Assign {
                operator,
                target,
                value,
            } => self.eval_assign(*operator, target, value, scope),
            ExprKind::Conditional {
                test,
                consequent,
                alternate,
            } => {
                if self.eval(test, scope)?.truthy() {
                    self.eval(consequent, scope)
                } else {
                    self.eval(alternate, scope)
                }
            }
            ExprKind::Call { .. } | ExprKind::Member { .. } | ExprKind::Chain { .. } => {
                Ok(self.eval_optional(expr, scope)?.unwrap_or_default())
            }
            ExprKind::New { callee, arguments } => {
                let constructor = self.eval(callee, scope)?;
                let args = self.eval_arguments(arguments, scope)?;
                let Some(target) = constructor.as_object().filter(|_| is_constructor(&constructor)).cloned()
                else {
                    let name = codegen::generate_expression(callee);
                    return Err(self.type_error(format!("{name} is not a constructor")));
                };
                self.construct(&target, &args, &target)
            }
            ExprKind::SuperCall { arguments } => {
                let args = self.eval_arguments(arguments, scope)?;
                self.super_call(&args, scope)
            }
            ExprKind::SuperMember { property } => {
                let key = self.member_key(property, scope)?;
                self.super_get(&key, scope)
            }
            ExprKind::Sequence { expressions } => {
                let mut last = Value::Undefined;
                for expression in expressions {
                    last = self.eval(expression, scope)?;
                }
                Ok(last)
            }
            ExprKind::Spread { .. } => Err(self.throw(ErrorKind::Syntax, "Unexpected token '...'")),
        }
    }

    /// Evaluate `expr`, naming it `name` if it is an anonymous function or class.
    pub(crate) fn eval_named(&mut self, expr: &Expr, scope: &ScopeRef, name: Option<&str>) -> EvalResult<Value> {
        match (&expr.kind, name) {
            (ExprKind::Function(function) | ExprKind::Arrow(function), Some(_)) if function.id.is_none() => {
                self.function_value(function, scope, name)
            }
            (ExprKind::Class(class), Some(_)) if class.id.is_none() => {
                Ok(Value::Object(self.eval_class(class, scope, name)?))
            }
            _ => self.eval(expr, scope),
        }
    }

    /// Evaluate a member or call inside an optional chain; `None` when the
    /// chain short-circuited on a nullish base.
    fn eval_optional(&mut self, expr: &Expr, scope: &ScopeRef) -> EvalResult<Option<Value>> {
        match &expr.kind {
            ExprKind::Member {
                object,
                property,
                optional,
            } => {
                let Some(base) = self.eval_optional(object, scope)? else {
                    return Ok(None);
                };
                if *optional && base.is_nullish() {
                    return Ok(None);
                }
                let key = self.member_key(property, scope)?;
                self.get_property(&base, &key).map(Some)
            }
            ExprKind::Call {
                callee,
                arguments,
                optional,
            } => {
                let Some((this, function)) = self.eval_callee(callee, scope)? else {
                    return Ok(None);
                };
                if *optional && function.is_nullish() {
                    return Ok(None);
                }
                let args = self.eval_arguments(arguments, scope)?;
                if !function.is_callable() {
                    let name = codegen::generate_expression(callee);
                    return Err(self.type_error(format!("{name} is not a function")));
                }
                self.call(&function, &this, &args).map(Some)
            }
            ExprKind::Chain { expression } => Ok(Some(self.eval_optional(expression, scope)?.unwrap_or_default())),
            _ => self.eval(expr, scope).map(Some),
        }
    }

    /// Resolve a callee to `(this, function)`.
    fn eval_callee(&mut self, callee: &Expr, scope: &ScopeRef) -> EvalResult<Option<(Value, Value)>> {
        match &callee.kind {
            ExprKind::Member {
                object,
                property,
                optional,
            } => {
                let Some(base) = self.eval_optional(object, scope)? else {
                    return Ok(None);
                };
                if *optional && base.is_nullish() {
                    return Ok(None);
                }
                let key = self.member_key(property, scope)?;
                let function = self.get_property(&base, &key)?;
                Ok(Some((base, function)))
            }
            ExprKind::SuperMember { property } => {
                let key = self.member_key(property, scope)?;
                let function = self.super_get(&key, scope)?;
                Ok(Some((self.this_value(scope)?, function)))
            }
            _ => Ok(self
                .eval_optional(callee, scope)?
                .map(|function| (Value::Undefined, function))),
        }
    }

    pub(crate) fn eval_arguments(&mut self, arguments: &[Expr], scope: &ScopeRef) -> EvalResult<Vec<Value>> {
        let mut values = Vec::with_capacity(arguments.len());
        for argument in arguments {
            match &argument.kind {
                ExprKind::Spread { argument } => {
                    let value = self.eval(argument, scope)?;
                    values.extend(self.iterate(&value, Some(argument))?);
                }
                _ => values.push(self.eval(argument, scope)?),
            }
        }
        Ok(values)
    }

    pub(crate) fn member_key<'a>(&mut self, property: &'a MemberProperty, scope: &ScopeRef) -> EvalResult<Key<'a>> {
        match property {
            MemberProperty::Named(name) => Ok(Key::Borrowed(name)),
            MemberProperty::Computed(expr) => {
                let value = self.eval(expr, scope)?;
                Ok(Key::Shared(self.to_property_key(&value)?))
            }
        }
    }

    /// Name of an object-literal, pattern or class key.
    pub(crate) fn property_key(&mut self, key: &PropertyKey, scope: &ScopeRef) -> EvalResult<Rc<str>> {
        match key {
            PropertyKey::Identifier(name) | PropertyKey::String(name) => Ok(Rc::from(name.as_str())),
            PropertyKey::Number(number) => Ok(Rc::from(format_number(*number))),
            PropertyKey::Computed(expr) => {
                let value = self.eval(expr, scope)?;
                self.to_property_key(&value)
            }
        }
    }

    pub(crate) fn lookup_name(&mut self, name: &str, scope: &ScopeRef) -> EvalResult<Value> {
        match scope::read(scope, name) {
            Access::Value(value) => Ok(value),
            Access::Uninitialized => Err(self.throw(
                ErrorKind::Reference,
                format!("Cannot access '{name}' before initialization"),
            )),
            Access::Constant | Access::Unresolved => {
                Err(self.throw(ErrorKind::Reference, format!("{name} is not defined")))
            }
        }
    }

    pub(crate) fn this_value(&mut self, scope: &ScopeRef) -> EvalResult<Value> {
        let frame = scope::frame_scope(scope);
        let this = frame.borrow().frame.as_ref().and_then(|frame| frame.this.clone());
        match this {
            Some(this) => Ok(this),
            None => Err(self.throw(
                ErrorKind::Reference,
                "Must call super constructor in derived class before accessing 'this' or returning from derived constructor",
            )),
        }
    }

    fn eval_object(&mut self, properties: &[Property], scope: &ScopeRef) -> EvalResult<Value> {
        let object = self.new_object()?;
        for property in properties {
            match property {
                Property::KeyValue {
                    key,
                    value,
                    shorthand,
                    method,
                } => {
                    let name = self.property_key(key, scope)?;
                    let value = match &value.kind {
                        ExprKind::Function(function) if *method => {
                            self.method_value(function, scope, &object, &name)?
                        }
                        _ => self.eval_named(value, scope, Some(&*name))?,
                    };
                    let literal_proto = !*shorthand
                        && !*method
                        && matches!(key, PropertyKey::Identifier(_) | PropertyKey::String(_))
                        && &*name == "__proto__";
                    if literal_proto {
                        match value {
                            Value::Object(prototype) => object.borrow_mut().prototype = Some(prototype),
                            Value::Null => object.borrow_mut().prototype = None,
                            _ => {}
                        }
                    } else {
                        object.borrow_mut().set_own(&name, value).ok();
                    }
                }
                Property::Spread { argument } => {
                    let source = self.eval(argument, scope)?;
                    self.copy_own_properties(&object, &source)?;
                }
            }
        }
        Ok(Value::Object(object))
    }

    /// Copy the enumerable own properties of `source` onto `target`.
    pub(crate) fn copy_own_properties(&mut self, target: &ObjectRef, source: &Value) -> EvalResult<()> {
        match source {
            Value::Object(source) => {
                let keys = source.borrow().own_keys();
                for key in keys {
                    self.tick()?;
                    let value = source.borrow().get_own(&key).unwrap_or_default();
                    self.put_property(&Value::Object(target.clone()), &key, value)?;
                }
            }
            Value::String(text) => {
                for (index, ch) in text.chars().enumerate() {
                    let value = Value::string(ch.to_string());
                    self.put_property(&Value::Object(target.clone()), &index.to_string(), value)?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn eval_unary(&mut self, operator: UnaryOp, argument: &Expr, scope: &ScopeRef) -> EvalResult<Value> {
        match operator {
            UnaryOp::TypeOf => {
                if let ExprKind::Identifier { name } = &argument.kind {
                    if let Access::Unresolved = scope::read(scope, name) {
                        return Ok(Value::string("undefined"));
                    }
                }
                let value = self.eval(argument, scope)?;
                Ok(Value::string(value.type_of()))
            }
            UnaryOp::Delete => match &argument.kind {
                ExprKind::Member {
                    object, property, ..
                } => {
                    let base = self.eval(object, scope)?;
                    let key = self.member_key(property, scope)?;
                    self.delete_property(&base, &key).map(Value::Boolean)
                }
                ExprKind::Chain { expression } => self.eval_unary(operator, expression, scope),
                ExprKind::Identifier { .. } => Ok(Value::Boolean(false)),
                _ => {
                    self.eval(argument, scope)?;
                    Ok(Value::Boolean(true))
                }
            },
            UnaryOp::Void => {
                self.eval(argument, scope)?;
                Ok(Value::Undefined)
            }
            UnaryOp::Not => Ok(Value::Boolean(!self.eval(argument, scope)?.truthy())),
            UnaryOp::Minus => {
                let value = self.eval(argument, scope)?;
                Ok(Value::Number(-self.to_number(&value)?))
            }
            UnaryOp::Plus => {
                let value = self.eval(argument, scope)?;
                Ok(Value::Number(self.to_number(&value)?))
            }
            UnaryOp::BitNot => {
                let value = self.eval(argument, scope)?;
                Ok(Value::Number(!to_int32(self.to_number(&value)?) as f64))
            }
        }
    }

    fn eval_update(&mut self, operator: UpdateOp, prefix: bool, argument: &Expr, scope: &ScopeRef) -> EvalResult<Value> {
        let reference = self.expression_reference(argument, scope)?;
        let old = self.get_reference(&reference, scope)?;
        let old = self.to_number(&old)?;
        let new = match operator {
            UpdateOp::Increment => old + 1.0,
            UpdateOp::Decrement => old - 1.0,
        };
        self.put_reference(&reference, Value::Number(new), scope)?;
        Ok(Value::Number(if prefix { new } else { old }))
    }

    fn eval_assign(&mut self, operator: AssignOp, target: &Pattern, value: &Expr, scope: &ScopeRef) -> EvalResult<Value> {
        if operator == AssignOp::Assign {
            return match &target.kind {
                PatternKind::Identifier { name } => {
                    let value = self.eval_named(value, scope, Some(name))?;
                    self.assign_name(name, value.clone(), scope)?;
                    Ok(value)
                }
                PatternKind::Expression { expression } => {
                    let reference = self.expression_reference(expression, scope)?;
                    let value = self.eval(value, scope)?;
                    self.put_reference(&reference, value.clone(), scope)?;
                    Ok(value)
                }
                PatternKind::Object { .. } | PatternKind::Array { .. } => {
                    let value = self.eval(value, scope)?;
                    self.bind_pattern(target, value.clone(), scope, BindMode::Assign)?;
                    Ok(value)
                }
            };
        }

        let reference = self.pattern_reference(target, scope)?;
        let current = self.get_reference(&reference, scope)?;
        if let Some(logical) = operator.logical() {
            if short_circuits(logical, &current) {
                return Ok(current);
            }
            let name = match &reference {
                Reference::Name(name) => Some(*name),
                Reference::Property { .. } => None,
            };
            let value = self.eval_named(value, scope, name)?;
            self.put_reference(&reference, value.clone(), scope)?;
            return Ok(value);
        }
        let right = self.eval(value, scope)?;
        let binary = operator.binary().unwrap_or(BinaryOp::Add);
        let result = self.binary(binary, &current, &right)?;
        self.put_reference(&reference, result.clone(), scope)?;
        Ok(result)
    }

    fn pattern_reference<'a>(&mut self, target: &'a Pattern, scope: &ScopeRef) -> EvalResult<Reference<'a>> {
        match &target.kind {
            PatternKind::Identifier { name } => Ok(Reference::Name(name)),
            PatternKind::Expression { expression } => self.expression_reference(expression, scope),
            _ => Err(self.throw(ErrorKind::Syntax, "Invalid left-hand side in assignment")),
        }
    }

    fn expression_reference<'a>(&mut self, expr: &'a Expr, scope: &ScopeRef) -> EvalResult<Reference<'a>> {
        match &expr.kind {
            ExprKind::Identifier { name } => Ok(Reference::Name(name)),
            ExprKind::Member {
                object, property, ..
            } => {
                let object = self.eval(object, scope)?;
                let key = self.member_key(property, scope)?;
                Ok(Reference::Property { object, key })
            }
            ExprKind::SuperMember { property } => {
                let object = self.this_value(scope)?;
                let key = self.member_key(property, scope)?;
                Ok(Reference::Property { object, key })
            }
            _ => Err(self.throw(ErrorKind::Syntax, "Invalid left-hand side in assignment")),
        }
    }

    fn get_reference(&mut self, reference: &Reference<'_>, scope: &ScopeRef) -> EvalResult<Value> {
        match reference {
            Reference::Name(name) => self.lookup_name(name, scope),
            Reference::Property { object, key } => self.get_property(object, key),
        }
    }

    fn put_reference(&mut self, reference: &Reference<'_>, value: Value, scope: &ScopeRef) -> EvalResult<()> {
        match reference {
            Reference::Name(name) => self.assign_name(name, value, scope),
            Reference::Property { object, key } => self.put_property(object, key, value),
        }
    }

    /// Store into a member expression used as an assignment target.
    pub(crate) fn assign_to_expression(&mut self, expr: &Expr, value: Value, scope: &ScopeRef) -> EvalResult<()> {
        let reference = self.expression_reference(expr, scope)?;
        self.put_reference(&reference, value, scope)
    }

    /// `super.key` inside a method.
    fn super_get(&mut self, key: &str, scope: &ScopeRef) -> EvalResult<Value> {
        let frame = scope::frame_scope(scope);
        let home = frame.borrow().frame.as_ref().and_then(|frame| frame.home.clone());
        let Some(home) = home else {
            return Err(self.throw(ErrorKind::Syntax, "'super' keyword unexpected here"));
        };
        let parent = home.borrow().prototype.clone();
        match parent {
            Some(parent) => self.get_property(&Value::Object(parent), key),
            None => Ok(Value::Undefined),
        }
    }

    /// Text of a function as `Function.prototype.toString` shows it.
    pub(crate) fn function_source(&self, function: &ObjectRef) -> String {
        let borrowed = function.borrow();
        let Some(callable) = borrowed.callable() else {
            return String::new();
        };
        match callable {
            Callable::Closure(closure) => {
                let kind = if closure.function.is_arrow {
                    ExprKind::Arrow(Arc::clone(&closure.function))
                } else {
                    ExprKind::Function(Arc::clone(&closure.function))
                };
                codegen::generate_expression(&Expr::new(kind, Span::default()))
            }
            Callable::Class(info) => codegen::generate_expression(&Expr::new(
                ExprKind::Class(Arc::clone(&info.class)),
                Span::default(),
            )),
            Callable::Native(native) => {
                format!("function {}() {{ [native code] }}", native.name)
            }
            Callable::Bound { .. } => "function () { [native code] }".to_string(),
        }
    }
}

fn short_circuits(operator: LogicalOp, left: &Value) -> bool {
    match operator {
        LogicalOp::And => !left.truthy(),
        LogicalOp::Or => left.truthy(),
        LogicalOp::Nullish => !left.is_nullish(),
    }
}
