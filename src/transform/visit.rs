//! Read-only traversal of the syntax tree.
//!
//! Implementors override the hooks they care about; the `walk_*` functions
//! visit every child in source order.

use crate::syntax::ast::*;

/// Hooks called while walking a tree.
pub trait Visitor {
    /// Called for every statement.
    fn visit_stmt(&mut self, stmt: &Stmt) {
        walk_stmt(self, stmt);
    }

    /// Called for every expression.
    fn visit_expr(&mut self, expr: &Expr) {
        walk_expr(self, expr);
    }

    /// Called for every name that is declared or assigned.
    fn visit_binding(&mut self, _name: &str, _span: Span) {}
}

/// Visit every top-level statement of `program`.
pub fn walk_program<V: Visitor + ?Sized>(visitor: &mut V, program: &Program) {
    for stmt in &program.body {
        visitor.visit_stmt(stmt);
    }
}

/// Visit the children of `stmt`.
pub fn walk_stmt<V: Visitor + ?Sized>(visitor: &mut V, stmt: &Stmt) {
    match &stmt.kind {
        StmtKind::Expression { expression } => visitor.visit_expr(expression),
        StmtKind::Variable(declaration) => walk_declaration(visitor, declaration),
        StmtKind::Function(function) => {
            if let Some(id) = &function.id {
                visitor.visit_binding(id, stmt.span);
            }
            walk_function(visitor, function);
        }
        StmtKind::Class(class) => {
            if let Some(id) = &class.id {
                visitor.visit_binding(id, stmt.span);
            }
            walk_class(visitor, class);
        }
        StmtKind::Return { argument } => {
            if let Some(argument) = argument {
                visitor.visit_expr(argument);
            }
        }
        StmtKind::If {
            test,
            consequent,
            alternate,
        } => {
            visitor.visit_expr(test);
            visitor.visit_stmt(consequent);
            if let Some(alternate) = alternate {
                visitor.visit_stmt(alternate);
            }
        }
        StmtKind::Block { body } => walk_stmts(visitor, body),
        StmtKind::While { test, body } | StmtKind::DoWhile { body, test } => {
            visitor.visit_expr(test);
            visitor.visit_stmt(body);
        }
        StmtKind::For {
            init,
            test,
            update,
            body,
        } => {
            match init {
                Some(ForInit::Declaration(declaration)) => walk_declaration(visitor, declaration),
                Some(ForInit::Expression(expr)) => visitor.visit_expr(expr),
                None => {}
            }
            if let Some(test) = test {
                visitor.visit_expr(test);
            }
            if let Some(update) = update {
                visitor.visit_expr(update);
            }
            visitor.visit_stmt(body);
        }
        StmtKind::ForIn { left, right, body } | StmtKind::ForOf { left, right, body } => {
            match left {
                ForHead::Declaration { id, .. } => walk_pattern(visitor, id),
                ForHead::Pattern(pattern) => walk_pattern(visitor, pattern),
            }
            visitor.visit_expr(right);
            visitor.visit_stmt(body);
        }
        StmtKind::Throw { argument } => visitor.visit_expr(argument),
        StmtKind::Try {
            block,
            handler,
            finalizer,
        } => {
            walk_stmts(visitor, block);
            if let Some(handler) = handler {
                if let Some(param) = &handler.param {
                    walk_pattern(visitor, param);
                }
                walk_stmts(visitor, &handler.body);
            }
            if let Some(finalizer) = finalizer {
                walk_stmts(visitor, finalizer);
            }
        }
        StmtKind::Switch {
            discriminant,
            cases,
        } => {
            visitor.visit_expr(discriminant);
            for case in cases {
                if let Some(test) = &case.test {
                    visitor.visit_expr(test);
                }
                walk_stmts(visitor, &case.consequent);
            }
        }
        StmtKind::Break | StmtKind::Continue | StmtKind::Empty | StmtKind::Debugger => {}
    }
}

fn walk_stmts<V: Visitor + ?Sized>(visitor: &mut V, stmts: &[Stmt]) {
    for stmt in stmts {
        visitor.visit_stmt(stmt);
    }
}

fn walk_declaration<V: Visitor + ?Sized>(visitor: &mut V, declaration: &VariableDeclaration) {
    for declarator in &declaration.declarations {
        walk_pattern(visitor, &declarator.id);
        if let Some(init) = &declarator.init {
            visitor.visit_expr(init);
        }
    }
}

/// Visit parameters and body of a function.
pub fn walk_function<V: Visitor + ?Sized>(visitor: &mut V, function: &Function) {
    for param in &function.params {
        walk_pattern(visitor, &param.pattern);
        if let Some(default) = &param.default {
            visitor.visit_expr(default);
        }
    }
    match &function.body {
        FunctionBody::Block(body) => walk_stmts(visitor, body),
        FunctionBody::Expression(expr) => visitor.visit_expr(expr),
    }
}

fn walk_class<V: Visitor + ?Sized>(visitor: &mut V, class: &Class) {
    if let Some(super_class) = &class.super_class {
        visitor.visit_expr(super_class);
    }
    if let Some(constructor) = &class.constructor {
        walk_function(visitor, constructor);
    }
    for member in &class.members {
        walk_property_key(visitor, &member.key);
        match &member.value {
            ClassMemberValue::Method(method) => walk_function(visitor, method),
            ClassMemberValue::Field(Some(value)) => visitor.visit_expr(value),
            ClassMemberValue::Field(None) => {}
        }
    }
}

fn walk_property_key<V: Visitor + ?Sized>(visitor: &mut V, key: &PropertyKey) {
    if let PropertyKey::Computed(expr) = key {
        visitor.visit_expr(expr);
    }
}

/// Visit every binding name and embedded expression of a pattern.
pub fn walk_pattern<V: Visitor + ?Sized>(visitor: &mut V, pattern: &Pattern) {
    match &pattern.kind {
        PatternKind::Identifier { name } => visitor.visit_binding(name, pattern.span),
        PatternKind::Expression { expression } => visitor.visit_expr(expression),
        PatternKind::Array { elements, rest } => {
            for element in elements.iter().flatten() {
                walk_pattern(visitor, &element.target);
                if let Some(default) = &element.default {
                    visitor.visit_expr(default);
                }
            }
            if let Some(rest) = rest {
                walk_pattern(visitor, rest);
            }
        }
        PatternKind::Object { properties, rest } => {
            for property in properties {
                walk_property_key(visitor, &property.key);
                walk_pattern(visitor, &property.value);
                if let Some(default) = &property.default {
                    visitor.visit_expr(default);
                }
            }
            if let Some(rest) = rest {
                walk_pattern(visitor, rest);
            }
        }
    }
}

/// Visit the children of `expr`.
pub fn walk_expr<V: Visitor + ?Sized>(visitor: &mut V, expr: &Expr) {
    match &expr.kind {
        ExprKind::Number { .. }
        | ExprKind::String { .. }
        | ExprKind::Boolean { .. }
        | ExprKind::Null
        | ExprKind::Identifier { .. }
        | ExprKind::This => {}
        ExprKind::Template { expressions, .. } => {
            for expr in expressions {
                visitor.visit_expr(expr);
            }
        }
        ExprKind::Array { elements } => {
            for element in elements.iter().flatten() {
                visitor.visit_expr(element);
            }
        }
        ExprKind::Object { properties } => {
            for property in properties {
                match property {
                    Property::KeyValue { key, value, .. } => {
                        walk_property_key(visitor, key);
                        visitor.visit_expr(value);
                    }
                    Property::Spread { argument } => visitor.visit_expr(argument),
                }
            }
        }
        ExprKind::Function(function) => {
            if let Some(id) = &function.id {
                visitor.visit_binding(id, expr.span);
            }
            walk_function(visitor, function);
        }
        ExprKind::Arrow(function) => walk_function(visitor, function),
        ExprKind::Class(class) => {
            if let Some(id) = &class.id {
                visitor.visit_binding(id, expr.span);
            }
            walk_class(visitor, class);
        }
        ExprKind::Unary { argument, .. } | ExprKind::Spread { argument } => {
            visitor.visit_expr(argument)
        }
        ExprKind::Update { argument, .. } => {
            if let Some(name) = argument.as_identifier() {
                visitor.visit_binding(name, argument.span);
            }
            visitor.visit_expr(argument);
        }
        ExprKind::Binary { left, right, .. } | ExprKind::Logical { left, right, .. } => {
            visitor.visit_expr(left);
            visitor.visit_expr(right);
        }
        ExprKind::Assign { target, value, .. } => {
            walk_pattern(visitor, target);
            visitor.visit_expr(value);
        }
        ExprKind::Conditional {
            test,
            consequent,
            alternate,
        } => {
            visitor.visit_expr(test);
            visitor.visit_expr(consequent);
            visitor.visit_expr(alternate);
        }
        ExprKind::Call {
            callee, arguments, ..
        }
        | ExprKind::New { callee, arguments } => {
            visitor.visit_expr(callee);
            for argument in arguments {
                visitor.visit_expr(argument);
            }
        }
        ExprKind::SuperCall { arguments } => {
            for argument in arguments {
                visitor.visit_expr(argument);
            }
        }
        ExprKind::Member {
            object, property, ..
        } => {
            visitor.visit_expr(object);
            if let MemberProperty::Computed(property) = property {
                visitor.visit_expr(property);
            }
        }
        ExprKind::SuperMember { property } => {
            if let MemberProperty::Computed(property) = property {
                visitor.visit_expr(property);
            }
        }
        ExprKind::Chain { expression } => visitor.visit_expr(expression),
        ExprKind::Sequence { expressions } => {
            for expr in expressions {
                visitor.visit_expr(expr);
            }
        }
    }
}
