use super::patterns::BindMode;
use super::{Completion, Interpreter};
use crate::sandbox::scope::{self, ScopeRef};
use crate::sandbox::value::Value;
use crate::sandbox::{Abort, EvalResult};
use crate::syntax::ast::*;

/// What a loop does after its body completed with a given completion.
enum LoopStep {
    Next,
    Exit(Completion),
}

fn loop_step(completion: Completion) -> LoopStep {
    match completion {
        Completion::Normal | Completion::Continue => LoopStep::Next,
        Completion::Break => LoopStep::Exit(Completion::Normal),
        Completion::Return(value) => LoopStep::Exit(Completion::Return(value)),
    }
}

/// Whether a statement list declares anything block scoped.
fn has_lexical_declarations(body: &[Stmt]) -> bool {
    body.iter().any(|stmt| match &stmt.kind {
        StmtKind::Variable(declaration) => declaration.kind != DeclarationKind::Var,
        StmtKind::Function(_) | StmtKind::Class(_) => true,
        _ => false,
    })
}

impl Interpreter {
    pub(crate) fn exec_statements(&mut self, body: &[Stmt], scope: &ScopeRef) -> EvalResult<Completion> {
        for stmt in body {
            match self.exec(stmt, scope)? {
                Completion::Normal => {}
                abrupt => return Ok(abrupt),
            }
        }
        Ok(Completion::Normal)
    }

    /// Hoist the block-scoped declarations of `body` into `scope`.
    ///
    /// `let`/`const`/`class` enter their dead zone; function declarations
    /// are created immediately so they can be called before their position.
    pub(crate) fn declare_block(&mut self, body: &[Stmt], scope: &ScopeRef) -> EvalResult<()> {
        for stmt in body {
            match &stmt.kind {
                StmtKind::Variable(declaration) if declaration.kind != DeclarationKind::Var => {
                    let mutable = declaration.kind == DeclarationKind::Let;
                    let mut scope = scope.borrow_mut();
                    for declarator in &declaration.declarations {
                        for name in declarator.id.bound_names() {
                            scope.declare_uninitialized(name, mutable);
                        }
                    }
                }
                StmtKind::Class(class) => {
                    if let Some(name) = &class.id {
                        scope.borrow_mut().declare_uninitialized(name, true);
                    }
                }
                StmtKind::Function(function) => {
                    let closure = self.function_value(function, scope, None)?;
                    if let Some(name) = &function.id {
                        scope.borrow_mut().declare(name, closure, true);
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Run a block in a fresh scope when it declares anything.
    pub(crate) fn exec_block(&mut self, body: &[Stmt], scope: &ScopeRef) -> EvalResult<Completion> {
        if has_lexical_declarations(body) {
            let inner = self.new_scope(scope, None)?;
            self.declare_block(body, &inner)?;
            self.exec_statements(body, &inner)
        } else {
            self.exec_statements(body, scope)
        }
    }

    pub(crate) fn exec(&mut self, stmt: &Stmt, scope: &ScopeRef) -> EvalResult<Completion> {
        self.tick()?;
        match &stmt.kind {
            StmtKind::Expression { expression } => {
                self.eval(expression, scope)?;
                Ok(Completion::Normal)
            }
            StmtKind::Variable(declaration) => {
                self.exec_declaration(declaration, scope)?;
                Ok(Completion::Normal)
            }
            StmtKind::Function(_) | StmtKind::Empty | StmtKind::Debugger => Ok(Completion::Normal),
            StmtKind::Class(class) => {
                let constructor = self.eval_class(class, scope, None)?;
                if let Some(name) = &class.id {
                    scope::initialize(scope, name, Value::Object(constructor));
                }
                Ok(Completion::Normal)
            }
            StmtKind::Return { argument } => {
                let value = match argument {
                    Some(argument) => self.eval(argument, scope)?,
                    None => Value::Undefined,
                };
                Ok(Completion::Return(value))
            }
            StmtKind::If {
                test,
                consequent,
                alternate,
            } => {
                if self.eval(test, scope)?.truthy() {
                    self.exec(consequent, scope)
                } else if let Some(alternate) = alternate {
                    self.exec(alternate, scope)
                } else {
                    Ok(Completion::Normal)
                }
            }
            StmtKind::Block { body } => self.exec_block(body, scope),
            StmtKind::While { test, body } => {
                loop {
                    self.tick()?;
                    if !self.eval(test, scope)?.truthy() {
                        return Ok(Completion::Normal);
                    }
                    if let LoopStep::Exit(completion) = loop_step(self.exec(body, scope)?) {
                        return Ok(completion);
                    }
                }
            }
            StmtKind::DoWhile { body, test } => {
                loop {
                    self.tick()?;
                    if let LoopStep::Exit(completion) = loop_step(self.exec(body, scope)?) {
                        return Ok(completion);
                    }
                    if !self.eval(test, scope)?.truthy() {
                        return Ok(Completion::Normal);
                    }
                }
            }
            StmtKind::For {
                init,
                test,
                update,
                body,
            } => self.exec_for(init.as_ref(), test.as_ref(), update.as_ref(), body, scope),
            StmtKind::ForIn { left, right, body } => {
                let object = self.eval(right, scope)?;
                let keys = self.for_in_keys(&object)?;
                let mut items = keys.into_iter().map(Value::String);
                self.exec_for_each(left, body, scope, || Ok(items.next()))
            }
            StmtKind::ForOf { left, right, body } => {
                let iterable = self.eval(right, scope)?;
                let mut iterator = self.iterate(&iterable, Some(right))?;
                self.exec_for_each(left, body, scope, || Ok(iterator.next()))
            }
            StmtKind::Break => Ok(Completion::Break),
            StmtKind::Continue => Ok(Completion::Continue),
            StmtKind::Throw { argument } => {
                let value = self.eval(argument, scope)?;
                Err(Abort::Throw(value))
            }
            StmtKind::Try {
                block,
                handler,
                finalizer,
            } => self.exec_try(block, handler.as_ref(), finalizer.as_deref(), scope),
            StmtKind::Switch {
                discriminant,
                cases,
            } => self.exec_switch(discriminant, cases, scope),
        }
    }

    fn exec_declaration(&mut self, declaration: &VariableDeclaration, scope: &ScopeRef) -> EvalResult<()> {
        for declarator in &declaration.declarations {
            let value = match &declarator.init {
                Some(init) => {
                    let name = match &declarator.id.kind {
                        PatternKind::Identifier { name } => Some(name.as_str()),
                        _ => None,
                    };
                    self.eval_named(init, scope, name)?
                }
                // `var x;` leaves an existing value alone.
                None if declaration.kind == DeclarationKind::Var => continue,
                None => Value::Undefined,
            };
            let mode = match declaration.kind {
                DeclarationKind::Var => BindMode::Assign,
                DeclarationKind::Let | DeclarationKind::Const => BindMode::Initialize,
            };
            self.bind_pattern(&declarator.id, value, scope, mode)?;
        }
        Ok(())
    }

    fn exec_for(
        &mut self,
        init: Option<&ForInit>,
        test: Option<&Expr>,
        update: Option<&Expr>,
        body: &Stmt,
        scope: &ScopeRef,
    ) -> EvalResult<Completion> {
        let mut per_iteration = false;
        let loop_scope = match init {
            Some(ForInit::Declaration(declaration)) if declaration.kind != DeclarationKind::Var => {
                let loop_scope = self.new_scope(scope, None)?;
                let mutable = declaration.kind == DeclarationKind::Let;
                per_iteration = mutable;
                {
                    let mut inner = loop_scope.borrow_mut();
                    for declarator in &declaration.declarations {
                        for name in declarator.id.bound_names() {
                            inner.declare_uninitialized(name, mutable);
                        }
                    }
                }
                self.exec_declaration(declaration, &loop_scope)?;
                loop_scope
            }
            Some(ForInit::Declaration(declaration)) => {
                self.exec_declaration(declaration, scope)?;
                scope.clone()
            }
            Some(ForInit::Expression(expr)) => {
                self.eval(expr, scope)?;
                scope.clone()
            }
            None => scope.clone(),
        };

        let mut iteration = loop_scope;
        loop {
            self.tick()?;
            if let Some(test) = test {
                if !self.eval(test, &iteration)?.truthy() {
                    return Ok(Completion::Normal);
                }
            }
            if let LoopStep::Exit(completion) = loop_step(self.exec(body, &iteration)?) {
                return Ok(completion);
            }
            if per_iteration {
                // Closures created by this iteration keep their own copy.
                let next = self.new_scope(scope, None)?;
                scope::copy_bindings(&iteration, &next);
                iteration = next;
            }
            if let Some(update) = update {
                self.eval(update, &iteration)?;
            }
        }
    }

    /// Shared driver of `for-in` and `for-of`.
    fn exec_for_each(
        &mut self,
        left: &ForHead,
        body: &Stmt,
        scope: &ScopeRef,
        mut next: impl FnMut() -> EvalResult<Option<Value>>,
    ) -> EvalResult<Completion> {
        loop {
            self.tick()?;
            let Some(item) = next()? else {
                return Ok(Completion::Normal);
            };
            let iteration = match left {
                ForHead::Declaration { kind, id } if *kind != DeclarationKind::Var => {
                    let iteration = self.new_scope(scope, None)?;
                    {
                        let mut inner = iteration.borrow_mut();
                        for name in id.bound_names() {
                            inner.declare_uninitialized(name, *kind == DeclarationKind::Let);
                        }
                    }
                    self.bind_pattern(id, item, &iteration, BindMode::Initialize)?;
                    iteration
                }
                ForHead::Declaration { id, .. } | ForHead::Pattern(id) => {
                    self.bind_pattern(id, item, scope, BindMode::Assign)?;
                    scope.clone()
                }
            };
            if let LoopStep::Exit(completion) = loop_step(self.exec(body, &iteration)?) {
                return Ok(completion);
            }
        }
    }

    fn exec_try(
        &mut self,
        block: &[Stmt],
        handler: Option<&CatchClause>,
        finalizer: Option<&[Stmt]>,
        scope: &ScopeRef,
    ) -> EvalResult<Completion> {
        let mut outcome = self.exec_block(block, scope);
        if let (Err(Abort::Throw(_)), Some(handler)) = (&outcome, handler) {
            let Err(Abort::Throw(thrown)) = std::mem::replace(&mut outcome, Ok(Completion::Normal))
            else {
                unreachable!("matched a throw above");
            };
            outcome = self.exec_catch(handler, thrown, scope);
        }
        let Some(finalizer) = finalizer else {
            return outcome;
        };
        if let Err(Abort::Halt(_)) = outcome {
            return outcome;
        }
        match self.exec_block(finalizer, scope)? {
            Completion::Normal => outcome,
            abrupt => Ok(abrupt),
        }
    }

    fn exec_catch(&mut self, handler: &CatchClause, thrown: Value, scope: &ScopeRef) -> EvalResult<Completion> {
        match &handler.param {
            Some(param) => {
                let catch_scope = self.new_scope(scope, None)?;
                self.bind_pattern(param, thrown, &catch_scope, BindMode::Initialize)?;
                self.exec_block(&handler.body, &catch_scope)
            }
            None => self.exec_block(&handler.body, scope),
        }
    }

    fn exec_switch(&mut self, discriminant: &Expr, cases: &[SwitchCase], scope: &ScopeRef) -> EvalResult<Completion> {
        let value = self.eval(discriminant, scope)?;
        let lexical = cases
            .iter()
            .any(|case| has_lexical_declarations(&case.consequent));
        let inner = if lexical {
            let inner = self.new_scope(scope, None)?;
            for case in cases {
                self.declare_block(&case.consequent, &inner)?;
            }
            inner
        } else {
            scope.clone()
        };

        let mut start = None;
        for (index, case) in cases.iter().enumerate() {
            if let Some(test) = &case.test {
                let candidate = self.eval(test, &inner)?;
                if super::super::operators::strict_equals(&value, &candidate) {
                    start = Some(index);
                    break;
                }
            }
        }
        let start = start.or_else(|| cases.iter().position(|case| case.test.is_none()));
        let Some(start) = start else {
            return Ok(Completion::Normal);
        };

        for case in &cases[start..] {
            match self.exec_statements(&case.consequent, &inner)? {
                Completion::Normal => {}
                Completion::Break => return Ok(Completion::Normal),
                abrupt => return Ok(abrupt),
            }
        }
        Ok(Completion::Normal)
    }
}
