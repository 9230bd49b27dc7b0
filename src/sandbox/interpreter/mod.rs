//! Tree-walking evaluator.
//!
//! An [`Interpreter`] is one isolated context: its own heap, intrinsics and
//! global scope. It lives on the sandbox worker thread and is dropped (and
//! torn down) before the worker exits.

mod expressions;
mod functions;
mod patterns;
mod statements;

use super::builtins::{self, Realm};
use super::heap::Heap;
use super::output::{CaptureError, OutputSink};
use super::scope::{Frame, Scope, ScopeRef};
use super::value::{Object, ObjectKind, ObjectRef, Value};
use super::{Abort, EvalResult, ExecutionLimits, Halt, WorkerOutcome};
use crate::syntax::Program;
use crate::syntax::ast::{DeclarationKind, Expr, ExprKind, ForHead, ForInit, Function, Stmt, StmtKind};
use crate::transform::visit::{self, Visitor};
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Longest string the sandbox will build, in bytes.
pub(crate) const MAX_STRING_LENGTH: usize = 1 << 26;

/// Nesting allowed for recursive builtins (`JSON.stringify`, `join`).
const MAX_NATIVE_DEPTH: usize = 4096;

/// Result of executing a statement.
#[derive(Debug, Clone)]
pub(crate) enum Completion {
    Normal,
    Return(Value),
    Break,
    Continue,
}

/// Constructor family of an error object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ErrorKind {
    Error,
    Type,
    Range,
    Reference,
    Syntax,
}

impl ErrorKind {
    pub(crate) const ALL: [ErrorKind; 5] = [
        ErrorKind::Error,
        ErrorKind::Type,
        ErrorKind::Range,
        ErrorKind::Reference,
        ErrorKind::Syntax,
    ];

    pub(crate) fn name(self) -> &'static str {
        match self {
            ErrorKind::Error => "Error",
            ErrorKind::Type => "TypeError",
            ErrorKind::Range => "RangeError",
            ErrorKind::Reference => "ReferenceError",
            ErrorKind::Syntax => "SyntaxError",
        }
    }
}

/// Facts about a function body computed once per definition.
#[derive(Debug, Default)]
pub(crate) struct FunctionFacts {
    /// `var` names hoisted to the function scope.
    pub var_names: Vec<Rc<str>>,
    /// Whether the body (or a nested arrow) mentions `arguments`.
    pub uses_arguments: bool,
}

#[derive(Default)]
struct FactCollector {
    facts: FunctionFacts,
    arrow_depth: usize,
}

impl FactCollector {
    fn var_pattern(&mut self, kind: DeclarationKind, names: Vec<&str>) {
        if kind == DeclarationKind::Var && self.arrow_depth == 0 {
            for name in names {
                if !self.facts.var_names.iter().any(|known| &**known == name) {
                    self.facts.var_names.push(Rc::from(name));
                }
            }
        }
    }
}

impl Visitor for FactCollector {
    fn visit_stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Function(_) | StmtKind::Class(_) => return,
            StmtKind::Variable(declaration) => {
                for declarator in &declaration.declarations {
                    self.var_pattern(declaration.kind, declarator.id.bound_names());
                }
            }
            StmtKind::For {
                init: Some(ForInit::Declaration(declaration)),
                ..
            } => {
                for declarator in &declaration.declarations {
                    self.var_pattern(declaration.kind, declarator.id.bound_names());
                }
            }
            StmtKind::ForIn {
                left: ForHead::Declaration { kind, id },
                ..
            }
            | StmtKind::ForOf {
                left: ForHead::Declaration { kind, id },
                ..
            } => self.var_pattern(*kind, id.bound_names()),
            _ => {}
        }
        visit::walk_stmt(self, stmt);
    }

    fn visit_expr(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::Function(_) | ExprKind::Class(_) => {}
            ExprKind::Arrow(function) => {
                self.arrow_depth += 1;
                visit::walk_function(self, function);
                self.arrow_depth -= 1;
            }
            ExprKind::Identifier { name } if name == "arguments" => {
                self.facts.uses_arguments = true;
            }
            _ => visit::walk_expr(self, expr),
        }
    }
}

/// xorshift64* generator behind `Math.random`.
pub(crate) struct Random(u64);

impl Random {
    fn new(seed: u64) -> Self {
        Self(seed.max(1))
    }

    pub(crate) fn next_f64(&mut self) -> f64 {
        let mut x = self.0;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.0 = x;
        let bits = x.wrapping_mul(0x2545_F491_4F6C_DD1D) >> 11;
        bits as f64 / (1u64 << 53) as f64
    }
}

/// One isolated evaluation context.
pub(crate) struct Interpreter {
    pub(crate) heap: Heap,
    pub(crate) realm: Realm,
    pub(crate) global: ScopeRef,
    output: OutputSink,
    interrupt: Arc<AtomicBool>,
    max_call_depth: usize,
    call_depth: usize,
    native_depth: usize,
    pub(crate) random: Random,
    facts: HashMap<usize, Rc<FunctionFacts>>,
}

/// Build a context, run `program` in it and tear it down.
pub(crate) fn run(
    program: &Program,
    limits: &ExecutionLimits,
    seed: u64,
    output: OutputSink,
    interrupt: Arc<AtomicBool>,
) -> WorkerOutcome {
    let mut interpreter = match Interpreter::new(limits, seed, output, interrupt) {
        Ok(interpreter) => interpreter,
        Err(abort) => return outcome_of(abort),
    };
    match interpreter.run_program(program) {
        Ok(()) => WorkerOutcome::Completed,
        Err(abort) => outcome_of(abort),
    }
}

fn outcome_of(abort: Abort) -> WorkerOutcome {
    match abort {
        Abort::Halt(Halt::Interrupted) => WorkerOutcome::Interrupted,
        Abort::Halt(Halt::ResourceExhausted) | Abort::Throw(_) => WorkerOutcome::Exhausted,
    }
}

impl Interpreter {
    pub(crate) fn new(
        limits: &ExecutionLimits,
        seed: u64,
        output: OutputSink,
        interrupt: Arc<AtomicBool>,
    ) -> EvalResult<Self> {
        let mut heap = Heap::new();
        let realm = Realm::bootstrap(&mut heap)?;
        let global = heap.alloc_scope(Scope::new(
            None,
            Some(Frame {
                this: Some(Value::Undefined),
                ..Frame::default()
            }),
        ))?;
        let mut interpreter = Self {
            heap,
            realm,
            global,
            output,
            interrupt,
            max_call_depth: limits.max_call_depth,
            call_depth: 0,
            native_depth: 0,
            random: Random::new(seed),
            facts: HashMap::new(),
        };
        builtins::install(&mut interpreter)?;
        interpreter.heap.set_limit(limits.max_heap_objects);
        Ok(interpreter)
    }

    /// Run a whole program. Uncaught exceptions become an output line.
    pub(crate) fn run_program(&mut self, program: &Program) -> EvalResult<()> {
        let global = self.global.clone();
        let result = self.run_statements(&program.body, &global);
        match result {
            Ok(_) => Ok(()),
            Err(Abort::Throw(value)) => {
                let line = match self.uncaught_message(&value) {
                    Ok(line) => line,
                    Err(Abort::Throw(_)) => "Error: Uncaught exception".to_string(),
                    Err(halt) => return Err(halt),
                };
                self.capture(line)
            }
            Err(halt) => Err(halt),
        }
    }

    fn run_statements(&mut self, body: &[Stmt], scope: &ScopeRef) -> EvalResult<Completion> {
        let facts = self.collect_facts(body);
        {
            let mut scope = scope.borrow_mut();
            for name in &facts.var_names {
                scope.declare_var(name);
            }
        }
        self.declare_block(body, scope)?;
        self.exec_statements(body, scope)
    }

    /// `"Error: " + message` for error-like values, string conversion otherwise.
    fn uncaught_message(&mut self, value: &Value) -> EvalResult<String> {
        let text = match value {
            Value::Object(object) => {
                let message = super::value::lookup(object, "message");
                match message {
                    Some(message) if !matches!(message, Value::Undefined) => {
                        self.to_string(&message)?
                    }
                    _ => self.to_string(value)?,
                }
            }
            other => self.to_string(other)?,
        };
        Ok(format!("Error: {text}"))
    }

    // ----- context services -----------------------------------------------

    /// Poll the host interrupt.
    pub(crate) fn tick(&self) -> EvalResult<()> {
        if self.interrupt.load(Ordering::Relaxed) {
            Err(Abort::Halt(Halt::Interrupted))
        } else {
            Ok(())
        }
    }

    /// Append an output line.
    pub(crate) fn capture(&mut self, line: String) -> EvalResult<()> {
        match self.output.push(line) {
            Ok(()) => Ok(()),
            Err(CaptureError::Sealed) => Err(Abort::Halt(Halt::Interrupted)),
            Err(CaptureError::Full) => Err(Abort::Halt(Halt::ResourceExhausted)),
        }
    }

    pub(crate) fn alloc(&mut self, object: Object) -> EvalResult<ObjectRef> {
        Ok(self.heap.alloc(object)?)
    }

    /// Empty ordinary object inheriting from `Object.prototype`.
    pub(crate) fn new_object(&mut self) -> EvalResult<ObjectRef> {
        let prototype = self.realm.object_prototype.clone();
        self.alloc(Object::new(ObjectKind::Ordinary, Some(prototype)))
    }

    pub(crate) fn new_array(&mut self, elements: Vec<Value>) -> EvalResult<ObjectRef> {
        if elements.len() > super::value::MAX_ARRAY_LENGTH {
            return Err(self.throw(ErrorKind::Range, "Invalid array length"));
        }
        let prototype = self.realm.array_prototype.clone();
        self.alloc(Object::new(ObjectKind::Array(elements), Some(prototype)))
    }

    pub(crate) fn new_scope(&mut self, parent: &ScopeRef, frame: Option<Frame>) -> EvalResult<ScopeRef> {
        Ok(self.heap.alloc_scope(Scope::new(Some(parent.clone()), frame))?)
    }

    /// Reject strings longer than the sandbox allows.
    pub(crate) fn check_string_length(&mut self, length: usize) -> EvalResult<()> {
        if length > MAX_STRING_LENGTH {
            Err(self.throw(ErrorKind::Range, "Invalid string length"))
        } else {
            Ok(())
        }
    }

    /// Build an error object of the given family.
    pub(crate) fn create_error(&mut self, kind: ErrorKind, message: &str) -> EvalResult<ObjectRef> {
        let prototype = self.realm.error_prototype(kind);
        let error = self.alloc(Object::new(ObjectKind::Error, Some(prototype)))?;
        if !message.is_empty() {
            error
                .borrow_mut()
                .define_hidden("message", Value::string(message));
        }
        Ok(error)
    }

    /// An exception to propagate with `Err(...)`.
    pub(crate) fn throw(&mut self, kind: ErrorKind, message: impl AsRef<str>) -> Abort {
        match self.create_error(kind, message.as_ref()) {
            Ok(error) => Abort::Throw(Value::Object(error)),
            Err(abort) => abort,
        }
    }

    pub(crate) fn type_error(&mut self, message: impl AsRef<str>) -> Abort {
        self.throw(ErrorKind::Type, message)
    }

    /// Count one level of call nesting; errors past the configured depth.
    pub(crate) fn enter_call(&mut self) -> EvalResult<()> {
        self.tick()?;
        if self.call_depth >= self.max_call_depth {
            return Err(self.throw(ErrorKind::Range, "Maximum call stack size exceeded"));
        }
        self.call_depth += 1;
        Ok(())
    }

    pub(crate) fn leave_call(&mut self) {
        self.call_depth -= 1;
    }

    /// Count one level of recursion inside a builtin.
    pub(crate) fn enter_native(&mut self) -> EvalResult<()> {
        self.tick()?;
        if self.native_depth >= MAX_NATIVE_DEPTH {
            return Err(self.throw(ErrorKind::Range, "Maximum call stack size exceeded"));
        }
        self.native_depth += 1;
        Ok(())
    }

    pub(crate) fn leave_native(&mut self) {
        self.native_depth -= 1;
    }

    /// Hoisting facts for a function body, cached per definition.
    pub(crate) fn function_facts(&mut self, function: &Arc<Function>) -> Rc<FunctionFacts> {
        let key = Arc::as_ptr(function) as usize;
        if let Some(facts) = self.facts.get(&key) {
            return facts.clone();
        }
        let mut collector = FactCollector::default();
        for param in &function.params {
            if let Some(default) = &param.default {
                collector.visit_expr(default);
            }
        }
        match &function.body {
            crate::syntax::ast::FunctionBody::Block(body) => {
                for stmt in body {
                    collector.visit_stmt(stmt);
                }
            }
            crate::syntax::ast::FunctionBody::Expression(expr) => collector.visit_expr(expr),
        }
        let facts = Rc::new(collector.facts);
        self.facts.insert(key, facts.clone());
        facts
    }

    fn collect_facts(&mut self, body: &[Stmt]) -> FunctionFacts {
        let mut collector = FactCollector::default();
        for stmt in body {
            collector.visit_stmt(stmt);
        }
        collector.facts
    }
}

impl Drop for Interpreter {
    fn drop(&mut self) {
        self.heap.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::parse_program;

    fn run_script(src: &str) -> (WorkerOutcome, Vec<String>) {
        let limits = ExecutionLimits::default();
        let sink = OutputSink::new(limits.max_output_lines, limits.max_output_bytes);
        let program = parse_program(src).unwrap();
        let outcome = run(&program, &limits, 7, sink.clone(), Arc::new(AtomicBool::new(false)));
        (outcome, sink.drain())
    }

    fn logs(src: &str) -> Vec<String> {
        let (outcome, logs) = run_script(src);
        assert_eq!(outcome, WorkerOutcome::Completed, "{logs:?}");
        logs
    }

    #[test]
    fn closures_and_scoping() {
        assert_eq!(
            logs(
                "const fs = []; for (let i = 0; i < 3; i++) fs.push(() => i);
                 print(fs.map(f => f()).join(','));
                 var v = 1; { var v = 2; } print(v);
                 function counter() { let n = 0; return () => ++n; }
                 const c = counter(); c(); print(c());"
            ),
            ["0,1,2", "2", "2"]
        );
    }

    #[test]
    fn dead_zone_and_constants() {
        assert_eq!(
            logs("try { x; let x = 1; } catch (e) { print(e.name, e.message); }"),
            ["ReferenceError Cannot access 'x' before initialization"]
        );
        assert_eq!(
            logs("const k = 1; try { k = 2; } catch (e) { print(e instanceof TypeError); }"),
            ["true"]
        );
        assert_eq!(logs("print(hoisted()); function hoisted() { return 'ok'; }"), ["ok"]);
    }

    #[test]
    fn classes_and_inheritance() {
        assert_eq!(
            logs(
                "class Animal {
                    legs = 4;
                    constructor(name) { this.name = name; }
                    speak() { return this.name + ' makes a sound'; }
                    static create(name) { return new this(name); }
                 }
                 class Dog extends Animal {
                    speak() { return super.speak() + ' (woof)'; }
                 }
                 const d = Dog.create('Rex');
                 print(d.speak(), d.legs, d instanceof Animal, typeof Dog);"
            ),
            ["Rex makes a sound (woof) 4 true function"]
        );
        assert_eq!(
            logs(
                "class E extends Error { constructor(m) { super(m); this.name = 'E'; } }
                 try { throw new E('bad'); } catch (e) { print(e.name, e.message, e instanceof Error); }"
            ),
            ["E bad true"]
        );
    }

    #[test]
    fn uncaught_exceptions_become_output() {
        assert_eq!(logs("print(1); throw new Error('boom'); print(2);"), ["1", "Error: boom"]);
        assert_eq!(logs("throw 'plain';"), ["Error: plain"]);
        assert_eq!(
            logs("require('fs');"),
            ["Error: require is not defined"]
        );
    }

    #[test]
    fn finally_runs_and_overrides() {
        assert_eq!(
            logs(
                "function f() { try { return 'try'; } finally { print('cleanup'); } }
                 print(f());
                 function g() { try { throw 1; } catch (e) { return 'caught ' + e; } finally { } }
                 print(g());"
            ),
            ["cleanup", "try", "caught 1"]
        );
    }

    #[test]
    fn deep_recursion_is_a_range_error() {
        assert_eq!(
            logs("function f(n) { return f(n + 1); } try { f(0); } catch (e) { print(e.message); }"),
            ["Maximum call stack size exceeded"]
        );
    }

    #[test]
    fn heap_ceiling_halts() {
        let limits = ExecutionLimits {
            max_heap_objects: 10_000,
            ..ExecutionLimits::default()
        };
        let sink = OutputSink::new(10, 1024);
        let program = parse_program("const keep = []; while (true) keep.push({});").unwrap();
        let outcome = run(&program, &limits, 1, sink, Arc::new(AtomicBool::new(false)));
        assert_eq!(outcome, WorkerOutcome::Exhausted);
    }

    #[test]
    fn interrupt_is_not_catchable() {
        let sink = OutputSink::new(10, 1024);
        let flag = Arc::new(AtomicBool::new(true));
        let program =
            parse_program("try { while (true) {} } catch (e) { print('caught'); } finally { print('finally'); }")
                .unwrap();
        let outcome = run(&program, &ExecutionLimits::default(), 1, sink.clone(), flag);
        assert_eq!(outcome, WorkerOutcome::Interrupted);
        assert!(sink.is_empty());
    }

    #[test]
    fn random_is_seeded() {
        let first = logs("print(Math.random(), Math.random());");
        assert_eq!(first, logs("print(Math.random(), Math.random());"));
        let mut random = Random::new(3);
        assert!((0..1000).map(|_| random.next_f64()).all(|x| (0.0..1.0).contains(&x)));
    }
}
