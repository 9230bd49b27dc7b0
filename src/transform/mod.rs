//! Deterministic, pure rewrites of a parsed program.
//!
//! Three rules run in a single bottom-up traversal:
//!
//! 1. **instrument_output**: `console.<level>(…)` and `print(…)` calls become
//!    `__capture("<level>", …)`, unless the program binds `console`/`print`
//!    itself.
//! 2. **fold_constants**: unary and arithmetic operators over literal operands
//!    fold to a literal when the result is a finite number, a string or a
//!    boolean.
//! 3. **strip_debugger**: `debugger;` statements are dropped.
//!
//! A program that binds the reserved `__capture` name is rejected with a
//! [`Phase::Transform`] diagnostic. Running the transformer over its own
//! output changes nothing.

pub mod visit;

use crate::syntax::ast::*;
use crate::syntax::number::{format_number, js_pow, parse_number};
use crate::syntax::{Diagnostic, Phase, codegen};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use visit::Visitor;

/// Name of the output hook injected by instrumentation.
pub const CAPTURE_HOOK: &str = "__capture";

/// Console methods that instrumentation rewrites.
pub const OUTPUT_LEVELS: [&str; 5] = ["log", "info", "debug", "warn", "error"];

/// Which rules run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformOptions {
    /// Rewrite output calls to the capture hook.
    pub instrument_output: bool,
    /// Fold literal arithmetic.
    pub fold_constants: bool,
    /// Remove `debugger;` statements.
    pub strip_debugger: bool,
}

impl Default for TransformOptions {
    fn default() -> Self {
        Self {
            instrument_output: true,
            fold_constants: true,
            strip_debugger: true,
        }
    }
}

impl TransformOptions {
    /// All rules off: the output is the input, re-printed.
    pub fn disabled() -> Self {
        Self {
            instrument_output: false,
            fold_constants: false,
            strip_debugger: false,
        }
    }
}

/// A rewrite rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    /// Output calls rewritten to `__capture`.
    InstrumentOutput,
    /// Literal arithmetic folded.
    FoldConstants,
    /// `debugger;` removed.
    StripDebugger,
}

/// Result of [`transform`].
#[derive(Debug, Clone, PartialEq)]
pub struct TransformedProgram {
    /// The rewritten tree.
    pub program: Program,
    /// Source text generated from `program`.
    pub code: String,
    /// Whether any rule modified the tree.
    pub changed: bool,
    /// Rules that fired, in rule order.
    pub applied: Vec<Rule>,
}

/// Rewrite `program` according to `options`.
pub fn transform(
    program: &Program,
    options: &TransformOptions,
) -> Result<TransformedProgram, Diagnostic> {
    let mut bindings = Bindings::default();
    visit::walk_program(&mut bindings, program);
    if let Some(span) = bindings.reserved {
        return Err(Diagnostic::at(
            Phase::Transform,
            format!("Identifier '{CAPTURE_HOOK}' is reserved and cannot be declared or assigned"),
            span,
        ));
    }

    let mut rewriter = Rewriter {
        options: *options,
        instrument_console: !bindings.names.contains("console"),
        instrument_print: !bindings.names.contains("print"),
        applied: Vec::new(),
    };
    let mut output = program.clone();
    rewriter.stmts(&mut output.body);

    let mut applied = rewriter.applied;
    applied.sort();
    applied.dedup();
    let code = codegen::generate(&output);
    Ok(TransformedProgram {
        program: output,
        code,
        changed: !applied.is_empty(),
        applied,
    })
}

#[derive(Default)]
struct Bindings {
    names: HashSet<String>,
    reserved: Option<Span>,
}

impl Visitor for Bindings {
    fn visit_binding(&mut self, name: &str, span: Span) {
        if name == CAPTURE_HOOK && self.reserved.is_none() {
            self.reserved = Some(span);
        }
        self.names.insert(name.to_string());
    }
}

struct Rewriter {
    options: TransformOptions,
    instrument_console: bool,
    instrument_print: bool,
    applied: Vec<Rule>,
}

impl Rewriter {
    fn mark(&mut self, rule: Rule) {
        if !self.applied.contains(&rule) {
            self.applied.push(rule);
        }
    }

    fn stmts(&mut self, stmts: &mut Vec<Stmt>) {
        if self.options.strip_debugger {
            let before = stmts.len();
            stmts.retain(|stmt| !matches!(stmt.kind, StmtKind::Debugger));
            if stmts.len() != before {
                self.mark(Rule::StripDebugger);
            }
        }
        for stmt in stmts {
            self.stmt(stmt);
        }
    }

    fn stmt(&mut self, stmt: &mut Stmt) {
        // A lone `debugger` under `if` or a loop has no list to be removed from.
        if self.options.strip_debugger && matches!(stmt.kind, StmtKind::Debugger) {
            stmt.kind = StmtKind::Empty;
            self.mark(Rule::StripDebugger);
            return;
        }
        match &mut stmt.kind {
            StmtKind::Expression { expression } => self.expr(expression),
            StmtKind::Variable(declaration) => self.declaration(declaration),
            StmtKind::Function(function) => self.function(function),
            StmtKind::Class(class) => self.class(class),
            StmtKind::Return { argument } => {
                if let Some(argument) = argument {
                    self.expr(argument);
                }
            }
            StmtKind::If {
                test,
                consequent,
                alternate,
            } => {
                self.expr(test);
                self.stmt(consequent);
                if let Some(alternate) = alternate {
                    self.stmt(alternate);
                }
            }
            StmtKind::Block { body } => self.stmts(body),
            StmtKind::While { test, body } | StmtKind::DoWhile { body, test } => {
                self.expr(test);
                self.stmt(body);
            }
            StmtKind::For {
                init,
                test,
                update,
                body,
            } => {
                match init {
                    Some(ForInit::Declaration(declaration)) => self.declaration(declaration),
                    Some(ForInit::Expression(expr)) => self.expr(expr),
                    None => {}
                }
                if let Some(test) = test {
                    self.expr(test);
                }
                if let Some(update) = update {
                    self.expr(update);
                }
                self.stmt(body);
            }
            StmtKind::ForIn { left, right, body } | StmtKind::ForOf { left, right, body } => {
                match left {
                    ForHead::Declaration { id, .. } => self.pattern(id),
                    ForHead::Pattern(pattern) => self.pattern(pattern),
                }
                self.expr(right);
                self.stmt(body);
            }
            StmtKind::Throw { argument } => self.expr(argument),
            StmtKind::Try {
                block,
                handler,
                finalizer,
            } => {
                self.stmts(block);
                if let Some(handler) = handler {
                    if let Some(param) = &mut handler.param {
                        self.pattern(param);
                    }
                    self.stmts(&mut handler.body);
                }
                if let Some(finalizer) = finalizer {
                    self.stmts(finalizer);
                }
            }
            StmtKind::Switch {
                discriminant,
                cases,
            } => {
                self.expr(discriminant);
                for case in cases {
                    if let Some(test) = &mut case.test {
                        self.expr(test);
                    }
                    self.stmts(&mut case.consequent);
                }
            }
            StmtKind::Break
            | StmtKind::Continue
            | StmtKind::Empty
            | StmtKind::Debugger => {}
        }
    }

    fn declaration(&mut self, declaration: &mut VariableDeclaration) {
        for declarator in &mut declaration.declarations {
            self.pattern(&mut declarator.id);
            if let Some(init) = &mut declarator.init {
                self.expr(init);
            }
        }
    }

    fn function(&mut self, function: &mut Arc<Function>) {
        let function = Arc::make_mut(function);
        for param in &mut function.params {
            self.pattern(&mut param.pattern);
            if let Some(default) = &mut param.default {
                self.expr(default);
            }
        }
        match &mut function.body {
            FunctionBody::Block(body) => self.stmts(body),
            FunctionBody::Expression(expr) => self.expr(expr),
        }
    }

    fn class(&mut self, class: &mut Arc<Class>) {
        let class = Arc::make_mut(class);
        if let Some(super_class) = &mut class.super_class {
            self.expr(super_class);
        }
        if let Some(constructor) = &mut class.constructor {
            self.function(constructor);
        }
        for member in &mut class.members {
            self.property_key(&mut member.key);
            match &mut member.value {
                ClassMemberValue::Method(method) => self.function(method),
                ClassMemberValue::Field(Some(value)) => self.expr(value),
                ClassMemberValue::Field(None) => {}
            }
        }
    }

    fn property_key(&mut self, key: &mut PropertyKey) {
        if let PropertyKey::Computed(expr) = key {
            self.expr(expr);
        }
    }

    fn pattern(&mut self, pattern: &mut Pattern) {
        match &mut pattern.kind {
            PatternKind::Identifier { .. } => {}
            PatternKind::Expression { expression } => self.expr(expression),
            PatternKind::Array { elements, rest } => {
                for element in elements.iter_mut().flatten() {
                    self.pattern(&mut element.target);
                    if let Some(default) = &mut element.default {
                        self.expr(default);
                    }
                }
                if let Some(rest) = rest {
                    self.pattern(rest);
                }
            }
            PatternKind::Object { properties, rest } => {
                for property in properties {
                    self.property_key(&mut property.key);
                    self.pattern(&mut property.value);
                    if let Some(default) = &mut property.default {
                        self.expr(default);
                    }
                }
                if let Some(rest) = rest {
                    self.pattern(rest);
                }
            }
        }
    }

    fn expr(&mut self, expr: &mut Expr) {
        self.children(expr);
        if self.options.instrument_output {
            if let Some(level) = self.output_level(expr) {
                self.instrument(expr, level);
                self.mark(Rule::InstrumentOutput);
            }
        }
        if self.options.fold_constants {
            if let Some(folded) = fold(expr) {
                *expr = folded;
                self.mark(Rule::FoldConstants);
            }
        }
    }

    fn children(&mut self, expr: &mut Expr) {
        match &mut expr.kind {
            ExprKind::Number { .. }
            | ExprKind::String { .. }
            | ExprKind::Boolean { .. }
            | ExprKind::Null
            | ExprKind::Identifier { .. }
            | ExprKind::This => {}
            ExprKind::Template { expressions, .. } => {
                for expr in expressions {
                    self.expr(expr);
                }
            }
            ExprKind::Array { elements } => {
                for element in elements.iter_mut().flatten() {
                    self.expr(element);
                }
            }
            ExprKind::Object { properties } => {
                for property in properties {
                    match property {
                        Property::KeyValue { key, value, .. } => {
                            self.property_key(key);
                            self.expr(value);
                        }
                        Property::Spread { argument } => self.expr(argument),
                    }
                }
            }
            ExprKind::Function(function) | ExprKind::Arrow(function) => self.function(function),
            ExprKind::Class(class) => self.class(class),
            ExprKind::Unary { argument, .. }
            | ExprKind::Spread { argument }
            | ExprKind::Update { argument, .. } => self.expr(argument),
            ExprKind::Binary { left, right, .. } | ExprKind::Logical { left, right, .. } => {
                self.expr(left);
                self.expr(right);
            }
            ExprKind::Assign { target, value, .. } => {
                self.pattern(target);
                self.expr(value);
            }
            ExprKind::Conditional {
                test,
                consequent,
                alternate,
            } => {
                self.expr(test);
                self.expr(consequent);
                self.expr(alternate);
            }
            ExprKind::Call {
                callee, arguments, ..
            }
            | ExprKind::New { callee, arguments } => {
                self.expr(callee);
                for argument in arguments {
                    self.expr(argument);
                }
            }
            ExprKind::SuperCall { arguments } => {
                for argument in arguments {
                    self.expr(argument);
                }
            }
            ExprKind::Member {
                object, property, ..
            } => {
                self.expr(object);
                if let MemberProperty::Computed(property) = property {
                    self.expr(property);
                }
            }
            ExprKind::SuperMember { property } => {
                if let MemberProperty::Computed(property) = property {
                    self.expr(property);
                }
            }
            ExprKind::Chain { expression } => self.expr(expression),
            ExprKind::Sequence { expressions } => {
                for expr in expressions {
                    self.expr(expr);
                }
            }
        }
    }

    /// Output level of a call that instrumentation should rewrite.
    fn output_level(&self, expr: &Expr) -> Option<&'static str> {
        let ExprKind::Call {
            callee,
            optional: false,
            ..
        } = &expr.kind
        else {
            return None;
        };
        match &callee.kind {
            ExprKind::Identifier { name } if name == "print" && self.instrument_print => {
                Some("log")
            }
            ExprKind::Member {
                object,
                property: MemberProperty::Named(method),
                optional: false,
            } if self.instrument_console && object.as_identifier() == Some("console") => {
                OUTPUT_LEVELS.iter().copied().find(|level| level == method)
            }
            _ => None,
        }
    }

    fn instrument(&self, expr: &mut Expr, level: &'static str) {
        let ExprKind::Call {
            callee, arguments, ..
        } = &mut expr.kind
        else {
            return;
        };
        let span = callee.span;
        **callee = Expr::new(
            ExprKind::Identifier {
                name: CAPTURE_HOOK.to_string(),
            },
            span,
        );
        arguments.insert(
            0,
            Expr::new(
                ExprKind::String {
                    value: level.to_string(),
                },
                span,
            ),
        );
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Literal {
    Number(f64),
    String(String),
    Boolean(bool),
}

impl Literal {
    fn of(expr: &Expr) -> Option<Literal> {
        match &expr.kind {
            ExprKind::Number { value } => Some(Literal::Number(*value)),
            ExprKind::String { value } => Some(Literal::String(value.clone())),
            ExprKind::Boolean { value } => Some(Literal::Boolean(*value)),
            ExprKind::Unary {
                operator: UnaryOp::Minus,
                argument,
            } => match argument.kind {
                ExprKind::Number { value } if value != 0.0 => Some(Literal::Number(-value)),
                _ => None,
            },
            _ => None,
        }
    }

    fn to_number(&self) -> f64 {
        match self {
            Literal::Number(value) => *value,
            Literal::String(value) => parse_number(value),
            Literal::Boolean(value) => f64::from(u8::from(*value)),
        }
    }

    fn to_display(&self) -> String {
        match self {
            Literal::Number(value) => format_number(*value),
            Literal::String(value) => value.clone(),
            Literal::Boolean(value) => value.to_string(),
        }
    }

    fn truthy(&self) -> bool {
        match self {
            Literal::Number(value) => *value != 0.0 && !value.is_nan(),
            Literal::String(value) => !value.is_empty(),
            Literal::Boolean(value) => *value,
        }
    }
}

/// Fold `expr` if its operands are literals; `None` when nothing changes.
fn fold(expr: &Expr) -> Option<Expr> {
    let span = expr.span;
    let result = match &expr.kind {
        ExprKind::Unary { operator, argument } => {
            // `-<number>` is how negative literals are spelled.
            if *operator == UnaryOp::Minus && matches!(argument.kind, ExprKind::Number { .. }) {
                return None;
            }
            let operand = Literal::of(argument)?;
            match operator {
                UnaryOp::Minus => Literal::Number(-operand.to_number()),
                UnaryOp::Plus => Literal::Number(operand.to_number()),
                UnaryOp::Not => Literal::Boolean(!operand.truthy()),
                _ => return None,
            }
        }
        ExprKind::Binary {
            operator,
            left,
            right,
        } => {
            let left = Literal::of(left)?;
            let right = Literal::of(right)?;
            match operator {
                BinaryOp::Add => {
                    if matches!(left, Literal::String(_)) || matches!(right, Literal::String(_)) {
                        Literal::String(left.to_display() + &right.to_display())
                    } else {
                        Literal::Number(left.to_number() + right.to_number())
                    }
                }
                BinaryOp::Sub => Literal::Number(left.to_number() - right.to_number()),
                BinaryOp::Mul => Literal::Number(left.to_number() * right.to_number()),
                BinaryOp::Div => Literal::Number(left.to_number() / right.to_number()),
                BinaryOp::Rem => Literal::Number(left.to_number() % right.to_number()),
                BinaryOp::Exp => Literal::Number(js_pow(left.to_number(), right.to_number())),
                _ => return None,
            }
        }
        _ => return None,
    };

    let kind = match result {
        Literal::Number(value) if !value.is_finite() => return None,
        Literal::Number(value) if value == 0.0 && value.is_sign_negative() => return None,
        Literal::Number(value) if value < 0.0 => ExprKind::Unary {
            operator: UnaryOp::Minus,
            argument: Box::new(Expr::new(ExprKind::Number { value: -value }, span)),
        },
        Literal::Number(value) => ExprKind::Number { value },
        Literal::String(value) => ExprKind::String { value },
        Literal::Boolean(value) => ExprKind::Boolean { value },
    };
    Some(Expr::new(kind, span))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::parse_program;

    fn run(src: &str) -> TransformedProgram {
        transform(&parse_program(src).unwrap(), &TransformOptions::default()).unwrap()
    }

    #[test]
    fn output_calls_are_instrumented() {
        let out = run("console.log('a', 1); console.warn(x); print(y); console.table(z);");
        assert_eq!(
            out.code,
            "__capture('log', 'a', 1);\n__capture('warn', x);\n__capture('log', y);\nconsole.table(z);\n"
        );
        assert_eq!(out.applied, vec![Rule::InstrumentOutput]);
    }

    #[test]
    fn user_bindings_disable_instrumentation() {
        let out = run("function print(x) { return x; } print(1); console.log(2);");
        assert!(out.code.contains("print(1)"));
        assert!(out.code.contains("__capture('log', 2)"));

        let out = run("const console = { log() {} }; console.log(1);");
        assert!(out.code.contains("console.log(1)"));
        assert!(!out.changed);
    }

    #[test]
    fn constants_fold_bottom_up() {
        let out = run("x = 1 + 2 * 3; y = 'a' + 1; z = !0; w = 2 - 5; v = 1 / 0; u = -0 * 1;");
        assert_eq!(
            out.code,
            "x = 7;\ny = 'a1';\nz = true;\nw = -3;\nv = 1 / 0;\nu = -0 * 1;\n"
        );
        assert_eq!(out.applied, vec![Rule::FoldConstants]);
    }

    #[test]
    fn debugger_statements_are_removed() {
        let out = run("debugger; if (x) debugger; f();");
        assert_eq!(out.code, "if (x)\n    ;\nf();\n");
        assert_eq!(out.applied, vec![Rule::StripDebugger]);
    }

    #[test]
    fn reserved_hook_cannot_be_bound() {
        for src in [
            "let __capture = 1;",
            "function f(__capture) {}",
            "__capture = print;",
            "function __capture() {}",
            "try {} catch (__capture) {}",
        ] {
            let err = transform(&parse_program(src).unwrap(), &TransformOptions::default())
                .unwrap_err();
            assert_eq!(err.phase, Phase::Transform, "{src}");
        }
        assert!(
            transform(
                &parse_program("__capture('log', 1);").unwrap(),
                &TransformOptions::default()
            )
            .is_ok()
        );
    }

    #[test]
    fn second_pass_is_a_no_op() {
        let first = run("console.log(-(2 + 3), 2 ** -1, 'x' + 'y'); debugger;");
        let second = transform(&first.program, &TransformOptions::default()).unwrap();
        assert!(!second.changed);
        assert_eq!(second.code, first.code);
    }

    #[test]
    fn disabled_options_only_reprint() {
        let program = parse_program("console.log(1 + 1); debugger;").unwrap();
        let out = transform(&program, &TransformOptions::disabled()).unwrap();
        assert!(!out.changed);
        assert_eq!(out.code, "console.log(1 + 1);\ndebugger;\n");
    }
}
