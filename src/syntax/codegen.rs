//! Print a syntax tree back to source text.
//!
//! Output is normalized (4-space indentation, single-quoted strings, minimal
//! parentheses derived from operator precedence) and parses back to the same
//! tree.

use super::ast::*;
use super::number::format_number;

const INDENT: &str = "    ";

/// Render a program as source text.
pub fn generate(program: &Program) -> String {
    let mut generator = Generator::default();
    for stmt in &program.body {
        generator.statement(stmt);
    }
    generator.out
}

/// Render a single expression (used in diagnostics and tests).
pub fn generate_expression(expr: &Expr) -> String {
    let mut generator = Generator::default();
    generator.expr(expr, 0);
    generator.out
}

mod precedence {
    pub const SEQUENCE: u8 = 0;
    pub const ASSIGN: u8 = 1;
    pub const CONDITIONAL: u8 = 2;
    pub const NULLISH: u8 = 3;
    pub const UNARY: u8 = 15;
    pub const POSTFIX: u8 = 16;
    pub const LHS: u8 = 17;
    pub const CALL: u8 = 18;
    pub const PRIMARY: u8 = 19;
}

#[derive(Default)]
struct Generator {
    out: String,
    indent: usize,
    no_in: bool,
}

impl Generator {
    fn line_start(&mut self) {
        for _ in 0..self.indent {
            self.out.push_str(INDENT);
        }
    }

    fn push(&mut self, text: &str) {
        self.out.push_str(text);
    }

    // ----- statements -----------------------------------------------------

    fn statement(&mut self, stmt: &Stmt) {
        self.line_start();
        self.statement_inline(stmt);
        self.out.push('\n');
    }

    /// Print a statement starting at the current position, without a trailing newline.
    fn statement_inline(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Expression { expression } => {
                let mark = self.out.len();
                self.expr(expression, precedence::SEQUENCE);
                let printed = &self.out[mark..];
                let ambiguous = printed.starts_with('{')
                    || starts_with_word(printed, "function")
                    || starts_with_word(printed, "class");
                if ambiguous {
                    self.out.insert(mark, '(');
                    self.out.push(')');
                }
                self.push(";");
            }
            StmtKind::Variable(declaration) => {
                self.variable_declaration(declaration);
                self.push(";");
            }
            StmtKind::Function(function) => self.function(function, "function "),
            StmtKind::Class(class) => self.class(class),
            StmtKind::Return { argument } => {
                self.push("return");
                if let Some(argument) = argument {
                    self.push(" ");
                    self.expr(argument, precedence::SEQUENCE);
                }
                self.push(";");
            }
            StmtKind::If {
                test,
                consequent,
                alternate,
            } => {
                self.push("if (");
                self.expr(test, precedence::SEQUENCE);
                self.push(")");
                match alternate {
                    Some(alternate) => {
                        self.force_block(consequent);
                        self.push(" else");
                        if matches!(alternate.kind, StmtKind::If { .. }) {
                            self.push(" ");
                            self.statement_inline(alternate);
                        } else {
                            self.body(alternate);
                        }
                    }
                    None => self.body(consequent),
                }
            }
            StmtKind::Block { body } => self.block(body),
            StmtKind::While { test, body } => {
                self.push("while (");
                self.expr(test, precedence::SEQUENCE);
                self.push(")");
                self.body(body);
            }
            StmtKind::DoWhile { body, test } => {
                self.push("do");
                self.body(body);
                if matches!(body.kind, StmtKind::Block { .. }) {
                    self.push(" ");
                } else {
                    self.push("\n");
                    self.line_start();
                }
                self.push("while (");
                self.expr(test, precedence::SEQUENCE);
                self.push(");");
            }
            StmtKind::For {
                init,
                test,
                update,
                body,
            } => {
                self.push("for (");
                self.no_in = true;
                match init {
                    Some(ForInit::Declaration(declaration)) => self.variable_declaration(declaration),
                    Some(ForInit::Expression(expr)) => self.expr(expr, precedence::SEQUENCE),
                    None => {}
                }
                self.no_in = false;
                self.push(";");
                if let Some(test) = test {
                    self.push(" ");
                    self.expr(test, precedence::SEQUENCE);
                }
                self.push(";");
                if let Some(update) = update {
                    self.push(" ");
                    self.expr(update, precedence::SEQUENCE);
                }
                self.push(")");
                self.body(body);
            }
            StmtKind::ForIn { left, right, body } => {
                self.push("for (");
                self.for_head(left);
                self.push(" in ");
                self.expr(right, precedence::SEQUENCE);
                self.push(")");
                self.body(body);
            }
            StmtKind::ForOf { left, right, body } => {
                self.push("for (");
                self.for_head(left);
                self.push(" of ");
                self.expr(right, precedence::ASSIGN);
                self.push(")");
                self.body(body);
            }
            StmtKind::Break => self.push("break;"),
            StmtKind::Continue => self.push("continue;"),
            StmtKind::Throw { argument } => {
                self.push("throw ");
                self.expr(argument, precedence::SEQUENCE);
                self.push(";");
            }
            StmtKind::Try {
                block,
                handler,
                finalizer,
            } => {
                self.push("try ");
                self.block(block);
                if let Some(handler) = handler {
                    self.push(" catch ");
                    if let Some(param) = &handler.param {
                        self.push("(");
                        self.pattern(param);
                        self.push(") ");
                    }
                    self.block(&handler.body);
                }
                if let Some(finalizer) = finalizer {
                    self.push(" finally ");
                    self.block(finalizer);
                }
            }
            StmtKind::Switch {
                discriminant,
                cases,
            } => {
                self.push("switch (");
                self.expr(discriminant, precedence::SEQUENCE);
                self.push(") {\n");
                self.indent += 1;
                for case in cases {
                    self.line_start();
                    match &case.test {
                        Some(test) => {
                            self.push("case ");
                            self.expr(test, precedence::SEQUENCE);
                            self.push(":\n");
                        }
                        None => self.push("default:\n"),
                    }
                    self.indent += 1;
                    for stmt in &case.consequent {
                        self.statement(stmt);
                    }
                    self.indent -= 1;
                }
                self.indent -= 1;
                self.line_start();
                self.push("}");
            }
            StmtKind::Empty => self.push(";"),
            StmtKind::Debugger => self.push("debugger;"),
        }
    }

    /// Body of a compound statement: blocks stay on the same line.
    fn body(&mut self, stmt: &Stmt) {
        if matches!(stmt.kind, StmtKind::Block { .. }) {
            self.push(" ");
            self.statement_inline(stmt);
        } else {
            self.push("\n");
            self.indent += 1;
            self.line_start();
            self.statement_inline(stmt);
            self.indent -= 1;
        }
    }

    /// `if` with an `else`: a bare consequent is braced so the `else` binds here.
    fn force_block(&mut self, stmt: &Stmt) {
        self.push(" ");
        match &stmt.kind {
            StmtKind::Block { body } => self.block(body),
            _ => self.block(std::slice::from_ref(stmt)),
        }
    }

    fn block(&mut self, body: &[Stmt]) {
        if body.is_empty() {
            self.push("{}");
            return;
        }
        self.push("{\n");
        self.indent += 1;
        for stmt in body {
            self.statement(stmt);
        }
        self.indent -= 1;
        self.line_start();
        self.push("}");
    }

    fn for_head(&mut self, head: &ForHead) {
        match head {
            ForHead::Declaration { kind, id } => {
                self.push(kind.as_str());
                self.push(" ");
                self.pattern(id);
            }
            ForHead::Pattern(pattern) => self.pattern(pattern),
        }
    }

    fn variable_declaration(&mut self, declaration: &VariableDeclaration) {
        self.push(declaration.kind.as_str());
        self.push(" ");
        for (index, declarator) in declaration.declarations.iter().enumerate() {
            if index > 0 {
                self.push(", ");
            }
            self.pattern(&declarator.id);
            if let Some(init) = &declarator.init {
                self.push(" = ");
                self.expr(init, precedence::ASSIGN);
            }
        }
    }

    // ----- functions and classes -----------------------------------------

    fn function(&mut self, function: &Function, prefix: &str) {
        self.push(prefix);
        if let Some(id) = &function.id {
            self.push(id);
        }
        self.params(&function.params);
        self.push(" ");
        self.function_body(&function.body);
    }

    fn params(&mut self, params: &[Param]) {
        self.push("(");
        for (index, param) in params.iter().enumerate() {
            if index > 0 {
                self.push(", ");
            }
            if param.rest {
                self.push("...");
            }
            self.pattern(&param.pattern);
            if let Some(default) = &param.default {
                self.push(" = ");
                self.expr(default, precedence::ASSIGN);
            }
        }
        self.push(")");
    }

    fn function_body(&mut self, body: &FunctionBody) {
        let saved = std::mem::replace(&mut self.no_in, false);
        match body {
            FunctionBody::Block(body) => self.block(body),
            FunctionBody::Expression(expr) => {
                let mark = self.out.len();
                self.expr(expr, precedence::ASSIGN);
                if self.out[mark..].starts_with('{') {
                    self.out.insert(mark, '(');
                    self.out.push(')');
                }
            }
        }
        self.no_in = saved;
    }

    fn class(&mut self, class: &Class) {
        self.push("class");
        if let Some(id) = &class.id {
            self.push(" ");
            self.push(id);
        }
        if let Some(super_class) = &class.super_class {
            self.push(" extends ");
            self.expr(super_class, precedence::CALL);
        }
        if class.constructor.is_none() && class.members.is_empty() {
            self.push(" {}");
            return;
        }
        self.push(" {\n");
        self.indent += 1;
        if let Some(constructor) = &class.constructor {
            self.line_start();
            self.push("constructor");
            self.params(&constructor.params);
            self.push(" ");
            self.function_body(&constructor.body);
            self.push("\n");
        }
        for member in &class.members {
            self.line_start();
            if member.is_static {
                self.push("static ");
            }
            self.property_key(&member.key);
            match &member.value {
                ClassMemberValue::Method(method) => {
                    self.params(&method.params);
                    self.push(" ");
                    self.function_body(&method.body);
                }
                ClassMemberValue::Field(value) => {
                    if let Some(value) = value {
                        self.push(" = ");
                        self.expr(value, precedence::ASSIGN);
                    }
                    self.push(";");
                }
            }
            self.push("\n");
        }
        self.indent -= 1;
        self.line_start();
        self.push("}");
    }

    fn property_key(&mut self, key: &PropertyKey) {
        match key {
            PropertyKey::Identifier(name) => self.push(name),
            PropertyKey::String(value) => self.string_literal(value),
            PropertyKey::Number(value) => self.push(&format_number(*value)),
            PropertyKey::Computed(expr) => {
                self.push("[");
                self.expr(expr, precedence::ASSIGN);
                self.push("]");
            }
        }
    }

    // ----- patterns -------------------------------------------------------

    fn pattern(&mut self, pattern: &Pattern) {
        match &pattern.kind {
            PatternKind::Identifier { name } => self.push(name),
            PatternKind::Expression { expression } => self.expr(expression, precedence::LHS),
            PatternKind::Array { elements, rest } => {
                self.push("[");
                for (index, element) in elements.iter().enumerate() {
                    if index > 0 {
                        self.push(", ");
                    }
                    if let Some(element) = element {
                        self.pattern(&element.target);
                        self.default_value(element.default.as_ref());
                    }
                }
                if let Some(rest) = rest {
                    if !elements.is_empty() {
                        self.push(", ");
                    }
                    self.push("...");
                    self.pattern(rest);
                } else if matches!(elements.last(), Some(None)) {
                    self.push(",");
                }
                self.push("]");
            }
            PatternKind::Object { properties, rest } => {
                if properties.is_empty() && rest.is_none() {
                    self.push("{}");
                    return;
                }
                self.push("{ ");
                for (index, property) in properties.iter().enumerate() {
                    if index > 0 {
                        self.push(", ");
                    }
                    let shorthand = property.shorthand
                        && matches!(
                            (&property.key, &property.value.kind),
                            (PropertyKey::Identifier(key), PatternKind::Identifier { name }) if key == name
                        );
                    if !shorthand {
                        self.property_key(&property.key);
                        self.push(": ");
                    }
                    self.pattern(&property.value);
                    self.default_value(property.default.as_ref());
                }
                if let Some(rest) = rest {
                    if !properties.is_empty() {
                        self.push(", ");
                    }
                    self.push("...");
                    self.pattern(rest);
                }
                self.push(" }");
            }
        }
    }

    fn default_value(&mut self, default: Option<&Expr>) {
        if let Some(default) = default {
            self.push(" = ");
            self.expr(default, precedence::ASSIGN);
        }
    }

    // ----- expressions ----------------------------------------------------

    fn expr(&mut self, expr: &Expr, min_precedence: u8) {
        let wrap = expr_precedence(expr) < min_precedence;
        if wrap {
            self.push("(");
        }
        let saved = if wrap {
            std::mem::replace(&mut self.no_in, false)
        } else {
            self.no_in
        };
        self.expr_inner(expr);
        self.no_in = saved;
        if wrap {
            self.push(")");
        }
    }

    fn expr_inner(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::Number { value } => {
                if value.is_sign_negative() {
                    self.push("(");
                    self.push(&format_number(*value));
                    self.push(")");
                } else {
                    self.push(&format_number(*value));
                }
            }
            ExprKind::String { value } => self.string_literal(value),
            ExprKind::Boolean { value } => self.push(if *value { "true" } else { "false" }),
            ExprKind::Null => self.push("null"),
            ExprKind::Template {
                quasis,
                expressions,
            } => {
                self.push("`");
                for (index, quasi) in quasis.iter().enumerate() {
                    self.template_chunk(quasi);
                    if let Some(expr) = expressions.get(index) {
                        self.push("${");
                        let saved = std::mem::replace(&mut self.no_in, false);
                        self.expr(expr, precedence::SEQUENCE);
                        self.no_in = saved;
                        self.push("}");
                    }
                }
                self.push("`");
            }
            ExprKind::Identifier { name } => self.push(name),
            ExprKind::This => self.push("this"),
            ExprKind::Array { elements } => {
                self.push("[");
                for (index, element) in elements.iter().enumerate() {
                    if index > 0 {
                        self.push(", ");
                    }
                    if let Some(element) = element {
                        self.expr(element, precedence::ASSIGN);
                    }
                }
                if matches!(elements.last(), Some(None)) {
                    self.push(",");
                }
                self.push("]");
            }
            ExprKind::Object { properties } => self.object_literal(properties),
            ExprKind::Function(function) => self.function(function, "function "),
            ExprKind::Arrow(function) => {
                self.params(&function.params);
                self.push(" => ");
                self.function_body(&function.body);
            }
            ExprKind::Class(class) => self.class(class),
            ExprKind::Unary { operator, argument } => {
                let symbol = operator.as_str();
                self.push(symbol);
                let is_word = symbol.chars().all(|c| c.is_ascii_alphabetic());
                if is_word {
                    self.push(" ");
                }
                let mark = self.out.len();
                self.expr(argument, precedence::UNARY);
                if matches!(operator, UnaryOp::Minus | UnaryOp::Plus)
                    && self.out[mark..].starts_with(symbol)
                {
                    self.out.insert(mark, ' ');
                }
            }
            ExprKind::Update {
                operator,
                prefix,
                argument,
            } => {
                if *prefix {
                    self.push(operator.as_str());
                    self.expr(argument, precedence::UNARY);
                } else {
                    self.expr(argument, precedence::LHS);
                    self.push(operator.as_str());
                }
            }
            ExprKind::Binary {
                operator,
                left,
                right,
            } => {
                let own = binary_precedence(*operator);
                let wrap = *operator == BinaryOp::In && self.no_in;
                if wrap {
                    self.push("(");
                }
                let (left_min, right_min) = if *operator == BinaryOp::Exp {
                    (precedence::POSTFIX, own)
                } else {
                    (own, own + 1)
                };
                self.expr(left, left_min);
                self.push(" ");
                self.push(operator.as_str());
                self.push(" ");
                self.expr(right, right_min);
                if wrap {
                    self.push(")");
                }
            }
            ExprKind::Logical {
                operator,
                left,
                right,
            } => {
                let own = logical_precedence(*operator);
                // `??` cannot be mixed with `||`/`&&` without parentheses.
                let mixes = |e: &Expr| match (&e.kind, operator) {
                    (ExprKind::Logical { operator: inner, .. }, LogicalOp::Nullish) => {
                        *inner != LogicalOp::Nullish
                    }
                    (ExprKind::Logical { operator: LogicalOp::Nullish, .. }, _) => true,
                    _ => false,
                };
                let left_min = if mixes(left) { precedence::PRIMARY } else { own };
                let right_min = if mixes(right) { precedence::PRIMARY } else { own + 1 };
                self.expr(left, left_min);
                self.push(" ");
                self.push(operator.as_str());
                self.push(" ");
                self.expr(right, right_min);
            }
            ExprKind::Assign {
                operator,
                target,
                value,
            } => {
                self.pattern(target);
                self.push(" ");
                self.push(operator.as_str());
                self.push(" ");
                self.expr(value, precedence::ASSIGN);
            }
            ExprKind::Conditional {
                test,
                consequent,
                alternate,
            } => {
                self.expr(test, precedence::NULLISH);
                self.push(" ? ");
                let saved = std::mem::replace(&mut self.no_in, false);
                self.expr(consequent, precedence::ASSIGN);
                self.no_in = saved;
                self.push(" : ");
                self.expr(alternate, precedence::ASSIGN);
            }
            ExprKind::Call {
                callee,
                arguments,
                optional,
            } => {
                self.callee(callee);
                if *optional {
                    self.push("?.");
                }
                self.arguments(arguments);
            }
            ExprKind::New { callee, arguments } => {
                self.push("new ");
                if contains_call(callee) || matches!(callee.kind, ExprKind::Chain { .. }) {
                    self.push("(");
                    self.expr(callee, precedence::SEQUENCE);
                    self.push(")");
                } else {
                    self.expr(callee, precedence::CALL);
                }
                self.arguments(arguments);
            }
            ExprKind::Member {
                object,
                property,
                optional,
            } => {
                let literal_object = matches!(object.kind, ExprKind::Number { .. });
                if literal_object {
                    self.push("(");
                    self.expr(object, precedence::SEQUENCE);
                    self.push(")");
                } else {
                    self.callee(object);
                }
                self.member_property(property, *optional);
            }
            ExprKind::SuperCall { arguments } => {
                self.push("super");
                self.arguments(arguments);
            }
            ExprKind::SuperMember { property } => {
                self.push("super");
                self.member_property(property, false);
            }
            ExprKind::Chain { expression } => self.expr_inner(expression),
            ExprKind::Sequence { expressions } => {
                for (index, expr) in expressions.iter().enumerate() {
                    if index > 0 {
                        self.push(", ");
                    }
                    self.expr(expr, precedence::ASSIGN);
                }
            }
            ExprKind::Spread { argument } => {
                self.push("...");
                self.expr(argument, precedence::ASSIGN);
            }
        }
    }

    /// Object of a member access or callee of a call.
    fn callee(&mut self, expr: &Expr) {
        if matches!(expr.kind, ExprKind::Chain { .. }) {
            self.push("(");
            self.expr(expr, precedence::SEQUENCE);
            self.push(")");
        } else {
            self.expr(expr, precedence::CALL);
        }
    }

    fn member_property(&mut self, property: &MemberProperty, optional: bool) {
        match property {
            MemberProperty::Named(name) => {
                self.push(if optional { "?." } else { "." });
                self.push(name);
            }
            MemberProperty::Computed(expr) => {
                if optional {
                    self.push("?.");
                }
                self.push("[");
                let saved = std::mem::replace(&mut self.no_in, false);
                self.expr(expr, precedence::SEQUENCE);
                self.no_in = saved;
                self.push("]");
            }
        }
    }

    fn arguments(&mut self, arguments: &[Expr]) {
        let saved = std::mem::replace(&mut self.no_in, false);
        self.push("(");
        for (index, argument) in arguments.iter().enumerate() {
            if index > 0 {
                self.push(", ");
            }
            self.expr(argument, precedence::ASSIGN);
        }
        self.push(")");
        self.no_in = saved;
    }

    fn object_literal(&mut self, properties: &[Property]) {
        if properties.is_empty() {
            self.push("{}");
            return;
        }
        let saved = std::mem::replace(&mut self.no_in, false);
        self.push("{ ");
        for (index, property) in properties.iter().enumerate() {
            if index > 0 {
                self.push(", ");
            }
            match property {
                Property::Spread { argument } => {
                    self.push("...");
                    self.expr(argument, precedence::ASSIGN);
                }
                Property::KeyValue {
                    key,
                    value,
                    shorthand,
                    method,
                } => {
                    if *method {
                        if let ExprKind::Function(function) = &value.kind {
                            self.property_key(key);
                            self.params(&function.params);
                            self.push(" ");
                            self.function_body(&function.body);
                            continue;
                        }
                    }
                    let is_shorthand = *shorthand
                        && matches!(
                            (key, &value.kind),
                            (PropertyKey::Identifier(key), ExprKind::Identifier { name }) if key == name
                        );
                    if is_shorthand {
                        self.expr(value, precedence::ASSIGN);
                    } else {
                        self.property_key(key);
                        self.push(": ");
                        self.expr(value, precedence::ASSIGN);
                    }
                }
            }
        }
        self.push(" }");
        self.no_in = saved;
    }

    fn string_literal(&mut self, value: &str) {
        self.out.push('\'');
        let mut chars = value.chars().peekable();
        while let Some(ch) = chars.next() {
            match ch {
                '\'' => self.push("\\'"),
                '\\' => self.push("\\\\"),
                '\n' => self.push("\\n"),
                '\r' => self.push("\\r"),
                '\t' => self.push("\\t"),
                '\u{0008}' => self.push("\\b"),
                '\u{000C}' => self.push("\\f"),
                '\u{000B}' => self.push("\\v"),
                '\0' if !chars.peek().is_some_and(|c| c.is_ascii_digit()) => self.push("\\0"),
                '\u{2028}' => self.push("\\u2028"),
                '\u{2029}' => self.push("\\u2029"),
                c if (c as u32) < 0x20 || c == '\u{7F}' => {
                    self.push(&format!("\\x{:02X}", c as u32));
                }
                c => self.out.push(c),
            }
        }
        self.out.push('\'');
    }

    fn template_chunk(&mut self, text: &str) {
        let mut chars = text.chars().peekable();
        while let Some(ch) = chars.next() {
            match ch {
                '`' => self.push("\\`"),
                '\\' => self.push("\\\\"),
                '\r' => self.push("\\r"),
                '$' if chars.peek() == Some(&'{') => self.push("\\$"),
                c => self.out.push(c),
            }
        }
    }
}

fn starts_with_word(text: &str, word: &str) -> bool {
    text.strip_prefix(word)
        .is_some_and(|rest| !rest.starts_with(|c: char| c.is_alphanumeric() || c == '_' || c == '$'))
}

fn contains_call(expr: &Expr) -> bool {
    match &expr.kind {
        ExprKind::Call { .. } | ExprKind::SuperCall { .. } => true,
        ExprKind::Member { object, .. } => contains_call(object),
        _ => false,
    }
}

fn binary_precedence(op: BinaryOp) -> u8 {
    match op {
        BinaryOp::BitOr => 6,
        BinaryOp::BitXor => 7,
        BinaryOp::BitAnd => 8,
        BinaryOp::Eq | BinaryOp::NotEq | BinaryOp::StrictEq | BinaryOp::StrictNotEq => 9,
        BinaryOp::Lt
        | BinaryOp::LtEq
        | BinaryOp::Gt
        | BinaryOp::GtEq
        | BinaryOp::InstanceOf
        | BinaryOp::In => 10,
        BinaryOp::Shl | BinaryOp::Shr | BinaryOp::UShr => 11,
        BinaryOp::Add | BinaryOp::Sub => 12,
        BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => 13,
        BinaryOp::Exp => 14,
    }
}

fn logical_precedence(op: LogicalOp) -> u8 {
    match op {
        LogicalOp::Nullish => precedence::NULLISH,
        LogicalOp::Or => 4,
        LogicalOp::And => 5,
    }
}

fn expr_precedence(expr: &Expr) -> u8 {
    match &expr.kind {
        ExprKind::Sequence { .. } => precedence::SEQUENCE,
        ExprKind::Assign { .. } | ExprKind::Arrow(_) | ExprKind::Spread { .. } => {
            precedence::ASSIGN
        }
        ExprKind::Conditional { .. } => precedence::CONDITIONAL,
        ExprKind::Logical { operator, .. } => logical_precedence(*operator),
        ExprKind::Binary { operator, .. } => binary_precedence(*operator),
        ExprKind::Unary { .. } => precedence::UNARY,
        ExprKind::Update { prefix: true, .. } => precedence::UNARY,
        ExprKind::Update { prefix: false, .. } => precedence::POSTFIX,
        ExprKind::Call { .. }
        | ExprKind::New { .. }
        | ExprKind::Member { .. }
        | ExprKind::SuperCall { .. }
        | ExprKind::SuperMember { .. }
        | ExprKind::Chain { .. } => precedence::CALL,
        ExprKind::Number { value } if value.is_sign_negative() => precedence::UNARY,
        _ => precedence::PRIMARY,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::parse_program;

    fn round_trip(src: &str) -> String {
        let program = parse_program(src).unwrap();
        let printed = generate(&program);
        let reparsed = parse_program(&printed)
            .unwrap_or_else(|err| panic!("generated code failed to parse: {err}\n{printed}"));
        assert_eq!(generate(&reparsed), printed, "printing is not stable");
        printed
    }

    #[test]
    fn keeps_required_parentheses() {
        assert_eq!(round_trip("(a + b) * c;"), "(a + b) * c;\n");
        assert_eq!(round_trip("a - (b - c);"), "a - (b - c);\n");
        assert_eq!(round_trip("(-2) ** 2;"), "(-2) ** 2;\n");
        assert_eq!(round_trip("2 ** 3 ** 2;"), "2 ** 3 ** 2;\n");
        assert_eq!(round_trip("(a, b);"), "a, b;\n");
        assert_eq!(round_trip("(a ?? b) || c;"), "(a ?? b) || c;\n");
        assert_eq!(round_trip("- -x;"), "- -x;\n");
        assert_eq!(round_trip("new (f())();"), "new (f())();\n");
        assert_eq!(round_trip("(a?.b).c;"), "(a?.b).c;\n");
        assert_eq!(round_trip("(1).toString();"), "(1).toString();\n");
    }

    #[test]
    fn statement_level_ambiguities_are_wrapped() {
        assert_eq!(round_trip("({ a: 1 });"), "({ a: 1 });\n");
        assert_eq!(round_trip("(function () {})();"), "(function () {}());\n");
        assert_eq!(round_trip("({a} = b);"), "({ a } = b);\n");
        assert_eq!(round_trip("f = () => ({});"), "f = () => ({});\n");
    }

    #[test]
    fn strings_use_single_quotes() {
        assert_eq!(round_trip(r#"x = "it's\n";"#), "x = 'it\\'s\\n';\n");
        assert_eq!(round_trip("x = `a${b}\\${c}`;"), "x = `a${b}\\${c}`;\n");
    }

    #[test]
    fn dangling_else_stays_attached() {
        let printed = round_trip("if (a) if (b) x(); else y();");
        assert!(printed.starts_with("if (a)\n    if (b)"));
        let printed = round_trip("if (a) { if (b) x(); } else y();");
        assert!(printed.contains("} else\n"));
    }

    #[test]
    fn larger_program_round_trips() {
        round_trip(
            r#"
            class Counter extends Base {
                count = 0;
                static create() { return new Counter(); }
                constructor(start) { super(); this.count = start ?? 0; }
                inc() { return ++this.count; }
            }
            const { a, b: [c, , d = 2], ...rest } = obj;
            for (let i = 0, n = ('x' in o ? 1 : 2); i < n; i++) { if (i % 2) continue; }
            for (const [k, v] of Object.entries(o)) print(`${k}=${v}`);
            try { throw new Error('x'); } catch ({ message }) { log(message); } finally { done(); }
            switch (x) { case 1: y(); break; default: z(); }
            label = a ? b : c ? d : e;
            arr = [1, , 3, ...more,];
            fn = async1 => async1 * 2;
            do x--; while (x > 0);
            "#,
        );
    }
}
