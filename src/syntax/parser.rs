use super::ast::*;
use super::lexer::{Lexer, Token, TokenKind};
use super::{Diagnostic, Phase};
use std::sync::Arc;

/// Deepest statement/expression nesting the parser accepts.
pub const MAX_NESTING_DEPTH: usize = 100;

/// Tallest syntax tree the parser hands out.
///
/// Operator and call chains like `a + b + c` are parsed in a loop but nest
/// one level per link, and every later pass walks them recursively.
pub const MAX_TREE_HEIGHT: usize = 1000;

/// Parse source text into a [`Program`].
///
/// The first error wins; no recovery is attempted.
pub fn parse_program(source: &str) -> Result<Program, Diagnostic> {
    let mut parser = Parser::new(source)?;
    let mut body = Vec::new();
    while !parser.at_eof() {
        body.push(parser.parse_statement()?);
    }
    Ok(Program {
        body,
        span: Span {
            start: 0,
            end: source.len(),
            line: 1,
            column: 1,
        },
    })
}

type ParseResult<T> = std::result::Result<T, Diagnostic>;

/// Which statements are legal at the current position.
#[derive(Debug, Clone, Copy, Default)]
struct Context {
    function: bool,
    iteration: bool,
    breakable: bool,
    method: bool,
    derived_constructor: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FunctionKind {
    Plain,
    Method,
    Constructor { derived: bool },
}

enum InfixOp {
    Binary(BinaryOp),
    Logical(LogicalOp),
}

struct Parser<'a> {
    src: &'a str,
    lexer: Lexer<'a>,
    token: Token,
    prev_end: usize,
    depth: usize,
    /// Upper bound on the height of the subtree being built, relative to its root.
    peak: usize,
    no_in: bool,
    context: Context,
    /// `{ a = 1 }` is only legal once reinterpreted as a pattern.
    cover_error: Option<Diagnostic>,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> ParseResult<Self> {
        let mut lexer = Lexer::new(src);
        let token = lexer.next_token()?;
        Ok(Self {
            src,
            lexer,
            token,
            prev_end: 0,
            depth: 0,
            peak: 0,
            no_in: false,
            context: Context::default(),
            cover_error: None,
        })
    }

    // ----- token plumbing -------------------------------------------------

    fn advance(&mut self) -> ParseResult<Token> {
        let next = self.lexer.next_token()?;
        self.prev_end = self.token.span.end;
        Ok(std::mem::replace(&mut self.token, next))
    }

    fn at_eof(&self) -> bool {
        self.token.kind == TokenKind::Eof
    }

    fn is(&self, punct: &str) -> bool {
        matches!(&self.token.kind, TokenKind::Punct(p) if *p == punct)
    }

    fn is_name(&self, name: &str) -> bool {
        matches!(&self.token.kind, TokenKind::Name(n) if n == name)
    }

    fn eat(&mut self, punct: &str) -> ParseResult<bool> {
        if self.is(punct) {
            self.advance()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn expect(&mut self, punct: &str) -> ParseResult<Span> {
        if self.is(punct) {
            Ok(self.advance()?.span)
        } else {
            Err(self.unexpected())
        }
    }

    fn finish(&self, start: Span) -> Span {
        Span {
            start: start.start,
            end: self.prev_end.max(start.start),
            line: start.line,
            column: start.column,
        }
    }

    fn error_here(&self, message: impl Into<String>) -> Diagnostic {
        Diagnostic::at(Phase::Parse, message, self.token.span)
    }

    fn error_at(&self, span: Span, message: impl Into<String>) -> Diagnostic {
        Diagnostic::at(Phase::Parse, message, span)
    }

    fn unexpected(&self) -> Diagnostic {
        let token = &self.token;
        let message = match &token.kind {
            TokenKind::Eof => "Unexpected end of input".to_string(),
            TokenKind::Number(_) => "Unexpected number".to_string(),
            TokenKind::String(_) => "Unexpected string".to_string(),
            TokenKind::Template { .. } => "Unexpected template string".to_string(),
            TokenKind::Name(name) if is_strict_reserved(name) => {
                "Unexpected strict mode reserved word".to_string()
            }
            TokenKind::Name(name) if is_keyword(name) => format!("Unexpected token '{name}'"),
            TokenKind::Name(name) => format!("Unexpected identifier '{name}'"),
            TokenKind::Punct(p) => format!("Unexpected token '{p}'"),
        };
        Diagnostic::at(Phase::Parse, message, token.span)
    }

    fn consume_semicolon(&mut self) -> ParseResult<()> {
        if self.eat(";")? || self.is("}") || self.at_eof() || self.token.newline_before {
            return Ok(());
        }
        Err(self.unexpected())
    }

    fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> ParseResult<T>) -> ParseResult<T> {
        self.depth += 1;
        if self.depth > MAX_NESTING_DEPTH {
            return Err(self.error_here("Maximum nesting depth exceeded"));
        }
        self.peak = self.peak.max(self.depth);
        let result = f(self);
        self.depth -= 1;
        result
    }

    /// Start a left-nested chain rooted at the current depth; returns the outer peak.
    fn open_chain(&mut self) -> usize {
        std::mem::replace(&mut self.peak, self.depth)
    }

    /// Account for `links` levels stacked on top of the chain's operands.
    fn grow_chain(&self, links: usize) -> ParseResult<()> {
        if self.peak + links > MAX_TREE_HEIGHT {
            return Err(self.error_here("Expression is nested too deeply"));
        }
        Ok(())
    }

    fn close_chain(&mut self, outer_peak: usize, links: usize) {
        self.peak = outer_peak.max(self.peak + links);
    }

    fn allow_in<T>(&mut self, f: impl FnOnce(&mut Self) -> ParseResult<T>) -> ParseResult<T> {
        let saved = std::mem::replace(&mut self.no_in, false);
        let result = f(self);
        self.no_in = saved;
        result
    }

    fn without_in<T>(&mut self, f: impl FnOnce(&mut Self) -> ParseResult<T>) -> ParseResult<T> {
        let saved = std::mem::replace(&mut self.no_in, true);
        let result = f(self);
        self.no_in = saved;
        result
    }

    fn with_context<T>(
        &mut self,
        context: Context,
        f: impl FnOnce(&mut Self) -> ParseResult<T>,
    ) -> ParseResult<T> {
        let saved = std::mem::replace(&mut self.context, context);
        let result = f(self);
        self.context = saved;
        result
    }

    fn clear_cover_error(&mut self, from: usize) {
        if self.cover_error.as_ref().is_some_and(|e| e.offset >= from) {
            self.cover_error = None;
        }
    }

    fn binding_identifier(&mut self) -> ParseResult<String> {
        match &self.token.kind {
            TokenKind::Name(name) if !is_reserved(name) => {
                if name == "eval" || name == "arguments" {
                    return Err(self.error_here("Unexpected eval or arguments in strict mode"));
                }
                let name = name.clone();
                self.advance()?;
                Ok(name)
            }
            _ => Err(self.unexpected()),
        }
    }

    fn property_name(&mut self) -> ParseResult<String> {
        match &self.token.kind {
            TokenKind::Name(name) => {
                let name = name.clone();
                self.advance()?;
                Ok(name)
            }
            _ => Err(self.unexpected()),
        }
    }

    // ----- statements -----------------------------------------------------

    fn parse_statement(&mut self) -> ParseResult<Stmt> {
        let stmt = self.nested(|p| p.parse_statement_inner())?;
        if let Some(error) = self.cover_error.take() {
            return Err(error);
        }
        Ok(stmt)
    }

    fn parse_statement_inner(&mut self) -> ParseResult<Stmt> {
        let start = self.token.span;
        let keyword = match &self.token.kind {
            TokenKind::Punct("{") => {
                let body = self.parse_block()?;
                return Ok(Stmt::new(StmtKind::Block { body }, self.finish(start)));
            }
            TokenKind::Punct(";") => {
                self.advance()?;
                return Ok(Stmt::new(StmtKind::Empty, self.finish(start)));
            }
            TokenKind::Name(name) => name.clone(),
            _ => String::new(),
        };

        let kind = match keyword.as_str() {
            "var" | "let" | "const" => {
                let declaration = self.parse_variable_declaration()?;
                self.consume_semicolon()?;
                StmtKind::Variable(declaration)
            }
            "function" => {
                self.advance()?;
                if self.is("*") {
                    return Err(self.error_here("Generators are not supported"));
                }
                let name = self.binding_identifier()?;
                StmtKind::Function(self.parse_function_rest(Some(name), FunctionKind::Plain)?)
            }
            "class" => StmtKind::Class(self.parse_class(true)?),
            "if" => self.parse_if()?,
            "while" => {
                self.advance()?;
                let test = self.parse_paren_expression()?;
                let body = Box::new(self.parse_loop_body()?);
                StmtKind::While { test, body }
            }
            "do" => self.parse_do_while()?,
            "for" => self.parse_for()?,
            "return" => self.parse_return()?,
            "break" => {
                if !self.context.breakable {
                    return Err(self.error_here("Illegal break statement"));
                }
                self.advance()?;
                self.reject_label()?;
                self.consume_semicolon()?;
                StmtKind::Break
            }
            "continue" => {
                if !self.context.iteration {
                    return Err(self.error_here(
                        "Illegal continue statement: no surrounding iteration statement",
                    ));
                }
                self.advance()?;
                self.reject_label()?;
                self.consume_semicolon()?;
                StmtKind::Continue
            }
            "throw" => {
                self.advance()?;
                if self.token.newline_before {
                    return Err(self.error_here("Illegal newline after throw"));
                }
                let argument = self.parse_expression()?;
                self.consume_semicolon()?;
                StmtKind::Throw { argument }
            }
            "try" => self.parse_try()?,
            "switch" => self.parse_switch()?,
            "debugger" => {
                self.advance()?;
                self.consume_semicolon()?;
                StmtKind::Debugger
            }
            "import" => {
                return Err(self.error_here("Cannot use import statement outside a module"));
            }
            "export" => return Err(self.unexpected()),
            "with" => {
                return Err(self.error_here("Strict mode code may not include a with statement"));
            }
            _ => self.parse_expression_statement()?,
        };
        Ok(Stmt::new(kind, self.finish(start)))
    }

    /// Body of `if`/loops: declarations are not allowed without a block.
    fn parse_substatement(&mut self) -> ParseResult<Stmt> {
        if self.is_name("let") || self.is_name("const") || self.is_name("class") {
            return Err(self.error_here(
                "Lexical declaration cannot appear in a single-statement context",
            ));
        }
        if self.is_name("function") {
            return Err(self.error_here(
                "In strict mode code, functions can only be declared at top level or inside a block.",
            ));
        }
        self.parse_statement()
    }

    fn parse_loop_body(&mut self) -> ParseResult<Stmt> {
        let context = Context {
            iteration: true,
            breakable: true,
            ..self.context
        };
        self.with_context(context, |p| p.parse_substatement())
    }

    fn reject_label(&mut self) -> ParseResult<()> {
        if let TokenKind::Name(name) = &self.token.kind {
            if !self.token.newline_before && !is_keyword(name) {
                return Err(self.error_here(format!("Undefined label '{name}'")));
            }
        }
        Ok(())
    }

    fn parse_block(&mut self) -> ParseResult<Vec<Stmt>> {
        self.expect("{")?;
        let mut body = Vec::new();
        while !self.is("}") {
            body.push(self.parse_statement()?);
        }
        self.advance()?;
        Ok(body)
    }

    fn parse_paren_expression(&mut self) -> ParseResult<Expr> {
        self.expect("(")?;
        let expr = self.allow_in(|p| p.parse_expression())?;
        self.expect(")")?;
        Ok(expr)
    }

    fn parse_expression_statement(&mut self) -> ParseResult<StmtKind> {
        let expression = self.parse_expression()?;
        if self.is(":") && expression.as_identifier().is_some() {
            return Err(self.error_at(expression.span, "Labeled statements are not supported"));
        }
        self.consume_semicolon()?;
        Ok(StmtKind::Expression { expression })
    }

    fn declaration_kind(&mut self) -> ParseResult<DeclarationKind> {
        let kind = match &self.token.kind {
            TokenKind::Name(name) if name == "var" => DeclarationKind::Var,
            TokenKind::Name(name) if name == "let" => DeclarationKind::Let,
            TokenKind::Name(name) if name == "const" => DeclarationKind::Const,
            _ => return Err(self.unexpected()),
        };
        self.advance()?;
        Ok(kind)
    }

    fn check_initializer(
        &self,
        kind: DeclarationKind,
        id: &Pattern,
        has_init: bool,
    ) -> ParseResult<()> {
        if has_init {
            return Ok(());
        }
        if kind == DeclarationKind::Const {
            return Err(self.error_here("Missing initializer in const declaration"));
        }
        if !matches!(id.kind, PatternKind::Identifier { .. }) {
            return Err(self.error_here("Missing initializer in destructuring declaration"));
        }
        Ok(())
    }

    fn parse_declarator_init(&mut self) -> ParseResult<Option<Expr>> {
        if self.eat("=")? {
            Ok(Some(self.parse_assignment()?))
        } else {
            Ok(None)
        }
    }

    fn parse_variable_declaration(&mut self) -> ParseResult<VariableDeclaration> {
        let kind = self.declaration_kind()?;
        let mut declarations = Vec::new();
        loop {
            let id = self.parse_binding_target()?;
            let init = self.parse_declarator_init()?;
            self.check_initializer(kind, &id, init.is_some())?;
            declarations.push(VariableDeclarator { id, init });
            if !self.eat(",")? {
                break;
            }
        }
        Ok(VariableDeclaration { kind, declarations })
    }

    fn parse_if(&mut self) -> ParseResult<StmtKind> {
        self.advance()?;
        let test = self.parse_paren_expression()?;
        let consequent = Box::new(self.parse_substatement()?);
        let alternate = if self.is_name("else") {
            self.advance()?;
            Some(Box::new(self.parse_substatement()?))
        } else {
            None
        };
        Ok(StmtKind::If {
            test,
            consequent,
            alternate,
        })
    }

    fn parse_do_while(&mut self) -> ParseResult<StmtKind> {
        self.advance()?;
        let body = Box::new(self.parse_loop_body()?);
        if !self.is_name("while") {
            return Err(self.unexpected());
        }
        self.advance()?;
        let test = self.parse_paren_expression()?;
        self.eat(";")?;
        Ok(StmtKind::DoWhile { body, test })
    }

    fn parse_for(&mut self) -> ParseResult<StmtKind> {
        self.advance()?;
        if self.is_name("await") {
            return Err(self.error_here("for await is not supported"));
        }
        self.expect("(")?;

        let init = if self.is(";") {
            None
        } else if self.is_name("var") || self.is_name("let") || self.is_name("const") {
            let kind = self.declaration_kind()?;
            let id = self.parse_binding_target()?;
            if self.is_name("of") || self.is_name("in") {
                return self.parse_for_each(ForHead::Declaration { kind, id });
            }
            let init = self.without_in(|p| p.parse_declarator_init())?;
            self.check_initializer(kind, &id, init.is_some())?;
            let mut declarations = vec![VariableDeclarator { id, init }];
            while self.eat(",")? {
                let id = self.parse_binding_target()?;
                let init = self.without_in(|p| p.parse_declarator_init())?;
                self.check_initializer(kind, &id, init.is_some())?;
                declarations.push(VariableDeclarator { id, init });
            }
            Some(ForInit::Declaration(VariableDeclaration { kind, declarations }))
        } else {
            let start = self.token.span.start;
            let expr = self.without_in(|p| p.parse_expression())?;
            if self.is_name("of") || self.is_name("in") {
                let target = self.to_pattern(expr, false)?;
                self.clear_cover_error(start);
                return self.parse_for_each(ForHead::Pattern(target));
            }
            Some(ForInit::Expression(expr))
        };

        self.expect(";")?;
        let test = if self.is(";") {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect(";")?;
        let update = if self.is(")") {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect(")")?;
        let body = Box::new(self.parse_loop_body()?);
        Ok(StmtKind::For {
            init,
            test,
            update,
            body,
        })
    }

    fn parse_for_each(&mut self, left: ForHead) -> ParseResult<StmtKind> {
        let is_of = self.is_name("of");
        self.advance()?;
        let right = if is_of {
            self.allow_in(|p| p.parse_assignment())?
        } else {
            self.allow_in(|p| p.parse_expression())?
        };
        self.expect(")")?;
        let body = Box::new(self.parse_loop_body()?);
        Ok(if is_of {
            StmtKind::ForOf { left, right, body }
        } else {
            StmtKind::ForIn { left, right, body }
        })
    }

    fn parse_return(&mut self) -> ParseResult<StmtKind> {
        if !self.context.function {
            return Err(self.error_here("Illegal return statement"));
        }
        self.advance()?;
        let argument =
            if self.is(";") || self.is("}") || self.at_eof() || self.token.newline_before {
                None
            } else {
                Some(self.parse_expression()?)
            };
        self.consume_semicolon()?;
        Ok(StmtKind::Return { argument })
    }

    fn parse_try(&mut self) -> ParseResult<StmtKind> {
        self.advance()?;
        let block = self.parse_block()?;
        let handler = if self.is_name("catch") {
            self.advance()?;
            let param = if self.eat("(")? {
                let param = self.parse_binding_target()?;
                self.expect(")")?;
                Some(param)
            } else {
                None
            };
            let body = self.parse_block()?;
            Some(CatchClause { param, body })
        } else {
            None
        };
        let finalizer = if self.is_name("finally") {
            self.advance()?;
            Some(self.parse_block()?)
        } else {
            None
        };
        if handler.is_none() && finalizer.is_none() {
            return Err(self.error_here("Missing catch or finally after try"));
        }
        Ok(StmtKind::Try {
            block,
            handler,
            finalizer,
        })
    }

    fn parse_switch(&mut self) -> ParseResult<StmtKind> {
        self.advance()?;
        let discriminant = self.parse_paren_expression()?;
        self.expect("{")?;
        let context = Context {
            breakable: true,
            ..self.context
        };
        let cases = self.with_context(context, |p| p.parse_switch_cases())?;
        Ok(StmtKind::Switch {
            discriminant,
            cases,
        })
    }

    fn parse_switch_cases(&mut self) -> ParseResult<Vec<SwitchCase>> {
        let mut cases = Vec::new();
        let mut seen_default = false;
        while !self.is("}") {
            let test = if self.is_name("case") {
                self.advance()?;
                Some(self.parse_expression()?)
            } else if self.is_name("default") {
                if seen_default {
                    return Err(
                        self.error_here("More than one default clause in switch statement")
                    );
                }
                seen_default = true;
                self.advance()?;
                None
            } else {
                return Err(self.unexpected());
            };
            self.expect(":")?;
            let mut consequent = Vec::new();
            while !(self.is("}") || self.is_name("case") || self.is_name("default")) {
                consequent.push(self.parse_statement()?);
            }
            cases.push(SwitchCase { test, consequent });
        }
        self.advance()?;
        Ok(cases)
    }

    // ----- functions and classes -----------------------------------------

    fn parse_function_rest(
        &mut self,
        id: Option<String>,
        kind: FunctionKind,
    ) -> ParseResult<Arc<Function>> {
        let context = Context {
            function: true,
            iteration: false,
            breakable: false,
            method: kind != FunctionKind::Plain,
            derived_constructor: kind == FunctionKind::Constructor { derived: true },
        };
        self.with_context(context, |p| {
            p.allow_in(|p| {
                let params = p.parse_params()?;
                let body = p.parse_block()?;
                Ok(Arc::new(Function {
                    id,
                    params,
                    body: FunctionBody::Block(body),
                    is_arrow: false,
                }))
            })
        })
    }

    fn parse_params(&mut self) -> ParseResult<Vec<Param>> {
        self.expect("(")?;
        let mut params = Vec::new();
        while !self.is(")") {
            if self.eat("...")? {
                let pattern = self.parse_binding_target()?;
                if !self.is(")") {
                    return Err(self.error_here("Rest parameter must be last formal parameter"));
                }
                params.push(Param {
                    pattern,
                    default: None,
                    rest: true,
                });
                break;
            }
            let pattern = self.parse_binding_target()?;
            let default = self.parse_declarator_init()?;
            params.push(Param {
                pattern,
                default,
                rest: false,
            });
            if !self.is(")") {
                self.expect(",")?;
            }
        }
        self.expect(")")?;
        Ok(params)
    }

    fn parse_arrow_body(&mut self, start: Span, params: Vec<Param>) -> ParseResult<Expr> {
        self.advance()?;
        let context = Context {
            function: true,
            iteration: false,
            breakable: false,
            ..self.context
        };
        let body = self.with_context(context, |p| {
            if p.is("{") {
                p.allow_in(|p| p.parse_block()).map(FunctionBody::Block)
            } else {
                p.parse_assignment()
                    .map(|expr| FunctionBody::Expression(Box::new(expr)))
            }
        })?;
        let function = Function {
            id: None,
            params,
            body,
            is_arrow: true,
        };
        Ok(Expr::new(
            ExprKind::Arrow(Arc::new(function)),
            self.finish(start),
        ))
    }

    fn parse_class(&mut self, require_name: bool) -> ParseResult<Arc<Class>> {
        self.advance()?;
        let id = match &self.token.kind {
            TokenKind::Name(name) if name != "extends" => Some(self.binding_identifier()?),
            _ if require_name => return Err(self.unexpected()),
            _ => None,
        };
        let super_class = if self.is_name("extends") {
            self.advance()?;
            Some(Box::new(self.parse_lhs()?))
        } else {
            None
        };
        let derived = super_class.is_some();
        self.expect("{")?;

        let mut constructor = None;
        let mut members = Vec::new();
        while !self.is("}") {
            if self.eat(";")? {
                continue;
            }
            let member_start = self.token.span;
            let mut is_static = false;
            let key = if self.is_name("static") {
                self.advance()?;
                if self.is("(") || self.is("=") || self.is(";") || self.is("}") {
                    PropertyKey::Identifier("static".to_string())
                } else {
                    is_static = true;
                    self.parse_member_key()?
                }
            } else {
                self.parse_member_key()?
            };
            let is_constructor = !is_static
                && matches!(&key, PropertyKey::Identifier(n) | PropertyKey::String(n) if n == "constructor");

            if self.is("(") {
                if is_constructor {
                    if constructor.is_some() {
                        return Err(
                            self.error_at(member_start, "A class may only have one constructor")
                        );
                    }
                    constructor =
                        Some(self.parse_function_rest(None, FunctionKind::Constructor { derived })?);
                } else {
                    let method = self.parse_function_rest(None, FunctionKind::Method)?;
                    members.push(ClassMember {
                        key,
                        is_static,
                        value: ClassMemberValue::Method(method),
                    });
                }
                continue;
            }

            if is_constructor {
                return Err(self.error_at(
                    member_start,
                    "Classes may not have a field named 'constructor'",
                ));
            }
            let initializer_context = Context {
                function: false,
                iteration: false,
                breakable: false,
                method: true,
                derived_constructor: false,
            };
            let value = if self.eat("=")? {
                Some(self.with_context(initializer_context, |p| {
                    p.allow_in(|p| p.parse_assignment())
                })?)
            } else {
                None
            };
            self.consume_semicolon()?;
            members.push(ClassMember {
                key,
                is_static,
                value: ClassMemberValue::Field(value),
            });
        }
        self.advance()?;

        Ok(Arc::new(Class {
            id,
            super_class,
            constructor,
            members,
        }))
    }

    /// Property key of a method or field; rejects accessor and async forms.
    fn parse_member_key(&mut self) -> ParseResult<PropertyKey> {
        if self.is("*") {
            return Err(self.error_here("Generators are not supported"));
        }
        let start = self.token.span;
        let key = self.parse_property_key()?;
        if let PropertyKey::Identifier(name) = &key {
            if matches!(name.as_str(), "get" | "set" | "async") && starts_property_key(&self.token)
            {
                let message = if name == "async" {
                    "Async methods are not supported"
                } else {
                    "Getters and setters are not supported"
                };
                return Err(self.error_at(start, message));
            }
        }
        Ok(key)
    }

    fn parse_property_key(&mut self) -> ParseResult<PropertyKey> {
        let key = match &self.token.kind {
            TokenKind::Name(name) => PropertyKey::Identifier(name.clone()),
            TokenKind::String(value) => PropertyKey::String(value.clone()),
            TokenKind::Number(value) => PropertyKey::Number(*value),
            TokenKind::Punct("[") => {
                self.advance()?;
                let expr = self.allow_in(|p| p.parse_assignment())?;
                self.expect("]")?;
                return Ok(PropertyKey::Computed(Box::new(expr)));
            }
            _ => return Err(self.unexpected()),
        };
        self.advance()?;
        Ok(key)
    }

    // ----- patterns -------------------------------------------------------

    fn parse_binding_target(&mut self) -> ParseResult<Pattern> {
        self.nested(|p| {
            let start = p.token.span;
            let kind = if p.is("[") {
                p.parse_array_binding()?
            } else if p.is("{") {
                p.parse_object_binding()?
            } else {
                PatternKind::Identifier {
                    name: p.binding_identifier()?,
                }
            };
            Ok(Pattern::new(kind, p.finish(start)))
        })
    }

    fn parse_array_binding(&mut self) -> ParseResult<PatternKind> {
        self.advance()?;
        let mut elements = Vec::new();
        let mut rest = None;
        while !self.is("]") {
            if self.eat(",")? {
                elements.push(None);
                continue;
            }
            if self.eat("...")? {
                rest = Some(Box::new(self.parse_binding_target()?));
                if !self.is("]") {
                    return Err(self.error_here("Rest element must be last element"));
                }
                break;
            }
            let target = self.parse_binding_target()?;
            let default = self.allow_in(|p| p.parse_declarator_init())?;
            elements.push(Some(PatternElement { target, default }));
            if !self.is("]") {
                self.expect(",")?;
            }
        }
        self.expect("]")?;
        Ok(PatternKind::Array { elements, rest })
    }

    fn parse_object_binding(&mut self) -> ParseResult<PatternKind> {
        self.advance()?;
        let mut properties = Vec::new();
        let mut rest = None;
        while !self.is("}") {
            if self.eat("...")? {
                let start = self.token.span;
                let name = self.binding_identifier()?;
                rest = Some(Box::new(Pattern::new(
                    PatternKind::Identifier { name },
                    self.finish(start),
                )));
                if !self.is("}") {
                    return Err(self.error_here("Rest element must be last element"));
                }
                break;
            }
            let key_start = self.token.span;
            let key = self.parse_property_key()?;
            let (value, shorthand) = if self.eat(":")? {
                (self.parse_binding_target()?, false)
            } else {
                match &key {
                    PropertyKey::Identifier(name) if !is_reserved(name) => (
                        Pattern::new(
                            PatternKind::Identifier { name: name.clone() },
                            self.finish(key_start),
                        ),
                        true,
                    ),
                    _ => {
                        return Err(self.error_at(
                            key_start,
                            "Invalid destructuring assignment target",
                        ));
                    }
                }
            };
            let default = self.allow_in(|p| p.parse_declarator_init())?;
            properties.push(PatternProperty {
                key,
                value,
                default,
                shorthand,
            });
            if !self.is("}") {
                self.expect(",")?;
            }
        }
        self.expect("}")?;
        Ok(PatternKind::Object { properties, rest })
    }

    /// Reinterpret an already-parsed expression as an assignment or binding target.
    fn to_pattern(&self, expr: Expr, binding: bool) -> ParseResult<Pattern> {
        let span = expr.span;
        if !binding
            && matches!(
                expr.kind,
                ExprKind::Member {
                    optional: false,
                    ..
                } | ExprKind::SuperMember { .. }
            )
        {
            return Ok(Pattern::new(
                PatternKind::Expression {
                    expression: Box::new(expr),
                },
                span,
            ));
        }

        let kind = match expr.kind {
            ExprKind::Identifier { name } => {
                if binding && (name == "eval" || name == "arguments") {
                    return Err(self.error_at(span, "Unexpected eval or arguments in strict mode"));
                }
                PatternKind::Identifier { name }
            }
            ExprKind::Array { elements } => {
                let count = elements.len();
                let mut out = Vec::with_capacity(count);
                let mut rest = None;
                for (index, element) in elements.into_iter().enumerate() {
                    match element {
                        None => out.push(None),
                        Some(Expr {
                            kind: ExprKind::Spread { argument },
                            span,
                        }) => {
                            if index + 1 != count {
                                return Err(self.error_at(span, "Rest element must be last element"));
                            }
                            rest = Some(Box::new(self.to_pattern(*argument, binding)?));
                        }
                        Some(element) => {
                            let (target, default) = self.to_pattern_with_default(element, binding)?;
                            out.push(Some(PatternElement { target, default }));
                        }
                    }
                }
                PatternKind::Array {
                    elements: out,
                    rest,
                }
            }
            ExprKind::Object { properties } => {
                let count = properties.len();
                let mut out = Vec::with_capacity(count);
                let mut rest = None;
                for (index, property) in properties.into_iter().enumerate() {
                    match property {
                        Property::Spread { argument } => {
                            if index + 1 != count {
                                return Err(
                                    self.error_at(argument.span, "Rest element must be last element")
                                );
                            }
                            rest = Some(Box::new(self.to_pattern(argument, binding)?));
                        }
                        Property::KeyValue { method: true, value, .. } => {
                            return Err(
                                self.error_at(value.span, "Invalid destructuring assignment target")
                            );
                        }
                        Property::KeyValue {
                            key,
                            value,
                            shorthand,
                            ..
                        } => {
                            let (value, default) = self.to_pattern_with_default(value, binding)?;
                            out.push(PatternProperty {
                                key,
                                value,
                                default,
                                shorthand,
                            });
                        }
                    }
                }
                PatternKind::Object {
                    properties: out,
                    rest,
                }
            }
            _ => return Err(self.error_at(span, "Invalid destructuring assignment target")),
        };
        Ok(Pattern::new(kind, span))
    }

    fn to_pattern_with_default(
        &self,
        expr: Expr,
        binding: bool,
    ) -> ParseResult<(Pattern, Option<Expr>)> {
        match expr.kind {
            ExprKind::Assign {
                operator: AssignOp::Assign,
                target,
                value,
            } => {
                if binding {
                    self.check_binding(&target)?;
                }
                Ok((*target, Some(*value)))
            }
            kind => Ok((
                self.to_pattern(
                    Expr {
                        kind,
                        span: expr.span,
                    },
                    binding,
                )?,
                None,
            )),
        }
    }

    fn check_binding(&self, pattern: &Pattern) -> ParseResult<()> {
        match &pattern.kind {
            PatternKind::Identifier { .. } => Ok(()),
            PatternKind::Expression { .. } => Err(self.error_at(
                pattern.span,
                "Invalid destructuring assignment target",
            )),
            PatternKind::Array { elements, rest } => {
                for element in elements.iter().flatten() {
                    self.check_binding(&element.target)?;
                }
                rest.as_deref().map_or(Ok(()), |r| self.check_binding(r))
            }
            PatternKind::Object { properties, rest } => {
                for property in properties {
                    self.check_binding(&property.value)?;
                }
                rest.as_deref().map_or(Ok(()), |r| self.check_binding(r))
            }
        }
    }

    fn simple_target(&self, expr: Expr, message: &str) -> ParseResult<Pattern> {
        let span = expr.span;
        match expr.kind {
            ExprKind::Identifier { name } => Ok(Pattern::new(PatternKind::Identifier { name }, span)),
            ExprKind::Member {
                optional: false, ..
            }
            | ExprKind::SuperMember { .. } => Ok(Pattern::new(
                PatternKind::Expression {
                    expression: Box::new(expr),
                },
                span,
            )),
            _ => Err(self.error_at(span, message)),
        }
    }

    fn check_update_target(&self, expr: &Expr, message: &str) -> ParseResult<()> {
        match &expr.kind {
            ExprKind::Identifier { .. }
            | ExprKind::Member {
                optional: false, ..
            }
            | ExprKind::SuperMember { .. } => Ok(()),
            _ => Err(self.error_at(expr.span, message)),
        }
    }

    // ----- expressions ----------------------------------------------------

    fn parse_expression(&mut self) -> ParseResult<Expr> {
        let start = self.token.span;
        let first = self.parse_assignment()?;
        if !self.is(",") {
            return Ok(first);
        }
        let mut expressions = vec![first];
        while self.eat(",")? {
            expressions.push(self.parse_assignment()?);
        }
        Ok(Expr::new(
            ExprKind::Sequence { expressions },
            self.finish(start),
        ))
    }

    fn parse_assignment(&mut self) -> ParseResult<Expr> {
        self.nested(|p| p.parse_assignment_inner())
    }

    fn parse_assignment_inner(&mut self) -> ParseResult<Expr> {
        let start = self.token.span;
        let left = self.parse_conditional()?;
        let operator = match &self.token.kind {
            TokenKind::Punct(p) => AssignOp::from_symbol(p),
            _ => None,
        };
        let Some(operator) = operator else {
            return Ok(left);
        };

        let destructuring = operator == AssignOp::Assign
            && matches!(left.kind, ExprKind::Object { .. } | ExprKind::Array { .. });
        let target = if destructuring {
            let pattern = self.to_pattern(left, false)?;
            self.clear_cover_error(start.start);
            pattern
        } else {
            self.simple_target(left, "Invalid left-hand side in assignment")?
        };
        self.advance()?;
        let value = self.parse_assignment()?;
        Ok(Expr::new(
            ExprKind::Assign {
                operator,
                target: Box::new(target),
                value: Box::new(value),
            },
            self.finish(start),
        ))
    }

    fn parse_conditional(&mut self) -> ParseResult<Expr> {
        let start = self.token.span;
        let test = self.parse_binary(0)?;
        if !self.is("?") {
            return Ok(test);
        }
        self.advance()?;
        let consequent = self.allow_in(|p| p.parse_assignment())?;
        self.expect(":")?;
        let alternate = self.parse_assignment()?;
        Ok(Expr::new(
            ExprKind::Conditional {
                test: Box::new(test),
                consequent: Box::new(consequent),
                alternate: Box::new(alternate),
            },
            self.finish(start),
        ))
    }

    fn infix_operator(&self) -> Option<(InfixOp, u8)> {
        let symbol = match &self.token.kind {
            TokenKind::Punct(p) => *p,
            TokenKind::Name(name) if name == "instanceof" => "instanceof",
            TokenKind::Name(name) if name == "in" && !self.no_in => "in",
            _ => return None,
        };
        if let Some(op) = LogicalOp::from_symbol(symbol) {
            let precedence = match op {
                LogicalOp::Nullish => 1,
                LogicalOp::Or => 2,
                LogicalOp::And => 3,
            };
            return Some((InfixOp::Logical(op), precedence));
        }
        let op = BinaryOp::from_symbol(symbol)?;
        Some((InfixOp::Binary(op), binary_precedence(op)))
    }

    fn parse_binary(&mut self, min_precedence: u8) -> ParseResult<Expr> {
        let start = self.token.span;
        let outer_peak = self.open_chain();
        let mut links = 0;
        let mut left = self.parse_unary()?;
        while let Some((operator, precedence)) = self.infix_operator() {
            if precedence <= min_precedence {
                break;
            }
            let is_exp = matches!(operator, InfixOp::Binary(BinaryOp::Exp));
            if is_exp
                && matches!(left.kind, ExprKind::Unary { .. })
                && self.src.as_bytes().get(left.span.start) != Some(&b'(')
            {
                return Err(self.error_here(
                    "Unary operator used immediately before exponentiation expression. Parenthesis must be used to disambiguate operator precedence",
                ));
            }
            self.advance()?;
            let right = if is_exp {
                self.parse_binary(precedence - 1)?
            } else {
                self.parse_binary(precedence)?
            };
            let kind = match operator {
                InfixOp::Binary(operator) => ExprKind::Binary {
                    operator,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                InfixOp::Logical(operator) => ExprKind::Logical {
                    operator,
                    left: Box::new(left),
                    right: Box::new(right),
                },
            };
            left = Expr::new(kind, self.finish(start));
            links += 1;
            self.grow_chain(links)?;
        }
        self.close_chain(outer_peak, links);
        Ok(left)
    }

    fn parse_unary(&mut self) -> ParseResult<Expr> {
        self.nested(|p| p.parse_unary_inner())
    }

    fn parse_unary_inner(&mut self) -> ParseResult<Expr> {
        let start = self.token.span;
        let unary = match &self.token.kind {
            TokenKind::Punct(p @ ("-" | "+" | "!" | "~")) => UnaryOp::from_symbol(p),
            TokenKind::Name(name) if matches!(name.as_str(), "typeof" | "void" | "delete") => {
                UnaryOp::from_symbol(name)
            }
            _ => None,
        };
        if let Some(operator) = unary {
            self.advance()?;
            let argument = self.parse_unary()?;
            if operator == UnaryOp::Delete && argument.as_identifier().is_some() {
                return Err(self.error_at(
                    argument.span,
                    "Delete of an unqualified identifier in strict mode.",
                ));
            }
            return Ok(Expr::new(
                ExprKind::Unary {
                    operator,
                    argument: Box::new(argument),
                },
                self.finish(start),
            ));
        }

        let update = match &self.token.kind {
            TokenKind::Punct(p) => UpdateOp::from_symbol(p),
            _ => None,
        };
        if let Some(operator) = update {
            self.advance()?;
            let argument = self.parse_unary()?;
            self.check_update_target(
                &argument,
                "Invalid left-hand side expression in prefix operation",
            )?;
            return Ok(Expr::new(
                ExprKind::Update {
                    operator,
                    prefix: true,
                    argument: Box::new(argument),
                },
                self.finish(start),
            ));
        }

        if self.is_name("await") {
            return Err(self.error_here(
                "await is only valid in async functions and the top level bodies of modules",
            ));
        }

        let expr = self.parse_lhs()?;
        if self.token.newline_before {
            return Ok(expr);
        }
        let postfix = match &self.token.kind {
            TokenKind::Punct(p) => UpdateOp::from_symbol(p),
            _ => None,
        };
        let Some(operator) = postfix else {
            return Ok(expr);
        };
        self.check_update_target(
            &expr,
            "Invalid left-hand side expression in postfix operation",
        )?;
        self.advance()?;
        Ok(Expr::new(
            ExprKind::Update {
                operator,
                prefix: false,
                argument: Box::new(expr),
            },
            self.finish(start),
        ))
    }

    fn parse_arguments(&mut self) -> ParseResult<Vec<Expr>> {
        self.expect("(")?;
        self.allow_in(|p| {
            let mut arguments = Vec::new();
            while !p.is(")") {
                arguments.push(p.parse_spreadable()?);
                if !p.is(")") {
                    p.expect(",")?;
                }
            }
            p.advance()?;
            Ok(arguments)
        })
    }

    fn parse_spreadable(&mut self) -> ParseResult<Expr> {
        let start = self.token.span;
        if self.eat("...")? {
            let argument = self.parse_assignment()?;
            return Ok(Expr::new(
                ExprKind::Spread {
                    argument: Box::new(argument),
                },
                self.finish(start),
            ));
        }
        self.parse_assignment()
    }

    fn parse_computed_property(&mut self) -> ParseResult<MemberProperty> {
        self.expect("[")?;
        let expr = self.allow_in(|p| p.parse_expression())?;
        self.expect("]")?;
        Ok(MemberProperty::Computed(Box::new(expr)))
    }

    fn parse_lhs(&mut self) -> ParseResult<Expr> {
        let start = self.token.span;
        let outer_peak = self.open_chain();
        let mut links = 0;
        let mut expr = if self.is_name("new") {
            self.parse_new()?
        } else if self.is_name("super") {
            self.parse_super()?
        } else {
            self.parse_primary()?
        };
        if matches!(expr.kind, ExprKind::Arrow(_)) {
            self.close_chain(outer_peak, links);
            return Ok(expr);
        }

        let mut in_chain = false;
        loop {
            let kind = if self.eat(".")? {
                let name = self.property_name()?;
                ExprKind::Member {
                    object: Box::new(expr),
                    property: MemberProperty::Named(name),
                    optional: false,
                }
            } else if self.eat("?.")? {
                in_chain = true;
                if self.is("(") {
                    ExprKind::Call {
                        callee: Box::new(expr),
                        arguments: self.parse_arguments()?,
                        optional: true,
                    }
                } else if self.is("[") {
                    ExprKind::Member {
                        object: Box::new(expr),
                        property: self.parse_computed_property()?,
                        optional: true,
                    }
                } else {
                    ExprKind::Member {
                        object: Box::new(expr),
                        property: MemberProperty::Named(self.property_name()?),
                        optional: true,
                    }
                }
            } else if self.is("[") {
                ExprKind::Member {
                    object: Box::new(expr),
                    property: self.parse_computed_property()?,
                    optional: false,
                }
            } else if self.is("(") {
                ExprKind::Call {
                    callee: Box::new(expr),
                    arguments: self.parse_arguments()?,
                    optional: false,
                }
            } else if matches!(self.token.kind, TokenKind::Template { head: true, .. }) {
                return Err(self.error_here("Tagged template literals are not supported"));
            } else {
                break;
            };
            expr = Expr::new(kind, self.finish(start));
            links += 1;
            self.grow_chain(links)?;
        }

        if in_chain {
            expr = Expr::new(
                ExprKind::Chain {
                    expression: Box::new(expr),
                },
                self.finish(start),
            );
            links += 1;
        }
        self.close_chain(outer_peak, links);
        Ok(expr)
    }

    fn parse_super(&mut self) -> ParseResult<Expr> {
        let start = self.advance()?.span;
        let kind = if self.is("(") {
            if !self.context.derived_constructor {
                return Err(self.error_at(start, "'super' keyword unexpected here"));
            }
            ExprKind::SuperCall {
                arguments: self.parse_arguments()?,
            }
        } else if self.is(".") || self.is("[") {
            if !self.context.method {
                return Err(self.error_at(start, "'super' keyword unexpected here"));
            }
            let property = if self.eat(".")? {
                MemberProperty::Named(self.property_name()?)
            } else {
                self.parse_computed_property()?
            };
            ExprKind::SuperMember { property }
        } else {
            return Err(self.error_at(start, "'super' keyword unexpected here"));
        };
        Ok(Expr::new(kind, self.finish(start)))
    }

    fn parse_new(&mut self) -> ParseResult<Expr> {
        self.nested(|p| {
            let start = p.advance()?.span;
            if p.is(".") {
                return Err(p.error_here("new.target is not supported"));
            }
            let outer_peak = p.open_chain();
            let mut links = 0;
            let mut callee = if p.is_name("new") {
                p.parse_new()?
            } else if p.is_name("super") {
                return Err(p.error_here("'super' keyword unexpected here"));
            } else {
                p.parse_primary()?
            };
            let callee_start = callee.span;
            loop {
                let kind = if p.eat(".")? {
                    ExprKind::Member {
                        object: Box::new(callee),
                        property: MemberProperty::Named(p.property_name()?),
                        optional: false,
                    }
                } else if p.is("[") {
                    ExprKind::Member {
                        object: Box::new(callee),
                        property: p.parse_computed_property()?,
                        optional: false,
                    }
                } else if p.is("?.") {
                    return Err(p.error_here("Invalid optional chain from new expression"));
                } else {
                    break;
                };
                callee = Expr::new(kind, p.finish(callee_start));
                links += 1;
                p.grow_chain(links)?;
            }
            p.close_chain(outer_peak, links);
            let arguments = if p.is("(") {
                p.parse_arguments()?
            } else {
                Vec::new()
            };
            Ok(Expr::new(
                ExprKind::New {
                    callee: Box::new(callee),
                    arguments,
                },
                p.finish(start),
            ))
        })
    }

    fn parse_primary(&mut self) -> ParseResult<Expr> {
        let start = self.token.span;
        let kind = match self.token.kind.clone() {
            TokenKind::Number(value) => {
                self.advance()?;
                ExprKind::Number { value }
            }
            TokenKind::String(value) => {
                self.advance()?;
                ExprKind::String { value }
            }
            TokenKind::Template { head: true, .. } => self.parse_template()?,
            TokenKind::Punct("(") => return self.parse_parenthesized(),
            TokenKind::Punct("[") => self.parse_array_literal()?,
            TokenKind::Punct("{") => self.parse_object_literal()?,
            TokenKind::Punct("/" | "/=") => {
                return Err(self.error_here("Regular expression literals are not supported"));
            }
            TokenKind::Name(name) => match name.as_str() {
                "this" => {
                    self.advance()?;
                    ExprKind::This
                }
                "null" => {
                    self.advance()?;
                    ExprKind::Null
                }
                "true" | "false" => {
                    self.advance()?;
                    ExprKind::Boolean {
                        value: name == "true",
                    }
                }
                "function" => {
                    self.advance()?;
                    if self.is("*") {
                        return Err(self.error_here("Generators are not supported"));
                    }
                    let id = if matches!(self.token.kind, TokenKind::Name(_)) {
                        Some(self.binding_identifier()?)
                    } else {
                        None
                    };
                    ExprKind::Function(self.parse_function_rest(id, FunctionKind::Plain)?)
                }
                "class" => ExprKind::Class(self.parse_class(false)?),
                "import" => {
                    return Err(self.error_here("Cannot use import statement outside a module"));
                }
                "yield" => return Err(self.error_here("Generators are not supported")),
                _ if is_reserved(&name) => return Err(self.unexpected()),
                _ => {
                    self.advance()?;
                    if name == "async" && !self.token.newline_before {
                        if self.is_name("function") {
                            return Err(self.error_at(start, "Async functions are not supported"));
                        }
                        if matches!(self.token.kind, TokenKind::Name(_)) {
                            return Err(
                                self.error_at(start, "Async arrow functions are not supported")
                            );
                        }
                    }
                    if self.is("=>") && !self.token.newline_before {
                        if name == "eval" || name == "arguments" {
                            return Err(
                                self.error_at(start, "Unexpected eval or arguments in strict mode")
                            );
                        }
                        let param = Param {
                            pattern: Pattern::new(PatternKind::Identifier { name }, start),
                            default: None,
                            rest: false,
                        };
                        return self.parse_arrow_body(start, vec![param]);
                    }
                    ExprKind::Identifier { name }
                }
            },
            _ => return Err(self.unexpected()),
        };
        Ok(Expr::new(kind, self.finish(start)))
    }

    /// `( ... )`: either a parenthesized expression or an arrow parameter list.
    fn parse_parenthesized(&mut self) -> ParseResult<Expr> {
        let start = self.advance()?.span;
        self.allow_in(|p| {
            let mut items = Vec::new();
            let mut rest = None;
            let mut trailing_comma = false;
            while !p.is(")") {
                if p.eat("...")? {
                    rest = Some(p.parse_binding_target()?);
                    break;
                }
                items.push(p.parse_assignment()?);
                if p.is(")") {
                    break;
                }
                p.expect(",")?;
                trailing_comma = p.is(")");
            }
            let close = p.token.span;
            p.expect(")")?;

            if p.is("=>") && !p.token.newline_before {
                let mut params = Vec::with_capacity(items.len() + 1);
                for item in items {
                    params.push(p.to_param(item)?);
                }
                if let Some(pattern) = rest {
                    params.push(Param {
                        pattern,
                        default: None,
                        rest: true,
                    });
                }
                p.clear_cover_error(start.start);
                return p.parse_arrow_body(start, params);
            }

            if items.is_empty() || rest.is_some() || trailing_comma {
                return Err(p.error_at(close, "Unexpected token ')'"));
            }
            let span = p.finish(start);
            let mut expr = if items.len() == 1 {
                items.remove(0)
            } else {
                Expr::new(ExprKind::Sequence { expressions: items }, span)
            };
            expr.span = span;
            Ok(expr)
        })
    }

    fn to_param(&self, item: Expr) -> ParseResult<Param> {
        let (pattern, default) = self.to_pattern_with_default(item, true)?;
        self.check_binding(&pattern)?;
        Ok(Param {
            pattern,
            default,
            rest: false,
        })
    }

    fn parse_template(&mut self) -> ParseResult<ExprKind> {
        let TokenKind::Template { cooked, tail, .. } = self.advance()?.kind else {
            return Err(self.unexpected());
        };
        let mut quasis = vec![cooked];
        let mut expressions = Vec::new();
        let mut done = tail;
        while !done {
            expressions.push(self.allow_in(|p| p.parse_expression())?);
            match &self.token.kind {
                TokenKind::Template {
                    head: false, tail, ..
                } => {
                    done = *tail;
                    if let TokenKind::Template { cooked, .. } = self.advance()?.kind {
                        quasis.push(cooked);
                    }
                }
                _ => return Err(self.unexpected()),
            }
        }
        Ok(ExprKind::Template {
            quasis,
            expressions,
        })
    }

    fn parse_array_literal(&mut self) -> ParseResult<ExprKind> {
        self.advance()?;
        self.allow_in(|p| {
            let mut elements = Vec::new();
            while !p.is("]") {
                if p.eat(",")? {
                    elements.push(None);
                    continue;
                }
                elements.push(Some(p.parse_spreadable()?));
                if !p.is("]") {
                    p.expect(",")?;
                }
            }
            p.advance()?;
            Ok(ExprKind::Array { elements })
        })
    }

    fn parse_object_literal(&mut self) -> ParseResult<ExprKind> {
        self.advance()?;
        self.allow_in(|p| {
            let mut properties = Vec::new();
            while !p.is("}") {
                if p.eat("...")? {
                    properties.push(Property::Spread {
                        argument: p.parse_assignment()?,
                    });
                } else {
                    properties.push(p.parse_object_property()?);
                }
                if !p.is("}") {
                    p.expect(",")?;
                }
            }
            p.advance()?;
            Ok(ExprKind::Object { properties })
        })
    }

    fn parse_object_property(&mut self) -> ParseResult<Property> {
        let start = self.token.span;
        let key = self.parse_member_key()?;

        if self.is("(") {
            let function = self.parse_function_rest(None, FunctionKind::Method)?;
            return Ok(Property::KeyValue {
                key,
                value: Expr::new(ExprKind::Function(function), self.finish(start)),
                shorthand: false,
                method: true,
            });
        }
        if self.eat(":")? {
            return Ok(Property::KeyValue {
                key,
                value: self.parse_assignment()?,
                shorthand: false,
                method: false,
            });
        }

        let name = match &key {
            PropertyKey::Identifier(name) if !is_reserved(name) => name.clone(),
            PropertyKey::Identifier(name) => {
                return Err(self.error_at(start, format!("Unexpected token '{name}'")));
            }
            _ => return Err(self.unexpected()),
        };
        let identifier = Expr::new(ExprKind::Identifier { name: name.clone() }, start);
        let value = if self.eat("=")? {
            let default = self.parse_assignment()?;
            if self.cover_error.is_none() {
                self.cover_error =
                    Some(self.error_at(start, "Invalid shorthand property initializer"));
            }
            Expr::new(
                ExprKind::Assign {
                    operator: AssignOp::Assign,
                    target: Box::new(Pattern::new(PatternKind::Identifier { name }, start)),
                    value: Box::new(default),
                },
                self.finish(start),
            )
        } else {
            identifier
        };
        Ok(Property::KeyValue {
            key,
            value,
            shorthand: true,
            method: false,
        })
    }
}

fn binary_precedence(op: BinaryOp) -> u8 {
    match op {
        BinaryOp::BitOr => 4,
        BinaryOp::BitXor => 5,
        BinaryOp::BitAnd => 6,
        BinaryOp::Eq | BinaryOp::NotEq | BinaryOp::StrictEq | BinaryOp::StrictNotEq => 7,
        BinaryOp::Lt
        | BinaryOp::LtEq
        | BinaryOp::Gt
        | BinaryOp::GtEq
        | BinaryOp::InstanceOf
        | BinaryOp::In => 8,
        BinaryOp::Shl | BinaryOp::Shr | BinaryOp::UShr => 9,
        BinaryOp::Add | BinaryOp::Sub => 10,
        BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => 11,
        BinaryOp::Exp => 12,
    }
}

fn starts_property_key(token: &Token) -> bool {
    !token.newline_before
        && matches!(
            token.kind,
            TokenKind::Name(_)
                | TokenKind::String(_)
                | TokenKind::Number(_)
                | TokenKind::Punct("[")
                | TokenKind::Punct("*")
        )
}

fn is_keyword(name: &str) -> bool {
    matches!(
        name,
        "break"
            | "case"
            | "catch"
            | "class"
            | "const"
            | "continue"
            | "debugger"
            | "default"
            | "delete"
            | "do"
            | "else"
            | "enum"
            | "export"
            | "extends"
            | "false"
            | "finally"
            | "for"
            | "function"
            | "if"
            | "import"
            | "in"
            | "instanceof"
            | "new"
            | "null"
            | "return"
            | "super"
            | "switch"
            | "this"
            | "throw"
            | "true"
            | "try"
            | "typeof"
            | "var"
            | "void"
            | "while"
            | "with"
    )
}

fn is_strict_reserved(name: &str) -> bool {
    matches!(
        name,
        "implements"
            | "interface"
            | "let"
            | "package"
            | "private"
            | "protected"
            | "public"
            | "static"
            | "yield"
    )
}

/// Words that can never name a binding or be referenced as a variable.
pub(crate) fn is_reserved(name: &str) -> bool {
    is_keyword(name) || is_strict_reserved(name) || name == "await"
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_err(src: &str) -> Diagnostic {
        parse_program(src).unwrap_err()
    }

    fn first_expr(src: &str) -> Expr {
        let program = parse_program(src).unwrap();
        match program.body.into_iter().next().unwrap().kind {
            StmtKind::Expression { expression } => expression,
            other => panic!("expected expression statement, got {other:?}"),
        }
    }

    #[test]
    fn empty_and_comment_only_programs_have_no_statements() {
        assert!(parse_program("").unwrap().body.is_empty());
        assert!(parse_program("  \n\t// nothing\n/* here */").unwrap().body.is_empty());
    }

    #[test]
    fn precedence_and_associativity() {
        let expr = first_expr("1 + 2 * 3 ** 2 ** 1;");
        let ExprKind::Binary {
            operator: BinaryOp::Add,
            right,
            ..
        } = expr.kind
        else {
            panic!("expected addition at the root");
        };
        let ExprKind::Binary {
            operator: BinaryOp::Mul,
            right,
            ..
        } = right.kind
        else {
            panic!("expected multiplication");
        };
        assert!(matches!(
            right.kind,
            ExprKind::Binary {
                operator: BinaryOp::Exp,
                ..
            }
        ));
    }

    #[test]
    fn automatic_semicolon_insertion() {
        let program = parse_program("let a = 1\nlet b = a\n++b\nfoo()").unwrap();
        assert_eq!(program.body.len(), 4);

        let program = parse_program("function f() { return\n42 }").unwrap();
        let StmtKind::Function(function) = &program.body[0].kind else {
            panic!("expected function");
        };
        let FunctionBody::Block(body) = &function.body else {
            panic!("expected block body");
        };
        assert_eq!(body.len(), 2);
    }

    #[test]
    fn arrow_functions_from_cover_grammar() {
        let expr = first_expr("(a, {b, c = 2}, [d], ...rest) => a + b;");
        let ExprKind::Arrow(function) = expr.kind else {
            panic!("expected arrow");
        };
        assert_eq!(function.params.len(), 4);
        assert!(function.params[3].rest);
        assert!(matches!(function.body, FunctionBody::Expression(_)));

        let expr = first_expr("x => ({ x });");
        assert!(matches!(expr.kind, ExprKind::Arrow(_)));
    }

    #[test]
    fn destructuring_assignment_and_for_heads() {
        let expr = first_expr("[a, b] = [b, a];");
        let ExprKind::Assign { target, .. } = expr.kind else {
            panic!("expected assignment");
        };
        assert!(matches!(target.kind, PatternKind::Array { .. }));

        let program = parse_program("for (const [k, v] of pairs) {} for (key in obj) {}").unwrap();
        assert!(matches!(program.body[0].kind, StmtKind::ForOf { .. }));
        assert!(matches!(program.body[1].kind, StmtKind::ForIn { .. }));
    }

    #[test]
    fn optional_chains_are_wrapped() {
        let expr = first_expr("a?.b.c();");
        assert!(matches!(expr.kind, ExprKind::Chain { .. }));
    }

    #[test]
    fn classes_with_inheritance() {
        let program = parse_program(
            "class A { constructor(x) { this.x = x; } static make() { return new A(1); } }\n\
             class B extends A { y = 2; constructor() { super(3); } get2() { return super.get(); } }",
        )
        .unwrap();
        let StmtKind::Class(class) = &program.body[1].kind else {
            panic!("expected class");
        };
        assert!(class.super_class.is_some());
        assert!(class.constructor.is_some());
        assert_eq!(class.members.len(), 2);
    }

    #[test]
    fn diagnostics_point_at_the_offending_token() {
        let err = parse_err("let x = 1;\nlet y = {;");
        assert_eq!(err.message, "Unexpected token ';'");
        assert_eq!((err.line, err.column), (2, 10));
        assert_eq!(err.phase, Phase::Parse);

        let err = parse_err("function f() {");
        assert_eq!(err.message, "Unexpected end of input");
    }

    #[test]
    fn context_sensitive_statements() {
        assert_eq!(parse_err("return 1").message, "Illegal return statement");
        assert_eq!(parse_err("break;").message, "Illegal break statement");
        assert_eq!(
            parse_err("const x;").message,
            "Missing initializer in const declaration"
        );
        assert_eq!(
            parse_err("1 = 2").message,
            "Invalid left-hand side in assignment"
        );
        assert!(parse_program("class A { m() { super(); } }").is_err());
        assert!(parse_program("while (true) { if (x) break; else continue; }").is_ok());
    }

    #[test]
    fn unsupported_constructs_are_rejected() {
        for src in [
            "let r = /ab+c/;",
            "async function f() {}",
            "function* g() {}",
            "import fs from 'fs';",
            "outer: for (;;) {}",
            "const o = { get x() { return 1; } };",
            "tag`hello`;",
            "({ a = 1 });",
            "-2 ** 2;",
        ] {
            assert!(parse_program(src).is_err(), "{src} should be rejected");
        }
    }

    #[test]
    fn shorthand_defaults_are_fine_as_patterns() {
        assert!(parse_program("({ a = 1, b } = obj);").is_ok());
        assert!(parse_program("const f = ({ a = 1 }) => a;").is_ok());
    }

    #[test]
    fn nesting_depth_is_bounded() {
        let deep = format!("{}1{}", "(".repeat(400), ")".repeat(400));
        let err = parse_err(&deep);
        assert_eq!(err.message, "Maximum nesting depth exceeded");

        let moderate = format!("{}1{}", "[".repeat(20), "]".repeat(20));
        assert!(parse_program(&moderate).is_ok());
    }

    #[test]
    fn long_chains_count_towards_tree_height() {
        let sum = format!("x = 1{}", " + x".repeat(50_000));
        assert_eq!(parse_err(&sum).message, "Expression is nested too deeply");

        let calls = format!("f{}", "()".repeat(50_000));
        assert_eq!(parse_err(&calls).message, "Expression is nested too deeply");

        let members = format!("new a{}", ".b".repeat(50_000));
        assert_eq!(parse_err(&members).message, "Expression is nested too deeply");

        assert!(parse_program(&format!("x = 1{}", " + x".repeat(500))).is_ok());
        assert!(parse_program(&format!("o{}", ".next".repeat(500))).is_ok());
    }

    #[test]
    fn chain_height_includes_its_operands() {
        // Each parenthesised group is a 400-link chain; stacking three exceeds the limit.
        let group = format!("(1{})", " * 2".repeat(400));
        let stacked = format!("{group} + {group}");
        assert!(parse_program(&stacked).is_ok());

        let nested = format!("(({group}{links}){links}){links}", links = " - 1".repeat(400));
        assert_eq!(parse_err(&nested).message, "Expression is nested too deeply");
    }
}
