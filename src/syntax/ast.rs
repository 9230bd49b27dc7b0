//! Syntax tree produced by the parser.

use serde::Serialize;
use std::sync::Arc;

/// Location of a node in the original source text.
///
/// `start`/`end` are byte offsets; `line`/`column` are the 1-based position of
/// the first character (columns count characters, not bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Span {
    /// Byte offset of the first character.
    pub start: usize,
    /// Byte offset one past the last character.
    pub end: usize,
    /// 1-based line of `start`.
    pub line: usize,
    /// 1-based column of `start`.
    pub column: usize,
}

impl Span {
    /// Span covering `self` through the end of `other`.
    pub fn to(self, other: Span) -> Span {
        Span {
            start: self.start,
            end: other.end.max(self.end),
            line: self.line,
            column: self.column,
        }
    }
}

/// Root of a parsed script.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename = "Program")]
pub struct Program {
    /// Top-level statements in source order.
    pub body: Vec<Stmt>,
    /// Span of the whole input.
    pub span: Span,
}

/// A statement node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stmt {
    /// Kind-specific payload.
    #[serde(flatten)]
    pub kind: StmtKind,
    /// Source location.
    pub span: Span,
}

impl Stmt {
    /// Wrap a kind with its span.
    pub fn new(kind: StmtKind, span: Span) -> Self {
        Self { kind, span }
    }
}

/// Statement variants.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum StmtKind {
    /// `expr;`
    #[serde(rename = "ExpressionStatement")]
    Expression {
        /// Evaluated expression.
        expression: Expr,
    },
    /// `var`/`let`/`const` declaration.
    #[serde(rename = "VariableDeclaration")]
    Variable(VariableDeclaration),
    /// `function name(...) { ... }`
    #[serde(rename = "FunctionDeclaration")]
    Function(Arc<Function>),
    /// `class Name { ... }`
    #[serde(rename = "ClassDeclaration")]
    Class(Arc<Class>),
    /// `return expr;`
    #[serde(rename = "ReturnStatement")]
    Return {
        /// Returned value, if any.
        argument: Option<Expr>,
    },
    /// `if (test) consequent else alternate`
    #[serde(rename = "IfStatement")]
    If {
        /// Condition.
        test: Expr,
        /// Taken when the condition is truthy.
        consequent: Box<Stmt>,
        /// Optional `else` branch.
        alternate: Option<Box<Stmt>>,
    },
    /// `{ ... }`
    #[serde(rename = "BlockStatement")]
    Block {
        /// Statements in the block.
        body: Vec<Stmt>,
    },
    /// `while (test) body`
    #[serde(rename = "WhileStatement")]
    While {
        /// Loop condition.
        test: Expr,
        /// Loop body.
        body: Box<Stmt>,
    },
    /// `do body while (test)`
    #[serde(rename = "DoWhileStatement")]
    DoWhile {
        /// Loop body.
        body: Box<Stmt>,
        /// Loop condition.
        test: Expr,
    },
    /// `for (init; test; update) body`
    #[serde(rename = "ForStatement")]
    For {
        /// Initializer.
        init: Option<ForInit>,
        /// Condition.
        test: Option<Expr>,
        /// Update expression.
        update: Option<Expr>,
        /// Loop body.
        body: Box<Stmt>,
    },
    /// `for (left in right) body`
    #[serde(rename = "ForInStatement")]
    ForIn {
        /// Binding target.
        left: ForHead,
        /// Object whose keys are enumerated.
        right: Expr,
        /// Loop body.
        body: Box<Stmt>,
    },
    /// `for (left of right) body`
    #[serde(rename = "ForOfStatement")]
    ForOf {
        /// Binding target.
        left: ForHead,
        /// Iterated value.
        right: Expr,
        /// Loop body.
        body: Box<Stmt>,
    },
    /// `break;`
    #[serde(rename = "BreakStatement")]
    Break,
    /// `continue;`
    #[serde(rename = "ContinueStatement")]
    Continue,
    /// `throw expr;`
    #[serde(rename = "ThrowStatement")]
    Throw {
        /// Thrown value.
        argument: Expr,
    },
    /// `try { } catch (e) { } finally { }`
    #[serde(rename = "TryStatement")]
    Try {
        /// Protected block.
        block: Vec<Stmt>,
        /// Optional catch clause.
        handler: Option<CatchClause>,
        /// Optional finally block.
        finalizer: Option<Vec<Stmt>>,
    },
    /// `switch (discriminant) { case ...: }`
    #[serde(rename = "SwitchStatement")]
    Switch {
        /// Value compared against each case.
        discriminant: Expr,
        /// Cases in source order.
        cases: Vec<SwitchCase>,
    },
    /// `;`
    #[serde(rename = "EmptyStatement")]
    Empty,
    /// `debugger;`
    #[serde(rename = "DebuggerStatement")]
    Debugger,
}

/// Declaration keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeclarationKind {
    /// `var`
    Var,
    /// `let`
    Let,
    /// `const`
    Const,
}

impl DeclarationKind {
    /// Source keyword.
    pub fn as_str(self) -> &'static str {
        match self {
            DeclarationKind::Var => "var",
            DeclarationKind::Let => "let",
            DeclarationKind::Const => "const",
        }
    }
}

/// `var a = 1, b;`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariableDeclaration {
    /// Declaration keyword.
    pub kind: DeclarationKind,
    /// Individual declarators.
    pub declarations: Vec<VariableDeclarator>,
}

/// One `target = init` entry in a declaration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariableDeclarator {
    /// Binding target.
    pub id: Pattern,
    /// Initial value.
    pub init: Option<Expr>,
}

/// Initializer slot of a classic `for` loop.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ForInit {
    /// `for (let i = 0; ...)`
    Declaration(VariableDeclaration),
    /// `for (i = 0; ...)`
    Expression(Expr),
}

/// Left-hand side of `for-in`/`for-of`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ForHead {
    /// `for (const x of ...)`
    Declaration {
        /// Declaration keyword.
        kind: DeclarationKind,
        /// Bound pattern.
        id: Pattern,
    },
    /// `for (x of ...)`
    Pattern(Pattern),
}

/// `catch (param) { body }`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatchClause {
    /// Optional binding for the caught value.
    pub param: Option<Pattern>,
    /// Handler body.
    pub body: Vec<Stmt>,
}

/// `case test: consequent` (or `default:` when `test` is `None`).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SwitchCase {
    /// Case value; `None` for `default`.
    pub test: Option<Expr>,
    /// Statements run when the case matches.
    pub consequent: Vec<Stmt>,
}

/// Shared function definition (declarations, expressions, arrows, methods).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Function {
    /// Declared name, if any.
    pub id: Option<String>,
    /// Formal parameters.
    pub params: Vec<Param>,
    /// Body.
    pub body: FunctionBody,
    /// Arrow functions bind `this` lexically.
    pub is_arrow: bool,
}

/// One formal parameter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Param {
    /// Bound pattern.
    pub pattern: Pattern,
    /// Default value used when the argument is `undefined`.
    pub default: Option<Expr>,
    /// `...rest` parameter.
    pub rest: bool,
}

/// Function body.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FunctionBody {
    /// `{ statements }`
    Block(Vec<Stmt>),
    /// Concise arrow body.
    Expression(Box<Expr>),
}

/// Class definition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Class {
    /// Class name, if any.
    pub id: Option<String>,
    /// `extends` clause.
    pub super_class: Option<Box<Expr>>,
    /// Explicit constructor.
    pub constructor: Option<Arc<Function>>,
    /// Methods and fields (constructor excluded).
    pub members: Vec<ClassMember>,
}

/// Method or field in a class body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassMember {
    /// Member name.
    pub key: PropertyKey,
    /// `static` members live on the constructor.
    pub is_static: bool,
    /// Method body or field initializer.
    pub value: ClassMemberValue,
}

/// Payload of a class member.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum ClassMemberValue {
    /// `name(...) { ... }`
    Method(Arc<Function>),
    /// `name = init;`
    Field(Option<Expr>),
}

/// Property name in object literals, patterns and classes.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum PropertyKey {
    /// `name`
    Identifier(String),
    /// `"name"`
    String(String),
    /// `42`
    Number(f64),
    /// `[expr]`
    Computed(Box<Expr>),
}

/// An expression node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Expr {
    /// Kind-specific payload.
    #[serde(flatten)]
    pub kind: ExprKind,
    /// Source location.
    pub span: Span,
}

impl Expr {
    /// Wrap a kind with its span.
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self { kind, span }
    }

    /// Identifier name, if this is a bare identifier.
    pub fn as_identifier(&self) -> Option<&str> {
        match &self.kind {
            ExprKind::Identifier { name } => Some(name),
            _ => None,
        }
    }
}

/// Expression variants.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum ExprKind {
    /// Numeric literal.
    #[serde(rename = "NumericLiteral")]
    Number {
        /// Literal value.
        value: f64,
    },
    /// String literal.
    #[serde(rename = "StringLiteral")]
    String {
        /// Cooked value.
        value: String,
    },
    /// `true`/`false`
    #[serde(rename = "BooleanLiteral")]
    Boolean {
        /// Literal value.
        value: bool,
    },
    /// `null`
    #[serde(rename = "NullLiteral")]
    Null,
    /// Template literal; `quasis.len() == expressions.len() + 1`.
    #[serde(rename = "TemplateLiteral")]
    Template {
        /// Cooked string pieces.
        quasis: Vec<String>,
        /// Substituted expressions.
        expressions: Vec<Expr>,
    },
    /// Variable reference.
    Identifier {
        /// Referenced name.
        name: String,
    },
    /// `this`
    #[serde(rename = "ThisExpression")]
    This,
    /// `[a, , ...b]`
    #[serde(rename = "ArrayExpression")]
    Array {
        /// Elements; `None` is a hole.
        elements: Vec<Option<Expr>>,
    },
    /// `{ a: 1, b, ...c }`
    #[serde(rename = "ObjectExpression")]
    Object {
        /// Properties in source order.
        properties: Vec<Property>,
    },
    /// `function (...) { }`
    #[serde(rename = "FunctionExpression")]
    Function(Arc<Function>),
    /// `(...) => ...`
    #[serde(rename = "ArrowFunctionExpression")]
    Arrow(Arc<Function>),
    /// `class { }`
    #[serde(rename = "ClassExpression")]
    Class(Arc<Class>),
    /// `op argument`
    #[serde(rename = "UnaryExpression")]
    Unary {
        /// Operator.
        operator: UnaryOp,
        /// Operand.
        argument: Box<Expr>,
    },
    /// `++x`, `x--`
    #[serde(rename = "UpdateExpression")]
    Update {
        /// Operator.
        operator: UpdateOp,
        /// Prefix form.
        prefix: bool,
        /// Updated reference.
        argument: Box<Expr>,
    },
    /// Arithmetic, comparison, bitwise and relational operators.
    #[serde(rename = "BinaryExpression")]
    Binary {
        /// Operator.
        operator: BinaryOp,
        /// Left operand.
        left: Box<Expr>,
        /// Right operand.
        right: Box<Expr>,
    },
    /// `&&`, `||`, `??`
    #[serde(rename = "LogicalExpression")]
    Logical {
        /// Operator.
        operator: LogicalOp,
        /// Left operand.
        left: Box<Expr>,
        /// Right operand (evaluated lazily).
        right: Box<Expr>,
    },
    /// `target op= value`
    #[serde(rename = "AssignmentExpression")]
    Assign {
        /// Operator.
        operator: AssignOp,
        /// Assigned reference or destructuring pattern.
        target: Box<Pattern>,
        /// Right-hand side.
        value: Box<Expr>,
    },
    /// `test ? consequent : alternate`
    #[serde(rename = "ConditionalExpression")]
    Conditional {
        /// Condition.
        test: Box<Expr>,
        /// Truthy branch.
        consequent: Box<Expr>,
        /// Falsy branch.
        alternate: Box<Expr>,
    },
    /// `callee(args)`
    #[serde(rename = "CallExpression")]
    Call {
        /// Called value.
        callee: Box<Expr>,
        /// Arguments (may contain spreads).
        arguments: Vec<Expr>,
        /// `callee?.(args)`
        optional: bool,
    },
    /// `new callee(args)`
    #[serde(rename = "NewExpression")]
    New {
        /// Constructor.
        callee: Box<Expr>,
        /// Arguments (may contain spreads).
        arguments: Vec<Expr>,
    },
    /// `object.name`, `object[expr]`, `object?.name`
    #[serde(rename = "MemberExpression")]
    Member {
        /// Object being accessed.
        object: Box<Expr>,
        /// Accessed property.
        property: MemberProperty,
        /// `?.` access.
        optional: bool,
    },
    /// `super(args)`
    #[serde(rename = "SuperCall")]
    SuperCall {
        /// Arguments (may contain spreads).
        arguments: Vec<Expr>,
    },
    /// `super.name`, `super[expr]`
    #[serde(rename = "SuperMember")]
    SuperMember {
        /// Accessed property.
        property: MemberProperty,
    },
    /// Boundary of an optional chain (`a?.b.c`).
    #[serde(rename = "ChainExpression")]
    Chain {
        /// Chain body.
        expression: Box<Expr>,
    },
    /// `a, b, c`
    #[serde(rename = "SequenceExpression")]
    Sequence {
        /// Expressions evaluated in order.
        expressions: Vec<Expr>,
    },
    /// `...argument` inside arrays and argument lists.
    #[serde(rename = "SpreadElement")]
    Spread {
        /// Spread operand.
        argument: Box<Expr>,
    },
}

/// Property accessed by a member expression.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum MemberProperty {
    /// `.name`
    Named(String),
    /// `[expr]`
    Computed(Box<Expr>),
}

/// Entry of an object literal.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum Property {
    /// `key: value`, shorthand `key`, or method `key() {}`.
    #[serde(rename = "Property")]
    KeyValue {
        /// Property name.
        key: PropertyKey,
        /// Property value.
        value: Expr,
        /// Written as `{ key }`.
        shorthand: bool,
        /// Written as `key() {}`.
        method: bool,
    },
    /// `...argument`
    #[serde(rename = "SpreadElement")]
    Spread {
        /// Spread operand.
        argument: Expr,
    },
}

/// Binding or assignment target.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Pattern {
    /// Kind-specific payload.
    #[serde(flatten)]
    pub kind: PatternKind,
    /// Source location.
    pub span: Span,
}

impl Pattern {
    /// Wrap a kind with its span.
    pub fn new(kind: PatternKind, span: Span) -> Self {
        Self { kind, span }
    }

    /// Names bound by this pattern, in source order.
    pub fn bound_names(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.collect_names(&mut names);
        names
    }

    fn collect_names<'a>(&'a self, names: &mut Vec<&'a str>) {
        match &self.kind {
            PatternKind::Identifier { name } => names.push(name),
            PatternKind::Object { properties, rest } => {
                for property in properties {
                    property.value.collect_names(names);
                }
                if let Some(rest) = rest {
                    rest.collect_names(names);
                }
            }
            PatternKind::Array { elements, rest } => {
                for element in elements.iter().flatten() {
                    element.target.collect_names(names);
                }
                if let Some(rest) = rest {
                    rest.collect_names(names);
                }
            }
            PatternKind::Expression { .. } => {}
        }
    }
}

/// Pattern variants.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum PatternKind {
    /// Plain name.
    Identifier {
        /// Bound name.
        name: String,
    },
    /// `{ a, b: c = 1, ...rest }`
    #[serde(rename = "ObjectPattern")]
    Object {
        /// Destructured properties.
        properties: Vec<PatternProperty>,
        /// Rest target.
        rest: Option<Box<Pattern>>,
    },
    /// `[a, , b = 1, ...rest]`
    #[serde(rename = "ArrayPattern")]
    Array {
        /// Elements; `None` is a hole.
        elements: Vec<Option<PatternElement>>,
        /// Rest target.
        rest: Option<Box<Pattern>>,
    },
    /// Member expression target (`obj.x = 1`); only valid in assignments.
    #[serde(rename = "MemberPattern")]
    Expression {
        /// Target expression.
        expression: Box<Expr>,
    },
}

/// `key: target = default` inside an object pattern.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatternProperty {
    /// Source property.
    pub key: PropertyKey,
    /// Destination pattern.
    pub value: Pattern,
    /// Default when the property is `undefined`.
    pub default: Option<Expr>,
    /// Written as `{ key }`.
    pub shorthand: bool,
}

/// `target = default` inside an array pattern.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatternElement {
    /// Destination pattern.
    pub target: Pattern,
    /// Default when the element is `undefined`.
    pub default: Option<Expr>,
}

macro_rules! operator_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
        pub enum $name {
            $(
                #[doc = concat!("`", $text, "`")]
                #[serde(rename = $text)]
                $variant,
            )+
        }

        impl $name {
            /// Source spelling of the operator.
            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }

            /// Look up an operator by its source spelling.
            pub fn from_symbol(text: &str) -> Option<Self> {
                match text {
                    $($text => Some($name::$variant),)+
                    _ => None,
                }
            }
        }
    };
}

operator_enum!(
    /// Prefix unary operators.
    UnaryOp {
        Minus => "-",
        Plus => "+",
        Not => "!",
        BitNot => "~",
        TypeOf => "typeof",
        Void => "void",
        Delete => "delete",
    }
);

operator_enum!(
    /// `++` / `--`
    UpdateOp {
        Increment => "++",
        Decrement => "--",
    }
);

operator_enum!(
    /// Non-short-circuit binary operators.
    BinaryOp {
        Add => "+",
        Sub => "-",
        Mul => "*",
        Div => "/",
        Rem => "%",
        Exp => "**",
        Eq => "==",
        NotEq => "!=",
        StrictEq => "===",
        StrictNotEq => "!==",
        Lt => "<",
        LtEq => "<=",
        Gt => ">",
        GtEq => ">=",
        BitAnd => "&",
        BitOr => "|",
        BitXor => "^",
        Shl => "<<",
        Shr => ">>",
        UShr => ">>>",
        InstanceOf => "instanceof",
        In => "in",
    }
);

operator_enum!(
    /// Short-circuit operators.
    LogicalOp {
        And => "&&",
        Or => "||",
        Nullish => "??",
    }
);

operator_enum!(
    /// Assignment operators.
    AssignOp {
        Assign => "=",
        Add => "+=",
        Sub => "-=",
        Mul => "*=",
        Div => "/=",
        Rem => "%=",
        Exp => "**=",
        Shl => "<<=",
        Shr => ">>=",
        UShr => ">>>=",
        BitAnd => "&=",
        BitOr => "|=",
        BitXor => "^=",
        And => "&&=",
        Or => "||=",
        Nullish => "??=",
    }
);

impl AssignOp {
    /// Arithmetic operator applied by a compound assignment.
    pub fn binary(self) -> Option<BinaryOp> {
        Some(match self {
            AssignOp::Add => BinaryOp::Add,
            AssignOp::Sub => BinaryOp::Sub,
            AssignOp::Mul => BinaryOp::Mul,
            AssignOp::Div => BinaryOp::Div,
            AssignOp::Rem => BinaryOp::Rem,
            AssignOp::Exp => BinaryOp::Exp,
            AssignOp::Shl => BinaryOp::Shl,
            AssignOp::Shr => BinaryOp::Shr,
            AssignOp::UShr => BinaryOp::UShr,
            AssignOp::BitAnd => BinaryOp::BitAnd,
            AssignOp::BitOr => BinaryOp::BitOr,
            AssignOp::BitXor => BinaryOp::BitXor,
            AssignOp::Assign | AssignOp::And | AssignOp::Or | AssignOp::Nullish => return None,
        })
    }

    /// Short-circuit operator applied by a logical assignment.
    pub fn logical(self) -> Option<LogicalOp> {
        match self {
            AssignOp::And => Some(LogicalOp::And),
            AssignOp::Or => Some(LogicalOp::Or),
            AssignOp::Nullish => Some(LogicalOp::Nullish),
            _ => None,
        }
    }
}
