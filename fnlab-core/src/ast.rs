//! Syntax tree for the supported Python subset.
//!
//! Statements remember the range of token indices they were parsed from;
//! [`crate::analyzer::Program`] maps those back to source lines.

use std::ops::Range;
use std::sync::Arc;

use strum::Display;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Module {
    pub body: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub kind: StatementKind,
    pub tokens: Range<usize>,
}

pub type Block = Vec<Statement>;

#[derive(Debug, Clone, PartialEq)]
pub enum StatementKind {
    Expression(Expression),
    /// `a = b = value`; every target receives the same value.
    Assign {
        targets: Vec<Expression>,
        value: Expression,
    },
    AugAssign {
        target: Expression,
        op: BinaryOperator,
        value: Expression,
    },
    AnnAssign {
        target: Expression,
        annotation: Expression,
        value: Option<Expression>,
    },
    FunctionDef(Arc<FunctionDef>),
    ClassDef(ClassDef),
    Return(Option<Expression>),
    If {
        branches: Vec<(Expression, Block)>,
        orelse: Block,
    },
    While {
        condition: Expression,
        body: Block,
        orelse: Block,
    },
    For {
        target: Expression,
        iter: Expression,
        body: Block,
        orelse: Block,
    },
    Try {
        body: Block,
        handlers: Vec<ExceptHandler>,
        orelse: Block,
        finalbody: Block,
    },
    With {
        items: Vec<(Expression, Option<Expression>)>,
        body: Block,
    },
    Raise {
        exception: Option<Expression>,
        cause: Option<Expression>,
    },
    Assert {
        test: Expression,
        message: Option<Expression>,
    },
    Delete(Vec<Expression>),
    Import(Vec<Alias>),
    ImportFrom {
        module: String,
        names: Vec<Alias>,
    },
    Global(Vec<String>),
    Nonlocal(Vec<String>),
    Pass,
    Break,
    Continue,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Alias {
    pub name: String,
    pub asname: Option<String>,
}

impl Alias {
    /// Name bound in the importing namespace.
    pub fn binding(&self) -> &str {
        match &self.asname {
            Some(asname) => asname,
            None => self.name.split('.').next().unwrap_or(&self.name),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    pub name: String,
    pub params: Vec<Parameter>,
    pub body: Block,
    pub decorators: Vec<Expression>,
    pub returns: Option<Expression>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassDef {
    pub name: String,
    pub bases: Vec<Argument>,
    pub body: Block,
    pub decorators: Vec<Expression>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterKind {
    Positional,
    /// `*args`
    VarPositional,
    /// After `*` or `*args`
    KeywordOnly,
    /// `**kwargs`
    VarKeyword,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub kind: ParameterKind,
    pub default: Option<Expression>,
    pub annotation: Option<Expression>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExceptHandler {
    pub class: Option<Expression>,
    pub name: Option<String>,
    pub body: Block,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Lambda {
    pub params: Vec<Parameter>,
    pub body: Expression,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Ellipsis,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FStringElement {
    Text(String),
    Field {
        value: Box<Expression>,
        conversion: Option<char>,
        format_spec: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum DictEntry {
    Pair(Expression, Expression),
    Unpack(Expression),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Comprehension {
    pub target: Expression,
    pub iter: Expression,
    pub conditions: Vec<Expression>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Argument {
    Positional(Expression),
    Keyword { name: String, value: Expression },
    /// `*iterable`
    Unpack(Expression),
    /// `**mapping`
    UnpackKeywords(Expression),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Constant(Constant),
    FString(Vec<FStringElement>),
    Name(String),
    List(Vec<Expression>),
    Tuple(Vec<Expression>),
    Set(Vec<Expression>),
    Dict(Vec<DictEntry>),
    ListComp {
        element: Box<Expression>,
        generators: Vec<Comprehension>,
    },
    SetComp {
        element: Box<Expression>,
        generators: Vec<Comprehension>,
    },
    DictComp {
        key: Box<Expression>,
        value: Box<Expression>,
        generators: Vec<Comprehension>,
    },
    Starred(Box<Expression>),
    Unary {
        op: UnaryOperator,
        operand: Box<Expression>,
    },
    Binary {
        op: BinaryOperator,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    BoolOp {
        op: BoolOperator,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    /// `a < b <= c`, evaluated pairwise with short-circuit.
    Compare {
        left: Box<Expression>,
        comparisons: Vec<(CompareOperator, Expression)>,
    },
    IfExp {
        condition: Box<Expression>,
        body: Box<Expression>,
        orelse: Box<Expression>,
    },
    Lambda(Arc<Lambda>),
    Call {
        func: Box<Expression>,
        args: Vec<Argument>,
    },
    Attribute {
        value: Box<Expression>,
        attr: String,
    },
    Subscript {
        value: Box<Expression>,
        index: Box<Expression>,
    },
    Slice {
        lower: Option<Box<Expression>>,
        upper: Option<Box<Expression>>,
        step: Option<Box<Expression>>,
    },
    NamedExpr {
        name: String,
        value: Box<Expression>,
    },
    Yield(Option<Box<Expression>>),
    YieldFrom(Box<Expression>),
}

impl Expression {
    pub fn name(name: &str) -> Self {
        Expression::Name(name.to_string())
    }

    pub fn is_assignable(&self) -> bool {
        match self {
            Expression::Name(_) | Expression::Attribute { .. } | Expression::Subscript { .. } => {
                true
            }
            Expression::Tuple(items) | Expression::List(items) => {
                items.iter().all(|item| match item {
                    Expression::Starred(inner) => inner.is_assignable(),
                    other => other.is_assignable(),
                })
            }
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum UnaryOperator {
    #[strum(serialize = "unary +")]
    Plus,
    #[strum(serialize = "unary -")]
    Minus,
    #[strum(serialize = "not")]
    Not,
    #[strum(serialize = "unary ~")]
    Invert,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum BinaryOperator {
    #[strum(serialize = "+")]
    Add,
    #[strum(serialize = "-")]
    Sub,
    #[strum(serialize = "*")]
    Mul,
    #[strum(serialize = "/")]
    Div,
    #[strum(serialize = "//")]
    FloorDiv,
    #[strum(serialize = "%")]
    Mod,
    #[strum(serialize = "** or pow()")]
    Pow,
    #[strum(serialize = "@")]
    MatMul,
    #[strum(serialize = "<<")]
    LShift,
    #[strum(serialize = ">>")]
    RShift,
    #[strum(serialize = "&")]
    BitAnd,
    #[strum(serialize = "|")]
    BitOr,
    #[strum(serialize = "^")]
    BitXor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum BoolOperator {
    #[strum(serialize = "and")]
    And,
    #[strum(serialize = "or")]
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum CompareOperator {
    #[strum(serialize = "==")]
    Eq,
    #[strum(serialize = "!=")]
    NotEq,
    #[strum(serialize = "<")]
    Lt,
    #[strum(serialize = "<=")]
    LtE,
    #[strum(serialize = ">")]
    Gt,
    #[strum(serialize = ">=")]
    GtE,
    #[strum(serialize = "in")]
    In,
    #[strum(serialize = "not in")]
    NotIn,
    #[strum(serialize = "is")]
    Is,
    #[strum(serialize = "is not")]
    IsNot,
}
