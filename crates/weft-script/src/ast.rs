//! AST for the federation payload dialect.

use std::rc::Rc;

/// A statement in a payload program.
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// `import local from 'specifier';` — resolved through the module resolver.
    Import { local: String, specifier: String },
    /// `var`/`let`/`const` declaration. The dialect does not distinguish
    /// binding kinds; all declare in the enclosing scope.
    VarDecl { name: String, init: Option<Expr> },
    If {
        cond: Expr,
        then_branch: Vec<Stmt>,
        else_branch: Option<Vec<Stmt>>,
    },
    /// `for (var key in object) { ... }` — iterates keys in insertion order.
    ForIn {
        binding: String,
        object: Expr,
        body: Vec<Stmt>,
    },
    Return(Option<Expr>),
    Throw(Expr),
    Block(Vec<Stmt>),
    Expr(Expr),
}

/// An expression in a payload program.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Null,
    Undefined,
    Bool(bool),
    Number(f64),
    Str(String),
    Ident(String),
    Array(Vec<Expr>),
    /// Object literal with insertion-ordered properties.
    Object(Vec<(String, Expr)>),
    Function {
        params: Vec<String>,
        body: Rc<[Stmt]>,
    },
    Arrow {
        params: Vec<String>,
        body: ArrowBody,
    },
    Member {
        object: Box<Expr>,
        property: String,
    },
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Ternary {
        cond: Box<Expr>,
        then_expr: Box<Expr>,
        else_expr: Box<Expr>,
    },
    /// Assignment to an identifier, member, or index target.
    Assign {
        target: Box<Expr>,
        value: Box<Expr>,
    },
}

/// Arrow function body: a single expression or a statement block.
#[derive(Debug, Clone, PartialEq)]
pub enum ArrowBody {
    Expr(Rc<Expr>),
    Block(Rc<[Stmt]>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    StrictEq,
    StrictNe,
    Lt,
    Gt,
    Le,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
}
