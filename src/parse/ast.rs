//! AST for parsed FlowQL statements.
//!
//! The AST is deliberately small: identifiers are unresolved names; the
//! engine resolves them against the description registry when it populates
//! the view model.

/// A parsed expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Unresolved identifier.
    Ident(String),
    /// Integer or decimal literal, kept verbatim.
    Number(String),
    /// String literal (contents without quotes).
    StringLit(String),
    /// Function call: `name(args...)`.
    Call { name: String, args: Vec<Expr> },
    /// Binary operation.
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// `NOT expr`
    Not(Box<Expr>),
    /// `expr [NOT] IN (values...)`
    In {
        expr: Box<Expr>,
        values: Vec<Expr>,
        negated: bool,
    },
}

/// Binary operators, arithmetic through boolean.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
    Like,
    And,
    Or,
}

/// One SELECT list item.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectItem {
    pub expr: Expr,
    pub alias: Option<String>,
}

/// Sort direction as written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderDir {
    Asc,
    Desc,
}

/// One ORDER BY item: an identifier with optional direction.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderItem {
    pub name: String,
    pub dir: Option<OrderDir>,
}

/// A full FlowQL statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub select: Vec<SelectItem>,
    pub from: String,
    pub where_clause: Option<Expr>,
    pub group_by: Vec<String>,
    pub having: Option<Expr>,
    pub order_by: Vec<OrderItem>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}
