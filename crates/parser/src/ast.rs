//! AST for Breeze programs.
//!
//! The tree is owned and mutated in place by the later passes. Call and
//! function-literal nodes carry a [`NodeId`] so those passes can attach
//! per-node records (adapter wrappers, expected return types, anonymous
//! scope names) without keying on addresses.

use crate::types::Type;

/// Unique identifier for AST nodes that later passes hang data on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub fn new(id: u32) -> Self {
        NodeId(id)
    }

    pub fn as_u32(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "node{}", self.0)
    }
}

/// Hands out monotonically increasing node IDs during a parse.
#[derive(Debug, Default)]
pub struct NodeIdGenerator {
    next: u32,
}

impl NodeIdGenerator {
    pub fn new() -> Self {
        NodeIdGenerator { next: 1 }
    }

    pub fn next(&mut self) -> NodeId {
        let id = NodeId(self.next);
        self.next += 1;
        id
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Program {
    pub statements: Vec<Stmt>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Block {
    pub statements: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// `a, b = expr`; every target shares the one value.
    Assignment {
        targets: Vec<Expr>,
        value: Expr,
        line: u32,
    },
    Expression(Expr),
    Return {
        values: Vec<Expr>,
        line: u32,
    },
    If {
        condition: Expr,
        consequence: Block,
        alternative: Option<Block>,
    },
    While {
        condition: Expr,
        body: Block,
    },
    For {
        binding: String,
        iterable: Expr,
        body: Block,
    },
    Import {
        path: String,
        line: u32,
    },
    /// Host `defer` with its operand captured verbatim from the source.
    Defer {
        text: String,
    },
    /// Host `go` with its operand captured verbatim from the source.
    Go {
        text: String,
    },
}

/// A named parameter of a function literal. Types live in the symbol
/// tables, not here.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Ident {
        name: String,
        line: u32,
        column: u32,
    },
    Int {
        value: i64,
    },
    Float {
        value: f64,
    },
    Str {
        value: String,
    },
    Bool {
        value: bool,
    },
    None,
    Prefix {
        op: String,
        operand: Box<Expr>,
    },
    Infix {
        op: String,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Call {
        id: NodeId,
        function: Box<Expr>,
        args: Vec<Option<Expr>>,
        line: u32,
    },
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
    },
    Selector {
        object: Box<Expr>,
        field: String,
    },
    /// `def(a, b):` block. `name` is filled by the analyzer when the
    /// literal is bound; anonymous literals get a synthetic scope name.
    Function {
        id: NodeId,
        name: String,
        params: Vec<Param>,
        body: Block,
    },
    Array {
        elements: Vec<Expr>,
        elem_type: Type,
    },
    MapLit {
        pairs: Vec<(Expr, Expr)>,
        key_type: Type,
        value_type: Type,
    },
    /// `<-ch`
    Receive {
        channel: Box<Expr>,
    },
    /// `ch <- value`
    Send {
        channel: Box<Expr>,
        value: Box<Expr>,
    },
    /// Inserted by the transformer: `target(operand)` host conversion.
    TypeConversion {
        target: Type,
        operand: Box<Expr>,
    },
    /// Opaque host-syntax fragment the generator reproduces verbatim.
    HostText(String),
}

impl Expr {
    pub fn ident_name(&self) -> Option<&str> {
        match self {
            Expr::Ident { name, .. } => Some(name),
            _ => None,
        }
    }

    pub fn line(&self) -> u32 {
        match self {
            Expr::Ident { line, .. } | Expr::Call { line, .. } => *line,
            Expr::Prefix { operand, .. } => operand.line(),
            Expr::Infix { left, .. } => left.line(),
            Expr::Selector { object, .. } | Expr::Index { object, .. } => object.line(),
            _ => 0,
        }
    }

    /// Pre-order walk over this expression and every nested one,
    /// including those inside function-literal bodies.
    pub fn walk(&self, f: &mut impl FnMut(&Expr)) {
        f(self);
        match self {
            Expr::Prefix { operand, .. } => operand.walk(f),
            Expr::Infix { left, right, .. } => {
                left.walk(f);
                right.walk(f);
            }
            Expr::Call { function, args, .. } => {
                function.walk(f);
                for arg in args.iter().flatten() {
                    arg.walk(f);
                }
            }
            Expr::Index { object, index } => {
                object.walk(f);
                index.walk(f);
            }
            Expr::Selector { object, .. } => object.walk(f),
            Expr::Function { body, .. } => body.walk_exprs(f),
            Expr::Array { elements, .. } => {
                for elem in elements {
                    elem.walk(f);
                }
            }
            Expr::MapLit { pairs, .. } => {
                for (key, value) in pairs {
                    key.walk(f);
                    value.walk(f);
                }
            }
            Expr::Receive { channel } => channel.walk(f),
            Expr::Send { channel, value } => {
                channel.walk(f);
                value.walk(f);
            }
            Expr::TypeConversion { operand, .. } => operand.walk(f),
            _ => {}
        }
    }
}

impl Block {
    pub fn walk_exprs(&self, f: &mut impl FnMut(&Expr)) {
        for stmt in &self.statements {
            stmt.walk_exprs(f);
        }
    }
}

impl Stmt {
    pub fn walk_exprs(&self, f: &mut impl FnMut(&Expr)) {
        match self {
            Stmt::Assignment { targets, value, .. } => {
                for target in targets {
                    target.walk(f);
                }
                value.walk(f);
            }
            Stmt::Expression(expr) => expr.walk(f),
            Stmt::Return { values, .. } => {
                for value in values {
                    value.walk(f);
                }
            }
            Stmt::If {
                condition,
                consequence,
                alternative,
            } => {
                condition.walk(f);
                consequence.walk_exprs(f);
                if let Some(alt) = alternative {
                    alt.walk_exprs(f);
                }
            }
            Stmt::While { condition, body } => {
                condition.walk(f);
                body.walk_exprs(f);
            }
            Stmt::For { iterable, body, .. } => {
                iterable.walk(f);
                body.walk_exprs(f);
            }
            Stmt::Import { .. } | Stmt::Defer { .. } | Stmt::Go { .. } => {}
        }
    }
}

impl Program {
    pub fn walk_exprs(&self, f: &mut impl FnMut(&Expr)) {
        for stmt in &self.statements {
            stmt.walk_exprs(f);
        }
    }
}
