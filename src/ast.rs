use crate::error::Location;
use std::collections::HashMap;

/// A parsed source file: named functions and classes, each name unique
/// within its map.
#[derive(Debug, Clone, Default)]
pub struct Program {
    pub functions: HashMap<String, FuncDef>,
    pub classes: HashMap<String, ClassDef>,
}

#[derive(Debug, Clone)]
pub struct FuncDef {
    pub name: String,
    pub params: Vec<String>,
    pub body: Block,
    pub location: Location,
}

#[derive(Debug, Clone)]
pub struct ClassDef {
    pub name: String,
    pub methods: HashMap<String, FuncDef>,
    /// Attributes in declaration order.
    pub attributes: Vec<VarDecl>,
    pub location: Location,
}

impl ClassDef {
    pub fn attribute(&self, name: &str) -> Option<&VarDecl> {
        self.attributes.iter().find(|attribute| attribute.name == name)
    }

    /// A method named like its class runs as the constructor.
    pub fn constructor(&self) -> Option<&FuncDef> {
        self.methods.get(&self.name)
    }
}

#[derive(Debug, Clone)]
pub struct VarDecl {
    pub name: String,
    pub initializer: Option<Expr>,
    pub location: Location,
}

#[derive(Debug, Clone, Default)]
pub struct Block {
    pub statements: Vec<Stmt>,
}

#[derive(Debug, Clone)]
pub enum Stmt {
    Var(VarDecl),
    Expression {
        expr: Expr,
        location: Location,
    },
    Assign {
        target: Expr,
        value: Expr,
        location: Location,
    },
    If {
        condition: Expr,
        then_block: Block,
        else_block: Option<Block>,
        location: Location,
    },
    While {
        condition: Expr,
        body: Block,
        location: Location,
    },
    For {
        iterator: String,
        iterable: Expr,
        body: Block,
        location: Location,
    },
    Switch {
        scrutinee: Expr,
        cases: Vec<(Expr, Block)>,
        location: Location,
    },
    Return {
        value: Option<Expr>,
        location: Location,
    },
}

impl Stmt {
    pub fn location(&self) -> &Location {
        match self {
            Stmt::Var(decl) => &decl.location,
            Stmt::Expression { location, .. } => location,
            Stmt::Assign { location, .. } => location,
            Stmt::If { location, .. } => location,
            Stmt::While { location, .. } => location,
            Stmt::For { location, .. } => location,
            Stmt::Switch { location, .. } => location,
            Stmt::Return { location, .. } => location,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Expr {
    Integer {
        value: i32,
        location: Location,
    },
    Float {
        value: f32,
        location: Location,
    },
    String {
        value: String,
        location: Location,
    },
    Identifier {
        name: String,
        location: Location,
    },
    Unary {
        operator: UnaryOp,
        operand: Box<Expr>,
        location: Location,
    },
    Binary {
        left: Box<Expr>,
        operator: BinaryOp,
        right: Box<Expr>,
        location: Location,
    },
    Relational {
        left: Box<Expr>,
        operator: RelationalOp,
        right: Box<Expr>,
        location: Location,
    },
    Logical {
        left: Box<Expr>,
        operator: LogicalOp,
        right: Box<Expr>,
        location: Location,
    },
    Assign {
        target: Box<Expr>,
        value: Box<Expr>,
        location: Location,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
        location: Location,
    },
    New {
        class: String,
        args: Vec<Expr>,
        location: Location,
    },
    Member {
        object: Box<Expr>,
        name: String,
        location: Location,
    },
    Cast {
        target: CastType,
        operand: Box<Expr>,
        location: Location,
    },
    List {
        elements: Vec<Expr>,
        location: Location,
    },
}

impl Expr {
    pub fn location(&self) -> &Location {
        match self {
            Expr::Integer { location, .. } => location,
            Expr::Float { location, .. } => location,
            Expr::String { location, .. } => location,
            Expr::Identifier { location, .. } => location,
            Expr::Unary { location, .. } => location,
            Expr::Binary { location, .. } => location,
            Expr::Relational { location, .. } => location,
            Expr::Logical { location, .. } => location,
            Expr::Assign { location, .. } => location,
            Expr::Call { location, .. } => location,
            Expr::New { location, .. } => location,
            Expr::Member { location, .. } => location,
            Expr::Cast { location, .. } => location,
            Expr::List { location, .. } => location,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// `-`: numeric negation, or inversion of a bool.
    Minus,
    /// `!` and `not`.
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl BinaryOp {
    pub fn verb(self) -> &'static str {
        match self {
            BinaryOp::Add => "add",
            BinaryOp::Subtract => "subtract",
            BinaryOp::Multiply => "multiply",
            BinaryOp::Divide => "divide",
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationalOp {
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
}

impl RelationalOp {
    pub fn symbol(self) -> &'static str {
        match self {
            RelationalOp::Equal => "==",
            RelationalOp::NotEqual => "!=",
            RelationalOp::Less => "<",
            RelationalOp::LessEqual => "<=",
            RelationalOp::Greater => ">",
            RelationalOp::GreaterEqual => ">=",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastType {
    Int,
    Float,
}

impl CastType {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "int" => Some(CastType::Int),
            "float" => Some(CastType::Float),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            CastType::Int => "int",
            CastType::Float => "float",
        }
    }
}
