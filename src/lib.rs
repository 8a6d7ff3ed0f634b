// Kiwi Language Interpreter Library
//
// Lexer, parser and tree-walking interpreter for the Kiwi language, with
// diagnostics collected across all stages.

// Public modules
pub mod ast;
pub mod context;
pub mod error;
pub mod interpreter;
pub mod lexer;
pub mod parser;
pub mod runner;
pub mod source;
pub mod value;

// Re-export commonly used items
pub use ast::{Expr, Program, Stmt};
pub use error::{Diagnostic, Diagnostics, ErrorKind, KiwiError, Location};
pub use interpreter::Interpreter;
pub use lexer::{Lexer, Token, TokenKind};
pub use parser::Parser;
pub use source::CharSource;
pub use value::{Value, ValueProxy};

// Re-export main functions
pub use runner::{interpret, interpret_units, run};
