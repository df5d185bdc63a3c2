//! Front half of the Breeze compiler: lexing, parsing, semantic analysis,
//! and the type-driven tree transformation that precedes Go emission.
//!
//! The stages share one [`semantic::Analyzer`], whose symbol tables and
//! call records persist from analysis through transformation into code
//! generation. Parse errors are fatal per unit; semantic diagnostics are
//! advisory.

pub mod ast;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod semantic;
pub mod transform;
pub mod types;

pub use ast::{Block, Expr, NodeId, Param, Program, Stmt};
pub use error::{BreezeError, BreezeResult, Diagnostic};
pub use lexer::{Lexer, Token, TokenKind};
pub use parser::Parser;
pub use semantic::external::{
    ExternalRegistry, MethodSig, PackageInfo, PackageIntrospector, StaticIntrospector,
    TypeIdentity,
};
pub use semantic::table::{Symbol, SymbolTable};
pub use semantic::{Analyzer, CallRecord, WrapperInfo};
pub use transform::Transformer;
pub use types::{FunctionSig, Type};

/// Parse a full compilation unit, failing on any accumulated parse error.
pub fn parse(source: &str) -> BreezeResult<Program> {
    let mut parser = Parser::from_source(source);
    let program = parser.parse_program();
    if parser.errors.is_empty() {
        Ok(program)
    } else {
        Err(BreezeError::Parse(parser.errors))
    }
}
