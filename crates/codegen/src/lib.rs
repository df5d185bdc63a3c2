//! Go source emission for the Breeze compiler.
//!
//! [`generator::CodeGenerator`] turns one analyzed unit into Go text;
//! [`project::ProjectGenerator`] lays out the output Go module, compiling
//! imported Breeze modules and the standard library recursively through
//! the full front-end pipeline.

pub mod error;
pub mod generator;
pub mod project;

pub use error::{CodegenError, CodegenResult};
pub use generator::{capitalize, go_type, quote_go, CodeGenerator};
pub use project::{module_name, ProjectGenerator, ProjectOptions};
