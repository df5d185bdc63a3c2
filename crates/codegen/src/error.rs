//! Codegen error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodegenError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("module {unit}: {source}")]
    Unit {
        unit: String,
        #[source]
        source: breeze_parser::BreezeError,
    },
}

pub type CodegenResult<T> = Result<T, CodegenError>;
