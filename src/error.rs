use thiserror::Error;

use crate::compile::{CompileError, RuntimeError};
use crate::constraint::ValidationError;
use crate::mutation::MutationError;
use crate::semantic::SemanticError;
use crate::typesystem::SchemaError;

/// Crate-wide umbrella. Each layer keeps its own error enum; this type is
/// for callers driving several layers through one `?`-friendly surface.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Semantic error: {0}")]
    Semantic(#[from] SemanticError),
    #[error("Compile error: {0}")]
    Compile(#[from] CompileError),
    #[error("Runtime error: {0}")]
    Runtime(#[from] RuntimeError),
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
    #[error("Mutation error: {0}")]
    Mutation(#[from] MutationError),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type EngineResult<T> = Result<T, Error>;

impl Error {
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Error::Internal(message.into())
    }
}
