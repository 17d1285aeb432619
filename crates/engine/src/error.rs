//! Error types.
//!
//! Cell errors are never returned to callers of `evaluate`/`recompute_all`;
//! they are rendered into the cell's result text. `EngineError` covers API
//! misuse only.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cell_id::EquationId;

/// Failure reported by an expression evaluator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct EvaluationError {
    message: String,
}

impl EvaluationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Coarse classification of a cell error, stored on the equation record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CellErrorKind {
    Parse,
    UndefinedVariable,
    CyclicDependency,
    Evaluation,
    DuplicateDefinition,
    NotSupported,
}

/// A cell-local error. Its `Display` form is what ends up in `result_text`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CellError {
    #[error("ParseError: {0}")]
    Parse(String),

    #[error("UndefinedVariableError: undefined variable {}", .names.join(", "))]
    UndefinedVariable { names: Vec<String> },

    #[error("CyclicDependencyError: {0}")]
    CyclicDependency(String),

    #[error("EvaluationError: {0}")]
    Evaluation(#[from] EvaluationError),

    #[error("DuplicateDefinitionError: `{name}` is already defined by {owner}")]
    DuplicateDefinition { name: String, owner: EquationId },

    #[error("NotSupportedError: {0}")]
    NotSupported(String),
}

impl CellError {
    pub fn kind(&self) -> CellErrorKind {
        match self {
            CellError::Parse(_) => CellErrorKind::Parse,
            CellError::UndefinedVariable { .. } => CellErrorKind::UndefinedVariable,
            CellError::CyclicDependency(_) => CellErrorKind::CyclicDependency,
            CellError::Evaluation(_) => CellErrorKind::Evaluation,
            CellError::DuplicateDefinition { .. } => CellErrorKind::DuplicateDefinition,
            CellError::NotSupported(_) => CellErrorKind::NotSupported,
        }
    }
}

/// Errors returned by engine operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("unknown equation {0}")]
    UnknownEquation(EquationId),

    #[error("cannot plot {id}: {source}")]
    Plot {
        id: EquationId,
        #[source]
        source: EvaluationError,
    },
}
