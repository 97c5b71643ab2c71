//! Semantic errors and accumulated diagnostics.
//!
//! Declaration problems found during analysis do not abort the walk; they
//! accumulate as [`Diagnostic`]s on the session and analysis continues.
//! Hard errors are reserved for misuse of the session itself.

use core::fmt;

use strum_macros::Display;
use thiserror::Error;

use crate::ast::NodeId;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SemanticError {
    #[error("parameter '{name}' is already declared")]
    DuplicateParameter { name: String },
}

impl SemanticError {
    pub fn duplicate_parameter(name: impl Into<String>) -> Self {
        SemanticError::DuplicateParameter { name: name.into() }
    }
}

pub type SemanticResult<T> = Result<T, SemanticError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum DiagnosticCode {
    ShadowedVariable,
    UndeclaredVariable,
}

/// One finding from scope validation, pinned to the node it concerns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    severity: Severity,
    node: NodeId,
    code: DiagnosticCode,
    message: String,
}

impl Diagnostic {
    pub fn shadowed(node: NodeId, name: &str) -> Self {
        Self {
            severity: Severity::Warning,
            node,
            code: DiagnosticCode::ShadowedVariable,
            message: format!("variable '{name}' shadows an outer binding"),
        }
    }

    pub fn undeclared(node: NodeId, name: &str) -> Self {
        Self {
            severity: Severity::Error,
            node,
            code: DiagnosticCode::UndeclaredVariable,
            message: format!("name '{name}' is not declared in any enclosing scope"),
        }
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn code(&self) -> DiagnosticCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}[{}] at {}: {}",
            self.severity, self.code, self.node, self.message
        )
    }
}
