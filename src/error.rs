use thiserror::Error;

use crate::expression::Operator;

/// Diagnostic reported by the expression parser.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
#[error("{message}{}", location(.position))]
pub struct SyntaxError {
    pub message: String,
    /// 1-based `(line, column)` of the failure, when the parser knows it.
    pub position: Option<(usize, usize)>,
}

fn location(position: &Option<(usize, usize)>) -> String {
    match position {
        Some((line, column)) => format!(" at line {line}, column {column}"),
        None => String::new(),
    }
}

/// Why a call to the compiler produced no diagram.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum CompileError {
    #[error("syntax error: {0}")]
    Syntax(#[from] SyntaxError),

    #[error("no interpretation provided for variables: {}", .0.join(", "))]
    UnresolvedVariables(Vec<String>),

    #[error("interpretation binds variables to diagrams the manager does not own: {}", .0.join(", "))]
    UnknownDiagrams(Vec<String>),

    #[error("{operator} expects {expected} operand(s), got {found}")]
    ArityMismatch {
        operator: Operator,
        expected: usize,
        found: usize,
    },

    #[error("{operator} is not allowed in a propositional formula")]
    OperatorNotAllowed { operator: Operator },
}
