use std::io;

use thiserror::Error;

/// Problems with the program model handed to the analysis. All of these are
/// detected while the model is built, before any solving starts.
#[derive(Debug, Error)]
pub enum ProgramError {
    #[error("Class '{0}' is declared more than once")]
    DuplicateClass(String),
    #[error("Field '{0}' is declared more than once")]
    DuplicateField(String),
    #[error("Method '{0}' is declared more than once")]
    DuplicateMethod(String),
    #[error("Unknown class '{0}'")]
    UnknownClass(String),
    #[error("Unknown field '{0}'")]
    UnknownField(String),
    #[error("Unknown method '{0}'")]
    UnknownMethod(String),
    #[error("Malformed member reference '{0}', expected 'Class.member'")]
    MalformedReference(String),
    #[error("Class '{0}' is part of a cyclic superclass chain")]
    HierarchyCycle(String),
    #[error("No entry method was set")]
    MissingEntry,
    #[error("Entry method '{0}' must be static and have a body")]
    InvalidEntry(String),
    #[error("Instance call site {0} has no receiver")]
    MissingReceiver(String),
    #[error("Static call site {0} has a receiver")]
    UnexpectedReceiver(String),
    #[error("Call site {0} cannot be resolved to a method")]
    UnresolvedCall(String),
    #[error("Call site {call_site} passes {found} arguments but {callee} takes {expected}")]
    ArityMismatch {
        call_site: String,
        callee: String,
        expected: usize,
        found: usize,
    },
    #[error("Field '{0}' is accessed with the wrong static-ness")]
    FieldKindMismatch(String),
    #[error("Variable '{var}' is used outside of its method {method}")]
    ForeignVariable { var: String, method: String },
    #[error("Could not parse program description: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Could not read program description: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Program(#[from] ProgramError),
    #[error("Analysis did not reach a fixpoint within {0} iterations")]
    IterationLimitExceeded(u64),
}
