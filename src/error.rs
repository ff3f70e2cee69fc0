//! Error kinds for the tactical combat core.
//!
//! Policy: `InvalidPlacement` aborts construction and is returned
//! to the caller. `MissingDependency` is surfaced as a failed outcome but
//! never aborts a tick. `InconsistentState` is handled internally (clamp +
//! diagnostic event) and never reaches a caller as an `Err`. `Cancellation`
//! is a method, not a variant. Invariant violations panic rather than
//! returning an error — the caller is responsible for killing the worker.

use thiserror::Error;

/// Errors that can be returned from the public battle API.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum BattleError {
    #[error("invalid placement: {reason}")]
    InvalidPlacement { reason: String },

    #[error("missing dependency: {kind} '{id}'")]
    MissingDependency { kind: String, id: String },
}

impl BattleError {
    pub fn invalid_placement(reason: impl Into<String>) -> Self {
        Self::InvalidPlacement { reason: reason.into() }
    }

    pub fn missing_dependency(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self::MissingDependency { kind: kind.into(), id: id.into() }
    }
}

/// Severity attached to structured diagnostic events ("the core
/// never swallows unknown errors silently").
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

pub type BattleResult<T> = Result<T, BattleError>;
