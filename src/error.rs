//! Error taxonomy for the record layer
//!
//! - `DeclarationError`: a model declaration that cannot be resolved.
//!   Raised while building the registry; programmer error, never retried.
//! - `PersistError`: failures of runtime record operations. Validation
//!   failures never reach the transport; transport failures leave the
//!   record as it was; cascade failures report a partially destroyed graph.

use std::fmt;

use thiserror::Error;

use crate::model::{Action, Lifecycle};
use crate::transport::TransportError;
use crate::validation::ErrorSet;

/// Result type for declaration-time operations
pub type DeclarationResult<T> = Result<T, DeclarationError>;

/// Result type for record operations
pub type PersistResult<T> = Result<T, PersistError>;

/// A model declaration that cannot be resolved.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeclarationError {
    /// Two definitions share a model name
    #[error("model '{0}' is declared more than once")]
    DuplicateModel(String),

    /// Model name or primary key is empty
    #[error("model '{model}': {reason}")]
    InvalidModel { model: String, reason: String },

    /// An association is declared twice on the same model
    #[error("model '{model}': association '{association}' is declared more than once")]
    DuplicateAssociation { model: String, association: String },

    /// The association's target model does not exist
    #[error("model '{model}': association '{association}' targets unknown model '{target}'")]
    UnknownTarget {
        model: String,
        association: String,
        target: String,
    },

    /// The foreign key is not an attribute of the model that must hold it
    #[error(
        "model '{model}': foreign key '{foreign_key}' of association '{association}' is not an attribute of '{holder}'"
    )]
    MissingForeignKey {
        model: String,
        association: String,
        foreign_key: String,
        holder: String,
    },

    /// `dependent_destroy` names an association that was never declared
    #[error("model '{model}': dependent destroy names unknown association '{association}'")]
    UnknownDependent { model: String, association: String },

    /// A `validates` declaration could not be parsed
    #[error("model '{model}': invalid {rule} validation on '{field}': {reason}")]
    InvalidValidation {
        model: String,
        field: String,
        rule: String,
        reason: String,
    },
}

impl DeclarationError {
    /// Returns the error code
    pub fn code(&self) -> &'static str {
        match self {
            Self::DuplicateModel(_) => "DUPLICATE_MODEL",
            Self::InvalidModel { .. } => "INVALID_MODEL",
            Self::DuplicateAssociation { .. } => "DUPLICATE_ASSOCIATION",
            Self::UnknownTarget { .. } => "UNRESOLVED_TARGET",
            Self::MissingForeignKey { .. } => "UNRESOLVED_FOREIGN_KEY",
            Self::UnknownDependent { .. } => "UNKNOWN_DEPENDENT",
            Self::InvalidValidation { .. } => "INVALID_VALIDATION",
        }
    }

    /// Returns whether this is an association resolution failure
    pub fn is_resolution_failure(&self) -> bool {
        matches!(
            self,
            Self::UnknownTarget { .. } | Self::MissingForeignKey { .. } | Self::UnknownDependent { .. }
        )
    }
}

/// One dependent that a cascading destroy failed to remove.
#[derive(Debug, Clone)]
pub struct CascadeStep {
    pub model: String,
    pub key: String,
    pub error: PersistError,
}

/// The owner was destroyed but one or more dependents were not.
#[derive(Debug, Clone)]
pub struct CascadeFailure {
    pub owner_model: String,
    pub owner_key: String,
    pub failures: Vec<CascadeStep>,
}

impl fmt::Display for CascadeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} destroyed, but {} dependent(s) were not:",
            self.owner_model,
            self.owner_key,
            self.failures.len()
        )?;
        for step in &self.failures {
            write!(f, " [{} {}: {}]", step.model, step.key, step.error)?;
        }
        Ok(())
    }
}

impl std::error::Error for CascadeFailure {}

/// Failures of record operations.
#[derive(Debug, Clone, Error)]
pub enum PersistError {
    /// One or more rules failed; nothing was sent
    #[error("{model} is invalid: {errors}")]
    Validation { model: String, errors: ErrorSet },

    /// The transport rejected or could not carry the request
    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),

    /// Owner destroyed, dependents partially destroyed
    #[error("{0}")]
    Cascade(CascadeFailure),

    /// An association name, target or foreign key could not be resolved
    #[error("unresolved association: {0}")]
    Resolution(String),

    /// The record's lifecycle state does not permit the action
    #[error("cannot {action} {model} {key}: record is {state}")]
    InvalidState {
        model: String,
        key: String,
        action: Action,
        state: Lifecycle,
    },

    /// Another delete of the same record has not settled yet
    #[error("cannot delete {model} {key}: a delete is already in progress")]
    DeleteInProgress { model: String, key: String },

    /// A before hook refused the action
    #[error("{action} aborted by hook: {reason}")]
    Aborted { action: Action, reason: String },

    /// The record was passed to a model class it does not belong to
    #[error("record of model '{record}' passed to model '{model}'")]
    WrongModel { model: String, record: String },

    /// No model with that name is registered
    #[error("unknown model '{0}'")]
    UnknownModel(String),

    /// The registry owning this record has been dropped
    #[error("the model registry for this record no longer exists")]
    RegistryGone,
}

impl PersistError {
    /// Returns the error code
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "VALIDATION_FAILED",
            Self::Transport(_) => "TRANSPORT_FAILED",
            Self::Cascade(_) => "CASCADE_PARTIAL",
            Self::Resolution(_) => "RESOLUTION_FAILED",
            Self::InvalidState { .. } => "INVALID_STATE",
            Self::DeleteInProgress { .. } => "DELETE_IN_PROGRESS",
            Self::Aborted { .. } => "ABORTED",
            Self::WrongModel { .. } => "WRONG_MODEL",
            Self::UnknownModel(_) => "UNKNOWN_MODEL",
            Self::RegistryGone => "REGISTRY_GONE",
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// True when the owner was destroyed but some dependents survived.
    pub fn is_partial_destroy(&self) -> bool {
        matches!(self, Self::Cascade(_))
    }

    /// Validation messages, when this is a validation failure
    pub fn validation_errors(&self) -> Option<&ErrorSet> {
        match self {
            Self::Validation { errors, .. } => Some(errors),
            _ => None,
        }
    }

    /// Cascade report, when this is a partial destroy
    pub fn cascade(&self) -> Option<&CascadeFailure> {
        match self {
            Self::Cascade(failure) => Some(failure),
            _ => None,
        }
    }
}
