use thiserror::Error;

use crate::object::ObjectId;

/// Structural preconditions that an operation found unmet.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precondition {
    #[error("the gate port has no template port")]
    MissingTemplatePort,

    #[error("the gate has no defined orientation")]
    UndefinedOrientation,

    #[error("template {0} is still referenced by placed gates")]
    TemplateInUse(ObjectId),

    #[error("an object with id {0} is already registered")]
    DuplicateObjectId(ObjectId),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    /// The object lacks a valid identity.
    #[error("{kind} has no valid object id")]
    InvalidReference { kind: &'static str },

    #[error("precondition failed: {0}")]
    Precondition(#[from] Precondition),

    #[error("{what} not found in {collection}")]
    Lookup {
        what: String,
        collection: &'static str,
    },

    /// Derived state needed for a computation is undefined.
    #[error("{0}")]
    Runtime(String),
}

impl ModelError {
    pub(crate) fn lookup(what: impl Into<String>, collection: &'static str) -> Self {
        ModelError::Lookup {
            what: what.into(),
            collection,
        }
    }
}

pub type ModelResult<T> = Result<T, ModelError>;
