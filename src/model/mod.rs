//! Model layer
//!
//! A model is declared once as a [`ModelDefinition`] and resolved by the
//! registry into an immutable [`ModelSchema`]. Instances are [`Record`]
//! handles sharing one mutable state per identity.

mod api;
mod definition;
mod hooks;
mod key;
mod record;
mod schema;

pub use api::ApiConfig;
pub use definition::ModelDefinition;
pub use hooks::{AfterHook, BeforeHook, Hooks};
pub use key::{PrimaryKey, RecordKey};
pub use record::Record;
pub use schema::ModelSchema;

pub(crate) use definition::DeclaredAssociation;
pub(crate) use hooks::{run_after, run_before};

use std::fmt;

use serde::{Deserialize, Serialize};

/// Persistence state of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    /// Built locally, never accepted by the server
    Unsaved,
    /// Known to the server under a primary key
    Saved,
    /// Deleted and evicted
    Destroyed,
}

impl Lifecycle {
    pub fn as_str(&self) -> &'static str {
        match self {
            Lifecycle::Unsaved => "unsaved",
            Lifecycle::Saved => "saved",
            Lifecycle::Destroyed => "destroyed",
        }
    }
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Persistence actions that hooks attach to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Create,
    Update,
    Save,
    Delete,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Update => "update",
            Action::Save => "save",
            Action::Delete => "delete",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
