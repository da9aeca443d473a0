//! Association descriptors

use std::fmt;

use serde::{Deserialize, Serialize};

/// Kind of association.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssociationKind {
    /// Owner has many targets; the foreign key lives on the target
    HasMany,
    /// Owner points at one target; the foreign key lives on the owner
    BelongsTo,
}

impl fmt::Display for AssociationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssociationKind::HasMany => write!(f, "has_many"),
            AssociationKind::BelongsTo => write!(f, "belongs_to"),
        }
    }
}

/// Overrides for association inference.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssociationOptions {
    /// Target model name, instead of the one inferred from the association name
    pub provider: Option<String>,
    /// Foreign key field, instead of the inferred one
    pub foreign_key: Option<String>,
}

impl AssociationOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn provider(mut self, model: impl Into<String>) -> Self {
        self.provider = Some(model.into());
        self
    }

    pub fn foreign_key(mut self, field: impl Into<String>) -> Self {
        self.foreign_key = Some(field.into());
        self
    }
}

/// A resolved association.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssociationDescriptor {
    pub owner: String,
    pub name: String,
    pub kind: AssociationKind,
    pub target: String,
    pub foreign_key: String,
    /// Destroying the owner destroys the associated records
    pub dependent: bool,
}

impl AssociationDescriptor {
    /// Model whose records carry the foreign key.
    pub fn key_holder(&self) -> &str {
        match self.kind {
            AssociationKind::HasMany => &self.target,
            AssociationKind::BelongsTo => &self.owner,
        }
    }

    pub fn is_has_many(&self) -> bool {
        self.kind == AssociationKind::HasMany
    }

    pub fn is_belongs_to(&self) -> bool {
        self.kind == AssociationKind::BelongsTo
    }
}

impl fmt::Display for AssociationDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{} ({} {} via {})",
            self.owner, self.name, self.kind, self.target, self.foreign_key
        )
    }
}
