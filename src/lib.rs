//! aerorecord - A client-side record layer
//!
//! Plain JSON-shaped records gain model behavior by being declared once
//! against a [`ModelRegistry`]:
//!
//! - an association graph (has-many / belongs-to, inferred foreign keys,
//!   dependent destroy)
//! - an identity-mapped cache, one [`IdentityMap`] per model
//! - a validation engine producing per-field [`ErrorSet`]s
//! - a persistence controller speaking to an application-supplied
//!   [`Transport`]
//!
//! # Invariants
//!
//! - A record is valid exactly when its error set is empty
//! - Validation failures never reach the transport
//! - Transport failures leave records as they were
//! - One record per primary key per model; server data merges into it
//! - Has-many membership is derived from foreign keys, never stored

pub mod association;
pub mod config;
pub mod error;
pub mod model;
pub mod observability;
pub mod registry;
pub mod transport;
pub mod validation;

/// Field name to value, the shape of every record.
pub type Attributes = serde_json::Map<String, serde_json::Value>;

pub use association::{AssociationDescriptor, AssociationKind, AssociationOptions, HasMany};
pub use config::{ConfigError, RegistryConfig};
pub use error::{
    CascadeFailure, CascadeStep, DeclarationError, DeclarationResult, PersistError, PersistResult,
};
pub use model::{Action, ApiConfig, Lifecycle, ModelDefinition, ModelSchema, PrimaryKey, Record, RecordKey};
pub use observability::{Event, PersistStats, StatsSnapshot};
pub use registry::{IdentityMap, ModelClass, ModelRegistry, RegistryBuilder};
pub use transport::{
    MemoryTransport, Payload, Request, Response, Transport, TransportError, TransportFuture,
    TransportResult, Verb,
};
pub use validation::{ErrorSet, NamedFormat, Rule, Validation};
