//! Association graph
//!
//! Has-many and belongs-to associations share a single source of truth: the
//! foreign key field on the "many" side. Nothing else records membership.
//!
//! - Targets and foreign keys are inferred from names unless overridden
//! - Every target and foreign key is checked when the registry is built
//! - Dependent-destroy associations are followed by `ModelClass::delete`

mod descriptor;
mod has_many;
pub mod inflect;

pub use descriptor::{AssociationDescriptor, AssociationKind, AssociationOptions};
pub use has_many::HasMany;
