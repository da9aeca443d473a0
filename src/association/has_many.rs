//! Live has-many collections
//!
//! Membership is never stored. Every read scans the target identity map for
//! records whose foreign key names the owner, or whose pending link is the
//! owner itself, so the collection is current after any assignment on
//! either side.

use tracing::debug;

use super::AssociationDescriptor;
use crate::error::PersistResult;
use crate::model::{PrimaryKey, Record};
use crate::observability::{Event, TARGET_ASSOC};
use crate::registry::ModelClass;
use crate::Attributes;

/// Records associated with one owner through one has-many association.
#[derive(Debug, Clone)]
pub struct HasMany {
    owner: Record,
    descriptor: AssociationDescriptor,
    target: ModelClass,
}

impl HasMany {
    pub(crate) fn new(owner: Record, descriptor: AssociationDescriptor, target: ModelClass) -> Self {
        Self {
            owner,
            descriptor,
            target,
        }
    }

    pub fn owner(&self) -> &Record {
        &self.owner
    }

    pub fn descriptor(&self) -> &AssociationDescriptor {
        &self.descriptor
    }

    /// Current members, in identity map order.
    pub fn records(&self) -> Vec<Record> {
        let owner_key = self.owner.primary_key();
        let foreign_key = &self.descriptor.foreign_key;
        self.target
            .query_local(|record| is_member(record, &self.owner, owner_key.as_ref(), foreign_key))
    }

    pub fn len(&self) -> usize {
        self.records().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records().is_empty()
    }

    pub fn contains(&self, record: &Record) -> bool {
        record.model_name() == self.descriptor.target
            && is_member(
                record,
                &self.owner,
                self.owner.primary_key().as_ref(),
                &self.descriptor.foreign_key,
            )
    }

    /// Builds a target record linked to the owner. No transport call.
    pub fn build(&self, attrs: Attributes) -> Record {
        let record = self.target.build(attrs);
        record.link(&self.descriptor.foreign_key, Some(&self.owner));
        debug!(
            target: TARGET_ASSOC,
            event = %Event::CacheInsert,
            association = %self.descriptor,
            key = %record.key(),
            "built associated record"
        );
        record
    }

    /// Loads the collection from the server, then returns the members.
    ///
    /// An unsaved owner has nothing on the server; its local members are
    /// returned without a transport call.
    pub async fn fetch(&self) -> PersistResult<Vec<Record>> {
        if let Some(key) = self.owner.primary_key() {
            let mut criteria = Attributes::new();
            criteria.insert(self.descriptor.foreign_key.clone(), key.to_value());
            self.target.where_(criteria).await?;
        }
        Ok(self.records())
    }
}

fn is_member(record: &Record, owner: &Record, owner_key: Option<&PrimaryKey>, foreign_key: &str) -> bool {
    if let Some(pending) = record.pending_link(foreign_key) {
        return pending.ptr_eq(owner);
    }
    match (owner_key, record.get(foreign_key)) {
        (Some(key), Some(value)) => key.matches(&value),
        _ => false,
    }
}
