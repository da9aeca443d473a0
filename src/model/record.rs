//! Record handles
//!
//! A `Record` is a cheap clonable handle. Every clone observes the same
//! attributes, errors and lifecycle, so a server response merged into the
//! identity map is visible through every handle already given out.
//!
//! Locking: a record's state lock is never held while another lock (the
//! identity map or another record) is acquired, and never across an await.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use serde_json::Value;
use tracing::warn;
use uuid::Uuid;

use super::{Lifecycle, ModelSchema, PrimaryKey, RecordKey};
use crate::association::{AssociationDescriptor, AssociationKind, HasMany};
use crate::error::{PersistError, PersistResult};
use crate::observability::TARGET_PERSIST;
use crate::registry::{ModelClass, ModelRegistry, RegistryShared};
use crate::validation::{messages_for, ErrorSet};
use crate::Attributes;

/// A model instance.
#[derive(Clone)]
pub struct Record {
    inner: Arc<RecordInner>,
}

struct RecordInner {
    schema: Arc<ModelSchema>,
    registry: Weak<RegistryShared>,
    token: Uuid,
    state: RwLock<RecordState>,
}

struct RecordState {
    attributes: Attributes,
    errors: ErrorSet,
    lifecycle: Lifecycle,
    persisted_key: Option<PrimaryKey>,
    /// Foreign key field -> associated record that has no primary key yet
    pending: HashMap<String, Record>,
    /// A delete has claimed this record and not yet settled
    destroying: bool,
}

/// Attributes and pending links captured before a remote update.
pub(crate) struct RecordSnapshot {
    attributes: Attributes,
    pending: HashMap<String, Record>,
}

impl Record {
    pub(crate) fn new(
        schema: Arc<ModelSchema>,
        registry: Weak<RegistryShared>,
        attributes: Attributes,
        persisted_key: Option<PrimaryKey>,
    ) -> Self {
        let lifecycle = if persisted_key.is_some() {
            Lifecycle::Saved
        } else {
            Lifecycle::Unsaved
        };
        Self {
            inner: Arc::new(RecordInner {
                schema,
                registry,
                token: Uuid::new_v4(),
                state: RwLock::new(RecordState {
                    attributes,
                    errors: ErrorSet::new(),
                    lifecycle,
                    persisted_key,
                    pending: HashMap::new(),
                    destroying: false,
                }),
            }),
        }
    }

    // =========================================================================
    // Identity
    // =========================================================================

    pub fn model_name(&self) -> &str {
        self.inner.schema.name()
    }

    pub fn schema(&self) -> &ModelSchema {
        &self.inner.schema
    }

    /// Local token, stable for the life of the record.
    pub fn token(&self) -> Uuid {
        self.inner.token
    }

    /// Identity map key: the primary key once saved, the token before.
    pub fn key(&self) -> RecordKey {
        match &self.inner.state.read().persisted_key {
            Some(pk) => RecordKey::Primary(pk.clone()),
            None => RecordKey::Temporary(self.inner.token),
        }
    }

    /// Primary key assigned by the server, if any.
    pub fn primary_key(&self) -> Option<PrimaryKey> {
        self.inner.state.read().persisted_key.clone()
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.inner.state.read().lifecycle
    }

    pub fn is_new(&self) -> bool {
        self.lifecycle() == Lifecycle::Unsaved
    }

    pub fn is_saved(&self) -> bool {
        self.lifecycle() == Lifecycle::Saved
    }

    pub fn is_destroyed(&self) -> bool {
        self.lifecycle() == Lifecycle::Destroyed
    }

    /// True when both handles refer to the same instance.
    pub fn ptr_eq(&self, other: &Record) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn is_from(&self, registry: &Arc<RegistryShared>) -> bool {
        std::ptr::eq(self.inner.registry.as_ptr(), Arc::as_ptr(registry))
    }

    // =========================================================================
    // Attributes
    // =========================================================================

    pub fn get(&self, field: &str) -> Option<Value> {
        self.inner.state.read().attributes.get(field).cloned()
    }

    pub fn attributes(&self) -> Attributes {
        self.inner.state.read().attributes.clone()
    }

    pub fn to_json(&self) -> Value {
        Value::Object(self.attributes())
    }

    /// Sets one attribute locally.
    ///
    /// The primary key of a saved record is fixed; attempts to change it are
    /// ignored. Writing a foreign key replaces any pending link on it.
    pub fn set(&self, field: impl Into<String>, value: Value) {
        let field = field.into();
        let mut state = self.inner.state.write();
        if field == self.inner.schema.primary_key() && state.persisted_key.is_some() {
            warn!(
                target: TARGET_PERSIST,
                model = %self.inner.schema.name(),
                field = %field,
                "ignoring primary key change on saved record"
            );
            return;
        }
        state.pending.remove(&field);
        state.attributes.insert(field, value);
    }

    /// Applies `attrs` locally. No transport call, no validation.
    pub fn update(&self, attrs: Attributes) {
        for (field, value) in attrs {
            self.set(field, value);
        }
    }

    // =========================================================================
    // Validation
    // =========================================================================

    /// Snapshot of the current error set.
    pub fn errors(&self) -> ErrorSet {
        self.inner.state.read().errors.clone()
    }

    pub fn is_valid(&self) -> bool {
        self.inner.state.read().errors.is_empty()
    }

    pub fn is_invalid(&self) -> bool {
        !self.is_valid()
    }

    /// Runs the rules of one field, replacing only that field's messages, or
    /// of every field when `field` is `None`, rebuilding the whole set.
    /// Returns the resulting validity.
    pub fn validate(&self, field: Option<&str>) -> bool {
        let schema = &self.inner.schema;
        let mut state = self.inner.state.write();
        match field {
            Some(field) => {
                let messages = messages_for(field, schema.validations_for(field), &state.attributes);
                state.errors.replace(field, messages);
            }
            None => {
                let mut errors = ErrorSet::new();
                for field in schema.validated_fields() {
                    let messages = messages_for(field, schema.validations_for(field), &state.attributes);
                    errors.replace(field, messages);
                }
                state.errors = errors;
            }
        }
        state.errors.is_empty()
    }

    // =========================================================================
    // Associations
    // =========================================================================

    /// Live has-many collection named `name`.
    pub fn has_many(&self, name: &str) -> PersistResult<HasMany> {
        let descriptor = self.association(name, AssociationKind::HasMany)?;
        let target = self.registry()?.model(&descriptor.target)?;
        Ok(HasMany::new(self.clone(), descriptor, target))
    }

    /// The record this one belongs to through `name`, looked up locally.
    pub fn belongs_to(&self, name: &str) -> PersistResult<Option<Record>> {
        let descriptor = self.association(name, AssociationKind::BelongsTo)?;
        if let Some(pending) = self.pending_link(&descriptor.foreign_key) {
            return Ok(Some(pending));
        }
        let key = match self.get(&descriptor.foreign_key).as_ref().and_then(PrimaryKey::from_value) {
            Some(key) => key,
            None => return Ok(None),
        };
        let target = self.registry()?.model(&descriptor.target)?;
        Ok(target.lookup_reference(key))
    }

    /// Like [`Record::belongs_to`], falling back to a transport read when the
    /// associated record is not cached.
    pub async fn fetch_belongs_to(&self, name: &str) -> PersistResult<Option<Record>> {
        if let Some(found) = self.belongs_to(name)? {
            return Ok(Some(found));
        }
        let descriptor = self.association(name, AssociationKind::BelongsTo)?;
        match self.get(&descriptor.foreign_key).as_ref().and_then(PrimaryKey::from_value) {
            Some(key) => {
                let target = self.registry()?.model(&descriptor.target)?;
                target.find(key).await.map(Some)
            }
            None => Ok(None),
        }
    }

    /// Points the belongs-to association `name` at `owner`, or clears it.
    ///
    /// An owner without a primary key is held as a pending link and resolved
    /// into a foreign key value once the owner is created.
    pub fn assign(&self, name: &str, owner: Option<&Record>) -> PersistResult<()> {
        let descriptor = self.association(name, AssociationKind::BelongsTo)?;
        if let Some(owner) = owner {
            if owner.model_name() != descriptor.target {
                return Err(PersistError::WrongModel {
                    model: descriptor.target,
                    record: owner.model_name().to_string(),
                });
            }
        }
        self.link(&descriptor.foreign_key, owner);
        Ok(())
    }

    fn association(&self, name: &str, kind: AssociationKind) -> PersistResult<AssociationDescriptor> {
        let descriptor = self.inner.schema.association(name).ok_or_else(|| {
            PersistError::Resolution(format!(
                "model '{}' has no association named '{}'",
                self.model_name(),
                name
            ))
        })?;
        if descriptor.kind != kind {
            return Err(PersistError::Resolution(format!(
                "association '{}' on '{}' is {}, not {}",
                name,
                self.model_name(),
                descriptor.kind,
                kind
            )));
        }
        Ok(descriptor.clone())
    }

    pub(crate) fn link(&self, foreign_key: &str, owner: Option<&Record>) {
        // Read the owner before locking self; the owner may be this record.
        let owner_key = owner.map(|o| (o.clone(), o.primary_key()));
        let mut state = self.inner.state.write();
        match owner_key {
            Some((_, Some(pk))) => {
                state.pending.remove(foreign_key);
                state.attributes.insert(foreign_key.to_string(), pk.to_value());
            }
            Some((owner, None)) => {
                state.pending.insert(foreign_key.to_string(), owner);
                state.attributes.insert(foreign_key.to_string(), Value::Null);
            }
            None => {
                state.pending.remove(foreign_key);
                state.attributes.insert(foreign_key.to_string(), Value::Null);
            }
        }
    }

    pub(crate) fn pending_link(&self, foreign_key: &str) -> Option<Record> {
        self.inner.state.read().pending.get(foreign_key).cloned()
    }

    /// Replaces every pending link to `owner` with its new primary key.
    /// Returns the foreign keys that were resolved.
    pub(crate) fn resolve_links_to(&self, owner: &Record, key: &PrimaryKey) -> Vec<String> {
        let mut state = self.inner.state.write();
        let resolved: Vec<String> = state
            .pending
            .iter()
            .filter(|(_, pending)| pending.ptr_eq(owner))
            .map(|(fk, _)| fk.clone())
            .collect();
        for fk in &resolved {
            state.pending.remove(fk);
            state.attributes.insert(fk.clone(), key.to_value());
        }
        resolved
    }

    pub(crate) fn has_pending_links(&self) -> bool {
        !self.inner.state.read().pending.is_empty()
    }

    // =========================================================================
    // State transitions (driven by the persistence controller)
    // =========================================================================

    /// Merges server fields. The primary key of a saved record is never
    /// overwritten.
    pub(crate) fn merge(&self, attrs: &Attributes) {
        let pk_field = self.inner.schema.primary_key();
        let mut state = self.inner.state.write();
        let saved = state.persisted_key.is_some();
        for (field, value) in attrs {
            if saved && field == pk_field {
                continue;
            }
            // A null echo of a pending foreign key keeps the link.
            if value.is_null() && state.pending.contains_key(field) {
                continue;
            }
            state.pending.remove(field);
            state.attributes.insert(field.clone(), value.clone());
        }
    }

    pub(crate) fn mark_saved(&self, key: PrimaryKey) {
        let pk_field = self.inner.schema.primary_key().to_string();
        let mut state = self.inner.state.write();
        state.attributes.insert(pk_field, key.to_value());
        state.persisted_key = Some(key);
        state.lifecycle = Lifecycle::Saved;
    }

    pub(crate) fn mark_destroyed(&self) {
        let mut state = self.inner.state.write();
        state.lifecycle = Lifecycle::Destroyed;
        state.destroying = false;
    }

    /// Claims the record for one delete. False when it is destroyed or
    /// another delete holds the claim.
    pub(crate) fn claim_destroy(&self) -> bool {
        let mut state = self.inner.state.write();
        if state.destroying || state.lifecycle == Lifecycle::Destroyed {
            return false;
        }
        state.destroying = true;
        true
    }

    pub(crate) fn release_destroy(&self) {
        self.inner.state.write().destroying = false;
    }

    pub(crate) fn is_destroying(&self) -> bool {
        self.inner.state.read().destroying
    }

    pub(crate) fn snapshot(&self) -> RecordSnapshot {
        let state = self.inner.state.read();
        RecordSnapshot {
            attributes: state.attributes.clone(),
            pending: state.pending.clone(),
        }
    }

    pub(crate) fn restore(&self, snapshot: RecordSnapshot) {
        let mut state = self.inner.state.write();
        state.attributes = snapshot.attributes;
        state.pending = snapshot.pending;
    }

    /// Body sent to the transport: attributes without pending placeholders.
    pub(crate) fn transport_body(&self) -> Value {
        let state = self.inner.state.read();
        let body: Attributes = state
            .attributes
            .iter()
            .filter(|(field, value)| !(value.is_null() && state.pending.contains_key(*field)))
            .map(|(field, value)| (field.clone(), value.clone()))
            .collect();
        Value::Object(body)
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    pub fn registry(&self) -> PersistResult<ModelRegistry> {
        self.inner
            .registry
            .upgrade()
            .map(ModelRegistry::from_shared)
            .ok_or(PersistError::RegistryGone)
    }

    /// The model class this record belongs to.
    pub fn model_class(&self) -> PersistResult<ModelClass> {
        self.registry()?.model(self.model_name())
    }

    /// Sends a new record to the server. See [`ModelClass::create`].
    pub async fn create(&self) -> PersistResult<Record> {
        self.model_class()?.create(self).await
    }

    /// Creates or updates depending on the lifecycle. See [`ModelClass::save`].
    pub async fn save(&self) -> PersistResult<Record> {
        self.model_class()?.save(self).await
    }

    /// Applies `attrs` and saves. See [`ModelClass::update_remote`].
    pub async fn update_remote(&self, attrs: Attributes) -> PersistResult<Record> {
        self.model_class()?.update_remote(self, attrs).await
    }

    /// Deletes the record and its dependents. See [`ModelClass::delete`].
    pub async fn delete(&self) -> PersistResult<()> {
        self.model_class()?.delete(self).await
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Record {}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Record")
            .field("model", &self.model_name())
            .field("key", &self.key())
            .field("lifecycle", &self.lifecycle())
            .finish()
    }
}
