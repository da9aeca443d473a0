//! Persistence controller
//!
//! Lifecycle per record:
//!
//! ```text
//! build ──> Unsaved ──create──> Saved ──delete──> Destroyed
//!              │                  │ ▲
//!              │                  └─┘ update
//!              └──────delete (local only)──────────> Destroyed
//! ```
//!
//! Ordering within every write: before hooks, validation, transport, local
//! state, after hooks. A refusal or failure at any step leaves the later
//! steps unexecuted; validation failures never reach the transport and
//! transport failures leave the record as it was.

use futures_util::future::{join_all, BoxFuture};
use futures_util::FutureExt;
use tracing::{debug, info, warn};

use super::class::{unexpected, ModelClass};
use crate::association::{AssociationKind, HasMany};
use crate::error::{CascadeFailure, CascadeStep, PersistError, PersistResult};
use crate::model::{run_after, run_before, Action, Lifecycle, PrimaryKey, Record, RecordKey};
use crate::observability::{Event, TARGET_ASSOC, TARGET_PERSIST};
use crate::transport::{Payload, Request, TransportError, Verb};
use crate::Attributes;

impl ModelClass {
    /// Sends an unsaved record to the server.
    ///
    /// On success the server's attributes are merged in, the identity map
    /// entry moves from the temporary key to the primary key, and pending
    /// links pointing at this record receive the key.
    pub async fn create(&self, record: &Record) -> PersistResult<Record> {
        self.ensure_owns(record)?;
        self.ensure_state(record, Action::Create, Lifecycle::Unsaved)?;
        self.before_hooks(Action::Create, record)?;
        self.ensure_valid(record)?;

        let url = self.schema().api().url(Verb::Create, None);
        let request = Request::new(Verb::Create, url).with_body(record.transport_body());
        let attrs = match self.send(request).await?.payload {
            Payload::Record(attrs) => attrs,
            other => return Err(unexpected(self.name(), "create", &other)),
        };

        let pk_field = self.schema().primary_key();
        let key = attrs
            .get(pk_field)
            .and_then(PrimaryKey::from_value)
            .ok_or_else(|| {
                TransportError::UnexpectedPayload(format!(
                    "create response for {} carries no '{}'",
                    self.name(),
                    pk_field
                ))
            })?;

        let temporary = record.key();
        record.merge(&attrs);
        record.mark_saved(key.clone());
        if !self.state.map.rekey(&temporary, RecordKey::Primary(key.clone())) {
            self.state.map.insert(record.clone());
        }
        self.registry().resolve_pending_links(record, &key);

        self.state.stats.increment_created();
        info!(
            target: TARGET_PERSIST,
            event = %Event::RecordCreated,
            model = %self.name(),
            key = %key,
            "record created"
        );
        self.after_hooks(Action::Create, record);
        Ok(record.clone())
    }

    /// Creates an unsaved record or updates a saved one, running `Save`
    /// hooks around the underlying action.
    pub async fn save(&self, record: &Record) -> PersistResult<Record> {
        self.ensure_owns(record)?;
        if record.is_destroyed() {
            return Err(self.invalid_state(record, Action::Save));
        }
        self.before_hooks(Action::Save, record)?;
        let saved = match record.lifecycle() {
            Lifecycle::Unsaved => self.create(record).await?,
            _ => self.push_update(record).await?,
        };
        self.after_hooks(Action::Save, record);
        Ok(saved)
    }

    /// Applies `attrs` locally, then saves.
    ///
    /// When the transport fails the previous attributes are restored. A
    /// validation failure keeps the new attributes so their errors stay
    /// inspectable.
    pub async fn update_remote(&self, record: &Record, attrs: Attributes) -> PersistResult<Record> {
        self.ensure_owns(record)?;
        if record.is_destroyed() {
            return Err(self.invalid_state(record, Action::Update));
        }
        let snapshot = record.snapshot();
        record.update(attrs);
        match self.save(record).await {
            Err(error) if error.is_transport() => {
                record.restore(snapshot);
                Err(error)
            }
            other => other,
        }
    }

    /// Deletes the record, then every record reachable through its
    /// dependent-destroy associations.
    ///
    /// Dependents are deleted concurrently and all of them settle before this
    /// resolves. If any dependent fails, the result is
    /// `PersistError::Cascade` listing every record that survived, however
    /// deep: this record is destroyed regardless. A record reached through
    /// two paths is deleted once.
    pub fn delete(&self, record: &Record) -> BoxFuture<'static, PersistResult<()>> {
        let class = self.clone();
        let record = record.clone();
        async move { class.destroy(record).await }.boxed()
    }

    async fn push_update(&self, record: &Record) -> PersistResult<Record> {
        self.ensure_state(record, Action::Update, Lifecycle::Saved)?;
        self.before_hooks(Action::Update, record)?;
        self.ensure_valid(record)?;

        let key = self.saved_key(record, Action::Update)?;
        let url = self.schema().api().url(Verb::Update, Some(&key));
        let request = Request::new(Verb::Update, url).with_body(record.transport_body());
        match self.send(request).await?.payload {
            Payload::Record(attrs) => record.merge(&attrs),
            Payload::Empty => {}
            other => return Err(unexpected(self.name(), "update", &other)),
        }

        self.state.stats.increment_updated();
        info!(
            target: TARGET_PERSIST,
            event = %Event::RecordUpdated,
            model = %self.name(),
            key = %key,
            "record updated"
        );
        self.after_hooks(Action::Update, record);
        Ok(record.clone())
    }

    async fn destroy(self, record: Record) -> PersistResult<()> {
        self.ensure_owns(&record)?;
        if record.is_destroyed() {
            return Err(self.invalid_state(&record, Action::Delete));
        }
        // Claimed before the first await so a second path through the
        // graph never sends a duplicate delete.
        if !record.claim_destroy() {
            return Err(PersistError::DeleteInProgress {
                model: self.name().to_string(),
                key: record.key().to_string(),
            });
        }
        let claim = DestroyClaim(&record);
        self.before_hooks(Action::Delete, &record)?;

        let key = record.key();
        if record.is_saved() {
            let pk = self.saved_key(&record, Action::Delete)?;
            let url = self.schema().api().url(Verb::Delete, Some(&pk));
            self.send(Request::new(Verb::Delete, url)).await?;
        }

        self.evict(&key);
        record.mark_destroyed();
        drop(claim);
        self.state.stats.increment_destroyed();
        info!(
            target: TARGET_PERSIST,
            event = %Event::RecordDestroyed,
            model = %self.name(),
            key = %key,
            "record destroyed"
        );
        self.after_hooks(Action::Delete, &record);

        self.cascade(&record).await
    }

    async fn cascade(&self, owner: &Record) -> PersistResult<()> {
        let dependents = self.dependents_of(owner);
        if dependents.is_empty() {
            return Ok(());
        }
        debug!(
            target: TARGET_ASSOC,
            event = %Event::CascadeBegin,
            model = %self.name(),
            key = %owner.key(),
            dependents = dependents.len(),
            "destroying dependents"
        );

        let results = join_all(dependents.iter().map(|(class, record)| class.delete(record))).await;
        let failures: Vec<CascadeStep> = dependents
            .into_iter()
            .zip(results)
            .flat_map(|((class, record), result)| match result {
                Ok(()) => Vec::new(),
                // Reached twice through the graph; the other path owns it.
                Err(PersistError::InvalidState {
                    state: Lifecycle::Destroyed,
                    ..
                })
                | Err(PersistError::DeleteInProgress { .. }) => Vec::new(),
                // The dependent is gone; some of its own dependents are not.
                Err(PersistError::Cascade(nested)) => nested.failures,
                Err(error) => vec![CascadeStep {
                    model: class.name().to_string(),
                    key: record.key().to_string(),
                    error,
                }],
            })
            .collect();

        if failures.is_empty() {
            return Ok(());
        }
        warn!(
            target: TARGET_ASSOC,
            event = %Event::CascadePartial,
            model = %self.name(),
            key = %owner.key(),
            failed = failures.len(),
            "dependents survived destroy"
        );
        Err(PersistError::Cascade(CascadeFailure {
            owner_model: self.name().to_string(),
            owner_key: owner.key().to_string(),
            failures,
        }))
    }

    /// Records currently associated with `owner` through dependent-destroy
    /// associations, without duplicates and without records already
    /// destroyed or being destroyed.
    fn dependents_of(&self, owner: &Record) -> Vec<(ModelClass, Record)> {
        let registry = self.registry();
        let mut found: Vec<(ModelClass, Record)> = Vec::new();

        for descriptor in self.schema().dependents() {
            let Ok(target) = registry.model(&descriptor.target) else {
                continue;
            };
            let associated = match descriptor.kind {
                AssociationKind::HasMany => {
                    HasMany::new(owner.clone(), descriptor.clone(), target.clone()).records()
                }
                AssociationKind::BelongsTo => owner
                    .pending_link(&descriptor.foreign_key)
                    .or_else(|| {
                        owner
                            .get(&descriptor.foreign_key)
                            .as_ref()
                            .and_then(PrimaryKey::from_value)
                            .and_then(|key| target.lookup_reference(key))
                    })
                    .into_iter()
                    .collect(),
            };
            for record in associated {
                let claimed = record.is_destroyed() || record.is_destroying();
                if !claimed && !found.iter().any(|(_, r)| r.ptr_eq(&record)) {
                    found.push((target.clone(), record));
                }
            }
        }
        found
    }

    // =========================================================================
    // Guards and hooks
    // =========================================================================

    fn ensure_state(&self, record: &Record, action: Action, expected: Lifecycle) -> PersistResult<()> {
        if record.lifecycle() == expected {
            Ok(())
        } else {
            Err(self.invalid_state(record, action))
        }
    }

    fn invalid_state(&self, record: &Record, action: Action) -> PersistError {
        PersistError::InvalidState {
            model: self.name().to_string(),
            key: record.key().to_string(),
            action,
            state: record.lifecycle(),
        }
    }

    fn saved_key(&self, record: &Record, action: Action) -> PersistResult<PrimaryKey> {
        record
            .primary_key()
            .ok_or_else(|| self.invalid_state(record, action))
    }

    /// Full validation; an invalid record is rejected before any transport call.
    fn ensure_valid(&self, record: &Record) -> PersistResult<()> {
        if record.validate(None) {
            return Ok(());
        }
        let errors = record.errors();
        self.state.stats.increment_validation_failures();
        debug!(
            target: TARGET_PERSIST,
            event = %Event::ValidationRejected,
            model = %self.name(),
            key = %record.key(),
            fields = errors.len(),
            "validation rejected record"
        );
        Err(PersistError::Validation {
            model: self.name().to_string(),
            errors,
        })
    }

    fn before_hooks(&self, action: Action, record: &Record) -> PersistResult<()> {
        let hooks = self.state.hooks.read().before(action);
        run_before(&hooks, record).map_err(|reason| {
            warn!(
                target: TARGET_PERSIST,
                event = %Event::HookAborted,
                model = %self.name(),
                action = %action,
                reason = %reason,
                "before hook aborted action"
            );
            PersistError::Aborted { action, reason }
        })
    }

    fn after_hooks(&self, action: Action, record: &Record) {
        let hooks = self.state.hooks.read().after(action);
        run_after(&hooks, record);
    }
}

/// Releases a delete claim when the delete stops early.
struct DestroyClaim<'a>(&'a Record);

impl Drop for DestroyClaim<'_> {
    fn drop(&mut self) {
        self.0.release_destroy();
    }
}
