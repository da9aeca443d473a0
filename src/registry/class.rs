//! Model class handles
//!
//! A `ModelClass` is the per-model entry point: building records, reading
//! through the identity map, and (in `persist.rs`) writing through the
//! transport.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, trace, warn};

use super::{ClassState, IdentityMap, ModelRegistry, RegistryShared};
use crate::error::{PersistError, PersistResult};
use crate::model::{Action, ModelSchema, PrimaryKey, Record, RecordKey};
use crate::observability::{Event, StatsSnapshot, TARGET_CACHE, TARGET_PERSIST};
use crate::transport::{Payload, Request, Response, TransportError, Verb};
use crate::Attributes;

/// Handle onto one model of a registry. Cheap to clone.
#[derive(Clone)]
pub struct ModelClass {
    pub(super) registry: Arc<RegistryShared>,
    pub(super) state: Arc<ClassState>,
}

impl ModelClass {
    pub(super) fn new(registry: Arc<RegistryShared>, state: Arc<ClassState>) -> Self {
        Self { registry, state }
    }

    pub fn name(&self) -> &str {
        self.state.schema.name()
    }

    pub fn schema(&self) -> &ModelSchema {
        &self.state.schema
    }

    pub fn registry(&self) -> ModelRegistry {
        ModelRegistry::from_shared(Arc::clone(&self.registry))
    }

    pub fn identity_map(&self) -> &IdentityMap {
        &self.state.map
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.state.stats.snapshot()
    }

    /// Registers a before hook at runtime, after any declared ones.
    pub fn before<F>(&self, action: Action, hook: F)
    where
        F: Fn(&Record) -> Result<(), String> + Send + Sync + 'static,
    {
        self.state.hooks.write().add_before(action, Arc::new(hook));
    }

    pub fn after<F>(&self, action: Action, hook: F)
    where
        F: Fn(&Record) + Send + Sync + 'static,
    {
        self.state.hooks.write().add_after(action, Arc::new(hook));
    }

    // =========================================================================
    // Local operations
    // =========================================================================

    /// New unsaved record under a temporary key. No transport call.
    pub fn build(&self, attrs: Attributes) -> Record {
        let record = Record::new(
            Arc::clone(&self.state.schema),
            Arc::downgrade(&self.registry),
            attrs,
            None,
        );
        debug!(
            target: TARGET_CACHE,
            model = %self.name(),
            key = %record.key(),
            "built record"
        );
        self.state.map.insert(record)
    }

    pub fn lookup_local(&self, key: &RecordKey) -> Option<Record> {
        self.state.map.lookup(key)
    }

    /// Cached record named by a foreign key value, whichever of the integer
    /// or text forms it was stored under.
    pub(crate) fn lookup_reference(&self, key: PrimaryKey) -> Option<Record> {
        let alternate = key.alternate();
        self.state
            .map
            .lookup(&RecordKey::Primary(key))
            .or_else(|| alternate.and_then(|key| self.state.map.lookup(&RecordKey::Primary(key))))
    }

    pub fn query_local<F>(&self, predicate: F) -> Vec<Record>
    where
        F: Fn(&Record) -> bool,
    {
        self.state.map.query_local(predicate)
    }

    /// Every cached record, in insertion order.
    pub fn cached(&self) -> Vec<Record> {
        self.state.map.records()
    }

    pub fn evict(&self, key: &RecordKey) -> Option<Record> {
        let evicted = self.state.map.evict(key);
        if evicted.is_some() {
            self.state.stats.increment_evictions();
        }
        evicted
    }

    /// Empties this model's identity map. Returns how many records were dropped.
    pub fn clear_cache(&self) -> usize {
        let cleared = self.state.map.clear();
        self.state.stats.add_evictions(cleared as u64);
        cleared
    }

    /// Stores server attributes, merging into the cached record for the same
    /// primary key when there is one.
    pub(crate) fn materialize(&self, attrs: Attributes) -> PersistResult<Record> {
        let key = self.row_key(&attrs)?;
        Ok(self.store(key, attrs))
    }

    fn row_key(&self, attrs: &Attributes) -> PersistResult<PrimaryKey> {
        let pk_field = self.schema().primary_key();
        attrs
            .get(pk_field)
            .and_then(PrimaryKey::from_value)
            .ok_or_else(|| {
                PersistError::Transport(TransportError::UnexpectedPayload(format!(
                    "{} record without a '{}' value",
                    self.name(),
                    pk_field
                )))
            })
    }

    fn store(&self, key: PrimaryKey, attrs: Attributes) -> Record {
        if let Some(existing) = self.state.map.lookup(&RecordKey::Primary(key.clone())) {
            existing.merge(&attrs);
            trace!(target: TARGET_CACHE, event = %Event::CacheMerge, model = %self.name(), key = %key);
            return existing;
        }

        let record = Record::new(
            Arc::clone(&self.state.schema),
            Arc::downgrade(&self.registry),
            attrs,
            Some(key),
        );
        self.state.map.insert(record)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Record by primary key, served from the identity map when cached.
    pub async fn find(&self, key: impl Into<PrimaryKey>) -> PersistResult<Record> {
        let key = key.into();
        if let Some(record) = self.state.map.lookup(&RecordKey::Primary(key.clone())) {
            self.state.stats.increment_cache_hits();
            trace!(target: TARGET_CACHE, event = %Event::CacheHit, model = %self.name(), key = %key);
            return Ok(record);
        }

        self.state.stats.increment_cache_misses();
        debug!(target: TARGET_CACHE, event = %Event::CacheMiss, model = %self.name(), key = %key);

        let url = self.schema().api().url(Verb::Read, Some(&key));
        let response = self.send(Request::new(Verb::Read, url)).await?;
        match response.payload {
            Payload::Record(attrs) => self.materialize(attrs),
            other => Err(unexpected(self.name(), "find", &other)),
        }
    }

    /// Records matching `criteria` on the server.
    ///
    /// Always issues a transport read. Results are merged into the identity
    /// map and returned in server order without duplicates. A response with
    /// any row lacking a primary key is rejected whole, leaving the cache
    /// untouched.
    pub async fn where_(&self, criteria: Attributes) -> PersistResult<Vec<Record>> {
        let url = self.schema().api().url(Verb::Read, None);
        let response = self.send(Request::new(Verb::Read, url).with_params(criteria)).await?;
        let rows = match response.payload {
            Payload::Records(rows) => rows,
            Payload::Record(row) => vec![row],
            Payload::Empty => Vec::new(),
        };

        // Every row is checked before any of them touches the cache.
        let keyed = rows
            .into_iter()
            .map(|row| Ok((self.row_key(&row)?, row)))
            .collect::<PersistResult<Vec<_>>>()?;

        let mut records: Vec<Record> = Vec::with_capacity(keyed.len());
        for (key, row) in keyed {
            let record = self.store(key, row);
            if !records.contains(&record) {
                records.push(record);
            }
        }
        Ok(records)
    }

    /// Every record of the model on the server.
    pub async fn all(&self) -> PersistResult<Vec<Record>> {
        self.where_(Attributes::new()).await
    }

    // =========================================================================
    // Transport
    // =========================================================================

    /// Issues one request. Non-success statuses become `TransportError::Status`.
    pub(crate) async fn send(&self, request: Request) -> PersistResult<Response> {
        let verb = request.verb;
        let url = request.url.clone();
        self.state.stats.increment_transport_calls();
        debug!(
            target: TARGET_PERSIST,
            event = %Event::TransportRequest,
            model = %self.name(),
            method = verb.http_method(),
            url = %url,
            "issuing transport request"
        );

        let transport = Arc::clone(&self.registry.transport);
        let outcome = match transport.request(request).await {
            Ok(response) if response.is_success() => Ok(response),
            Ok(response) => Err(TransportError::status(
                response.status,
                format!("{} {} returned {}", verb.http_method(), url, response.status),
            )),
            Err(error) => Err(error),
        };

        outcome.map_err(|error| {
            self.state.stats.increment_transport_failures();
            warn!(
                target: TARGET_PERSIST,
                event = %Event::TransportFailed,
                model = %self.name(),
                method = verb.http_method(),
                url = %url,
                error = %error,
                "transport request failed"
            );
            PersistError::Transport(error)
        })
    }

    pub(crate) fn ensure_owns(&self, record: &Record) -> PersistResult<()> {
        if record.model_name() == self.name() && record.is_from(&self.registry) {
            Ok(())
        } else {
            Err(PersistError::WrongModel {
                model: self.name().to_string(),
                record: record.model_name().to_string(),
            })
        }
    }
}

pub(super) fn unexpected(model: &str, operation: &str, payload: &Payload) -> PersistError {
    PersistError::Transport(TransportError::UnexpectedPayload(format!(
        "{} {} returned a {} payload",
        model,
        operation,
        payload.kind()
    )))
}

impl fmt::Debug for ModelClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelClass")
            .field("name", &self.name())
            .field("cached", &self.state.map.len())
            .finish()
    }
}
