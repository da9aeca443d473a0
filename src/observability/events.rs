//! Observable record lifecycle events
//!
//! Every `tracing` line emitted by the record layer carries one of these
//! names in its `event` field so log consumers can filter on a stable key.

use std::fmt;

/// Observable events in the record layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Declaration
    /// A model class was resolved into the registry
    ModelDeclared,
    /// Registry construction finished
    RegistryReady,

    // Cache
    /// A record was inserted into an identity map
    CacheInsert,
    /// An incoming record was merged into an existing entry
    CacheMerge,
    /// A lookup was served from the identity map
    CacheHit,
    /// A lookup missed the identity map
    CacheMiss,
    /// A record was evicted
    CacheEvict,
    /// A temporary key was replaced by a primary key
    CacheRekey,

    // Validation
    /// Validation rejected a persistence call
    ValidationRejected,

    // Transport
    /// A transport request is about to be issued
    TransportRequest,
    /// A transport request failed
    TransportFailed,

    // Persistence
    /// Record created server-side
    RecordCreated,
    /// Record updated server-side
    RecordUpdated,
    /// Record destroyed
    RecordDestroyed,
    /// A before hook aborted an action
    HookAborted,

    // Associations
    /// A pending association link received its key
    LinkResolved,
    /// Dependent destroy cascade started
    CascadeBegin,
    /// Dependent destroy cascade left some dependents alive
    CascadePartial,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::ModelDeclared => "MODEL_DECLARED",
            Event::RegistryReady => "REGISTRY_READY",

            Event::CacheInsert => "CACHE_INSERT",
            Event::CacheMerge => "CACHE_MERGE",
            Event::CacheHit => "CACHE_HIT",
            Event::CacheMiss => "CACHE_MISS",
            Event::CacheEvict => "CACHE_EVICT",
            Event::CacheRekey => "CACHE_REKEY",

            Event::ValidationRejected => "VALIDATION_REJECTED",

            Event::TransportRequest => "TRANSPORT_REQUEST",
            Event::TransportFailed => "TRANSPORT_FAILED",

            Event::RecordCreated => "RECORD_CREATED",
            Event::RecordUpdated => "RECORD_UPDATED",
            Event::RecordDestroyed => "RECORD_DESTROYED",
            Event::HookAborted => "HOOK_ABORTED",

            Event::LinkResolved => "LINK_RESOLVED",
            Event::CascadeBegin => "CASCADE_BEGIN",
            Event::CascadePartial => "CASCADE_PARTIAL",
        }
    }

    /// Returns true if this event reports a failure surfaced to the caller
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Event::ValidationRejected
                | Event::TransportFailed
                | Event::HookAborted
                | Event::CascadePartial
        )
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
