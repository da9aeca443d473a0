//! In-process transport
//!
//! Behaves like a small REST backend held in memory:
//! - `create` on a collection URL stores the body and assigns an integer id
//!   when the body carries none
//! - `read` on a collection URL lists records whose fields equal every
//!   request param; `read` on `<collection>/<id>` returns one record
//! - `update` merges the body into the stored record
//! - `delete` removes the record
//!
//! Every request is logged for inspection, and failures can be injected.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use indexmap::IndexMap;
use parking_lot::Mutex;
use serde_json::Value;

use super::{Payload, Request, Response, Transport, TransportError, TransportFuture, TransportResult, Verb};
use crate::model::PrimaryKey;
use crate::Attributes;

const DEFAULT_PRIMARY_KEY: &str = "id";

/// A failure to inject.
#[derive(Debug, Clone)]
struct FailureRule {
    verb: Option<Verb>,
    url: Option<String>,
    /// `None` fails every match until cleared
    remaining: Option<usize>,
    error: TransportError,
}

impl FailureRule {
    fn matches(&self, request: &Request) -> bool {
        self.verb.map_or(true, |verb| verb == request.verb)
            && self.url.as_deref().map_or(true, |url| url == request.url)
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    /// Collection URL -> (record id -> record)
    collections: HashMap<String, IndexMap<String, Attributes>>,
    /// Collection URL -> primary key field, when not `id`
    primary_keys: HashMap<String, String>,
    next_id: i64,
    log: Vec<Request>,
    failures: Vec<FailureRule>,
    latency: Option<Duration>,
}

impl MemoryState {
    fn primary_key(&self, collection: &str) -> &str {
        self.primary_keys
            .get(collection)
            .map(String::as_str)
            .unwrap_or(DEFAULT_PRIMARY_KEY)
    }

    fn take_failure(&mut self, request: &Request) -> Option<TransportError> {
        let index = self.failures.iter().position(|rule| rule.matches(request))?;
        let error = self.failures[index].error.clone();
        match self.failures[index].remaining {
            Some(n) if n <= 1 => {
                self.failures.remove(index);
            }
            Some(n) => self.failures[index].remaining = Some(n - 1),
            None => {}
        }
        Some(error)
    }

    /// Splits `<collection>/<id>` when `<collection>` is known.
    fn split_member<'u>(&self, url: &'u str) -> Option<(&'u str, &'u str)> {
        let (collection, id) = url.rsplit_once('/')?;
        (!id.is_empty() && self.collections.contains_key(collection)).then_some((collection, id))
    }

    fn handle(&mut self, request: &Request) -> TransportResult<Response> {
        match request.verb {
            Verb::Create => self.create(request),
            Verb::Read => self.read(request),
            Verb::Update => self.update(request),
            Verb::Delete => self.delete(request),
        }
    }

    fn create(&mut self, request: &Request) -> TransportResult<Response> {
        let mut record = match &request.body {
            Some(Value::Object(map)) => map.clone(),
            None => Attributes::new(),
            Some(_) => return Err(TransportError::status(422, "body must be an object")),
        };
        let pk_field = self.primary_key(&request.url).to_string();
        let id = match record.get(&pk_field).and_then(PrimaryKey::from_value) {
            Some(existing) => existing,
            None => {
                self.next_id += 1;
                let id = PrimaryKey::Int(self.next_id);
                record.insert(pk_field, id.to_value());
                id
            }
        };
        self.collections
            .entry(request.url.clone())
            .or_default()
            .insert(id.to_string(), record.clone());
        Ok(Response::new(201, Payload::Record(record)))
    }

    fn read(&self, request: &Request) -> TransportResult<Response> {
        if let Some(records) = self.collections.get(&request.url) {
            let matched = records
                .values()
                .filter(|record| {
                    request
                        .params
                        .iter()
                        .all(|(field, expected)| record.get(field).unwrap_or(&Value::Null) == expected)
                })
                .cloned()
                .collect();
            return Ok(Response::ok(Payload::Records(matched)));
        }
        match self.split_member(&request.url) {
            Some((collection, id)) => self.collections[collection]
                .get(id)
                .cloned()
                .map(|record| Response::ok(Payload::Record(record)))
                .ok_or_else(|| TransportError::not_found(&request.url)),
            None if looks_like_member(&request.url) => Err(TransportError::not_found(&request.url)),
            // A collection nobody has written to yet
            None => Ok(Response::ok(Payload::Records(Vec::new()))),
        }
    }

    fn update(&mut self, request: &Request) -> TransportResult<Response> {
        let (collection, id) = self
            .split_member(&request.url)
            .map(|(c, i)| (c.to_string(), i.to_string()))
            .ok_or_else(|| TransportError::not_found(&request.url))?;
        let changes = match &request.body {
            Some(Value::Object(map)) => map.clone(),
            None => Attributes::new(),
            Some(_) => return Err(TransportError::status(422, "body must be an object")),
        };
        let pk_field = self.primary_key(&collection).to_string();
        let stored = self
            .collections
            .get_mut(&collection)
            .and_then(|records| records.get_mut(&id))
            .ok_or_else(|| TransportError::not_found(&request.url))?;
        for (field, value) in changes {
            if field != pk_field {
                stored.insert(field, value);
            }
        }
        Ok(Response::ok(Payload::Record(stored.clone())))
    }

    fn delete(&mut self, request: &Request) -> TransportResult<Response> {
        let (collection, id) = self
            .split_member(&request.url)
            .map(|(c, i)| (c.to_string(), i.to_string()))
            .ok_or_else(|| TransportError::not_found(&request.url))?;
        self.collections
            .get_mut(&collection)
            .and_then(|records| records.shift_remove(&id))
            .map(|_| Response::new(204, Payload::Empty))
            .ok_or_else(|| TransportError::not_found(&request.url))
    }
}

/// `/posts/12` style URLs whose last segment is an integer id.
fn looks_like_member(url: &str) -> bool {
    url.rsplit_once('/')
        .is_some_and(|(_, tail)| tail.parse::<i64>().is_ok())
}

/// In-memory [`Transport`] for tests, demos and offline use.
///
/// Cloning yields another handle onto the same backend.
#[derive(Debug, Clone, Default)]
pub struct MemoryTransport {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays every response, letting concurrent calls interleave.
    pub fn with_latency(self, latency: Duration) -> Self {
        self.state.lock().latency = Some(latency);
        self
    }

    /// Uses `field` instead of `id` as the primary key of `collection`.
    pub fn with_primary_key(self, collection: impl Into<String>, field: impl Into<String>) -> Self {
        self.state
            .lock()
            .primary_keys
            .insert(collection.into(), field.into());
        self
    }

    /// Stores records directly, bypassing the request log.
    pub fn seed(&self, collection: &str, records: impl IntoIterator<Item = Attributes>) {
        let mut state = self.state.lock();
        let pk_field = state.primary_key(collection).to_string();
        let mut stored = Vec::new();
        for record in records {
            if let Some(id) = record.get(&pk_field).and_then(PrimaryKey::from_value) {
                if let PrimaryKey::Int(n) = id {
                    state.next_id = state.next_id.max(n);
                }
                stored.push((id.to_string(), record));
            }
        }
        state
            .collections
            .entry(collection.to_string())
            .or_default()
            .extend(stored);
    }

    /// The stored copy of one record.
    pub fn stored(&self, collection: &str, id: impl Into<PrimaryKey>) -> Option<Attributes> {
        let state = self.state.lock();
        state
            .collections
            .get(collection)?
            .get(&id.into().to_string())
            .cloned()
    }

    /// Number of records stored in `collection`.
    pub fn stored_count(&self, collection: &str) -> usize {
        self.state
            .lock()
            .collections
            .get(collection)
            .map_or(0, IndexMap::len)
    }

    /// Fails the next request with `error`.
    pub fn fail_next(&self, error: TransportError) {
        self.push_failure(None, None, Some(1), error);
    }

    /// Fails every `verb` request to `url` until [`clear_failures`](Self::clear_failures).
    pub fn fail_on(&self, verb: Verb, url: impl Into<String>, error: TransportError) {
        self.push_failure(Some(verb), Some(url.into()), None, error);
    }

    pub fn clear_failures(&self) {
        self.state.lock().failures.clear();
    }

    fn push_failure(&self, verb: Option<Verb>, url: Option<String>, remaining: Option<usize>, error: TransportError) {
        self.state.lock().failures.push(FailureRule {
            verb,
            url,
            remaining,
            error,
        });
    }

    /// Every request received so far, in order.
    pub fn requests(&self) -> Vec<Request> {
        self.state.lock().log.clone()
    }

    pub fn request_count(&self) -> usize {
        self.state.lock().log.len()
    }

    /// Requests received with `verb`.
    pub fn count(&self, verb: Verb) -> usize {
        self.state
            .lock()
            .log
            .iter()
            .filter(|request| request.verb == verb)
            .count()
    }

    pub fn clear_log(&self) {
        self.state.lock().log.clear();
    }
}

impl Transport for MemoryTransport {
    fn request(&self, request: Request) -> TransportFuture<'_> {
        Box::pin(async move {
            let latency = {
                let mut state = self.state.lock();
                state.log.push(request.clone());
                state.latency
            };
            if let Some(latency) = latency {
                tokio::time::sleep(latency).await;
            }

            let mut state = self.state.lock();
            if let Some(error) = state.take_failure(&request) {
                return Err(error);
            }
            state.handle(&request)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn attrs(value: Value) -> Attributes {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[tokio::test]
    async fn test_create_assigns_ids() {
        let transport = MemoryTransport::new();
        let request = Request::new(Verb::Create, "/posts").with_body(json!({"title": "a"}));

        let response = transport.request(request).await.unwrap();
        assert_eq!(response.status, 201);
        match response.payload {
            Payload::Record(record) => assert_eq!(record["id"], 1),
            other => panic!("unexpected payload {:?}", other),
        }

        let second = transport
            .request(Request::new(Verb::Create, "/posts").with_body(json!({"title": "b"})))
            .await
            .unwrap();
        assert!(matches!(second.payload, Payload::Record(ref r) if r["id"] == 2));
        assert_eq!(transport.stored_count("/posts"), 2);
    }

    #[tokio::test]
    async fn test_read_filters_by_params() {
        let transport = MemoryTransport::new();
        transport.seed(
            "/comments",
            vec![
                attrs(json!({"id": 1, "post_id": 1})),
                attrs(json!({"id": 2, "post_id": 2})),
                attrs(json!({"id": 3, "post_id": 1})),
            ],
        );

        let mut params = Attributes::new();
        params.insert("post_id".into(), json!(1));
        let response = transport
            .request(Request::new(Verb::Read, "/comments").with_params(params))
            .await
            .unwrap();

        match response.payload {
            Payload::Records(records) => {
                let ids: Vec<_> = records.iter().map(|r| r["id"].clone()).collect();
                assert_eq!(ids, vec![json!(1), json!(3)]);
            }
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_member_read_update_delete() {
        let transport = MemoryTransport::new();
        transport.seed("/posts", vec![attrs(json!({"id": 5, "title": "old"}))]);

        let read = transport.request(Request::new(Verb::Read, "/posts/5")).await.unwrap();
        assert!(matches!(read.payload, Payload::Record(ref r) if r["title"] == "old"));

        let updated = transport
            .request(Request::new(Verb::Update, "/posts/5").with_body(json!({"title": "new", "id": 99})))
            .await
            .unwrap();
        assert!(matches!(updated.payload, Payload::Record(ref r) if r["title"] == "new" && r["id"] == 5));

        let deleted = transport.request(Request::new(Verb::Delete, "/posts/5")).await.unwrap();
        assert_eq!(deleted.status, 204);

        let missing = transport.request(Request::new(Verb::Read, "/posts/5")).await;
        assert!(missing.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_unknown_collection_reads_empty() {
        let transport = MemoryTransport::new();
        let response = transport.request(Request::new(Verb::Read, "/tags")).await.unwrap();
        assert_eq!(response.payload, Payload::Records(Vec::new()));

        let member = transport.request(Request::new(Verb::Read, "/tags/3")).await;
        assert!(member.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let transport = MemoryTransport::new();
        transport.fail_next(TransportError::Network("offline".into()));

        let first = transport.request(Request::new(Verb::Read, "/posts")).await;
        assert_eq!(first.unwrap_err(), TransportError::Network("offline".into()));
        assert!(transport.request(Request::new(Verb::Read, "/posts")).await.is_ok());

        transport.fail_on(Verb::Delete, "/posts/1", TransportError::status(500, "boom"));
        for _ in 0..2 {
            let err = transport.request(Request::new(Verb::Delete, "/posts/1")).await.unwrap_err();
            assert_eq!(err.status_code(), Some(500));
        }
        transport.clear_failures();
        assert_eq!(transport.request_count(), 4);
        assert_eq!(transport.count(Verb::Delete), 2);
    }

    #[tokio::test]
    async fn test_custom_primary_key() {
        let transport = MemoryTransport::new().with_primary_key("/users", "slug");
        transport.seed("/users", vec![attrs(json!({"slug": "ada", "name": "Ada"}))]);

        assert_eq!(transport.stored("/users", "ada").unwrap()["name"], "Ada");
    }
}
