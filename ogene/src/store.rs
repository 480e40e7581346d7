use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;
use thiserror::Error;

use crate::event::{Event, EventId};

/// Durable keyed record storage for events. There is deliberately no
/// partial-field update: every mutation is a full read, in-memory modify,
/// full conditional write.

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("event store unavailable: {0}")]
    Unavailable(String),
    #[error("stored event record is malformed: {0}")]
    Malformed(String),
}

#[derive(Error, Debug)]
pub enum SaveError {
    /// Another writer saved the record between our read and our write.
    #[error("version conflict on save")]
    Conflict,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A fetched record together with the version the next save must name.
#[derive(Clone, Debug, PartialEq)]
pub struct StoredEvent {
    pub event: Event,
    pub version: i64,
}

#[async_trait]
pub trait EventStore {
    /// Allocate a new record and return its store-assigned id.
    async fn create_event(&self, event: Event) -> Result<EventId, StoreError>;

    /// Fetch by id. `Ok(None)` means no such record, which is distinct
    /// from a backend failure.
    async fn get_event(&self, id: EventId) -> Result<Option<StoredEvent>, StoreError>;

    /// Replace the whole record, conditional on `expected_version` still
    /// being current. Never retried here; callers own the retry loop.
    async fn save_event(
        &self,
        id: EventId,
        event: &Event,
        expected_version: i64,
    ) -> Result<(), SaveError>;
}

pub struct PostgresEventStore {
    pool: PgPool,
}

impl PostgresEventStore {
    pub async fn new(url: &str) -> Result<PostgresEventStore, StoreError> {
        let pool = PgPoolOptions::new()
            .connect(url)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        Ok(PostgresEventStore { pool })
    }
}

#[async_trait]
impl EventStore for PostgresEventStore {
    async fn create_event(&self, event: Event) -> Result<EventId, StoreError> {
        let row = sqlx::query("INSERT INTO events (record, version) VALUES ($1, 0) RETURNING id")
            .bind(sqlx::types::Json(&event))
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        row.try_get("id")
            .map_err(|e| StoreError::Malformed(e.to_string()))
    }

    async fn get_event(&self, id: EventId) -> Result<Option<StoredEvent>, StoreError> {
        let row = sqlx::query("SELECT record, version FROM events WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        let Some(row) = row else {
            return Ok(None);
        };

        // Decoding through the typed record keeps only declared fields, so
        // nothing the backend decorated a query result with survives a
        // later save.
        let record: sqlx::types::Json<Event> = row
            .try_get("record")
            .map_err(|e| StoreError::Malformed(e.to_string()))?;
        let version: i64 = row
            .try_get("version")
            .map_err(|e| StoreError::Malformed(e.to_string()))?;

        Ok(Some(StoredEvent {
            event: record.0,
            version,
        }))
    }

    async fn save_event(
        &self,
        id: EventId,
        event: &Event,
        expected_version: i64,
    ) -> Result<(), SaveError> {
        let result =
            sqlx::query("UPDATE events SET record = $2, version = version + 1 WHERE id = $1 AND version = $3")
                .bind(id)
                .bind(sqlx::types::Json(event))
                .bind(expected_version)
                .execute(&self.pool)
                .await
                .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        // Zero rows covers both a concurrent writer and a vanished record;
        // the caller's re-read tells the two apart.
        if result.rows_affected() == 0 {
            return Err(SaveError::Conflict);
        }

        Ok(())
    }
}

#[derive(Default)]
struct MemoryInner {
    next_id: EventId,
    events: HashMap<EventId, StoredEvent>,
}

/// In-memory store for tests and local development. Counts every call and
/// can inject unavailability or version conflicts on demand.
#[derive(Clone, Default)]
pub struct MemoryEventStore {
    inner: Arc<Mutex<MemoryInner>>,
    calls: Arc<AtomicUsize>,
    unavailable: Arc<AtomicBool>,
    forced_conflicts: Arc<AtomicUsize>,
}

impl MemoryEventStore {
    pub fn new() -> MemoryEventStore {
        MemoryEventStore::default()
    }

    /// Number of store operations attempted so far, successful or not.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Make the next `count` saves fail with a version conflict even when
    /// the version matches, to exercise retry paths.
    pub fn force_conflicts(&self, count: usize) {
        self.forced_conflicts.store(count, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(String::from("injected failure")));
        }
        Ok(())
    }
}

#[async_trait]
impl EventStore for MemoryEventStore {
    async fn create_event(&self, event: Event) -> Result<EventId, StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;

        let mut inner = self.inner.lock().unwrap();
        inner.next_id += 1;
        let id = inner.next_id;
        inner.events.insert(id, StoredEvent { event, version: 0 });

        Ok(id)
    }

    async fn get_event(&self, id: EventId) -> Result<Option<StoredEvent>, StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;

        let inner = self.inner.lock().unwrap();
        Ok(inner.events.get(&id).cloned())
    }

    async fn save_event(
        &self,
        id: EventId,
        event: &Event,
        expected_version: i64,
    ) -> Result<(), SaveError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;

        if self
            .forced_conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(SaveError::Conflict);
        }

        let mut inner = self.inner.lock().unwrap();
        match inner.events.get_mut(&id) {
            Some(stored) if stored.version == expected_version => {
                stored.event = event.clone();
                stored.version += 1;
                Ok(())
            }
            _ => Err(SaveError::Conflict),
        }
    }
}
