use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::watch;

use super::{Document, DocumentStore, Fields, RemoteError, Snapshot};

#[derive(Debug)]
struct Collection {
    docs: BTreeMap<String, Fields>,
    tx: watch::Sender<Vec<Document>>,
}

impl Collection {
    fn new() -> Self {
        let (tx, _rx) = watch::channel(Vec::new());
        Self {
            docs: BTreeMap::new(),
            tx,
        }
    }

    fn snapshot(&self) -> Vec<Document> {
        self.docs
            .iter()
            .map(|(id, fields)| Document {
                id: id.clone(),
                fields: fields.clone(),
            })
            .collect()
    }

    fn publish(&self) {
        self.tx.send_replace(self.snapshot());
    }
}

#[derive(Debug, Default)]
struct Faults {
    /// Absolute write number (1-based) -> error to return instead.
    writes: BTreeMap<u64, RemoteError>,
    reads: VecDeque<RemoteError>,
}

/// In-memory document store with live snapshots.
///
/// Stands in for the hosted datastore in tests.
/// Writes are published to watchers synchronously, before the write call
/// returns. Failures can be injected per operation to exercise the
/// fail-closed and fail-fast paths of callers.
#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    collections: Mutex<HashMap<String, Collection>>,
    faults: Mutex<Faults>,
    deny_all: AtomicBool,
    writes: AtomicU64,
    next_id: AtomicU64,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next write (set, update or delete) fail with `err`.
    pub fn fail_next_write(&self, err: RemoteError) {
        self.fail_write_after(0, err);
    }

    /// Let `ok` more writes succeed, then fail the following one with `err`.
    pub fn fail_write_after(&self, ok: u64, err: RemoteError) {
        let at = self.writes.load(Ordering::SeqCst) + ok + 1;
        if let Ok(mut faults) = self.faults.lock() {
            faults.writes.insert(at, err);
        }
    }

    /// Make the next read (get, list or watch) fail with `err`.
    pub fn fail_next_read(&self, err: RemoteError) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.reads.push_back(err);
        }
    }

    /// Reject every operation with `PermissionDenied` while set.
    pub fn set_deny_all(&self, deny: bool) {
        self.deny_all.store(deny, Ordering::SeqCst);
    }

    /// Write attempts so far, failed ones included.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    fn denied(&self) -> Result<(), RemoteError> {
        if self.deny_all.load(Ordering::SeqCst) {
            return Err(RemoteError::PermissionDenied(
                "missing or insufficient permissions".to_string(),
            ));
        }
        Ok(())
    }

    fn begin_write(&self) -> Result<(), RemoteError> {
        let n = self.writes.fetch_add(1, Ordering::SeqCst) + 1;
        self.denied()?;
        let mut faults = self.faults.lock().map_err(|_| poisoned())?;
        match faults.writes.remove(&n) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn begin_read(&self) -> Result<(), RemoteError> {
        self.denied()?;
        let mut faults = self.faults.lock().map_err(|_| poisoned())?;
        match faults.reads.pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn with_collection<R>(
        &self,
        collection: &str,
        f: impl FnOnce(&mut Collection) -> R,
    ) -> Result<R, RemoteError> {
        let mut collections = self.collections.lock().map_err(|_| poisoned())?;
        let entry = collections
            .entry(collection.to_string())
            .or_insert_with(Collection::new);
        Ok(f(entry))
    }
}

fn poisoned() -> RemoteError {
    RemoteError::Unavailable("lock poisoned".to_string())
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    fn allocate_id(&self) -> String {
        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        format!("doc-{n:06}-{}", uuid::Uuid::now_v7().simple())
    }

    async fn set(&self, collection: &str, id: &str, fields: Fields) -> Result<(), RemoteError> {
        self.begin_write()?;
        self.with_collection(collection, |c| {
            c.docs.insert(id.to_string(), fields);
            c.publish();
        })
    }

    async fn update(&self, collection: &str, id: &str, fields: Fields) -> Result<(), RemoteError> {
        self.begin_write()?;
        self.with_collection(collection, |c| {
            let doc = c.docs.get_mut(id).ok_or_else(|| RemoteError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })?;
            doc.extend(fields);
            c.publish();
            Ok(())
        })?
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), RemoteError> {
        self.begin_write()?;
        self.with_collection(collection, |c| {
            if c.docs.remove(id).is_some() {
                c.publish();
            }
        })
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, RemoteError> {
        self.begin_read()?;
        self.with_collection(collection, |c| {
            c.docs.get(id).map(|fields| Document {
                id: id.to_string(),
                fields: fields.clone(),
            })
        })
    }

    async fn list(&self, collection: &str) -> Result<Vec<Document>, RemoteError> {
        self.begin_read()?;
        self.with_collection(collection, |c| c.snapshot())
    }

    async fn watch(&self, collection: &str) -> Result<Snapshot, RemoteError> {
        self.begin_read()?;
        self.with_collection(collection, |c| {
            // Receivers created by `subscribe` start out "seen"; the current
            // value is readable immediately through `borrow`.
            c.tx.subscribe()
        })
    }
}
