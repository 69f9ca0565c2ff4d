//! Infrastructure layer: local persistence, the hosted document store and
//! identity providers.
//!
//! Domain crates stay free of IO; everything that touches storage or a
//! remote service lives here behind a trait.

pub mod document;
pub mod identity;
pub mod kv;
pub mod local_store;
pub mod remote_store;

pub use document::{
    Document, DocumentStore, Fields, InMemoryDocumentStore, RemoteError, SqliteDocumentStore,
};
pub use identity::{HostedIdentityProvider, LocalIdentityProvider};
pub use kv::{InMemoryKeyValueStore, KeyValueStore, SqliteKeyValueStore, StorageError};
pub use local_store::LocalPantryStore;
pub use remote_store::{RemotePantryStore, Subscription};
