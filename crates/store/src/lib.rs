//! Data-access layer for the Mapbook backend.
//!
//! This crate contains:
//! - The document-store transport abstraction and its in-process
//!   implementation (change-batch subscriptions, request/response writes)
//! - The map directory (map records, share codes, membership caps)
//! - The place ledger (visit create/append, replace, remove, cascade GC)
//! - The notification store
//! - The sync engine and map roster (live in-memory mirrors)
//!
//! The remote document store is the sole source of truth; every in-memory
//! place set here is a read-only projection rebuilt from its change stream.

pub mod error;
pub mod ledger;
pub mod maps;
pub mod memory;
pub mod metrics;
pub mod notifications;
pub mod roster;
pub mod sync;
pub mod transport;

pub use error::StoreError;
pub use ledger::{LedgerStore, RecordedVisit, RemoveOutcome};
pub use maps::{DirectoryPolicy, MapDirectory};
pub use memory::MemoryStore;
pub use notifications::NotificationStore;
pub use roster::{MapClass, MapRoster, RosterSnapshot};
pub use sync::{SubscriptionState, SyncEngine, SyncSignal};
pub use transport::{ChangeBatch, ChangeStream, DocChange, DocumentStore, TransportError};
