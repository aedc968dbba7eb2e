//! Houdin Store
//!
//! Local state and its sync with the remote store.
//!
//! - [`StateStorage`] persists named JSON documents and announces changes so
//!   every context can rehydrate ([`MemoryStorage`], [`JsonFileStorage`])
//! - [`LocalStore`] owns the `houdin-store` document and hands out the
//!   workflow and credential slices
//! - [`WorkflowStore`] records every local mutation in the outbox
//! - [`SyncReconciler`] pulls remote changes, pushes the outbox, and drains
//!   what the remote acknowledged

mod credentials;
mod error;
mod remote;
mod session;
mod state;
mod storage;
mod sync;
mod workflows;

pub use credentials::{CredentialStore, credential_schemas};
pub use error::StoreError;
pub use remote::{HttpRemoteApi, RemoteApi};
pub use session::{Account, Plan, Session, SessionStore};
pub use state::{LocalStore, PersistedState, SyncState, SyncStatus};
pub use storage::{
  JsonFileStorage, MemoryStorage, SESSION_STORE_NAME, STORE_NAME, StateStorage, StorageChange,
};
pub use sync::{SyncOutcome, SyncReconciler, SyncReport};
pub use workflows::WorkflowStore;
