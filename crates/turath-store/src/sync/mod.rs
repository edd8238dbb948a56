//! Synchronization with the remote authority.

pub mod backoff;
pub mod coordinator;
pub mod remote;

pub use backoff::Backoff;
pub use coordinator::{PushFailure, PushReport, SyncCoordinator, SyncState, SyncStatus};
pub use remote::{ChangeEnvelope, HttpRemote, PushAck, RemoteAuthority, SyncError};
