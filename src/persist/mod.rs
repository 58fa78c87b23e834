//! Persistence: local cache, external target and the reconciler between them.

pub mod cache;
pub mod codec;
pub mod external;
pub mod sync;

pub use cache::{LocalCache, PersistenceSettings};
pub use external::{DirectoryTarget, ExternalTarget, BACKUP_FILE_NAME};
pub use sync::{Connection, Notice, Reconciler, SyncReport, SyncStatus};
