//! Avatar ingestion and file lifecycle.
//!
//! - `coordinator` - Profile hooks that write, replace and delete avatar files
//! - `storage` - The asset storage boundary and its filesystem implementation
//! - `sweep` - Removal of files no profile refers to
//! - `url` - Public URL resolution with a default fallback

mod coordinator;
mod storage;
mod sweep;
mod url;

pub use coordinator::AvatarCoordinator;
pub use storage::{AssetStorage, FileSystemStorage, StorageError};
pub use sweep::{prune_orphans, SweepReport};
pub use url::avatar_url;
