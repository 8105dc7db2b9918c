pub mod error;
pub mod local;
pub mod remote;
pub mod store;

pub use error::{RemoteError, StorageError};
pub use local::LocalStore;
pub use remote::RemoteApiClient;
pub use store::{FileStore, KeyValueStore, MemoryStore};
