pub mod json_store;
pub mod memory;
pub mod schema;
pub mod snapshot;

use anyhow::Result;

/// Key-value store for opaque JSON blobs.
pub trait PersistentStore {
    fn save(&self, key: &str, blob: &str) -> Result<()>;
    fn load(&self, key: &str) -> Result<Option<String>>;
    fn clear(&self, key: &str) -> Result<()>;
}

impl<S: PersistentStore + ?Sized> PersistentStore for &S {
    fn save(&self, key: &str, blob: &str) -> Result<()> {
        (**self).save(key, blob)
    }

    fn load(&self, key: &str) -> Result<Option<String>> {
        (**self).load(key)
    }

    fn clear(&self, key: &str) -> Result<()> {
        (**self).clear(key)
    }
}
