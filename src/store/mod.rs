#![forbid(unsafe_code)]

pub mod file;
pub mod memory;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{Result, TaskdeckError};

pub use file::FileStore;
pub use memory::MemoryStore;

pub const SESSION_KEY: &str = "user_session";
pub const TASKS_KEY: &str = "user_tasks";
pub const ERRORS_KEY: &str = "app_errors";
pub const FILTERS_KEY: &str = "task_filters";
pub const THEME_KEY: &str = "app_theme";
pub const LOCALE_KEY: &str = "app_language";

/// String-keyed value storage shared by every local service.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> Result<()>;
    /// Removing a missing key is not an error.
    async fn remove(&self, key: &str) -> Result<()>;
}

pub async fn get_json<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
) -> Result<Option<T>> {
    let Some(raw) = store.get(key).await? else {
        return Ok(None);
    };
    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|source| TaskdeckError::Decode {
            key: key.to_owned(),
            source,
        })
}

pub async fn set_json<T: Serialize + ?Sized>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> Result<()> {
    let raw = serde_json::to_string(value).map_err(|source| TaskdeckError::Encode {
        key: key.to_owned(),
        source,
    })?;
    store.set(key, &raw).await
}

pub(crate) fn validate_key(key: &str) -> Result<()> {
    if key.trim().is_empty()
        || key.contains('/')
        || key.contains('\\')
        || key.contains("..")
    {
        return Err(TaskdeckError::InvalidStoreKey(key.to_owned()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, Serialize, serde::Deserialize)]
    struct Blob {
        n: u32,
    }

    #[tokio::test]
    async fn json_helpers_handle_missing_and_corrupt_values() {
        let store = MemoryStore::new();
        assert_eq!(get_json::<Blob>(&store, "blob").await.unwrap(), None);

        set_json(&store, "blob", &Blob { n: 7 }).await.unwrap();
        assert_eq!(
            get_json::<Blob>(&store, "blob").await.unwrap(),
            Some(Blob { n: 7 })
        );

        store.set("blob", "{not json").await.unwrap();
        let err = get_json::<Blob>(&store, "blob").await.unwrap_err();
        assert!(matches!(err, TaskdeckError::Decode { .. }));
    }

    #[test]
    fn rejects_path_like_keys() {
        assert!(validate_key("user_tasks").is_ok());
        assert!(validate_key("").is_err());
        assert!(validate_key("../etc").is_err());
        assert!(validate_key("a/b").is_err());
    }
}
