use super::base::{StorageBackend, StorageConfig, StorageError, StorageItem};
use super::factory::Storage;
use super::types::StorageCategory;
use serde::Serialize;
use std::collections::HashMap;

/// Routes items to the backend registered for their category.
#[derive(Clone, Default)]
pub struct StorageManager {
    registry: HashMap<StorageCategory, (Storage, Box<dyn StorageConfig>)>,
}

impl StorageManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a backend using the category's default destination name.
    pub fn register(&mut self, category: StorageCategory, storage: Storage) {
        let config = storage.create_config(category.destination());
        self.registry.insert(category, (storage, config));
    }

    /// Registers a backend writing to an explicit destination (folder,
    /// CSV file stem, or table name).
    pub fn register_at(&mut self, category: StorageCategory, storage: Storage, destination: &str) {
        let config = storage.create_config(destination);
        self.registry.insert(category, (storage, config));
    }

    pub fn has_storage(&self, category: &StorageCategory) -> bool {
        self.registry.contains_key(category)
    }

    pub async fn store<T>(
        &self,
        category: &StorageCategory,
        item: StorageItem<T>,
    ) -> Result<(), StorageError>
    where
        T: Serialize + Send + Sync + 'static,
    {
        let (storage, config) = self.registry.get(category).ok_or_else(|| {
            StorageError::OperationError(format!(
                "No storage registered for category '{}'",
                category.destination()
            ))
        })?;

        storage.store_serialized(item.erased(), config.as_ref()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{create_storage, StorageType};
    use chrono::Utc;
    use serde_json::json;
    use url::Url;

    fn item(id: &str) -> StorageItem<serde_json::Value> {
        StorageItem {
            url: Url::parse("https://product.kyobobook.co.kr/detail/S001").unwrap(),
            timestamp: Utc::now(),
            id: id.to_string(),
            data: json!({"title": "책"}),
            metadata: None,
        }
    }

    #[tokio::test]
    async fn routes_by_category() {
        let data_dir = tempfile::tempdir().unwrap();
        let error_dir = tempfile::tempdir().unwrap();

        let mut manager = StorageManager::new();
        manager.register(
            StorageCategory::Data,
            create_storage(StorageType::Disk {
                path: data_dir.path().to_string_lossy().into_owned(),
            })
            .await
            .unwrap(),
        );
        manager.register(
            StorageCategory::Error,
            create_storage(StorageType::Disk {
                path: error_dir.path().to_string_lossy().into_owned(),
            })
            .await
            .unwrap(),
        );

        manager
            .store(&StorageCategory::Data, item("S001"))
            .await
            .unwrap();

        assert!(data_dir.path().join("data").exists());
        assert!(!error_dir.path().join("errors").exists());
    }

    #[tokio::test]
    async fn unregistered_category_is_an_error() {
        let manager = StorageManager::new();
        assert!(!manager.has_storage(&StorageCategory::Raw));

        let result = manager.store(&StorageCategory::Raw, item("S001")).await;
        assert!(matches!(result, Err(StorageError::OperationError(_))));
    }
}
