use super::base::{StorageBackend, StorageConfig, StorageError, StorageItem};
use super::csv::CsvStorage;
use super::disk::DiskStorage;
use super::supabase::SupabaseStorage;
use anyhow::Error;
use async_trait::async_trait;
use erased_serde::Serialize as ErasedSerialize;

#[derive(Debug, Clone)]
pub enum StorageType {
    Disk {
        path: String,
    },
    Csv {
        path: String,
    },
    Supabase {
        url: String,
        api_key: String,
        on_conflict: Option<String>,
    },
}

#[derive(Clone)]
pub enum Storage {
    Disk(DiskStorage),
    Csv(CsvStorage),
    Supabase(SupabaseStorage),
}

pub async fn create_storage(storage_type: StorageType) -> Result<Storage, Error> {
    match storage_type {
        StorageType::Disk { path } => Ok(Storage::Disk(DiskStorage::new(path)?)),
        StorageType::Csv { path } => Ok(Storage::Csv(CsvStorage::new(path)?)),
        StorageType::Supabase {
            url,
            api_key,
            on_conflict,
        } => {
            let mut storage = SupabaseStorage::new(&url, &api_key)?;
            if let Some(column) = on_conflict {
                storage = storage.with_on_conflict(&column);
            }
            Ok(Storage::Supabase(storage))
        }
    }
}

#[async_trait]
impl StorageBackend for Storage {
    fn create_config(&self, destination: &str) -> Box<dyn StorageConfig> {
        match self {
            Storage::Disk(storage) => storage.create_config(destination),
            Storage::Csv(storage) => storage.create_config(destination),
            Storage::Supabase(storage) => storage.create_config(destination),
        }
    }

    async fn store_serialized(
        &self,
        item: StorageItem<Box<dyn ErasedSerialize + Send + Sync>>,
        config: &dyn StorageConfig,
    ) -> Result<(), StorageError> {
        match self {
            Storage::Disk(storage) => storage.store_serialized(item, config).await,
            Storage::Csv(storage) => storage.store_serialized(item, config).await,
            Storage::Supabase(storage) => storage.store_serialized(item, config).await,
        }
    }
}
