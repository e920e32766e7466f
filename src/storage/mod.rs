mod base;
mod csv;
mod disk;
mod factory;
mod manager;
mod supabase;
mod types;

pub use base::{IntoStorageData, StorageBackend, StorageConfig, StorageError, StorageItem};
pub use csv::{CsvConfig, CsvStorage};
pub use disk::{DiskConfig, DiskStorage};
pub use factory::{create_storage, Storage, StorageType};
pub use manager::StorageManager;
pub use supabase::{SupabaseConfig, SupabaseStorage};
pub use types::StorageCategory;
