/// Routing key for stored items. Each category maps to one backend and
/// one destination (folder, CSV file, or table).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StorageCategory {
    /// Primary scraped records.
    Data,
    /// Failed URLs and error reports.
    Error,
    /// Raw response bodies kept for reprocessing.
    Raw,
    Custom(String),
}

impl StorageCategory {
    pub fn destination(&self) -> &str {
        match self {
            StorageCategory::Data => "data",
            StorageCategory::Error => "errors",
            StorageCategory::Raw => "raw",
            StorageCategory::Custom(name) => name,
        }
    }
}

impl Default for StorageCategory {
    fn default() -> Self {
        StorageCategory::Data
    }
}
