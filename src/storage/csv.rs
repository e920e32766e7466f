use super::base::{StorageBackend, StorageConfig, StorageError, StorageItem};
use anyhow::Error;
use async_trait::async_trait;
use erased_serde::Serialize as ErasedSerialize;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Appends flat records to one CSV file per collection. Files start with a
/// UTF-8 BOM so Korean text opens correctly in Excel.
#[derive(Clone)]
pub struct CsvStorage {
    base_path: PathBuf,
    sinks: Arc<Mutex<HashMap<String, CsvSink>>>,
}

struct CsvSink {
    columns: Vec<String>,
    writer: csv::Writer<File>,
}

impl CsvStorage {
    pub fn new<P: AsRef<Path>>(base_path: P) -> Result<Self, Error> {
        let base_path = base_path.as_ref().to_path_buf();
        fs::create_dir_all(&base_path)?;
        Ok(Self {
            base_path,
            sinks: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    fn field_to_string(value: &Value) -> String {
        match value {
            Value::Null => String::new(),
            Value::String(s) => s.clone(),
            Value::Array(items) => items
                .iter()
                .map(Self::field_to_string)
                .collect::<Vec<_>>()
                .join(", "),
            other => other.to_string(),
        }
    }

    fn rows_from(value: Value) -> Result<Vec<serde_json::Map<String, Value>>, StorageError> {
        let candidates = match value {
            Value::Array(items) => items,
            other => vec![other],
        };

        candidates
            .into_iter()
            .map(|row| match row {
                Value::Object(map) => Ok(map),
                other => Err(StorageError::SerializationError(format!(
                    "CSV storage requires flat records, got: {}",
                    other
                ))),
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct CsvConfig {
    pub filename: String,
}

impl StorageConfig for CsvConfig {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn clone_box(&self) -> Box<dyn StorageConfig> {
        Box::new(self.clone())
    }
}

#[async_trait]
impl StorageBackend for CsvStorage {
    fn create_config(&self, collection_name: &str) -> Box<dyn StorageConfig> {
        Box::new(CsvConfig {
            filename: format!("{}.csv", collection_name),
        })
    }

    async fn store_serialized(
        &self,
        item: StorageItem<Box<dyn ErasedSerialize + Send + Sync>>,
        config: &dyn StorageConfig,
    ) -> Result<(), StorageError> {
        let config = config
            .as_any()
            .downcast_ref::<CsvConfig>()
            .expect("Invalid config type");

        let value = serde_json::to_value(&item.data)?;
        let rows = Self::rows_from(value)?;
        if rows.is_empty() {
            return Ok(());
        }

        let mut sinks = self.sinks.lock();
        if !sinks.contains_key(&config.filename) {
            let path = self.base_path.join(&config.filename);
            let mut file = File::create(&path)?;
            file.write_all("\u{FEFF}".as_bytes())?;

            let columns: Vec<String> = rows[0].keys().cloned().collect();
            let mut writer = csv::Writer::from_writer(file);
            writer
                .write_record(&columns)
                .map_err(|e| StorageError::OperationError(e.to_string()))?;
            sinks.insert(config.filename.clone(), CsvSink { columns, writer });
        }

        let sink = sinks.get_mut(&config.filename).expect("sink just inserted");
        for row in &rows {
            let record: Vec<String> = sink
                .columns
                .iter()
                .map(|column| row.get(column).map(Self::field_to_string).unwrap_or_default())
                .collect();
            sink.writer
                .write_record(&record)
                .map_err(|e| StorageError::OperationError(e.to_string()))?;
        }
        sink.writer
            .flush()
            .map_err(|e| StorageError::OperationError(e.to_string()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use url::Url;

    fn item(data: Value) -> StorageItem<Box<dyn ErasedSerialize + Send + Sync>> {
        StorageItem {
            url: Url::parse("https://product.kyobobook.co.kr/api/review/list").unwrap(),
            timestamp: Utc::now(),
            id: "test".to_string(),
            data,
            metadata: None,
        }
        .erased()
    }

    #[tokio::test]
    async fn writes_bom_header_and_batched_rows() {
        let dir = tempfile::tempdir().unwrap();
        let storage = CsvStorage::new(dir.path()).unwrap();
        let config = storage.create_config("reviews");

        let batch = json!([
            {"content": "재밌어요", "product_code": "S001", "rating": 10},
            {"content": "별로, 그냥 그래요", "product_code": "S001", "rating": 4},
        ]);
        storage
            .store_serialized(item(batch), config.as_ref())
            .await
            .unwrap();
        storage
            .store_serialized(
                item(json!({"content": "good", "product_code": "S002", "rating": 8})),
                config.as_ref(),
            )
            .await
            .unwrap();

        let raw = std::fs::read(dir.path().join("reviews.csv")).unwrap();
        assert!(raw.starts_with(&[0xEF, 0xBB, 0xBF]), "missing UTF-8 BOM");

        let text = String::from_utf8(raw[3..].to_vec()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "content,product_code,rating");
        assert_eq!(lines[3], "good,S002,8");
        // Commas inside fields stay quoted.
        assert!(lines[2].starts_with("\"별로, 그냥 그래요\""));
    }

    #[tokio::test]
    async fn rejects_non_object_records() {
        let dir = tempfile::tempdir().unwrap();
        let storage = CsvStorage::new(dir.path()).unwrap();
        let config = storage.create_config("reviews");

        let result = storage
            .store_serialized(item(json!(["not", "objects"])), config.as_ref())
            .await;
        assert!(matches!(result, Err(StorageError::SerializationError(_))));
    }

    #[tokio::test]
    async fn joins_array_fields_with_commas() {
        let dir = tempfile::tempdir().unwrap();
        let storage = CsvStorage::new(dir.path()).unwrap();
        let config = storage.create_config("books");

        let data = json!({"keywords": ["주식투자", "etf"], "title": "투자책"});
        storage
            .store_serialized(item(data), config.as_ref())
            .await
            .unwrap();

        let raw = std::fs::read(dir.path().join("books.csv")).unwrap();
        let text = String::from_utf8(raw[3..].to_vec()).unwrap();
        assert!(text.contains("\"주식투자, etf\""));
    }
}
