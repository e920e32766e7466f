use super::base::{StorageBackend, StorageConfig, StorageError, StorageItem};
use async_trait::async_trait;
use erased_serde::Serialize as ErasedSerialize;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Client;

/// Writes rows through the Supabase PostgREST endpoint. With an
/// `on_conflict` column set, inserts become upserts on that column.
#[derive(Clone)]
pub struct SupabaseStorage {
    client: Client,
    base_url: String,
    on_conflict: Option<String>,
}

impl SupabaseStorage {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self, StorageError> {
        let mut headers = HeaderMap::new();
        let key = HeaderValue::from_str(api_key)
            .map_err(|e| StorageError::ConnectionError(e.to_string()))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", api_key))
            .map_err(|e| StorageError::ConnectionError(e.to_string()))?;
        headers.insert("apikey", key);
        headers.insert(AUTHORIZATION, bearer);

        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| StorageError::ConnectionError(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            on_conflict: None,
        })
    }

    pub fn with_on_conflict(mut self, column: &str) -> Self {
        self.on_conflict = Some(column.to_string());
        self
    }
}

#[derive(Debug, Clone)]
pub struct SupabaseConfig {
    pub table: String,
    pub on_conflict: Option<String>,
}

impl StorageConfig for SupabaseConfig {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn clone_box(&self) -> Box<dyn StorageConfig> {
        Box::new(self.clone())
    }
}

#[async_trait]
impl StorageBackend for SupabaseStorage {
    fn create_config(&self, table_name: &str) -> Box<dyn StorageConfig> {
        Box::new(SupabaseConfig {
            table: table_name.to_string(),
            on_conflict: self.on_conflict.clone(),
        })
    }

    async fn store_serialized(
        &self,
        item: StorageItem<Box<dyn ErasedSerialize + Send + Sync>>,
        config: &dyn StorageConfig,
    ) -> Result<(), StorageError> {
        let config = config
            .as_any()
            .downcast_ref::<SupabaseConfig>()
            .expect("Invalid config type");

        let payload = serde_json::to_value(&item.data)?;
        let endpoint = format!("{}/rest/v1/{}", self.base_url, config.table);

        let mut request = self.client.post(&endpoint);
        let prefer = if let Some(column) = &config.on_conflict {
            request = request.query(&[("on_conflict", column.as_str())]);
            "return=minimal,resolution=merge-duplicates"
        } else {
            "return=minimal"
        };

        let response = request
            .header("Prefer", prefer)
            .json(&payload)
            .send()
            .await
            .map_err(|e| StorageError::ConnectionError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StorageError::OperationError(format!(
                "{} insert failed with {}: {}",
                config.table, status, body
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use url::Url;
    use wiremock::matchers::{body_json, header, headers, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn item(data: serde_json::Value) -> StorageItem<Box<dyn ErasedSerialize + Send + Sync>> {
        StorageItem {
            url: Url::parse("https://store.kyobobook.co.kr/bestseller/online/monthly").unwrap(),
            timestamp: Utc::now(),
            id: "test".to_string(),
            data,
            metadata: None,
        }
        .erased()
    }

    #[tokio::test]
    async fn posts_batch_with_auth_headers() {
        let server = MockServer::start().await;
        let rows = json!([
            {"product_code": "S001", "content": "좋아요"},
            {"product_code": "S001", "content": "추천합니다"},
        ]);

        Mock::given(method("POST"))
            .and(path("/rest/v1/reviews"))
            .and(header("apikey", "secret-key"))
            .and(header("Authorization", "Bearer secret-key"))
            .and(header("Prefer", "return=minimal"))
            .and(body_json(&rows))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let storage = SupabaseStorage::new(&server.uri(), "secret-key").unwrap();
        let config = storage.create_config("reviews");
        storage
            .store_serialized(item(rows.clone()), config.as_ref())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn upserts_when_conflict_column_is_set() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/rest/v1/books"))
            .and(query_param("on_conflict", "product_code"))
            .and(headers(
                "Prefer",
                vec!["return=minimal", "resolution=merge-duplicates"],
            ))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let storage = SupabaseStorage::new(&server.uri(), "secret-key")
            .unwrap()
            .with_on_conflict("product_code");
        let config = storage.create_config("books");
        storage
            .store_serialized(item(json!({"product_code": "S001"})), config.as_ref())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn surfaces_postgrest_errors() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/rest/v1/books"))
            .respond_with(
                ResponseTemplate::new(409).set_body_string("duplicate key value"),
            )
            .mount(&server)
            .await;

        let storage = SupabaseStorage::new(&server.uri(), "secret-key").unwrap();
        let config = storage.create_config("books");
        let result = storage
            .store_serialized(item(json!({"product_code": "S001"})), config.as_ref())
            .await;

        match result {
            Err(StorageError::OperationError(message)) => {
                assert!(message.contains("409"));
                assert!(message.contains("duplicate key value"));
            }
            other => panic!("expected operation error, got {:?}", other.err()),
        }
    }
}
