use async_trait::async_trait;
use chrono::Utc;
use reqwest::{header, Client, ClientBuilder};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

use super::Scraper;
use crate::core::SpiderConfig;
use crate::http::response::ResponseType;
use crate::http::HttpRequest;
use crate::HttpResponse;
use crate::{ScraperError, ScraperResult, StatsTracker};

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

#[derive(Debug, Error)]
pub enum HttpScraperError {
    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("Invalid header name: {0}")]
    InvalidHeaderName(#[from] header::InvalidHeaderName),
    #[error("Invalid header value: {0}")]
    InvalidHeaderValue(#[from] header::InvalidHeaderValue),
    #[error("Failed to decode response body: {0}")]
    DecodingError(String),
}

impl From<HttpScraperError> for ScraperError {
    fn from(err: HttpScraperError) -> Self {
        match err {
            HttpScraperError::HttpError(e) => ScraperError::HttpError(e),
            HttpScraperError::DecodingError(msg) => ScraperError::DecodingError(msg),
            other => ScraperError::ParsingError(other.to_string()),
        }
    }
}

#[derive(Clone)]
pub struct HttpScraper {
    client: Client,
    stats: Arc<StatsTracker>,
}

impl HttpScraper {
    pub fn new() -> Result<Self, HttpScraperError> {
        let client = ClientBuilder::new().user_agent(DEFAULT_USER_AGENT).build()?;

        Ok(Self {
            client,
            stats: Arc::new(StatsTracker::new()),
        })
    }

    pub fn with_headers(mut self, headers: Vec<(&str, &str)>) -> Result<Self, HttpScraperError> {
        let mut header_map = header::HeaderMap::new();
        header_map.insert(
            header::USER_AGENT,
            header::HeaderValue::from_static(DEFAULT_USER_AGENT),
        );

        for (key, value) in headers {
            let name = header::HeaderName::from_bytes(key.as_bytes())?;
            let value = header::HeaderValue::from_str(value)?;
            header_map.insert(name, value);
        }

        self.client = ClientBuilder::new().default_headers(header_map).build()?;

        Ok(self)
    }

    fn extract_headers(response: &reqwest::Response) -> HashMap<String, String> {
        response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|val| (k.to_string(), val.to_string())))
            .collect()
    }

    fn detect_content_type(headers: &HashMap<String, String>, body: &str) -> ResponseType {
        if let Some(content_type) = headers.get("content-type") {
            if content_type.contains("text/html") {
                ResponseType::Html
            } else if content_type.contains("application/json") {
                ResponseType::Json
            } else if content_type.contains("text/") {
                ResponseType::Text
            } else {
                ResponseType::Binary
            }
        } else {
            // Try to detect content type from body
            if body.trim_start().starts_with('{') || body.trim_start().starts_with('[') {
                ResponseType::Json
            } else if body.trim_start().starts_with("<!DOCTYPE")
                || body.trim_start().starts_with("<html")
            {
                ResponseType::Html
            } else {
                ResponseType::Text
            }
        }
    }
}

#[async_trait]
impl Scraper for HttpScraper {
    async fn fetch_single(
        &self,
        request: HttpRequest,
        config: &SpiderConfig,
    ) -> ScraperResult<HttpResponse> {
        let method = request.method.clone();
        let from_request = request.clone();
        let mut req = self.client.request(method.clone(), request.url.clone());

        // Apply spider config headers
        for (key, value) in &config.headers {
            req = req.header(key, value);
        }

        // Apply request-specific headers
        for (key, value) in &request.headers {
            req = req.header(key, value);
        }

        if let Some(body) = request.body.clone() {
            req = req.body(body);
        }

        let start_time = Utc::now();
        let request_for_error = request.clone();
        let response = req.send().await.map_err(|e| {
            (
                ScraperError::from(HttpScraperError::HttpError(e)),
                Box::new(request_for_error),
            )
        })?;

        let status = response.status().as_u16();
        let headers = Self::extract_headers(&response);

        // Get raw bytes and decoded text
        let raw_body = response.bytes().await.map_err(|e| {
            (
                ScraperError::from(HttpScraperError::HttpError(e)),
                Box::new(request.clone()),
            )
        })?;

        let decoded_body = String::from_utf8(raw_body.to_vec()).map_err(|e| {
            (
                ScraperError::from(HttpScraperError::DecodingError(e.to_string())),
                Box::new(request.clone()),
            )
        })?;

        let end_time = Utc::now();

        let meta = json!({
            "request": {
                "method": method.as_str(),
            },
            "response": {
                "elapsed": (end_time - start_time).num_milliseconds(),
                "content_length": raw_body.len(),
                "encoding": headers.get("content-encoding").cloned().unwrap_or_default(),
            }
        });

        let response_type = Self::detect_content_type(&headers, &decoded_body);

        Ok(HttpResponse {
            url: request.url,
            status,
            headers,
            raw_body: raw_body.to_vec(),
            decoded_body,
            timestamp: start_time,
            retry_count: 0,
            retry_history: HashMap::new(),
            meta: Some(meta),
            response_type,
            from_request: Box::new(from_request),
        })
    }

    fn box_clone(&self) -> Box<dyn Scraper> {
        Box::new(self.clone())
    }

    fn stats(&self) -> &StatsTracker {
        &self.stats
    }

    fn set_stats(&mut self, stats: Arc<StatsTracker>) {
        self.stats = stats;
    }
}
