use async_trait::async_trait;
use log::warn;
use std::time::Duration;
use url::Url;

use crate::core::retry::{RetryCategory, RetryConfig};
use crate::core::ScraperResult;
use crate::http::{HttpRequest, HttpResponse};

#[derive(Debug, Clone)]
pub enum SpiderCallback {
    Bootstrap,
    ParsePagination,
    ParseItem,
    Custom(String),
}

#[derive(Debug, Clone)]
pub struct SpiderConfig {
    pub max_depth: usize,
    pub max_concurrency: usize,
    pub allow_url_revisit: bool,
    /// Politeness pause before every fetch.
    pub download_delay: Option<Duration>,
    pub headers: Vec<(String, String)>,
    pub retry_config: RetryConfig,
}

impl Default for SpiderConfig {
    fn default() -> Self {
        Self {
            max_depth: 2,
            max_concurrency: 10,
            allow_url_revisit: false,
            download_delay: None,
            headers: Vec::new(),
            retry_config: RetryConfig::default(),
        }
    }
}

impl SpiderConfig {
    pub fn with_retry(mut self, retry_config: RetryConfig) -> Self {
        self.retry_config = retry_config;
        self
    }

    pub fn with_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }

    pub fn with_allow_url_revisit(mut self, allow: bool) -> Self {
        self.allow_url_revisit = allow;
        self
    }

    pub fn with_download_delay(mut self, delay: Duration) -> Self {
        self.download_delay = Some(delay);
        self
    }

    pub fn with_headers(mut self, headers: Vec<(&str, &str)>) -> Self {
        self.headers = headers
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        self
    }
}

#[derive(Debug, Clone)]
pub struct SpiderResponse {
    pub response: HttpResponse,
    pub callback: SpiderCallback,
}

#[derive(Debug)]
pub enum ParseResult {
    /// Schedule more requests.
    Continue(Vec<HttpRequest>),
    /// Nothing more to do for this branch.
    Skip,
    /// Stop the whole crawl.
    Stop,
    /// Re-run the spider's parse over the response we already have.
    RetryWithSameContent(Box<HttpResponse>),
    /// Fetch the URL again and parse the fresh response.
    RetryWithNewContent(Box<HttpRequest>),
}

#[async_trait]
pub trait Spider: Send + Sync {
    fn name(&self) -> String;
    fn start_urls(&self) -> Vec<Url>;
    fn config(&self) -> &SpiderConfig;
    fn set_config(&mut self, config: SpiderConfig);

    fn with_config(mut self, config: SpiderConfig) -> Self
    where
        Self: Sized,
    {
        self.set_config(config);
        self
    }

    fn start_requests(&self) -> Vec<HttpRequest> {
        self.start_urls()
            .into_iter()
            .map(|url| HttpRequest::new(url, SpiderCallback::Bootstrap, 0))
            .collect()
    }

    async fn parse(
        &self,
        response: SpiderResponse,
        url: Url,
        depth: usize,
    ) -> ScraperResult<ParseResult>;

    async fn process_response(&self, response: &SpiderResponse) -> ScraperResult<ParseResult> {
        let url = response.response.url.clone();
        let depth = response.response.from_request.depth;
        self.parse(response.clone(), url, depth).await
    }

    async fn handle_max_retries(
        &self,
        category: RetryCategory,
        request: Box<HttpRequest>,
    ) -> ScraperResult<()> {
        warn!(
            "Giving up on {} after exhausting retries (category: {:?})",
            request.url, category
        );
        Ok(())
    }

    fn allowed_domains(&self) -> Option<Vec<String>> {
        None
    }
}
