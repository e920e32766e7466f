use crate::core::retry::{
    BackoffPolicy, CategoryConfig, ContentRetryCondition, ParseRetryCondition, ParseRetryType,
    RetryCategory, RetryCondition, RetryConfig,
};
use crate::core::spider::{ParseResult, SpiderCallback, SpiderConfig, SpiderResponse};
use crate::http::HttpRequest;
use crate::scrapers::mock_scraper::{MockResponse, MockScraper};
use crate::storage::StorageError;
use crate::{Crawler, ScraperError, ScraperResult, Spider};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

struct TestSpider {
    config: SpiderConfig,
    attempt_count: Arc<RwLock<usize>>,
    retry_behavior: RetryBehavior,
}

enum RetryBehavior {
    NoRetry,
    RetryWithSame { max_attempts: usize, storage_error: bool },
    RetryWithNew { max_attempts: usize },
}

impl TestSpider {
    fn new(attempt_count: Arc<RwLock<usize>>, behavior: RetryBehavior) -> Self {
        Self {
            config: SpiderConfig::default(),
            attempt_count,
            retry_behavior: behavior,
        }
    }
}

#[async_trait]
impl Spider for TestSpider {
    fn name(&self) -> String {
        "test_spider".to_string()
    }

    fn start_urls(&self) -> Vec<Url> {
        vec![Url::parse("http://example.com").unwrap()]
    }

    fn config(&self) -> &SpiderConfig {
        &self.config
    }

    fn set_config(&mut self, config: SpiderConfig) {
        self.config = config;
    }

    async fn parse(
        &self,
        response: SpiderResponse,
        url: Url,
        _depth: usize,
    ) -> ScraperResult<ParseResult> {
        let mut count = self.attempt_count.write();
        *count += 1;

        match &self.retry_behavior {
            RetryBehavior::NoRetry => Ok(ParseResult::Skip),
            RetryBehavior::RetryWithSame {
                max_attempts,
                storage_error,
            } => {
                if *count < *max_attempts {
                    if *storage_error {
                        Err((
                            ScraperError::StorageError(StorageError::OperationError(
                                "test storage error".to_string(),
                            )),
                            response.response.from_request,
                        ))
                    } else {
                        Ok(ParseResult::RetryWithSameContent(Box::new(
                            response.response,
                        )))
                    }
                } else {
                    Ok(ParseResult::Skip)
                }
            }
            RetryBehavior::RetryWithNew { max_attempts } => {
                if *count < *max_attempts {
                    let request = HttpRequest::new(url, SpiderCallback::ParseItem, 0);
                    Ok(ParseResult::RetryWithNewContent(Box::new(request)))
                } else {
                    Ok(ParseResult::Skip)
                }
            }
        }
    }
}

struct PaginatingSpider {
    config: SpiderConfig,
    parsed_urls: Arc<RwLock<Vec<String>>>,
    products: usize,
    pages: usize,
}

#[async_trait]
impl Spider for PaginatingSpider {
    fn name(&self) -> String {
        "paginating_spider".to_string()
    }

    fn start_urls(&self) -> Vec<Url> {
        (1..=self.products)
            .map(|product| {
                Url::parse(&format!("http://example.com/product{}/page1", product)).unwrap()
            })
            .collect()
    }

    fn config(&self) -> &SpiderConfig {
        &self.config
    }

    fn set_config(&mut self, config: SpiderConfig) {
        self.config = config;
    }

    async fn parse(
        &self,
        _response: SpiderResponse,
        url: Url,
        depth: usize,
    ) -> ScraperResult<ParseResult> {
        self.parsed_urls.write().push(url.to_string());

        let current_page = depth + 1;
        if current_page < self.pages {
            let next = url.join(&format!("page{}", current_page + 1)).unwrap();
            Ok(ParseResult::Continue(vec![HttpRequest::new(
                next,
                SpiderCallback::ParsePagination,
                depth + 1,
            )]))
        } else {
            Ok(ParseResult::Skip)
        }
    }
}

struct FailingReportSpider {
    config: SpiderConfig,
    report_attempted: Arc<RwLock<bool>>,
}

#[async_trait]
impl Spider for FailingReportSpider {
    fn name(&self) -> String {
        "failing_report_spider".to_string()
    }

    fn start_urls(&self) -> Vec<Url> {
        vec![Url::parse("http://example.com/blocked").unwrap()]
    }

    fn config(&self) -> &SpiderConfig {
        &self.config
    }

    fn set_config(&mut self, config: SpiderConfig) {
        self.config = config;
    }

    async fn parse(
        &self,
        _response: SpiderResponse,
        _url: Url,
        _depth: usize,
    ) -> ScraperResult<ParseResult> {
        Ok(ParseResult::Skip)
    }

    async fn handle_max_retries(
        &self,
        _category: RetryCategory,
        request: Box<HttpRequest>,
    ) -> ScraperResult<()> {
        *self.report_attempted.write() = true;
        Err((
            ScraperError::StorageError(StorageError::ConnectionError(
                "error sink is down".to_string(),
            )),
            request,
        ))
    }
}

fn parse_retry_config(category: RetryCategory, condition: ParseRetryCondition) -> RetryConfig {
    let mut retry_config = RetryConfig::default();
    retry_config.categories.insert(
        category,
        CategoryConfig {
            max_retries: 2,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(1),
            conditions: vec![RetryCondition::Parse(condition)],
            backoff_policy: BackoffPolicy::Constant,
        },
    );
    retry_config
}

#[tokio::test]
async fn crawler_retries_with_same_content() {
    let attempt_count = Arc::new(RwLock::new(0));
    let max_attempts = 3;
    let spider = TestSpider::new(
        Arc::clone(&attempt_count),
        RetryBehavior::RetryWithSame {
            max_attempts,
            storage_error: false,
        },
    );

    let retry_config = parse_retry_config(
        RetryCategory::ParseError,
        ParseRetryCondition::Content(
            ContentRetryCondition {
                pattern: "retry".to_string(),
                is_regex: false,
            },
            ParseRetryType::SameContent,
        ),
    );

    let config = SpiderConfig::default().with_retry(retry_config);
    let spider = spider.with_config(config);

    let scraper = Box::new(MockScraper::new(vec![MockResponse {
        status: 200,
        body: "test content".to_string(),
        delay: None,
    }]));
    let crawler = Crawler::new(scraper);

    crawler.run(spider).await.unwrap();

    assert_eq!(
        *attempt_count.read(),
        max_attempts,
        "Expected {} attempts (initial + {} retries)",
        max_attempts,
        max_attempts - 1
    );
}

#[tokio::test]
async fn crawler_retries_with_new_content() {
    let attempt_count = Arc::new(RwLock::new(0));
    let spider = TestSpider::new(
        Arc::clone(&attempt_count),
        RetryBehavior::RetryWithNew { max_attempts: 3 },
    );

    let retry_config = parse_retry_config(
        RetryCategory::ParseError,
        ParseRetryCondition::Content(
            ContentRetryCondition {
                pattern: "retry".to_string(),
                is_regex: false,
            },
            ParseRetryType::FetchNew,
        ),
    );

    let config = SpiderConfig::default()
        .with_retry(retry_config)
        .with_allow_url_revisit(true);
    let spider = spider.with_config(config);

    let scraper = Box::new(MockScraper::new(vec![MockResponse {
        status: 200,
        body: "first response".to_string(),
        delay: None,
    }]));
    let crawler = Crawler::new(scraper);

    crawler.run(spider).await.unwrap();

    assert_eq!(*attempt_count.read(), 3); // Initial + 2 retries with new content
}

#[tokio::test]
async fn crawler_retries_on_storage_error() {
    let attempt_count = Arc::new(RwLock::new(0));
    let max_attempts = 3;
    let spider = TestSpider::new(
        Arc::clone(&attempt_count),
        RetryBehavior::RetryWithSame {
            max_attempts,
            storage_error: true,
        },
    );

    let retry_config = parse_retry_config(
        RetryCategory::StorageError,
        ParseRetryCondition::StorageError(
            StorageError::OperationError("test storage error".to_string()),
            ParseRetryType::SameContent,
        ),
    );

    let config = SpiderConfig::default().with_retry(retry_config);
    let spider = spider.with_config(config);

    let scraper = Box::new(MockScraper::new(vec![MockResponse {
        status: 200,
        body: "test response".to_string(),
        delay: None,
    }]));
    let crawler = Crawler::new(scraper);

    crawler.run(spider).await.unwrap();

    assert_eq!(*attempt_count.read(), max_attempts);
}

#[tokio::test]
async fn crawler_stops_retrying_at_category_limit() {
    let attempt_count = Arc::new(RwLock::new(0));
    let spider = TestSpider::new(
        Arc::clone(&attempt_count),
        RetryBehavior::RetryWithSame {
            max_attempts: 99,
            storage_error: false,
        },
    );

    let mut retry_config = RetryConfig::default();
    retry_config.categories.insert(
        RetryCategory::ParseError,
        CategoryConfig {
            max_retries: 5,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(1),
            conditions: vec![RetryCondition::Parse(ParseRetryCondition::Content(
                ContentRetryCondition {
                    pattern: "retry".to_string(),
                    is_regex: false,
                },
                ParseRetryType::SameContent,
            ))],
            backoff_policy: BackoffPolicy::Constant,
        },
    );

    let config = SpiderConfig::default().with_retry(retry_config);
    let spider = spider.with_config(config);

    let scraper = Box::new(MockScraper::new(vec![MockResponse {
        status: 200,
        body: "test response".to_string(),
        delay: None,
    }]));
    let crawler = Crawler::new(scraper);

    crawler.run(spider).await.unwrap();

    assert_eq!(*attempt_count.read(), 6); // Initial + 5 retries, then the budget is spent
}

#[tokio::test]
async fn full_pool_keeps_scheduled_pages() {
    let parsed_urls = Arc::new(RwLock::new(Vec::new()));
    let spider = PaginatingSpider {
        config: SpiderConfig::default(),
        parsed_urls: Arc::clone(&parsed_urls),
        products: 4,
        pages: 2,
    };

    // One in-flight request at a time forces every follow-up page to
    // wait while the pool is full.
    let spider = spider.with_config(SpiderConfig::default().with_concurrency(1).with_depth(2));

    let scraper = Box::new(MockScraper::new(vec![MockResponse {
        status: 200,
        body: "page content".to_string(),
        delay: None,
    }]));
    let crawler = Crawler::new(scraper);

    crawler.run(spider).await.unwrap();

    let parsed = parsed_urls.read();
    assert_eq!(
        parsed.len(),
        8,
        "every product should reach page 2, got: {:?}",
        *parsed
    );
    for product in 1..=4 {
        for page in 1..=2 {
            let url = format!("http://example.com/product{}/page{}", product, page);
            assert!(parsed.contains(&url), "missing {}", url);
        }
    }
}

#[tokio::test]
async fn failed_error_report_does_not_abort_the_crawl() {
    use crate::core::retry::RequestRetryCondition;

    let report_attempted = Arc::new(RwLock::new(false));
    let spider = FailingReportSpider {
        config: SpiderConfig::default(),
        report_attempted: Arc::clone(&report_attempted),
    };

    let mut retry_config = RetryConfig::default();
    retry_config.categories.insert(
        RetryCategory::RateLimit,
        CategoryConfig {
            max_retries: 1,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(1),
            conditions: vec![RetryCondition::Request(RequestRetryCondition::StatusCode(
                429,
            ))],
            backoff_policy: BackoffPolicy::Constant,
        },
    );
    let spider = spider.with_config(SpiderConfig::default().with_retry(retry_config));

    let scraper = Box::new(MockScraper::new(vec![MockResponse {
        status: 429,
        body: "too many requests".to_string(),
        delay: None,
    }]));
    let crawler = Crawler::new(scraper);

    let result = crawler.run(spider).await;

    assert!(result.is_ok(), "a failed error report must not end the run");
    assert!(*report_attempted.read());
}

#[tokio::test]
async fn crawler_runs_once_without_retry_config() {
    let attempt_count = Arc::new(RwLock::new(0));
    let spider = TestSpider::new(Arc::clone(&attempt_count), RetryBehavior::NoRetry);

    let spider = spider.with_config(SpiderConfig::default());

    let scraper = Box::new(MockScraper::new(vec![MockResponse {
        status: 200,
        body: "test content".to_string(),
        delay: None,
    }]));
    let crawler = Crawler::new(scraper);

    crawler.run(spider).await.unwrap();

    assert_eq!(
        *attempt_count.read(),
        1,
        "Expected exactly one attempt with no retries"
    );
}
