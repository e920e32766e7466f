use async_trait::async_trait;
use chrono::Utc;
use log::{debug, info, warn};
use serde_json::json;
use url::Url;

use crate::core::retry::RetryCategory;
use crate::core::{ParseResult, ScraperError, ScraperResult, Spider, SpiderCallback, SpiderConfig, SpiderResponse};
use crate::http::HttpRequest;
use crate::models::{Review, ReviewListPayload};
use crate::storage::{StorageCategory, StorageItem, StorageManager};

const REVIEW_API: &str = "https://product.kyobobook.co.kr/api/review/list";
const PAGE_LIMIT: u32 = 10;

/// Pages through the Kyobo review list API for a set of products and
/// stores cleaned reviews in batches of one page each.
///
/// Pagination stops per product as soon as the API returns an empty
/// page. `max_depth` bounds the page count: page N carries depth N-1.
pub struct ReviewSpider {
    config: SpiderConfig,
    product_codes: Vec<String>,
    storage: StorageManager,
}

impl ReviewSpider {
    pub fn new(product_codes: Vec<String>, storage: StorageManager) -> Self {
        Self {
            config: SpiderConfig::default(),
            product_codes,
            storage,
        }
    }

    fn page_request(&self, product_code: &str, page: u32) -> HttpRequest {
        let mut url = Url::parse(REVIEW_API).expect("review API URL is valid");
        url.query_pairs_mut()
            .append_pair("page", &page.to_string())
            .append_pair("pageLimit", &PAGE_LIMIT.to_string())
            .append_pair("reviewSort", "001")
            .append_pair("revwPatrCode", "002")
            .append_pair("saleCmdtids", product_code)
            .append_pair("webToonYsno", "N")
            .append_pair("allYsno", "N")
            .append_pair("revwSummeryYn", "Y")
            .append_pair("saleCmdtid", product_code);

        let callback = if page == 1 {
            SpiderCallback::Bootstrap
        } else {
            SpiderCallback::ParsePagination
        };

        HttpRequest::new(url, callback, (page - 1) as usize)
            .with_meta(json!({ "product_code": product_code, "page": page }))
    }
}

/// Decodes one API page into cleaned reviews. A missing `data` or
/// `reviewList` field reads as an empty page, not an error.
pub fn extract_reviews(body: &str, product_code: &str) -> Result<Vec<Review>, ScraperError> {
    let payload: ReviewListPayload = serde_json::from_str(body)
        .map_err(|e| ScraperError::ParsingError(format!("Review payload: {}", e)))?;

    Ok(payload
        .data
        .map(|data| data.review_list)
        .unwrap_or_default()
        .into_iter()
        .map(|raw| Review::from_raw(raw, product_code))
        .collect())
}

#[async_trait]
impl Spider for ReviewSpider {
    fn name(&self) -> String {
        "kyobo_reviews".to_string()
    }

    fn start_urls(&self) -> Vec<Url> {
        self.start_requests().into_iter().map(|r| r.url).collect()
    }

    fn config(&self) -> &SpiderConfig {
        &self.config
    }

    fn set_config(&mut self, config: SpiderConfig) {
        self.config = config;
    }

    fn start_requests(&self) -> Vec<HttpRequest> {
        self.product_codes
            .iter()
            .map(|code| self.page_request(code, 1))
            .collect()
    }

    async fn parse(
        &self,
        response: SpiderResponse,
        url: Url,
        depth: usize,
    ) -> ScraperResult<ParseResult> {
        let meta = response
            .response
            .from_request
            .meta
            .clone()
            .unwrap_or_else(|| json!({}));
        let product_code = meta["product_code"].as_str().unwrap_or_default().to_string();
        let page = meta["page"].as_u64().unwrap_or(depth as u64 + 1) as u32;

        let reviews = match extract_reviews(&response.response.decoded_body, &product_code) {
            Ok(reviews) => reviews,
            Err(error) => return Err((error, response.response.from_request.clone())),
        };

        if reviews.is_empty() {
            debug!("No reviews on page {} for {}, stopping", page, product_code);
            return Ok(ParseResult::Skip);
        }

        info!(
            "Collected {} reviews for {} (page {})",
            reviews.len(),
            product_code,
            page
        );

        let item = StorageItem {
            url: url.clone(),
            timestamp: Utc::now(),
            id: format!("{}_p{}", product_code, page),
            data: reviews,
            metadata: Some(json!({ "page": page })),
        };
        if let Err(error) = self.storage.store(&StorageCategory::Data, item).await {
            return Err((
                ScraperError::StorageError(error),
                response.response.from_request.clone(),
            ));
        }

        Ok(ParseResult::Continue(vec![
            self.page_request(&product_code, page + 1)
        ]))
    }

    async fn handle_max_retries(
        &self,
        category: RetryCategory,
        request: Box<HttpRequest>,
    ) -> ScraperResult<()> {
        warn!(
            "Giving up on review page {} (category: {:?})",
            request.url, category
        );

        if self.storage.has_storage(&StorageCategory::Error) {
            let item = StorageItem {
                url: request.url.clone(),
                timestamp: Utc::now(),
                id: "retries_exhausted".to_string(),
                data: json!({
                    "url": request.url.to_string(),
                    "category": format!("{:?}", category),
                }),
                metadata: request.meta.clone(),
            };
            if let Err(error) = self.storage.store(&StorageCategory::Error, item).await {
                return Err((ScraperError::StorageError(error), request));
            }
        }
        Ok(())
    }

    fn allowed_domains(&self) -> Option<Vec<String>> {
        Some(vec!["product.kyobobook.co.kr".to_string()])
    }
}
