use crate::core::{ScraperError, SpiderConfig};
use crate::{HttpRequest, HttpResponse, ScraperResult, StatsTracker};
use async_trait::async_trait;
use chrono::Utc;
use log::{debug, info, warn};
use std::sync::Arc;
use tokio::time::sleep;

#[async_trait]
pub trait Scraper: Send + Sync {
    async fn fetch_single(
        &self,
        request: HttpRequest,
        config: &SpiderConfig,
    ) -> ScraperResult<HttpResponse>;
    fn box_clone(&self) -> Box<dyn Scraper>;
    fn stats(&self) -> &StatsTracker;
    fn set_stats(&mut self, stats: Arc<StatsTracker>);

    async fn fetch(
        &self,
        request: HttpRequest,
        config: &SpiderConfig,
    ) -> ScraperResult<HttpResponse> {
        let start_time = Utc::now();

        if let Some(delay) = config.download_delay {
            sleep(delay).await;
        }

        loop {
            info!("Fetching URL: {}", request.url);
            let response = self.fetch_single(request.clone(), config).await?;
            debug!(
                "Received response: status={}, body_length={}",
                response.status,
                response.decoded_body.len()
            );

            if let Some((category, delay)) = config.retry_config.should_retry_request(
                &request.url,
                response.status,
                &response.decoded_body,
            ) {
                self.stats().record_retry(format!("{:?}", category));
                let state = config.retry_config.get_retry_state(&request.url);
                let attempt = state.counts.get(&category).copied().unwrap_or(0);

                warn!(
                    "Retry triggered for URL: {} (category={:?}, attempt={}/{}, delay={:?})",
                    request.url,
                    category,
                    attempt,
                    config
                        .retry_config
                        .categories
                        .get(&category)
                        .map(|c| c.max_retries)
                        .unwrap_or(0),
                    delay
                );

                sleep(delay).await;
                continue;
            }

            if let Some(category) = config.retry_config.exhausted_category(
                &request.url,
                response.status,
                &response.decoded_body,
            ) {
                return Err((
                    ScraperError::MaxRetriesReached {
                        category,
                        url: request.url.clone(),
                    },
                    Box::new(request),
                ));
            }

            let state = config.retry_config.get_retry_state(&request.url);

            info!(
                "Request completed for URL: {} (total_retries={}, status={})",
                request.url, state.total_retries, response.status
            );
            debug!("Retry history for {}: {:?}", request.url, state.counts);

            let duration = Utc::now().signed_duration_since(start_time);
            self.stats()
                .record_request(response.status, response.raw_body.len(), duration);

            return Ok(HttpResponse {
                retry_count: state.total_retries,
                retry_history: state.counts,
                ..response
            });
        }
    }
}
