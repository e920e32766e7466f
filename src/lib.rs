pub mod analysis;
pub mod categorize;
pub mod core;
pub mod http;
pub mod models;
pub mod scrapers;
pub mod spiders;
pub mod stats;
pub mod storage;

pub use self::core::{
    Crawler, ParseResult, ScraperError, ScraperResult, Spider, SpiderCallback, SpiderConfig,
    SpiderResponse,
};
pub use http::{HttpRequest, HttpResponse};
pub use scrapers::{HttpScraper, Scraper};
pub use stats::StatsTracker;
pub use storage::{DiskStorage, StorageManager};
