use serde::{Deserialize, Serialize};

/// A product page scraped from Kyobo Book Centre.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Book {
    /// Kyobo product code from the detail URL, e.g. `S000210621680`.
    pub product_code: String,
    pub isbn: String,
    pub title: String,
    pub author: String,
    pub translator: Option<String>,
    pub publisher: String,
    /// Normalized to `YYYY-MM-DD`; empty when the page omits it.
    pub publish_date: String,
    pub price: u32,
    pub description: String,
    pub intro_text: String,
    pub keywords: Vec<String>,
    pub image_url: String,
    pub product_url: String,
}

/// One row of a monthly bestseller ranking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BestsellerEntry {
    /// `YYYY-MM` the ranking was captured for.
    pub bestseller_month: String,
    pub rank: u32,
    pub product_code: String,
    pub rating: f64,
    pub review_count: u32,
}
