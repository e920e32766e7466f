use async_trait::async_trait;
use chrono::Utc;
use log::{info, warn};
use regex::Regex;
use scraper::{Html, Selector};
use serde_json::json;
use url::Url;

use crate::core::retry::RetryCategory;
use crate::core::{ParseResult, ScraperError, ScraperResult, Spider, SpiderCallback, SpiderConfig, SpiderResponse};
use crate::http::HttpRequest;
use crate::models::{BestsellerEntry, Book};
use crate::storage::{StorageCategory, StorageItem, StorageManager};

const STORE_BASE: &str = "https://store.kyobobook.co.kr";
const INTRO_CHAR_LIMIT: usize = 2000;

/// Crawls a Kyobo monthly bestseller list, then every product detail
/// page on it. Books land in the data category; ranking rows go to a
/// dedicated `bestsellers` category so the two can use different
/// destinations.
pub struct BestsellerSpider {
    config: SpiderConfig,
    category_code: String,
    month: String,
    top_n: usize,
    storage: StorageManager,
}

impl BestsellerSpider {
    pub fn new(category_code: &str, month: &str, top_n: usize, storage: StorageManager) -> Self {
        Self {
            config: SpiderConfig::default(),
            category_code: category_code.to_string(),
            month: month.to_string(),
            top_n,
            storage,
        }
    }

    fn list_url(&self) -> Url {
        let raw = format!(
            "{}/bestseller/online/monthly/domestic/{}",
            STORE_BASE, self.category_code
        );
        Url::parse(&raw).expect("bestseller URL is valid")
    }
}

fn select_text(document: &Html, selector: &str) -> String {
    Selector::parse(selector)
        .ok()
        .and_then(|s| document.select(&s).next().map(|el| el.text().collect::<String>()))
        .map(|text| text.trim().to_string())
        .unwrap_or_default()
}

fn select_attr(document: &Html, selector: &str, attr: &str) -> String {
    Selector::parse(selector)
        .ok()
        .and_then(|s| {
            document
                .select(&s)
                .next()
                .and_then(|el| el.value().attr(attr).map(str::to_string))
        })
        .unwrap_or_default()
}

fn parse_number(text: &str) -> u32 {
    text.chars()
        .filter(|c| c.is_ascii_digit())
        .collect::<String>()
        .parse()
        .unwrap_or(0)
}

/// Splits the author box text into authors and an optional translator.
/// Kyobo renders it as `저자(글) 김철수 · 번역 박영희`.
fn split_author_box(text: &str) -> (String, Option<String>) {
    let mut authors = Vec::new();
    let mut translator = None;

    for part in text.split('·') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        if part.contains("번역") {
            let name = part.replace("번역", "").trim().to_string();
            if !name.is_empty() {
                translator = Some(name);
            }
        } else {
            let name = part
                .replace("저자", "")
                .replace("(글)", "")
                .trim()
                .to_string();
            if !name.is_empty() {
                authors.push(name);
            }
        }
    }

    (authors.join(", "), translator)
}

fn parse_publish_info(text: &str) -> (String, String) {
    let pattern = Regex::new(r"(\d{4})년\s*(\d{1,2})월\s*(\d{1,2})일").expect("valid date pattern");

    match pattern.captures(text) {
        Some(captures) => {
            let date = format!(
                "{}-{:02}-{:02}",
                &captures[1],
                captures[2].parse::<u32>().unwrap_or(0),
                captures[3].parse::<u32>().unwrap_or(0),
            );
            let publisher = text[..captures.get(0).map(|m| m.start()).unwrap_or(0)]
                .trim_matches(|c: char| c == '·' || c.is_whitespace())
                .to_string();
            (publisher, date)
        }
        None => (text.trim().to_string(), String::new()),
    }
}

fn collect_intro(document: &Html) -> String {
    let mut sections = Vec::new();

    for selector in ["div.book_intro div.info_text", "div.intro_bottom div.info_text"] {
        if let Ok(parsed) = Selector::parse(selector) {
            for element in document.select(&parsed) {
                let text = element.text().collect::<String>().trim().to_string();
                if text.chars().count() > 50 {
                    sections.push(text);
                }
            }
        }
    }

    let joined = sections.join("\n\n");
    if joined.chars().count() > INTRO_CHAR_LIMIT {
        joined.chars().take(INTRO_CHAR_LIMIT).collect()
    } else {
        joined
    }
}

fn collect_keywords(document: &Html) -> Vec<String> {
    let Ok(selector) = Selector::parse("div.product_keyword_pick ul.tabs li.tab_item a span")
    else {
        return Vec::new();
    };

    document
        .select(&selector)
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|text| !text.is_empty() && !text.contains("더보기"))
        .collect()
}

/// Pulls the top-N product detail links out of a bestseller list page.
/// Duplicate products and the "open in new window" anchors are dropped.
pub fn parse_bestseller_list(body: &str, base: &Url, top_n: usize) -> Vec<(Url, String)> {
    let document = Html::parse_document(body);
    let Ok(selector) = Selector::parse(r#"a.prod_link[href*="/detail/"]"#) else {
        return Vec::new();
    };

    let mut seen = std::collections::HashSet::new();
    let mut links = Vec::new();

    for anchor in document.select(&selector) {
        if links.len() >= top_n {
            break;
        }

        let title = anchor.text().collect::<String>().trim().to_string();
        if title.contains("새창보기") || title.chars().count() <= 2 {
            continue;
        }

        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let Ok(url) = base.join(href) else {
            continue;
        };

        if seen.insert(url.to_string()) {
            links.push((url, title));
        }
    }

    links
}

/// Scrapes one product detail page into a book record plus its ranking
/// row. A page without a title is treated as a parse failure so the
/// retry layer can fetch it again.
pub fn parse_book_detail(
    body: &str,
    url: &Url,
    rank: u32,
    month: &str,
) -> Result<(Book, BestsellerEntry), ScraperError> {
    let code_pattern = Regex::new(r"(S\d+)").expect("valid product code pattern");
    let product_code = code_pattern
        .captures(url.path())
        .map(|c| c[1].to_string())
        .ok_or_else(|| {
            ScraperError::ParsingError(format!("No product code in URL: {}", url))
        })?;

    let document = Html::parse_document(body);

    let title = select_text(&document, "span.prod_title");
    if title.is_empty() {
        return Err(ScraperError::ParsingError(format!(
            "Empty detail page for {}",
            product_code
        )));
    }

    let (author, translator) = split_author_box(&select_text(&document, "div.prod_author_box"));
    let (publisher, publish_date) =
        parse_publish_info(&select_text(&document, "div.prod_info_text.publish_date"));

    let rating = select_text(&document, "span.review_score")
        .parse::<f64>()
        .unwrap_or(0.0);
    let review_count = parse_number(&select_text(&document, "div.prod_review_box span.val"));

    let book = Book {
        product_code: product_code.clone(),
        isbn: select_attr(&document, r#"meta[property="books:isbn"]"#, "content"),
        title,
        author,
        translator,
        publisher,
        publish_date,
        price: parse_number(&select_text(&document, "span.prod_price")),
        description: select_text(&document, "span.prod_desc"),
        intro_text: collect_intro(&document),
        keywords: collect_keywords(&document),
        image_url: select_attr(&document, r#"meta[property="og:image"]"#, "content"),
        product_url: url.to_string(),
    };

    let entry = BestsellerEntry {
        bestseller_month: month.to_string(),
        rank,
        product_code,
        rating,
        review_count,
    };

    Ok((book, entry))
}

#[async_trait]
impl Spider for BestsellerSpider {
    fn name(&self) -> String {
        "kyobo_bestsellers".to_string()
    }

    fn start_urls(&self) -> Vec<Url> {
        vec![self.list_url()]
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
        depth: usize,
    ) -> ScraperResult<ParseResult> {
        match response.callback {
            SpiderCallback::Bootstrap => {
                let links =
                    parse_bestseller_list(&response.response.decoded_body, &url, self.top_n);
                if links.is_empty() {
                    return Err((
                        ScraperError::ParsingError(format!("No product links on {}", url)),
                        response.response.from_request.clone(),
                    ));
                }

                info!("Found {} bestsellers for {}", links.len(), self.month);
                let requests = links
                    .into_iter()
                    .enumerate()
                    .map(|(index, (link, title))| {
                        HttpRequest::new(link, SpiderCallback::ParseItem, depth + 1)
                            .with_meta(json!({ "rank": index + 1, "title": title }))
                    })
                    .collect();
                Ok(ParseResult::Continue(requests))
            }
            SpiderCallback::ParseItem => {
                let meta = response
                    .response
                    .from_request
                    .meta
                    .clone()
                    .unwrap_or_else(|| json!({}));
                let rank = meta["rank"].as_u64().unwrap_or(0) as u32;

                let (book, entry) = match parse_book_detail(
                    &response.response.decoded_body,
                    &url,
                    rank,
                    &self.month,
                ) {
                    Ok(pair) => pair,
                    Err(error) => {
                        return Err((error, response.response.from_request.clone()))
                    }
                };

                info!("#{} {} ({})", rank, book.title, book.product_code);

                let book_item = StorageItem {
                    url: url.clone(),
                    timestamp: Utc::now(),
                    id: book.product_code.clone(),
                    data: book,
                    metadata: Some(json!({ "rank": rank })),
                };
                if let Err(error) = self.storage.store(&StorageCategory::Data, book_item).await {
                    return Err((
                        ScraperError::StorageError(error),
                        response.response.from_request.clone(),
                    ));
                }

                let entry_item = StorageItem {
                    url: url.clone(),
                    timestamp: Utc::now(),
                    id: format!("{}_{}", entry.bestseller_month, entry.rank),
                    data: entry,
                    metadata: None,
                };
                let category = StorageCategory::Custom("bestsellers".to_string());
                if let Err(error) = self.storage.store(&category, entry_item).await {
                    return Err((
                        ScraperError::StorageError(error),
                        response.response.from_request.clone(),
                    ));
                }

                Ok(ParseResult::Skip)
            }
            _ => Ok(ParseResult::Skip),
        }
    }

    async fn handle_max_retries(
        &self,
        category: RetryCategory,
        request: Box<HttpRequest>,
    ) -> ScraperResult<()> {
        warn!(
            "Giving up on {} (category: {:?})",
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
                    "month": self.month,
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
        Some(vec![
            "store.kyobobook.co.kr".to_string(),
            "product.kyobobook.co.kr".to_string(),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIST_PAGE: &str = r##"
        <html><body>
          <div class="prod_list">
            <a class="prod_link" href="https://product.kyobobook.co.kr/detail/S000214979451">새창보기</a>
            <a class="prod_link" href="https://product.kyobobook.co.kr/detail/S000214979451">트렌드 코리아 2026</a>
            <a class="prod_link" href="/detail/S000216470112">역행자</a>
            <a class="prod_link" href="/detail/S000216470112">역행자</a>
            <a class="prod_link" href="/event/12345">이벤트</a>
          </div>
        </body></html>
    "##;

    const DETAIL_PAGE: &str = r##"
        <html><head>
          <meta property="books:isbn" content="9791157842032">
          <meta property="og:image" content="https://contents.kyobobook.co.kr/cover.jpg">
        </head><body>
          <span class="prod_title">트렌드 코리아 2026</span>
          <div class="prod_author_box">저자(글) 김난도 · 번역 이수진</div>
          <div class="prod_info_text publish_date">미래의창 · 2025년 9월 25일</div>
          <span class="prod_price">19,800원</span>
          <span class="review_score">9.5</span>
          <div class="prod_review_box"><span class="val">1,234</span></div>
          <span class="prod_desc">해마다 돌아오는 트렌드 전망서</span>
          <div class="product_keyword_pick"><ul class="tabs">
            <li class="tab_item"><a><span>#트렌드</span></a></li>
            <li class="tab_item"><a><span>#경제전망</span></a></li>
            <li class="tab_item"><a><span>더보기</span></a></li>
          </ul></div>
        </body></html>
    "##;

    fn detail_url() -> Url {
        Url::parse("https://product.kyobobook.co.kr/detail/S000214979451").unwrap()
    }

    #[test]
    fn list_page_yields_unique_titled_links() {
        let base = Url::parse("https://store.kyobobook.co.kr/bestseller/online/monthly").unwrap();
        let links = parse_bestseller_list(LIST_PAGE, &base, 20);

        assert_eq!(links.len(), 2);
        assert_eq!(links[0].1, "트렌드 코리아 2026");
        assert_eq!(
            links[1].0.as_str(),
            "https://store.kyobobook.co.kr/detail/S000216470112"
        );
    }

    #[test]
    fn list_respects_top_n() {
        let base = Url::parse("https://store.kyobobook.co.kr/bestseller/online/monthly").unwrap();
        assert_eq!(parse_bestseller_list(LIST_PAGE, &base, 1).len(), 1);
    }

    #[test]
    fn detail_page_yields_book_and_ranking_row() {
        let (book, entry) = parse_book_detail(DETAIL_PAGE, &detail_url(), 3, "2025-10").unwrap();

        assert_eq!(book.product_code, "S000214979451");
        assert_eq!(book.title, "트렌드 코리아 2026");
        assert_eq!(book.author, "김난도");
        assert_eq!(book.translator.as_deref(), Some("이수진"));
        assert_eq!(book.publisher, "미래의창");
        assert_eq!(book.publish_date, "2025-09-25");
        assert_eq!(book.price, 19800);
        assert_eq!(book.isbn, "9791157842032");
        assert_eq!(book.keywords, vec!["#트렌드", "#경제전망"]);
        assert!(book.image_url.ends_with("cover.jpg"));

        assert_eq!(entry.bestseller_month, "2025-10");
        assert_eq!(entry.rank, 3);
        assert!((entry.rating - 9.5).abs() < f64::EPSILON);
        assert_eq!(entry.review_count, 1234);
    }

    #[test]
    fn empty_detail_page_is_a_parsing_error() {
        let result = parse_book_detail("<html></html>", &detail_url(), 1, "2025-10");
        assert!(matches!(result, Err(ScraperError::ParsingError(_))));
    }

    #[test]
    fn url_without_product_code_is_rejected() {
        let url = Url::parse("https://product.kyobobook.co.kr/event/12345").unwrap();
        let result = parse_book_detail(DETAIL_PAGE, &url, 1, "2025-10");
        assert!(matches!(result, Err(ScraperError::ParsingError(_))));
    }

    #[test]
    fn author_box_without_translator() {
        let (author, translator) = split_author_box("저자(글) 자청");
        assert_eq!(author, "자청");
        assert!(translator.is_none());

        let (authors, _) = split_author_box("저자(글) 김난도 · 전미영");
        assert_eq!(authors, "김난도, 전미영");
    }

    #[test]
    fn publish_info_without_date_keeps_publisher() {
        let (publisher, date) = parse_publish_info("미래의창");
        assert_eq!(publisher, "미래의창");
        assert!(date.is_empty());
    }

    #[test]
    fn long_intro_is_capped() {
        let long_text = "가".repeat(3000);
        let body = format!(
            r#"<html><body>
              <span class="prod_title">책</span>
              <div class="book_intro"><div class="info_text">{}</div></div>
            </body></html>"#,
            long_text
        );

        let (book, _) = parse_book_detail(&body, &detail_url(), 1, "2025-10").unwrap();
        assert_eq!(book.intro_text.chars().count(), 2000);
    }
}
