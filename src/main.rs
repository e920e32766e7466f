use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use log::{info, warn};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use kyobo_crawler::analysis::MonthlyCounts;
use kyobo_crawler::categorize::Categorizer;
use kyobo_crawler::core::retry::{
    BackoffPolicy, CategoryConfig, ContentRetryCondition, ParseRetryCondition, ParseRetryType,
    RequestRetryCondition, RetryCategory, RetryCondition, RetryConfig,
};
use kyobo_crawler::spiders::{BestsellerSpider, ReviewSpider};
use kyobo_crawler::storage::{
    create_storage, StorageCategory, StorageError, StorageManager, StorageType,
};
use kyobo_crawler::{Crawler, HttpScraper, Spider, SpiderConfig};

#[derive(Parser)]
#[command(name = "kyobo-crawler", version, about = "Kyobo Book Centre crawler and analytics")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Crawl a monthly bestseller list and every book on it
    Bestsellers {
        /// Kyobo category code, 13 is domestic economy/business
        #[arg(long, default_value = "13")]
        category: String,
        /// Month label for the ranking rows (YYYY-MM), defaults to the
        /// current month
        #[arg(long)]
        month: Option<String>,
        #[arg(long, default_value_t = 20)]
        top_n: usize,
        /// Directory for CSV output and error reports
        #[arg(long, default_value = "data")]
        output: String,
        /// Write to Supabase (SUPABASE_URL / SUPABASE_KEY) instead of CSV
        #[arg(long)]
        supabase: bool,
    },
    /// Collect reviews for the given product codes
    Reviews {
        #[arg(required = true)]
        product_codes: Vec<String>,
        /// Pages of 10 reviews to fetch per product
        #[arg(long, default_value_t = 30)]
        max_pages: usize,
        #[arg(long, default_value = "data")]
        output: String,
        #[arg(long)]
        supabase: bool,
    },
    /// Assign topic categories to books in a CSV export
    Categorize {
        /// CSV with a `keywords` column
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        output: PathBuf,
    },
    /// Compute monthly viral index CSVs from categorized records
    ViralIndex {
        /// CSV with a date column and a category column
        #[arg(long)]
        input: PathBuf,
        #[arg(long, default_value = ".")]
        output_dir: PathBuf,
    },
}

fn retry_config() -> RetryConfig {
    let mut config = RetryConfig::default();

    config.categories.insert(
        RetryCategory::RateLimit,
        CategoryConfig {
            max_retries: 10,
            initial_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(120),
            backoff_policy: BackoffPolicy::Exponential { factor: 2.0 },
            conditions: vec![
                RetryCondition::Request(RequestRetryCondition::StatusCode(429)),
                RetryCondition::Request(RequestRetryCondition::Content(ContentRetryCondition {
                    pattern: "rate limit|too many requests".to_string(),
                    is_regex: true,
                })),
            ],
        },
    );

    config.categories.insert(
        RetryCategory::ServerError,
        CategoryConfig {
            max_retries: 3,
            initial_delay: Duration::from_secs(5),
            conditions: vec![
                RetryCondition::Request(RequestRetryCondition::StatusCode(500)),
                RetryCondition::Request(RequestRetryCondition::StatusCode(502)),
                RetryCondition::Request(RequestRetryCondition::StatusCode(503)),
            ],
            ..Default::default()
        },
    );

    // Detail pages sometimes come back without content; fetch again.
    config.categories.insert(
        RetryCategory::ParseError,
        CategoryConfig {
            max_retries: 2,
            initial_delay: Duration::from_secs(3),
            conditions: vec![RetryCondition::Parse(ParseRetryCondition::ErrorWhileParsing(
                ParseRetryType::FetchNew,
            ))],
            ..Default::default()
        },
    );

    config.categories.insert(
        RetryCategory::StorageError,
        CategoryConfig {
            max_retries: 2,
            initial_delay: Duration::from_secs(2),
            conditions: vec![RetryCondition::Parse(ParseRetryCondition::StorageError(
                StorageError::ConnectionError(String::new()),
                ParseRetryType::FetchNew,
            ))],
            ..Default::default()
        },
    );

    config
}

fn spider_config(max_depth: usize) -> SpiderConfig {
    SpiderConfig::default()
        .with_depth(max_depth)
        .with_concurrency(3)
        .with_download_delay(Duration::from_millis(500))
        .with_headers(vec![("Accept-Language", "ko-KR,ko;q=0.9,en;q=0.5")])
        .with_retry(retry_config())
}

fn supabase_credentials(requested: bool) -> Option<(String, String)> {
    if !requested {
        return None;
    }
    match (std::env::var("SUPABASE_URL"), std::env::var("SUPABASE_KEY")) {
        (Ok(url), Ok(key)) => Some((url, key)),
        _ => {
            warn!("SUPABASE_URL / SUPABASE_KEY not set, falling back to CSV output");
            None
        }
    }
}

async fn bestseller_storage(output: &str, supabase: bool) -> Result<StorageManager> {
    let mut manager = StorageManager::new();

    if let Some((url, key)) = supabase_credentials(supabase) {
        let books = create_storage(StorageType::Supabase {
            url: url.clone(),
            api_key: key.clone(),
            on_conflict: Some("product_code".to_string()),
        })
        .await?;
        manager.register_at(StorageCategory::Data, books, "books");

        let rankings = create_storage(StorageType::Supabase {
            url,
            api_key: key,
            on_conflict: None,
        })
        .await?;
        manager.register_at(
            StorageCategory::Custom("bestsellers".to_string()),
            rankings,
            "bestsellers",
        );
    } else {
        let csv = create_storage(StorageType::Csv {
            path: output.to_string(),
        })
        .await?;
        manager.register_at(StorageCategory::Data, csv.clone(), "books");
        manager.register_at(
            StorageCategory::Custom("bestsellers".to_string()),
            csv,
            "bestsellers",
        );
    }

    let errors = create_storage(StorageType::Disk {
        path: format!("{}/errors", output),
    })
    .await?;
    manager.register(StorageCategory::Error, errors);

    Ok(manager)
}

async fn review_storage(output: &str, supabase: bool) -> Result<StorageManager> {
    let mut manager = StorageManager::new();

    if let Some((url, key)) = supabase_credentials(supabase) {
        let reviews = create_storage(StorageType::Supabase {
            url,
            api_key: key,
            on_conflict: None,
        })
        .await?;
        manager.register_at(StorageCategory::Data, reviews, "reviews");
    } else {
        let csv = create_storage(StorageType::Csv {
            path: output.to_string(),
        })
        .await?;
        manager.register_at(StorageCategory::Data, csv, "reviews");
    }

    let errors = create_storage(StorageType::Disk {
        path: format!("{}/errors", output),
    })
    .await?;
    manager.register(StorageCategory::Error, errors);

    Ok(manager)
}

async fn run_crawl<S: Spider + Send + Sync + 'static>(spider: S) -> Result<()> {
    let scraper = HttpScraper::new()?;
    let crawler = Crawler::new(Box::new(scraper));
    crawler
        .run(spider)
        .await
        .map_err(|(error, _)| anyhow::Error::from(error))?;
    Ok(())
}

fn categorize_csv(input: &Path, output: &Path) -> Result<()> {
    let mut reader = csv::Reader::from_path(input)
        .with_context(|| format!("open {}", input.display()))?;
    let headers = reader.headers()?.clone();
    let keyword_index = headers
        .iter()
        .position(|h| h == "keywords")
        .context("input CSV has no 'keywords' column")?;
    let title_index = headers.iter().position(|h| h == "title");

    let mut file = File::create(output)
        .with_context(|| format!("create {}", output.display()))?;
    file.write_all("\u{FEFF}".as_bytes())?;
    let mut writer = csv::Writer::from_writer(file);

    let mut out_headers = headers.clone();
    out_headers.push_field("category_1");
    out_headers.push_field("category_2");
    out_headers.push_field("category_3");
    writer.write_record(&out_headers)?;

    let categorizer = Categorizer::new();
    let mut total = 0usize;
    let mut matched = 0usize;

    for record in reader.records() {
        let mut record = record?;
        let mut categories =
            categorizer.categorize_str(record.get(keyword_index).unwrap_or_default());
        // Books without keyword tags fall back to title matching.
        if categories.is_empty() {
            if let Some(title_index) = title_index {
                categories =
                    categorizer.categorize_title(record.get(title_index).unwrap_or_default());
            }
        }

        for slot in 0..3 {
            record.push_field(categories.get(slot).map(String::as_str).unwrap_or(""));
        }
        writer.write_record(&record)?;

        total += 1;
        if !categories.is_empty() {
            matched += 1;
        }
    }
    writer.flush()?;

    info!("Categorized {}/{} records into {}", matched, total, output.display());
    Ok(())
}

fn viral_index_csv(input: &Path, output_dir: &Path) -> Result<()> {
    let mut reader = csv::Reader::from_path(input)
        .with_context(|| format!("open {}", input.display()))?;
    let headers = reader.headers()?.clone();

    let date_index = ["date", "month", "review_date"]
        .iter()
        .find_map(|name| headers.iter().position(|h| h == *name))
        .context("input CSV has no date column (date, month or review_date)")?;
    let category_index = ["category", "category_1"]
        .iter()
        .find_map(|name| headers.iter().position(|h| h == *name))
        .context("input CSV has no category column (category or category_1)")?;

    let mut records = Vec::new();
    for record in reader.records() {
        let record = record?;
        let date = record.get(date_index).unwrap_or_default();
        let category = record.get(category_index).unwrap_or_default().trim();
        let Some(month) = date.get(..7) else { continue };
        if category.is_empty() || category == "미분류" {
            continue;
        }
        records.push((month.to_string(), category.to_string()));
    }
    anyhow::ensure!(!records.is_empty(), "no usable records in {}", input.display());

    let counts = MonthlyCounts::from_records(&records);
    let index = counts.compute();

    std::fs::create_dir_all(output_dir)?;
    let matrix_path = output_dir.join("viral_index_matrix.csv");
    let top3_path = output_dir.join("viral_index_top3.csv");
    index.write_matrix(&matrix_path)?;
    index.write_top3(&top3_path)?;

    info!(
        "Wrote viral index for {} months x {} categories to {} and {}",
        counts.months().len(),
        counts.categories().len(),
        matrix_path.display(),
        top3_path.display(),
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .filter_module("selectors", log::LevelFilter::Warn)
        .filter_module("html5ever", log::LevelFilter::Error)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Bestsellers {
            category,
            month,
            top_n,
            output,
            supabase,
        } => {
            let month = month.unwrap_or_else(|| Utc::now().format("%Y-%m").to_string());
            let storage = bestseller_storage(&output, supabase).await?;

            // Depth 0 is the list page, depth 1 the detail pages.
            let spider = BestsellerSpider::new(&category, &month, top_n, storage)
                .with_config(spider_config(2));
            run_crawl(spider).await
        }
        Command::Reviews {
            product_codes,
            max_pages,
            output,
            supabase,
        } => {
            let storage = review_storage(&output, supabase).await?;

            // Page N of a product runs at depth N-1, so max_depth caps
            // the page count.
            let spider = ReviewSpider::new(product_codes, storage)
                .with_config(spider_config(max_pages));
            run_crawl(spider).await
        }
        Command::Categorize { input, output } => categorize_csv(&input, &output),
        Command::ViralIndex { input, output_dir } => viral_index_csv(&input, &output_dir),
    }
}
