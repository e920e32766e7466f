mod config;
pub mod types;
mod utils;

pub use types::{
    BackoffPolicy, CategoryConfig, ContentRetryCondition, ParseRetryCondition, ParseRetryType,
    RequestRetryCondition, RetryCategory, RetryCondition, RetryConfig, RetryState,
};
