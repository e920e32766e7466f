mod book;
mod review;

pub use book::{BestsellerEntry, Book};
pub use review::{RawReview, Review, ReviewListData, ReviewListPayload};
