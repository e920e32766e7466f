mod bestseller;
mod review;

pub use bestseller::BestsellerSpider;
pub use review::ReviewSpider;
