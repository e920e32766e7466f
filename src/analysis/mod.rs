mod viral;

pub use viral::{MonthlyCounts, TopCategory, ViralIndex};
