//! Viral index over monthly category counts.
//!
//! The index blends three signals per category and month:
//! month-over-month growth (50%), deviation from the 3-month moving
//! average (30%), and a scaled z-score across the whole period (20%).
//! Growth denominators carry a +1 guard so categories appearing from
//! zero produce large but finite scores.

use anyhow::{Context, Error};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;

const MOM_WEIGHT: f64 = 0.5;
const MA_WEIGHT: f64 = 0.3;
const Z_WEIGHT: f64 = 0.2;
const Z_SCALE: f64 = 20.0;

/// Article (or mention) counts per category per month.
pub struct MonthlyCounts {
    months: Vec<String>,
    categories: Vec<String>,
    /// counts[category][month]
    counts: Vec<Vec<u32>>,
}

impl MonthlyCounts {
    /// Aggregates `(month, category)` records into a dense matrix.
    /// Month and category axes are sorted and deduplicated.
    pub fn from_records(records: &[(String, String)]) -> Self {
        let mut table: BTreeMap<&str, BTreeMap<&str, u32>> = BTreeMap::new();
        for (month, category) in records {
            *table
                .entry(category.as_str())
                .or_default()
                .entry(month.as_str())
                .or_default() += 1;
        }

        let mut months: Vec<String> = records.iter().map(|(m, _)| m.clone()).collect();
        months.sort();
        months.dedup();

        let categories: Vec<String> = table.keys().map(|c| c.to_string()).collect();
        let counts = categories
            .iter()
            .map(|category| {
                months
                    .iter()
                    .map(|month| {
                        table[category.as_str()]
                            .get(month.as_str())
                            .copied()
                            .unwrap_or(0)
                    })
                    .collect()
            })
            .collect();

        Self {
            months,
            categories,
            counts,
        }
    }

    pub fn months(&self) -> &[String] {
        &self.months
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    pub fn compute(&self) -> ViralIndex {
        let month_count = self.months.len();
        let mut mom = Vec::with_capacity(self.categories.len());
        let mut index = Vec::with_capacity(self.categories.len());

        for series in &self.counts {
            let series: Vec<f64> = series.iter().map(|&c| c as f64).collect();

            let mom_row: Vec<f64> = (0..month_count)
                .map(|m| {
                    if m == 0 {
                        0.0
                    } else {
                        (series[m] - series[m - 1]) / (series[m - 1] + 1.0) * 100.0
                    }
                })
                .collect();

            let ma_dev_row: Vec<f64> = (0..month_count)
                .map(|m| {
                    let window_start = m.saturating_sub(2);
                    let window = &series[window_start..=m];
                    let ma = window.iter().sum::<f64>() / window.len() as f64;
                    if ma == 0.0 {
                        0.0
                    } else {
                        (series[m] - ma) / ma * 100.0
                    }
                })
                .collect();

            let z_row = z_scores(&series);

            let index_row: Vec<f64> = (0..month_count)
                .map(|m| {
                    MOM_WEIGHT * mom_row[m] + MA_WEIGHT * ma_dev_row[m] + Z_WEIGHT * Z_SCALE * z_row[m]
                })
                .collect();

            mom.push(mom_row);
            index.push(index_row);
        }

        ViralIndex {
            months: self.months.clone(),
            categories: self.categories.clone(),
            counts: self.counts.clone(),
            mom,
            index,
        }
    }
}

/// Standardizes a series with the sample standard deviation. Constant
/// or single-point series read as all zeros.
fn z_scores(series: &[f64]) -> Vec<f64> {
    let n = series.len();
    if n < 2 {
        return vec![0.0; n];
    }

    let mean = series.iter().sum::<f64>() / n as f64;
    let variance = series.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
    let std = variance.sqrt();
    if std == 0.0 {
        return vec![0.0; n];
    }

    series.iter().map(|x| (x - mean) / std).collect()
}

pub struct ViralIndex {
    pub months: Vec<String>,
    pub categories: Vec<String>,
    pub counts: Vec<Vec<u32>>,
    pub mom: Vec<Vec<f64>>,
    pub index: Vec<Vec<f64>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TopCategory {
    pub month: String,
    pub rank: u32,
    pub category: String,
    pub viral_index: f64,
    pub count: u32,
    /// Plain month-over-month change of the raw count. `None` for the
    /// first month of the period.
    pub mom_change: Option<f64>,
}

impl ViralIndex {
    /// The three hottest categories per month, in month order. Ties
    /// break by category order so output is deterministic.
    pub fn monthly_top3(&self) -> Vec<TopCategory> {
        let mut results = Vec::new();

        for (m, month) in self.months.iter().enumerate() {
            let mut ranked: Vec<usize> = (0..self.categories.len()).collect();
            ranked.sort_by(|&a, &b| {
                self.index[b][m]
                    .partial_cmp(&self.index[a][m])
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(a.cmp(&b))
            });

            for (rank, &c) in ranked.iter().take(3).enumerate() {
                let count = self.counts[c][m];
                let mom_change = if m == 0 {
                    None
                } else {
                    let prev = self.counts[c][m - 1] as f64;
                    if prev > 0.0 {
                        Some((count as f64 - prev) / prev * 100.0)
                    } else {
                        Some(0.0)
                    }
                };

                results.push(TopCategory {
                    month: month.clone(),
                    rank: (rank + 1) as u32,
                    category: self.categories[c].clone(),
                    viral_index: self.index[c][m],
                    count,
                    mom_change,
                });
            }
        }

        results
    }

    /// Writes the full index matrix, months as rows, with a UTF-8 BOM.
    pub fn write_matrix<P: AsRef<Path>>(&self, path: P) -> Result<(), Error> {
        let mut file = File::create(&path)
            .with_context(|| format!("create {}", path.as_ref().display()))?;
        file.write_all("\u{FEFF}".as_bytes())?;

        let mut writer = csv::Writer::from_writer(file);
        let mut header = vec!["month".to_string()];
        header.extend(self.categories.iter().cloned());
        writer.write_record(&header)?;

        for (m, month) in self.months.iter().enumerate() {
            let mut row = vec![month.clone()];
            row.extend(
                (0..self.categories.len()).map(|c| format!("{:.1}", self.index[c][m])),
            );
            writer.write_record(&row)?;
        }

        writer.flush()?;
        Ok(())
    }

    /// Writes the monthly top-3 table with a UTF-8 BOM.
    pub fn write_top3<P: AsRef<Path>>(&self, path: P) -> Result<(), Error> {
        let mut file = File::create(&path)
            .with_context(|| format!("create {}", path.as_ref().display()))?;
        file.write_all("\u{FEFF}".as_bytes())?;

        let mut writer = csv::Writer::from_writer(file);
        writer.write_record(["month", "rank", "category", "viral_index", "count", "mom_change"])?;

        for row in self.monthly_top3() {
            let mom = match row.mom_change {
                Some(change) => format!("{:+.1}%", change),
                None => "N/A".to_string(),
            };
            writer.write_record([
                row.month,
                row.rank.to_string(),
                row.category,
                format!("{:.1}", row.viral_index),
                row.count.to_string(),
                mom,
            ])?;
        }

        writer.flush()?;
        Ok(())
    }
}
