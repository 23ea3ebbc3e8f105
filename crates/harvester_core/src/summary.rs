use std::collections::HashSet;

use crate::ListingRecord;

/// Read-only snapshot of the run counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HarvestSummary {
    pub sessions_attempted: u32,
    pub token_budget: u32,
    pub collected: usize,
    pub target_count: usize,
    pub requests_issued: u32,
    pub acquisition_failures: u32,
    pub auth_rejections: u32,
    pub transient_failures: u32,
    pub cancelled: bool,
}

impl HarvestSummary {
    pub fn target_reached(&self) -> bool {
        self.collected >= self.target_count
    }
}

/// Aggregate figures logged at the end of a run.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ListingStats {
    pub total: usize,
    pub unique_districts: usize,
    /// Min, max and mean over listings with a positive price.
    pub price_range: Option<(f64, f64)>,
    pub average_price: Option<f64>,
}

impl ListingStats {
    pub fn from_records(records: &[ListingRecord]) -> Self {
        let unique_districts = records
            .iter()
            .filter(|r| !r.district.is_empty())
            .map(|r| r.district.as_str())
            .collect::<HashSet<_>>()
            .len();

        let prices: Vec<f64> = records
            .iter()
            .map(|r| r.price_numeric)
            .filter(|p| *p > 0.0)
            .collect();
        let (price_range, average_price) = if prices.is_empty() {
            (None, None)
        } else {
            let min = prices.iter().copied().fold(f64::INFINITY, f64::min);
            let max = prices.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let avg = prices.iter().sum::<f64>() / prices.len() as f64;
            (Some((min, max)), Some(avg))
        };

        Self {
            total: records.len(),
            unique_districts,
            price_range,
            average_price,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ListingStats;
    use crate::ListingRecord;

    fn listing(district: &str, price: f64) -> ListingRecord {
        ListingRecord {
            district: district.to_string(),
            price_numeric: price,
            ..ListingRecord::default()
        }
    }

    #[test]
    fn stats_skip_unpriced_and_blank_districts() {
        let records = vec![
            listing("الملقا", 1_000_000.0),
            listing("الملقا", 0.0),
            listing("", 500_000.0),
            listing("النرجس", 1_500_000.0),
        ];
        let stats = ListingStats::from_records(&records);
        assert_eq!(stats.total, 4);
        assert_eq!(stats.unique_districts, 2);
        assert_eq!(stats.price_range, Some((500_000.0, 1_500_000.0)));
        assert_eq!(stats.average_price, Some(1_000_000.0));
    }

    #[test]
    fn empty_records_have_no_prices() {
        let stats = ListingStats::from_records(&[]);
        assert_eq!(stats, ListingStats::default());
    }
}
