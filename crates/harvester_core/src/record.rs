/// Source label stamped on every record mapped from the listings API.
pub const LISTING_SOURCE: &str = "DealApp API";

/// Normalized listing as handed to the result sink.
///
/// Built once by a record mapper and never mutated afterwards; the dedup
/// store keys it by [`ListingRecord::ad_id`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ListingRecord {
    /// Full human-readable type, e.g. `شقة للبيع`.
    pub property_type: String,
    /// `sale`, `rent`, or the lower-cased source purpose.
    pub listing_type: String,
    pub city: String,
    pub district: String,
    pub district_en: String,
    /// Price grouped by thousands, e.g. `1,250,000`.
    pub price: String,
    pub price_numeric: f64,
    pub area: String,
    pub area_numeric: f64,
    pub bedrooms: f64,
    pub ad_id: String,
    pub code: String,
    pub title: String,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub created_at: String,
    pub source: String,
    /// RFC 3339 time the record was mapped.
    pub extracted_at: String,
}

impl ListingRecord {
    pub fn id(&self) -> &str {
        &self.ad_id
    }
}
