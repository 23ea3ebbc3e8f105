use std::sync::Arc;

use harvester_core::{ListingRecord, LISTING_SOURCE};
use serde_json::Value;

use crate::RawRecord;

const DEFAULT_CITY: &str = "الرياض";
const SALE_SUFFIX: &str = "للبيع";
const RENT_SUFFIX: &str = "للإيجار";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MapError {
    #[error("record is not a JSON object")]
    NotAnObject,
    #[error("record has no `_id`")]
    MissingIdentifier,
    #[error("field `{field}` is not usable: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

pub trait RecordMapper: Send + Sync {
    fn map(&self, raw: &RawRecord) -> Result<ListingRecord, MapError>;
}

/// Produces the `extracted_at` stamp.
pub type Clock = Arc<dyn Fn() -> String + Send + Sync>;

/// Maps DealApp `/ad` entries to [`ListingRecord`]s.
pub struct DealListingMapper {
    clock: Clock,
}

impl DealListingMapper {
    pub fn new(clock: Clock) -> Self {
        Self { clock }
    }

    pub fn with_system_clock() -> Self {
        Self::new(Arc::new(|| chrono::Local::now().to_rfc3339()))
    }
}

impl RecordMapper for DealListingMapper {
    fn map(&self, raw: &RawRecord) -> Result<ListingRecord, MapError> {
        let ad = raw.as_object().ok_or(MapError::NotAnObject)?;

        let ad_id = ad
            .get("_id")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .ok_or(MapError::MissingIdentifier)?
            .to_string();

        let type_ar = str_at(raw, &["propertyType", "propertyType_ar"]).unwrap_or_default();
        let purpose = ad.get("purpose").and_then(Value::as_str).unwrap_or_default();
        let (listing_type, property_type) = match purpose {
            "SALE" => ("sale".to_string(), format!("{type_ar} {SALE_SUFFIX}")),
            "RENT" => ("rent".to_string(), format!("{type_ar} {RENT_SUFFIX}")),
            other => (other.to_lowercase(), type_ar.to_string()),
        };

        let (price, price_numeric) = price_fields(ad.get("price"))?;
        let (area, area_numeric) = area_fields(ad.get("area"))?;
        let (lng, lat) = coordinates(raw);

        Ok(ListingRecord {
            property_type,
            listing_type,
            city: str_at(raw, &["city", "name_ar"])
                .unwrap_or(DEFAULT_CITY)
                .to_string(),
            district: str_at(raw, &["district", "name_ar"])
                .unwrap_or_default()
                .to_string(),
            district_en: str_at(raw, &["district", "name_en"])
                .unwrap_or_default()
                .to_string(),
            price,
            price_numeric,
            area,
            area_numeric,
            bedrooms: bedrooms(raw.pointer("/relatedQuestions/roomsNumRange")),
            ad_id,
            code: string_field(ad.get("code")),
            title: string_field(ad.get("title")),
            lat,
            lng,
            created_at: string_field(ad.get("createdAt")),
            source: LISTING_SOURCE.to_string(),
            extracted_at: (self.clock)(),
        })
    }
}

fn str_at<'a>(raw: &'a Value, path: &[&str]) -> Option<&'a str> {
    path.iter()
        .try_fold(raw, |node, key| node.get(key))
        .and_then(Value::as_str)
}

fn string_field(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

fn price_fields(value: Option<&Value>) -> Result<(String, f64), MapError> {
    match value {
        None | Some(Value::Null) => Ok(("0".to_string(), 0.0)),
        Some(Value::Number(n)) => {
            let numeric = n.as_f64().ok_or_else(|| MapError::InvalidField {
                field: "price",
                reason: format!("{n} is out of range"),
            })?;
            let text = n.to_string();
            // serde_json prints very large values in exponent form.
            let digits = if text.contains(['e', 'E']) {
                numeric.to_string()
            } else {
                text
            };
            Ok((group_thousands(&digits), numeric))
        }
        Some(other) => Err(MapError::InvalidField {
            field: "price",
            reason: format!("expected a number, got {other}"),
        }),
    }
}

fn area_fields(value: Option<&Value>) -> Result<(String, f64), MapError> {
    let invalid = |reason: String| MapError::InvalidField {
        field: "area",
        reason,
    };
    match value {
        None | Some(Value::Null) => Ok((String::new(), 0.0)),
        Some(Value::Number(n)) => {
            let numeric = n
                .as_f64()
                .ok_or_else(|| invalid(format!("{n} is out of range")))?;
            Ok((n.to_string(), numeric))
        }
        Some(Value::String(s)) => {
            let numeric = s
                .trim()
                .parse::<f64>()
                .map_err(|err| invalid(format!("{s:?}: {err}")))?;
            Ok((s.clone(), numeric))
        }
        Some(other) => Err(invalid(format!("expected a number, got {other}"))),
    }
}

/// `"3-4"` counts as 3; anything unparsable counts as 0.
fn bedrooms(value: Option<&Value>) -> f64 {
    match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => {
            let head = s.split('-').next().unwrap_or_default().trim();
            head.parse::<f64>().unwrap_or(0.0)
        }
        _ => 0.0,
    }
}

/// GeoJSON order: `[lng, lat]`.
fn coordinates(raw: &Value) -> (Option<f64>, Option<f64>) {
    let Some(points) = raw
        .pointer("/location/value/coordinates")
        .and_then(Value::as_array)
    else {
        return (None, None);
    };
    let lng = points.first().and_then(Value::as_f64);
    let lat = points.get(1).and_then(Value::as_f64);
    (lng, lat)
}

/// Inserts `,` every three digits of the integer part: `1250000.5` -> `1,250,000.5`.
fn group_thousands(number: &str) -> String {
    let (sign, unsigned) = match number.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", number),
    };
    let (int_part, frac_part) = match unsigned.split_once('.') {
        Some((int_part, frac)) => (int_part, Some(frac)),
        None => (unsigned, None),
    };

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, digit) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    match frac_part {
        Some(frac) => format!("{sign}{grouped}.{frac}"),
        None => format!("{sign}{grouped}"),
    }
}
