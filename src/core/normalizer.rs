use crate::domain::model::{RawRecord, ServiceRecord, ServiceStatus};
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use std::str::FromStr;
use thiserror::Error;

pub const CSV_COLUMN_COUNT: usize = 7;

const DEFAULT_MIN_QUANTITY: i64 = 1;
const DEFAULT_MAX_QUANTITY: i64 = 1000;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Service entry is not a JSON object")]
    NotAnObject,

    #[error("Missing required field '{field}'")]
    MissingField { field: &'static str },

    #[error("Invalid number '{value}' for field '{field}'")]
    InvalidNumber { field: &'static str, value: String },

    #[error("Price must be greater than zero (got {price})")]
    NonPositivePrice { price: String },

    #[error("Adjusted price for base price {price} is out of range")]
    PriceOverflow { price: String },
}

impl ValidationError {
    /// 出錯欄位，寫進錯誤報告
    pub fn field(&self) -> Option<&'static str> {
        match self {
            ValidationError::NotAnObject => None,
            ValidationError::MissingField { field } => Some(*field),
            ValidationError::InvalidNumber { field, .. } => Some(*field),
            ValidationError::NonPositivePrice { .. } | ValidationError::PriceOverflow { .. } => {
                Some("price")
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NormalizeOptions {
    /// API 價格也必須大於零（CSV 一律要求）
    pub strict_api_prices: bool,
}

/// 把一筆原始記錄轉成 `ServiceRecord`
///
/// 回傳 `Ok(None)` 表示該列被靜默略過（CSV 欄位不足或第一欄空白），不計入錯誤。
pub fn normalize(
    raw: &RawRecord,
    provider_id: i64,
    options: NormalizeOptions,
) -> Result<Option<ServiceRecord>, ValidationError> {
    match raw {
        RawRecord::Api { value, .. } => {
            let obj = value.as_object().ok_or(ValidationError::NotAnObject)?;
            normalize_api(obj, provider_id, options).map(Some)
        }
        RawRecord::Csv { fields, .. } => normalize_csv(fields, provider_id),
    }
}

fn normalize_api(
    obj: &Map<String, Value>,
    provider_id: i64,
    options: NormalizeOptions,
) -> Result<ServiceRecord, ValidationError> {
    let name = required_text(obj, "name")?;
    let category_name = required_text(obj, "category")?;

    let price = match obj.get("price") {
        None | Some(Value::Null) => return Err(ValidationError::MissingField { field: "price" }),
        Some(value) => json_decimal(value).ok_or_else(|| ValidationError::InvalidNumber {
            field: "price",
            value: value_text(value),
        })?,
    };

    if price <= Decimal::ZERO {
        if options.strict_api_prices {
            return Err(ValidationError::NonPositivePrice {
                price: price.to_string(),
            });
        }
        tracing::warn!(
            "⚠️ Accepting non-positive API price {} for service '{}' (strict_api_prices disabled)",
            price,
            name
        );
    }

    let description = match obj.get("description") {
        None | Some(Value::Null) => String::new(),
        Some(value) => value_text(value),
    };

    let min_quantity = json_quantity(obj.get("min_quantity"), DEFAULT_MIN_QUANTITY);
    let max_quantity = json_quantity(obj.get("max_quantity"), DEFAULT_MAX_QUANTITY);
    let avg_speed = match obj.get("avg_speed") {
        None | Some(Value::Null) => Decimal::ZERO,
        Some(value) => json_decimal(value)
            .or_else(|| value.as_str().map(lenient_decimal))
            .unwrap_or(Decimal::ZERO)
            .max(Decimal::ZERO),
    };

    Ok(ServiceRecord {
        provider_id,
        category_name,
        name,
        description,
        min_quantity,
        max_quantity,
        base_price: price,
        adjusted_price: None,
        avg_speed,
        status: ServiceStatus::Active,
    })
}

fn normalize_csv(
    fields: &[String],
    provider_id: i64,
) -> Result<Option<ServiceRecord>, ValidationError> {
    if fields.len() < CSV_COLUMN_COUNT || fields[0].trim().is_empty() {
        return Ok(None);
    }

    let name = fields[0].trim().to_string();
    let category_name = fields[1].trim().to_string();
    let description = fields[2].trim().to_string();
    let min_quantity = lenient_int(&fields[3]).max(0);
    let max_quantity = lenient_int(&fields[4]).max(0);
    let price = lenient_decimal(&fields[5]);
    let avg_speed = lenient_decimal(&fields[6]).max(Decimal::ZERO);

    if category_name.is_empty() {
        return Err(ValidationError::MissingField { field: "category" });
    }
    if price <= Decimal::ZERO {
        return Err(ValidationError::NonPositivePrice {
            price: fields[5].trim().to_string(),
        });
    }

    Ok(Some(ServiceRecord {
        provider_id,
        category_name,
        name,
        description,
        min_quantity,
        max_quantity,
        base_price: price,
        adjusted_price: None,
        avg_speed,
        status: ServiceStatus::Active,
    }))
}

fn required_text(obj: &Map<String, Value>, field: &'static str) -> Result<String, ValidationError> {
    let text = match obj.get(field) {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    };

    if text.is_empty() {
        return Err(ValidationError::MissingField { field });
    }
    Ok(text)
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn json_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => parse_decimal(&n.to_string()),
        Value::String(s) => parse_decimal(s),
        _ => None,
    }
}

fn json_quantity(value: Option<&Value>, default: i64) -> i64 {
    let quantity = match value {
        None | Some(Value::Null) => default,
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.trunc() as i64))
            .unwrap_or(0),
        Some(Value::String(s)) => lenient_int(s),
        Some(Value::Bool(b)) => i64::from(*b),
        Some(_) => 0,
    };
    quantity.max(0)
}

/// 嚴格解析十進位數字，支援科學記號
pub fn parse_decimal(text: &str) -> Option<Decimal> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    Decimal::from_str(text)
        .or_else(|_| Decimal::from_scientific(text))
        .ok()
}

/// 寬鬆解析整數：取字首的數字部分，無法解析時為 0（如 "12abc" → 12、"abc" → 0）
pub fn lenient_int(text: &str) -> i64 {
    let prefix = numeric_prefix(text, false);
    prefix.parse::<i64>().unwrap_or_else(|_| {
        // 超出範圍或只有符號
        if prefix.len() > 1 && prefix.starts_with('-') {
            i64::MIN
        } else if prefix.chars().any(|c| c.is_ascii_digit()) {
            i64::MAX
        } else {
            0
        }
    })
}

/// 寬鬆解析小數：取字首的數字部分，無法解析時為 0
pub fn lenient_decimal(text: &str) -> Decimal {
    let prefix = numeric_prefix(text, true);
    Decimal::from_str(prefix.trim_end_matches('.')).unwrap_or(Decimal::ZERO)
}

fn numeric_prefix(text: &str, allow_fraction: bool) -> &str {
    let text = text.trim_start();
    let bytes = text.as_bytes();
    let mut end = 0;

    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end = 1;
    }
    let mut seen_dot = false;
    while end < bytes.len() {
        match bytes[end] {
            b'0'..=b'9' => end += 1,
            b'.' if allow_fraction && !seen_dot => {
                seen_dot = true;
                end += 1;
            }
            _ => break,
        }
    }
    &text[..end]
}
