use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 上游服務供應商，匯入期間唯讀
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provider {
    pub id: i64,
    pub name: String,
    pub api_url: String,
    pub api_key: String,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub provider_id: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    Active,
    Disabled,
    Secret,
}

impl ServiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceStatus::Active => "active",
            ServiceStatus::Disabled => "disabled",
            ServiceStatus::Secret => "secret",
        }
    }
}

/// 正規化後的服務記錄；`adjusted_price` 由 Price Adjuster 填入
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceRecord {
    pub provider_id: i64,
    pub category_name: String,
    pub name: String,
    pub description: String,
    pub min_quantity: i64,
    pub max_quantity: i64,
    pub base_price: Decimal,
    pub adjusted_price: Option<Decimal>,
    pub avg_speed: Decimal,
    pub status: ServiceStatus,
}

impl ServiceRecord {
    /// 寫入時使用的價格：尚未調整時退回原價
    pub fn effective_price(&self) -> Decimal {
        self.adjusted_price.unwrap_or(self.base_price)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum AdjustmentKind {
    #[default]
    None,
    Percentage,
    #[serde(alias = "amount")]
    #[cfg_attr(feature = "cli", value(alias = "amount"))]
    Fixed,
}

impl fmt::Display for AdjustmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdjustmentKind::None => write!(f, "none"),
            AdjustmentKind::Percentage => write!(f, "percentage"),
            AdjustmentKind::Fixed => write!(f, "fixed"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AdjustmentPolicy {
    pub kind: AdjustmentKind,
    pub value: Decimal,
}

impl AdjustmentPolicy {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn percentage(value: Decimal) -> Self {
        Self {
            kind: AdjustmentKind::Percentage,
            value,
        }
    }

    pub fn fixed(value: Decimal) -> Self {
        Self {
            kind: AdjustmentKind::Fixed,
            value,
        }
    }
}

impl fmt::Display for AdjustmentPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            AdjustmentKind::None => write!(f, "none"),
            AdjustmentKind::Percentage => write!(f, "percentage {}%", self.value),
            AdjustmentKind::Fixed if self.value.is_sign_negative() => {
                write!(f, "fixed {}", self.value)
            }
            AdjustmentKind::Fixed => write!(f, "fixed +{}", self.value),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Api,
    Csv,
}

impl SourceKind {
    pub fn label(&self) -> &'static str {
        match self {
            SourceKind::Api => "API",
            SourceKind::Csv => "CSV",
        }
    }
}

/// 來源提供的原始記錄，尚未驗證
#[derive(Debug, Clone, PartialEq)]
pub enum RawRecord {
    Api {
        index: usize,
        value: serde_json::Value,
    },
    Csv {
        row: u64,
        fields: Vec<String>,
    },
}

impl RawRecord {
    pub fn row_ref(&self) -> RowRef {
        match self {
            RawRecord::Api { index, value } => RowRef::Item {
                index: *index,
                name: value
                    .get("name")
                    .and_then(|v| v.as_str())
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty()),
            },
            RawRecord::Csv { row, .. } => RowRef::Row(*row),
        }
    }
}

/// 讓呼叫端能定位出錯的輸入：CSV 行號或 API 項目序號
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RowRef {
    Row(u64),
    Item { index: usize, name: Option<String> },
}

impl fmt::Display for RowRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowRef::Row(row) => write!(f, "Row {}", row),
            RowRef::Item {
                index,
                name: Some(name),
            } => write!(f, "Item {} ({})", index, name),
            RowRef::Item { index, name: None } => write!(f, "Item {}", index),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowError {
    pub row: RowRef,
    pub field: Option<String>,
    pub message: String,
}

impl fmt::Display for RowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.row, self.message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportResult {
    pub source: SourceKind,
    pub provider_id: i64,
    pub imported_count: usize,
    pub inserted_count: usize,
    pub updated_count: usize,
    pub skipped_count: usize,
    pub error_count: usize,
    pub errors: Vec<RowError>,
}

impl ImportResult {
    pub fn new(source: SourceKind, provider_id: i64) -> Self {
        Self {
            source,
            provider_id,
            imported_count: 0,
            inserted_count: 0,
            updated_count: 0,
            skipped_count: 0,
            error_count: 0,
            errors: Vec::new(),
        }
    }

    pub fn record_success(&mut self, outcome: UpsertOutcome) {
        self.imported_count += 1;
        match outcome {
            UpsertOutcome::Inserted => self.inserted_count += 1,
            UpsertOutcome::Updated => self.updated_count += 1,
        }
    }

    pub fn record_failure(&mut self, error: RowError) {
        self.error_count += 1;
        self.errors.push(error);
    }

    pub fn has_errors(&self) -> bool {
        self.error_count > 0
    }

    /// 給操作人員看的結果摘要
    pub fn summary_message(&self) -> String {
        let mut message = format!(
            "Successfully imported {} services from {}.",
            self.imported_count,
            self.source.label()
        );
        if self.has_errors() {
            message.push_str(&format!(" {} errors occurred.", self.error_count));
        }
        message
    }
}
