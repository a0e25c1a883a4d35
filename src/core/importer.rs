use crate::adapters::catalog::{self, Catalog, ImportUnit};
use crate::core::normalizer::{self, NormalizeOptions, ValidationError};
use crate::core::price;
use crate::domain::model::{
    AdjustmentPolicy, ImportResult, Provider, RawRecord, RowError, ServiceRecord, UpsertOutcome,
};
use crate::domain::ports::RecordSource;
use crate::utils::error::{ImportError, Result};
use sqlx::SqliteConnection;
use std::collections::HashMap;
use thiserror::Error;

/// 單筆記錄的失敗原因；不會中止整個批次
#[derive(Error, Debug)]
pub enum RecordError {
    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

impl RecordError {
    fn field(&self) -> Option<String> {
        match self {
            RecordError::Validation(e) => e.field().map(str::to_string),
            RecordError::Storage(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ImportOptions {
    pub strict_api_prices: bool,
    pub reactivate_on_update: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct ImportRequest {
    pub provider_id: i64,
    pub policy: AdjustmentPolicy,
}

enum RecordOutcome {
    Imported(UpsertOutcome),
    Skipped,
}

/// Batch Import Orchestrator
///
/// 整個批次跑在同一個交易內：Idle → TransactionOpen → 逐筆處理 → Committed | RolledBack。
/// 每筆記錄使用 savepoint，驗證或寫入失敗只記錄錯誤並繼續下一筆。
pub struct BatchImporter {
    catalog: Catalog,
    options: ImportOptions,
}

impl BatchImporter {
    pub fn new(catalog: Catalog, options: ImportOptions) -> Self {
        Self { catalog, options }
    }

    pub async fn run_import<R>(&self, source: &R, request: &ImportRequest) -> Result<ImportResult>
    where
        R: RecordSource + ?Sized,
    {
        tracing::info!(
            "🚀 Starting {} import for provider {} (price adjustment: {})",
            source.kind().label(),
            request.provider_id,
            request.policy
        );

        let mut unit = self.catalog.begin().await?;

        match self.process_batch(&mut unit, source, request).await {
            Ok(result) => {
                unit.commit().await?;
                tracing::info!(
                    "✅ Import committed: {} imported ({} new, {} updated), {} skipped, {} errors",
                    result.imported_count,
                    result.inserted_count,
                    result.updated_count,
                    result.skipped_count,
                    result.error_count
                );
                Ok(result)
            }
            Err(e) => {
                tracing::error!("❌ Import aborted, rolling back: {}", e);
                if let Err(rollback_err) = unit.rollback().await {
                    tracing::error!("Rollback failed: {}", rollback_err);
                }
                Err(e)
            }
        }
    }

    async fn process_batch<R>(
        &self,
        unit: &mut ImportUnit,
        source: &R,
        request: &ImportRequest,
    ) -> Result<ImportResult>
    where
        R: RecordSource + ?Sized,
    {
        let provider = catalog::find_provider(unit.connection(), request.provider_id)
            .await?
            .ok_or(ImportError::ProviderNotFound {
                provider_id: request.provider_id,
            })?;

        let records = source.fetch(&provider).await?;
        let mut result = ImportResult::new(source.kind(), provider.id);
        // 只快取已提交 savepoint 的分類，避免引用被回滾的列
        let mut categories: HashMap<String, i64> = HashMap::new();

        for raw in &records {
            match self
                .process_record(unit, &provider, raw, request, &mut categories)
                .await
            {
                Ok(RecordOutcome::Imported(outcome)) => result.record_success(outcome),
                Ok(RecordOutcome::Skipped) => {
                    tracing::debug!("Skipping empty row {}", raw.row_ref());
                    result.skipped_count += 1;
                }
                Err(e) => {
                    let row = raw.row_ref();
                    tracing::warn!("⚠️ Error importing {}: {}", row, e);
                    tracing::debug!("Record data: {:?}", raw);
                    result.record_failure(RowError {
                        row,
                        field: e.field(),
                        message: e.to_string(),
                    });
                }
            }
        }

        Ok(result)
    }

    async fn process_record(
        &self,
        unit: &mut ImportUnit,
        provider: &Provider,
        raw: &RawRecord,
        request: &ImportRequest,
        categories: &mut HashMap<String, i64>,
    ) -> std::result::Result<RecordOutcome, RecordError> {
        let normalize_options = NormalizeOptions {
            strict_api_prices: self.options.strict_api_prices,
        };
        let Some(mut record) = normalizer::normalize(raw, provider.id, normalize_options)? else {
            return Ok(RecordOutcome::Skipped);
        };

        apply_adjustment(&mut record, &request.policy)?;

        let mut savepoint = unit.savepoint().await?;
        let written = write_record(
            &mut savepoint,
            &record,
            categories,
            self.options.reactivate_on_update,
        )
        .await;

        match written {
            Ok((outcome, category_id)) => {
                savepoint.commit().await?;
                categories.insert(record.category_name.clone(), category_id);
                tracing::debug!(
                    "Imported service '{}' (category '{}', price {}): {:?}",
                    record.name,
                    record.category_name,
                    record.effective_price(),
                    outcome
                );
                Ok(RecordOutcome::Imported(outcome))
            }
            Err(e) => {
                savepoint.rollback().await?;
                Err(RecordError::Storage(e))
            }
        }
    }
}

async fn write_record(
    conn: &mut SqliteConnection,
    record: &ServiceRecord,
    categories: &HashMap<String, i64>,
    reactivate_on_update: bool,
) -> sqlx::Result<(UpsertOutcome, i64)> {
    let category_id = match categories.get(&record.category_name) {
        Some(id) => *id,
        None => catalog::resolve_category(conn, &record.category_name, record.provider_id).await?,
    };
    let outcome = catalog::upsert_service(conn, record, category_id, reactivate_on_update).await?;
    Ok((outcome, category_id))
}

fn apply_adjustment(
    record: &mut ServiceRecord,
    policy: &AdjustmentPolicy,
) -> std::result::Result<(), ValidationError> {
    let adjusted =
        price::adjust(record.base_price, policy).ok_or_else(|| ValidationError::PriceOverflow {
            price: record.base_price.to_string(),
        })?;
    tracing::debug!(
        "Price adjustment for '{}': base={}, policy={}, adjusted={}",
        record.name,
        record.base_price,
        policy,
        adjusted
    );
    record.adjusted_price = Some(adjusted);
    Ok(())
}
