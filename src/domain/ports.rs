use crate::domain::model::{Provider, RawRecord, SourceKind};
use crate::utils::error::Result;
use async_trait::async_trait;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// 一個批次的原始記錄來源（供應商 API 或 CSV 檔）
///
/// `fetch` 失敗屬於致命錯誤：整個批次中止並回滾。
#[async_trait]
pub trait RecordSource: Send + Sync {
    fn kind(&self) -> SourceKind;

    async fn fetch(&self, provider: &Provider) -> Result<Vec<RawRecord>>;
}
