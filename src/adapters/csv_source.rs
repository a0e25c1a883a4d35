use crate::domain::model::{Provider, RawRecord, SourceKind};
use crate::domain::ports::{RecordSource, Storage};
use crate::utils::error::Result;
use async_trait::async_trait;
use csv::ReaderBuilder;

/// 上傳的 CSV 檔：name, category, description, min_quantity, max_quantity, price, avg_speed
pub struct CsvSource<S: Storage> {
    storage: S,
    path: String,
}

impl<S: Storage> CsvSource<S> {
    pub fn new(storage: S, path: impl Into<String>) -> Self {
        Self {
            storage,
            path: path.into(),
        }
    }
}

/// 第一列第一欄為 "name"（不分大小寫）時視為標題列
pub fn is_header_row(fields: &[String]) -> bool {
    fields
        .first()
        .map(|first| first.trim().eq_ignore_ascii_case("name"))
        .unwrap_or(false)
}

/// 解析 CSV 內容；行號為檔案中的實際位置（從 1 開始，標題列算第 1 行）
///
/// 非 UTF-8 的欄位（例如 Latin-1 匯出）以替代字元解碼，不會中止整批。
pub fn parse_rows(data: &[u8]) -> Result<Vec<RawRecord>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(data);

    let mut rows = Vec::new();
    for (index, result) in reader.byte_records().enumerate() {
        let record = result?;
        let row = record
            .position()
            .map(|p| p.line())
            .unwrap_or(index as u64 + 1);
        let fields: Vec<String> = record
            .iter()
            .map(|f| String::from_utf8_lossy(f).into_owned())
            .collect();

        if index == 0 && is_header_row(&fields) {
            tracing::debug!("Skipping header row: {:?}", fields);
            continue;
        }
        rows.push(RawRecord::Csv { row, fields });
    }

    Ok(rows)
}

#[async_trait]
impl<S: Storage> RecordSource for CsvSource<S> {
    fn kind(&self) -> SourceKind {
        SourceKind::Csv
    }

    async fn fetch(&self, _provider: &Provider) -> Result<Vec<RawRecord>> {
        tracing::info!("📄 Opening CSV file: {}", self.path);
        let data = self.storage.read_file(&self.path).await?;
        let rows = parse_rows(&data)?;
        tracing::info!("📥 Read {} CSV rows from {}", rows.len(), self.path);
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::storage::LocalStorage;
    use crate::utils::error::ImportError;
    use tempfile::TempDir;

    fn rows_of(records: &[RawRecord]) -> Vec<(u64, String)> {
        records
            .iter()
            .map(|r| match r {
                RawRecord::Csv { row, fields } => (*row, fields[0].clone()),
                other => panic!("unexpected record: {:?}", other),
            })
            .collect()
    }

    #[test]
    fn test_header_row_is_skipped() {
        for header in ["name", "Name", "NAME"] {
            let data = format!(
                "{},category,description,min,max,price,speed\nLikes,IG,,1,10,1.5,0\n",
                header
            );
            let rows = parse_rows(data.as_bytes()).unwrap();
            assert_eq!(rows_of(&rows), vec![(2, "Likes".to_string())]);
        }
    }

    #[test]
    fn test_first_row_kept_when_not_header() {
        let data = "Likes,IG,,1,10,1.5,0\nViews,YT,,1,10,2,0\n";
        let rows = parse_rows(data.as_bytes()).unwrap();
        assert_eq!(
            rows_of(&rows),
            vec![(1, "Likes".to_string()), (2, "Views".to_string())]
        );
    }

    #[test]
    fn test_only_first_row_can_be_header() {
        let data = "Likes,IG,,1,10,1.5,0\nname,IG,,1,10,1.5,0\n";
        let rows = parse_rows(data.as_bytes()).unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_row_numbers_follow_file_lines() {
        let data = "name,category,description,min,max,price,speed\nA,C,,1,2,3,0\n\nB,C,,1,2,3,0\n";
        let rows = parse_rows(data.as_bytes()).unwrap();
        assert_eq!(
            rows_of(&rows),
            vec![(2, "A".to_string()), (4, "B".to_string())]
        );
    }

    #[test]
    fn test_short_rows_are_passed_through() {
        // 欄位不足的列交由 normalizer 略過
        let data = "A,C\n";
        let rows = parse_rows(data.as_bytes()).unwrap();
        match &rows[0] {
            RawRecord::Csv { fields, .. } => assert_eq!(fields.len(), 2),
            other => panic!("unexpected record: {:?}", other),
        }
    }

    #[test]
    fn test_invalid_utf8_row_is_decoded_lossily() {
        let mut data = b"Good,C,,1,2,1,0\n".to_vec();
        data.extend_from_slice(b"Caf\xE9 Likes,C,,1,2,1,0\n");
        data.extend_from_slice(b"AlsoGood,C,,1,2,1,0\n");

        let rows = parse_rows(&data).unwrap();
        assert_eq!(
            rows_of(&rows),
            vec![
                (1, "Good".to_string()),
                (2, "Caf\u{FFFD} Likes".to_string()),
                (3, "AlsoGood".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_file_is_fatal() {
        let temp_dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(temp_dir.path().to_str().unwrap().to_string());
        let source = CsvSource::new(storage, "nope.csv");
        let provider = Provider {
            id: 1,
            name: "Acme".to_string(),
            api_url: "http://acme.test".to_string(),
            api_key: "k".to_string(),
            status: "active".to_string(),
        };

        let err = source.fetch(&provider).await.unwrap_err();
        assert!(matches!(err, ImportError::IoError(_)));
    }
}
