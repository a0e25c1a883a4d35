use crate::domain::model::{ImportResult, SourceKind};
use crate::domain::ports::Storage;
use crate::utils::error::Result;
use chrono::{DateTime, Local};

pub fn report_file_name(source: SourceKind, generated_at: DateTime<Local>) -> String {
    let prefix = match source {
        SourceKind::Api => "api",
        SourceKind::Csv => "csv",
    };
    format!(
        "{}_import_errors_{}.txt",
        prefix,
        generated_at.format("%Y-%m-%d_%H-%M-%S")
    )
}

/// 純文字錯誤報告：標題、產生時間、統計、逐列錯誤
pub fn render_error_report(result: &ImportResult, generated_at: DateTime<Local>) -> String {
    let mut report = format!("{} Import Error Report\n", result.source.label());
    report.push_str(&format!(
        "Generated: {}\n\n",
        generated_at.format("%Y-%m-%d %H:%M:%S")
    ));
    report.push_str("Summary:\n");
    report.push_str(&format!(
        "Successfully imported: {} services\n",
        result.imported_count
    ));
    report.push_str(&format!("Errors encountered: {}\n\n", result.error_count));
    report.push_str("Error Details:\n");

    let lines: Vec<String> = result.errors.iter().map(|e| e.to_string()).collect();
    report.push_str(&lines.join("\n"));
    report
}

/// 有錯誤時寫出報告檔並回傳檔名；沒有錯誤則不寫檔
pub async fn write_error_report<S: Storage>(
    storage: &S,
    result: &ImportResult,
    generated_at: DateTime<Local>,
) -> Result<Option<String>> {
    if !result.has_errors() {
        return Ok(None);
    }

    let file_name = report_file_name(result.source, generated_at);
    let report = render_error_report(result, generated_at);
    storage.write_file(&file_name, report.as_bytes()).await?;

    tracing::info!("📝 Error report saved as {}", file_name);
    Ok(Some(file_name))
}
