use crate::domain::model::{Provider, RawRecord, SourceKind};
use crate::domain::ports::RecordSource;
use crate::utils::error::{ImportError, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;

/// 從供應商 API 取得服務清單
pub struct ProviderApiSource {
    client: Client,
    category: Option<String>,
}

impl ProviderApiSource {
    pub fn new(category: Option<String>) -> Self {
        Self {
            client: Client::new(),
            category: category.filter(|c| !c.trim().is_empty()),
        }
    }

    pub fn with_timeout(category: Option<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            category: category.filter(|c| !c.trim().is_empty()),
        })
    }

    pub fn services_url(provider: &Provider) -> String {
        format!("{}/services", provider.api_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl RecordSource for ProviderApiSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Api
    }

    async fn fetch(&self, provider: &Provider) -> Result<Vec<RawRecord>> {
        let url = Self::services_url(provider);

        let mut request = self
            .client
            .get(&url)
            .bearer_auth(&provider.api_key)
            .header("Content-Type", "application/json");

        if let Some(category) = &self.category {
            request = request.query(&[("category", category)]);
        }

        tracing::info!(
            "📡 Fetching services from provider '{}' ({}), category filter: {}",
            provider.name,
            url,
            self.category.as_deref().unwrap_or("<none>")
        );

        let response = request.send().await?;
        let status = response.status();
        tracing::debug!("API response status: {}", status);

        if status != StatusCode::OK {
            return Err(ImportError::ProviderApiStatus {
                status: status.as_u16(),
                url,
            });
        }

        let body = response.text().await?;
        let payload: serde_json::Value =
            serde_json::from_str(&body).map_err(|e| ImportError::InvalidPayload {
                message: e.to_string(),
            })?;

        let items = match payload {
            serde_json::Value::Array(items) => items,
            other => {
                return Err(ImportError::InvalidPayload {
                    message: format!("expected a JSON array, got {}", json_type(&other)),
                })
            }
        };

        if items.is_empty() {
            return Err(ImportError::EmptyPayload);
        }

        tracing::info!("📥 Provider returned {} services", items.len());

        Ok(items
            .into_iter()
            .enumerate()
            .map(|(i, value)| RawRecord::Api { index: i + 1, value })
            .collect())
    }
}

fn json_type(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
