use crate::core::importer::ImportOptions;
use crate::utils::error::{ImportError, Result};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// bulk-import.toml；每個區段都可省略並使用預設值
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportSettings {
    pub database: DatabaseConfig,
    pub provider_api: ProviderApiConfig,
    pub reports: ReportsConfig,
    pub import: ImportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://catalog.db".to_string(),
            max_connections: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderApiConfig {
    pub timeout_seconds: u64,
}

impl Default for ProviderApiConfig {
    fn default() -> Self {
        Self { timeout_seconds: 30 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportsConfig {
    pub directory: String,
}

impl Default for ReportsConfig {
    fn default() -> Self {
        Self {
            directory: "./logs".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    pub strict_api_prices: bool,
    pub reactivate_on_update: bool,
}

impl ImportSettings {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(ImportError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 檔案不存在時使用預設值
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            tracing::debug!("Loading settings from {}", path.display());
            Self::from_file(path)
        } else {
            tracing::debug!("Settings file {} not found, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        // 處理環境變數替換
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| ImportError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${DATABASE_URL})
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| ImportError::ConfigError {
            message: format!("Invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.provider_api.timeout_seconds)
    }

    pub fn import_options(&self) -> ImportOptions {
        ImportOptions {
            strict_api_prices: self.import.strict_api_prices,
            reactivate_on_update: self.import.reactivate_on_update,
        }
    }
}

impl Validate for ImportSettings {
    fn validate(&self) -> Result<()> {
        validation::validate_database_url("database.url", &self.database.url)?;
        validation::validate_positive_number(
            "database.max_connections",
            u64::from(self.database.max_connections),
            1,
        )?;
        validation::validate_positive_number(
            "provider_api.timeout_seconds",
            self.provider_api.timeout_seconds,
            1,
        )?;
        validation::validate_path("reports.directory", &self.reports.directory)?;
        Ok(())
    }
}
