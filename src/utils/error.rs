use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Database migration failed: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    #[error("Provider not found: {provider_id}")]
    ProviderNotFound { provider_id: i64 },

    #[error("Failed to fetch services from provider: HTTP {status} from {url}")]
    ProviderApiStatus { status: u16, url: String },

    #[error("Invalid JSON response from provider API: {message}")]
    InvalidPayload { message: String },

    #[error("Invalid JSON response from provider API: no services returned")]
    EmptyPayload,

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration error in '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },
}

pub type Result<T> = std::result::Result<T, ImportError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Network,
    Source,
    Storage,
    Processing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ImportError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ImportError::ConfigError { .. }
            | ImportError::ConfigValidationError { .. }
            | ImportError::InvalidConfigValueError { .. } => ErrorCategory::Configuration,
            ImportError::ApiError(_) | ImportError::ProviderApiStatus { .. } => {
                ErrorCategory::Network
            }
            ImportError::CsvError(_)
            | ImportError::IoError(_)
            | ImportError::InvalidPayload { .. }
            | ImportError::EmptyPayload => ErrorCategory::Source,
            ImportError::DatabaseError(_)
            | ImportError::MigrationError(_)
            | ImportError::ProviderNotFound { .. } => ErrorCategory::Storage,
            ImportError::ProcessingError { .. } => ErrorCategory::Processing,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            // 上游暫時性問題，重試即可
            ImportError::ApiError(_) | ImportError::ProviderApiStatus { .. } => {
                ErrorSeverity::Medium
            }
            ImportError::DatabaseError(_) | ImportError::MigrationError(_) => {
                ErrorSeverity::Critical
            }
            _ => ErrorSeverity::High,
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            ImportError::ProviderNotFound { provider_id } => {
                format!("Error processing import: Provider {} not found", provider_id)
            }
            ImportError::ProviderApiStatus { .. } | ImportError::ApiError(_) => {
                "Error processing import: Failed to fetch services from provider".to_string()
            }
            ImportError::InvalidPayload { .. } | ImportError::EmptyPayload => {
                "Error processing import: Invalid JSON response from provider API".to_string()
            }
            ImportError::IoError(_) | ImportError::CsvError(_) => {
                "Error processing import: Failed to open CSV file".to_string()
            }
            ImportError::DatabaseError(_) | ImportError::MigrationError(_) => {
                "Error processing import: No database connection available".to_string()
            }
            other => format!("Error processing import: {}", other),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Configuration => "Check the configuration file and command line flags",
            ErrorCategory::Network => "Verify the provider API URL and key, then retry the import",
            ErrorCategory::Source => "Check that the input file or API payload is well formed",
            ErrorCategory::Storage => "Check the database URL and that the provider exists",
            ErrorCategory::Processing => "Re-run with --verbose and inspect the logs",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_mapping() {
        let err = ImportError::ProviderApiStatus {
            status: 503,
            url: "http://provider/services".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::Network);
        assert_eq!(err.severity(), ErrorSeverity::Medium);

        let err = ImportError::ProviderNotFound { provider_id: 9 };
        assert_eq!(err.category(), ErrorCategory::Storage);
        assert_eq!(err.severity(), ErrorSeverity::High);
        assert!(err.user_friendly_message().contains("Provider 9 not found"));
    }

    #[test]
    fn test_config_errors_are_configuration_category() {
        let err = ImportError::InvalidConfigValueError {
            field: "database.url".to_string(),
            value: "mysql://db".to_string(),
            reason: "Only sqlite: database URLs are supported".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::Configuration);
        assert_eq!(
            err.recovery_suggestion(),
            "Check the configuration file and command line flags"
        );
    }
}
