use crate::config::ImportSettings;
use crate::domain::model::{AdjustmentKind, AdjustmentPolicy};
use crate::utils::error::Result;
use crate::utils::validation::{self, Validate};
use clap::{Args, Parser, Subcommand, ValueEnum};
use rust_decimal::Decimal;

#[derive(Debug, Clone, Parser)]
#[command(name = "bulk-import")]
#[command(about = "Bulk import provider services into the catalog")]
pub struct CliConfig {
    #[arg(long, global = true, default_value = "bulk-import.toml")]
    pub config: String,

    /// 覆寫設定檔的 database.url
    #[arg(long, global = true)]
    pub database_url: Option<String>,

    /// 覆寫設定檔的 reports.directory
    #[arg(long, global = true)]
    pub report_dir: Option<String>,

    #[arg(long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Compact)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Compact,
    Json,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Import services from a provider API
    Api {
        #[arg(long)]
        provider_id: i64,

        /// Only fetch services of this category
        #[arg(long)]
        category: Option<String>,

        #[command(flatten)]
        adjustment: AdjustmentArgs,
    },
    /// Import services from an uploaded CSV file
    Csv {
        #[arg(long)]
        provider_id: i64,

        #[arg(long)]
        file: String,

        #[command(flatten)]
        adjustment: AdjustmentArgs,
    },
    /// List active providers and known categories
    Providers,
    /// Register a new provider
    AddProvider {
        #[arg(long)]
        name: String,

        #[arg(long)]
        api_url: String,

        #[arg(long)]
        api_key: String,
    },
}

#[derive(Debug, Clone, Args)]
pub struct AdjustmentArgs {
    #[arg(long, value_enum, default_value_t = AdjustmentKind::None)]
    pub adjustment_type: AdjustmentKind,

    #[arg(long, default_value = "0", allow_hyphen_values = true)]
    pub adjustment_value: Decimal,
}

impl AdjustmentArgs {
    pub fn policy(&self) -> AdjustmentPolicy {
        AdjustmentPolicy {
            kind: self.adjustment_type,
            value: self.adjustment_value,
        }
    }
}

impl CliConfig {
    /// 命令列參數優先於設定檔
    pub fn apply_overrides(&self, settings: &mut ImportSettings) {
        if let Some(url) = &self.database_url {
            settings.database.url = url.clone();
        }
        if let Some(dir) = &self.report_dir {
            settings.reports.directory = dir.clone();
        }
    }
}

impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_path("config", &self.config)?;

        match &self.command {
            Command::Csv { file, .. } => validation::validate_path("file", file),
            Command::AddProvider {
                name,
                api_url,
                api_key,
            } => {
                validation::validate_non_empty_string("name", name)?;
                validation::validate_url("api_url", api_url)?;
                validation::validate_non_empty_string("api_key", api_key)
            }
            Command::Api { .. } | Command::Providers => Ok(()),
        }
    }
}
