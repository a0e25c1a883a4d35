use bulk_import::config::cli::{Command, LogFormat};
use bulk_import::core::report;
use bulk_import::domain::ports::RecordSource;
use bulk_import::utils::error::{ErrorSeverity, Result};
use bulk_import::utils::{logger, validation::Validate};
use bulk_import::{
    AdjustmentPolicy, BatchImporter, Catalog, CliConfig, CsvSource, ImportRequest,
    ImportSettings, LocalStorage, ProviderApiSource,
};
use clap::Parser;

#[tokio::main]
async fn main() {
    let config = CliConfig::parse();

    // 初始化日誌
    match config.log_format {
        LogFormat::Compact => logger::init_cli_logger(config.verbose),
        LogFormat::Json => logger::init_json_logger(config.verbose),
    }

    tracing::info!("Starting bulk-import CLI");
    if config.verbose {
        tracing::debug!("CLI config: {:?}", config);
    }

    if let Err(e) = run(config).await {
        // 記錄詳細錯誤信息
        tracing::error!(
            "❌ Import failed: {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );
        tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 {}", e.recovery_suggestion());

        // 根據錯誤嚴重程度決定退出碼
        let exit_code = match e.severity() {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        };

        if exit_code > 0 {
            std::process::exit(exit_code);
        }
    }
}

async fn run(config: CliConfig) -> Result<()> {
    config.validate()?;

    let mut settings = ImportSettings::load_or_default(&config.config)?;
    config.apply_overrides(&mut settings);
    settings.validate()?;

    let catalog = Catalog::connect(&settings.database.url, settings.database.max_connections).await?;
    catalog.migrate().await?;

    match config.command {
        Command::Api {
            provider_id,
            category,
            adjustment,
        } => {
            let source = ProviderApiSource::with_timeout(category, settings.timeout())?;
            import(&catalog, &settings, &source, provider_id, adjustment.policy()).await
        }
        Command::Csv {
            provider_id,
            file,
            adjustment,
        } => {
            // 相對路徑以目前工作目錄為準
            let source = CsvSource::new(LocalStorage::new(String::new()), file);
            import(&catalog, &settings, &source, provider_id, adjustment.policy()).await
        }
        Command::Providers => list_providers(&catalog).await,
        Command::AddProvider {
            name,
            api_url,
            api_key,
        } => {
            let id = catalog.add_provider(name.trim(), &api_url, &api_key).await?;
            tracing::info!("✅ Registered provider '{}' with id {}", name.trim(), id);
            println!("✅ Provider '{}' registered with id {}", name.trim(), id);
            Ok(())
        }
    }
}

async fn import<R: RecordSource>(
    catalog: &Catalog,
    settings: &ImportSettings,
    source: &R,
    provider_id: i64,
    policy: AdjustmentPolicy,
) -> Result<()> {
    let importer = BatchImporter::new(catalog.clone(), settings.import_options());
    let request = ImportRequest {
        provider_id,
        policy,
    };

    let result = importer.run_import(source, &request).await?;
    println!("✅ {}", result.summary_message());

    if result.has_errors() {
        let storage = LocalStorage::new(settings.reports.directory.clone());
        if let Some(file_name) =
            report::write_error_report(&storage, &result, chrono::Local::now()).await?
        {
            println!(
                "⚠️ {} errors occurred during import. Error report saved as {}",
                result.error_count, file_name
            );
        }
    }

    Ok(())
}

async fn list_providers(catalog: &Catalog) -> Result<()> {
    let providers = catalog.active_providers().await?;
    if providers.is_empty() {
        println!("No active providers. Register one with `bulk-import add-provider`.");
    }
    for provider in &providers {
        println!("{:>6}  {}  ({})", provider.id, provider.name, provider.api_url);
    }

    let categories = catalog.category_names().await?;
    if !categories.is_empty() {
        println!();
        println!("Categories: {}", categories.join(", "));
    }
    Ok(())
}
