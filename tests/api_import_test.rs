use bulk_import::core::report;
use bulk_import::domain::model::RowRef;
use bulk_import::{
    AdjustmentPolicy, BatchImporter, Catalog, ImportError, ImportOptions, ImportRequest,
    LocalStorage, ProviderApiSource, SourceKind,
};
use httpmock::prelude::*;
use rust_decimal::Decimal;
use std::str::FromStr;
use tempfile::TempDir;

async fn setup(api_url: &str) -> anyhow::Result<(Catalog, i64)> {
    let catalog = Catalog::connect("sqlite::memory:", 1).await?;
    catalog.migrate().await?;
    let provider_id = catalog.add_provider("Acme Panel", api_url, "test-key").await?;
    Ok((catalog, provider_id))
}

fn request(provider_id: i64, policy: AdjustmentPolicy) -> ImportRequest {
    ImportRequest {
        provider_id,
        policy,
    }
}

fn dec(value: &str) -> Decimal {
    Decimal::from_str(value).unwrap()
}

#[tokio::test]
async fn test_percentage_markup_is_stored() -> anyhow::Result<()> {
    let server = MockServer::start();
    let api_mock = server.mock(|when, then| {
        when.method(GET)
            .path("/api/services")
            .header("Authorization", "Bearer test-key");
        then.status(200)
            .header("Content-Type", "application/json")
            .json_body(serde_json::json!([
                {"name": "A", "category": "C", "price": 10}
            ]));
    });

    let (catalog, provider_id) = setup(&server.url("/api")).await?;
    let importer = BatchImporter::new(catalog.clone(), ImportOptions::default());
    let source = ProviderApiSource::new(None);

    let result = importer
        .run_import(
            &source,
            &request(provider_id, AdjustmentPolicy::percentage(dec("10"))),
        )
        .await?;

    api_mock.assert();
    assert_eq!(result.source, SourceKind::Api);
    assert_eq!(result.imported_count, 1);
    assert_eq!(
        result.summary_message(),
        "Successfully imported 1 services from API."
    );

    let stored = catalog
        .find_service(provider_id, "A")
        .await?
        .expect("service should exist");
    assert_eq!(stored.category_name, "C");
    assert_eq!(stored.base_price, dec("10"));
    assert_eq!(stored.price, dec("11.0"));
    assert_eq!(stored.status, "active");
    // 未提供的欄位使用預設值
    assert_eq!(stored.min_quantity, 1);
    assert_eq!(stored.max_quantity, 1000);
    assert_eq!(stored.avg_speed, Decimal::ZERO);
    Ok(())
}

#[tokio::test]
async fn test_new_category_is_created_once_across_batches() -> anyhow::Result<()> {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/services");
        then.status(200).json_body(serde_json::json!([
            {"name": "First", "category": "NewCat", "price": 1},
            {"name": "Second", "category": "NewCat", "price": 2}
        ]));
    });

    let (catalog, provider_id) = setup(&server.base_url()).await?;
    let importer = BatchImporter::new(catalog.clone(), ImportOptions::default());
    let source = ProviderApiSource::new(None);

    importer
        .run_import(&source, &request(provider_id, AdjustmentPolicy::none()))
        .await?;
    let second = importer
        .run_import(&source, &request(provider_id, AdjustmentPolicy::none()))
        .await?;

    assert_eq!(second.updated_count, 2);
    assert_eq!(catalog.count_categories(provider_id).await?, 1);
    assert_eq!(catalog.count_services(provider_id).await?, 2);
    let categories = catalog.categories(provider_id).await?;
    assert_eq!(categories.len(), 1);
    assert_eq!(categories[0].name, "NewCat");
    assert_eq!(categories[0].provider_id, provider_id);

    let stored = catalog.find_service(provider_id, "Second").await?.unwrap();
    assert_eq!(stored.category_id, categories[0].id);
    Ok(())
}

#[tokio::test]
async fn test_http_failure_is_fatal_and_writes_nothing() -> anyhow::Result<()> {
    let server = MockServer::start();
    let api_mock = server.mock(|when, then| {
        when.method(GET).path("/services");
        then.status(500);
    });

    let (catalog, provider_id) = setup(&server.base_url()).await?;
    let importer = BatchImporter::new(catalog.clone(), ImportOptions::default());

    let err = importer
        .run_import(
            &ProviderApiSource::new(None),
            &request(provider_id, AdjustmentPolicy::none()),
        )
        .await
        .unwrap_err();

    api_mock.assert();
    assert!(matches!(err, ImportError::ProviderApiStatus { status: 500, .. }));
    assert_eq!(
        err.user_friendly_message(),
        "Error processing import: Failed to fetch services from provider"
    );
    assert_eq!(catalog.count_services(provider_id).await?, 0);
    assert_eq!(catalog.count_categories(provider_id).await?, 0);
    Ok(())
}

#[tokio::test]
async fn test_invalid_items_are_reported_and_batch_continues() -> anyhow::Result<()> {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/services");
        then.status(200).json_body(serde_json::json!([
            {"name": "Valid", "category": "Social", "price": "2.5"},
            {"name": "No Category", "price": 3},
            {"name": "Bad Price", "category": "Social", "price": "cheap"},
            "not an object",
            {"name": "Also Valid", "category": "Social", "price": 4}
        ]));
    });

    let (catalog, provider_id) = setup(&server.base_url()).await?;
    let importer = BatchImporter::new(catalog.clone(), ImportOptions::default());

    let result = importer
        .run_import(
            &ProviderApiSource::new(None),
            &request(provider_id, AdjustmentPolicy::none()),
        )
        .await?;

    assert_eq!(result.imported_count, 2);
    assert_eq!(result.error_count, 3);
    assert_eq!(
        result.errors[0].row,
        RowRef::Item {
            index: 2,
            name: Some("No Category".to_string())
        }
    );
    assert_eq!(result.errors[0].field.as_deref(), Some("category"));
    assert_eq!(result.errors[1].field.as_deref(), Some("price"));
    assert_eq!(result.errors[2].field, None);
    assert_eq!(catalog.count_services(provider_id).await?, 2);

    let dir = TempDir::new()?;
    let storage = LocalStorage::new(dir.path().to_str().unwrap().to_string());
    let file_name = report::write_error_report(&storage, &result, chrono::Local::now())
        .await?
        .expect("report should be written");
    assert!(file_name.starts_with("api_import_errors_"));
    let contents = std::fs::read_to_string(dir.path().join(&file_name))?;
    assert!(contents.starts_with("API Import Error Report\n"));
    assert!(contents.contains("Item 2 (No Category): Missing required field 'category'"));
    Ok(())
}

#[tokio::test]
async fn test_category_filter_is_sent_as_query() -> anyhow::Result<()> {
    let server = MockServer::start();
    let api_mock = server.mock(|when, then| {
        when.method(GET)
            .path("/services")
            .query_param("category", "Social Media");
        then.status(200).json_body(serde_json::json!([
            {"name": "Likes", "category": "Social Media", "price": 1}
        ]));
    });

    let (catalog, provider_id) = setup(&server.base_url()).await?;
    let importer = BatchImporter::new(catalog.clone(), ImportOptions::default());

    let result = importer
        .run_import(
            &ProviderApiSource::new(Some("Social Media".to_string())),
            &request(provider_id, AdjustmentPolicy::none()),
        )
        .await?;

    api_mock.assert();
    assert_eq!(result.imported_count, 1);
    Ok(())
}

#[tokio::test]
async fn test_update_preserves_status_unless_reactivating() -> anyhow::Result<()> {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/services");
        then.status(200).json_body(serde_json::json!([
            {"name": "Likes", "category": "Social", "price": 1}
        ]));
    });

    let (catalog, provider_id) = setup(&server.base_url()).await?;
    let source = ProviderApiSource::new(None);

    BatchImporter::new(catalog.clone(), ImportOptions::default())
        .run_import(&source, &request(provider_id, AdjustmentPolicy::none()))
        .await?;
    let stored = catalog
        .find_service(provider_id, "Likes")
        .await?
        .expect("service should exist");
    catalog
        .set_service_status(stored.id, bulk_import::domain::model::ServiceStatus::Disabled)
        .await?;

    BatchImporter::new(catalog.clone(), ImportOptions::default())
        .run_import(&source, &request(provider_id, AdjustmentPolicy::none()))
        .await?;
    let preserved = catalog.find_service(provider_id, "Likes").await?.unwrap();
    assert_eq!(preserved.status, "disabled");

    let options = ImportOptions {
        reactivate_on_update: true,
        ..ImportOptions::default()
    };
    BatchImporter::new(catalog.clone(), options)
        .run_import(&source, &request(provider_id, AdjustmentPolicy::none()))
        .await?;
    let reactivated = catalog.find_service(provider_id, "Likes").await?.unwrap();
    assert_eq!(reactivated.status, "active");
    assert_eq!(reactivated.id, stored.id);
    Ok(())
}
