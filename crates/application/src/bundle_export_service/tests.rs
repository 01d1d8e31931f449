use std::collections::BTreeSet;
use std::sync::Arc;

use appbundle_core::{AppError, AppResult, TenantId};
use appbundle_domain::{AuthType, bundle_from_json, bundle_to_json};
use serde_json::json;

use crate::test_support::{FakeGraphRepository, PrefixEncryptor, actor, stored_graph};
use crate::{ApplicationGraphRepository, BundleExportService};

async fn seeded_service(tenant_id: TenantId) -> AppResult<BundleExportService> {
    let repository = Arc::new(FakeGraphRepository::new());
    repository
        .save_application_graph(tenant_id, stored_graph("app-1")?)
        .await?;

    Ok(BundleExportService::new(repository, Arc::new(PrefixEncryptor)))
}

#[tokio::test]
async fn export_unescapes_layouts_and_records_widgets() -> AppResult<()> {
    let tenant_id = TenantId::new();
    let service = seeded_service(tenant_id).await?;

    let bundle = service.export_application(&actor(tenant_id), "app-1").await?;

    let home = &bundle.pages()[0];
    let layout = &home.unpublished_page().layouts()[0];
    assert_eq!(
        layout.dsl()["children"][0]["primaryColumns"]["order.id"],
        json!({ "columnType": "text" })
    );
    let expected = BTreeSet::from(["Table1".to_owned()]);
    assert_eq!(
        bundle.unpublished_layout_escaped_widgets().get("layout-home"),
        Some(&expected)
    );
    assert_eq!(
        bundle.published_layout_escaped_widgets().get("layout-home"),
        Some(&expected)
    );
    Ok(())
}

#[tokio::test]
async fn export_moves_secrets_into_decrypted_fields() -> AppResult<()> {
    let tenant_id = TenantId::new();
    let service = seeded_service(tenant_id).await?;

    let bundle = service.export_application(&actor(tenant_id), "app-1").await?;

    let fields = bundle
        .decrypted_fields()
        .get("act-orders")
        .ok_or_else(|| AppError::Internal("missing decrypted fields".to_owned()))?;
    assert_eq!(fields.datasource_id, "ds-orders");
    assert_eq!(fields.auth_type, AuthType::DbAuth);
    assert_eq!(fields.password.as_deref(), Some("hunter2"));
    assert!(!bundle.decrypted_fields().contains_key("act-refresh"));

    let authentication = bundle.datasources()[0]
        .authentication()
        .ok_or_else(|| AppError::Internal("missing authentication".to_owned()))?;
    assert!(!authentication.has_secrets());
    assert_eq!(authentication.username(), Some("reporter"));
    Ok(())
}

#[tokio::test]
async fn export_moves_user_set_on_load_into_side_table() -> AppResult<()> {
    let tenant_id = TenantId::new();
    let service = seeded_service(tenant_id).await?;

    let bundle = service.export_application(&actor(tenant_id), "app-1").await?;

    let invisible = &bundle.invisible_action_fields()["act-orders"];
    assert_eq!(invisible.unpublished_user_set_on_load, Some(true));
    assert_eq!(invisible.published_user_set_on_load, Some(false));

    let action = bundle
        .action("act-orders")
        .ok_or_else(|| AppError::Internal("missing action".to_owned()))?;
    assert!(!action.unpublished_action().user_set_on_load());
    Ok(())
}

#[tokio::test]
async fn export_names_default_pages_and_survives_round_trip() -> AppResult<()> {
    let tenant_id = TenantId::new();
    let service = seeded_service(tenant_id).await?;

    let bundle = service.export_application(&actor(tenant_id), "app-1").await?;

    assert_eq!(bundle.unpublished_default_page_name(), Some("Home"));
    assert_eq!(bundle.published_default_page_name(), Some("Home"));
    assert_eq!(bundle.page_order(), ["page-reports", "page-home"]);
    assert_eq!(bundle_from_json(&bundle_to_json(&bundle)?)?, bundle);
    Ok(())
}

#[tokio::test]
async fn export_is_scoped_to_the_actor_tenant() -> AppResult<()> {
    let service = seeded_service(TenantId::new()).await?;

    let result = service
        .export_application(&actor(TenantId::new()), "app-1")
        .await;

    assert!(matches!(result, Err(AppError::NotFound(_))));
    Ok(())
}

#[tokio::test]
async fn export_rejects_default_page_missing_from_graph() -> AppResult<()> {
    let tenant_id = TenantId::new();
    let mut graph = stored_graph("app-1")?;
    graph.published_default_page_id = Some("page-reports".to_owned());
    let repository = Arc::new(FakeGraphRepository::new());
    repository.save_application_graph(tenant_id, graph).await?;

    let result = BundleExportService::new(repository, Arc::new(PrefixEncryptor))
        .export_application(&actor(tenant_id), "app-1")
        .await;

    assert!(matches!(result, Err(AppError::DanglingReference(_))));
    Ok(())
}
