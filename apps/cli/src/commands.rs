use std::path::Path;
use std::sync::Arc;

use appbundle_application::{
    BundleExportService, BundleImportService, BundleMigrator, ImportOptions,
};
use appbundle_core::AppResult;
use appbundle_domain::{
    ExportBundle, SchemaCompatibility, bundle_from_value, parse_bundle_document,
    read_format_metadata,
};
use appbundle_infrastructure::{InMemoryApplicationRepository, JsonFileBundleStore};
use tracing::{info, warn};

use crate::cli_config::CliConfig;

pub async fn inspect(path: &Path) -> AppResult<()> {
    let document = parse_bundle_document(&JsonFileBundleStore::new().read(path).await?)?;
    let migrator = BundleMigrator::default();
    let declared = read_format_metadata(&document)?;
    let status = match declared.compatibility(&migrator.supported())? {
        SchemaCompatibility::Current => "current",
        SchemaCompatibility::RequiresMigration => "requires migration",
    };

    println!(
        "format: client v{} server v{} ({status})",
        declared.client_schema_version(),
        declared.server_schema_version()
    );

    let bundle = bundle_from_value(migrator.migrate(document)?.document)?;
    print_summary(&bundle);
    Ok(())
}

pub async fn validate(path: &Path) -> AppResult<()> {
    let document = parse_bundle_document(&JsonFileBundleStore::new().read(path).await?)?;
    let migrated = BundleMigrator::default().migrate(document)?;
    if let Some(source) = migrated.migrated_from {
        warn!(
            client_schema_version = source.client_schema_version(),
            server_schema_version = source.server_schema_version(),
            "bundle uses an older format and was migrated for validation"
        );
    }

    let bundle = bundle_from_value(migrated.document)?;
    println!(
        "{}: valid ({} pages, {} actions)",
        path.display(),
        bundle.pages().len(),
        bundle.actions().len()
    );
    Ok(())
}

pub async fn reimport(
    config: &CliConfig,
    input: &Path,
    output: &Path,
    reset_widget_styles: bool,
) -> AppResult<()> {
    let store = JsonFileBundleStore::new();
    let json = store.read(input).await?;

    let repository = Arc::new(InMemoryApplicationRepository::new());
    let encryptor = Arc::new(config.secret_encryptor()?);
    let importer = BundleImportService::new(repository.clone(), encryptor.clone());
    let exporter = BundleExportService::new(repository, encryptor);
    let actor = config.actor();

    let report = importer
        .import_json(
            &actor,
            &json,
            ImportOptions {
                reset_widget_styles,
            },
        )
        .await?;
    info!(
        application_id = %report.application_id,
        datasources_created = report.datasources_created.len(),
        datasources_reused = report.datasources_reused.len(),
        "bundle imported into scratch store"
    );

    let bundle = exporter
        .export_application(&actor, report.application_id.as_str())
        .await?;
    store.write(output, &bundle).await?;

    println!(
        "{} -> {}: application '{}' ({} pages, {} actions, {} collections)",
        input.display(),
        output.display(),
        report.application_name,
        report.page_count,
        report.action_count,
        report.action_collection_count
    );
    Ok(())
}

fn print_summary(bundle: &ExportBundle) {
    let application = bundle.application();
    println!(
        "application: {} ({})",
        application.name(),
        application.slug()
    );

    println!("pages:");
    for page_id in bundle.page_order() {
        let Some(page) = bundle
            .pages()
            .iter()
            .find(|page| page.id().as_str() == page_id)
        else {
            continue;
        };
        let content = page.unpublished_page();
        println!(
            "  {}{} [{} layouts{}]",
            content.name(),
            if content.is_hidden() { " (hidden)" } else { "" },
            content.layouts().len(),
            if page.published_page().is_some() {
                ", published"
            } else {
                ""
            }
        );
    }

    println!(
        "default page: {} / published: {}",
        bundle.unpublished_default_page_name().unwrap_or("-"),
        bundle.published_default_page_name().unwrap_or("-")
    );
    println!(
        "actions: {} in {} collections",
        bundle.actions().len(),
        bundle.action_collections().len()
    );
    for action in bundle.actions() {
        println!("  {} [{}]", action.name(), action.plugin_type().as_str());
    }
    for datasource in bundle.datasources() {
        println!(
            "datasource: {} ({})",
            datasource.name(),
            datasource.plugin_id()
        );
    }
    println!(
        "themes: edit {} / published {}",
        bundle
            .edit_mode_theme()
            .map_or("-", |theme| theme.display_name().as_str()),
        bundle
            .published_theme()
            .map_or("-", |theme| theme.display_name().as_str())
    );

    let escaped_widgets: usize = bundle
        .unpublished_layout_escaped_widgets()
        .values()
        .chain(bundle.published_layout_escaped_widgets().values())
        .map(|names| names.len())
        .sum();
    println!(
        "credentials for {} actions, {} escaped widgets",
        bundle.decrypted_fields().len(),
        escaped_widgets
    );
}
