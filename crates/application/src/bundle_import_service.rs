use std::collections::BTreeSet;
use std::sync::Arc;

use appbundle_core::{AppError, AppResult, UserIdentity};
use appbundle_domain::{
    Action, ActionCollection, Authentication, Datasource, ExportBundle, FormatMetadata,
    Layout, LayoutEscapedWidgets, Page, PageContent, SchemaCompatibility, Theme,
    apply_property_updates, bundle_from_value, parse_bundle_document, properties_to_reset,
};
use appbundle_domain::escaping::{escape_layout_dsl, escape_restricted_widgets};
use serde_json::Value;
use tracing::{debug, info};

use crate::{ApplicationGraph, ApplicationGraphRepository, BundleMigrator, SecretEncryptor};

mod naming;
mod remapping;

use naming::{DatasourcePlacement, available_name, place_datasource};
pub use remapping::{IdRemapper, RemappedKind};

const SAVE_ATTEMPTS: usize = 3;

/// Caller choices applied while importing a bundle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportOptions {
    /// Resets widget styling in every layout to the imported theme stylesheet.
    pub reset_widget_styles: bool,
}

/// Summary of a completed import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportReport {
    /// Identifier of the created application.
    pub application_id: String,
    /// Name of the created application after conflict resolution.
    pub application_name: String,
    /// Imported page count.
    pub page_count: usize,
    /// Imported action count.
    pub action_count: usize,
    /// Imported action collection count.
    pub action_collection_count: usize,
    /// Names of datasources created by the import.
    pub datasources_created: Vec<String>,
    /// Names of existing datasources the import now references.
    pub datasources_reused: Vec<String>,
    /// Versions the bundle declared when it had to be migrated.
    pub migrated_from: Option<FormatMetadata>,
}

/// Reconstructs applications from bundles under fresh identifiers.
#[derive(Clone)]
pub struct BundleImportService {
    repository: Arc<dyn ApplicationGraphRepository>,
    secret_encryptor: Arc<dyn SecretEncryptor>,
    migrator: BundleMigrator,
}

impl BundleImportService {
    /// Creates an importer accepting the current format versions.
    #[must_use]
    pub fn new(
        repository: Arc<dyn ApplicationGraphRepository>,
        secret_encryptor: Arc<dyn SecretEncryptor>,
    ) -> Self {
        Self {
            repository,
            secret_encryptor,
            migrator: BundleMigrator::default(),
        }
    }

    /// Imports an already decoded bundle.
    ///
    /// The bundle must be at the running versions; older documents go through
    /// [`BundleImportService::import_json`] so they can be migrated first.
    pub async fn import_bundle(
        &self,
        actor: &UserIdentity,
        bundle: &ExportBundle,
        options: ImportOptions,
    ) -> AppResult<ImportReport> {
        let supported = self.migrator.supported();
        if bundle.metadata().compatibility(&supported)? == SchemaCompatibility::RequiresMigration
        {
            return Err(AppError::SchemaIncompatible(format!(
                "bundle versions {}/{} differ from {}/{}; import the JSON document to migrate it",
                bundle.client_schema_version(),
                bundle.server_schema_version(),
                supported.client_schema_version(),
                supported.server_schema_version()
            )));
        }

        bundle.validate()?;
        self.import_validated(actor, bundle, options, None).await
    }

    /// Parses, migrates and imports bundle text.
    pub async fn import_json(
        &self,
        actor: &UserIdentity,
        json: &str,
        options: ImportOptions,
    ) -> AppResult<ImportReport> {
        let migrated = self.migrator.migrate(parse_bundle_document(json)?)?;
        if let Some(source) = migrated.migrated_from {
            info!(
                tenant_id = %actor.tenant_id(),
                client_schema_version = source.client_schema_version(),
                server_schema_version = source.server_schema_version(),
                "bundle migrated to current schema"
            );
        }

        let bundle = bundle_from_value(migrated.document)?;
        self.import_validated(actor, &bundle, options, migrated.migrated_from)
            .await
    }

    async fn import_validated(
        &self,
        actor: &UserIdentity,
        bundle: &ExportBundle,
        options: ImportOptions,
        migrated_from: Option<FormatMetadata>,
    ) -> AppResult<ImportReport> {
        let tenant_id = actor.tenant_id();
        let mut remapper = IdRemapper::new();

        let source_application = bundle.application();
        let application_name = self
            .available_application_name(actor, source_application.name().as_str())
            .await?;
        let application = source_application
            .clone()
            .with_id(remapper.assign(
                RemappedKind::Application,
                source_application.id().as_str(),
            ))?
            .renamed(application_name.as_str())?;

        let existing_datasources = self.repository.list_datasources(tenant_id).await?;
        let mut taken_datasource_names: BTreeSet<String> = existing_datasources
            .iter()
            .map(|datasource| datasource.name().as_str().to_owned())
            .collect();
        let mut datasources = Vec::with_capacity(bundle.datasources().len());
        let mut datasources_created = Vec::new();
        let mut datasources_reused = Vec::new();

        for datasource in bundle.datasources() {
            match place_datasource(datasource, &existing_datasources, &taken_datasource_names) {
                DatasourcePlacement::Reuse(existing) => {
                    remapper.bind(
                        RemappedKind::Datasource,
                        datasource.id().as_str(),
                        existing.id().as_str(),
                    );
                    if !datasources
                        .iter()
                        .any(|placed: &Datasource| placed.id() == existing.id())
                    {
                        datasources_reused.push(existing.name().as_str().to_owned());
                        datasources.push(existing.clone());
                    }
                }
                DatasourcePlacement::Create(name) => {
                    let id = remapper.assign(RemappedKind::Datasource, datasource.id().as_str());
                    let authentication = self.restored_authentication(bundle, datasource)?;
                    taken_datasource_names.insert(name.clone());
                    datasources_created.push(name.clone());
                    datasources.push(
                        datasource
                            .renamed(id, name)?
                            .with_authentication(authentication),
                    );
                }
            }
        }

        let edit_stylesheet = options
            .reset_widget_styles
            .then(|| bundle.edit_mode_theme().map(Theme::stylesheet))
            .flatten();
        let published_stylesheet = options
            .reset_widget_styles
            .then(|| bundle.published_theme().map(Theme::stylesheet))
            .flatten();

        let mut pages = Vec::with_capacity(bundle.pages().len());
        for page in bundle.pages() {
            let page_id = remapper.assign(RemappedKind::Page, page.id().as_str());
            let unpublished = stored_content(
                page.unpublished_page(),
                bundle.unpublished_layout_escaped_widgets(),
                edit_stylesheet,
                &mut remapper,
            )?;
            let published = page
                .published_page()
                .map(|content| {
                    stored_content(
                        content,
                        bundle.published_layout_escaped_widgets(),
                        published_stylesheet,
                        &mut remapper,
                    )
                })
                .transpose()?;
            pages.push(Page::new(page_id, unpublished, published)?);
        }

        for action in bundle.actions() {
            remapper.assign(RemappedKind::Action, action.id().as_str());
        }
        for collection in bundle.action_collections() {
            remapper.assign(RemappedKind::ActionCollection, collection.id().as_str());
        }

        let actions = bundle
            .actions()
            .iter()
            .map(|action| remap_action(bundle, action, &remapper))
            .collect::<AppResult<Vec<_>>>()?;
        let action_collections = bundle
            .action_collections()
            .iter()
            .map(|collection| remap_collection(collection, &remapper))
            .collect::<AppResult<Vec<_>>>()?;

        let page_order = remap_page_ids(bundle.page_order(), &remapper)?;
        let published_page_order = remap_page_ids(bundle.published_page_order(), &remapper)?;
        let default_page_id = resolve_default_page_id(
            bundle.pages(),
            bundle.unpublished_default_page_name(),
            |page| Some(page.unpublished_page()),
            &remapper,
        )?;
        let published_default_page_id = resolve_default_page_id(
            bundle.pages(),
            bundle.published_default_page_name(),
            Page::published_page,
            &remapper,
        )?;

        let edit_mode_theme = bundle
            .edit_mode_theme()
            .map(|theme| theme.with_id(remapper.assign(RemappedKind::Theme, theme.id().as_str())))
            .transpose()?;
        let published_theme = bundle
            .published_theme()
            .map(|theme| theme.with_id(remapper.assign(RemappedKind::Theme, theme.id().as_str())))
            .transpose()?;

        let mut graph = ApplicationGraph {
            application,
            pages,
            page_order,
            published_page_order,
            default_page_id,
            published_default_page_id,
            actions,
            action_collections,
            datasources,
            edit_mode_theme,
            published_theme,
        };

        let mut attempt = 1;
        loop {
            match self
                .repository
                .save_application_graph(tenant_id, graph.clone())
                .await
            {
                Ok(()) => break,
                // Another import may have claimed the name since it was chosen.
                Err(AppError::Conflict(reason)) if attempt < SAVE_ATTEMPTS => {
                    attempt += 1;
                    let name = self
                        .available_application_name(actor, source_application.name().as_str())
                        .await?;
                    debug!(
                        tenant_id = %tenant_id,
                        application_name = %name,
                        reason = %reason,
                        "retrying import under a new application name"
                    );
                    graph.application = graph.application.clone().renamed(name)?;
                }
                Err(error) => return Err(error),
            }
        }

        let report = ImportReport {
            application_id: graph.application.id().as_str().to_owned(),
            application_name: graph.application.name().as_str().to_owned(),
            page_count: graph.pages.len(),
            action_count: graph.actions.len(),
            action_collection_count: graph.action_collections.len(),
            datasources_created,
            datasources_reused,
            migrated_from,
        };

        info!(
            tenant_id = %tenant_id,
            subject = %actor.subject(),
            application_id = %report.application_id,
            application_name = %report.application_name,
            pages = report.page_count,
            actions = report.action_count,
            remapped_ids = remapper.len(),
            "application imported"
        );

        Ok(report)
    }

    async fn available_application_name(
        &self,
        actor: &UserIdentity,
        base: &str,
    ) -> AppResult<String> {
        let taken: BTreeSet<String> = self
            .repository
            .list_application_names(actor.tenant_id())
            .await?
            .into_iter()
            .collect();
        Ok(available_name(base, &taken))
    }

    /// Re-encrypts the bundle credentials of one datasource for the target store.
    fn restored_authentication(
        &self,
        bundle: &ExportBundle,
        datasource: &Datasource,
    ) -> AppResult<Option<Authentication>> {
        let Some(fields) = bundle
            .decrypted_fields()
            .values()
            .find(|fields| fields.datasource_id == datasource.id().as_str())
        else {
            return Ok(datasource.authentication().cloned());
        };

        let encrypt = |cleartext: Option<&String>| {
            cleartext
                .map(|value| self.secret_encryptor.encrypt_secret(value))
                .transpose()
        };

        Ok(Some(Authentication::new(
            fields.auth_type,
            fields.username.clone(),
            encrypt(fields.password.as_ref())?,
            encrypt(fields.bearer_token.as_ref())?,
            encrypt(fields.client_secret.as_ref())?,
        )))
    }
}

/// Remaps layouts of one page state, optionally resets their styling and
/// escapes every widget that is recorded as escaped or holds a restricted key.
fn stored_content(
    content: &PageContent,
    escaped: &LayoutEscapedWidgets,
    stylesheet: Option<&Value>,
    remapper: &mut IdRemapper,
) -> AppResult<PageContent> {
    let mut layouts = Vec::with_capacity(content.layouts().len());

    for layout in content.layouts() {
        let mut dsl = layout.dsl().clone();

        if let Some(stylesheet) = stylesheet {
            let updates = properties_to_reset(layout, stylesheet);
            debug!(
                layout_id = %layout.id(),
                widgets = updates.len(),
                "resetting widget styles to theme"
            );
            apply_property_updates(&mut dsl, &updates);
        }

        let (_, mut widget_names) = escape_restricted_widgets(&dsl);
        if let Some(recorded) = escaped.get(layout.id().as_str()) {
            widget_names.extend(recorded.iter().cloned());
        }
        if !widget_names.is_empty() {
            dsl = escape_layout_dsl(&dsl, &widget_names);
        }

        layouts.push(Layout::new(
            remapper.assign(RemappedKind::Layout, layout.id().as_str()),
            dsl,
        )?);
    }

    Ok(content.with_layouts(layouts))
}

fn remap_action(
    bundle: &ExportBundle,
    action: &Action,
    remapper: &IdRemapper,
) -> AppResult<Action> {
    let invisible_fields = bundle
        .invisible_action_fields()
        .get(action.id().as_str())
        .cloned()
        .unwrap_or_default();

    action.with_invisible_fields(&invisible_fields).remapped(
        remapper.resolve(RemappedKind::Action, action.id().as_str())?,
        remapper.resolve(RemappedKind::Page, action.page_id().as_str())?,
        action
            .datasource_id()
            .map(|id| remapper.resolve(RemappedKind::Datasource, id.as_str()))
            .transpose()?,
        action
            .collection_id()
            .map(|id| remapper.resolve(RemappedKind::ActionCollection, id.as_str()))
            .transpose()?,
    )
}

fn remap_collection(
    collection: &ActionCollection,
    remapper: &IdRemapper,
) -> AppResult<ActionCollection> {
    let action_ids = collection
        .action_ids()
        .iter()
        .map(|id| remapper.resolve(RemappedKind::Action, id.as_str()))
        .collect::<AppResult<Vec<_>>>()?;

    collection.remapped(
        remapper.resolve(RemappedKind::ActionCollection, collection.id().as_str())?,
        remapper.resolve(RemappedKind::Page, collection.page_id().as_str())?,
        action_ids,
    )
}

fn remap_page_ids(page_ids: &[String], remapper: &IdRemapper) -> AppResult<Vec<String>> {
    page_ids
        .iter()
        .map(|page_id| remapper.resolve(RemappedKind::Page, page_id))
        .collect()
}

fn resolve_default_page_id(
    pages: &[Page],
    page_name: Option<&str>,
    content: impl Fn(&Page) -> Option<&PageContent>,
    remapper: &IdRemapper,
) -> AppResult<Option<String>> {
    let Some(page_name) = page_name else {
        return Ok(None);
    };

    let page = pages
        .iter()
        .find(|&page| content(page).is_some_and(|content| content.name().as_str() == page_name))
        .ok_or_else(|| {
            AppError::DanglingReference(format!("default page '{page_name}' does not exist"))
        })?;

    remapper
        .resolve(RemappedKind::Page, page.id().as_str())
        .map(Some)
}
