use std::collections::BTreeMap;
use std::sync::Arc;

use appbundle_core::{AppError, AppResult, UserIdentity};
use appbundle_domain::{
    Action, Datasource, DecryptedSensitiveFields, ExportBundle, FormatMetadata,
    InvisibleActionFields, Layout, LayoutEscapedWidgets, Page, PageContent,
    escaping::unescape_layout_dsl,
};
use tracing::info;

use crate::{ApplicationGraph, ApplicationGraphRepository, SecretEncryptor};

/// Builds portable bundles from the entity store.
#[derive(Clone)]
pub struct BundleExportService {
    repository: Arc<dyn ApplicationGraphRepository>,
    secret_encryptor: Arc<dyn SecretEncryptor>,
    format: FormatMetadata,
}

impl BundleExportService {
    /// Creates an exporter writing the current format versions.
    #[must_use]
    pub fn new(
        repository: Arc<dyn ApplicationGraphRepository>,
        secret_encryptor: Arc<dyn SecretEncryptor>,
    ) -> Self {
        Self {
            repository,
            secret_encryptor,
            format: FormatMetadata::current(),
        }
    }

    /// Exports one application with its pages, actions, datasources and themes.
    pub async fn export_application(
        &self,
        actor: &UserIdentity,
        application_id: &str,
    ) -> AppResult<ExportBundle> {
        let graph = self
            .repository
            .find_application_graph(actor.tenant_id(), application_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "application '{}' does not exist for tenant '{}'",
                    application_id,
                    actor.tenant_id()
                ))
            })?;

        let decrypted_fields = self.decrypt_action_secrets(&graph)?;
        let invisible_action_fields: BTreeMap<String, InvisibleActionFields> = graph
            .actions
            .iter()
            .map(|action| (action.id().as_str().to_owned(), action.invisible_fields()))
            .collect();
        let actions: Vec<Action> = graph
            .actions
            .iter()
            .map(Action::without_invisible_fields)
            .collect();

        let mut unpublished_escaped = LayoutEscapedWidgets::new();
        let mut published_escaped = LayoutEscapedWidgets::new();
        let mut pages = Vec::with_capacity(graph.pages.len());
        for page in &graph.pages {
            let unpublished = portable_content(page.unpublished_page(), &mut unpublished_escaped)?;
            let published = page
                .published_page()
                .map(|content| portable_content(content, &mut published_escaped))
                .transpose()?;
            pages.push(page.with_contents(unpublished, published));
        }

        let unpublished_default_page_name = default_page_name(
            &graph.pages,
            graph.default_page_id.as_deref(),
            |page| Some(page.unpublished_page()),
        )?;
        let published_default_page_name = default_page_name(
            &graph.pages,
            graph.published_default_page_id.as_deref(),
            Page::published_page,
        )?;

        let datasources: Vec<Datasource> = graph
            .datasources
            .iter()
            .map(Datasource::without_secrets)
            .collect();

        let bundle = ExportBundle::builder(graph.application.clone())
            .format_metadata(self.format)
            .datasources(datasources)
            .pages(pages)
            .page_order(graph.page_order.clone())
            .published_page_order(graph.published_page_order.clone())
            .unpublished_default_page_name(unpublished_default_page_name)
            .published_default_page_name(published_default_page_name)
            .actions(actions)
            .action_collections(graph.action_collections.clone())
            .decrypted_fields(decrypted_fields)
            .invisible_action_fields(invisible_action_fields)
            .edit_mode_theme(graph.edit_mode_theme.clone())
            .published_theme(graph.published_theme.clone())
            .unpublished_layout_escaped_widgets(unpublished_escaped)
            .published_layout_escaped_widgets(published_escaped)
            .build()?;

        info!(
            tenant_id = %actor.tenant_id(),
            subject = %actor.subject(),
            application_id = %application_id,
            pages = bundle.pages().len(),
            actions = bundle.actions().len(),
            datasources = bundle.datasources().len(),
            "application exported"
        );

        Ok(bundle)
    }

    /// Decrypts credentials of every datasource-backed action, keyed by action.
    fn decrypt_action_secrets(
        &self,
        graph: &ApplicationGraph,
    ) -> AppResult<BTreeMap<String, DecryptedSensitiveFields>> {
        let mut decrypted = BTreeMap::new();

        for action in &graph.actions {
            let Some(datasource_id) = action.datasource_id() else {
                continue;
            };
            let Some(datasource) = graph
                .datasources
                .iter()
                .find(|datasource| datasource.id() == datasource_id)
            else {
                continue;
            };
            let Some(authentication) = datasource
                .authentication()
                .filter(|authentication| authentication.has_secrets())
            else {
                continue;
            };

            let decrypt = |stored: Option<&str>| {
                stored
                    .map(|value| self.secret_encryptor.decrypt_secret(value))
                    .transpose()
            };

            decrypted.insert(
                action.id().as_str().to_owned(),
                DecryptedSensitiveFields {
                    datasource_id: datasource_id.as_str().to_owned(),
                    auth_type: authentication.auth_type(),
                    username: authentication.username().map(str::to_owned),
                    password: decrypt(authentication.password())?,
                    bearer_token: decrypt(authentication.bearer_token())?,
                    client_secret: decrypt(authentication.client_secret())?,
                },
            );
        }

        Ok(decrypted)
    }
}

/// Unescapes every layout of one page state and records escaped widgets.
fn portable_content(
    content: &PageContent,
    escaped: &mut LayoutEscapedWidgets,
) -> AppResult<PageContent> {
    let mut layouts = Vec::with_capacity(content.layouts().len());
    for layout in content.layouts() {
        let (dsl, widget_names) = unescape_layout_dsl(layout.dsl());
        if !widget_names.is_empty() {
            escaped.insert(layout.id().as_str().to_owned(), widget_names);
        }
        layouts.push(Layout::new(layout.id().as_str(), dsl)?);
    }
    Ok(content.with_layouts(layouts))
}

fn default_page_name(
    pages: &[Page],
    page_id: Option<&str>,
    content: impl Fn(&Page) -> Option<&PageContent>,
) -> AppResult<Option<String>> {
    let Some(page_id) = page_id else {
        return Ok(None);
    };

    pages
        .iter()
        .find(|page| page.id().as_str() == page_id)
        .and_then(content)
        .map(|content| Some(content.name().as_str().to_owned()))
        .ok_or_else(|| {
            AppError::DanglingReference(format!(
                "default page '{page_id}' is missing from the exported pages"
            ))
        })
}

#[cfg(test)]
mod tests;
