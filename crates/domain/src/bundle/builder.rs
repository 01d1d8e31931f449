use std::collections::BTreeMap;

use appbundle_core::{AppError, AppResult};

use super::{BundlePayload, ExportBundle, FormatMetadata, LayoutEscapedWidgets};
use crate::{
    Action, ActionCollection, Application, Datasource, DecryptedSensitiveFields,
    InvisibleActionFields, Page, Theme,
};

/// Collects bundle fields and produces a validated [`ExportBundle`].
#[derive(Debug, Clone)]
pub struct ExportBundleBuilder {
    client_schema_version: Option<u32>,
    server_schema_version: Option<u32>,
    payload: BundlePayload,
}

impl ExportBundleBuilder {
    pub(super) fn new(application: Application) -> Self {
        Self {
            client_schema_version: None,
            server_schema_version: None,
            payload: BundlePayload::empty(application),
        }
    }

    /// Sets both format versions.
    #[must_use]
    pub fn format_metadata(mut self, metadata: FormatMetadata) -> Self {
        self.client_schema_version = Some(metadata.client_schema_version());
        self.server_schema_version = Some(metadata.server_schema_version());
        self
    }

    /// Sets the client schema version.
    #[must_use]
    pub fn client_schema_version(mut self, version: u32) -> Self {
        self.client_schema_version = Some(version);
        self
    }

    /// Sets the server schema version.
    #[must_use]
    pub fn server_schema_version(mut self, version: u32) -> Self {
        self.server_schema_version = Some(version);
        self
    }

    /// Sets datasources.
    #[must_use]
    pub fn datasources(mut self, datasources: Vec<Datasource>) -> Self {
        self.payload.datasources = datasources;
        self
    }

    /// Sets pages.
    #[must_use]
    pub fn pages(mut self, pages: Vec<Page>) -> Self {
        self.payload.pages = pages;
        self
    }

    /// Sets editable page order.
    #[must_use]
    pub fn page_order(mut self, page_ids: Vec<String>) -> Self {
        self.payload.page_order = page_ids;
        self
    }

    /// Sets published page order.
    #[must_use]
    pub fn published_page_order(mut self, page_ids: Vec<String>) -> Self {
        self.payload.published_page_order = page_ids;
        self
    }

    /// Sets the published landing page name.
    #[must_use]
    pub fn published_default_page_name(mut self, name: Option<String>) -> Self {
        self.payload.published_default_page_name = name;
        self
    }

    /// Sets the editable landing page name.
    #[must_use]
    pub fn unpublished_default_page_name(mut self, name: Option<String>) -> Self {
        self.payload.unpublished_default_page_name = name;
        self
    }

    /// Sets actions.
    #[must_use]
    pub fn actions(mut self, actions: Vec<Action>) -> Self {
        self.payload.actions = actions;
        self
    }

    /// Sets action collections.
    #[must_use]
    pub fn action_collections(mut self, action_collections: Vec<ActionCollection>) -> Self {
        self.payload.action_collections = action_collections;
        self
    }

    /// Sets cleartext credentials keyed by action identifier.
    #[must_use]
    pub fn decrypted_fields(
        mut self,
        decrypted_fields: BTreeMap<String, DecryptedSensitiveFields>,
    ) -> Self {
        self.payload.decrypted_fields = decrypted_fields;
        self
    }

    /// Sets hidden action fields keyed by action identifier.
    #[must_use]
    pub fn invisible_action_fields(
        mut self,
        invisible_action_fields: BTreeMap<String, InvisibleActionFields>,
    ) -> Self {
        self.payload.invisible_action_fields = invisible_action_fields;
        self
    }

    /// Sets the edit-mode theme.
    #[must_use]
    pub fn edit_mode_theme(mut self, theme: Option<Theme>) -> Self {
        self.payload.edit_mode_theme = theme;
        self
    }

    /// Sets the published theme.
    #[must_use]
    pub fn published_theme(mut self, theme: Option<Theme>) -> Self {
        self.payload.published_theme = theme;
        self
    }

    /// Sets escaped widgets of published layouts.
    #[must_use]
    pub fn published_layout_escaped_widgets(mut self, widgets: LayoutEscapedWidgets) -> Self {
        self.payload.published_layout_escaped_widgets = widgets;
        self
    }

    /// Sets escaped widgets of editable layouts.
    #[must_use]
    pub fn unpublished_layout_escaped_widgets(mut self, widgets: LayoutEscapedWidgets) -> Self {
        self.payload.unpublished_layout_escaped_widgets = widgets;
        self
    }

    /// Builds the bundle.
    ///
    /// Fails when a format version is unset or any reference does not resolve.
    pub fn build(self) -> AppResult<ExportBundle> {
        let client_schema_version = self.client_schema_version.ok_or_else(|| {
            AppError::MissingRequiredField("clientSchemaVersion".to_owned())
        })?;
        let server_schema_version = self.server_schema_version.ok_or_else(|| {
            AppError::MissingRequiredField("serverSchemaVersion".to_owned())
        })?;

        ExportBundle::from_parts(
            FormatMetadata::new(client_schema_version, server_schema_version),
            self.payload,
        )
    }
}
