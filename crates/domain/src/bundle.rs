use std::collections::{BTreeMap, BTreeSet};

use appbundle_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

use crate::{
    Action, ActionCollection, Application, Datasource, DecryptedSensitiveFields,
    InvisibleActionFields, Page, Theme,
};

mod builder;
mod codec;
mod validation;

pub use builder::ExportBundleBuilder;
pub use codec::{
    bundle_from_json, bundle_from_value, bundle_to_json, bundle_to_value, parse_bundle_document,
    read_format_metadata,
};
pub use validation::BundleIssue;

/// Client schema version written by this build.
pub const CURRENT_CLIENT_SCHEMA_VERSION: u32 = 1;

/// Server schema version written by this build.
pub const CURRENT_SERVER_SCHEMA_VERSION: u32 = 3;

/// Map from layout identifier to the names of widgets whose keys were escaped.
pub type LayoutEscapedWidgets = BTreeMap<String, BTreeSet<String>>;

/// Format versions describing the bundle document itself.
///
/// These never belong to the persisted application state; importers read them
/// before interpreting anything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormatMetadata {
    client_schema_version: u32,
    server_schema_version: u32,
}

/// Outcome of comparing bundle versions with the running system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaCompatibility {
    /// Versions match; the payload can be read as is.
    Current,
    /// Bundle is older; it must be migrated before import.
    RequiresMigration,
}

impl FormatMetadata {
    /// Creates format metadata.
    #[must_use]
    pub fn new(client_schema_version: u32, server_schema_version: u32) -> Self {
        Self {
            client_schema_version,
            server_schema_version,
        }
    }

    /// Returns the versions this build writes.
    #[must_use]
    pub fn current() -> Self {
        Self::new(CURRENT_CLIENT_SCHEMA_VERSION, CURRENT_SERVER_SCHEMA_VERSION)
    }

    /// Returns the client schema version.
    #[must_use]
    pub fn client_schema_version(&self) -> u32 {
        self.client_schema_version
    }

    /// Returns the server schema version.
    #[must_use]
    pub fn server_schema_version(&self) -> u32 {
        self.server_schema_version
    }

    /// Compares these bundle versions with the versions a system supports.
    ///
    /// Bundles newer than `supported` in either version are rejected.
    pub fn compatibility(&self, supported: &FormatMetadata) -> AppResult<SchemaCompatibility> {
        if self.server_schema_version > supported.server_schema_version {
            return Err(AppError::SchemaIncompatible(format!(
                "bundle server schema version {} is newer than supported version {}",
                self.server_schema_version, supported.server_schema_version
            )));
        }

        if self.client_schema_version > supported.client_schema_version {
            return Err(AppError::SchemaIncompatible(format!(
                "bundle client schema version {} is newer than supported version {}",
                self.client_schema_version, supported.client_schema_version
            )));
        }

        if self == supported {
            Ok(SchemaCompatibility::Current)
        } else {
            Ok(SchemaCompatibility::RequiresMigration)
        }
    }
}

/// Domain content of a bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundlePayload {
    pub(crate) application: Application,
    #[serde(default)]
    pub(crate) datasources: Vec<Datasource>,
    #[serde(default)]
    pub(crate) pages: Vec<Page>,
    #[serde(default)]
    pub(crate) page_order: Vec<String>,
    #[serde(default)]
    pub(crate) published_page_order: Vec<String>,
    #[serde(default)]
    pub(crate) published_default_page_name: Option<String>,
    #[serde(default)]
    pub(crate) unpublished_default_page_name: Option<String>,
    #[serde(default)]
    pub(crate) actions: Vec<Action>,
    #[serde(default)]
    pub(crate) action_collections: Vec<ActionCollection>,
    #[serde(default)]
    pub(crate) decrypted_fields: BTreeMap<String, DecryptedSensitiveFields>,
    #[serde(default)]
    pub(crate) invisible_action_fields: BTreeMap<String, InvisibleActionFields>,
    #[serde(default)]
    pub(crate) edit_mode_theme: Option<Theme>,
    #[serde(default)]
    pub(crate) published_theme: Option<Theme>,
    #[serde(default)]
    pub(crate) published_layout_escaped_widgets: LayoutEscapedWidgets,
    #[serde(default)]
    pub(crate) unpublished_layout_escaped_widgets: LayoutEscapedWidgets,
}

impl BundlePayload {
    fn empty(application: Application) -> Self {
        Self {
            application,
            datasources: Vec::new(),
            pages: Vec::new(),
            page_order: Vec::new(),
            published_page_order: Vec::new(),
            published_default_page_name: None,
            unpublished_default_page_name: None,
            actions: Vec::new(),
            action_collections: Vec::new(),
            decrypted_fields: BTreeMap::new(),
            invisible_action_fields: BTreeMap::new(),
            edit_mode_theme: None,
            published_theme: None,
            published_layout_escaped_widgets: BTreeMap::new(),
            unpublished_layout_escaped_widgets: BTreeMap::new(),
        }
    }
}

/// Portable snapshot of one application and everything it depends on.
///
/// A bundle is immutable once built and is closed over its own identifiers:
/// every reference resolves inside the same bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportBundle {
    #[serde(flatten)]
    metadata: FormatMetadata,
    #[serde(flatten)]
    payload: BundlePayload,
}

impl ExportBundle {
    /// Starts a bundle for `application`.
    #[must_use]
    pub fn builder(application: Application) -> ExportBundleBuilder {
        ExportBundleBuilder::new(application)
    }

    /// Assembles a bundle from its two halves, validating references.
    pub fn from_parts(metadata: FormatMetadata, payload: BundlePayload) -> AppResult<Self> {
        let bundle = Self { metadata, payload };
        bundle.validate()?;
        Ok(bundle)
    }

    /// Splits the bundle into format metadata and domain payload.
    #[must_use]
    pub fn into_parts(self) -> (FormatMetadata, BundlePayload) {
        (self.metadata, self.payload)
    }

    /// Returns format metadata.
    #[must_use]
    pub fn metadata(&self) -> &FormatMetadata {
        &self.metadata
    }

    /// Returns domain payload.
    #[must_use]
    pub fn payload(&self) -> &BundlePayload {
        &self.payload
    }

    /// Returns the client schema version.
    #[must_use]
    pub fn client_schema_version(&self) -> u32 {
        self.metadata.client_schema_version
    }

    /// Returns the server schema version.
    #[must_use]
    pub fn server_schema_version(&self) -> u32 {
        self.metadata.server_schema_version
    }

    /// Returns the root application.
    #[must_use]
    pub fn application(&self) -> &Application {
        &self.payload.application
    }

    /// Returns datasources used by actions.
    #[must_use]
    pub fn datasources(&self) -> &[Datasource] {
        &self.payload.datasources
    }

    /// Returns pages in natural order.
    #[must_use]
    pub fn pages(&self) -> &[Page] {
        &self.payload.pages
    }

    /// Returns editable page display order.
    #[must_use]
    pub fn page_order(&self) -> &[String] {
        &self.payload.page_order
    }

    /// Returns published page display order.
    #[must_use]
    pub fn published_page_order(&self) -> &[String] {
        &self.payload.published_page_order
    }

    /// Returns the published landing page name.
    #[must_use]
    pub fn published_default_page_name(&self) -> Option<&str> {
        self.payload.published_default_page_name.as_deref()
    }

    /// Returns the editable landing page name.
    #[must_use]
    pub fn unpublished_default_page_name(&self) -> Option<&str> {
        self.payload.unpublished_default_page_name.as_deref()
    }

    /// Returns actions.
    #[must_use]
    pub fn actions(&self) -> &[Action] {
        &self.payload.actions
    }

    /// Returns action collections.
    #[must_use]
    pub fn action_collections(&self) -> &[ActionCollection] {
        &self.payload.action_collections
    }

    /// Returns cleartext credentials keyed by action identifier.
    #[must_use]
    pub fn decrypted_fields(&self) -> &BTreeMap<String, DecryptedSensitiveFields> {
        &self.payload.decrypted_fields
    }

    /// Returns hidden action fields keyed by action identifier.
    #[must_use]
    pub fn invisible_action_fields(&self) -> &BTreeMap<String, InvisibleActionFields> {
        &self.payload.invisible_action_fields
    }

    /// Returns the edit-mode theme.
    #[must_use]
    pub fn edit_mode_theme(&self) -> Option<&Theme> {
        self.payload.edit_mode_theme.as_ref()
    }

    /// Returns the published theme.
    #[must_use]
    pub fn published_theme(&self) -> Option<&Theme> {
        self.payload.published_theme.as_ref()
    }

    /// Returns escaped widget names of published layouts.
    #[must_use]
    pub fn published_layout_escaped_widgets(&self) -> &LayoutEscapedWidgets {
        &self.payload.published_layout_escaped_widgets
    }

    /// Returns escaped widget names of editable layouts.
    #[must_use]
    pub fn unpublished_layout_escaped_widgets(&self) -> &LayoutEscapedWidgets {
        &self.payload.unpublished_layout_escaped_widgets
    }

    /// Finds an action by identifier.
    #[must_use]
    pub fn action(&self, action_id: &str) -> Option<&Action> {
        self.payload
            .actions
            .iter()
            .find(|action| action.id().as_str() == action_id)
    }

    /// Finds a datasource by identifier.
    #[must_use]
    pub fn datasource(&self, datasource_id: &str) -> Option<&Datasource> {
        self.payload
            .datasources
            .iter()
            .find(|datasource| datasource.id().as_str() == datasource_id)
    }
}
