//! Exported application bundle and the entities it carries.

#![forbid(unsafe_code)]

mod action;
mod application;
mod bundle;
mod datasource;
pub mod escaping;
mod page;
mod theme;

pub use action::{
    Action, ActionCollection, ActionContent, InvisibleActionFields, JsVariable, PluginType,
};
pub use application::{Application, slugify};
pub use bundle::{
    BundleIssue, BundlePayload, CURRENT_CLIENT_SCHEMA_VERSION, CURRENT_SERVER_SCHEMA_VERSION,
    ExportBundle, ExportBundleBuilder, FormatMetadata, LayoutEscapedWidgets, SchemaCompatibility,
    bundle_from_json, bundle_from_value, bundle_to_json, bundle_to_value, parse_bundle_document,
    read_format_metadata,
};
pub use datasource::{
    AuthType, Authentication, Datasource, DatasourceConfiguration, DecryptedSensitiveFields,
};
pub use page::{
    Layout, Page, PageContent, WIDGET_CHILDREN_KEY, WIDGET_ID_KEY, WIDGET_NAME_KEY,
    WIDGET_TYPE_KEY, WidgetRef,
};
pub use theme::{
    PropertyPath, Theme, WidgetPropertyUpdate, apply_property_updates, properties_to_reset,
};
