use appbundle_core::{AppError, AppResult};
use appbundle_domain::{FormatMetadata, SchemaCompatibility, read_format_metadata};
use serde_json::{Map, Value};
use tracing::debug;

const LEGACY_ESCAPED_WIDGET_KEYS: [(&str, &str); 2] = [
    (
        "publishedLayoutmongoEscapedWidgets",
        "publishedLayoutEscapedWidgets",
    ),
    (
        "unpublishedLayoutmongoEscapedWidgets",
        "unpublishedLayoutEscapedWidgets",
    ),
];

/// Bundle document brought to the running schema versions.
#[derive(Debug, Clone, PartialEq)]
pub struct MigratedDocument {
    /// Document stamped with the running versions.
    pub document: Value,
    /// Versions the document declared before migration, when it was older.
    pub migrated_from: Option<FormatMetadata>,
}

/// Upgrades bundle documents written by older versions of the format.
///
/// Migration operates on the raw document so that renamed or reshaped fields
/// are fixed before the payload is interpreted.
#[derive(Debug, Clone, Copy)]
pub struct BundleMigrator {
    supported: FormatMetadata,
}

impl Default for BundleMigrator {
    fn default() -> Self {
        Self::new(FormatMetadata::current())
    }
}

impl BundleMigrator {
    /// Creates a migrator targeting the given versions.
    #[must_use]
    pub fn new(supported: FormatMetadata) -> Self {
        Self { supported }
    }

    /// Returns the versions produced by this migrator.
    #[must_use]
    pub fn supported(&self) -> FormatMetadata {
        self.supported
    }

    /// Gates the document on its versions and applies every pending step.
    ///
    /// Documents newer than the supported versions, or declaring a server
    /// version below 1, are refused with [`AppError::SchemaIncompatible`].
    pub fn migrate(&self, document: Value) -> AppResult<MigratedDocument> {
        let declared = read_format_metadata(&document)?;

        match declared.compatibility(&self.supported)? {
            SchemaCompatibility::Current => Ok(MigratedDocument {
                document,
                migrated_from: None,
            }),
            SchemaCompatibility::RequiresMigration => {
                if declared.server_schema_version() == 0 {
                    return Err(AppError::SchemaIncompatible(
                        "server schema version 0 predates the bundle format".to_owned(),
                    ));
                }

                let Value::Object(mut fields) = document else {
                    return Err(AppError::Validation(
                        "bundle document must be a JSON object".to_owned(),
                    ));
                };

                let mut version = declared.server_schema_version();
                while version < self.supported.server_schema_version() {
                    apply_step(version, &mut fields);
                    debug!(from = version, to = version + 1, "bundle schema step applied");
                    version += 1;
                }

                fields.insert(
                    "clientSchemaVersion".to_owned(),
                    Value::from(self.supported.client_schema_version()),
                );
                fields.insert(
                    "serverSchemaVersion".to_owned(),
                    Value::from(self.supported.server_schema_version()),
                );

                Ok(MigratedDocument {
                    document: Value::Object(fields),
                    migrated_from: Some(declared),
                })
            }
        }
    }
}

fn apply_step(from_version: u32, fields: &mut Map<String, Value>) {
    match from_version {
        1 => rename_legacy_escaped_widget_keys(fields),
        2 => backfill_published_page_order(fields),
        _ => {}
    }
}

fn rename_legacy_escaped_widget_keys(fields: &mut Map<String, Value>) {
    for (legacy, current) in LEGACY_ESCAPED_WIDGET_KEYS {
        if let Some(value) = fields.remove(legacy)
            && !fields.contains_key(current)
        {
            fields.insert(current.to_owned(), value);
        }
    }
}

fn backfill_published_page_order(fields: &mut Map<String, Value>) {
    let published_missing = fields
        .get("publishedPageOrder")
        .is_none_or(|order| order.is_null() || order.as_array().is_some_and(Vec::is_empty));
    if !published_missing {
        return;
    }

    if let Some(page_order) = fields.get("pageOrder").cloned() {
        fields.insert("publishedPageOrder".to_owned(), page_order);
    }
}

#[cfg(test)]
mod tests {
    use appbundle_core::{AppError, AppResult};
    use appbundle_domain::FormatMetadata;
    use serde_json::json;

    use super::BundleMigrator;

    #[test]
    fn current_documents_pass_through_untouched() -> AppResult<()> {
        let document = json!({
            "clientSchemaVersion": 1,
            "serverSchemaVersion": 3,
            "publishedLayoutmongoEscapedWidgets": {}
        });

        let migrated = BundleMigrator::default().migrate(document.clone())?;

        assert_eq!(migrated.document, document);
        assert_eq!(migrated.migrated_from, None);
        Ok(())
    }

    #[test]
    fn version_one_documents_receive_every_step() -> AppResult<()> {
        let document = json!({
            "clientSchemaVersion": 1,
            "serverSchemaVersion": 1,
            "pageOrder": ["p1", "p2"],
            "unpublishedLayoutmongoEscapedWidgets": { "l1": ["Table1"] }
        });

        let migrated = BundleMigrator::default().migrate(document)?;

        assert_eq!(migrated.migrated_from, Some(FormatMetadata::new(1, 1)));
        assert_eq!(migrated.document["serverSchemaVersion"], json!(3));
        assert_eq!(
            migrated.document["unpublishedLayoutEscapedWidgets"],
            json!({ "l1": ["Table1"] })
        );
        assert!(
            migrated
                .document
                .get("unpublishedLayoutmongoEscapedWidgets")
                .is_none()
        );
        assert_eq!(migrated.document["publishedPageOrder"], json!(["p1", "p2"]));
        Ok(())
    }

    #[test]
    fn existing_published_order_is_kept() -> AppResult<()> {
        let document = json!({
            "clientSchemaVersion": 1,
            "serverSchemaVersion": 2,
            "pageOrder": ["p1", "p2"],
            "publishedPageOrder": ["p2"]
        });

        let migrated = BundleMigrator::default().migrate(document)?;

        assert_eq!(migrated.document["publishedPageOrder"], json!(["p2"]));
        Ok(())
    }

    #[test]
    fn newer_documents_are_refused() {
        let document = json!({ "clientSchemaVersion": 1, "serverSchemaVersion": 4 });

        let result = BundleMigrator::default().migrate(document);

        assert!(matches!(result, Err(AppError::SchemaIncompatible(_))));
    }

    #[test]
    fn server_version_zero_is_refused() {
        let document = json!({ "clientSchemaVersion": 1, "serverSchemaVersion": 0 });

        let result = BundleMigrator::default().migrate(document);

        assert!(matches!(result, Err(AppError::SchemaIncompatible(_))));
    }
}
