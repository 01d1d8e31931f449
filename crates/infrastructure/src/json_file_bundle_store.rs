use std::path::Path;

use appbundle_core::{AppError, AppResult};
use appbundle_domain::{ExportBundle, bundle_to_json};
use tracing::info;

/// Reads and writes bundle documents on the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonFileBundleStore;

impl JsonFileBundleStore {
    /// Creates a file store.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Writes a bundle as pretty-printed JSON, replacing any existing file.
    pub async fn write(&self, path: &Path, bundle: &ExportBundle) -> AppResult<()> {
        let json = bundle_to_json(bundle)?;
        tokio::fs::write(path, json.as_bytes())
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to write bundle '{}': {error}",
                    path.display()
                ))
            })?;

        info!(path = %path.display(), bytes = json.len(), "bundle written");
        Ok(())
    }

    /// Reads bundle text without interpreting it.
    ///
    /// Decoding and migration stay with the caller so that older documents can
    /// be upgraded before their payload is read.
    pub async fn read(&self, path: &Path) -> AppResult<String> {
        tokio::fs::read_to_string(path).await.map_err(|error| match error.kind() {
            std::io::ErrorKind::NotFound => {
                AppError::NotFound(format!("bundle file '{}' does not exist", path.display()))
            }
            _ => AppError::Internal(format!(
                "failed to read bundle '{}': {error}",
                path.display()
            )),
        })
    }
}

#[cfg(test)]
mod tests {
    use appbundle_core::{AppError, AppResult};
    use appbundle_domain::{Application, ExportBundle, FormatMetadata, bundle_from_json};

    use super::JsonFileBundleStore;

    #[tokio::test]
    async fn written_bundles_read_back() -> AppResult<()> {
        let path = std::env::temp_dir().join(format!("bundle-{}.json", uuid::Uuid::new_v4()));
        let bundle = ExportBundle::builder(Application::new("app-1", "Orders")?)
            .format_metadata(FormatMetadata::current())
            .build()?;
        let store = JsonFileBundleStore::new();

        store.write(&path, &bundle).await?;
        let json = store.read(&path).await?;
        let _ = tokio::fs::remove_file(&path).await;

        assert_eq!(bundle_from_json(&json)?, bundle);
        Ok(())
    }

    #[tokio::test]
    async fn missing_files_are_not_found() {
        let path = std::env::temp_dir().join(format!("missing-{}.json", uuid::Uuid::new_v4()));

        let result = JsonFileBundleStore::new().read(&path).await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
    }
}
