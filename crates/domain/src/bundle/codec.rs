use appbundle_core::{AppError, AppResult};
use serde_json::Value;

use super::{BundlePayload, ExportBundle, FormatMetadata};

const CLIENT_SCHEMA_VERSION_KEY: &str = "clientSchemaVersion";
const SERVER_SCHEMA_VERSION_KEY: &str = "serverSchemaVersion";
const APPLICATION_KEY: &str = "application";

/// Serializes a bundle into pretty-printed JSON.
pub fn bundle_to_json(bundle: &ExportBundle) -> AppResult<String> {
    serde_json::to_string_pretty(bundle)
        .map_err(|error| AppError::Internal(format!("failed to serialize bundle: {error}")))
}

/// Serializes a bundle into a JSON document tree.
pub fn bundle_to_value(bundle: &ExportBundle) -> AppResult<Value> {
    serde_json::to_value(bundle)
        .map_err(|error| AppError::Internal(format!("failed to serialize bundle: {error}")))
}

/// Parses bundle text into a JSON document without interpreting its fields.
pub fn parse_bundle_document(json: &str) -> AppResult<Value> {
    let document: Value = serde_json::from_str(json)
        .map_err(|error| AppError::Validation(format!("bundle is not valid JSON: {error}")))?;

    if !document.is_object() {
        return Err(AppError::Validation(
            "bundle document must be a JSON object".to_owned(),
        ));
    }

    Ok(document)
}

/// Reads only the format versions of a bundle document.
pub fn read_format_metadata(document: &Value) -> AppResult<FormatMetadata> {
    Ok(FormatMetadata::new(
        read_version(document, CLIENT_SCHEMA_VERSION_KEY)?,
        read_version(document, SERVER_SCHEMA_VERSION_KEY)?,
    ))
}

/// Interprets a bundle document and validates its references.
///
/// The document must already be at the running schema version.
pub fn bundle_from_value(document: Value) -> AppResult<ExportBundle> {
    let metadata = read_format_metadata(&document)?;

    if document.get(APPLICATION_KEY).is_none_or(Value::is_null) {
        return Err(AppError::MissingRequiredField(APPLICATION_KEY.to_owned()));
    }

    let payload: BundlePayload = serde_json::from_value(document)
        .map_err(|error| AppError::Validation(format!("malformed bundle payload: {error}")))?;

    ExportBundle::from_parts(metadata, payload)
}

/// Parses and validates bundle text.
pub fn bundle_from_json(json: &str) -> AppResult<ExportBundle> {
    bundle_from_value(parse_bundle_document(json)?)
}

fn read_version(document: &Value, key: &str) -> AppResult<u32> {
    let value = document
        .get(key)
        .filter(|value| !value.is_null())
        .ok_or_else(|| AppError::MissingRequiredField(key.to_owned()))?;

    value
        .as_u64()
        .and_then(|version| u32::try_from(version).ok())
        .ok_or_else(|| {
            AppError::Validation(format!(
                "{key} must be a non-negative integer, got {value}"
            ))
        })
}
