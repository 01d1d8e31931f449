use std::collections::BTreeMap;

use appbundle_core::{AppResult, NonEmptyString};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Authentication scheme of a datasource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AuthType {
    /// Database username and password.
    DbAuth,
    /// HTTP basic authentication.
    Basic,
    /// Static bearer token.
    BearerToken,
    /// OAuth2 client credentials.
    #[serde(rename = "oAuth2")]
    OAuth2,
}

/// Datasource credentials.
///
/// Secret slots hold base64 ciphertext in the entity store and are always
/// empty inside an export bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Authentication {
    auth_type: AuthType,
    username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    bearer_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    client_secret: Option<String>,
}

impl Authentication {
    /// Creates credentials with encrypted secret slots.
    #[must_use]
    pub fn new(
        auth_type: AuthType,
        username: Option<String>,
        password: Option<String>,
        bearer_token: Option<String>,
        client_secret: Option<String>,
    ) -> Self {
        Self {
            auth_type,
            username,
            password,
            bearer_token,
            client_secret,
        }
    }

    /// Returns the authentication scheme.
    #[must_use]
    pub fn auth_type(&self) -> AuthType {
        self.auth_type
    }

    /// Returns the username.
    #[must_use]
    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    /// Returns the encrypted password.
    #[must_use]
    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    /// Returns the encrypted bearer token.
    #[must_use]
    pub fn bearer_token(&self) -> Option<&str> {
        self.bearer_token.as_deref()
    }

    /// Returns the encrypted OAuth2 client secret.
    #[must_use]
    pub fn client_secret(&self) -> Option<&str> {
        self.client_secret.as_deref()
    }

    /// Returns whether any secret slot is populated.
    #[must_use]
    pub fn has_secrets(&self) -> bool {
        self.password.is_some() || self.bearer_token.is_some() || self.client_secret.is_some()
    }

    /// Returns a copy with every secret slot cleared.
    #[must_use]
    pub fn without_secrets(&self) -> Self {
        Self::new(self.auth_type, self.username.clone(), None, None, None)
    }
}

/// Connection settings of a datasource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasourceConfiguration {
    /// Endpoint or connection URL.
    pub url: Option<String>,
    /// Plugin-specific settings.
    #[serde(default)]
    pub properties: BTreeMap<String, Value>,
    /// Optional credentials.
    pub authentication: Option<Authentication>,
}

/// External system an action reads from or writes to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Datasource {
    id: NonEmptyString,
    name: NonEmptyString,
    plugin_id: NonEmptyString,
    configuration: DatasourceConfiguration,
}

impl Datasource {
    /// Creates a validated datasource.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        plugin_id: impl Into<String>,
        configuration: DatasourceConfiguration,
    ) -> AppResult<Self> {
        Ok(Self {
            id: NonEmptyString::new(id)?,
            name: NonEmptyString::new(name)?,
            plugin_id: NonEmptyString::new(plugin_id)?,
            configuration,
        })
    }

    /// Returns datasource identifier.
    #[must_use]
    pub fn id(&self) -> &NonEmptyString {
        &self.id
    }

    /// Returns datasource name.
    #[must_use]
    pub fn name(&self) -> &NonEmptyString {
        &self.name
    }

    /// Returns plugin identifier.
    #[must_use]
    pub fn plugin_id(&self) -> &NonEmptyString {
        &self.plugin_id
    }

    /// Returns connection settings.
    #[must_use]
    pub fn configuration(&self) -> &DatasourceConfiguration {
        &self.configuration
    }

    /// Returns credentials when configured.
    #[must_use]
    pub fn authentication(&self) -> Option<&Authentication> {
        self.configuration.authentication.as_ref()
    }

    /// Returns a copy safe to place in a bundle.
    #[must_use]
    pub fn without_secrets(&self) -> Self {
        let mut datasource = self.clone();
        datasource.configuration.authentication = self
            .configuration
            .authentication
            .as_ref()
            .map(Authentication::without_secrets);
        datasource
    }

    /// Returns a copy with credentials replaced.
    #[must_use]
    pub fn with_authentication(&self, authentication: Option<Authentication>) -> Self {
        let mut datasource = self.clone();
        datasource.configuration.authentication = authentication;
        datasource
    }

    /// Returns a copy with a new identifier and name.
    pub fn renamed(&self, id: impl Into<String>, name: impl Into<String>) -> AppResult<Self> {
        Self::new(id, name, self.plugin_id.as_str(), self.configuration.clone())
    }
}

/// Cleartext credentials carried inside a bundle for one action's datasource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecryptedSensitiveFields {
    /// Datasource the credentials belong to.
    pub datasource_id: String,
    /// Authentication scheme.
    pub auth_type: AuthType,
    /// Username, when the scheme has one.
    pub username: Option<String>,
    /// Cleartext password.
    pub password: Option<String>,
    /// Cleartext bearer token.
    pub bearer_token: Option<String>,
    /// Cleartext OAuth2 client secret.
    pub client_secret: Option<String>,
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use appbundle_core::AppResult;

    use super::{AuthType, Authentication, Datasource, DatasourceConfiguration};

    #[test]
    fn secrets_are_cleared_for_bundles() -> AppResult<()> {
        let datasource = Datasource::new(
            "d1",
            "Orders DB",
            "postgres-plugin",
            DatasourceConfiguration {
                url: Some("postgres://db.internal/orders".to_owned()),
                properties: BTreeMap::new(),
                authentication: Some(Authentication::new(
                    AuthType::DbAuth,
                    Some("reporter".to_owned()),
                    Some("c2VjcmV0".to_owned()),
                    None,
                    None,
                )),
            },
        )?;

        let stripped = datasource.without_secrets();
        let authentication = stripped.authentication();
        assert_eq!(
            authentication.and_then(Authentication::username),
            Some("reporter")
        );
        assert!(!authentication.is_some_and(Authentication::has_secrets));
        Ok(())
    }
}
