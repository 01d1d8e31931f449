use std::env;

use appbundle_core::{AppError, AppResult, TenantId, UserIdentity};
use appbundle_infrastructure::AesSecretEncryptor;
use tracing_subscriber::EnvFilter;

const DEFAULT_ACTOR_SUBJECT: &str = "cli";

/// Runtime settings read from the environment.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub encryption_key: Option<String>,
    pub tenant_id: TenantId,
    pub actor_subject: String,
}

impl CliConfig {
    pub fn load() -> AppResult<Self> {
        Self::from_values(
            env::var("BUNDLE_ENCRYPTION_KEY").ok(),
            env::var("BUNDLE_TENANT_ID").ok(),
            env::var("BUNDLE_ACTOR_SUBJECT").ok(),
        )
    }

    fn from_values(
        encryption_key: Option<String>,
        tenant_id: Option<String>,
        actor_subject: Option<String>,
    ) -> AppResult<Self> {
        let encryption_key = encryption_key
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty());
        if let Some(key) = &encryption_key {
            AesSecretEncryptor::from_hex(key)?;
        }

        let tenant_id = tenant_id
            .filter(|value| !value.trim().is_empty())
            .map(|value| {
                uuid::Uuid::parse_str(value.trim())
                    .map(TenantId::from_uuid)
                    .map_err(|error| {
                        AppError::Validation(format!("invalid BUNDLE_TENANT_ID: {error}"))
                    })
            })
            .transpose()?
            .unwrap_or_default();

        let actor_subject = actor_subject
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_ACTOR_SUBJECT.to_owned());

        Ok(Self {
            encryption_key,
            tenant_id,
            actor_subject,
        })
    }

    pub fn actor(&self) -> UserIdentity {
        UserIdentity::new(self.actor_subject.as_str(), self.tenant_id)
    }

    pub fn secret_encryptor(&self) -> AppResult<AesSecretEncryptor> {
        let key = self.encryption_key.as_deref().ok_or_else(|| {
            AppError::Validation("BUNDLE_ENCRYPTION_KEY is required for this command".to_owned())
        })?;
        AesSecretEncryptor::from_hex(key)
    }
}

pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}
