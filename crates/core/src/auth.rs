use serde::{Deserialize, Serialize};

use crate::TenantId;

/// Operator running an export or import, scoped to the tenant whose store it uses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    subject: String,
    tenant_id: TenantId,
}

impl UserIdentity {
    /// Creates an operator identity.
    #[must_use]
    pub fn new(subject: impl Into<String>, tenant_id: TenantId) -> Self {
        Self {
            subject: subject.into(),
            tenant_id,
        }
    }

    /// Stable subject recorded in logs.
    #[must_use]
    pub fn subject(&self) -> &str {
        self.subject.as_str()
    }

    /// Tenant whose entity store is read or written.
    #[must_use]
    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}
