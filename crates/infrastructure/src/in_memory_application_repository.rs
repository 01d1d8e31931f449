use std::collections::HashMap;

use appbundle_application::{ApplicationGraph, ApplicationGraphRepository};
use appbundle_core::{AppError, AppResult, TenantId};
use appbundle_domain::Datasource;
use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

/// Application graph without its datasources, which are shared per tenant.
#[derive(Debug, Clone)]
struct StoredApplication {
    graph: ApplicationGraph,
    datasource_ids: Vec<String>,
}

/// In-memory entity store.
#[derive(Debug, Default)]
pub struct InMemoryApplicationRepository {
    applications: RwLock<HashMap<(TenantId, String), StoredApplication>>,
    datasources: RwLock<HashMap<(TenantId, String), Datasource>>,
}

impl InMemoryApplicationRepository {
    /// Creates an empty in-memory repository.
    #[must_use]
    pub fn new() -> Self {
        Self {
            applications: RwLock::new(HashMap::new()),
            datasources: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl ApplicationGraphRepository for InMemoryApplicationRepository {
    async fn find_application_graph(
        &self,
        tenant_id: TenantId,
        application_id: &str,
    ) -> AppResult<Option<ApplicationGraph>> {
        let applications = self.applications.read().await;
        let Some(stored) = applications.get(&(tenant_id, application_id.to_owned())) else {
            return Ok(None);
        };

        let datasources = self.datasources.read().await;
        let mut graph = stored.graph.clone();
        graph.datasources = stored
            .datasource_ids
            .iter()
            .map(|datasource_id| {
                datasources
                    .get(&(tenant_id, datasource_id.clone()))
                    .cloned()
                    .ok_or_else(|| {
                        AppError::Internal(format!(
                            "application '{application_id}' references unknown datasource '{datasource_id}'"
                        ))
                    })
            })
            .collect::<AppResult<Vec<_>>>()?;

        Ok(Some(graph))
    }

    async fn list_application_names(&self, tenant_id: TenantId) -> AppResult<Vec<String>> {
        let applications = self.applications.read().await;

        let mut names: Vec<String> = applications
            .iter()
            .filter_map(|((stored_tenant_id, _), stored)| {
                (stored_tenant_id == &tenant_id)
                    .then(|| stored.graph.application.name().as_str().to_owned())
            })
            .collect();
        names.sort();

        Ok(names)
    }

    async fn list_datasources(&self, tenant_id: TenantId) -> AppResult<Vec<Datasource>> {
        let datasources = self.datasources.read().await;

        let mut values: Vec<Datasource> = datasources
            .iter()
            .filter_map(|((stored_tenant_id, _), datasource)| {
                (stored_tenant_id == &tenant_id).then_some(datasource.clone())
            })
            .collect();
        values.sort_by(|left, right| left.name().as_str().cmp(right.name().as_str()));

        Ok(values)
    }

    async fn save_application_graph(
        &self,
        tenant_id: TenantId,
        mut graph: ApplicationGraph,
    ) -> AppResult<()> {
        let key = (tenant_id, graph.application.id().as_str().to_owned());
        let mut applications = self.applications.write().await;
        let mut datasources = self.datasources.write().await;

        if applications.contains_key(&key) {
            return Err(AppError::Conflict(format!(
                "application '{}' already exists for tenant '{}'",
                key.1, key.0
            )));
        }

        let name = graph.application.name().as_str();
        if applications.iter().any(|((stored_tenant_id, _), stored)| {
            stored_tenant_id == &tenant_id && stored.graph.application.name().as_str() == name
        }) {
            return Err(AppError::Conflict(format!(
                "application name '{name}' is already used in tenant '{tenant_id}'"
            )));
        }

        let incoming = std::mem::take(&mut graph.datasources);
        let datasource_ids = incoming
            .iter()
            .map(|datasource| datasource.id().as_str().to_owned())
            .collect();
        for datasource in incoming {
            let datasource_key = (tenant_id, datasource.id().as_str().to_owned());
            if datasources.contains_key(&datasource_key) {
                debug!(datasource_id = %datasource_key.1, "referencing existing datasource");
                continue;
            }
            datasources.insert(datasource_key, datasource);
        }

        applications.insert(
            key,
            StoredApplication {
                graph,
                datasource_ids,
            },
        );
        Ok(())
    }
}
