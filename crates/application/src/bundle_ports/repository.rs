use appbundle_core::{AppResult, TenantId};
use appbundle_domain::{Action, ActionCollection, Application, Datasource, Page, Theme};
use async_trait::async_trait;

/// Application and its dependents as held by the entity store.
///
/// Layout DSLs are stored with restricted keys escaped, datasource secrets are
/// encrypted and actions carry their invisible fields.
#[derive(Debug, Clone, PartialEq)]
pub struct ApplicationGraph {
    /// Root application.
    pub application: Application,
    /// Pages in natural order.
    pub pages: Vec<Page>,
    /// Editable page display order by page identifier.
    pub page_order: Vec<String>,
    /// Published page display order by page identifier.
    pub published_page_order: Vec<String>,
    /// Editable landing page identifier.
    pub default_page_id: Option<String>,
    /// Published landing page identifier.
    pub published_default_page_id: Option<String>,
    /// Actions of every page.
    pub actions: Vec<Action>,
    /// Action collections of every page.
    pub action_collections: Vec<ActionCollection>,
    /// Datasources referenced by the actions.
    pub datasources: Vec<Datasource>,
    /// Edit-mode theme.
    pub edit_mode_theme: Option<Theme>,
    /// Published theme.
    pub published_theme: Option<Theme>,
}

/// Entity store port used by export and import.
#[async_trait]
pub trait ApplicationGraphRepository: Send + Sync {
    /// Loads one application with every dependent entity.
    async fn find_application_graph(
        &self,
        tenant_id: TenantId,
        application_id: &str,
    ) -> AppResult<Option<ApplicationGraph>>;

    /// Lists application names in use for a tenant.
    async fn list_application_names(&self, tenant_id: TenantId) -> AppResult<Vec<String>>;

    /// Lists datasources available to a tenant.
    async fn list_datasources(&self, tenant_id: TenantId) -> AppResult<Vec<Datasource>>;

    /// Persists a complete graph in one step.
    ///
    /// Datasources whose identifier already exists are referenced, not
    /// overwritten. Fails with `Conflict` when the application identifier or
    /// name is already used in the tenant; nothing is written when any part
    /// fails.
    async fn save_application_graph(
        &self,
        tenant_id: TenantId,
        graph: ApplicationGraph,
    ) -> AppResult<()>;
}
