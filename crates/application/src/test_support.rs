use std::collections::{BTreeMap, HashMap};

use appbundle_core::{AppError, AppResult, TenantId, UserIdentity};
use appbundle_domain::{
    Action, ActionCollection, ActionContent, Application, AuthType, Authentication, Datasource,
    DatasourceConfiguration, Layout, Page, PageContent, PluginType, Theme,
};
use async_trait::async_trait;
use serde_json::json;
use tokio::sync::Mutex;

use crate::{ApplicationGraph, ApplicationGraphRepository, SecretEncryptor};

pub(crate) struct FakeGraphRepository {
    graphs: Mutex<HashMap<(TenantId, String), ApplicationGraph>>,
    datasources: Mutex<HashMap<(TenantId, String), Datasource>>,
}

impl FakeGraphRepository {
    pub(crate) fn new() -> Self {
        Self {
            graphs: Mutex::new(HashMap::new()),
            datasources: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) async fn graph_named(
        &self,
        tenant_id: TenantId,
        name: &str,
    ) -> Option<ApplicationGraph> {
        self.graphs
            .lock()
            .await
            .iter()
            .find(|((stored_tenant_id, _), graph)| {
                stored_tenant_id == &tenant_id && graph.application.name().as_str() == name
            })
            .map(|(_, graph)| graph.clone())
    }

    pub(crate) async fn graph_count(&self) -> usize {
        self.graphs.lock().await.len()
    }

    pub(crate) async fn add_datasource(&self, tenant_id: TenantId, datasource: Datasource) {
        self.datasources.lock().await.insert(
            (tenant_id, datasource.id().as_str().to_owned()),
            datasource,
        );
    }
}

#[async_trait]
impl ApplicationGraphRepository for FakeGraphRepository {
    async fn find_application_graph(
        &self,
        tenant_id: TenantId,
        application_id: &str,
    ) -> AppResult<Option<ApplicationGraph>> {
        Ok(self
            .graphs
            .lock()
            .await
            .get(&(tenant_id, application_id.to_owned()))
            .cloned())
    }

    async fn list_application_names(&self, tenant_id: TenantId) -> AppResult<Vec<String>> {
        Ok(self
            .graphs
            .lock()
            .await
            .iter()
            .filter_map(|((stored_tenant_id, _), graph)| {
                (stored_tenant_id == &tenant_id)
                    .then(|| graph.application.name().as_str().to_owned())
            })
            .collect())
    }

    async fn list_datasources(&self, tenant_id: TenantId) -> AppResult<Vec<Datasource>> {
        Ok(self
            .datasources
            .lock()
            .await
            .iter()
            .filter_map(|((stored_tenant_id, _), datasource)| {
                (stored_tenant_id == &tenant_id).then_some(datasource.clone())
            })
            .collect())
    }

    async fn save_application_graph(
        &self,
        tenant_id: TenantId,
        graph: ApplicationGraph,
    ) -> AppResult<()> {
        let mut graphs = self.graphs.lock().await;
        let key = (tenant_id, graph.application.id().as_str().to_owned());
        if graphs.contains_key(&key) {
            return Err(AppError::Conflict(format!(
                "application '{}' already exists",
                key.1
            )));
        }
        let name = graph.application.name().as_str();
        if graphs.iter().any(|((stored_tenant_id, _), stored)| {
            stored_tenant_id == &tenant_id && stored.application.name().as_str() == name
        }) {
            return Err(AppError::Conflict(format!("application name '{name}' is taken")));
        }

        let mut datasources = self.datasources.lock().await;
        for datasource in &graph.datasources {
            datasources
                .entry((tenant_id, datasource.id().as_str().to_owned()))
                .or_insert_with(|| datasource.clone());
        }
        graphs.insert(key, graph);
        Ok(())
    }
}

/// Marks secrets instead of encrypting them.
pub(crate) struct PrefixEncryptor;

impl SecretEncryptor for PrefixEncryptor {
    fn encrypt_secret(&self, plaintext: &str) -> AppResult<String> {
        Ok(format!("enc:{plaintext}"))
    }

    fn decrypt_secret(&self, stored: &str) -> AppResult<String> {
        stored
            .strip_prefix("enc:")
            .map(str::to_owned)
            .ok_or_else(|| AppError::Internal(format!("'{stored}' was not encrypted")))
    }
}

pub(crate) fn actor(tenant_id: TenantId) -> UserIdentity {
    UserIdentity::new("alice", tenant_id)
}

/// Layout DSL as held by the store: `Table1` has an escaped column key.
pub(crate) fn stored_layout(id: &str) -> AppResult<Layout> {
    Layout::new(
        id,
        json!({
            "widgetId": "0",
            "widgetName": "MainContainer",
            "type": "CANVAS_WIDGET",
            "children": [
                {
                    "widgetId": "w1",
                    "widgetName": "Table1",
                    "type": "TABLE_WIDGET",
                    "borderRadius": "0px",
                    "primaryColumns": { "order%2Eid": { "columnType": "text" } }
                },
                { "widgetId": "w2", "widgetName": "Text1", "type": "TEXT_WIDGET" }
            ]
        }),
    )
}

pub(crate) fn theme(id: &str) -> AppResult<Theme> {
    Theme::new(
        id,
        "classic",
        "Classic",
        true,
        json!({ "borderRadius": { "appBorderRadius": "0.375rem" } }),
        json!({
            "TABLE_WIDGET": { "borderRadius": "{{appsmith.theme.borderRadius.appBorderRadius}}" }
        }),
    )
}

pub(crate) fn orders_datasource(id: &str) -> AppResult<Datasource> {
    Datasource::new(
        id,
        "Orders DB",
        "postgres-plugin",
        DatasourceConfiguration {
            url: Some("postgres://db.internal/orders".to_owned()),
            properties: BTreeMap::new(),
            authentication: Some(Authentication::new(
                AuthType::DbAuth,
                Some("reporter".to_owned()),
                Some("enc:hunter2".to_owned()),
                None,
                None,
            )),
        },
    )
}

/// Stored graph of a deployed two-page application.
pub(crate) fn stored_graph(application_id: &str) -> AppResult<ApplicationGraph> {
    let home = Page::new(
        "page-home",
        PageContent::new("Home", false, vec![stored_layout("layout-home")?])?,
        Some(PageContent::new(
            "Home",
            false,
            vec![stored_layout("layout-home")?],
        )?),
    )?;
    let reports = Page::new(
        "page-reports",
        PageContent::new("Reports", false, Vec::new())?,
        None,
    )?;
    let query = Action::new(
        "act-orders",
        "listOrders",
        "page-home",
        PluginType::Db,
        Some("ds-orders".to_owned()),
        None,
        ActionContent::new(json!({ "body": "select * from orders" }), true, true),
        Some(ActionContent::new(
            json!({ "body": "select * from orders" }),
            true,
            false,
        )),
    )?;
    let function = Action::new(
        "act-refresh",
        "Utils.refresh",
        "page-home",
        PluginType::Js,
        None,
        Some("col-utils".to_owned()),
        ActionContent::new(json!({ "body": "() => listOrders.run()" }), false, false),
        None,
    )?;
    let collection = ActionCollection::new(
        "col-utils",
        "Utils",
        "page-home",
        "export default { refresh: () => listOrders.run() }",
        vec!["act-refresh".to_owned()],
        Vec::new(),
    )?;

    Ok(ApplicationGraph {
        application: Application::new(application_id, "Order Desk")?,
        pages: vec![home, reports],
        page_order: vec!["page-reports".to_owned(), "page-home".to_owned()],
        published_page_order: vec!["page-home".to_owned()],
        default_page_id: Some("page-home".to_owned()),
        published_default_page_id: Some("page-home".to_owned()),
        actions: vec![query, function],
        action_collections: vec![collection],
        datasources: vec![orders_datasource("ds-orders")?],
        edit_mode_theme: Some(theme("theme-edit")?),
        published_theme: Some(theme("theme-live")?),
    })
}
