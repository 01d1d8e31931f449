use std::collections::BTreeSet;

use appbundle_core::{AppError, AppResult, NonEmptyString};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Plugin family executing an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PluginType {
    /// REST or GraphQL request.
    Api,
    /// Database query.
    Db,
    /// Function inside a JS object.
    Js,
    /// SaaS integration.
    Saas,
    /// Remote plugin.
    Remote,
}

impl PluginType {
    /// Returns stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Api => "API",
            Self::Db => "DB",
            Self::Js => "JS",
            Self::Saas => "SAAS",
            Self::Remote => "REMOTE",
        }
    }

    /// Returns whether actions of this plugin type run against a datasource.
    #[must_use]
    pub fn uses_datasource(&self) -> bool {
        !matches!(self, Self::Js)
    }
}

/// Action configuration for one lifecycle state.
///
/// `user_set_on_load` is stored with the action but never serialized with it;
/// bundles carry it in [`InvisibleActionFields`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionContent {
    configuration: Value,
    #[serde(default)]
    execute_on_load: bool,
    #[serde(skip)]
    user_set_on_load: bool,
}

impl ActionContent {
    /// Creates action content.
    #[must_use]
    pub fn new(configuration: Value, execute_on_load: bool, user_set_on_load: bool) -> Self {
        Self {
            configuration,
            execute_on_load,
            user_set_on_load,
        }
    }

    /// Returns the plugin-specific configuration.
    #[must_use]
    pub fn configuration(&self) -> &Value {
        &self.configuration
    }

    /// Returns whether the action runs on page load.
    #[must_use]
    pub fn execute_on_load(&self) -> bool {
        self.execute_on_load
    }

    /// Returns whether the on-load flag was set explicitly by a user.
    #[must_use]
    pub fn user_set_on_load(&self) -> bool {
        self.user_set_on_load
    }

    /// Returns a copy with the user-set on-load flag replaced.
    #[must_use]
    pub fn with_user_set_on_load(&self, user_set_on_load: bool) -> Self {
        Self {
            configuration: self.configuration.clone(),
            execute_on_load: self.execute_on_load,
            user_set_on_load,
        }
    }
}

/// Single executable action bound to a page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    id: NonEmptyString,
    name: NonEmptyString,
    page_id: NonEmptyString,
    plugin_type: PluginType,
    datasource_id: Option<NonEmptyString>,
    collection_id: Option<NonEmptyString>,
    unpublished_action: ActionContent,
    published_action: Option<ActionContent>,
}

impl Action {
    /// Creates a validated action.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        page_id: impl Into<String>,
        plugin_type: PluginType,
        datasource_id: Option<String>,
        collection_id: Option<String>,
        unpublished_action: ActionContent,
        published_action: Option<ActionContent>,
    ) -> AppResult<Self> {
        let datasource_id = datasource_id.map(NonEmptyString::new).transpose()?;
        if plugin_type.uses_datasource() && datasource_id.is_none() {
            return Err(AppError::Validation(format!(
                "{} actions require a datasource",
                plugin_type.as_str()
            )));
        }

        Ok(Self {
            id: NonEmptyString::new(id)?,
            name: NonEmptyString::new(name)?,
            page_id: NonEmptyString::new(page_id)?,
            plugin_type,
            datasource_id,
            collection_id: collection_id.map(NonEmptyString::new).transpose()?,
            unpublished_action,
            published_action,
        })
    }

    /// Returns action identifier.
    #[must_use]
    pub fn id(&self) -> &NonEmptyString {
        &self.id
    }

    /// Returns action name.
    #[must_use]
    pub fn name(&self) -> &NonEmptyString {
        &self.name
    }

    /// Returns owning page identifier.
    #[must_use]
    pub fn page_id(&self) -> &NonEmptyString {
        &self.page_id
    }

    /// Returns plugin type.
    #[must_use]
    pub fn plugin_type(&self) -> PluginType {
        self.plugin_type
    }

    /// Returns the datasource the action runs against.
    #[must_use]
    pub fn datasource_id(&self) -> Option<&NonEmptyString> {
        self.datasource_id.as_ref()
    }

    /// Returns the collection grouping this action.
    #[must_use]
    pub fn collection_id(&self) -> Option<&NonEmptyString> {
        self.collection_id.as_ref()
    }

    /// Returns editable action content.
    #[must_use]
    pub fn unpublished_action(&self) -> &ActionContent {
        &self.unpublished_action
    }

    /// Returns published action content.
    #[must_use]
    pub fn published_action(&self) -> Option<&ActionContent> {
        self.published_action.as_ref()
    }

    /// Captures the fields excluded from default serialization.
    #[must_use]
    pub fn invisible_fields(&self) -> InvisibleActionFields {
        InvisibleActionFields {
            unpublished_user_set_on_load: Some(self.unpublished_action.user_set_on_load),
            published_user_set_on_load: self
                .published_action
                .as_ref()
                .map(ActionContent::user_set_on_load),
        }
    }

    /// Returns a copy with invisible fields reset to their defaults.
    #[must_use]
    pub fn without_invisible_fields(&self) -> Self {
        self.with_invisible_fields(&InvisibleActionFields::default())
    }

    /// Returns a copy with invisible fields restored from a bundle side table.
    #[must_use]
    pub fn with_invisible_fields(&self, fields: &InvisibleActionFields) -> Self {
        let mut action = self.clone();
        action.unpublished_action = self
            .unpublished_action
            .with_user_set_on_load(fields.unpublished_user_set_on_load.unwrap_or(false));
        action.published_action = self.published_action.as_ref().map(|content| {
            content.with_user_set_on_load(fields.published_user_set_on_load.unwrap_or(false))
        });
        action
    }

    /// Returns a copy carrying new identifiers and references.
    pub fn remapped(
        &self,
        id: impl Into<String>,
        page_id: impl Into<String>,
        datasource_id: Option<String>,
        collection_id: Option<String>,
    ) -> AppResult<Self> {
        let mut action = self.clone();
        action.id = NonEmptyString::new(id)?;
        action.page_id = NonEmptyString::new(page_id)?;
        action.datasource_id = datasource_id.map(NonEmptyString::new).transpose()?;
        action.collection_id = collection_id.map(NonEmptyString::new).transpose()?;
        Ok(action)
    }
}

/// Action fields hidden from default serialization and carried separately.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvisibleActionFields {
    /// Editable user-set on-load flag.
    pub unpublished_user_set_on_load: Option<bool>,
    /// Published user-set on-load flag.
    pub published_user_set_on_load: Option<bool>,
}

/// Variable declared by a JS object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsVariable {
    /// Variable name.
    pub name: String,
    /// Initial value source.
    pub value: String,
}

/// Group of actions authored together as one JS object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionCollection {
    id: NonEmptyString,
    name: NonEmptyString,
    page_id: NonEmptyString,
    body: String,
    #[serde(default)]
    action_ids: Vec<NonEmptyString>,
    #[serde(default)]
    variables: Vec<JsVariable>,
}

impl ActionCollection {
    /// Creates a validated action collection.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        page_id: impl Into<String>,
        body: impl Into<String>,
        action_ids: Vec<String>,
        variables: Vec<JsVariable>,
    ) -> AppResult<Self> {
        let mut seen = BTreeSet::new();
        for variable in &variables {
            if !seen.insert(variable.name.as_str()) {
                return Err(AppError::Validation(format!(
                    "variable '{}' is declared more than once",
                    variable.name
                )));
            }
        }

        Ok(Self {
            id: NonEmptyString::new(id)?,
            name: NonEmptyString::new(name)?,
            page_id: NonEmptyString::new(page_id)?,
            body: body.into(),
            action_ids: action_ids
                .into_iter()
                .map(NonEmptyString::new)
                .collect::<AppResult<Vec<_>>>()?,
            variables,
        })
    }

    /// Returns collection identifier.
    #[must_use]
    pub fn id(&self) -> &NonEmptyString {
        &self.id
    }

    /// Returns collection name.
    #[must_use]
    pub fn name(&self) -> &NonEmptyString {
        &self.name
    }

    /// Returns owning page identifier.
    #[must_use]
    pub fn page_id(&self) -> &NonEmptyString {
        &self.page_id
    }

    /// Returns JS object source.
    #[must_use]
    pub fn body(&self) -> &str {
        self.body.as_str()
    }

    /// Returns member action identifiers.
    #[must_use]
    pub fn action_ids(&self) -> &[NonEmptyString] {
        &self.action_ids
    }

    /// Returns declared variables.
    #[must_use]
    pub fn variables(&self) -> &[JsVariable] {
        &self.variables
    }

    /// Returns a copy with identifiers rewritten.
    pub fn remapped(
        &self,
        id: impl Into<String>,
        page_id: impl Into<String>,
        action_ids: Vec<String>,
    ) -> AppResult<Self> {
        Self::new(
            id,
            self.name.as_str(),
            page_id,
            self.body.clone(),
            action_ids,
            self.variables.clone(),
        )
    }
}
