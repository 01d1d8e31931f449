use appbundle_core::{AppError, AppResult, NonEmptyString};
use serde::{Deserialize, Serialize};
use serde_json::Value;

mod reset;

pub use reset::{PropertyPath, WidgetPropertyUpdate, apply_property_updates, properties_to_reset};

/// Theme snapshot applied to an application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Theme {
    id: NonEmptyString,
    name: NonEmptyString,
    display_name: NonEmptyString,
    #[serde(default)]
    is_system_theme: bool,
    #[serde(default)]
    properties: Value,
    #[serde(default)]
    stylesheet: Value,
}

impl Theme {
    /// Creates a validated theme.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        display_name: impl Into<String>,
        is_system_theme: bool,
        properties: Value,
        stylesheet: Value,
    ) -> AppResult<Self> {
        if !stylesheet.is_object() {
            return Err(AppError::Validation(
                "theme stylesheet must be a JSON object keyed by widget type".to_owned(),
            ));
        }

        Ok(Self {
            id: NonEmptyString::new(id)?,
            name: NonEmptyString::new(name)?,
            display_name: NonEmptyString::new(display_name)?,
            is_system_theme,
            properties,
            stylesheet,
        })
    }

    /// Returns theme identifier.
    #[must_use]
    pub fn id(&self) -> &NonEmptyString {
        &self.id
    }

    /// Returns theme name.
    #[must_use]
    pub fn name(&self) -> &NonEmptyString {
        &self.name
    }

    /// Returns theme display name.
    #[must_use]
    pub fn display_name(&self) -> &NonEmptyString {
        &self.display_name
    }

    /// Returns whether the theme ships with the platform.
    #[must_use]
    pub fn is_system_theme(&self) -> bool {
        self.is_system_theme
    }

    /// Returns theme properties such as colors and fonts.
    #[must_use]
    pub fn properties(&self) -> &Value {
        &self.properties
    }

    /// Returns the per-widget-type stylesheet.
    #[must_use]
    pub fn stylesheet(&self) -> &Value {
        &self.stylesheet
    }

    /// Returns a copy carrying a new identifier.
    pub fn with_id(&self, id: impl Into<String>) -> AppResult<Self> {
        let mut theme = self.clone();
        theme.id = NonEmptyString::new(id)?;
        Ok(theme)
    }
}
