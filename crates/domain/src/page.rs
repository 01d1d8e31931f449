use std::collections::BTreeSet;

use appbundle_core::{AppError, AppResult, NonEmptyString};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::application::slugify;

/// DSL key holding a widget's stable identifier.
pub const WIDGET_ID_KEY: &str = "widgetId";
/// DSL key holding a widget's user-facing name.
pub const WIDGET_NAME_KEY: &str = "widgetName";
/// DSL key holding a widget's type tag.
pub const WIDGET_TYPE_KEY: &str = "type";
/// DSL key holding nested widgets.
pub const WIDGET_CHILDREN_KEY: &str = "children";

/// Page belonging to an exported application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    id: NonEmptyString,
    unpublished_page: PageContent,
    published_page: Option<PageContent>,
}

impl Page {
    /// Creates a page with its editable content and optional published content.
    pub fn new(
        id: impl Into<String>,
        unpublished_page: PageContent,
        published_page: Option<PageContent>,
    ) -> AppResult<Self> {
        Ok(Self {
            id: NonEmptyString::new(id)?,
            unpublished_page,
            published_page,
        })
    }

    /// Returns the page identifier.
    #[must_use]
    pub fn id(&self) -> &NonEmptyString {
        &self.id
    }

    /// Returns the editable page content.
    #[must_use]
    pub fn unpublished_page(&self) -> &PageContent {
        &self.unpublished_page
    }

    /// Returns the published page content when the page was deployed.
    #[must_use]
    pub fn published_page(&self) -> Option<&PageContent> {
        self.published_page.as_ref()
    }

    /// Returns a copy whose contents are transformed per lifecycle state.
    #[must_use]
    pub fn with_contents(
        &self,
        unpublished_page: PageContent,
        published_page: Option<PageContent>,
    ) -> Self {
        Self {
            id: self.id.clone(),
            unpublished_page,
            published_page,
        }
    }
}

/// Page content for one lifecycle state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageContent {
    name: NonEmptyString,
    slug: NonEmptyString,
    #[serde(default)]
    is_hidden: bool,
    #[serde(default)]
    layouts: Vec<Layout>,
}

impl PageContent {
    /// Creates validated page content with a slug derived from the name.
    pub fn new(name: impl Into<String>, is_hidden: bool, layouts: Vec<Layout>) -> AppResult<Self> {
        let name = NonEmptyString::new(name)?;
        let slug = slugify(name.as_str())?;

        let mut seen = BTreeSet::new();
        for layout in &layouts {
            if !seen.insert(layout.id().as_str()) {
                return Err(AppError::Validation(format!(
                    "page '{}' contains duplicate layout '{}'",
                    name,
                    layout.id()
                )));
            }
        }

        Ok(Self {
            name,
            slug,
            is_hidden,
            layouts,
        })
    }

    /// Returns the page name.
    #[must_use]
    pub fn name(&self) -> &NonEmptyString {
        &self.name
    }

    /// Returns the page slug.
    #[must_use]
    pub fn slug(&self) -> &NonEmptyString {
        &self.slug
    }

    /// Returns whether the page is hidden from navigation.
    #[must_use]
    pub fn is_hidden(&self) -> bool {
        self.is_hidden
    }

    /// Returns page layouts.
    #[must_use]
    pub fn layouts(&self) -> &[Layout] {
        &self.layouts
    }

    /// Returns a copy with the layouts replaced.
    #[must_use]
    pub fn with_layouts(&self, layouts: Vec<Layout>) -> Self {
        Self {
            name: self.name.clone(),
            slug: self.slug.clone(),
            is_hidden: self.is_hidden,
            layouts,
        }
    }
}

/// Widget tree of one page layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Layout {
    id: NonEmptyString,
    dsl: Value,
}

impl Layout {
    /// Creates a layout from its widget DSL.
    pub fn new(id: impl Into<String>, dsl: Value) -> AppResult<Self> {
        if !dsl.is_object() {
            return Err(AppError::Validation(
                "layout dsl must be a JSON object".to_owned(),
            ));
        }

        Ok(Self {
            id: NonEmptyString::new(id)?,
            dsl,
        })
    }

    /// Returns the layout identifier.
    #[must_use]
    pub fn id(&self) -> &NonEmptyString {
        &self.id
    }

    /// Returns the widget DSL.
    #[must_use]
    pub fn dsl(&self) -> &Value {
        &self.dsl
    }

    /// Flattens the widget tree in depth-first order, root included.
    #[must_use]
    pub fn widgets(&self) -> Vec<WidgetRef<'_>> {
        let mut widgets = Vec::new();
        collect_widgets(&self.dsl, &mut widgets);
        widgets
    }

    /// Returns the set of widget names present in the layout.
    #[must_use]
    pub fn widget_names(&self) -> BTreeSet<&str> {
        self.widgets()
            .into_iter()
            .filter_map(|widget| widget.name)
            .collect()
    }
}

/// Borrowed view of one widget inside a layout DSL.
#[derive(Debug, Clone, Copy)]
pub struct WidgetRef<'a> {
    /// Widget identifier, when present.
    pub id: Option<&'a str>,
    /// Widget name, when present.
    pub name: Option<&'a str>,
    /// Widget type tag, when present.
    pub widget_type: Option<&'a str>,
    /// Full widget object.
    pub value: &'a Value,
}

fn collect_widgets<'a>(node: &'a Value, widgets: &mut Vec<WidgetRef<'a>>) {
    let Some(object) = node.as_object() else {
        return;
    };

    widgets.push(WidgetRef {
        id: object.get(WIDGET_ID_KEY).and_then(Value::as_str),
        name: object.get(WIDGET_NAME_KEY).and_then(Value::as_str),
        widget_type: object.get(WIDGET_TYPE_KEY).and_then(Value::as_str),
        value: node,
    });

    if let Some(children) = object.get(WIDGET_CHILDREN_KEY).and_then(Value::as_array) {
        for child in children {
            collect_widgets(child, widgets);
        }
    }
}

#[cfg(test)]
mod tests {
    use appbundle_core::AppResult;
    use serde_json::json;

    use super::{Layout, PageContent};

    fn sample_dsl() -> serde_json::Value {
        json!({
            "widgetId": "0",
            "widgetName": "MainContainer",
            "type": "CANVAS_WIDGET",
            "children": [
                { "widgetId": "w1", "widgetName": "Table1", "type": "TABLE_WIDGET" },
                {
                    "widgetId": "w2",
                    "widgetName": "Container1",
                    "type": "CONTAINER_WIDGET",
                    "children": [
                        { "widgetId": "w3", "widgetName": "Button1", "type": "BUTTON_WIDGET" }
                    ]
                }
            ]
        })
    }

    #[test]
    fn widgets_are_flattened_depth_first() -> AppResult<()> {
        let layout = Layout::new("layout-1", sample_dsl())?;
        let names: Vec<&str> = layout
            .widgets()
            .into_iter()
            .filter_map(|widget| widget.name)
            .collect();

        assert_eq!(
            names,
            vec!["MainContainer", "Table1", "Container1", "Button1"]
        );
        Ok(())
    }

    #[test]
    fn layout_requires_object_dsl() {
        assert!(Layout::new("layout-1", json!([])).is_err());
    }

    #[test]
    fn page_content_rejects_duplicate_layouts() -> AppResult<()> {
        let layouts = vec![
            Layout::new("layout-1", sample_dsl())?,
            Layout::new("layout-1", sample_dsl())?,
        ];
        assert!(PageContent::new("Home", false, layouts).is_err());
        Ok(())
    }
}
