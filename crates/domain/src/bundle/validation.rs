use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Display, Formatter};

use appbundle_core::{AppError, AppResult};

use super::{ExportBundle, LayoutEscapedWidgets};
use crate::{Layout, Page, PageContent};

/// One consistency problem found in a bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BundleIssue {
    /// Two entries of one collection share an identifier.
    DuplicateIdentifier {
        /// Collection key, e.g. `pages`.
        collection: &'static str,
        /// Repeated identifier.
        identifier: String,
    },
    /// A field references an identifier absent from its collection.
    DanglingReference {
        /// Field path holding the reference.
        field: String,
        /// Unresolved identifier or name.
        identifier: String,
    },
}

impl Display for BundleIssue {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateIdentifier {
                collection,
                identifier,
            } => write!(formatter, "{collection} contains '{identifier}' more than once"),
            Self::DanglingReference { field, identifier } => {
                write!(formatter, "{field} references missing '{identifier}'")
            }
        }
    }
}

impl BundleIssue {
    fn dangling(field: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self::DanglingReference {
            field: field.into(),
            identifier: identifier.into(),
        }
    }
}

impl ExportBundle {
    /// Lists every reference that does not resolve inside the bundle.
    #[must_use]
    pub fn reference_issues(&self) -> Vec<BundleIssue> {
        let payload = &self.payload;
        let mut issues = Vec::new();

        let page_ids = unique_ids(
            "pages",
            payload.pages.iter().map(|page| page.id().as_str()),
            &mut issues,
        );
        let action_ids = unique_ids(
            "actions",
            payload.actions.iter().map(|action| action.id().as_str()),
            &mut issues,
        );
        let collection_ids = unique_ids(
            "actionCollections",
            payload
                .action_collections
                .iter()
                .map(|collection| collection.id().as_str()),
            &mut issues,
        );
        let datasource_ids = unique_ids(
            "datasources",
            payload
                .datasources
                .iter()
                .map(|datasource| datasource.id().as_str()),
            &mut issues,
        );

        for (field, order) in [
            ("pageOrder", &payload.page_order),
            ("publishedPageOrder", &payload.published_page_order),
        ] {
            for page_id in order {
                if !page_ids.contains(page_id.as_str()) {
                    issues.push(BundleIssue::dangling(field, page_id.as_str()));
                }
            }
        }

        check_default_page(
            "unpublishedDefaultPageName",
            payload.unpublished_default_page_name.as_deref(),
            payload.pages.iter().map(|page| page.unpublished_page()),
            &mut issues,
        );
        check_default_page(
            "publishedDefaultPageName",
            payload.published_default_page_name.as_deref(),
            payload.pages.iter().filter_map(Page::published_page),
            &mut issues,
        );

        for action in &payload.actions {
            let action_field = format!("actions.{}", action.id());
            if !page_ids.contains(action.page_id().as_str()) {
                issues.push(BundleIssue::dangling(
                    format!("{action_field}.pageId"),
                    action.page_id().as_str(),
                ));
            }
            if let Some(datasource_id) = action.datasource_id()
                && !datasource_ids.contains(datasource_id.as_str())
            {
                issues.push(BundleIssue::dangling(
                    format!("{action_field}.datasourceId"),
                    datasource_id.as_str(),
                ));
            }
            if let Some(collection_id) = action.collection_id()
                && !collection_ids.contains(collection_id.as_str())
            {
                issues.push(BundleIssue::dangling(
                    format!("{action_field}.collectionId"),
                    collection_id.as_str(),
                ));
            }
        }

        for collection in &payload.action_collections {
            let collection_field = format!("actionCollections.{}", collection.id());
            if !page_ids.contains(collection.page_id().as_str()) {
                issues.push(BundleIssue::dangling(
                    format!("{collection_field}.pageId"),
                    collection.page_id().as_str(),
                ));
            }
            for action_id in collection.action_ids() {
                if !action_ids.contains(action_id.as_str()) {
                    issues.push(BundleIssue::dangling(
                        format!("{collection_field}.actionIds"),
                        action_id.as_str(),
                    ));
                }
            }
        }

        for (action_id, fields) in &payload.decrypted_fields {
            if !action_ids.contains(action_id.as_str()) {
                issues.push(BundleIssue::dangling("decryptedFields", action_id.as_str()));
            }
            if !datasource_ids.contains(fields.datasource_id.as_str()) {
                issues.push(BundleIssue::dangling(
                    format!("decryptedFields.{action_id}.datasourceId"),
                    fields.datasource_id.as_str(),
                ));
            }
        }

        for action_id in payload.invisible_action_fields.keys() {
            if !action_ids.contains(action_id.as_str()) {
                issues.push(BundleIssue::dangling(
                    "invisibleActionFields",
                    action_id.as_str(),
                ));
            }
        }

        let unpublished_layouts = layouts_by_id(
            "unpublished layouts",
            payload.pages.iter().map(Page::unpublished_page),
            &mut issues,
        );
        let published_layouts = layouts_by_id(
            "published layouts",
            payload.pages.iter().filter_map(Page::published_page),
            &mut issues,
        );
        check_escaped_widgets(
            "unpublishedLayoutEscapedWidgets",
            &payload.unpublished_layout_escaped_widgets,
            &unpublished_layouts,
            &mut issues,
        );
        check_escaped_widgets(
            "publishedLayoutEscapedWidgets",
            &payload.published_layout_escaped_widgets,
            &published_layouts,
            &mut issues,
        );

        issues
    }

    /// Fails on the first reference issue.
    ///
    /// Duplicates are reported as validation errors and unresolved references
    /// as dangling references; the message counts any further issues.
    pub fn validate(&self) -> AppResult<()> {
        let issues = self.reference_issues();
        let Some(first) = issues.first() else {
            return Ok(());
        };

        let message = match issues.len() {
            1 => first.to_string(),
            count => format!("{first} (and {} more issues)", count - 1),
        };

        Err(match first {
            BundleIssue::DuplicateIdentifier { .. } => AppError::Validation(message),
            BundleIssue::DanglingReference { .. } => AppError::DanglingReference(message),
        })
    }
}

fn unique_ids<'a>(
    collection: &'static str,
    ids: impl Iterator<Item = &'a str>,
    issues: &mut Vec<BundleIssue>,
) -> BTreeSet<&'a str> {
    let mut seen = BTreeSet::new();
    for id in ids {
        if !seen.insert(id) {
            issues.push(BundleIssue::DuplicateIdentifier {
                collection,
                identifier: id.to_owned(),
            });
        }
    }
    seen
}

fn check_default_page<'a>(
    field: &'static str,
    default_page_name: Option<&str>,
    mut contents: impl Iterator<Item = &'a PageContent>,
    issues: &mut Vec<BundleIssue>,
) {
    let Some(default_page_name) = default_page_name else {
        return;
    };

    if !contents.any(|content| content.name().as_str() == default_page_name) {
        issues.push(BundleIssue::dangling(field, default_page_name));
    }
}

fn layouts_by_id<'a>(
    collection: &'static str,
    contents: impl Iterator<Item = &'a PageContent>,
    issues: &mut Vec<BundleIssue>,
) -> BTreeMap<&'a str, &'a Layout> {
    let mut layouts = BTreeMap::new();
    for layout in contents.flat_map(PageContent::layouts) {
        if layouts.insert(layout.id().as_str(), layout).is_some() {
            issues.push(BundleIssue::DuplicateIdentifier {
                collection,
                identifier: layout.id().as_str().to_owned(),
            });
        }
    }
    layouts
}

fn check_escaped_widgets(
    field: &'static str,
    escaped: &LayoutEscapedWidgets,
    layouts: &BTreeMap<&str, &Layout>,
    issues: &mut Vec<BundleIssue>,
) {
    for (layout_id, widget_names) in escaped {
        let Some(layout) = layouts.get(layout_id.as_str()) else {
            issues.push(BundleIssue::dangling(field, layout_id.as_str()));
            continue;
        };

        let present = layout.widget_names();
        for widget_name in widget_names {
            if !present.contains(widget_name.as_str()) {
                issues.push(BundleIssue::dangling(
                    format!("{field}.{layout_id}"),
                    widget_name.as_str(),
                ));
            }
        }
    }
}
