use std::collections::HashMap;

use appbundle_core::{AppError, AppResult};
use uuid::Uuid;

/// Entity kinds whose identifiers are replaced on import.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemappedKind {
    /// Root application.
    Application,
    /// Page.
    Page,
    /// Page layout.
    Layout,
    /// Action.
    Action,
    /// Action collection.
    ActionCollection,
    /// Datasource.
    Datasource,
    /// Theme.
    Theme,
}

impl RemappedKind {
    /// Returns the bundle collection the kind belongs to.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Application => "application",
            Self::Page => "pages",
            Self::Layout => "layouts",
            Self::Action => "actions",
            Self::ActionCollection => "actionCollections",
            Self::Datasource => "datasources",
            Self::Theme => "themes",
        }
    }
}

/// Maps bundle identifiers to identifiers in the target store.
///
/// The same original identifier of one kind always maps to the same target.
#[derive(Debug, Default)]
pub struct IdRemapper {
    assigned: HashMap<(RemappedKind, String), String>,
}

impl IdRemapper {
    /// Creates an empty remapper.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the target for `original`, generating a fresh UUID on first use.
    pub fn assign(&mut self, kind: RemappedKind, original: &str) -> String {
        self.assigned
            .entry((kind, original.to_owned()))
            .or_insert_with(|| Uuid::new_v4().to_string())
            .clone()
    }

    /// Maps `original` to an identifier that already exists in the store.
    pub fn bind(&mut self, kind: RemappedKind, original: &str, target: impl Into<String>) {
        self.assigned
            .insert((kind, original.to_owned()), target.into());
    }

    /// Returns the target of an identifier assigned or bound earlier.
    pub fn resolve(&self, kind: RemappedKind, original: &str) -> AppResult<String> {
        self.assigned
            .get(&(kind, original.to_owned()))
            .cloned()
            .ok_or_else(|| {
                AppError::DanglingReference(format!(
                    "{} references missing '{original}'",
                    kind.as_str()
                ))
            })
    }

    /// Returns how many identifiers were mapped.
    #[must_use]
    pub fn len(&self) -> usize {
        self.assigned.len()
    }

    /// Returns whether nothing was mapped yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.assigned.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use appbundle_core::{AppError, AppResult};

    use super::{IdRemapper, RemappedKind};

    #[test]
    fn assignment_is_stable_per_kind() -> AppResult<()> {
        let mut remapper = IdRemapper::new();

        let first = remapper.assign(RemappedKind::Page, "p1");
        let again = remapper.assign(RemappedKind::Page, "p1");
        let other_kind = remapper.assign(RemappedKind::Layout, "p1");

        assert_eq!(first, again);
        assert_ne!(first, other_kind);
        assert_ne!(first, "p1");
        assert_eq!(remapper.resolve(RemappedKind::Page, "p1")?, first);
        assert_eq!(remapper.len(), 2);
        Ok(())
    }

    #[test]
    fn bound_targets_are_kept() -> AppResult<()> {
        let mut remapper = IdRemapper::new();
        remapper.bind(RemappedKind::Datasource, "ds-old", "ds-existing");

        assert_eq!(remapper.assign(RemappedKind::Datasource, "ds-old"), "ds-existing");
        assert_eq!(
            remapper.resolve(RemappedKind::Datasource, "ds-old")?,
            "ds-existing"
        );
        Ok(())
    }

    #[test]
    fn unknown_identifiers_do_not_resolve() {
        let remapper = IdRemapper::new();

        assert!(remapper.is_empty());
        assert!(matches!(
            remapper.resolve(RemappedKind::Action, "a1"),
            Err(AppError::DanglingReference(_))
        ));
    }
}
