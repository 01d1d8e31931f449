use std::collections::BTreeSet;

use appbundle_domain::Datasource;

/// How a bundle datasource lands in the target store.
#[derive(Debug, PartialEq)]
pub(super) enum DatasourcePlacement<'a> {
    /// An existing datasource with the same name and plugin is referenced.
    Reuse(&'a Datasource),
    /// A new datasource is created under this name.
    Create(String),
}

/// Returns `base`, or `"<base> (n)"` with the smallest free `n`.
pub(super) fn available_name(base: &str, taken: &BTreeSet<String>) -> String {
    if !taken.contains(base) {
        return base.to_owned();
    }

    let mut suffix = 1_u32;
    loop {
        let candidate = format!("{base} ({suffix})");
        if !taken.contains(&candidate) {
            return candidate;
        }
        suffix += 1;
    }
}

pub(super) fn place_datasource<'a>(
    incoming: &Datasource,
    existing: &'a [Datasource],
    taken_names: &BTreeSet<String>,
) -> DatasourcePlacement<'a> {
    if let Some(matching) = existing.iter().find(|datasource| {
        datasource.name() == incoming.name() && datasource.plugin_id() == incoming.plugin_id()
    }) {
        return DatasourcePlacement::Reuse(matching);
    }

    DatasourcePlacement::Create(available_name(incoming.name().as_str(), taken_names))
}
