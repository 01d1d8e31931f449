//! Reversible escaping of widget property keys the entity store cannot hold.
//!
//! The store rejects keys containing `.` or starting with `$`. Escaped keys use
//! percent codes: `%` becomes `%25`, `.` becomes `%2E` and a leading `$`
//! becomes `%24`. A widget is escaped when any of its keys contains `.` or `%`
//! or starts with `$`, so a stored key containing `%` always belongs to an
//! escaped widget.

use std::collections::BTreeSet;

use serde_json::{Map, Value};

use crate::page::{WIDGET_CHILDREN_KEY, WIDGET_NAME_KEY};

/// Returns whether a widget holding `key` must be escaped before storage.
#[must_use]
pub fn is_restricted_key(key: &str) -> bool {
    key.contains('.') || key.contains('%') || key.starts_with('$')
}

/// Escapes one property key.
#[must_use]
pub fn escape_key(key: &str) -> String {
    let mut escaped = String::with_capacity(key.len());
    for (index, character) in key.char_indices() {
        match character {
            '%' => escaped.push_str("%25"),
            '.' => escaped.push_str("%2E"),
            '$' if index == 0 => escaped.push_str("%24"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Reverses [`escape_key`]. Unknown percent sequences are kept verbatim.
#[must_use]
pub fn unescape_key(key: &str) -> String {
    let mut unescaped = String::with_capacity(key.len());
    let mut rest = key;

    while let Some(position) = rest.find('%') {
        unescaped.push_str(&rest[..position]);
        let code = rest.get(position..position + 3);
        match code {
            Some("%25") => unescaped.push('%'),
            Some("%2E") => unescaped.push('.'),
            Some("%24") => unescaped.push('$'),
            _ => {
                unescaped.push('%');
                rest = &rest[position + 1..];
                continue;
            }
        }
        rest = &rest[position + 3..];
    }

    unescaped.push_str(rest);
    unescaped
}

/// Escapes every widget holding restricted keys.
///
/// Returns the stored DSL and the names of widgets that were escaped.
#[must_use]
pub fn escape_restricted_widgets(dsl: &Value) -> (Value, BTreeSet<String>) {
    let mut escaped = BTreeSet::new();
    let value = rewrite_widgets(
        dsl,
        &mut |widget| {
            if !widget_has_key(widget, &is_restricted_key) {
                return None;
            }
            Some(rewrite_widget_keys(widget, &escape_key))
        },
        &mut escaped,
    );
    (value, escaped)
}

/// Escapes the keys of the named widgets only.
#[must_use]
pub fn escape_layout_dsl(dsl: &Value, widget_names: &BTreeSet<String>) -> Value {
    let mut escaped = BTreeSet::new();
    rewrite_widgets(
        dsl,
        &mut |widget| {
            let name = widget.get(WIDGET_NAME_KEY).and_then(Value::as_str)?;
            widget_names
                .contains(name)
                .then(|| rewrite_widget_keys(widget, &escape_key))
        },
        &mut escaped,
    )
}

/// Restores original keys of escaped widgets.
///
/// Returns the portable DSL and the names of widgets whose keys changed.
#[must_use]
pub fn unescape_layout_dsl(dsl: &Value) -> (Value, BTreeSet<String>) {
    let mut unescaped = BTreeSet::new();
    let value = rewrite_widgets(
        dsl,
        &mut |widget| {
            if !widget_has_key(widget, &|key: &str| key.contains('%')) {
                return None;
            }
            Some(rewrite_widget_keys(widget, &unescape_key))
        },
        &mut unescaped,
    );
    (value, unescaped)
}

/// Walks widgets depth-first; `rewrite` returns a replacement object for a widget
/// whose own keys changed, and that widget's name is recorded.
fn rewrite_widgets(
    node: &Value,
    rewrite: &mut dyn FnMut(&Map<String, Value>) -> Option<Map<String, Value>>,
    rewritten: &mut BTreeSet<String>,
) -> Value {
    let Some(widget) = node.as_object() else {
        return node.clone();
    };

    let mut result = match rewrite(widget) {
        Some(replacement) => {
            if let Some(name) = widget.get(WIDGET_NAME_KEY).and_then(Value::as_str) {
                rewritten.insert(name.to_owned());
            }
            replacement
        }
        None => widget.clone(),
    };

    if let Some(children) = widget.get(WIDGET_CHILDREN_KEY).and_then(Value::as_array) {
        let children = children
            .iter()
            .map(|child| rewrite_widgets(child, rewrite, rewritten))
            .collect();
        result.insert(WIDGET_CHILDREN_KEY.to_owned(), Value::Array(children));
    }

    Value::Object(result)
}

fn widget_has_key(widget: &Map<String, Value>, predicate: &dyn Fn(&str) -> bool) -> bool {
    widget.iter().any(|(key, value)| {
        if key == WIDGET_CHILDREN_KEY {
            return false;
        }
        predicate(key) || nested_has_key(value, predicate)
    })
}

fn nested_has_key(value: &Value, predicate: &dyn Fn(&str) -> bool) -> bool {
    match value {
        Value::Object(object) => object
            .iter()
            .any(|(key, nested)| predicate(key) || nested_has_key(nested, predicate)),
        Value::Array(items) => items.iter().any(|item| nested_has_key(item, predicate)),
        _ => false,
    }
}

/// Rewrites the widget's own property keys; `children` is left to the widget walk.
fn rewrite_widget_keys(
    widget: &Map<String, Value>,
    transform: &dyn Fn(&str) -> String,
) -> Map<String, Value> {
    widget
        .iter()
        .map(|(key, value)| {
            if key == WIDGET_CHILDREN_KEY {
                (key.clone(), value.clone())
            } else {
                (transform(key), rewrite_nested_keys(value, transform))
            }
        })
        .collect()
}

fn rewrite_nested_keys(value: &Value, transform: &dyn Fn(&str) -> String) -> Value {
    match value {
        Value::Object(object) => Value::Object(
            object
                .iter()
                .map(|(key, nested)| (transform(key), rewrite_nested_keys(nested, transform)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| rewrite_nested_keys(item, transform))
                .collect(),
        ),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use proptest::prelude::*;
    use serde_json::json;

    use super::{
        escape_key, escape_layout_dsl, escape_restricted_widgets, is_restricted_key,
        unescape_key, unescape_layout_dsl,
    };

    fn table_dsl() -> serde_json::Value {
        json!({
            "widgetId": "0",
            "widgetName": "MainContainer",
            "children": [
                {
                    "widgetId": "w1",
                    "widgetName": "Table1",
                    "primaryColumns": { "order.id": { "label": "Order" } }
                },
                { "widgetId": "w2", "widgetName": "Text1", "text": "a.b" }
            ]
        })
    }

    #[test]
    fn escapes_only_widgets_with_restricted_keys() {
        let (stored, escaped) = escape_restricted_widgets(&table_dsl());

        assert_eq!(escaped, BTreeSet::from(["Table1".to_owned()]));
        assert!(stored["children"][0]["primaryColumns"]["order%2Eid"].is_object());
        assert_eq!(stored["children"][1]["text"], json!("a.b"));
    }

    #[test]
    fn unescape_reports_escaped_widgets_and_restores_keys() {
        let (stored, escaped) = escape_restricted_widgets(&table_dsl());
        let (portable, unescaped) = unescape_layout_dsl(&stored);

        assert_eq!(portable, table_dsl());
        assert_eq!(unescaped, escaped);
    }

    #[test]
    fn escape_layout_dsl_uses_recorded_names() {
        let names = BTreeSet::from(["Table1".to_owned()]);
        let (stored, _) = escape_restricted_widgets(&table_dsl());

        assert_eq!(escape_layout_dsl(&table_dsl(), &names), stored);
    }

    #[test]
    fn leading_dollar_is_escaped_only_at_start() {
        assert_eq!(escape_key("$price$"), "%24price$");
        assert!(is_restricted_key("$price"));
        assert!(!is_restricted_key("price$"));
    }

    #[test]
    fn unknown_percent_sequences_are_kept() {
        assert_eq!(unescape_key("100%"), "100%");
        assert_eq!(unescape_key("%41"), "%41");
    }

    proptest! {
        #[test]
        fn escaped_keys_are_unrestricted_and_reversible(key in "[a-z$.%]{0,12}") {
            let escaped = escape_key(&key);
            prop_assert!(!escaped.contains('.'));
            prop_assert!(!escaped.starts_with('$'));
            prop_assert_eq!(unescape_key(&escaped), key);
        }
    }
}
