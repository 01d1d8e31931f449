use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::page::{Layout, WIDGET_CHILDREN_KEY, WIDGET_ID_KEY};

const IGNORED_PROPERTIES: [&str; 3] = ["childStylesheet", "submitButtonStyles", "resetButtonStyles"];
const FORM_BUTTON_STYLE_KEYS: [&str; 2] = ["submitButtonStyles", "resetButtonStyles"];
const ROOT_SCHEMA_KEY: &str = "__root_schema__";

/// Property writes that bring one widget back to its theme styling.
#[derive(Debug, Clone, PartialEq)]
pub struct WidgetPropertyUpdate {
    /// Target widget identifier.
    pub widget_id: String,
    /// Property paths, one key per segment, and their new values.
    pub modify: BTreeMap<PropertyPath, Value>,
}

/// Key segments leading from a widget to one of its properties.
///
/// Segments are kept apart because widget keys such as table column names may
/// themselves contain `.`.
pub type PropertyPath = Vec<String>;

fn property_path(segments: &[&str]) -> PropertyPath {
    segments.iter().map(|segment| (*segment).to_owned()).collect()
}

/// Computes the updates needed to reset widget styling in `layout` to `stylesheet`.
///
/// Widgets whose type has no stylesheet entry, or that already match it, are skipped.
#[must_use]
pub fn properties_to_reset(layout: &Layout, stylesheet: &Value) -> Vec<WidgetPropertyUpdate> {
    let mut updates = Vec::new();

    for widget in layout.widgets() {
        let (Some(widget_id), Some(widget_type)) = (widget.id, widget.widget_type) else {
            continue;
        };
        let Some(widget_stylesheet) = stylesheet.get(widget_type).and_then(Value::as_object) else {
            continue;
        };

        let mut modify = BTreeMap::new();
        for (property, styled_value) in widget_stylesheet {
            if IGNORED_PROPERTIES.contains(&property.as_str()) {
                continue;
            }
            if widget.value.get(property) != Some(styled_value) {
                modify.insert(vec![property.clone()], styled_value.clone());
            }
        }

        match widget_type {
            "TABLE_WIDGET" => {
                reset_table_columns(widget.value, widget.name.unwrap_or_default(), &mut modify);
            }
            "BUTTON_GROUP_WIDGET" => {
                reset_group_buttons(widget.value, widget_stylesheet, &mut modify);
            }
            "JSON_FORM_WIDGET" => {
                reset_form_fields(widget.value, widget_stylesheet, &mut modify);
                reset_form_buttons(widget.value, widget_stylesheet, &mut modify);
            }
            _ => {}
        }

        if !modify.is_empty() {
            updates.push(WidgetPropertyUpdate {
                widget_id: widget_id.to_owned(),
                modify,
            });
        }
    }

    updates
}

/// Writes computed updates into a layout DSL.
///
/// Updates for widget identifiers missing from the DSL are ignored.
pub fn apply_property_updates(dsl: &mut Value, updates: &[WidgetPropertyUpdate]) {
    for update in updates {
        if let Some(widget) = find_widget_mut(dsl, update.widget_id.as_str()) {
            for (path, value) in &update.modify {
                set_path(widget, path, value.clone());
            }
        }
    }
}

fn reset_table_columns(
    widget: &Value,
    widget_name: &str,
    modify: &mut BTreeMap<PropertyPath, Value>,
) {
    let Some(columns) = widget.get("primaryColumns").and_then(Value::as_object) else {
        return;
    };
    let child_stylesheet = widget.get("childStylesheet");

    for (column_key, column) in columns {
        let Some(column_type) = column.get("columnType").and_then(Value::as_str) else {
            continue;
        };
        let Some(column_stylesheet) = child_stylesheet
            .and_then(|sheet| sheet.get(column_type))
            .and_then(Value::as_object)
        else {
            continue;
        };

        for (property, styled_value) in column_stylesheet {
            let source = styled_value.as_str().unwrap_or_default();
            let js = combine_dynamic_bindings(&split_dynamic_bindings(source));
            let computed = format!(
                "{{{{{widget_name}.sanitizedTableData.map((currentRow) => ( {js}))}}}}"
            );

            if column.get(property).and_then(Value::as_str) != Some(computed.as_str()) {
                modify.insert(
                    property_path(&[
                        "primaryColumns",
                        column_key.as_str(),
                        property.as_str(),
                    ]),
                    Value::String(computed),
                );
            }
        }
    }
}

fn reset_group_buttons(
    widget: &Value,
    widget_stylesheet: &Map<String, Value>,
    modify: &mut BTreeMap<PropertyPath, Value>,
) {
    let Some(buttons) = widget.get("groupButtons").and_then(Value::as_object) else {
        return;
    };
    let Some(button_stylesheet) = widget_stylesheet
        .get("childStylesheet")
        .and_then(|sheet| sheet.get("button"))
        .and_then(Value::as_object)
    else {
        return;
    };

    for (button_key, button) in buttons {
        for (property, styled_value) in button_stylesheet {
            if button.get(property) != Some(styled_value) {
                modify.insert(
                    property_path(&["groupButtons", button_key.as_str(), property.as_str()]),
                    styled_value.clone(),
                );
            }
        }
    }
}

fn reset_form_fields(
    widget: &Value,
    widget_stylesheet: &Map<String, Value>,
    modify: &mut BTreeMap<PropertyPath, Value>,
) {
    let Some(root) = widget.get("schema").and_then(|schema| schema.get(ROOT_SCHEMA_KEY)) else {
        return;
    };
    let Some(child_stylesheet) = widget_stylesheet.get("childStylesheet") else {
        return;
    };

    walk_schema_item(
        root,
        property_path(&["schema", ROOT_SCHEMA_KEY]),
        child_stylesheet,
        modify,
    );
}

fn walk_schema_item(
    item: &Value,
    path: PropertyPath,
    child_stylesheet: &Value,
    modify: &mut BTreeMap<PropertyPath, Value>,
) {
    if let Some(field_stylesheet) = item
        .get("fieldType")
        .and_then(Value::as_str)
        .and_then(|field_type| child_stylesheet.get(field_type))
        .and_then(Value::as_object)
    {
        for (property, styled_value) in field_stylesheet {
            if item.get(property) != Some(styled_value) {
                let mut property_path = path.clone();
                property_path.push(property.clone());
                modify.insert(property_path, styled_value.clone());
            }
        }
    }

    if let Some(children) = item.get("children").and_then(Value::as_object) {
        for (child_key, child) in children {
            let mut child_path = path.clone();
            child_path.extend(["children".to_owned(), child_key.clone()]);
            walk_schema_item(
                child,
                child_path,
                child_stylesheet,
                modify,
            );
        }
    }
}

fn reset_form_buttons(
    widget: &Value,
    widget_stylesheet: &Map<String, Value>,
    modify: &mut BTreeMap<PropertyPath, Value>,
) {
    for button_key in FORM_BUTTON_STYLE_KEYS {
        let Some(button_stylesheet) = widget_stylesheet
            .get(button_key)
            .and_then(Value::as_object)
        else {
            continue;
        };
        let current = widget.get(button_key);

        for (property, styled_value) in button_stylesheet {
            if current.and_then(|styles| styles.get(property)) != Some(styled_value) {
                modify.insert(
                    property_path(&[button_key, property.as_str()]),
                    styled_value.clone(),
                );
            }
        }
    }
}

/// Segment of a template string.
#[derive(Debug, PartialEq, Eq)]
enum BindingSegment<'a> {
    Text(&'a str),
    Binding(&'a str),
}

/// Splits `text {{ js }} text` into literal and binding segments.
fn split_dynamic_bindings(source: &str) -> Vec<BindingSegment<'_>> {
    let mut segments = Vec::new();
    let mut rest = source;

    while let Some(start) = rest.find("{{") {
        let body_start = start + 2;
        let mut depth = 2_usize;
        let mut end = None;
        for (offset, character) in rest[body_start..].char_indices() {
            match character {
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        end = Some(body_start + offset);
                        break;
                    }
                }
                _ => {}
            }
        }

        // Unterminated bindings are treated as literal text.
        let Some(end) = end else {
            break;
        };

        if start > 0 {
            segments.push(BindingSegment::Text(&rest[..start]));
        }
        // `end` points at the last closing brace; the body stops one brace earlier.
        segments.push(BindingSegment::Binding(rest[body_start..end - 1].trim()));
        rest = &rest[end + 1..];
    }

    if !rest.is_empty() {
        segments.push(BindingSegment::Text(rest));
    }

    segments
}

fn combine_dynamic_bindings(segments: &[BindingSegment<'_>]) -> String {
    segments
        .iter()
        .map(|segment| match segment {
            BindingSegment::Binding(js) if !js.is_empty() => (*js).to_owned(),
            BindingSegment::Binding(_) => "``".to_owned(),
            BindingSegment::Text(text) => format!("`{}`", text.replace('`', "\\`")),
        })
        .collect::<Vec<_>>()
        .join(" + ")
}

fn find_widget_mut<'a>(node: &'a mut Value, widget_id: &str) -> Option<&'a mut Value> {
    if node.get(WIDGET_ID_KEY).and_then(Value::as_str) == Some(widget_id) {
        return Some(node);
    }

    node.get_mut(WIDGET_CHILDREN_KEY)
        .and_then(Value::as_array_mut)?
        .iter_mut()
        .find_map(|child| find_widget_mut(child, widget_id))
}

fn set_path(target: &mut Value, path: &[String], value: Value) {
    let mut current = target;
    let mut parts = path.iter().peekable();

    while let Some(part) = parts.next() {
        if !current.is_object() {
            *current = Value::Object(Map::new());
        }
        let Some(object) = current.as_object_mut() else {
            return;
        };

        if parts.peek().is_none() {
            object.insert(part.clone(), value);
            return;
        }

        current = object
            .entry(part.clone())
            .or_insert_with(|| Value::Object(Map::new()));
    }
}

#[cfg(test)]
mod tests {
    use appbundle_core::AppResult;
    use serde_json::json;

    use super::{
        BindingSegment, apply_property_updates, combine_dynamic_bindings, properties_to_reset,
        property_path, split_dynamic_bindings,
    };
    use crate::page::Layout;

    #[test]
    fn splits_text_and_nested_bindings() {
        let segments = split_dynamic_bindings("Hi {{ user.name }} {{ {a: 1}.a }}!");
        assert_eq!(
            segments,
            vec![
                BindingSegment::Text("Hi "),
                BindingSegment::Binding("user.name"),
                BindingSegment::Text(" "),
                BindingSegment::Binding("{a: 1}.a"),
                BindingSegment::Text("!"),
            ]
        );
    }

    #[test]
    fn combines_bindings_into_one_expression() {
        let segments = split_dynamic_bindings("{{appsmith.theme.colors.primaryColor}}");
        assert_eq!(
            combine_dynamic_bindings(&segments),
            "appsmith.theme.colors.primaryColor"
        );

        let mixed = split_dynamic_bindings("px-{{size}}");
        assert_eq!(combine_dynamic_bindings(&mixed), "`px-` + size");
    }

    #[test]
    fn resets_plain_widget_properties() -> AppResult<()> {
        let layout = Layout::new(
            "layout-1",
            json!({
                "widgetId": "0",
                "type": "CANVAS_WIDGET",
                "children": [
                    {
                        "widgetId": "w1",
                        "widgetName": "Button1",
                        "type": "BUTTON_WIDGET",
                        "buttonColor": "#000000",
                        "borderRadius": "0px"
                    }
                ]
            }),
        )?;
        let stylesheet = json!({
            "BUTTON_WIDGET": {
                "buttonColor": "{{appsmith.theme.colors.primaryColor}}",
                "borderRadius": "0px"
            }
        });

        let updates = properties_to_reset(&layout, &stylesheet);
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].widget_id, "w1");
        assert_eq!(
            updates[0].modify.get(&property_path(&["buttonColor"])),
            Some(&json!("{{appsmith.theme.colors.primaryColor}}"))
        );
        assert!(!updates[0].modify.contains_key(&property_path(&["borderRadius"])));
        Ok(())
    }

    #[test]
    fn table_columns_map_over_sanitized_rows() -> AppResult<()> {
        let layout = Layout::new(
            "layout-1",
            json!({
                "widgetId": "t1",
                "widgetName": "Table1",
                "type": "TABLE_WIDGET",
                "childStylesheet": {
                    "button": { "buttonColor": "{{appsmith.theme.colors.primaryColor}}" }
                },
                "primaryColumns": {
                    "action": { "columnType": "button", "buttonColor": "#ff0000" }
                }
            }),
        )?;
        let stylesheet = json!({ "TABLE_WIDGET": { "childStylesheet": {} } });

        let updates = properties_to_reset(&layout, &stylesheet);
        assert_eq!(updates.len(), 1);
        assert_eq!(
            updates[0].modify
                .get(&property_path(&["primaryColumns", "action", "buttonColor"])),
            Some(&json!(
                "{{Table1.sanitizedTableData.map((currentRow) => ( appsmith.theme.colors.primaryColor))}}"
            ))
        );
        Ok(())
    }

    #[test]
    fn group_buttons_and_form_buttons_are_reset() -> AppResult<()> {
        let layout = Layout::new(
            "layout-1",
            json!({
                "widgetId": "0",
                "type": "CANVAS_WIDGET",
                "children": [
                    {
                        "widgetId": "g1",
                        "type": "BUTTON_GROUP_WIDGET",
                        "groupButtons": { "one": { "buttonColor": "red" } }
                    },
                    {
                        "widgetId": "f1",
                        "type": "JSON_FORM_WIDGET",
                        "submitButtonStyles": { "buttonColor": "red" },
                        "resetButtonStyles": { "buttonColor": "blue" },
                        "schema": {
                            "__root_schema__": {
                                "fieldType": "Object",
                                "children": {
                                    "email": { "fieldType": "Email Input", "accentColor": "red" }
                                }
                            }
                        }
                    }
                ]
            }),
        )?;
        let stylesheet = json!({
            "BUTTON_GROUP_WIDGET": { "childStylesheet": { "button": { "buttonColor": "blue" } } },
            "JSON_FORM_WIDGET": {
                "submitButtonStyles": { "buttonColor": "blue" },
                "resetButtonStyles": { "buttonColor": "blue" },
                "childStylesheet": { "Email Input": { "accentColor": "blue" } }
            }
        });

        let updates = properties_to_reset(&layout, &stylesheet);
        assert_eq!(updates.len(), 2);
        assert_eq!(
            updates[0]
                .modify
                .get(&property_path(&["groupButtons", "one", "buttonColor"])),
            Some(&json!("blue"))
        );
        assert_eq!(
            updates[1]
                .modify
                .get(&property_path(&["submitButtonStyles", "buttonColor"])),
            Some(&json!("blue"))
        );
        assert!(
            !updates[1]
                .modify
                .contains_key(&property_path(&["resetButtonStyles", "buttonColor"]))
        );
        assert_eq!(
            updates[1]
                .modify
                .get(&property_path(&[
                    "schema",
                    "__root_schema__",
                    "children",
                    "email",
                    "accentColor",
                ])),
            Some(&json!("blue"))
        );
        Ok(())
    }

    #[test]
    fn applies_updates_to_nested_paths() -> AppResult<()> {
        let layout = Layout::new(
            "layout-1",
            json!({
                "widgetId": "0",
                "type": "CANVAS_WIDGET",
                "children": [
                    {
                        "widgetId": "g1",
                        "type": "BUTTON_GROUP_WIDGET",
                        "groupButtons": { "one": { "buttonColor": "red" } }
                    }
                ]
            }),
        )?;
        let stylesheet = json!({
            "BUTTON_GROUP_WIDGET": { "childStylesheet": { "button": { "buttonColor": "blue" } } }
        });
        let updates = properties_to_reset(&layout, &stylesheet);

        let mut dsl = layout.dsl().clone();
        apply_property_updates(&mut dsl, &updates);

        assert_eq!(
            dsl["children"][0]["groupButtons"]["one"]["buttonColor"],
            json!("blue")
        );
        Ok(())
    }

    #[test]
    fn dotted_column_keys_are_written_in_place() -> AppResult<()> {
        let layout = Layout::new(
            "layout-1",
            json!({
                "widgetId": "t1",
                "widgetName": "Table1",
                "type": "TABLE_WIDGET",
                "childStylesheet": { "text": { "cellBackground": "{{appsmith.theme.colors.backgroundColor}}" } },
                "primaryColumns": {
                    "order.id": { "columnType": "text", "cellBackground": "red" }
                }
            }),
        )?;
        let stylesheet = json!({ "TABLE_WIDGET": {} });

        let updates = properties_to_reset(&layout, &stylesheet);
        let mut dsl = layout.dsl().clone();
        apply_property_updates(&mut dsl, &updates);

        assert_eq!(
            dsl["primaryColumns"]["order.id"]["cellBackground"],
            json!(
                "{{Table1.sanitizedTableData.map((currentRow) => ( appsmith.theme.colors.backgroundColor))}}"
            )
        );
        assert!(dsl["primaryColumns"].get("order").is_none());
        Ok(())
    }
}
