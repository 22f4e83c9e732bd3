#![forbid(unsafe_code)]

use crate::document::JsonMap;
use serde_json::Value as JsonValue;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidationFailure {
    pub schema_path: String,
    pub reason: String,
}

impl ValidationFailure {
    pub fn new(schema_path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            schema_path: schema_path.into(),
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (at {})", self.reason, self.schema_path)
    }
}

impl std::error::Error for ValidationFailure {}

/// Black-box JSON-Schema engine. `schema` is the document's `$schema` value.
pub trait SchemaValidator {
    fn validate(&self, document: &JsonMap, schema: &JsonValue) -> Result<(), ValidationFailure>;
}

impl<F> SchemaValidator for F
where
    F: Fn(&JsonMap, &JsonValue) -> Result<(), ValidationFailure>,
{
    fn validate(&self, document: &JsonMap, schema: &JsonValue) -> Result<(), ValidationFailure> {
        self(document, schema)
    }
}

/// Decides whether a render change must be published as a new item type tag.
pub trait UpgradeCheck {
    fn needs_upgrade(&self, old_render: Option<&JsonValue>, new_render: Option<&JsonValue>)
    -> bool;
}

impl<F> UpgradeCheck for F
where
    F: Fn(Option<&JsonValue>, Option<&JsonValue>) -> bool,
{
    fn needs_upgrade(
        &self,
        old_render: Option<&JsonValue>,
        new_render: Option<&JsonValue>,
    ) -> bool {
        self(old_render, new_render)
    }
}

/// Structural comparison of render configs: the field sets of `meta_fix` and
/// `meta_list` must match, and every listed field must keep its
/// `input_type` and `option.multiple`.
#[derive(Clone, Copy, Debug, Default)]
pub struct RenderStructureCheck;

impl UpgradeCheck for RenderStructureCheck {
    fn needs_upgrade(
        &self,
        old_render: Option<&JsonValue>,
        new_render: Option<&JsonValue>,
    ) -> bool {
        let Some(old) = old_render.and_then(JsonValue::as_object) else {
            return false;
        };
        let Some(new) = new_render.and_then(JsonValue::as_object) else {
            return true;
        };

        for section in ["meta_fix", "meta_list"] {
            if !same_keys(old.get(section), new.get(section)) {
                return true;
            }
        }

        let (Some(old_list), Some(new_list)) = (
            old.get("meta_list").and_then(JsonValue::as_object),
            new.get("meta_list").and_then(JsonValue::as_object),
        ) else {
            return false;
        };
        old_list.iter().any(|(key, old_field)| {
            let new_field = new_list.get(key);
            field_attr(Some(old_field), &["input_type"]) != field_attr(new_field, &["input_type"])
                || field_attr(Some(old_field), &["option", "multiple"])
                    != field_attr(new_field, &["option", "multiple"])
        })
    }
}

fn same_keys(old: Option<&JsonValue>, new: Option<&JsonValue>) -> bool {
    let keys = |value: Option<&JsonValue>| -> Vec<String> {
        let mut keys: Vec<String> = value
            .and_then(JsonValue::as_object)
            .map(|map| map.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    };
    keys(old) == keys(new)
}

fn field_attr<'a>(field: Option<&'a JsonValue>, path: &[&str]) -> Option<&'a JsonValue> {
    path.iter()
        .try_fold(field?, |current, key| current.get(*key))
        .filter(|value| !value.is_null())
}

/// Drops falsy `required` constraints from a schema, recursing through
/// `properties` and array `items` at every depth.
pub fn strip_empty_required(schema: &mut JsonMap) {
    if schema.get("required").is_some_and(is_falsy) {
        schema.shift_remove("required");
    }
    if let Some(JsonValue::Object(properties)) = schema.get_mut("properties") {
        for property in properties.values_mut() {
            if let JsonValue::Object(property) = property {
                strip_empty_required(property);
            }
        }
    }
    if let Some(JsonValue::Object(items)) = schema.get_mut("items") {
        strip_empty_required(items);
    }
}

fn is_falsy(value: &JsonValue) -> bool {
    match value {
        JsonValue::Null => true,
        JsonValue::Bool(flag) => !flag,
        JsonValue::Number(number) => number.as_f64() == Some(0.0),
        JsonValue::String(text) => text.is_empty(),
        JsonValue::Array(items) => items.is_empty(),
        JsonValue::Object(map) => map.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: JsonValue) -> JsonMap {
        match value {
            JsonValue::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn strips_empty_required_at_every_depth() {
        let mut schema = map(json!({
            "type": "object",
            "required": [],
            "properties": {
                "creators": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "required": [],
                        "properties": {
                            "names": {
                                "type": "array",
                                "items": {"type": "object", "required": [], "properties": {}}
                            },
                            "affiliation": {"type": "object", "required": []}
                        }
                    }
                },
                "title": {"type": "string"}
            }
        }));
        strip_empty_required(&mut schema);

        assert!(!schema.contains_key("required"));
        let items = &schema["properties"]["creators"]["items"];
        assert!(items.get("required").is_none());
        assert!(items["properties"]["names"]["items"].get("required").is_none());
        assert!(items["properties"]["affiliation"].get("required").is_none());
    }

    #[test]
    fn keeps_non_empty_required() {
        let mut schema = map(json!({
            "required": ["title"],
            "properties": {"files": {"items": {"required": ["url"]}}}
        }));
        strip_empty_required(&mut schema);
        assert_eq!(schema["required"], json!(["title"]));
        assert_eq!(
            schema["properties"]["files"]["items"]["required"],
            json!(["url"])
        );
    }

    #[test]
    fn render_check_detects_structural_changes() {
        let check = RenderStructureCheck;
        let old = json!({
            "meta_fix": {"pubdate": {}},
            "meta_list": {"item_1": {"input_type": "text", "option": {"multiple": false}}}
        });

        assert!(!check.needs_upgrade(Some(&old), Some(&old.clone())));
        assert!(!check.needs_upgrade(None, Some(&old)));
        assert!(check.needs_upgrade(Some(&old), None));

        let added_field = json!({
            "meta_fix": {"pubdate": {}},
            "meta_list": {
                "item_1": {"input_type": "text", "option": {"multiple": false}},
                "item_2": {"input_type": "text"}
            }
        });
        assert!(check.needs_upgrade(Some(&old), Some(&added_field)));

        let retyped = json!({
            "meta_fix": {"pubdate": {}},
            "meta_list": {"item_1": {"input_type": "cus_1", "option": {"multiple": false}}}
        });
        assert!(check.needs_upgrade(Some(&old), Some(&retyped)));

        let multiple = json!({
            "meta_fix": {"pubdate": {}},
            "meta_list": {"item_1": {"input_type": "text", "option": {"multiple": true}}}
        });
        assert!(check.needs_upgrade(Some(&old), Some(&multiple)));

        let relabeled = json!({
            "meta_fix": {"pubdate": {}},
            "meta_list": {
                "item_1": {"input_type": "text", "title": "Title", "option": {"multiple": false}}
            }
        });
        assert!(!check.needs_upgrade(Some(&old), Some(&relabeled)));
    }

    #[test]
    fn closures_act_as_validators() {
        let validator = |doc: &JsonMap, _schema: &JsonValue| -> Result<(), ValidationFailure> {
            if doc.contains_key("title") {
                Ok(())
            } else {
                Err(ValidationFailure::new("#/required", "'title' is a required property"))
            }
        };
        let schema = json!("https://example.org/schemas/item.json");
        assert!(validator.validate(&map(json!({"title": "x"})), &schema).is_ok());
        let err = validator.validate(&JsonMap::new(), &schema).unwrap_err();
        assert_eq!(err.schema_path, "#/required");
    }
}
