//! Strict mode: object schemas that say nothing about extra properties are
//! closed with `additionalProperties: false`.

use serde_json::{Map, Value};

const SCHEMA_MAP_KEYWORDS: [&str; 6] = [
    "properties",
    "patternProperties",
    "dependentSchemas",
    "dependencies",
    "$defs",
    "definitions",
];

const SCHEMA_KEYWORDS: [&str; 11] = [
    "propertyNames",
    "additionalProperties",
    "unevaluatedProperties",
    "items",
    "contains",
    "additionalItems",
    "unevaluatedItems",
    "not",
    "if",
    "then",
    "else",
];

const SCHEMA_LIST_KEYWORDS: [&str; 4] = ["prefixItems", "allOf", "anyOf", "oneOf"];

const OBJECT_KEYWORDS: [&str; 8] = [
    "properties",
    "patternProperties",
    "additionalProperties",
    "unevaluatedProperties",
    "required",
    "dependentRequired",
    "dependentSchemas",
    "propertyNames",
];

pub(crate) fn close_object_schemas(schema: &mut Value) {
    match schema {
        Value::Object(map) => {
            if describes_object(map) && !map.contains_key("additionalProperties") {
                map.insert("additionalProperties".to_string(), Value::Bool(false));
            }
            for keyword in SCHEMA_MAP_KEYWORDS {
                if let Some(Value::Object(children)) = map.get_mut(keyword) {
                    children.values_mut().for_each(close_object_schemas);
                }
            }
            for keyword in SCHEMA_KEYWORDS.iter().chain(SCHEMA_LIST_KEYWORDS.iter()) {
                if let Some(child) = map.get_mut(*keyword) {
                    close_object_schemas(child);
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(close_object_schemas),
        _ => {}
    }
}

/// Direct subschemas of a schema object, found through its applicator keywords.
///
/// Keys of `properties` and the other schema maps are names, not keywords.
pub(crate) fn subschemas<'a>(map: &'a Map<String, Value>) -> impl Iterator<Item = &'a Value> + 'a {
    let schema_maps: &'static [&str] = &SCHEMA_MAP_KEYWORDS;
    let schema_values: &'static [&str] = &SCHEMA_KEYWORDS;
    let schema_lists: &'static [&str] = &SCHEMA_LIST_KEYWORDS;

    let in_maps = schema_maps
        .iter()
        .filter_map(move |keyword| map.get(*keyword))
        .filter_map(Value::as_object)
        .flat_map(|children| children.values());
    let direct = schema_values
        .iter()
        .chain(schema_lists)
        .filter_map(move |keyword| map.get(*keyword))
        .flat_map(|child| match child {
            Value::Array(items) => items.iter(),
            other => std::slice::from_ref(other).iter(),
        });
    in_maps.chain(direct)
}

fn describes_object(map: &Map<String, Value>) -> bool {
    match map.get("type") {
        Some(Value::String(kind)) => kind == "object",
        Some(Value::Array(kinds)) => kinds.iter().any(|kind| kind == "object"),
        _ => OBJECT_KEYWORDS.iter().any(|keyword| map.contains_key(*keyword)),
    }
}
