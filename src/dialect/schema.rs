//! Schema keyword translation
//!
//! Schemas are held in OpenAPI 3.0 form. Each function here rewrites a
//! schema (and every nested subschema) between that form and one dialect.

use serde_json::{json, Map, Value};

/// Keywords holding a single subschema
const SINGLE: [&str; 4] = ["items", "additionalProperties", "not", "contains"];

/// Keywords holding a list of subschemas
const LISTS: [&str; 3] = ["allOf", "oneOf", "anyOf"];

/// Keywords holding a map of name → subschema
const MAPS: [&str; 3] = ["properties", "patternProperties", "definitions"];

/// Swagger 2.0 has no `oneOf`/`anyOf`; they survive as vendor extensions
const SWAGGER_COMPOSITIONS: [(&str, &str); 2] = [("oneOf", "x-oneOf"), ("anyOf", "x-anyOf")];

/// Apply `f` to `schema` and every subschema below it, parents first
pub fn visit_schemas_mut(schema: &mut Value, f: &mut dyn FnMut(&mut Map<String, Value>)) {
    let Value::Object(object) = schema else {
        return;
    };
    f(object);

    for key in SINGLE {
        if let Some(child) = object.get_mut(key) {
            visit_schemas_mut(child, f);
        }
    }
    for key in LISTS.iter().copied().chain(SWAGGER_COMPOSITIONS.iter().map(|(_, x)| *x)) {
        if let Some(Value::Array(children)) = object.get_mut(key) {
            for child in children {
                visit_schemas_mut(child, f);
            }
        }
    }
    for key in MAPS {
        if let Some(Value::Object(children)) = object.get_mut(key) {
            for child in children.values_mut() {
                visit_schemas_mut(child, f);
            }
        }
    }
}

/// Replace every `$ref` string below `value` for which `f` returns a
/// replacement. Walks arbitrary JSON, not just schema keywords.
pub fn rewrite_refs(value: &mut Value, f: &dyn Fn(&str) -> Option<String>) {
    match value {
        Value::Object(object) => {
            for (key, child) in object.iter_mut() {
                if key == "$ref" {
                    if let Some(replacement) = child.as_str().and_then(f) {
                        *child = Value::String(replacement);
                    }
                } else {
                    rewrite_refs(child, f);
                }
            }
        }
        Value::Array(items) => {
            for child in items {
                rewrite_refs(child, f);
            }
        }
        _ => {}
    }
}

// --- OpenAPI 3.1 ---

/// 3.0 → 3.1: `nullable` becomes a `"null"` type, `example` becomes
/// `examples`, boolean exclusive bounds become numeric.
pub fn to_openapi31(schema: &mut Value) {
    visit_schemas_mut(schema, &mut |object| {
        if object.remove("nullable").and_then(|v| v.as_bool()) == Some(true) {
            match object.remove("type") {
                Some(Value::String(t)) => {
                    object.insert("type".to_string(), json!([t, "null"]));
                }
                Some(Value::Array(mut types)) => {
                    if !types.iter().any(|t| t == "null") {
                        types.push(json!("null"));
                    }
                    object.insert("type".to_string(), Value::Array(types));
                }
                Some(other) => {
                    object.insert("type".to_string(), other);
                }
                None => {
                    let inner = std::mem::take(object);
                    object.insert("anyOf".to_string(), json!([Value::Object(inner), {"type": "null"}]));
                }
            }
        }

        if let Some(example) = object.remove("example") {
            object.insert("examples".to_string(), json!([example]));
        }

        for (flag, bound) in [("exclusiveMinimum", "minimum"), ("exclusiveMaximum", "maximum")] {
            match object.get(flag) {
                Some(Value::Bool(true)) => {
                    object.remove(flag);
                    if let Some(limit) = object.remove(bound) {
                        object.insert(flag.to_string(), limit);
                    }
                }
                Some(Value::Bool(false)) => {
                    object.remove(flag);
                }
                _ => {}
            }
        }
    });
}

/// 3.1 → 3.0, the inverse of [`to_openapi31`]
pub fn from_openapi31(schema: &mut Value) {
    visit_schemas_mut(schema, &mut |object| {
        if let Some(Value::Array(types)) = object.get("type") {
            let nullable = types.iter().any(|t| t == "null");
            let mut rest: Vec<Value> = types.iter().filter(|t| *t != "null").cloned().collect();
            object.remove("type");
            match rest.len() {
                0 => {}
                1 => {
                    object.insert("type".to_string(), rest.remove(0));
                }
                _ => {
                    let variants: Vec<Value> = rest.into_iter().map(|t| json!({ "type": t })).collect();
                    object.insert("anyOf".to_string(), Value::Array(variants));
                }
            }
            if nullable {
                object.insert("nullable".to_string(), Value::Bool(true));
            }
        }

        for key in ["anyOf", "oneOf"] {
            let Some(Value::Array(variants)) = object.get_mut(key) else {
                continue;
            };
            let before = variants.len();
            variants.retain(|v| v.get("type").and_then(Value::as_str) != Some("null"));
            if variants.len() == before {
                continue;
            }
            object.insert("nullable".to_string(), Value::Bool(true));
            // A lone remaining variant folds back into the schema itself
            if let Some(Value::Array(variants)) = object.get(key) {
                if variants.len() == 1 && object.len() == 2 {
                    if let Some(Value::Object(only)) = variants.first().cloned() {
                        object.remove(key);
                        for (k, v) in only {
                            object.insert(k, v);
                        }
                    }
                }
            }
        }

        if let Some(examples) = object.remove("examples") {
            let first = match examples {
                Value::Array(mut values) if !values.is_empty() => Some(values.remove(0)),
                Value::Array(_) => None,
                other => Some(other),
            };
            if let Some(example) = first {
                object.entry("example").or_insert(example);
            }
        }

        if let Some(constant) = object.remove("const") {
            object.insert("enum".to_string(), json!([constant]));
        }

        // Keep whichever bound is stricter; the flag only marks an exclusive one
        for (flag, bound, lower) in [("exclusiveMinimum", "minimum", true), ("exclusiveMaximum", "maximum", false)] {
            let Some(limit) = object.get(flag).filter(|v| v.is_number()).cloned() else {
                continue;
            };
            let exclusive_wins = match (limit.as_f64(), object.get(bound).and_then(Value::as_f64)) {
                (Some(exclusive), Some(inclusive)) if lower => exclusive >= inclusive,
                (Some(exclusive), Some(inclusive)) => exclusive <= inclusive,
                _ => true,
            };
            if exclusive_wins {
                object.insert(bound.to_string(), limit);
                object.insert(flag.to_string(), Value::Bool(true));
            } else {
                object.remove(flag);
            }
        }
    });
}

// --- Swagger 2.0 ---

/// 3.0 → Swagger 2.0 schema object
pub fn to_swagger(schema: &mut Value) {
    visit_schemas_mut(schema, &mut |object| {
        if let Some(nullable) = object.remove("nullable") {
            object.insert("x-nullable".to_string(), nullable);
        }
        for (keyword, extension) in SWAGGER_COMPOSITIONS {
            if let Some(variants) = object.remove(keyword) {
                object.insert(extension.to_string(), variants);
            }
        }
        // Swagger 2.0 only knows readOnly
        object.remove("writeOnly");
    });
}

/// Swagger 2.0 → 3.0 schema object
pub fn from_swagger(schema: &mut Value) {
    visit_schemas_mut(schema, &mut |object| {
        if let Some(nullable) = object.remove("x-nullable") {
            object.insert("nullable".to_string(), nullable);
        }
        for (keyword, extension) in SWAGGER_COMPOSITIONS {
            if let Some(variants) = object.remove(extension) {
                object.insert(keyword.to_string(), variants);
            }
        }
    });
}
