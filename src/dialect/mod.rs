//! Dialect Codec
//!
//! Translates between external API description documents and the
//! dialect-neutral [`SpecDocument`].
//!
//! | Dialect | Declared by | Shared definitions |
//! |---------|-------------|--------------------|
//! | Swagger 2.0 | `swagger: "2.0"` | `definitions`, `responses`, `parameters` |
//! | OpenAPI 3.0.x | `openapi: "3.0.*"` | `components.*` |
//! | OpenAPI 3.1.x | `openapi: "3.1.*"` | `components.*` |
//!
//! Schemas inside the model follow OpenAPI 3.0 conventions (`nullable`,
//! single `example`, boolean `exclusiveMinimum`); each handler translates
//! keywords on the way in and out (see [`schema`]).

pub mod openapi;
pub mod schema;
pub mod swagger;

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use semver::Version;
use serde_json::{Map, Number, Value};

use crate::config::OutputFormat;
use crate::error::{InterchangeError, Result};
use crate::model::{
    CollectItem, ContentNode, HttpOperation, Paragraph, Parameter, ParameterLocation, SpecDocument,
};
use crate::reference::ReferenceDomain;

/// HTTP methods recognised as operations under a path item
pub const METHODS: [&str; 8] = ["get", "put", "post", "delete", "options", "head", "patch", "trace"];

/// Operation extension carrying free-form paragraphs of a document
pub const PARAGRAPHS_EXTENSION: &str = "x-paragraphs";

/// A family of wire formats, as detected on decode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    Swagger2,
    OpenApi30,
    OpenApi31,
}

impl Dialect {
    pub fn name(&self) -> &'static str {
        match self {
            Dialect::Swagger2 => "Swagger 2.0",
            Dialect::OpenApi30 => "OpenAPI 3.0",
            Dialect::OpenApi31 => "OpenAPI 3.1",
        }
    }

    /// Inspect the version declaration of a parsed document
    pub fn detect(document: &Value) -> Result<Self> {
        let root = document
            .as_object()
            .ok_or_else(|| InterchangeError::malformed("API description", "document root is not an object"))?;

        if let Some(declared) = root.get("swagger") {
            return match declared.as_str() {
                Some("2.0") => Ok(Dialect::Swagger2),
                _ => Err(InterchangeError::UnsupportedDialect(format!("swagger {}", declared))),
            };
        }

        if let Some(declared) = root.get("openapi") {
            let declared = declared
                .as_str()
                .ok_or_else(|| InterchangeError::UnsupportedDialect(format!("openapi {}", declared)))?;
            let version = parse_lenient(declared)
                .ok_or_else(|| InterchangeError::UnsupportedDialect(format!("openapi {}", declared)))?;
            return match (version.major, version.minor) {
                (3, 0) => Ok(Dialect::OpenApi30),
                (3, 1) => Ok(Dialect::OpenApi31),
                _ => Err(InterchangeError::UnsupportedDialect(format!("openapi {}", declared))),
            };
        }

        Err(InterchangeError::malformed(
            "API description",
            "no `swagger` or `openapi` version declaration",
        ))
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Dialect {
    type Err = InterchangeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "swagger" | "swagger2" | "2.0" => Ok(Dialect::Swagger2),
            "openapi3.0" | "openapi30" | "3.0" => Ok(Dialect::OpenApi30),
            "openapi3.1" | "openapi31" | "3.1" => Ok(Dialect::OpenApi31),
            other => Err(InterchangeError::UnsupportedDialect(other.to_string())),
        }
    }
}

/// A dialect version that can be produced on encode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DialectVersion {
    Swagger20,
    OpenApi300,
    OpenApi301,
    /// Any 3.1 patch release
    OpenApi31(u64),
}

impl DialectVersion {
    pub fn dialect(&self) -> Dialect {
        match self {
            DialectVersion::Swagger20 => Dialect::Swagger2,
            DialectVersion::OpenApi300 | DialectVersion::OpenApi301 => Dialect::OpenApi30,
            DialectVersion::OpenApi31(_) => Dialect::OpenApi31,
        }
    }

    /// The value written into the version declaration field
    pub fn declaration(&self) -> String {
        match self {
            DialectVersion::Swagger20 => "2.0".to_string(),
            DialectVersion::OpenApi300 => "3.0.0".to_string(),
            DialectVersion::OpenApi301 => "3.0.1".to_string(),
            DialectVersion::OpenApi31(patch) => format!("3.1.{}", patch),
        }
    }
}

impl fmt::Display for DialectVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.declaration())
    }
}

impl FromStr for DialectVersion {
    type Err = InterchangeError;

    /// Accepts `2.0`, `3.0.0`, `3.0.1`, `3.1`, `3.1.x` and any `3.1.<patch>`
    fn from_str(s: &str) -> Result<Self> {
        let unsupported = || InterchangeError::UnsupportedDialect(s.to_string());
        if s == "2.0" {
            return Ok(DialectVersion::Swagger20);
        }
        if s == "3.1.x" {
            return Ok(DialectVersion::OpenApi31(0));
        }
        let version = parse_lenient(s).ok_or_else(unsupported)?;
        match (version.major, version.minor, version.patch) {
            (3, 0, 0) => Ok(DialectVersion::OpenApi300),
            (3, 0, 1) => Ok(DialectVersion::OpenApi301),
            (3, 1, patch) => Ok(DialectVersion::OpenApi31(patch)),
            _ => Err(unsupported()),
        }
    }
}

/// Parse `3`, `3.1` or `3.1.0` style version strings
fn parse_lenient(raw: &str) -> Option<Version> {
    let parts = raw.trim().split('.').count();
    let padded = match parts {
        1 => format!("{}.0.0", raw.trim()),
        2 => format!("{}.0", raw.trim()),
        _ => raw.trim().to_string(),
    };
    Version::parse(&padded).ok()
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Decode an API description (JSON or YAML). When `hint` is given the
/// document must declare that dialect.
pub fn decode(bytes: &[u8], hint: Option<Dialect>) -> Result<SpecDocument> {
    let document = parse_document(bytes)?;
    decode_value(&document, hint)
}

/// Decode an already parsed document
pub fn decode_value(document: &Value, hint: Option<Dialect>) -> Result<SpecDocument> {
    let detected = Dialect::detect(document)?;
    if let Some(expected) = hint {
        if expected != detected {
            return Err(InterchangeError::malformed(
                expected.name(),
                format!("document declares {}", detected),
            ));
        }
    }

    let decoded = match detected {
        Dialect::Swagger2 => swagger::decode(document)?,
        Dialect::OpenApi30 | Dialect::OpenApi31 => openapi::decode(document, detected)?,
    };
    tracing::info!(
        dialect = %detected,
        schemas = decoded.definitions.schemas.len(),
        operations = decoded.documents().len(),
        "document decoded"
    );
    Ok(decoded)
}

/// Encode into pretty-printed JSON
pub fn encode(document: &SpecDocument, version: DialectVersion) -> Result<Vec<u8>> {
    encode_as(document, version, OutputFormat::Pretty)
}

/// Encode into the requested layout
pub fn encode_as(document: &SpecDocument, version: DialectVersion, format: OutputFormat) -> Result<Vec<u8>> {
    let value = encode_value(document, version)?;
    let bytes = match format {
        OutputFormat::Pretty => serde_json::to_vec_pretty(&value)?,
        OutputFormat::Compact => serde_json::to_vec(&value)?,
        OutputFormat::Yaml => serde_yaml::to_string(&value)?.into_bytes(),
    };
    Ok(bytes)
}

/// Encode into a JSON value
pub fn encode_value(document: &SpecDocument, version: DialectVersion) -> Result<Value> {
    let encoded = match version {
        DialectVersion::Swagger20 => swagger::encode(document)?,
        DialectVersion::OpenApi300 | DialectVersion::OpenApi301 | DialectVersion::OpenApi31(_) => {
            openapi::encode(document, version)?
        }
    };
    tracing::info!(%version, "document encoded");
    Ok(encoded)
}

/// Parse JSON or YAML bytes into a JSON value
pub fn parse_document(bytes: &[u8]) -> Result<Value> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| InterchangeError::malformed("API description", format!("not UTF-8: {}", e)))?;
    if text.trim_start().starts_with('{') {
        return Ok(serde_json::from_str(text)?);
    }
    let yaml: serde_yaml::Value = serde_yaml::from_str(text)?;
    yaml_to_json(yaml)
}

/// YAML allows non-string keys (`200:` under `responses`); JSON does not.
fn yaml_to_json(value: serde_yaml::Value) -> Result<Value> {
    Ok(match value {
        serde_yaml::Value::Null => Value::Null,
        serde_yaml::Value::Bool(b) => Value::Bool(b),
        serde_yaml::Value::Number(n) => yaml_number(&n),
        serde_yaml::Value::String(s) => Value::String(s),
        serde_yaml::Value::Sequence(items) => {
            Value::Array(items.into_iter().map(yaml_to_json).collect::<Result<_>>()?)
        }
        serde_yaml::Value::Mapping(mapping) => {
            let mut object = Map::with_capacity(mapping.len());
            for (key, value) in mapping {
                let key = match key {
                    serde_yaml::Value::String(s) => s,
                    serde_yaml::Value::Number(n) => n.to_string(),
                    serde_yaml::Value::Bool(b) => b.to_string(),
                    other => {
                        return Err(InterchangeError::malformed(
                            "API description",
                            format!("unsupported mapping key {:?}", other),
                        ))
                    }
                };
                object.insert(key, yaml_to_json(value)?);
            }
            Value::Object(object)
        }
        serde_yaml::Value::Tagged(tagged) => yaml_to_json(tagged.value)?,
    })
}

fn yaml_number(n: &serde_yaml::Number) -> Value {
    if let Some(i) = n.as_i64() {
        Value::Number(i.into())
    } else if let Some(u) = n.as_u64() {
        Value::Number(u.into())
    } else {
        n.as_f64()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

// ---------------------------------------------------------------------------
// Helpers shared by the handlers
// ---------------------------------------------------------------------------

pub(crate) fn str_field(object: &Map<String, Value>, key: &str) -> Option<String> {
    object.get(key).and_then(Value::as_str).map(str::to_string)
}

pub(crate) fn bool_field(object: &Map<String, Value>, key: &str) -> bool {
    object.get(key).and_then(Value::as_bool).unwrap_or(false)
}

pub(crate) fn object_field<'v>(object: &'v Map<String, Value>, key: &str) -> Option<&'v Map<String, Value>> {
    object.get(key).and_then(Value::as_object)
}

/// Insert `value` under `key` unless it is `None`
pub(crate) fn put_opt(object: &mut Map<String, Value>, key: &str, value: Option<&String>) {
    if let Some(value) = value {
        object.insert(key.to_string(), Value::String(value.clone()));
    }
}

fn sanitize_key(raw: &str) -> String {
    raw.chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect()
}

/// Wire key under which a global parameter is shared: the key it was
/// decoded from, else `{location}.{name}`
pub(crate) fn global_key(parameter: &Parameter) -> String {
    match &parameter.key {
        Some(key) => sanitize_key(key),
        None => format!("{}.{}", parameter.location, sanitize_key(&parameter.name)),
    }
}

/// Identity of a global parameter within its location domain. Two globals
/// may share a name, never a key.
pub(crate) fn global_token(parameter: &Parameter) -> String {
    match &parameter.key {
        Some(key) => sanitize_key(key),
        None => parameter.name.clone(),
    }
}

/// Internal reference of a global parameter
pub(crate) fn global_reference(parameter: &Parameter) -> String {
    ReferenceDomain::GlobalParameter(parameter.location).reference(&global_token(parameter))
}

/// The globals an operation uses, indexed by wire key
pub(crate) struct GlobalIndex {
    entries: Vec<(String, Parameter)>,
}

impl GlobalIndex {
    pub(crate) fn new(entries: Vec<(String, Parameter)>) -> Self {
        Self { entries }
    }

    pub(crate) fn contains(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    /// References of every global not in `used`
    pub(crate) fn excluded(&self, used: &HashSet<String>) -> Vec<String> {
        self.entries
            .iter()
            .filter(|(key, _)| !used.contains(key))
            .map(|(_, p)| global_reference(p))
            .collect()
    }

    pub(crate) fn into_parameters(self) -> Vec<Parameter> {
        self.entries.into_iter().map(|(_, p)| p).collect()
    }
}

/// Globals that apply to an operation, in document order
pub(crate) fn applicable_globals<'d>(document: &'d SpecDocument, operation: &HttpOperation) -> Vec<&'d Parameter> {
    document
        .globals
        .iter()
        .filter(|g| !operation.excluded_globals.contains(&global_reference(g)))
        .collect()
}

/// Title for a decoded operation: summary, then operationId, then `METHOD path`
pub(crate) fn operation_title(operation: &Map<String, Value>, method: &str, path: &str) -> String {
    str_field(operation, "summary")
        .or_else(|| str_field(operation, "operationId"))
        .unwrap_or_else(|| format!("{} {}", method.to_ascii_uppercase(), path))
}

/// Build the document item for one decoded operation
pub(crate) fn operation_item(
    operation: &Map<String, Value>,
    meta: HttpOperation,
    mut content: Vec<ContentNode>,
) -> CollectItem {
    let title = operation_title(operation, &meta.method, &meta.path);
    content.insert(0, ContentNode::Operation(meta));
    if let Some(paragraphs) = operation.get(PARAGRAPHS_EXTENSION).and_then(Value::as_array) {
        content.extend(
            paragraphs
                .iter()
                .filter_map(Value::as_str)
                .map(|text| ContentNode::Paragraph(Paragraph { text: text.to_string() })),
        );
    }

    let mut item = CollectItem::document(title, content);
    if let Some(tags) = operation.get("tags").and_then(Value::as_array) {
        for tag in tags.iter().filter_map(Value::as_str) {
            item.add_tag(tag);
        }
    }
    item
}

/// Fields common to every encoded operation object
pub(crate) fn operation_object(item: &CollectItem, operation: &HttpOperation) -> Map<String, Value> {
    let mut object = Map::new();
    if !item.tags.is_empty() {
        object.insert(
            "tags".to_string(),
            Value::Array(item.tags.iter().cloned().map(Value::String).collect()),
        );
    }
    object.insert("summary".to_string(), Value::String(item.title.clone()));
    put_opt(&mut object, "operationId", operation.operation_id.as_ref());
    put_opt(&mut object, "description", operation.description.as_ref());
    if operation.deprecated {
        object.insert("deprecated".to_string(), Value::Bool(true));
    }

    let paragraphs: Vec<Value> = item
        .content
        .iter()
        .filter_map(|node| match node {
            ContentNode::Paragraph(p) => Some(Value::String(p.text.clone())),
            _ => None,
        })
        .collect();
    if !paragraphs.is_empty() {
        object.insert(PARAGRAPHS_EXTENSION.to_string(), Value::Array(paragraphs));
    }
    object
}

/// Merge path-level parameters into an operation's own list; the operation
/// wins when both declare the same `(name, in)`.
pub(crate) fn merged_parameters<'v>(path_item: &'v Map<String, Value>, operation: &'v Map<String, Value>) -> Vec<&'v Value> {
    let own: Vec<&Value> = operation
        .get("parameters")
        .and_then(Value::as_array)
        .map(|a| a.iter().collect())
        .unwrap_or_default();
    let key = |p: &Value| (p.get("name").cloned(), p.get("in").cloned(), p.get("$ref").cloned());
    let own_keys: Vec<_> = own.iter().map(|p| key(*p)).collect();

    let mut merged: Vec<&Value> = path_item
        .get("parameters")
        .and_then(Value::as_array)
        .map(|a| a.iter().filter(|p| !own_keys.contains(&key(*p))).collect())
        .unwrap_or_default();
    merged.extend(own);
    merged
}

/// Operations tagged alike are grouped under a category named after their
/// first tag; untagged operations stay at the root.
pub(crate) fn group_by_first_tag(documents: Vec<CollectItem>) -> Vec<CollectItem> {
    let mut collections: Vec<CollectItem> = Vec::new();
    for document in documents {
        let Some(tag) = document.tags.first().cloned() else {
            collections.push(document);
            continue;
        };
        match collections.iter_mut().find(|c| c.is_category() && c.title == tag) {
            Some(category) => category.items.push(document),
            None => collections.push(CollectItem::category(tag, vec![document])),
        }
    }
    collections
}

pub(crate) fn parse_location(dialect: &str, value: Option<&str>) -> Result<ParameterLocation> {
    value
        .and_then(ParameterLocation::parse)
        .ok_or_else(|| InterchangeError::malformed(dialect, format!("unknown parameter location {:?}", value)))
}

/// Require `info` with a `title` and `version`
pub(crate) fn decode_info(dialect: &str, root: &Map<String, Value>) -> Result<crate::model::Info> {
    let info = object_field(root, "info").ok_or_else(|| InterchangeError::malformed(dialect, "missing `info`"))?;
    let title = str_field(info, "title").ok_or_else(|| InterchangeError::malformed(dialect, "missing `info.title`"))?;
    let version =
        str_field(info, "version").ok_or_else(|| InterchangeError::malformed(dialect, "missing `info.version`"))?;
    Ok(crate::model::Info {
        title,
        description: str_field(info, "description"),
        version,
    })
}

pub(crate) fn encode_info(info: &crate::model::Info) -> Value {
    let mut object = Map::new();
    object.insert("title".to_string(), Value::String(info.title.clone()));
    put_opt(&mut object, "description", info.description.as_ref());
    object.insert("version".to_string(), Value::String(info.version.clone()));
    Value::Object(object)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_detect_dialects() {
        assert_eq!(Dialect::detect(&json!({"swagger": "2.0"})).unwrap(), Dialect::Swagger2);
        assert_eq!(Dialect::detect(&json!({"openapi": "3.0.3"})).unwrap(), Dialect::OpenApi30);
        assert_eq!(Dialect::detect(&json!({"openapi": "3.1.0"})).unwrap(), Dialect::OpenApi31);
    }

    #[test]
    fn test_detect_rejects_unknown_versions() {
        assert!(matches!(
            Dialect::detect(&json!({"swagger": "1.2"})),
            Err(InterchangeError::UnsupportedDialect(_))
        ));
        assert!(matches!(
            Dialect::detect(&json!({"openapi": "4.0.0"})),
            Err(InterchangeError::UnsupportedDialect(_))
        ));
        assert!(matches!(
            Dialect::detect(&json!({"info": {}})),
            Err(InterchangeError::MalformedDocument { .. })
        ));
    }

    #[test]
    fn test_target_versions() {
        assert_eq!("2.0".parse::<DialectVersion>().unwrap(), DialectVersion::Swagger20);
        assert_eq!("3.0.0".parse::<DialectVersion>().unwrap(), DialectVersion::OpenApi300);
        assert_eq!("3.0.1".parse::<DialectVersion>().unwrap(), DialectVersion::OpenApi301);
        assert_eq!("3.1.x".parse::<DialectVersion>().unwrap(), DialectVersion::OpenApi31(0));
        assert_eq!("3.1".parse::<DialectVersion>().unwrap(), DialectVersion::OpenApi31(0));
        assert_eq!("3.1.1".parse::<DialectVersion>().unwrap().declaration(), "3.1.1");
        assert!("3.0.3".parse::<DialectVersion>().is_err());
        assert!("1.0".parse::<DialectVersion>().is_err());
    }

    #[test]
    fn test_hint_must_match_declaration() {
        let doc = json!({"swagger": "2.0", "info": {"title": "t", "version": "1"}, "paths": {}});
        let err = decode_value(&doc, Some(Dialect::OpenApi30)).unwrap_err();
        assert!(matches!(err, InterchangeError::MalformedDocument { .. }));
        assert!(decode_value(&doc, Some(Dialect::Swagger2)).is_ok());
    }

    #[test]
    fn test_yaml_integer_keys() {
        let yaml = b"openapi: 3.0.1\nresponses:\n  200:\n    description: ok\n";
        let value = parse_document(yaml).unwrap();
        assert_eq!(value["responses"]["200"]["description"], "ok");
    }

    #[test]
    fn test_global_key_sanitizes() {
        let parameter = Parameter {
            name: "X Trace/Id".to_string(),
            location: ParameterLocation::Header,
            required: false,
            description: None,
            deprecated: false,
            schema: Value::Null,
            key: None,
        };
        assert_eq!(global_key(&parameter), "header.X_Trace_Id");
    }

    #[test]
    fn test_shared_key_is_global_identity() {
        let shared = |key: &str, schema: Value| Parameter {
            name: "id".to_string(),
            location: ParameterLocation::Path,
            required: true,
            description: None,
            deprecated: false,
            schema,
            key: Some(key.to_string()),
        };
        let user = shared("userId", json!({"type": "integer"}));
        let pet = shared("petId", json!({"type": "string"}));

        assert_eq!(global_key(&user), "userId");
        assert_eq!(global_reference(&user), "#/globals/parameters/path/userId");
        assert_ne!(global_reference(&user), global_reference(&pet));
    }
}
