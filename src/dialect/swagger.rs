//! Swagger 2.0 handler
//!
//! Shared sections map onto the model as follows:
//!
//! - `definitions` → schema definitions (`#/definitions/X`)
//! - `responses` → common responses (`#/responses/X`)
//! - `parameters` → global parameters; an operation that does not `$ref` a
//!   global records it as excluded
//! - `host` + `basePath` + `schemes` → servers
//!
//! Non-body parameters carry their type inline (`type`, `format`, `items`,
//! ...); `in: body` and `in: formData` parameters become the request body.

use std::collections::{BTreeMap, HashSet};

use serde_json::{json, Map, Value};
use url::Url;

use super::schema::{from_swagger, rewrite_refs, to_swagger};
use super::{
    applicable_globals, bool_field, decode_info, encode_info, global_key, group_by_first_tag, merged_parameters,
    object_field, operation_item, operation_object, parse_location, put_opt, str_field, GlobalIndex, METHODS,
};
use crate::error::{InterchangeError, Result};
use crate::model::{
    CollectItem, CommonResponse, ContentNode, Definitions, Header, HttpOperation, MediaType, Parameter,
    ParameterLocation, RequestBody, Response, ResponseBody, SchemaDefinition, Server, SpecDocument,
};
use crate::reference::ReferenceDomain;

const DIALECT: &str = "Swagger 2.0";

const DEFINITION_PREFIX: &str = "#/definitions/";
const RESPONSE_PREFIX: &str = "#/responses/";
const PARAMETER_PREFIX: &str = "#/parameters/";

const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";
const MULTIPART: &str = "multipart/form-data";
const JSON: &str = "application/json";

/// Schema keywords a flat (non-body) parameter or header may carry
const FLAT_KEYWORDS: [&str; 18] = [
    "type",
    "format",
    "items",
    "enum",
    "default",
    "minimum",
    "maximum",
    "exclusiveMinimum",
    "exclusiveMaximum",
    "minLength",
    "maxLength",
    "pattern",
    "minItems",
    "maxItems",
    "uniqueItems",
    "multipleOf",
    "x-nullable",
    "example",
];

// ---------------------------------------------------------------------------
// Decode
// ---------------------------------------------------------------------------

struct DecodeContext<'d> {
    consumes: Vec<String>,
    produces: Vec<String>,
    shared_parameters: Option<&'d Map<String, Value>>,
    globals: &'d GlobalIndex,
}

pub fn decode(document: &Value) -> Result<SpecDocument> {
    let root = document
        .as_object()
        .ok_or_else(|| InterchangeError::malformed(DIALECT, "document root is not an object"))?;
    let info = decode_info(DIALECT, root)?;
    let paths = object_field(root, "paths").ok_or_else(|| InterchangeError::malformed(DIALECT, "missing `paths`"))?;

    let produces = media_types(root, "produces").unwrap_or_else(|| vec![JSON.to_string()]);

    let mut definitions = Definitions::default();
    if let Some(schemas) = object_field(root, "definitions") {
        for (name, schema) in schemas {
            let schema = internal_schema(schema);
            definitions.schemas.push(SchemaDefinition {
                name: name.clone(),
                description: schema.get("description").and_then(Value::as_str).map(str::to_string),
                schema,
            });
        }
    }
    if let Some(responses) = object_field(root, "responses") {
        for (name, response) in responses {
            definitions.responses.push(CommonResponse {
                name: name.clone(),
                body: decode_response_body(response, &produces),
            });
        }
    }

    let shared_parameters = object_field(root, "parameters");
    let mut globals = Vec::new();
    for (key, raw) in shared_parameters.into_iter().flatten() {
        // body and formData entries are only ever inlined into operations
        if let Some(location) = raw.get("in").and_then(Value::as_str).and_then(ParameterLocation::parse) {
            match decode_flat_parameter(raw, location) {
                Ok(parameter) => globals.push((
                    key.clone(),
                    Parameter {
                        key: Some(key.clone()),
                        ..parameter
                    },
                )),
                Err(e) => tracing::warn!(key = %key, error = %e, "shared parameter ignored"),
            }
        }
    }
    let globals = GlobalIndex::new(globals);

    let context = DecodeContext {
        consumes: media_types(root, "consumes").unwrap_or_else(|| vec![JSON.to_string()]),
        produces,
        shared_parameters,
        globals: &globals,
    };

    let mut documents = Vec::new();
    for (path, path_item) in paths {
        let path_item = path_item
            .as_object()
            .ok_or_else(|| InterchangeError::malformed(DIALECT, format!("path item `{}` is not an object", path)))?;
        for method in METHODS {
            if let Some(operation) = object_field(path_item, method) {
                documents.push(decode_operation(&context, path, method, path_item, operation)?);
            }
        }
    }

    Ok(SpecDocument {
        info,
        servers: decode_servers(root),
        definitions,
        globals: globals.into_parameters(),
        collections: group_by_first_tag(documents),
    })
}

fn decode_operation(
    context: &DecodeContext<'_>,
    path: &str,
    method: &str,
    path_item: &Map<String, Value>,
    operation: &Map<String, Value>,
) -> Result<CollectItem> {
    let consumes = media_types(operation, "consumes").unwrap_or_else(|| context.consumes.clone());
    let produces = media_types(operation, "produces").unwrap_or_else(|| context.produces.clone());

    let mut content = Vec::new();
    let mut used = HashSet::new();
    let mut body = None;
    let mut form = FormFields::default();

    for raw in merged_parameters(path_item, operation) {
        let parameter = match raw.get("$ref").and_then(Value::as_str) {
            Some(reference) => {
                let key = reference.strip_prefix(PARAMETER_PREFIX).ok_or_else(|| {
                    InterchangeError::malformed(DIALECT, format!("unsupported parameter reference `{}`", reference))
                })?;
                if context.globals.contains(key) {
                    used.insert(key.to_string());
                    continue;
                }
                context.shared_parameters.and_then(|p| p.get(key)).ok_or_else(|| {
                    InterchangeError::malformed(DIALECT, format!("dangling parameter reference `{}`", reference))
                })?
            }
            None => raw,
        };

        match parameter.get("in").and_then(Value::as_str) {
            Some("body") => {
                let schema = internal_schema(parameter.get("schema").unwrap_or(&Value::Null));
                body = Some(RequestBody {
                    description: parameter.get("description").and_then(Value::as_str).map(str::to_string),
                    required: parameter.get("required").and_then(Value::as_bool).unwrap_or(false),
                    content: consumes
                        .iter()
                        .map(|mime| {
                            (
                                mime.clone(),
                                MediaType {
                                    schema: schema.clone(),
                                    example: None,
                                },
                            )
                        })
                        .collect(),
                });
            }
            Some("formData") => form.add(parameter),
            location => {
                let location = parse_location(DIALECT, location)?;
                content.push(ContentNode::Parameter(decode_flat_parameter(parameter, location)?));
            }
        }
    }

    if let Some(form_body) = form.into_body(&consumes) {
        body = Some(form_body);
    }
    if let Some(body) = body {
        content.push(ContentNode::RequestBody(body));
    }

    if let Some(responses) = object_field(operation, "responses") {
        for (code, raw) in responses {
            content.push(ContentNode::Response(decode_response(code, raw, &produces)));
        }
    }

    let meta = HttpOperation {
        path: path.to_string(),
        method: method.to_string(),
        operation_id: str_field(operation, "operationId"),
        description: str_field(operation, "description"),
        deprecated: bool_field(operation, "deprecated"),
        excluded_globals: context.globals.excluded(&used),
    };
    Ok(operation_item(operation, meta, content))
}

/// `formData` parameters collected into one object schema
#[derive(Default)]
struct FormFields {
    properties: Map<String, Value>,
    required: Vec<Value>,
    has_file: bool,
}

impl FormFields {
    fn add(&mut self, parameter: &Value) {
        let Some(name) = parameter.get("name").and_then(Value::as_str) else {
            tracing::warn!("formData parameter without a name ignored");
            return;
        };
        let mut schema = flat_schema(parameter);
        if schema.get("type").and_then(Value::as_str) == Some("file") {
            self.has_file = true;
            schema = json!({"type": "string", "format": "binary"});
        }
        if let Some(description) = parameter.get("description") {
            schema["description"] = description.clone();
        }
        if parameter.get("required").and_then(Value::as_bool).unwrap_or(false) {
            self.required.push(Value::String(name.to_string()));
        }
        self.properties.insert(name.to_string(), schema);
    }

    fn into_body(self, consumes: &[String]) -> Option<RequestBody> {
        if self.properties.is_empty() {
            return None;
        }
        let mime = consumes
            .iter()
            .find(|m| m.as_str() == MULTIPART || m.as_str() == FORM_URLENCODED)
            .cloned()
            .unwrap_or_else(|| {
                let fallback = if self.has_file { MULTIPART } else { FORM_URLENCODED };
                fallback.to_string()
            });

        let mut schema = json!({"type": "object", "properties": Value::Object(self.properties)});
        let required = !self.required.is_empty();
        if required {
            schema["required"] = Value::Array(self.required);
        }
        let mut content = BTreeMap::new();
        content.insert(mime, MediaType { schema, example: None });
        Some(RequestBody {
            description: None,
            required,
            content,
        })
    }
}

fn decode_flat_parameter(raw: &Value, location: ParameterLocation) -> Result<Parameter> {
    let name = raw
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| InterchangeError::malformed(DIALECT, "parameter without a name"))?;
    Ok(Parameter {
        name: name.to_string(),
        location,
        required: raw.get("required").and_then(Value::as_bool).unwrap_or(false),
        description: raw.get("description").and_then(Value::as_str).map(str::to_string),
        deprecated: raw.get("deprecated").and_then(Value::as_bool).unwrap_or(false),
        schema: flat_schema(raw),
        key: None,
    })
}

/// Lift the inline typing keywords of a flat parameter into a schema
fn flat_schema(raw: &Value) -> Value {
    let mut schema = Map::new();
    for keyword in FLAT_KEYWORDS {
        if let Some(value) = raw.get(keyword) {
            schema.insert(keyword.to_string(), value.clone());
        }
    }
    let mut schema = Value::Object(schema);
    from_swagger(&mut schema);
    schema
}

fn decode_response(code: &str, raw: &Value, produces: &[String]) -> Response {
    if let Some(reference) = raw.get("$ref").and_then(Value::as_str) {
        return Response {
            code: code.to_string(),
            reference: Some(internal_ref(reference).unwrap_or_else(|| reference.to_string())),
            body: ResponseBody::default(),
        };
    }
    Response {
        code: code.to_string(),
        reference: None,
        body: decode_response_body(raw, produces),
    }
}

fn decode_response_body(raw: &Value, produces: &[String]) -> ResponseBody {
    let mut body = ResponseBody {
        description: raw.get("description").and_then(Value::as_str).unwrap_or_default().to_string(),
        ..ResponseBody::default()
    };

    let examples = raw.get("examples").and_then(Value::as_object);
    if let Some(schema) = raw.get("schema") {
        let schema = internal_schema(schema);
        for mime in produces {
            body.content.insert(
                mime.clone(),
                MediaType {
                    schema: schema.clone(),
                    example: examples.and_then(|e| e.get(mime)).cloned(),
                },
            );
        }
    }

    if let Some(headers) = raw.get("headers").and_then(Value::as_object) {
        for (name, header) in headers {
            body.headers.insert(
                name.clone(),
                Header {
                    description: header.get("description").and_then(Value::as_str).map(str::to_string),
                    required: false,
                    schema: flat_schema(header),
                },
            );
        }
    }
    body
}

fn decode_servers(root: &Map<String, Value>) -> Vec<Server> {
    let base_path = str_field(root, "basePath").unwrap_or_default();
    let Some(host) = str_field(root, "host") else {
        if base_path.is_empty() {
            return Vec::new();
        }
        return vec![Server {
            url: base_path,
            description: None,
        }];
    };

    let schemes: Vec<String> = root
        .get("schemes")
        .and_then(Value::as_array)
        .map(|s| s.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .filter(|s: &Vec<String>| !s.is_empty())
        .unwrap_or_else(|| vec!["https".to_string()]);

    schemes
        .iter()
        .filter_map(|scheme| {
            let url = format!("{}://{}{}", scheme, host, base_path);
            match Url::parse(&url) {
                Ok(_) => Some(Server { url, description: None }),
                Err(e) => {
                    tracing::warn!(%url, error = %e, "server url ignored");
                    None
                }
            }
        })
        .collect()
}

fn media_types(object: &Map<String, Value>, key: &str) -> Option<Vec<String>> {
    object
        .get(key)
        .and_then(Value::as_array)
        .map(|a| a.iter().filter_map(Value::as_str).map(str::to_string).collect())
}

fn internal_ref(reference: &str) -> Option<String> {
    if let Some(name) = reference.strip_prefix(DEFINITION_PREFIX) {
        Some(ReferenceDomain::Schema.reference(name))
    } else {
        reference
            .strip_prefix(RESPONSE_PREFIX)
            .map(|name| ReferenceDomain::Response.reference(name))
    }
}

fn external_ref(reference: &str) -> Option<String> {
    if let Some(name) = ReferenceDomain::Schema.token(reference) {
        Some(format!("{}{}", DEFINITION_PREFIX, name))
    } else {
        ReferenceDomain::Response
            .token(reference)
            .map(|name| format!("{}{}", RESPONSE_PREFIX, name))
    }
}

fn internal_schema(schema: &Value) -> Value {
    let mut schema = schema.clone();
    rewrite_refs(&mut schema, &internal_ref);
    from_swagger(&mut schema);
    schema
}

fn external_schema(schema: &Value) -> Value {
    let mut schema = schema.clone();
    rewrite_refs(&mut schema, &external_ref);
    to_swagger(&mut schema);
    schema
}

// ---------------------------------------------------------------------------
// Encode
// ---------------------------------------------------------------------------

pub fn encode(document: &SpecDocument) -> Result<Value> {
    let mut root = Map::new();
    root.insert("swagger".to_string(), json!("2.0"));
    root.insert("info".to_string(), encode_info(&document.info));
    encode_servers(&document.servers, &mut root);

    let mut paths = Map::new();
    for item in document.documents() {
        let Some(operation) = item.operation() else {
            tracing::debug!(title = %item.title, "document without operation skipped");
            continue;
        };
        let path_item = paths
            .entry(operation.path.clone())
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(path_item) = path_item {
            path_item.insert(operation.method.clone(), encode_operation(document, item, operation));
        }
    }
    root.insert("paths".to_string(), Value::Object(paths));

    let mut definitions = Map::new();
    for definition in &document.definitions.schemas {
        let mut schema = external_schema(&definition.schema);
        if let (Some(description), Value::Object(object)) = (&definition.description, &mut schema) {
            object
                .entry("description")
                .or_insert_with(|| Value::String(description.clone()));
        }
        definitions.insert(definition.name.clone(), schema);
    }
    if !definitions.is_empty() {
        root.insert("definitions".to_string(), Value::Object(definitions));
    }

    let mut parameters = Map::new();
    for global in &document.globals {
        if global.location == ParameterLocation::Cookie {
            tracing::warn!(name = %global.name, "cookie parameters cannot be expressed in Swagger 2.0");
            continue;
        }
        parameters.insert(global_key(global), encode_flat_parameter(global));
    }
    if !parameters.is_empty() {
        root.insert("parameters".to_string(), Value::Object(parameters));
    }

    let mut responses = Map::new();
    for response in &document.definitions.responses {
        responses.insert(response.name.clone(), encode_response_body(&response.body).0);
    }
    if !responses.is_empty() {
        root.insert("responses".to_string(), Value::Object(responses));
    }

    Ok(Value::Object(root))
}

fn encode_operation(document: &SpecDocument, item: &CollectItem, operation: &HttpOperation) -> Value {
    let mut object = operation_object(item, operation);
    let mut parameters = Vec::new();
    let mut consumes: Vec<String> = Vec::new();
    let mut produces: Vec<String> = Vec::new();

    for global in applicable_globals(document, operation) {
        if global.location != ParameterLocation::Cookie {
            parameters.push(json!({ "$ref": format!("{}{}", PARAMETER_PREFIX, global_key(global)) }));
        }
    }

    let mut responses = Map::new();
    for node in &item.content {
        match node {
            ContentNode::Parameter(parameter) if parameter.location == ParameterLocation::Cookie => {
                tracing::warn!(name = %parameter.name, "cookie parameter dropped");
            }
            ContentNode::Parameter(parameter) => parameters.push(encode_flat_parameter(parameter)),
            ContentNode::RequestBody(body) => {
                consumes.extend(body.content.keys().cloned());
                parameters.extend(encode_request_body(body));
            }
            ContentNode::Response(response) => {
                let encoded = match &response.reference {
                    Some(reference) => json!({ "$ref": external_ref(reference).unwrap_or_else(|| reference.clone()) }),
                    None => {
                        let (encoded, mimes) = encode_response_body(&response.body);
                        for mime in mimes {
                            if !produces.contains(&mime) {
                                produces.push(mime);
                            }
                        }
                        encoded
                    }
                };
                responses.insert(response.code.clone(), encoded);
            }
            ContentNode::Operation(_) | ContentNode::Paragraph(_) => {}
        }
    }

    if responses.is_empty() {
        responses.insert("default".to_string(), json!({"description": ""}));
    }
    if !consumes.is_empty() {
        object.insert("consumes".to_string(), json!(consumes));
    }
    if !produces.is_empty() {
        object.insert("produces".to_string(), json!(produces));
    }
    if !parameters.is_empty() {
        object.insert("parameters".to_string(), Value::Array(parameters));
    }
    object.insert("responses".to_string(), Value::Object(responses));
    Value::Object(object)
}

fn encode_flat_parameter(parameter: &Parameter) -> Value {
    let mut object = Map::new();
    object.insert("name".to_string(), Value::String(parameter.name.clone()));
    object.insert("in".to_string(), Value::String(parameter.location.to_string()));
    put_opt(&mut object, "description", parameter.description.as_ref());
    // Path parameters are always required in Swagger 2.0
    let required = parameter.required || parameter.location == ParameterLocation::Path;
    if required {
        object.insert("required".to_string(), Value::Bool(true));
    }
    if let Value::Object(schema) = external_schema(&parameter.schema) {
        for (keyword, value) in schema {
            if FLAT_KEYWORDS.contains(&keyword.as_str()) {
                object.insert(keyword, value);
            }
        }
    }
    object.entry("type").or_insert_with(|| json!("string"));
    Value::Object(object)
}

/// Form media becomes `formData` parameters, anything else one `body` parameter
fn encode_request_body(body: &RequestBody) -> Vec<Value> {
    let form = body
        .content
        .iter()
        .find(|(mime, _)| mime.as_str() == FORM_URLENCODED || mime.as_str() == MULTIPART);
    if let Some((_, media)) = form {
        let required: Vec<&str> = media
            .schema
            .get("required")
            .and_then(Value::as_array)
            .map(|r| r.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();
        let Some(properties) = media.schema.get("properties").and_then(Value::as_object) else {
            return Vec::new();
        };
        return properties
            .iter()
            .map(|(name, schema)| {
                let mut parameter = json!({"name": name, "in": "formData"});
                if required.contains(&name.as_str()) {
                    parameter["required"] = Value::Bool(true);
                }
                if let Some(description) = schema.get("description") {
                    parameter["description"] = description.clone();
                }
                let is_binary = schema.get("format").and_then(Value::as_str) == Some("binary");
                if is_binary {
                    parameter["type"] = json!("file");
                } else if let (Value::Object(target), Value::Object(schema)) = (&mut parameter, external_schema(schema)) {
                    for (keyword, value) in schema {
                        if FLAT_KEYWORDS.contains(&keyword.as_str()) {
                            target.insert(keyword, value);
                        }
                    }
                }
                parameter
            })
            .collect();
    }

    let media = body.content.get(JSON).or_else(|| body.content.values().next());
    let mut parameter = json!({"name": "body", "in": "body"});
    if let Some(description) = &body.description {
        parameter["description"] = json!(description);
    }
    if body.required {
        parameter["required"] = Value::Bool(true);
    }
    parameter["schema"] = media.map(|m| external_schema(&m.schema)).unwrap_or_else(|| json!({}));
    vec![parameter]
}

/// The encoded response plus the media types it was declared for
fn encode_response_body(body: &ResponseBody) -> (Value, Vec<String>) {
    let mut object = Map::new();
    object.insert("description".to_string(), Value::String(body.description.clone()));

    let media = body.content.get(JSON).or_else(|| body.content.values().next());
    if let Some(media) = media {
        if !media.schema.is_null() {
            object.insert("schema".to_string(), external_schema(&media.schema));
        }
    }
    let examples: Map<String, Value> = body
        .content
        .iter()
        .filter_map(|(mime, m)| m.example.clone().map(|e| (mime.clone(), e)))
        .collect();
    if !examples.is_empty() {
        object.insert("examples".to_string(), Value::Object(examples));
    }

    if !body.headers.is_empty() {
        let headers: Map<String, Value> = body
            .headers
            .iter()
            .map(|(name, header)| {
                let mut encoded = Map::new();
                put_opt(&mut encoded, "description", header.description.as_ref());
                if let Value::Object(schema) = external_schema(&header.schema) {
                    for (keyword, value) in schema {
                        if FLAT_KEYWORDS.contains(&keyword.as_str()) {
                            encoded.insert(keyword, value);
                        }
                    }
                }
                encoded.entry("type").or_insert_with(|| json!("string"));
                (name.clone(), Value::Object(encoded))
            })
            .collect();
        object.insert("headers".to_string(), Value::Object(headers));
    }

    (Value::Object(object), body.content.keys().cloned().collect())
}

fn encode_servers(servers: &[Server], root: &mut Map<String, Value>) {
    let Some(first) = servers.first() else {
        return;
    };
    let Ok(url) = Url::parse(&first.url) else {
        // Relative server urls only carry a base path
        root.insert("basePath".to_string(), Value::String(first.url.clone()));
        return;
    };
    let Some(host) = url.host_str() else {
        tracing::warn!(url = %first.url, "server without host ignored");
        return;
    };
    let host = match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    };
    let base_path = url.path().trim_end_matches('/').to_string();

    let mut schemes = Vec::new();
    for server in servers {
        let Ok(other) = Url::parse(&server.url) else {
            continue;
        };
        let same_host = other.host_str() == url.host_str() && other.port() == url.port();
        let same_base = other.path().trim_end_matches('/') == base_path;
        if same_host && same_base && !schemes.contains(&other.scheme().to_string()) {
            schemes.push(other.scheme().to_string());
        } else if !same_host || !same_base {
            tracing::warn!(url = %server.url, "Swagger 2.0 supports a single host; server dropped");
        }
    }

    root.insert("host".to_string(), Value::String(host));
    if !base_path.is_empty() {
        root.insert("basePath".to_string(), Value::String(base_path));
    }
    root.insert("schemes".to_string(), json!(schemes));
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn petstore() -> Value {
        json!({
            "swagger": "2.0",
            "info": {"title": "Pets", "version": "1.0"},
            "host": "api.example.com",
            "basePath": "/v1",
            "schemes": ["https"],
            "parameters": {
                "trace": {"name": "X-Trace", "in": "header", "type": "string"}
            },
            "definitions": {
                "Pet": {
                    "type": "object",
                    "properties": {
                        "name": {"type": "string", "x-nullable": true},
                        "owner": {"$ref": "#/definitions/Owner"}
                    }
                },
                "Owner": {"type": "object"}
            },
            "paths": {
                "/pets/{id}": {
                    "parameters": [{"name": "id", "in": "path", "required": true, "type": "integer"}],
                    "get": {
                        "tags": ["Pets"],
                        "summary": "Get a pet",
                        "parameters": [{"$ref": "#/parameters/trace"}],
                        "responses": {
                            "200": {"description": "ok", "schema": {"$ref": "#/definitions/Pet"}}
                        }
                    },
                    "put": {
                        "tags": ["Pets"],
                        "parameters": [{"name": "pet", "in": "body", "schema": {"$ref": "#/definitions/Pet"}}],
                        "responses": {"204": {"description": "updated"}}
                    }
                }
            }
        })
    }

    #[test]
    fn test_decode_normalizes_sections() {
        let doc = decode(&petstore()).unwrap();
        assert_eq!(doc.servers[0].url, "https://api.example.com/v1");
        assert_eq!(doc.definitions.schemas.len(), 2);

        let pet = doc.schema("Pet").unwrap();
        assert_eq!(pet.schema["properties"]["owner"]["$ref"], "#/definitions/schemas/Owner");
        assert_eq!(pet.schema["properties"]["name"]["nullable"], true);

        assert_eq!(doc.collections.len(), 1);
        assert_eq!(doc.collections[0].title, "Pets");
        assert_eq!(doc.collections[0].items.len(), 2);
    }

    #[test]
    fn test_globals_and_exclusions() {
        let doc = decode(&petstore()).unwrap();
        assert_eq!(doc.globals.len(), 1);
        let docs = doc.documents();
        let get = docs.iter().find(|d| d.title == "Get a pet").unwrap();
        assert!(get.operation().unwrap().excluded_globals.is_empty());

        let put = docs.iter().find(|d| d.title == "PUT /pets/{id}").unwrap();
        assert_eq!(
            put.operation().unwrap().excluded_globals,
            vec!["#/globals/parameters/header/trace"]
        );
        assert!(put.content.iter().any(|n| matches!(n, ContentNode::RequestBody(_))));
    }

    #[test]
    fn test_malformed_shared_parameter_is_skipped() {
        let mut document = petstore();
        document["parameters"]["broken"] = json!({"in": "query", "type": "string"});

        let doc = decode(&document).unwrap();
        assert_eq!(doc.globals.len(), 1);
        assert_eq!(doc.globals[0].key.as_deref(), Some("trace"));
        assert_eq!(doc.documents().len(), 2);
    }

    #[test]
    fn test_round_trip_preserves_paths_and_schemas() {
        let original = petstore();
        let encoded = encode(&decode(&original).unwrap()).unwrap();

        assert_eq!(encoded["host"], "api.example.com");
        assert_eq!(encoded["basePath"], "/v1");
        assert_eq!(encoded["definitions"], original["definitions"]);

        let get = &encoded["paths"]["/pets/{id}"]["get"];
        assert_eq!(get["responses"]["200"]["schema"]["$ref"], "#/definitions/Pet");
        let parameters = get["parameters"].as_array().unwrap();
        assert!(parameters.contains(&json!({"$ref": "#/parameters/trace"})));
        assert!(parameters.iter().any(|p| p["name"] == "id" && p["in"] == "path"));

        let put = &encoded["paths"]["/pets/{id}"]["put"];
        let parameters = put["parameters"].as_array().unwrap();
        assert!(!parameters.iter().any(|p| p.get("$ref").is_some()));
        assert!(parameters.iter().any(|p| p["in"] == "body"));
    }

    #[test]
    fn test_form_data_becomes_request_body() {
        let doc = json!({
            "swagger": "2.0",
            "info": {"title": "Upload", "version": "1"},
            "paths": {"/files": {"post": {
                "consumes": ["multipart/form-data"],
                "parameters": [
                    {"name": "file", "in": "formData", "type": "file", "required": true},
                    {"name": "note", "in": "formData", "type": "string"}
                ],
                "responses": {"201": {"description": "stored"}}
            }}}
        });
        let decoded = decode(&doc).unwrap();
        let body = decoded.documents()[0]
            .content
            .iter()
            .find_map(|n| match n {
                ContentNode::RequestBody(b) => Some(b.clone()),
                _ => None,
            })
            .unwrap();
        let media = &body.content[MULTIPART];
        assert_eq!(media.schema["properties"]["file"]["format"], "binary");
        assert_eq!(media.schema["required"], json!(["file"]));

        let encoded = encode(&decoded).unwrap();
        let parameters = encoded["paths"]["/files"]["post"]["parameters"].as_array().unwrap();
        assert_eq!(parameters[0]["type"], "file");
        assert_eq!(parameters[0]["in"], "formData");
    }

    #[test]
    fn test_missing_paths_is_malformed() {
        let err = decode(&json!({"swagger": "2.0", "info": {"title": "t", "version": "1"}})).unwrap_err();
        assert!(matches!(err, InterchangeError::MalformedDocument { .. }));
    }
}
