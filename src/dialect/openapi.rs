//! OpenAPI 3.0 / 3.1 handler
//!
//! Both minors share one layout (`servers`, `components.schemas`,
//! `components.responses`, `components.parameters`, `requestBody`). They
//! differ in schema keywords only, which [`super::schema`] translates.

use std::collections::{BTreeMap, HashSet};

use serde_json::{json, Map, Value};

use super::schema::{from_openapi31, rewrite_refs, to_openapi31};
use super::{
    applicable_globals, bool_field, decode_info, encode_info, global_key, group_by_first_tag, merged_parameters,
    object_field, operation_item, operation_object, parse_location, put_opt, str_field, Dialect, DialectVersion,
    GlobalIndex, METHODS,
};
use crate::error::{InterchangeError, Result};
use crate::model::{
    CollectItem, CommonResponse, ContentNode, Definitions, Header, HttpOperation, MediaType, Parameter, RequestBody,
    Response, ResponseBody, SchemaDefinition, Server, SpecDocument,
};
use crate::reference::ReferenceDomain;

const SCHEMA_PREFIX: &str = "#/components/schemas/";
const RESPONSE_PREFIX: &str = "#/components/responses/";
const PARAMETER_PREFIX: &str = "#/components/parameters/";
const REQUEST_BODY_PREFIX: &str = "#/components/requestBodies/";

// ---------------------------------------------------------------------------
// Decode
// ---------------------------------------------------------------------------

struct DecodeContext<'d> {
    dialect: Dialect,
    request_bodies: Option<&'d Map<String, Value>>,
    globals: GlobalIndex,
}

impl DecodeContext<'_> {
    fn name(&self) -> &'static str {
        self.dialect.name()
    }

    fn schema(&self, schema: &Value) -> Value {
        let mut schema = schema.clone();
        rewrite_refs(&mut schema, &internal_ref);
        if self.dialect == Dialect::OpenApi31 {
            from_openapi31(&mut schema);
        }
        schema
    }
}

pub fn decode(document: &Value, dialect: Dialect) -> Result<SpecDocument> {
    let name = dialect.name();
    let root = document
        .as_object()
        .ok_or_else(|| InterchangeError::malformed(name, "document root is not an object"))?;
    let info = decode_info(name, root)?;

    // 3.1 allows a document made of components or webhooks only
    let empty = Map::new();
    let paths = match object_field(root, "paths") {
        Some(paths) => paths,
        None if dialect == Dialect::OpenApi31 => &empty,
        None => return Err(InterchangeError::malformed(name, "missing `paths`")),
    };

    let components = object_field(root, "components");
    let section = |key: &str| components.and_then(|c| object_field(c, key));

    let mut context = DecodeContext {
        dialect,
        request_bodies: section("requestBodies"),
        globals: GlobalIndex::new(Vec::new()),
    };

    let mut definitions = Definitions::default();
    for (schema_name, schema) in section("schemas").into_iter().flatten() {
        let schema = context.schema(schema);
        definitions.schemas.push(SchemaDefinition {
            name: schema_name.clone(),
            description: schema.get("description").and_then(Value::as_str).map(str::to_string),
            schema,
        });
    }
    for (response_name, response) in section("responses").into_iter().flatten() {
        definitions.responses.push(CommonResponse {
            name: response_name.clone(),
            body: decode_response_body(&context, response),
        });
    }

    let mut globals = Vec::new();
    for (key, raw) in section("parameters").into_iter().flatten() {
        match decode_parameter(&context, raw) {
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
    context.globals = GlobalIndex::new(globals);

    let mut documents = Vec::new();
    for (path, path_item) in paths {
        let path_item = path_item
            .as_object()
            .ok_or_else(|| InterchangeError::malformed(name, format!("path item `{}` is not an object", path)))?;
        for method in METHODS {
            if let Some(operation) = object_field(path_item, method) {
                documents.push(decode_operation(&context, path, method, path_item, operation)?);
            }
        }
    }

    let servers = root
        .get("servers")
        .cloned()
        .map(serde_json::from_value::<Vec<Server>>)
        .transpose()
        .map_err(|e| InterchangeError::malformed(name, format!("invalid `servers`: {}", e)))?
        .unwrap_or_default();

    Ok(SpecDocument {
        info,
        servers,
        definitions,
        globals: context.globals.into_parameters(),
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
    let mut content = Vec::new();
    let mut used = HashSet::new();

    for raw in merged_parameters(path_item, operation) {
        if let Some(reference) = raw.get("$ref").and_then(Value::as_str) {
            match reference.strip_prefix(PARAMETER_PREFIX) {
                Some(key) if context.globals.contains(key) => {
                    used.insert(key.to_string());
                }
                _ => {
                    return Err(InterchangeError::malformed(
                        context.name(),
                        format!("dangling parameter reference `{}`", reference),
                    ))
                }
            }
            continue;
        }
        content.push(ContentNode::Parameter(decode_parameter(context, raw)?));
    }

    if let Some(raw) = operation.get("requestBody") {
        content.push(ContentNode::RequestBody(decode_request_body(context, raw)?));
    }

    for (code, raw) in object_field(operation, "responses").into_iter().flatten() {
        let response = match raw.get("$ref").and_then(Value::as_str) {
            Some(reference) => Response {
                code: code.clone(),
                reference: Some(internal_ref(reference).unwrap_or_else(|| reference.to_string())),
                body: ResponseBody::default(),
            },
            None => Response {
                code: code.clone(),
                reference: None,
                body: decode_response_body(context, raw),
            },
        };
        content.push(ContentNode::Response(response));
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

fn decode_parameter(context: &DecodeContext<'_>, raw: &Value) -> Result<Parameter> {
    let object = raw
        .as_object()
        .ok_or_else(|| InterchangeError::malformed(context.name(), "parameter is not an object"))?;
    let name = str_field(object, "name")
        .ok_or_else(|| InterchangeError::malformed(context.name(), "parameter without a name"))?;
    let location = parse_location(context.name(), object.get("in").and_then(Value::as_str))?;
    Ok(Parameter {
        name,
        location,
        required: bool_field(object, "required"),
        description: str_field(object, "description"),
        deprecated: bool_field(object, "deprecated"),
        schema: object.get("schema").map(|s| context.schema(s)).unwrap_or(Value::Null),
        key: None,
    })
}

fn decode_request_body(context: &DecodeContext<'_>, raw: &Value) -> Result<RequestBody> {
    let raw = match raw.get("$ref").and_then(Value::as_str) {
        Some(reference) => reference
            .strip_prefix(REQUEST_BODY_PREFIX)
            .and_then(|key| context.request_bodies.and_then(|bodies| bodies.get(key)))
            .ok_or_else(|| {
                InterchangeError::malformed(context.name(), format!("dangling request body `{}`", reference))
            })?,
        None => raw,
    };
    Ok(RequestBody {
        description: raw.get("description").and_then(Value::as_str).map(str::to_string),
        required: raw.get("required").and_then(Value::as_bool).unwrap_or(false),
        content: decode_content(context, raw.get("content")),
    })
}

fn decode_content(context: &DecodeContext<'_>, raw: Option<&Value>) -> BTreeMap<String, MediaType> {
    let Some(media) = raw.and_then(Value::as_object) else {
        return BTreeMap::new();
    };
    media
        .iter()
        .map(|(mime, media)| {
            let example = media.get("example").cloned().or_else(|| {
                media
                    .get("examples")
                    .and_then(Value::as_object)
                    .and_then(|examples| examples.values().next())
                    .and_then(|first| first.get("value"))
                    .cloned()
            });
            let media = MediaType {
                schema: media.get("schema").map(|s| context.schema(s)).unwrap_or(Value::Null),
                example,
            };
            (mime.clone(), media)
        })
        .collect()
}

fn decode_response_body(context: &DecodeContext<'_>, raw: &Value) -> ResponseBody {
    let headers = raw
        .get("headers")
        .and_then(Value::as_object)
        .map(|headers| {
            headers
                .iter()
                .map(|(name, header)| {
                    let header = Header {
                        description: header.get("description").and_then(Value::as_str).map(str::to_string),
                        required: header.get("required").and_then(Value::as_bool).unwrap_or(false),
                        schema: header.get("schema").map(|s| context.schema(s)).unwrap_or(Value::Null),
                    };
                    (name.clone(), header)
                })
                .collect()
        })
        .unwrap_or_default();

    ResponseBody {
        description: raw.get("description").and_then(Value::as_str).unwrap_or_default().to_string(),
        content: decode_content(context, raw.get("content")),
        headers,
    }
}

fn internal_ref(reference: &str) -> Option<String> {
    if let Some(name) = reference.strip_prefix(SCHEMA_PREFIX) {
        Some(ReferenceDomain::Schema.reference(name))
    } else {
        reference
            .strip_prefix(RESPONSE_PREFIX)
            .map(|name| ReferenceDomain::Response.reference(name))
    }
}

fn external_ref(reference: &str) -> Option<String> {
    if let Some(name) = ReferenceDomain::Schema.token(reference) {
        Some(format!("{}{}", SCHEMA_PREFIX, name))
    } else {
        ReferenceDomain::Response
            .token(reference)
            .map(|name| format!("{}{}", RESPONSE_PREFIX, name))
    }
}

// ---------------------------------------------------------------------------
// Encode
// ---------------------------------------------------------------------------

struct Encoder {
    version: DialectVersion,
}

impl Encoder {
    fn schema(&self, schema: &Value) -> Value {
        let mut schema = schema.clone();
        rewrite_refs(&mut schema, &external_ref);
        if self.version.dialect() == Dialect::OpenApi31 {
            to_openapi31(&mut schema);
        }
        schema
    }

    fn content(&self, content: &BTreeMap<String, MediaType>) -> Value {
        let encoded: Map<String, Value> = content
            .iter()
            .map(|(mime, media)| {
                let mut object = Map::new();
                if !media.schema.is_null() {
                    object.insert("schema".to_string(), self.schema(&media.schema));
                }
                if let Some(example) = &media.example {
                    object.insert("example".to_string(), example.clone());
                }
                (mime.clone(), Value::Object(object))
            })
            .collect();
        Value::Object(encoded)
    }

    fn parameter(&self, parameter: &Parameter) -> Value {
        let mut object = Map::new();
        object.insert("name".to_string(), Value::String(parameter.name.clone()));
        object.insert("in".to_string(), Value::String(parameter.location.to_string()));
        put_opt(&mut object, "description", parameter.description.as_ref());
        if parameter.required || parameter.location == crate::model::ParameterLocation::Path {
            object.insert("required".to_string(), Value::Bool(true));
        }
        if parameter.deprecated {
            object.insert("deprecated".to_string(), Value::Bool(true));
        }
        if !parameter.schema.is_null() {
            object.insert("schema".to_string(), self.schema(&parameter.schema));
        }
        Value::Object(object)
    }

    fn response_body(&self, body: &ResponseBody) -> Value {
        let mut object = Map::new();
        object.insert("description".to_string(), Value::String(body.description.clone()));
        if !body.headers.is_empty() {
            let headers: Map<String, Value> = body
                .headers
                .iter()
                .map(|(name, header)| {
                    let mut encoded = Map::new();
                    put_opt(&mut encoded, "description", header.description.as_ref());
                    if header.required {
                        encoded.insert("required".to_string(), Value::Bool(true));
                    }
                    if !header.schema.is_null() {
                        encoded.insert("schema".to_string(), self.schema(&header.schema));
                    }
                    (name.clone(), Value::Object(encoded))
                })
                .collect();
            object.insert("headers".to_string(), Value::Object(headers));
        }
        if !body.content.is_empty() {
            object.insert("content".to_string(), self.content(&body.content));
        }
        Value::Object(object)
    }

    fn operation(&self, document: &SpecDocument, item: &CollectItem, operation: &HttpOperation) -> Value {
        let mut object = operation_object(item, operation);

        let mut parameters: Vec<Value> = applicable_globals(document, operation)
            .into_iter()
            .map(|global| json!({ "$ref": format!("{}{}", PARAMETER_PREFIX, global_key(global)) }))
            .collect();
        let mut responses = Map::new();

        for node in &item.content {
            match node {
                ContentNode::Parameter(parameter) => parameters.push(self.parameter(parameter)),
                ContentNode::RequestBody(body) => {
                    let mut encoded = Map::new();
                    put_opt(&mut encoded, "description", body.description.as_ref());
                    if body.required {
                        encoded.insert("required".to_string(), Value::Bool(true));
                    }
                    encoded.insert("content".to_string(), self.content(&body.content));
                    object.insert("requestBody".to_string(), Value::Object(encoded));
                }
                ContentNode::Response(response) => {
                    let encoded = match &response.reference {
                        Some(reference) => {
                            json!({ "$ref": external_ref(reference).unwrap_or_else(|| reference.clone()) })
                        }
                        None => self.response_body(&response.body),
                    };
                    responses.insert(response.code.clone(), encoded);
                }
                ContentNode::Operation(_) | ContentNode::Paragraph(_) => {}
            }
        }

        if !parameters.is_empty() {
            object.insert("parameters".to_string(), Value::Array(parameters));
        }
        if responses.is_empty() {
            responses.insert("default".to_string(), json!({"description": ""}));
        }
        object.insert("responses".to_string(), Value::Object(responses));
        Value::Object(object)
    }
}

pub fn encode(document: &SpecDocument, version: DialectVersion) -> Result<Value> {
    if version.dialect() == Dialect::Swagger2 {
        return Err(InterchangeError::UnsupportedDialect(format!(
            "{} is not an OpenAPI version",
            version
        )));
    }
    let encoder = Encoder { version };

    let mut root = Map::new();
    root.insert("openapi".to_string(), Value::String(version.declaration()));
    root.insert("info".to_string(), encode_info(&document.info));
    if !document.servers.is_empty() {
        root.insert("servers".to_string(), serde_json::to_value(&document.servers)?);
    }

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
            path_item.insert(operation.method.clone(), encoder.operation(document, item, operation));
        }
    }
    root.insert("paths".to_string(), Value::Object(paths));

    let mut components = Map::new();
    let schemas: Map<String, Value> = document
        .definitions
        .schemas
        .iter()
        .map(|definition| {
            let mut schema = encoder.schema(&definition.schema);
            if let (Some(description), Value::Object(object)) = (&definition.description, &mut schema) {
                object
                    .entry("description")
                    .or_insert_with(|| Value::String(description.clone()));
            }
            (definition.name.clone(), schema)
        })
        .collect();
    if !schemas.is_empty() {
        components.insert("schemas".to_string(), Value::Object(schemas));
    }

    let responses: Map<String, Value> = document
        .definitions
        .responses
        .iter()
        .map(|response| (response.name.clone(), encoder.response_body(&response.body)))
        .collect();
    if !responses.is_empty() {
        components.insert("responses".to_string(), Value::Object(responses));
    }

    let parameters: Map<String, Value> = document
        .globals
        .iter()
        .map(|global| (global_key(global), encoder.parameter(global)))
        .collect();
    if !parameters.is_empty() {
        components.insert("parameters".to_string(), Value::Object(parameters));
    }

    if !components.is_empty() {
        root.insert("components".to_string(), Value::Object(components));
    }
    Ok(Value::Object(root))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn users_v30() -> Value {
        json!({
            "openapi": "3.0.1",
            "info": {"title": "Users", "version": "2.1"},
            "servers": [{"url": "https://api.example.com"}],
            "components": {
                "schemas": {
                    "UserModel": {
                        "type": "object",
                        "properties": {
                            "nickname": {"type": "string", "nullable": true, "example": "neo"},
                            "manager": {"$ref": "#/components/schemas/UserModel"}
                        }
                    }
                },
                "responses": {
                    "NotFound": {"description": "missing"}
                },
                "parameters": {
                    "tenant": {"name": "X-Tenant", "in": "header", "schema": {"type": "string"}},
                    "session": {"name": "sid", "in": "cookie", "schema": {"type": "string"}}
                }
            },
            "paths": {
                "/users/{id}": {
                    "get": {
                        "tags": ["Users"],
                        "operationId": "getUser",
                        "parameters": [
                            {"$ref": "#/components/parameters/tenant"},
                            {"name": "id", "in": "path", "required": true, "schema": {"type": "integer"}}
                        ],
                        "responses": {
                            "200": {
                                "description": "ok",
                                "content": {"application/json": {"schema": {"$ref": "#/components/schemas/UserModel"}}}
                            },
                            "404": {"$ref": "#/components/responses/NotFound"}
                        }
                    }
                }
            }
        })
    }

    #[test]
    fn test_decode_components() {
        let doc = decode(&users_v30(), Dialect::OpenApi30).unwrap();
        assert_eq!(doc.servers[0].url, "https://api.example.com");
        let user = doc.schema("UserModel").unwrap();
        assert_eq!(user.schema["properties"]["manager"]["$ref"], "#/definitions/schemas/UserModel");
        assert!(doc.response("NotFound").is_some());
        assert_eq!(doc.globals.len(), 2);

        let get = doc.documents()[0];
        assert_eq!(get.title, "getUser");
        assert_eq!(
            get.operation().unwrap().excluded_globals,
            vec!["#/globals/parameters/cookie/session"]
        );
        let not_found = get
            .content
            .iter()
            .find_map(|n| match n {
                ContentNode::Response(r) if r.code == "404" => Some(r),
                _ => None,
            })
            .unwrap();
        assert_eq!(not_found.reference.as_deref(), Some("#/commons/responses/NotFound"));
    }

    #[test]
    fn test_round_trip_same_version() {
        let original = users_v30();
        let decoded = decode(&original, Dialect::OpenApi30).unwrap();
        let encoded = encode(&decoded, DialectVersion::OpenApi301).unwrap();

        assert_eq!(encoded["openapi"], "3.0.1");
        assert_eq!(encoded["components"]["schemas"], original["components"]["schemas"]);

        let get = &encoded["paths"]["/users/{id}"]["get"];
        assert_eq!(get["responses"]["404"]["$ref"], "#/components/responses/NotFound");
        assert_eq!(
            get["responses"]["200"]["content"]["application/json"]["schema"]["$ref"],
            "#/components/schemas/UserModel"
        );
        let parameters = get["parameters"].as_array().unwrap();
        assert_eq!(parameters[0], json!({"$ref": "#/components/parameters/tenant"}));
        assert_eq!(parameters.len(), 2);
    }

    #[test]
    fn test_encode_31_translates_nullable() {
        let decoded = decode(&users_v30(), Dialect::OpenApi30).unwrap();
        let encoded = encode(&decoded, DialectVersion::OpenApi31(0)).unwrap();

        assert_eq!(encoded["openapi"], "3.1.0");
        let nickname = &encoded["components"]["schemas"]["UserModel"]["properties"]["nickname"];
        assert_eq!(nickname["type"], json!(["string", "null"]));
        assert_eq!(nickname["examples"], json!(["neo"]));
        assert!(nickname.get("nullable").is_none());

        let back = decode(&encoded, Dialect::OpenApi31).unwrap();
        assert_eq!(back.definitions, decoded.definitions);
    }

    #[test]
    fn test_missing_paths() {
        let doc = json!({"openapi": "3.0.0", "info": {"title": "t", "version": "1"}});
        assert!(matches!(
            decode(&doc, Dialect::OpenApi30),
            Err(InterchangeError::MalformedDocument { .. })
        ));

        let doc = json!({"openapi": "3.1.0", "info": {"title": "t", "version": "1"}});
        assert!(decode(&doc, Dialect::OpenApi31).unwrap().collections.is_empty());
    }

    #[test]
    fn test_request_body_reference_is_inlined() {
        let doc = json!({
            "openapi": "3.0.0",
            "info": {"title": "t", "version": "1"},
            "components": {"requestBodies": {"Pet": {
                "required": true,
                "content": {"application/json": {"schema": {"type": "object"}}}
            }}},
            "paths": {"/pets": {"post": {
                "requestBody": {"$ref": "#/components/requestBodies/Pet"},
                "responses": {"201": {"description": "created"}}
            }}}
        });
        let decoded = decode(&doc, Dialect::OpenApi30).unwrap();
        let body = decoded.documents()[0]
            .content
            .iter()
            .find_map(|n| match n {
                ContentNode::RequestBody(b) => Some(b),
                _ => None,
            })
            .unwrap();
        assert!(body.required);
        assert!(body.content.contains_key("application/json"));
    }
}
