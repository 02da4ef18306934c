//! Document Model
//!
//! The dialect-neutral representation every conversion passes through.
//! [`CollectItem`] mirrors a persisted tree node without persistence or
//! dialect concerns; [`SpecDocument`] wraps a collection tree together with
//! the shared definitions and project metadata of a whole API description.
//!
//! Shared definitions are referenced from schemas and content by path-like
//! tokens (see [`crate::reference`]): `#/definitions/schemas/<name>`,
//! `#/commons/responses/<name>` and `#/globals/parameters/<location>/<key>`,
//! where a global's key is the one it is shared under in its document.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identifier of a persisted tree node (environment-local)
pub type NodeId = u64;

/// Identifier of a project
pub type ProjectId = u64;

/// Identifier of the member performing a change
pub type ActorId = u64;

/// Parent id used for nodes at the root of a project forest
pub const ROOT_ID: NodeId = 0;

/// Structural kind of a tree node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Category,
    Document,
}

/// What a document node's content describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContentKind {
    HttpOperation,
    Prose,
}

/// Where a parameter is carried in the request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterLocation {
    Header,
    Cookie,
    Query,
    Path,
}

impl ParameterLocation {
    pub const ALL: [ParameterLocation; 4] = [
        ParameterLocation::Header,
        ParameterLocation::Cookie,
        ParameterLocation::Query,
        ParameterLocation::Path,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ParameterLocation::Header => "header",
            ParameterLocation::Cookie => "cookie",
            ParameterLocation::Query => "query",
            ParameterLocation::Path => "path",
        }
    }

    /// Parse the `in` value of a wire parameter
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "header" => Some(ParameterLocation::Header),
            "cookie" => Some(ParameterLocation::Cookie),
            "query" => Some(ParameterLocation::Query),
            "path" => Some(ParameterLocation::Path),
            _ => None,
        }
    }
}

impl fmt::Display for ParameterLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A node of the dialect-neutral collection tree.
///
/// `items` is populated only for categories, `content` only for documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectItem {
    #[serde(default)]
    pub id: NodeId,
    #[serde(default)]
    pub parent_id: NodeId,
    pub title: String,
    pub kind: NodeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_kind: Option<ContentKind>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<CollectItem>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub content: Vec<ContentNode>,
}

impl CollectItem {
    /// Create an unpersisted category
    pub fn category(title: impl Into<String>, items: Vec<CollectItem>) -> Self {
        Self {
            id: 0,
            parent_id: 0,
            title: title.into(),
            kind: NodeKind::Category,
            content_kind: None,
            tags: Vec::new(),
            items,
            content: Vec::new(),
        }
    }

    /// Create an unpersisted HTTP operation document
    pub fn document(title: impl Into<String>, content: Vec<ContentNode>) -> Self {
        Self {
            id: 0,
            parent_id: 0,
            title: title.into(),
            kind: NodeKind::Document,
            content_kind: Some(ContentKind::HttpOperation),
            tags: Vec::new(),
            items: Vec::new(),
            content,
        }
    }

    pub fn is_category(&self) -> bool {
        self.kind == NodeKind::Category || !self.items.is_empty()
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// Append a tag unless it is already present
    pub fn add_tag(&mut self, tag: impl Into<String>) {
        let tag = tag.into();
        if !self.has_tag(&tag) {
            self.tags.push(tag);
        }
    }

    /// The operation metadata node of a document, if any
    pub fn operation(&self) -> Option<&HttpOperation> {
        self.content.iter().find_map(|node| match node {
            ContentNode::Operation(op) => Some(op),
            _ => None,
        })
    }

    /// All documents below (and including) this item, pre-order
    pub fn documents(&self) -> Vec<&CollectItem> {
        let mut out = Vec::new();
        collect_documents(std::slice::from_ref(self), &mut out);
        out
    }
}

fn collect_documents<'a>(items: &'a [CollectItem], out: &mut Vec<&'a CollectItem>) {
    for item in items {
        if item.is_category() {
            collect_documents(&item.items, out);
        } else {
            out.push(item);
        }
    }
}

/// Polymorphic content unit inside a document body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "attrs", rename_all = "kebab-case")]
pub enum ContentNode {
    Operation(HttpOperation),
    Parameter(Parameter),
    RequestBody(RequestBody),
    Response(Response),
    Paragraph(Paragraph),
}

/// Operation metadata: where the endpoint lives and how it is described
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpOperation {
    pub path: String,
    /// Lowercase HTTP method
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub deprecated: bool,
    /// Global parameter references that do not apply to this operation
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub excluded_globals: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "in")]
    pub location: ParameterLocation,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub deprecated: bool,
    #[serde(default)]
    pub schema: Value,
    /// Key a global parameter is shared under in the source document
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaType {
    #[serde(default)]
    pub schema: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub required: bool,
    /// Media type → payload description
    #[serde(default)]
    pub content: BTreeMap<String, MediaType>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Header {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub required: bool,
    #[serde(default)]
    pub schema: Value,
}

/// Shape shared by inline responses and common responses
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseBody {
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub content: BTreeMap<String, MediaType>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, Header>,
}

/// A response of an operation, either inline or a common-response reference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Status code or `default`
    pub code: String,
    #[serde(rename = "$ref", default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(flatten)]
    pub body: ResponseBody,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paragraph {
    pub text: String,
}

// --- Whole-document model ---

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Info {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Server {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A named, reusable schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub schema: Value,
}

/// A named, reusable response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommonResponse {
    pub name: String,
    #[serde(flatten)]
    pub body: ResponseBody,
}

/// Uniform definition tables, whatever section the dialect kept them in
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Definitions {
    #[serde(default)]
    pub schemas: Vec<SchemaDefinition>,
    #[serde(default)]
    pub responses: Vec<CommonResponse>,
}

/// A complete API description in dialect-neutral form
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpecDocument {
    pub info: Info,
    #[serde(default)]
    pub servers: Vec<Server>,
    #[serde(default)]
    pub definitions: Definitions,
    /// Project-wide parameters applied to every operation unless excluded
    #[serde(default)]
    pub globals: Vec<Parameter>,
    #[serde(default)]
    pub collections: Vec<CollectItem>,
}

impl SpecDocument {
    /// Every document of the collection tree, pre-order
    pub fn documents(&self) -> Vec<&CollectItem> {
        let mut out = Vec::new();
        collect_documents(&self.collections, &mut out);
        out
    }

    pub fn schema(&self, name: &str) -> Option<&SchemaDefinition> {
        self.definitions.schemas.iter().find(|s| s.name == name)
    }

    pub fn response(&self, name: &str) -> Option<&CommonResponse> {
        self.definitions.responses.iter().find(|r| r.name == name)
    }
}
