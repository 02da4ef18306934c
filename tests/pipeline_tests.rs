//! Import / Export Pipeline Tests
//!
//! Runs collection trees and whole documents through the in-memory store and
//! checks reference rewriting, tag inheritance and the node lifecycle.

use std::collections::BTreeMap;

use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use spec_interchange::config::{InterchangeConfig, ItemErrorPolicy};
use spec_interchange::dialect::{self, DialectVersion};
use spec_interchange::model::{
    CollectItem, ContentNode, HttpOperation, Info, MediaType, NodeKind, Response, ResponseBody,
};
use spec_interchange::reference::ReferenceDomain;
use spec_interchange::storage::{Catalog, Project, TreeStore};
use spec_interchange::tree::RestoreTarget;
use spec_interchange::{
    Interchange, InterchangeError, MemoryStore, ReferenceResolver, TreeExporter, TreeImporter, TreeLifecycle,
};

const PETSTORE: &str = include_str!("fixtures/swagger_petstore.json");
const USERS: &str = include_str!("fixtures/openapi30_users.yaml");
const SHARED_IDS: &str = include_str!("fixtures/openapi30_shared_ids.json");

fn store() -> MemoryStore {
    let store = MemoryStore::new();
    store
        .add_project(Project {
            id: 1,
            info: Info {
                title: "Accounts".to_string(),
                description: None,
                version: "1.0".to_string(),
            },
            servers: Vec::new(),
        })
        .unwrap();
    store
}

fn user_operation(title: &str, path: &str) -> CollectItem {
    let mut content = BTreeMap::new();
    content.insert(
        "application/json".to_string(),
        MediaType {
            schema: json!({"$ref": "#/definitions/schemas/UserModel"}),
            example: None,
        },
    );
    CollectItem::document(
        title,
        vec![
            ContentNode::Operation(HttpOperation {
                path: path.to_string(),
                method: "get".to_string(),
                operation_id: None,
                description: None,
                deprecated: false,
                excluded_globals: Vec::new(),
            }),
            ContentNode::Response(Response {
                code: "200".to_string(),
                reference: None,
                body: ResponseBody {
                    description: "ok".to_string(),
                    content,
                    headers: BTreeMap::new(),
                },
            }),
        ],
    )
}

/// Six unrelated schemas first, so `UserModel` is stored with id 7
fn register_user_model(store: &MemoryStore) -> u64 {
    for n in 1..=6 {
        store
            .create_definition(1, ReferenceDomain::Schema, &format!("Filler{}", n), "{}".to_string())
            .unwrap();
    }
    let body = json!({"name": "UserModel", "schema": {"type": "object"}}).to_string();
    store
        .create_definition(1, ReferenceDomain::Schema, "UserModel", body)
        .unwrap()
        .id
}

// =============================================================================
// Reference rewriting
// =============================================================================

#[test]
fn test_users_category_round_trip() {
    let store = store();
    let user_model = register_user_model(&store);
    assert_eq!(user_model, 7);

    let refs = ReferenceResolver::new(&store).build_all(1).unwrap();
    let tree = vec![CollectItem::category(
        "Users",
        vec![
            user_operation("List users", "/users"),
            user_operation("Get user", "/users/{id}"),
        ],
    )];
    let report = TreeImporter::new(&store).import(1, 0, &tree, &refs).unwrap();
    assert_eq!(report.nodes.len(), 3);

    for document in &report.nodes[1..] {
        let content = document.content.as_deref().unwrap();
        assert!(content.contains("#/definitions/schemas/7\""));
        assert!(!content.contains("UserModel"));
    }

    let exported = TreeExporter::new(&store).export(1).unwrap();
    assert_eq!(exported.len(), 1);
    let users = &exported[0];
    assert_eq!(users.title, "Users");
    assert_eq!(users.kind, NodeKind::Category);
    assert_eq!(users.items.len(), 2);
    for document in &users.items {
        assert_eq!(document.tags.first().map(String::as_str), Some("Users"));
        let content = serde_json::to_string(&document.content).unwrap();
        assert!(content.contains("#/definitions/schemas/UserModel"));
    }
}

#[test]
fn test_unknown_names_stay_dangling() {
    let store = store();
    let refs = ReferenceResolver::new(&store).build_all(1).unwrap();
    let report = TreeImporter::new(&store)
        .import(1, 0, &[user_operation("Orphan", "/orphan")], &refs)
        .unwrap();
    let content = report.nodes[0].content.as_deref().unwrap();
    assert!(content.contains("#/definitions/schemas/UserModel"));
}

#[test]
fn test_every_domain_round_trips_through_storage() {
    let store = store();
    let interchange = Interchange::new(&store, InterchangeConfig::default());
    interchange.import_spec(1, 0, USERS.as_bytes(), None).unwrap();

    // Global parameters are stored as definitions of their location's domain
    let headers = store
        .list_definitions(1, ReferenceDomain::GlobalParameter(spec_interchange::model::ParameterLocation::Header))
        .unwrap();
    assert_eq!(headers.len(), 1);
    assert_eq!(headers[0].name, "tenant");

    let stored: Vec<String> = store
        .list_nodes(1)
        .unwrap()
        .into_iter()
        .filter_map(|n| n.content)
        .collect();
    assert!(stored.iter().all(|c| !c.contains("UserModel") && !c.contains("/cookie/session")));

    let original = dialect::decode(USERS.as_bytes(), None).unwrap();
    let exported = interchange.export_document(1).unwrap();
    assert_eq!(exported.definitions, original.definitions);
    assert_eq!(exported.globals.len(), original.globals.len());

    let create = exported
        .documents()
        .into_iter()
        .find(|d| d.title == "Create user")
        .unwrap();
    assert_eq!(
        create.operation().unwrap().excluded_globals,
        vec!["#/globals/parameters/cookie/session"]
    );
}

// =============================================================================
// Whole documents
// =============================================================================

#[test]
fn test_swagger_document_through_store() {
    let store = MemoryStore::new();
    let original: Value = serde_json::from_str(PETSTORE).unwrap();
    let decoded = dialect::decode(PETSTORE.as_bytes(), None).unwrap();
    store
        .add_project(Project {
            id: 1,
            info: decoded.info.clone(),
            servers: decoded.servers.clone(),
        })
        .unwrap();

    let interchange = Interchange::new(&store, InterchangeConfig::default());
    let report = interchange.import_document(1, 0, &decoded).unwrap();
    assert_eq!(report.created_definitions, 3 + 1 + 2);
    assert!(report.tree.is_complete());

    let bytes = interchange.export_spec(1, Some(DialectVersion::Swagger20)).unwrap();
    let encoded: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(encoded["definitions"], original["definitions"]);
    assert_eq!(encoded["responses"], original["responses"]);
    assert_eq!(encoded["host"], original["host"]);

    let get = &encoded["paths"]["/pets/{petId}"]["get"];
    assert_eq!(get["tags"], json!(["Pets"]));
    assert_eq!(get["responses"]["404"]["$ref"], "#/responses/NotFound");
    assert_eq!(get["responses"]["200"]["schema"]["$ref"], "#/definitions/Pet");
}

#[test]
fn test_same_named_globals_through_store() {
    let store = store();
    let interchange = Interchange::new(&store, InterchangeConfig::default());
    let report = interchange.import_spec(1, 0, SHARED_IDS.as_bytes(), None).unwrap();
    assert_eq!(report.created_definitions, 2);

    let mut names: Vec<String> = store
        .list_definitions(1, ReferenceDomain::GlobalParameter(spec_interchange::model::ParameterLocation::Path))
        .unwrap()
        .into_iter()
        .map(|d| d.name)
        .collect();
    names.sort();
    assert_eq!(names, vec!["petId", "userId"]);

    let original: Value = serde_json::from_str(SHARED_IDS).unwrap();
    let bytes = interchange.export_spec(1, Some(DialectVersion::OpenApi301)).unwrap();
    let encoded: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(encoded["components"]["parameters"], original["components"]["parameters"]);
    assert_eq!(
        encoded["paths"]["/users/{id}"]["get"]["parameters"],
        json!([{"$ref": "#/components/parameters/userId"}])
    );
    assert_eq!(
        encoded["paths"]["/pets/{id}"]["get"]["parameters"],
        json!([{"$ref": "#/components/parameters/petId"}])
    );
}

#[test]
fn test_export_uses_configured_target() {
    let store = store();
    let mut config = InterchangeConfig::default();
    config.codec.default_target = "3.1.x".to_string();
    let interchange = Interchange::new(&store, config);
    interchange.import_spec(1, 0, USERS.as_bytes(), None).unwrap();

    let bytes = interchange.export_spec(1, None).unwrap();
    let encoded: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(encoded["openapi"], "3.1.0");
    assert_eq!(
        encoded["components"]["schemas"]["UserModel"]["properties"]["email"]["type"],
        json!(["string", "null"])
    );
}

#[test]
fn test_abort_policy_surfaces_failures() {
    let store = store();
    store.fail_create_titled("Create user").unwrap();
    let mut config = InterchangeConfig::default();
    config.import.on_item_error = ItemErrorPolicy::Abort;

    let err = Interchange::new(&store, config)
        .import_spec(1, 0, USERS.as_bytes(), None)
        .unwrap_err();
    assert!(matches!(err, InterchangeError::ImportFailed { ref title, .. } if title == "Create user"));
}

#[test]
fn test_skip_policy_reports_failures() {
    let store = store();
    store.fail_create_titled("Create user").unwrap();

    let report = Interchange::new(&store, InterchangeConfig::default())
        .import_spec(1, 0, USERS.as_bytes(), None)
        .unwrap();
    assert_eq!(report.tree.skipped.len(), 1);
    let titles: Vec<_> = report.tree.nodes.iter().map(|n| n.title.as_str()).collect();
    assert_eq!(titles, vec!["Users", "List users", "Get user"]);
}

// =============================================================================
// Lifecycle
// =============================================================================

/// Intro (1), Guides (2), Users (3) with List (4) and Get (5)
fn seeded() -> MemoryStore {
    let store = store();
    let tree = vec![
        user_operation("Intro", "/"),
        CollectItem::category("Guides", Vec::new()),
        CollectItem::category(
            "Users",
            vec![user_operation("List", "/users"), user_operation("Get", "/users/{id}")],
        ),
    ];
    let refs = ReferenceResolver::new(&store).build_all(1).unwrap();
    let report = TreeImporter::new(&store).import(1, 0, &tree, &refs).unwrap();
    let ids: Vec<_> = report.nodes.iter().map(|n| n.id).collect();
    assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    store
}

#[test]
fn test_delete_then_restore_single_node() {
    let store = seeded();
    let lifecycle = TreeLifecycle::new(&store);

    let mut removed = lifecycle.delete(1, 3, 9).unwrap();
    removed.sort();
    assert_eq!(removed, vec![3, 4, 5]);
    assert!(store.get_node(1, 3).unwrap().is_none());
    assert_eq!(lifecycle.list_trash(1).unwrap().len(), 3);

    let tombstoned = store.get_node_unscoped(1, 4).unwrap().unwrap();
    assert_eq!(tombstoned.deleted_by, 9);

    let outcome = lifecycle
        .restore(1, 4, RestoreTarget::original(&tombstoned))
        .unwrap();
    assert!(outcome.orphaned);
    assert!(store.get_node(1, 4).unwrap().is_some());
    assert!(store.get_node(1, 3).unwrap().is_none());
    assert!(store.get_node(1, 5).unwrap().is_none());

    // Unreachable from the root while its parent stays tombstoned
    let exported = TreeExporter::new(&store).export(1).unwrap();
    let titles: Vec<_> = exported.iter().map(|i| i.title.as_str()).collect();
    assert!(!titles.contains(&"List"));
}

#[test]
fn test_failed_cascade_leaves_tree_untouched() {
    let store = seeded();
    store.fail_tombstone_of(5).unwrap();

    let err = TreeLifecycle::new(&store).delete(1, 3, 9).unwrap_err();
    assert!(matches!(err, InterchangeError::Transaction { node_id: 3, .. }));
    for id in [3, 4, 5] {
        assert!(store.get_node(1, id).unwrap().is_some(), "node {} tombstoned", id);
    }
    assert!(TreeLifecycle::new(&store).list_trash(1).unwrap().is_empty());
}

#[test]
fn test_move_into_empty_category() {
    let store = seeded();
    let lifecycle = TreeLifecycle::new(&store);
    lifecycle.move_node(1, 4, 2, 0, 9).unwrap();

    let exported = TreeExporter::new(&store).export(1).unwrap();
    let guides = exported.iter().find(|i| i.title == "Guides").unwrap();
    assert_eq!(guides.items.len(), 1);
    assert_eq!(guides.items[0].title, "List");
    assert_eq!(guides.items[0].tags, vec!["Guides"]);

    let err = lifecycle.move_node(1, 3, 3, 0, 9).unwrap_err();
    assert!(matches!(err, InterchangeError::InvalidOperation(_)));
}
