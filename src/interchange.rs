//! End-to-end document pipeline
//!
//! `import_spec` decodes a document, registers its shared definitions with
//! the catalog and materializes its collection tree; `export_spec` goes the
//! other way. Definition bodies and node content are stored with references
//! in id form and leave the store with references in name form.

use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::InterchangeConfig;
use crate::dialect::{self, Dialect, DialectVersion};
use crate::error::{InterchangeError, Result};
use crate::model::{CommonResponse, Definitions, NodeId, Parameter, ProjectId, ResponseBody, SchemaDefinition, SpecDocument};
use crate::reference::{ReferenceDomain, ReferenceMaps, ReferenceResolver};
use crate::storage::{Definition, Store};
use crate::tree::{ImportReport, TreeExporter, TreeImporter};

/// Outcome of a document import
#[derive(Debug, Clone, Default)]
pub struct DocumentImport {
    /// Definitions created by this import
    pub created_definitions: usize,
    /// Definitions whose name already existed and whose body was replaced
    pub updated_definitions: usize,
    pub tree: ImportReport,
}

/// Runs documents through the codec, the catalog and the tree pipeline
pub struct Interchange<'a, S: ?Sized> {
    store: &'a S,
    config: InterchangeConfig,
}

impl<'a, S: Store + ?Sized> Interchange<'a, S> {
    pub fn new(store: &'a S, config: InterchangeConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &InterchangeConfig {
        &self.config
    }

    /// Decode `bytes` and import the result under `parent`
    pub fn import_spec(
        &self,
        project: ProjectId,
        parent: NodeId,
        bytes: &[u8],
        hint: Option<Dialect>,
    ) -> Result<DocumentImport> {
        let document = dialect::decode(bytes, hint)?;
        self.import_document(project, parent, &document)
    }

    /// Register the shared definitions of `document`, then import its tree
    pub fn import_document(&self, project: ProjectId, parent: NodeId, document: &SpecDocument) -> Result<DocumentImport> {
        if self.store.project(project)?.is_none() {
            return Err(InterchangeError::not_found("project", project));
        }

        let mut registrar = Registrar::new(self.store, project);
        for schema in &document.definitions.schemas {
            registrar.register(ReferenceDomain::Schema, &schema.name, schema)?;
        }
        for response in &document.definitions.responses {
            registrar.register(ReferenceDomain::Response, &response.name, &response.body)?;
        }
        for global in &document.globals {
            let token = dialect::global_token(global);
            registrar.register(ReferenceDomain::GlobalParameter(global.location), &token, global)?;
        }

        // Every name is known now, so bodies can reference each other by id
        let refs = ReferenceResolver::new(self.store).build_all(project)?;
        let (created, updated) = registrar.finish(&refs)?;

        let tree = TreeImporter::new(self.store)
            .with_actor(self.config.import.actor)
            .with_policy(self.config.import.on_item_error)
            .import(project, parent, &document.collections, &refs)?;

        tracing::info!(
            project,
            created_definitions = created,
            updated_definitions = updated,
            nodes = tree.nodes.len(),
            "document imported"
        );
        Ok(DocumentImport {
            created_definitions: created,
            updated_definitions: updated,
            tree,
        })
    }

    /// Rebuild the project's document in dialect-neutral form
    pub fn export_document(&self, project: ProjectId) -> Result<SpecDocument> {
        let metadata = self
            .store
            .project(project)?
            .ok_or_else(|| InterchangeError::not_found("project", project))?;
        let refs = ReferenceResolver::new(self.store).build_all(project)?;

        let mut definitions = Definitions::default();
        for definition in self.store.list_definitions(project, ReferenceDomain::Schema)? {
            if let Some(schema) = decode_body::<SchemaDefinition>(&definition, &refs) {
                definitions.schemas.push(schema);
            }
        }
        for definition in self.store.list_definitions(project, ReferenceDomain::Response)? {
            if let Some(body) = decode_body::<ResponseBody>(&definition, &refs) {
                definitions.responses.push(CommonResponse {
                    name: definition.name.clone(),
                    body,
                });
            }
        }
        let mut globals = Vec::new();
        for location in crate::model::ParameterLocation::ALL {
            let domain = ReferenceDomain::GlobalParameter(location);
            for definition in self.store.list_definitions(project, domain)? {
                if let Some(parameter) = decode_body::<Parameter>(&definition, &refs) {
                    globals.push(parameter);
                }
            }
        }

        let collections = TreeExporter::new(self.store)
            .inherit_category_tags(self.config.export.inherit_category_tags)
            .export_with(project, &refs)?;

        Ok(SpecDocument {
            info: metadata.info,
            servers: metadata.servers,
            definitions,
            globals,
            collections,
        })
    }

    /// Export and encode; `None` uses the configured default target
    pub fn export_spec(&self, project: ProjectId, version: Option<DialectVersion>) -> Result<Vec<u8>> {
        let version = match version {
            Some(version) => version,
            None => self.config.default_target()?,
        };
        let document = self.export_document(project)?;
        dialect::encode_as(&document, version, self.config.codec.output)
    }
}

/// Creates or updates definitions, then rewrites their bodies once the
/// reference maps cover every name.
struct Registrar<'a, S: ?Sized> {
    store: &'a S,
    project: ProjectId,
    existing: HashMap<ReferenceDomain, Vec<Definition>>,
    pending: Vec<Definition>,
    created: usize,
    updated: usize,
}

impl<'a, S: Store + ?Sized> Registrar<'a, S> {
    fn new(store: &'a S, project: ProjectId) -> Self {
        Self {
            store,
            project,
            existing: HashMap::new(),
            pending: Vec::new(),
            created: 0,
            updated: 0,
        }
    }

    fn register<T: Serialize>(&mut self, domain: ReferenceDomain, name: &str, value: &T) -> Result<()> {
        let body = serde_json::to_string(value)?;
        if !self.existing.contains_key(&domain) {
            let listed = self.store.list_definitions(self.project, domain)?;
            self.existing.insert(domain, listed);
        }

        let reused = self
            .existing
            .get(&domain)
            .and_then(|defs| defs.iter().find(|d| d.name == name))
            .cloned();
        match reused {
            Some(mut definition) => {
                tracing::debug!(%domain, name, id = definition.id, "definition replaced");
                definition.body = body;
                self.updated += 1;
                self.pending.push(definition);
            }
            None => {
                let definition = self.store.create_definition(self.project, domain, name, body)?;
                tracing::debug!(%domain, name, id = definition.id, "definition created");
                self.existing.entry(domain).or_default().push(definition.clone());
                self.created += 1;
                self.pending.push(definition);
            }
        }
        Ok(())
    }

    fn finish(self, refs: &ReferenceMaps) -> Result<(usize, usize)> {
        for mut definition in self.pending {
            definition.body = refs.names_to_ids(&definition.body);
            self.store.update_definition(&definition)?;
        }
        Ok((self.created, self.updated))
    }
}

/// Rewrite a stored body back to names and decode it; undecodable bodies are
/// left out of the export.
fn decode_body<T: DeserializeOwned>(definition: &Definition, refs: &ReferenceMaps) -> Option<T> {
    let named = refs.ids_to_names(&definition.body);
    match serde_json::from_str(&named) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(
                domain = %definition.domain,
                name = %definition.name,
                error = %e,
                "definition not decodable, left out of export"
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Info;
    use crate::storage::memory::MemoryStore;
    use crate::storage::{Catalog, Project, TreeStore};

    const USERS: &str = r##"{
        "swagger": "2.0",
        "info": {"title": "Users", "version": "1.0"},
        "definitions": {
            "UserModel": {"type": "object", "properties": {"best_friend": {"$ref": "#/definitions/UserModel"}}}
        },
        "paths": {
            "/users": {"get": {
                "tags": ["Users"],
                "summary": "List users",
                "responses": {"200": {"description": "ok", "schema": {"$ref": "#/definitions/UserModel"}}}
            }}
        }
    }"##;

    fn store() -> MemoryStore {
        let store = MemoryStore::new();
        store
            .add_project(Project {
                id: 1,
                info: Info {
                    title: "Users".to_string(),
                    description: None,
                    version: "1.0".to_string(),
                },
                servers: Vec::new(),
            })
            .unwrap();
        store
    }

    #[test]
    fn test_import_stores_ids() {
        let store = store();
        let interchange = Interchange::new(&store, InterchangeConfig::default());
        let report = interchange.import_spec(1, 0, USERS.as_bytes(), None).unwrap();
        assert_eq!(report.created_definitions, 1);
        assert!(report.tree.is_complete());

        let schema = &store.list_definitions(1, ReferenceDomain::Schema).unwrap()[0];
        let reference = format!("#/definitions/schemas/{}", schema.id);
        assert!(schema.body.contains(&reference));

        let document = store
            .list_nodes(1)
            .unwrap()
            .into_iter()
            .find(|n| n.title == "List users")
            .unwrap();
        let content = document.content.unwrap();
        assert!(content.contains(&reference));
        assert!(!content.contains("UserModel"));
    }

    #[test]
    fn test_reimport_reuses_definitions() {
        let store = store();
        let interchange = Interchange::new(&store, InterchangeConfig::default());
        interchange.import_spec(1, 0, USERS.as_bytes(), None).unwrap();
        let again = interchange.import_spec(1, 0, USERS.as_bytes(), None).unwrap();
        assert_eq!(again.created_definitions, 0);
        assert_eq!(again.updated_definitions, 1);
        assert_eq!(store.list_definitions(1, ReferenceDomain::Schema).unwrap().len(), 1);
    }

    #[test]
    fn test_export_restores_names() {
        let store = store();
        let interchange = Interchange::new(&store, InterchangeConfig::default());
        interchange.import_spec(1, 0, USERS.as_bytes(), None).unwrap();

        let document = interchange.export_document(1).unwrap();
        let user = document.schema("UserModel").unwrap();
        assert_eq!(
            user.schema["properties"]["best_friend"]["$ref"],
            "#/definitions/schemas/UserModel"
        );

        let bytes = interchange.export_spec(1, Some(DialectVersion::Swagger20)).unwrap();
        let encoded: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(
            encoded["paths"]["/users"]["get"]["responses"]["200"]["schema"]["$ref"],
            "#/definitions/UserModel"
        );
    }

    #[test]
    fn test_unknown_project() {
        let store = store();
        let interchange = Interchange::new(&store, InterchangeConfig::default());
        let err = interchange.import_spec(9, 0, USERS.as_bytes(), None).unwrap_err();
        assert!(matches!(err, InterchangeError::NotFound { entity: "project", .. }));
    }
}
