//! Reference domains and name↔id rewriting
//!
//! Interchange documents refer to shared definitions by human-readable name,
//! persisted content refers to them by numeric id. Each reference domain owns
//! a fixed path-like prefix; the token following the prefix is either a name
//! or an id depending on which side of the boundary the content lives.
//!
//! | Domain | Prefix |
//! |--------|--------|
//! | schemas | `#/definitions/schemas/` |
//! | common responses | `#/commons/responses/` |
//! | global parameters | `#/globals/parameters/{header,cookie,query,path}/` |
//!
//! A token is the maximal run after the prefix that contains none of
//! `"`, `\`, `/` or `#`. Rewriting is whole-token: `User` never matches inside
//! `UserDetail`, and tokens with no entry in the map are left as they are.

use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

use crate::error::{InterchangeError, Result};
use crate::model::{ParameterLocation, ProjectId};
use crate::storage::Catalog;

pub const SCHEMA_PREFIX: &str = "#/definitions/schemas/";
pub const RESPONSE_PREFIX: &str = "#/commons/responses/";
pub const GLOBAL_PARAMETER_PREFIX: &str = "#/globals/parameters/";

/// An independently namespaced set of reusable entities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceDomain {
    Schema,
    Response,
    GlobalParameter(ParameterLocation),
}

impl ReferenceDomain {
    pub const ALL: [ReferenceDomain; 6] = [
        ReferenceDomain::Schema,
        ReferenceDomain::Response,
        ReferenceDomain::GlobalParameter(ParameterLocation::Header),
        ReferenceDomain::GlobalParameter(ParameterLocation::Cookie),
        ReferenceDomain::GlobalParameter(ParameterLocation::Query),
        ReferenceDomain::GlobalParameter(ParameterLocation::Path),
    ];

    /// The prefix under which tokens of this domain appear
    pub fn prefix(&self) -> &'static str {
        match self {
            ReferenceDomain::Schema => SCHEMA_PREFIX,
            ReferenceDomain::Response => RESPONSE_PREFIX,
            ReferenceDomain::GlobalParameter(ParameterLocation::Header) => "#/globals/parameters/header/",
            ReferenceDomain::GlobalParameter(ParameterLocation::Cookie) => "#/globals/parameters/cookie/",
            ReferenceDomain::GlobalParameter(ParameterLocation::Query) => "#/globals/parameters/query/",
            ReferenceDomain::GlobalParameter(ParameterLocation::Path) => "#/globals/parameters/path/",
        }
    }

    /// Build a reference string for a token of this domain
    pub fn reference(&self, token: &str) -> String {
        format!("{}{}", self.prefix(), token)
    }

    /// Extract the token from a reference of this domain
    pub fn token<'a>(&self, reference: &'a str) -> Option<&'a str> {
        reference.strip_prefix(self.prefix()).filter(|t| !t.is_empty())
    }

    /// Map the path between `#/` and the token back to a domain
    fn from_path(path: &str) -> Option<Self> {
        match path {
            "definitions/schemas" => Some(ReferenceDomain::Schema),
            "commons/responses" => Some(ReferenceDomain::Response),
            _ => path
                .strip_prefix("globals/parameters/")
                .and_then(ParameterLocation::parse)
                .map(ReferenceDomain::GlobalParameter),
        }
    }
}

impl fmt::Display for ReferenceDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReferenceDomain::Schema => write!(f, "schemas"),
            ReferenceDomain::Response => write!(f, "responses"),
            ReferenceDomain::GlobalParameter(location) => write!(f, "global {} parameters", location),
        }
    }
}

fn token_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r#"#/(definitions/schemas|commons/responses|globals/parameters/(?:header|cookie|query|path))/([^"\\/#]+)"#,
        )
        .unwrap()
    })
}

/// Rewrite every reference token in `content`, asking `lookup` for the
/// replacement of each (domain, token) pair.
fn rewrite<F>(content: &str, mut lookup: F) -> String
where
    F: FnMut(ReferenceDomain, &str) -> Option<String>,
{
    token_pattern()
        .replace_all(content, |caps: &Captures| {
            let replacement = ReferenceDomain::from_path(&caps[1]).and_then(|d| lookup(d, &caps[2]));
            match replacement {
                Some(token) => format!("#/{}/{}", &caps[1], token),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Bijective name↔id table for one domain of one project
#[derive(Debug, Clone, Default)]
pub struct ReferenceMap {
    by_name: HashMap<String, u64>,
    by_id: HashMap<u64, String>,
}

impl ReferenceMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(id, name)` pairs. The first entry wins when a name or an
    /// id repeats, so the result is always a bijection.
    pub fn from_pairs<I>(domain: ReferenceDomain, pairs: I) -> Self
    where
        I: IntoIterator<Item = (u64, String)>,
    {
        let mut map = Self::new();
        for (id, name) in pairs {
            if !map.insert(id, name.clone()) {
                tracing::warn!(%domain, id, name = %name, "duplicate reference entry ignored");
            }
        }
        map
    }

    /// Insert a pair; returns false (and leaves the map untouched) if either
    /// side is already taken.
    pub fn insert(&mut self, id: u64, name: String) -> bool {
        if self.by_name.contains_key(&name) || self.by_id.contains_key(&id) {
            return false;
        }
        self.by_id.insert(id, name.clone());
        self.by_name.insert(name, id);
        true
    }

    pub fn id_of(&self, name: &str) -> Option<u64> {
        self.by_name.get(name).copied()
    }

    pub fn name_of(&self, id: u64) -> Option<&str> {
        self.by_id.get(&id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

/// The reference maps of every domain of a project
#[derive(Debug, Clone, Default)]
pub struct ReferenceMaps {
    maps: HashMap<ReferenceDomain, ReferenceMap>,
}

impl ReferenceMaps {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, domain: ReferenceDomain, map: ReferenceMap) {
        self.maps.insert(domain, map);
    }

    pub fn get(&self, domain: ReferenceDomain) -> Option<&ReferenceMap> {
        self.maps.get(&domain)
    }

    /// Replace name tokens with id tokens across all domains
    pub fn names_to_ids(&self, content: &str) -> String {
        rewrite(content, |domain, token| {
            self.get(domain)
                .and_then(|m| m.id_of(token))
                .map(|id| id.to_string())
        })
    }

    /// Replace id tokens with name tokens across all domains
    pub fn ids_to_names(&self, content: &str) -> String {
        rewrite(content, |domain, token| {
            let id = token.parse::<u64>().ok()?;
            self.get(domain)
                .and_then(|m| m.name_of(id))
                .map(str::to_string)
        })
    }
}

/// Builds reference maps from the project catalog.
///
/// Maps are rebuilt on every call; nothing is cached between operations.
pub struct ReferenceResolver<'a, C: ?Sized> {
    catalog: &'a C,
}

impl<'a, C: Catalog + ?Sized> ReferenceResolver<'a, C> {
    pub fn new(catalog: &'a C) -> Self {
        Self { catalog }
    }

    /// Build the map of a single domain. An empty domain yields an empty map.
    pub fn build_map(&self, project: ProjectId, domain: ReferenceDomain) -> Result<ReferenceMap> {
        self.ensure_project(project)?;
        self.load(project, domain)
    }

    /// Build the maps of every domain
    pub fn build_all(&self, project: ProjectId) -> Result<ReferenceMaps> {
        self.ensure_project(project)?;
        let mut maps = ReferenceMaps::new();
        for domain in ReferenceDomain::ALL {
            maps.insert(domain, self.load(project, domain)?);
        }
        Ok(maps)
    }

    fn ensure_project(&self, project: ProjectId) -> Result<()> {
        match self.catalog.project(project)? {
            Some(_) => Ok(()),
            None => Err(InterchangeError::not_found("project", project)),
        }
    }

    fn load(&self, project: ProjectId, domain: ReferenceDomain) -> Result<ReferenceMap> {
        let definitions = self.catalog.list_definitions(project, domain)?;
        Ok(ReferenceMap::from_pairs(
            domain,
            definitions.into_iter().map(|d| (d.id, d.name)),
        ))
    }
}
