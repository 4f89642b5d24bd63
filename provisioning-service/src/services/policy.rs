//! Role to collection-grant resolution.
//!
//! A pure function of the static policy table and the input role string.
//! Every resolution includes the organization-wide baseline collection,
//! whatever the role.

use crate::models::CollectionGrant;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};

/// One collection entry in the policy table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CollectionPolicy {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub read_only: bool,
    #[serde(default)]
    pub hide_passwords: bool,
    #[serde(default)]
    pub manage: bool,
}

impl CollectionPolicy {
    fn grant(&self) -> CollectionGrant {
        CollectionGrant {
            id: self.id.clone(),
            read_only: self.read_only,
            hide_passwords: self.hide_passwords,
            manage: self.manage,
        }
    }
}

/// The role→collections table plus the baseline collection every member
/// receives.
#[derive(Debug, Clone, Deserialize)]
pub struct AccessPolicy {
    pub baseline: CollectionPolicy,
    #[serde(default)]
    pub roles: HashMap<String, Vec<CollectionPolicy>>,
    /// Applied when the role is absent from the table, before the baseline
    /// is appended.
    #[serde(default, rename = "default")]
    pub default_role: Vec<CollectionPolicy>,
}

impl Default for AccessPolicy {
    fn default() -> Self {
        Self {
            baseline: CollectionPolicy {
                id: "all-teams".to_string(),
                name: "All Teams".to_string(),
                read_only: true,
                hide_passwords: false,
                manage: false,
            },
            roles: HashMap::new(),
            default_role: Vec::new(),
        }
    }
}

impl AccessPolicy {
    /// Exact role, then lower-cased role, then the default entry.
    fn entries_for(&self, role: &str) -> &[CollectionPolicy] {
        if let Some(entries) = self.roles.get(role) {
            return entries;
        }
        if let Some(entries) = self.roles.get(&role.to_lowercase()) {
            return entries;
        }
        &self.default_role
    }

    /// Role entries followed by the baseline, deduplicated by collection id.
    fn resolve(&self, role: &str) -> Vec<&CollectionPolicy> {
        let mut seen = HashSet::new();
        self.entries_for(role)
            .iter()
            .chain(std::iter::once(&self.baseline))
            .filter(|entry| seen.insert(entry.id.as_str()))
            .collect()
    }

    pub fn resolve_grants(&self, role: &str) -> Vec<CollectionGrant> {
        self.resolve(role).into_iter().map(|e| e.grant()).collect()
    }

    /// Human-readable collection names for user-facing replies.
    pub fn resolve_collection_names(&self, role: &str) -> Vec<String> {
        self.resolve(role)
            .into_iter()
            .map(|e| e.name.clone())
            .collect()
    }
}
