//! Resolved entity model: config validated and flattened for runtime use.

use std::collections::{HashMap, HashSet};

/// How many rows of the target a single row of the owner can relate to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Cardinality {
    One,
    Many,
}

/// A relationship as seen from one table, with everything needed to join it.
#[derive(Clone, Debug, PartialEq)]
pub struct RelationshipInfo {
    /// Name used in dotted properties (`country.name`).
    pub name: String,
    pub cardinality: Cardinality,
    /// Table id joined to resolve the relationship: the related table, or the
    /// junction table for many-to-many.
    pub target_table_id: String,
    pub via_junction: bool,
    /// Our column in the join condition.
    pub our_key_column: String,
    /// Target's column in the join condition.
    pub their_key_column: String,
}

/// Primary key type for parsing path ids.
#[derive(Clone, Debug, PartialEq)]
pub enum PkType {
    Uuid,
    BigInt,
    Int,
    Text,
}

#[derive(Clone, Debug)]
pub struct ColumnInfo {
    pub name: String,
    pub pk_type: Option<PkType>,
    pub nullable: bool,
    /// PostgreSQL type name for parameter casts (e.g. "timestamptz", "bigint").
    pub pg_type: Option<String>,
}

#[derive(Clone, Debug)]
pub struct ResolvedEntity {
    pub table_id: String,
    pub schema_name: String,
    pub table_name: String,
    /// Set when the table is exposed through the API.
    pub path_segment: Option<String>,
    pub pk_columns: Vec<String>,
    pub pk_type: PkType,
    pub columns: Vec<ColumnInfo>,
    /// Column names to strip from all API responses and refuse in criteria.
    pub sensitive_columns: HashSet<String>,
    /// Declared relationships in config order.
    pub relationships: Vec<RelationshipInfo>,
}

impl ResolvedEntity {
    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Column usable in filters and sorts: exists and is not sensitive.
    pub fn queryable_column(&self, name: &str) -> Option<&ColumnInfo> {
        if self.sensitive_columns.contains(name) {
            return None;
        }
        self.column(name)
    }

    /// Name reported in errors: the API path when exposed, else the table id.
    pub fn display_name(&self) -> &str {
        self.path_segment.as_deref().unwrap_or(&self.table_id)
    }
}

#[derive(Clone, Debug, Default)]
pub struct ResolvedModel {
    /// Every configured table, junction tables included, by table id.
    pub entity_by_table: HashMap<String, ResolvedEntity>,
    /// API path segment -> table id.
    pub table_by_path: HashMap<String, String>,
}

impl ResolvedModel {
    pub fn entity_by_path(&self, path: &str) -> Option<&ResolvedEntity> {
        self.table_by_path
            .get(path)
            .and_then(|table_id| self.entity_by_table.get(table_id))
    }

    pub fn entity(&self, table_id: &str) -> Option<&ResolvedEntity> {
        self.entity_by_table.get(table_id)
    }
}
