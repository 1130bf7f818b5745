//! Raw model config types as stored in the JSON config files.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SchemaConfig {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PrimaryKeyConfig {
    Single(String),
    Composite(Vec<String>),
}

impl PrimaryKeyConfig {
    pub fn columns(&self) -> Vec<&str> {
        match self {
            PrimaryKeyConfig::Single(s) => vec![s.as_str()],
            PrimaryKeyConfig::Composite(v) => v.iter().map(String::as_str).collect(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TableConfig {
    pub id: String,
    #[serde(default)]
    pub schema_id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub comment: Option<String>,
    pub primary_key: PrimaryKeyConfig,
    /// Skip the implicit created_at/updated_at/archived_at columns (junction tables).
    #[serde(default)]
    pub no_timestamps: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnTypeConfig {
    Simple(String),
    Parameterized { name: String, params: Option<Vec<u32>> },
}

impl ColumnTypeConfig {
    pub fn name(&self) -> &str {
        match self {
            ColumnTypeConfig::Simple(s) => s.as_str(),
            ColumnTypeConfig::Parameterized { name, .. } => name.as_str(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ColumnConfig {
    pub id: String,
    pub table_id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub type_: ColumnTypeConfig,
    #[serde(default = "default_true")]
    pub nullable: bool,
    #[serde(default)]
    pub comment: Option<String>,
}

fn default_true() -> bool {
    true
}

/// Junction table of a many-to-many relationship. `from_column_id` references the
/// relationship's from side, `to_column_id` its to side.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ThroughConfig {
    pub table_id: String,
    pub from_column_id: String,
    pub to_column_id: String,
}

/// A relationship between two tables.
///
/// Without `through` this is a foreign key: `from_column_id` on the from table
/// references `to_column_id` on the to table. The from table sees it as a
/// to-one relationship named `name`, the to table as a to-many relationship
/// named `inverse_name`.
///
/// With `through` both columns are the key columns the junction table points at,
/// and both sides see a to-many relationship whose target is the junction table.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RelationshipConfig {
    pub id: String,
    pub from_table_id: String,
    pub from_column_id: String,
    pub to_table_id: String,
    pub to_column_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub inverse_name: Option<String>,
    #[serde(default)]
    pub through: Option<ThroughConfig>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiEntityConfig {
    pub entity_id: String,
    pub path_segment: String,
    /// Column names that must never be exposed in API responses nor be used in filters or sorts.
    #[serde(default)]
    pub sensitive_columns: Vec<String>,
}

/// All config types in one struct for in-memory loading.
#[derive(Clone, Debug, Default)]
pub struct FullConfig {
    pub schemas: Vec<SchemaConfig>,
    pub tables: Vec<TableConfig>,
    pub columns: Vec<ColumnConfig>,
    pub relationships: Vec<RelationshipConfig>,
    pub api_entities: Vec<ApiEntityConfig>,
}
