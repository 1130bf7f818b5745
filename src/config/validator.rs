//! Config validation: referential integrity, identifier safety and API consistency.

use crate::config::FullConfig;
use crate::error::ConfigError;
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

/// Identifiers end up quoted in SQL; restrict them anyway so config mistakes surface early.
static IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,62}$").expect("identifier regex")
});

pub fn is_identifier(s: &str) -> bool {
    IDENTIFIER.is_match(s)
}

fn check_identifier(s: &str) -> Result<(), ConfigError> {
    if is_identifier(s) {
        Ok(())
    } else {
        Err(ConfigError::InvalidIdentifier(s.to_string()))
    }
}

/// Default schema id when configs omit schema_id.
pub fn default_schema_id(config: &FullConfig) -> Result<&str, ConfigError> {
    config
        .schemas
        .first()
        .map(|s| s.id.as_str())
        .ok_or_else(|| ConfigError::Validation("at least one schema required".into()))
}

pub fn validate(config: &FullConfig) -> Result<(), ConfigError> {
    let default_sid = default_schema_id(config)?;
    let schema_ids: HashSet<&str> = config.schemas.iter().map(|s| s.id.as_str()).collect();
    let table_ids: HashSet<&str> = config.tables.iter().map(|t| t.id.as_str()).collect();

    for s in &config.schemas {
        check_identifier(&s.name)?;
    }

    for t in &config.tables {
        check_identifier(&t.name)?;
        let sid = t.schema_id.as_deref().unwrap_or(default_sid);
        if !schema_ids.contains(sid) {
            return Err(ConfigError::MissingReference {
                kind: "schema",
                id: sid.to_string(),
            });
        }
        let table_columns: HashSet<&str> = config
            .columns
            .iter()
            .filter(|c| c.table_id == t.id)
            .map(|c| c.name.as_str())
            .collect();
        if t.primary_key.columns().is_empty() {
            return Err(ConfigError::InvalidPrimaryKey {
                table_id: t.id.clone(),
                column: String::new(),
            });
        }
        for pk in t.primary_key.columns() {
            if !table_columns.contains(pk) {
                return Err(ConfigError::InvalidPrimaryKey {
                    table_id: t.id.clone(),
                    column: pk.to_string(),
                });
            }
        }
    }

    for c in &config.columns {
        check_identifier(&c.name)?;
        if !table_ids.contains(c.table_id.as_str()) {
            return Err(ConfigError::MissingReference {
                kind: "table",
                id: c.table_id.clone(),
            });
        }
    }

    let column_table = |column_id: &str| {
        config
            .columns
            .iter()
            .find(|c| c.id == column_id)
            .map(|c| c.table_id.as_str())
    };

    for r in &config.relationships {
        let ends_ok = column_table(&r.from_column_id) == Some(r.from_table_id.as_str())
            && column_table(&r.to_column_id) == Some(r.to_table_id.as_str());
        let through_ok = r.through.as_ref().map_or(true, |t| {
            column_table(&t.from_column_id) == Some(t.table_id.as_str())
                && column_table(&t.to_column_id) == Some(t.table_id.as_str())
        });
        if !ends_ok || !through_ok {
            return Err(ConfigError::MissingReference {
                kind: "relationship",
                id: r.id.clone(),
            });
        }
        for name in r.name.iter().chain(r.inverse_name.iter()) {
            check_identifier(name)?;
        }
    }

    let mut path_segments = HashSet::new();
    for api in &config.api_entities {
        if !table_ids.contains(api.entity_id.as_str()) {
            return Err(ConfigError::MissingReference {
                kind: "table",
                id: api.entity_id.clone(),
            });
        }
        if !path_segments.insert(api.path_segment.as_str()) {
            return Err(ConfigError::DuplicatePathSegment(api.path_segment.clone()));
        }
    }

    Ok(())
}
