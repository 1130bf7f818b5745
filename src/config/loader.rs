//! Load config from a directory of JSON files and resolve it into a runtime model.

use crate::config::resolved::{Cardinality, ColumnInfo, PkType, RelationshipInfo, ResolvedEntity, ResolvedModel};
use crate::config::types::*;
use crate::config::{default_schema_id, validate, FullConfig};
use crate::error::ConfigError;
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Build resolved model from full config. Validates first.
pub fn resolve(config: &FullConfig) -> Result<ResolvedModel, ConfigError> {
    validate(config)?;
    let default_sid = default_schema_id(config)?;

    let schemas_by_id: HashMap<_, _> = config.schemas.iter().map(|s| (s.id.as_str(), s)).collect();
    let tables_by_id: HashMap<_, _> = config.tables.iter().map(|t| (t.id.as_str(), t)).collect();
    let columns_by_table: HashMap<_, Vec<&ColumnConfig>> = config
        .columns
        .iter()
        .fold(HashMap::new(), |mut m, c| {
            m.entry(c.table_id.as_str()).or_default().push(c);
            m
        });
    let column_id_to_name: HashMap<&str, &str> = config.columns.iter().map(|c| (c.id.as_str(), c.name.as_str())).collect();
    let api_by_table: HashMap<&str, &ApiEntityConfig> = config
        .api_entities
        .iter()
        .map(|api| (api.entity_id.as_str(), api))
        .collect();

    let mut entity_by_table = HashMap::new();
    let mut table_by_path = HashMap::new();

    for table in &config.tables {
        let table_sid = table.schema_id.as_deref().unwrap_or(default_sid);
        let schema = schemas_by_id
            .get(table_sid)
            .ok_or_else(|| ConfigError::MissingReference {
                kind: "schema",
                id: table_sid.to_string(),
            })?;
        let table_columns = columns_by_table
            .get(table.id.as_str())
            .map(|v| v.as_slice())
            .unwrap_or(&[]);

        let pk_names: Vec<String> = table.primary_key.columns().into_iter().map(str::to_string).collect();
        let first_pk = pk_names.first().map(String::as_str).unwrap_or_default();
        let pk_col = table_columns
            .iter()
            .find(|c| c.name == first_pk)
            .ok_or_else(|| ConfigError::InvalidPrimaryKey {
                table_id: table.id.clone(),
                column: first_pk.to_string(),
            })?;
        let pk_type = infer_pk_type(pk_col);

        let mut columns: Vec<ColumnInfo> = table_columns
            .iter()
            .map(|c| ColumnInfo {
                name: c.name.clone(),
                pk_type: pk_names.contains(&c.name).then(|| pk_type.clone()),
                nullable: c.nullable,
                pg_type: column_pg_type_name(&c.type_),
            })
            .collect();

        if !table.no_timestamps {
            let config_col_names: HashSet<String> = columns.iter().map(|c| c.name.clone()).collect();
            for (name, nullable) in [("created_at", false), ("updated_at", false), ("archived_at", true)] {
                if !config_col_names.contains(name) {
                    columns.push(ColumnInfo {
                        name: name.to_string(),
                        pk_type: None,
                        nullable,
                        pg_type: Some("timestamptz".into()),
                    });
                }
            }
        }

        let api = api_by_table.get(table.id.as_str());
        let relationships = build_relationships_for_table(
            &table.id,
            &config.relationships,
            &column_id_to_name,
            &tables_by_id,
        )?;
        let entity = ResolvedEntity {
            table_id: table.id.clone(),
            schema_name: schema.name.clone(),
            table_name: table.name.clone(),
            path_segment: api.map(|a| a.path_segment.clone()),
            pk_columns: pk_names,
            pk_type,
            columns,
            sensitive_columns: api
                .map(|a| a.sensitive_columns.iter().cloned().collect())
                .unwrap_or_default(),
            relationships,
        };
        if let Some(api) = api {
            table_by_path.insert(api.path_segment.clone(), table.id.clone());
        }
        entity_by_table.insert(table.id.clone(), entity);
    }

    tracing::debug!(
        tables = entity_by_table.len(),
        entities = table_by_path.len(),
        "resolved model"
    );
    Ok(ResolvedModel {
        entity_by_table,
        table_by_path,
    })
}

/// Relationships visible from `our_table_id`, in config order. A foreign key
/// contributes a to-one on its from side and a to-many on its to side; a
/// many-to-many contributes a to-many through the junction on both sides.
fn build_relationships_for_table(
    our_table_id: &str,
    relationships: &[RelationshipConfig],
    column_id_to_name: &HashMap<&str, &str>,
    tables_by_id: &HashMap<&str, &TableConfig>,
) -> Result<Vec<RelationshipInfo>, ConfigError> {
    let column = |id: &str| {
        column_id_to_name
            .get(id)
            .map(|s| s.to_string())
            .ok_or_else(|| ConfigError::MissingReference {
                kind: "column",
                id: id.to_string(),
            })
    };
    let table_name = |id: &str| {
        tables_by_id
            .get(id)
            .map(|t| t.name.clone())
            .ok_or_else(|| ConfigError::MissingReference {
                kind: "table",
                id: id.to_string(),
            })
    };

    let mut out: Vec<RelationshipInfo> = Vec::new();
    for rel in relationships {
        if rel.from_table_id == our_table_id {
            let name = match &rel.name {
                Some(n) => n.clone(),
                None => table_name(&rel.to_table_id)?,
            };
            let info = match &rel.through {
                None => RelationshipInfo {
                    name,
                    cardinality: Cardinality::One,
                    target_table_id: rel.to_table_id.clone(),
                    via_junction: false,
                    our_key_column: column(&rel.from_column_id)?,
                    their_key_column: column(&rel.to_column_id)?,
                },
                Some(through) => RelationshipInfo {
                    name,
                    cardinality: Cardinality::Many,
                    target_table_id: through.table_id.clone(),
                    via_junction: true,
                    our_key_column: column(&rel.from_column_id)?,
                    their_key_column: column(&through.from_column_id)?,
                },
            };
            push_unique(&mut out, our_table_id, info)?;
        }
        if rel.to_table_id == our_table_id {
            let name = match &rel.inverse_name {
                Some(n) => n.clone(),
                None => table_name(&rel.from_table_id)?,
            };
            let info = match &rel.through {
                None => RelationshipInfo {
                    name,
                    cardinality: Cardinality::Many,
                    target_table_id: rel.from_table_id.clone(),
                    via_junction: false,
                    our_key_column: column(&rel.to_column_id)?,
                    their_key_column: column(&rel.from_column_id)?,
                },
                Some(through) => RelationshipInfo {
                    name,
                    cardinality: Cardinality::Many,
                    target_table_id: through.table_id.clone(),
                    via_junction: true,
                    our_key_column: column(&rel.to_column_id)?,
                    their_key_column: column(&through.to_column_id)?,
                },
            };
            push_unique(&mut out, our_table_id, info)?;
        }
    }
    Ok(out)
}

/// Joins are aliased by relationship name; `main` is the root table's alias.
const RESERVED_RELATIONSHIP_NAME: &str = "main";

fn push_unique(out: &mut Vec<RelationshipInfo>, table_id: &str, info: RelationshipInfo) -> Result<(), ConfigError> {
    if info.name == RESERVED_RELATIONSHIP_NAME {
        return Err(ConfigError::Validation(format!(
            "relationship name '{}' on table {} is reserved",
            info.name, table_id
        )));
    }
    if out.iter().any(|r| r.name == info.name) {
        return Err(ConfigError::DuplicateRelationship {
            table_id: table_id.to_string(),
            name: info.name,
        });
    }
    out.push(info);
    Ok(())
}

fn column_pg_type_name(ty: &ColumnTypeConfig) -> Option<String> {
    let name = ty.name();
    let lower = name.to_lowercase();
    let normalized = match lower.as_str() {
        "timestamptz" | "timestamp with time zone" => "timestamptz",
        "date" => "date",
        "uuid" => "uuid",
        "bool" | "boolean" => "boolean",
        "bigserial" | "bigint" | "int8" => "bigint",
        "serial" | "integer" | "int" | "int4" => "integer",
        "smallint" | "int2" => "smallint",
        "real" | "float4" => "real",
        "double precision" | "float8" => "double precision",
        "numeric" | "decimal" => "numeric",
        "text" | "varchar" | "character varying" | "char" | "character" => "text",
        "json" | "jsonb" => "jsonb",
        l if l == "timestamp" || l.starts_with("timestamp ") => "timestamp",
        // Schema-qualified custom type (e.g. catalog.loan_status); cast so text binds correctly
        _ if name.contains('.') => return Some(name.to_string()),
        _ => return None,
    };
    Some(normalized.to_string())
}

fn infer_pk_type(col: &ColumnConfig) -> PkType {
    let type_lower = col.type_.name().to_lowercase();
    if type_lower.contains("uuid") {
        PkType::Uuid
    } else if type_lower.contains("bigserial") || type_lower.contains("bigint") {
        PkType::BigInt
    } else if type_lower.contains("serial") || type_lower.contains("integer") || type_lower.contains("int") {
        PkType::Int
    } else {
        PkType::Text
    }
}

/// Load full config from `dir`: schemas.json, tables.json, columns.json,
/// relationships.json and api_entities.json. Missing relationships/api_entities
/// files count as empty.
pub async fn load_from_dir(dir: impl AsRef<Path>) -> Result<FullConfig, ConfigError> {
    let dir = dir.as_ref();
    tracing::info!(path = %dir.display(), "loading model config");
    Ok(FullConfig {
        schemas: read_json(&dir.join("schemas.json"), false).await?,
        tables: read_json(&dir.join("tables.json"), false).await?,
        columns: read_json(&dir.join("columns.json"), false).await?,
        relationships: read_json(&dir.join("relationships.json"), true).await?,
        api_entities: read_json(&dir.join("api_entities.json"), true).await?,
    })
}

async fn read_json<T>(path: &Path, optional: bool) -> Result<Vec<T>, ConfigError>
where
    T: for<'de> serde::Deserialize<'de>,
{
    let text = match tokio::fs::read_to_string(path).await {
        Ok(text) => text,
        Err(e) if optional && e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "optional config file missing");
            return Ok(Vec::new());
        }
        Err(e) => return Err(ConfigError::Load(format!("{}: {}", path.display(), e))),
    };
    serde_json::from_str(&text).map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config() -> FullConfig {
        FullConfig {
            schemas: serde_json::from_value(json!([{ "id": "s", "name": "public" }])).unwrap(),
            tables: serde_json::from_value(json!([
                { "id": "users", "name": "users", "primary_key": "id" },
                { "id": "libraries", "name": "libraries", "primary_key": "id" },
                { "id": "roles", "name": "roles", "primary_key": "id" },
                { "id": "user_roles", "name": "user_roles", "primary_key": ["user_id", "role_id"], "no_timestamps": true }
            ]))
            .unwrap(),
            columns: serde_json::from_value(json!([
                { "id": "u.id", "table_id": "users", "name": "id", "type": "bigserial" },
                { "id": "u.lib", "table_id": "users", "name": "library_id", "type": "bigint" },
                { "id": "u.pw", "table_id": "users", "name": "password_hash", "type": "text" },
                { "id": "l.id", "table_id": "libraries", "name": "id", "type": "uuid" },
                { "id": "r.id", "table_id": "roles", "name": "id", "type": "integer" },
                { "id": "ur.u", "table_id": "user_roles", "name": "user_id", "type": "bigint" },
                { "id": "ur.r", "table_id": "user_roles", "name": "role_id", "type": "integer" }
            ]))
            .unwrap(),
            relationships: serde_json::from_value(json!([
                { "id": "r1", "from_table_id": "users", "from_column_id": "u.lib",
                  "to_table_id": "libraries", "to_column_id": "l.id",
                  "name": "library", "inverse_name": "users" },
                { "id": "r2", "from_table_id": "users", "from_column_id": "u.id",
                  "to_table_id": "roles", "to_column_id": "r.id", "name": "roles",
                  "through": { "table_id": "user_roles", "from_column_id": "ur.u", "to_column_id": "ur.r" } }
            ]))
            .unwrap(),
            api_entities: serde_json::from_value(json!([
                { "entity_id": "users", "path_segment": "users", "sensitive_columns": ["password_hash"] }
            ]))
            .unwrap(),
        }
    }

    #[test]
    fn resolves_foreign_key_both_ways() {
        let model = resolve(&config()).unwrap();
        let users = model.entity_by_path("users").unwrap();
        assert_eq!(users.relationships[0].name, "library");
        assert_eq!(users.relationships[0].cardinality, Cardinality::One);
        assert_eq!(users.relationships[0].our_key_column, "library_id");
        assert_eq!(users.relationships[0].their_key_column, "id");

        let libraries = model.entity("libraries").unwrap();
        assert_eq!(libraries.path_segment, None);
        assert_eq!(libraries.pk_type, PkType::Uuid);
        let inverse = &libraries.relationships[0];
        assert_eq!(inverse.name, "users");
        assert_eq!(inverse.cardinality, Cardinality::Many);
        assert_eq!(inverse.target_table_id, "users");
        assert_eq!(inverse.their_key_column, "library_id");
    }

    #[test]
    fn many_to_many_targets_the_junction() {
        let model = resolve(&config()).unwrap();
        let roles = &model.entity("users").unwrap().relationships[1];
        assert_eq!(roles.target_table_id, "user_roles");
        assert!(roles.via_junction);
        assert_eq!(roles.our_key_column, "id");
        assert_eq!(roles.their_key_column, "user_id");

        // inverse side defaults to the from table's name
        let users = &model.entity("roles").unwrap().relationships[0];
        assert_eq!(users.name, "users");
        assert_eq!(users.their_key_column, "role_id");
    }

    #[test]
    fn timestamps_added_unless_disabled() {
        let model = resolve(&config()).unwrap();
        assert!(model.entity("users").unwrap().column("created_at").is_some());
        assert!(model.entity("user_roles").unwrap().column("created_at").is_none());
    }

    #[test]
    fn sensitive_columns_are_not_queryable() {
        let model = resolve(&config()).unwrap();
        let users = model.entity("users").unwrap();
        assert!(users.column("password_hash").is_some());
        assert!(users.queryable_column("password_hash").is_none());
    }

    #[test]
    fn duplicate_relationship_names_rejected() {
        let mut cfg = config();
        cfg.relationships[1].name = Some("library".into());
        let err = resolve(&cfg).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateRelationship { .. }));
    }

    #[test]
    fn relationship_named_like_the_root_alias_rejected() {
        let mut cfg = config();
        cfg.relationships[0].name = Some("main".into());
        let err = resolve(&cfg).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(msg) if msg.contains("reserved")));
    }

    #[test]
    fn empty_primary_key_is_an_error_not_a_panic() {
        let mut cfg = config();
        cfg.tables[1].primary_key = PrimaryKeyConfig::Composite(vec![]);
        let err = resolve(&cfg).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPrimaryKey { table_id, .. } if table_id == "libraries"));
    }

    #[test]
    fn pg_types_normalized() {
        assert_eq!(column_pg_type_name(&ColumnTypeConfig::Simple("BIGSERIAL".into())).as_deref(), Some("bigint"));
        assert_eq!(
            column_pg_type_name(&ColumnTypeConfig::Parameterized { name: "varchar".into(), params: Some(vec![80]) }).as_deref(),
            Some("text")
        );
        assert_eq!(column_pg_type_name(&ColumnTypeConfig::Simple("timestamp without time zone".into())).as_deref(), Some("timestamp"));
        assert_eq!(column_pg_type_name(&ColumnTypeConfig::Simple("catalog.status".into())).as_deref(), Some("catalog.status"));
        assert_eq!(column_pg_type_name(&ColumnTypeConfig::Simple("tsvector".into())), None);
    }
}
