//! Relationship descriptors per model and the context the compilers resolve
//! dotted properties through.

use crate::config::{Cardinality, ColumnInfo, ResolvedEntity, ResolvedModel};
use crate::error::QueryError;
use crate::query::{ColumnRef, TableRef};
use indexmap::IndexMap;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TargetKind {
    /// The related entity itself.
    Model,
    /// The junction table of a many-to-many relationship.
    Junction,
}

/// A table that has to be joined to resolve a relationship-qualified property.
/// Joined under the relationship name, so two relationships to the same table
/// get separate joins.
#[derive(Clone, Debug, PartialEq)]
pub struct JoinTarget {
    pub alias: String,
    pub table_id: String,
    pub schema_name: String,
    pub table_name: String,
    pub kind: TargetKind,
    /// Root column in the ON clause.
    pub our_key_column: String,
    /// Target column in the ON clause.
    pub their_key_column: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RelationshipDescriptor {
    pub name: String,
    pub target: JoinTarget,
    pub cardinality: Cardinality,
}

/// Relationship name -> descriptor, in declaration order.
pub type RelationshipMap = IndexMap<String, RelationshipDescriptor>;

/// Describe the relationships of `table_id`. Fails with `Schema` when the
/// table is not part of the model or a relationship points outside it.
pub fn describe_relationships(model: &ResolvedModel, table_id: &str) -> Result<RelationshipMap, QueryError> {
    let entity = model
        .entity(table_id)
        .ok_or_else(|| QueryError::Schema(table_id.to_string()))?;
    let mut out = RelationshipMap::with_capacity(entity.relationships.len());
    for rel in &entity.relationships {
        let target = model
            .entity(&rel.target_table_id)
            .ok_or_else(|| QueryError::Schema(rel.target_table_id.clone()))?;
        let descriptor = RelationshipDescriptor {
            name: rel.name.clone(),
            target: JoinTarget {
                alias: rel.name.clone(),
                table_id: target.table_id.clone(),
                schema_name: target.schema_name.clone(),
                table_name: target.table_name.clone(),
                kind: if rel.via_junction { TargetKind::Junction } else { TargetKind::Model },
                our_key_column: rel.our_key_column.clone(),
                their_key_column: rel.their_key_column.clone(),
            },
            cardinality: rel.cardinality,
        };
        out.entry(rel.name.clone()).or_insert(descriptor);
    }
    Ok(out)
}

/// Memoized [`describe_relationships`] per table id. Descriptors are computed
/// outside the lock and published with insert-if-absent, so concurrent first
/// requests may compute twice but all observe the same published map.
#[derive(Default)]
pub struct RelationshipCache {
    by_table: RwLock<HashMap<String, Arc<RelationshipMap>>>,
}

impl RelationshipCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn describe(&self, model: &ResolvedModel, table_id: &str) -> Result<Arc<RelationshipMap>, QueryError> {
        if let Some(hit) = self
            .by_table
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(table_id)
        {
            return Ok(Arc::clone(hit));
        }
        let computed = Arc::new(describe_relationships(model, table_id)?);
        let mut by_table = self.by_table.write().unwrap_or_else(|e| e.into_inner());
        let published = by_table.entry(table_id.to_string()).or_insert(computed);
        Ok(Arc::clone(published))
    }

    pub fn len(&self) -> usize {
        self.by_table.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Everything the compilers need about the entity being queried.
pub struct QueryContext<'a> {
    pub model: &'a ResolvedModel,
    pub entity: &'a ResolvedEntity,
    pub relationships: Arc<RelationshipMap>,
}

impl<'a> QueryContext<'a> {
    pub fn new(model: &'a ResolvedModel, cache: &RelationshipCache, table_id: &str) -> Result<Self, QueryError> {
        let entity = model
            .entity(table_id)
            .ok_or_else(|| QueryError::Schema(table_id.to_string()))?;
        let relationships = cache.describe(model, table_id)?;
        Ok(QueryContext {
            model,
            entity,
            relationships,
        })
    }

    /// Uncached variant, for one-off compilation.
    pub fn uncached(model: &'a ResolvedModel, table_id: &str) -> Result<Self, QueryError> {
        Self::new(model, &RelationshipCache::new(), table_id)
    }

    pub fn relationship(&self, name: &str) -> Result<&RelationshipDescriptor, QueryError> {
        self.relationships
            .get(name)
            .ok_or_else(|| QueryError::UnknownRelationship {
                model: self.entity.display_name().to_string(),
                relationship: name.to_string(),
            })
    }

    /// Resolve `field` or `relationship.field` to a column. Only one hop:
    /// everything after the first dot is the leaf name.
    pub fn resolve_property(&self, property: &str) -> Result<ColumnRef, QueryError> {
        let (owner, table, leaf) = match split_property(property) {
            (None, leaf) => (self.entity, TableRef::Root, leaf),
            (Some(rel_name), leaf) => {
                let rel = self.relationship(rel_name)?;
                let target = self
                    .model
                    .entity(&rel.target.table_id)
                    .ok_or_else(|| QueryError::Schema(rel.target.table_id.clone()))?;
                (target, TableRef::Joined(rel.target.alias.clone()), leaf)
            }
        };
        let column: &ColumnInfo = owner
            .queryable_column(leaf)
            .ok_or_else(|| QueryError::UnknownProperty {
                model: owner.display_name().to_string(),
                property: leaf.to_string(),
            })?;
        Ok(ColumnRef {
            table,
            column: column.name.clone(),
            pg_type: column.pg_type.clone(),
        })
    }

    /// Column behind the implicit default criteria.
    pub fn default_column(&self) -> &str {
        self.entity
            .pk_columns
            .first()
            .map(String::as_str)
            .unwrap_or("id")
    }
}

/// Split on the first dot: `(Some(relationship), leaf)` or `(None, property)`.
pub fn split_property(property: &str) -> (Option<&str>, &str) {
    match property.split_once('.') {
        Some((rel, leaf)) => (Some(rel), leaf),
        None => (None, property),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::test_support::library_model;

    #[test]
    fn describes_in_declaration_order() {
        let model = library_model();
        let books = describe_relationships(&model, "books").unwrap();
        let names: Vec<&str> = books.keys().map(String::as_str).collect();
        assert_eq!(names, ["author", "tags", "editor"]);
        assert_eq!(books["author"].cardinality, Cardinality::One);
        assert_eq!(books["author"].target.kind, TargetKind::Model);
        assert_eq!(books["tags"].target.kind, TargetKind::Junction);
        assert_eq!(books["tags"].target.table_id, "book_tags");
    }

    #[test]
    fn unknown_model_is_a_schema_error() {
        let model = library_model();
        assert_eq!(
            describe_relationships(&model, "ghosts"),
            Err(QueryError::Schema("ghosts".into()))
        );
        assert!(QueryContext::uncached(&model, "ghosts").is_err());
    }

    #[test]
    fn cache_publishes_once() {
        let model = library_model();
        let cache = RelationshipCache::new();
        let first = cache.describe(&model, "authors").unwrap();
        let second = cache.describe(&model, "authors").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn cache_is_shared_across_threads() {
        let model = Arc::new(library_model());
        let cache = Arc::new(RelationshipCache::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let model = Arc::clone(&model);
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || cache.describe(&model, "books").unwrap())
            })
            .collect();
        let maps: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(maps.iter().all(|m| Arc::ptr_eq(m, &maps[0])));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn resolves_own_and_related_properties() {
        let model = library_model();
        let ctx = QueryContext::uncached(&model, "authors").unwrap();
        let own = ctx.resolve_property("name").unwrap();
        assert_eq!(own.table, TableRef::Root);
        assert_eq!(own.pg_type.as_deref(), Some("text"));
        let related = ctx.resolve_property("country.name").unwrap();
        assert_eq!(related, ColumnRef::joined("country", "name").with_pg_type(Some("text".into())));
    }

    #[test]
    fn unresolvable_properties() {
        let model = library_model();
        let ctx = QueryContext::uncached(&model, "authors").unwrap();
        assert_eq!(
            ctx.resolve_property("nosuchrel.x"),
            Err(QueryError::UnknownRelationship {
                model: "authors".into(),
                relationship: "nosuchrel".into()
            })
        );
        assert_eq!(
            ctx.resolve_property("nickname"),
            Err(QueryError::UnknownProperty {
                model: "authors".into(),
                property: "nickname".into()
            })
        );
        // one hop only: "name.x" is not a column of countries
        assert_eq!(
            ctx.resolve_property("country.name.x"),
            Err(QueryError::UnknownProperty {
                model: "countries".into(),
                property: "name.x".into()
            })
        );
    }

    #[test]
    fn sensitive_columns_are_unknown() {
        let model = library_model();
        let ctx = QueryContext::uncached(&model, "users").unwrap();
        assert!(matches!(
            ctx.resolve_property("password_hash"),
            Err(QueryError::UnknownProperty { .. })
        ));
    }

    #[test]
    fn split_on_first_dot() {
        assert_eq!(split_property("name"), (None, "name"));
        assert_eq!(split_property("a.b.c"), (Some("a"), "b.c"));
    }
}
