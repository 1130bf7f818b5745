//! Which tables a set of criteria needs joined.

use crate::error::QueryError;
use crate::query::{split_property, FilterSpec, JoinTarget, QueryContext, SortSpec};

/// Join targets referenced by dotted properties, filters first then sorts, in
/// first-seen order and without duplicates (by relationship).
pub fn resolve_joins(
    ctx: &QueryContext<'_>,
    filters: &[FilterSpec],
    sorts: &[SortSpec],
) -> Result<Vec<JoinTarget>, QueryError> {
    let properties = filters
        .iter()
        .map(|f| f.property.as_str())
        .chain(sorts.iter().map(|s| s.property.as_str()));

    let mut joins: Vec<JoinTarget> = Vec::new();
    for property in properties {
        let (Some(rel_name), _) = split_property(property) else {
            continue;
        };
        let rel = ctx.relationship(rel_name)?;
        if !joins.iter().any(|j| j.alias == rel.target.alias) {
            joins.push(rel.target.clone());
        }
    }
    Ok(joins)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::test_support::library_model;

    fn tables(joins: &[JoinTarget]) -> Vec<&str> {
        joins.iter().map(|j| j.table_id.as_str()).collect()
    }

    #[test]
    fn no_dotted_properties_no_joins() {
        let model = library_model();
        let ctx = QueryContext::uncached(&model, "authors").unwrap();
        let joins = resolve_joins(&ctx, &[FilterSpec::new("name", "like", "x")], &[SortSpec::new("id", "desc")]).unwrap();
        assert!(joins.is_empty());
    }

    #[test]
    fn filters_before_sorts_first_seen_wins() {
        let model = library_model();
        let ctx = QueryContext::uncached(&model, "books").unwrap();
        let filters = [
            FilterSpec::new("tags.tag_id", "==", 3),
            FilterSpec::new("author.name", "like", "a"),
            FilterSpec::new("tags.book_id", "==", 1),
        ];
        let sorts = [SortSpec::new("author.name", "asc"), SortSpec::new("title", "asc")];
        let joins = resolve_joins(&ctx, &filters, &sorts).unwrap();
        assert_eq!(tables(&joins), ["book_tags", "authors"]);

        let joins = resolve_joins(&ctx, &filters[1..2], &[SortSpec::new("tags.tag_id", "asc")]).unwrap();
        assert_eq!(tables(&joins), ["authors", "book_tags"]);
    }

    #[test]
    fn relationships_sharing_a_table_are_joined_separately() {
        let model = library_model();
        let ctx = QueryContext::uncached(&model, "books").unwrap();
        let filters = [FilterSpec::new("author.name", "==", "Ann"), FilterSpec::new("editor.name", "==", "Bob")];
        let joins = resolve_joins(&ctx, &filters, &[SortSpec::new("author.name", "asc")]).unwrap();
        let aliases: Vec<&str> = joins.iter().map(|j| j.alias.as_str()).collect();
        assert_eq!(aliases, ["author", "editor"]);
        assert_eq!(tables(&joins), ["authors", "authors"]);
        assert_eq!(joins[1].our_key_column, "editor_id");
    }

    #[test]
    fn unknown_relationship_fails() {
        let model = library_model();
        let ctx = QueryContext::uncached(&model, "authors").unwrap();
        let err = resolve_joins(&ctx, &[], &[SortSpec::new("publisher.name", "asc")]).unwrap_err();
        assert!(matches!(err, QueryError::UnknownRelationship { relationship, .. } if relationship == "publisher"));
    }

    #[test]
    fn multi_dot_uses_first_segment_only() {
        let model = library_model();
        let ctx = QueryContext::uncached(&model, "books").unwrap();
        let joins = resolve_joins(&ctx, &[FilterSpec::new("author.country.name", "==", "Brazil")], &[]).unwrap();
        assert_eq!(tables(&joins), ["authors"]);
    }
}
