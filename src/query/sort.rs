//! Sort criteria to ordering expressions.

use crate::error::QueryError;
use crate::query::{ColumnRef, Direction, OrderExpr, QueryContext, SortSpec};

/// Compile `sorts` in order. No criteria means ascending primary key.
pub fn compile_sort(ctx: &QueryContext<'_>, sorts: &[SortSpec]) -> Result<Vec<OrderExpr>, QueryError> {
    if sorts.is_empty() {
        let column = ctx.default_column();
        let pg_type = ctx.entity.column(column).and_then(|c| c.pg_type.clone());
        return Ok(vec![OrderExpr {
            column: ColumnRef::root(column).with_pg_type(pg_type),
            direction: Direction::Asc,
        }]);
    }
    sorts
        .iter()
        .map(|spec| {
            Ok(OrderExpr {
                column: ctx.resolve_property(&spec.property)?,
                direction: spec.direction()?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::test_support::library_model;
    use crate::query::TableRef;

    #[test]
    fn default_is_id_ascending() {
        let model = library_model();
        let ctx = QueryContext::uncached(&model, "authors").unwrap();
        let order = compile_sort(&ctx, &[]).unwrap();
        assert_eq!(order.len(), 1);
        assert_eq!(order[0].column.column, "id");
        assert_eq!(order[0].column.table, TableRef::Root);
        assert_eq!(order[0].direction, Direction::Asc);
    }

    #[test]
    fn keeps_input_order() {
        let model = library_model();
        let ctx = QueryContext::uncached(&model, "books").unwrap();
        let order = compile_sort(
            &ctx,
            &[SortSpec::new("author.name", "ASC"), SortSpec::new("published_at", "desc")],
        )
        .unwrap();
        let rendered: Vec<String> = order.iter().map(ToString::to_string).collect();
        assert_eq!(rendered, ["author.name ASC", "published_at DESC"]);
    }

    #[test]
    fn junction_namespace_for_many_to_many() {
        let model = library_model();
        let ctx = QueryContext::uncached(&model, "books").unwrap();
        let order = compile_sort(&ctx, &[SortSpec::new("tags.tag_id", "asc")]).unwrap();
        assert_eq!(order[0].column.table, TableRef::Joined("tags".into()));
        // the tag entity's own columns are not reachable through the junction
        let err = compile_sort(&ctx, &[SortSpec::new("tags.label", "asc")]).unwrap_err();
        assert!(matches!(err, QueryError::UnknownProperty { model, .. } if model == "book_tags"));
    }

    #[test]
    fn unknown_relationship_never_falls_back() {
        let model = library_model();
        let ctx = QueryContext::uncached(&model, "authors").unwrap();
        let err = compile_sort(&ctx, &[SortSpec::new("nosuchrel.x", "asc")]).unwrap_err();
        assert!(matches!(err, QueryError::UnknownRelationship { .. }));
    }

    #[test]
    fn bad_direction_rejected() {
        let model = library_model();
        let ctx = QueryContext::uncached(&model, "authors").unwrap();
        let err = compile_sort(&ctx, &[SortSpec::new("name", "sideways")]).unwrap_err();
        assert_eq!(err, QueryError::InvalidDirection("sideways".into()));
    }
}
