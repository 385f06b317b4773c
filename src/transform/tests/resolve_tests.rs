use super::{shop_schema, stmt};
use crate::error::SqlError;
use crate::query::query_common::*;
use crate::schema::TableSchemaLookup;
use crate::transform::collect_columns::{resolve_scope, CteEnv, SelectableColumnCollector};

fn names(cols: &[crate::transform::SelectableColumn]) -> Vec<&str> {
    cols.iter().map(|c| c.name.as_str()).collect()
}

#[test]
fn projection_first_then_source_columns_qualified_across_joins() {
    let schema = shop_schema();
    let s = stmt(
        "select u.user_id, u.name as username, count(o.order_id) as orders \
         from users u join orders o on o.user_id = u.user_id group by u.user_id, u.name",
    );
    let cols = resolve_scope(&s, Some(&schema)).expect("resolve");
    assert_eq!(names(&cols), vec!["user_id", "username", "orders", "tenant_id", "name", "email", "order_id", "total"]);
    assert_eq!(cols[0].expr, Expr::qualified("u", "user_id"));
    assert_eq!(cols[3].expr, Expr::qualified("u", "tenant_id"));
    assert_eq!(cols[6].expr, Expr::qualified("o", "order_id"));
    assert!(cols[2].is_aggregate());
    assert!(!cols[1].is_aggregate());
}

#[test]
fn single_source_columns_stay_unqualified() {
    let schema = shop_schema();
    let s = stmt("select name from users");
    let cols = resolve_scope(&s, Some(&schema)).expect("resolve");
    assert_eq!(names(&cols), vec!["name", "user_id", "tenant_id", "email"]);
    assert_eq!(cols[1].expr, Expr::column("user_id"));
}

#[test]
fn without_lookup_columns_are_inferred_from_query_text() {
    let s = stmt("select u.name from users u join orders o on o.user_id = u.user_id where o.total > 10");
    let collector = SelectableColumnCollector::new(None);
    let q = s.as_select().expect("select");
    let sources = collector.source_columns(q, &CteEnv::root(&s)).expect("sources");
    assert_eq!(sources.len(), 2);
    assert_eq!(sources[0].source, "u");
    assert_eq!(sources[0].columns, vec!["name", "user_id"]);
    assert!(sources[0].inferred);
    assert_eq!(sources[1].columns, vec!["user_id", "total"]);
}

#[test]
fn unexpandable_wildcard_is_a_resolution_error() {
    let s = stmt("select * from users");
    let err = SelectableColumnCollector::new(None).require(&s, &["user_id".to_string()]).unwrap_err();
    match err {
        SqlError::ColumnResolution { columns, scope } => {
            assert_eq!(columns, vec!["user_id"]);
            assert_eq!(scope, "select from users");
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn every_missing_column_is_reported() {
    let s = stmt("select id from t");
    let err = SelectableColumnCollector::new(None)
        .require(&s, &["id".to_string(), "a".to_string(), "b".to_string()])
        .unwrap_err();
    assert_eq!(err.columns(), vec!["a".to_string(), "b".to_string()]);
}

#[test]
fn cte_and_subquery_sources_expose_their_outputs() {
    let s = stmt("with recent as (select order_id, total from orders where total > 10) select r.order_id from recent r");
    let cols = resolve_scope(&s, None).expect("resolve");
    assert_eq!(names(&cols), vec!["order_id", "total"]);
    assert_eq!(cols[1].expr, Expr::column("total"));

    let schema = shop_schema();
    let s = stmt("select * from (select * from items) s");
    let cols = resolve_scope(&s, Some(&schema)).expect("resolve");
    assert_eq!(names(&cols), vec!["item_id", "order_id", "sku"]);
}

#[test]
fn cte_column_lists_rename_outputs() {
    let s = stmt("with t(a, b) as (select x, y from src) select * from t");
    let cols = resolve_scope(&s, None).expect("resolve");
    assert_eq!(names(&cols), vec!["a", "b"]);
}

#[test]
fn set_operation_scope_is_the_leftmost_select() {
    let s = stmt("select a, b from t1 union select c, d from t2");
    let cols = resolve_scope(&s, None).expect("resolve");
    assert_eq!(names(&cols), vec!["a", "b"]);
    let out = SelectableColumnCollector::new(None).output_columns(&s, &CteEnv::default()).expect("output");
    assert_eq!(out.names, vec!["a", "b"]);
    assert!(out.complete);
}

#[test]
fn closures_work_as_lookups_and_failures_surface() {
    let lookup = |table: &str| -> Option<Vec<String>> {
        (table == "users").then(|| vec!["user_id".to_string(), "name".to_string()])
    };
    let s = stmt("select * from users");
    let cols = resolve_scope(&s, Some(&lookup)).expect("resolve");
    assert_eq!(names(&cols), vec!["user_id", "name"]);

    struct Broken;
    impl TableSchemaLookup for Broken {
        fn columns(&self, _table: &str) -> anyhow::Result<Option<Vec<String>>> {
            Err(anyhow::anyhow!("catalog offline"))
        }
    }
    let err = resolve_scope(&s, Some(&Broken)).unwrap_err();
    assert_eq!(err.code_str(), "lookup_error");
    assert!(err.to_string().contains("catalog offline"));
}
