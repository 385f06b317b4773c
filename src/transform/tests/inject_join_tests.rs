use super::{generic, postgres, shop_schema, stmt};
use crate::error::SqlError;
use crate::query::query_common::JoinType;
use crate::schema::StaticSchema;
use crate::transform::collect_columns::resolve_scope;
use crate::transform::inject_join::inject_join;

#[test]
fn join_on_the_source_exposing_the_column() {
    let mut s = stmt("select u.user_id, u.name from users u");
    inject_join(&mut s, "orders", "o", &["user_id"], JoinType::Left, None).expect("join");
    assert_eq!(
        postgres(&s).sql,
        "select \"u\".\"user_id\", \"u\".\"name\" from \"users\" as \"u\" left join \"orders\" as \"o\" on \"u\".\"user_id\" = \"o\".\"user_id\""
    );
}

#[test]
fn wildcard_only_projection_without_lookup_cannot_join() {
    let mut s = stmt("select u.* from users u");
    let before = s.clone();
    let err = inject_join(&mut s, "orders", "o", &["user_id"], JoinType::Left, None).unwrap_err();
    match err {
        SqlError::JoinResolution { table, columns, .. } => {
            assert_eq!(table, "orders");
            assert_eq!(columns, vec!["user_id"]);
        }
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(s, before);
}

#[test]
fn lookup_expands_wildcards_for_joins() {
    let schema = shop_schema();
    let mut s = stmt("select u.* from users u");
    inject_join(&mut s, "orders", "o", &["tenant_id", "user_id"], JoinType::Inner, Some(&schema)).expect("join");
    assert_eq!(
        generic(&s).sql,
        "SELECT u.* FROM users AS u INNER JOIN orders AS o ON u.tenant_id = o.tenant_id AND u.user_id = o.user_id"
    );
}

#[test]
fn joined_table_must_have_the_join_columns_when_known() {
    let schema = StaticSchema::new().with_table("users", &["user_id"]).with_table("orders", &["order_id"]);
    let mut s = stmt("select u.user_id from users u");
    let err = inject_join(&mut s, "orders", "o", &["user_id"], JoinType::Left, Some(&schema)).unwrap_err();
    assert_eq!(err.code_str(), "join_resolution");
    assert_eq!(err.columns(), vec!["user_id".to_string()]);
}

#[test]
fn ambiguous_sources_are_rejected() {
    let mut s = stmt("select a.id, b.id from a, b");
    let err = inject_join(&mut s, "c", "c", &["id"], JoinType::Inner, None).unwrap_err();
    match err {
        SqlError::JoinResolution { reason, columns, .. } => {
            assert!(reason.contains("ambiguous"), "{}", reason);
            assert_eq!(columns, vec!["id"]);
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn columns_spread_across_sources_are_all_reported() {
    let mut s = stmt("select a.x, b.y from a join b on a.k = b.k");
    let err = inject_join(&mut s, "c", "c", &["x", "y"], JoinType::Inner, None).unwrap_err();
    assert_eq!(err.columns(), vec!["x".to_string(), "y".to_string()]);
}

#[test]
fn alias_collisions_are_rejected() {
    let mut s = stmt("select u.user_id from users u");
    let err = inject_join(&mut s, "accounts", "u", &["user_id"], JoinType::Left, None).unwrap_err();
    assert!(matches!(err, SqlError::JoinResolution { .. }));
}

#[test]
fn alias_equal_to_the_table_name_is_dropped() {
    let mut s = stmt("select u.user_id from users u");
    inject_join(&mut s, "sales.orders", "", &["user_id"], JoinType::Right, None).expect("join");
    assert_eq!(generic(&s).sql, "SELECT u.user_id FROM users AS u RIGHT JOIN sales.orders ON u.user_id = orders.user_id");
}

#[test]
fn invalid_join_requests() {
    let mut s = stmt("select u.user_id from users u");
    assert!(matches!(inject_join(&mut s, "o", "o", &[], JoinType::Left, None), Err(SqlError::InvalidArgument(_))));
    assert!(matches!(inject_join(&mut s, "o", "o", &["user_id"], JoinType::Cross, None), Err(SqlError::InvalidArgument(_))));
    let mut set = stmt("select id from a union select id from b");
    assert!(matches!(inject_join(&mut set, "o", "o", &["id"], JoinType::Left, None), Err(SqlError::InvalidArgument(_))));
    let mut bare = stmt("select 1");
    assert!(matches!(inject_join(&mut bare, "o", "o", &["id"], JoinType::Left, None), Err(SqlError::JoinResolution { .. })));
}

#[test]
fn selectable_columns_grow_after_a_join() {
    let schema = shop_schema();
    let mut s = stmt("select u.name from users u");
    let before = resolve_scope(&s, Some(&schema)).expect("before");
    inject_join(&mut s, "orders", "o", &["user_id"], JoinType::Left, Some(&schema)).expect("join");
    let after = resolve_scope(&s, Some(&schema)).expect("after");
    for col in &before {
        assert!(after.iter().any(|c| c.name == col.name), "{} lost after join", col.name);
    }
    assert!(after.iter().any(|c| c.name == "total"));
}
