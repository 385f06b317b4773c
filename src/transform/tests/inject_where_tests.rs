use serde_json::{json, Value};

use super::{generic, shop_schema, stmt};
use crate::error::SqlError;
use crate::format::Params;
use crate::transform::criteria::{Criteria, CriteriaValue};
use crate::transform::inject_where::{inject_criteria, inject_where, InjectOptions};

const UPSTREAM: InjectOptions = InjectOptions { upstream: true };

#[test]
fn raw_predicate_parenthesises_or_rooted_operands() {
    let mut s = stmt("select a from t where x = 1 or y = 2");
    inject_where(&mut s, "z = 3").expect("inject");
    assert_eq!(generic(&s).sql, "SELECT a FROM t WHERE (x = 1 OR y = 2) AND z = 3");
}

#[test]
fn raw_predicates_accumulate_left_to_right() {
    let mut s = stmt("select a from t");
    inject_where(&mut s, "a > 1").expect("first");
    inject_where(&mut s, "b < 2 or c").expect("second");
    assert_eq!(generic(&s).sql, "SELECT a FROM t WHERE a > 1 AND (b < 2 OR c)");
}

#[test]
fn raw_predicate_reaches_every_set_operation_leaf() {
    let mut s = stmt("select a from t1 union all select a from t2");
    inject_where(&mut s, "a > 0").expect("inject");
    assert_eq!(generic(&s).sql, "SELECT a FROM t1 WHERE a > 0 UNION ALL SELECT a FROM t2 WHERE a > 0");
}

#[test]
fn malformed_raw_predicate_leaves_statement_untouched() {
    let mut s = stmt("select a from t");
    let before = s.clone();
    let err = inject_where(&mut s, "a >").unwrap_err();
    assert_eq!(err.code_str(), "syntax_error");
    assert_eq!(s, before);
}

#[test]
fn every_criteria_form_becomes_a_bound_predicate() {
    let mut s = stmt("select id, name, price, tag from products");
    let c = Criteria::from_json(&json!({
        "id": 1, "name": {"like": "a%"}, "price": {"min": 1, "max": 9}, "tag": ["x", "y"], "gone": null
    }))
    .expect("criteria");
    inject_criteria(&mut s, &c, &InjectOptions::default(), None).expect("inject");
    let out = generic(&s);
    assert_eq!(
        out.sql,
        "SELECT id, name, price, tag FROM products WHERE id = :id AND name LIKE :name_like \
         AND (price >= :price_min AND price <= :price_max) AND tag IN (:tag_in_0, :tag_in_1)"
    );
    assert_eq!(
        out.params,
        Params::Named(vec![
            ("id".into(), json!(1)),
            ("name_like".into(), json!("a%")),
            ("price_min".into(), json!(1)),
            ("price_max".into(), json!(9)),
            ("tag_in_0".into(), json!("x")),
            ("tag_in_1".into(), json!("y")),
        ])
    );
}

#[test]
fn explicit_null_equality_becomes_is_null() {
    let mut s = stmt("select id, name from users");
    let c = Criteria::new().with("name", CriteriaValue::Equals(Value::Null));
    inject_criteria(&mut s, &c, &InjectOptions::default(), None).expect("inject");
    assert_eq!(generic(&s).sql, "SELECT id, name FROM users WHERE name IS NULL");
}

#[test]
fn criteria_columns_resolve_through_the_lookup() {
    let schema = shop_schema();
    let mut s = stmt("select u.name from users u join orders o on o.user_id = u.user_id");
    let c = Criteria::new().equals("total", 10).equals("email", "a@b.c");
    inject_criteria(&mut s, &c, &InjectOptions::default(), Some(&schema)).expect("inject");
    assert_eq!(
        generic(&s).sql,
        "SELECT u.name FROM users AS u INNER JOIN orders AS o ON o.user_id = u.user_id WHERE o.total = :total AND u.email = :email"
    );
}

#[test]
fn unknown_keys_fail_without_mutation() {
    let mut s = stmt("select id from users");
    let before = s.clone();
    let c = Criteria::new().equals("id", 1).equals("nope", 2);
    let err = inject_criteria(&mut s, &c, &InjectOptions::default(), None).unwrap_err();
    match err {
        SqlError::ColumnResolution { columns, .. } => assert_eq!(columns, vec!["nope"]),
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(s, before);
}

#[test]
fn empty_in_list_is_rejected() {
    let mut s = stmt("select id from users");
    let before = s.clone();
    let c = Criteria::new().one_of("id", vec![]);
    assert!(matches!(inject_criteria(&mut s, &c, &InjectOptions::default(), None), Err(SqlError::InvalidArgument(_))));
    assert_eq!(s, before);
}

#[test]
fn all_omitted_criteria_change_nothing() {
    let mut s = stmt("select id from users where active = true");
    let before = generic(&s);
    let c = Criteria::from_json(&json!({"id": null, "name": null})).expect("criteria");
    inject_criteria(&mut s, &c, &UPSTREAM, None).expect("inject");
    assert_eq!(generic(&s), before);
}

#[test]
fn set_operation_leaves_map_columns_by_position() {
    let mut s = stmt("select id, name from a union select uid, uname from b");
    let c = Criteria::new().equals("name", "z");
    inject_criteria(&mut s, &c, &InjectOptions::default(), None).expect("inject");
    assert_eq!(generic(&s).sql, "SELECT id, name FROM a WHERE name = :name UNION SELECT uid, uname FROM b WHERE uname = :name");
}

#[test]
fn upstream_pushes_into_the_producing_cte() {
    let mut s = stmt("with active_users as (select id, name from users where active = true) select a.id, a.name from active_users a");
    let c = Criteria::new().equals("name", "Bob");
    inject_criteria(&mut s, &c, &UPSTREAM, None).expect("inject");
    assert_eq!(
        generic(&s).sql,
        "WITH active_users AS (SELECT id, name FROM users WHERE active = true AND name = :name) SELECT a.id, a.name FROM active_users AS a"
    );
}

#[test]
fn upstream_stops_at_aggregates() {
    let mut s = stmt("with totals as (select user_id, sum(amount) as total from payments group by user_id) select user_id, total from totals");
    let c = Criteria::from_json(&json!({"total": {"min": 100}, "user_id": 7})).expect("criteria");
    inject_criteria(&mut s, &c, &UPSTREAM, None).expect("inject");
    assert_eq!(
        generic(&s).sql,
        "WITH totals AS (SELECT user_id, sum(amount) AS total FROM payments WHERE user_id = :user_id GROUP BY user_id \
         HAVING sum(amount) >= :total_min) SELECT user_id, total FROM totals"
    );
}

#[test]
fn upstream_descends_through_set_operation_branches() {
    let mut s = stmt("with people as (select id, name from staff union all select pid, pname from guests) select id, name from people");
    let c = Criteria::new().equals("name", "x");
    inject_criteria(&mut s, &c, &UPSTREAM, None).expect("inject");
    assert_eq!(
        generic(&s).sql,
        "WITH people AS (SELECT id, name FROM staff WHERE name = :name UNION ALL SELECT pid, pname FROM guests WHERE pname = :name) \
         SELECT id, name FROM people"
    );
}

#[test]
fn upstream_does_not_filter_below_a_limit() {
    let mut s = stmt("select id from (select id from t limit 5) s");
    let c = Criteria::new().equals("id", 1);
    inject_criteria(&mut s, &c, &UPSTREAM, None).expect("inject");
    assert_eq!(generic(&s).sql, "SELECT id FROM (SELECT id FROM t LIMIT 5) AS s WHERE id = :id");
}

#[test]
fn upstream_through_a_subquery_uses_the_inner_expression() {
    let mut s = stmt("select s.label from (select lower(name) as label from users) s");
    let c = Criteria::new().like("label", "a%");
    inject_criteria(&mut s, &c, &UPSTREAM, None).expect("inject");
    assert_eq!(generic(&s).sql, "SELECT s.label FROM (SELECT lower(name) AS label FROM users WHERE lower(name) LIKE :label_like) AS s");
}

#[test]
fn window_outputs_cannot_be_filtered_in_their_own_select() {
    let original = stmt("select id, row_number() over (order by id) as rn from t");
    let c = Criteria::new().equals("rn", 1);
    for options in [InjectOptions::default(), UPSTREAM] {
        let mut s = original.clone();
        match inject_criteria(&mut s, &c, &options, None) {
            Err(SqlError::ColumnResolution { columns, scope }) => {
                assert_eq!(columns, vec!["rn"]);
                assert!(scope.contains("window"), "{}", scope);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(s, original);
    }
}

#[test]
fn upstream_keeps_window_filters_above_the_producing_subquery() {
    let mut s = stmt("select rn from (select id, row_number() over (order by id) as rn from t) s");
    let c = Criteria::new().equals("rn", 1);
    inject_criteria(&mut s, &c, &UPSTREAM, None).expect("inject");
    assert_eq!(
        generic(&s).sql,
        "SELECT rn FROM (SELECT id, row_number() OVER (ORDER BY id) AS rn FROM t) AS s WHERE rn = :rn"
    );
}
