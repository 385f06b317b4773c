use serde_json::json;

use super::{shop_schema, stmt};
use crate::format::Dialect;
use crate::transform::bind_params::set_parameter;
use crate::transform::collect_ctes::collect_ctes;
use crate::transform::collect_params::{collect_params, ParameterCollector};
use crate::transform::collect_tables::collect_tables;
use crate::transform::collect_values::{collect_values, SelectValue, SelectValueCollector, UNNAMED_COLUMN};

fn pairs(values: &[SelectValue]) -> Vec<(&str, &str)> {
    values.iter().map(|v| (v.name.as_str(), v.value.as_str())).collect()
}

#[test]
fn projection_values_with_names() {
    let s = stmt("select u.id, u.name as label, count(*), lower(u.email) from users u group by u.id, u.name, u.email");
    let values = collect_values(&s, None).expect("values");
    assert_eq!(
        pairs(&values),
        vec![("id", "u.id"), ("label", "u.name"), ("count", "count(*)"), ("lower", "lower(u.email)")]
    );
}

#[test]
fn unnamed_projection_items() {
    let s = stmt("select 1 + 2, 'x'");
    let values = collect_values(&s, None).expect("values");
    assert_eq!(pairs(&values), vec![(UNNAMED_COLUMN, "1 + 2"), (UNNAMED_COLUMN, "'x'")]);
}

#[test]
fn wildcards_expand_only_when_columns_are_known() {
    let s = stmt("select * from users");
    assert_eq!(pairs(&collect_values(&s, None).expect("values")), vec![("*", "*")]);

    let schema = shop_schema();
    let values = collect_values(&s, Some(&schema)).expect("values");
    assert_eq!(
        pairs(&values),
        vec![("user_id", "user_id"), ("tenant_id", "tenant_id"), ("name", "name"), ("email", "email")]
    );

    let unknown = stmt("select * from ledger");
    assert_eq!(pairs(&collect_values(&unknown, Some(&schema)).expect("values")), vec![("*", "*")]);
}

#[test]
fn qualified_wildcards_expand_one_source() {
    let schema = shop_schema();
    let s = stmt("select o.*, u.name from users u join orders o on o.user_id = u.user_id");
    let values = SelectValueCollector::new(Some(&schema))
        .with_dialect(Dialect::Postgres.config())
        .collect(&s)
        .expect("values");
    assert_eq!(
        pairs(&values),
        vec![
            ("order_id", "\"o\".\"order_id\""),
            ("user_id", "\"o\".\"user_id\""),
            ("tenant_id", "\"o\".\"tenant_id\""),
            ("total", "\"o\".\"total\""),
            ("name", "\"u\".\"name\""),
        ]
    );
}

#[test]
fn tables_in_first_seen_order() {
    let s = stmt(
        "select o.id from orders o join public.users u on u.id = o.user_id \
         where exists (select 1 from audit a where a.id = o.id)",
    );
    let names: Vec<String> = collect_tables(&s).iter().map(|t| t.qualified_name()).collect();
    assert_eq!(names, vec!["orders", "public.users", "audit"]);
}

#[test]
fn cte_references_are_not_tables() {
    let s = stmt("with recent as (select id from orders) select r.id from recent r join ORDERS o on o.id = r.id");
    let tables = collect_tables(&s);
    assert_eq!(tables.len(), 1);
    assert!(tables[0].qualified_name().eq_ignore_ascii_case("orders"));
}

#[test]
fn ctes_in_definition_order() {
    let s = stmt(
        "with a as (with inner_cte as (select 1 as x) select x from inner_cte), b as (select 2 as y) \
         select * from (with c as (select 3 as z) select z from c) s",
    );
    let names: Vec<&str> = collect_ctes(&s).iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["a", "inner_cte", "b", "c"]);
}

#[test]
fn params_in_text_order_with_occurrences() {
    let mut s = stmt("with x as (select :first as v) select v from x where v = :second and w = ? or v = :first limit :lim");
    set_parameter(&mut s, "second", json!("two")).expect("bind");

    let collector = ParameterCollector::new().collect(&s);
    assert_eq!(collector.anonymous(), 1);
    let params = collector.params();
    let names: Vec<&str> = params.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["first", "second", "lim"]);
    assert_eq!(params[0].occurrences, 2);
    assert_eq!(params[0].value, None);
    assert_eq!(params[1].value, Some(json!("two")));

    assert_eq!(collect_params(&s).len(), 3);
}

#[test]
fn cte_bodies_only_see_earlier_ctes() {
    let names = |sql: &str| -> Vec<String> { collect_tables(&stmt(sql)).iter().map(|t| t.qualified_name()).collect() };

    assert_eq!(names("with a as (select * from a) select * from a"), vec!["a"]);
    assert_eq!(names("with a as (select * from b), b as (select * from a) select * from b"), vec!["b"]);
    assert!(names("with recursive r as (select 1 as n union all select n + 1 from r where n < 5) select n from r").is_empty());
}
