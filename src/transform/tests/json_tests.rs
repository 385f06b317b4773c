use super::{generic, postgres, shop_schema, stmt};
use crate::error::SqlError;
use crate::format::{format, Dialect};
use crate::query::parse;
use crate::query::query_common::Expr;
use crate::transform::json_builder::build_json;
use crate::transform::json_mapping::{ColumnMap, JsonEntity, JsonMapping, NestedEntity, RelationshipType, ResultFormat};

fn entity(id: &str, columns: ColumnMap) -> JsonEntity {
    JsonEntity { id: id.to_string(), name: id.to_string(), columns }
}

fn nested(id: &str, parent: &str, property: &str, rel: RelationshipType, columns: ColumnMap) -> NestedEntity {
    NestedEntity {
        id: id.to_string(),
        name: id.to_string(),
        parent_id: parent.to_string(),
        property_name: property.to_string(),
        relationship_type: rel,
        columns,
    }
}

fn users_with_orders() -> JsonMapping {
    JsonMapping::new("user", entity("user", ColumnMap::new().with("id", "user_id").with("name", "user_name"))).nest(nested(
        "order",
        "user",
        "orders",
        RelationshipType::Array,
        ColumnMap::new().with("id", "order_id").with("total", "order_total"),
    ))
}

const ORIGIN: &str = "select u.id as user_id, u.name as user_name, o.id as order_id, o.total as order_total \
                      from users u left join orders o on o.user_id = u.id";

#[test]
fn users_with_order_arrays() {
    let built = build_json(stmt(ORIGIN), &users_with_orders(), None).expect("build");
    let out = postgres(&built);
    assert_eq!(
        out.sql,
        "with \"origin_query\" as (select \"u\".\"id\" as \"user_id\", \"u\".\"name\" as \"user_name\", \
         \"o\".\"id\" as \"order_id\", \"o\".\"total\" as \"order_total\" from \"users\" as \"u\" \
         left join \"orders\" as \"o\" on \"o\".\"user_id\" = \"u\".\"id\"), \
         \"cte_object_depth_1\" as (select *, case when \"order_id\" is null and \"order_total\" is null then null \
         else jsonb_build_object('id', \"order_id\", 'total', \"order_total\") end as \"order_json\" from \"origin_query\"), \
         \"cte_array_order\" as (select \"user_id\", \"user_name\", coalesce(jsonb_agg(\"order_json\") \
         filter (where \"order_json\" is not null), '[]'::jsonb) as \"order_array\" from \"cte_object_depth_1\" \
         group by \"user_id\", \"user_name\"), \
         \"cte_root_user\" as (select jsonb_build_object('id', \"user_id\", 'name', \"user_name\", 'orders', \"order_array\") \
         as \"user\" from \"cte_array_order\") \
         select coalesce(jsonb_agg(\"user\"), '[]'::jsonb) as \"user_array\" from \"cte_root_user\""
    );
    assert!(out.params.is_empty());

    let reparsed = parse(&out.sql).expect("reparse");
    assert_eq!(format(&reparsed, &Dialect::Postgres.config()).expect("format").sql, out.sql);
}

#[test]
fn reserved_root_names_are_quoted_in_the_generic_preset() {
    let mapping = JsonMapping::new("user", entity("user", ColumnMap::new().with("id", "user_id")));
    let built = build_json(stmt("select id as user_id from users"), &mapping, None).expect("build");
    let out = generic(&built);
    assert_eq!(
        out.sql,
        "WITH origin_query AS (SELECT id AS user_id FROM users), \
         cte_root_user AS (SELECT jsonb_build_object('id', user_id) AS \"user\" FROM origin_query) \
         SELECT coalesce(jsonb_agg(\"user\"), '[]'::jsonb) AS user_array FROM cte_root_user"
    );
    let reparsed = parse(&out.sql).expect("reparse");
    assert_eq!(generic(&reparsed).sql, out.sql);
}

#[test]
fn deeper_levels_are_staged_first() {
    let mapping = JsonMapping::new("user", entity("user", ColumnMap::new().with("id", "user_id")))
        .nest(nested("profile", "user", "profile", RelationshipType::Object, ColumnMap::new().with("bio", "profile_bio")))
        .nest(nested("order", "user", "orders", RelationshipType::Array, ColumnMap::new().with("id", "order_id")))
        .nest(nested("item", "order", "items", RelationshipType::Array, ColumnMap::new().with("sku", "item_sku")));
    let origin = stmt("select user_id, profile_bio, order_id, item_sku from flat_users");
    let built = build_json(origin, &mapping, None).expect("build");

    let names: Vec<&str> = built.ctes().iter().map(|c| c.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["origin_query", "cte_object_depth_2", "cte_array_item", "cte_object_depth_1", "cte_array_order", "cte_root_user"]
    );
    let order_stage = built.ctes()[4].statement.as_select().expect("select");
    assert_eq!(
        order_stage.group_by,
        vec![Expr::column("user_id"), Expr::column("profile_bio"), Expr::column("profile_json")]
    );
    let root = postgres(&built.ctes()[5].statement).sql;
    assert_eq!(
        root,
        "select jsonb_build_object('id', \"user_id\", 'profile', \"profile_json\", 'orders', \"order_array\") as \"user\" from \"cte_array_order\""
    );
}

#[test]
fn existing_ctes_are_hoisted_before_the_origin() {
    let origin = stmt("with recent as (select user_id, order_id, total from orders) select user_id, order_id, total from recent");
    let mapping = JsonMapping::new("user", entity("user", ColumnMap::new().with("id", "user_id")))
        .nest(nested("order", "user", "orders", RelationshipType::Array, ColumnMap::new().with("id", "order_id")));
    let built = build_json(origin, &mapping, None).expect("build");
    assert_eq!(built.ctes()[0].name, "recent");
    assert_eq!(built.ctes()[1].name, "origin_query");
    assert!(built.ctes()[1].statement.with.is_none());
}

#[test]
fn single_result_takes_the_first_root() {
    let mapping = users_with_orders().single();
    let built = stmt(ORIGIN).into_json(&mapping, None).expect("build");
    assert!(postgres(&built).sql.ends_with("select \"user\" from \"cte_root_user\" limit 1"));
}

#[test]
fn wildcard_origins_need_a_lookup() {
    let mapping = JsonMapping::new("user", entity("user", ColumnMap::new().with("id", "user_id").with("email", "email")));
    let err = build_json(stmt("select * from users"), &mapping, None).unwrap_err();
    match err {
        SqlError::ColumnResolution { columns, scope } => {
            assert_eq!(columns, vec!["user_id", "email"]);
            assert_eq!(scope, "origin_query");
        }
        other => panic!("unexpected {:?}", other),
    }
    let schema = shop_schema();
    assert!(build_json(stmt("select * from users"), &mapping, Some(&schema)).is_ok());
}

#[test]
fn structural_mapping_errors() {
    let root = || entity("user", ColumnMap::new().with("id", "user_id"));
    let cols = || ColumnMap::new().with("id", "order_id");
    let cases = vec![
        JsonMapping::new("user", root()).nest(nested("order", "nobody", "orders", RelationshipType::Array, cols())),
        JsonMapping::new("user", root())
            .nest(nested("a", "b", "a", RelationshipType::Object, cols()))
            .nest(nested("b", "a", "b", RelationshipType::Object, cols())),
        JsonMapping::new("user", root())
            .nest(nested("order", "user", "orders", RelationshipType::Array, cols()))
            .nest(nested("order", "user", "more", RelationshipType::Array, cols())),
        JsonMapping::new("user", root()).nest(nested("order", "user", "orders", RelationshipType::Array, ColumnMap::new())),
        JsonMapping::new("user", root()).nest(nested("order", "user", "id", RelationshipType::Object, cols())),
        JsonMapping::new("", root()),
    ];
    for mapping in cases {
        let err = build_json(stmt("select user_id, order_id from t"), &mapping, None).unwrap_err();
        assert!(matches!(err, SqlError::Mapping(_)), "{:?}", err);
    }

    let cycle = JsonMapping::new("user", root())
        .nest(nested("a", "b", "a", RelationshipType::Object, cols()))
        .nest(nested("b", "a", "b", RelationshipType::Object, cols()));
    assert!(cycle.validate().unwrap_err().to_string().contains("cycle"));
}

#[test]
fn origin_must_supply_distinct_unreserved_columns() {
    let mapping = JsonMapping::new("user", entity("user", ColumnMap::new().with("id", "id")));

    let err = build_json(stmt("select a.id, b.id from a join b on a.k = b.k"), &mapping, None).unwrap_err();
    assert!(matches!(err, SqlError::Mapping(_)));

    let err = build_json(stmt("select id, 1 as user_array from a"), &mapping, None).unwrap_err();
    assert!(err.to_string().contains("user_array"));

    let err = build_json(stmt("with origin_query as (select 1 as id) select id from origin_query"), &mapping, None).unwrap_err();
    assert!(matches!(err, SqlError::Mapping(_)));

    let err = build_json(stmt("select name from a"), &mapping, None).unwrap_err();
    assert_eq!(err.columns(), vec!["id".to_string()]);
}

#[test]
fn mapping_deserializes_from_camel_case_json() {
    let mapping = JsonMapping::from_json_str(
        r#"{
            "rootName": "user",
            "rootEntity": {"id": "user", "name": "User", "columns": {"name": "user_name", "id": "user_id"}},
            "nestedEntities": [{
                "id": "order", "name": "Order", "parentId": "user", "propertyName": "orders",
                "relationshipType": "array", "columns": {"total": "order_total"}
            }],
            "resultFormat": "single"
        }"#,
    )
    .expect("mapping");
    let keys: Vec<&str> = mapping.root_entity.columns.iter().map(|(k, _)| k).collect();
    assert_eq!(keys, vec!["name", "id"]);
    assert_eq!(mapping.result_format, ResultFormat::Single);
    assert_eq!(mapping.nested_entities[0].relationship_type, RelationshipType::Array);
    assert_eq!(mapping.mapped_columns(), vec!["user_name", "user_id", "order_total"]);

    let bad = JsonMapping::from_json_str(r#"{"rootName": "x", "rootEntity": {"id": "x", "name": "x", "columns": {"a": 1}}}"#);
    assert!(matches!(bad, Err(SqlError::Mapping(_))));
}
