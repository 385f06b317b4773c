//! Hierarchical JSON query builder
//! -------------------------------
//! Rewrites a flat statement into staged CTEs that fold rows into JSON:
//!
//! 1. `origin_query` holds the original body (its own CTEs are hoisted first)
//! 2. for each depth, deepest first, `cte_object_depth_<d>` adds one
//!    `"<id>_json"` object column per entity at that depth, then every array
//!    entity at that depth gets a `cte_array_<id>` that groups by everything
//!    outside its subtree and aggregates the objects into `"<id>_array"`
//! 3. `cte_root_<root>` builds one root object per row
//! 4. the final select aggregates the root objects into one array, or takes the
//!    first one for single results
//!
//! Everything is validated before the first CTE is produced.

use tracing::debug;

use crate::error::{SqlError, SqlResult};
use crate::ident::ident_eq;
use crate::query::query_common::*;
use crate::schema::TableSchemaLookup;
use crate::transform::collect_columns::{CteEnv, SelectableColumnCollector};
use crate::transform::json_mapping::{ColumnMap, JsonMapping, NestedEntity, RelationshipType, ResultFormat};

pub const ORIGIN_CTE: &str = "origin_query";

pub fn object_cte_name(depth: usize) -> String { format!("cte_object_depth_{}", depth) }
pub fn array_cte_name(id: &str) -> String { format!("cte_array_{}", id) }
pub fn root_cte_name(root: &str) -> String { format!("cte_root_{}", root) }
pub fn object_column(id: &str) -> String { format!("{}_json", id) }
pub fn array_column(id: &str) -> String { format!("{}_array", id) }

fn empty_jsonb_array() -> Expr {
    Expr::Cast { expr: Box::new(Expr::string("[]")), ty: "jsonb".to_string(), shorthand: true }
}

fn coalesce_empty(agg: Expr) -> Expr {
    Expr::function("coalesce", vec![agg, empty_jsonb_array()])
}

fn select_from(select: Vec<SelectItem>, table: &str) -> Query {
    Query::new(select).with_from(TableRef::table(table, None))
}

fn cte(name: String, query: Query) -> Cte {
    Cte { name, columns: Vec::new(), statement: Box::new(Statement::from_query(query)) }
}

struct JsonBuilder<'m> {
    mapping: &'m JsonMapping,
    // origin output name for every mapped column, keyed case-insensitively
    resolved: Vec<(String, String)>,
}

impl<'m> JsonBuilder<'m> {
    fn resolved_name(&self, mapped: &str) -> String {
        self.resolved
            .iter()
            .find(|(m, _)| ident_eq(m, mapped))
            .map(|(_, o)| o.clone())
            .unwrap_or_else(|| mapped.to_string())
    }

    fn column(&self, mapped: &str) -> Expr {
        Expr::column(self.resolved_name(mapped))
    }

    /// `jsonb_build_object('key', col, .., 'child', child_col)` for one entity.
    fn build_object(&self, columns: &ColumnMap, children: &[&NestedEntity]) -> Expr {
        let mut args: Vec<Expr> = Vec::with_capacity((columns.len() + children.len()) * 2);
        for (key, col) in columns.iter() {
            args.push(Expr::string(key));
            args.push(self.column(col));
        }
        for child in children {
            args.push(Expr::string(child.property_name.clone()));
            args.push(Expr::column(match child.relationship_type {
                RelationshipType::Object => object_column(&child.id),
                RelationshipType::Array => array_column(&child.id),
            }));
        }
        Expr::function("jsonb_build_object", args)
    }

    /// NULL instead of an object whose mapped columns are all NULL.
    fn guarded_object(&self, entity: &NestedEntity, children: &[&NestedEntity]) -> Expr {
        let mut guard: Option<Expr> = None;
        for col in entity.columns.columns() {
            let check = Expr::IsNull { expr: Box::new(self.column(col)), negated: false };
            guard = Some(match guard {
                Some(g) => Expr::and(g, check),
                None => check,
            });
        }
        let object = self.build_object(&entity.columns, children);
        match guard {
            Some(g) => Expr::Case { operand: None, branches: vec![(g, Expr::null())], else_expr: Some(Box::new(object)) },
            None => object,
        }
    }

    fn children(&self, id: &'m str) -> Vec<&'m NestedEntity> {
        self.mapping.children(id).collect()
    }

    /// Columns produced for or consumed by `entity`'s subtree that no entity
    /// outside the subtree needs; an array stage drops them from its grouping.
    fn subtree_columns(&self, entity: &NestedEntity) -> Vec<String> {
        let subtree = self.mapping.subtree(&entity.id);
        let inside = |id: &str| subtree.iter().any(|e| e.id == id);
        let mut outside_cols: Vec<&str> = self.mapping.root_entity.columns.columns().collect();
        for e in self.mapping.nested_entities.iter().filter(|e| !inside(&e.id)) {
            outside_cols.extend(e.columns.columns());
        }
        let mut out: Vec<String> = Vec::new();
        for e in &subtree {
            for c in e.columns.columns() {
                if !outside_cols.iter().any(|o| ident_eq(o, c)) {
                    out.push(self.resolved_name(c));
                }
            }
            out.push(object_column(&e.id));
            out.push(array_column(&e.id));
        }
        out
    }
}

/// Rewrite `stmt` into the staged JSON pipeline described by `mapping`.
pub fn build_json(stmt: Statement, mapping: &JsonMapping, lookup: Option<&dyn TableSchemaLookup>) -> SqlResult<Statement> {
    mapping.validate()?;

    let collector = SelectableColumnCollector::new(lookup);
    let origin = collector.output_columns(&stmt, &CteEnv::default())?;
    let mut resolved: Vec<(String, String)> = Vec::new();
    let mut missing: Vec<String> = Vec::new();
    for mapped in mapping.mapped_columns() {
        let hits: Vec<&String> = origin.names.iter().filter(|n| ident_eq(n, mapped)).collect();
        match hits.as_slice() {
            [] => missing.push(mapped.to_string()),
            [one] => resolved.push((mapped.to_string(), (*one).clone())),
            _ => return Err(SqlError::mapping(format!("column '{}' appears more than once in {}; alias it in the query", mapped, ORIGIN_CTE))),
        }
    }
    if !missing.is_empty() {
        return Err(SqlError::column(missing, ORIGIN_CTE));
    }

    let max_depth = mapping.max_depth();
    let mut generated_ctes: Vec<String> = vec![ORIGIN_CTE.to_string(), root_cte_name(&mapping.root_name)];
    generated_ctes.extend((1..=max_depth).map(object_cte_name));
    let mut generated_cols: Vec<String> = vec![mapping.root_name.clone(), array_column(&mapping.root_name)];
    for e in &mapping.nested_entities {
        generated_cols.push(object_column(&e.id));
        if e.relationship_type == RelationshipType::Array {
            generated_ctes.push(array_cte_name(&e.id));
            generated_cols.push(array_column(&e.id));
        }
    }
    if let Some(c) = stmt.ctes().iter().find(|c| generated_ctes.iter().any(|g| ident_eq(g, &c.name))) {
        return Err(SqlError::mapping(format!("existing CTE '{}' collides with a generated stage name", c.name)));
    }
    if let Some(c) = origin.names.iter().find(|n| generated_cols.iter().any(|g| ident_eq(g, n))) {
        return Err(SqlError::mapping(format!("origin column '{}' collides with a generated JSON column", c)));
    }

    let builder = JsonBuilder { mapping, resolved };
    let Statement { with, body } = stmt;
    let (recursive, mut ctes) = match with {
        Some(w) => (w.recursive, w.ctes),
        None => (false, Vec::new()),
    };
    let hoisted = ctes.len();
    ctes.push(Cte { name: ORIGIN_CTE.to_string(), columns: Vec::new(), statement: Box::new(Statement { with: None, body }) });

    let mut current = ORIGIN_CTE.to_string();
    let mut columns: Vec<String> = origin.names.clone();
    for depth in (1..=max_depth).rev() {
        let level: Vec<&NestedEntity> = mapping.nested_entities.iter().filter(|e| mapping.depth(&e.id) == depth).collect();
        if level.is_empty() {
            continue;
        }
        let mut select = vec![SelectItem::new(Expr::Wildcard { qualifier: None })];
        for entity in &level {
            let children = builder.children(&entity.id);
            select.push(SelectItem::aliased(builder.guarded_object(entity, &children), object_column(&entity.id)));
            columns.push(object_column(&entity.id));
        }
        let name = object_cte_name(depth);
        ctes.push(cte(name.clone(), select_from(select, &current)));
        current = name;

        for entity in level.iter().filter(|e| e.relationship_type == RelationshipType::Array) {
            let dropped = builder.subtree_columns(entity);
            let keep: Vec<String> = columns.iter().filter(|c| !dropped.iter().any(|d| ident_eq(d, c))).cloned().collect();
            let obj = object_column(&entity.id);
            let mut agg = FunctionCall::new("jsonb_agg", vec![Expr::column(obj.clone())]);
            agg.filter = Some(Box::new(Expr::IsNull { expr: Box::new(Expr::column(obj)), negated: true }));
            let mut select: Vec<SelectItem> = keep.iter().map(|c| SelectItem::new(Expr::column(c.clone()))).collect();
            select.push(SelectItem::aliased(coalesce_empty(Expr::Function(agg)), array_column(&entity.id)));
            let mut q = select_from(select, &current);
            q.group_by = keep.iter().map(|c| Expr::column(c.clone())).collect();
            let name = array_cte_name(&entity.id);
            ctes.push(cte(name.clone(), q));
            current = name;
            columns = keep;
            columns.push(array_column(&entity.id));
        }
        debug!(target: "sqlweave::json", "staged depth {} ({} entit(ies))", depth, level.len());
    }

    let root_children = builder.children(&mapping.root_entity.id);
    let root_object = builder.build_object(&mapping.root_entity.columns, &root_children);
    let root_cte = root_cte_name(&mapping.root_name);
    ctes.push(cte(root_cte.clone(), select_from(vec![SelectItem::aliased(root_object, mapping.root_name.clone())], &current)));

    let final_query = match mapping.result_format {
        ResultFormat::Array => {
            let agg = Expr::function("jsonb_agg", vec![Expr::column(mapping.root_name.clone())]);
            select_from(vec![SelectItem::aliased(coalesce_empty(agg), array_column(&mapping.root_name))], &root_cte)
        }
        ResultFormat::Single => {
            let mut q = select_from(vec![SelectItem::new(Expr::column(mapping.root_name.clone()))], &root_cte);
            q.limit = Some(Expr::Literal(Literal::Number("1".to_string())));
            q
        }
    };
    debug!(target: "sqlweave::json", "json pipeline: {} hoisted + {} generated CTE(s)", hoisted, ctes.len() - hoisted);
    Ok(Statement { with: Some(WithClause { recursive, ctes }), body: QueryBody::Select(Box::new(final_query)) })
}

impl Statement {
    pub fn into_json(self, mapping: &JsonMapping, lookup: Option<&dyn TableSchemaLookup>) -> SqlResult<Statement> {
        build_json(self, mapping, lookup)
    }
}
