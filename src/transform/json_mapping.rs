//! JSON mapping descriptor
//! -----------------------
//! Describes how the flat rows of a statement fold into a JSON document: a root
//! entity plus nested entities hanging off it as single objects or arrays.
//!
//! ```json
//! {
//!   "rootName": "user",
//!   "rootEntity": {"id": "user", "name": "User", "columns": {"id": "user_id", "name": "user_name"}},
//!   "nestedEntities": [
//!     {"id": "order", "name": "Order", "parentId": "user", "propertyName": "orders",
//!      "relationshipType": "array", "columns": {"id": "order_id", "total": "order_total"}}
//!   ],
//!   "resultFormat": "array"
//! }
//! ```

use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::error::{SqlError, SqlResult};
use crate::ident::ident_eq;

/// Ordered output key → origin column pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMap(Vec<(String, String)>);

impl ColumnMap {
    pub fn new() -> Self { Self::default() }

    pub fn with<K: Into<String>, C: Into<String>>(mut self, key: K, column: C) -> Self {
        self.0.push((key.into(), column.into()));
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, c)| (k.as_str(), c.as_str()))
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(_, c)| c.as_str())
    }

    pub fn has_key(&self, key: &str) -> bool {
        self.0.iter().any(|(k, _)| k == key)
    }

    pub fn len(&self) -> usize { self.0.len() }

    pub fn is_empty(&self) -> bool { self.0.is_empty() }
}

impl<K: Into<String>, C: Into<String>> FromIterator<(K, C)> for ColumnMap {
    fn from_iter<I: IntoIterator<Item = (K, C)>>(iter: I) -> Self {
        ColumnMap(iter.into_iter().map(|(k, c)| (k.into(), c.into())).collect())
    }
}

impl Serialize for ColumnMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, c) in &self.0 {
            map.serialize_entry(k, c)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ColumnMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // serde_json keeps object key order, which is the JSON key order of the output
        let value = Value::deserialize(deserializer)?;
        let Value::Object(map) = value else {
            return Err(serde::de::Error::custom("columns must be an object of key → column name"));
        };
        let mut out = ColumnMap::new();
        for (k, v) in map {
            match v {
                Value::String(c) => out.0.push((k, c)),
                other => return Err(serde::de::Error::custom(format!("column for key '{}' must be a string, got {}", k, other))),
            }
        }
        Ok(out)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationshipType {
    /// one-to-one / belongs-to: a single object, NULL when every column is NULL
    Object,
    /// one-to-many: an array of objects, `[]` when there are none
    Array,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultFormat {
    #[default]
    Array,
    Single,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonEntity {
    pub id: String,
    pub name: String,
    pub columns: ColumnMap,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NestedEntity {
    pub id: String,
    pub name: String,
    pub parent_id: String,
    pub property_name: String,
    pub relationship_type: RelationshipType,
    pub columns: ColumnMap,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonMapping {
    pub root_name: String,
    pub root_entity: JsonEntity,
    #[serde(default)]
    pub nested_entities: Vec<NestedEntity>,
    #[serde(default)]
    pub result_format: ResultFormat,
}

impl JsonMapping {
    pub fn new<S: Into<String>>(root_name: S, root_entity: JsonEntity) -> Self {
        JsonMapping { root_name: root_name.into(), root_entity, nested_entities: Vec::new(), result_format: ResultFormat::Array }
    }

    pub fn nest(mut self, entity: NestedEntity) -> Self {
        self.nested_entities.push(entity);
        self
    }

    pub fn single(mut self) -> Self {
        self.result_format = ResultFormat::Single;
        self
    }

    pub fn from_json_str(json: &str) -> SqlResult<Self> {
        serde_json::from_str(json).map_err(|e| SqlError::mapping(format!("mapping json: {}", e)))
    }

    pub fn find(&self, id: &str) -> Option<&NestedEntity> {
        self.nested_entities.iter().find(|e| e.id == id)
    }

    /// Nested entities whose parent is `id`, in declaration order.
    pub fn children<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a NestedEntity> + 'a {
        self.nested_entities.iter().filter(move |e| e.parent_id == id)
    }

    /// Distance from the root: 1 for the root's direct children.
    pub fn depth(&self, id: &str) -> usize {
        let mut depth = 0usize;
        let mut cur = id;
        while let Some(e) = self.find(cur) {
            depth += 1;
            cur = &e.parent_id;
            if depth > self.nested_entities.len() { break; }
        }
        depth
    }

    pub fn max_depth(&self) -> usize {
        self.nested_entities.iter().map(|e| self.depth(&e.id)).max().unwrap_or(0)
    }

    /// `id` itself and every entity nested below it.
    pub fn subtree(&self, id: &str) -> Vec<&NestedEntity> {
        let mut out: Vec<&NestedEntity> = Vec::new();
        if let Some(e) = self.find(id) { out.push(e); }
        let mut i = 0;
        while i < out.len() {
            let parent: &NestedEntity = out[i];
            out.extend(self.children(&parent.id));
            i += 1;
        }
        out
    }

    /// Structural checks that need no statement: unique ids, existing parents,
    /// no cycles, non-empty column maps, unique property names per parent.
    pub fn validate(&self) -> SqlResult<()> {
        if self.root_name.trim().is_empty() {
            return Err(SqlError::mapping("rootName must not be empty"));
        }
        if self.root_entity.columns.is_empty() {
            return Err(SqlError::mapping(format!("entity '{}' maps no columns", self.root_entity.id)));
        }
        let mut ids: Vec<&str> = vec![self.root_entity.id.as_str()];
        for e in &self.nested_entities {
            if ids.contains(&e.id.as_str()) {
                return Err(SqlError::mapping(format!("duplicate entity id '{}'", e.id)));
            }
            ids.push(&e.id);
            if e.columns.is_empty() {
                return Err(SqlError::mapping(format!("entity '{}' maps no columns", e.id)));
            }
        }
        for e in &self.nested_entities {
            if !ids.contains(&e.parent_id.as_str()) {
                return Err(SqlError::mapping(format!("entity '{}' references unknown parent '{}'", e.id, e.parent_id)));
            }
        }
        for e in &self.nested_entities {
            let mut seen: Vec<&str> = vec![e.id.as_str()];
            let mut cur = e.parent_id.as_str();
            while cur != self.root_entity.id {
                if seen.contains(&cur) {
                    return Err(SqlError::mapping(format!("entity '{}' is part of a parent cycle", e.id)));
                }
                seen.push(cur);
                match self.find(cur) {
                    Some(p) => cur = &p.parent_id,
                    None => break,
                }
            }
        }
        for parent in &ids {
            let columns = if *parent == self.root_entity.id {
                &self.root_entity.columns
            } else {
                match self.find(parent) {
                    Some(p) => &p.columns,
                    None => continue,
                }
            };
            let mut props: Vec<&str> = Vec::new();
            for child in self.children(parent) {
                if props.contains(&child.property_name.as_str()) || columns.has_key(&child.property_name) {
                    return Err(SqlError::mapping(format!("property '{}' is defined twice on entity '{}'", child.property_name, parent)));
                }
                props.push(&child.property_name);
            }
        }
        Ok(())
    }

    /// Every origin column the mapping reads, first mention first.
    pub fn mapped_columns(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        let all = self.root_entity.columns.columns().chain(self.nested_entities.iter().flat_map(|e| e.columns.columns()));
        for c in all {
            if !out.iter().any(|o| ident_eq(o, c)) { out.push(c); }
        }
        out
    }
}
