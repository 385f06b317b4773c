//! Table schema lookup
//! -------------------
//! The pipeline never talks to a database. When it needs the column list of a
//! physical table (wildcard expansion, join resolution, JSON mapping checks) it
//! asks a `TableSchemaLookup` supplied by the embedding application.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{SqlError, SqlResult};

/// Resolve a table name (as written, possibly `schema.table`) to its ordered column names.
/// `Ok(None)` means the table is unknown to this lookup.
pub trait TableSchemaLookup {
    fn columns(&self, table: &str) -> anyhow::Result<Option<Vec<String>>>;
}

impl<F> TableSchemaLookup for F
where
    F: Fn(&str) -> Option<Vec<String>>,
{
    fn columns(&self, table: &str) -> anyhow::Result<Option<Vec<String>>> {
        Ok(self(table))
    }
}

/// In-memory lookup, usually deserialised from JSON: `{"tables": {"users": ["id", "name"]}}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticSchema {
    #[serde(default)]
    pub tables: BTreeMap<String, Vec<String>>,
}

impl StaticSchema {
    pub fn new() -> Self { Self::default() }

    pub fn with_table<S: Into<String>>(mut self, name: S, columns: &[&str]) -> Self {
        self.tables.insert(name.into().to_ascii_lowercase(), columns.iter().map(|c| c.to_string()).collect());
        self
    }

    pub fn from_json_str(json: &str) -> anyhow::Result<Self> {
        let parsed: StaticSchema = serde_json::from_str(json)?;
        // keys are matched case-insensitively
        let tables = parsed.tables.into_iter().map(|(k, v)| (k.to_ascii_lowercase(), v)).collect();
        Ok(StaticSchema { tables })
    }
}

impl TableSchemaLookup for StaticSchema {
    fn columns(&self, table: &str) -> anyhow::Result<Option<Vec<String>>> {
        Ok(self.tables.get(&table.to_ascii_lowercase()).cloned())
    }
}

/// Ask the lookup for `qualified` first and fall back to the bare table `name`.
/// Lookup failures are wrapped as `SqlError::Lookup`.
pub fn lookup_table_columns(
    lookup: Option<&dyn TableSchemaLookup>,
    qualified: &str,
    name: &str,
) -> SqlResult<Option<Vec<String>>> {
    let Some(lookup) = lookup else { return Ok(None) };
    if let Some(cols) = lookup.columns(qualified).map_err(|e| SqlError::lookup(qualified, e))? {
        return Ok(Some(cols));
    }
    if qualified != name {
        return lookup.columns(name).map_err(|e| SqlError::lookup(name, e));
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_schema_is_case_insensitive() {
        let schema = StaticSchema::new().with_table("Users", &["id", "name"]);
        let cols = schema.columns("USERS").expect("lookup");
        assert_eq!(cols, Some(vec!["id".to_string(), "name".to_string()]));
    }

    #[test]
    fn static_schema_from_json() {
        let schema = StaticSchema::from_json_str(r#"{"tables": {"orders": ["order_id", "user_id"]}}"#).expect("json");
        assert_eq!(schema.columns("orders").expect("lookup").map(|c| c.len()), Some(2));
        assert!(StaticSchema::from_json_str("{\"tables\": 3}").is_err());
    }

    #[test]
    fn qualified_name_falls_back_to_bare_name() {
        let schema = StaticSchema::new().with_table("users", &["id"]);
        let found = lookup_table_columns(Some(&schema), "public.users", "users").expect("lookup");
        assert_eq!(found, Some(vec!["id".to_string()]));
    }

    #[test]
    fn closures_are_lookups() {
        let lookup = |t: &str| if t == "a" { Some(vec!["x".to_string()]) } else { None };
        assert_eq!(lookup_table_columns(Some(&lookup), "a", "a").expect("lookup"), Some(vec!["x".to_string()]));
        assert_eq!(lookup_table_columns(Some(&lookup), "b", "b").expect("lookup"), None);
    }

    #[test]
    fn failing_lookup_surfaces_as_lookup_error() {
        struct Broken;
        impl TableSchemaLookup for Broken {
            fn columns(&self, _table: &str) -> anyhow::Result<Option<Vec<String>>> {
                anyhow::bail!("catalog unavailable")
            }
        }
        let err = lookup_table_columns(Some(&Broken), "users", "users").unwrap_err();
        assert_eq!(err.code_str(), "lookup_error");
    }
}
