//! Statement transformations
//! -------------------------
//! Everything that reads or rewrites a parsed statement tree: column
//! resolution, the collectors, predicate/join/sort/paging injection, parameter
//! binding, set-operation building and the hierarchical JSON builder.
//! Mutating entry points take `&mut Statement` and leave it untouched on error;
//! builders that produce a new statement consume their input.

pub mod walk;
pub mod collect_columns;
pub mod collect_values;
pub mod collect_tables;
pub mod collect_ctes;
pub mod collect_params;
pub mod criteria;
pub mod inject_where;
pub mod inject_join;
pub mod inject_sort;
pub mod inject_paging;
pub mod bind_params;
pub mod set_ops;
pub mod json_mapping;
pub mod json_builder;


pub use bind_params::{set_parameter, set_parameters};
pub use collect_columns::{resolve_scope, SelectableColumn, SelectableColumnCollector, SourceColumns};
pub use collect_ctes::{collect_ctes, CteCollector};
pub use collect_params::{collect_params, CollectedParam, ParameterCollector};
pub use collect_tables::{collect_tables, TableSource, TableSourceCollector};
pub use collect_values::{collect_values, SelectValue, SelectValueCollector};
pub use criteria::{Criteria, CriteriaValue};
pub use inject_join::inject_join;
pub use inject_paging::{inject_paging, PageSpec};
pub use inject_sort::{inject_sort, NullsPlacement, SortOrder, SortSpec};
pub use inject_where::{inject_criteria, inject_predicate, inject_where, InjectOptions};
pub use json_builder::build_json;
pub use json_mapping::{ColumnMap, JsonEntity, JsonMapping, NestedEntity, RelationshipType, ResultFormat};
pub use set_ops::combine;
