//! Source-to-target table routing and column mapping.
//!
//! A router is built once at startup: source columns and primary keys come
//! from the schema registry, target columns from target introspection (or
//! mirrored from the source when the target has no independent schema).
//! Transforms then rewrite the source-column list before the name mapping
//! is computed, so write-time mapping always reflects the post-transform
//! row shape.

use std::collections::HashMap;

use anyhow::{bail, ensure, Result};

use mysql_schema::{Table, TableId};

/// Configured (source, target) pair. `source_columns`/`target_columns`
/// carry an optional explicit, index-aligned mapping override; both empty
/// means map by identical name.
#[derive(Debug, Clone)]
pub struct RouterSpec {
    pub source: TableId,
    pub target: TableId,
    pub source_columns: Vec<String>,
    pub target_columns: Vec<String>,
}

/// Resolved column correspondence for one router.
#[derive(Debug, Clone, Default)]
pub struct ColumnsMapper {
    /// Source primary-key column names, in table order.
    pub primary_keys: Vec<String>,
    /// Ordered source columns after transform rewrites.
    pub source_columns: Vec<String>,
    /// Ordered target columns.
    pub target_columns: Vec<String>,
    /// (source, target) pairs in source order. A source column with no
    /// target counterpart does not appear here.
    pub mapping: Vec<(String, String)>,
}

impl ColumnsMapper {
    pub fn target_column(&self, source: &str) -> Option<&str> {
        self.mapping
            .iter()
            .find(|(s, _)| s == source)
            .map(|(_, t)| t.as_str())
    }

    /// (source, target) pairs for the primary-key columns. Errors when a
    /// key column is unmapped: keyed writes would be unaddressable.
    pub fn primary_key_pairs(&self) -> Result<Vec<(&str, &str)>> {
        self.primary_keys
            .iter()
            .map(|pk| match self.target_column(pk) {
                Some(t) => Ok((pk.as_str(), t)),
                None => bail!("primary-key column {pk} has no target mapping"),
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct Router {
    pub source: TableId,
    pub target: TableId,
    pub mapper: ColumnsMapper,
    override_source: Vec<String>,
    override_target: Vec<String>,
}

impl Router {
    fn new(spec: RouterSpec) -> Result<Router> {
        ensure!(
            spec.source_columns.len() == spec.target_columns.len(),
            "router {} -> {}: column override lists must have equal length ({} vs {})",
            spec.source,
            spec.target,
            spec.source_columns.len(),
            spec.target_columns.len()
        );
        Ok(Router {
            source: spec.source,
            target: spec.target,
            mapper: ColumnsMapper::default(),
            override_source: spec.source_columns,
            override_target: spec.target_columns,
        })
    }

    /// Record ordered columns and primary keys from the source table.
    pub fn load_source(&mut self, table: &Table) {
        self.mapper.source_columns = table.column_names();
        self.mapper.primary_keys = table.primary_key_names();
    }

    /// Record target columns from target introspection. None mirrors the
    /// source columns, for schema-less targets.
    pub fn load_target_columns(&mut self, columns: Option<Vec<String>>) {
        self.mapper.target_columns =
            columns.unwrap_or_else(|| self.mapper.source_columns.clone());
    }

    /// Rename a source column in place, keeping its slot in the ordered
    /// list and in the primary-key set.
    pub fn rename_source_column(&mut self, old: &str, new: &str) {
        for name in self
            .mapper
            .source_columns
            .iter_mut()
            .chain(self.mapper.primary_keys.iter_mut())
        {
            if name == old {
                *name = new.to_string();
            }
        }
    }

    /// Remove a source column from the ordered list.
    pub fn remove_source_column(&mut self, name: &str) {
        self.mapper.source_columns.retain(|c| c != name);
        self.mapper.primary_keys.retain(|c| c != name);
    }

    /// Compute the name mapping. An explicit override wins verbatim;
    /// otherwise each source column maps to the first target column with
    /// an identical name, in source order.
    pub fn build_mapping(&mut self) {
        if !self.override_source.is_empty() {
            self.mapper.mapping = self
                .override_source
                .iter()
                .cloned()
                .zip(self.override_target.iter().cloned())
                .collect();
            return;
        }
        self.mapper.mapping = self
            .mapper
            .source_columns
            .iter()
            .filter(|s| self.mapper.target_columns.contains(s))
            .map(|s| (s.clone(), s.clone()))
            .collect();
    }
}

/// All configured routers, indexed by source table.
#[derive(Debug, Default)]
pub struct Routers {
    routes: Vec<Router>,
    by_source: HashMap<TableId, usize>,
}

impl Routers {
    pub fn new(specs: Vec<RouterSpec>) -> Result<Routers> {
        let mut routers = Routers::default();
        for spec in specs {
            let source = spec.source.clone();
            ensure!(
                !routers.by_source.contains_key(&source),
                "duplicate router for source table {source}"
            );
            routers.by_source.insert(source, routers.routes.len());
            routers.routes.push(Router::new(spec)?);
        }
        Ok(routers)
    }

    pub fn get(&self, source: &TableId) -> Option<&Router> {
        self.by_source.get(source).map(|&i| &self.routes[i])
    }

    pub fn get_mut(&mut self, source: &TableId) -> Option<&mut Router> {
        self.by_source.get(source).map(|&i| &mut self.routes[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Router> {
        self.routes.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Router> {
        self.routes.iter_mut()
    }

    pub fn source_ids(&self) -> Vec<TableId> {
        self.routes.iter().map(|r| r.source.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mysql_schema::{Column, ColumnType};

    fn table(schema: &str, name: &str, cols: &[(&str, bool)]) -> Table {
        let mut table = Table::new(TableId::new(schema, name));
        table.columns = cols
            .iter()
            .map(|(n, pk)| Column {
                name: n.to_string(),
                col_type: ColumnType::Number,
                raw_type: "int".to_string(),
                comment: String::new(),
                is_primary_key: *pk,
            })
            .collect();
        table
    }

    fn spec(overrides: (&[&str], &[&str])) -> RouterSpec {
        RouterSpec {
            source: TableId::new("src", "t"),
            target: TableId::new("dst", "t"),
            source_columns: overrides.0.iter().map(|s| s.to_string()).collect(),
            target_columns: overrides.1.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_same_name_mapping_in_source_order() {
        let mut router = Router::new(spec((&[], &[]))).unwrap();
        router.load_source(&table("src", "t", &[("id", true), ("a", false), ("b", false)]));
        router.load_target_columns(Some(vec![
            "b".to_string(),
            "id".to_string(),
            "extra".to_string(),
        ]));
        router.build_mapping();
        assert_eq!(
            router.mapper.mapping,
            vec![
                ("id".to_string(), "id".to_string()),
                ("b".to_string(), "b".to_string()),
            ]
        );
    }

    #[test]
    fn test_explicit_override_wins_over_same_names() {
        let mut router = Router::new(spec((&["id", "a"], &["pk", "a_renamed"]))).unwrap();
        router.load_source(&table("src", "t", &[("id", true), ("a", false)]));
        router.load_target_columns(Some(vec!["id".to_string(), "a".to_string()]));
        router.build_mapping();
        // identical names exist on both sides but the override is verbatim
        assert_eq!(
            router.mapper.mapping,
            vec![
                ("id".to_string(), "pk".to_string()),
                ("a".to_string(), "a_renamed".to_string()),
            ]
        );
    }

    #[test]
    fn test_schemaless_target_mirrors_source() {
        let mut router = Router::new(spec((&[], &[]))).unwrap();
        router.load_source(&table("src", "t", &[("id", true), ("a", false)]));
        router.load_target_columns(None);
        router.build_mapping();
        assert_eq!(router.mapper.target_columns, vec!["id", "a"]);
        assert_eq!(router.mapper.mapping.len(), 2);
    }

    #[test]
    fn test_transform_rewrites_feed_the_mapping() {
        let mut router = Router::new(spec((&[], &[]))).unwrap();
        router.load_source(&table("src", "t", &[("id", true), ("a", false), ("junk", false)]));
        router.rename_source_column("a", "a2");
        router.remove_source_column("junk");
        router.load_target_columns(None);
        router.build_mapping();
        assert_eq!(router.mapper.source_columns, vec!["id", "a2"]);
        assert_eq!(
            router.mapper.mapping,
            vec![
                ("id".to_string(), "id".to_string()),
                ("a2".to_string(), "a2".to_string()),
            ]
        );
    }

    #[test]
    fn test_primary_key_pairs_require_mapping() {
        let mut router = Router::new(spec((&[], &[]))).unwrap();
        router.load_source(&table("src", "t", &[("id", true), ("a", false)]));
        router.load_target_columns(Some(vec!["a".to_string()]));
        router.build_mapping();
        assert!(router.mapper.primary_key_pairs().is_err());
    }

    #[test]
    fn test_mismatched_override_lengths_rejected() {
        assert!(Routers::new(vec![spec((&["a", "b"], &["x"]))]).is_err());
    }

    #[test]
    fn test_duplicate_source_rejected() {
        assert!(Routers::new(vec![spec((&[], &[])), spec((&[], &[]))]).is_err());
    }
}
