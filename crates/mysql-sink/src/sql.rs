//! Statement construction for batched MySQL writes.
//!
//! Pure functions from messages to (sql, params) pairs so statement shape
//! is testable without a server. Inserts, updates and replaces share one
//! bulk upsert form; deletes are keyed on the mapped primary-key columns.

use anyhow::{bail, Result};
use mysql_async::Value;

use mysql_schema::TableId;
use sync_core::{ColumnsMapper, DmlAction, DmlMsg, RowValue};

pub fn to_mysql_value(value: &RowValue) -> Value {
    match value {
        RowValue::Null => Value::NULL,
        RowValue::Int(n) => Value::Int(*n),
        RowValue::UInt(n) => Value::UInt(*n),
        RowValue::Float(f) => Value::Double(*f),
        RowValue::Text(s) => Value::Bytes(s.clone().into_bytes()),
        RowValue::Bytes(b) => Value::Bytes(b.clone()),
    }
}

/// Split a batch into maximal runs of like-kind statements, preserving
/// order. Inserts, updates and replaces all flush as upserts, so only a
/// delete breaks a run.
pub fn split_runs(messages: &[DmlMsg]) -> Vec<&[DmlMsg]> {
    let mut runs = Vec::new();
    let mut start = 0;
    for i in 1..messages.len() {
        if is_delete(&messages[i]) != is_delete(&messages[start]) {
            runs.push(&messages[start..i]);
            start = i;
        }
    }
    if start < messages.len() {
        runs.push(&messages[start..]);
    }
    runs
}

pub fn is_delete(msg: &DmlMsg) -> bool {
    msg.action == DmlAction::Delete
}

fn quoted(id: &TableId) -> String {
    format!("`{}`.`{}`", id.schema, id.name)
}

/// Multi-row `INSERT ... ON DUPLICATE KEY UPDATE` over the mapped columns.
/// A source column absent from a row binds NULL.
pub fn build_upsert(
    target: &TableId,
    mapper: &ColumnsMapper,
    rows: &[DmlMsg],
) -> Result<(String, Vec<Value>)> {
    if mapper.mapping.is_empty() {
        bail!("no columns mapped for target table {target}");
    }
    let key_pairs = mapper.primary_key_pairs()?;

    let column_list = mapper
        .mapping
        .iter()
        .map(|(_, t)| format!("`{t}`"))
        .collect::<Vec<_>>()
        .join(", ");
    let row_template = format!(
        "({})",
        vec!["?"; mapper.mapping.len()].join(", ")
    );
    let values = vec![row_template.as_str(); rows.len()].join(", ");

    // key columns keep their bound value on conflict, everything else
    // takes the incoming row
    let mut assignments: Vec<String> = mapper
        .mapping
        .iter()
        .filter(|(_, t)| !key_pairs.iter().any(|(_, kt)| kt == t))
        .map(|(_, t)| format!("`{t}` = VALUES(`{t}`)"))
        .collect();
    if assignments.is_empty() {
        let (_, kt) = key_pairs[0];
        assignments.push(format!("`{kt}` = `{kt}`"));
    }

    let sql = format!(
        "INSERT INTO {} ({column_list}) VALUES {values} ON DUPLICATE KEY UPDATE {}",
        quoted(target),
        assignments.join(", ")
    );

    let mut params = Vec::with_capacity(rows.len() * mapper.mapping.len());
    for row in rows {
        for (source, _) in &mapper.mapping {
            params.push(
                row.data
                    .get(source)
                    .map(to_mysql_value)
                    .unwrap_or(Value::NULL),
            );
        }
    }
    Ok((sql, params))
}

/// Keyed delete statements. A single-column key collapses the run into one
/// `IN` list; a composite key needs one statement per row because each row
/// is an AND of its key parts.
pub fn build_deletes(
    target: &TableId,
    mapper: &ColumnsMapper,
    rows: &[DmlMsg],
) -> Result<Vec<(String, Vec<Value>)>> {
    let key_pairs = mapper.primary_key_pairs()?;
    if key_pairs.is_empty() {
        bail!("target table {target} has no primary key, deletes are unaddressable");
    }

    let key_value = |row: &DmlMsg, source: &str| -> Result<Value> {
        match row.data.get(source) {
            Some(v) => Ok(to_mysql_value(v)),
            None => bail!("delete for {} lacks key column {source}", row.table),
        }
    };

    if let [(source, target_col)] = key_pairs.as_slice() {
        let placeholders = vec!["?"; rows.len()].join(", ");
        let sql = format!(
            "DELETE FROM {} WHERE `{target_col}` IN ({placeholders})",
            quoted(target)
        );
        let params = rows
            .iter()
            .map(|row| key_value(row, source))
            .collect::<Result<Vec<_>>>()?;
        return Ok(vec![(sql, params)]);
    }

    let predicate = key_pairs
        .iter()
        .map(|(_, t)| format!("`{t}` = ?"))
        .collect::<Vec<_>>()
        .join(" AND ");
    let sql = format!("DELETE FROM {} WHERE {predicate}", quoted(target));
    rows.iter()
        .map(|row| {
            let params = key_pairs
                .iter()
                .map(|(source, _)| key_value(row, source))
                .collect::<Result<Vec<_>>>()?;
            Ok((sql.clone(), params))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::HashMap;

    fn mapper(keys: &[&str], pairs: &[(&str, &str)]) -> ColumnsMapper {
        ColumnsMapper {
            primary_keys: keys.iter().map(|s| s.to_string()).collect(),
            source_columns: pairs.iter().map(|(s, _)| s.to_string()).collect(),
            target_columns: pairs.iter().map(|(_, t)| t.to_string()).collect(),
            mapping: pairs
                .iter()
                .map(|(s, t)| (s.to_string(), t.to_string()))
                .collect(),
        }
    }

    fn msg(action: DmlAction, fields: &[(&str, i64)]) -> DmlMsg {
        DmlMsg {
            table: TableId::new("shop", "orders"),
            action,
            data: fields
                .iter()
                .map(|(k, v)| (k.to_string(), RowValue::Int(*v)))
                .collect::<HashMap<_, _>>(),
            old: None,
            schema_version: 1,
            timestamp: Utc::now(),
        }
    }

    fn target() -> TableId {
        TableId::new("warehouse", "orders")
    }

    #[test]
    fn test_upsert_shape_and_params() {
        let mapper = mapper(&["id"], &[("id", "id"), ("qty", "quantity")]);
        let rows = vec![
            msg(DmlAction::Insert, &[("id", 1), ("qty", 5)]),
            msg(DmlAction::Update, &[("id", 2), ("qty", 7)]),
        ];
        let (sql, params) = build_upsert(&target(), &mapper, &rows).unwrap();
        assert_eq!(
            sql,
            "INSERT INTO `warehouse`.`orders` (`id`, `quantity`) VALUES (?, ?), (?, ?) \
             ON DUPLICATE KEY UPDATE `quantity` = VALUES(`quantity`)"
        );
        assert_eq!(
            params,
            vec![Value::Int(1), Value::Int(5), Value::Int(2), Value::Int(7)]
        );
    }

    #[test]
    fn test_upsert_missing_column_binds_null() {
        let mapper = mapper(&["id"], &[("id", "id"), ("qty", "qty")]);
        let rows = vec![msg(DmlAction::Insert, &[("id", 1)])];
        let (_, params) = build_upsert(&target(), &mapper, &rows).unwrap();
        assert_eq!(params, vec![Value::Int(1), Value::NULL]);
    }

    #[test]
    fn test_upsert_key_only_table_gets_noop_assignment() {
        let mapper = mapper(&["id"], &[("id", "id")]);
        let rows = vec![msg(DmlAction::Insert, &[("id", 1)])];
        let (sql, _) = build_upsert(&target(), &mapper, &rows).unwrap();
        assert!(sql.ends_with("ON DUPLICATE KEY UPDATE `id` = `id`"));
    }

    #[test]
    fn test_single_key_deletes_collapse_into_one_in_list() {
        let mapper = mapper(&["id"], &[("id", "id"), ("qty", "qty")]);
        let rows = vec![
            msg(DmlAction::Delete, &[("id", 3)]),
            msg(DmlAction::Delete, &[("id", 4)]),
            msg(DmlAction::Delete, &[("id", 5)]),
        ];
        let stmts = build_deletes(&target(), &mapper, &rows).unwrap();
        assert_eq!(stmts.len(), 1);
        assert_eq!(
            stmts[0].0,
            "DELETE FROM `warehouse`.`orders` WHERE `id` IN (?, ?, ?)"
        );
        assert_eq!(
            stmts[0].1,
            vec![Value::Int(3), Value::Int(4), Value::Int(5)]
        );
    }

    #[test]
    fn test_composite_key_deletes_stay_individual() {
        let mapper = mapper(&["a", "b"], &[("a", "a"), ("b", "b")]);
        let rows = vec![
            msg(DmlAction::Delete, &[("a", 1), ("b", 2)]),
            msg(DmlAction::Delete, &[("a", 3), ("b", 4)]),
        ];
        let stmts = build_deletes(&target(), &mapper, &rows).unwrap();
        assert_eq!(stmts.len(), 2);
        assert_eq!(
            stmts[0].0,
            "DELETE FROM `warehouse`.`orders` WHERE `a` = ? AND `b` = ?"
        );
        assert_eq!(stmts[1].1, vec![Value::Int(3), Value::Int(4)]);
    }

    #[test]
    fn test_runs_split_only_on_delete_boundaries() {
        let rows = vec![
            msg(DmlAction::Insert, &[("id", 1)]),
            msg(DmlAction::Update, &[("id", 1)]),
            msg(DmlAction::Delete, &[("id", 1)]),
            msg(DmlAction::Insert, &[("id", 2)]),
        ];
        let runs = split_runs(&rows);
        assert_eq!(
            runs.iter().map(|r| r.len()).collect::<Vec<_>>(),
            vec![2, 1, 1]
        );
        assert!(!is_delete(&runs[0][0]));
        assert!(is_delete(&runs[1][0]));
    }

    #[test]
    fn test_delete_without_key_mapping_is_refused() {
        let mapper = mapper(&["id"], &[("qty", "qty")]);
        let rows = vec![msg(DmlAction::Delete, &[("qty", 1)])];
        assert!(build_deletes(&target(), &mapper, &rows).is_err());
    }
}
