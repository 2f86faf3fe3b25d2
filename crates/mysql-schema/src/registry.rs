//! Versioned, concurrency-safe registry of tracked table schemas.
//!
//! # Architecture
//!
//! The registry holds the current snapshot of every tracked table plus a
//! frozen snapshot per historic version. A structural DDL never mutates a
//! published snapshot: it clones the table, applies the delta to the clone,
//! bumps the version and publishes the clone. Row events decoded before an
//! ALTER keep formatting against the version they were decoded with.
//!
//! Names that are not tracked are tested against the staging-table naming
//! patterns of online schema-change tools. A matching name is an alias for
//! the tracked base table: its CREATE/ALTER maintain a pending shadow column
//! list, and the tool's final rename-swap promotes the shadow onto the base
//! table as one ordinary version bump.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::{debug, warn};

use crate::ddl::{AlterSpec, ColumnDef, ColumnPosition, DdlDelta, DdlKind};
use crate::error::SchemaError;
use crate::table::{Column, Table, TableId};

/// How a name relates to the tracked set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Tracked,
    /// Staging-table alias for the given tracked base table.
    Alias(TableId),
    Untracked,
}

/// Outcome of applying one delta.
#[derive(Debug, Clone)]
pub enum Applied {
    /// Structural change published under a new version.
    Changed(Arc<Table>),
    /// Tracked entry removed. Historic snapshots stay queryable.
    Dropped,
    /// A staging alias mutated its pending shadow columns only.
    Shadow,
    /// Statement accounted for, no structural effect.
    Noop,
    /// Target is neither tracked nor an alias of a tracked table.
    Skipped,
}

#[derive(Default)]
struct Inner {
    current: HashMap<TableId, Arc<Table>>,
    snapshots: HashMap<(TableId, u64), Arc<Table>>,
    /// Pending column lists of in-flight online schema changes, keyed by the
    /// tracked base table.
    shadows: HashMap<TableId, Vec<Column>>,
}

#[derive(Default)]
pub struct SchemaRegistry {
    inner: RwLock<Inner>,
}

impl SchemaRegistry {
    pub fn new() -> SchemaRegistry {
        SchemaRegistry::default()
    }

    /// Seed a table from authoritative introspection. Replaces any existing
    /// entry and registers the snapshot under the table's own version.
    pub fn load(&self, table: Table) {
        let mut inner = self.write();
        let id = table.id.clone();
        let version = table.version;
        let arc = Arc::new(table);
        inner.snapshots.insert((id.clone(), version), Arc::clone(&arc));
        inner.current.insert(id, arc);
    }

    pub fn get(&self, id: &TableId) -> Option<Arc<Table>> {
        self.read().current.get(id).cloned()
    }

    pub fn get_version(&self, id: &TableId, version: u64) -> Result<Arc<Table>, SchemaError> {
        self.read()
            .snapshots
            .get(&(id.clone(), version))
            .cloned()
            .ok_or_else(|| SchemaError::VersionNotFound {
                id: id.clone(),
                version,
            })
    }

    pub fn tracked(&self) -> Vec<TableId> {
        self.read().current.keys().cloned().collect()
    }

    pub fn resolve(&self, id: &TableId) -> Resolution {
        let inner = self.read();
        if inner.current.contains_key(id) {
            return Resolution::Tracked;
        }
        match alias_base(&inner, id) {
            Some(base) => Resolution::Alias(base),
            None => Resolution::Untracked,
        }
    }

    /// Apply one delta. Structural mutations never touch a published
    /// snapshot; they publish a new one under version + 1.
    pub fn apply_ddl(&self, delta: &DdlDelta) -> Result<Applied, SchemaError> {
        let mut inner = self.write();
        if inner.current.contains_key(&delta.table) {
            Self::apply_tracked(&mut inner, delta)
        } else if let Some(base) = alias_base(&inner, &delta.table) {
            Self::apply_alias(&mut inner, delta, base)
        } else {
            debug!(table = %delta.table, "ddl for untracked table skipped");
            Ok(Applied::Skipped)
        }
    }

    fn apply_tracked(inner: &mut Inner, delta: &DdlDelta) -> Result<Applied, SchemaError> {
        let id = &delta.table;
        match &delta.kind {
            DdlKind::Create {
                columns,
                comment,
                like,
                as_select,
            } => {
                if *as_select || like.is_some() {
                    warn!(table = %id, "re-create of tracked table without column list ignored");
                    return Ok(Applied::Noop);
                }
                let old = inner.current.get(id).ok_or_else(|| {
                    SchemaError::TableNotFound(id.clone())
                })?;
                let mut next = old.snapshot();
                next.columns = columns.iter().map(ColumnDef::to_column).collect();
                next.comment = comment.clone();
                next.version += 1;
                Ok(publish(inner, next))
            }
            DdlKind::Alter { specs } => {
                if let Some(outcome) = Self::alter_rename(inner, delta, specs)? {
                    return Ok(outcome);
                }
                let old = inner.current.get(id).ok_or_else(|| {
                    SchemaError::TableNotFound(id.clone())
                })?;
                let mut next = old.snapshot();
                if !apply_specs(&mut next.columns, specs) {
                    return Ok(Applied::Noop);
                }
                next.version += 1;
                Ok(publish(inner, next))
            }
            DdlKind::Rename { to } => Self::rename_tracked(inner, id, to),
            DdlKind::Drop => {
                inner.current.remove(id);
                inner.shadows.remove(id);
                Ok(Applied::Dropped)
            }
            DdlKind::Truncate => Ok(Applied::Noop),
        }
    }

    /// An ALTER carrying a RENAME TO clause behaves like a standalone
    /// RENAME TABLE for the table entry itself.
    fn alter_rename(
        inner: &mut Inner,
        delta: &DdlDelta,
        specs: &[AlterSpec],
    ) -> Result<Option<Applied>, SchemaError> {
        for spec in specs {
            if let AlterSpec::RenameTable { to } = spec {
                let to = TableId::new(
                    to.schema.clone().unwrap_or_else(|| delta.table.schema.clone()),
                    to.name.clone(),
                );
                return Self::rename_tracked(inner, &delta.table, &to).map(Some);
            }
        }
        Ok(None)
    }

    fn rename_tracked(
        inner: &mut Inner,
        from: &TableId,
        to: &TableId,
    ) -> Result<Applied, SchemaError> {
        // Swap-away leg of an online schema change: the live table is moved
        // to a staging name moments before the shadow copy takes its place.
        // Tracking stays on the base identity.
        if alias_base_of(to, from) {
            debug!(from = %from, to = %to, "tracked table renamed to its staging alias");
            return Ok(Applied::Noop);
        }
        if inner.current.contains_key(to) {
            return Err(SchemaError::IdentityMismatch {
                target: to.clone(),
                tracked: from.clone(),
            });
        }
        let old = inner
            .current
            .remove(from)
            .ok_or_else(|| SchemaError::TableNotFound(from.clone()))?;
        let mut next = old.snapshot();
        next.id = to.clone();
        next.version += 1;
        Ok(publish(inner, next))
    }

    fn apply_alias(
        inner: &mut Inner,
        delta: &DdlDelta,
        base: TableId,
    ) -> Result<Applied, SchemaError> {
        match &delta.kind {
            DdlKind::Create { columns, like, .. } => {
                let shadow = match like {
                    Some(src) => inner
                        .current
                        .get(src)
                        .ok_or_else(|| SchemaError::TableNotFound(src.clone()))?
                        .columns
                        .clone(),
                    None => columns.iter().map(ColumnDef::to_column).collect(),
                };
                inner.shadows.insert(base, shadow);
                Ok(Applied::Shadow)
            }
            DdlKind::Alter { specs } => {
                let seed = inner
                    .current
                    .get(&base)
                    .ok_or_else(|| SchemaError::TableNotFound(base.clone()))?
                    .columns
                    .clone();
                let shadow = inner.shadows.entry(base).or_insert(seed);
                apply_specs(shadow, specs);
                Ok(Applied::Shadow)
            }
            DdlKind::Rename { to } => {
                if to == &base {
                    // Swap-in leg: the staging copy takes the base name and
                    // its accumulated shadow becomes the live schema.
                    let Some(shadow) = inner.shadows.remove(&base) else {
                        warn!(table = %base, "staging swap without recorded shadow columns");
                        return Ok(Applied::Noop);
                    };
                    let old = inner
                        .current
                        .get(&base)
                        .ok_or_else(|| SchemaError::TableNotFound(base.clone()))?;
                    let mut next = old.snapshot();
                    next.columns = shadow;
                    next.version += 1;
                    return Ok(publish(inner, next));
                }
                Ok(Applied::Noop)
            }
            DdlKind::Drop => {
                inner.shadows.remove(&base);
                Ok(Applied::Shadow)
            }
            DdlKind::Truncate => Ok(Applied::Noop),
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }
}

fn publish(inner: &mut Inner, next: Table) -> Applied {
    let id = next.id.clone();
    let version = next.version;
    let arc = Arc::new(next);
    inner.snapshots.insert((id.clone(), version), Arc::clone(&arc));
    inner.current.insert(id, Arc::clone(&arc));
    Applied::Changed(arc)
}

fn index_of(cols: &[Column], name: &str) -> Option<usize> {
    cols.iter().position(|c| c.name == name)
}

/// Apply ALTER specs to a column list, reproducing the source database's
/// reorder semantics: a positioned column is relocated, the other columns
/// keep their relative order. Returns whether the list changed.
fn apply_specs(cols: &mut Vec<Column>, specs: &[AlterSpec]) -> bool {
    let mut changed = false;
    for spec in specs {
        match spec {
            AlterSpec::AddColumn { def, position } => {
                changed |= insert_at(cols, def.to_column(), position);
            }
            AlterSpec::DropColumn { name } => {
                if let Some(i) = index_of(cols, name) {
                    cols.remove(i);
                    changed = true;
                }
            }
            AlterSpec::ModifyColumn { def, position } => {
                changed |= replace_column(cols, &def.name, def, position);
            }
            AlterSpec::ChangeColumn {
                old_name,
                def,
                position,
            } => {
                changed |= replace_column(cols, old_name, def, position);
            }
            AlterSpec::RenameColumn { old_name, new_name } => {
                if let Some(i) = index_of(cols, old_name) {
                    cols[i].name = new_name.clone();
                    changed = true;
                }
            }
            AlterSpec::RenameTable { .. } | AlterSpec::Ignored => {}
        }
    }
    changed
}

fn insert_at(cols: &mut Vec<Column>, col: Column, position: &ColumnPosition) -> bool {
    match position {
        ColumnPosition::None => {
            cols.push(col);
            true
        }
        ColumnPosition::First => {
            cols.insert(0, col);
            true
        }
        ColumnPosition::After(rel) => match index_of(cols, rel) {
            Some(i) => {
                cols.insert(i + 1, col);
                true
            }
            None => {
                warn!(column = %col.name, after = %rel, "relative column not found, add skipped");
                false
            }
        },
    }
}

/// MODIFY/CHANGE: with a position clause the column is removed and
/// re-inserted at the new slot; without one it is overwritten in place.
/// Key membership survives a redefinition that does not restate it.
fn replace_column(
    cols: &mut Vec<Column>,
    old_name: &str,
    def: &ColumnDef,
    position: &ColumnPosition,
) -> bool {
    let existing = index_of(cols, old_name);
    let was_pk = existing.map(|i| cols[i].is_primary_key).unwrap_or(false);
    let mut col = def.to_column();
    col.is_primary_key |= was_pk;

    match position {
        ColumnPosition::None => match existing {
            Some(i) => {
                cols[i] = col;
                true
            }
            None => {
                cols.push(col);
                true
            }
        },
        _ => {
            if let Some(i) = existing {
                cols.remove(i);
            }
            insert_at(cols, col, position)
        }
    }
}

/// Staging-name patterns used by online schema-change tools, parameterized
/// by the base table name:
///   `_<base>_gho` / `_<base>_ghc` / `_<base>_del`
///   `tp_<digits>_(ogt|del|ogl)_<base>`
///   `tpa_<alnum>_<base>`
fn staging_base_name(name: &str) -> Option<&str> {
    if let Some(rest) = name.strip_prefix('_') {
        for suffix in ["_gho", "_ghc", "_del"] {
            if let Some(base) = rest.strip_suffix(suffix) {
                if !base.is_empty() {
                    return Some(base);
                }
            }
        }
    }
    if let Some(rest) = name.strip_prefix("tp_") {
        if let Some((digits, rest)) = rest.split_once('_') {
            if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
                if let Some((tag, base)) = rest.split_once('_') {
                    if matches!(tag, "ogt" | "del" | "ogl") && !base.is_empty() {
                        return Some(base);
                    }
                }
            }
        }
    }
    if let Some(rest) = name.strip_prefix("tpa_") {
        if let Some((token, base)) = rest.split_once('_') {
            if !token.is_empty()
                && token
                    .bytes()
                    .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
                && !base.is_empty()
            {
                return Some(base);
            }
        }
    }
    None
}

fn alias_base(inner: &Inner, id: &TableId) -> Option<TableId> {
    let base = staging_base_name(&id.name)?;
    let candidate = TableId::new(id.schema.clone(), base);
    inner.current.contains_key(&candidate).then_some(candidate)
}

fn alias_base_of(alias: &TableId, base: &TableId) -> bool {
    alias.schema == base.schema && staging_base_name(&alias.name) == Some(base.name.as_str())
}
