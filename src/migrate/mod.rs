//! Schema reconciliation
//!
//! Brings the database in line with a set of [`EntityShape`]s:
//! * missing tables are created with all columns and indexes
//! * missing columns are added
//! * missing indexes are created
//!
//! Nothing is ever dropped or altered, so running reconciliation twice is a
//! no-op the second time.

pub mod models;
pub mod sql;

pub use models::{entities, users, ColumnShape, EntityShape, IndexShape};

use crate::connection::{Connection, Value};
use crate::{Error, Result};
use std::collections::HashSet;
use tracing::Instrument;

/// Catalog state of an existing table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExistingTable {
    /// Column names, lowercased
    pub columns: HashSet<String>,
    /// Index names, lowercased
    pub indexes: HashSet<String>,
}

impl ExistingTable {
    /// Build from catalog names (case is ignored)
    pub fn new<C, I>(columns: C, indexes: I) -> Self
    where
        C: IntoIterator,
        C::Item: AsRef<str>,
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        Self {
            columns: columns
                .into_iter()
                .map(|c| c.as_ref().to_ascii_lowercase())
                .collect(),
            indexes: indexes
                .into_iter()
                .map(|i| i.as_ref().to_ascii_lowercase())
                .collect(),
        }
    }
}

/// Statements needed to reconcile one entity
///
/// `existing` is `None` when the table does not exist.
pub fn plan(entity: &EntityShape, existing: Option<&ExistingTable>) -> Vec<String> {
    let Some(existing) = existing else {
        return vec![sql::create_table(entity)];
    };

    let mut statements = Vec::new();
    for column in &entity.columns {
        if !existing
            .columns
            .contains(&column.name.to_ascii_lowercase())
        {
            statements.push(sql::add_column(&entity.table, column));
        }
    }
    for index in &entity.indexes {
        if !existing.indexes.contains(&index.name.to_ascii_lowercase()) {
            statements.push(sql::create_index(&entity.table, index));
        }
    }
    statements
}

/// What a reconciliation run changed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Statements executed, in order
    pub statements: Vec<String>,
}

impl ReconcileReport {
    /// Whether the schema was already up to date
    pub fn is_noop(&self) -> bool {
        self.statements.is_empty()
    }
}

/// Reconcile every entity over `conn`
///
/// Any failure, including a catalog query, is reported as
/// [`Error::Migration`].
pub async fn reconcile(conn: &mut Connection, entities: &[EntityShape]) -> Result<ReconcileReport> {
    let mut report = ReconcileReport::default();

    for entity in entities {
        entity.validate()?;
        async {
            let existing = inspect(conn, &entity.table).await?;
            let statements = plan(entity, existing.as_ref());

            for stmt in statements {
                tracing::info!(statement = %stmt, "applying schema change");
                conn.execute(&stmt).await.map_err(|e| migration_error(entity, e))?;
                report.statements.push(stmt);
            }
            Ok::<(), Error>(())
        }
        .instrument(tracing::info_span!("reconcile", table = %entity.table))
        .await?;
    }

    if report.is_noop() {
        tracing::debug!("schema up to date");
    }
    Ok(report)
}

/// Read the catalog state of `table`; `None` if it does not exist
async fn inspect(conn: &mut Connection, table: &str) -> Result<Option<ExistingTable>> {
    let wrap = |e: Error| Error::Migration(format!("{}: inspecting catalog: {}", table, e));

    let count = conn
        .query(&sql::table_exists(table))
        .await
        .map_err(wrap)?
        .rows
        .first()
        .and_then(|row| row.first())
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_default();
    if count == "0" || count.is_empty() {
        return Ok(None);
    }

    let columns = conn
        .query(&sql::existing_columns(table))
        .await
        .map_err(wrap)?;
    let indexes = conn
        .query(&sql::existing_indexes(table))
        .await
        .map_err(wrap)?;

    Ok(Some(ExistingTable::new(
        first_column(&columns.rows),
        first_column(&indexes.rows),
    )))
}

fn first_column(rows: &[Vec<Value>]) -> impl Iterator<Item = &str> {
    rows.iter()
        .filter_map(|row| row.first().and_then(Value::as_str))
}

fn migration_error(entity: &EntityShape, err: Error) -> Error {
    Error::Migration(format!("{}: {}", entity.table, err))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_missing_table() {
        let statements = plan(&users(), None);
        assert_eq!(statements.len(), 1);
        assert!(statements[0].starts_with("CREATE TABLE IF NOT EXISTS `users`"));
    }

    #[test]
    fn test_plan_up_to_date_is_empty() {
        let existing = ExistingTable::new(
            ["ID", "created_at", "updated_at", "deleted_at", "name", "email"],
            ["PRIMARY", "idx_users_email", "IDX_USERS_DELETED_AT"],
        );
        assert!(plan(&users(), Some(&existing)).is_empty());
    }

    #[test]
    fn test_plan_adds_missing_pieces() {
        let existing = ExistingTable::new(
            ["id", "created_at", "updated_at", "deleted_at", "name"],
            ["PRIMARY", "idx_users_deleted_at"],
        );
        assert_eq!(
            plan(&users(), Some(&existing)),
            vec![
                "ALTER TABLE `users` ADD COLUMN `email` VARCHAR(255) NOT NULL".to_string(),
                "CREATE UNIQUE INDEX `idx_users_email` ON `users` (`email`)".to_string(),
            ]
        );
    }

    #[test]
    fn test_plan_never_drops_extra_columns() {
        let existing = ExistingTable::new(
            [
                "id",
                "created_at",
                "updated_at",
                "deleted_at",
                "name",
                "email",
                "legacy_flag",
            ],
            ["idx_users_email", "idx_users_deleted_at", "idx_legacy"],
        );
        assert!(plan(&users(), Some(&existing)).is_empty());
    }

    #[test]
    fn test_report_noop() {
        assert!(ReconcileReport::default().is_noop());
    }
}
