//! Domain library for the KonBase mock backend.
//!
//! Holds the record model, the table catalogue with per-table schemas, the
//! ports (`RecordStore`, `Clock`, `IdGenerator`) and the error type shared by
//! the adapters. The in-memory store that stands in for the relational backend
//! lives in [`adapters::memory_store`]. Keep transport concerns (HTTP, auth
//! sessions, channels) out of this crate.

use std::time::SystemTime;

use serde_json::Value;

pub use filter::{Condition, OrClause, OrOp};
pub use record::Record;
pub use schema::{Column, ColumnKind, IdPolicy, InsertOverride, Table, TableSchema, Timestamps};

/// Time source abstraction to make code testable.
pub trait Clock: Send + Sync {
    fn now(&self) -> SystemTime;
}

/// Source of record identifiers; one call per inserted row.
pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> String;
}

/// Storage port for table records.
///
/// Reads return owned copies; callers never see the live rows. Mutations are
/// applied one record at a time and any follow-up writes (activity logs,
/// cascades) are performed by the implementation without a transaction.
pub trait RecordStore: Send + Sync {
    /// Every row of the table, in table order.
    fn all(&self, table: Table) -> Result<Vec<Record>, StoreError>;
    fn get(&self, table: Table, id: &str) -> Result<Option<Record>, StoreError>;
    /// Rows matching ALL conditions (equality only).
    fn filter(&self, table: Table, conditions: &[Condition]) -> Result<Vec<Record>, StoreError>;
    /// Validate, stamp and append a new row. Returns the stored row.
    fn insert(&self, table: Table, data: Record) -> Result<Record, StoreError>;
    /// Shallow-merge `patch` into the row. `Ok(None)` when no row has `id`.
    fn update(&self, table: Table, id: &str, patch: Record) -> Result<Option<Record>, StoreError>;
    /// Remove the row. `Ok(None)` when no row has `id`.
    fn delete(&self, table: Table, id: &str) -> Result<Option<Record>, StoreError>;

    /// First row whose `column` equals `value`.
    fn find_by(
        &self,
        table: Table,
        column: &str,
        value: &Value,
    ) -> Result<Option<Record>, StoreError> {
        Ok(self
            .filter(table, &[Condition::eq(column, value.clone())])?
            .into_iter()
            .next())
    }

    fn count_by(&self, table: Table, column: &str, value: &Value) -> Result<usize, StoreError> {
        Ok(self
            .filter(table, &[Condition::eq(column, value.clone())])?
            .len())
    }

    /// Delete every row whose `column` equals `value`, one `delete` per row.
    fn delete_where(&self, table: Table, column: &str, value: &Value) -> Result<usize, StoreError> {
        let targets = self.filter(table, &[Condition::eq(column, value.clone())])?;
        let mut removed = 0;
        for row in targets {
            if let Some(id) = row.id() {
                if self.delete(table, id)?.is_some() {
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }

    /// Mark the listed notifications of `user_id` as read. Already-read rows
    /// and rows owned by other users are left alone.
    fn mark_notifications_read(&self, user_id: &str, ids: &[String]) -> Result<usize, StoreError> {
        let owned = self.filter(
            Table::Notifications,
            &[Condition::eq("user_id", user_id)],
        )?;
        let mut updated = 0;
        for row in owned {
            let Some(id) = row.id() else { continue };
            if !ids.iter().any(|wanted| wanted == id) || row.bool("read") == Some(true) {
                continue;
            }
            let mut patch = Record::new();
            patch.set("read", true);
            if self.update(Table::Notifications, id, patch)?.is_some() {
                updated += 1;
            }
        }
        Ok(updated)
    }

    /// Append an `audit_logs` entry for an action taken by `user_id` on
    /// their own account. A failed write is logged and otherwise ignored.
    fn record_audit(&self, action: &str, entity: &str, user_id: &str, changes: Option<Value>) {
        let mut entry = Record::new()
            .with("action", action)
            .with("entity", entity)
            .with("entity_id", user_id)
            .with("user_id", user_id);
        if let Some(changes) = changes {
            entry.set("changes", changes);
        }
        if let Err(e) = self.insert(Table::AuditLogs, entry) {
            tracing::warn!(error = %e, action, "failed to write audit entry");
        }
    }

    /// Link a user to an association unless the pair already exists.
    fn add_association_member(
        &self,
        user_id: &str,
        association_id: &str,
    ) -> Result<Record, StoreError> {
        let existing = self.filter(
            Table::AssociationMembers,
            &[
                Condition::eq("user_id", user_id),
                Condition::eq("association_id", association_id),
            ],
        )?;
        if let Some(row) = existing.into_iter().next() {
            return Ok(row);
        }
        let mut data = Record::new();
        data.set("user_id", user_id);
        data.set("association_id", association_id);
        self.insert(Table::AssociationMembers, data)
    }
}

/// Errors raised by the record store.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    #[error("Mock table '{0}' not found")]
    UnknownTable(String),
    #[error("invalid {table} record: {message}")]
    Validation { table: Table, message: String },
    #[error("record must be a JSON object")]
    NotAnObject,
    #[error("invalid filter: {0}")]
    InvalidFilter(String),
    /// Referential precondition rejected by a table; the message is user-facing.
    #[error("{0}")]
    Guard(String),
    #[error("resource already exists")]
    AlreadyExists,
    #[error("repository error: {0}")]
    Repository(String),
}

/// Return a short about/version line for the binary to print.
pub fn about() -> String {
    let pkg = env!("CARGO_PKG_NAME");
    let ver = env!("CARGO_PKG_VERSION");
    format!("{} v{} - KonBase mock data layer", pkg, ver)
}

pub mod adapters;
pub mod filter;
pub mod ids;
pub mod record;
pub mod schema;
pub mod time;
pub mod validate;
