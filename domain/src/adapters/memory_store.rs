use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::adapters::fixtures;
use crate::filter::{matches_all, sort_rows, values_equal};
use crate::ids::UuidIds;
use crate::time::{format_timestamp, next_timestamp, SystemClock};
use crate::validate::{validate_insert, validate_patch};
use crate::{
    Clock, Condition, IdGenerator, IdPolicy, Record, RecordStore, StoreError, Table, Timestamps,
};

/// Notifications keep only the newest entries.
pub const NOTIFICATION_CAP: usize = 50;

/// Author recorded on convention log entries written by the store itself.
pub const SYSTEM_USER: &str = "user-system";

type Tables = BTreeMap<Table, Vec<Record>>;

/// In-memory stand-in for the relational backend.
///
/// One mutex guards all tables so guards and cascades see a consistent view.
/// Convention activity log entries are written afterwards as separate inserts
/// and are therefore not atomic with the change that caused them.
pub struct InMemoryStore {
    tables: Mutex<Tables>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
}

impl InMemoryStore {
    /// Empty store using the wall clock and `mock-<uuid>` ids.
    pub fn new() -> Self {
        Self::with_parts(Arc::new(SystemClock), Arc::new(UuidIds::default()))
    }

    pub fn with_parts(clock: Arc<dyn Clock>, ids: Arc<dyn IdGenerator>) -> Self {
        let tables = Table::ALL.iter().map(|t| (*t, Vec::new())).collect();
        Self {
            tables: Mutex::new(tables),
            clock,
            ids,
        }
    }

    /// Store preloaded with the demo data set.
    pub fn seeded() -> Self {
        Self::seeded_with(Arc::new(SystemClock), Arc::new(UuidIds::default()))
    }

    pub fn seeded_with(clock: Arc<dyn Clock>, ids: Arc<dyn IdGenerator>) -> Self {
        let now = clock.now();
        let store = Self::with_parts(clock, ids);
        if let Ok(mut tables) = store.tables.lock() {
            for (table, rows) in fixtures::demo_data(now) {
                tables.insert(table, rows);
            }
        }
        store
    }

    /// Current time as a store timestamp.
    pub fn timestamp(&self) -> String {
        format_timestamp(self.clock.now())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        self.tables
            .lock()
            .map_err(|_| StoreError::Repository("mutex poisoned".into()))
    }

    fn name_of(&self, table: Table, id: Option<&str>, column: &str, fallback: &str) -> String {
        id.and_then(|id| self.get(table, id).ok().flatten())
            .and_then(|row| row.str(column).filter(|s| !s.is_empty()).map(str::to_string))
            .unwrap_or_else(|| fallback.to_string())
    }

    fn item_name(&self, row: &Record, fallback: &str) -> String {
        self.name_of(Table::Items, row.str("item_id"), "name", fallback)
    }

    /// Append a convention activity entry. Failures are logged, never raised:
    /// the change that triggered the entry has already been applied.
    fn log_activity(&self, convention_id: Option<&str>, user_id: &str, message: String) {
        let Some(convention_id) = convention_id else {
            warn!(message = %message, "activity without convention id dropped");
            return;
        };
        let entry = Record::new()
            .with("convention_id", convention_id)
            .with("user_id", user_id)
            .with("log_message", message);
        if let Err(e) = self.insert(Table::ConventionLogs, entry) {
            warn!(error = %e, convention_id, "failed to write convention log");
        }
    }

    fn after_insert(&self, table: Table, row: &Record) {
        let convention = row.str("convention_id");
        match table {
            Table::Conventions => {
                let user = row.str("created_by").unwrap_or(SYSTEM_USER);
                let message = format!("Created convention \"{}\".", text(row.get("name")));
                self.log_activity(row.id(), user, message);
            }
            Table::ConventionAccess => {
                let name = self.name_of(Table::Profiles, row.str("user_id"), "name", "Unknown User");
                let message = format!(
                    "Added {} to convention with role {}.",
                    name,
                    text(row.get("role"))
                );
                self.log_activity(convention, SYSTEM_USER, message);
            }
            Table::ConventionLocations => {
                let name = match row.str("name_override").filter(|s| !s.is_empty()) {
                    Some(n) => n.to_string(),
                    None => self.name_of(
                        Table::Locations,
                        row.str("location_id"),
                        "name",
                        "Unknown Location",
                    ),
                };
                let message = format!("Added location \"{}\" to convention.", name);
                self.log_activity(convention, SYSTEM_USER, message);
            }
            Table::ConventionEquipment => {
                let item = self.item_name(row, "Unknown Item");
                let location = self.name_of(
                    Table::ConventionLocations,
                    row.str("convention_location_id"),
                    "name_override",
                    "Storage",
                );
                let message = format!(
                    "Allocated {}x \"{}\" to {}.",
                    text(row.get("quantity")),
                    item,
                    location
                );
                self.log_activity(convention, SYSTEM_USER, message);
            }
            Table::ConventionRequirements => {
                let message = format!("Added requirement: \"{}\".", text(row.get("description")));
                self.log_activity(convention, SYSTEM_USER, message);
            }
            Table::ConventionConsumables => {
                let item = self.item_name(row, "Unknown Consumable");
                let message = format!(
                    "Allocated {}x \"{}\" to convention.",
                    text(row.get("allocated_quantity")),
                    item
                );
                self.log_activity(convention, SYSTEM_USER, message);
            }
            _ => {}
        }
    }

    fn after_update(&self, table: Table, old: &Record, new: &Record, patch: &Record) {
        let convention = new.str("convention_id");
        match table {
            Table::Conventions if changed(old, new, "status") => {
                let message = format!(
                    "Convention status changed from {} to {}.",
                    text(old.get("status")),
                    text(new.get("status"))
                );
                self.log_activity(new.id(), SYSTEM_USER, message);
            }
            Table::ConventionEquipment if changed(old, new, "status") => {
                let item = self.item_name(new, "Unknown Item");
                let user = patch
                    .str("issued_by")
                    .or_else(|| patch.str("returned_by"))
                    .unwrap_or(SYSTEM_USER);
                let message = format!(
                    "Changed status of \"{}\" from {} to {}.",
                    item,
                    text(old.get("status")),
                    text(new.get("status"))
                );
                self.log_activity(convention, user, message);
            }
            Table::ConventionRequirements if changed(old, new, "status") => {
                let message = format!(
                    "Updated requirement \"{}\" status to {}.",
                    text(new.get("description")),
                    text(new.get("status"))
                );
                self.log_activity(convention, SYSTEM_USER, message);
            }
            Table::ConventionConsumables if changed(old, new, "used_quantity") => {
                let item = self.item_name(new, "Unknown Consumable");
                let before = old.i64("used_quantity").unwrap_or(0);
                let after = new.i64("used_quantity").unwrap_or(0);
                let user = patch.str("used_by").unwrap_or(SYSTEM_USER);
                let message = format!(
                    "Recorded usage of {}x \"{}\" (Total used: {}).",
                    (after - before).abs(),
                    item,
                    after
                );
                self.log_activity(convention, user, message);
            }
            _ => {}
        }
    }

    fn after_delete(&self, table: Table, row: &Record) {
        let convention = row.str("convention_id");
        let message = match table {
            Table::ConventionAccess => {
                let name = self.name_of(Table::Profiles, row.str("user_id"), "name", "Unknown User");
                format!("Removed {} from convention.", name)
            }
            Table::ConventionLocations => format!(
                "Removed location \"{}\" from convention.",
                text(row.get("name_override"))
            ),
            Table::ConventionEquipment => format!(
                "Removed allocation of \"{}\" from convention.",
                self.item_name(row, "Unknown Item")
            ),
            Table::ConventionRequirements => format!(
                "Removed requirement: \"{}\".",
                text(row.get("description"))
            ),
            Table::ConventionConsumables => format!(
                "Removed allocation of \"{}\" from convention.",
                self.item_name(row, "Unknown Consumable")
            ),
            _ => return,
        };
        self.log_activity(convention, SYSTEM_USER, message);
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Display form used in log messages.
fn text(v: Option<&Value>) -> String {
    match v {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => "none".to_string(),
        Some(other) => other.to_string(),
    }
}

fn changed(old: &Record, new: &Record, column: &str) -> bool {
    match (old.get(column), new.get(column)) {
        (Some(a), Some(b)) => !values_equal(a, b),
        (None, None) => false,
        _ => true,
    }
}

fn references(tables: &Tables, table: Table, column: &str, id: &str) -> bool {
    tables
        .get(&table)
        .is_some_and(|rows| rows.iter().any(|r| r.str(column) == Some(id)))
}

fn cascade(tables: &mut Tables, table: Table, column: &str, id: &str) -> usize {
    let Some(rows) = tables.get_mut(&table) else {
        return 0;
    };
    let before = rows.len();
    rows.retain(|r| r.str(column) != Some(id));
    before - rows.len()
}

/// Referential preconditions checked before a delete.
fn guard_delete(tables: &Tables, table: Table, row: &Record, id: &str) -> Result<(), StoreError> {
    match table {
        Table::Locations if references(tables, Table::Items, "location_id", id) => Err(
            StoreError::Guard("Cannot delete location with assigned items.".into()),
        ),
        Table::Conventions if row.str("status") == Some("active") => Err(StoreError::Guard(
            "Cannot delete an active convention.".into(),
        )),
        Table::ConventionLocations
            if references(tables, Table::ConventionEquipment, "convention_location_id", id)
                || references(tables, Table::ConventionConsumables, "convention_location_id", id) =>
        {
            Err(StoreError::Guard(
                "Cannot delete location with assigned equipment or consumables.".into(),
            ))
        }
        _ => Ok(()),
    }
}

fn present(table: Table, mut rows: Vec<Record>) -> Vec<Record> {
    if table == Table::ConventionLogs {
        sort_rows(&mut rows, "created_at", false);
    }
    rows
}

impl RecordStore for InMemoryStore {
    fn all(&self, table: Table) -> Result<Vec<Record>, StoreError> {
        let tables = self.lock()?;
        let rows = tables.get(&table).cloned().unwrap_or_default();
        drop(tables);
        debug!(%table, count = rows.len(), "all");
        Ok(present(table, rows))
    }

    fn get(&self, table: Table, id: &str) -> Result<Option<Record>, StoreError> {
        let tables = self.lock()?;
        let found = tables
            .get(&table)
            .and_then(|rows| rows.iter().find(|r| r.id() == Some(id)).cloned());
        debug!(%table, id, found = found.is_some(), "get");
        Ok(found)
    }

    fn filter(&self, table: Table, conditions: &[Condition]) -> Result<Vec<Record>, StoreError> {
        let tables = self.lock()?;
        let rows: Vec<Record> = tables
            .get(&table)
            .map(|rows| {
                rows.iter()
                    .filter(|r| matches_all(r, conditions))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        drop(tables);
        debug!(%table, conditions = conditions.len(), count = rows.len(), "filter");
        Ok(present(table, rows))
    }

    fn insert(&self, table: Table, data: Record) -> Result<Record, StoreError> {
        validate_insert(table, &data)?;
        let schema = table.schema();
        let now = self.timestamp();
        let mut row = data;

        match schema.timestamps {
            Timestamps::Full => {
                row.set("created_at", now.clone());
                row.set("updated_at", now.clone());
            }
            Timestamps::CreatedOnly => row.set("created_at", now.clone()),
            Timestamps::Untracked => {}
        }
        for o in schema.overrides {
            row.set(o.column(), o.value(&now));
        }

        {
            let mut tables = self.lock()?;
            let rows = tables.entry(table).or_default();
            match schema.id_policy {
                IdPolicy::Generated => row.set("id", self.ids.next_id()),
                IdPolicy::Supplied => {
                    let id = row.id().unwrap_or_default();
                    if rows.iter().any(|r| r.id() == Some(id)) {
                        warn!(%table, id, "insert rejected: duplicate id");
                        return Err(StoreError::AlreadyExists);
                    }
                }
            }
            if table == Table::Notifications {
                rows.insert(0, row.clone());
                rows.truncate(NOTIFICATION_CAP);
            } else {
                rows.push(row.clone());
            }
        }

        info!(%table, id = row.id().unwrap_or_default(), "insert");
        self.after_insert(table, &row);
        Ok(row)
    }

    fn update(&self, table: Table, id: &str, patch: Record) -> Result<Option<Record>, StoreError> {
        validate_patch(table, id, &patch)?;
        let mut patch = patch;
        if table == Table::Profiles
            && !patch
                .get("two_factor_enabled")
                .is_some_and(Value::is_boolean)
        {
            patch.remove("two_factor_enabled");
        }
        let now = self.clock.now();

        let (old, new) = {
            let mut tables = self.lock()?;
            let Some(row) = tables
                .get_mut(&table)
                .and_then(|rows| rows.iter_mut().find(|r| r.id() == Some(id)))
            else {
                debug!(%table, id, "update: no such row");
                return Ok(None);
            };
            let old = row.clone();
            let stamp = next_timestamp(now, old.str("updated_at"));
            row.merge(&patch);
            row.set("updated_at", stamp);
            (old, row.clone())
        };

        info!(%table, id, columns = patch.len(), "update");
        self.after_update(table, &old, &new, &patch);
        Ok(Some(new))
    }

    fn delete(&self, table: Table, id: &str) -> Result<Option<Record>, StoreError> {
        let removed = {
            let mut tables = self.lock()?;
            let Some(pos) = tables
                .get(&table)
                .and_then(|rows| rows.iter().position(|r| r.id() == Some(id)))
            else {
                debug!(%table, id, "delete: no such row");
                return Ok(None);
            };
            let row = tables
                .get(&table)
                .and_then(|rows| rows.get(pos))
                .cloned()
                .unwrap_or_default();
            if let Err(e) = guard_delete(&tables, table, &row, id) {
                warn!(%table, id, reason = %e, "delete rejected");
                return Err(e);
            }
            if let Some(rows) = tables.get_mut(&table) {
                rows.remove(pos);
            }

            match table {
                Table::Conventions => {
                    let mut cascaded = 0;
                    for dependent in [
                        Table::ConventionLocations,
                        Table::ConventionEquipment,
                        Table::ConventionAccess,
                        Table::ConventionRequirements,
                        Table::ConventionConsumables,
                        Table::ConventionLogs,
                    ] {
                        cascaded += cascade(&mut tables, dependent, "convention_id", id);
                    }
                    debug!(%table, id, cascaded, "cascade");
                }
                Table::Items => {
                    let cascaded = cascade(&mut tables, Table::Documents, "item_id", id);
                    debug!(%table, id, cascaded, "cascade");
                }
                Table::EquipmentSets => {
                    let cascaded = cascade(&mut tables, Table::EquipmentSetItems, "set_id", id);
                    debug!(%table, id, cascaded, "cascade");
                }
                _ => {}
            }
            row
        };

        info!(%table, id, "delete");
        self.after_delete(table, &removed);
        Ok(Some(removed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::SequentialIds;
    use crate::time::SteppingClock;
    use serde_json::json;
    use std::time::{Duration, UNIX_EPOCH};

    fn store() -> InMemoryStore {
        InMemoryStore::seeded_with(
            Arc::new(SteppingClock::new(
                UNIX_EPOCH + Duration::from_secs(1_700_000_000),
                Duration::from_millis(1),
            )),
            Arc::new(SequentialIds::new("mock-", 4)),
        )
    }

    fn rec(v: Value) -> Record {
        Record::try_from(v).unwrap()
    }

    fn logs_for(s: &InMemoryStore, convention: &str) -> Vec<String> {
        s.filter(Table::ConventionLogs, &[Condition::eq("convention_id", convention)])
            .unwrap()
            .iter()
            .filter_map(|r| r.str("log_message").map(str::to_string))
            .collect()
    }

    #[test]
    fn insert_get_roundtrip_adds_generated_fields() {
        let s = store();
        let input = rec(json!({"name": "Tent", "quantity": 2, "location_id": "loc-3"}));
        let created = s.insert(Table::Items, input.clone()).unwrap();
        assert_eq!(created.id(), Some("mock-0001"));
        assert!(created.str("created_at").is_some());
        assert_eq!(created.str("created_at"), created.str("updated_at"));

        let fetched = s.get(Table::Items, "mock-0001").unwrap().unwrap();
        assert_eq!(fetched, created);
        let mut expected = input;
        expected.set("id", "mock-0001");
        expected.set("created_at", created.get("created_at").cloned().unwrap());
        expected.set("updated_at", created.get("updated_at").cloned().unwrap());
        assert_eq!(fetched, expected);
    }

    #[test]
    fn insert_replaces_caller_ids_and_applies_overrides() {
        let s = store();
        let row = s
            .insert(
                Table::ConventionEquipment,
                rec(json!({"id": "mine", "convention_id": "conv-1", "item_id": "item-6", "quantity": 1, "status": "lost"})),
            )
            .unwrap();
        assert_ne!(row.id(), Some("mine"));
        assert_eq!(row.str("status"), Some("allocated"));
    }

    #[test]
    fn untracked_tables_get_no_timestamps() {
        let s = store();
        let row = s
            .insert(Table::EquipmentSetItems, rec(json!({"set_id": "set-2", "item_id": "item-3"})))
            .unwrap();
        assert!(!row.contains("created_at"));
        assert!(!row.contains("updated_at"));
    }

    #[test]
    fn insert_rejects_invalid_rows() {
        let s = store();
        let before = s.all(Table::Items).unwrap().len();
        assert!(matches!(
            s.insert(Table::Items, rec(json!({"quantity": 1}))),
            Err(StoreError::Validation { .. })
        ));
        assert_eq!(s.all(Table::Items).unwrap().len(), before);
    }

    #[test]
    fn profiles_keep_supplied_id_and_reject_duplicates() {
        let s = store();
        let p = s
            .insert(Table::Profiles, rec(json!({"id": "user-x", "email": "x@konbase.cfd"})))
            .unwrap();
        assert_eq!(p.id(), Some("user-x"));
        assert!(p.str("email_confirmed_at").is_some());
        assert_eq!(
            s.insert(Table::Profiles, rec(json!({"id": "user-admin", "email": "dup@konbase.cfd"}))),
            Err(StoreError::AlreadyExists)
        );
    }

    #[test]
    fn update_item3_quantity_scenario() {
        let s = store();
        let before = s.get(Table::Items, "item-3").unwrap().unwrap();
        assert_eq!(before.i64("quantity"), Some(5));

        let updated = s
            .update(Table::Items, "item-3", rec(json!({"quantity": 3})))
            .unwrap()
            .unwrap();
        let after = s.get(Table::Items, "item-3").unwrap().unwrap();
        assert_eq!(updated, after);
        assert_eq!(after.i64("quantity"), Some(3));
        assert_ne!(after.get("updated_at"), before.get("updated_at"));
        // every other column untouched
        for (col, value) in before.iter() {
            if col != "quantity" && col != "updated_at" {
                assert_eq!(after.get(col), Some(value), "column {}", col);
            }
        }
    }

    #[test]
    fn update_refreshes_updated_at_monotonically_on_every_table() {
        let s = store();
        for table in Table::ALL {
            let Some(row) = s.all(table).unwrap().into_iter().next() else {
                continue;
            };
            let id = row.id().unwrap().to_string();
            let first = s.update(table, &id, Record::new()).unwrap().unwrap();
            let second = s.update(table, &id, Record::new()).unwrap().unwrap();
            let (a, b) = (first.str("updated_at").unwrap(), second.str("updated_at").unwrap());
            assert!(b > a, "{}: {} !> {}", table, b, a);
        }
    }

    /// Returns the same instant on every call.
    struct FrozenClock(std::time::SystemTime);

    impl Clock for FrozenClock {
        fn now(&self) -> std::time::SystemTime {
            self.0
        }
    }

    fn frozen_store() -> InMemoryStore {
        InMemoryStore::seeded_with(
            Arc::new(FrozenClock(UNIX_EPOCH + Duration::from_secs(1_700_000_000))),
            Arc::new(SequentialIds::new("mock-", 4)),
        )
    }

    #[test]
    fn update_item3_moves_updated_at_forward_with_frozen_clock() {
        let s = frozen_store();
        let before = s.get(Table::Items, "item-3").unwrap().unwrap();
        let after = s
            .update(Table::Items, "item-3", rec(json!({"quantity": 3})))
            .unwrap()
            .unwrap();
        assert_eq!(after.i64("quantity"), Some(3));
        let (old, new) = (before.str("updated_at").unwrap(), after.str("updated_at").unwrap());
        assert!(new > old, "{} !> {}", new, old);
    }

    #[test]
    fn repeated_updates_in_the_same_instant_keep_increasing() {
        let s = frozen_store();
        let created = s
            .insert(Table::Items, rec(json!({"name": "Tent", "quantity": 1, "location_id": "loc-1"})))
            .unwrap();
        let id = created.id().unwrap().to_string();
        let mut last = created.str("updated_at").unwrap().to_string();
        for q in 2..5 {
            let row = s
                .update(Table::Items, &id, rec(json!({"quantity": q})))
                .unwrap()
                .unwrap();
            let stamp = row.str("updated_at").unwrap().to_string();
            assert!(stamp > last, "{} !> {}", stamp, last);
            last = stamp;
        }
        assert_eq!(last, "2023-11-14T22:13:20.003Z");
    }

    #[test]
    fn update_missing_row_is_none() {
        let s = store();
        assert_eq!(s.update(Table::Items, "nope", rec(json!({"quantity": 1}))).unwrap(), None);
    }

    #[test]
    fn profile_update_keeps_two_factor_flag_unless_boolean() {
        let s = store();
        s.update(Table::Profiles, "user-admin", rec(json!({"two_factor_enabled": true})))
            .unwrap();
        let p = s
            .update(Table::Profiles, "user-admin", rec(json!({"name": "Root", "two_factor_enabled": null})))
            .unwrap()
            .unwrap();
        assert_eq!(p.bool("two_factor_enabled"), Some(true));
        assert_eq!(p.str("name"), Some("Root"));
    }

    #[test]
    fn location_guard_leaves_store_unchanged() {
        let s = store();
        let before = s.all(Table::Locations).unwrap();
        let err = s.delete(Table::Locations, "loc-2").unwrap_err();
        assert_eq!(err.to_string(), "Cannot delete location with assigned items.");
        assert_eq!(s.all(Table::Locations).unwrap(), before);

        // loc-5 has no items
        assert!(s.delete(Table::Locations, "loc-5").unwrap().is_some());
    }

    #[test]
    fn active_convention_guard_leaves_linked_tables_unchanged() {
        let s = store();
        let linked = [
            Table::Conventions,
            Table::ConventionLocations,
            Table::ConventionEquipment,
            Table::ConventionAccess,
            Table::ConventionRequirements,
            Table::ConventionConsumables,
            Table::ConventionLogs,
        ];
        let before: Vec<_> = linked.iter().map(|t| s.all(*t).unwrap()).collect();
        let err = s.delete(Table::Conventions, "conv-active").unwrap_err();
        assert_eq!(err, StoreError::Guard("Cannot delete an active convention.".into()));
        let after: Vec<_> = linked.iter().map(|t| s.all(*t).unwrap()).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn convention_delete_cascades_to_dependents() {
        let s = store();
        let removed = s.delete(Table::Conventions, "conv-1").unwrap().unwrap();
        assert_eq!(removed.str("name"), Some("Annual Demo Con 2024"));
        for t in [
            Table::ConventionLocations,
            Table::ConventionEquipment,
            Table::ConventionAccess,
            Table::ConventionRequirements,
            Table::ConventionConsumables,
            Table::ConventionLogs,
        ] {
            assert!(
                s.filter(t, &[Condition::eq("convention_id", "conv-1")]).unwrap().is_empty(),
                "{} still references conv-1",
                t
            );
        }
        // other conventions untouched
        assert_eq!(
            s.filter(Table::ConventionAccess, &[Condition::eq("convention_id", "conv-2")])
                .unwrap()
                .len(),
            1
        );
    }

    #[test]
    fn convention_location_guard() {
        let s = store();
        let err = s.delete(Table::ConventionLocations, "convloc-1").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Cannot delete location with assigned equipment or consumables."
        );
        let removed = s.delete(Table::ConventionLocations, "convloc-3").unwrap();
        assert!(removed.is_some());
        assert!(logs_for(&s, "conv-2").contains(&"Removed location \"Expo Floor\" from convention.".to_string()));
    }

    #[test]
    fn item_and_set_deletes_cascade() {
        let s = store();
        s.delete(Table::Items, "item-1").unwrap();
        assert!(s.get(Table::Documents, "doc-1").unwrap().is_none());
        s.delete(Table::EquipmentSets, "set-2").unwrap();
        assert!(s
            .filter(Table::EquipmentSetItems, &[Condition::eq("set_id", "set-2")])
            .unwrap()
            .is_empty());
    }

    #[test]
    fn delete_missing_row_is_silent() {
        let s = store();
        assert_eq!(s.delete(Table::Categories, "nope").unwrap(), None);
    }

    #[test]
    fn notifications_are_prepended_and_capped() {
        let s = store();
        let first = s
            .insert(Table::Notifications, rec(json!({"user_id": "user-member", "title": "Hi", "read": true})))
            .unwrap();
        assert_eq!(first.bool("read"), Some(false));
        assert_eq!(s.all(Table::Notifications).unwrap()[0].id(), first.id());

        for i in 0..60 {
            s.insert(Table::Notifications, rec(json!({"user_id": "user-member", "title": format!("n{}", i)})))
                .unwrap();
        }
        let all = s.all(Table::Notifications).unwrap();
        assert_eq!(all.len(), NOTIFICATION_CAP);
        assert_eq!(all[0].str("title"), Some("n59"));
    }

    #[test]
    fn convention_activity_is_logged() {
        let s = store();
        let conv = s
            .insert(Table::Conventions, rec(json!({"name": "Winter Con", "created_by": "user-manager", "status": "planning"})))
            .unwrap();
        let id = conv.id().unwrap().to_string();
        let logs = s
            .filter(Table::ConventionLogs, &[Condition::eq("convention_id", id.as_str())])
            .unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].str("user_id"), Some("user-manager"));
        assert_eq!(logs[0].str("log_message"), Some("Created convention \"Winter Con\"."));

        s.update(Table::Conventions, &id, rec(json!({"status": "active"}))).unwrap();
        assert!(logs_for(&s, &id).contains(&"Convention status changed from planning to active.".to_string()));

        s.insert(Table::ConventionAccess, rec(json!({"convention_id": id, "user_id": "user-member", "role": "member"})))
            .unwrap();
        assert!(logs_for(&s, &id).contains(&"Added Member User to convention with role member.".to_string()));

        s.insert(Table::ConventionLocations, rec(json!({"convention_id": id, "location_id": "loc-4"})))
            .unwrap();
        assert!(logs_for(&s, &id).contains(&"Added location \"Panel Room A\" to convention.".to_string()));
    }

    #[test]
    fn equipment_and_consumable_activity_is_logged() {
        let s = store();
        s.update(
            Table::ConventionEquipment,
            "conveqp-active-3",
            rec(json!({"status": "issued", "issued_by": "user-manager"})),
        )
        .unwrap();
        let logs = s
            .filter(Table::ConventionLogs, &[Condition::eq("user_id", "user-manager")])
            .unwrap();
        assert!(logs
            .iter()
            .any(|l| l.str("log_message") == Some("Changed status of \"Microphone\" from allocated to issued.")));

        s.update(
            Table::ConventionConsumables,
            "convcons-active-1",
            rec(json!({"used_quantity": 4, "used_by": "user-member"})),
        )
        .unwrap();
        assert!(logs_for(&s, "conv-active")
            .contains(&"Recorded usage of 2x \"Badges (Pack of 100)\" (Total used: 4).".to_string()));

        let eq = s
            .insert(
                Table::ConventionEquipment,
                rec(json!({"convention_id": "conv-2", "item_id": "item-4", "quantity": 2, "convention_location_id": "convloc-3"})),
            )
            .unwrap();
        assert!(logs_for(&s, "conv-2").contains(&"Allocated 2x \"Projector\" to Expo Floor.".to_string()));
        s.delete(Table::ConventionEquipment, eq.id().unwrap()).unwrap();
        assert!(logs_for(&s, "conv-2").contains(&"Removed allocation of \"Projector\" from convention.".to_string()));
    }

    #[test]
    fn convention_logs_are_newest_first() {
        let s = store();
        let logs = s.all(Table::ConventionLogs).unwrap();
        let stamps: Vec<_> = logs.iter().filter_map(|l| l.str("created_at")).collect();
        let mut sorted = stamps.clone();
        sorted.sort_by(|a, b| b.cmp(a));
        assert_eq!(stamps, sorted);
    }

    #[test]
    fn reads_return_copies() {
        let s = store();
        let mut rows = s.all(Table::Categories).unwrap();
        rows[0].set("name", "Changed");
        rows.clear();
        assert_eq!(
            s.get(Table::Categories, "cat-1").unwrap().unwrap().str("name"),
            Some("Electronics")
        );
    }
}
