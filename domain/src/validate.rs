//! Schema checks applied at the store boundary. Keep logic minimal and
//! deterministic; no coercion is performed.

use crate::{Record, StoreError, Table};

/// Validate a row about to be inserted into `table`.
///
/// Unknown columns are rejected, required columns must be present and
/// non-null, and every non-null value must match its column kind.
pub fn validate_insert(table: Table, data: &Record) -> Result<(), StoreError> {
    check_columns(table, data)?;
    let schema = table.schema();
    for col in schema.columns.iter().filter(|c| c.required) {
        match data.get(col.name) {
            None | Some(serde_json::Value::Null) => {
                return Err(invalid(table, format!("missing required column '{}'", col.name)));
            }
            Some(_) => {}
        }
    }
    Ok(())
}

/// Validate a partial update of row `id` in `table`.
pub fn validate_patch(table: Table, id: &str, patch: &Record) -> Result<(), StoreError> {
    check_columns(table, patch)?;
    if let Some(v) = patch.get("id") {
        if v.as_str() != Some(id) {
            return Err(invalid(table, "id cannot be changed".to_string()));
        }
    }
    Ok(())
}

fn check_columns(table: Table, data: &Record) -> Result<(), StoreError> {
    let schema = table.schema();
    for (name, value) in data.iter() {
        let Some(col) = schema.column(name) else {
            return Err(invalid(table, format!("unknown column '{}'", name)));
        };
        if value.is_null() {
            if col.required {
                return Err(invalid(table, format!("column '{}' cannot be null", name)));
            }
            continue;
        }
        if !col.kind.accepts(value) {
            return Err(invalid(
                table,
                format!("column '{}' expects {}", name, col.kind.name()),
            ));
        }
    }
    Ok(())
}

fn invalid(table: Table, message: String) -> StoreError {
    StoreError::Validation { table, message }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rec(v: serde_json::Value) -> Record {
        Record::try_from(v).unwrap()
    }

    #[test]
    fn insert_validation_basic() {
        assert!(validate_insert(Table::Items, &rec(json!({"name": "Tent", "quantity": 2}))).is_ok());
        // missing name
        assert!(validate_insert(Table::Items, &rec(json!({"quantity": 2}))).is_err());
        // wrong kind
        assert!(validate_insert(Table::Items, &rec(json!({"name": "Tent", "quantity": "2"}))).is_err());
        // null is fine for optional columns
        assert!(validate_insert(Table::Items, &rec(json!({"name": "Tent", "notes": null}))).is_ok());
    }

    #[test]
    fn unknown_columns_are_rejected() {
        let err = validate_insert(Table::Categories, &rec(json!({"name": "x", "colour": "red"})))
            .unwrap_err();
        assert_eq!(
            err,
            StoreError::Validation {
                table: Table::Categories,
                message: "unknown column 'colour'".into()
            }
        );
    }

    #[test]
    fn patch_may_repeat_but_not_change_id() {
        let same = rec(json!({"id": "item-3", "quantity": 3}));
        assert!(validate_patch(Table::Items, "item-3", &same).is_ok());
        let other = rec(json!({"id": "item-4"}));
        assert!(validate_patch(Table::Items, "item-3", &other).is_err());
    }

    #[test]
    fn patch_cannot_null_required_columns() {
        assert!(validate_patch(Table::Items, "item-3", &rec(json!({"name": null}))).is_err());
        assert!(validate_patch(Table::Items, "item-3", &rec(json!({"notes": null}))).is_ok());
    }
}
