//! Demo data set loaded by [`super::memory_store::InMemoryStore::seeded`].
//!
//! Dates are expressed relative to the seeding instant so that "active" and
//! "upcoming" conventions stay meaningful whenever the store is built.

use std::time::SystemTime;

use serde_json::{json, Value};

use crate::time::{format_timestamp, offset_millis};
use crate::{Record, Table};

const MINUTE: i64 = 60 * 1000;
const HOUR: i64 = 60 * MINUTE;
const DAY: i64 = 24 * HOUR;

fn rows(values: Vec<Value>) -> Vec<Record> {
    values
        .into_iter()
        .filter_map(|v| match v {
            Value::Object(map) => Some(Record::from(map)),
            _ => None,
        })
        .collect()
}

/// Every seeded table with its rows, in table order.
pub fn demo_data(now: SystemTime) -> Vec<(Table, Vec<Record>)> {
    let at = |offset: i64| format_timestamp(offset_millis(now, offset));
    let t = at(0);

    vec![
        (
            Table::Associations,
            rows(vec![json!({
                "id": "assoc-1", "name": "Demo Association",
                "description": "A sample association for the demo.",
                "contact_email": "demo@example.com", "contact_phone": "123-456-7890",
                "website": "https://example.com", "address": "123 Demo St",
                "created_at": t, "updated_at": t
            })]),
        ),
        (
            Table::Profiles,
            rows(vec![
                json!({"id": "user-admin", "name": "Admin User", "email": "admin@konbase.cfd", "role": "system_admin",
                       "association_id": "assoc-1", "profile_image": null, "two_factor_enabled": false,
                       "email_confirmed_at": t, "created_at": t, "updated_at": t}),
                json!({"id": "user-manager", "name": "Manager User", "email": "manager@konbase.cfd", "role": "manager",
                       "association_id": "assoc-1", "profile_image": null, "two_factor_enabled": false,
                       "email_confirmed_at": t, "created_at": t, "updated_at": t}),
                json!({"id": "user-member", "name": "Member User", "email": "member@konbase.cfd", "role": "member",
                       "association_id": "assoc-1", "profile_image": null, "two_factor_enabled": false,
                       "email_confirmed_at": t, "created_at": t, "updated_at": t}),
            ]),
        ),
        (
            Table::Categories,
            rows(vec![
                json!({"id": "cat-1", "name": "Electronics", "description": "Electronic devices", "association_id": "assoc-1", "parent_id": null, "created_at": t, "updated_at": t}),
                json!({"id": "cat-2", "name": "Furniture", "description": "Office furniture", "association_id": "assoc-1", "parent_id": null, "created_at": t, "updated_at": t}),
                json!({"id": "cat-3", "name": "AV Equipment", "description": "Audio/Visual gear", "association_id": "assoc-1", "parent_id": null, "created_at": t, "updated_at": t}),
                json!({"id": "cat-4", "name": "Cables", "description": "Various cables", "association_id": "assoc-1", "parent_id": "cat-1", "created_at": t, "updated_at": t}),
                json!({"id": "cat-5", "name": "Stationery", "description": "Office supplies", "association_id": "assoc-1", "parent_id": null, "created_at": t, "updated_at": t}),
            ]),
        ),
        (
            Table::Locations,
            rows(vec![
                json!({"id": "loc-1", "name": "Main Office", "description": "Primary office space", "association_id": "assoc-1", "parent_id": null, "is_room": false, "created_at": t, "updated_at": t}),
                json!({"id": "loc-2", "name": "Storage Room", "description": "Storage area", "association_id": "assoc-1", "parent_id": "loc-1", "is_room": true, "created_at": t, "updated_at": t}),
                json!({"id": "loc-3", "name": "Conference Hall", "description": "Large event space", "association_id": "assoc-1", "parent_id": null, "is_room": false, "created_at": t, "updated_at": t}),
                json!({"id": "loc-4", "name": "Panel Room A", "description": "Small presentation room", "association_id": "assoc-1", "parent_id": "loc-3", "is_room": true, "created_at": t, "updated_at": t}),
                json!({"id": "loc-5", "name": "Booth Area 1", "description": "Exhibitor booth space", "association_id": "assoc-1", "parent_id": "loc-3", "is_room": false, "created_at": t, "updated_at": t}),
            ]),
        ),
        (Table::Items, items(&t)),
        (
            Table::Documents,
            rows(vec![json!({
                "id": "doc-1", "name": "Laptop Warranty", "file_type": "application/pdf",
                "file_url": "/docs/placeholder.pdf", "item_id": "item-1", "uploaded_by": "user-admin",
                "created_at": t, "updated_at": t
            })]),
        ),
        (
            Table::AuditLogs,
            rows(vec![json!({
                "id": "log-1", "action": "login", "entity": "auth", "entity_id": "user-admin",
                "user_id": "user-admin", "changes": {"ip": "127.0.0.1"}, "ip_address": "127.0.0.1",
                "created_at": t
            })]),
        ),
        (
            Table::Notifications,
            rows(vec![
                json!({"id": "notif-1", "user_id": "user-admin", "title": "Welcome!", "message": "Welcome to the KonBase demo.",
                       "read": false, "created_at": at(-MINUTE), "link": "/dashboard"}),
                json!({"id": "notif-2", "user_id": "user-manager", "title": "New Item Added", "message": "A new Laptop was added to inventory.",
                       "read": true, "created_at": at(-2 * MINUTE), "link": "/inventory/items"}),
                json!({"id": "notif-3", "user_id": "user-admin", "title": "Low Stock Alert", "message": "Keyboards are running low (3 remaining).",
                       "read": false, "created_at": t, "link": "/inventory/items/item-3"}),
            ]),
        ),
        (
            Table::AssociationMembers,
            rows(vec![
                json!({"id": "assocmem-1", "user_id": "user-admin", "association_id": "assoc-1"}),
                json!({"id": "assocmem-2", "user_id": "user-manager", "association_id": "assoc-1"}),
                json!({"id": "assocmem-3", "user_id": "user-member", "association_id": "assoc-1"}),
            ]),
        ),
        (
            Table::AssociationInvitations,
            rows(vec![
                json!({"id": "inv-assoc-1", "code": "ASSOC123", "association_id": "assoc-1", "role": "member", "created_by": "user-admin",
                       "used": false, "used_by": null, "used_at": null, "created_at": t}),
                json!({"id": "inv-assoc-2", "code": "ASSOCMGR", "association_id": "assoc-1", "role": "manager", "created_by": "user-admin",
                       "used": false, "used_by": null, "used_at": null, "created_at": t}),
            ]),
        ),
        (
            Table::ConventionInvitations,
            rows(vec![
                json!({"id": "inv-conv-1", "code": "CONV123", "convention_id": "conv-1", "role": "member", "created_by": "user-manager",
                       "uses_remaining": 10, "expires_at": at(7 * DAY), "created_at": t}),
                json!({"id": "inv-conv-2", "code": "CONVVIP", "convention_id": "conv-1", "role": "manager", "created_by": "user-manager",
                       "uses_remaining": 1, "expires_at": at(3 * DAY), "created_at": t}),
                json!({"id": "inv-conv-3", "code": "EXPOPASS", "convention_id": "conv-2", "role": "member", "created_by": "user-manager",
                       "uses_remaining": 50, "expires_at": at(60 * DAY), "created_at": t}),
            ]),
        ),
        (
            Table::Conventions,
            rows(vec![
                json!({"id": "conv-1", "name": "Annual Demo Con 2024", "description": "The main demonstration convention for the year.",
                       "start_date": at(30 * DAY), "end_date": at(33 * DAY), "status": "planning", "association_id": "assoc-1",
                       "created_by": "user-manager", "created_at": t, "updated_at": t}),
                json!({"id": "conv-active", "name": "KonBase Live Demo Event", "description": "Currently active convention for demonstration.",
                       "start_date": at(-DAY), "end_date": at(2 * DAY), "status": "active", "association_id": "assoc-1",
                       "created_by": "user-admin", "created_at": at(-5 * DAY), "updated_at": t}),
                json!({"id": "conv-2", "name": "Summer Tech Expo", "description": "Showcasing new technology.",
                       "start_date": at(90 * DAY), "end_date": at(92 * DAY), "status": "planning", "association_id": "assoc-1",
                       "created_by": "user-manager", "created_at": t, "updated_at": t}),
                json!({"id": "conv-archived", "name": "Past Con 2023", "description": "An archived convention.",
                       "start_date": at(-365 * DAY), "end_date": at(-362 * DAY), "status": "archived", "association_id": "assoc-1",
                       "created_by": "user-manager", "created_at": at(-400 * DAY), "updated_at": at(-360 * DAY)}),
            ]),
        ),
        (
            Table::ConventionLocations,
            rows(vec![
                json!({"id": "convloc-1", "convention_id": "conv-1", "location_id": "loc-3", "name_override": "Main Hall", "description_override": "Primary convention area", "created_at": t}),
                json!({"id": "convloc-2", "convention_id": "conv-1", "location_id": "loc-4", "name_override": "Panel Room A", "description_override": "Booth for tech support", "created_at": t}),
                json!({"id": "convloc-3", "convention_id": "conv-2", "location_id": "loc-3", "name_override": "Expo Floor", "description_override": null, "created_at": t}),
                json!({"id": "convloc-active-1", "convention_id": "conv-active", "location_id": "loc-3", "name_override": "Live Demo Hall", "description_override": "Main stage and demo area", "created_at": t}),
                json!({"id": "convloc-active-2", "convention_id": "conv-active", "location_id": "loc-4", "name_override": "Workshop Room", "description_override": "Hands-on sessions", "created_at": t}),
                json!({"id": "convloc-active-3", "convention_id": "conv-active", "location_id": "loc-5", "name_override": "Info Booth", "description_override": "Information and support", "created_at": t}),
                json!({"id": "convloc-active-storage", "convention_id": "conv-active", "location_id": "loc-2", "name_override": "On-Site Storage", "description_override": "Temporary storage during event", "created_at": t}),
            ]),
        ),
        (Table::ConventionEquipment, convention_equipment(&t, &at)),
        (
            Table::ConventionConsumables,
            rows(vec![
                json!({"id": "convcons-1", "convention_id": "conv-1", "item_id": "item-5", "allocated_quantity": 10, "used_quantity": 0,
                       "convention_location_id": "convloc-2", "created_at": t, "updated_at": t}),
                json!({"id": "convcons-active-1", "convention_id": "conv-active", "item_id": "item-7", "allocated_quantity": 5, "used_quantity": 2,
                       "convention_location_id": "convloc-active-3", "created_at": t, "updated_at": t}),
                json!({"id": "convcons-active-2", "convention_id": "conv-active", "item_id": "item-5", "allocated_quantity": 5, "used_quantity": 1,
                       "convention_location_id": "convloc-active-1", "created_at": t, "updated_at": t}),
            ]),
        ),
        (
            Table::ConventionRequirements,
            rows(vec![
                json!({"id": "convreq-1", "convention_id": "conv-1", "description": "Need 2 projectors", "status": "pending",
                       "assigned_to": "user-manager", "due_date": at(15 * DAY), "created_at": t}),
                json!({"id": "convreq-active-1", "convention_id": "conv-active", "description": "Set up main stage AV", "status": "completed",
                       "assigned_to": "user-admin", "due_date": at(-2 * DAY), "created_at": t}),
                json!({"id": "convreq-active-2", "convention_id": "conv-active", "description": "Prepare workshop materials", "status": "in_progress",
                       "assigned_to": "user-manager", "due_date": at(DAY), "created_at": t}),
                json!({"id": "convreq-active-3", "convention_id": "conv-active", "description": "Arrange signage", "status": "pending",
                       "assigned_to": null, "due_date": at(DAY / 2), "created_at": t}),
            ]),
        ),
        (
            Table::ConventionAccess,
            rows(vec![
                json!({"id": "convacc-1", "convention_id": "conv-1", "user_id": "user-manager", "role": "manager", "created_at": t}),
                json!({"id": "convacc-2", "convention_id": "conv-1", "user_id": "user-member", "role": "member", "created_at": t}),
                json!({"id": "convacc-3", "convention_id": "conv-2", "user_id": "user-manager", "role": "manager", "created_at": t}),
                json!({"id": "convacc-active-1", "convention_id": "conv-active", "user_id": "user-admin", "role": "manager", "created_at": t}),
                json!({"id": "convacc-active-2", "convention_id": "conv-active", "user_id": "user-manager", "role": "member", "created_at": t}),
                json!({"id": "convacc-active-3", "convention_id": "conv-active", "user_id": "user-member", "role": "member", "created_at": t}),
            ]),
        ),
        (
            Table::ConventionLogs,
            rows(vec![
                json!({"id": "convlog-1", "convention_id": "conv-1", "user_id": "user-manager", "log_message": "Created convention.", "created_at": t}),
                json!({"id": "convlog-2", "convention_id": "conv-1", "user_id": "user-manager", "log_message": "Allocated 1x \"Laptop\" to Main Hall.", "created_at": t}),
                json!({"id": "convlog-active-1", "convention_id": "conv-active", "user_id": "user-admin",
                       "log_message": "Created convention \"KonBase Live Demo Event\".", "created_at": at(-5 * DAY)}),
                json!({"id": "convlog-active-2", "convention_id": "conv-active", "user_id": "user-admin",
                       "log_message": "Changed status of \"Laptop\" from allocated to issued.", "created_at": at(-12 * HOUR)}),
                json!({"id": "convlog-active-3", "convention_id": "conv-active", "user_id": "user-admin",
                       "log_message": "Changed status of \"Projector\" from allocated to issued.", "created_at": at(-10 * HOUR)}),
                json!({"id": "convlog-active-4", "convention_id": "conv-active", "user_id": "user-manager",
                       "log_message": "Updated requirement \"Prepare workshop materials\" status to in_progress.", "created_at": at(-2 * HOUR)}),
                json!({"id": "convlog-active-5", "convention_id": "conv-active", "user_id": "user-member",
                       "log_message": "Recorded usage of 1x \"Badges (Pack of 100)\" (Total used: 2).", "created_at": at(-HOUR)}),
            ]),
        ),
        (
            Table::ConventionTemplates,
            rows(vec![json!({
                "id": "convtmpl-1", "name": "Standard Conference Template", "description": "Basic template for conferences",
                "association_id": "assoc-1", "created_by": "user-admin", "created_at": t, "updated_at": t
            })]),
        ),
        (
            Table::EquipmentSets,
            rows(vec![
                json!({"id": "set-1", "name": "Standard Panel Room Kit", "description": "Basic AV setup for a panel room",
                       "association_id": "assoc-1", "created_at": t, "updated_at": t}),
                json!({"id": "set-2", "name": "Registration Desk Kit", "description": "Laptop, printer, badge supplies",
                       "association_id": "assoc-1", "created_at": t, "updated_at": t}),
            ]),
        ),
        (
            Table::EquipmentSetItems,
            rows(vec![
                json!({"id": "setitem-1", "set_id": "set-1", "item_id": "item-4", "quantity": 1}),
                json!({"id": "setitem-2", "set_id": "set-1", "item_id": "item-6", "quantity": 2}),
                json!({"id": "setitem-3", "set_id": "set-1", "item_id": "item-5", "quantity": 2}),
                json!({"id": "setitem-4", "set_id": "set-2", "item_id": "item-1", "quantity": 1}),
                json!({"id": "setitem-5", "set_id": "set-2", "item_id": "item-7", "quantity": 2}),
            ]),
        ),
        (Table::User2fa, Vec::new()),
    ]
}

fn items(t: &str) -> Vec<Record> {
    let item = |id: &str,
                name: &str,
                description: &str,
                serial: Option<&str>,
                barcode: &str,
                condition: &str,
                category: &str,
                location: &str,
                quantity: i64,
                consumable: bool,
                minimum: Option<i64>,
                price: i64,
                purchased: &str,
                warranty: Option<&str>,
                notes: Option<&str>| {
        json!({
            "id": id, "name": name, "description": description, "serial_number": serial,
            "barcode": barcode, "condition": condition, "category_id": category,
            "location_id": location, "association_id": "assoc-1", "quantity": quantity,
            "is_consumable": consumable, "minimum_quantity": minimum, "purchase_price": price,
            "purchase_date": purchased, "warranty_expiration": warranty, "notes": notes,
            "created_at": t, "updated_at": t, "image": null
        })
    };
    rows(vec![
        item("item-1", "Laptop", "Standard issue laptop", Some("LAP123"), "BC123", "good", "cat-1", "loc-1",
             1, false, None, 1200, "2023-01-15", Some("2026-01-15"), Some("Assigned to Admin")),
        item("item-2", "Office Chair", "Ergonomic chair", None, "BC456", "new", "cat-2", "loc-1",
             1, false, None, 300, "2023-02-20", None, None),
        item("item-3", "Keyboard", "Wireless Keyboard", Some("KB789"), "BC789", "good", "cat-1", "loc-2",
             5, true, Some(2), 75, "2023-03-10", None, Some("Spare keyboards")),
        item("item-4", "Projector", "HD Projector", Some("PROJ456"), "BCPROJ", "good", "cat-3", "loc-2",
             3, false, None, 800, "2023-04-01", Some("2025-04-01"), Some("Includes remote")),
        item("item-5", "HDMI Cable (10m)", "Long HDMI cable", None, "BCHDMI10", "new", "cat-4", "loc-2",
             20, true, Some(5), 15, "2023-05-01", None, None),
        item("item-6", "Microphone", "Wireless handheld mic", Some("MIC789"), "BCMIC", "good", "cat-3", "loc-2",
             4, false, None, 250, "2023-06-01", None, Some("Requires AA batteries")),
        item("item-7", "Badges (Pack of 100)", "Blank attendee badges", None, "BCBADGE", "new", "cat-5", "loc-1",
             10, true, Some(2), 20, "2023-07-01", None, Some("Standard size")),
    ])
}

fn convention_equipment(t: &str, at: &dyn Fn(i64) -> String) -> Vec<Record> {
    let allocation = |id: &str,
                      convention: &str,
                      item: &str,
                      quantity: i64,
                      location: &str,
                      issued_at: Option<String>,
                      notes: &str| {
        let issued = issued_at.is_some();
        json!({
            "id": id, "convention_id": convention, "item_id": item, "quantity": quantity,
            "convention_location_id": location,
            "status": if issued { "issued" } else { "allocated" },
            "issued_by": if issued { Some("user-admin") } else { None },
            "issued_at": issued_at,
            "returned_by": null, "returned_at": null, "notes": notes,
            "created_at": t, "updated_at": t
        })
    };
    rows(vec![
        allocation("conveqp-1", "conv-1", "item-1", 1, "convloc-1", None, "For registration desk"),
        allocation("conveqp-2", "conv-1", "item-4", 2, "convloc-2", None, "For Panel Room A"),
        allocation("conveqp-active-1", "conv-active", "item-1", 1, "convloc-active-3", Some(at(-12 * HOUR)), "Info Booth Laptop"),
        allocation("conveqp-active-2", "conv-active", "item-4", 1, "convloc-active-1", Some(at(-10 * HOUR)), "Main Stage Projector"),
        allocation("conveqp-active-3", "conv-active", "item-6", 2, "convloc-active-1", None, "Stage Microphones"),
        allocation("conveqp-active-4", "conv-active", "item-2", 5, "convloc-active-2", None, "Workshop Chairs"),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::validate_insert;
    use std::collections::HashSet;

    #[test]
    fn fixture_rows_satisfy_their_schemas() {
        for (table, rows) in demo_data(SystemTime::now()) {
            let mut ids = HashSet::new();
            for row in &rows {
                validate_insert(table, row).unwrap_or_else(|e| panic!("{}: {}", table, e));
                assert!(ids.insert(row.id().unwrap().to_string()), "duplicate id in {}", table);
            }
        }
    }

    #[test]
    fn fixture_counts() {
        let data = demo_data(SystemTime::now());
        let count = |t: Table| data.iter().find(|(x, _)| *x == t).map(|(_, r)| r.len());
        assert_eq!(count(Table::Profiles), Some(3));
        assert_eq!(count(Table::Items), Some(7));
        assert_eq!(count(Table::Conventions), Some(4));
        assert_eq!(count(Table::EquipmentSetItems), Some(5));
        assert_eq!(data.len(), Table::ALL.len());
    }
}
