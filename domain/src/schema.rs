//! Table catalogue and the static per-table schemas.
//!
//! Every table the application reads or writes is listed in [`Table`]. Its
//! [`TableSchema`] says which columns exist, which are required on insert,
//! how ids and timestamps are assigned and which values the store forces on
//! insert regardless of what the caller sent.

use std::fmt;
use std::str::FromStr;

use serde_json::Value;

use crate::StoreError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Table {
    Associations,
    Profiles,
    Categories,
    Locations,
    Items,
    Documents,
    AuditLogs,
    Notifications,
    AssociationMembers,
    AssociationInvitations,
    ConventionInvitations,
    Conventions,
    ConventionLocations,
    ConventionEquipment,
    ConventionConsumables,
    ConventionRequirements,
    ConventionAccess,
    ConventionLogs,
    ConventionTemplates,
    EquipmentSets,
    EquipmentSetItems,
    User2fa,
}

impl Table {
    pub const ALL: [Table; 22] = [
        Table::Associations,
        Table::Profiles,
        Table::Categories,
        Table::Locations,
        Table::Items,
        Table::Documents,
        Table::AuditLogs,
        Table::Notifications,
        Table::AssociationMembers,
        Table::AssociationInvitations,
        Table::ConventionInvitations,
        Table::Conventions,
        Table::ConventionLocations,
        Table::ConventionEquipment,
        Table::ConventionConsumables,
        Table::ConventionRequirements,
        Table::ConventionAccess,
        Table::ConventionLogs,
        Table::ConventionTemplates,
        Table::EquipmentSets,
        Table::EquipmentSetItems,
        Table::User2fa,
    ];

    /// Wire name, as used by `from("...")` and in REST paths.
    pub fn as_str(self) -> &'static str {
        match self {
            Table::Associations => "associations",
            Table::Profiles => "profiles",
            Table::Categories => "categories",
            Table::Locations => "locations",
            Table::Items => "items",
            Table::Documents => "documents",
            Table::AuditLogs => "audit_logs",
            Table::Notifications => "notifications",
            Table::AssociationMembers => "association_members",
            Table::AssociationInvitations => "association_invitations",
            Table::ConventionInvitations => "convention_invitations",
            Table::Conventions => "conventions",
            Table::ConventionLocations => "convention_locations",
            Table::ConventionEquipment => "convention_equipment",
            Table::ConventionConsumables => "convention_consumables",
            Table::ConventionRequirements => "convention_requirements",
            Table::ConventionAccess => "convention_access",
            Table::ConventionLogs => "convention_logs",
            Table::ConventionTemplates => "convention_templates",
            Table::EquipmentSets => "equipment_sets",
            Table::EquipmentSetItems => "equipment_set_items",
            Table::User2fa => "user_2fa",
        }
    }

    pub fn parse(name: &str) -> Result<Self, StoreError> {
        Table::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == name)
            .ok_or_else(|| StoreError::UnknownTable(name.to_string()))
    }

    pub fn schema(self) -> &'static TableSchema {
        match self {
            Table::Associations => &ASSOCIATIONS,
            Table::Profiles => &PROFILES,
            Table::Categories => &CATEGORIES,
            Table::Locations => &LOCATIONS,
            Table::Items => &ITEMS,
            Table::Documents => &DOCUMENTS,
            Table::AuditLogs => &AUDIT_LOGS,
            Table::Notifications => &NOTIFICATIONS,
            Table::AssociationMembers => &ASSOCIATION_MEMBERS,
            Table::AssociationInvitations => &ASSOCIATION_INVITATIONS,
            Table::ConventionInvitations => &CONVENTION_INVITATIONS,
            Table::Conventions => &CONVENTIONS,
            Table::ConventionLocations => &CONVENTION_LOCATIONS,
            Table::ConventionEquipment => &CONVENTION_EQUIPMENT,
            Table::ConventionConsumables => &CONVENTION_CONSUMABLES,
            Table::ConventionRequirements => &CONVENTION_REQUIREMENTS,
            Table::ConventionAccess => &CONVENTION_ACCESS,
            Table::ConventionLogs => &CONVENTION_LOGS,
            Table::ConventionTemplates => &CONVENTION_TEMPLATES,
            Table::EquipmentSets => &EQUIPMENT_SETS,
            Table::EquipmentSetItems => &EQUIPMENT_SET_ITEMS,
            Table::User2fa => &USER_2FA,
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Table {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Table::parse(s)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Integer,
    Number,
    Boolean,
    /// Object or array payload (audit `changes`, recovery keys).
    Json,
    Any,
}

impl ColumnKind {
    /// Whether a non-null `value` fits this kind.
    pub fn accepts(self, value: &Value) -> bool {
        match self {
            ColumnKind::Text => value.is_string(),
            ColumnKind::Integer => value.is_i64() || value.is_u64(),
            ColumnKind::Number => value.is_number(),
            ColumnKind::Boolean => value.is_boolean(),
            ColumnKind::Json => value.is_object() || value.is_array(),
            ColumnKind::Any => true,
        }
    }

    /// Type a textual filter operand (a query-string `eq.` value) for this
    /// kind. `null` is null everywhere; an operand that does not parse as the
    /// column's type stays a string and so matches nothing typed.
    pub fn operand(self, raw: &str) -> Value {
        if raw == "null" {
            return Value::Null;
        }
        let text = || Value::String(raw.to_string());
        match self {
            ColumnKind::Text => text(),
            ColumnKind::Integer => raw.parse::<i64>().map(Value::from).unwrap_or_else(|_| text()),
            ColumnKind::Number => raw
                .parse::<i64>()
                .map(Value::from)
                .or_else(|_| raw.parse::<f64>().map(Value::from))
                .unwrap_or_else(|_| text()),
            ColumnKind::Boolean => match raw {
                "true" => Value::Bool(true),
                "false" => Value::Bool(false),
                _ => text(),
            },
            ColumnKind::Json | ColumnKind::Any => match raw {
                "true" => Value::Bool(true),
                "false" => Value::Bool(false),
                _ => raw.parse::<i64>().map(Value::from).unwrap_or_else(|_| text()),
            },
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ColumnKind::Text => "text",
            ColumnKind::Integer => "integer",
            ColumnKind::Number => "number",
            ColumnKind::Boolean => "boolean",
            ColumnKind::Json => "json",
            ColumnKind::Any => "any",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub kind: ColumnKind,
    /// Must be present and non-null on insert.
    pub required: bool,
}

const fn req(name: &'static str, kind: ColumnKind) -> Column {
    Column {
        name,
        kind,
        required: true,
    }
}

const fn opt(name: &'static str, kind: ColumnKind) -> Column {
    Column {
        name,
        kind,
        required: false,
    }
}

/// Which timestamps the store stamps on insert. `update` always refreshes
/// `updated_at`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Timestamps {
    /// `created_at` and `updated_at`.
    Full,
    CreatedOnly,
    Untracked,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IdPolicy {
    /// The store assigns a fresh id, replacing any caller value.
    Generated,
    /// The caller supplies the id; duplicates are rejected.
    Supplied,
}

/// Value forced onto a column at insert time.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum InsertOverride {
    Text(&'static str, &'static str),
    Integer(&'static str, i64),
    Boolean(&'static str, bool),
    Null(&'static str),
    /// Current timestamp.
    Now(&'static str),
}

impl InsertOverride {
    pub fn column(&self) -> &'static str {
        match *self {
            InsertOverride::Text(c, _)
            | InsertOverride::Integer(c, _)
            | InsertOverride::Boolean(c, _)
            | InsertOverride::Null(c)
            | InsertOverride::Now(c) => c,
        }
    }

    pub fn value(&self, now: &str) -> Value {
        match *self {
            InsertOverride::Text(_, s) => Value::from(s),
            InsertOverride::Integer(_, n) => Value::from(n),
            InsertOverride::Boolean(_, b) => Value::from(b),
            InsertOverride::Null(_) => Value::Null,
            InsertOverride::Now(_) => Value::from(now),
        }
    }
}

#[derive(Debug)]
pub struct TableSchema {
    pub table: Table,
    pub columns: &'static [Column],
    pub timestamps: Timestamps,
    pub id_policy: IdPolicy,
    pub overrides: &'static [InsertOverride],
}

impl TableSchema {
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// [`ColumnKind::operand`] for `column`; unknown columns guess.
    pub fn operand(&self, column: &str, raw: &str) -> Value {
        self.column(column)
            .map_or(ColumnKind::Any, |c| c.kind)
            .operand(raw)
    }
}

use ColumnKind::{Any, Boolean, Integer, Json, Number, Text};

// ============ Inventory ============

static ASSOCIATIONS: TableSchema = TableSchema {
    table: Table::Associations,
    columns: &[
        opt("id", Text),
        req("name", Text),
        opt("description", Text),
        opt("contact_email", Text),
        opt("contact_phone", Text),
        opt("website", Text),
        opt("address", Text),
        opt("logo", Text),
        opt("created_at", Text),
        opt("updated_at", Text),
    ],
    timestamps: Timestamps::Full,
    id_policy: IdPolicy::Generated,
    overrides: &[],
};

static PROFILES: TableSchema = TableSchema {
    table: Table::Profiles,
    columns: &[
        req("id", Text),
        req("email", Text),
        opt("name", Text),
        opt("role", Text),
        opt("association_id", Text),
        opt("profile_image", Text),
        opt("two_factor_enabled", Boolean),
        opt("email_confirmed_at", Text),
        opt("created_at", Text),
        opt("updated_at", Text),
    ],
    timestamps: Timestamps::Full,
    id_policy: IdPolicy::Supplied,
    overrides: &[InsertOverride::Now("email_confirmed_at")],
};

static CATEGORIES: TableSchema = TableSchema {
    table: Table::Categories,
    columns: &[
        opt("id", Text),
        req("name", Text),
        opt("description", Text),
        opt("association_id", Text),
        opt("parent_id", Text),
        opt("created_at", Text),
        opt("updated_at", Text),
    ],
    timestamps: Timestamps::Full,
    id_policy: IdPolicy::Generated,
    overrides: &[],
};

static LOCATIONS: TableSchema = TableSchema {
    table: Table::Locations,
    columns: &[
        opt("id", Text),
        req("name", Text),
        opt("description", Text),
        opt("association_id", Text),
        opt("parent_id", Text),
        opt("is_room", Boolean),
        opt("created_at", Text),
        opt("updated_at", Text),
    ],
    timestamps: Timestamps::Full,
    id_policy: IdPolicy::Generated,
    overrides: &[],
};

static ITEMS: TableSchema = TableSchema {
    table: Table::Items,
    columns: &[
        opt("id", Text),
        req("name", Text),
        opt("description", Text),
        opt("serial_number", Text),
        opt("barcode", Text),
        opt("condition", Text),
        opt("category_id", Text),
        opt("location_id", Text),
        opt("association_id", Text),
        opt("quantity", Integer),
        opt("is_consumable", Boolean),
        opt("minimum_quantity", Integer),
        opt("purchase_price", Number),
        opt("purchase_date", Text),
        opt("warranty_expiration", Text),
        opt("notes", Text),
        opt("image", Text),
        opt("created_at", Text),
        opt("updated_at", Text),
    ],
    timestamps: Timestamps::Full,
    id_policy: IdPolicy::Generated,
    overrides: &[],
};

static DOCUMENTS: TableSchema = TableSchema {
    table: Table::Documents,
    columns: &[
        opt("id", Text),
        req("name", Text),
        opt("file_type", Text),
        opt("file_url", Text),
        opt("item_id", Text),
        opt("uploaded_by", Text),
        opt("created_at", Text),
        opt("updated_at", Text),
    ],
    timestamps: Timestamps::Full,
    id_policy: IdPolicy::Generated,
    overrides: &[],
};

static EQUIPMENT_SETS: TableSchema = TableSchema {
    table: Table::EquipmentSets,
    columns: &[
        opt("id", Text),
        req("name", Text),
        opt("description", Text),
        opt("association_id", Text),
        opt("created_at", Text),
        opt("updated_at", Text),
    ],
    timestamps: Timestamps::Full,
    id_policy: IdPolicy::Generated,
    overrides: &[],
};

static EQUIPMENT_SET_ITEMS: TableSchema = TableSchema {
    table: Table::EquipmentSetItems,
    columns: &[
        opt("id", Text),
        req("set_id", Text),
        req("item_id", Text),
        opt("quantity", Integer),
        opt("updated_at", Text),
    ],
    timestamps: Timestamps::Untracked,
    id_policy: IdPolicy::Generated,
    overrides: &[],
};

// ============ Accounts ============

static AUDIT_LOGS: TableSchema = TableSchema {
    table: Table::AuditLogs,
    columns: &[
        opt("id", Text),
        req("action", Text),
        opt("entity", Text),
        opt("entity_id", Text),
        opt("user_id", Text),
        opt("changes", Json),
        opt("ip_address", Text),
        opt("created_at", Text),
        opt("updated_at", Text),
    ],
    timestamps: Timestamps::CreatedOnly,
    id_policy: IdPolicy::Generated,
    overrides: &[],
};

static NOTIFICATIONS: TableSchema = TableSchema {
    table: Table::Notifications,
    columns: &[
        opt("id", Text),
        req("user_id", Text),
        opt("title", Text),
        opt("message", Text),
        opt("read", Boolean),
        opt("link", Text),
        opt("created_at", Text),
        opt("updated_at", Text),
    ],
    timestamps: Timestamps::CreatedOnly,
    id_policy: IdPolicy::Generated,
    overrides: &[InsertOverride::Boolean("read", false)],
};

static ASSOCIATION_MEMBERS: TableSchema = TableSchema {
    table: Table::AssociationMembers,
    columns: &[
        opt("id", Text),
        req("user_id", Text),
        req("association_id", Text),
        opt("updated_at", Text),
    ],
    timestamps: Timestamps::Untracked,
    id_policy: IdPolicy::Generated,
    overrides: &[],
};

static ASSOCIATION_INVITATIONS: TableSchema = TableSchema {
    table: Table::AssociationInvitations,
    columns: &[
        opt("id", Text),
        req("code", Text),
        opt("association_id", Text),
        opt("role", Text),
        opt("created_by", Text),
        opt("used", Boolean),
        opt("used_by", Text),
        opt("used_at", Text),
        opt("created_at", Text),
        opt("updated_at", Text),
    ],
    timestamps: Timestamps::CreatedOnly,
    id_policy: IdPolicy::Generated,
    overrides: &[
        InsertOverride::Boolean("used", false),
        InsertOverride::Null("used_by"),
        InsertOverride::Null("used_at"),
    ],
};

static USER_2FA: TableSchema = TableSchema {
    table: Table::User2fa,
    columns: &[
        opt("id", Text),
        req("user_id", Text),
        opt("secret", Text),
        opt("recovery_keys", Json),
        opt("is_enabled", Boolean),
        opt("created_at", Text),
        opt("updated_at", Text),
    ],
    timestamps: Timestamps::Full,
    id_policy: IdPolicy::Generated,
    overrides: &[InsertOverride::Boolean("is_enabled", true)],
};

// ============ Conventions ============

static CONVENTIONS: TableSchema = TableSchema {
    table: Table::Conventions,
    columns: &[
        opt("id", Text),
        req("name", Text),
        opt("description", Text),
        opt("start_date", Text),
        opt("end_date", Text),
        opt("status", Text),
        opt("location", Text),
        opt("association_id", Text),
        opt("created_by", Text),
        opt("created_at", Text),
        opt("updated_at", Text),
    ],
    timestamps: Timestamps::Full,
    id_policy: IdPolicy::Generated,
    overrides: &[],
};

static CONVENTION_INVITATIONS: TableSchema = TableSchema {
    table: Table::ConventionInvitations,
    columns: &[
        opt("id", Text),
        req("code", Text),
        opt("convention_id", Text),
        opt("role", Text),
        opt("created_by", Text),
        opt("uses_remaining", Integer),
        opt("expires_at", Text),
        opt("created_at", Text),
        opt("updated_at", Text),
    ],
    timestamps: Timestamps::CreatedOnly,
    id_policy: IdPolicy::Generated,
    overrides: &[],
};

static CONVENTION_LOCATIONS: TableSchema = TableSchema {
    table: Table::ConventionLocations,
    columns: &[
        opt("id", Text),
        req("convention_id", Text),
        opt("location_id", Text),
        opt("name_override", Text),
        opt("description_override", Text),
        opt("created_at", Text),
        opt("updated_at", Text),
    ],
    timestamps: Timestamps::CreatedOnly,
    id_policy: IdPolicy::Generated,
    overrides: &[],
};

static CONVENTION_EQUIPMENT: TableSchema = TableSchema {
    table: Table::ConventionEquipment,
    columns: &[
        opt("id", Text),
        req("convention_id", Text),
        req("item_id", Text),
        opt("quantity", Integer),
        opt("convention_location_id", Text),
        opt("status", Text),
        opt("issued_by", Text),
        opt("issued_at", Text),
        opt("returned_by", Text),
        opt("returned_at", Text),
        opt("notes", Text),
        opt("created_at", Text),
        opt("updated_at", Text),
    ],
    timestamps: Timestamps::Full,
    id_policy: IdPolicy::Generated,
    overrides: &[InsertOverride::Text("status", "allocated")],
};

static CONVENTION_CONSUMABLES: TableSchema = TableSchema {
    table: Table::ConventionConsumables,
    columns: &[
        opt("id", Text),
        req("convention_id", Text),
        req("item_id", Text),
        opt("allocated_quantity", Integer),
        opt("used_quantity", Integer),
        opt("convention_location_id", Text),
        opt("used_by", Text),
        opt("created_at", Text),
        opt("updated_at", Text),
    ],
    timestamps: Timestamps::Full,
    id_policy: IdPolicy::Generated,
    overrides: &[InsertOverride::Integer("used_quantity", 0)],
};

static CONVENTION_REQUIREMENTS: TableSchema = TableSchema {
    table: Table::ConventionRequirements,
    columns: &[
        opt("id", Text),
        req("convention_id", Text),
        opt("description", Text),
        opt("status", Text),
        opt("assigned_to", Text),
        opt("due_date", Text),
        opt("created_at", Text),
        opt("updated_at", Text),
    ],
    timestamps: Timestamps::CreatedOnly,
    id_policy: IdPolicy::Generated,
    overrides: &[InsertOverride::Text("status", "pending")],
};

static CONVENTION_ACCESS: TableSchema = TableSchema {
    table: Table::ConventionAccess,
    columns: &[
        opt("id", Text),
        req("convention_id", Text),
        req("user_id", Text),
        opt("role", Text),
        opt("created_at", Text),
        opt("updated_at", Text),
    ],
    timestamps: Timestamps::CreatedOnly,
    id_policy: IdPolicy::Generated,
    overrides: &[],
};

static CONVENTION_LOGS: TableSchema = TableSchema {
    table: Table::ConventionLogs,
    columns: &[
        opt("id", Text),
        req("convention_id", Text),
        opt("user_id", Text),
        req("log_message", Text),
        opt("created_at", Text),
        opt("updated_at", Text),
    ],
    timestamps: Timestamps::CreatedOnly,
    id_policy: IdPolicy::Generated,
    overrides: &[],
};

static CONVENTION_TEMPLATES: TableSchema = TableSchema {
    table: Table::ConventionTemplates,
    columns: &[
        opt("id", Text),
        req("name", Text),
        opt("description", Text),
        opt("association_id", Text),
        opt("created_by", Text),
        opt("configuration", Any),
        opt("created_at", Text),
        opt("updated_at", Text),
    ],
    timestamps: Timestamps::Full,
    id_policy: IdPolicy::Generated,
    overrides: &[],
};
