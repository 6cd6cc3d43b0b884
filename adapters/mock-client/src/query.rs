//! Chainable query builder over the record store.
//!
//! A builder collects an operation, filters and modifiers; nothing touches
//! the store until [`QueryBuilder::execute`] is awaited.

use std::sync::Arc;

use domain::filter::{apply_in, apply_or, parse_or_filter, sort_rows};
use domain::{Condition, Record, RecordStore, Table};
use mock_auth::pause;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::{ClientError, MockClient};

const SQL_LOG_CHARS: usize = 100;

/// Result payload: nothing, a single row (`single()`), or a list of rows.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Data {
    #[default]
    None,
    Row(Record),
    Rows(Vec<Record>),
}

impl Data {
    pub fn is_none(&self) -> bool {
        matches!(self, Data::None)
    }

    /// Rows regardless of shape; `None` yields an empty list.
    pub fn rows(&self) -> Vec<&Record> {
        match self {
            Data::None => Vec::new(),
            Data::Row(r) => vec![r],
            Data::Rows(rs) => rs.iter().collect(),
        }
    }

    pub fn row(&self) -> Option<&Record> {
        match self {
            Data::None => None,
            Data::Row(r) => Some(r),
            Data::Rows(rs) => rs.first(),
        }
    }

    pub fn into_value(self) -> Value {
        match self {
            Data::None => Value::Null,
            Data::Row(r) => r.into_value(),
            Data::Rows(rs) => Value::Array(rs.into_iter().map(Value::from).collect()),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Response {
    pub data: Data,
    /// Row count after filtering; only set for selects.
    pub count: Option<usize>,
}

#[derive(Clone, Debug)]
enum Operation {
    Select,
    Insert(Value),
    Update(Value),
    Delete,
    Upsert { data: Value, on_conflict: String },
    Rpc { name: String, params: Value },
}

impl Operation {
    fn name(&self) -> &'static str {
        match self {
            Operation::Select => "select",
            Operation::Insert(_) => "insert",
            Operation::Update(_) => "update",
            Operation::Delete => "delete",
            Operation::Upsert { .. } => "upsert",
            Operation::Rpc { .. } => "rpc",
        }
    }
}

#[must_use = "a query does nothing until `execute()` is awaited"]
pub struct QueryBuilder {
    client: MockClient,
    table: String,
    op: Operation,
    columns: Option<Vec<String>>,
    filters: Vec<Condition>,
    or_filter: Option<String>,
    in_filter: Option<(String, Vec<Value>)>,
    order: Option<(String, bool)>,
    limit: Option<usize>,
    single: bool,
}

impl QueryBuilder {
    pub(crate) fn table(client: MockClient, table: &str) -> Self {
        Self::with_op(client, table, Operation::Select)
    }

    pub(crate) fn rpc(client: MockClient, name: &str, params: Value) -> Self {
        let op = Operation::Rpc {
            name: name.to_string(),
            params,
        };
        Self::with_op(client, "", op)
    }

    fn with_op(client: MockClient, table: &str, op: Operation) -> Self {
        Self {
            client,
            table: table.to_string(),
            op,
            columns: None,
            filters: Vec::new(),
            or_filter: None,
            in_filter: None,
            order: None,
            limit: None,
            single: false,
        }
    }

    /// Column list to return, e.g. `"id,name"`. `*` keeps every column and
    /// embedded resources such as `category:categories(name)` are ignored.
    /// Does not change the operation.
    pub fn select(mut self, columns: &str) -> Self {
        let cols: Vec<String> = columns
            .split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty() && !c.contains('('))
            .map(str::to_string)
            .collect();
        self.columns = if cols.is_empty() || cols.iter().any(|c| c == "*") {
            None
        } else {
            Some(cols)
        };
        self
    }

    /// Object or array of objects.
    pub fn insert(mut self, data: Value) -> Self {
        self.op = Operation::Insert(data);
        self
    }

    pub fn update(mut self, patch: Value) -> Self {
        self.op = Operation::Update(patch);
        self
    }

    pub fn delete(mut self) -> Self {
        self.op = Operation::Delete;
        self
    }

    /// Update the row whose `on_conflict` column matches `data`, or insert
    /// it when none does. `on_conflict` defaults to `id`.
    pub fn upsert(mut self, data: Value, on_conflict: Option<&str>) -> Self {
        self.op = Operation::Upsert {
            data,
            on_conflict: on_conflict.unwrap_or("id").to_string(),
        };
        self
    }

    pub fn eq(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Condition::eq(column, value));
        self
    }

    /// PostgREST-style OR expression, e.g.
    /// `"name.ilike.%cable%,description.ilike.%cable%"`.
    pub fn or(mut self, filter: &str) -> Self {
        self.or_filter = Some(filter.to_string());
        self
    }

    pub fn in_(mut self, column: &str, values: Vec<Value>) -> Self {
        self.in_filter = Some((column.to_string(), values));
        self
    }

    pub fn order(mut self, column: &str, ascending: bool) -> Self {
        self.order = Some((column.to_string(), ascending));
        self
    }

    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    pub fn single(mut self) -> Self {
        self.single = true;
        self
    }

    pub async fn execute(self) -> Result<Response, ClientError> {
        pause(self.client.config().query_latency).await;
        debug!(table = %self.table, op = self.op.name(), "execute");

        if let Operation::Rpc { name, params } = &self.op {
            return Ok(run_rpc(name, params));
        }

        let table = Table::parse(&self.table)?;
        let handle = Arc::clone(self.client.store());
        let store: &dyn RecordStore = &*handle;
        match self.op.clone() {
            Operation::Select => self.run_select(store, table),
            Operation::Insert(data) => self.run_insert(store, table, data),
            Operation::Update(patch) => self.run_update(store, table, patch),
            Operation::Delete => self.run_delete(store, table),
            Operation::Upsert { data, on_conflict } => {
                self.run_upsert(store, table, data, on_conflict)
            }
            Operation::Rpc { .. } => Ok(Response::default()),
        }
    }

    fn run_select(&self, store: &dyn RecordStore, table: Table) -> Result<Response, ClientError> {
        let mut rows = if self.filters.is_empty() {
            store.all(table)?
        } else {
            store.filter(table, &self.filters)?
        };

        if let Some(expr) = &self.or_filter {
            let clauses = parse_or_filter(expr)?;
            rows = apply_or(rows, &clauses);
            if let Some(n) = self.limit {
                rows.truncate(n);
            }
        }
        if let Some((column, values)) = &self.in_filter {
            rows = apply_in(rows, column, values);
        }
        if let Some((column, ascending)) = &self.order {
            sort_rows(&mut rows, column, *ascending);
        }
        if self.or_filter.is_none() {
            if let Some(n) = self.limit {
                rows.truncate(n);
            }
        }

        let count = rows.len();
        Ok(Response {
            data: self.shape(rows),
            count: Some(count),
        })
    }

    fn run_insert(
        &self,
        store: &dyn RecordStore,
        table: Table,
        data: Value,
    ) -> Result<Response, ClientError> {
        let records = match data {
            Value::Array(items) => items
                .into_iter()
                .map(Record::try_from)
                .collect::<Result<Vec<_>, _>>()?,
            other => vec![Record::try_from(other)?],
        };
        let mut inserted = Vec::with_capacity(records.len());
        for record in records {
            inserted.push(store.insert(table, record)?);
        }
        info!(%table, rows = inserted.len(), "insert via builder");
        Ok(Response {
            data: self.shape(inserted),
            count: None,
        })
    }

    fn run_update(
        &self,
        store: &dyn RecordStore,
        table: Table,
        patch: Value,
    ) -> Result<Response, ClientError> {
        if self.filters.is_empty() {
            return Err(ClientError::new("Update requires a filter (e.g., .eq())", 400));
        }
        let patch = Record::try_from(patch)?;
        let targets = store.filter(table, &self.filters)?;
        let mut updated = Vec::with_capacity(targets.len());
        for row in targets {
            let Some(id) = row.id() else { continue };
            if let Some(row) = store.update(table, id, patch.clone())? {
                updated.push(row);
            }
        }
        info!(%table, rows = updated.len(), "update via builder");
        Ok(Response {
            data: self.shape(updated),
            count: None,
        })
    }

    fn run_delete(&self, store: &dyn RecordStore, table: Table) -> Result<Response, ClientError> {
        if self.filters.is_empty() {
            return Err(ClientError::new("Delete requires a filter (e.g., .eq())", 400));
        }
        let targets = store.filter(table, &self.filters)?;
        let mut deleted = Vec::with_capacity(targets.len());
        for row in targets {
            let Some(id) = row.id() else { continue };
            if let Some(row) = store.delete(table, id)? {
                deleted.push(row);
            }
        }
        info!(%table, rows = deleted.len(), "delete via builder");
        Ok(Response {
            data: self.shape(deleted),
            count: None,
        })
    }

    fn run_upsert(
        &self,
        store: &dyn RecordStore,
        table: Table,
        data: Value,
        on_conflict: String,
    ) -> Result<Response, ClientError> {
        if data.is_array() {
            return Err(ClientError::new("Upsert expects a single object", 400));
        }
        let record = Record::try_from(data)?;
        // A null or missing key never identifies an existing row.
        let key = record
            .get(&on_conflict)
            .filter(|v| !v.is_null())
            .cloned();
        let existing = match &key {
            Some(key) => store.find_by(table, &on_conflict, key)?,
            None => None,
        };
        match (existing, key) {
            (Some(_), Some(key)) => {
                debug!(%table, column = %on_conflict, "upsert resolved to update");
                let mut scoped = self.clone_modifiers();
                scoped.filters = vec![Condition::eq(on_conflict, key)];
                scoped.run_update(store, table, record.into_value())
            }
            _ => {
                debug!(%table, "upsert resolved to insert");
                self.run_insert(store, table, record.into_value())
            }
        }
    }

    fn clone_modifiers(&self) -> Self {
        Self {
            client: self.client.clone(),
            table: self.table.clone(),
            op: self.op.clone(),
            columns: self.columns.clone(),
            filters: self.filters.clone(),
            or_filter: self.or_filter.clone(),
            in_filter: self.in_filter.clone(),
            order: self.order.clone(),
            limit: self.limit,
            single: self.single,
        }
    }

    fn shape(&self, rows: Vec<Record>) -> Data {
        let rows: Vec<Record> = match &self.columns {
            Some(cols) => {
                let cols: Vec<&str> = cols.iter().map(String::as_str).collect();
                rows.iter().map(|r| r.project(&cols)).collect()
            }
            None => rows,
        };
        if !self.single {
            return Data::Rows(rows);
        }
        if rows.len() > 1 {
            warn!(table = %self.table, rows = rows.len(), "single() matched more than one row");
        }
        match rows.into_iter().next() {
            Some(row) => Data::Row(row),
            None => Data::None,
        }
    }
}

fn run_rpc(name: &str, params: &Value) -> Response {
    match name {
        "execute_sql" => {
            let sql = params
                .get("sql_query")
                .and_then(Value::as_str)
                .unwrap_or_default();
            let preview: String = sql.chars().take(SQL_LOG_CHARS).collect();
            info!(sql = %preview, "rpc execute_sql ignored in mock mode");
        }
        other => warn!(rpc = other, "rpc not implemented in mock mode"),
    }
    Response::default()
}
