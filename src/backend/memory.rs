//! In-process backend with the same schema rules as the hosted tables
//!
//! Used by the tests and by the console driver's `--memory` mode. Every
//! mutation is published on the change feed, like the realtime endpoint
//! would. Calls are counted per operation and failures can be injected.

use crate::backend::{Backend, ChangeCallback, SubscriptionHandle};
use crate::core::BackendError;
use crate::dtos::query::plain;
use crate::dtos::{ChangeEvent, ChangeKind, SelectQuery};
use crate::entities::{Attendance, Table};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde_json::{Map, Value};
use std::cmp::Ordering as CmpOrdering;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

use crate::realtime::{ChangeFeed, SubscriptionRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Select,
    Insert,
    Update,
    Subscribe,
}

#[derive(Default)]
struct TableData {
    rows: Vec<Map<String, Value>>,
    next_id: i64,
}

#[derive(Default)]
struct Tables {
    data: HashMap<Table, TableData>,
    last_created_at: Option<DateTime<Utc>>,
}

impl Tables {
    /// `now()`, strictly increasing so that ordering by created_at is total
    fn now(&mut self) -> DateTime<Utc> {
        let mut now = Utc::now();
        if let Some(last) = self.last_created_at {
            if now <= last {
                now = last + Duration::microseconds(1);
            }
        }
        self.last_created_at = Some(now);
        now
    }
}

pub struct MemoryBackend {
    tables: Mutex<Tables>,
    feed: Arc<ChangeFeed>,
    subscriptions: SubscriptionRegistry,
    calls: DashMap<Operation, AtomicUsize>,
    failures: DashMap<Operation, BackendError>,
    offline: AtomicBool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        MemoryBackend {
            tables: Mutex::new(Tables::default()),
            feed: Arc::new(ChangeFeed::new()),
            subscriptions: SubscriptionRegistry::new(),
            calls: DashMap::new(),
            failures: DashMap::new(),
            offline: AtomicBool::new(false),
        }
    }

    /// Inserts rows as an operator would, bypassing failure injection and
    /// call counting. Still publishes change events.
    pub async fn seed(&self, table: Table, rows: Vec<Value>) -> Result<Vec<Value>, BackendError> {
        let mut stored = Vec::with_capacity(rows.len());
        for row in rows {
            stored.push(self.insert_row(table, row).await?);
        }
        Ok(stored)
    }

    /// Operator-side delete; this system never deletes rows itself
    #[instrument(skip(self))]
    pub async fn delete(&self, table: Table, id: i64) -> bool {
        let removed = {
            let mut tables = self.tables.lock().await;
            let data = tables.data.entry(table).or_default();
            let before = data.rows.len();
            data.rows.retain(|row| row_id(row) != Some(id));
            data.rows.len() != before
        };
        if removed {
            self.feed.publish(ChangeEvent::new(table, ChangeKind::Delete));
        }
        removed
    }

    /// The next call of `operation` fails with `error`
    pub fn fail_next(&self, operation: Operation, error: BackendError) {
        self.failures.insert(operation, error);
    }

    /// While offline every call fails with a network error
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// How many times `operation` was called, failed calls included
    pub fn calls(&self, operation: Operation) -> usize {
        self.calls
            .get(&operation)
            .map(|c| c.load(Ordering::SeqCst))
            .unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.iter().map(|c| c.load(Ordering::SeqCst)).sum()
    }

    /// Current rows of a table, in id order
    pub async fn rows(&self, table: Table) -> Vec<Value> {
        let tables = self.tables.lock().await;
        tables
            .data
            .get(&table)
            .map(|d| d.rows.iter().cloned().map(Value::Object).collect())
            .unwrap_or_default()
    }

    pub fn feed(&self) -> &ChangeFeed {
        &self.feed
    }

    pub fn active_subscriptions(&self, table: Table) -> usize {
        self.subscriptions.count(table)
    }

    fn begin(&self, operation: Operation) -> Result<(), BackendError> {
        self.calls
            .entry(operation)
            .or_insert_with(|| AtomicUsize::new(0))
            .fetch_add(1, Ordering::SeqCst);
        if self.offline.load(Ordering::SeqCst) {
            return Err(BackendError::network("backend unreachable"));
        }
        if let Some((_, err)) = self.failures.remove(&operation) {
            warn!(?operation, error = %err, "Injected failure");
            return Err(err);
        }
        Ok(())
    }

    async fn insert_row(&self, table: Table, row: Value) -> Result<Value, BackendError> {
        let Value::Object(mut row) = row else {
            return Err(BackendError::new("row must be a JSON object").with_status(400));
        };

        let stored = {
            let mut tables = self.tables.lock().await;
            let created_at = tables.now();
            let data = tables.data.entry(table).or_default();

            apply_defaults(table, &mut row);
            check_constraints(table, &row, &data.rows)?;

            data.next_id += 1;
            row.insert("id".into(), Value::from(data.next_id));
            row.entry("created_at")
                .or_insert_with(|| Value::String(created_at.to_rfc3339()));
            data.rows.push(row.clone());
            Value::Object(row)
        };

        self.feed.publish(ChangeEvent::new(table, ChangeKind::Insert));
        Ok(stored)
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for MemoryBackend {
    #[instrument(skip(self, query), fields(table = %table))]
    async fn select(&self, table: Table, query: &SelectQuery) -> Result<Vec<Value>, BackendError> {
        self.begin(Operation::Select)?;
        let tables = self.tables.lock().await;
        let mut rows: Vec<Map<String, Value>> = tables
            .data
            .get(&table)
            .map(|d| {
                d.rows
                    .iter()
                    .filter(|row| {
                        query.filters.iter().all(|f| {
                            row.get(&f.column).map(plain) == Some(plain(&f.value))
                        })
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        if let Some(order) = &query.order {
            rows.sort_by(|a, b| {
                let ord = compare(a.get(&order.column), b.get(&order.column));
                if order.ascending { ord } else { ord.reverse() }
            });
        }
        debug!(rows = rows.len(), "Select completed");
        Ok(rows.into_iter().map(Value::Object).collect())
    }

    #[instrument(skip(self, row), fields(table = %table))]
    async fn insert(&self, table: Table, row: Value) -> Result<Value, BackendError> {
        self.begin(Operation::Insert)?;
        self.insert_row(table, row).await
    }

    #[instrument(skip(self, patch), fields(table = %table))]
    async fn update(&self, table: Table, id: i64, patch: Value) -> Result<(), BackendError> {
        self.begin(Operation::Update)?;
        let Value::Object(patch) = patch else {
            return Err(BackendError::new("patch must be a JSON object").with_status(400));
        };

        let matched = {
            let mut tables = self.tables.lock().await;
            let data = tables.data.entry(table).or_default();
            match data.rows.iter().position(|row| row_id(row) == Some(id)) {
                Some(idx) => {
                    let mut updated = data.rows[idx].clone();
                    for (k, v) in patch {
                        if k != "id" {
                            updated.insert(k, v);
                        }
                    }
                    let others: Vec<_> = data
                        .rows
                        .iter()
                        .enumerate()
                        .filter(|(i, _)| *i != idx)
                        .map(|(_, r)| r.clone())
                        .collect();
                    check_constraints(table, &updated, &others)?;
                    data.rows[idx] = updated;
                    true
                }
                None => false,
            }
        };

        // like PostgREST, a PATCH matching no row is not an error
        if matched {
            self.feed.publish(ChangeEvent::new(table, ChangeKind::Update));
        }
        Ok(())
    }

    async fn subscribe(
        &self,
        table: Table,
        on_change: ChangeCallback,
    ) -> Result<SubscriptionHandle, BackendError> {
        self.begin(Operation::Subscribe)?;
        Ok(self
            .subscriptions
            .attach(table, self.feed.subscribe(table), on_change))
    }

    async fn unsubscribe(&self, handle: SubscriptionHandle) {
        self.subscriptions.detach(&handle);
    }
}

fn row_id(row: &Map<String, Value>) -> Option<i64> {
    row.get("id").and_then(Value::as_i64)
}

fn apply_defaults(table: Table, row: &mut Map<String, Value>) {
    row.remove("id");
    match table {
        Table::Gifts => {
            row.entry("is_taken").or_insert(Value::Bool(false));
            row.entry("reserved_by").or_insert(Value::Null);
        }
        Table::Confirmations => {
            row.entry("message").or_insert(Value::Null);
        }
    }
}

/// not null, check and unique constraints of the two tables
fn check_constraints(
    table: Table,
    row: &Map<String, Value>,
    others: &[Map<String, Value>],
) -> Result<(), BackendError> {
    let name = match row.get("name").and_then(Value::as_str) {
        Some(name) if !name.trim().is_empty() => name,
        _ => {
            return Err(BackendError::new(format!(
                "null value in column \"name\" of relation \"{table}\" violates not-null constraint"
            ))
            .with_code("23502")
            .with_status(400));
        }
    };

    if table == Table::Confirmations {
        let attendance_ok = row
            .get("attendance")
            .and_then(Value::as_str)
            .is_some_and(|a| a.parse::<Attendance>().is_ok_and(|p| p.as_str() == a));
        if !attendance_ok {
            return Err(BackendError::new(
                "new row for relation \"confirmations\" violates check constraint \"confirmations_attendance_check\"",
            )
            .with_code("23514")
            .with_status(400));
        }

        let key = unique_key(name);
        let taken = others.iter().any(|other| {
            other
                .get("name")
                .and_then(Value::as_str)
                .is_some_and(|n| unique_key(n) == key)
        });
        if taken {
            return Err(BackendError::unique_violation("confirmations_name_key"));
        }
    }
    Ok(())
}

/// Confirmation names are unique on `lower(trim(name))`
fn unique_key(name: &str) -> String {
    name.trim().to_lowercase()
}

fn compare(a: Option<&Value>, b: Option<&Value>) -> CmpOrdering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(CmpOrdering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        // nulls last, as Postgres does for ascending order
        (Some(Value::Null) | None, Some(Value::Null) | None) => CmpOrdering::Equal,
        (Some(Value::Null) | None, _) => CmpOrdering::Greater,
        (_, Some(Value::Null) | None) => CmpOrdering::Less,
        _ => CmpOrdering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ErrorKind;
    use serde_json::json;

    #[tokio::test]
    async fn insert_assigns_id_and_defaults() {
        let backend = MemoryBackend::new();
        let row = backend
            .insert(Table::Gifts, json!({ "name": "Blender" }))
            .await
            .unwrap();
        assert_eq!(row["id"], 1);
        assert_eq!(row["is_taken"], false);
        assert!(row["created_at"].is_string());
        assert_eq!(backend.calls(Operation::Insert), 1);
    }

    #[tokio::test]
    async fn confirmation_names_are_unique_ignoring_case() {
        let backend = MemoryBackend::new();
        backend
            .insert(Table::Confirmations, json!({ "name": "Jane", "attendance": "attending" }))
            .await
            .unwrap();
        let err = backend
            .insert(Table::Confirmations, json!({ "name": " jane ", "attendance": "maybe" }))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UniqueViolation);
    }

    #[tokio::test]
    async fn attendance_check_constraint() {
        let backend = MemoryBackend::new();
        let err = backend
            .insert(Table::Confirmations, json!({ "name": "Joe", "attendance": "yes" }))
            .await
            .unwrap_err();
        assert_eq!(err.code.as_deref(), Some("23514"));
    }

    #[tokio::test]
    async fn select_filters_and_orders() {
        let backend = MemoryBackend::new();
        backend
            .seed(
                Table::Gifts,
                vec![
                    json!({ "name": "Blender" }),
                    json!({ "name": "Towels", "is_taken": true }),
                    json!({ "name": "Vase" }),
                ],
            )
            .await
            .unwrap();

        let free = backend
            .select(Table::Gifts, &SelectQuery::all().eq("is_taken", false).order_desc("id"))
            .await
            .unwrap();
        let names: Vec<_> = free.iter().map(|r| r["name"].as_str().unwrap()).collect();
        assert_eq!(names, vec!["Vase", "Blender"]);
    }

    #[tokio::test]
    async fn injected_failure_is_consumed_once() {
        let backend = MemoryBackend::new();
        backend.fail_next(Operation::Select, BackendError::new("boom").with_status(500));
        assert!(backend.select(Table::Gifts, &SelectQuery::all()).await.is_err());
        assert!(backend.select(Table::Gifts, &SelectQuery::all()).await.is_ok());
        assert_eq!(backend.calls(Operation::Select), 2);
    }

    #[tokio::test]
    async fn offline_reports_network_errors() {
        let backend = MemoryBackend::new();
        backend.set_offline(true);
        let err = backend
            .update(Table::Gifts, 1, json!({ "is_taken": true }))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Network);
    }

    #[tokio::test]
    async fn mutations_are_published() {
        let backend = MemoryBackend::new();
        let mut rx = backend.feed().subscribe(Table::Gifts);
        backend.seed(Table::Gifts, vec![json!({ "name": "Lamp" })]).await.unwrap();
        backend.update(Table::Gifts, 1, json!({ "is_taken": true })).await.unwrap();
        backend.update(Table::Gifts, 99, json!({ "is_taken": true })).await.unwrap();
        assert!(backend.delete(Table::Gifts, 1).await);

        let kinds: Vec<_> = [rx.recv().await, rx.recv().await, rx.recv().await]
            .into_iter()
            .map(|e| e.unwrap().kind)
            .collect();
        assert_eq!(kinds, vec![ChangeKind::Insert, ChangeKind::Update, ChangeKind::Delete]);
        assert!(rx.try_recv().is_err());
    }
}
