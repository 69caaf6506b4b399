//! In-process backends used for local runs and tests.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use axum::body::Bytes;
use chrono::{DateTime, FixedOffset, Utc};
use serde_json::{json, Value};
use uuid::Uuid;

use super::{timestamp, Clause, Condition, Filter, ObjectStore, Query, StoreError, TableGateway};

pub type TableMap = HashMap<String, Vec<Value>>;
type RpcHandler = Arc<dyn Fn(&mut TableMap, Value) -> Result<Value, StoreError> + Send + Sync>;

/// Table gateway backed by process memory.
///
/// Filters are evaluated with the same semantics PostgREST applies. Database functions are
/// registered as closures; `fn_sellar_corte` is installed by default.
#[derive(Clone)]
pub struct MemoryTables {
    tables: Arc<Mutex<TableMap>>,
    functions: Arc<Mutex<HashMap<String, RpcHandler>>>,
}

impl Default for MemoryTables {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTables {
    pub fn new() -> Self {
        let tables = Self {
            tables: Arc::new(Mutex::new(HashMap::new())),
            functions: Arc::new(Mutex::new(HashMap::new())),
        };
        tables.register_function("fn_sellar_corte", seal_batch);
        tables
    }

    fn state(&self) -> MutexGuard<'_, TableMap> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn register_function<F>(&self, name: &str, handler: F)
    where
        F: Fn(&mut TableMap, Value) -> Result<Value, StoreError> + Send + Sync + 'static,
    {
        self.functions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string(), Arc::new(handler));
    }

    /// Inserts rows verbatim, filling `id` and timestamps when absent.
    pub fn seed(&self, table: &str, rows: Vec<Value>) -> Vec<Value> {
        let mut state = self.state();
        let stored = state.entry(table.to_string()).or_default();
        rows.into_iter()
            .map(|row| {
                let row = with_defaults(row);
                stored.push(row.clone());
                row
            })
            .collect()
    }

    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.state().get(table).cloned().unwrap_or_default()
    }
}

fn with_defaults(row: Value) -> Value {
    let mut object = match row {
        Value::Object(object) => object,
        other => return other,
    };
    let now = Value::String(timestamp(Utc::now()));
    object
        .entry("id")
        .or_insert_with(|| Value::String(Uuid::new_v4().to_string()));
    object.entry("created_at").or_insert_with(|| now.clone());
    object.entry("updated_at").or_insert(now);
    Value::Object(object)
}

#[async_trait]
impl TableGateway for MemoryTables {
    async fn select(&self, query: &Query) -> Result<Vec<Value>, StoreError> {
        let state = self.state();
        let rows = state.get(&query.table).map(Vec::as_slice).unwrap_or(&[]);
        Ok(run_query(query, rows))
    }

    async fn insert(&self, table: &str, rows: Value) -> Result<Vec<Value>, StoreError> {
        let rows = match rows {
            Value::Array(rows) => rows,
            row @ Value::Object(_) => vec![row],
            other => {
                return Err(StoreError::Rejected {
                    status: 400,
                    message: format!("cannot insert {other}"),
                })
            }
        };
        Ok(self.seed(table, rows))
    }

    async fn update(&self, query: &Query, patch: Value) -> Result<Vec<Value>, StoreError> {
        let Value::Object(patch) = patch else {
            return Err(StoreError::Rejected {
                status: 400,
                message: "update payload must be an object".to_string(),
            });
        };
        let mut state = self.state();
        let Some(rows) = state.get_mut(&query.table) else {
            return Ok(Vec::new());
        };
        let mut updated = Vec::new();
        for row in rows.iter_mut().filter(|row| matches_all(&query.clauses, row)) {
            if let Value::Object(object) = row {
                for (key, value) in &patch {
                    object.insert(key.clone(), value.clone());
                }
            }
            updated.push(row.clone());
        }
        Ok(updated)
    }

    async fn delete(&self, query: &Query) -> Result<Vec<Value>, StoreError> {
        let mut state = self.state();
        let Some(rows) = state.get_mut(&query.table) else {
            return Ok(Vec::new());
        };
        let (removed, kept): (Vec<Value>, Vec<Value>) = rows
            .drain(..)
            .partition(|row| matches_all(&query.clauses, row));
        *rows = kept;
        Ok(removed)
    }

    async fn rpc(&self, function: &str, args: Value) -> Result<Value, StoreError> {
        let handler = self
            .functions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(function)
            .cloned()
            .ok_or(StoreError::NotFound)?;
        let mut state = self.state();
        handler(&mut *state, args)
    }
}

fn run_query(query: &Query, rows: &[Value]) -> Vec<Value> {
    let mut selected: Vec<Value> = rows
        .iter()
        .filter(|row| matches_all(&query.clauses, row))
        .cloned()
        .collect();

    for order in query.order.iter().rev() {
        selected.sort_by(|a, b| {
            let ordering = compare_nullable(a.get(&order.column), b.get(&order.column));
            if order.descending {
                ordering.reverse()
            } else {
                ordering
            }
        });
    }

    if let Some(limit) = query.limit {
        selected.truncate(limit);
    }
    selected
}

fn matches_all(clauses: &[Clause], row: &Value) -> bool {
    clauses.iter().all(|clause| match clause {
        Clause::Where(filter) => matches(filter, row),
        Clause::AnyOf(filters) => filters.iter().any(|filter| matches(filter, row)),
    })
}

fn matches(filter: &Filter, row: &Value) -> bool {
    let text = row.get(&filter.column).and_then(scalar_text);
    match (&filter.condition, text) {
        (Condition::IsNull, text) => text.is_none(),
        (Condition::NotNull, text) => text.is_some(),
        (_, None) => false,
        (Condition::Eq(expected), Some(text)) => &text == expected,
        (Condition::Neq(expected), Some(text)) => &text != expected,
        (Condition::In(values), Some(text)) => values.contains(&text),
        (Condition::Gte(bound), Some(text)) => compare_text(&text, bound) != Ordering::Less,
        (Condition::Lte(bound), Some(text)) => compare_text(&text, bound) != Ordering::Greater,
        (Condition::ILike(pattern), Some(text)) => {
            wildcard_match(&pattern.to_lowercase(), &text.to_lowercase())
        }
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Number(number) => Some(number.to_string()),
        other => Some(other.to_string()),
    }
}

fn compare_nullable(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a.and_then(scalar_text), b.and_then(scalar_text)) {
        (Some(a), Some(b)) => compare_text(&a, &b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Compares timestamps and numbers by value, everything else lexically.
fn compare_text(a: &str, b: &str) -> Ordering {
    if let (Ok(a), Ok(b)) = (
        DateTime::<FixedOffset>::parse_from_rfc3339(a),
        DateTime::<FixedOffset>::parse_from_rfc3339(b),
    ) {
        return a.cmp(&b);
    }
    if let (Ok(a), Ok(b)) = (a.parse::<f64>(), b.parse::<f64>()) {
        return a.partial_cmp(&b).unwrap_or(Ordering::Equal);
    }
    a.cmp(b)
}

fn wildcard_match(pattern: &str, text: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    if parts.len() == 1 {
        return pattern == text;
    }
    let mut rest = text;
    for (index, part) in parts.iter().enumerate() {
        if part.is_empty() {
            continue;
        }
        if index == 0 {
            match rest.strip_prefix(part) {
                Some(tail) => rest = tail,
                None => return false,
            }
        } else if index == parts.len() - 1 {
            return rest.ends_with(part);
        } else {
            match rest.find(part) {
                Some(position) => rest = &rest[position + part.len()..],
                None => return false,
            }
        }
    }
    true
}

/// Stamps `corte_id` on the batch members unless any of them belongs to another batch.
fn seal_batch(tables: &mut TableMap, args: Value) -> Result<Value, StoreError> {
    let batch_id = args
        .get("p_corte_id")
        .and_then(Value::as_str)
        .ok_or_else(|| StoreError::Rejected {
            status: 400,
            message: "p_corte_id is required".to_string(),
        })?
        .to_string();
    let members = [
        ("pagos_servicio", ids_arg(&args, "p_servicio_ids")),
        ("pagos_comisiones", ids_arg(&args, "p_comision_ids")),
    ];

    let snapshot: &TableMap = tables;
    let claimed = members
        .iter()
        .flat_map(|(table, ids)| member_rows(snapshot, table, ids))
        .filter(|row| {
            row.get("corte_id")
                .and_then(Value::as_str)
                .is_some_and(|owner| owner != batch_id)
        })
        .count();
    if claimed > 0 {
        return Ok(json!({ "stamped": 0, "claimed": claimed }));
    }

    let mut stamped = 0;
    for (table, ids) in &members {
        if let Some(rows) = tables.get_mut(*table) {
            for row in rows.iter_mut() {
                let id = row.get("id").and_then(Value::as_str).map(str::to_string);
                if let (Some(id), Value::Object(object)) = (id, row) {
                    if ids.contains(&id) {
                        object.insert("corte_id".to_string(), Value::String(batch_id.clone()));
                        stamped += 1;
                    }
                }
            }
        }
    }
    Ok(json!({ "stamped": stamped, "claimed": 0 }))
}

fn ids_arg(args: &Value, key: &str) -> Vec<String> {
    args.get(key)
        .and_then(Value::as_array)
        .map(|ids| {
            ids.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn member_rows<'a>(tables: &'a TableMap, table: &str, ids: &'a [String]) -> Vec<&'a Value> {
    tables
        .get(table)
        .map(|rows| {
            rows.iter()
                .filter(|row| {
                    row.get("id")
                        .and_then(Value::as_str)
                        .is_some_and(|id| ids.iter().any(|member| member == id))
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Object store backed by process memory.
#[derive(Default, Clone)]
pub struct MemoryObjects {
    objects: Arc<Mutex<HashMap<(String, String), (Bytes, String)>>>,
    fail_uploads: Arc<AtomicBool>,
    downloads: Arc<AtomicUsize>,
}

impl MemoryObjects {
    fn state(&self) -> MutexGuard<'_, HashMap<(String, String), (Bytes, String)>> {
        self.objects.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn put(&self, bucket: &str, path: &str, bytes: impl Into<Bytes>, content_type: &str) {
        self.state().insert(
            (bucket.to_string(), path.to_string()),
            (bytes.into(), content_type.to_string()),
        );
    }

    pub fn get(&self, bucket: &str, path: &str) -> Option<(Bytes, String)> {
        self.state()
            .get(&(bucket.to_string(), path.to_string()))
            .cloned()
    }

    pub fn paths(&self, bucket: &str) -> Vec<String> {
        let mut paths: Vec<String> = self
            .state()
            .keys()
            .filter(|(owner, _)| owner == bucket)
            .map(|(_, path)| path.clone())
            .collect();
        paths.sort();
        paths
    }

    pub fn fail_uploads(&self, fail: bool) {
        self.fail_uploads.store(fail, AtomicOrdering::SeqCst);
    }

    pub fn download_count(&self) -> usize {
        self.downloads.load(AtomicOrdering::SeqCst)
    }
}

#[async_trait]
impl ObjectStore for MemoryObjects {
    async fn download(&self, bucket: &str, path: &str) -> Result<Bytes, StoreError> {
        self.downloads.fetch_add(1, AtomicOrdering::SeqCst);
        self.get(bucket, path)
            .map(|(bytes, _)| bytes)
            .ok_or(StoreError::NotFound)
    }

    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Bytes,
        content_type: &str,
    ) -> Result<(), StoreError> {
        if self.fail_uploads.load(AtomicOrdering::SeqCst) {
            return Err(StoreError::Unavailable("object store offline".to_string()));
        }
        self.put(bucket, path, bytes, content_type);
        Ok(())
    }

    async fn remove(&self, bucket: &str, paths: &[String]) -> Result<(), StoreError> {
        let mut state = self.state();
        for path in paths {
            state.remove(&(bucket.to_string(), path.clone()));
        }
        Ok(())
    }
}
