//! Access to the hosted relational store and object storage.
//!
//! Everything above this module speaks in typed rows; the gateways below it only move JSON
//! documents. `Query` renders to PostgREST filter parameters and is evaluated structurally by
//! the in-memory backend, so both agree on filter semantics.

pub mod memory;
pub mod object_store;
pub mod repositories;
pub mod supabase;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

pub use memory::{MemoryObjects, MemoryTables};
pub use object_store::ObjectStore;
pub use supabase::SupabaseClient;

/// Error enumeration for store failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    #[error("conflicting record: {0}")]
    Conflict(String),
    #[error("store rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("unexpected store payload: {0}")]
    Decode(String),
}

/// Row-level comparison applied to one column.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Eq(String),
    Neq(String),
    IsNull,
    NotNull,
    In(Vec<String>),
    Gte(String),
    Lte(String),
    /// Case-insensitive match where `*` is a wildcard.
    ILike(String),
}

impl Condition {
    fn render(&self) -> String {
        match self {
            Condition::Eq(value) => format!("eq.{value}"),
            Condition::Neq(value) => format!("neq.{value}"),
            Condition::IsNull => "is.null".to_string(),
            Condition::NotNull => "not.is.null".to_string(),
            Condition::In(values) => {
                let quoted: Vec<String> = values.iter().map(|v| format!("\"{v}\"")).collect();
                format!("in.({})", quoted.join(","))
            }
            Condition::Gte(value) => format!("gte.{value}"),
            Condition::Lte(value) => format!("lte.{value}"),
            Condition::ILike(pattern) => format!("ilike.{pattern}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub column: String,
    pub condition: Condition,
}

impl Filter {
    pub fn new(column: impl Into<String>, condition: Condition) -> Self {
        Self {
            column: column.into(),
            condition,
        }
    }

    pub fn eq(column: impl Into<String>, value: impl ToString) -> Self {
        Self::new(column, Condition::Eq(value.to_string()))
    }

    pub fn ilike_contains(column: impl Into<String>, term: &str) -> Self {
        Self::new(
            column,
            Condition::ILike(format!("*{}*", sanitize_term(term))),
        )
    }

    /// Case-insensitive equality.
    pub fn ilike_exact(column: impl Into<String>, term: &str) -> Self {
        Self::new(column, Condition::ILike(sanitize_term(term)))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    Where(Filter),
    AnyOf(Vec<Filter>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub column: String,
    pub descending: bool,
}

/// Declarative read/update/delete target for one table.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub table: String,
    pub columns: String,
    pub clauses: Vec<Clause>,
    pub order: Vec<Order>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn table(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: "*".to_string(),
            clauses: Vec::new(),
            order: Vec::new(),
            limit: None,
        }
    }

    pub fn columns(mut self, columns: impl Into<String>) -> Self {
        self.columns = columns.into();
        self
    }

    pub fn filter(mut self, column: impl Into<String>, condition: Condition) -> Self {
        self.clauses
            .push(Clause::Where(Filter::new(column, condition)));
        self
    }

    pub fn eq(self, column: impl Into<String>, value: impl ToString) -> Self {
        self.filter(column, Condition::Eq(value.to_string()))
    }

    pub fn neq(self, column: impl Into<String>, value: impl ToString) -> Self {
        self.filter(column, Condition::Neq(value.to_string()))
    }

    pub fn is_null(self, column: impl Into<String>) -> Self {
        self.filter(column, Condition::IsNull)
    }

    pub fn in_list<I, V>(self, column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: ToString,
    {
        let values = values.into_iter().map(|v| v.to_string()).collect();
        self.filter(column, Condition::In(values))
    }

    pub fn gte(self, column: impl Into<String>, value: impl ToString) -> Self {
        self.filter(column, Condition::Gte(value.to_string()))
    }

    pub fn lte(self, column: impl Into<String>, value: impl ToString) -> Self {
        self.filter(column, Condition::Lte(value.to_string()))
    }

    pub fn ilike_contains(mut self, column: impl Into<String>, term: &str) -> Self {
        self.clauses
            .push(Clause::Where(Filter::ilike_contains(column, term)));
        self
    }

    pub fn ilike_exact(mut self, column: impl Into<String>, term: &str) -> Self {
        self.clauses.push(Clause::Where(Filter::ilike_exact(column, term)));
        self
    }

    pub fn any_of(mut self, filters: Vec<Filter>) -> Self {
        if !filters.is_empty() {
            self.clauses.push(Clause::AnyOf(filters));
        }
        self
    }

    pub fn eq_opt<V: ToString>(self, column: &str, value: Option<V>) -> Self {
        match value {
            Some(value) => self.eq(column, value),
            None => self,
        }
    }

    pub fn order_asc(mut self, column: impl Into<String>) -> Self {
        self.order.push(Order {
            column: column.into(),
            descending: false,
        });
        self
    }

    pub fn order_desc(mut self, column: impl Into<String>) -> Self {
        self.order.push(Order {
            column: column.into(),
            descending: true,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// PostgREST query-string parameters for this query.
    pub fn to_params(&self) -> Vec<(String, String)> {
        let mut params = vec![("select".to_string(), self.columns.clone())];
        for clause in &self.clauses {
            match clause {
                Clause::Where(filter) => {
                    params.push((filter.column.clone(), filter.condition.render()));
                }
                Clause::AnyOf(filters) => {
                    let rendered: Vec<String> = filters
                        .iter()
                        .map(|f| format!("{}.{}", f.column, f.condition.render()))
                        .collect();
                    params.push(("or".to_string(), format!("({})", rendered.join(","))));
                }
            }
        }
        if !self.order.is_empty() {
            let rendered: Vec<String> = self
                .order
                .iter()
                .map(|o| {
                    let direction = if o.descending { "desc" } else { "asc" };
                    format!("{}.{direction}", o.column)
                })
                .collect();
            params.push(("order".to_string(), rendered.join(",")));
        }
        if let Some(limit) = self.limit {
            params.push(("limit".to_string(), limit.to_string()));
        }
        params
    }
}

/// Strips characters that carry meaning inside PostgREST filter expressions.
fn sanitize_term(term: &str) -> String {
    term.trim()
        .chars()
        .filter(|c| !matches!(c, '*' | '%' | ',' | '(' | ')' | '"'))
        .collect()
}

/// Timestamp rendering used in filters; matches how rows are serialized.
pub fn timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Raw JSON access to tables, views and database functions.
#[async_trait]
pub trait TableGateway: Send + Sync {
    async fn select(&self, query: &Query) -> Result<Vec<Value>, StoreError>;
    async fn insert(&self, table: &str, rows: Value) -> Result<Vec<Value>, StoreError>;
    async fn update(&self, query: &Query, patch: Value) -> Result<Vec<Value>, StoreError>;
    async fn delete(&self, query: &Query) -> Result<Vec<Value>, StoreError>;
    async fn rpc(&self, function: &str, args: Value) -> Result<Value, StoreError>;
}

/// Typed facade over a [`TableGateway`].
#[derive(Clone)]
pub struct Tables {
    gateway: Arc<dyn TableGateway>,
}

impl Tables {
    pub fn new(gateway: Arc<dyn TableGateway>) -> Self {
        Self { gateway }
    }

    pub fn gateway(&self) -> &Arc<dyn TableGateway> {
        &self.gateway
    }

    pub async fn select<T: DeserializeOwned>(&self, query: &Query) -> Result<Vec<T>, StoreError> {
        self.gateway
            .select(query)
            .await?
            .into_iter()
            .map(decode)
            .collect()
    }

    pub async fn first<T: DeserializeOwned>(&self, query: Query) -> Result<Option<T>, StoreError> {
        let rows = self.select::<T>(&query.limit(1)).await?;
        Ok(rows.into_iter().next())
    }

    pub async fn by_id<T: DeserializeOwned>(
        &self,
        table: &str,
        id: Uuid,
    ) -> Result<Option<T>, StoreError> {
        self.first(Query::table(table).eq("id", id)).await
    }

    pub async fn insert<T, R>(&self, table: &str, row: &R) -> Result<T, StoreError>
    where
        T: DeserializeOwned,
        R: Serialize + ?Sized,
    {
        let payload = encode(row)?;
        let rows = self.gateway.insert(table, payload).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| StoreError::Decode(format!("insert into {table} returned no rows")))
            .and_then(decode)
    }

    pub async fn insert_many<R: Serialize>(
        &self,
        table: &str,
        rows: &[R],
    ) -> Result<Vec<Value>, StoreError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        self.gateway.insert(table, encode(rows)?).await
    }

    pub async fn update_by_id<T, P>(&self, table: &str, id: Uuid, patch: &P) -> Result<T, StoreError>
    where
        T: DeserializeOwned,
        P: Serialize + ?Sized,
    {
        let query = Query::table(table).eq("id", id);
        let rows = self.gateway.update(&query, encode(patch)?).await?;
        rows.into_iter()
            .next()
            .ok_or(StoreError::NotFound)
            .and_then(decode)
    }

    pub async fn update_where(&self, query: &Query, patch: Value) -> Result<usize, StoreError> {
        Ok(self.gateway.update(query, patch).await?.len())
    }

    pub async fn delete_by_id(&self, table: &str, id: Uuid) -> Result<(), StoreError> {
        let removed = self
            .gateway
            .delete(&Query::table(table).eq("id", id))
            .await?;
        if removed.is_empty() {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    pub async fn delete_where(&self, query: &Query) -> Result<usize, StoreError> {
        Ok(self.gateway.delete(query).await?.len())
    }

    pub async fn rpc<T: DeserializeOwned>(&self, function: &str, args: Value) -> Result<T, StoreError> {
        decode(self.gateway.rpc(function, args).await?)
    }
}

pub fn decode<T: DeserializeOwned>(value: Value) -> Result<T, StoreError> {
    serde_json::from_value(value).map_err(|err| StoreError::Decode(err.to_string()))
}

pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Value, StoreError> {
    serde_json::to_value(value).map_err(|err| StoreError::Decode(err.to_string()))
}
