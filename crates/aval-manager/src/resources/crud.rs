use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::context::AppContext;
use crate::domain::Validate;
use crate::error::ApiError;
use crate::identity::AdminPrincipal;
use crate::store::{encode, timestamp, Query, StoreError, Tables};

/// Table-backed record with its stored, create and patch shapes.
pub trait Resource: Send + Sync + 'static {
    const TABLE: &'static str;
    /// Singular noun used in error messages.
    const NOUN: &'static str;
    /// Whether updates stamp `updated_at`.
    const STAMPS_UPDATES: bool = false;

    type Row: Serialize + DeserializeOwned + Send + 'static;
    type Draft: Serialize + DeserializeOwned + Validate + Send + 'static;
    type Patch: Serialize + DeserializeOwned + Validate + Send + 'static;
}

pub fn not_found<R: Resource>() -> ApiError {
    ApiError::NotFound(format!("{} not found", R::NOUN))
}

pub async fn fetch<R: Resource>(tables: &Tables, id: Uuid) -> Result<R::Row, ApiError> {
    tables
        .by_id::<R::Row>(R::TABLE, id)
        .await?
        .ok_or_else(not_found::<R>)
}

pub async fn list<R: Resource>(tables: &Tables, query: Query) -> Result<Vec<R::Row>, ApiError> {
    debug_assert_eq!(query.table, R::TABLE);
    Ok(tables.select(&query).await?)
}

pub async fn insert<R: Resource>(tables: &Tables, row: Value) -> Result<R::Row, ApiError> {
    Ok(tables.insert(R::TABLE, &row).await?)
}

pub async fn create<R: Resource>(tables: &Tables, draft: &R::Draft) -> Result<R::Row, ApiError> {
    draft.validate()?;
    insert::<R>(tables, encode(draft)?).await
}

/// Applies a pre-built column map. An empty patch returns the stored row untouched.
pub async fn apply<R: Resource>(
    tables: &Tables,
    id: Uuid,
    mut patch: Map<String, Value>,
) -> Result<R::Row, ApiError> {
    if patch.is_empty() {
        return fetch::<R>(tables, id).await;
    }
    if R::STAMPS_UPDATES {
        patch.insert(
            "updated_at".into(),
            Value::String(timestamp(chrono::Utc::now())),
        );
    }
    match tables
        .update_by_id::<R::Row, _>(R::TABLE, id, &Value::Object(patch))
        .await
    {
        Err(StoreError::NotFound) => Err(not_found::<R>()),
        other => Ok(other?),
    }
}

pub async fn update<R: Resource>(
    tables: &Tables,
    id: Uuid,
    patch: &R::Patch,
) -> Result<R::Row, ApiError> {
    patch.validate()?;
    apply::<R>(tables, id, patch_columns(patch)?).await
}

/// Deleting a missing row is not an error.
pub async fn remove<R: Resource>(tables: &Tables, id: Uuid) -> Result<(), ApiError> {
    tables
        .delete_where(&Query::table(R::TABLE).eq("id", id))
        .await?;
    Ok(())
}

/// Serialized patch with absent and null fields dropped.
pub fn patch_columns<P: Serialize>(patch: &P) -> Result<Map<String, Value>, ApiError> {
    match encode(patch)? {
        Value::Object(columns) => Ok(columns
            .into_iter()
            .filter(|(_, value)| !value.is_null())
            .collect()),
        _ => Err(ApiError::invalid("patch must be a JSON object")),
    }
}

pub async fn get_one<R: Resource>(
    State(ctx): State<Arc<AppContext>>,
    _admin: AdminPrincipal,
    Path(id): Path<Uuid>,
) -> Result<Json<R::Row>, ApiError> {
    fetch::<R>(&ctx.tables, id).await.map(Json)
}

pub async fn create_one<R: Resource>(
    State(ctx): State<Arc<AppContext>>,
    _admin: AdminPrincipal,
    Json(draft): Json<R::Draft>,
) -> Result<(StatusCode, Json<R::Row>), ApiError> {
    let row = create::<R>(&ctx.tables, &draft).await?;
    Ok((StatusCode::CREATED, Json(row)))
}

pub async fn update_one<R: Resource>(
    State(ctx): State<Arc<AppContext>>,
    _admin: AdminPrincipal,
    Path(id): Path<Uuid>,
    Json(patch): Json<R::Patch>,
) -> Result<Json<R::Row>, ApiError> {
    update::<R>(&ctx.tables, id, &patch).await.map(Json)
}

pub async fn delete_one<R: Resource>(
    State(ctx): State<Arc<AppContext>>,
    AdminPrincipal(admin): AdminPrincipal,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    remove::<R>(&ctx.tables, id).await?;
    tracing::info!(table = R::TABLE, %id, user_id = %admin.id, "record deleted");
    Ok(StatusCode::NO_CONTENT)
}
