#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use aval_manager::config::StorageConfig;
use aval_manager::eligibility::UnscopedVetoPolicy;
use aval_manager::identity::IdentityProvider;
use aval_manager::store::{MemoryObjects, MemoryTables, StoreError};
use aval_manager::{api_router, AppContext};
use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

pub const ADMIN: &str = "admin-token";
pub const ADVISOR: &str = "advisor-token";
pub const OTHER_ADVISOR: &str = "other-advisor-token";
pub const CLIENT: &str = "client-token";
pub const STORAGE_SECRET: &str = "integration-secret";

/// Identity provider answering from a fixed token table.
pub struct StaticIdentity {
    users: HashMap<String, Value>,
}

impl StaticIdentity {
    pub fn new(users: impl IntoIterator<Item = (&'static str, Value)>) -> Self {
        Self {
            users: users
                .into_iter()
                .map(|(token, user)| (token.to_string(), user))
                .collect(),
        }
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentity {
    async fn user_for_token(&self, token: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.users.get(token).cloned())
    }
}

#[derive(Clone)]
pub struct TestApp {
    pub router: Router,
    pub tables: MemoryTables,
    pub objects: MemoryObjects,
    pub admin_id: Uuid,
    pub advisor_id: Uuid,
    pub other_advisor_id: Uuid,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_policy(UnscopedVetoPolicy::default())
    }

    pub fn with_policy(policy: UnscopedVetoPolicy) -> Self {
        let tables = MemoryTables::new();
        let objects = MemoryObjects::default();
        let admin_id = Uuid::new_v4();
        let advisor_id = Uuid::new_v4();
        let other_advisor_id = Uuid::new_v4();

        let identity = StaticIdentity::new([
            (
                ADMIN,
                json!({"id": admin_id, "email": "admin@example.com", "app_metadata": {"role": "admin"}}),
            ),
            (
                ADVISOR,
                json!({"id": advisor_id, "user_metadata": {"role": "asesor"}}),
            ),
            (
                OTHER_ADVISOR,
                json!({"id": other_advisor_id, "user_metadata": {"role": "asesor"}}),
            ),
            (CLIENT, json!({"id": Uuid::new_v4(), "user_metadata": {"role": "cliente"}})),
        ]);
        let storage = StorageConfig {
            jwt_secret: STORAGE_SECRET.to_string(),
            api_base_url: "http://api.test".to_string(),
            bucket: StorageConfig::DEFAULT_BUCKET.to_string(),
        };
        let context = AppContext::with_backends(
            Arc::new(tables.clone()),
            Arc::new(objects.clone()),
            Arc::new(identity),
            &storage,
            policy,
        );

        Self {
            router: api_router(Arc::new(context)),
            tables,
            objects,
            admin_id,
            advisor_id,
            other_advisor_id,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router responds")
    }

    pub async fn call(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request builds");

        let response = self.send(request).await;
        let status = response.status();
        (status, read_json(response).await)
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.call(Method::GET, uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.call(Method::POST, uri, token, Some(body)).await
    }

    pub async fn put(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.call(Method::PUT, uri, token, Some(body)).await
    }

    /// Seeds an active guarantor available on 2024-05-06 from 09:00 to 18:00 UTC.
    pub fn guarantor_with_day(&self, name: &str) -> Uuid {
        let rows = self
            .tables
            .seed("avales", vec![json!({"nombre_completo": name, "activo": true})]);
        let id: Uuid = serde_json::from_value(rows[0]["id"].clone()).expect("seeded id");
        self.tables.seed(
            "disponibilidades_avales",
            vec![json!({
                "aval_id": id,
                "fecha_inicio": "2024-05-06T09:00:00Z",
                "fecha_fin": "2024-05-06T18:00:00Z"
            })],
        );
        id
    }

    pub fn seed_id(&self, table: &str, row: Value) -> Uuid {
        let rows = self.tables.seed(table, vec![row]);
        serde_json::from_value(rows[0]["id"].clone()).expect("seeded id")
    }
}

pub async fn read_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body readable");
    if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    }
}

pub fn signing_body(guarantor: Uuid, start: &str, end: &str) -> Value {
    json!({
        "aval_id": guarantor,
        "asesor_nombre": "Laura Méndez",
        "cliente_nombre": "Carlos Ruiz",
        "telefono": "3312345678",
        "correo": "carlos@example.com",
        "tipo_renta": "habitacional",
        "periodo_contrato_anios": 1,
        "monto_renta": "12000",
        "propiedad_domicilio": "Av. Vallarta 100",
        "ubicacion_maps_url": "https://maps.example.com/x",
        "fecha_inicio": start,
        "fecha_fin": end,
        "pago_por_servicio": "1500"
    })
}
