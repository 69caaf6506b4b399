use async_trait::async_trait;
use axum::body::Bytes;
use reqwest::{Method, RequestBuilder, Response, Url};
use serde_json::{json, Value};

use super::{ObjectStore, Query, StoreError, TableGateway};
use crate::config::SupabaseConfig;

/// HTTP client for the PostgREST, Storage and Auth endpoints of one project.
#[derive(Clone)]
pub struct SupabaseClient {
    http: reqwest::Client,
    base_url: String,
    service_key: String,
}

impl SupabaseClient {
    pub fn new(config: &SupabaseConfig) -> Result<Self, StoreError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| {
                StoreError::Unavailable(format!("failed to initialize http client: {err}"))
            })?;

        Ok(Self {
            http,
            base_url: config.url.trim_end_matches('/').to_string(),
            service_key: config.service_key.clone(),
        })
    }

    fn service_request(&self, method: Method, url: &str) -> RequestBuilder {
        self.http
            .request(method, url)
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
    }

    fn rest_url(&self, path: &str) -> String {
        format!("{}/rest/v1/{path}", self.base_url)
    }

    fn object_url(&self, bucket: &str, path: Option<&str>) -> Result<Url, StoreError> {
        let mut url = Url::parse(&format!("{}/storage/v1/object", self.base_url))
            .map_err(|err| StoreError::Unavailable(format!("invalid storage url: {err}")))?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| StoreError::Unavailable("storage url cannot be a base".into()))?;
            segments.pop_if_empty().push(bucket);
            if let Some(path) = path {
                segments.extend(path.split('/'));
            }
        }
        Ok(url)
    }

    /// Resolves the user behind an access token. `None` when the token is rejected.
    pub async fn fetch_user(&self, access_token: &str) -> Result<Option<Value>, StoreError> {
        let response = self
            .http
            .get(format!("{}/auth/v1/user", self.base_url))
            .header("apikey", &self.service_key)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(transport)?;

        match response.status().as_u16() {
            401 | 403 | 404 => Ok(None),
            _ => match read_json(response).await? {
                Value::Null => Ok(None),
                user => Ok(Some(user)),
            },
        }
    }
}

#[async_trait]
impl TableGateway for SupabaseClient {
    async fn select(&self, query: &Query) -> Result<Vec<Value>, StoreError> {
        let response = self
            .service_request(Method::GET, &self.rest_url(&query.table))
            .query(&query.to_params())
            .send()
            .await
            .map_err(transport)?;
        read_rows(response).await
    }

    async fn insert(&self, table: &str, rows: Value) -> Result<Vec<Value>, StoreError> {
        let response = self
            .service_request(Method::POST, &self.rest_url(table))
            .header("Prefer", "return=representation")
            .json(&rows)
            .send()
            .await
            .map_err(transport)?;
        read_rows(response).await
    }

    async fn update(&self, query: &Query, patch: Value) -> Result<Vec<Value>, StoreError> {
        let response = self
            .service_request(Method::PATCH, &self.rest_url(&query.table))
            .header("Prefer", "return=representation")
            .query(&query.to_params())
            .json(&patch)
            .send()
            .await
            .map_err(transport)?;
        read_rows(response).await
    }

    async fn delete(&self, query: &Query) -> Result<Vec<Value>, StoreError> {
        let response = self
            .service_request(Method::DELETE, &self.rest_url(&query.table))
            .header("Prefer", "return=representation")
            .query(&query.to_params())
            .send()
            .await
            .map_err(transport)?;
        read_rows(response).await
    }

    async fn rpc(&self, function: &str, args: Value) -> Result<Value, StoreError> {
        let response = self
            .service_request(Method::POST, &self.rest_url(&format!("rpc/{function}")))
            .json(&args)
            .send()
            .await
            .map_err(transport)?;
        read_json(response).await
    }
}

#[async_trait]
impl ObjectStore for SupabaseClient {
    async fn download(&self, bucket: &str, path: &str) -> Result<Bytes, StoreError> {
        let url = self.object_url(bucket, Some(path))?;
        let response = self
            .service_request(Method::GET, url.as_str())
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify(status.as_u16(), &body));
        }
        response.bytes().await.map_err(transport)
    }

    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Bytes,
        content_type: &str,
    ) -> Result<(), StoreError> {
        let url = self.object_url(bucket, Some(path))?;
        let response = self
            .service_request(Method::POST, url.as_str())
            .header("content-type", content_type)
            .header("x-upsert", "true")
            .body(bytes)
            .send()
            .await
            .map_err(transport)?;
        read_json(response).await.map(|_| ())
    }

    async fn remove(&self, bucket: &str, paths: &[String]) -> Result<(), StoreError> {
        if paths.is_empty() {
            return Ok(());
        }
        let url = self.object_url(bucket, None)?;
        let response = self
            .service_request(Method::DELETE, url.as_str())
            .json(&json!({ "prefixes": paths }))
            .send()
            .await
            .map_err(transport)?;
        read_json(response).await.map(|_| ())
    }
}

fn transport(err: reqwest::Error) -> StoreError {
    if err.is_timeout() {
        StoreError::Unavailable("request timed out".to_string())
    } else {
        StoreError::Unavailable(err.to_string())
    }
}

async fn read_json(response: Response) -> Result<Value, StoreError> {
    let status = response.status();
    let body = response.text().await.map_err(transport)?;
    if !status.is_success() {
        return Err(classify(status.as_u16(), &body));
    }
    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(&body).map_err(|err| StoreError::Decode(err.to_string()))
}

async fn read_rows(response: Response) -> Result<Vec<Value>, StoreError> {
    match read_json(response).await? {
        Value::Array(rows) => Ok(rows),
        Value::Null => Ok(Vec::new()),
        other => Ok(vec![other]),
    }
}

/// Maps PostgREST and Storage error payloads onto [`StoreError`].
pub(crate) fn classify(status: u16, body: &str) -> StoreError {
    let parsed: Value = serde_json::from_str(body).unwrap_or(Value::Null);
    let code = parsed.get("code").and_then(Value::as_str).unwrap_or_default();
    let message = parsed
        .get("message")
        .or_else(|| parsed.get("error"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| body.chars().take(200).collect());

    if status == 404 || (status == 400 && body.contains("not_found")) {
        return StoreError::NotFound;
    }
    if status == 409 || matches!(code, "23505" | "23P01") {
        return StoreError::Conflict(message);
    }
    if status >= 500 {
        return StoreError::Unavailable(message);
    }
    StoreError::Rejected { status, message }
}
