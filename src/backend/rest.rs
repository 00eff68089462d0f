//! PostgREST client: row operations over HTTP

use crate::core::{BackendError, Credentials, PostgrestErrorBody};
use crate::dtos::SelectQuery;
use crate::entities::Table;
use reqwest::header::{AUTHORIZATION, CONTENT_RANGE, HeaderMap, HeaderValue};
use reqwest::{Client, RequestBuilder, Response};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, instrument};

const PREFER: &str = "Prefer";

pub struct RestClient {
    http: Client,
    base_url: String,
}

impl RestClient {
    pub fn new(credentials: &Credentials, timeout: Duration) -> Result<Self, BackendError> {
        let mut headers = HeaderMap::new();
        let key = HeaderValue::from_str(&credentials.key)
            .map_err(|_| BackendError::new("Access key contains invalid characters"))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", credentials.key))
            .map_err(|_| BackendError::new("Access key contains invalid characters"))?;
        headers.insert("apikey", key);
        headers.insert(AUTHORIZATION, bearer);

        let http = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::new(format!("Cannot build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: format!("{}/rest/v1", credentials.url.trim_end_matches('/')),
        })
    }

    fn table_url(&self, table: Table) -> String {
        format!("{}/{}", self.base_url, table)
    }

    #[instrument(skip(self, query), fields(table = %table))]
    pub async fn select(&self, table: Table, query: &SelectQuery) -> Result<Vec<Value>, BackendError> {
        let request = self.http.get(self.table_url(table)).query(&query.to_params());
        let rows: Vec<Value> = send(request).await?.json().await?;
        debug!(rows = rows.len(), "Select completed");
        Ok(rows)
    }

    #[instrument(skip(self, row), fields(table = %table))]
    pub async fn insert(&self, table: Table, row: &Value) -> Result<Value, BackendError> {
        let request = self
            .http
            .post(self.table_url(table))
            .header(PREFER, "return=representation")
            .json(&[row]);
        let mut rows: Vec<Value> = send(request).await?.json().await?;
        if rows.is_empty() {
            return Err(BackendError::decode("insert returned no row"));
        }
        Ok(rows.swap_remove(0))
    }

    #[instrument(skip(self, patch), fields(table = %table))]
    pub async fn update(&self, table: Table, id: i64, patch: &Value) -> Result<(), BackendError> {
        let request = self
            .http
            .patch(self.table_url(table))
            .query(&[("id", format!("eq.{id}"))])
            .header(PREFER, "return=minimal")
            .json(patch);
        send(request).await?;
        Ok(())
    }

    /// Exact row count, read from the `Content-Range` header
    #[instrument(skip(self), fields(table = %table))]
    pub async fn count(&self, table: Table) -> Result<u64, BackendError> {
        let request = self
            .http
            .head(self.table_url(table))
            .query(&[("select", "*")])
            .header(PREFER, "count=exact");
        let response = send(request).await?;
        response
            .headers()
            .get(CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range_total)
            .ok_or_else(|| BackendError::decode("missing Content-Range total"))
    }
}

/// Sends the request and turns non-2xx answers into a [`BackendError`]
async fn send(request: RequestBuilder) -> Result<Response, BackendError> {
    let response = request.send().await?;
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let code = status.as_u16();
    let body = response.text().await.unwrap_or_default();
    let err = match serde_json::from_str::<PostgrestErrorBody>(&body) {
        Ok(parsed) => parsed.into_backend_error(code),
        Err(_) if body.trim().is_empty() => {
            BackendError::new(format!("Request failed with status {status}")).with_status(code)
        }
        Err(_) => BackendError::new(body.trim().to_string()).with_status(code),
    };
    debug!(status = code, error = %err, "Backend rejected request");
    Err(err)
}

/// `0-24/25` → 25, `*/0` → 0
fn parse_content_range_total(range: &str) -> Option<u64> {
    range.rsplit_once('/')?.1.trim().parse().ok()
}
