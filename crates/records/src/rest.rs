//! PostgREST client for the hosted database.

use async_trait::async_trait;
use reqwest::header::{CONTENT_RANGE, HeaderMap, HeaderValue};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use crate::backend::{Backend, Filter, Record};
use crate::config::BackendConfig;
use crate::errors::{ServiceError, ServiceResult};
use crate::models::EntityKind;
use crate::query::QueryBuilder;

const RETURN_REPRESENTATION: &str = "return=representation";
const RETURN_MINIMAL: &str = "return=minimal";
const COUNT_EXACT: &str = "count=exact";

/// Error body PostgREST sends with every non-2xx response.
#[derive(Debug, Deserialize)]
struct PostgrestError {
    message: String,
    #[serde(default)]
    details: Option<String>,
}

/// [`Backend`] over the hosted REST layer.
#[derive(Clone)]
pub struct RestBackend {
    client: Client,
    base_url: String,
    api_key: String,
}

impl RestBackend {
    pub fn new(config: &BackendConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        }
    }

    fn table_url(&self, kind: EntityKind) -> String {
        format!("{}/rest/v1/{}", self.base_url, kind.table())
    }

    fn request(&self, method: Method, kind: EntityKind, query: &QueryBuilder) -> RequestBuilder {
        debug!("{} {} ?{}", method, kind, query.to_query_string());
        self.client
            .request(method, self.table_url(kind))
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .query(&query.build())
    }

    /// Passes 2xx responses through and turns everything else into a [`ServiceError`].
    async fn check(resp: Response) -> ServiceResult<Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let body = resp.text().await.unwrap_or_default();
        let message = match serde_json::from_str::<PostgrestError>(&body) {
            Ok(err) => match err.details {
                Some(details) if !details.is_empty() => format!("{}: {details}", err.message),
                _ => err.message,
            },
            Err(_) if body.is_empty() => format!("Status {status}"),
            Err(_) => format!("Status {status}: {body}"),
        };

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ServiceError::NotFound(message));
        }
        Err(ServiceError::Backend {
            status: status.as_u16(),
            message,
        })
    }

    fn by_id(id: i64) -> QueryBuilder {
        let mut qb = QueryBuilder::new();
        qb.eq("id", &json!(id));
        qb
    }
}

/// Total from a `Content-Range` header: `0-9/10` or `*/0`.
fn parse_content_range(headers: &HeaderMap) -> ServiceResult<usize> {
    let range = headers
        .get(CONTENT_RANGE)
        .and_then(|v: &HeaderValue| v.to_str().ok())
        .ok_or_else(|| ServiceError::InvalidInput("response has no Content-Range".into()))?;
    range
        .rsplit_once('/')
        .and_then(|(_, total)| total.parse().ok())
        .ok_or_else(|| ServiceError::InvalidInput(format!("unparseable Content-Range {range:?}")))
}

#[async_trait]
impl Backend for RestBackend {
    async fn select(&self, kind: EntityKind, filter: Option<&Filter>) -> ServiceResult<Vec<Record>> {
        let mut qb = QueryBuilder::new();
        qb.select("*").filter(filter).order_by("id", true);

        let resp = self.request(Method::GET, kind, &qb).send().await?;
        Ok(Self::check(resp).await?.json().await?)
    }

    async fn insert(&self, kind: EntityKind, rows: Vec<Value>) -> ServiceResult<Vec<Record>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let mut qb = QueryBuilder::new();
        qb.select("*");
        let resp = self
            .request(Method::POST, kind, &qb)
            .header("Prefer", RETURN_REPRESENTATION)
            .json(&rows)
            .send()
            .await?;
        Ok(Self::check(resp).await?.json().await?)
    }

    async fn update(&self, kind: EntityKind, id: i64, patch: Record) -> ServiceResult<Record> {
        let resp = self
            .request(Method::PATCH, kind, &Self::by_id(id))
            .header("Prefer", RETURN_REPRESENTATION)
            .json(&patch)
            .send()
            .await?;
        let rows: Vec<Record> = Self::check(resp).await?.json().await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| ServiceError::not_found(kind, id))
    }

    async fn delete(&self, kind: EntityKind, id: i64) -> ServiceResult<()> {
        let resp = self
            .request(Method::DELETE, kind, &Self::by_id(id))
            .header("Prefer", RETURN_REPRESENTATION)
            .send()
            .await?;
        let rows: Vec<Record> = Self::check(resp).await?.json().await?;
        if rows.is_empty() {
            return Err(ServiceError::not_found(kind, id));
        }
        Ok(())
    }

    async fn clear(&self, kind: EntityKind) -> ServiceResult<()> {
        // PostgREST refuses unfiltered deletes; ids start at 1 so this matches every row.
        let mut qb = QueryBuilder::new();
        qb.neq("id", &json!(0));
        let resp = self
            .request(Method::DELETE, kind, &qb)
            .header("Prefer", RETURN_MINIMAL)
            .send()
            .await?;
        Self::check(resp).await?;
        Ok(())
    }

    async fn count(&self, kind: EntityKind) -> ServiceResult<usize> {
        let mut qb = QueryBuilder::new();
        qb.select("*");
        let resp = self
            .request(Method::HEAD, kind, &qb)
            .header("Prefer", COUNT_EXACT)
            .send()
            .await?;
        let resp = Self::check(resp).await?;
        parse_content_range(resp.headers())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(range: &str) -> HeaderMap {
        let mut map = HeaderMap::new();
        map.insert(CONTENT_RANGE, HeaderValue::from_str(range).unwrap());
        map
    }

    #[test]
    fn test_content_range_full() {
        assert_eq!(parse_content_range(&headers("0-9/10")).unwrap(), 10);
    }

    #[test]
    fn test_content_range_empty_table() {
        assert_eq!(parse_content_range(&headers("*/0")).unwrap(), 0);
    }

    #[test]
    fn test_content_range_unknown_total() {
        assert!(parse_content_range(&headers("0-9/*")).is_err());
        assert!(parse_content_range(&HeaderMap::new()).is_err());
    }

    #[test]
    fn test_table_url() {
        let backend = RestBackend::new(&BackendConfig {
            url: "https://abc.supabase.co/".into(),
            api_key: "k".into(),
        });
        assert_eq!(
            backend.table_url(EntityKind::Photos),
            "https://abc.supabase.co/rest/v1/photos"
        );
    }
}
