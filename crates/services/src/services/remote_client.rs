//! Client for the hosted backend's REST interface (tables, views and remote procedures).

use std::time::Duration;

use async_trait::async_trait;
use db::source::{
    DataSource, DataSourceError, Direction, Row, SelectQuery, rows_from_value, validate_identifier,
};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;
use url::Url;

const REST_PREFIX: &str = "rest/v1/";

/// Backend error codes meaning "this relation or function does not exist".
const MISSING_RESOURCE_CODES: &[&str] = &["42P01", "42883", "PGRST200", "PGRST202", "PGRST205"];

#[derive(Debug, Deserialize)]
struct BackendErrorBody {
    code: Option<String>,
    message: Option<String>,
}

pub struct RemoteClient {
    http: Client,
    rest_url: Url,
    api_key: SecretString,
}

impl std::fmt::Debug for RemoteClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteClient")
            .field("rest_url", &self.rest_url.as_str())
            .finish_non_exhaustive()
    }
}

impl RemoteClient {
    /// `timeout` is the HTTP client's own request timeout; `None` leaves requests unbounded.
    pub fn new(
        base_url: &str,
        api_key: SecretString,
        timeout: Option<Duration>,
    ) -> Result<Self, DataSourceError> {
        let rest_url = rest_url(base_url)?;

        let mut builder =
            Client::builder().user_agent(concat!("kitline/", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|e| DataSourceError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            rest_url,
            api_key,
        })
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        let key = self.api_key.expose_secret();
        request
            .header("apikey", key)
            .bearer_auth(key)
            .header("accept", "application/json")
    }

    async fn rows(response: Response, resource: &str) -> Result<Vec<Row>, DataSourceError> {
        let status = response.status();
        if status.is_success() {
            if status == StatusCode::NO_CONTENT {
                return Ok(Vec::new());
            }
            let value = response
                .json::<Value>()
                .await
                .map_err(|e| DataSourceError::Serde(e.to_string()))?;
            return rows_from_value(value);
        }

        let body = response.text().await.unwrap_or_default();
        Err(classify_failure(status, &body, resource))
    }
}

#[async_trait]
impl DataSource for RemoteClient {
    async fn select(
        &self,
        resource: &str,
        query: &SelectQuery,
    ) -> Result<Vec<Row>, DataSourceError> {
        let url = select_url(&self.rest_url, resource, query)?;
        debug!(resource, url = %url, "remote select");

        let response = self
            .authorized(self.http.get(url))
            .send()
            .await
            .map_err(map_reqwest_error)?;
        Self::rows(response, resource).await
    }

    async fn call_procedure(&self, name: &str, args: Value) -> Result<Vec<Row>, DataSourceError> {
        let url = procedure_url(&self.rest_url, name)?;
        debug!(procedure = name, url = %url, "remote procedure call");

        let body = if args.is_null() {
            Value::Object(Default::default())
        } else {
            args
        };
        let response = self
            .authorized(self.http.post(url))
            .json(&body)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        Self::rows(response, name).await
    }
}

fn rest_url(base_url: &str) -> Result<Url, DataSourceError> {
    let mut base = Url::parse(base_url)
        .map_err(|e| DataSourceError::Transport(format!("invalid backend url {}: {}", base_url, e)))?;
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.join(REST_PREFIX)
        .map_err(|e| DataSourceError::Transport(e.to_string()))
}

fn select_url(rest_url: &Url, resource: &str, query: &SelectQuery) -> Result<Url, DataSourceError> {
    let mut url = rest_url
        .join(validate_identifier(resource)?)
        .map_err(|e| DataSourceError::Transport(e.to_string()))?;
    {
        let mut pairs = url.query_pairs_mut();
        pairs.append_pair("select", &query.select.replace(' ', ""));
        if let Some(order) = &query.order {
            let direction = match order.direction {
                Direction::Asc => "asc",
                Direction::Desc => "desc",
            };
            pairs.append_pair(
                "order",
                &format!("{}.{}", validate_identifier(&order.column)?, direction),
            );
        }
        if let Some(limit) = query.limit {
            pairs.append_pair("limit", &limit.to_string());
        }
    }
    Ok(url)
}

fn procedure_url(rest_url: &Url, name: &str) -> Result<Url, DataSourceError> {
    rest_url
        .join(&format!("rpc/{}", validate_identifier(name)?))
        .map_err(|e| DataSourceError::Transport(e.to_string()))
}

fn classify_failure(status: StatusCode, body: &str, resource: &str) -> DataSourceError {
    let parsed = serde_json::from_str::<BackendErrorBody>(body).ok();
    let code = parsed.as_ref().and_then(|b| b.code.as_deref());
    let message = parsed
        .as_ref()
        .and_then(|b| b.message.clone())
        .unwrap_or_else(|| body.to_string());

    if code.is_some_and(|code| MISSING_RESOURCE_CODES.contains(&code)) {
        return DataSourceError::NotFound(format!("{}: {}", resource, message));
    }
    match status {
        StatusCode::NOT_FOUND => DataSourceError::NotFound(format!("{}: {}", resource, message)),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            DataSourceError::Denied(format!("{}: {}", resource, message))
        }
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => DataSourceError::Timeout,
        s => DataSourceError::Http {
            status: s.as_u16(),
            body: body.to_string(),
        },
    }
}

fn map_reqwest_error(e: reqwest::Error) -> DataSourceError {
    if e.is_timeout() {
        DataSourceError::Timeout
    } else {
        DataSourceError::Transport(e.to_string())
    }
}
