//! HTTP client for the InfluxDB v2 query API

use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::error::{FluxError, FluxResult};
use crate::config::InfluxConfig;

/// Runs a Flux script and returns the annotated CSV body
#[async_trait]
pub trait FluxRunner: Send + Sync {
    async fn run(&self, script: &str) -> FluxResult<String>;
}

#[derive(Serialize)]
struct QueryBody<'a> {
    query: &'a str,
    dialect: Dialect,
}

#[derive(Serialize)]
struct Dialect {
    annotations: [&'static str; 3],
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// `reqwest` client bound to one InfluxDB organization
#[derive(Clone)]
pub struct InfluxClient {
    http: reqwest::Client,
    url: String,
    token: String,
    organization: String,
}

impl InfluxClient {
    pub fn new(config: &InfluxConfig) -> FluxResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self {
            http,
            url: config.url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            organization: config.organization.clone(),
        })
    }

    fn query_url(&self) -> String {
        format!("{}/api/v2/query", self.url)
    }
}

#[async_trait]
impl FluxRunner for InfluxClient {
    async fn run(&self, script: &str) -> FluxResult<String> {
        let body = QueryBody {
            query: script,
            dialect: Dialect {
                annotations: ["datatype", "group", "default"],
            },
        };

        let response = self
            .http
            .post(self.query_url())
            .query(&[("org", self.organization.as_str())])
            .header(AUTHORIZATION, format!("Token {}", self.token))
            .header(ACCEPT, "application/csv")
            .header(CONTENT_TYPE, "application/json")
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let text = response.text().await.map_err(transport_error)?;
        if !status.is_success() {
            let message = serde_json::from_str::<ErrorBody>(&text)
                .ok()
                .and_then(|b| b.message)
                .unwrap_or(text);
            tracing::warn!(status = status.as_u16(), message = %message, "InfluxDB query rejected");
            return Err(FluxError::Status {
                status: status.as_u16(),
                message,
            });
        }
        Ok(text)
    }
}

fn transport_error(err: reqwest::Error) -> FluxError {
    tracing::error!(error = %err, timeout = err.is_timeout(), "InfluxDB request failed");
    FluxError::Connection
}
