use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use super::fetcher::{FetchRequest, FetchResponse, Fetcher};

const REQUEST_ID_HEADER: &str = "x-request-id";

/// `Fetcher` backed by a shared reqwest client.
#[derive(Clone)]
pub struct ReqwestFetcher {
    client: Client,
}

impl Default for ReqwestFetcher {
    fn default() -> Self {
        Self {
            client: Client::new(),
        }
    }
}

impl ReqwestFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Fetcher for ReqwestFetcher {
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse> {
        let FetchRequest {
            method,
            url,
            headers,
            body,
            request_id,
        } = request;

        let mut builder = self.client.request(method.clone(), &url).headers(headers);
        if let Some(id) = &request_id {
            builder = builder.header(REQUEST_ID_HEADER, id);
        }
        if let Some(body) = &body {
            builder = builder.json(body);
        }

        let resp = builder
            .send()
            .await
            .map_err(|e| anyhow!("Failed to call {} {}: {}", method, url, e))?;

        let status = resp.status();
        let headers = resp.headers().clone();
        let text = resp
            .text()
            .await
            .map_err(|e| anyhow!("Failed to read response of {} {}: {}", method, url, e))?;
        let data = serde_json::from_str::<Value>(&text).unwrap_or(Value::Null);

        debug!(%url, status = status.as_u16(), request_id = ?request_id, "analytics call finished");

        Ok(FetchResponse {
            status,
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            data,
        })
    }
}
