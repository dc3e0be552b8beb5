use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::{Client, Method};
use shared::{Error, Result};
use stash::{Headers, RequestConfig, Response, Transport};
use std::sync::Arc;
use std::time::Duration;

/// Transport executor backed by a shared reqwest client
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(Error::transport)?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(&self, config: RequestConfig) -> Result<Response> {
        let method =
            Method::from_bytes(config.method.to_ascii_uppercase().as_bytes()).map_err(Error::transport)?;

        let mut request = self.client.request(method, config.uri());
        for (name, value) in config.headers.iter() {
            request = request.header(name, value);
        }
        if let Some(data) = &config.data {
            request = request.body(data.clone());
        }

        let response = request.send().await.map_err(Error::transport)?;

        let status = response.status();
        let headers = collect_headers(response.headers());
        let final_url = response.url().clone();
        let data = response.bytes().await.map_err(Error::transport)?;

        Ok(Response {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            data,
            config,
            request: Some(Arc::new(final_url)),
        })
    }
}

/// Flatten a header map; repeated headers are joined with ", "
fn collect_headers(map: &HeaderMap) -> Headers {
    let mut headers = Headers::new();
    for (name, value) in map.iter() {
        let Ok(value) = value.to_str() else {
            continue;
        };
        let joined = match headers.get(name.as_str()) {
            Some(existing) => format!("{}, {}", existing, value),
            None => value.to_string(),
        };
        headers.insert(name.as_str(), joined);
    }
    headers
}
