//! Minimal HTTP client for the gateway's control endpoints.

use parley_bridge::{LogPage, StartReceipt, StartRequest, StatusReport, StopReceipt};
use parley_config::AppConfig;
use parley_gateway::{ErrorBody, ServiceStatus};
use serde::de::DeserializeOwned;
use std::time::Duration;

pub struct GatewayClient {
    base_url: String,
    http: reqwest::Client,
}

impl GatewayClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, Box<dyn std::error::Error>> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    /// `--gateway` if given, else the configured listen address.
    pub fn resolve(
        explicit: Option<&str>,
        config: &AppConfig,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        match explicit {
            Some(url) => Self::new(url),
            None => {
                // A wildcard bind is reached through loopback.
                let host = match config.gateway.host.as_str() {
                    "0.0.0.0" | "::" => "127.0.0.1",
                    host => host,
                };
                Self::new(format!("http://{host}:{}", config.gateway.port))
            }
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn health(&self) -> Result<(), Box<dyn std::error::Error>> {
        let _: serde_json::Value = self.get("/health").await?;
        Ok(())
    }

    pub async fn service_status(&self) -> Result<ServiceStatus, Box<dyn std::error::Error>> {
        self.get("/api/status").await
    }

    pub async fn start(
        &self,
        request: &StartRequest,
    ) -> Result<StartReceipt, Box<dyn std::error::Error>> {
        let response = self
            .http
            .post(self.url("/api/bridge/start"))
            .json(request)
            .send()
            .await
            .map_err(|e| self.unreachable(e))?;
        Self::decode(response).await
    }

    pub async fn stop(&self) -> Result<StopReceipt, Box<dyn std::error::Error>> {
        let response = self
            .http
            .post(self.url("/api/bridge/stop"))
            .send()
            .await
            .map_err(|e| self.unreachable(e))?;
        Self::decode(response).await
    }

    pub async fn status(&self) -> Result<StatusReport, Box<dyn std::error::Error>> {
        self.get("/api/bridge/status").await
    }

    pub async fn log(&self, limit: usize) -> Result<LogPage, Box<dyn std::error::Error>> {
        self.get(&format!("/api/bridge/log?limit={limit}")).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn unreachable(&self, e: reqwest::Error) -> Box<dyn std::error::Error> {
        format!(
            "Cannot reach the gateway at {}: {e}\n  Make sure it is running: parley serve",
            self.base_url
        )
        .into()
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, Box<dyn std::error::Error>> {
        let response = self
            .http
            .get(self.url(path))
            .send()
            .await
            .map_err(|e| self.unreachable(e))?;
        Self::decode(response).await
    }

    async fn decode<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, Box<dyn std::error::Error>> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json::<T>().await?);
        }

        let text = response.text().await.unwrap_or_default();
        match serde_json::from_str::<ErrorBody>(&text) {
            Ok(body) => Err(format!("{} ({})", body.message, body.error).into()),
            Err(_) => Err(format!("Gateway returned {}: {text}", status.as_u16()).into()),
        }
    }
}
