// console/src/backend/http.rs
use std::time::Duration;

use async_trait::async_trait;
use common::{
    ClientRecord, Config, CreateClientRequest, ProvisionRequest, ReportRequest,
    UpdateClientRequest,
};
use reqwest::{Client, RequestBuilder, Response};

use super::{AuthBackend, BackendError, ClientBackend};

const LOGIN_PATH: &str = "/Api/Login";
const LIST_CLIENTS_PATH: &str = "/api/GetCredits";
const CREATE_CLIENT_PATH: &str = "/Api/CreateClient";
const CLIENT_PATH: &str = "/api/Client";
const PROVISION_PATH: &str = "/api/AsignCredits";
const DISCOUNTS_PATH: &str = "/api/GetDiscount";
const REPORT_PATH: &str = "/api/GetReport";

/// reqwest implementation of the backend REST surface
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, BackendError> {
        Self::new(
            config.backend_base(),
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, BackendError> {
        let response = request.send().await.map_err(map_transport)?;
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            tracing::debug!("Backend answered {} for {}", status, response.url());
            Err(BackendError::Status(status.as_u16()))
        }
    }
}

fn map_transport(e: reqwest::Error) -> BackendError {
    if e.is_connect() || e.is_timeout() {
        BackendError::NoResponse(e.to_string())
    } else if let Some(status) = e.status() {
        BackendError::Status(status.as_u16())
    } else {
        BackendError::Transport(e.to_string())
    }
}

/// The login endpoint answers with the bare token, sometimes JSON-quoted
pub(crate) fn parse_token_body(body: &str) -> Result<String, BackendError> {
    let trimmed = body.trim();
    let token = if trimmed.starts_with('"') {
        serde_json::from_str::<String>(trimmed).map_err(|e| BackendError::Decode(e.to_string()))?
    } else {
        trimmed.to_string()
    };

    if token.is_empty() {
        return Err(BackendError::Decode("empty token".to_string()));
    }
    Ok(token)
}

#[async_trait]
impl AuthBackend for HttpBackend {
    async fn login(&self, email: &str, password: &str) -> Result<String, BackendError> {
        let request = self
            .client
            .post(self.url(LOGIN_PATH))
            .json(&serde_json::json!({ "email": email, "password": password }));

        let body = self
            .send(request)
            .await?
            .text()
            .await
            .map_err(|e| BackendError::Decode(e.to_string()))?;

        parse_token_body(&body)
    }
}

#[async_trait]
impl ClientBackend for HttpBackend {
    async fn list_clients(&self, token: &str) -> Result<Vec<ClientRecord>, BackendError> {
        let request = self.client.get(self.url(LIST_CLIENTS_PATH)).bearer_auth(token);
        self.send(request)
            .await?
            .json::<Vec<ClientRecord>>()
            .await
            .map_err(|e| BackendError::Decode(e.to_string()))
    }

    async fn create_client(&self, token: &str, body: &CreateClientRequest) -> Result<(), BackendError> {
        let request = self
            .client
            .post(self.url(CREATE_CLIENT_PATH))
            .bearer_auth(token)
            .json(body);
        self.send(request).await.map(|_| ())
    }

    async fn update_client(&self, token: &str, body: &UpdateClientRequest) -> Result<(), BackendError> {
        let request = self
            .client
            .patch(self.url(CLIENT_PATH))
            .bearer_auth(token)
            .json(body);
        self.send(request).await.map(|_| ())
    }

    async fn provision(&self, token: &str, body: &ProvisionRequest) -> Result<(), BackendError> {
        let request = self
            .client
            .post(self.url(PROVISION_PATH))
            .bearer_auth(token)
            .json(body);
        self.send(request).await.map(|_| ())
    }

    async fn discount_options(&self, token: &str) -> Result<serde_json::Value, BackendError> {
        let request = self.client.get(self.url(DISCOUNTS_PATH)).bearer_auth(token);
        self.send(request)
            .await?
            .json::<serde_json::Value>()
            .await
            .map_err(|e| BackendError::Decode(e.to_string()))
    }

    async fn report(&self, token: &str, body: &ReportRequest) -> Result<Vec<u8>, BackendError> {
        let request = self
            .client
            .post(self.url(REPORT_PATH))
            .bearer_auth(token)
            .json(body);
        let bytes = self
            .send(request)
            .await?
            .bytes()
            .await
            .map_err(|e| BackendError::Decode(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}
