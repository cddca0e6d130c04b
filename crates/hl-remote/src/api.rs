//! HTTP client for the remote backend API.
//!
//! Uses reqwest to call the registration and session token endpoints.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::StatusCode;

use hl_core::config::RemoteConfig;
use hl_core::traits::RemoteBackend;
use hl_core::BackendError;
use hl_protocol::{RegisterResponse, TokenRequest, TokenResponse, REGISTER_PATH, TOKEN_PATH};

/// Remote backend reached over HTTP
#[derive(Debug)]
pub struct HttpBackend {
    http: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    /// Create a client from the remote configuration
    pub fn new(config: &RemoteConfig) -> Result<Self, BackendError> {
        if config.api_url.is_empty() {
            return Err(BackendError::Config("api_url is empty".into()));
        }

        let mut headers = HeaderMap::new();
        if let Some(token) = &config.access_token {
            let value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|_| BackendError::Config("Invalid access token format".into()))?;
            headers.insert(AUTHORIZATION, value);
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| BackendError::Config(e.to_string()))?;

        let base_url = config.api_url.trim_end_matches('/').to_string();
        Ok(Self { http, base_url })
    }

    /// Build the URL of an endpoint
    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// The backend answers 200 on success; any other status is a failure,
    /// other 2xx codes included
    fn check_status(resp: &reqwest::Response) -> Result<(), BackendError> {
        let status = resp.status();
        if status != StatusCode::OK {
            return Err(BackendError::Status(status.as_u16()));
        }
        Ok(())
    }
}

fn http_error(e: reqwest::Error) -> BackendError {
    BackendError::Http(e.to_string())
}

#[async_trait]
impl RemoteBackend for HttpBackend {
    async fn register_instance(&self) -> Result<RegisterResponse, BackendError> {
        let resp = self
            .http
            .post(self.url(REGISTER_PATH))
            .send()
            .await
            .map_err(http_error)?;
        Self::check_status(&resp)?;

        let data: RegisterResponse = resp.json().await.map_err(http_error)?;
        data.validate()?;
        Ok(data)
    }

    async fn session_token(
        &self,
        aes_key: &[u8],
        aes_iv: &[u8],
    ) -> Result<TokenResponse, BackendError> {
        let resp = self
            .http
            .post(self.url(TOKEN_PATH))
            .json(&TokenRequest::new(aes_key, aes_iv))
            .send()
            .await
            .map_err(http_error)?;
        Self::check_status(&resp)?;

        resp.json().await.map_err(http_error)
    }
}
