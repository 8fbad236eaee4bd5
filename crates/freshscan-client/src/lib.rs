//! FreshScan HTTP client
//!
//! A native Rust client for the FreshScan backend, plus the on-device cache
//! of recently viewed scans.
//!
//! # Quick Start
//!
//! ```no_run
//! use freshscan_client::FreshScanClient;
//!
//! # async fn example() -> Result<(), freshscan_client::Error> {
//! let mut client = FreshScanClient::new("http://localhost:8080");
//! client.login("alice@example.com", "secret123456").await?;
//!
//! let jpeg = std::fs::read("apple.jpg").unwrap();
//! let scan = client.analyze("apple.jpg", "image/jpeg", jpeg).await?;
//! println!("score {} ({})", scan.quality_score, scan.freshness);
//! # Ok(())
//! # }
//! ```

mod error;
pub mod recent;

pub use error::Error;
pub use recent::{MemoryRecentScans, RecentScans, StoreRecentScans};

use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use freshscan_shared::api::{
    AccountResponse, AccountView, DeleteAccountRequest, ErrorBody, HistoryQuery,
    HistoryResponse, LoginRequest, LoginResponse, RegisterRequest, ScanResponse, ScanStatsView,
    ScanView, StatsResponse, UpdateProfileRequest,
};

/// Default request timeout. Analysis calls include the server-side model
/// latency, so this is generous.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// HTTP client for the FreshScan API.
#[derive(Debug, Clone)]
pub struct FreshScanClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

/// Builder for configuring a [`FreshScanClient`].
#[derive(Debug)]
pub struct FreshScanClientBuilder {
    base_url: String,
    timeout: Duration,
    token: Option<String>,
    client: Option<Client>,
}

impl FreshScanClientBuilder {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout: DEFAULT_TIMEOUT,
            token: None,
            client: None,
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Start with a session token saved from an earlier login.
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Use a custom reqwest Client.
    pub fn client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    pub fn build(self) -> Result<FreshScanClient, Error> {
        let client = match self.client {
            Some(c) => c,
            None => Client::builder()
                .timeout(self.timeout)
                .build()
                .map_err(|e| Error::Configuration(e.to_string()))?,
        };

        Ok(FreshScanClient {
            client,
            base_url: self.base_url,
            token: self.token,
        })
    }
}

impl FreshScanClient {
    /// Create a client with default configuration.
    pub fn new(base_url: impl Into<String>) -> Self {
        FreshScanClientBuilder::new(base_url)
            .build()
            .expect("default client configuration should not fail")
    }

    pub fn builder(base_url: impl Into<String>) -> FreshScanClientBuilder {
        FreshScanClientBuilder::new(base_url)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Current session token, if logged in.
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn set_token(&mut self, token: Option<String>) {
        self.token = token;
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authed(&self, req: RequestBuilder) -> Result<RequestBuilder, Error> {
        let token = self.token.as_deref().ok_or(Error::NotLoggedIn)?;
        Ok(req.bearer_auth(token))
    }

    async fn send(req: RequestBuilder) -> Result<Response, Error> {
        let response = req
            .send()
            .await
            .map_err(|e| Error::Connection(e.to_string()))?;

        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status().as_u16();
        match response.json::<ErrorBody>().await {
            Ok(body) => Err(Error::Api {
                status,
                kind: body.kind,
                message: body.error,
            }),
            Err(_) => Err(Error::Http { status }),
        }
    }

    async fn send_json<T: DeserializeOwned>(req: RequestBuilder) -> Result<T, Error> {
        Self::send(req)
            .await?
            .json::<T>()
            .await
            .map_err(|e| Error::Deserialization(e.to_string()))
    }

    async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, Error> {
        Self::send_json(self.client.post(self.url(path)).json(body)).await
    }

    async fn get_authed<T: DeserializeOwned>(&self, path: &str) -> Result<T, Error> {
        Self::send_json(self.authed(self.client.get(self.url(path)))?).await
    }

    // =========================================================================
    // Health
    // =========================================================================

    /// Check if the server is up.
    pub async fn health(&self) -> Result<bool, Error> {
        let response = self
            .client
            .get(self.url("/health"))
            .send()
            .await
            .map_err(|e| Error::Connection(e.to_string()))?;
        Ok(response.status().is_success())
    }

    // =========================================================================
    // Auth
    // =========================================================================

    pub async fn register(
        &self,
        name: &str,
        email: &str,
        secret: &str,
    ) -> Result<AccountView, Error> {
        let req = RegisterRequest {
            name: name.to_string(),
            email: email.to_string(),
            secret: secret.to_string(),
        };
        let resp: AccountResponse = self.post_json("/auth/register", &req).await?;
        Ok(resp.account)
    }

    /// Log in and keep the returned session token for later calls.
    pub async fn login(&mut self, email: &str, secret: &str) -> Result<LoginResponse, Error> {
        let req = LoginRequest {
            email: email.to_string(),
            secret: secret.to_string(),
        };
        let resp: LoginResponse = self.post_json("/auth/login", &req).await?;
        self.token = Some(resp.token.clone());
        debug!(account_id = %resp.account.id, expires_at = %resp.expires_at, "Logged in");
        Ok(resp)
    }

    /// Forget the session token.
    pub fn logout(&mut self) {
        self.token = None;
    }

    /// Check the current session and return its account.
    pub async fn verify(&self) -> Result<AccountView, Error> {
        let resp: AccountResponse = self.get_authed("/auth/verify").await?;
        Ok(resp.account)
    }

    // =========================================================================
    // Scans
    // =========================================================================

    /// Upload a file and wait for its analysis.
    pub async fn analyze(
        &self,
        file_name: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<ScanView, Error> {
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str(content_type)
            .map_err(|e| Error::Configuration(e.to_string()))?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let req = self.authed(self.client.post(self.url("/scan/analyze")))?;
        let resp: ScanResponse = Self::send_json(req.multipart(form)).await?;
        Ok(resp.scan)
    }

    pub async fn history(&self, query: &HistoryQuery) -> Result<HistoryResponse, Error> {
        let req = self.authed(self.client.get(self.url("/scan/history")))?;
        Self::send_json(req.query(query)).await
    }

    pub async fn get_scan(&self, id: Uuid) -> Result<ScanView, Error> {
        let resp: ScanResponse = self.get_authed(&format!("/scan/{id}")).await?;
        Ok(resp.scan)
    }

    /// Download the uploaded file of a scan via its `image_path`.
    pub async fn scan_image(&self, scan: &ScanView) -> Result<Vec<u8>, Error> {
        let req = self.authed(self.client.get(self.url(&scan.image_path)))?;
        let bytes = Self::send(req)
            .await?
            .bytes()
            .await
            .map_err(|e| Error::Connection(e.to_string()))?;
        Ok(bytes.to_vec())
    }

    pub async fn delete_scan(&self, id: Uuid) -> Result<(), Error> {
        let req = self.authed(self.client.delete(self.url(&format!("/scan/{id}"))))?;
        Self::send(req).await?;
        Ok(())
    }

    // =========================================================================
    // User
    // =========================================================================

    pub async fn profile(&self) -> Result<AccountView, Error> {
        let resp: AccountResponse = self.get_authed("/user/profile").await?;
        Ok(resp.account)
    }

    pub async fn update_profile(&self, name: &str) -> Result<AccountView, Error> {
        let req = self.authed(self.client.put(self.url("/user/profile")))?;
        let resp: AccountResponse = Self::send_json(req.json(&UpdateProfileRequest {
            name: name.to_string(),
        }))
        .await?;
        Ok(resp.account)
    }

    pub async fn stats(&self) -> Result<ScanStatsView, Error> {
        let resp: StatsResponse = self.get_authed("/user/stats").await?;
        Ok(resp.stats)
    }

    /// Delete the logged-in account. The session token is dropped on success.
    pub async fn delete_account(&mut self, secret: &str) -> Result<(), Error> {
        let req = self.authed(self.client.delete(self.url("/user/account")))?;
        Self::send(req.json(&DeleteAccountRequest {
            secret: secret.to_string(),
        }))
        .await?;
        self.token = None;
        Ok(())
    }
}
