use crate::config::PunchSourceConfig;
use crate::source::payloads::{
    Page, RemoteDepartment, RemoteEmployee, RemoteTransaction, TokenRequest, TokenResponse,
};
use crate::source::{PunchSource, SourceError, TransactionQuery};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::{Client, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const TOKEN_ENDPOINT: &str = "/api-token-auth/";
const DEPARTMENTS_ENDPOINT: &str = "/personnel/api/departments/";
const EMPLOYEES_ENDPOINT: &str = "/personnel/api/employees/";
const TRANSACTIONS_ENDPOINT: &str = "/att/api/transactionReport/";
const PAGE_SIZE: &str = "200";

/// Client for a ZKBio time-clock server using token authentication.
pub struct ZkClient {
    http_client: Client,
    base_url: String,
    username: String,
    password: String,
    token: Mutex<Option<String>>,
}

impl ZkClient {
    pub fn new(config: &PunchSourceConfig) -> Result<Self, SourceError> {
        let http_client = Client::builder().timeout(Duration::from_secs(60)).build()?;

        Ok(Self {
            http_client,
            base_url: config.url.trim_end_matches('/').to_string(),
            username: config.username.clone(),
            password: config.password.clone(),
            token: Mutex::new(None),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn request_token(&self) -> Result<String, SourceError> {
        let response = self
            .http_client
            .post(self.endpoint(TOKEN_ENDPOINT))
            .header(ACCEPT, "application/json")
            .json(&TokenRequest {
                username: &self.username,
                password: &self.password,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|e| format!("Failed to read error body: {}", e));
            return Err(SourceError::Authentication { status, message });
        }

        let body: TokenResponse = serde_json::from_slice(&response.bytes().await?)?;
        info!("Obtained punch source token for {}", self.username);
        Ok(body.token)
    }

    /// Cached token, or a fresh one when `renew` is set or nothing is cached.
    async fn token(&self, renew: bool) -> Result<String, SourceError> {
        let mut guard = self.token.lock().await;
        match &*guard {
            Some(token) if !renew => Ok(token.clone()),
            _ => {
                let token = self.request_token().await?;
                *guard = Some(token.clone());
                Ok(token)
            }
        }
    }

    async fn send(&self, url: &str, token: &str) -> Result<Response, SourceError> {
        debug!("GET {}", url);
        Ok(self
            .http_client
            .get(url)
            .header(AUTHORIZATION, format!("Token {}", token))
            .header(ACCEPT, "application/json")
            .send()
            .await?)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, SourceError> {
        let token = self.token(false).await?;
        let mut response = self.send(url, &token).await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            warn!("Punch source rejected the token, renewing and retrying once");
            let token = self.token(true).await?;
            response = self.send(url, &token).await?;
        }

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|e| format!("Failed to read error body: {}", e));
            return Err(SourceError::Api { status, message });
        }

        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Follows `next` links until the last page.
    async fn get_all<T: DeserializeOwned>(&self, first_url: String) -> Result<Vec<T>, SourceError> {
        let mut items = Vec::new();
        let mut next = Some(first_url);
        let mut pages = 0;

        while let Some(url) = next {
            let page: Page<T> = self.get_json(&url).await?;
            items.extend(page.data);
            next = next_page(&url, page.next);
            pages += 1;
        }

        debug!("Fetched {} items over {} pages", items.len(), pages);
        Ok(items)
    }

    pub fn transaction_url(&self, query: &TransactionQuery) -> Result<String, SourceError> {
        let join_or_all = |ids: &[String]| {
            if ids.is_empty() {
                "-1".to_string()
            } else {
                ids.join(",")
            }
        };

        let start_date = query.start_date.format("%Y-%m-%d").to_string();
        let end_date = query.end_date.format("%Y-%m-%d").to_string();
        let departments = join_or_all(&query.departments);
        let employees = join_or_all(&query.employees);

        let url = Url::parse_with_params(
            &self.endpoint(TRANSACTIONS_ENDPOINT),
            &[
                ("page", "1"),
                ("page_size", PAGE_SIZE),
                ("start_date", start_date.as_str()),
                ("end_date", end_date.as_str()),
                ("departments", departments.as_str()),
                ("areas", "-1"),
                ("groups", "-1"),
                ("employees", employees.as_str()),
            ],
        )
        .map_err(|e| SourceError::InvalidUrl(e.to_string()))?;

        Ok(url.to_string())
    }
}

/// The following page, unless the server points back at the current one.
fn next_page(current: &str, next: Option<String>) -> Option<String> {
    match next {
        Some(next) if next == current => {
            warn!("Punch source returned {} as its own next page, stopping", current);
            None
        }
        other => other,
    }
}

#[async_trait]
impl PunchSource for ZkClient {
    async fn departments(&self) -> Result<Vec<RemoteDepartment>, SourceError> {
        self.get_all(self.endpoint(DEPARTMENTS_ENDPOINT)).await
    }

    async fn employees(&self) -> Result<Vec<RemoteEmployee>, SourceError> {
        self.get_all(self.endpoint(EMPLOYEES_ENDPOINT)).await
    }

    async fn transactions(&self, query: &TransactionQuery) -> Result<Vec<RemoteTransaction>, SourceError> {
        let url = self.transaction_url(query)?;
        self.get_all(url).await
    }
}
