pub mod client;
pub mod ingest;
pub mod payloads;

use async_trait::async_trait;
use chrono::NaiveDate;
use payloads::{RemoteDepartment, RemoteEmployee, RemoteTransaction};
use reqwest::StatusCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("HTTP request failed")]
    Request(#[from] reqwest::Error),

    #[error("JSON processing error")]
    Json(#[from] serde_json::Error),

    #[error("Invalid punch source URL: {0}")]
    InvalidUrl(String),

    #[error("Authentication failed: Status={status}, Message='{message}'")]
    Authentication { status: StatusCode, message: String },

    #[error("Punch source error: Status={status}, Message='{message}'")]
    Api { status: StatusCode, message: String },
}

/// Filter for the transaction report. Empty lists mean "all".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionQuery {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub departments: Vec<String>,
    pub employees: Vec<String>,
}

/// Remote time-clock service. Every call returns all pages.
#[async_trait]
pub trait PunchSource: Send + Sync {
    async fn departments(&self) -> Result<Vec<RemoteDepartment>, SourceError>;

    async fn employees(&self) -> Result<Vec<RemoteEmployee>, SourceError>;

    async fn transactions(&self, query: &TransactionQuery) -> Result<Vec<RemoteTransaction>, SourceError>;
}
