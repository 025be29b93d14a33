use std::time::Duration;

use serde_json::{Map, Value};

use super::{normalize_path, DocumentStore, StoreError};

pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Realtime-database REST backend (`{url}/{path}.json?auth={secret}`).
#[derive(Debug, Clone)]
pub struct FirebaseDocumentStore {
    database_url: String,
    secret: String,
    http: reqwest::blocking::Client,
}

impl FirebaseDocumentStore {
    pub fn new(database_url: &str, secret: &str) -> Result<Self, StoreError> {
        Self::with_timeout(database_url, secret, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    pub fn with_timeout(
        database_url: &str,
        secret: &str,
        timeout: Duration,
    ) -> Result<Self, StoreError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(Self {
            database_url: database_url.trim().trim_end_matches('/').to_string(),
            secret: secret.trim().to_string(),
            http,
        })
    }

    fn url(&self, path: &str) -> Result<String, StoreError> {
        let path = normalize_path(path)?;
        Ok(format!("{}/{}.json", self.database_url, path))
    }

    fn check(response: reqwest::blocking::Response) -> Result<reqwest::blocking::Response, StoreError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().unwrap_or_default();
        Err(StoreError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

impl DocumentStore for FirebaseDocumentStore {
    fn get(&self, path: &str) -> Result<Option<Value>, StoreError> {
        let response = self
            .http
            .get(self.url(path)?)
            .query(&[("auth", self.secret.as_str())])
            .send()?;
        let value: Value = Self::check(response)?.json()?;
        Ok(match value {
            Value::Null => None,
            other => Some(other),
        })
    }

    fn set(&self, path: &str, value: &Value) -> Result<(), StoreError> {
        let response = self
            .http
            .put(self.url(path)?)
            .query(&[("auth", self.secret.as_str()), ("print", "silent")])
            .json(value)
            .send()?;
        Self::check(response)?;
        Ok(())
    }

    fn update(&self, path: &str, fields: &Map<String, Value>) -> Result<(), StoreError> {
        for key in fields.keys() {
            normalize_path(key)?;
        }
        let response = self
            .http
            .patch(self.url(path)?)
            .query(&[("auth", self.secret.as_str()), ("print", "silent")])
            .json(fields)
            .send()?;
        Self::check(response)?;
        Ok(())
    }

    fn ping(&self) -> Result<(), StoreError> {
        let response = self
            .http
            .get(format!("{}/.json", self.database_url))
            .query(&[("auth", self.secret.as_str()), ("shallow", "true")])
            .send()?;
        Self::check(response)?;
        Ok(())
    }
}
