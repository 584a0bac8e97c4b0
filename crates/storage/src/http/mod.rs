use std::env;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracker_core::Clock;
use tracker_core::model::{
    Category, CourseId, CourseWithProgress, ProgressInput, ProgressRecord, ProgressSummary,
};
use url::Url;

use crate::repository::{StorageError, SyncReport, TrackerBackend};

mod mapping;

use mapping::{CourseDto, ProgressDto, SummaryDto, SyncReportDto, error_detail};

pub const DEFAULT_API_URL: &str = "http://localhost:8001/api";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_SYNC_PATH: &str = "sync-courses";

const API_URL_VAR: &str = "TRACKER_API_URL";
const TIMEOUT_VAR: &str = "TRACKER_API_TIMEOUT_SECS";
const SYNC_PATH_VAR: &str = "TRACKER_SYNC_PATH";

/// Connection settings for the tracker API.
#[derive(Clone, Debug)]
pub struct HttpBackendConfig {
    pub base_url: Url,
    pub timeout: Duration,
    pub sync_path: String,
}

impl HttpBackendConfig {
    /// Settings for the given base URL with default timeout and sync path.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::InvalidConfig` if the URL cannot be parsed.
    pub fn new(base_url: &str) -> Result<Self, StorageError> {
        Ok(Self {
            base_url: parse_base_url(base_url)?,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            sync_path: DEFAULT_SYNC_PATH.to_owned(),
        })
    }

    /// Read `TRACKER_API_URL`, `TRACKER_API_TIMEOUT_SECS` and `TRACKER_SYNC_PATH`,
    /// falling back to defaults for unset values.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::InvalidConfig` for an unparseable URL or timeout.
    pub fn from_env() -> Result<Self, StorageError> {
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Same as [`Self::from_env`], reading variables through `var`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::InvalidConfig` for an unparseable URL or timeout.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self, StorageError> {
        let base_url = var(API_URL_VAR).unwrap_or_else(|| DEFAULT_API_URL.into());
        Self::new(&base_url)?.with_vars(var)
    }

    /// Apply `TRACKER_API_TIMEOUT_SECS` and `TRACKER_SYNC_PATH` from the
    /// environment, keeping the base URL.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::InvalidConfig` for an unparseable timeout.
    pub fn with_env(self) -> Result<Self, StorageError> {
        self.with_vars(|key| env::var(key).ok())
    }

    fn with_vars(mut self, var: impl Fn(&str) -> Option<String>) -> Result<Self, StorageError> {
        if let Some(raw) = var(TIMEOUT_VAR) {
            let secs: u64 = raw.trim().parse().map_err(|_| {
                StorageError::InvalidConfig(format!("invalid {TIMEOUT_VAR}: {raw}"))
            })?;
            self.timeout = Duration::from_secs(secs);
        }
        if let Some(path) = var(SYNC_PATH_VAR) {
            let path = path.trim().trim_matches('/');
            if !path.is_empty() {
                self.sync_path = path.to_owned();
            }
        }
        Ok(self)
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

// `Url::join` drops the last segment unless the base ends with a slash.
fn parse_base_url(raw: &str) -> Result<Url, StorageError> {
    let trimmed = raw.trim();
    let with_slash = if trimmed.ends_with('/') {
        trimmed.to_owned()
    } else {
        format!("{trimmed}/")
    };
    let url = Url::parse(&with_slash)
        .map_err(|e| StorageError::InvalidConfig(format!("invalid API url {raw:?}: {e}")))?;
    if url.cannot_be_a_base() {
        return Err(StorageError::InvalidConfig(format!(
            "API url cannot be a base: {raw:?}"
        )));
    }
    Ok(url)
}

#[derive(Debug, Clone, Copy)]
enum Call {
    Read,
    Progress,
    Sync,
}

/// `TrackerBackend` speaking JSON over HTTP to the tracker API.
#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    config: HttpBackendConfig,
    clock: Clock,
}

impl HttpBackend {
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the HTTP client cannot be built.
    pub fn new(config: HttpBackendConfig, clock: Clock) -> Result<Self, StorageError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(Self {
            client,
            config,
            clock,
        })
    }

    #[must_use]
    pub fn config(&self) -> &HttpBackendConfig {
        &self.config
    }

    fn endpoint(&self, path: &str) -> Result<Url, StorageError> {
        self.config
            .base_url
            .join(path)
            .map_err(|e| StorageError::InvalidConfig(e.to_string()))
    }

    async fn check(response: Response, call: Call) -> Result<Response, StorageError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let detail = error_detail(&body);
        tracing::debug!(status = status.as_u16(), %detail, "tracker API returned an error");

        Err(match (status, call) {
            (StatusCode::NOT_FOUND, Call::Progress) => StorageError::NotFound,
            (StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY, Call::Progress) => {
                StorageError::Validation(detail)
            }
            (_, Call::Sync) => StorageError::Sync(format!("status {}: {detail}", status.as_u16())),
            _ => StorageError::HttpStatus(status.as_u16()),
        })
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, StorageError> {
        response.json::<T>().await.map_err(transport)
    }
}

fn transport(e: reqwest::Error) -> StorageError {
    if e.is_decode() {
        StorageError::Serialization(e.to_string())
    } else {
        StorageError::Network(e.to_string())
    }
}

#[async_trait]
impl TrackerBackend for HttpBackend {
    async fn list_courses(
        &self,
        category: Option<Category>,
    ) -> Result<Vec<CourseWithProgress>, StorageError> {
        let mut request = self.client.get(self.endpoint("courses")?);
        if let Some(category) = category {
            request = request.query(&[("category", category.as_str())]);
        }
        let response = request.send().await.map_err(transport)?;
        let response = Self::check(response, Call::Read).await?;
        let dtos: Vec<CourseDto> = Self::decode(response).await?;

        let now = self.clock.now();
        let courses = dtos
            .into_iter()
            .map(|dto| dto.into_domain(now))
            .collect::<Result<Vec<_>, _>>()?;
        tracing::debug!(count = courses.len(), ?category, "fetched courses");
        Ok(courses)
    }

    async fn update_progress(
        &self,
        course_id: CourseId,
        input: &ProgressInput,
    ) -> Result<ProgressRecord, StorageError> {
        let url = self.endpoint(&format!("courses/{course_id}/progress"))?;
        let response = self
            .client
            .post(url)
            .json(input)
            .send()
            .await
            .map_err(transport)?;
        let response = Self::check(response, Call::Progress).await?;
        let dto: ProgressDto = Self::decode(response).await?;
        dto.into_record(self.clock.now())
    }

    async fn fetch_summary(&self) -> Result<ProgressSummary, StorageError> {
        let response = self
            .client
            .get(self.endpoint("progress/summary")?)
            .send()
            .await
            .map_err(transport)?;
        let response = Self::check(response, Call::Read).await?;
        let dto: SummaryDto = Self::decode(response).await?;
        Ok(dto.into())
    }

    async fn sync_courses(&self) -> Result<SyncReport, StorageError> {
        let response = self
            .client
            .post(self.endpoint(&self.config.sync_path)?)
            .send()
            .await
            .map_err(transport)?;
        let response = Self::check(response, Call::Sync).await?;
        let body = response.text().await.map_err(transport)?;
        // Older servers answer with a bare message; counts are then unknown.
        let dto = serde_json::from_str::<SyncReportDto>(&body).unwrap_or_default();
        Ok(dto.into())
    }

    async fn list_categories(&self) -> Result<Vec<Category>, StorageError> {
        let response = self
            .client
            .get(self.endpoint("categories")?)
            .send()
            .await
            .map_err(transport)?;
        let response = Self::check(response, Call::Read).await?;
        let raw: Vec<String> = Self::decode(response).await?;
        let mut categories = Vec::with_capacity(raw.len());
        for name in raw {
            match name.parse::<Category>() {
                Ok(category) => categories.push(category),
                Err(e) => tracing::warn!(error = %e, "ignoring unknown category from API"),
            }
        }
        Ok(categories)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_gains_trailing_slash() {
        let config = HttpBackendConfig::new("http://localhost:8001/api").unwrap();
        assert_eq!(config.base_url.as_str(), "http://localhost:8001/api/");
        assert_eq!(
            config.base_url.join("courses").unwrap().as_str(),
            "http://localhost:8001/api/courses"
        );
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        assert!(matches!(
            HttpBackendConfig::new("not a url").unwrap_err(),
            StorageError::InvalidConfig(_)
        ));
    }

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: std::collections::HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn unset_vars_use_defaults() {
        let config = HttpBackendConfig::from_vars(vars(&[])).unwrap();
        assert_eq!(config.base_url.as_str(), "http://localhost:8001/api/");
        assert_eq!(config.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        assert_eq!(config.sync_path, DEFAULT_SYNC_PATH);
    }

    #[test]
    fn vars_override_url_timeout_and_sync_path() {
        let config = HttpBackendConfig::from_vars(vars(&[
            ("TRACKER_API_URL", "https://tracker.example.org/v2"),
            ("TRACKER_API_TIMEOUT_SECS", " 5 "),
            ("TRACKER_SYNC_PATH", "/sync-ossu/"),
        ]))
        .unwrap();
        assert_eq!(config.base_url.as_str(), "https://tracker.example.org/v2/");
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.sync_path, "sync-ossu");
    }

    #[test]
    fn blank_sync_path_keeps_default() {
        let config = HttpBackendConfig::from_vars(vars(&[("TRACKER_SYNC_PATH", " / ")])).unwrap();
        assert_eq!(config.sync_path, DEFAULT_SYNC_PATH);
    }

    #[test]
    fn invalid_timeout_is_rejected() {
        let err = HttpBackendConfig::from_vars(vars(&[("TRACKER_API_TIMEOUT_SECS", "soon")]))
            .unwrap_err();
        match err {
            StorageError::InvalidConfig(msg) => assert!(msg.contains("TRACKER_API_TIMEOUT_SECS")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn settings_apply_without_reading_url() {
        let config = HttpBackendConfig::new("http://127.0.0.1:9000/api")
            .unwrap()
            .with_vars(vars(&[
                ("TRACKER_API_URL", "not a url"),
                ("TRACKER_API_TIMEOUT_SECS", "7"),
            ]))
            .unwrap();
        assert_eq!(config.base_url.as_str(), "http://127.0.0.1:9000/api/");
        assert_eq!(config.timeout, Duration::from_secs(7));
    }

    #[test]
    fn backend_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<HttpBackend>();
    }
}
