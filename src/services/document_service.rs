use std::time::{Duration, Instant};

use futures::future::join_all;
use reqwest::StatusCode;
use serde_json::{json, Value as JsonValue};
use tracing::{debug, info, warn};

use crate::config::{DatasetConfig, UpstreamConfig};
use crate::error::{AppError, AppResult};
use crate::models::snapshot::DatasetSnapshot;
use crate::services::record_normalizer::{normalize_list, ASSOCIATION_LIST};
use crate::utils::redact::{redact_sensitive_data, redact_url};

/// Session-cookie client for the quality document service.
pub struct DocumentServiceClient {
    client: reqwest::Client,
    base_url: String,
    project_id: String,
    username: Option<String>,
    password: Option<String>,
    record_limit: usize,
    page_delay: Duration,
}

impl DocumentServiceClient {
    pub fn try_new(config: &UpstreamConfig) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(config.timeout())
            .pool_max_idle_per_host(4)
            .build()
            .map_err(|err| AppError::other(format!("failed to build upstream HTTP client: {err}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            project_id: config.project_id.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
            record_limit: config.record_limit.max(1),
            page_delay: config.page_delay(),
        })
    }

    pub fn has_credentials(&self) -> bool {
        self.username.is_some() && self.password.is_some()
    }

    fn plan_url(&self, plan_id: &str, resource: &str) -> String {
        format!(
            "{}/projects/{}/quality-plans/{}/{}",
            self.base_url, self.project_id, plan_id, resource
        )
    }

    /// Establishes the session cookie used by every later request.
    pub async fn login(&self) -> AppResult<()> {
        let (Some(username), Some(password)) = (&self.username, &self.password) else {
            return Err(AppError::upstream("login", None, "no credentials configured"));
        };

        let url = format!("{}/login", self.base_url);
        let payload = json!({ "username": username, "password": password });
        debug!(
            target: "app::fetch",
            url = %redact_url(&url),
            payload = %redact_sensitive_data(&payload),
            "logging in"
        );

        let response = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|err| AppError::upstream("login", None, err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::upstream(
                "login",
                Some(status.as_u16()),
                format!("login rejected with status {}", status.as_u16()),
            ));
        }
        info!(target: "app::fetch", "document service session established");
        Ok(())
    }

    /// Single GET; `None` when the service answers 204.
    async fn get_json(
        &self,
        dataset: &str,
        url: &str,
        query: &[(&str, String)],
    ) -> AppResult<Option<JsonValue>> {
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|err| AppError::upstream(dataset, err.status().map(|s| s.as_u16()), err.to_string()))?;

        match response.status() {
            StatusCode::NO_CONTENT => Ok(None),
            StatusCode::OK => {
                let body = response
                    .json::<JsonValue>()
                    .await
                    .map_err(|err| AppError::upstream(dataset, Some(200), format!("invalid JSON body: {err}")))?;
                Ok(Some(body))
            }
            status => Err(AppError::upstream(
                dataset,
                Some(status.as_u16()),
                format!("{} returned status {}", redact_url(url), status.as_u16()),
            )),
        }
    }

    /// Completion records across all pages. Pages are requested in order;
    /// a 204, an empty page or a short page ends the loop.
    pub async fn fetch_association(&self, dataset: &str, plan_id: &str) -> AppResult<JsonValue> {
        let url = self.plan_url(plan_id, "associations");
        let mut records: Vec<JsonValue> = Vec::new();
        let mut record_start = 0usize;
        let mut pages = 0usize;
        let started = Instant::now();

        loop {
            if pages > 0 && !self.page_delay.is_zero() {
                tokio::time::sleep(self.page_delay).await;
            }

            let query = [
                ("recordStart", record_start.to_string()),
                ("recordLimit", self.record_limit.to_string()),
            ];
            let Some(body) = self.get_json(dataset, &url, &query).await? else {
                debug!(target: "app::fetch", dataset, record_start, "no content, pagination finished");
                break;
            };
            pages += 1;

            let page = normalize_list(&body, ASSOCIATION_LIST);
            let page_len = page.len();
            records.extend(page);
            debug!(target: "app::fetch", dataset, record_start, page_len, "page fetched");

            if page_len < self.record_limit {
                break;
            }
            record_start += page_len;
        }

        info!(
            target: "app::fetch",
            dataset,
            pages,
            records = records.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "association fetched"
        );
        Ok(JsonValue::Array(records))
    }

    pub async fn fetch_activities(&self, dataset: &str, plan_id: &str) -> AppResult<JsonValue> {
        let url = self.plan_url(plan_id, "activities");
        Ok(self
            .get_json(dataset, &url, &[])
            .await?
            .unwrap_or_else(|| JsonValue::Array(Vec::new())))
    }

    pub async fn fetch_locations(&self, dataset: &str, plan_id: &str) -> AppResult<JsonValue> {
        let url = self.plan_url(plan_id, "locations");
        Ok(self
            .get_json(dataset, &url, &[])
            .await?
            .unwrap_or_else(|| JsonValue::Array(Vec::new())))
    }

    pub async fn fetch_dataset(&self, dataset: &DatasetConfig) -> AppResult<DatasetSnapshot> {
        let name = dataset.name.as_str();
        let locations = self.fetch_locations(name, &dataset.plan_id).await?;
        let activities = self.fetch_activities(name, &dataset.plan_id).await?;
        let associations = self.fetch_association(name, &dataset.plan_id).await?;

        Ok(DatasetSnapshot {
            name: dataset.name.clone(),
            kind: dataset.kind,
            locations,
            activities,
            associations,
        })
    }

    /// Fetches every dataset concurrently. Each dataset's pages stay
    /// sequential; one dataset failing does not stop the others.
    pub async fn fetch_all(
        &self,
        datasets: &[DatasetConfig],
    ) -> Vec<(String, AppResult<DatasetSnapshot>)> {
        let results = join_all(datasets.iter().map(|dataset| self.fetch_dataset(dataset))).await;

        datasets
            .iter()
            .zip(results)
            .map(|(dataset, result)| {
                if let Err(error) = &result {
                    warn!(target: "app::fetch", dataset = %dataset.name, error = %error, "dataset fetch failed");
                }
                (dataset.name.clone(), result)
            })
            .collect()
    }
}
