use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;

use reqwest::StatusCode;
use serde_json::{json, Value as JsonValue};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::CategorizerConfig;
use crate::error::{AppError, AppResult, CategorizerErrorCode};
use crate::models::category::{
    CategorizationResult, CategorizationSource, CategorizedTotal, CategoryGroup,
    ACTIVITY_CATALOG, COMBINED_FIRST_FIX, FIRST_FIX_COMPONENTS,
};
use crate::services::prompt_templates::{
    build_categorization_payload, categorization_response_schema, categorization_system_prompt,
};

/// External collaborator that buckets activity totals into categories.
#[async_trait::async_trait]
pub trait CategoryProvider: Send + Sync {
    fn provider_id(&self) -> &str;

    async fn categorize(
        &self,
        counts: &BTreeMap<String, u32>,
        tower: &str,
    ) -> AppResult<Vec<CategoryGroup>>;
}

/// Categorizes per-tower activity counts, delegating to a provider when one
/// is configured and falling back to a direct catalog mapping on any failure.
#[derive(Clone)]
pub struct ActivityCategorizer {
    provider: Option<Arc<dyn CategoryProvider>>,
}

impl ActivityCategorizer {
    pub fn new(provider: Option<Arc<dyn CategoryProvider>>) -> Self {
        Self { provider }
    }

    pub fn offline() -> Self {
        Self { provider: None }
    }

    pub fn from_config(config: &CategorizerConfig) -> AppResult<Self> {
        let provider: Option<Arc<dyn CategoryProvider>> = match &config.api_key {
            Some(api_key) => match LlmCategoryProvider::try_new(config, api_key.clone()) {
                Ok(provider) => Some(Arc::new(provider)),
                Err(err) if err.categorizer_code() == Some(CategorizerErrorCode::MissingApiKey) => {
                    None
                }
                Err(err) => return Err(err),
            },
            None => {
                info!(target: "app::categorizer", "no categorizer API key, using direct mapping");
                None
            }
        };
        Ok(Self { provider })
    }

    pub fn has_provider(&self) -> bool {
        self.provider.is_some()
    }

    /// Always yields one total per catalog activity.
    pub async fn categorize(
        &self,
        counts: &BTreeMap<String, u32>,
        tower: &str,
    ) -> CategorizationResult {
        let Some(provider) = &self.provider else {
            return fallback_result(counts, tower);
        };

        match provider.categorize(counts, tower).await {
            Ok(groups) => {
                debug!(
                    target: "app::categorizer",
                    provider = provider.provider_id(),
                    %tower,
                    groups = groups.len(),
                    "categorizer reply accepted"
                );
                CategorizationResult {
                    tower: tower.to_string(),
                    source: CategorizationSource::Provider,
                    totals: populate_from_groups(&groups, tower),
                }
            }
            Err(error) => {
                warn!(
                    target: "app::categorizer",
                    provider = provider.provider_id(),
                    %tower,
                    code = ?error.categorizer_code(),
                    details = ?error.categorizer_details(),
                    error = %error,
                    "categorizer failed, using direct mapping"
                );
                fallback_result(counts, tower)
            }
        }
    }
}

fn fallback_result(counts: &BTreeMap<String, u32>, tower: &str) -> CategorizationResult {
    CategorizationResult {
        tower: tower.to_string(),
        source: CategorizationSource::Fallback,
        totals: fallback_totals(counts, tower),
    }
}

fn lookup_key(name: &str) -> String {
    name.trim().to_ascii_lowercase()
}

/// Direct 1:1 mapping of raw counts onto the catalog, zero for absent
/// activities. The combined first-fix entry uses its own count when present,
/// otherwise the smaller of its two components.
pub fn fallback_totals(counts: &BTreeMap<String, u32>, tower: &str) -> Vec<CategorizedTotal> {
    let lookup: HashMap<String, u32> = counts
        .iter()
        .map(|(name, count)| (lookup_key(name), *count))
        .collect();
    let count_of = |name: &str| lookup.get(&lookup_key(name)).copied();

    ACTIVITY_CATALOG
        .iter()
        .map(|(category, activity)| {
            let total = if *activity == COMBINED_FIRST_FIX {
                count_of(activity).unwrap_or_else(|| {
                    let (first, second) = FIRST_FIX_COMPONENTS;
                    count_of(first).unwrap_or(0).min(count_of(second).unwrap_or(0))
                })
            } else {
                count_of(activity).unwrap_or(0)
            };
            CategorizedTotal {
                tower: tower.to_string(),
                category: *category,
                activity_name: activity.to_string(),
                total,
            }
        })
        .collect()
}

/// Catalog-complete totals from a provider reply. Catalog categories are
/// authoritative; activities the reply omits default to zero.
pub fn populate_from_groups(groups: &[CategoryGroup], tower: &str) -> Vec<CategorizedTotal> {
    let mut lookup: HashMap<String, u32> = HashMap::new();
    for group in groups {
        for activity in &group.activities {
            lookup
                .entry(lookup_key(&activity.activity_name))
                .or_insert(activity.total);
        }
    }

    ACTIVITY_CATALOG
        .iter()
        .map(|(category, activity)| CategorizedTotal {
            tower: tower.to_string(),
            category: *category,
            activity_name: activity.to_string(),
            total: lookup.get(&lookup_key(activity)).copied().unwrap_or(0),
        })
        .collect()
}

/// Chat-completion backed categorizer. One request per tower, no retries.
pub struct LlmCategoryProvider {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
    model: String,
}

impl LlmCategoryProvider {
    pub fn try_new(config: &CategorizerConfig, api_key: String) -> AppResult<Self> {
        if api_key.trim().is_empty() {
            return Err(AppError::categorizer(
                CategorizerErrorCode::MissingApiKey,
                "categorizer API key is blank",
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .pool_max_idle_per_host(2)
            .build()
            .map_err(|err| AppError::other(format!("failed to build categorizer HTTP client: {err}")))?;

        let base_url = config.api_base_url.trim_end_matches('/').to_string();
        let endpoint = format!("{}/v1/chat/completions", base_url);

        Ok(Self {
            client,
            api_key,
            endpoint,
            model: config.model.clone(),
        })
    }

    fn build_request_body(&self, counts: &BTreeMap<String, u32>, tower: &str) -> JsonValue {
        let payload = build_categorization_payload(counts, tower);
        let user_content = serde_json::to_string(&payload).unwrap_or_else(|_| "{}".to_string());
        json!({
            "model": self.model,
            "temperature": 0.0,
            "messages": [
                { "role": "system", "content": categorization_system_prompt() },
                { "role": "user", "content": user_content }
            ]
        })
    }

    fn map_http_error(status: StatusCode, correlation_id: &str) -> AppError {
        AppError::categorizer_with_details(
            CategorizerErrorCode::HttpStatus,
            format!("categorizer returned status {}", status.as_u16()),
            Some(correlation_id),
            Some(json!({ "status": status.as_u16() })),
        )
    }

    fn error_from_reqwest(err: reqwest::Error, correlation_id: &str) -> AppError {
        if err.is_timeout() {
            AppError::categorizer_with_details(
                CategorizerErrorCode::Timeout,
                "categorizer request timed out",
                Some(correlation_id),
                None,
            )
        } else if let Some(status) = err.status() {
            Self::map_http_error(status, correlation_id)
        } else {
            AppError::categorizer_with_details(
                CategorizerErrorCode::Unreachable,
                format!("categorizer unreachable: {err}"),
                Some(correlation_id),
                None,
            )
        }
    }

    fn parse_content(content: &str, correlation_id: &str) -> AppResult<JsonValue> {
        let trimmed = content.trim();
        let cleaned = if trimmed.starts_with("```") {
            let without_prefix = trimmed
                .trim_start_matches("```json")
                .trim_start_matches("```JSON")
                .trim_start_matches("```");
            without_prefix.trim_end_matches("```").trim()
        } else {
            trimmed
        };

        serde_json::from_str(cleaned).map_err(|err| {
            AppError::categorizer_with_details(
                CategorizerErrorCode::InvalidJson,
                format!("categorizer reply is not JSON: {err}"),
                Some(correlation_id),
                Some(json!({
                    "line": err.line(),
                    "column": err.column(),
                    "offset": error_offset(cleaned, err.line(), err.column()),
                })),
            )
        })
    }

    fn validate_shape(value: JsonValue, correlation_id: &str) -> AppResult<Vec<CategoryGroup>> {
        let schema = categorization_response_schema();
        let compiled = jsonschema::JSONSchema::compile(&schema)
            .map_err(|err| AppError::other(format!("invalid categorizer schema: {err}")))?;

        if let Err(errors) = compiled.validate(&value) {
            let messages: Vec<String> = errors
                .map(|error| {
                    let path = error.instance_path.to_string();
                    let path = if path.is_empty() { "root".to_string() } else { path };
                    format!("{path}: {error}")
                })
                .collect();
            return Err(AppError::categorizer_with_details(
                CategorizerErrorCode::InvalidShape,
                "categorizer reply does not match the expected shape",
                Some(correlation_id),
                Some(json!({ "errors": messages })),
            ));
        }

        serde_json::from_value(value).map_err(|err| {
            AppError::categorizer_with_details(
                CategorizerErrorCode::InvalidShape,
                format!("categorizer reply could not be decoded: {err}"),
                Some(correlation_id),
                None,
            )
        })
    }
}

/// Byte offset of a 1-based (line, column) position reported by serde_json.
fn error_offset(text: &str, line: usize, column: usize) -> usize {
    let preceding: usize = text
        .split_inclusive('\n')
        .take(line.saturating_sub(1))
        .map(str::len)
        .sum();
    preceding + column.saturating_sub(1)
}

#[async_trait::async_trait]
impl CategoryProvider for LlmCategoryProvider {
    fn provider_id(&self) -> &str {
        "llm"
    }

    async fn categorize(
        &self,
        counts: &BTreeMap<String, u32>,
        tower: &str,
    ) -> AppResult<Vec<CategoryGroup>> {
        let correlation_id = Uuid::new_v4().to_string();
        let request_body = self.build_request_body(counts, tower);

        debug!(
            target: "app::categorizer::llm",
            correlation_id = %correlation_id,
            %tower,
            activities = counts.len(),
            "invoking categorizer"
        );

        let start = Instant::now();
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request_body)
            .send()
            .await
            .map_err(|err| Self::error_from_reqwest(err, &correlation_id))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(Self::map_http_error(status, &correlation_id));
        }

        let text = response
            .text()
            .await
            .map_err(|err| Self::error_from_reqwest(err, &correlation_id))?;
        debug!(
            target: "app::categorizer::llm",
            correlation_id = %correlation_id,
            latency_ms = start.elapsed().as_millis() as u64,
            body_len = text.len(),
            "categorizer responded"
        );

        if text.trim().is_empty() {
            return Err(AppError::categorizer_with_details(
                CategorizerErrorCode::EmptyBody,
                "categorizer returned an empty body",
                Some(&correlation_id),
                None,
            ));
        }

        let body: JsonValue = Self::parse_content(&text, &correlation_id)?;
        let content = body
            .pointer("/choices/0/message/content")
            .and_then(|value| value.as_str())
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| {
                AppError::categorizer_with_details(
                    CategorizerErrorCode::EmptyBody,
                    "categorizer reply has no message content",
                    Some(&correlation_id),
                    Some(json!({ "reason": "missing_message_content" })),
                )
            })?;

        let value = Self::parse_content(content, &correlation_id)?;
        Self::validate_shape(value, &correlation_id)
    }
}
