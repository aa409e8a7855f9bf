use std::fmt;

use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::{error, warn};

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategorizerErrorCode {
    MissingApiKey,
    Unreachable,
    Timeout,
    HttpStatus,
    EmptyBody,
    InvalidShape,
    InvalidJson,
}

impl CategorizerErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            CategorizerErrorCode::MissingApiKey => "MISSING_API_KEY",
            CategorizerErrorCode::Unreachable => "UNREACHABLE",
            CategorizerErrorCode::Timeout => "TIMEOUT",
            CategorizerErrorCode::HttpStatus => "HTTP_STATUS",
            CategorizerErrorCode::EmptyBody => "EMPTY_BODY",
            CategorizerErrorCode::InvalidShape => "INVALID_SHAPE",
            CategorizerErrorCode::InvalidJson => "INVALID_JSON",
        }
    }
}

impl fmt::Display for CategorizerErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("upstream fetch failed for {dataset}: {message}")]
    UpstreamFetch {
        dataset: String,
        status: Option<u16>,
        message: String,
    },

    #[error("dataset {dataset} is missing expected columns: {}", missing.join(", "))]
    SchemaMismatch {
        dataset: String,
        missing: Vec<String>,
    },

    #[error("{message}")]
    Categorizer {
        code: CategorizerErrorCode,
        message: String,
        correlation_id: Option<String>,
        details: Option<JsonValue>,
    },

    #[error("report generation failed: {message}")]
    ReportGeneration { message: String },

    #[error("validation failed: {message}")]
    Validation {
        message: String,
        details: Option<JsonValue>,
    },

    #[error("invalid configuration: {message}")]
    Config { message: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl AppError {
    pub fn upstream(dataset: impl Into<String>, status: Option<u16>, message: impl Into<String>) -> Self {
        let dataset = dataset.into();
        let message = message.into();
        error!(target: "app::fetch", %dataset, status = ?status, %message, "upstream fetch error");
        AppError::UpstreamFetch {
            dataset,
            status,
            message,
        }
    }

    pub fn schema_mismatch(dataset: impl Into<String>, missing: Vec<String>) -> Self {
        let dataset = dataset.into();
        error!(target: "app::fetch", %dataset, missing = ?missing, "schema mismatch");
        AppError::SchemaMismatch { dataset, missing }
    }

    pub fn categorizer(code: CategorizerErrorCode, message: impl Into<String>) -> Self {
        Self::categorizer_with_details(code, message, None, None)
    }

    pub fn categorizer_with_details(
        code: CategorizerErrorCode,
        message: impl Into<String>,
        correlation_id: Option<&str>,
        details: Option<JsonValue>,
    ) -> Self {
        let message = message.into();
        let correlation = correlation_id.map(|value| value.to_string());
        match (&correlation, &details) {
            (Some(id), Some(payload)) => {
                warn!(
                    target: "app::categorizer::error",
                    code = %code,
                    correlation_id = %id,
                    details = %payload,
                    %message
                );
            }
            (Some(id), None) => {
                warn!(
                    target: "app::categorizer::error",
                    code = %code,
                    correlation_id = %id,
                    %message
                );
            }
            (None, Some(payload)) => {
                warn!(target: "app::categorizer::error", code = %code, details = %payload, %message);
            }
            (None, None) => {
                warn!(target: "app::categorizer::error", code = %code, %message);
            }
        }

        AppError::Categorizer {
            code,
            message,
            correlation_id: correlation,
            details,
        }
    }

    pub fn categorizer_code(&self) -> Option<CategorizerErrorCode> {
        match self {
            AppError::Categorizer { code, .. } => Some(*code),
            _ => None,
        }
    }

    pub fn categorizer_details(&self) -> Option<&JsonValue> {
        match self {
            AppError::Categorizer { details, .. } => details.as_ref(),
            _ => None,
        }
    }

    pub fn report(message: impl Into<String>) -> Self {
        let message = message.into();
        error!(target: "app::report", %message, "report generation error");
        AppError::ReportGeneration { message }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        let message = message.into();
        warn!(target: "app::validation", %message, "validation error");
        AppError::Validation {
            message,
            details: None,
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        let message = message.into();
        error!(target: "app::config", %message, "configuration error");
        AppError::Config { message }
    }

    pub fn other(message: impl Into<String>) -> Self {
        let message = message.into();
        error!(target: "app::other", %message, "other error");
        AppError::Other(message)
    }
}

impl From<reqwest::Error> for AppError {
    fn from(error: reqwest::Error) -> Self {
        let status = error.status().map(|status| status.as_u16());
        AppError::upstream("http", status, error.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(error: serde_yaml::Error) -> Self {
        AppError::config(format!("failed to parse configuration: {error}"))
    }
}
