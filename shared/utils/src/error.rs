use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum CotizaError {
    #[error("Parse error: {message}")]
    Parse { message: String },

    #[error("Validation error: {field} - {message}")]
    Validation { field: String, message: String },

    #[error("Referential error: {message}")]
    Referential { message: String },

    #[error("Not found: {resource}")]
    NotFound { resource: String },

    #[error("Conversion error: {message}")]
    Conversion { message: String },

    #[error("Database error: {message}")]
    Database { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Internal server error: {message}")]
    Internal { message: String },
}

impl CotizaError {
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn referential(message: impl Into<String>) -> Self {
        Self::Referential {
            message: message.into(),
        }
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    pub fn conversion(message: impl Into<String>) -> Self {
        Self::Conversion {
            message: message.into(),
        }
    }

    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Parse { .. } => "PARSE_ERROR",
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::Referential { .. } => "REFERENTIAL_ERROR",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Conversion { .. } => "CONVERSION_ERROR",
            Self::Database { .. } => "DATABASE_ERROR",
            Self::Configuration { .. } => "CONFIGURATION_ERROR",
            Self::Internal { .. } => "INTERNAL_SERVER_ERROR",
        }
    }

    pub fn http_status_code(&self) -> u16 {
        match self {
            Self::Parse { .. } => 422,
            Self::Validation { .. } => 400,
            Self::Referential { .. } => 409,
            Self::NotFound { .. } => 404,
            Self::Conversion { .. } => 422,
            Self::Database { .. } => 500,
            Self::Configuration { .. } => 500,
            Self::Internal { .. } => 500,
        }
    }
}

pub type CotizaResult<T> = Result<T, CotizaError>;

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl From<CotizaError> for ErrorResponse {
    fn from(error: CotizaError) -> Self {
        Self {
            error: error.to_string(),
            code: error.error_code().to_string(),
            message: error.to_string(),
            details: None,
        }
    }
}

// Conversion from common error types
impl From<sqlx::Error> for CotizaError {
    fn from(error: sqlx::Error) -> Self {
        Self::database(error.to_string())
    }
}

impl From<calamine::Error> for CotizaError {
    fn from(error: calamine::Error) -> Self {
        Self::parse(error.to_string())
    }
}

impl From<calamine::XlsxError> for CotizaError {
    fn from(error: calamine::XlsxError) -> Self {
        Self::parse(error.to_string())
    }
}

impl From<calamine::XlsError> for CotizaError {
    fn from(error: calamine::XlsError) -> Self {
        Self::parse(error.to_string())
    }
}

impl From<csv::Error> for CotizaError {
    fn from(error: csv::Error) -> Self {
        Self::parse(error.to_string())
    }
}

impl From<serde_json::Error> for CotizaError {
    fn from(error: serde_json::Error) -> Self {
        Self::validation("JSON", error.to_string())
    }
}

impl From<anyhow::Error> for CotizaError {
    fn from(error: anyhow::Error) -> Self {
        Self::database(format!("{:#}", error))
    }
}
