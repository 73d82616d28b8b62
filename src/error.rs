use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;

pub type Result<T> = std::result::Result<T, EstimatorError>;

#[derive(Debug, thiserror::Error)]
pub enum EstimatorError {
    #[error("unknown subject code: {0}")]
    UnknownSubject(String),
    #[error("insufficient history: need {required} samples, got {available}")]
    InsufficientHistory { required: usize, available: usize },
    #[error("invalid sample: {0}")]
    InvalidSample(String),
    #[error("no history recorded for user {0}")]
    UnknownUser(String),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Toml(#[from] toml::de::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
}

impl EstimatorError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnknownSubject(_) => "UNKNOWN_SUBJECT",
            Self::InsufficientHistory { .. } => "INSUFFICIENT_HISTORY",
            Self::InvalidSample(_) => "INVALID_SAMPLE",
            Self::UnknownUser(_) => "NOT_FOUND",
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::Io(_) | Self::Toml(_) | Self::Csv(_) => "INTERNAL_ERROR",
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub code: String,
}

impl ResponseError for EstimatorError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::UnknownSubject(_) | Self::InsufficientHistory { .. } | Self::InvalidSample(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            Self::UnknownUser(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorResponse {
            success: false,
            error: self.to_string(),
            code: self.code().to_string(),
        })
    }
}
