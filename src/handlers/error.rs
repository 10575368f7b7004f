use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;

use crate::services::error::ServiceError;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(error: &str, message: impl Into<String>) -> Self {
        Self {
            error: error.to_string(),
            message: message.into(),
        }
    }
}

impl ServiceError {
    fn code(&self) -> &'static str {
        match self {
            ServiceError::NotFound => "not_found",
            ServiceError::Unauthorized => "unauthorized",
            ServiceError::RateLimited { .. } => "rate_limited",
            ServiceError::AuthenticationRequired => "authentication_required",
            ServiceError::InvalidMonth { .. } => "invalid_month",
            ServiceError::Upstream(_) => "upstream_error",
            ServiceError::Storage(_) => "storage_error",
        }
    }
}

impl ResponseError for ServiceError {
    fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::NotFound => StatusCode::NOT_FOUND,
            ServiceError::InvalidMonth { .. } => StatusCode::BAD_REQUEST,
            ServiceError::Unauthorized
            | ServiceError::RateLimited { .. }
            | ServiceError::AuthenticationRequired => StatusCode::UNAUTHORIZED,
            ServiceError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ServiceError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            ServiceError::Storage(e) => {
                log::error!("Storage failure: {}", e);
                "Failed to read or store streak data".to_string()
            }
            ServiceError::RateLimited {
                reset_at: Some(reset_at),
            } => format!("GitHub rate limit exceeded; resets at {}", reset_at.to_rfc3339()),
            other => other.to_string(),
        };

        HttpResponse::build(self.status_code()).json(ErrorResponse::new(self.code(), message))
    }
}
