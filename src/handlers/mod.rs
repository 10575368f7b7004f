pub mod commits;
pub mod error;
pub mod health;
pub mod languages;
pub mod streak;

use actix_web::HttpResponse;

use crate::utils::validators::validate_username;
use error::ErrorResponse;

/// 400 response for a path username GitHub would never accept
pub(crate) fn reject_invalid_username(username: &str) -> Option<HttpResponse> {
    validate_username(username).err().map(|e| {
        log::warn!("Rejected username {:?}: {}", username, e);
        HttpResponse::BadRequest().json(ErrorResponse::new("invalid_username", e.to_string()))
    })
}
