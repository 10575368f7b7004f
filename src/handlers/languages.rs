use actix_web::{web, HttpResponse};

use super::reject_invalid_username;
use crate::middleware::auth::CallerCredential;
use crate::services::error::ServiceError;
use crate::services::language_stats::LanguageStatsService;

/// GET /api/languages/{username}
pub async fn get_languages(
    service: web::Data<LanguageStatsService>,
    path: web::Path<String>,
    CallerCredential(credential): CallerCredential,
) -> Result<HttpResponse, ServiceError> {
    let username = path.into_inner();
    if let Some(response) = reject_invalid_username(&username) {
        return Ok(response);
    }

    let report = service.language_stats(&username, &credential).await?;
    Ok(HttpResponse::Ok().json(report))
}
