use actix_web::{web, HttpResponse};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use super::reject_invalid_username;
use crate::middleware::auth::CallerCredential;
use crate::services::error::ServiceError;
use crate::services::streak_cache::{StreakLookup, StreakOutcome, StreakService};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreakResponse {
    pub username: String,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub last_commit_date: Option<NaiveDate>,
    pub streak_dates: Vec<NaiveDate>,
    pub last_calculated: DateTime<Utc>,
    pub cached: bool,
}

impl From<StreakLookup> for StreakResponse {
    fn from(lookup: StreakLookup) -> Self {
        let record = lookup.record;
        Self {
            username: record.username,
            current_streak: record.current_streak,
            longest_streak: record.longest_streak,
            last_commit_date: record.last_commit_date,
            streak_dates: record.streak_dates,
            last_calculated: record.last_calculated,
            cached: lookup.cached,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequiresAuthResponse {
    pub requires_auth: bool,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct InvalidateResponse {
    pub invalidated: bool,
}

/// GET /api/streak/{username}
/// Cached streak when fresh, otherwise recomputed with the caller's token
pub async fn get_streak(
    service: web::Data<StreakService>,
    path: web::Path<String>,
    CallerCredential(credential): CallerCredential,
) -> Result<HttpResponse, ServiceError> {
    let username = path.into_inner();
    if let Some(response) = reject_invalid_username(&username) {
        return Ok(response);
    }

    match service.get_or_compute(&username, &credential).await? {
        StreakOutcome::Ready(lookup) => Ok(HttpResponse::Ok().json(StreakResponse::from(lookup))),
        StreakOutcome::RequiresAuth => Ok(HttpResponse::Unauthorized().json(RequiresAuthResponse {
            requires_auth: true,
            message: "Sign in with GitHub to calculate this streak".to_string(),
        })),
    }
}

/// POST /api/streak/{username}/refresh
pub async fn refresh_streak(
    service: web::Data<StreakService>,
    path: web::Path<String>,
    CallerCredential(credential): CallerCredential,
) -> Result<HttpResponse, ServiceError> {
    let username = path.into_inner();
    if let Some(response) = reject_invalid_username(&username) {
        return Ok(response);
    }

    let lookup = service.force_refresh(&username, &credential).await?;
    Ok(HttpResponse::Ok().json(StreakResponse::from(lookup)))
}

/// POST /api/streak/{username}/invalidate
pub async fn invalidate_streak(
    service: web::Data<StreakService>,
    path: web::Path<String>,
    CallerCredential(credential): CallerCredential,
) -> Result<HttpResponse, ServiceError> {
    let username = path.into_inner();
    if let Some(response) = reject_invalid_username(&username) {
        return Ok(response);
    }

    let invalidated = service.invalidate(&username, &credential).await?;
    Ok(HttpResponse::Ok().json(InvalidateResponse { invalidated }))
}
