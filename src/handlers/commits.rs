use actix_web::{web, HttpResponse};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use super::reject_invalid_username;
use crate::middleware::auth::CallerCredential;
use crate::services::commit_check::CommitCheckService;
use crate::services::error::ServiceError;

#[derive(Debug, Deserialize)]
pub struct CalendarQuery {
    pub year: Option<i32>,
    pub month: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct CalendarResponse {
    pub year: i32,
    pub month: u32,
    pub days: Vec<NaiveDate>,
}

/// GET /api/commits/{username}/today
pub async fn get_today(
    service: web::Data<CommitCheckService>,
    path: web::Path<String>,
    CallerCredential(credential): CallerCredential,
) -> Result<HttpResponse, ServiceError> {
    let username = path.into_inner();
    if let Some(response) = reject_invalid_username(&username) {
        return Ok(response);
    }

    let report = service.check_today(&username, &credential).await?;
    Ok(HttpResponse::Ok().json(report))
}

/// GET /api/commits/{username}/calendar?year=&month=
/// Defaults to the current local month
pub async fn get_calendar(
    service: web::Data<CommitCheckService>,
    path: web::Path<String>,
    query: web::Query<CalendarQuery>,
    CallerCredential(credential): CallerCredential,
) -> Result<HttpResponse, ServiceError> {
    let username = path.into_inner();
    if let Some(response) = reject_invalid_username(&username) {
        return Ok(response);
    }

    let today = service.today();
    let year = query.year.unwrap_or(today.year());
    let month = query.month.unwrap_or(today.month());

    let Some(first_day) = NaiveDate::from_ymd_opt(year, month, 1) else {
        log::warn!("Invalid calendar month requested: {}-{}", year, month);
        return Err(ServiceError::InvalidMonth { year, month });
    };

    let days = service.month_days(&username, first_day, &credential).await?;
    Ok(HttpResponse::Ok().json(CalendarResponse { year, month, days }))
}
