use actix_web::{web, HttpResponse, Responder};
use chrono::Utc;
use serde::Serialize;

use crate::services::streak_cache::StreakService;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: &'static str,
    pub timestamp: String,
}

/// GET /api/health
pub async fn health_check(service: web::Data<StreakService>) -> impl Responder {
    let (status, database) = match service.store().ping().await {
        Ok(()) => ("ok", "connected"),
        Err(e) => {
            log::error!("Health check: store unreachable: {}", e);
            ("degraded", "unreachable")
        }
    };

    let body = HealthResponse {
        status,
        database,
        timestamp: Utc::now().to_rfc3339(),
    };

    if status == "ok" {
        HttpResponse::Ok().json(body)
    } else {
        HttpResponse::ServiceUnavailable().json(body)
    }
}
