use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::*;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::streak_calculator::StreakSummary;
use crate::models::streak_record;

/// The last computed streak for one GitHub user
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreakRecord {
    pub username: String,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub last_commit_date: Option<NaiveDate>,
    pub streak_dates: Vec<NaiveDate>,
    pub last_calculated: DateTime<Utc>,
    pub is_valid: bool,
}

impl StreakRecord {
    pub fn from_summary(username: &str, summary: StreakSummary, calculated_at: DateTime<Utc>) -> Self {
        Self {
            username: username.to_string(),
            current_streak: summary.current_streak,
            longest_streak: summary.longest_streak,
            last_commit_date: summary.last_commit_date,
            streak_dates: summary.streak_dates,
            last_calculated: calculated_at,
            is_valid: true,
        }
    }

    /// Whether the record may still be served at `now`
    pub fn is_fresh(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        self.is_valid && now - self.last_calculated < ttl
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] DbErr),
}

/// Durable storage of streak records, keyed by username
#[async_trait]
pub trait StreakStore: Send + Sync {
    async fn find(&self, username: &str) -> Result<Option<StreakRecord>, StoreError>;

    /// Insert the record, or overwrite the one stored under the same username
    async fn upsert(&self, record: &StreakRecord) -> Result<(), StoreError>;

    /// Mark the stored record invalid; returns false when there is none
    async fn invalidate(&self, username: &str) -> Result<bool, StoreError>;

    /// Reports whether the backing storage is reachable
    async fn ping(&self) -> Result<(), StoreError>;
}

/// Process-local store, used when no database is configured and in tests
#[derive(Default)]
pub struct MemoryStreakStore {
    records: RwLock<HashMap<String, StreakRecord>>,
}

impl MemoryStreakStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StreakStore for MemoryStreakStore {
    async fn find(&self, username: &str) -> Result<Option<StreakRecord>, StoreError> {
        Ok(self.records.read().await.get(username).cloned())
    }

    async fn upsert(&self, record: &StreakRecord) -> Result<(), StoreError> {
        self.records
            .write()
            .await
            .insert(record.username.clone(), record.clone());
        Ok(())
    }

    async fn invalidate(&self, username: &str) -> Result<bool, StoreError> {
        Ok(match self.records.write().await.get_mut(username) {
            Some(record) => {
                record.is_valid = false;
                true
            }
            None => false,
        })
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Store backed by the `streak_records` table
pub struct SeaOrmStreakStore {
    db: DatabaseConnection,
}

impl SeaOrmStreakStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Create the `streak_records` table if it does not exist yet
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        let backend = self.db.get_database_backend();
        let schema = Schema::new(backend);
        let mut statement = schema.create_table_from_entity(streak_record::Entity);
        statement.if_not_exists();

        self.db.execute(backend.build(&statement)).await?;
        Ok(())
    }
}

#[async_trait]
impl StreakStore for SeaOrmStreakStore {
    async fn find(&self, username: &str) -> Result<Option<StreakRecord>, StoreError> {
        let model = streak_record::Entity::find()
            .filter(streak_record::Column::Username.eq(username))
            .one(&self.db)
            .await?;

        Ok(model.map(record_from_model))
    }

    async fn upsert(&self, record: &StreakRecord) -> Result<(), StoreError> {
        let now = Utc::now();
        let streak_dates: Vec<String> = record
            .streak_dates
            .iter()
            .map(|d| d.format("%Y-%m-%d").to_string())
            .collect();

        let model = streak_record::ActiveModel {
            id: Set(Uuid::new_v4()),
            username: Set(record.username.clone()),
            current_streak: Set(to_db_count(record.current_streak)),
            longest_streak: Set(to_db_count(record.longest_streak)),
            last_commit_date: Set(record.last_commit_date),
            streak_dates: Set(serde_json::json!(streak_dates)),
            last_calculated: Set(record.last_calculated),
            is_valid: Set(record.is_valid),
            created_at: Set(now),
            updated_at: Set(now),
        };

        // Single statement so concurrent refreshes of one user cannot collide
        streak_record::Entity::insert(model)
            .on_conflict(
                OnConflict::column(streak_record::Column::Username)
                    .update_columns([
                        streak_record::Column::CurrentStreak,
                        streak_record::Column::LongestStreak,
                        streak_record::Column::LastCommitDate,
                        streak_record::Column::StreakDates,
                        streak_record::Column::LastCalculated,
                        streak_record::Column::IsValid,
                        streak_record::Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await?;

        Ok(())
    }

    async fn invalidate(&self, username: &str) -> Result<bool, StoreError> {
        let result = streak_record::Entity::update_many()
            .col_expr(streak_record::Column::IsValid, Expr::value(false))
            .col_expr(streak_record::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(streak_record::Column::Username.eq(username))
            .exec(&self.db)
            .await?;

        Ok(result.rows_affected > 0)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.db.ping().await?;
        Ok(())
    }
}

fn to_db_count(count: u32) -> i32 {
    i32::try_from(count).unwrap_or(i32::MAX)
}

fn record_from_model(model: streak_record::Model) -> StreakRecord {
    let streak_dates = serde_json::from_value::<Vec<NaiveDate>>(model.streak_dates)
        .unwrap_or_else(|e| {
            log::warn!("Stored streak dates for {} are unreadable: {}", model.username, e);
            Vec::new()
        });

    StreakRecord {
        current_streak: u32::try_from(model.current_streak).unwrap_or(0),
        longest_streak: u32::try_from(model.longest_streak).unwrap_or(0),
        last_commit_date: model.last_commit_date,
        streak_dates,
        last_calculated: model.last_calculated,
        is_valid: model.is_valid,
        username: model.username,
    }
}
