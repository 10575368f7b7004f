use std::sync::Arc;

use super::commit_aggregation::CommitAggregator;
use super::error::ServiceError;
use super::git_platforms::{Credential, ErrorKind};
use super::streak_calculator;
use super::streak_store::{StreakRecord, StreakStore};

/// A streak record together with where it came from
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreakLookup {
    pub record: StreakRecord,
    pub cached: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreakOutcome {
    Ready(StreakLookup),
    /// Nothing fresh is stored and the caller has no credential to recompute with
    RequiresAuth,
}

/// Serves streaks from the store while fresh and recomputes them otherwise
pub struct StreakService {
    aggregator: Arc<CommitAggregator>,
    store: Arc<dyn StreakStore>,
}

impl StreakService {
    pub fn new(aggregator: Arc<CommitAggregator>, store: Arc<dyn StreakStore>) -> Self {
        Self { aggregator, store }
    }

    pub fn store(&self) -> &Arc<dyn StreakStore> {
        &self.store
    }

    /// Return the stored streak when it is valid and younger than the
    /// freshness window, otherwise recompute it with the caller's credential.
    pub async fn get_or_compute(
        &self,
        username: &str,
        credential: &Credential,
    ) -> Result<StreakOutcome, ServiceError> {
        let key = cache_key(username);
        let now = self.aggregator.clock().now();
        let ttl = self.aggregator.settings().cache_ttl();

        if let Some(record) = self.store.find(&key).await? {
            if record.is_fresh(now, ttl) {
                log::info!("✅ Serving cached streak for {}", username);
                return Ok(StreakOutcome::Ready(StreakLookup {
                    record,
                    cached: true,
                }));
            }
            log::debug!("Cached streak for {} is stale or invalid", username);
        }

        if !credential.is_authenticated() {
            self.ensure_user_exists(username).await?;
            return Ok(StreakOutcome::RequiresAuth);
        }

        let record = self.recompute(username, credential).await?;
        Ok(StreakOutcome::Ready(StreakLookup {
            record,
            cached: false,
        }))
    }

    /// Recompute and store the streak regardless of what is cached
    pub async fn force_refresh(
        &self,
        username: &str,
        credential: &Credential,
    ) -> Result<StreakLookup, ServiceError> {
        if !credential.is_authenticated() {
            return Err(ServiceError::AuthenticationRequired);
        }

        let record = self.recompute(username, credential).await?;
        Ok(StreakLookup {
            record,
            cached: false,
        })
    }

    /// Mark the stored streak invalid so the next lookup recomputes it
    pub async fn invalidate(
        &self,
        username: &str,
        credential: &Credential,
    ) -> Result<bool, ServiceError> {
        if !credential.is_authenticated() {
            return Err(ServiceError::AuthenticationRequired);
        }

        let invalidated = self.store.invalidate(&cache_key(username)).await?;
        log::info!("Invalidated cached streak for {}: {}", username, invalidated);
        Ok(invalidated)
    }

    async fn recompute(
        &self,
        username: &str,
        credential: &Credential,
    ) -> Result<StreakRecord, ServiceError> {
        log::info!("🔄 Calculating streak for {}", username);

        let days = self.aggregator.aggregate(username, credential).await?;
        let clock = self.aggregator.clock();
        let summary = streak_calculator::compute(&days, clock.today());
        let record = StreakRecord::from_summary(&cache_key(username), summary, clock.now());

        self.store.upsert(&record).await?;

        log::info!(
            "Streak for {}: current {}, longest {}",
            username,
            record.current_streak,
            record.longest_streak
        );

        Ok(record)
    }

    /// Anonymous probe so unknown users get "not found" instead of an auth prompt
    async fn ensure_user_exists(&self, username: &str) -> Result<(), ServiceError> {
        match self
            .aggregator
            .github()
            .list_repositories(username, 1, &Credential::Anonymous)
            .await
        {
            Err(e) if e.kind() == ErrorKind::NotFound => Err(ServiceError::NotFound),
            Err(e) => {
                log::debug!("Anonymous probe for {} failed: {}", username, e);
                Ok(())
            }
            Ok(_) => Ok(()),
        }
    }
}

/// GitHub logins are case-insensitive; store one record per login
fn cache_key(username: &str) -> String {
    username.to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::git_platforms::fake::FakeGitHub;
    use crate::services::streak_store::MemoryStreakStore;
    use crate::utils::clock::{Clock, FixedClock};
    use crate::utils::config::StreakSettings;
    use chrono::{DateTime, Duration, NaiveDate, Utc};
    use std::sync::atomic::Ordering;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn token() -> Credential {
        Credential::Bearer("gho_test".to_string())
    }

    fn alice() -> Arc<FakeGitHub> {
        Arc::new(
            FakeGitHub::new()
                .with_repos(&["alice/one", "alice/two"])
                .with_commits("alice/one", &["2024-01-01T10:00:00Z", "2024-01-02T10:00:00Z"])
                .with_commits("alice/two", &["2024-01-03T10:00:00Z"]),
        )
    }

    fn service_at(
        fake: Arc<FakeGitHub>,
        store: Arc<MemoryStreakStore>,
        clock: FixedClock,
    ) -> StreakService {
        let aggregator = CommitAggregator::new(fake, Arc::new(clock), StreakSettings::default());
        StreakService::new(Arc::new(aggregator), store)
    }

    fn ready(outcome: StreakOutcome) -> StreakLookup {
        match outcome {
            StreakOutcome::Ready(lookup) => lookup,
            StreakOutcome::RequiresAuth => panic!("expected a streak, got RequiresAuth"),
        }
    }

    fn noon(d: NaiveDate) -> DateTime<Utc> {
        FixedClock::at_noon(d).now()
    }

    #[tokio::test]
    async fn test_alice_scenario() {
        let store = Arc::new(MemoryStreakStore::new());
        let service = service_at(alice(), store, FixedClock::at_noon(day(2024, 1, 3)));

        let lookup = ready(service.get_or_compute("alice", &token()).await.unwrap());

        assert!(!lookup.cached);
        assert_eq!(lookup.record.current_streak, 3);
        assert_eq!(lookup.record.longest_streak, 3);
        assert_eq!(
            lookup.record.streak_dates,
            vec![day(2024, 1, 1), day(2024, 1, 2), day(2024, 1, 3)]
        );
        assert_eq!(lookup.record.last_commit_date, Some(day(2024, 1, 3)));
    }

    #[tokio::test]
    async fn test_alice_after_gap() {
        let store = Arc::new(MemoryStreakStore::new());
        let service = service_at(alice(), store, FixedClock::at_noon(day(2024, 1, 5)));

        let lookup = ready(service.get_or_compute("alice", &token()).await.unwrap());

        assert_eq!(lookup.record.current_streak, 0);
        assert_eq!(lookup.record.longest_streak, 3);
        assert!(lookup.record.streak_dates.is_empty());
    }

    #[tokio::test]
    async fn test_second_lookup_within_window_is_cached() {
        let fake = alice();
        let store = Arc::new(MemoryStreakStore::new());
        let first_service =
            service_at(fake.clone(), store.clone(), FixedClock::at_noon(day(2024, 1, 3)));
        let first = ready(first_service.get_or_compute("alice", &token()).await.unwrap());

        // Twenty hours later, still inside the 24h window
        let later = FixedClock::utc(noon(day(2024, 1, 3)) + Duration::hours(20));
        let second_service = service_at(fake.clone(), store, later);
        let second = ready(second_service.get_or_compute("alice", &token()).await.unwrap());

        assert!(second.cached);
        assert_eq!(second.record.last_calculated, first.record.last_calculated);
        assert_eq!(second.record, first.record);
        assert_eq!(fake.repo_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cached_record_served_to_anonymous_callers() {
        let store = Arc::new(MemoryStreakStore::new());
        let service = service_at(alice(), store, FixedClock::at_noon(day(2024, 1, 3)));

        service.force_refresh("alice", &token()).await.unwrap();
        let lookup = ready(
            service
                .get_or_compute("alice", &Credential::Anonymous)
                .await
                .unwrap(),
        );

        assert!(lookup.cached);
        assert_eq!(lookup.record.current_streak, 3);
    }

    #[tokio::test]
    async fn test_stale_record_is_recomputed() {
        let fake = alice();
        let store = Arc::new(MemoryStreakStore::new());
        service_at(fake.clone(), store.clone(), FixedClock::at_noon(day(2024, 1, 3)))
            .get_or_compute("alice", &token())
            .await
            .unwrap();

        let later = FixedClock::utc(noon(day(2024, 1, 3)) + Duration::hours(25));
        let lookup = ready(
            service_at(fake.clone(), store, later)
                .get_or_compute("alice", &token())
                .await
                .unwrap(),
        );

        assert!(!lookup.cached);
        assert_eq!(lookup.record.last_calculated, noon(day(2024, 1, 3)) + Duration::hours(25));
        assert_eq!(fake.repo_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_anonymous_with_stale_record_requires_auth() {
        let fake = alice();
        let store = Arc::new(MemoryStreakStore::new());
        service_at(fake.clone(), store.clone(), FixedClock::at_noon(day(2024, 1, 3)))
            .get_or_compute("alice", &token())
            .await
            .unwrap();
        let stored = store.find("alice").await.unwrap().unwrap();

        let later = FixedClock::utc(noon(day(2024, 1, 3)) + Duration::hours(25));
        let outcome = service_at(fake.clone(), store.clone(), later)
            .get_or_compute("alice", &Credential::Anonymous)
            .await
            .unwrap();

        assert_eq!(outcome, StreakOutcome::RequiresAuth);
        assert_eq!(store.find("alice").await.unwrap().unwrap(), stored);
        // Only the anonymous existence check touched GitHub again
        assert_eq!(fake.commit_calls.load(Ordering::SeqCst), 2);
        assert_eq!(fake.repo_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_anonymous_without_cache_requires_auth() {
        let fake = alice();
        let store = Arc::new(MemoryStreakStore::new());
        let service = service_at(fake.clone(), store.clone(), FixedClock::at_noon(day(2024, 1, 3)));

        let outcome = service
            .get_or_compute("alice", &Credential::Anonymous)
            .await
            .unwrap();

        assert_eq!(outcome, StreakOutcome::RequiresAuth);
        assert_eq!(fake.commit_calls.load(Ordering::SeqCst), 0);
        assert_eq!(
            *fake.credentials_seen.lock().unwrap(),
            vec![Credential::Anonymous]
        );
        assert!(store.find("alice").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_anonymous_probe_reports_unknown_user() {
        let fake = Arc::new(FakeGitHub::new().with_repo_error(ErrorKind::NotFound));
        let service = service_at(
            fake,
            Arc::new(MemoryStreakStore::new()),
            FixedClock::at_noon(day(2024, 1, 3)),
        );

        let err = service
            .get_or_compute("ghost", &Credential::Anonymous)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound));
    }

    #[tokio::test]
    async fn test_force_refresh_always_updates_last_calculated() {
        let fake = alice();
        let store = Arc::new(MemoryStreakStore::new());
        let first = service_at(fake.clone(), store.clone(), FixedClock::at_noon(day(2024, 1, 3)))
            .force_refresh("alice", &token())
            .await
            .unwrap();

        let a_minute_later = FixedClock::utc(noon(day(2024, 1, 3)) + Duration::minutes(1));
        let second = service_at(fake.clone(), store.clone(), a_minute_later)
            .force_refresh("alice", &token())
            .await
            .unwrap();

        assert!(!second.cached);
        assert!(second.record.last_calculated > first.record.last_calculated);
        assert_eq!(
            store.find("alice").await.unwrap().unwrap().last_calculated,
            second.record.last_calculated
        );
        assert_eq!(fake.repo_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_force_refresh_requires_credential() {
        let service = service_at(
            alice(),
            Arc::new(MemoryStreakStore::new()),
            FixedClock::at_noon(day(2024, 1, 3)),
        );

        let err = service
            .force_refresh("alice", &Credential::Anonymous)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::AuthenticationRequired));
    }

    #[tokio::test]
    async fn test_failed_refresh_leaves_cache_untouched() {
        let store = Arc::new(MemoryStreakStore::new());
        let clock = FixedClock::at_noon(day(2024, 1, 3));
        let before = service_at(alice(), store.clone(), clock)
            .force_refresh("alice", &token())
            .await
            .unwrap();

        let broken = Arc::new(FakeGitHub::new().with_repo_error(ErrorKind::Other));
        let err = service_at(broken, store.clone(), clock)
            .force_refresh("alice", &token())
            .await
            .unwrap_err();

        assert!(matches!(err, ServiceError::Upstream(_)));
        let stored = store.find("alice").await.unwrap().unwrap();
        assert_eq!(stored, before.record);
        assert!(stored.is_valid);
    }

    #[tokio::test]
    async fn test_upstream_unauthorized_is_distinct() {
        let fake = Arc::new(FakeGitHub::new().with_repo_error(ErrorKind::Unauthorized));
        let service = service_at(
            fake,
            Arc::new(MemoryStreakStore::new()),
            FixedClock::at_noon(day(2024, 1, 3)),
        );

        let err = service.get_or_compute("alice", &token()).await.unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized));
    }

    #[tokio::test]
    async fn test_invalidated_record_is_recomputed() {
        let fake = alice();
        let store = Arc::new(MemoryStreakStore::new());
        let service = service_at(fake.clone(), store, FixedClock::at_noon(day(2024, 1, 3)));

        service.get_or_compute("alice", &token()).await.unwrap();
        assert!(service.invalidate("alice", &token()).await.unwrap());

        let lookup = ready(service.get_or_compute("alice", &token()).await.unwrap());
        assert!(!lookup.cached);
        assert!(lookup.record.is_valid);
        assert_eq!(fake.repo_calls.load(Ordering::SeqCst), 2);

        let anonymous = ready(
            service
                .get_or_compute("alice", &Credential::Anonymous)
                .await
                .unwrap(),
        );
        assert!(anonymous.cached);
    }

    #[tokio::test]
    async fn test_username_case_shares_one_record() {
        let fake = alice();
        let store = Arc::new(MemoryStreakStore::new());
        let service = service_at(fake.clone(), store.clone(), FixedClock::at_noon(day(2024, 1, 3)));

        service.get_or_compute("Alice", &token()).await.unwrap();
        let lookup = ready(service.get_or_compute("alice", &token()).await.unwrap());

        assert!(lookup.cached);
        assert_eq!(lookup.record.username, "alice");
    }

    #[tokio::test]
    async fn test_concurrent_refreshes_leave_one_record() {
        let store = Arc::new(MemoryStreakStore::new());
        let service = Arc::new(service_at(
            alice(),
            store.clone(),
            FixedClock::at_noon(day(2024, 1, 3)),
        ));

        let (first, second) = (token(), token());
        let (a, b) = tokio::join!(
            service.force_refresh("alice", &first),
            service.force_refresh("alice", &second)
        );

        assert_eq!(a.unwrap().record, b.unwrap().record);
        assert_eq!(store.find("alice").await.unwrap().unwrap().current_streak, 3);
    }
}
