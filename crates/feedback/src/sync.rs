//! Polling sync engine
//!
//! Owns the query cache for a mounted dashboard: the filtered review list and
//! the unfiltered analytics summary. Fetches for the same key never overlap,
//! responses for a key the dashboard has moved away from are dropped on
//! arrival, and failures keep the last good data in place.
//!
//! With auto-refresh on, a single shared timer refetches both queries every
//! interval. Manual refreshes do not reset that timer.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::client::FeedbackApi;
use crate::config::SyncConfig;
use crate::error::{FeedbackError, Result};
use crate::model::{AnalyticsSummary, ReviewList};
use crate::query::{compose, FilterState, QueryKey};

/// What happened to a single fetch request
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
  /// Response stored as the current data for its key
  Applied,
  /// Request failed; previous data kept, error recorded on the query
  Failed(FeedbackError),
  /// A request for the same key was already outstanding, nothing issued
  InFlight,
  /// Engine unmounted, or the response arrived for a superseded key and was dropped
  Discarded,
  /// Filters did not change, nothing issued
  Unchanged,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RefreshOutcome {
  pub reviews: FetchOutcome,
  pub analytics: FetchOutcome,
}

/// Read-only view of one cached query
#[derive(Debug, Clone)]
pub struct QuerySnapshot<T> {
  pub key: QueryKey,
  pub data: Option<Arc<T>>,
  pub error: Option<FeedbackError>,
  pub is_fetching: bool,
  pub updated_at: Option<DateTime<Utc>>,
}

struct Entry<T> {
  data: Option<Arc<T>>,
  error: Option<FeedbackError>,
  in_flight: Option<u64>,
  updated_at: Option<DateTime<Utc>>,
}

impl<T> Default for Entry<T> {
  fn default() -> Self {
    Self { data: None, error: None, in_flight: None, updated_at: None }
  }
}

struct QueryCache<T> {
  entries: HashMap<QueryKey, Entry<T>>,
  next_seq: u64,
}

impl<T> Default for QueryCache<T> {
  fn default() -> Self {
    Self { entries: HashMap::new(), next_seq: 0 }
  }
}

impl<T> QueryCache<T> {
  /// Reserve a request slot for `key`, or `None` if one is already outstanding
  fn begin(&mut self, key: &QueryKey) -> Option<u64> {
    let entry = self.entries.entry(key.clone()).or_default();
    if entry.in_flight.is_some() {
      return None;
    }
    self.next_seq += 1;
    entry.in_flight = Some(self.next_seq);
    Some(self.next_seq)
  }

  fn settle(&mut self, key: &QueryKey, seq: u64, result: Result<T>, current: bool) -> FetchOutcome {
    let Some(entry) = self.entries.get_mut(key) else {
      return FetchOutcome::Discarded;
    };
    if entry.in_flight != Some(seq) {
      return FetchOutcome::Discarded;
    }
    entry.in_flight = None;

    if !current {
      self.entries.remove(key);
      return FetchOutcome::Discarded;
    }

    match result {
      Ok(data) => {
        entry.data = Some(Arc::new(data));
        entry.error = None;
        entry.updated_at = Some(Utc::now());
        FetchOutcome::Applied
      }
      Err(err) => {
        entry.error = Some(err.clone());
        FetchOutcome::Failed(err)
      }
    }
  }

  fn snapshot(&self, key: &QueryKey) -> QuerySnapshot<T> {
    match self.entries.get(key) {
      Some(entry) => QuerySnapshot {
        key: key.clone(),
        data: entry.data.clone(),
        error: entry.error.clone(),
        is_fetching: entry.in_flight.is_some(),
        updated_at: entry.updated_at,
      },
      None => QuerySnapshot {
        key: key.clone(),
        data: None,
        error: None,
        is_fetching: false,
        updated_at: None,
      },
    }
  }

  /// Drop every entry except `keep` and those with a request still outstanding
  fn retain_current(&mut self, keep: &QueryKey) {
    self.entries.retain(|key, entry| key == keep || entry.in_flight.is_some());
  }

  fn clear(&mut self) {
    self.entries.clear();
  }
}

struct State {
  filters: FilterState,
  review_key: QueryKey,
  reviews: QueryCache<ReviewList>,
  analytics: QueryCache<AnalyticsSummary>,
  mounted: bool,
  auto_refresh: bool,
}

struct Inner {
  api: Arc<dyn FeedbackApi>,
  config: SyncConfig,
  state: Mutex<State>,
  poller: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for Inner {
  fn drop(&mut self) {
    if let Some(handle) = self.poller.get_mut().take() {
      handle.abort();
    }
  }
}

/// Live, polling-refreshed view of reviews and analytics for one dashboard
#[derive(Clone)]
pub struct SyncEngine {
  inner: Arc<Inner>,
}

impl SyncEngine {
  pub fn new(api: Arc<dyn FeedbackApi>, config: SyncConfig) -> Self {
    Self::with_filters(api, config, FilterState::default())
  }

  /// Engine whose first mount loads reviews for `filters`
  pub fn with_filters(api: Arc<dyn FeedbackApi>, config: SyncConfig, filters: FilterState) -> Self {
    let state = State {
      review_key: QueryKey::reviews(&filters),
      filters,
      reviews: QueryCache::default(),
      analytics: QueryCache::default(),
      mounted: false,
      auto_refresh: config.auto_refresh,
    };

    Self { inner: Arc::new(Inner { api, config, state: Mutex::new(state), poller: Mutex::new(None) }) }
  }

  /// Load both queries and start the refresh timer if auto-refresh is on
  pub async fn mount(&self) -> RefreshOutcome {
    let auto_refresh = {
      let mut state = self.inner.state.lock().await;
      state.mounted = true;
      state.auto_refresh
    };
    info!(auto_refresh, "dashboard mounted");

    if auto_refresh {
      self.start_poller().await;
    }
    self.refresh().await
  }

  /// Stop the timer and drop the cache; late responses are discarded and
  /// refetches issue nothing until the next mount
  pub async fn unmount(&self) {
    self.stop_poller().await;

    let mut state = self.inner.state.lock().await;
    state.mounted = false;
    state.reviews.clear();
    state.analytics.clear();
    info!("dashboard unmounted");
  }

  pub async fn is_mounted(&self) -> bool {
    self.inner.state.lock().await.mounted
  }

  pub async fn filters(&self) -> FilterState {
    self.inner.state.lock().await.filters.clone()
  }

  /// Switch filters; the review list is fetched for the new key
  pub async fn set_filters(&self, filters: FilterState) -> FetchOutcome {
    {
      let mut state = self.inner.state.lock().await;
      if state.filters == filters {
        return FetchOutcome::Unchanged;
      }
      let key = QueryKey::reviews(&filters);
      state.reviews.retain_current(&key);
      state.review_key = key;
      state.filters = filters;
      debug!(key = %state.review_key, "filters changed");
    }
    self.refetch_reviews().await
  }

  pub async fn auto_refresh(&self) -> bool {
    self.inner.state.lock().await.auto_refresh
  }

  pub async fn set_auto_refresh(&self, enabled: bool) {
    let mounted = {
      let mut state = self.inner.state.lock().await;
      state.auto_refresh = enabled;
      state.mounted
    };
    info!(enabled, "auto-refresh toggled");

    if enabled && mounted {
      self.start_poller().await;
    } else if !enabled {
      self.stop_poller().await;
    }
  }

  /// Refetch both queries at once, independent of the timer
  pub async fn refresh(&self) -> RefreshOutcome {
    let (reviews, analytics) = tokio::join!(self.refetch_reviews(), self.refetch_analytics());
    RefreshOutcome { reviews, analytics }
  }

  pub async fn refetch_reviews(&self) -> FetchOutcome {
    let (key, query, seq) = {
      let mut state = self.inner.state.lock().await;
      if !state.mounted {
        return FetchOutcome::Discarded;
      }
      let (query, key) = compose(&state.filters);
      let query = query.with_page(self.inner.config.page);
      let Some(seq) = state.reviews.begin(&key) else {
        debug!(key = %key, "review fetch already in flight");
        return FetchOutcome::InFlight;
      };
      (key, query, seq)
    };

    let result = self.inner.api.list_reviews(&query).await;

    let mut state = self.inner.state.lock().await;
    let current = state.mounted && state.review_key == key;
    let outcome = state.reviews.settle(&key, seq, result, current);
    log_outcome(&key, &outcome);
    outcome
  }

  pub async fn refetch_analytics(&self) -> FetchOutcome {
    let key = QueryKey::Analytics;
    let seq = {
      let mut state = self.inner.state.lock().await;
      if !state.mounted {
        return FetchOutcome::Discarded;
      }
      let Some(seq) = state.analytics.begin(&key) else {
        debug!(key = %key, "analytics fetch already in flight");
        return FetchOutcome::InFlight;
      };
      seq
    };

    let result = self.inner.api.analytics().await;

    let mut state = self.inner.state.lock().await;
    let current = state.mounted;
    let outcome = state.analytics.settle(&key, seq, result, current);
    log_outcome(&key, &outcome);
    outcome
  }

  /// Review list for the current filters
  pub async fn reviews(&self) -> QuerySnapshot<ReviewList> {
    let state = self.inner.state.lock().await;
    state.reviews.snapshot(&state.review_key)
  }

  pub async fn analytics(&self) -> QuerySnapshot<AnalyticsSummary> {
    self.inner.state.lock().await.analytics.snapshot(&QueryKey::Analytics)
  }

  pub async fn is_polling(&self) -> bool {
    self.inner.poller.lock().await.as_ref().is_some_and(|handle| !handle.is_finished())
  }

  async fn start_poller(&self) {
    let mut poller = self.inner.poller.lock().await;
    if poller.as_ref().is_some_and(|handle| !handle.is_finished()) {
      return;
    }
    *poller = Some(spawn_poller(&self.inner));
  }

  async fn stop_poller(&self) {
    if let Some(handle) = self.inner.poller.lock().await.take() {
      handle.abort();
    }
  }
}

fn spawn_poller(inner: &Arc<Inner>) -> JoinHandle<()> {
  let weak: Weak<Inner> = Arc::downgrade(inner);
  let period = inner.config.refresh_interval;

  tokio::spawn(async move {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
      ticker.tick().await;
      let Some(inner) = weak.upgrade() else {
        break;
      };
      let engine = SyncEngine { inner };
      // Detached so a slow backend never holds up the next tick
      tokio::spawn(async move {
        engine.refresh().await;
      });
    }
  })
}

fn log_outcome(key: &QueryKey, outcome: &FetchOutcome) {
  match outcome {
    FetchOutcome::Applied => debug!(key = %key, "fetch applied"),
    FetchOutcome::Discarded => debug!(key = %key, "stale response discarded"),
    FetchOutcome::Failed(err) => warn!(key = %key, error = %err, "fetch failed, keeping previous data"),
    FetchOutcome::InFlight | FetchOutcome::Unchanged => {}
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::client::MockFeedbackApi;
  use crate::model::SentimentDistribution;
  use std::collections::BTreeMap;
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::time::Duration;

  fn summary(total: u64) -> AnalyticsSummary {
    AnalyticsSummary {
      total_reviews: total,
      average_rating: 4.0,
      sentiment_distribution: SentimentDistribution { positive: total, ..Default::default() },
      rating_distribution: BTreeMap::from([(4, total)]),
    }
  }

  fn manual_config() -> SyncConfig {
    SyncConfig { auto_refresh: false, ..SyncConfig::default() }
  }

  #[tokio::test]
  async fn test_failed_fetch_keeps_previous_data() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();

    let mut api = MockFeedbackApi::new();
    api.expect_list_reviews().returning(|_| Ok(ReviewList::default()));
    api.expect_analytics().returning(move || match counter.fetch_add(1, Ordering::SeqCst) {
      0 => Ok(summary(3)),
      _ => Err(FeedbackError::network("connection reset")),
    });

    let engine = SyncEngine::new(Arc::new(api), manual_config());
    let mounted = engine.mount().await;
    assert_eq!(mounted.analytics, FetchOutcome::Applied);

    let outcome = engine.refetch_analytics().await;
    assert!(matches!(outcome, FetchOutcome::Failed(FeedbackError::Network { .. })));

    let snapshot = engine.analytics().await;
    assert_eq!(snapshot.data.as_deref(), Some(&summary(3)));
    assert!(snapshot.error.is_some());
    assert!(!snapshot.is_fetching);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn test_success_clears_error_indicator() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();

    let mut api = MockFeedbackApi::new();
    api.expect_list_reviews().returning(move |_| match counter.fetch_add(1, Ordering::SeqCst) {
      0 => Err(FeedbackError::status(503, "unavailable")),
      _ => Ok(ReviewList { reviews: Vec::new(), total: 0 }),
    });
    api.expect_analytics().returning(|| Ok(summary(0)));

    let engine = SyncEngine::new(Arc::new(api), manual_config());
    engine.mount().await;
    assert!(engine.reviews().await.error.is_some());

    assert_eq!(engine.refetch_reviews().await, FetchOutcome::Applied);
    let snapshot = engine.reviews().await;
    assert!(snapshot.error.is_none());
    assert!(snapshot.data.is_some());
  }

  #[tokio::test]
  async fn test_unchanged_filters_issue_nothing() {
    let mut api = MockFeedbackApi::new();
    api.expect_list_reviews().times(1).returning(|_| Ok(ReviewList::default()));
    api.expect_analytics().times(1).returning(|| Ok(summary(0)));

    let engine = SyncEngine::new(Arc::new(api), manual_config());
    engine.mount().await;
    assert_eq!(engine.set_filters(FilterState::default()).await, FetchOutcome::Unchanged);
  }

  #[tokio::test]
  async fn test_unmount_drops_cache_and_timer() {
    // Only the mount itself may reach the backend
    let mut api = MockFeedbackApi::new();
    api.expect_list_reviews().times(1).returning(|_| Ok(ReviewList::default()));
    api.expect_analytics().times(1).returning(|| Ok(summary(1)));

    let engine = SyncEngine::new(Arc::new(api), SyncConfig::default());
    engine.mount().await;
    assert!(engine.is_polling().await);
    assert!(engine.analytics().await.data.is_some());

    engine.unmount().await;
    assert!(!engine.is_polling().await);
    assert!(!engine.is_mounted().await);
    assert!(engine.analytics().await.data.is_none());

    let outcome = engine.refresh().await;
    assert_eq!(outcome.reviews, FetchOutcome::Discarded);
    assert_eq!(outcome.analytics, FetchOutcome::Discarded);
    assert!(engine.reviews().await.data.is_none());
  }

  #[tokio::test]
  async fn test_filters_before_mount_fetch_nothing() {
    let mut api = MockFeedbackApi::new();
    api
      .expect_list_reviews()
      .times(1)
      .withf(|query| query.search.as_deref() == Some("late"))
      .returning(|_| Ok(ReviewList::default()));
    api.expect_analytics().times(1).returning(|| Ok(summary(0)));

    let engine = SyncEngine::new(Arc::new(api), manual_config());
    let filters = FilterState { search_text: "late".into(), ..Default::default() };
    assert_eq!(engine.set_filters(filters.clone()).await, FetchOutcome::Discarded);
    assert_eq!(engine.filters().await, filters);

    // The first load targets the filters chosen before mount
    assert_eq!(engine.mount().await.reviews, FetchOutcome::Applied);
  }

  #[tokio::test]
  async fn test_filter_changes_evict_superseded_entries() {
    let mut api = MockFeedbackApi::new();
    api.expect_list_reviews().returning(|_| Ok(ReviewList::default()));
    api.expect_analytics().returning(|| Ok(summary(0)));

    let engine = SyncEngine::new(Arc::new(api), manual_config());
    engine.mount().await;
    for text in ["a", "b", "c", "d"] {
      let filters = FilterState { search_text: text.into(), ..Default::default() };
      assert_eq!(engine.set_filters(filters).await, FetchOutcome::Applied);
    }

    let state = engine.inner.state.lock().await;
    assert_eq!(state.reviews.entries.len(), 1);
    assert!(state.reviews.entries.contains_key(&state.review_key));
  }

  #[tokio::test]
  async fn test_auto_refresh_needs_mounted_dashboard() {
    let api = MockFeedbackApi::new();
    let engine = SyncEngine::new(Arc::new(api), manual_config());

    engine.set_auto_refresh(true).await;
    assert!(engine.auto_refresh().await);
    assert!(!engine.is_polling().await);
  }

  #[test]
  fn test_cache_rejects_overlapping_requests() {
    let mut cache: QueryCache<u32> = QueryCache::default();
    let key = QueryKey::Analytics;

    let first = cache.begin(&key).unwrap();
    assert_eq!(cache.begin(&key), None);
    assert_eq!(cache.settle(&key, first, Ok(7), true), FetchOutcome::Applied);

    let second = cache.begin(&key).unwrap();
    assert!(second > first);
    assert_eq!(cache.settle(&key, first, Ok(8), true), FetchOutcome::Discarded);
    assert_eq!(cache.settle(&key, second, Ok(9), true), FetchOutcome::Applied);
    assert_eq!(cache.snapshot(&key).data.as_deref(), Some(&9));
  }

  #[test]
  fn test_cache_drops_non_current_responses() {
    let mut cache: QueryCache<u32> = QueryCache::default();
    let key = QueryKey::Analytics;

    let seq = cache.begin(&key).unwrap();
    assert_eq!(cache.settle(&key, seq, Ok(1), false), FetchOutcome::Discarded);
    let snapshot = cache.snapshot(&key);
    assert!(snapshot.data.is_none());
    assert!(!snapshot.is_fetching);
    assert!(cache.entries.is_empty());
  }

  #[test]
  fn test_retain_keeps_outstanding_requests() {
    let mut cache: QueryCache<u32> = QueryCache::default();
    let done = QueryKey::reviews(&FilterState { search_text: "done".into(), ..Default::default() });
    let pending = QueryKey::reviews(&FilterState { search_text: "pending".into(), ..Default::default() });
    let current = QueryKey::reviews(&FilterState::default());

    let seq = cache.begin(&done).unwrap();
    cache.settle(&done, seq, Ok(1), true);
    let pending_seq = cache.begin(&pending).unwrap();

    cache.retain_current(&current);
    assert!(!cache.entries.contains_key(&done));
    assert!(cache.entries.contains_key(&pending));

    assert_eq!(cache.settle(&pending, pending_seq, Ok(2), false), FetchOutcome::Discarded);
    assert!(cache.entries.is_empty());
  }

  #[tokio::test(start_paused = true)]
  async fn test_manual_refresh_does_not_reset_timer() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();

    let mut api = MockFeedbackApi::new();
    api.expect_list_reviews().returning(|_| Ok(ReviewList::default()));
    api.expect_analytics().returning(move || {
      counter.fetch_add(1, Ordering::SeqCst);
      Ok(summary(0))
    });

    let engine = SyncEngine::new(Arc::new(api), SyncConfig::default());
    engine.mount().await;

    tokio::time::sleep(Duration::from_secs(20)).await;
    engine.refresh().await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    // Timer still fires at t=30, not t=50
    tokio::time::sleep(Duration::from_secs(11)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 3);
  }
}
