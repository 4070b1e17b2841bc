#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use feedback::error::{FeedbackError, Result};
use feedback::model::{
  AnalyticsSummary, HealthStatus, NewReview, Review, ReviewList, Sentiment, SentimentDistribution,
};
use feedback::query::ReviewQuery;
use feedback::FeedbackApi;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::oneshot;

/// Held review request; completes once `release` is sent
pub struct Gate {
  pub arrived: oneshot::Receiver<()>,
  pub release: oneshot::Sender<()>,
}

/// In-memory feedback backend for driving the sync engine in tests
#[derive(Default)]
pub struct MockBackend {
  reviews: Mutex<Vec<Review>>,
  gates: Mutex<HashMap<String, (oneshot::Sender<()>, oneshot::Receiver<()>)>>,
  pub list_calls: AtomicUsize,
  pub analytics_calls: AtomicUsize,
  pub should_fail: AtomicBool,
}

impl MockBackend {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_test_data() -> Self {
    let backend = Self::new();
    for (rating, text) in [
      (5, "Fast delivery and friendly staff"),
      (4, "Good value overall"),
      (3, "Delivery was slow but okay"),
      (1, "Package arrived broken"),
    ] {
      backend.insert(rating, text);
    }
    backend
  }

  fn insert(&self, rating: u8, text: &str) -> Review {
    let mut reviews = self.reviews.lock().unwrap();
    let id = reviews.len() as i64 + 1;
    let review = Review {
      id,
      rating,
      review_text: text.to_string(),
      sentiment: classify(rating),
      ai_response: format!("Thanks for the {rating}-star review"),
      ai_summary: text.to_string(),
      recommended_actions: String::new(),
      created_at: Utc.with_ymd_and_hms(2026, 1, 1, 9, 0, 0).unwrap() + Duration::minutes(id),
    };
    reviews.push(review.clone());
    review
  }

  /// Hold the next review request whose search text is `search`
  pub fn hold(&self, search: &str) -> Gate {
    let (arrived_tx, arrived) = oneshot::channel();
    let (release, release_rx) = oneshot::channel();
    self.gates.lock().unwrap().insert(search.to_string(), (arrived_tx, release_rx));
    Gate { arrived, release }
  }

  pub fn list_count(&self) -> usize {
    self.list_calls.load(Ordering::SeqCst)
  }

  pub fn analytics_count(&self) -> usize {
    self.analytics_calls.load(Ordering::SeqCst)
  }

  fn check_up(&self) -> Result<()> {
    if self.should_fail.load(Ordering::SeqCst) {
      return Err(FeedbackError::network("connection refused"));
    }
    Ok(())
  }
}

fn classify(rating: u8) -> Sentiment {
  match rating {
    4..=5 => Sentiment::Positive,
    1..=2 => Sentiment::Negative,
    _ => Sentiment::Neutral,
  }
}

fn matches(review: &Review, query: &ReviewQuery) -> bool {
  query.rating.map_or(true, |rating| review.rating == rating)
    && query.sentiment.map_or(true, |sentiment| review.sentiment == sentiment)
    && query
      .search
      .as_ref()
      .map_or(true, |search| review.review_text.to_lowercase().contains(&search.to_lowercase()))
}

#[async_trait]
impl FeedbackApi for MockBackend {
  async fn create_review(&self, review: &NewReview) -> Result<Review> {
    self.check_up()?;
    Ok(self.insert(review.rating, &review.review_text))
  }

  async fn list_reviews(&self, query: &ReviewQuery) -> Result<ReviewList> {
    self.list_calls.fetch_add(1, Ordering::SeqCst);

    let gate = query.search.as_ref().and_then(|search| self.gates.lock().unwrap().remove(search));
    if let Some((arrived, release)) = gate {
      let _ = arrived.send(());
      let _ = release.await;
    }
    self.check_up()?;

    let reviews = self.reviews.lock().unwrap();
    let mut matching: Vec<Review> = reviews.iter().filter(|r| matches(r, query)).cloned().collect();
    matching.reverse();

    let total = matching.len() as u64;
    let skip = query.skip.unwrap_or(0) as usize;
    let limit = query.limit.unwrap_or(100) as usize;
    Ok(ReviewList { reviews: matching.into_iter().skip(skip).take(limit).collect(), total })
  }

  async fn analytics(&self) -> Result<AnalyticsSummary> {
    self.analytics_calls.fetch_add(1, Ordering::SeqCst);
    self.check_up()?;

    let reviews = self.reviews.lock().unwrap();
    let mut sentiment_distribution = SentimentDistribution::default();
    let mut rating_distribution = BTreeMap::new();
    for review in reviews.iter() {
      match review.sentiment {
        Sentiment::Positive => sentiment_distribution.positive += 1,
        Sentiment::Negative => sentiment_distribution.negative += 1,
        Sentiment::Neutral => sentiment_distribution.neutral += 1,
        Sentiment::Sarcasm => sentiment_distribution.sarcasm += 1,
      }
      *rating_distribution.entry(review.rating).or_insert(0) += 1;
    }

    let total_reviews = reviews.len() as u64;
    let average_rating = if reviews.is_empty() {
      0.0
    } else {
      reviews.iter().map(|r| f64::from(r.rating)).sum::<f64>() / reviews.len() as f64
    };

    Ok(AnalyticsSummary { total_reviews, average_rating, sentiment_distribution, rating_distribution })
  }

  async fn health(&self) -> Result<HealthStatus> {
    self.check_up()?;
    Ok(HealthStatus { status: "healthy".to_string(), service: "feedback-api".to_string() })
  }
}
