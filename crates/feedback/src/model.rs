//! Review and analytics records exchanged with the feedback backend
//!
//! Records are created by the server and only ever read by the client.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{ValidationError, MAX_REVIEW_CHARS};

/// Sentiment assigned to a review by the external classifier
///
/// Labels the classifier may add later decode as neutral.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
  Positive,
  Negative,
  Sarcasm,
  #[serde(other)]
  Neutral,
}

impl Sentiment {
  pub const ALL: [Sentiment; 4] =
    [Sentiment::Positive, Sentiment::Negative, Sentiment::Neutral, Sentiment::Sarcasm];

  /// Wire name, also used as the chart series key
  pub fn as_str(&self) -> &'static str {
    match self {
      Sentiment::Positive => "positive",
      Sentiment::Negative => "negative",
      Sentiment::Neutral => "neutral",
      Sentiment::Sarcasm => "sarcasm",
    }
  }

  pub fn label(&self) -> &'static str {
    match self {
      Sentiment::Positive => "Positive",
      Sentiment::Negative => "Negative",
      Sentiment::Neutral => "Neutral",
      Sentiment::Sarcasm => "Sarcasm",
    }
  }

  /// Dashboard color for this sentiment
  pub fn color(&self) -> &'static str {
    match self {
      Sentiment::Positive => "#10B981",
      Sentiment::Negative => "#EF4444",
      Sentiment::Neutral => "#F59E0B",
      Sentiment::Sarcasm => "#8B5CF6",
    }
  }

  pub fn icon(&self) -> &'static str {
    match self {
      Sentiment::Positive => "☺",
      Sentiment::Negative => "☹",
      Sentiment::Neutral => "😐",
      Sentiment::Sarcasm => "💬",
    }
  }
}

impl fmt::Display for Sentiment {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for Sentiment {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "positive" => Ok(Sentiment::Positive),
      "negative" => Ok(Sentiment::Negative),
      "neutral" => Ok(Sentiment::Neutral),
      "sarcasm" => Ok(Sentiment::Sarcasm),
      other => Err(format!("unknown sentiment '{other}'")),
    }
  }
}

/// A single customer review as returned by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
  pub id: i64,
  pub rating: u8,
  pub review_text: String,
  pub sentiment: Sentiment,
  pub ai_response: String,
  pub ai_summary: String,
  pub recommended_actions: String,
  #[serde(deserialize_with = "timestamp::deserialize")]
  pub created_at: DateTime<Utc>,
}

/// Response for `GET /api/reviews`
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ReviewList {
  pub reviews: Vec<Review>,
  pub total: u64,
}

/// Per-sentiment review counts; all four sentiments are always present
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SentimentDistribution {
  pub positive: u64,
  pub negative: u64,
  pub neutral: u64,
  pub sarcasm: u64,
}

impl SentimentDistribution {
  pub fn count(&self, sentiment: Sentiment) -> u64 {
    match sentiment {
      Sentiment::Positive => self.positive,
      Sentiment::Negative => self.negative,
      Sentiment::Neutral => self.neutral,
      Sentiment::Sarcasm => self.sarcasm,
    }
  }

  pub fn iter(&self) -> impl Iterator<Item = (Sentiment, u64)> + '_ {
    Sentiment::ALL.into_iter().map(move |s| (s, self.count(s)))
  }
}

/// Response for `GET /api/analytics`
///
/// Always a full snapshot of the unfiltered data set.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AnalyticsSummary {
  pub total_reviews: u64,
  pub average_rating: f64,
  pub sentiment_distribution: SentimentDistribution,
  /// Star value to count; only ratings that occur are guaranteed to be present
  #[serde(default)]
  pub rating_distribution: BTreeMap<u8, u64>,
}

impl AnalyticsSummary {
  pub fn rating_count(&self, stars: u8) -> u64 {
    self.rating_distribution.get(&stars).copied().unwrap_or(0)
  }
}

/// Response for `GET /api/health`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
  pub status: String,
  pub service: String,
}

/// Body for `POST /api/reviews`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewReview {
  pub rating: u8,
  pub review_text: String,
}

impl NewReview {
  /// Validate a submission; `rating` is `None` (or 0) until the user picks stars
  pub fn new(rating: Option<u8>, review_text: impl Into<String>) -> Result<Self, ValidationError> {
    let review_text = review_text.into();

    let rating = match rating {
      None | Some(0) => return Err(ValidationError::MissingRating),
      Some(r) if r > 5 => return Err(ValidationError::RatingOutOfRange { rating: r }),
      Some(r) => r,
    };

    if review_text.trim().is_empty() {
      return Err(ValidationError::EmptyReview);
    }

    let length = review_text.chars().count();
    if length > MAX_REVIEW_CHARS {
      return Err(ValidationError::ReviewTooLong { length });
    }

    Ok(Self { rating, review_text })
  }
}

/// The backend may emit either RFC 3339 or naive ISO-8601 timestamps
mod timestamp {
  use super::*;

  pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
  where
    D: Deserializer<'de>,
  {
    let raw = String::deserialize(deserializer)?;
    parse(&raw).map_err(serde::de::Error::custom)
  }

  pub fn parse(raw: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
      return Ok(dt.with_timezone(&Utc));
    }

    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
      .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
      .map(|naive| naive.and_utc())
      .map_err(|e| format!("invalid timestamp '{raw}': {e}"))
  }
}
