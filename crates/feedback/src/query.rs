//! Filter state and the request parameters / cache keys derived from it

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::model::Sentiment;

const ALL: &str = "all";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RatingFilter {
  #[default]
  All,
  Stars(u8),
}

impl RatingFilter {
  /// Raw value as the filter control holds it
  pub fn raw(&self) -> String {
    match self {
      RatingFilter::All => ALL.to_string(),
      RatingFilter::Stars(n) => n.to_string(),
    }
  }
}

impl FromStr for RatingFilter {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    if s == ALL {
      return Ok(RatingFilter::All);
    }
    match s.parse::<u8>() {
      Ok(n) if (1..=5).contains(&n) => Ok(RatingFilter::Stars(n)),
      _ => Err(format!("rating filter must be 'all' or 1-5, got '{s}'")),
    }
  }
}

impl fmt::Display for RatingFilter {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.raw())
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SentimentFilter {
  #[default]
  All,
  Only(Sentiment),
}

impl SentimentFilter {
  pub fn raw(&self) -> &'static str {
    match self {
      SentimentFilter::All => ALL,
      SentimentFilter::Only(s) => s.as_str(),
    }
  }
}

impl FromStr for SentimentFilter {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    if s == ALL {
      Ok(SentimentFilter::All)
    } else {
      s.parse().map(SentimentFilter::Only)
    }
  }
}

impl fmt::Display for SentimentFilter {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.raw())
  }
}

/// Dashboard filter controls; lives only as long as the mounted dashboard
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct FilterState {
  pub search_text: String,
  pub rating: RatingFilter,
  pub sentiment: SentimentFilter,
}

impl FilterState {
  pub fn new(search_text: impl Into<String>, rating: RatingFilter, sentiment: SentimentFilter) -> Self {
    Self { search_text: search_text.into(), rating, sentiment }
  }
}

/// Query parameters for `GET /api/reviews`
///
/// Unset fields are left off the wire entirely.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ReviewQuery {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub skip: Option<u32>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub limit: Option<u32>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub rating: Option<u8>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub sentiment: Option<Sentiment>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub search: Option<String>,
}

impl ReviewQuery {
  pub fn with_page(mut self, page: Option<Page>) -> Self {
    if let Some(page) = page {
      self.skip = Some(page.skip);
      self.limit = Some(page.limit);
    }
    self
  }

  /// Name/value pairs in wire order
  pub fn pairs(&self) -> Vec<(&'static str, String)> {
    let mut pairs = Vec::new();
    if let Some(skip) = self.skip {
      pairs.push(("skip", skip.to_string()));
    }
    if let Some(limit) = self.limit {
      pairs.push(("limit", limit.to_string()));
    }
    if let Some(rating) = self.rating {
      pairs.push(("rating", rating.to_string()));
    }
    if let Some(sentiment) = self.sentiment {
      pairs.push(("sentiment", sentiment.to_string()));
    }
    if let Some(search) = &self.search {
      pairs.push(("search", search.clone()));
    }
    pairs
  }

  pub fn is_empty(&self) -> bool {
    self.pairs().is_empty()
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
  pub skip: u32,
  pub limit: u32,
}

/// Identity of a cached query
///
/// Review keys carry the raw filter values, sentinels included, so every
/// distinct filter state gets its own slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryKey {
  Reviews { rating: String, sentiment: String, search: String },
  Analytics,
}

impl QueryKey {
  pub fn reviews(filters: &FilterState) -> Self {
    QueryKey::Reviews {
      rating: filters.rating.raw(),
      sentiment: filters.sentiment.raw().to_string(),
      search: filters.search_text.clone(),
    }
  }
}

impl fmt::Display for QueryKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      QueryKey::Reviews { rating, sentiment, search } => {
        write!(f, "[reviews, {rating}, {sentiment}, {search:?}]")
      }
      QueryKey::Analytics => f.write_str("[analytics]"),
    }
  }
}

/// Turn filter controls into wire parameters and the cache key they live under
pub fn compose(filters: &FilterState) -> (ReviewQuery, QueryKey) {
  let query = ReviewQuery {
    rating: match filters.rating {
      RatingFilter::All => None,
      RatingFilter::Stars(n) => Some(n),
    },
    sentiment: match filters.sentiment {
      SentimentFilter::All => None,
      SentimentFilter::Only(s) => Some(s),
    },
    search: (!filters.search_text.is_empty()).then(|| filters.search_text.clone()),
    ..ReviewQuery::default()
  };

  (query, QueryKey::reviews(filters))
}
