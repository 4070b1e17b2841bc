//! Error taxonomy for the dashboard client
//!
//! Network failures are recoverable (stale data stays on screen), validation
//! failures are caught before anything is sent, and chart lookups that miss are
//! not errors at all.

use thiserror::Error;

/// Maximum review length accepted by the backend, in characters
pub const MAX_REVIEW_CHARS: usize = 5000;

pub type Result<T> = std::result::Result<T, FeedbackError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FeedbackError {
  #[error("Request failed: {message}")]
  Network { message: String },

  #[error("Server responded with HTTP {status}: {body}")]
  Status { status: u16, body: String },

  #[error("Unexpected response body: {message}")]
  Decode { message: String },

  #[error(transparent)]
  Validation(#[from] ValidationError),

  #[error(transparent)]
  ChartConfig(#[from] ChartConfigError),

  #[error("Export failed: {message}")]
  Export { message: String },
}

impl FeedbackError {
  pub fn network(message: impl Into<String>) -> Self {
    Self::Network { message: message.into() }
  }

  pub fn status(status: u16, body: impl Into<String>) -> Self {
    Self::Status { status, body: body.into() }
  }

  pub fn decode(message: impl Into<String>) -> Self {
    Self::Decode { message: message.into() }
  }

  pub fn export(message: impl Into<String>) -> Self {
    Self::Export { message: message.into() }
  }

  /// Failures retried by the next scheduled tick or a manual refresh
  pub fn is_network(&self) -> bool {
    matches!(self, Self::Network { .. } | Self::Status { .. } | Self::Decode { .. })
  }
}

impl From<reqwest::Error> for FeedbackError {
  fn from(err: reqwest::Error) -> Self {
    if err.is_decode() {
      Self::decode(err.to_string())
    } else {
      Self::network(err.to_string())
    }
  }
}

impl From<std::io::Error> for FeedbackError {
  fn from(err: std::io::Error) -> Self {
    Self::export(err.to_string())
  }
}

impl From<csv::Error> for FeedbackError {
  fn from(err: csv::Error) -> Self {
    Self::export(err.to_string())
  }
}

/// Submission problems surfaced to the user before any request is made
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
  #[error("Please select a rating")]
  MissingRating,

  #[error("Rating must be between 1 and 5 stars, got {rating}")]
  RatingOutOfRange { rating: u8 },

  #[error("Please write a review")]
  EmptyReview,

  #[error("Review is too long. Maximum 5000 characters.")]
  ReviewTooLong { length: usize },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChartConfigError {
  #[error("Series '{key}' declares both a color and a theme")]
  ColorAndTheme { key: String },

  #[error("Series '{key}' declares neither a color nor a theme")]
  MissingColor { key: String },

  #[error("Series '{key}' uses unknown theme '{theme}'")]
  UnknownTheme { key: String, theme: String },

  #[error("Invalid chart configuration: {message}")]
  Parse { message: String },
}
