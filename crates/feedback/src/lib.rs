//! Feedback - Customer Feedback Dashboard Client
//!
//! Keeps a live view of customer reviews and their analytics in sync with the
//! feedback backend, resolves chart series to display settings, and exports
//! the review log as CSV.

pub mod chart;
pub mod client;
pub mod commands;
pub mod config;
pub mod console;
pub mod display;
pub mod error;
pub mod export;
pub mod model;
pub mod query;
pub mod sync;

pub use client::{ApiClient, FeedbackApi};
pub use error::{FeedbackError, Result};
pub use sync::SyncEngine;
