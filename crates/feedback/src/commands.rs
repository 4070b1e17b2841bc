//! CLI command handlers
//!
//! Each handler talks to the backend through [`FeedbackApi`] and prints to
//! stdout; status lines go through [`console`] on stderr.

use anyhow::{Context, Result};
use chrono::{DateTime, Local, Utc};
use colored::*;
use std::future::Future;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::debug;

use crate::chart::{
  rating_chart_config, rating_chart_data, sentiment_chart_config, sentiment_chart_data, ChartConfig,
  Theme,
};
use crate::client::FeedbackApi;
use crate::config::SyncConfig;
use crate::console;
use crate::display::{bar_chart, review_table, sentiment_badge, SummaryCards};
use crate::export::save as save_csv;
use crate::model::{AnalyticsSummary, NewReview, ReviewList};
use crate::query::{compose, FilterState, Page, RatingFilter, SentimentFilter};
use crate::sync::{QuerySnapshot, SyncEngine};

const WATCH_RENDER_POLL: Duration = Duration::from_millis(250);
const WATCH_HELP: &str =
  "Commands: r refresh, a toggle auto-refresh, /text search, rating 1-5|all, sentiment <name>|all, q quit";

/// Chart configuration for both dashboard charts
#[derive(Debug, Clone)]
pub struct ChartSettings {
  pub sentiment: ChartConfig,
  pub rating: ChartConfig,
  pub theme: Theme,
}

impl ChartSettings {
  /// Built-in configs with `overrides` layered on top of both
  pub fn new(theme: Theme, overrides: Option<ChartConfig>) -> Self {
    let overrides = overrides.unwrap_or_default();
    Self {
      sentiment: sentiment_chart_config().merge(overrides.clone()),
      rating: rating_chart_config().merge(overrides),
      theme,
    }
  }

  /// Read a YAML series map from `path`
  pub fn load_overrides(path: &Path) -> Result<ChartConfig> {
    let source = std::fs::read_to_string(path)
      .with_context(|| format!("Failed to read chart config {}", path.display()))?;
    Ok(ChartConfig::from_yaml(&source)?)
  }
}

/// Validate and submit a review, then show the classifier's verdict
pub async fn submit(api: &dyn FeedbackApi, rating: Option<u8>, text: &str) -> Result<()> {
  let review = NewReview::new(rating, text)?;
  let created = api
    .create_review(&review)
    .await
    .context("Failed to submit review. Please try again.")?;

  console::success(&format!("Review #{} submitted", created.id));
  println!("{} {}", "Sentiment:".bold(), sentiment_badge(created.sentiment));
  if !created.ai_response.is_empty() {
    println!("{}\n{}", "Response:".bold(), created.ai_response);
  }
  Ok(())
}

/// One-shot listing of reviews matching `filters`
pub async fn reviews(api: &dyn FeedbackApi, filters: &FilterState, page: Option<Page>) -> Result<()> {
  let (query, key) = compose(filters);
  debug!(key = %key, "listing reviews");

  let list = api.list_reviews(&query.with_page(page)).await?;
  println!("{}", review_table(&list.reviews));
  println!("\n{}", format!("Showing {} of {} reviews", list.reviews.len(), list.total).dimmed());
  Ok(())
}

/// Summary cards and both distribution charts
pub async fn analytics(api: &dyn FeedbackApi, charts: &ChartSettings) -> Result<()> {
  let summary = api.analytics().await?;
  println!("{}", SummaryCards::new(Some(&summary), None).render());
  println!();
  println!("{}", render_charts(&summary, charts));
  Ok(())
}

/// Live dashboard kept current by the sync engine until Ctrl-C or `q`
///
/// Lines typed on stdin refresh, toggle auto-refresh, or change the filters.
pub async fn watch(
  api: Arc<dyn FeedbackApi>,
  config: SyncConfig,
  filters: FilterState,
  charts: &ChartSettings,
) -> Result<()> {
  let interval = config.refresh_interval;
  let engine = SyncEngine::with_filters(api, config, filters);
  engine.mount().await;

  if engine.auto_refresh().await {
    console::info(&format!("Refreshing every {}s, Ctrl-C to exit", interval.as_secs()));
  } else {
    console::info("Auto-refresh is off, Ctrl-C to exit");
  }
  console::info(WATCH_HELP);

  let input = BufReader::new(tokio::io::stdin());
  run_dashboard(&engine, input, tokio::signal::ctrl_c(), charts).await;

  engine.unmount().await;
  console::info("Dashboard closed");
  Ok(())
}

/// A line typed into the live dashboard
#[derive(Debug, Clone, PartialEq, Eq)]
enum WatchInput {
  Refresh,
  ToggleAutoRefresh,
  Search(String),
  Rating(RatingFilter),
  Sentiment(SentimentFilter),
  Quit,
}

impl FromStr for WatchInput {
  type Err = String;

  fn from_str(line: &str) -> std::result::Result<Self, Self::Err> {
    let line = line.trim();
    if let Some(text) = line.strip_prefix('/') {
      return Ok(WatchInput::Search(text.trim().to_string()));
    }

    let (command, arg) = match line.split_once(char::is_whitespace) {
      Some((command, arg)) => (command, arg.trim()),
      None => (line, ""),
    };
    match (command, arg) {
      ("r" | "refresh", "") => Ok(WatchInput::Refresh),
      ("a" | "auto", "") => Ok(WatchInput::ToggleAutoRefresh),
      ("q" | "quit", "") => Ok(WatchInput::Quit),
      ("rating", arg) => arg.parse().map(WatchInput::Rating),
      ("sentiment", arg) => arg.to_lowercase().parse().map(WatchInput::Sentiment),
      _ => Err(format!("unknown command '{line}'. {WATCH_HELP}")),
    }
  }
}

/// Render the dashboard whenever its data changes and apply typed commands
/// until `shutdown` resolves or the user types `q`
async fn run_dashboard<R, S>(engine: &SyncEngine, input: R, shutdown: S, charts: &ChartSettings)
where
  R: AsyncBufRead + Unpin,
  S: Future,
{
  tokio::pin!(shutdown);
  let mut lines = input.lines();
  let mut input_open = true;
  let mut last_seen = None;
  let mut ticker = tokio::time::interval(WATCH_RENDER_POLL);

  loop {
    tokio::select! {
      _ = &mut shutdown => break,
      line = lines.next_line(), if input_open => {
        let line = match line {
          Ok(Some(line)) => line,
          Ok(None) => {
            input_open = false;
            continue;
          }
          Err(err) => {
            debug!("dashboard input closed: {err}");
            input_open = false;
            continue;
          }
        };
        if line.trim().is_empty() {
          continue;
        }
        match line.parse::<WatchInput>() {
          Ok(WatchInput::Quit) => break,
          Ok(command) => {
            let interrupted = tokio::select! {
              _ = apply_input(engine, command) => false,
              _ = &mut shutdown => true,
            };
            if interrupted {
              break;
            }
          }
          Err(err) => console::warn(&err),
        }
      }
      _ = ticker.tick() => {
        let reviews = engine.reviews().await;
        let analytics = engine.analytics().await;
        let filters = engine.filters().await;
        let auto_refresh = engine.auto_refresh().await;

        let seen = (
          reviews.key.clone(),
          reviews.updated_at,
          analytics.updated_at,
          reviews.error.is_some(),
          analytics.error.is_some(),
          auto_refresh,
        );
        if last_seen.as_ref() != Some(&seen) {
          last_seen = Some(seen);
          print!("\x1B[2J\x1B[H");
          println!("{}", render_dashboard(&reviews, &analytics, charts));
          println!("\n{}", status_line(&filters, auto_refresh));
        }
      }
    }
  }
}

async fn apply_input(engine: &SyncEngine, input: WatchInput) {
  match input {
    WatchInput::Refresh => {
      engine.refresh().await;
    }
    WatchInput::ToggleAutoRefresh => {
      let enabled = !engine.auto_refresh().await;
      engine.set_auto_refresh(enabled).await;
    }
    WatchInput::Search(text) => edit_filters(engine, |filters| filters.search_text = text).await,
    WatchInput::Rating(rating) => edit_filters(engine, |filters| filters.rating = rating).await,
    WatchInput::Sentiment(sentiment) => edit_filters(engine, |filters| filters.sentiment = sentiment).await,
    WatchInput::Quit => {}
  }
}

async fn edit_filters(engine: &SyncEngine, edit: impl FnOnce(&mut FilterState)) {
  let mut filters = engine.filters().await;
  edit(&mut filters);
  let outcome = engine.set_filters(filters).await;
  debug!(?outcome, "filters updated from dashboard input");
}

fn status_line(filters: &FilterState, auto_refresh: bool) -> String {
  let search = if filters.search_text.is_empty() { "-" } else { filters.search_text.as_str() };
  let auto = if auto_refresh { "on" } else { "off" };
  format!(
    "{} search: {}  rating: {}  sentiment: {}  auto-refresh: {}",
    ">".cyan(),
    search,
    filters.rating,
    filters.sentiment,
    auto
  )
  .dimmed()
  .to_string()
}

/// Download the filtered review log as CSV into `out_dir`
pub async fn export(api: &dyn FeedbackApi, filters: &FilterState, out_dir: &Path) -> Result<()> {
  let (query, _) = compose(filters);
  let list = api.list_reviews(&query).await?;

  match save_csv(Some(list.reviews.as_slice()), out_dir)? {
    Some(path) => console::success(&format!("Exported {} reviews to {}", list.reviews.len(), path.display())),
    None => console::warn("No reviews to export"),
  }
  Ok(())
}

pub async fn health(api: &dyn FeedbackApi) -> Result<()> {
  let status = api.health().await.context("Backend is unreachable")?;
  console::success(&format!("{} is {}", status.service, status.status));
  Ok(())
}

fn render_charts(summary: &AnalyticsSummary, charts: &ChartSettings) -> String {
  let sentiment = bar_chart(
    "Sentiment Distribution",
    &sentiment_chart_data(summary),
    &charts.sentiment,
    "sentiment",
    charts.theme,
  );
  let rating =
    bar_chart("Rating Distribution", &rating_chart_data(summary), &charts.rating, "count", charts.theme);
  format!("{sentiment}\n\n{rating}")
}

fn updated_label(updated_at: Option<DateTime<Utc>>) -> String {
  match updated_at {
    Some(at) => format!("updated {}", at.with_timezone(&Local).format("%H:%M:%S")),
    None => "loading".to_string(),
  }
}

fn render_dashboard(
  reviews: &QuerySnapshot<ReviewList>,
  analytics: &QuerySnapshot<AnalyticsSummary>,
  charts: &ChartSettings,
) -> String {
  let mut out = vec![
    format!("{} {}", "Customer Feedback".bold(), updated_label(analytics.updated_at).dimmed()),
    SummaryCards::new(analytics.data.as_deref(), reviews.data.as_deref()).render(),
  ];

  if let Some(err) = &analytics.error {
    out.push(format!("{} {}", "!".yellow(), format!("Analytics unavailable, showing last data: {err}").yellow()));
  }
  if let Some(summary) = analytics.data.as_deref() {
    out.push(render_charts(summary, charts));
  }

  if let Some(err) = &reviews.error {
    out.push(format!("{} {}", "!".yellow(), format!("Reviews unavailable, showing last data: {err}").yellow()));
  }
  match reviews.data.as_deref() {
    Some(list) => out.push(review_table(&list.reviews)),
    None => out.push("Loading reviews...".dimmed().to_string()),
  }

  out.join("\n\n")
}
