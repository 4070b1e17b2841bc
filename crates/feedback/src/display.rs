//! Terminal rendering for the dashboard: summary cards, charts, review table

use chrono::Local;
use colored::*;

use crate::chart::{
  build_legend, effective_key, format_value, resolve, ChartConfig, LegendMarker, LegendOptions,
  PayloadItem, Theme, ThemePalette,
};
use crate::model::{AnalyticsSummary, Review, ReviewList, Sentiment};

const BAR_WIDTH: usize = 30;
const RECENT_LIMIT: usize = 5;

/// Headline numbers shown above the charts
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryCards {
  pub total_reviews: u64,
  pub average_rating: String,
  pub positive: u64,
  pub recent_activity: usize,
}

impl SummaryCards {
  pub fn new(analytics: Option<&AnalyticsSummary>, reviews: Option<&ReviewList>) -> Self {
    Self {
      total_reviews: analytics.map(|a| a.total_reviews).unwrap_or(0),
      average_rating: analytics
        .map(|a| format!("{:.1}", a.average_rating))
        .unwrap_or_else(|| "0.0".to_string()),
      positive: analytics.map(|a| a.sentiment_distribution.positive).unwrap_or(0),
      recent_activity: reviews.map(|r| r.reviews.len().min(RECENT_LIMIT)).unwrap_or(0),
    }
  }

  pub fn render(&self) -> String {
    format!(
      "{} {}   {} {}   {} {}   {} {}",
      "Total Reviews".dimmed(),
      self.total_reviews.to_string().bold(),
      "Average Rating".dimmed(),
      self.average_rating.bold(),
      "Positive Feedback".dimmed(),
      self.positive.to_string().bold(),
      "Recent Activity".dimmed(),
      self.recent_activity.to_string().bold(),
    )
  }
}

fn parse_hex(color: &str) -> Option<(u8, u8, u8)> {
  let hex = color.strip_prefix('#')?;
  if hex.len() != 6 {
    return None;
  }
  let channel = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
  Some((channel(0)?, channel(2)?, channel(4)?))
}

fn paint(text: &str, color: Option<&str>) -> ColoredString {
  match color.and_then(parse_hex) {
    Some((r, g, b)) => text.truecolor(r, g, b),
    None => text.normal(),
  }
}

pub fn sentiment_badge(sentiment: Sentiment) -> String {
  let badge = format!("{} {}", sentiment.icon(), sentiment.label());
  paint(&badge, Some(sentiment.color())).to_string()
}

pub fn stars(rating: u8) -> String {
  let filled = usize::from(rating.min(5));
  format!("{}{}", "★".repeat(filled), "☆".repeat(5 - filled))
}

/// Horizontal bar chart; series without a config entry are skipped
pub fn bar_chart(
  title: &str,
  items: &[PayloadItem],
  config: &ChartConfig,
  name_key: &str,
  theme: Theme,
) -> String {
  let palette = ThemePalette::build(config);
  let max = items.iter().filter_map(|item| item.value.as_f64()).fold(0.0_f64, f64::max);

  let mut lines = vec![title.bold().to_string()];
  for item in items {
    let Some(entry) = resolve(config, item, name_key) else {
      continue;
    };

    let series = effective_key(item, name_key);
    let color = palette
      .as_ref()
      .and_then(|p| p.color(theme, series).or_else(|| p.color(theme, name_key)))
      .or(item.color.as_deref());

    let value = item.value.as_f64().unwrap_or(0.0);
    let width = if max > 0.0 { ((value / max) * BAR_WIDTH as f64).round() as usize } else { 0 };
    let label = item.name.as_deref().or(entry.label.as_deref()).unwrap_or(series);

    lines.push(format!(
      "  {:<12} {:<width$} {}",
      label,
      paint(&"█".repeat(width), color),
      format_value(Some(entry), &item.value),
      width = BAR_WIDTH
    ));
  }

  let legend = build_legend(
    config,
    items,
    &LegendOptions { hide_icon: false, name_key: Some(name_key.to_string()) },
  );
  if !legend.is_empty() {
    let entries: Vec<String> = legend
      .iter()
      .map(|entry| {
        let marker = match &entry.marker {
          LegendMarker::Icon(icon) => icon.clone(),
          LegendMarker::Swatch(color) => paint("■", color.as_deref()).to_string(),
          LegendMarker::Hidden => String::new(),
        };
        format!("{} {}", marker, entry.label.as_deref().unwrap_or_default()).trim().to_string()
      })
      .collect();
    lines.push(format!("  {}", entries.join("   ")));
  }

  lines.join("\n")
}

fn truncate(text: &str, max_chars: usize) -> String {
  let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
  if flat.chars().count() <= max_chars {
    return flat;
  }
  let cut: String = flat.chars().take(max_chars.saturating_sub(1)).collect();
  format!("{cut}…")
}

pub fn review_table(reviews: &[Review]) -> String {
  if reviews.is_empty() {
    return "No reviews found matching your filters.".dimmed().to_string();
  }

  let mut lines = vec![format!(
    "{:<6} {:<6} {:<40} {:<12} {:<36} {}",
    "ID", "Rating", "Review", "Sentiment", "AI Summary", "Date"
  )
  .bold()
  .to_string()];

  for review in reviews {
    let badge = format!("{} {}", review.sentiment.icon(), review.sentiment.label());
    lines.push(format!(
      "{:<6} {:<6} {:<40} {} {:<36} {}",
      format!("#{}", review.id),
      stars(review.rating),
      truncate(&review.review_text, 40),
      paint(&format!("{badge:<12}"), Some(review.sentiment.color())),
      truncate(&review.ai_summary, 36),
      review.created_at.with_timezone(&Local).format("%Y-%m-%d"),
    ));
  }

  lines.join("\n")
}
