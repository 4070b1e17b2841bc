//! CSV export of the loaded review log

use chrono::{DateTime, Local, NaiveDate, Utc};
use csv::{QuoteStyle, Terminator, WriterBuilder};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{FeedbackError, Result};
use crate::model::Review;

pub const HEADER: [&str; 7] =
  ["ID", "Rating", "Review", "Sentiment", "AI Summary", "Recommended Actions", "Created At"];

const LOCAL_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Download name for an export made on `date`
pub fn export_filename(date: NaiveDate) -> String {
  format!("fynd-feedback-{}.csv", date.format("%Y-%m-%d"))
}

/// Wrap a free-text field in quotes, doubling any embedded quotes
fn quote(text: &str) -> String {
  format!("\"{}\"", text.replace('"', "\"\""))
}

fn local_time(created_at: &DateTime<Utc>) -> String {
  created_at.with_timezone(&Local).format(LOCAL_TIME_FORMAT).to_string()
}

/// Serialize reviews to CSV; `None` when there is nothing to export
///
/// Free-text columns are always quoted, numeric and enum columns never are.
pub fn to_csv(records: Option<&[Review]>) -> Result<Option<Vec<u8>>> {
  let Some(records) = records.filter(|r| !r.is_empty()) else {
    return Ok(None);
  };

  // Quoting is done per column above, so the writer must not add its own
  let mut writer = WriterBuilder::new()
    .quote_style(QuoteStyle::Never)
    .terminator(Terminator::Any(b'\n'))
    .from_writer(Vec::new());

  writer.write_record(HEADER)?;
  for review in records {
    writer.write_record([
      review.id.to_string(),
      review.rating.to_string(),
      quote(&review.review_text),
      review.sentiment.to_string(),
      quote(&review.ai_summary),
      quote(&review.recommended_actions),
      local_time(&review.created_at),
    ])?;
  }

  let bytes = writer.into_inner().map_err(|e| FeedbackError::export(e.to_string()))?;
  Ok(Some(bytes))
}

/// Write the export into `dir` under today's name; nothing is written for an empty set
pub fn save(records: Option<&[Review]>, dir: &Path) -> Result<Option<PathBuf>> {
  let Some(bytes) = to_csv(records)? else {
    return Ok(None);
  };

  fs::create_dir_all(dir)?;
  let path = dir.join(export_filename(Utc::now().date_naive()));
  fs::write(&path, bytes)?;
  Ok(Some(path))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::Sentiment;
  use chrono::TimeZone;
  use tempfile::TempDir;

  fn review(id: i64, text: &str) -> Review {
    Review {
      id,
      rating: 4,
      review_text: text.to_string(),
      sentiment: Sentiment::Sarcasm,
      ai_response: "Thanks for letting us know".to_string(),
      ai_summary: "Customer liked it, \"mostly\"".to_string(),
      recommended_actions: "Review pricing\nFollow up".to_string(),
      created_at: Utc.with_ymd_and_hms(2026, 3, 1, 8, 15, 0).unwrap(),
    }
  }

  #[test]
  fn test_empty_or_missing_records_produce_nothing() {
    assert_eq!(to_csv(None).unwrap(), None);
    let empty: Vec<Review> = Vec::new();
    assert_eq!(to_csv(Some(empty.as_slice())).unwrap(), None);

    let dir = TempDir::new().unwrap();
    assert_eq!(save(Some(empty.as_slice()), dir.path()).unwrap(), None);
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
  }

  #[test]
  fn test_quotes_are_doubled() {
    let records = [review(1, r#"Great, but "pricey""#)];
    let csv = String::from_utf8(to_csv(Some(records.as_slice())).unwrap().unwrap()).unwrap();

    let mut lines = csv.lines();
    assert_eq!(
      lines.next(),
      Some("ID,Rating,Review,Sentiment,AI Summary,Recommended Actions,Created At")
    );
    assert!(lines.next().unwrap().starts_with(r#"1,4,"Great, but ""pricey""",sarcasm,"#));
  }

  #[test]
  fn test_standard_parser_recovers_fields() {
    let records = [review(1, r#"Great, but "pricey""#), review(2, "Plain text")];
    let bytes = to_csv(Some(records.as_slice())).unwrap().unwrap();

    let mut reader = csv::Reader::from_reader(bytes.as_slice());
    let headers = reader.headers().unwrap().clone();
    assert_eq!(headers.iter().collect::<Vec<_>>(), HEADER.to_vec());

    let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
    assert_eq!(rows.len(), 2);
    assert_eq!(&rows[0][0], "1");
    assert_eq!(&rows[0][2], r#"Great, but "pricey""#);
    assert_eq!(&rows[0][3], "sarcasm");
    assert_eq!(&rows[0][4], r#"Customer liked it, "mostly""#);
    assert_eq!(&rows[0][5], "Review pricing\nFollow up");
    assert_eq!(&rows[1][2], "Plain text");
  }

  #[test]
  fn test_plain_text_fields_are_still_quoted() {
    let bytes = to_csv(Some(vec![review(9, "Plain")].as_slice())).unwrap().unwrap();
    let csv = String::from_utf8(bytes).unwrap();
    assert!(csv.contains(r#"9,4,"Plain",sarcasm,"#));
  }

  #[test]
  fn test_created_at_uses_local_time() {
    let records = [review(1, "x")];
    let bytes = to_csv(Some(records.as_slice())).unwrap().unwrap();
    let mut reader = csv::Reader::from_reader(bytes.as_slice());
    let row = reader.records().next().unwrap().unwrap();

    let expected = records[0].created_at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string();
    assert_eq!(&row[6], expected);
  }

  #[test]
  fn test_export_filename() {
    let date = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();
    assert_eq!(export_filename(date), "fynd-feedback-2026-10-16.csv");
  }

  #[test]
  fn test_save_writes_named_file() {
    let dir = TempDir::new().unwrap();
    let path = save(Some(vec![review(3, "Saved")].as_slice()), dir.path()).unwrap().unwrap();

    let name = path.file_name().unwrap().to_string_lossy().to_string();
    assert!(name.starts_with("fynd-feedback-"));
    assert!(name.ends_with(".csv"));
    assert!(fs::read_to_string(&path).unwrap().contains("\"Saved\""));
  }
}
