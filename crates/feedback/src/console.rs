//! Prefixed status lines for the CLI
//!
//! Everything goes to stderr so stdout stays clean for tables and CSV.

use colored::*;

fn prefix(color: Color, tag: &str) -> String {
  format!("[{}]{:<width$}", tag.color(color).bold(), "", width = 6usize.saturating_sub(tag.len()))
}

fn emit(color: Color, tag: &str, message: &str) {
  let prefix = prefix(color, tag);
  for line in message.lines() {
    eprintln!("{prefix} {line}");
  }
}

pub fn info(message: &str) {
  emit(Color::Blue, "info", message);
}

pub fn warn(message: &str) {
  emit(Color::Yellow, "warn", message);
}

pub fn error(message: &str) {
  emit(Color::Red, "error", message);
}

pub fn success(message: &str) {
  emit(Color::Green, "ok", message);
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_prefix_pads_short_tags() {
    colored::control::set_override(false);
    assert_eq!(prefix(Color::Green, "ok"), "[ok]    ");
    assert_eq!(prefix(Color::Red, "error"), "[error] ");
  }
}
