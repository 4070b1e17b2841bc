//! Chart series configuration and tooltip/legend resolution
//!
//! A [`ChartConfig`] maps series keys to display settings. Payload items coming
//! from chart data can rename the series they belong to, either with a string
//! field on the item itself or on the raw row it was drawn from. Series that
//! resolve to nothing are simply left out of tooltips and legends.

use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::ChartConfigError;
use crate::model::{AnalyticsSummary, Sentiment};

pub const RATING_BAR_COLOR: &str = "#6366F1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Theme {
  Light,
  Dark,
}

impl Theme {
  pub const ALL: [Theme; 2] = [Theme::Light, Theme::Dark];
}

impl FromStr for Theme {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "light" => Ok(Theme::Light),
      "dark" => Ok(Theme::Dark),
      other => Err(format!("unknown theme '{other}'")),
    }
  }
}

/// Either one color for every theme or a color per theme, never both
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeriesColor {
  Fixed(String),
  Themed(BTreeMap<Theme, String>),
}

impl SeriesColor {
  pub fn for_theme(&self, theme: Theme) -> Option<&str> {
    match self {
      SeriesColor::Fixed(color) => Some(color),
      SeriesColor::Themed(colors) => colors.get(&theme).map(String::as_str),
    }
  }
}

pub type Formatter = Arc<dyn Fn(&Value) -> String + Send + Sync>;

/// Named value formatters usable from declarative configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueFormat {
  /// Whole number
  Count,
  /// Ratio in 0..=1 shown as a rounded percentage
  Percent,
  /// One decimal place
  Decimal,
  /// Star rating, e.g. "4 ★"
  Stars,
}

impl ValueFormat {
  pub fn formatter(self) -> Formatter {
    Arc::new(move |value: &Value| match (self, value.as_f64()) {
      (ValueFormat::Count, Some(n)) => format!("{}", n.round() as i64),
      (ValueFormat::Percent, Some(n)) => format!("{:.0}%", n * 100.0),
      (ValueFormat::Decimal, Some(n)) => format!("{n:.1}"),
      (ValueFormat::Stars, Some(n)) => format!("{} ★", n.round() as i64),
      (_, None) => display_value(value),
    })
  }
}

#[derive(Clone)]
pub struct ChartEntry {
  pub label: Option<String>,
  pub icon: Option<String>,
  pub color: SeriesColor,
  pub formatter: Option<Formatter>,
}

impl fmt::Debug for ChartEntry {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ChartEntry")
      .field("label", &self.label)
      .field("icon", &self.icon)
      .field("color", &self.color)
      .field("formatter", &self.formatter.as_ref().map(|_| "<fn>"))
      .finish()
  }
}

impl ChartEntry {
  pub fn with_color(color: impl Into<String>) -> Self {
    Self { label: None, icon: None, color: SeriesColor::Fixed(color.into()), formatter: None }
  }

  pub fn with_theme(colors: impl IntoIterator<Item = (Theme, String)>) -> Self {
    Self {
      label: None,
      icon: None,
      color: SeriesColor::Themed(colors.into_iter().collect()),
      formatter: None,
    }
  }

  pub fn label(mut self, label: impl Into<String>) -> Self {
    self.label = Some(label.into());
    self
  }

  pub fn icon(mut self, icon: impl Into<String>) -> Self {
    self.icon = Some(icon.into());
    self
  }

  pub fn formatter(mut self, formatter: Formatter) -> Self {
    self.formatter = Some(formatter);
    self
  }

  fn from_def(key: &str, def: SeriesDef) -> Result<Self, ChartConfigError> {
    let color = match (def.color, def.theme) {
      (Some(_), Some(_)) => return Err(ChartConfigError::ColorAndTheme { key: key.to_string() }),
      (None, None) => return Err(ChartConfigError::MissingColor { key: key.to_string() }),
      (Some(color), None) => SeriesColor::Fixed(color),
      (None, Some(themes)) => {
        let mut colors = BTreeMap::new();
        for (name, color) in themes {
          let theme = name.parse::<Theme>().map_err(|_| ChartConfigError::UnknownTheme {
            key: key.to_string(),
            theme: name.clone(),
          })?;
          colors.insert(theme, color);
        }
        SeriesColor::Themed(colors)
      }
    };

    Ok(Self {
      label: def.label,
      icon: def.icon,
      color,
      formatter: def.format.map(ValueFormat::formatter),
    })
  }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SeriesDef {
  label: Option<String>,
  icon: Option<String>,
  color: Option<String>,
  theme: Option<BTreeMap<String, String>>,
  format: Option<ValueFormat>,
}

#[derive(Debug, Clone, Default)]
pub struct ChartConfig {
  entries: BTreeMap<String, ChartEntry>,
}

impl ChartConfig {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn series(mut self, key: impl Into<String>, entry: ChartEntry) -> Self {
    self.entries.insert(key.into(), entry);
    self
  }

  pub fn get(&self, key: &str) -> Option<&ChartEntry> {
    self.entries.get(key)
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, &ChartEntry)> {
    self.entries.iter().map(|(k, v)| (k.as_str(), v))
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  /// Load a series map from YAML, e.g.
  ///
  /// ```yaml
  /// positive: { label: Positive, color: "#10B981", format: count }
  /// trend: { label: Trend, theme: { light: "#111", dark: "#eee" } }
  /// ```
  pub fn from_yaml(source: &str) -> Result<Self, ChartConfigError> {
    let defs: BTreeMap<String, SeriesDef> = serde_yaml::from_str(source)
      .map_err(|e| ChartConfigError::Parse { message: e.to_string() })?;

    let mut config = Self::new();
    for (key, def) in defs {
      let entry = ChartEntry::from_def(&key, def)?;
      config.entries.insert(key, entry);
    }
    Ok(config)
  }

  /// Overlay `other` on top of this config, replacing entries with the same key
  pub fn merge(mut self, other: ChartConfig) -> Self {
    self.entries.extend(other.entries);
    self
  }
}

pub type Datum = Map<String, Value>;

/// One series value at a hover point or one legend item
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PayloadItem {
  pub data_key: Option<String>,
  pub name: Option<String>,
  /// Item identifier, used when neither data key nor name is set
  pub id: Option<String>,
  pub value: Value,
  pub color: Option<String>,
  /// Extra item-level fields
  pub fields: Datum,
  /// Raw row the item was drawn from, shared with the chart data
  pub payload: Option<Arc<Datum>>,
}

impl PayloadItem {
  /// Item field by name, if it holds a string
  pub fn string_field(&self, key: &str) -> Option<&str> {
    match key {
      "dataKey" => self.data_key.as_deref(),
      "name" => self.name.as_deref(),
      "key" => self.id.as_deref(),
      "color" => self.color.as_deref(),
      "value" => self.value.as_str(),
      _ => self.fields.get(key).and_then(Value::as_str),
    }
  }

  /// Raw row, only consulted for items bound to a data key
  fn raw_payload(&self) -> Option<&Datum> {
    self.data_key.as_ref().and(self.payload.as_deref())
  }
}

/// Series key `item` maps to when looked up under `key`
///
/// A string field named `key` on the item wins, then one on its raw row,
/// otherwise `key` itself.
pub fn effective_key<'a>(item: &'a PayloadItem, key: &'a str) -> &'a str {
  item
    .string_field(key)
    .or_else(|| item.raw_payload().and_then(|raw| raw.get(key)).and_then(Value::as_str))
    .unwrap_or(key)
}

/// Find the config entry for `key`, honoring per-datum series overrides
pub fn resolve<'a>(config: &'a ChartConfig, item: &PayloadItem, key: &str) -> Option<&'a ChartEntry> {
  config.get(effective_key(item, key)).or_else(|| config.get(key))
}

/// Apply the entry's formatter, or pass the raw value through
pub fn format_value(entry: Option<&ChartEntry>, value: &Value) -> String {
  match entry.and_then(|e| e.formatter.as_ref()) {
    Some(formatter) => formatter(value),
    None => display_value(value),
  }
}

fn display_value(value: &Value) -> String {
  match value {
    Value::Null => String::new(),
    Value::String(s) => s.clone(),
    other => other.to_string(),
  }
}

fn is_truthy(value: &Value) -> bool {
  match value {
    Value::Null => false,
    Value::Bool(b) => *b,
    Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
    Value::String(s) => !s.is_empty(),
    _ => true,
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Indicator {
  #[default]
  Dot,
  Line,
  Dashed,
  None,
}

#[derive(Debug, Clone, Default)]
pub struct TooltipOptions {
  pub active: bool,
  pub hide_label: bool,
  pub hide_indicator: bool,
  pub indicator: Indicator,
  pub label_key: Option<String>,
  pub name_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TooltipLabel {
  pub text: String,
  pub value: String,
  pub color: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TooltipRow {
  pub label: String,
  /// Secondary line taken from the raw row under `label_key`
  pub detail: Option<String>,
  pub value: String,
  pub indicator: Option<(Indicator, Option<String>)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tooltip {
  pub label: Option<TooltipLabel>,
  pub rows: Vec<TooltipRow>,
}

/// Tooltip content for a hover point, or `None` when there is nothing to show
pub fn build_tooltip(
  config: &ChartConfig,
  items: &[PayloadItem],
  options: &TooltipOptions,
) -> Option<Tooltip> {
  if !options.active || items.is_empty() {
    return None;
  }

  let rows = items
    .iter()
    .filter_map(|item| {
      let key = options
        .name_key
        .as_deref()
        .or(item.name.as_deref())
        .or(item.data_key.as_deref())
        .unwrap_or("value");
      let entry = resolve(config, item, key)?;

      let detail = options
        .label_key
        .as_deref()
        .and_then(|label_key| item.payload.as_deref()?.get(label_key))
        .filter(|v| is_truthy(v))
        .map(display_value);

      let indicator = (!options.hide_indicator && options.indicator != Indicator::None)
        .then(|| (options.indicator, item.color.clone()));

      Some(TooltipRow {
        label: entry.label.clone().or_else(|| item.name.clone()).unwrap_or_default(),
        detail,
        value: format_value(Some(entry), &item.value),
        indicator,
      })
    })
    .collect();

  Some(Tooltip { label: tooltip_label(config, items, options), rows })
}

fn tooltip_label(
  config: &ChartConfig,
  items: &[PayloadItem],
  options: &TooltipOptions,
) -> Option<TooltipLabel> {
  if options.hide_label {
    return None;
  }
  let item = items.first()?;
  let key = options
    .label_key
    .as_deref()
    .or(item.data_key.as_deref())
    .or(item.name.as_deref())
    .or(item.id.as_deref())?;
  let entry = resolve(config, item, key)?;

  Some(TooltipLabel {
    text: entry.label.clone().or_else(|| item.name.clone()).unwrap_or_default(),
    value: format_value(Some(entry), &item.value),
    color: item.color.clone(),
  })
}

#[derive(Debug, Clone, Default)]
pub struct LegendOptions {
  pub hide_icon: bool,
  pub name_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LegendMarker {
  Icon(String),
  Swatch(Option<String>),
  Hidden,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LegendEntry {
  pub label: Option<String>,
  pub marker: LegendMarker,
}

/// Legend entries for the configured series; unconfigured ones are dropped
pub fn build_legend(
  config: &ChartConfig,
  items: &[PayloadItem],
  options: &LegendOptions,
) -> Vec<LegendEntry> {
  items
    .iter()
    .filter_map(|item| {
      let key =
        options.name_key.as_deref().or(item.data_key.as_deref()).unwrap_or("value");
      let entry = resolve(config, item, key)?;

      let marker = match (&entry.icon, options.hide_icon) {
        (_, true) => LegendMarker::Hidden,
        (Some(icon), false) => LegendMarker::Icon(icon.clone()),
        (None, false) => LegendMarker::Swatch(item.color.clone()),
      };

      Some(LegendEntry { label: entry.label.clone(), marker })
    })
    .collect()
}

/// Series colors precomputed per theme
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThemePalette {
  colors: BTreeMap<Theme, BTreeMap<String, String>>,
}

impl ThemePalette {
  pub fn build(config: &ChartConfig) -> Option<Self> {
    if config.is_empty() {
      return None;
    }

    let colors = Theme::ALL
      .into_iter()
      .map(|theme| {
        let series = config
          .iter()
          .filter_map(|(key, entry)| {
            entry.color.for_theme(theme).map(|c| (key.to_string(), c.to_string()))
          })
          .collect();
        (theme, series)
      })
      .collect();

    Some(Self { colors })
  }

  pub fn color(&self, theme: Theme, series: &str) -> Option<&str> {
    self.colors.get(&theme)?.get(series).map(String::as_str)
  }
}

pub fn sentiment_chart_config() -> ChartConfig {
  Sentiment::ALL.into_iter().fold(ChartConfig::new(), |config, sentiment| {
    config.series(
      sentiment.as_str(),
      ChartEntry::with_color(sentiment.color())
        .label(sentiment.label())
        .icon(sentiment.icon())
        .formatter(ValueFormat::Count.formatter()),
    )
  })
}

pub fn rating_chart_config() -> ChartConfig {
  ChartConfig::new().series(
    "count",
    ChartEntry::with_color(RATING_BAR_COLOR).label("Reviews").formatter(ValueFormat::Count.formatter()),
  )
}

/// One slice per sentiment, keyed for lookup through the `sentiment` field
pub fn sentiment_chart_data(summary: &AnalyticsSummary) -> Vec<PayloadItem> {
  summary
    .sentiment_distribution
    .iter()
    .map(|(sentiment, count)| {
      let mut datum = Datum::new();
      datum.insert("name".into(), Value::from(sentiment.label()));
      datum.insert("value".into(), Value::from(count));
      datum.insert("sentiment".into(), Value::from(sentiment.as_str()));

      let mut fields = Datum::new();
      fields.insert("sentiment".into(), Value::from(sentiment.as_str()));

      PayloadItem {
        data_key: Some("value".into()),
        name: Some(sentiment.label().into()),
        id: None,
        value: Value::from(count),
        color: Some(sentiment.color().into()),
        fields,
        payload: Some(Arc::new(datum)),
      }
    })
    .collect()
}

/// One bar per star value present in the summary, lowest first
pub fn rating_chart_data(summary: &AnalyticsSummary) -> Vec<PayloadItem> {
  summary
    .rating_distribution
    .iter()
    .map(|(stars, count)| {
      let label = format!("{stars} ★");
      let mut datum = Datum::new();
      datum.insert("rating".into(), Value::from(label.clone()));
      datum.insert("count".into(), Value::from(*count));

      PayloadItem {
        data_key: Some("count".into()),
        name: Some(label),
        id: None,
        value: Value::from(*count),
        color: Some(RATING_BAR_COLOR.into()),
        fields: Datum::new(),
        payload: Some(Arc::new(datum)),
      }
    })
    .collect()
}
