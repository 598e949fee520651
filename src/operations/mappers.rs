//! Ready-made record-wise operations.
//!
//! Every mapper reads the columns it is configured with and copies the rest of
//! the record through unchanged, except [`Project`], which keeps only the listed
//! columns.

use crate::operations::{FlatMapper, Mapper};
use crate::record::Record;
use crate::value::Value;
use anyhow::{Context, Result, anyhow, bail};
use chrono::{Datelike, NaiveDateTime, Timelike};
use regex::Regex;

/// Passes records through unchanged.
#[derive(Clone, Copy, Debug, Default)]
pub struct Identity;

impl Mapper for Identity {
    fn map(&self, record: Record) -> Result<Record> {
        Ok(record)
    }
}

/// Lowercases a string column.
#[derive(Clone, Debug)]
pub struct LowerCase {
    column: String,
}

impl LowerCase {
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
        }
    }
}

impl Mapper for LowerCase {
    fn map(&self, mut record: Record) -> Result<Record> {
        let lowered = record.str_field(&self.column)?.to_lowercase();
        record.insert(self.column.as_str(), lowered);
        Ok(record)
    }
}

/// Removes ASCII punctuation characters from a string column.
#[derive(Clone, Debug)]
pub struct FilterPunctuation {
    column: String,
}

impl FilterPunctuation {
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
        }
    }
}

impl Mapper for FilterPunctuation {
    fn map(&self, mut record: Record) -> Result<Record> {
        let kept: String = record
            .str_field(&self.column)?
            .chars()
            .filter(|c| !c.is_ascii_punctuation())
            .collect();
        record.insert(self.column.as_str(), kept);
        Ok(record)
    }
}

/// Keeps only the listed columns, in the listed order.
#[derive(Clone, Debug)]
pub struct Project {
    columns: Vec<String>,
}

impl Project {
    pub fn new<S: AsRef<str>>(columns: &[S]) -> Self {
        Self {
            columns: columns.iter().map(|c| c.as_ref().to_string()).collect(),
        }
    }
}

impl Mapper for Project {
    fn map(&self, record: Record) -> Result<Record> {
        record.project(&self.columns)
    }
}

/// Multiplies numeric columns into a result column.
///
/// The product stays an integer while every factor is an integer.
#[derive(Clone, Debug)]
pub struct Product {
    columns: Vec<String>,
    result: String,
}

impl Product {
    pub fn new<S: AsRef<str>>(columns: &[S], result: impl Into<String>) -> Self {
        Self {
            columns: columns.iter().map(|c| c.as_ref().to_string()).collect(),
            result: result.into(),
        }
    }
}

impl Mapper for Product {
    fn map(&self, mut record: Record) -> Result<Record> {
        let mut product = Value::Int(1);
        for column in &self.columns {
            let factor = record.require(column)?;
            product = match (&product, factor) {
                (Value::Int(a), Value::Int(b)) => Value::Int(
                    a.checked_mul(*b)
                        .ok_or_else(|| anyhow!("integer overflow multiplying `{column}`"))?,
                ),
                (acc, factor) => {
                    let (Some(a), Some(b)) = (acc.as_f64(), factor.as_f64()) else {
                        bail!("field `{column}`: expected number, got {}", factor.type_name());
                    };
                    Value::Float(a * b)
                }
            };
        }
        record.insert(self.result.as_str(), product);
        Ok(record)
    }
}

/// TF-IDF score: `tf * ln(total_docs / docs_with_word)`.
#[derive(Clone, Debug)]
pub struct TfIdf {
    tf: String,
    total_docs: String,
    docs_with_word: String,
    result: String,
}

impl TfIdf {
    pub fn new(
        tf: impl Into<String>,
        total_docs: impl Into<String>,
        docs_with_word: impl Into<String>,
        result: impl Into<String>,
    ) -> Self {
        Self {
            tf: tf.into(),
            total_docs: total_docs.into(),
            docs_with_word: docs_with_word.into(),
            result: result.into(),
        }
    }
}

impl Mapper for TfIdf {
    fn map(&self, mut record: Record) -> Result<Record> {
        let tf = record.f64_field(&self.tf)?;
        let total = record.f64_field(&self.total_docs)?;
        let with_word = record.f64_field(&self.docs_with_word)?;
        if with_word <= 0.0 {
            bail!("field `{}` must be positive, got {with_word}", self.docs_with_word);
        }
        record.insert(self.result.as_str(), tf * (total / with_word).ln());
        Ok(record)
    }
}

/// Pointwise mutual information: `ln(freq_in_doc / freq_in_corpus)`.
#[derive(Clone, Debug)]
pub struct Pmi {
    freq_in_doc: String,
    freq_in_corpus: String,
    result: String,
}

impl Pmi {
    pub fn new(
        freq_in_doc: impl Into<String>,
        freq_in_corpus: impl Into<String>,
        result: impl Into<String>,
    ) -> Self {
        Self {
            freq_in_doc: freq_in_doc.into(),
            freq_in_corpus: freq_in_corpus.into(),
            result: result.into(),
        }
    }
}

impl Mapper for Pmi {
    fn map(&self, mut record: Record) -> Result<Record> {
        let in_doc = record.f64_field(&self.freq_in_doc)?;
        let in_corpus = record.f64_field(&self.freq_in_corpus)?;
        if in_corpus <= 0.0 {
            bail!("field `{}` must be positive, got {in_corpus}", self.freq_in_corpus);
        }
        record.insert(self.result.as_str(), (in_doc / in_corpus).ln());
        Ok(record)
    }
}

/// Great-circle distance in metres between two `[lon, lat]` points.
#[derive(Clone, Debug)]
pub struct HaversineDistance {
    start: String,
    end: String,
    result: String,
    radius_km: f64,
}

impl HaversineDistance {
    pub const EARTH_RADIUS_KM: f64 = 6373.0;

    pub fn new(
        start: impl Into<String>,
        end: impl Into<String>,
        result: impl Into<String>,
    ) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
            result: result.into(),
            radius_km: Self::EARTH_RADIUS_KM,
        }
    }

    #[must_use]
    pub const fn with_radius_km(mut self, radius_km: f64) -> Self {
        self.radius_km = radius_km;
        self
    }
}

impl Mapper for HaversineDistance {
    fn map(&self, mut record: Record) -> Result<Record> {
        let (lon1, lat1) = record.point_field(&self.start)?;
        let (lon2, lat2) = record.point_field(&self.end)?;
        let (lat1, lat2) = (lat1.to_radians(), lat2.to_radians());
        let dlat = lat2 - lat1;
        let dlon = (lon2 - lon1).to_radians();
        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
        record.insert(self.result.as_str(), self.radius_km * c * 1000.0);
        Ok(record)
    }
}

const WEEKDAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

/// Timestamp layout accepted by [`TravelTime`], e.g. `20171020T112238.723000`.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%S%.f";

fn parse_timestamp(record: &Record, column: &str) -> Result<NaiveDateTime> {
    let text = record.str_field(column)?;
    NaiveDateTime::parse_from_str(text, TIMESTAMP_FORMAT)
        .with_context(|| format!("field `{column}`: bad timestamp {text:?}"))
}

/// Derives the start weekday, start hour and duration in seconds of an
/// interval given by two timestamps.
#[derive(Clone, Debug)]
pub struct TravelTime {
    start: String,
    end: String,
    weekday: String,
    hour: String,
    seconds: String,
}

impl TravelTime {
    pub fn new(
        start: impl Into<String>,
        end: impl Into<String>,
        weekday: impl Into<String>,
        hour: impl Into<String>,
        seconds: impl Into<String>,
    ) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
            weekday: weekday.into(),
            hour: hour.into(),
            seconds: seconds.into(),
        }
    }
}

impl Mapper for TravelTime {
    fn map(&self, mut record: Record) -> Result<Record> {
        let start = parse_timestamp(&record, &self.start)?;
        let end = parse_timestamp(&record, &self.end)?;
        let micros = (end - start)
            .num_microseconds()
            .ok_or_else(|| {
                anyhow!("interval between `{}` and `{}` overflows", self.start, self.end)
            })?;
        #[allow(clippy::cast_precision_loss)]
        let seconds = micros as f64 / 1_000_000.0;
        record.insert(
            self.weekday.as_str(),
            WEEKDAYS[start.weekday().num_days_from_monday() as usize],
        );
        record.insert(self.hour.as_str(), start.hour());
        record.insert(self.seconds.as_str(), seconds);
        Ok(record)
    }
}

/// Speed in km/h from a distance in metres and a duration in seconds.
#[derive(Clone, Debug)]
pub struct Speed {
    distance: String,
    seconds: String,
    result: String,
}

impl Speed {
    pub fn new(
        distance: impl Into<String>,
        seconds: impl Into<String>,
        result: impl Into<String>,
    ) -> Self {
        Self {
            distance: distance.into(),
            seconds: seconds.into(),
            result: result.into(),
        }
    }
}

impl Mapper for Speed {
    fn map(&self, mut record: Record) -> Result<Record> {
        let metres = record.f64_field(&self.distance)?;
        let seconds = record.f64_field(&self.seconds)?;
        if seconds == 0.0 {
            bail!("field `{}` is zero; speed is undefined", self.seconds);
        }
        record.insert(self.result.as_str(), metres * 3.6 / seconds);
        Ok(record)
    }
}

#[derive(Clone, Debug)]
enum Separator {
    Whitespace,
    Literal(String),
    Pattern(Regex),
}

/// Splits a string column into one record per piece.
///
/// By default the column is split on runs of whitespace and empty pieces are
/// dropped. With a literal separator or a regex every piece is kept, including
/// empty ones at the edges or between adjacent separators.
///
/// The default therefore differs from splitting on the regex `\s+`: `"a "`
/// yields only `"a"` here, where the regex gives `"a"` and `""`. Use
/// [`Split::on_pattern`] to reproduce the regex behaviour.
///
/// ```
/// use compgraph::operations::FlatMapper;
/// use compgraph::operations::mappers::Split;
/// use compgraph::record;
/// use regex::Regex;
///
/// let words = Split::new("text").flat_map(record! { "text" => "a " })?;
/// assert_eq!(words, vec![record! { "text" => "a" }]);
///
/// let pieces = Split::on_pattern("text", Regex::new(r"\s+")?)
///     .flat_map(record! { "text" => "a " })?;
/// assert_eq!(pieces, vec![record! { "text" => "a" }, record! { "text" => "" }]);
/// # Ok::<(), anyhow::Error>(())
/// ```
#[derive(Clone, Debug)]
pub struct Split {
    column: String,
    separator: Separator,
}

impl Split {
    /// Split on whitespace runs, dropping empty pieces.
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            separator: Separator::Whitespace,
        }
    }

    pub fn on(column: impl Into<String>, separator: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            separator: Separator::Literal(separator.into()),
        }
    }

    pub fn on_pattern(column: impl Into<String>, pattern: Regex) -> Self {
        Self {
            column: column.into(),
            separator: Separator::Pattern(pattern),
        }
    }
}

impl FlatMapper for Split {
    fn flat_map(&self, record: Record) -> Result<Vec<Record>> {
        let text = record.str_field(&self.column)?;
        let pieces: Vec<&str> = match &self.separator {
            Separator::Whitespace => text.split_whitespace().collect(),
            Separator::Literal(sep) => text.split(sep.as_str()).collect(),
            Separator::Pattern(re) => re.split(text).collect(),
        };
        Ok(pieces
            .into_iter()
            .map(|piece| record.clone().with(self.column.as_str(), piece))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record;

    #[test]
    fn whitespace_split_drops_edges_that_a_regex_keeps() {
        let r = record! { "text" => "a " };
        let words = Split::new("text").flat_map(r.clone()).unwrap();
        assert_eq!(words, vec![record! { "text" => "a" }]);

        let pieces = Split::on_pattern("text", Regex::new(r"\s+").unwrap())
            .flat_map(r)
            .unwrap();
        assert_eq!(pieces, vec![record! { "text" => "a" }, record! { "text" => "" }]);
    }

    #[test]
    fn split_defaults_to_whitespace_runs() {
        let r = record! { "doc" => 1, "text" => "  hello \t world\n" };
        let out = Split::new("text").flat_map(r).unwrap();
        let words: Vec<&str> = out.iter().map(|r| r.str_field("text").unwrap()).collect();
        assert_eq!(words, vec!["hello", "world"]);
        assert_eq!(out[0].i64_field("doc").unwrap(), 1);
    }

    #[test]
    fn split_on_literal_keeps_empty_pieces() {
        let r = record! { "text" => "a,,b," };
        let out = Split::on("text", ",").flat_map(r).unwrap();
        let words: Vec<&str> = out.iter().map(|r| r.str_field("text").unwrap()).collect();
        assert_eq!(words, vec!["a", "", "b", ""]);
    }

    #[test]
    fn punctuation_and_case() {
        let r = record! { "text" => "Hello, World!" };
        let r = LowerCase::new("text").map(r).unwrap();
        let r = FilterPunctuation::new("text").map(r).unwrap();
        assert_eq!(r.str_field("text").unwrap(), "hello world");
    }

    #[test]
    fn product_stays_integer_for_integer_factors() {
        let r = record! { "a" => 3, "b" => 4 };
        let out = Product::new(&["a", "b"], "p").map(r).unwrap();
        assert_eq!(out.get("p"), Some(&Value::Int(12)));
        let r = record! { "a" => 3, "b" => 0.5 };
        let out = Product::new(&["a", "b"], "p").map(r).unwrap();
        assert_eq!(out.get("p"), Some(&Value::Float(1.5)));
    }

    #[test]
    fn travel_time_reads_weekday_hour_and_duration() {
        let r = record! {
            "enter_time" => "20171020T112238.723000",
            "leave_time" => "20171020T112240.019000",
        };
        let out = TravelTime::new("enter_time", "leave_time", "weekday", "hour", "secs")
            .map(r)
            .unwrap();
        assert_eq!(out.str_field("weekday").unwrap(), "Fri");
        assert_eq!(out.i64_field("hour").unwrap(), 11);
        assert!((out.f64_field("secs").unwrap() - 1.296).abs() < 1e-9);
    }

    #[test]
    fn speed_rejects_zero_duration() {
        let r = record! { "d" => 100.0, "t" => 0.0 };
        assert!(Speed::new("d", "t", "v").map(r).is_err());
    }

    #[test]
    fn haversine_of_identical_points_is_zero() {
        let p = vec![37.84870228730142, 55.73853974696249];
        let r = record! { "a" => p.clone(), "b" => p };
        let out = HaversineDistance::new("a", "b", "m").map(r).unwrap();
        assert!(out.f64_field("m").unwrap().abs() < 1e-9);
    }
}
