//! Translation of raw request parameters into backend independent queries.
//!
//! Store adapters consume the types in here and turn them into their own
//! query language: `Bucket` into a `time_bucket` interval, `SearchDescriptor`
//! into an Elasticsearch query body, `GeoBox` into range filters.

use crate::error::QueryError;
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, TimeZone, Timelike, Utc};
use serde_json::{json, Map, Value};
use std::fmt;
use std::str::FromStr;

/// Width of a time-series aggregation window, always one unit wide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    Year,
    Month,
    Week,
    Day,
    Hour,
}

impl Bucket {
    pub fn name(&self) -> &'static str {
        match self {
            Bucket::Year => "year",
            Bucket::Month => "month",
            Bucket::Week => "week",
            Bucket::Day => "day",
            Bucket::Hour => "hour",
        }
    }

    /// Interval literal understood by `time_bucket`
    pub fn interval(&self) -> String {
        format!("1 {}", self.name())
    }

    /// Start of the window containing `ts`.
    ///
    /// Weeks start on monday, which matches the timescale bucket origin.
    pub fn align(&self, ts: DateTime<Utc>) -> DateTime<Utc> {
        let date = ts.date_naive();
        let start = match self {
            Bucket::Year => NaiveDate::from_ymd_opt(date.year(), 1, 1)
                .and_then(|d| d.and_hms_opt(0, 0, 0)),
            Bucket::Month => NaiveDate::from_ymd_opt(date.year(), date.month(), 1)
                .and_then(|d| d.and_hms_opt(0, 0, 0)),
            Bucket::Week => {
                let offset = date.weekday().num_days_from_monday() as i64;
                date.checked_sub_signed(Duration::days(offset))
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
            }
            Bucket::Day => date.and_hms_opt(0, 0, 0),
            Bucket::Hour => date.and_hms_opt(ts.hour(), 0, 0),
        };
        start
            .map(|naive| Utc.from_utc_datetime(&naive))
            .unwrap_or(ts)
    }
}

impl FromStr for Bucket {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "year" => Ok(Bucket::Year),
            "month" => Ok(Bucket::Month),
            "week" => Ok(Bucket::Week),
            "day" => Ok(Bucket::Day),
            "hour" => Ok(Bucket::Hour),
            other => Err(QueryError::InvalidBucket(other.to_owned())),
        }
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which read path a "get sensor data" request takes.
#[derive(Debug, Clone, PartialEq)]
pub enum DataQuery {
    /// Latest cached reading only
    Latest,
    Bucketed {
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        bucket: Bucket,
    },
}

impl DataQuery {
    /// The bucketed path is only taken when all three parameters are present,
    /// any missing one falls back to the cache.
    pub fn from_params(
        from: Option<&str>,
        to: Option<&str>,
        bucket: Option<&str>,
    ) -> Result<Self, QueryError> {
        match (from, to, bucket) {
            (Some(from), Some(to), Some(bucket)) => Ok(DataQuery::Bucketed {
                bucket: bucket.parse()?,
                from: parse_timestamp(from)?,
                to: parse_timestamp(to)?,
            }),
            _ => Ok(DataQuery::Latest),
        }
    }
}

/// Accepts RFC 3339, a naive datetime (taken as UTC) or a plain date.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, QueryError> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
        .ok_or_else(|| QueryError::InvalidDate(raw.to_owned()))
}

/// Search operator sent to the search index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchKind {
    Match,
    Fuzzy,
    Prefix,
    /// Anything else is handed to the index verbatim
    Other(String),
}

impl SearchKind {
    pub fn from_search_type(search_type: &str) -> Self {
        match search_type {
            "similar" | "fuzzy" => SearchKind::Fuzzy,
            "match" => SearchKind::Match,
            "prefix" => SearchKind::Prefix,
            other => SearchKind::Other(other.to_owned()),
        }
    }

    pub fn operator(&self) -> &str {
        match self {
            SearchKind::Match => "match",
            SearchKind::Fuzzy => "fuzzy",
            SearchKind::Prefix => "prefix",
            SearchKind::Other(op) => op,
        }
    }
}

/// A parsed `/sensors/search` request.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchDescriptor {
    pub kind: SearchKind,
    pub clause: Map<String, Value>,
}

impl SearchDescriptor {
    /// `query` has to be a JSON object such as `{"name": "Veloci"}`
    pub fn parse(query: &str, search_type: &str) -> Result<Self, QueryError> {
        let value: Value = serde_json::from_str(query)
            .map_err(|e| QueryError::InvalidSearchQuery(format!("{}: {}", query, e)))?;
        match value {
            Value::Object(clause) if !clause.is_empty() => Ok(SearchDescriptor {
                kind: SearchKind::from_search_type(search_type),
                clause,
            }),
            _ => Err(QueryError::InvalidSearchQuery(query.to_owned())),
        }
    }

    /// Elasticsearch request body
    /// Elasticsearch request body for one page of hits
    pub fn to_query_body(&self, from: usize, size: usize) -> Value {
        let mut query = Map::new();
        query.insert(
            self.kind.operator().to_owned(),
            Value::Object(self.clause.clone()),
        );
        json!({
            "from": from,
            "size": size,
            "query": Value::Object(query),
        })
    }

    /// Field/value pairs of the clause.
    ///
    /// Both the short form `{"name": "x"}` and the long form
    /// `{"name": {"value": "x"}}` (or `"query"` for match) are understood.
    pub fn terms(&self) -> Vec<(&str, String)> {
        self.clause
            .iter()
            .filter_map(|(field, value)| {
                let term = match value {
                    Value::Object(inner) => inner.get("value").or_else(|| inner.get("query")),
                    other => Some(other),
                }?;
                let term = match term {
                    Value::String(s) => s.clone(),
                    Value::Null => return None,
                    other => other.to_string(),
                };
                Some((field.as_str(), term))
            })
            .collect()
    }
}

/// Rectangular approximation of a search radius, in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoBox {
    pub min_latitude: f64,
    pub max_latitude: f64,
    pub min_longitude: f64,
    pub max_longitude: f64,
}

impl GeoBox {
    pub fn around(latitude: f64, longitude: f64, radius: f64) -> Self {
        GeoBox {
            min_latitude: latitude - radius,
            max_latitude: latitude + radius,
            min_longitude: longitude - radius,
            max_longitude: longitude + radius,
        }
    }

    pub fn contains(&self, latitude: f64, longitude: f64) -> bool {
        latitude >= self.min_latitude
            && latitude <= self.max_latitude
            && longitude >= self.min_longitude
            && longitude <= self.max_longitude
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn ts(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[test]
    fn test_bucket_names() {
        for name in ["year", "month", "week", "day", "hour"] {
            let bucket: Bucket = name.parse().unwrap();
            assert_eq!(bucket.name(), name);
            assert_eq!(bucket.interval(), format!("1 {}", name));
        }
    }

    #[test]
    fn test_invalid_bucket() {
        let res = "minute".parse::<Bucket>();
        assert_eq!(res, Err(QueryError::InvalidBucket("minute".to_owned())));
        assert!("Day".parse::<Bucket>().is_err());
    }

    #[test]
    fn test_bucket_align() {
        // 2020-01-08 is a wednesday
        let t = Utc.with_ymd_and_hms(2020, 1, 8, 13, 45, 12).unwrap();

        assert_eq!(Bucket::Hour.align(t), ts(2020, 1, 8, 13));
        assert_eq!(Bucket::Day.align(t), ts(2020, 1, 8, 0));
        assert_eq!(Bucket::Week.align(t), ts(2020, 1, 6, 0));
        assert_eq!(Bucket::Month.align(t), ts(2020, 1, 1, 0));
        assert_eq!(Bucket::Year.align(t), ts(2020, 1, 1, 0));
    }

    #[test]
    fn test_data_query_routing() {
        assert_eq!(
            DataQuery::from_params(None, None, None).unwrap(),
            DataQuery::Latest
        );
        assert_eq!(
            DataQuery::from_params(Some("2020-01-01"), None, Some("day")).unwrap(),
            DataQuery::Latest
        );
        assert_eq!(
            DataQuery::from_params(Some("2020-01-01"), Some("2020-01-02"), Some("day")).unwrap(),
            DataQuery::Bucketed {
                from: ts(2020, 1, 1, 0),
                to: ts(2020, 1, 2, 0),
                bucket: Bucket::Day,
            }
        );
    }

    #[test]
    fn test_data_query_invalid_bucket() {
        let res = DataQuery::from_params(Some("2020-01-01"), Some("2020-01-02"), Some("decade"));
        assert!(matches!(res, Err(QueryError::InvalidBucket(_))));
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let expected = ts(2020, 1, 1, 0);
        assert_eq!(parse_timestamp("2020-01-01T00:00:00.000Z").unwrap(), expected);
        assert_eq!(parse_timestamp("2020-01-01T00:00:00").unwrap(), expected);
        assert_eq!(parse_timestamp("2020-01-01 00:00:00").unwrap(), expected);
        assert_eq!(parse_timestamp("2020-01-01").unwrap(), expected);
        assert_eq!(
            parse_timestamp("2020-01-01T02:00:00+02:00").unwrap(),
            expected
        );
        assert!(parse_timestamp("yesterday").is_err());
    }

    #[test]
    fn test_search_kind_mapping() {
        assert_eq!(SearchKind::from_search_type("similar"), SearchKind::Fuzzy);
        assert_eq!(SearchKind::from_search_type("prefix"), SearchKind::Prefix);
        assert_eq!(SearchKind::from_search_type("match"), SearchKind::Match);
        assert_eq!(
            SearchKind::from_search_type("wildcard").operator(),
            "wildcard"
        );
    }

    #[test]
    fn test_search_descriptor_body() {
        let desc = SearchDescriptor::parse(r#"{"name":"Velocidad 1"}"#, "similar").unwrap();
        let body = desc.to_query_body(20, 10);

        assert_eq!(
            body,
            json!({"from": 20, "size": 10, "query": {"fuzzy": {"name": "Velocidad 1"}}})
        );
    }

    #[test]
    fn test_search_descriptor_terms() {
        let desc =
            SearchDescriptor::parse(r#"{"name": {"value": "Veloci"}, "type": "X"}"#, "prefix")
                .unwrap();
        let mut terms = desc.terms();
        terms.sort();

        assert_eq!(
            terms,
            vec![("name", "Veloci".to_owned()), ("type", "X".to_owned())]
        );
    }

    #[test]
    fn test_search_descriptor_rejects_non_objects() {
        assert!(SearchDescriptor::parse("Veloci", "match").is_err());
        assert!(SearchDescriptor::parse("[1, 2]", "match").is_err());
        assert!(SearchDescriptor::parse("{}", "match").is_err());
    }

    #[test]
    fn test_geo_box_is_inclusive() {
        let geo = GeoBox::around(1.0, 1.0, 1.0);

        assert!(geo.contains(1.0, 1.0));
        assert!(geo.contains(2.0, 2.0));
        assert!(geo.contains(0.0, 0.0));
        assert!(!geo.contains(2.5, 1.0));
        // corner of the box, outside a true circle
        assert!(geo.contains(1.9, 1.9));
    }
}
