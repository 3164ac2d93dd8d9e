use std::collections::HashMap;

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{EnrichError, Result, month::MonthRange};

/// A daily variable requested from the archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DailyVariable {
    TempMax,
    TempMin,
    RainSum,
    WindMax,
}

impl DailyVariable {
    /// Variables needed for a [`WeatherSummary`](crate::WeatherSummary).
    pub const fn all() -> &'static [DailyVariable] {
        &[
            DailyVariable::TempMax,
            DailyVariable::TempMin,
            DailyVariable::RainSum,
            DailyVariable::WindMax,
        ]
    }

    /// Name used by the archive API, both in the request and the response.
    pub fn api_name(&self) -> &'static str {
        match self {
            DailyVariable::TempMax => "temperature_2m_max",
            DailyVariable::TempMin => "temperature_2m_min",
            DailyVariable::RainSum => "rain_sum",
            DailyVariable::WindMax => "windspeed_10m_max",
        }
    }

    /// Short name used in logs and error messages.
    pub fn label(&self) -> &'static str {
        match self {
            DailyVariable::TempMax => "temp_max",
            DailyVariable::TempMin => "temp_min",
            DailyVariable::RainSum => "rain_sum",
            DailyVariable::WindMax => "wind_max",
        }
    }
}

/// Parameters of one archive query.
#[derive(Debug, Clone, PartialEq)]
pub struct ArchiveRequest {
    pub latitude: f64,
    pub longitude: f64,
    pub range: MonthRange,
    pub variables: Vec<DailyVariable>,
}

impl ArchiveRequest {
    pub fn new(latitude: f64, longitude: f64, range: MonthRange) -> Self {
        Self {
            latitude,
            longitude,
            range,
            variables: DailyVariable::all().to_vec(),
        }
    }

    /// Comma-joined variable list for the `daily` query parameter.
    pub fn daily_param(&self) -> String {
        self.variables
            .iter()
            .map(DailyVariable::api_name)
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Columnar daily series over the half-open interval `[start, end)`.
#[derive(Debug, Clone, PartialEq)]
pub struct DailySeries {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub interval: Duration,
    columns: HashMap<DailyVariable, Vec<Option<f64>>>,
}

impl DailySeries {
    /// Build a series, checking every column has one value per step.
    pub fn new(
        start: NaiveDate,
        end: NaiveDate,
        interval: Duration,
        columns: HashMap<DailyVariable, Vec<Option<f64>>>,
    ) -> Result<Self> {
        if interval <= Duration::zero() {
            return Err(EnrichError::malformed("sampling interval must be positive"));
        }
        if end < start {
            return Err(EnrichError::malformed(format!(
                "series ends ({end}) before it starts ({start})"
            )));
        }

        let series = Self {
            start,
            end,
            interval,
            columns,
        };
        let expected = series.len();
        for (variable, values) in &series.columns {
            if values.len() != expected {
                return Err(EnrichError::malformed(format!(
                    "{} has {} values for {} days",
                    variable.api_name(),
                    values.len(),
                    expected
                )));
            }
        }
        Ok(series)
    }

    /// Number of sampling steps between start and end, end excluded.
    pub fn len(&self) -> usize {
        let span = (self.end - self.start).num_seconds();
        let step = self.interval.num_seconds();
        if step <= 0 {
            return 0;
        }
        usize::try_from((span + step - 1) / step).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        let mut dates = Vec::with_capacity(self.len());
        let mut day = self.start;
        while day < self.end {
            dates.push(day);
            day += self.interval;
        }
        dates
    }

    pub fn column(&self, variable: DailyVariable) -> Option<&[Option<f64>]> {
        self.columns.get(&variable).map(Vec::as_slice)
    }

    /// Like [`column`](Self::column), but a missing variable is an error.
    pub fn require(&self, variable: DailyVariable) -> Result<&[Option<f64>]> {
        self.column(variable).ok_or_else(|| {
            EnrichError::malformed(format!("missing daily variable {}", variable.api_name()))
        })
    }
}

/// Averages for one point, each rounded to two decimals.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeatherSummary {
    pub avg_temp: f64,
    pub avg_rain: f64,
    pub avg_wind: f64,
}

/// String rendering merged into the output point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedSummary {
    pub avg_temp: String,
    pub avg_rain: String,
    pub avg_wind: String,
}

/// One input record. Unknown fields are kept verbatim and in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Point(Map<String, Value>);

impl Point {
    pub fn from_value(index: usize, value: Value) -> Result<Self> {
        let Value::Object(fields) = value else {
            return Err(EnrichError::input(format!(
                "point #{index} is not a JSON object"
            )));
        };
        let point = Self(fields);
        point.validate(index)?;
        Ok(point)
    }

    fn validate(&self, index: usize) -> Result<()> {
        for key in ["lat", "lng"] {
            match self.0.get(key) {
                Some(Value::Number(_)) => {}
                Some(other) => {
                    return Err(EnrichError::input(format!(
                        "point #{index} has non-numeric '{key}': {other}"
                    )));
                }
                None => {
                    return Err(EnrichError::input(format!(
                        "point #{index} is missing '{key}'"
                    )));
                }
            }
        }
        match self.0.get("month") {
            None | Some(Value::String(_)) => Ok(()),
            Some(other) => Err(EnrichError::input(format!(
                "point #{index} has non-string 'month': {other}"
            ))),
        }
    }

    pub fn lat(&self) -> f64 {
        self.0.get("lat").and_then(Value::as_f64).unwrap_or_default()
    }

    pub fn lng(&self) -> f64 {
        self.0.get("lng").and_then(Value::as_f64).unwrap_or_default()
    }

    /// Month name, or the empty string when the point has none.
    pub fn month(&self) -> &str {
        self.0.get("month").and_then(Value::as_str).unwrap_or("")
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Add (or overwrite) the three average fields.
    pub fn attach(&mut self, summary: RenderedSummary) {
        self.0.insert("avg_temp".into(), Value::String(summary.avg_temp));
        self.0.insert("avg_rain".into(), Value::String(summary.avg_rain));
        self.0.insert("avg_wind".into(), Value::String(summary.avg_wind));
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::month::resolve_month;
    use serde_json::json;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").expect("valid date")
    }

    #[test]
    fn daily_param_keeps_request_order() {
        let req = ArchiveRequest::new(51.5, -0.1, resolve_month("march"));
        assert_eq!(
            req.daily_param(),
            "temperature_2m_max,temperature_2m_min,rain_sum,windspeed_10m_max"
        );
    }

    #[test]
    fn series_dates_exclude_end() {
        let mut columns = HashMap::new();
        columns.insert(DailyVariable::RainSum, vec![Some(1.0), None, Some(3.0)]);
        let series = DailySeries::new(
            date("2024-03-01"),
            date("2024-03-04"),
            Duration::days(1),
            columns,
        )
        .expect("valid series");

        assert_eq!(series.len(), 3);
        assert_eq!(
            series.dates(),
            vec![date("2024-03-01"), date("2024-03-02"), date("2024-03-03")]
        );
        assert!(series.column(DailyVariable::WindMax).is_none());
        assert!(series.require(DailyVariable::WindMax).is_err());
    }

    #[test]
    fn series_rejects_column_length_mismatch() {
        let mut columns = HashMap::new();
        columns.insert(DailyVariable::TempMax, vec![Some(1.0)]);
        let err = DailySeries::new(
            date("2024-03-01"),
            date("2024-03-03"),
            Duration::days(1),
            columns,
        )
        .unwrap_err();
        assert!(err.to_string().contains("temperature_2m_max has 1 values for 2 days"));
    }

    #[test]
    fn point_requires_numeric_coordinates() {
        let err = Point::from_value(2, json!({"lat": 51.5, "month": "may"})).unwrap_err();
        assert!(err.to_string().contains("point #2 is missing 'lng'"));

        let err = Point::from_value(0, json!({"lat": "51.5", "lng": 0.1})).unwrap_err();
        assert!(err.to_string().contains("non-numeric 'lat'"));

        let err = Point::from_value(0, json!([51.5, 0.1])).unwrap_err();
        assert!(err.to_string().contains("not a JSON object"));
    }

    #[test]
    fn point_without_month_reads_as_empty() {
        let point = Point::from_value(0, json!({"lat": 1, "lng": 2})).expect("valid point");
        assert_eq!(point.month(), "");
        assert_eq!(point.lat(), 1.0);
        assert_eq!(point.lng(), 2.0);
    }

    #[test]
    fn attach_appends_after_existing_fields() {
        let mut point = Point::from_value(
            0,
            json!({"name": "Zürich", "lat": 47.37, "lng": 8.54, "month": "July"}),
        )
        .expect("valid point");

        point.attach(RenderedSummary {
            avg_temp: "20.10".into(),
            avg_rain: "3.20".into(),
            avg_wind: "11.00".into(),
        });

        let value = point.into_value();
        let keys: Vec<&str> = value
            .as_object()
            .expect("object")
            .keys()
            .map(String::as_str)
            .collect();
        assert_eq!(
            keys,
            ["name", "lat", "lng", "month", "avg_temp", "avg_rain", "avg_wind"]
        );
        assert_eq!(value["name"], "Zürich");
        assert_eq!(value["avg_wind"], "11.00");
    }
}
