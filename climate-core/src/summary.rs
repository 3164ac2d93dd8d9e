//! Reduction of a daily series to monthly averages.

use crate::{
    EnrichError, Result,
    model::{DailySeries, DailyVariable, RenderedSummary, WeatherSummary},
    month::MonthRange,
};

/// Average the series into a [`WeatherSummary`].
///
/// Daily mean temperature is `(max + min) / 2`. Days with a missing value are
/// left out of the statistic they affect; a statistic with no days left is an
/// [`EnrichError::EmptySeries`].
pub fn summarize(series: &DailySeries, range: &MonthRange) -> Result<WeatherSummary> {
    let temp_max = series.require(DailyVariable::TempMax)?;
    let temp_min = series.require(DailyVariable::TempMin)?;
    let rain = series.require(DailyVariable::RainSum)?;
    let wind = series.require(DailyVariable::WindMax)?;

    let daily_mean = temp_max.iter().zip(temp_min).map(|pair| match pair {
        (Some(max), Some(min)) => Some((max + min) / 2.0),
        _ => None,
    });

    let empty = |variable: &'static str| EnrichError::EmptySeries {
        variable,
        start_date: range.start_date.to_string(),
        end_date: range.end_date.to_string(),
    };

    let avg_temp = mean(daily_mean).ok_or_else(|| empty("temperature"))?;
    let avg_rain = mean(rain.iter().copied()).ok_or_else(|| empty(DailyVariable::RainSum.label()))?;
    let avg_wind = mean(wind.iter().copied()).ok_or_else(|| empty(DailyVariable::WindMax.label()))?;

    Ok(WeatherSummary {
        avg_temp: round_to_hundredths(avg_temp),
        avg_rain: round_to_hundredths(avg_rain),
        avg_wind: round_to_hundredths(avg_wind),
    })
}

/// Mean of the present, finite values.
fn mean(values: impl Iterator<Item = Option<f64>>) -> Option<f64> {
    let (sum, count) = values
        .flatten()
        .filter(|v| v.is_finite())
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f64)
}

/// Round to two decimals, ties to even on the exact binary value.
///
/// This is the rounding `{:.2}` formatting performs, so rendering the result
/// again never changes the digits.
pub fn round_to_hundredths(value: f64) -> f64 {
    format_hundredths(value).parse().unwrap_or(value)
}

pub fn format_hundredths(value: f64) -> String {
    format!("{value:.2}")
}

impl WeatherSummary {
    pub fn render(&self) -> RenderedSummary {
        RenderedSummary {
            avg_temp: format_hundredths(self.avg_temp),
            avg_rain: format_hundredths(self.avg_rain),
            avg_wind: format_hundredths(self.avg_wind),
        }
    }
}
