//! Chart timeframes and the price window each one shows

use chrono::{DateTime, Duration, Utc};
use dash_api::PricePoint;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Period of price history the dashboard displays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Timeframe {
    #[default]
    #[serde(rename = "1D")]
    OneDay,
    #[serde(rename = "1W")]
    OneWeek,
    #[serde(rename = "1M")]
    OneMonth,
    #[serde(rename = "3M")]
    ThreeMonths,
    #[serde(rename = "1Y")]
    OneYear,
    #[serde(rename = "ALL")]
    All,
}

impl Timeframe {
    /// Every timeframe, shortest first
    pub const VALUES: [Timeframe; 6] = [
        Timeframe::OneDay,
        Timeframe::OneWeek,
        Timeframe::OneMonth,
        Timeframe::ThreeMonths,
        Timeframe::OneYear,
        Timeframe::All,
    ];

    /// Short label, as shown on the chart controls
    pub fn label(self) -> &'static str {
        match self {
            Timeframe::OneDay => "1D",
            Timeframe::OneWeek => "1W",
            Timeframe::OneMonth => "1M",
            Timeframe::ThreeMonths => "3M",
            Timeframe::OneYear => "1Y",
            Timeframe::All => "ALL",
        }
    }

    /// Bar interval requested from the historical endpoint
    pub fn interval(self) -> &'static str {
        match self {
            Timeframe::OneDay => "1d",
            Timeframe::OneWeek => "1wk",
            _ => "1mo",
        }
    }

    /// How far back the chart reaches; `None` shows the whole series
    pub fn lookback(self) -> Option<Duration> {
        match self {
            Timeframe::OneDay => Some(Duration::days(1)),
            Timeframe::OneWeek => Some(Duration::days(7)),
            Timeframe::OneMonth => Some(Duration::days(30)),
            Timeframe::ThreeMonths => Some(Duration::days(90)),
            Timeframe::OneYear => Some(Duration::days(365)),
            Timeframe::All => None,
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Timeframe {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::VALUES
            .into_iter()
            .find(|tf| tf.label().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| {
                format!("unknown timeframe '{wanted}' (expected one of 1D, 1W, 1M, 3M, 1Y, ALL)")
            })
    }
}

/// Points to chart for `timeframe`, oldest first
///
/// Points are sorted by date and cut to the timeframe's lookback ending at
/// `now`. When nothing falls inside the window the full sorted series is
/// returned instead, so a chart never goes blank just because the latest
/// data is older than the window.
pub fn chart_window(series: &[PricePoint], timeframe: Timeframe, now: DateTime<Utc>) -> Vec<PricePoint> {
    let mut sorted: Vec<(Option<DateTime<Utc>>, &PricePoint)> =
        series.iter().map(|point| (point.timestamp(), point)).collect();
    sorted.sort_by_key(|(at, _)| *at);

    let Some(lookback) = timeframe.lookback() else {
        return sorted.into_iter().map(|(_, point)| point.clone()).collect();
    };

    let cutoff = now - lookback;
    let window: Vec<PricePoint> = sorted
        .iter()
        .filter(|(at, _)| at.is_some_and(|at| at >= cutoff))
        .map(|(_, point)| (*point).clone())
        .collect();

    if window.is_empty() {
        sorted.into_iter().map(|(_, point)| point.clone()).collect()
    } else {
        window
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn point(date: &str, close: f64) -> PricePoint {
        PricePoint {
            date: date.to_string(),
            open: close,
            high: close,
            low: close,
            close,
            volume: 1_000,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 30, 16, 0, 0).unwrap()
    }

    #[test]
    fn test_interval_mapping() {
        assert_eq!(Timeframe::OneDay.interval(), "1d");
        assert_eq!(Timeframe::OneWeek.interval(), "1wk");
        for tf in [Timeframe::OneMonth, Timeframe::ThreeMonths, Timeframe::OneYear, Timeframe::All] {
            assert_eq!(tf.interval(), "1mo");
        }
    }

    #[test]
    fn test_parse_and_display() {
        assert_eq!("3m".parse::<Timeframe>().unwrap(), Timeframe::ThreeMonths);
        assert_eq!("ALL".parse::<Timeframe>().unwrap(), Timeframe::All);
        assert!("5Y".parse::<Timeframe>().is_err());

        for tf in Timeframe::VALUES {
            assert_eq!(tf.to_string().parse::<Timeframe>().unwrap(), tf);
        }
    }

    #[test]
    fn test_serde_uses_labels() {
        assert_eq!(serde_json::to_string(&Timeframe::OneYear).unwrap(), "\"1Y\"");
        let tf: Timeframe = serde_json::from_str("\"1W\"").unwrap();
        assert_eq!(tf, Timeframe::OneWeek);
    }

    #[test]
    fn test_window_sorts_and_cuts() {
        let series = vec![
            point("2024-06-29", 3.0),
            point("2024-01-02", 1.0),
            point("2024-06-25", 2.0),
        ];

        let week = chart_window(&series, Timeframe::OneWeek, now());
        let closes: Vec<f64> = week.iter().map(|p| p.close).collect();
        assert_eq!(closes, vec![2.0, 3.0]);

        let all = chart_window(&series, Timeframe::All, now());
        let closes: Vec<f64> = all.iter().map(|p| p.close).collect();
        assert_eq!(closes, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_empty_window_falls_back_to_full_series() {
        let series = vec![point("2023-03-01", 5.0), point("2023-02-01", 4.0)];

        let day = chart_window(&series, Timeframe::OneDay, now());
        let closes: Vec<f64> = day.iter().map(|p| p.close).collect();
        assert_eq!(closes, vec![4.0, 5.0]);
    }
}
