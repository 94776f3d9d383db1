//! Yearly summary derivation.
//!
//! `summarize` is the reference semantics of the summary table: fire metrics
//! grouped by calendar year, left-joined onto every temperature year from
//! `SUMMARY_MIN_YEAR` on, missing metrics reported as zero. The Postgres
//! warehouse computes the same thing in SQL.

use std::collections::BTreeMap;

use chrono::Datelike;

use crate::records::{AnnualSummary, FireRow, TemperatureRow};

/// First year included in the summary.
pub const SUMMARY_MIN_YEAR: i32 = 2000;

#[derive(Debug, Default, Clone, Copy)]
struct FireStats {
    count: i64,
    intensity_sum: f64,
    intensity_count: i64,
    intensity_max: Option<f64>,
}

impl FireStats {
    fn add(&mut self, intensity: Option<f64>) {
        self.count += 1;
        if let Some(value) = intensity {
            self.intensity_sum += value;
            self.intensity_count += 1;
            self.intensity_max = Some(match self.intensity_max {
                Some(max) if max >= value => max,
                _ => value,
            });
        }
    }

    fn avg(&self) -> f64 {
        if self.intensity_count == 0 {
            0.0
        } else {
            self.intensity_sum / self.intensity_count as f64
        }
    }
}

/// Build summary rows, ordered by year descending.
///
/// Duplicate temperature years keep the last value seen.
pub fn summarize(temperatures: &[TemperatureRow], fires: &[FireRow]) -> Vec<AnnualSummary> {
    let mut stats: BTreeMap<i32, FireStats> = BTreeMap::new();
    for fire in fires {
        stats
            .entry(fire.fire_date.year())
            .or_default()
            .add(fire.intensity_mw);
    }

    let temps: BTreeMap<i32, f64> = temperatures
        .iter()
        .map(|t| (t.year, t.temp_anomaly_celsius))
        .collect();

    temps
        .range(SUMMARY_MIN_YEAR..)
        .rev()
        .map(|(&year, &anomaly)| {
            let fire = stats.get(&year).copied().unwrap_or_default();
            AnnualSummary {
                year,
                temp_anomaly_celsius: Some(anomaly),
                total_fires: fire.count,
                avg_intensity: fire.avg(),
                max_intensity: fire.intensity_max.unwrap_or(0.0),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn fire(date: &str, intensity: Option<f64>) -> FireRow {
        FireRow {
            latitude: Some(-12.5),
            longitude: Some(131.0),
            fire_date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            intensity_mw: intensity,
            confidence: Some("80".to_string()),
            source_file: "bronze/fires/test.csv".to_string(),
        }
    }

    #[test]
    fn test_null_intensities_count_but_do_not_average() {
        let temps = [TemperatureRow {
            year: 2005,
            temp_anomaly_celsius: 0.68,
        }];
        let fires = [
            fire("2005-08-01", Some(10.0)),
            fire("2005-08-01", None),
            fire("2005-08-01", Some(30.0)),
        ];

        let summary = summarize(&temps, &fires);
        assert_eq!(summary.len(), 1);
        assert_eq!(summary[0].total_fires, 3);
        assert_eq!(summary[0].avg_intensity, 20.0);
        assert_eq!(summary[0].max_intensity, 30.0);
    }

    #[test]
    fn test_year_with_only_null_intensities_reports_zero() {
        let temps = [TemperatureRow {
            year: 2010,
            temp_anomaly_celsius: 0.72,
        }];
        let fires = [fire("2010-08-01", None)];

        let summary = summarize(&temps, &fires);
        assert_eq!(summary[0].total_fires, 1);
        assert_eq!(summary[0].avg_intensity, 0.0);
        assert_eq!(summary[0].max_intensity, 0.0);
    }

    #[test]
    fn test_fires_without_temperature_year_are_dropped() {
        let temps = [TemperatureRow {
            year: 2001,
            temp_anomaly_celsius: 0.55,
        }];
        let fires = [fire("2003-08-01", Some(5.0))];

        let summary = summarize(&temps, &fires);
        assert_eq!(summary.len(), 1);
        assert_eq!(summary[0].year, 2001);
        assert_eq!(summary[0].total_fires, 0);
    }
}
