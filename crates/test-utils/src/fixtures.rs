//! Upstream payloads and row builders for pipeline tests.
//!
//! The CSV constants are trimmed copies of what the providers actually serve.

use chrono::NaiveDate;
use climate_common::{FireRow, TemperatureRow};

/// GISTEMP v4 global means: one title line, then the header.
///
/// 1880 has a `***` in D-N but a valid J-D. 2024 has no annual mean yet.
pub const GISTEMP_CSV: &str = "\
Land-Ocean: Global Means
Year,Jan,Feb,Mar,Apr,May,Jun,Jul,Aug,Sep,Oct,Nov,Dec,J-D,D-N,DJF,MAM,JJA,SON
1880,-.18,-.24,-.09,-.16,-.10,-.21,-.18,-.10,-.15,-.24,-.22,-.18,-.17,***,***,-.12,-.16,-.20
1999,.48,.65,.33,.35,.27,.36,.40,.33,.38,.40,.41,.44,.40,.43,.60,.31,.36,.40
2000,.26,.51,.51,.52,.35,.33,.36,.40,.38,.28,.30,.25,.39,.40,.45,.46,.36,.32
2001,.42,.42,.58,.51,.57,.52,.60,.53,.52,.51,.69,.55,.53,.51,.36,.55,.55,.57
2002,.75,.77,.90,.57,.62,.54,.62,.55,.64,.56,.59,.44,.63,.64,.69,.70,.57,.60
2024,1.24,1.43,1.39,1.31,1.18,1.23,1.21,1.29,1.24,1.33,1.29,***,***,***,1.35,1.29,1.24,1.29
";

/// FIRMS MODIS standard product rows, three detections across two dates.
pub const FIRMS_MODIS_CSV: &str = "\
latitude,longitude,brightness,scan,track,acq_date,acq_time,satellite,instrument,confidence,version,bright_t31,frp,daynight,type
-12.345,131.052,312.4,1.1,1.0,2004-08-01,0125,Terra,MODIS,72,6.03,298.1,12.3,D,0
38.901,-120.442,330.9,1.4,1.2,2004-08-01,2030,Aqua,MODIS,95,6.03,301.7,48.6,D,0
-3.100,25.774,305.2,1.0,1.0,2004-08-01,1205,Terra,MODIS,40,6.03,296.0,,D,0
";

/// Same product without `confidence` and `frp`, as some archive years ship.
pub const FIRMS_REDUCED_CSV: &str = "\
latitude,longitude,brightness,acq_date,acq_time,satellite
51.200,104.900,320.0,2005-08-01,0340,Terra
60.010,110.300,318.5,2005-08-01,0415,Terra
";

/// A day with no detections: the header and nothing else.
pub const FIRMS_HEADER_ONLY_CSV: &str = "\
latitude,longitude,brightness,scan,track,acq_date,acq_time,satellite,instrument,confidence,version,bright_t31,frp,daynight,type
";

/// What FIRMS returns with a 200 status when the key is wrong.
pub const FIRMS_INVALID_KEY_BODY: &str = "Invalid MAP_KEY.";

/// A FIRMS-shaped file for `date` with one detection per intensity.
pub fn firms_csv(date: &str, intensities: &[f64]) -> String {
    let mut csv = String::from("latitude,longitude,acq_date,confidence,frp\n");
    for (i, frp) in intensities.iter().enumerate() {
        csv.push_str(&format!("{:.3},{:.3},{},{},{}\n", i as f64, -(i as f64), date, 80, frp));
    }
    csv
}

pub fn temperature_row(year: i32, anomaly: f64) -> TemperatureRow {
    TemperatureRow {
        year,
        temp_anomaly_celsius: anomaly,
    }
}

/// Fire row on `date` (`YYYY-MM-DD`) with full coordinates.
pub fn fire_row(date: &str, intensity: Option<f64>, source_file: &str) -> FireRow {
    FireRow {
        latitude: Some(-33.87),
        longitude: Some(151.21),
        fire_date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
        intensity_mw: intensity,
        confidence: Some("80".to_string()),
        source_file: source_file.to_string(),
    }
}
