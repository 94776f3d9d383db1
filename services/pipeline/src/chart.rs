//! Dual-axis SVG chart of temperature anomaly against fire count.
//!
//! Fire counts are drawn as translucent bars on the right axis, the anomaly
//! as a line with point markers on the left axis. Years run left to right in
//! ascending order regardless of input order.

use std::path::{Path, PathBuf};

use tracing::info;

use climate_common::{AnnualSummary, PipelineResult};
use ingestion::files::write_atomic;
use storage::paths;

pub const CHART_FILE_NAME: &str = "climate_fire_correlation.svg";
pub const TITLE: &str = "Global Warming vs. Wildfire Frequency";

const WIDTH: f64 = 1000.0;
const HEIGHT: f64 = 560.0;
const MARGIN_LEFT: f64 = 80.0;
const MARGIN_RIGHT: f64 = 90.0;
const MARGIN_TOP: f64 = 60.0;
const MARGIN_BOTTOM: f64 = 70.0;
const TICKS: usize = 5;

const TEMPERATURE_COLOR: &str = "#d62728";
const FIRE_COLOR: &str = "#ff7f0e";

pub fn chart_path(storage_root: &Path) -> PathBuf {
    paths::gold_dir(storage_root).join(CHART_FILE_NAME)
}

/// Linear map from a data range onto a pixel range (pixel range may be inverted).
#[derive(Debug, Clone, Copy)]
struct Scale {
    lo: f64,
    hi: f64,
    px_lo: f64,
    px_hi: f64,
}

impl Scale {
    fn map(&self, value: f64) -> f64 {
        let t = (value - self.lo) / (self.hi - self.lo);
        self.px_lo + t * (self.px_hi - self.px_lo)
    }

    fn ticks(&self) -> impl Iterator<Item = f64> + '_ {
        (0..=TICKS).map(move |i| self.lo + (self.hi - self.lo) * i as f64 / TICKS as f64)
    }
}

fn temperature_bounds(rows: &[&AnnualSummary]) -> (f64, f64) {
    let values: Vec<f64> = rows.iter().filter_map(|r| r.temp_anomaly_celsius).collect();
    let lo = values.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !lo.is_finite() || !hi.is_finite() {
        return (-1.0, 1.0);
    }
    let pad = ((hi - lo) * 0.1).max(0.1);
    (lo - pad, hi + pad)
}

/// Smallest 1/2/5 x 10^n step giving at most `TICKS` intervals up to `max`.
fn count_ceiling(max: i64) -> f64 {
    let max = max.max(1) as f64;
    let magnitude = 10f64.powf((max / TICKS as f64).log10().floor());
    let step = [1.0, 2.0, 5.0, 10.0]
        .into_iter()
        .map(|m| m * magnitude)
        .find(|step| step * TICKS as f64 >= max)
        .unwrap_or(10.0 * magnitude);
    (step * TICKS as f64).max(TICKS as f64)
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn format_count(value: f64) -> String {
    format!("{}", value.round() as i64)
}

/// Render the chart as a standalone SVG document.
pub fn render_svg(summary: &[AnnualSummary]) -> String {
    let mut rows: Vec<&AnnualSummary> = summary.iter().collect();
    rows.sort_by_key(|r| r.year);

    let title = match (rows.first(), rows.last()) {
        (Some(first), Some(last)) => format!("{} ({}-{})", TITLE, first.year, last.year),
        _ => TITLE.to_string(),
    };

    let mut svg = format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}" font-family="sans-serif" font-size="12">
<rect width="100%" height="100%" fill="white"/>
<text x="{cx}" y="30" text-anchor="middle" font-size="18">{title}</text>
"#,
        w = WIDTH,
        h = HEIGHT,
        cx = WIDTH / 2.0,
        title = escape(&title),
    );

    let plot_left = MARGIN_LEFT;
    let plot_right = WIDTH - MARGIN_RIGHT;
    let plot_top = MARGIN_TOP;
    let plot_bottom = HEIGHT - MARGIN_BOTTOM;

    if rows.is_empty() {
        svg.push_str(&format!(
            "<text x=\"{}\" y=\"{}\" text-anchor=\"middle\" fill=\"#666\">No data</text>\n</svg>\n",
            WIDTH / 2.0,
            HEIGHT / 2.0
        ));
        return svg;
    }

    let slot = (plot_right - plot_left) / rows.len() as f64;
    let x_center = |i: usize| plot_left + slot * (i as f64 + 0.5);

    let (t_lo, t_hi) = temperature_bounds(&rows);
    let temp = Scale {
        lo: t_lo,
        hi: t_hi,
        px_lo: plot_bottom,
        px_hi: plot_top,
    };
    let max_fires = rows.iter().map(|r| r.total_fires).max().unwrap_or(0);
    let fires = Scale {
        lo: 0.0,
        hi: count_ceiling(max_fires),
        px_lo: plot_bottom,
        px_hi: plot_top,
    };

    // Axes
    svg.push_str(&format!(
        "<g stroke=\"#333\">\n<line x1=\"{l}\" y1=\"{b}\" x2=\"{r}\" y2=\"{b}\"/>\n<line x1=\"{l}\" y1=\"{t}\" x2=\"{l}\" y2=\"{b}\"/>\n<line x1=\"{r}\" y1=\"{t}\" x2=\"{r}\" y2=\"{b}\"/>\n</g>\n",
        l = plot_left,
        r = plot_right,
        t = plot_top,
        b = plot_bottom,
    ));

    for value in temp.ticks() {
        let y = temp.map(value);
        svg.push_str(&format!(
            "<text x=\"{}\" y=\"{:.1}\" text-anchor=\"end\" fill=\"{}\">{:.2}</text>\n",
            plot_left - 8.0,
            y + 4.0,
            TEMPERATURE_COLOR,
            value
        ));
    }
    for value in fires.ticks() {
        let y = fires.map(value);
        svg.push_str(&format!(
            "<text x=\"{}\" y=\"{:.1}\" fill=\"{}\">{}</text>\n",
            plot_right + 8.0,
            y + 4.0,
            FIRE_COLOR,
            format_count(value)
        ));
    }

    svg.push_str(&format!(
        "<text transform=\"translate(20 {cy}) rotate(-90)\" text-anchor=\"middle\" fill=\"{c}\">Temperature Anomaly (\u{b0}C)</text>\n",
        cy = (plot_top + plot_bottom) / 2.0,
        c = TEMPERATURE_COLOR,
    ));
    svg.push_str(&format!(
        "<text transform=\"translate({x} {cy}) rotate(90)\" text-anchor=\"middle\" fill=\"{c}\">Fire Detections (sampled day)</text>\n",
        x = WIDTH - 20.0,
        cy = (plot_top + plot_bottom) / 2.0,
        c = FIRE_COLOR,
    ));

    // Year labels, thinned so they do not overlap on long ranges.
    let label_every = (rows.len() / 25).max(1);
    for (i, row) in rows.iter().enumerate() {
        if i % label_every != 0 {
            continue;
        }
        svg.push_str(&format!(
            "<text x=\"{:.1}\" y=\"{}\" text-anchor=\"end\" transform=\"rotate(-45 {:.1} {})\">{}</text>\n",
            x_center(i),
            plot_bottom + 18.0,
            x_center(i),
            plot_bottom + 18.0,
            row.year
        ));
    }

    // Fire bars
    svg.push_str(&format!("<g fill=\"{}\" fill-opacity=\"0.3\">\n", FIRE_COLOR));
    let bar_width = slot * 0.7;
    for (i, row) in rows.iter().enumerate() {
        let top = fires.map(row.total_fires as f64);
        svg.push_str(&format!(
            "<rect x=\"{:.1}\" y=\"{:.1}\" width=\"{:.1}\" height=\"{:.1}\"><title>{}: {} fires</title></rect>\n",
            x_center(i) - bar_width / 2.0,
            top,
            bar_width,
            plot_bottom - top,
            row.year,
            row.total_fires
        ));
    }
    svg.push_str("</g>\n");

    // Temperature line; years without an anomaly leave a gap in the markers
    // but the line joins the neighbors.
    let points: Vec<(f64, f64, &AnnualSummary)> = rows
        .iter()
        .enumerate()
        .filter_map(|(i, row)| {
            row.temp_anomaly_celsius
                .map(|t| (x_center(i), temp.map(t), *row))
        })
        .collect();

    if points.len() > 1 {
        let path: Vec<String> = points
            .iter()
            .map(|(x, y, _)| format!("{:.1},{:.1}", x, y))
            .collect();
        svg.push_str(&format!(
            "<polyline fill=\"none\" stroke=\"{}\" stroke-width=\"2\" points=\"{}\"/>\n",
            TEMPERATURE_COLOR,
            path.join(" ")
        ));
    }
    svg.push_str(&format!("<g fill=\"{}\">\n", TEMPERATURE_COLOR));
    for (x, y, row) in &points {
        svg.push_str(&format!(
            "<circle cx=\"{:.1}\" cy=\"{:.1}\" r=\"3.5\"><title>{}: {:.2} \u{b0}C</title></circle>\n",
            x,
            y,
            row.year,
            row.temp_anomaly_celsius.unwrap_or_default()
        ));
    }
    svg.push_str("</g>\n</svg>\n");
    svg
}

/// Render and write the chart to `gold/climate_fire_correlation.svg`.
pub async fn write_chart(storage_root: &Path, summary: &[AnnualSummary]) -> PipelineResult<PathBuf> {
    let path = chart_path(storage_root);
    let size = write_atomic(&path, render_svg(summary).as_bytes()).await?;
    info!(path = %path.display(), years = summary.len(), size, "Wrote chart");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(year: i32, temp: Option<f64>, fires: i64) -> AnnualSummary {
        AnnualSummary {
            year,
            temp_anomaly_celsius: temp,
            total_fires: fires,
            avg_intensity: 0.0,
            max_intensity: 0.0,
        }
    }

    #[test]
    fn test_years_drawn_ascending() {
        let svg = render_svg(&[
            row(2002, Some(0.6), 10),
            row(2000, Some(0.4), 30),
            row(2001, Some(0.5), 20),
        ]);
        let first = svg.find(">2000<").unwrap();
        let second = svg.find(">2001<").unwrap();
        let third = svg.find(">2002<").unwrap();
        assert!(first < second && second < third);
        assert!(svg.contains("(2000-2002)"));
    }

    #[test]
    fn test_one_bar_per_year_and_marker_per_anomaly() {
        let svg = render_svg(&[row(2000, Some(0.4), 3), row(2001, None, 0)]);
        assert_eq!(svg.matches("<rect x=").count(), 2);
        assert_eq!(svg.matches("<circle").count(), 1);
        assert!(!svg.contains("<polyline"));
    }

    #[test]
    fn test_empty_summary_renders_placeholder() {
        let svg = render_svg(&[]);
        assert!(svg.starts_with("<svg"));
        assert!(svg.contains("No data"));
        assert!(svg.trim_end().ends_with("</svg>"));
    }

    #[test]
    fn test_count_ceiling_rounds_up() {
        assert_eq!(count_ceiling(0), 5.0);
        assert_eq!(count_ceiling(7), 10.0);
        assert_eq!(count_ceiling(4200), 5000.0);
    }

    #[test]
    fn test_bars_stay_inside_plot() {
        let svg = render_svg(&[row(2000, Some(0.4), 4200)]);
        let scale = Scale {
            lo: 0.0,
            hi: count_ceiling(4200),
            px_lo: HEIGHT - MARGIN_BOTTOM,
            px_hi: MARGIN_TOP,
        };
        assert!(scale.map(4200.0) >= MARGIN_TOP);
        assert!(svg.contains("4200 fires"));
    }
}
