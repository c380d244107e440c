use crate::error::{Result, ScraperError};
use crate::pipeline::parse_number;
use plotters::coord::Shift;
use plotters::prelude::*;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::{info, warn};

const WIDTH: u32 = 800;
const HEIGHT: u32 = 600;
const PIE_START_DEGREES: f64 = 140.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartKind {
    Line,
    Bar,
    Pie,
}

impl FromStr for ChartKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "line" => Ok(ChartKind::Line),
            "bar" => Ok(ChartKind::Bar),
            "pie" => Ok(ChartKind::Pie),
            other => Err(format!("unknown chart '{}', expected line, bar or pie", other)),
        }
    }
}

impl fmt::Display for ChartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChartKind::Line => "line",
            ChartKind::Bar => "bar",
            ChartKind::Pie => "pie",
        };
        f.write_str(name)
    }
}

/// Categories on X, numeric values on Y, in query order.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartSeries {
    pub x_label: String,
    pub y_label: String,
    pub points: Vec<(String, f64)>,
    /// Rows dropped because Y was null or not a number.
    pub skipped: usize,
}

impl ChartSeries {
    pub fn from_rows(x_label: &str, y_label: &str, rows: &[(Option<String>, Option<String>)]) -> Self {
        let mut points = Vec::with_capacity(rows.len());
        let mut skipped = 0;
        for (x, y) in rows {
            match y.as_deref().and_then(parse_number) {
                Some(value) => points.push((x.clone().unwrap_or_default(), value)),
                None => skipped += 1,
            }
        }
        Self {
            x_label: x_label.to_string(),
            y_label: y_label.to_string(),
            points,
            skipped,
        }
    }

    pub fn title(&self, kind: ChartKind) -> String {
        match kind {
            ChartKind::Line => format!("Line Chart: {} vs {}", self.y_label, self.x_label),
            ChartKind::Bar => format!("Bar Chart: {} vs {}", self.y_label, self.x_label),
            ChartKind::Pie => format!("Pie Chart: Distribution of {}", self.y_label),
        }
    }

    fn value_range(&self) -> (f64, f64) {
        let min = self.points.iter().map(|p| p.1).fold(0.0_f64, f64::min);
        let max = self.points.iter().map(|p| p.1).fold(0.0_f64, f64::max);
        if (max - min).abs() < f64::EPSILON {
            (min - 1.0, max + 1.0)
        } else {
            let pad = (max - min) * 0.05;
            (min - if min < 0.0 { pad } else { 0.0 }, max + pad)
        }
    }
}

/// Share of the total for each positive value; non-positive values get no slice.
pub fn pie_slices(points: &[(String, f64)]) -> Vec<(String, f64)> {
    let total: f64 = points.iter().map(|p| p.1).filter(|v| *v > 0.0).sum();
    if total <= 0.0 {
        return Vec::new();
    }
    points
        .iter()
        .filter(|p| p.1 > 0.0)
        .map(|(label, v)| (label.clone(), v / total))
        .collect()
}

/// Renders to `output`. `.svg` files get an SVG document, anything else a PNG bitmap.
pub fn render(kind: ChartKind, series: &ChartSeries, output: &Path) -> Result<()> {
    if series.points.is_empty() {
        return Err(ScraperError::Chart(format!(
            "column '{}' has no numeric values to plot",
            series.y_label
        )));
    }
    if series.skipped > 0 {
        warn!(skipped = series.skipped, "rows without a numeric Y value were left out");
    }

    let is_svg = output
        .extension()
        .and_then(|e| e.to_str())
        .map_or(false, |e| e.eq_ignore_ascii_case("svg"));
    let drawn = if is_svg {
        draw(SVGBackend::new(output, (WIDTH, HEIGHT)).into_drawing_area(), kind, series)
    } else {
        draw(BitMapBackend::new(output, (WIDTH, HEIGHT)).into_drawing_area(), kind, series)
    };
    drawn.map_err(|e| ScraperError::Chart(e.to_string()))?;

    info!(chart = %kind, points = series.points.len(), "📈 Chart written to {}", output.display());
    Ok(())
}

type DrawResult = std::result::Result<(), Box<dyn std::error::Error>>;

fn draw<DB>(root: DrawingArea<DB, Shift>, kind: ChartKind, series: &ChartSeries) -> DrawResult
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    root.fill(&WHITE)?;
    match kind {
        ChartKind::Line | ChartKind::Bar => draw_cartesian(&root, kind, series)?,
        ChartKind::Pie => draw_pie(&root, series)?,
    }
    root.present()?;
    Ok(())
}

fn draw_cartesian<DB>(root: &DrawingArea<DB, Shift>, kind: ChartKind, series: &ChartSeries) -> DrawResult
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let n = series.points.len();
    let (y_min, y_max) = series.value_range();
    let labels: Vec<&str> = series.points.iter().map(|p| p.0.as_str()).collect();
    let category = |x: &f64| {
        let i = x.round();
        if i < 0.0 || (x - i).abs() > 0.01 {
            return String::new();
        }
        labels.get(i as usize).map(|l| l.to_string()).unwrap_or_default()
    };

    let mut chart = ChartBuilder::on(root)
        .caption(series.title(kind), ("sans-serif", 24).into_font())
        .margin(20)
        .x_label_area_size(60)
        .y_label_area_size(60)
        .build_cartesian_2d(-0.5f64..(n as f64 - 0.5), y_min..y_max)?;

    chart
        .configure_mesh()
        .x_desc(series.x_label.as_str())
        .y_desc(series.y_label.as_str())
        .x_labels(n.min(20))
        .x_label_formatter(&category)
        .draw()?;

    let points = series.points.iter().enumerate().map(|(i, p)| (i as f64, p.1));
    match kind {
        ChartKind::Line => {
            chart.draw_series(LineSeries::new(points.clone(), &BLUE))?;
            chart.draw_series(points.map(|p| Circle::new(p, 4, BLUE.filled())))?;
        }
        _ => {
            chart.draw_series(points.map(|(x, y)| {
                Rectangle::new([(x - 0.4, 0.0), (x + 0.4, y)], GREEN.filled())
            }))?;
        }
    }
    Ok(())
}

fn draw_pie<DB>(root: &DrawingArea<DB, Shift>, series: &ChartSeries) -> DrawResult
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let slices = pie_slices(&series.points);
    if slices.is_empty() {
        return Err(format!("column '{}' has no positive values for a pie", series.y_label).into());
    }
    let area = root.titled(&series.title(ChartKind::Pie), ("sans-serif", 24).into_font())?;
    let (w, h) = area.dim_in_pixel();
    let center = (w as f64 / 2.0, h as f64 / 2.0);
    let radius = w.min(h) as f64 * 0.35;
    // y grows downwards on screen, so angles run counter-clockwise with -sin
    let at = |deg: f64, r: f64| {
        let rad = deg.to_radians();
        (
            (center.0 + r * rad.cos()).round() as i32,
            (center.1 - r * rad.sin()).round() as i32,
        )
    };

    let mut start = PIE_START_DEGREES;
    for (i, (label, share)) in slices.iter().enumerate() {
        let sweep = share * 360.0;
        let steps = (sweep.ceil() as usize).max(2);
        let mut outline = vec![at(0.0, 0.0)];
        outline.extend((0..=steps).map(|s| at(start + sweep * s as f64 / steps as f64, radius)));
        area.draw(&Polygon::new(outline, Palette99::pick(i).filled()))?;

        let mid = start + sweep / 2.0;
        area.draw(&Text::new(
            format!("{} ({:.1}%)", label, share * 100.0),
            at(mid, radius * 1.15),
            ("sans-serif", 14).into_font(),
        ))?;
        start += sweep;
    }
    Ok(())
}
