//! Overall timeline: daily favorability with its standard-error band on the
//! left axis, stacked posting volume on the right axis.

use std::iter;
use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use chrono::NaiveDate;
use event_study::{rolling_mean_centered, TrendTable};
use plotters::coord::Shift;
use plotters::prelude::*;

use super::{format_thousands, save, Figure, LIGHT_BLUE, SENTIMENT_GREY, STUDY_BLUE};

/// Plotted date window. The rolling means are computed over the full table
/// so the smoothed series does not lose its edges inside the window.
const WINDOW_START: (i32, u32, u32) = (2019, 11, 1);
const WINDOW_END: (i32, u32, u32) = (2020, 6, 30);

const SENTIMENT_WINDOW: usize = 7;
const VOLUME_WINDOW: usize = 3;
const VOLUME_TOP: f64 = 80_000.0;
const SENTIMENT_TOP: f64 = -15.0;

struct TrendFigure {
    x_range: (NaiveDate, NaiveDate),
    y_min: f64,
    sentiment: Vec<(NaiveDate, f64)>,
    /// (date, band low, band high) around the smoothed sentiment.
    band: Vec<(NaiveDate, f64, f64)>,
    co_volume: Vec<(NaiveDate, f64)>,
    /// co_volume + cv_volume, the top of the stack.
    total_volume: Vec<(NaiveDate, f64)>,
}

pub fn render(input: &Path, output_base: &Path) -> Result<PathBuf> {
    let table = TrendTable::from_path(input)?;

    let (sy, sm, sd) = WINDOW_START;
    let (ey, em, ed) = WINDOW_END;
    let start = NaiveDate::from_ymd_opt(sy, sm, sd).expect("valid window start");
    let end = NaiveDate::from_ymd_opt(ey, em, ed).expect("valid window end");

    // Fail early if the fixed window misses the data entirely.
    let visible = table.clip(start, end)?;
    tracing::info!(
        "{}: {} of {} days inside the plotted window",
        input.display(),
        visible.points.len(),
        table.points.len()
    );

    let raw = |f: fn(&event_study::TrendPoint) -> f64| -> Vec<f64> {
        table.points.iter().map(f).collect()
    };
    let sentiment_rolled = rolling_mean_centered(&raw(|p| p.sentiment), SENTIMENT_WINDOW);
    let co_rolled = rolling_mean_centered(&raw(|p| p.co_volume), VOLUME_WINDOW);
    let cv_rolled = rolling_mean_centered(&raw(|p| p.cv_volume), VOLUME_WINDOW);

    let mut sentiment = Vec::new();
    let mut band = Vec::new();
    let mut co_volume = Vec::new();
    let mut total_volume = Vec::new();

    for (i, p) in table.points.iter().enumerate() {
        if p.date < start || p.date > end {
            continue;
        }
        if let Some(mean) = sentiment_rolled[i] {
            sentiment.push((p.date, mean));
            band.push((p.date, mean - p.sentiment_ste, mean + p.sentiment_ste));
        }
        if let (Some(co), Some(cv)) = (co_rolled[i], cv_rolled[i]) {
            co_volume.push((p.date, co));
            total_volume.push((p.date, co + cv));
        }
    }

    if sentiment.is_empty() {
        bail!(
            "{}: no smoothed sentiment inside the plotted window",
            input.display()
        );
    }

    let y_min = (band
        .iter()
        .map(|&(_, lo, _)| lo)
        .fold(f64::INFINITY, f64::min)
        - 1.0)
        .min(SENTIMENT_TOP - 1.0);

    let figure = TrendFigure {
        x_range: (start, end),
        y_min,
        sentiment,
        band,
        co_volume,
        total_volume,
    };
    save(&figure, output_base)
}

impl Figure for TrendFigure {
    fn draw<DB: DrawingBackend>(&self, root: &DrawingArea<DB, Shift>) -> Result<()>
    where
        DB::ErrorType: 'static,
    {
        root.fill(&WHITE)?;

        let mut chart = ChartBuilder::on(root)
            .margin(15)
            .x_label_area_size(45)
            .y_label_area_size(70)
            .right_y_label_area_size(80)
            .build_cartesian_2d(self.x_range.0..self.x_range.1, self.y_min..SENTIMENT_TOP)?
            .set_secondary_coord(self.x_range.0..self.x_range.1, 0.0..VOLUME_TOP);

        chart
            .configure_mesh()
            .disable_x_mesh()
            .disable_y_mesh()
            .x_labels(8)
            .x_label_formatter(&|d| d.format("%b %Y").to_string())
            .y_desc(format!(
                "Favorability ({}-day rolling average)",
                SENTIMENT_WINDOW
            ))
            .axis_desc_style(("sans-serif", 16).into_font().color(&SENTIMENT_GREY))
            .label_style(("sans-serif", 14))
            .draw()?;

        chart
            .configure_secondary_axes()
            .y_desc(format!(
                "Daily volume of users mentioning China ({}-day rolling average)",
                VOLUME_WINDOW
            ))
            .y_label_formatter(&|v| format_thousands(*v))
            .axis_desc_style(("sans-serif", 16).into_font().color(&STUDY_BLUE))
            .label_style(("sans-serif", 14))
            .draw()?;

        // Stacked volume: co_volume fills from zero, cv_volume sits on top.
        chart
            .draw_secondary_series(AreaSeries::new(
                self.co_volume.iter().copied(),
                0.0,
                LIGHT_BLUE.mix(0.5),
            ))?
            .label("Daily volume of users mentioning China but not COVID-19")
            .legend(|(x, y)| {
                Rectangle::new([(x, y - 5), (x + 12, y + 5)], LIGHT_BLUE.mix(0.5).filled())
            });

        let mut stack: Vec<(NaiveDate, f64)> = self.co_volume.clone();
        stack.extend(self.total_volume.iter().rev().copied());
        chart
            .draw_secondary_series(iter::once(Polygon::new(stack, STUDY_BLUE.mix(0.5))))?
            .label("Daily volume of users mentioning China and COVID-19")
            .legend(|(x, y)| {
                Rectangle::new([(x, y - 5), (x + 12, y + 5)], STUDY_BLUE.mix(0.5).filled())
            });

        // Standard-error band behind the sentiment line.
        let mut band: Vec<(NaiveDate, f64)> =
            self.band.iter().map(|&(d, lo, _)| (d, lo)).collect();
        band.extend(self.band.iter().rev().map(|&(d, _, hi)| (d, hi)));
        chart.draw_series(iter::once(Polygon::new(band, SENTIMENT_GREY.mix(0.1))))?;

        chart
            .draw_series(LineSeries::new(
                self.sentiment.iter().copied(),
                SENTIMENT_GREY.stroke_width(2),
            ))?
            .label("Favorability")
            .legend(|(x, y)| {
                PathElement::new(vec![(x, y), (x + 12, y)], SENTIMENT_GREY.stroke_width(2))
            });

        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::UpperRight)
            .border_style(TRANSPARENT)
            .label_font(("sans-serif", 14))
            .draw()?;

        Ok(())
    }
}
