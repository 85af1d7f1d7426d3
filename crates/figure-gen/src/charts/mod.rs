//! The three study figures, drawn with plotters.
//!
//! Each figure is rendered twice from the same prepared data, once through
//! the SVG backend and once through the bitmap backend, so the vector and
//! raster outputs always agree.

pub mod did;
pub mod rd;
pub mod trend;

use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::colors::colormaps::{ColorMap, DerivedColorMap};

/// 10x8 figure at 100 dpi.
pub(crate) const CANVAS: (u32, u32) = (1000, 800);

pub(crate) const SENTIMENT_GREY: RGBColor = RGBColor(0x63, 0x63, 0x63);
pub(crate) const STUDY_BLUE: RGBColor = RGBColor(0x31, 0x82, 0xbd);
pub(crate) const LIGHT_BLUE: RGBColor = RGBColor(0xbd, 0xd7, 0xe7);

/// Reported offsets: four weeks before to six weeks after treatment.
pub(crate) const REPORT_WINDOW: RangeInclusive<i32> = -4..=6;
/// Control cohorts are only observed through the treatment week.
pub(crate) const PRE_WINDOW: RangeInclusive<i32> = -4..=0;
/// Fixed favorability axis of the event-study figures.
pub(crate) const Y_RANGE: (f64, f64) = (-41.0, -5.0);

/// A chart that can draw itself onto any plotters backend.
pub(crate) trait Figure {
    fn draw<DB: DrawingBackend>(&self, root: &DrawingArea<DB, Shift>) -> anyhow::Result<()>
    where
        DB::ErrorType: 'static;
}

/// Writes `<base>.svg` and `<base>.png`; returns the vector path.
pub(crate) fn save(figure: &impl Figure, base: &Path) -> anyhow::Result<PathBuf> {
    let svg_path = base.with_extension("svg");
    {
        let root = SVGBackend::new(&svg_path, CANVAS).into_drawing_area();
        figure.draw(&root)?;
        root.present()?;
    }

    let png_path = base.with_extension("png");
    {
        let root = BitMapBackend::new(&png_path, CANVAS).into_drawing_area();
        figure.draw(&root)?;
        root.present()?;
    }

    Ok(svg_path)
}

/// Plasma-style sequential colormap; cohorts are colored by sampling it at
/// `k / n_cohorts`.
pub(crate) fn cohort_colormap() -> DerivedColorMap<RGBColor> {
    DerivedColorMap::new(&[
        RGBColor(0x0d, 0x08, 0x87),
        RGBColor(0x7e, 0x03, 0xa8),
        RGBColor(0xcc, 0x47, 0x78),
        RGBColor(0xf8, 0x95, 0x40),
        RGBColor(0xf0, 0xf9, 0x21),
    ])
}

pub(crate) fn sample_cohort_color(map: &DerivedColorMap<RGBColor>, k: usize, n: usize) -> RGBColor {
    map.get_color(k as f64 / n.max(1) as f64)
}

pub(crate) fn to_xy((offset, value): (i32, f64)) -> (f64, f64) {
    (offset as f64, value)
}

/// Tick label for an integer week offset; empty for unnamed positions.
pub(crate) fn offset_label(x: f64, long_form: bool) -> String {
    let rounded = x.round();
    if (x - rounded).abs() > 1e-6 {
        return String::new();
    }

    let suffix = if long_form { " treatment" } else { "" };
    match rounded as i32 {
        -4 => format!("4 weeks before{}", suffix),
        -1 => format!("1 week before{}", suffix),
        0 => "Treatment".to_string(),
        1 => format!("1 week after{}", suffix),
        2 => format!("2 weeks after{}", suffix),
        3 => format!("3 weeks after{}", suffix),
        6 => format!("6 weeks after{}", suffix),
        _ => String::new(),
    }
}

/// `12345` => `12,345`, for the volume axis.
pub(crate) fn format_thousands(value: f64) -> String {
    let n = value.round() as i64;
    let digits = n.abs().to_string();

    let mut out = String::new();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }

    if n < 0 {
        format!("-{}", out)
    } else {
        out
    }
}
