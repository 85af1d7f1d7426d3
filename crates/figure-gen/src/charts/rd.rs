//! Regression-discontinuity event study: every cohort's favorability
//! trajectory around its treatment week, plus the size-weighted average and
//! the decline across the treatment boundary.

use std::iter;
use std::path::{Path, PathBuf};

use anyhow::Result;
use event_study::{align_cohorts, weighted_average, AlignedCohort, CohortTable, WeightedSeries};
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::series::DashedLineSeries;
use plotters::style::FontTransform;

use super::{
    cohort_colormap, offset_label, sample_cohort_color, save, to_xy, Figure, REPORT_WINDOW,
    STUDY_BLUE, Y_RANGE,
};

const ARROW_X: f64 = 0.3;
const ARROW_CAP: f64 = 0.08;

struct RdFigure {
    cohorts: Vec<AlignedCohort>,
    average: WeightedSeries,
    /// Weighted average one week before treatment and at treatment.
    before: f64,
    after: f64,
    decline: f64,
}

pub fn render(input: &Path, output_base: &Path) -> Result<PathBuf> {
    let table = CohortTable::from_path(input)?;
    let cohorts = align_cohorts(&table);
    let average = weighted_average(&cohorts, REPORT_WINDOW)?;

    let before = average.require(-1)?;
    let after = average.require(0)?;
    let decline = after - before;
    tracing::info!(
        "{}: {} cohorts, decline across treatment {:.2}",
        input.display(),
        cohorts.len(),
        decline
    );

    let figure = RdFigure {
        cohorts,
        average,
        before,
        after,
        decline,
    };
    save(&figure, output_base)
}

impl Figure for RdFigure {
    fn draw<DB: DrawingBackend>(&self, root: &DrawingArea<DB, Shift>) -> Result<()>
    where
        DB::ErrorType: 'static,
    {
        root.fill(&WHITE)?;

        let (x_lo, x_hi) = (*REPORT_WINDOW.start() as f64, *REPORT_WINDOW.end() as f64);
        let mut chart = ChartBuilder::on(root)
            .margin(15)
            .x_label_area_size(45)
            .y_label_area_size(55)
            .build_cartesian_2d(x_lo..x_hi, Y_RANGE.0..Y_RANGE.1)?;

        chart
            .configure_mesh()
            .disable_x_mesh()
            .disable_y_mesh()
            .x_labels(11)
            .x_label_formatter(&|x| offset_label(*x, false))
            .y_desc("Favorability")
            .axis_desc_style(("sans-serif", 16))
            .label_style(("sans-serif", 13))
            .draw()?;

        // Faint per-cohort trajectories, dashed before treatment.
        let colormap = cohort_colormap();
        for (k, cohort) in self.cohorts.iter().enumerate() {
            let color = sample_cohort_color(&colormap, k, self.cohorts.len());
            let in_window = |&(o, _): &(i32, f64)| REPORT_WINDOW.contains(&o);

            let post: Vec<(f64, f64)> =
                cohort.post().into_iter().filter(in_window).map(to_xy).collect();
            chart.draw_series(LineSeries::new(post, color.mix(0.1)))?;

            let pre: Vec<(f64, f64)> =
                cohort.pre().into_iter().filter(in_window).map(to_xy).collect();
            chart.draw_series(DashedLineSeries::new(
                pre,
                6,
                4,
                color.mix(0.1).stroke_width(1),
            ))?;
        }

        // Treatment-boundary reference lines.
        for x in [-1.0, 0.0] {
            chart.draw_series(iter::once(PathElement::new(
                vec![(x, Y_RANGE.0), (x, Y_RANGE.1)],
                BLACK.mix(0.5),
            )))?;
        }
        chart.draw_series(iter::once(Text::new(
            "Treatment week",
            (-0.1, Y_RANGE.0 + 1.0),
            ("sans-serif", 14)
                .into_font()
                .transform(FontTransform::Rotate270)
                .color(&BLACK.mix(0.5)),
        )))?;

        // Emphasized weighted average: dotted through treatment, solid after.
        let post: Vec<(f64, f64)> = self.average.starting_at(-1).into_iter().map(to_xy).collect();
        chart
            .draw_series(LineSeries::new(post, STUDY_BLUE.mix(0.7).stroke_width(3)))?
            .label("Favorability after the treatment")
            .legend(|(x, y)| {
                PathElement::new(vec![(x, y), (x + 12, y)], STUDY_BLUE.stroke_width(3))
            });

        let pre: Vec<(f64, f64)> = self.average.through(0).into_iter().map(to_xy).collect();
        chart
            .draw_series(DashedLineSeries::new(
                pre,
                2,
                4,
                STUDY_BLUE.mix(0.7).stroke_width(3),
            ))?
            .label("Favorability before the treatment")
            .legend(|(x, y)| {
                PathElement::new(vec![(x, y), (x + 12, y)], STUDY_BLUE.stroke_width(3))
            });

        // Two-headed arrow spanning the decline, with its numeric label.
        let arrow = STUDY_BLUE.stroke_width(2);
        chart.draw_series([
            PathElement::new(vec![(ARROW_X, self.before), (ARROW_X, self.after)], arrow),
            PathElement::new(
                vec![(ARROW_X - ARROW_CAP, self.before), (ARROW_X + ARROW_CAP, self.before)],
                arrow,
            ),
            PathElement::new(
                vec![(ARROW_X - ARROW_CAP, self.after), (ARROW_X + ARROW_CAP, self.after)],
                arrow,
            ),
        ])?;

        let label_y = self.average.value_at(1).unwrap_or(self.after) + 2.0;
        chart.draw_series(iter::once(Text::new(
            format!("Decline={:.2}", self.decline),
            (0.6, label_y),
            ("sans-serif", 16)
                .into_font()
                .transform(FontTransform::Rotate270)
                .color(&STUDY_BLUE),
        )))?;

        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::UpperRight)
            .border_style(TRANSPARENT)
            .label_font(("sans-serif", 14))
            .draw()?;

        Ok(())
    }
}
