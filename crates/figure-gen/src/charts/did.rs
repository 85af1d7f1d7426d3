//! Difference-in-differences event study: treated and control trajectories
//! around each treatment week, their size-weighted averages, and the shaded
//! region encoding the DiD estimate between the treated trajectory and the
//! control-implied counterfactual.

use std::iter;
use std::path::{Path, PathBuf};

use anyhow::Result;
use event_study::{
    align_grouped, did_estimate, weighted_average, AlignedCohort, Group, GroupedCohortTable,
    WeightedSeries,
};
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::series::DashedLineSeries;
use plotters::style::FontTransform;

use super::{
    cohort_colormap, offset_label, sample_cohort_color, save, to_xy, Figure, PRE_WINDOW,
    REPORT_WINDOW, STUDY_BLUE, Y_RANGE,
};

struct DidFigure {
    treated: Vec<AlignedCohort>,
    control: Vec<AlignedCohort>,
    treated_avg: WeightedSeries,
    control_avg: WeightedSeries,
    /// Weighted averages at the treatment boundary.
    treated_before: f64,
    treated_after: f64,
    counterfactual: f64,
    effect: f64,
}

pub fn render(input: &Path, output_base: &Path) -> Result<PathBuf> {
    let table = GroupedCohortTable::from_path(input)?;
    let treated = align_grouped(&table, Group::Treated)?;
    let control = align_grouped(&table, Group::Control)?;

    let treated_avg = weighted_average(&treated, REPORT_WINDOW)?;
    let control_avg = weighted_average(&control, PRE_WINDOW)?;
    let effect = did_estimate(&treated_avg, &control_avg)?;

    let treated_before = treated_avg.require(-1)?;
    let treated_after = treated_avg.require(0)?;
    // The treated baseline pushed forward by the control arm's change.
    let counterfactual = treated_before - control_avg.require(-1)? + control_avg.require(0)?;

    tracing::info!(
        "{}: {} treated / {} control cohorts, DiD estimate {:.2}",
        input.display(),
        treated.len(),
        control.len(),
        effect
    );

    let figure = DidFigure {
        treated,
        control,
        treated_avg,
        control_avg,
        treated_before,
        treated_after,
        counterfactual,
        effect,
    };
    save(&figure, output_base)
}

impl Figure for DidFigure {
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
            .x_label_formatter(&|x| offset_label(*x, true))
            .y_desc("Favorability")
            .axis_desc_style(("sans-serif", 16))
            .label_style(("sans-serif", 13))
            .draw()?;

        // Faint per-cohort trajectories: treated solid, control dashed (and
        // already truncated to pre-treatment offsets).
        let colormap = cohort_colormap();
        let in_window = |&(o, _): &(i32, f64)| REPORT_WINDOW.contains(&o);
        for (k, cohort) in self.treated.iter().enumerate() {
            let color = sample_cohort_color(&colormap, k, self.treated.len());
            let points: Vec<(f64, f64)> = cohort
                .points
                .iter()
                .copied()
                .filter(in_window)
                .map(to_xy)
                .collect();
            chart.draw_series(LineSeries::new(points, color.mix(0.1)))?;
        }
        for (k, cohort) in self.control.iter().enumerate() {
            let color = sample_cohort_color(&colormap, k, self.control.len());
            let points: Vec<(f64, f64)> = cohort
                .points
                .iter()
                .copied()
                .filter(in_window)
                .map(to_xy)
                .collect();
            chart.draw_series(DashedLineSeries::new(
                points,
                6,
                4,
                color.mix(0.1).stroke_width(1),
            ))?;
        }

        // Treatment-boundary reference lines.
        for x in [0.0, 1.0] {
            chart.draw_series(iter::once(PathElement::new(
                vec![(x, Y_RANGE.0), (x, Y_RANGE.1)],
                BLACK.mix(0.5),
            )))?;
        }
        chart.draw_series(iter::once(Text::new(
            "Treatment week",
            (0.95, Y_RANGE.0 + 1.0),
            ("sans-serif", 14)
                .into_font()
                .transform(FontTransform::Rotate270)
                .color(&BLACK.mix(0.5)),
        )))?;

        // The DiD estimate: region between the treated trajectory and the
        // counterfactual implied by the control arm's change.
        let region = vec![
            (-1.0, self.treated_before),
            (0.0, self.treated_after),
            (0.0, self.counterfactual),
        ];
        chart
            .draw_series(iter::once(Polygon::new(region, STUDY_BLUE.mix(0.3))))?
            .label(format!("Difference in difference = {:.2}", self.effect))
            .legend(|(x, y)| {
                Rectangle::new([(x, y - 5), (x + 12, y + 5)], STUDY_BLUE.mix(0.3).filled())
            });

        // Emphasized weighted averages.
        let treated: Vec<(f64, f64)> = self.treated_avg.points.iter().copied().map(to_xy).collect();
        chart
            .draw_series(LineSeries::new(treated, STUDY_BLUE.mix(0.7).stroke_width(3)))?
            .label("Favorability after the treatment")
            .legend(|(x, y)| {
                PathElement::new(vec![(x, y), (x + 12, y)], STUDY_BLUE.stroke_width(3))
            });

        let control: Vec<(f64, f64)> = self.control_avg.points.iter().copied().map(to_xy).collect();
        chart
            .draw_series(DashedLineSeries::new(
                control,
                2,
                4,
                STUDY_BLUE.mix(0.7).stroke_width(3),
            ))?
            .label("Favorability before the treatment")
            .legend(|(x, y)| {
                PathElement::new(vec![(x, y), (x + 12, y)], STUDY_BLUE.stroke_width(3))
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
