use chrono::NaiveDate;
use std::ops::RangeInclusive;

use crate::error::{StudyError, StudyResult};
use crate::tables::{CohortTable, Group, GroupedCohortTable};

/// Integer week offset of `date` relative to `treatment_week`.
///
/// Computed as whole days over seven, truncated toward zero, so a snapshot
/// dated exactly `treatment_week + 7k` days lands on offset `k`.
pub fn week_offset(date: NaiveDate, treatment_week: NaiveDate) -> i32 {
    let days = (date - treatment_week).num_days();
    (days as f64 / 7.0).trunc() as i32
}

/// One cohort's snapshots reindexed by week offset from its treatment week.
#[derive(Debug, Clone)]
pub struct AlignedCohort {
    pub treatment_week: NaiveDate,
    pub size: Option<f64>,
    /// Sorted by offset; gaps where the cohort was not observed.
    pub points: Vec<(i32, f64)>,
}

impl AlignedCohort {
    fn new(
        treatment_week: NaiveDate,
        size: Option<f64>,
        dates: &[NaiveDate],
        values: &[Option<f64>],
    ) -> Self {
        let mut points: Vec<(i32, f64)> = dates
            .iter()
            .zip(values)
            .filter_map(|(&d, v)| v.map(|v| (week_offset(d, treatment_week), v)))
            .collect();
        points.sort_by_key(|&(offset, _)| offset);

        Self {
            treatment_week,
            size,
            points,
        }
    }

    pub fn value_at(&self, offset: i32) -> Option<f64> {
        self.points
            .iter()
            .find(|&&(o, _)| o == offset)
            .map(|&(_, v)| v)
    }

    /// Pre-treatment part of the trajectory (offset <= 0).
    pub fn pre(&self) -> Vec<(i32, f64)> {
        self.points.iter().copied().filter(|&(o, _)| o <= 0).collect()
    }

    /// Post-treatment part of the trajectory (offset >= 0).
    pub fn post(&self) -> Vec<(i32, f64)> {
        self.points.iter().copied().filter(|&(o, _)| o >= 0).collect()
    }

    /// Drops post-treatment offsets. Control cohorts are not observed after
    /// treatment in this design.
    pub fn retain_pre(&mut self) {
        self.points.retain(|&(o, _)| o <= 0);
    }
}

/// Aligns every cohort of the RD table, skipping the first treatment week.
pub fn align_cohorts(table: &CohortTable) -> Vec<AlignedCohort> {
    table
        .rows
        .iter()
        .skip(1)
        .map(|row| AlignedCohort::new(row.treatment_week, row.size, &table.dates, &row.values))
        .collect()
}

/// Aligns one arm of the DiD table, skipping the first treatment week.
/// Every remaining treatment week must have a row for `group`.
pub fn align_grouped(table: &GroupedCohortTable, group: Group) -> StudyResult<Vec<AlignedCohort>> {
    let mut cohorts = Vec::new();
    for week in table.treatment_weeks().into_iter().skip(1) {
        let row = table.row(week, group)?;
        let mut cohort = AlignedCohort::new(week, row.size, &table.dates, &row.values);
        if group == Group::Control {
            cohort.retain_pre();
        }
        cohorts.push(cohort);
    }
    Ok(cohorts)
}

/// A size-weighted mean across cohorts, one value per week offset.
#[derive(Debug, Clone)]
pub struct WeightedSeries {
    /// Sorted by offset, contiguous over the averaging window.
    pub points: Vec<(i32, f64)>,
}

impl WeightedSeries {
    pub fn value_at(&self, offset: i32) -> Option<f64> {
        self.points
            .iter()
            .find(|&&(o, _)| o == offset)
            .map(|&(_, v)| v)
    }

    /// The value at `offset`, or an error naming the offset.
    pub fn require(&self, offset: i32) -> StudyResult<f64> {
        self.value_at(offset)
            .ok_or(StudyError::MissingAverage { offset })
    }

    /// Points with offset <= `max`.
    pub fn through(&self, max: i32) -> Vec<(i32, f64)> {
        self.points.iter().copied().filter(|&(o, _)| o <= max).collect()
    }

    /// Points with offset >= `min`.
    pub fn starting_at(&self, min: i32) -> Vec<(i32, f64)> {
        self.points.iter().copied().filter(|&(o, _)| o >= min).collect()
    }

    /// The drop across the treatment boundary: value at offset 0 minus the
    /// value one week before.
    pub fn decline(&self) -> StudyResult<f64> {
        Ok(self.require(0)? - self.require(-1)?)
    }
}

/// Size-weighted mean across `cohorts` at every offset in `window`.
///
/// Every cohort must carry a positive size and a value at every offset in
/// the window; anything less is an error rather than a silently skewed
/// average.
pub fn weighted_average(
    cohorts: &[AlignedCohort],
    window: RangeInclusive<i32>,
) -> StudyResult<WeightedSeries> {
    if cohorts.is_empty() {
        return Err(StudyError::NoCohorts);
    }

    let mut weights = Vec::with_capacity(cohorts.len());
    for cohort in cohorts {
        match cohort.size {
            Some(size) if size > 0.0 => weights.push(size),
            _ => {
                return Err(StudyError::MissingCohortSize {
                    week: cohort.treatment_week,
                })
            }
        }
    }
    let total: f64 = weights.iter().sum();

    let mut points = Vec::new();
    for offset in window {
        let mut sum = 0.0;
        for (cohort, weight) in cohorts.iter().zip(&weights) {
            let value = cohort
                .value_at(offset)
                .ok_or(StudyError::MissingObservation {
                    week: cohort.treatment_week,
                    offset,
                })?;
            sum += value * weight;
        }
        points.push((offset, sum / total));
    }

    Ok(WeightedSeries { points })
}

/// The difference-in-differences estimate:
/// `(treated[0] - treated[-1]) - (control[0] - control[-1])`.
pub fn did_estimate(treated: &WeightedSeries, control: &WeightedSeries) -> StudyResult<f64> {
    Ok(treated.decline()? - control.decline()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn cohort(week: &str, size: f64, points: &[(i32, f64)]) -> AlignedCohort {
        AlignedCohort {
            treatment_week: date(week),
            size: Some(size),
            points: points.to_vec(),
        }
    }

    #[test]
    fn weekly_snapshots_align_exactly() {
        let week = date("2020-01-12");
        assert_eq!(week_offset(date("2020-01-12"), week), 0);
        assert_eq!(week_offset(date("2020-02-02"), week), 3);
        assert_eq!(week_offset(date("2019-12-15"), week), -4);
    }

    #[test]
    fn partial_weeks_truncate_toward_zero() {
        let week = date("2020-01-12");
        assert_eq!(week_offset(date("2020-01-22"), week), 1);
        assert_eq!(week_offset(date("2020-01-02"), week), -1);
    }

    #[test]
    fn alignment_splits_pre_and_post_at_zero() {
        let c = cohort("2020-01-12", 1.0, &[(-2, -20.0), (0, -22.0), (3, -25.0)]);
        assert_eq!(c.pre(), vec![(-2, -20.0), (0, -22.0)]);
        assert_eq!(c.post(), vec![(0, -22.0), (3, -25.0)]);
    }

    #[test]
    fn weighted_average_is_weight_invariant_when_values_agree() {
        let cohorts = vec![
            cohort("2020-01-05", 10.0, &[(-1, -25.0), (0, -20.0)]),
            cohort("2020-01-12", 9000.0, &[(-1, -25.0), (0, -20.0)]),
        ];

        let avg = weighted_average(&cohorts, -1..=0).unwrap();
        assert_eq!(avg.value_at(-1), Some(-25.0));
        assert_eq!(avg.value_at(0), Some(-20.0));
    }

    #[test]
    fn weighted_average_leans_toward_the_larger_cohort() {
        let cohorts = vec![
            cohort("2020-01-05", 1.0, &[(0, 0.0)]),
            cohort("2020-01-12", 3.0, &[(0, 4.0)]),
        ];

        let avg = weighted_average(&cohorts, 0..=0).unwrap();
        assert_eq!(avg.value_at(0), Some(3.0));
    }

    #[test]
    fn decline_matches_the_documented_arithmetic() {
        let avg = WeightedSeries {
            points: vec![(-1, -25.0), (0, -20.0)],
        };
        let decline = avg.decline().unwrap();
        assert_eq!(format!("{:.2}", decline), "5.00");
    }

    #[test]
    fn did_estimate_matches_the_documented_arithmetic() {
        let treated = WeightedSeries {
            points: vec![(-1, -30.0), (0, -25.0)],
        };
        let control = WeightedSeries {
            points: vec![(-1, -22.0), (0, -20.0)],
        };
        assert_eq!(did_estimate(&treated, &control).unwrap(), 3.0);
    }

    #[test]
    fn missing_size_is_an_error() {
        let mut c = cohort("2020-01-12", 1.0, &[(0, -20.0)]);
        c.size = None;

        let err = weighted_average(&[c], 0..=0).unwrap_err();
        assert!(matches!(
            err,
            StudyError::MissingCohortSize { week } if week == date("2020-01-12")
        ));
    }

    #[test]
    fn zero_size_is_an_error() {
        let c = cohort("2020-01-12", 0.0, &[(0, -20.0)]);
        let err = weighted_average(&[c], 0..=0).unwrap_err();
        assert!(matches!(err, StudyError::MissingCohortSize { .. }));
    }

    #[test]
    fn missing_observation_is_an_error() {
        let cohorts = vec![cohort("2020-01-12", 5.0, &[(0, -20.0)])];
        let err = weighted_average(&cohorts, -1..=0).unwrap_err();
        assert!(matches!(
            err,
            StudyError::MissingObservation { offset: -1, .. }
        ));
    }

    #[test]
    fn no_cohorts_is_an_error() {
        let err = weighted_average(&[], -4..=6).unwrap_err();
        assert!(matches!(err, StudyError::NoCohorts));
    }
}
