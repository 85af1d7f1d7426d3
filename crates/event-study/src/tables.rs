use chrono::NaiveDate;
use std::path::{Path, PathBuf};

use crate::error::{StudyError, StudyResult};

const DATE_FORMAT: &str = "%Y-%m-%d";

fn parse_date(path: &Path, value: &str) -> StudyResult<NaiveDate> {
    // Some exports carry a time component; the date part is what matters.
    let value = value.trim();
    let date_part = value.split_whitespace().next().unwrap_or(value);

    NaiveDate::parse_from_str(date_part, DATE_FORMAT).map_err(|_| StudyError::BadDate {
        path: path.to_path_buf(),
        value: value.to_string(),
    })
}

fn parse_number(path: &Path, column: &str, value: &str) -> StudyResult<f64> {
    value.trim().parse().map_err(|_| StudyError::BadNumber {
        path: path.to_path_buf(),
        column: column.to_string(),
        value: value.to_string(),
    })
}

fn open_reader(path: &Path) -> StudyResult<csv::Reader<std::fs::File>> {
    csv::Reader::from_path(path).map_err(|source| StudyError::Read {
        path: path.to_path_buf(),
        source,
    })
}

fn read_record(path: &Path, record: csv::Result<csv::StringRecord>) -> StudyResult<csv::StringRecord> {
    record.map_err(|source| StudyError::Read {
        path: path.to_path_buf(),
        source,
    })
}

fn column_index(path: &Path, headers: &csv::StringRecord, name: &str) -> StudyResult<usize> {
    headers
        .iter()
        .position(|h| h == name)
        .ok_or_else(|| StudyError::MissingColumn {
            path: path.to_path_buf(),
            column: name.to_string(),
        })
}

/// One day of the overall timeline table.
#[derive(Debug, Clone, Copy)]
pub struct TrendPoint {
    pub date: NaiveDate,
    pub sentiment: f64,
    pub sentiment_ste: f64,
    pub co_volume: f64,
    pub cv_volume: f64,
}

/// Date-indexed timeline of daily sentiment and posting volume.
#[derive(Debug, Clone)]
pub struct TrendTable {
    pub path: PathBuf,
    /// Sorted by date, dates unique.
    pub points: Vec<TrendPoint>,
}

impl TrendTable {
    /// Loads the trend CSV. The first column is the date index; the metric
    /// columns are looked up by name.
    pub fn from_path(path: &Path) -> StudyResult<Self> {
        let mut reader = open_reader(path)?;
        let headers = read_record(path, reader.headers().cloned())?;

        let sentiment = column_index(path, &headers, "sentiment")?;
        let sentiment_ste = column_index(path, &headers, "sentiment_ste")?;
        let co_volume = column_index(path, &headers, "co_volume")?;
        let cv_volume = column_index(path, &headers, "cv_volume")?;

        let mut points = Vec::new();
        for record in reader.records() {
            let record = read_record(path, record)?;
            let field = |i: usize| record.get(i).unwrap_or("");

            points.push(TrendPoint {
                date: parse_date(path, field(0))?,
                sentiment: parse_number(path, "sentiment", field(sentiment))?,
                sentiment_ste: parse_number(path, "sentiment_ste", field(sentiment_ste))?,
                co_volume: parse_number(path, "co_volume", field(co_volume))?,
                cv_volume: parse_number(path, "cv_volume", field(cv_volume))?,
            });
        }

        points.sort_by_key(|p| p.date);
        for pair in points.windows(2) {
            if pair[0].date == pair[1].date {
                return Err(StudyError::DuplicateDate {
                    path: path.to_path_buf(),
                    date: pair[0].date,
                });
            }
        }

        tracing::debug!("{}: {} trend rows", path.display(), points.len());
        Ok(Self {
            path: path.to_path_buf(),
            points,
        })
    }

    /// Restricts the table to `start..=end`; errors if nothing remains.
    pub fn clip(&self, start: NaiveDate, end: NaiveDate) -> StudyResult<Self> {
        let points: Vec<TrendPoint> = self
            .points
            .iter()
            .copied()
            .filter(|p| p.date >= start && p.date <= end)
            .collect();

        if points.is_empty() {
            return Err(StudyError::EmptyDateWindow {
                path: self.path.clone(),
                start,
                end,
            });
        }

        Ok(Self {
            path: self.path.clone(),
            points,
        })
    }
}

/// One cohort's row of dated snapshot values, keyed by treatment week.
#[derive(Debug, Clone)]
pub struct CohortRow {
    pub treatment_week: NaiveDate,
    /// Number of observations behind this cohort; the weight in averages.
    /// `None` when the size cell is empty.
    pub size: Option<f64>,
    /// Parallel to the table's `dates`; `None` where unobserved.
    pub values: Vec<Option<f64>>,
}

/// The RD effect table: one row per treatment week, snapshot columns.
#[derive(Debug, Clone)]
pub struct CohortTable {
    pub path: PathBuf,
    /// Snapshot column dates, in file order.
    pub dates: Vec<NaiveDate>,
    /// Sorted by treatment week.
    pub rows: Vec<CohortRow>,
}

impl CohortTable {
    pub fn from_path(path: &Path) -> StudyResult<Self> {
        let mut reader = open_reader(path)?;
        let headers = read_record(path, reader.headers().cloned())?;

        let week_col = column_index(path, &headers, "treatment_week")?;
        let size_col = column_index(path, &headers, "size")?;

        let (date_cols, dates) = snapshot_columns(path, &headers, &[week_col, size_col])?;

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = read_record(path, record)?;
            let treatment_week = parse_date(path, record.get(week_col).unwrap_or(""))?;

            rows.push(CohortRow {
                treatment_week,
                size: parse_size(path, record.get(size_col).unwrap_or(""))?,
                values: snapshot_values(path, &record, &date_cols, &dates)?,
            });
        }

        rows.sort_by_key(|r| r.treatment_week);
        for pair in rows.windows(2) {
            if pair[0].treatment_week == pair[1].treatment_week {
                return Err(StudyError::DuplicateTreatmentWeek {
                    path: path.to_path_buf(),
                    week: pair[0].treatment_week,
                });
            }
        }

        tracing::debug!("{}: {} cohorts, {} snapshots", path.display(), rows.len(), dates.len());
        Ok(Self {
            path: path.to_path_buf(),
            dates,
            rows,
        })
    }
}

/// Which arm of the DiD design a row belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Group {
    Treated,
    Control,
}

impl Group {
    pub fn as_str(&self) -> &'static str {
        match self {
            Group::Treated => "treated",
            Group::Control => "control",
        }
    }

    fn parse(path: &Path, value: &str) -> StudyResult<Self> {
        match value.trim() {
            "treated" => Ok(Group::Treated),
            "control" => Ok(Group::Control),
            other => Err(StudyError::BadGroup {
                path: path.to_path_buf(),
                value: other.to_string(),
            }),
        }
    }
}

/// One `(treatment week, group)` row of the DiD effect table.
#[derive(Debug, Clone)]
pub struct GroupedCohortRow {
    pub treatment_week: NaiveDate,
    pub group: Group,
    pub size: Option<f64>,
    pub values: Vec<Option<f64>>,
}

/// The DiD effect table: a treated and a control row per treatment week.
#[derive(Debug, Clone)]
pub struct GroupedCohortTable {
    pub path: PathBuf,
    pub dates: Vec<NaiveDate>,
    pub rows: Vec<GroupedCohortRow>,
}

impl GroupedCohortTable {
    pub fn from_path(path: &Path) -> StudyResult<Self> {
        let mut reader = open_reader(path)?;
        let headers = read_record(path, reader.headers().cloned())?;

        let week_col = column_index(path, &headers, "treatment_week")?;
        let group_col = column_index(path, &headers, "group")?;
        let size_col = column_index(path, &headers, "size")?;

        let (date_cols, dates) = snapshot_columns(path, &headers, &[week_col, group_col, size_col])?;

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = read_record(path, record)?;

            rows.push(GroupedCohortRow {
                treatment_week: parse_date(path, record.get(week_col).unwrap_or(""))?,
                group: Group::parse(path, record.get(group_col).unwrap_or(""))?,
                size: parse_size(path, record.get(size_col).unwrap_or(""))?,
                values: snapshot_values(path, &record, &date_cols, &dates)?,
            });
        }

        let mut keys: Vec<(NaiveDate, Group)> =
            rows.iter().map(|r| (r.treatment_week, r.group)).collect();
        keys.sort_by_key(|&(week, group)| (week, group == Group::Control));
        for pair in keys.windows(2) {
            if pair[0] == pair[1] {
                return Err(StudyError::DuplicateGroupRow {
                    path: path.to_path_buf(),
                    group: pair[0].1.as_str(),
                    week: pair[0].0,
                });
            }
        }

        tracing::debug!("{}: {} rows, {} snapshots", path.display(), rows.len(), dates.len());
        Ok(Self {
            path: path.to_path_buf(),
            dates,
            rows,
        })
    }

    /// Unique treatment weeks, sorted.
    pub fn treatment_weeks(&self) -> Vec<NaiveDate> {
        let mut weeks: Vec<NaiveDate> = self.rows.iter().map(|r| r.treatment_week).collect();
        weeks.sort();
        weeks.dedup();
        weeks
    }

    /// The row for `(week, group)`; an absent arm is a schema error.
    pub fn row(&self, week: NaiveDate, group: Group) -> StudyResult<&GroupedCohortRow> {
        self.rows
            .iter()
            .find(|r| r.treatment_week == week && r.group == group)
            .ok_or_else(|| StudyError::MissingGroupRow {
                path: self.path.clone(),
                group: group.as_str(),
                week,
            })
    }
}

/// Splits the header into key columns and dated snapshot columns.
fn snapshot_columns(
    path: &Path,
    headers: &csv::StringRecord,
    key_cols: &[usize],
) -> StudyResult<(Vec<usize>, Vec<NaiveDate>)> {
    let mut date_cols = Vec::new();
    let mut dates = Vec::new();

    for (i, header) in headers.iter().enumerate() {
        if key_cols.contains(&i) {
            continue;
        }
        date_cols.push(i);
        dates.push(parse_date(path, header)?);
    }

    Ok((date_cols, dates))
}

fn snapshot_values(
    path: &Path,
    record: &csv::StringRecord,
    date_cols: &[usize],
    dates: &[NaiveDate],
) -> StudyResult<Vec<Option<f64>>> {
    date_cols
        .iter()
        .zip(dates)
        .map(|(&col, date)| {
            let cell = record.get(col).unwrap_or("").trim();
            if cell.is_empty() {
                Ok(None)
            } else {
                parse_number(path, &date.to_string(), cell).map(Some)
            }
        })
        .collect()
}

fn parse_size(path: &Path, value: &str) -> StudyResult<Option<f64>> {
    let value = value.trim();
    if value.is_empty() {
        Ok(None)
    } else {
        parse_number(path, "size", value).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_fixture(name: &str, contents: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("event-study-tables-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn loads_trend_table() {
        let path = write_fixture(
            "trend.csv",
            ",sentiment,sentiment_ste,co_volume,cv_volume\n\
             2019-11-02,-20.5,1.5,100,40\n\
             2019-11-01,-21.0,1.0,90,30\n",
        );

        let table = TrendTable::from_path(&path).unwrap();
        assert_eq!(table.points.len(), 2);
        // Sorted by date regardless of file order.
        assert_eq!(table.points[0].date, date("2019-11-01"));
        assert_eq!(table.points[0].sentiment, -21.0);
        assert_eq!(table.points[1].cv_volume, 40.0);
    }

    #[test]
    fn trend_rejects_missing_column() {
        let path = write_fixture(
            "trend-missing.csv",
            ",sentiment,co_volume,cv_volume\n2019-11-01,-21.0,90,30\n",
        );

        let err = TrendTable::from_path(&path).unwrap_err();
        assert!(matches!(err, StudyError::MissingColumn { column, .. } if column == "sentiment_ste"));
    }

    #[test]
    fn trend_rejects_duplicate_dates() {
        let path = write_fixture(
            "trend-dup.csv",
            ",sentiment,sentiment_ste,co_volume,cv_volume\n\
             2019-11-01,-21.0,1.0,90,30\n\
             2019-11-01,-20.0,1.0,95,35\n",
        );

        let err = TrendTable::from_path(&path).unwrap_err();
        assert!(matches!(err, StudyError::DuplicateDate { .. }));
    }

    #[test]
    fn clip_errors_on_empty_window() {
        let path = write_fixture(
            "trend-clip.csv",
            ",sentiment,sentiment_ste,co_volume,cv_volume\n2019-11-01,-21.0,1.0,90,30\n",
        );

        let table = TrendTable::from_path(&path).unwrap();
        let err = table.clip(date("2021-01-01"), date("2021-02-01")).unwrap_err();
        assert!(matches!(err, StudyError::EmptyDateWindow { .. }));
    }

    #[test]
    fn loads_cohort_table() {
        let path = write_fixture(
            "rd.csv",
            "treatment_week,size,2020-01-05,2020-01-12,2020-01-19\n\
             2020-01-12,150,-20.0,,-22.0\n",
        );

        let table = CohortTable::from_path(&path).unwrap();
        assert_eq!(table.dates, vec![date("2020-01-05"), date("2020-01-12"), date("2020-01-19")]);

        let row = &table.rows[0];
        assert_eq!(row.treatment_week, date("2020-01-12"));
        assert_eq!(row.size, Some(150.0));
        assert_eq!(row.values, vec![Some(-20.0), None, Some(-22.0)]);
    }

    #[test]
    fn cohort_table_rejects_duplicate_treatment_weeks() {
        // A repeated treatment week would otherwise become two cohorts and
        // double-count its weight in the averages.
        let path = write_fixture(
            "rd-dup.csv",
            "treatment_week,size,2020-01-05\n\
             2020-01-05,100,-20.0\n\
             2020-01-12,150,-21.0\n\
             2020-01-12,200,-22.0\n",
        );

        let err = CohortTable::from_path(&path).unwrap_err();
        assert!(matches!(
            err,
            StudyError::DuplicateTreatmentWeek { week, .. } if week == date("2020-01-12")
        ));
    }

    #[test]
    fn empty_size_cell_is_none() {
        let path = write_fixture(
            "rd-nosize.csv",
            "treatment_week,size,2020-01-05\n2020-01-12,,-20.0\n",
        );

        let table = CohortTable::from_path(&path).unwrap();
        assert_eq!(table.rows[0].size, None);
    }

    #[test]
    fn grouped_table_finds_rows_per_arm() {
        let path = write_fixture(
            "did.csv",
            "treatment_week,group,size,2020-01-05\n\
             2020-01-12,treated,150,-20.0\n\
             2020-01-12,control,80,-18.0\n",
        );

        let table = GroupedCohortTable::from_path(&path).unwrap();
        assert_eq!(table.treatment_weeks(), vec![date("2020-01-12")]);

        let control = table.row(date("2020-01-12"), Group::Control).unwrap();
        assert_eq!(control.size, Some(80.0));

        let err = table.row(date("2020-01-19"), Group::Treated).unwrap_err();
        assert!(matches!(err, StudyError::MissingGroupRow { group: "treated", .. }));
    }

    #[test]
    fn grouped_table_rejects_duplicate_arm_rows() {
        // Two 'treated' rows for one week: `row()` would only ever see the
        // first, silently discarding the second.
        let path = write_fixture(
            "did-dup.csv",
            "treatment_week,group,size,2020-01-05\n\
             2020-01-12,treated,150,-20.0\n\
             2020-01-12,control,80,-18.0\n\
             2020-01-12,treated,90,-25.0\n",
        );

        let err = GroupedCohortTable::from_path(&path).unwrap_err();
        assert!(matches!(
            err,
            StudyError::DuplicateGroupRow { group: "treated", week, .. }
                if week == date("2020-01-12")
        ));
    }

    #[test]
    fn rejects_unknown_group() {
        let path = write_fixture(
            "did-badgroup.csv",
            "treatment_week,group,size,2020-01-05\n2020-01-12,placebo,150,-20.0\n",
        );

        let err = GroupedCohortTable::from_path(&path).unwrap_err();
        assert!(matches!(err, StudyError::BadGroup { value, .. } if value == "placebo"));
    }

    #[test]
    fn missing_input_reports_path() {
        let err = TrendTable::from_path(Path::new("/nonexistent/trend.csv")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/trend.csv"));
    }
}
