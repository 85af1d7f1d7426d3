use chrono::NaiveDate;
use std::path::PathBuf;
use thiserror::Error;

pub type StudyResult<T> = Result<T, StudyError>;

#[derive(Error, Debug)]
pub enum StudyError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("{path}: missing expected column '{column}'")]
    MissingColumn { path: PathBuf, column: String },

    #[error("{path}: cannot parse date '{value}'")]
    BadDate { path: PathBuf, value: String },

    #[error("{path}: duplicate date {date}")]
    DuplicateDate { path: PathBuf, date: NaiveDate },

    #[error("{path}: cannot parse number '{value}' in column '{column}'")]
    BadNumber {
        path: PathBuf,
        column: String,
        value: String,
    },

    #[error("{path}: unknown group '{value}' (expected 'treated' or 'control')")]
    BadGroup { path: PathBuf, value: String },

    #[error("{path}: duplicate treatment week {week}")]
    DuplicateTreatmentWeek { path: PathBuf, week: NaiveDate },

    #[error("{path}: duplicate '{group}' row for treatment week {week}")]
    DuplicateGroupRow {
        path: PathBuf,
        group: &'static str,
        week: NaiveDate,
    },

    #[error("{path}: no '{group}' row for treatment week {week}")]
    MissingGroupRow {
        path: PathBuf,
        group: &'static str,
        week: NaiveDate,
    },

    #[error("{path}: no rows between {start} and {end}")]
    EmptyDateWindow {
        path: PathBuf,
        start: NaiveDate,
        end: NaiveDate,
    },

    #[error("no cohorts to average")]
    NoCohorts,

    #[error("missing cohort size for treatment week {week}")]
    MissingCohortSize { week: NaiveDate },

    #[error("cohort {week} has no observation at week offset {offset}")]
    MissingObservation { week: NaiveDate, offset: i32 },

    #[error("weighted series has no value at week offset {offset}")]
    MissingAverage { offset: i32 },
}
