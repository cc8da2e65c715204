use std::path::PathBuf;

use thiserror::Error;

use crate::grid::YearMonth;
use crate::validation::ValidationError;

#[derive(Debug, Error)]
pub enum CalendarError {
    #[error("invalid month {month}: expected 1..=12")]
    InvalidMonth { month: u32 },
    #[error("date out of supported range: {year}/{month:02}")]
    DateOutOfRange { year: i32, month: u32 },
    #[error("invalid template: {0}")]
    Template(#[from] TemplateError),
    #[error("invalid holiday data: {0}")]
    Holiday(#[from] ValidationError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("holidays resolved for {got}, expected {expected}")]
    HolidayMonthMismatch { expected: YearMonth, got: YearMonth },
    #[error("unknown design: {0}")]
    UnknownDesign(String),
}

/// Raised at the template-load boundary only; a parsed template never fails to build.
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("XML parse error: {0}")]
    Xml(#[from] roxmltree::Error),
    #[error("root element is <{0}>, expected <svg>")]
    NotSvg(String),
}

pub type CalendarResult<T> = Result<T, CalendarError>;
