use std::collections::HashSet;
use std::error::Error;
use std::fmt;

use chrono::{Datelike, NaiveDate};

use crate::holiday::HolidayInfo;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    ParseError { error: String },
    InvalidDateKey { key: String },
    DayMismatch { key: String, date: u32 },
    EmptyName { key: String },
    DuplicateKey { key: String },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ParseError { error } => write!(f, "Error parsing holiday data: {}", error),
            Self::InvalidDateKey { key } => {
                write!(f, "Invalid date key {:?}, expected YYYY/MM/DD", key)
            }
            Self::DayMismatch { key, date } => {
                write!(f, "Entry {} declares day {}, which does not match its key", key, date)
            }
            Self::EmptyName { key } => write!(f, "Entry {} has an empty name", key),
            Self::DuplicateKey { key } => write!(f, "Date {} appears more than once", key),
        }
    }
}

impl Error for ValidationError {}

/// Parses a zero-padded `YYYY/MM/DD` key into a real calendar date.
pub fn parse_date_key(key: &str) -> Result<NaiveDate, ValidationError> {
    let invalid = || ValidationError::InvalidDateKey {
        key: key.to_string(),
    };

    let parts: Vec<&str> = key.split('/').collect();
    let [year, month, day] = parts.as_slice() else {
        return Err(invalid());
    };
    let well_formed = [(year, 4), (month, 2), (day, 2)]
        .iter()
        .all(|(part, len)| part.len() == *len && part.bytes().all(|b| b.is_ascii_digit()));
    if !well_formed {
        return Err(invalid());
    }

    let year = year.parse::<i32>().map_err(|_| invalid())?;
    let month = month.parse::<u32>().map_err(|_| invalid())?;
    let day = day.parse::<u32>().map_err(|_| invalid())?;
    NaiveDate::from_ymd_opt(year, month, day).ok_or_else(invalid)
}

pub fn date_key(date: NaiveDate) -> String {
    format!("{:04}/{:02}/{:02}", date.year(), date.month(), date.day())
}

pub fn validate_entry(key: &str, info: &HolidayInfo) -> Result<NaiveDate, ValidationError> {
    let date = parse_date_key(key)?;
    if date.day() != info.date {
        return Err(ValidationError::DayMismatch {
            key: key.to_string(),
            date: info.date,
        });
    }
    if info.name.trim().is_empty() {
        return Err(ValidationError::EmptyName {
            key: key.to_string(),
        });
    }
    Ok(date)
}

/// Parses and validates a holiday snapshot: `[["YYYY/MM/DD", {"date": D, "name": ..}], ..]`.
pub fn validate_input(content: &str) -> Result<Vec<(String, HolidayInfo)>, ValidationError> {
    let entries: Vec<(String, HolidayInfo)> =
        serde_json::from_str(content).map_err(|err| ValidationError::ParseError {
            error: err.to_string(),
        })?;

    let mut seen = HashSet::new();
    for (key, info) in &entries {
        validate_entry(key, info)?;
        if !seen.insert(key.as_str()) {
            return Err(ValidationError::DuplicateKey { key: key.clone() });
        }
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_input() {
        let input = r#"[
            ["2025/01/01", {"date": 1, "name": "元日"}],
            ["2025/04/29", {"date": 29, "name": "昭和の日"}]
        ]"#;
        let entries = validate_input(input).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].1.name, "昭和の日");
    }

    #[test]
    fn test_anniversary_mark_is_accepted() {
        let input = r#"[["2025/06/10", {"date": 10, "name": "Birthday", "mark": "🎂"}]]"#;
        let entries = validate_input(input).unwrap();
        assert_eq!(entries[0].1.mark.as_deref(), Some("🎂"));
    }

    #[test]
    fn test_invalid_date_key() {
        for key in ["2025/4/29", "2025-04-29", "2025/02/30", "25/04/29", "2025/04/29/1"] {
            assert!(
                matches!(parse_date_key(key), Err(ValidationError::InvalidDateKey { .. })),
                "{key} should be rejected"
            );
        }
    }

    #[test]
    fn test_day_mismatch() {
        let input = r#"[["2025/04/29", {"date": 28, "name": "昭和の日"}]]"#;
        assert!(matches!(
            validate_input(input),
            Err(ValidationError::DayMismatch { date: 28, .. })
        ));
    }

    #[test]
    fn test_duplicate_and_empty_entries() {
        let duplicate = r#"[
            ["2025/01/01", {"date": 1, "name": "元日"}],
            ["2025/01/01", {"date": 1, "name": "元日"}]
        ]"#;
        assert!(matches!(
            validate_input(duplicate),
            Err(ValidationError::DuplicateKey { .. })
        ));

        let empty = r#"[["2025/01/01", {"date": 1, "name": "  "}]]"#;
        assert!(matches!(
            validate_input(empty),
            Err(ValidationError::EmptyName { .. })
        ));
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            validate_input("not json"),
            Err(ValidationError::ParseError { .. })
        ));
    }

    #[test]
    fn test_date_key_round_trip() {
        let date = parse_date_key("2024/02/29").unwrap();
        assert_eq!(date_key(date), "2024/02/29");
    }
}
