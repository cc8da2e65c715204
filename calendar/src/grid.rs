use std::fmt;

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::error::{CalendarError, CalendarResult};

pub const DAYS_PER_WEEK: usize = 7;
pub const GRID_ROWS: usize = 6;
pub const GRID_CELLS: usize = DAYS_PER_WEEK * GRID_ROWS;

/// Spillover cells reserved after the month; enough for a 28-day month starting on Sunday.
const NEXT_MONTH_CELLS: usize = 14;

/// A validated calendar month (month is always 1..=12).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct YearMonth {
    year: i32,
    month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> CalendarResult<Self> {
        if !(1..=12).contains(&month) {
            return Err(CalendarError::InvalidMonth { month });
        }
        NaiveDate::from_ymd_opt(year, month, 1)
            .ok_or(CalendarError::DateOutOfRange { year, month })?;
        Ok(Self { year, month })
    }

    pub fn year(self) -> i32 {
        self.year
    }

    pub fn month(self) -> u32 {
        self.month
    }

    pub fn first_day(self) -> CalendarResult<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).ok_or(CalendarError::DateOutOfRange {
            year: self.year,
            month: self.month,
        })
    }

    pub fn previous(self) -> CalendarResult<Self> {
        if self.month == 1 {
            let year = self.year.checked_sub(1).ok_or(CalendarError::DateOutOfRange {
                year: self.year,
                month: self.month,
            })?;
            Self::new(year, 12)
        } else {
            Self::new(self.year, self.month - 1)
        }
    }

    pub fn next(self) -> CalendarResult<Self> {
        if self.month == 12 {
            let year = self.year.checked_add(1).ok_or(CalendarError::DateOutOfRange {
                year: self.year,
                month: self.month,
            })?;
            Self::new(year, 1)
        } else {
            Self::new(self.year, self.month + 1)
        }
    }

    pub fn days_in_month(self) -> CalendarResult<u32> {
        let first = self.first_day()?;
        let first_of_next = self.next()?.first_day()?;
        Ok(first_of_next.signed_duration_since(first).num_days() as u32)
    }

    /// Prefix shared by every `YYYY/MM/DD` holiday key of this month.
    pub fn key_prefix(self) -> String {
        format!("{:04}/{:02}/", self.year, self.month)
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}/{:02}", self.year, self.month)
    }
}

/// Maps a display slot (1..=12) onto a calendar month.
///
/// With the fiscal offset enabled, slot 1 is April of `year` and slots 10..=12 are
/// January..March of the following year. Without it the input is returned unchanged.
pub fn normalize_year_month(year: i32, month: u32, fiscal_offset: bool) -> CalendarResult<YearMonth> {
    let slot = YearMonth::new(year, month)?;
    if !fiscal_offset {
        return Ok(slot);
    }
    let display_year = if month > 9 {
        year.checked_add(1)
            .ok_or(CalendarError::DateOutOfRange { year, month })?
    } else {
        year
    };
    YearMonth::new(display_year, (month - 1 + 3) % 12 + 1)
}

/// The twelve months of a calendar year in display order.
pub fn fiscal_months(year: i32, fiscal_offset: bool) -> CalendarResult<Vec<YearMonth>> {
    (1..=12)
        .map(|slot| normalize_year_month(year, slot, fiscal_offset))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayCell {
    Previous(u32),
    Current(u32),
    Next(u32),
}

impl DayCell {
    pub fn day(self) -> u32 {
        match self {
            Self::Previous(day) | Self::Current(day) | Self::Next(day) => day,
        }
    }

    pub fn is_current(self) -> bool {
        matches!(self, Self::Current(_))
    }
}

/// A Sunday-first 6x7 month grid. Positive cells are days of the month, non-positive cells
/// are spillover days of the adjacent months.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarGrid {
    year_month: YearMonth,
    cells: [i32; GRID_CELLS],
    first_weekday: usize,
    days_in_month: u32,
}

impl CalendarGrid {
    pub fn compute(year_month: YearMonth) -> CalendarResult<Self> {
        let first_weekday = year_month.first_day()?.weekday().num_days_from_sunday() as usize;
        let days_in_month = year_month.days_in_month()?;
        let days_in_previous = year_month.previous()?.days_in_month()? as i32;

        let mut cells = [0i32; GRID_CELLS];
        for i in 0..days_in_month as usize {
            cells[i + first_weekday] = i as i32 + 1;
        }
        for i in 0..DAYS_PER_WEEK {
            if let Some(index) = first_weekday.checked_sub(1 + i) {
                cells[index] = -(days_in_previous - i as i32);
            }
        }
        for i in 0..NEXT_MONTH_CELLS {
            let index = first_weekday + days_in_month as usize + i;
            if index < GRID_CELLS {
                cells[index] = -(i as i32 + 1);
            }
        }

        Ok(Self {
            year_month,
            cells,
            first_weekday,
            days_in_month,
        })
    }

    pub fn year_month(&self) -> YearMonth {
        self.year_month
    }

    pub fn cells(&self) -> &[i32; GRID_CELLS] {
        &self.cells
    }

    /// Weekday of day 1, 0 = Sunday.
    pub fn first_weekday(&self) -> usize {
        self.first_weekday
    }

    pub fn days_in_month(&self) -> u32 {
        self.days_in_month
    }

    pub fn cell(&self, index: usize) -> Option<DayCell> {
        let value = *self.cells.get(index)?;
        let day = value.unsigned_abs();
        Some(if value > 0 {
            DayCell::Current(day)
        } else if index < self.first_weekday {
            DayCell::Previous(day)
        } else {
            DayCell::Next(day)
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, DayCell)> + '_ {
        (0..GRID_CELLS).filter_map(move |index| self.cell(index).map(|cell| (index, cell)))
    }
}

pub fn compute_grid(year: i32, month: u32) -> CalendarResult<CalendarGrid> {
    CalendarGrid::compute(YearMonth::new(year, month)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn positive_run(grid: &CalendarGrid) -> Vec<i32> {
        grid.cells().iter().copied().filter(|&c| c > 0).collect()
    }

    #[test]
    fn test_grid_shape_for_a_decade() {
        for year in 2020..=2030 {
            for month in 1..=12 {
                let grid = compute_grid(year, month).unwrap();
                let cells = grid.cells();
                let fw = grid.first_weekday();
                let days = grid.days_in_month() as usize;
                let ym = YearMonth::new(year, month).unwrap();
                let prev_days = ym.previous().unwrap().days_in_month().unwrap() as i32;

                assert_eq!(cells.len(), GRID_CELLS);
                let expected: Vec<i32> = (1..=days as i32).collect();
                assert_eq!(&cells[fw..fw + days], expected.as_slice());
                for (k, &cell) in cells[..fw].iter().enumerate() {
                    assert_eq!(cell, -(prev_days - (fw - 1 - k) as i32));
                }
                for (j, &cell) in cells[fw + days..].iter().enumerate() {
                    assert_eq!(cell, -(j as i32 + 1));
                }
            }
        }
    }

    #[test]
    fn test_december_to_january_rollover() {
        let december = compute_grid(2025, 12).unwrap();
        assert_eq!(positive_run(&december), (1..=31).collect::<Vec<_>>());

        // 2026-01-01 is a Thursday
        let january = compute_grid(2026, 1).unwrap();
        assert_eq!(january.first_weekday(), 4);
        assert_eq!(&january.cells()[..4], &[-28, -29, -30, -31]);
        assert_eq!(january.cells()[4], 1);
    }

    #[test]
    fn test_leap_year_february() {
        assert_eq!(positive_run(&compute_grid(2024, 2).unwrap()).len(), 29);
        assert_eq!(positive_run(&compute_grid(2023, 2).unwrap()).len(), 28);
    }

    #[test]
    fn test_month_starting_on_sunday_has_no_leading_spillover() {
        let grid = compute_grid(2025, 6).unwrap();
        assert_eq!(grid.first_weekday(), 0);
        assert_eq!(grid.cells()[0], 1);
        assert_eq!(grid.cell(0), Some(DayCell::Current(1)));
        assert_eq!(grid.cell(30), Some(DayCell::Next(1)));
    }

    #[test]
    fn test_cell_classification() {
        // 2025-04-01 is a Tuesday, March has 31 days
        let grid = compute_grid(2025, 4).unwrap();
        assert_eq!(grid.first_weekday(), 2);
        assert_eq!(grid.cell(0), Some(DayCell::Previous(30)));
        assert_eq!(grid.cell(1), Some(DayCell::Previous(31)));
        assert_eq!(grid.cell(2), Some(DayCell::Current(1)));
        assert_eq!(grid.cell(31), Some(DayCell::Current(30)));
        assert_eq!(grid.cell(32), Some(DayCell::Next(1)));
        assert_eq!(grid.cell(GRID_CELLS), None);
        assert_eq!(grid.iter().count(), GRID_CELLS);
    }

    #[test]
    fn test_invalid_month_is_rejected() {
        assert!(matches!(
            compute_grid(2025, 0),
            Err(CalendarError::InvalidMonth { month: 0 })
        ));
        assert!(matches!(
            compute_grid(2025, 13),
            Err(CalendarError::InvalidMonth { month: 13 })
        ));
        assert!(normalize_year_month(2025, 13, true).is_err());
    }

    #[test]
    fn test_fiscal_offset_mapping() {
        let ym = |y, m| YearMonth::new(y, m).unwrap();
        assert_eq!(normalize_year_month(2025, 1, true).unwrap(), ym(2025, 4));
        assert_eq!(normalize_year_month(2025, 9, true).unwrap(), ym(2025, 12));
        assert_eq!(normalize_year_month(2025, 10, true).unwrap(), ym(2026, 1));
        assert_eq!(normalize_year_month(2025, 12, true).unwrap(), ym(2026, 3));
        assert_eq!(normalize_year_month(2025, 3, false).unwrap(), ym(2025, 3));
    }

    #[test]
    fn test_fiscal_months_order() {
        let months = fiscal_months(2025, true).unwrap();
        assert_eq!(months.first().copied(), Some(YearMonth::new(2025, 4).unwrap()));
        assert_eq!(months.last().copied(), Some(YearMonth::new(2026, 3).unwrap()));

        let plain = fiscal_months(2025, false).unwrap();
        assert_eq!(plain.iter().map(|m| m.month()).collect::<Vec<_>>(), (1..=12).collect::<Vec<_>>());
    }

    #[test]
    fn test_key_prefix_is_zero_padded() {
        assert_eq!(YearMonth::new(2025, 4).unwrap().key_prefix(), "2025/04/");
        assert_eq!(YearMonth::new(2025, 4).unwrap().to_string(), "2025/04");
    }
}
