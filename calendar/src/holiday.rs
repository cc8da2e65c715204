use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use moka::sync::Cache;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::{CalendarError, CalendarResult};
use crate::grid::YearMonth;
use crate::validation::{validate_entry, validate_input};

/// Marks offered by the anniversary editor.
pub const ANNIVERSARY_MARKS: [&str; 4] = ["〇", "♡", "☆", "🎂"];

const NAME_SEPARATOR: &str = "・";
const MEMO_CAPACITY: u64 = 256;
const BUNDLED_HOLIDAYS: &str = include_str!("../data/holidays.json");

/// One dataset entry. An entry carrying a `mark` is an anniversary, anything else a holiday.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HolidayInfo {
    pub date: u32,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mark: Option<String>,
}

impl HolidayInfo {
    pub fn holiday(date: u32, name: impl Into<String>) -> Self {
        Self {
            date,
            name: name.into(),
            mark: None,
        }
    }

    pub fn anniversary(date: u32, name: impl Into<String>, mark: impl Into<String>) -> Self {
        Self {
            date,
            name: name.into(),
            mark: Some(mark.into()),
        }
    }
}

/// Entries keyed by `YYYY/MM/DD`; zero padding keeps the map in date order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HolidayTable {
    entries: BTreeMap<String, HolidayInfo>,
}

impl HolidayTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(content: &str) -> CalendarResult<Self> {
        let entries = validate_input(content)?;
        Ok(Self {
            entries: entries.into_iter().collect(),
        })
    }

    /// Japanese national holidays shipped with the crate.
    pub fn bundled() -> CalendarResult<Self> {
        Self::from_json(BUNDLED_HOLIDAYS)
    }

    pub fn load(path: &Path) -> CalendarResult<Self> {
        let content = fs::read_to_string(path).map_err(|source| CalendarError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&content)
    }

    pub fn to_json(&self) -> CalendarResult<String> {
        let entries: Vec<(&String, &HolidayInfo)> = self.entries.iter().collect();
        Ok(serde_json::to_string_pretty(&entries)?)
    }

    pub fn insert(&mut self, key: &str, info: HolidayInfo) -> CalendarResult<Option<HolidayInfo>> {
        validate_entry(key, &info)?;
        Ok(self.entries.insert(key.to_string(), info))
    }

    pub fn remove(&mut self, key: &str) -> Option<HolidayInfo> {
        self.entries.remove(key)
    }

    pub fn get(&self, key: &str) -> Option<&HolidayInfo> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &HolidayInfo)> {
        self.entries.iter().map(|(key, info)| (key.as_str(), info))
    }

    pub fn month_entries(&self, year_month: YearMonth) -> impl Iterator<Item = (&str, &HolidayInfo)> {
        let prefix = year_month.key_prefix();
        self.entries
            .range(prefix.clone()..)
            .take_while(move |(key, _)| key.starts_with(&prefix))
            .map(|(key, info)| (key.as_str(), info))
    }
}

/// What a single day of the month shows besides its number.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DayAnnotation {
    pub holiday: Option<String>,
    pub anniversary: Option<String>,
    pub mark: Option<String>,
}

impl DayAnnotation {
    fn absorb(&mut self, info: &HolidayInfo) {
        match &info.mark {
            Some(mark) => {
                append_name(&mut self.anniversary, &info.name);
                self.mark.get_or_insert_with(|| mark.clone());
            }
            None => append_name(&mut self.holiday, &info.name),
        }
    }
}

fn append_name(slot: &mut Option<String>, name: &str) {
    match slot {
        Some(existing) => {
            existing.push_str(NAME_SEPARATOR);
            existing.push_str(name);
        }
        None => *slot = Some(name.to_string()),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthHolidays {
    year_month: YearMonth,
    // index 0 is unused so that days index directly
    days: Vec<Option<DayAnnotation>>,
}

impl MonthHolidays {
    fn empty(year_month: YearMonth) -> Self {
        Self {
            year_month,
            days: vec![None; 32],
        }
    }

    pub fn year_month(&self) -> YearMonth {
        self.year_month
    }

    pub fn get(&self, day: u32) -> Option<&DayAnnotation> {
        self.days.get(day as usize)?.as_ref()
    }

    pub fn has_holiday(&self, day: u32) -> bool {
        self.get(day).is_some_and(|annotation| annotation.holiday.is_some())
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &DayAnnotation)> {
        self.days
            .iter()
            .enumerate()
            .filter_map(|(day, annotation)| annotation.as_ref().map(|a| (day as u32, a)))
    }

    pub fn is_empty(&self) -> bool {
        self.days.iter().all(Option::is_none)
    }
}

/// Merges the statutory table with the user's anniversaries, memoized per month.
pub struct HolidayResolver {
    statutory: Arc<HolidayTable>,
    anniversaries: HolidayTable,
    memo: Cache<(YearMonth, bool), Arc<MonthHolidays>>,
}

impl HolidayResolver {
    pub fn new(statutory: impl Into<Arc<HolidayTable>>) -> Self {
        Self::with_anniversaries(statutory, HolidayTable::new())
    }

    pub fn with_anniversaries(
        statutory: impl Into<Arc<HolidayTable>>,
        anniversaries: HolidayTable,
    ) -> Self {
        Self {
            statutory: statutory.into(),
            anniversaries,
            memo: Cache::new(MEMO_CAPACITY),
        }
    }

    pub fn statutory(&self) -> &HolidayTable {
        &self.statutory
    }

    pub fn anniversaries(&self) -> &HolidayTable {
        &self.anniversaries
    }

    pub fn get_holidays(
        &self,
        year: i32,
        month: u32,
        holidays_only: bool,
    ) -> CalendarResult<Arc<MonthHolidays>> {
        Ok(self.resolve(YearMonth::new(year, month)?, holidays_only))
    }

    pub fn resolve(&self, year_month: YearMonth, holidays_only: bool) -> Arc<MonthHolidays> {
        self.memo.get_with((year_month, holidays_only), || {
            trace!(%year_month, holidays_only, "resolving holidays");
            Arc::new(self.compute(year_month, holidays_only))
        })
    }

    fn compute(&self, year_month: YearMonth, holidays_only: bool) -> MonthHolidays {
        let mut month = MonthHolidays::empty(year_month);
        let user = (!holidays_only)
            .then(|| self.anniversaries.month_entries(year_month))
            .into_iter()
            .flatten();

        for (_, info) in self.statutory.month_entries(year_month).chain(user) {
            if let Some(slot) = month.days.get_mut(info.date as usize) {
                slot.get_or_insert_with(DayAnnotation::default).absorb(info);
            }
        }
        month
    }

    pub fn set_anniversary(
        &mut self,
        key: &str,
        info: HolidayInfo,
    ) -> CalendarResult<Option<HolidayInfo>> {
        let previous = self.anniversaries.insert(key, info)?;
        self.memo.invalidate_all();
        Ok(previous)
    }

    pub fn remove_anniversary(&mut self, key: &str) -> Option<HolidayInfo> {
        let removed = self.anniversaries.remove(key);
        if removed.is_some() {
            self.memo.invalidate_all();
        }
        removed
    }

    pub fn replace_anniversaries(&mut self, anniversaries: HolidayTable) {
        self.anniversaries = anniversaries;
        self.memo.invalidate_all();
    }
}
